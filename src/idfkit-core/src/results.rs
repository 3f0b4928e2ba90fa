// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Tabular simulation output, as written by the EnergyPlus CSV
//! post-processor.
//!
//! Every cell is either a number, free text (the `Date/Time` column), or
//! explicitly absent.  Absent cells are never collapsed to zero: monthly
//! meters in an hourly report are blank on most rows and downstream
//! objective functions need to tell the difference.

use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use crate::common::{Error, ErrorCode, ErrorKind, Result};

#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
    Absent,
}

impl Cell {
    fn parse(raw: &str) -> Cell {
        let raw = raw.trim();
        if raw.is_empty() {
            return Cell::Absent;
        }
        match f64::from_str(raw) {
            Ok(n) => Cell::Number(n),
            Err(_) => Cell::Text(raw.to_owned()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Cell::Absent)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            // `{}` on f64 is the shortest representation that parses
            // back to the identical value
            Cell::Number(n) => write!(f, "{n}"),
            Cell::Text(s) => write!(f, "{s}"),
            Cell::Absent => Ok(()),
        }
    }
}

/// One output row, borrowing the table's column labels.
pub struct Row<'a> {
    columns: &'a [String],
    offsets: &'a HashMap<String, usize>,
    cells: &'a [Cell],
}

impl<'a> Row<'a> {
    pub fn get(&self, label: &str) -> Option<&'a Cell> {
        self.offsets.get(label).map(|off| &self.cells[*off])
    }

    pub fn number(&self, label: &str) -> Option<f64> {
        self.get(label).and_then(Cell::as_number)
    }

    pub fn text(&self, label: &str) -> Option<&'a str> {
        self.get(label).and_then(Cell::as_text)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a Cell)> + 'a {
        let cells = self.cells;
        self.columns
            .iter()
            .enumerate()
            .map(move |(i, c)| (c.as_str(), &cells[i]))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResultsTable {
    columns: Vec<String>,
    offsets: HashMap<String, usize>,
    // one row-major allocation, `columns.len()` cells per row
    cells: Vec<Cell>,
    row_count: usize,
}

impl ResultsTable {
    pub fn from_reader<R: Read>(reader: R) -> Result<ResultsTable> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let columns: Vec<String> = rdr.headers()?.iter().map(|h| h.to_owned()).collect();
        let offsets: HashMap<String, usize> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();
        if offsets.len() != columns.len() {
            return Err(Error::new(
                ErrorKind::Results,
                ErrorCode::BadRow,
                Some("duplicate column label in header".to_owned()),
            ));
        }

        let step_size = columns.len();
        let mut cells: Vec<Cell> = Vec::new();
        let mut row_count = 0;

        for result in rdr.records() {
            let record = result?;
            if record.len() > step_size {
                return Err(Error::new(
                    ErrorKind::Results,
                    ErrorCode::BadRow,
                    Some(format!(
                        "row {} has {} cells but the header has {}",
                        row_count + 1,
                        record.len(),
                        step_size
                    )),
                ));
            }
            cells.extend(record.iter().map(Cell::parse));
            // short rows are padded with absent cells
            cells.extend((record.len()..step_size).map(|_| Cell::Absent));
            row_count += 1;
        }

        Ok(ResultsTable {
            columns,
            offsets,
            cells,
            row_count,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn row(&self, i: usize) -> Option<Row<'_>> {
        if i >= self.row_count {
            return None;
        }
        let step = self.columns.len();
        Some(Row {
            columns: &self.columns,
            offsets: &self.offsets,
            cells: &self.cells[i * step..(i + 1) * step],
        })
    }

    pub fn last(&self) -> Option<Row<'_>> {
        self.row_count.checked_sub(1).and_then(|i| self.row(i))
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        (0..self.row_count).filter_map(move |i| self.row(i))
    }

    /// All values of one column, in row order.
    pub fn series(&self, label: &str) -> Option<Vec<Option<f64>>> {
        let off = *self.offsets.get(label)?;
        let step = self.columns.len();
        Some(
            (0..self.row_count)
                .map(|i| self.cells[i * step + off].as_number())
                .collect(),
        )
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.columns)?;
        for row in self.rows() {
            wtr.write_record(row.cells.iter().map(|c| c.to_string()))?;
        }
        wtr.flush()?;
        Ok(())
    }
}

impl fmt::Display for ResultsTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut buf: Vec<u8> = Vec::new();
        self.write_csv(&mut buf).map_err(|_| fmt::Error)?;
        let text = String::from_utf8(buf).map_err(|_| fmt::Error)?;
        write!(f, "{text}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = "Date/Time,Zone Air Temperature [C](Hourly) ,Electricity:Facility [J](Monthly)\n\
 01/01  01:00:00,21.5000000001,\n\
 01/01  02:00:00,20.25,\n\
 01/31  24:00:00,19.0,123456789.987654\n";

    #[test]
    fn absent_cells_are_not_zero() {
        let table = ResultsTable::from_reader(OUTPUT.as_bytes()).unwrap();
        assert_eq!(3, table.len());
        assert_eq!(3, table.columns().len());

        let first = table.row(0).unwrap();
        assert_eq!(Some("01/01  01:00:00"), first.text("Date/Time"));
        assert_eq!(
            Some(21.5000000001),
            first.number("Zone Air Temperature [C](Hourly)")
        );
        assert!(
            first
                .get("Electricity:Facility [J](Monthly)")
                .unwrap()
                .is_absent()
        );

        let last = table.last().unwrap();
        assert_eq!(
            Some(123456789.987654),
            last.number("Electricity:Facility [J](Monthly)")
        );
        assert!(table.row(3).is_none());
    }

    #[test]
    fn write_then_read_is_exact() {
        let table = ResultsTable::from_reader(OUTPUT.as_bytes()).unwrap();
        let text = table.to_string();
        let reread = ResultsTable::from_reader(text.as_bytes()).unwrap();
        assert_eq!(table, reread);
    }

    #[test]
    fn series_keeps_gaps() {
        let table = ResultsTable::from_reader(OUTPUT.as_bytes()).unwrap();
        let series = table.series("Electricity:Facility [J](Monthly)").unwrap();
        assert_eq!(vec![None, None, Some(123456789.987654)], series);
        assert!(table.series("missing").is_none());
    }

    #[test]
    fn overlong_rows_are_rejected() {
        let err = ResultsTable::from_reader("a,b\n1,2,3\n".as_bytes()).unwrap_err();
        assert_eq!(ErrorCode::BadRow, err.code);
    }
}
