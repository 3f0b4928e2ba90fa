// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Design variables bound to IDF fields, loaded from a parameter CSV.
//!
//! Several rows may share a group name: they are bound to different
//! fields but always carry the same value.  The group's bounds, type,
//! distribution and constraint are taken from its first row.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Write};
use std::ops::Index;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::{Error, ErrorKind, Result};
use crate::constraint::Constraint;
use crate::distribution::Distribution;
use crate::interval::Bounds;
use crate::var_err;

/// One row of the parameter CSV, exactly as read.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableRow {
    pub group: String,
    pub idfclass: String,
    pub idfobject: String,
    pub idffield: String,
    #[serde(rename = "type")]
    pub var_type: String,
    pub minimum: String,
    pub maximum: String,
    #[serde(default)]
    pub distribution: String,
    #[serde(default)]
    pub constraint: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VarType {
    Int,
    Float,
}

impl FromStr for VarType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" => Ok(VarType::Int),
            "float" | "real" | "double" => Ok(VarType::Float),
            _ => var_err!(BadType, format!("{s:?}")),
        }
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VarType::Int => write!(f, "int"),
            VarType::Float => write!(f, "float"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    pub group: String,
    pub class_name: String,
    pub object_name: String,
    pub field_name: String,
    pub var_type: VarType,
    pub minimum: f64,
    pub maximum: f64,
    pub distribution: Distribution,
    pub value: f64,
    pub constraint: Option<Constraint>,
}

// beyond this an f64 no longer holds every integer
const MAX_EXACT_INT: f64 = (1u64 << 53) as f64;

fn parse_number(column: &str, text: &str) -> Result<f64> {
    match text.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(n),
        _ => var_err!(BadNumber, format!("{column} {text:?}")),
    }
}

fn non_empty(text: &Option<String>) -> Option<&str> {
    text.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl Variable {
    pub fn from_row(row: &VariableRow) -> Result<Variable> {
        let var_type = row.var_type.parse::<VarType>()?;
        let minimum = parse_number("minimum", &row.minimum)?;
        let maximum = parse_number("maximum", &row.maximum)?;
        if minimum > maximum {
            return var_err!(BadBounds, format!("{}: {minimum} > {maximum}", row.group.trim()));
        }
        if var_type == VarType::Int && (minimum.abs() > MAX_EXACT_INT || maximum.abs() > MAX_EXACT_INT) {
            return var_err!(
                BadBounds,
                format!(
                    "{}: integer range [{minimum}, {maximum}] exceeds ±2^53",
                    row.group.trim()
                )
            );
        }
        let distribution = row.distribution.parse::<Distribution>()?;
        let constraint = non_empty(&row.constraint).map(Constraint::new).transpose()?;

        let value = match non_empty(&row.value) {
            Some(text) => parse_number("value", text)?,
            None => minimum + (maximum - minimum) / 2.0,
        };
        let value = match var_type {
            VarType::Int => value.round(),
            VarType::Float => value,
        };

        Ok(Variable {
            group: row.group.trim().to_owned(),
            class_name: row.idfclass.trim().to_owned(),
            object_name: row.idfobject.trim().to_owned(),
            field_name: row.idffield.trim().to_owned(),
            var_type,
            minimum,
            maximum,
            distribution,
            value,
            constraint,
        })
    }

    pub fn to_row(&self) -> VariableRow {
        VariableRow {
            group: self.group.clone(),
            idfclass: self.class_name.clone(),
            idfobject: self.object_name.clone(),
            idffield: self.field_name.clone(),
            var_type: self.var_type.to_string(),
            minimum: self.minimum.to_string(),
            maximum: self.maximum.to_string(),
            distribution: self.distribution.to_string(),
            constraint: self.constraint.as_ref().map(|c| c.expression().to_owned()),
            value: Some(self.formatted_value()),
        }
    }

    pub fn is_integer(&self) -> bool {
        self.var_type == VarType::Int
    }

    /// The variable's own closed range.
    pub fn bounds(&self) -> Bounds {
        Bounds::closed(self.minimum, self.maximum)
    }

    pub fn range(&self) -> f64 {
        self.maximum - self.minimum
    }

    /// The current value as it is written into an IDF field.
    pub fn formatted_value(&self) -> String {
        match self.var_type {
            VarType::Int => format!("{}", self.value.round() as i64),
            VarType::Float => format!("{}", self.value),
        }
    }
}

/// Group names in first-seen order, each mapped to the positions of the
/// variables that belong to it.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct GroupIndex {
    names: Vec<String>,
    members: HashMap<String, Vec<usize>>,
}

impl GroupIndex {
    pub(crate) fn build(variables: &[Variable]) -> GroupIndex {
        let mut index = GroupIndex::default();
        for (i, var) in variables.iter().enumerate() {
            if let Some(members) = index.members.get_mut(&var.group) {
                members.push(i);
            } else {
                index.names.push(var.group.clone());
                index.members.insert(var.group.clone(), vec![i]);
            }
        }
        index
    }

    pub(crate) fn names(&self) -> &[String] {
        &self.names
    }

    pub(crate) fn members(&self, group: &str) -> Result<&[usize]> {
        match self.members.get(group) {
            Some(members) => Ok(members),
            None => var_err!(UnknownGroup, group.to_owned()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VariableSet {
    variables: Vec<Variable>,
    groups: GroupIndex,
}

impl VariableSet {
    pub fn from_rows<I, B>(rows: I) -> Result<VariableSet>
    where
        I: IntoIterator<Item = B>,
        B: Borrow<VariableRow>,
    {
        let variables = rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| Variable::from_row(row.borrow()).map_err(|err| at_row(err, i)))
            .collect::<Result<Vec<_>>>()?;
        let groups = GroupIndex::build(&variables);
        debug!(
            "loaded {} variables in {} groups",
            variables.len(),
            groups.names().len()
        );
        Ok(VariableSet { variables, groups })
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<VariableSet> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);
        let rows = reader
            .deserialize::<VariableRow>()
            .collect::<std::result::Result<Vec<_>, csv::Error>>()
            .map_err(csv_err)?;
        VariableSet::from_rows(rows)
    }

    #[cfg(feature = "file_io")]
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<VariableSet> {
        let file = std::fs::File::open(path).map_err(|err| csv_err(err.into()))?;
        VariableSet::from_reader(std::io::BufReader::new(file))
    }

    pub fn rows(&self) -> Vec<VariableRow> {
        self.variables.iter().map(Variable::to_row).collect()
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        for row in self.rows() {
            writer.serialize(row).map_err(csv_err)?;
        }
        writer.flush().map_err(|err| csv_err(err.into()))?;
        Ok(())
    }

    pub fn variable_at(&self, i: usize) -> Result<&Variable> {
        match self.variables.get(i) {
            Some(var) => Ok(var),
            None => var_err!(
                IndexOutOfRange,
                format!("{i} (have {})", self.variables.len())
            ),
        }
    }

    /// Group names, each once, in first-seen order.
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.names().iter().map(String::as_str)
    }

    /// The first variable of `group`.
    pub fn get_variable(&self, group: &str) -> Result<&Variable> {
        let members = self.groups.members(group)?;
        Ok(&self.variables[members[0]])
    }

    /// Every variable bound to `group`, in row order.
    pub fn members(&self, group: &str) -> Result<impl Iterator<Item = &Variable>> {
        let members = self.groups.members(group)?;
        Ok(members.iter().map(|i| &self.variables[*i]))
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Variable> {
        self.variables.iter()
    }

    pub(crate) fn parts(&self) -> (&[Variable], &GroupIndex) {
        (&self.variables, &self.groups)
    }
}

impl Index<usize> for VariableSet {
    type Output = Variable;

    fn index(&self, i: usize) -> &Variable {
        &self.variables[i]
    }
}

impl<'a> IntoIterator for &'a VariableSet {
    type Item = &'a Variable;
    type IntoIter = std::slice::Iter<'a, Variable>;

    fn into_iter(self) -> Self::IntoIter {
        self.variables.iter()
    }
}

impl fmt::Display for VariableSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut buf = Vec::new();
        self.write_csv(&mut buf).map_err(|_| fmt::Error)?;
        f.write_str(&String::from_utf8_lossy(&buf))
    }
}

fn csv_err(err: csv::Error) -> Error {
    Error {
        kind: ErrorKind::Variable,
        ..Error::from(err)
    }
}

fn at_row(err: Error, i: usize) -> Error {
    let details = match err.details {
        Some(details) => format!("row {}: {details}", i + 1),
        None => format!("row {}", i + 1),
    };
    Error {
        details: Some(details),
        ..err
    }
}
