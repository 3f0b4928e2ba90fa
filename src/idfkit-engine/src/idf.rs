// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! The IDF document model.
//!
//! An `IdfFile` is the ordered list of records found in an EnergyPlus
//! input file, bound to the dictionary that gives each field its
//! position.  The source text is retained so that serializing a document
//! reproduces every byte that was not explicitly updated, comments and
//! whitespace included.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::common::{ErrorCode, Result, names_match};
use crate::idd::Idd;
use crate::idf_err;

type Span = (usize, usize);

#[derive(Clone, Debug)]
struct Layout {
    // byte offset of the class name
    start: usize,
    // end of the line holding the terminating `;`, excluding the newline
    line_end: usize,
    class: Span,
    values: Vec<Span>,
    dirty: Vec<bool>,
    // set when the record grew past its source fields
    rewritten: bool,
}

/// One object in an IDF: a class name and its positional field values.
/// The first value is conventionally the object's name.
#[derive(Clone, Debug)]
pub struct Record {
    class: String,
    values: Vec<String>,
    layout: Option<Layout>,
}

impl Record {
    pub fn new<S: Into<String>>(class: S, values: Vec<String>) -> Self {
        Record {
            class: class.into(),
            values: values.into_iter().map(|v| v.trim().to_owned()).collect(),
            layout: None,
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn name(&self) -> Option<&str> {
        self.values.first().map(|v| v.as_str())
    }

    pub fn get(&self, i: usize) -> Option<&str> {
        self.values.get(i).map(|v| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn is(&self, class: &str, identifier: &str) -> bool {
        names_match(&self.class, class)
            && self
                .name()
                .map(|name| names_match(name, identifier))
                .unwrap_or(false)
    }

    fn set(&mut self, i: usize, value: &str) {
        if i >= self.values.len() {
            self.values.resize(i + 1, String::new());
            if let Some(layout) = self.layout.as_mut() {
                layout.rewritten = true;
            }
        }
        self.values[i] = value.to_owned();
        if let Some(layout) = self.layout.as_mut()
            && i < layout.dirty.len()
        {
            layout.dirty[i] = true;
        }
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class && self.values == other.values
    }
}

/// A problem `IdfFile::validate` found with one field of one record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationIssue {
    pub class: String,
    pub object: String,
    pub field: String,
    pub code: ErrorCode,
    pub details: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {:?} {}: {} ({})",
            self.class, self.object, self.field, self.code, self.details
        )
    }
}

#[derive(Clone, Debug)]
pub struct IdfFile {
    idd: Arc<Idd>,
    source: String,
    records: Vec<Record>,
}

impl IdfFile {
    /// Parse `text` against the built-in dictionary.
    pub fn parse(text: &str) -> Result<IdfFile> {
        IdfFile::parse_with_idd(text, Idd::builtin())
    }

    pub fn parse_with_idd(text: &str, idd: Arc<Idd>) -> Result<IdfFile> {
        let records = parse_records(text)?;
        debug!("parsed IDF: {} records", records.len());
        Ok(IdfFile {
            idd,
            source: text.to_owned(),
            records,
        })
    }

    #[cfg(feature = "file_io")]
    pub fn open<P: AsRef<std::path::Path>>(path: P, idd: Option<Arc<Idd>>) -> Result<IdfFile> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        IdfFile::parse_with_idd(&contents, idd.unwrap_or_else(Idd::builtin))
    }

    #[cfg(feature = "file_io")]
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_string())?;
        Ok(())
    }

    pub fn idd(&self) -> &Arc<Idd> {
        &self.idd
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records of `class`, in file order.
    pub fn records_of<'a>(&'a self, class: &'a str) -> impl Iterator<Item = &'a Record> + 'a {
        self.records
            .iter()
            .filter(move |r| names_match(&r.class, class))
    }

    /// Append a record.  It is written after the existing content in the
    /// usual EnergyPlus layout.
    pub fn push(&mut self, record: Record) -> Result<()> {
        for value in record.values.iter() {
            check_value(value)?;
        }
        self.records.push(Record {
            layout: None,
            ..record
        });
        Ok(())
    }

    fn matching(&self, class: &str, identifier: &str) -> Vec<usize> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is(class, identifier))
            .map(|(i, _)| i)
            .collect()
    }

    /// The value of `field` in the single `class` record named
    /// `identifier`.  Trailing fields omitted from the file read as "".
    pub fn find(&self, class: &str, identifier: &str, field: &str) -> Result<&str> {
        let off = self.idd.field_index(class, field)?;
        let matches = self.matching(class, identifier);
        match matches.as_slice() {
            [] => idf_err!(NoMatch, format!("{class}/{identifier}")),
            [i] => Ok(self.records[*i].get(off).unwrap_or("")),
            _ => idf_err!(
                AmbiguousMatch,
                format!("{} records match {class}/{identifier}", matches.len())
            ),
        }
    }

    /// Set `field` of the `class` record named `identifier`, returning the
    /// number of records changed (0 or 1).
    pub fn update(&mut self, class: &str, identifier: &str, field: &str, value: &str) -> Result<usize> {
        let value = check_value(value)?;
        let off = self.idd.field_index(class, field)?;
        let matches = self.matching(class, identifier);
        match matches.as_slice() {
            [] => Ok(0),
            [i] => {
                trace!("update {class}/{identifier}/{field} = {value:?}");
                self.records[*i].set(off, value);
                Ok(1)
            }
            _ => idf_err!(
                AmbiguousMatch,
                format!("{} records match {class}/{identifier}", matches.len())
            ),
        }
    }

    /// Check every record against the dictionary.
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = vec![];
        for record in self.records.iter() {
            let object = record.name().unwrap_or("").to_owned();
            let issue = |field: &str, code: ErrorCode, details: String| ValidationIssue {
                class: record.class.clone(),
                object: object.clone(),
                field: field.to_owned(),
                code,
                details,
            };

            let def = match self.idd.class(&record.class) {
                Some(def) => def,
                None => {
                    issues.push(issue("", ErrorCode::UnknownClass, "not in dictionary".to_owned()));
                    continue;
                }
            };

            if let Some(min_fields) = def.min_fields
                && record.len() < min_fields
            {
                issues.push(issue(
                    "",
                    ErrorCode::TooFewFields,
                    format!("{} fields, at least {} expected", record.len(), min_fields),
                ));
            }

            for (i, field) in def.fields.iter().enumerate() {
                let value = record.get(i).unwrap_or("");
                if value.is_empty() {
                    if field.required {
                        issues.push(issue(&field.name, ErrorCode::MissingRequiredField, "empty".to_owned()));
                    }
                    continue;
                }

                if field.is_numeric() {
                    if (field.autosizable && value.eq_ignore_ascii_case("autosize"))
                        || (field.autocalculatable && value.eq_ignore_ascii_case("autocalculate"))
                    {
                        continue;
                    }
                    match value.parse::<f64>() {
                        Ok(n) if !field.in_bounds(n) => {
                            issues.push(issue(&field.name, ErrorCode::OutOfRange, value.to_owned()));
                        }
                        Ok(_) => {}
                        Err(_) => {
                            issues.push(issue(&field.name, ErrorCode::BadNumber, value.to_owned()));
                        }
                    }
                } else if !field.keys.is_empty()
                    && !field.keys.iter().any(|k| k.eq_ignore_ascii_case(value))
                {
                    issues.push(issue(&field.name, ErrorCode::InvalidChoice, value.to_owned()));
                }
            }
        }
        issues
    }

    fn write_canonical(&self, f: &mut fmt::Formatter, record: &Record) -> fmt::Result {
        let fields = self.idd.get_fields(&record.class).unwrap_or(&[]);
        if record.values.is_empty() {
            return write!(f, "{};", record.class);
        }
        write!(f, "{},", record.class)?;
        let last = record.values.len() - 1;
        for (i, value) in record.values.iter().enumerate() {
            let delim = if i == last { ';' } else { ',' };
            let text = format!("{value}{delim}");
            match fields.get(i) {
                Some(field) => write!(f, "\n    {text:<25} !- {}", field.name)?,
                None => write!(f, "\n    {text}")?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for IdfFile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let src = self.source.as_str();
        let mut cursor = 0;
        let mut appended = vec![];

        for record in self.records.iter() {
            let layout = match record.layout {
                Some(ref layout) => layout,
                None => {
                    appended.push(record);
                    continue;
                }
            };

            if layout.rewritten {
                f.write_str(&src[cursor..layout.start])?;
                self.write_canonical(f, record)?;
                cursor = layout.line_end;
                continue;
            }

            f.write_str(&src[cursor..layout.class.1])?;
            cursor = layout.class.1;
            for (i, &(start, end)) in layout.values.iter().enumerate() {
                f.write_str(&src[cursor..start])?;
                if layout.dirty[i] {
                    f.write_str(&record.values[i])?;
                } else {
                    f.write_str(&src[start..end])?;
                }
                cursor = end;
            }
        }
        f.write_str(&src[cursor..])?;

        let mut written = !src.is_empty();
        for record in appended {
            if written {
                if !src.ends_with('\n') {
                    writeln!(f)?;
                }
                writeln!(f)?;
            }
            self.write_canonical(f, record)?;
            writeln!(f)?;
            written = true;
        }

        Ok(())
    }
}

fn check_value(value: &str) -> Result<&str> {
    if value.contains([',', ';', '!', '\n', '\r']) {
        return idf_err!(BadFieldValue, format!("{value:?} contains a delimiter"));
    }
    Ok(value.trim())
}

fn line_of(src: &str, pos: usize) -> usize {
    src[..pos].matches('\n').count() + 1
}

/// End of the trailing text on the line a record closes on: its
/// comment, if any, but never the start of another record.
fn line_end(src: &str, from: usize) -> usize {
    let mut in_comment = false;
    for (i, c) in src[from..].char_indices() {
        match c {
            '\n' | '\r' => return from + i,
            '!' => in_comment = true,
            c if in_comment || c.is_whitespace() => {}
            _ => return from + i,
        }
    }
    src.len()
}

struct PendingRecord {
    start: usize,
    spans: Vec<Span>,
}

impl PendingRecord {
    fn finish(self, src: &str, end: usize) -> Result<Record> {
        let mut spans = self.spans.into_iter();
        let class = match spans.next() {
            Some(span) if span.0 != span.1 => span,
            _ => {
                return idf_err!(
                    BadFieldValue,
                    format!("line {}: record without a class name", line_of(src, self.start))
                );
            }
        };
        let values: Vec<Span> = spans.collect();

        Ok(Record {
            class: src[class.0..class.1].to_owned(),
            values: values.iter().map(|&(s, e)| src[s..e].to_owned()).collect(),
            layout: Some(Layout {
                start: self.start,
                line_end: line_end(src, end),
                class,
                dirty: vec![false; values.len()],
                values,
                rewritten: false,
            }),
        })
    }
}

fn parse_records(src: &str) -> Result<Vec<Record>> {
    let mut records = vec![];
    let mut pending: Option<PendingRecord> = None;
    // significant (non-space, non-comment) extent of the current value
    let mut value: Option<Span> = None;
    // text after a comment starts the value over
    let mut commented = false;

    let mut chars = src.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '!' => {
                commented = true;
                while let Some(&(_, c)) = chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            ',' | ';' => {
                commented = false;
                let span = value.take().unwrap_or((i, i));
                let record = pending.get_or_insert_with(|| PendingRecord {
                    start: span.0,
                    spans: vec![],
                });
                record.spans.push(span);
                if c == ';'
                    && let Some(record) = pending.take()
                {
                    records.push(record.finish(src, i + 1)?);
                }
            }
            c if c.is_whitespace() => {}
            c => {
                let end = i + c.len_utf8();
                value = Some(match value {
                    Some((start, _)) if !commented => (start, end),
                    _ => (i, end),
                });
                commented = false;
                if pending.is_none() {
                    pending = Some(PendingRecord {
                        start: i,
                        spans: vec![],
                    });
                }
            }
        }
    }

    if let Some(record) = pending {
        let class = record
            .spans
            .first()
            .map(|&(s, e)| &src[s..e])
            .or_else(|| value.map(|(s, e)| &src[s..e]))
            .unwrap_or("");
        return idf_err!(
            UnterminatedRecord,
            format!(
                "line {}: {class} is missing its terminating ';'",
                line_of(src, record.start)
            )
        );
    }

    Ok(records)
}
