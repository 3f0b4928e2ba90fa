// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! The EnergyPlus input data dictionary (IDD).
//!
//! An IDD describes, for every object class an IDF may contain, the
//! ordered list of fields the class takes together with per-field
//! annotations (required, bounds, defaults, choices).  The dictionary is
//! immutable once loaded and is shared between documents through an
//! `Arc`.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, trace};

use crate::common::{Result, name_key};
use crate::idd_err;

const BUILTIN_IDD: &str = include_str!("../data/builtin.idd");

lazy_static! {
    static ref BUILTIN: Arc<Idd> = Arc::new(Idd::parse(BUILTIN_IDD).unwrap());
    static ref FIELD_LIST_RE: Regex = Regex::new(r"^([AaNn]\d+\s*[,;]\s*)+$").unwrap();
    static ref FIELD_ID_RE: Regex = Regex::new(r"([AaNn])(\d+)\s*([,;])").unwrap();
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Alpha,
    Numeric,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDef {
    /// positional identifier from the dictionary, e.g. `A1` or `N3`
    pub id: String,
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    pub minimum: Option<f64>,
    pub include_minimum: bool,
    pub maximum: Option<f64>,
    pub include_maximum: bool,
    pub default: Option<String>,
    pub field_type: Option<String>,
    pub units: Option<String>,
    pub keys: Vec<String>,
    pub autosizable: bool,
    pub autocalculatable: bool,
}

impl FieldDef {
    fn new(kind: FieldKind, id: String) -> Self {
        FieldDef {
            name: id.clone(),
            id,
            kind,
            required: false,
            minimum: None,
            include_minimum: true,
            maximum: None,
            include_maximum: true,
            default: None,
            field_type: None,
            units: None,
            keys: vec![],
            autosizable: false,
            autocalculatable: false,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.kind == FieldKind::Numeric
    }

    /// Whether `value` lies within this field's bounds.  Unbounded
    /// sides always pass.
    pub fn in_bounds(&self, value: f64) -> bool {
        let above = match self.minimum {
            Some(min) if self.include_minimum => value >= min,
            Some(min) => value > min,
            None => true,
        };
        let below = match self.maximum {
            Some(max) if self.include_maximum => value <= max,
            Some(max) => value < max,
            None => true,
        };
        above && below
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClassDef {
    pub name: String,
    pub group: String,
    pub memo: Vec<String>,
    pub unique: bool,
    pub required: bool,
    pub min_fields: Option<usize>,
    pub fields: Vec<FieldDef>,
}

impl ClassDef {
    fn new(name: &str, group: &str) -> Self {
        ClassDef {
            name: name.to_owned(),
            group: group.to_owned(),
            memo: vec![],
            unique: false,
            required: false,
            min_fields: None,
            fields: vec![],
        }
    }

    pub fn field_index(&self, field: &str) -> Option<usize> {
        let field = field.trim();
        self.fields
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(field))
    }

    pub fn field(&self, field: &str) -> Option<&FieldDef> {
        self.field_index(field).map(|i| &self.fields[i])
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    /// class names, in dictionary order
    pub classes: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Idd {
    classes: Vec<ClassDef>,
    by_name: HashMap<String, usize>,
    groups: Vec<Group>,
}

impl Idd {
    /// The dictionary compiled into the crate, parsed on first use.
    pub fn builtin() -> Arc<Idd> {
        BUILTIN.clone()
    }

    #[cfg(feature = "file_io")]
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Idd> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Idd::parse(&contents)
    }

    pub fn parse(text: &str) -> Result<Idd> {
        let mut builder = IddBuilder::default();
        for (lineno, line) in text.lines().enumerate() {
            builder.line(lineno + 1, line)?;
        }
        let idd = builder.finish();
        debug!(
            "parsed IDD: {} classes in {} groups",
            idd.classes.len(),
            idd.groups.len()
        );
        Ok(idd)
    }

    pub fn class(&self, name: &str) -> Option<&ClassDef> {
        self.by_name.get(&name_key(name)).map(|i| &self.classes[*i])
    }

    pub fn classes(&self) -> &[ClassDef] {
        &self.classes
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        let name = name.trim();
        self.groups
            .iter()
            .find(|g| g.name.eq_ignore_ascii_case(name))
    }

    /// The ordered field definitions of `class`.  A class declared
    /// without fields yields an empty slice.
    pub fn get_fields(&self, class: &str) -> Result<&[FieldDef]> {
        match self.class(class) {
            Some(def) => Ok(&def.fields),
            None => idd_err!(UnknownClass, class.to_owned()),
        }
    }

    pub fn field_index(&self, class: &str, field: &str) -> Result<usize> {
        let def = match self.class(class) {
            Some(def) => def,
            None => return idd_err!(UnknownClass, class.to_owned()),
        };
        match def.field_index(field) {
            Some(i) => Ok(i),
            None => idd_err!(UnknownField, format!("{}/{}", def.name, field)),
        }
    }
}

#[derive(Default)]
struct IddBuilder {
    classes: Vec<ClassDef>,
    by_name: HashMap<String, usize>,
    groups: Vec<Group>,
    group: String,
    // index into `classes` of the class receiving fields
    current: Option<usize>,
}

impl IddBuilder {
    fn line(&mut self, lineno: usize, line: &str) -> Result<()> {
        let line = match line.find('!') {
            Some(i) => &line[..i],
            None => line,
        };
        let (data, annotation) = match line.find('\\') {
            Some(i) => (line[..i].trim(), Some(&line[i + 1..])),
            None => (line.trim(), None),
        };

        if !data.is_empty() {
            if FIELD_LIST_RE.is_match(data) {
                self.fields(lineno, data)?;
            } else {
                self.class(lineno, data)?;
            }
        }

        if let Some(annotation) = annotation {
            self.annotation(lineno, annotation)?;
        }

        Ok(())
    }

    fn class(&mut self, lineno: usize, data: &str) -> Result<()> {
        let name = data.trim_end_matches([',', ';']).trim();
        let key = name_key(name);
        if self.by_name.contains_key(&key) {
            return idd_err!(DuplicateClass, format!("line {lineno}: {name}"));
        }

        let off = self.classes.len();
        self.classes.push(ClassDef::new(name, &self.group));
        self.by_name.insert(key, off);
        self.current = Some(off);

        match self.groups.iter_mut().find(|g| g.name == self.group) {
            Some(group) => group.classes.push(name.to_owned()),
            None => self.groups.push(Group {
                name: self.group.clone(),
                classes: vec![name.to_owned()],
            }),
        }

        Ok(())
    }

    fn fields(&mut self, lineno: usize, data: &str) -> Result<()> {
        let class = match self.current {
            Some(off) => &mut self.classes[off],
            None => {
                return idd_err!(
                    UnexpectedField,
                    format!("line {lineno}: field {data:?} outside of a class")
                );
            }
        };
        for caps in FIELD_ID_RE.captures_iter(data) {
            let kind = if caps[1].eq_ignore_ascii_case("n") {
                FieldKind::Numeric
            } else {
                FieldKind::Alpha
            };
            let id = format!("{}{}", caps[1].to_ascii_uppercase(), &caps[2]);
            class.fields.push(FieldDef::new(kind, id));
        }
        Ok(())
    }

    fn annotation(&mut self, lineno: usize, text: &str) -> Result<()> {
        let (key, value) = split_annotation(text);
        let key = key.to_ascii_lowercase();

        if key == "group" {
            self.group = value.to_owned();
            self.current = None;
            return Ok(());
        }

        let class = match self.current {
            Some(off) => &mut self.classes[off],
            None => {
                trace!("line {lineno}: ignoring \\{key} outside of a class");
                return Ok(());
            }
        };

        match key.as_str() {
            "memo" => {
                class.memo.push(value.to_owned());
                return Ok(());
            }
            "unique-object" => {
                class.unique = true;
                return Ok(());
            }
            "required-object" => {
                class.required = true;
                return Ok(());
            }
            "min-fields" => {
                class.min_fields = Some(parse_number::<usize>(lineno, &key, value)?);
                return Ok(());
            }
            _ => {}
        }

        let field = match class.fields.last_mut() {
            Some(field) => field,
            None => {
                trace!("line {lineno}: ignoring \\{key} on {}", class.name);
                return Ok(());
            }
        };

        match key.as_str() {
            "field" => field.name = value.to_owned(),
            "required-field" => field.required = true,
            "minimum" => {
                field.minimum = Some(parse_number(lineno, &key, value)?);
                field.include_minimum = true;
            }
            "minimum>" => {
                field.minimum = Some(parse_number(lineno, &key, value)?);
                field.include_minimum = false;
            }
            "maximum" => {
                field.maximum = Some(parse_number(lineno, &key, value)?);
                field.include_maximum = true;
            }
            "maximum<" => {
                field.maximum = Some(parse_number(lineno, &key, value)?);
                field.include_maximum = false;
            }
            "default" => field.default = Some(value.to_owned()),
            "type" => field.field_type = Some(value.to_ascii_lowercase()),
            "units" => field.units = Some(value.to_owned()),
            "key" => field.keys.push(value.to_owned()),
            "autosizable" => field.autosizable = true,
            "autocalculatable" => field.autocalculatable = true,
            _ => trace!("line {lineno}: ignoring \\{key}"),
        }

        Ok(())
    }

    fn finish(self) -> Idd {
        Idd {
            classes: self.classes,
            by_name: self.by_name,
            groups: self.groups,
        }
    }
}

/// Split `minimum> 0` or `field Name` into its key and value.  The
/// exclusive-bound keys may be written with no space before the number.
fn split_annotation(text: &str) -> (&str, &str) {
    let text = text.trim();
    for bounded in ["minimum>", "maximum<"] {
        if let Some(prefix) = text.get(..bounded.len())
            && prefix.eq_ignore_ascii_case(bounded)
        {
            return (prefix, text[bounded.len()..].trim());
        }
    }
    match text.find(char::is_whitespace) {
        Some(i) => (&text[..i], text[i..].trim()),
        None => (text, ""),
    }
}

fn parse_number<T: FromStr>(lineno: usize, key: &str, value: &str) -> Result<T> {
    match value.parse::<T>() {
        Ok(n) => Ok(n),
        Err(_) => idd_err!(BadNumber, format!("line {lineno}: \\{key} {value:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorCode;

    const SMALL: &str = "\
! a comment line
\\group Simulation Parameters

Version,
      \\unique-object
  A1 ; \\field Version Identifier
      \\default 7.0

\\group Surface Construction Elements

Material,
       \\min-fields 3
  A1 , \\field Name
       \\required-field
  N1 , \\field Thickness
       \\units m
       \\minimum> 0
       \\maximum 3.0
  N2 ; \\field Conductivity
       \\minimum>0
       \\maximum< 10
       \\retaincase

Lead Input;
";

    #[test]
    fn parse_small_dictionary() {
        let idd = Idd::parse(SMALL).unwrap();
        assert_eq!(3, idd.classes().len());
        assert_eq!(2, idd.groups().len());
        assert_eq!(
            vec!["Material".to_owned(), "Lead Input".to_owned()],
            idd.group("surface construction elements").unwrap().classes
        );

        let version = idd.class("VERSION").unwrap();
        assert!(version.unique);
        assert_eq!(Some("7.0"), version.fields[0].default.as_deref());

        let fields = idd.get_fields("Material").unwrap();
        assert_eq!(3, fields.len());
        assert_eq!("A1", fields[0].id);
        assert!(fields[0].required);
        assert!(!fields[1].required);
        assert_eq!(FieldKind::Numeric, fields[1].kind);
        assert_eq!(Some(0.0), fields[1].minimum);
        assert!(!fields[1].include_minimum);
        assert!(fields[1].include_maximum);
        assert_eq!(Some("m"), fields[1].units.as_deref());

        assert_eq!(Some(0.0), fields[2].minimum);
        assert!(!fields[2].include_minimum);
        assert_eq!(Some(10.0), fields[2].maximum);
        assert!(!fields[2].include_maximum);

        assert_eq!(Some(3), idd.class("material").unwrap().min_fields);
        assert!(idd.get_fields("Lead Input").unwrap().is_empty());
    }

    #[test]
    fn lookups_report_what_is_missing() {
        let idd = Idd::parse(SMALL).unwrap();
        assert_eq!(2, idd.field_index("material", "conductivity").unwrap());

        let err = idd.get_fields("Material:NoMass").unwrap_err();
        assert_eq!(ErrorCode::UnknownClass, err.code);
        assert!(err.is_lookup_error());

        let err = idd.field_index("Material", "Density").unwrap_err();
        assert_eq!(ErrorCode::UnknownField, err.code);
    }

    #[test]
    fn malformed_dictionaries() {
        let err = Idd::parse("Material,\n  N1 ; \\minimum abc\n").unwrap_err();
        assert_eq!(ErrorCode::BadNumber, err.code);
        assert!(err.is_value_error());

        let err = Idd::parse("  A1 ; \\field Name\n").unwrap_err();
        assert_eq!(ErrorCode::UnexpectedField, err.code);

        let err = Idd::parse("Zone;\nzone;\n").unwrap_err();
        assert_eq!(ErrorCode::DuplicateClass, err.code);
    }

    #[test]
    fn field_bounds() {
        let idd = Idd::parse(SMALL).unwrap();
        let conductivity = idd.class("Material").unwrap().field("Conductivity").unwrap();
        assert!(!conductivity.in_bounds(0.0));
        assert!(conductivity.in_bounds(0.049));
        assert!(!conductivity.in_bounds(10.0));
    }

    #[test]
    fn builtin_dictionary() {
        let idd = Idd::builtin();
        let fields = idd.get_fields("Material").unwrap();
        assert_eq!("Name", fields[0].name);
        assert!(fields[0].required);
        assert_eq!("Conductivity", fields[3].name);
        assert_eq!(Some(0.0), fields[3].minimum);
        assert!(!fields[3].include_minimum);

        assert_eq!(42, idd.get_fields("Schedule:Compact").unwrap().len());
        assert_eq!(
            6,
            idd.field_index("Schedule:Compact", "Field 4").unwrap()
        );
        assert_eq!(2, idd.field_index("Fan:ConstantVolume", "Fan Efficiency").unwrap());
        assert!(idd.group("Internal Gains").is_some());
    }
}
