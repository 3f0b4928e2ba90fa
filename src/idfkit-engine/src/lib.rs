// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

#![forbid(unsafe_code)]

pub mod common;

mod ast;
mod parser;
mod solve;
mod token;

pub mod candidate;
pub mod constraint;
pub mod distribution;
pub mod idd;
pub mod idf;
pub mod interval;
pub mod options;
pub mod variable;

pub use idfkit_core::results;

pub use self::candidate::Candidate;
pub use self::common::{Error, ErrorCategory, ErrorCode, ErrorKind, Result, names_match};
pub use self::constraint::Constraint;
pub use self::distribution::Distribution;
pub use self::idd::{ClassDef, FieldDef, FieldKind, Idd};
pub use self::idf::{IdfFile, Record, ValidationIssue};
pub use self::interval::{Bounds, IntervalSet};
pub use self::options::SearchOptions;
pub use self::results::{Cell, ResultsTable};
pub use self::variable::{VarType, Variable, VariableRow, VariableSet};
