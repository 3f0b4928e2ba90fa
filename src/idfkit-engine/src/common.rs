// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

// Re-export all common types from idfkit-core
pub use idfkit_core::common::*;

// Macros for error creation - these need to stay in idfkit-engine
// as they use crate-local paths

#[macro_export]
macro_rules! idd_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Schema, ErrorCode::$code, Some($str)))
    }};
}

#[macro_export]
macro_rules! idf_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Document, ErrorCode::$code, Some($str)))
    }};
}

#[macro_export]
macro_rules! constraint_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Constraint, ErrorCode::$code, Some($str)))
    }};
}

#[macro_export]
macro_rules! var_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Variable, ErrorCode::$code, Some($str)))
    }};
}

#[macro_export]
macro_rules! cand_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Candidate, ErrorCode::$code, Some($str)))
    }};
}

/// Compare two names the way EnergyPlus does: ASCII case-insensitively,
/// ignoring surrounding whitespace.
pub fn names_match(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

pub(crate) fn name_key(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

#[test]
fn test_names_match() {
    assert!(names_match("Schedule:Compact", "SCHEDULE:COMPACT"));
    assert!(names_match(" Material", "material "));
    assert!(!names_match("Material", "Material:NoMass"));
    assert_eq!("material:nomass", name_key(" Material:NoMass"));
}
