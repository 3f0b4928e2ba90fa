// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

#![forbid(unsafe_code)]

pub mod common;
pub mod results;

pub use common::{
    EquationError, EquationResult, Error, ErrorCategory, ErrorCode, ErrorKind, Result,
};
pub use results::{Cell, ResultsTable, Row};
