// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;
use std::{error, result};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NoError, // will never be produced
    Generic,
    Io,
    // lookups
    UnknownClass,
    UnknownField,
    UnknownGroup,
    UnboundVariable,
    IndexOutOfRange,
    // malformed input
    BadNumber,
    BadBounds,
    BadType,
    BadDistribution,
    BadRow,
    BadFieldValue,
    UnterminatedRecord,
    InvalidToken,
    UnrecognizedEof,
    UnrecognizedToken,
    ExtraToken,
    UnknownBuiltin,
    BadBuiltinArgs,
    DuplicateClass,
    UnexpectedField,
    EmptyExpression,
    NotBoolean,
    // record matching
    NoMatch,
    AmbiguousMatch,
    // candidate search
    Infeasible,
    NoFeasibleValue,
    // validation findings
    MissingRequiredField,
    OutOfRange,
    InvalidChoice,
    TooFewFields,
}

/// The broad family an `ErrorCode` belongs to, independent of where
/// the error was raised.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// an unknown class, field, group or variable was referenced
    Lookup,
    /// input text or a value could not be interpreted
    Value,
    /// a record key matched zero or several records
    Match,
    /// no value satisfying bounds and constraints could be found
    Search,
    Io,
    Other,
}

impl ErrorCode {
    pub fn category(self) -> ErrorCategory {
        use ErrorCode::*;
        match self {
            UnknownClass | UnknownField | UnknownGroup | UnboundVariable | IndexOutOfRange => {
                ErrorCategory::Lookup
            }
            BadNumber | BadBounds | BadType | BadDistribution | BadRow | BadFieldValue
            | UnterminatedRecord | InvalidToken | UnrecognizedEof | UnrecognizedToken
            | ExtraToken | UnknownBuiltin | BadBuiltinArgs | DuplicateClass | UnexpectedField
            | EmptyExpression | NotBoolean | MissingRequiredField | OutOfRange | InvalidChoice
            | TooFewFields => ErrorCategory::Value,
            NoMatch | AmbiguousMatch => ErrorCategory::Match,
            Infeasible | NoFeasibleValue => ErrorCategory::Search,
            Io => ErrorCategory::Io,
            NoError | Generic => ErrorCategory::Other,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ErrorCode::*;
        let name = match self {
            NoError => "no_error",
            Generic => "generic",
            Io => "io",
            UnknownClass => "unknown_class",
            UnknownField => "unknown_field",
            UnknownGroup => "unknown_group",
            UnboundVariable => "unbound_variable",
            IndexOutOfRange => "index_out_of_range",
            BadNumber => "bad_number",
            BadBounds => "bad_bounds",
            BadType => "bad_type",
            BadDistribution => "bad_distribution",
            BadRow => "bad_row",
            BadFieldValue => "bad_field_value",
            UnterminatedRecord => "unterminated_record",
            InvalidToken => "invalid_token",
            UnrecognizedEof => "unrecognized_eof",
            UnrecognizedToken => "unrecognized_token",
            ExtraToken => "extra_token",
            UnknownBuiltin => "unknown_builtin",
            BadBuiltinArgs => "bad_builtin_args",
            DuplicateClass => "duplicate_class",
            UnexpectedField => "unexpected_field",
            EmptyExpression => "empty_expression",
            NotBoolean => "not_boolean",
            NoMatch => "no_match",
            AmbiguousMatch => "ambiguous_match",
            Infeasible => "infeasible",
            NoFeasibleValue => "no_feasible_value",
            MissingRequiredField => "missing_required_field",
            OutOfRange => "out_of_range",
            InvalidChoice => "invalid_choice",
            TooFewFields => "too_few_fields",
        };

        write!(f, "{name}")
    }
}

/// A parse error located by byte offsets into the expression source.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EquationError {
    pub start: usize,
    pub end: usize,
    pub code: ErrorCode,
}

impl fmt::Display for EquationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.start, self.end, self.code)
    }
}

impl From<Error> for EquationError {
    fn from(err: Error) -> Self {
        EquationError {
            code: err.code,
            start: 0,
            end: 0,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Schema,
    Document,
    Constraint,
    Variable,
    Candidate,
    Results,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub code: ErrorCode,
    pub details: Option<String>,
}

impl Error {
    pub fn new(kind: ErrorKind, code: ErrorCode, details: Option<String>) -> Self {
        Error {
            kind,
            code,
            details,
        }
    }

    pub fn get_details(&self) -> Option<String> {
        self.details.clone()
    }

    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    pub fn is_lookup_error(&self) -> bool {
        self.category() == ErrorCategory::Lookup
    }

    pub fn is_value_error(&self) -> bool {
        self.category() == ErrorCategory::Value
    }

    /// Constraint expressions report spans; attach the source so the
    /// message is useful on its own.
    pub fn from_equation(err: EquationError, source: &str) -> Self {
        let fragment = source.get(err.start..err.end).unwrap_or("");
        Error {
            kind: ErrorKind::Constraint,
            code: err.code,
            details: Some(format!("{source:?} at {}..{} ({fragment:?})", err.start, err.end)),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self.kind {
            ErrorKind::Schema => "SchemaError",
            ErrorKind::Document => "DocumentError",
            ErrorKind::Constraint => "ConstraintError",
            ErrorKind::Variable => "VariableError",
            ErrorKind::Candidate => "CandidateError",
            ErrorKind::Results => "ResultsError",
        };
        match self.details {
            Some(ref details) => write!(f, "{}{{{}: {}}}", kind, self.code, details),
            None => write!(f, "{}{{{}}}", kind, self.code),
        }
    }
}

impl error::Error for Error {}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        let code = if err.is_io_error() {
            ErrorCode::Io
        } else {
            ErrorCode::BadRow
        };
        Error {
            kind: ErrorKind::Results,
            code,
            details: Some(err.to_string()),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            kind: ErrorKind::Document,
            code: ErrorCode::Io,
            details: Some(err.to_string()),
        }
    }
}

pub type Result<T> = result::Result<T, Error>;
pub type EquationResult<T> = result::Result<T, EquationError>;

#[test]
fn test_error_display() {
    let err = Error::new(
        ErrorKind::Document,
        ErrorCode::NoMatch,
        Some("Material/Insulation".to_owned()),
    );
    assert_eq!("DocumentError{no_match: Material/Insulation}", format!("{err}"));

    let err = Error::new(ErrorKind::Candidate, ErrorCode::Infeasible, None);
    assert_eq!("CandidateError{infeasible}", format!("{err}"));
}

#[test]
fn test_error_categories() {
    assert_eq!(ErrorCategory::Lookup, ErrorCode::UnknownGroup.category());
    assert_eq!(ErrorCategory::Lookup, ErrorCode::UnboundVariable.category());
    assert_eq!(ErrorCategory::Value, ErrorCode::BadNumber.category());
    assert_eq!(ErrorCategory::Value, ErrorCode::UnrecognizedToken.category());
    assert_eq!(ErrorCategory::Match, ErrorCode::AmbiguousMatch.category());
    assert_eq!(ErrorCategory::Search, ErrorCode::NoFeasibleValue.category());

    let err = Error::new(ErrorKind::Schema, ErrorCode::UnknownClass, None);
    assert!(err.is_lookup_error());
    assert!(!err.is_value_error());
}

#[test]
fn test_equation_error_context() {
    let err = EquationError {
        start: 4,
        end: 5,
        code: ErrorCode::UnrecognizedToken,
    };
    let err = Error::from_equation(err, "A + ) < B");
    assert_eq!(ErrorKind::Constraint, err.kind);
    assert!(err.get_details().unwrap().contains("\")\""));
}
