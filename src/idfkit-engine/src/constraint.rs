// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::HashMap;
use std::fmt;

use crate::ast::Expr;
use crate::common::{Error, Result};
use crate::constraint_err;
use crate::parser;

/// A parsed relational expression over design variables, such as
/// `G002 + 3 < G003 / 2 + 1.4`.
#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    expression: String,
    variables: Vec<String>,
    expr: Expr,
}

impl Constraint {
    pub fn new(expression: &str) -> Result<Constraint> {
        let expr = parser::parse(expression).map_err(|err| Error::from_equation(err, expression))?;

        let mut refs = vec![];
        expr.collect_vars(&mut refs);
        let mut variables: Vec<String> = Vec::with_capacity(refs.len());
        for name in refs {
            if !variables.iter().any(|v| v == name) {
                variables.push(name.to_owned());
            }
        }

        Ok(Constraint {
            expression: expression.to_owned(),
            variables,
            expr,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Referenced variable names, each once, in order of first use.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn references(&self, name: &str) -> bool {
        self.variables.iter().any(|v| v == name)
    }

    pub(crate) fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn evaluate(&self, values: &HashMap<String, f64>) -> Result<bool> {
        self.evaluate_with(|name| values.get(name).copied())
    }

    /// Evaluate with an arbitrary variable lookup.  Every referenced
    /// variable must resolve, even ones a short-circuit would skip.
    pub fn evaluate_with<F>(&self, lookup: F) -> Result<bool>
    where
        F: Fn(&str) -> Option<f64>,
    {
        if let Some(missing) = self.variables.iter().find(|v| lookup(v.as_str()).is_none()) {
            return constraint_err!(
                UnboundVariable,
                format!("{} in {:?}", missing, self.expression)
            );
        }
        Ok(self.expr.eval(&lookup)? != 0.0)
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.expression)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{ErrorCode, ErrorKind};

    fn values(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn variables_in_first_seen_order() {
        let c = Constraint::new("G004 < G003 + 3.8 and G004 > G001 - G003").unwrap();
        assert_eq!(vec!["G004", "G003", "G001"], c.variables());
        assert_eq!("G004 < G003 + 3.8 and G004 > G001 - G003", c.expression());
        assert!(c.references("G001"));
        assert!(!c.references("G002"));
    }

    #[test]
    fn evaluate() {
        let c = Constraint::new("G002 + 3 < G003 / 2 + 1.4").unwrap();
        assert!(c.evaluate(&values(&[("G002", 10.0), ("G003", 30.0)])).unwrap());
        assert!(!c.evaluate(&values(&[("G002", 10.0), ("G003", 3.0)])).unwrap());
        // extra entries are ignored
        assert!(
            c.evaluate(&values(&[("G002", 1.0), ("G003", 30.0), ("G009", 0.0)]))
                .unwrap()
        );

        let c = Constraint::new("15 <= G003 <= 39 and not G003 == 20").unwrap();
        assert!(c.evaluate(&values(&[("G003", 30.0)])).unwrap());
        assert!(!c.evaluate(&values(&[("G003", 20.0)])).unwrap());
        assert!(!c.evaluate(&values(&[("G003", 40.0)])).unwrap());

        let c = Constraint::new("A ** 2 + B ^ 2 <= 25 || A % 2 == 1").unwrap();
        assert!(c.evaluate(&values(&[("A", 3.0), ("B", 4.0)])).unwrap());
        assert!(c.evaluate(&values(&[("A", 7.0), ("B", 0.0)])).unwrap());
        assert!(!c.evaluate(&values(&[("A", 6.0), ("B", 0.0)])).unwrap());

        let c = Constraint::new("sqrt(abs(A)) > min(B, 3, 4)").unwrap();
        assert!(c.evaluate(&values(&[("A", -16.0), ("B", 5.0)])).unwrap());
    }

    #[test]
    fn unbound_variables() {
        let c = Constraint::new("A < 1 or B < 1").unwrap();
        let err = c.evaluate(&values(&[("A", 0.0)])).unwrap_err();
        assert_eq!(ErrorCode::UnboundVariable, err.code);
        assert_eq!(ErrorKind::Constraint, err.kind);
        assert!(err.is_lookup_error());
    }

    #[test]
    fn syntax_errors_are_value_errors() {
        for bad in ["", "G001 +", "G001 + G002", "G001 < < 2", "foo(G001) < 1"] {
            let err = Constraint::new(bad).unwrap_err();
            assert!(err.is_value_error(), "{bad:?}: {err}");
            assert_eq!(ErrorKind::Constraint, err.kind);
        }
    }
}
