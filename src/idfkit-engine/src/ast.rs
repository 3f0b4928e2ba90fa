// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;

use crate::common::Result;
use crate::constraint_err;

#[derive(PartialEq, Eq, Clone, Copy, Debug, Default)]
pub struct Loc {
    pub start: usize,
    pub end: usize,
}

impl Loc {
    pub fn new(start: usize, end: usize) -> Self {
        Loc { start, end }
    }

    pub fn union(&self, rhs: &Self) -> Self {
        Loc {
            start: self.start.min(rhs.start),
            end: self.end.max(rhs.end),
        }
    }
}

#[test]
fn test_loc_basics() {
    let a = Loc { start: 3, end: 7 };
    assert_eq!(a, Loc::new(3, 7));

    let b = Loc { start: 4, end: 11 };
    assert_eq!(Loc::new(3, 11), a.union(&b));

    let c = Loc { start: 1, end: 5 };
    assert_eq!(Loc::new(1, 7), a.union(&c));
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum BinaryOp {
    Add,
    Sub,
    Exp,
    Mul,
    Div,
    Mod,
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Neq,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        use BinaryOp::*;
        matches!(self, Gt | Gte | Lt | Lte | Eq | Neq)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    /// The comparison that holds after multiplying both sides by a
    /// negative number.
    pub fn flipped(self) -> Self {
        use BinaryOp::*;
        match self {
            Gt => Lt,
            Gte => Lte,
            Lt => Gt,
            Lte => Gte,
            op => op,
        }
    }

    pub fn compare(self, l: f64, r: f64) -> bool {
        use BinaryOp::*;
        match self {
            Gt => l > r,
            Gte => l >= r,
            Lt => l < r,
            Lte => l <= r,
            Eq => l == r,
            Neq => l != r,
            _ => false,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use BinaryOp::*;
        let op = match self {
            Add => "+",
            Sub => "-",
            Exp => "**",
            Mul => "*",
            Div => "/",
            Mod => "%",
            Gt => ">",
            Gte => ">=",
            Lt => "<",
            Lte => "<=",
            Eq => "==",
            Neq => "!=",
            And => "and",
            Or => "or",
        };
        write!(f, "{op}")
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum UnaryOp {
    Positive,
    Negative,
    Not,
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Builtin {
    Abs,
    Min,
    Max,
    Sqrt,
    Exp,
    Log,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Builtin> {
        let builtin = match name {
            "abs" => Builtin::Abs,
            "min" => Builtin::Min,
            "max" => Builtin::Max,
            "sqrt" => Builtin::Sqrt,
            "exp" => Builtin::Exp,
            "log" => Builtin::Log,
            _ => return None,
        };
        Some(builtin)
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Abs => "abs",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Sqrt => "sqrt",
            Builtin::Exp => "exp",
            Builtin::Log => "log",
        }
    }

    /// min and max are variadic (at least one argument), the rest unary
    pub fn accepts(self, argc: usize) -> bool {
        match self {
            Builtin::Min | Builtin::Max => argc >= 1,
            _ => argc == 1,
        }
    }

    fn apply(self, args: &[f64]) -> f64 {
        match self {
            Builtin::Abs => args[0].abs(),
            Builtin::Sqrt => args[0].sqrt(),
            Builtin::Exp => args[0].exp(),
            Builtin::Log => args[0].ln(),
            Builtin::Min => args.iter().copied().fold(f64::INFINITY, f64::min),
            Builtin::Max => args.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

// we use Boxs here because we may walk ASTs a number of times while
// deriving bounds, and we want to avoid copying subexpressions.
#[derive(PartialEq, Clone, Debug)]
pub enum Expr {
    Const(String, f64, Loc),
    Var(String, Loc),
    App(Builtin, Vec<Expr>, Loc),
    Op1(UnaryOp, Box<Expr>, Loc),
    Op2(BinaryOp, Box<Expr>, Box<Expr>, Loc),
}

impl Expr {
    pub fn get_loc(&self) -> Loc {
        match self {
            Expr::Const(_, _, loc) => *loc,
            Expr::Var(_, loc) => *loc,
            Expr::App(_, _, loc) => *loc,
            Expr::Op1(_, _, loc) => *loc,
            Expr::Op2(_, _, _, loc) => *loc,
        }
    }

    #[cfg(test)]
    pub(crate) fn strip_loc(self) -> Self {
        let loc = Loc::default();
        match self {
            Expr::Const(s, n, _loc) => Expr::Const(s, n, loc),
            Expr::Var(v, _loc) => Expr::Var(v, loc),
            Expr::App(builtin, args, _loc) => Expr::App(
                builtin,
                args.into_iter().map(|arg| arg.strip_loc()).collect(),
                loc,
            ),
            Expr::Op1(op, r, _loc) => Expr::Op1(op, Box::new(r.strip_loc()), loc),
            Expr::Op2(op, l, r, _loc) => {
                Expr::Op2(op, Box::new(l.strip_loc()), Box::new(r.strip_loc()), loc)
            }
        }
    }

    /// Whether this expression yields a truth value rather than a
    /// quantity.
    pub fn is_boolean(&self) -> bool {
        match self {
            Expr::Op1(UnaryOp::Not, _, _) => true,
            Expr::Op2(op, _, _, _) => op.is_comparison() || op.is_logical(),
            _ => false,
        }
    }

    /// Whether `ident` occurs anywhere in this expression.
    pub fn references(&self, ident: &str) -> bool {
        match self {
            Expr::Const(..) => false,
            Expr::Var(v, _) => v == ident,
            Expr::App(_, args, _) => args.iter().any(|arg| arg.references(ident)),
            Expr::Op1(_, r, _) => r.references(ident),
            Expr::Op2(_, l, r, _) => l.references(ident) || r.references(ident),
        }
    }

    /// Append every variable name in source order, duplicates included.
    pub fn collect_vars<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Const(..) => {}
            Expr::Var(v, _) => out.push(v),
            Expr::App(_, args, _) => args.iter().for_each(|arg| arg.collect_vars(out)),
            Expr::Op1(_, r, _) => r.collect_vars(out),
            Expr::Op2(_, l, r, _) => {
                l.collect_vars(out);
                r.collect_vars(out);
            }
        }
    }

    /// Evaluate with `lookup` resolving variables.  Truth values are
    /// 1.0 and 0.0, and any non-zero quantity is true.
    pub fn eval<F>(&self, lookup: &F) -> Result<f64>
    where
        F: Fn(&str) -> Option<f64>,
    {
        let value = match self {
            Expr::Const(_, n, _) => *n,
            Expr::Var(v, _) => match lookup(v) {
                Some(n) => n,
                None => return constraint_err!(UnboundVariable, v.clone()),
            },
            Expr::App(builtin, args, _) => {
                let args = args
                    .iter()
                    .map(|arg| arg.eval(lookup))
                    .collect::<Result<Vec<f64>>>()?;
                builtin.apply(&args)
            }
            Expr::Op1(op, r, _) => {
                let r = r.eval(lookup)?;
                match op {
                    UnaryOp::Positive => r,
                    UnaryOp::Negative => -r,
                    UnaryOp::Not => truth(r == 0.0),
                }
            }
            Expr::Op2(op, l, r, _) => {
                let l = l.eval(lookup)?;
                let r = r.eval(lookup)?;
                match op {
                    BinaryOp::Add => l + r,
                    BinaryOp::Sub => l - r,
                    BinaryOp::Exp => l.powf(r),
                    BinaryOp::Mul => l * r,
                    BinaryOp::Div => l / r,
                    // floored, so the sign follows the divisor
                    BinaryOp::Mod => l - r * (l / r).floor(),
                    BinaryOp::And => truth(l != 0.0 && r != 0.0),
                    BinaryOp::Or => truth(l != 0.0 || r != 0.0),
                    op => truth(op.compare(l, r)),
                }
            }
        };
        Ok(value)
    }
}

fn truth(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expr::Const(s, _, _) => write!(f, "{s}"),
            Expr::Var(v, _) => write!(f, "{v}"),
            Expr::App(builtin, args, _) => {
                write!(f, "{}(", builtin.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Expr::Op1(UnaryOp::Positive, r, _) => write!(f, "+{r}"),
            Expr::Op1(UnaryOp::Negative, r, _) => write!(f, "-{r}"),
            Expr::Op1(UnaryOp::Not, r, _) => write!(f, "not {r}"),
            Expr::Op2(op, l, r, _) => write!(f, "({l} {op} {r})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Box<Expr> {
        Box::new(Expr::Var(name.to_owned(), Loc::default()))
    }

    fn num(n: f64) -> Box<Expr> {
        Box::new(Expr::Const(n.to_string(), n, Loc::default()))
    }

    #[test]
    fn eval_arithmetic() {
        let expr = Expr::Op2(
            BinaryOp::Mod,
            Box::new(Expr::Op2(BinaryOp::Sub, var("A"), num(7.0), Loc::default())),
            num(3.0),
            Loc::default(),
        );
        let lookup = |name: &str| if name == "A" { Some(2.0) } else { None };
        assert_eq!(1.0, expr.eval(&lookup).unwrap());
        assert!(!expr.is_boolean());
        assert!(expr.references("A"));
        assert!(!expr.references("B"));

        let err = Expr::Var("B".to_owned(), Loc::default())
            .eval(&lookup)
            .unwrap_err();
        assert!(err.is_lookup_error());
    }

    #[test]
    fn eval_logic() {
        let lt = Expr::Op2(BinaryOp::Lt, var("A"), num(3.0), Loc::default());
        let not = Expr::Op1(UnaryOp::Not, Box::new(lt.clone()), Loc::default());
        let lookup = |_: &str| Some(2.0);
        assert_eq!(1.0, lt.eval(&lookup).unwrap());
        assert_eq!(0.0, not.eval(&lookup).unwrap());
        assert!(not.is_boolean());
        assert_eq!("not (A < 3)", not.to_string());
    }

    #[test]
    fn builtins() {
        assert_eq!(Some(Builtin::Max), Builtin::from_name("max"));
        assert_eq!(None, Builtin::from_name("MAX"));
        assert!(Builtin::Min.accepts(3));
        assert!(!Builtin::Sqrt.accepts(2));
        assert_eq!(1.0, Builtin::Min.apply(&[3.0, 1.0, 2.0]));
    }
}
