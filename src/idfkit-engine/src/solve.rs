// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Derive the set of values one variable may take so that a constraint
//! holds, with every other variable held fixed.
//!
//! Comparisons whose sides are linear in the variable are solved
//! exactly, so `A + B < C` gives `A < C - B` with an open upper end.
//! `and`, `or` and `not` become intersection, union and complement.
//! Anything else is scanned numerically over the variable's own bounds,
//! with the edges of each feasible run refined by bisection.

use tracing::warn;

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::common::Result;
use crate::interval::{Bounds, IntervalSet};
use crate::options::SearchOptions;

pub(crate) struct Solver<'a, F> {
    var: &'a str,
    lookup: &'a F,
    // the variable's own (finite, closed) range; used by the scan
    own: Bounds,
    options: &'a SearchOptions,
}

impl<'a, F> Solver<'a, F>
where
    F: Fn(&str) -> Option<f64>,
{
    pub(crate) fn new(var: &'a str, lookup: &'a F, own: Bounds, options: &'a SearchOptions) -> Self {
        Solver {
            var,
            lookup,
            own,
            options,
        }
    }

    /// All values of the variable, within its own bounds, for which
    /// every expression holds.
    pub(crate) fn solve<'e, I>(&self, exprs: I) -> Result<IntervalSet>
    where
        I: IntoIterator<Item = &'e Expr>,
    {
        let mut set = IntervalSet::from(self.own);
        for expr in exprs {
            set = set.intersect(&self.feasible_set(expr)?);
            if set.is_empty() {
                break;
            }
        }
        Ok(set)
    }

    fn eval_with(&self, expr: &Expr, x: f64) -> Result<f64> {
        let var = self.var;
        let lookup = self.lookup;
        expr.eval(&|name: &str| if name == var { Some(x) } else { lookup(name) })
    }

    pub(crate) fn feasible_set(&self, expr: &Expr) -> Result<IntervalSet> {
        if !expr.references(self.var) {
            let holds = expr.eval(self.lookup)? != 0.0;
            return Ok(if holds {
                IntervalSet::all()
            } else {
                IntervalSet::empty()
            });
        }

        match expr {
            Expr::Op2(BinaryOp::And, l, r, _) => {
                Ok(self.feasible_set(l)?.intersect(&self.feasible_set(r)?))
            }
            Expr::Op2(BinaryOp::Or, l, r, _) => {
                Ok(self.feasible_set(l)?.union(&self.feasible_set(r)?))
            }
            Expr::Op1(UnaryOp::Not, r, _) => Ok(self.feasible_set(r)?.complement()),
            Expr::Op2(op, l, r, _) if op.is_comparison() => {
                match (self.linear(l)?, self.linear(r)?) {
                    (Some(l), Some(r)) => Ok(relation(*op, l, r)),
                    _ => self.scan(expr),
                }
            }
            _ => self.scan(expr),
        }
    }

    /// Express `expr` as `a*x + b`, if it is linear in the variable.
    fn linear(&self, expr: &Expr) -> Result<Option<(f64, f64)>> {
        if !expr.references(self.var) {
            return Ok(Some((0.0, expr.eval(self.lookup)?)));
        }

        let linear = match expr {
            Expr::Var(_, _) => Some((1.0, 0.0)),
            Expr::Op1(UnaryOp::Positive, r, _) => self.linear(r)?,
            Expr::Op1(UnaryOp::Negative, r, _) => self.linear(r)?.map(|(a, b)| (-a, -b)),
            Expr::Op2(op, l, r, _) => match (self.linear(l)?, self.linear(r)?) {
                (Some((a1, b1)), Some((a2, b2))) => match op {
                    BinaryOp::Add => Some((a1 + a2, b1 + b2)),
                    BinaryOp::Sub => Some((a1 - a2, b1 - b2)),
                    BinaryOp::Mul if a1 == 0.0 => Some((a2 * b1, b2 * b1)),
                    BinaryOp::Mul if a2 == 0.0 => Some((a1 * b2, b1 * b2)),
                    BinaryOp::Div if a2 == 0.0 && b2 != 0.0 => Some((a1 / b2, b1 / b2)),
                    _ => None,
                },
                _ => None,
            },
            _ => None,
        };

        Ok(linear.filter(|(a, b)| a.is_finite() && b.is_finite()))
    }

    fn scan(&self, expr: &Expr) -> Result<IntervalSet> {
        let Bounds { min, max, .. } = self.own;
        let n = if min == max {
            1
        } else {
            self.options.boundary_samples.max(2)
        };
        warn!(
            "{expr} is not linear in {}; scanning {n} samples over {}",
            self.var, self.own
        );

        let holds = |x: f64| -> Result<bool> { Ok(self.eval_with(expr, x)? != 0.0) };
        let sample = |i: usize| {
            if n == 1 {
                min
            } else {
                min + (max - min) * (i as f64) / ((n - 1) as f64)
            }
        };
        // bisect between a feasible and an infeasible point, returning
        // the feasible end
        let edge = |mut inside: f64, mut outside: f64| -> Result<f64> {
            for _ in 0..self.options.bisection_steps {
                let mid = inside + (outside - inside) / 2.0;
                if holds(mid)? {
                    inside = mid;
                } else {
                    outside = mid;
                }
            }
            Ok(inside)
        };

        let mut parts = vec![];
        let mut run_start: Option<f64> = None;
        let mut prev = min;
        for i in 0..n {
            let x = sample(i);
            let ok = holds(x)?;
            match (run_start, ok) {
                (None, true) => {
                    run_start = Some(if i == 0 { x } else { edge(x, prev)? });
                }
                (Some(start), false) => {
                    parts.push(Bounds::closed(start, edge(prev, x)?));
                    run_start = None;
                }
                _ => {}
            }
            prev = x;
        }
        if let Some(start) = run_start {
            parts.push(Bounds::closed(start, max));
        }

        Ok(IntervalSet::from_parts(parts))
    }
}

/// Solve `aL*x + bL  op  aR*x + bR` for x.
fn relation(op: BinaryOp, (al, bl): (f64, f64), (ar, br): (f64, f64)) -> IntervalSet {
    let coef = al - ar;
    let rhs = br - bl;
    if coef == 0.0 {
        return if op.compare(0.0, rhs) {
            IntervalSet::all()
        } else {
            IntervalSet::empty()
        };
    }

    let p = rhs / coef;
    let op = if coef < 0.0 { op.flipped() } else { op };
    let bounds = match op {
        BinaryOp::Lt => Bounds::below(p, false),
        BinaryOp::Lte => Bounds::below(p, true),
        BinaryOp::Gt => Bounds::above(p, false),
        BinaryOp::Gte => Bounds::above(p, true),
        BinaryOp::Eq => Bounds::point(p),
        BinaryOp::Neq => return IntervalSet::from(Bounds::point(p)).complement(),
        _ => return IntervalSet::empty(),
    };
    IntervalSet::from(bounds)
}
