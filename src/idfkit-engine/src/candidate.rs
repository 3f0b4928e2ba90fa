// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::cmp::Reverse;
use std::collections::HashMap;

use ordered_float::OrderedFloat;
use rand::Rng;
use tracing::debug;

use crate::ast::Expr;
use crate::common::{ErrorCategory, Result};
use crate::constraint::Constraint;
use crate::idf::IdfFile;
use crate::interval::{Bounds, IntervalSet};
use crate::options::SearchOptions;
use crate::solve::Solver;
use crate::variable::{GroupIndex, Variable, VariableSet};
use crate::cand_err;

/// One concrete point in the design space: a value for every group of a
/// `VariableSet`.  A candidate owns copies of its variables and their
/// constraints, so changing it never touches the set it came from.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    variables: Vec<Variable>,
    groups: GroupIndex,
    options: SearchOptions,
}

impl Candidate {
    pub fn new(set: &VariableSet) -> Candidate {
        let (variables, groups) = set.parts();
        let mut candidate = Candidate {
            variables: variables.to_vec(),
            groups: groups.clone(),
            options: SearchOptions::default(),
        };
        // a group has a single value: the one from its first row
        for group in groups.names() {
            if let Ok(value) = candidate.get_value(group) {
                candidate.assign(group, value);
            }
        }
        candidate
    }

    pub fn with_options(mut self, options: SearchOptions) -> Candidate {
        self.options = options;
        self
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.names().iter().map(String::as_str)
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// The first variable of `group`, which carries the group's bounds,
    /// type and distribution.
    pub fn get_variable(&self, group: &str) -> Result<&Variable> {
        let members = self.groups.members(group)?;
        Ok(&self.variables[members[0]])
    }

    pub fn get_value(&self, group: &str) -> Result<f64> {
        Ok(self.get_variable(group)?.value)
    }

    /// Set the value of every variable in `group`.  Neither bounds nor
    /// constraints are checked.
    pub fn set_value(&mut self, group: &str, value: f64) -> Result<()> {
        self.groups.members(group)?;
        self.assign(group, value);
        Ok(())
    }

    fn assign(&mut self, group: &str, value: f64) {
        if let Ok(members) = self.groups.members(group) {
            for i in members.iter() {
                self.variables[*i].value = value;
            }
        }
    }

    /// The current value of every group, keyed by group name.
    pub fn values(&self) -> HashMap<String, f64> {
        self.groups
            .names()
            .iter()
            .filter_map(|g| Some((g.clone(), self.get_value(g).ok()?)))
            .collect()
    }

    /// The first constraint found among the group's variables.
    pub fn constraint(&self, group: &str) -> Result<Option<&Constraint>> {
        let members = self.groups.members(group)?;
        Ok(members
            .iter()
            .find_map(|i| self.variables[*i].constraint.as_ref()))
    }

    pub fn evaluate_constraint(&self, group: &str) -> Result<bool> {
        match self.constraint(group)? {
            Some(constraint) => constraint.evaluate(&self.values()),
            None => Ok(true),
        }
    }

    /// Groups ordered so that the ones most other constraints depend on
    /// come first, narrower ranges breaking ties.  Equal keys keep their
    /// first-seen order.
    pub fn get_constraint_order(&self) -> Vec<String> {
        let names = self.groups.names();
        let constraints: Vec<(&str, Option<&Constraint>)> = names
            .iter()
            .map(|g| (g.as_str(), self.constraint(g).ok().flatten()))
            .collect();

        let mut order: Vec<(usize, f64, &String)> = names
            .iter()
            .map(|g| {
                let dependents = constraints
                    .iter()
                    .filter(|(other, c)| *other != g && c.is_some_and(|c| c.references(g)))
                    .count();
                let range = self.get_variable(g).map(Variable::range).unwrap_or(0.0);
                (dependents, range, g)
            })
            .collect();
        order.sort_by_key(|(dependents, range, _)| (Reverse(*dependents), OrderedFloat(*range)));

        order.into_iter().map(|(_, _, g)| g.clone()).collect()
    }

    /// The part of the group's own range where its constraint holds, with
    /// every other group held at its current value.  When the feasible
    /// set has several pieces, the one holding the current value is
    /// returned, otherwise the widest.
    pub fn get_constrained_bounds(&self, group: &str) -> Result<Bounds> {
        let var = self.get_variable(group)?;
        let constraint = match self.constraint(group)? {
            Some(constraint) => constraint,
            None => return Ok(var.bounds()),
        };

        let feasible = self.feasible(group, [constraint.expr()])?;
        match feasible.component(var.value) {
            Some(bounds) => Ok(bounds),
            None => cand_err!(
                Infeasible,
                format!("{group}: {constraint} cannot hold within {}", var.bounds())
            ),
        }
    }

    fn feasible<'e, I>(&self, group: &str, exprs: I) -> Result<IntervalSet>
    where
        I: IntoIterator<Item = &'e Expr>,
    {
        let own = self.get_variable(group)?.bounds();
        let values = self.values();
        let lookup = |name: &str| values.get(name).copied();
        Solver::new(group, &lookup, own, &self.options).solve(exprs)
    }

    fn holds(&self, exprs: &[&Expr]) -> Result<bool> {
        let values = self.values();
        let lookup = |name: &str| values.get(name).copied();
        for expr in exprs.iter() {
            if expr.eval(&lookup)? == 0.0 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// A new candidate that differs from this one in every group, stays
    /// within every group's range, and satisfies every constraint.
    ///
    /// Groups are drawn in constraint order.  Each draw is bounded by the
    /// group's own constraint and by the constraints of groups already
    /// drawn that mention it.  When the piece of the feasible set holding
    /// the current value has nothing else to offer, the other pieces are
    /// tried.  A pass that runs out of feasible values is retried from
    /// scratch, up to `max_restarts` times.
    pub fn permutation<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Candidate> {
        let order = self.get_constraint_order();
        let passes = self.options.max_restarts.max(1);
        let mut last_err = None;
        for pass in 0..passes {
            match self.permutation_pass(rng, &order) {
                Ok(next) => return Ok(next),
                Err(err) if err.category() == ErrorCategory::Search => {
                    debug!("permutation pass {pass} failed: {err}");
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        match last_err {
            Some(err) => Err(err),
            None => cand_err!(NoFeasibleValue, "no permutation passes allowed".to_owned()),
        }
    }

    fn permutation_pass<R: Rng + ?Sized>(&self, rng: &mut R, order: &[String]) -> Result<Candidate> {
        let mut next = self.clone();
        for (i, group) in order.iter().enumerate() {
            let mut exprs: Vec<&Expr> = vec![];
            if let Some(c) = self.constraint(group)? {
                exprs.push(c.expr());
            }
            for fixed in order[..i].iter() {
                if let Some(c) = self.constraint(fixed)?
                    && c.references(group)
                {
                    exprs.push(c.expr());
                }
            }

            let var = self.get_variable(group)?;
            let current = var.value;
            let feasible = next.feasible(group, exprs.iter().copied())?;
            if feasible.is_empty() {
                return cand_err!(
                    Infeasible,
                    format!("{group}: no value in {} satisfies its constraints", var.bounds())
                );
            }

            let mut drawn = None;
            'pieces: for bounds in draw_order(rng, &feasible, current) {
                debug!("{group}: drawing from {bounds} ({})", var.distribution);
                for _ in 0..self.options.max_attempts {
                    let x = match var.distribution.draw(rng, &bounds, current, var.is_integer(), var.minimum) {
                        Some(x) => x,
                        None => break,
                    };
                    next.assign(group, x);
                    if next.holds(&exprs)? {
                        drawn = Some(x);
                        break 'pieces;
                    }
                }
            }
            match drawn {
                Some(x) => debug!("{group}: {current} -> {x}"),
                None => {
                    return cand_err!(
                        NoFeasibleValue,
                        format!("{group}: nothing in {feasible} other than {current}")
                    );
                }
            }
        }

        for group in order.iter() {
            if !next.evaluate_constraint(group)? {
                return cand_err!(NoFeasibleValue, format!("{group}: constraint fails after permutation"));
            }
        }
        Ok(next)
    }

    /// Write every variable's value into its field of `idf`.
    pub fn values_to_idf(&self, idf: &mut IdfFile) -> Result<()> {
        for var in self.variables.iter() {
            let value = var.formatted_value();
            let updated = idf.update(&var.class_name, &var.object_name, &var.field_name, &value)?;
            if updated == 0 {
                return cand_err!(
                    NoMatch,
                    format!(
                        "{}: no {} named {:?}",
                        var.group, var.class_name, var.object_name
                    )
                );
            }
        }
        Ok(())
    }
}

/// The pieces of `feasible` in the order a draw tries them: the piece
/// holding `current` (or the widest) first, then the others at random in
/// proportion to their width.
fn draw_order<R: Rng + ?Sized>(rng: &mut R, feasible: &IntervalSet, current: f64) -> Vec<Bounds> {
    let first = match feasible.component(current) {
        Some(first) => first,
        None => return vec![],
    };
    let mut rest: Vec<Bounds> = feasible
        .intervals()
        .iter()
        .filter(|b| **b != first)
        .copied()
        .collect();
    let mut order = vec![first];
    while !rest.is_empty() {
        let total: f64 = rest.iter().map(|b| b.width()).sum();
        let i = if total > 0.0 && total.is_finite() {
            let mut target = total * rng.random::<f64>();
            rest.iter()
                .position(|b| {
                    target -= b.width();
                    target < 0.0
                })
                .unwrap_or(rest.len() - 1)
        } else {
            rng.random_range(0..rest.len())
        };
        order.push(rest.swap_remove(i));
    }
    order
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::common::ErrorCode;

    const PARAMS: &str = "\
group,idfclass,idfobject,idffield,type,minimum,maximum,distribution,constraint,value
A,Material,Insulation,Thickness,float,0,10,uniform,A + B < C,1
B,Material,Insulation,Conductivity,float,0,5,,,2
C,Material,Insulation,Density,int,0,20,,C > B,10
";

    fn candidate() -> Candidate {
        Candidate::new(&VariableSet::from_reader(PARAMS.as_bytes()).unwrap())
    }

    #[test]
    fn values_and_constraints() {
        let mut c = candidate();
        assert_eq!(1.0, c.get_value("A").unwrap());
        assert!(c.evaluate_constraint("A").unwrap());
        assert!(c.evaluate_constraint("B").unwrap());

        c.set_value("A", 9.0).unwrap();
        assert!(!c.evaluate_constraint("A").unwrap());
        assert_eq!(ErrorCode::UnknownGroup, c.set_value("D", 1.0).unwrap_err().code);
        assert!(c.evaluate_constraint("D").unwrap_err().is_lookup_error());
    }

    #[test]
    fn order_counts_dependents() {
        // B is mentioned by two other groups, C by one
        assert_eq!(vec!["B", "C", "A"], candidate().get_constraint_order());
    }

    #[test]
    fn bounds() {
        let c = candidate();
        let a = c.get_constrained_bounds("A").unwrap();
        assert_eq!(Bounds { include_max: false, ..Bounds::closed(0.0, 8.0) }, a);
        assert_eq!(Bounds::closed(0.0, 5.0), c.get_constrained_bounds("B").unwrap());
        let cb = c.get_constrained_bounds("C").unwrap();
        assert_eq!(Bounds { include_min: false, ..Bounds::closed(2.0, 20.0) }, cb);

        let mut c = c;
        c.set_value("B", 4.0).unwrap();
        c.set_value("C", 3.0).unwrap();
        let err = c.get_constrained_bounds("A").unwrap_err();
        assert_eq!(ErrorCode::Infeasible, err.code);
    }

    #[test]
    fn permutation_respects_everything() {
        let source = candidate();
        let mut rng = StdRng::seed_from_u64(12345);
        for _ in 0..50 {
            let next = source.permutation(&mut rng).unwrap();
            for group in source.groups() {
                let var = next.get_variable(group).unwrap();
                assert_ne!(source.get_value(group).unwrap(), var.value, "{group}");
                assert!(var.minimum <= var.value && var.value <= var.maximum);
                assert!(next.evaluate_constraint(group).unwrap(), "{group}");
            }
            assert_eq!(next.get_value("C").unwrap(), next.get_value("C").unwrap().round());
        }
        // the source is untouched
        assert_eq!(candidate(), source);
    }

    #[test]
    fn infeasible_permutation() {
        let csv = "group,idfclass,idfobject,idffield,type,minimum,maximum,distribution,constraint,value\n\
                   A,Material,Insulation,Thickness,int,0,1,,A > 5,0\n";
        let c = Candidate::new(&VariableSet::from_reader(csv.as_bytes()).unwrap()).with_options(SearchOptions {
            max_restarts: 2,
            ..SearchOptions::default()
        });
        let mut rng = StdRng::seed_from_u64(1);
        let err = c.permutation(&mut rng).unwrap_err();
        assert_eq!(ErrorCode::Infeasible, err.code);
        assert_eq!(ErrorCategory::Search, err.category());

        // a single admissible value that is already taken
        let csv = "group,idfclass,idfobject,idffield,type,minimum,maximum,distribution,constraint,value\n\
                   A,Material,Insulation,Thickness,int,3,3,,,3\n";
        let c = Candidate::new(&VariableSet::from_reader(csv.as_bytes()).unwrap());
        let err = c.permutation(&mut rng).unwrap_err();
        assert_eq!(ErrorCode::NoFeasibleValue, err.code);
    }

    #[test]
    fn permutation_leaves_an_exhausted_piece() {
        let csv = "group,idfclass,idfobject,idffield,type,minimum,maximum,distribution,constraint,value\n\
                   A,Material,Insulation,Thickness,int,0,10,,A < 1 or A > 5,0\n";
        let c = Candidate::new(&VariableSet::from_reader(csv.as_bytes()).unwrap());
        // the piece holding the current value holds nothing else
        assert_eq!(
            Bounds { include_max: false, ..Bounds::closed(0.0, 1.0) },
            c.get_constrained_bounds("A").unwrap()
        );

        let mut rng = StdRng::seed_from_u64(12345);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            let next = c.permutation(&mut rng).unwrap();
            let a = next.get_value("A").unwrap();
            assert!((6.0..=10.0).contains(&a), "{a}");
            assert!(next.evaluate_constraint("A").unwrap());
            seen.insert(a as i64);
        }
        assert_eq!(5, seen.len());

        // continuous pieces are drawn in proportion to their width
        let csv = "group,idfclass,idfobject,idffield,type,minimum,maximum,distribution,constraint,value\n\
                   A,Material,Insulation,Thickness,float,0,10,step:1,A <= 0 or A >= 2,0\n";
        let c = Candidate::new(&VariableSet::from_reader(csv.as_bytes()).unwrap());
        for _ in 0..50 {
            let a = c.permutation(&mut rng).unwrap().get_value("A").unwrap();
            assert!((2.0..=10.0).contains(&a), "{a}");
        }
    }

    #[test]
    fn permutation_over_the_widest_integer_range() {
        let csv = "group,idfclass,idfobject,idffield,type,minimum,maximum,distribution,constraint,value\n\
                   A,Material,Insulation,Density,int,-9007199254740992,9007199254740992,,,\n\
                   B,Material,Insulation,Specific Heat,int,-9007199254740992,9007199254740992,triangular,B > A,\n";
        let c = Candidate::new(&VariableSet::from_reader(csv.as_bytes()).unwrap());
        assert_eq!(0.0, c.get_value("A").unwrap());
        let mut rng = StdRng::seed_from_u64(12345);
        for _ in 0..50 {
            let next = c.permutation(&mut rng).unwrap();
            for group in ["A", "B"] {
                let x = next.get_value(group).unwrap();
                assert_eq!(x, x.round(), "{group}");
                assert_ne!(0.0, x, "{group}");
            }
            assert!(next.evaluate_constraint("B").unwrap());
        }
    }

    #[test]
    fn group_members_share_a_value() {
        let csv = "group,idfclass,idfobject,idffield,type,minimum,maximum,distribution,constraint,value\n\
                   G,Schedule:Compact,S,Field 4,int,15,39,,,30\n\
                   G,Schedule:Compact,S,Field 9,int,15,39,,,31\n";
        let set = VariableSet::from_reader(csv.as_bytes()).unwrap();
        let mut c = Candidate::new(&set);
        assert!(c.variables().iter().all(|v| v.value == 30.0));
        c.set_value("G", 3.0).unwrap();
        assert!(c.variables().iter().all(|v| v.value == 3.0));
        assert_eq!(31.0, set[1].value);
    }
}
