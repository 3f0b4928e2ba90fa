// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Intervals over the real line with open or closed endpoints, and
//! finite unions of them.

use std::cmp::Ordering;
use std::fmt;

/// A single interval.  Either endpoint may be infinite, in which case
/// its inclusivity flag is false.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
    pub include_min: bool,
    pub include_max: bool,
}

impl Bounds {
    pub fn closed(min: f64, max: f64) -> Self {
        Bounds {
            min,
            max,
            include_min: true,
            include_max: true,
        }
    }

    pub fn point(x: f64) -> Self {
        Bounds::closed(x, x)
    }

    pub fn all() -> Self {
        Bounds {
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            include_min: false,
            include_max: false,
        }
    }

    pub fn below(x: f64, inclusive: bool) -> Self {
        Bounds {
            max: x,
            include_max: inclusive,
            ..Bounds::all()
        }
    }

    pub fn above(x: f64, inclusive: bool) -> Self {
        Bounds {
            min: x,
            include_min: inclusive,
            ..Bounds::all()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_nan()
            || self.max.is_nan()
            || self.min > self.max
            || (self.min == self.max && !(self.include_min && self.include_max))
    }

    pub fn contains(&self, x: f64) -> bool {
        let above = if self.include_min {
            x >= self.min
        } else {
            x > self.min
        };
        let below = if self.include_max {
            x <= self.max
        } else {
            x < self.max
        };
        above && below
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    pub fn intersect(&self, other: &Bounds) -> Bounds {
        let (min, include_min) = match self.min.total_cmp(&other.min) {
            Ordering::Greater => (self.min, self.include_min),
            Ordering::Less => (other.min, other.include_min),
            Ordering::Equal => (self.min, self.include_min && other.include_min),
        };
        let (max, include_max) = match self.max.total_cmp(&other.max) {
            Ordering::Less => (self.max, self.include_max),
            Ordering::Greater => (other.max, other.include_max),
            Ordering::Equal => (self.max, self.include_max && other.include_max),
        };
        Bounds {
            min,
            max,
            include_min,
            include_max,
        }
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let open = if self.include_min { '[' } else { '(' };
        let close = if self.include_max { ']' } else { ')' };
        write!(f, "{open}{}, {}{close}", self.min, self.max)
    }
}

/// A normalized union of disjoint, non-adjacent, non-empty intervals in
/// ascending order.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct IntervalSet {
    parts: Vec<Bounds>,
}

impl IntervalSet {
    pub fn empty() -> Self {
        IntervalSet { parts: vec![] }
    }

    pub fn all() -> Self {
        IntervalSet::from(Bounds::all())
    }

    pub fn from_parts(parts: Vec<Bounds>) -> Self {
        normalize(parts)
    }

    pub fn intervals(&self) -> &[Bounds] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn contains(&self, x: f64) -> bool {
        self.parts.iter().any(|b| b.contains(x))
    }

    pub fn intersect(&self, other: &IntervalSet) -> IntervalSet {
        let mut parts = Vec::with_capacity(self.parts.len().max(other.parts.len()));
        for a in self.parts.iter() {
            for b in other.parts.iter() {
                parts.push(a.intersect(b));
            }
        }
        normalize(parts)
    }

    pub fn union(&self, other: &IntervalSet) -> IntervalSet {
        let mut parts = self.parts.clone();
        parts.extend_from_slice(&other.parts);
        normalize(parts)
    }

    pub fn complement(&self) -> IntervalSet {
        let mut parts = Vec::with_capacity(self.parts.len() + 1);
        let mut lower = Bounds::all();
        for part in self.parts.iter() {
            parts.push(Bounds {
                max: part.min,
                include_max: !part.include_min && part.min.is_finite(),
                ..lower
            });
            lower = Bounds {
                min: part.max,
                include_min: !part.include_max && part.max.is_finite(),
                ..Bounds::all()
            };
        }
        parts.push(lower);
        normalize(parts)
    }

    /// The component containing `x`, or failing that the widest one
    /// (the first of equally wide components).
    pub fn component(&self, x: f64) -> Option<Bounds> {
        if let Some(part) = self.parts.iter().find(|b| b.contains(x)) {
            return Some(*part);
        }
        let mut widest: Option<Bounds> = None;
        for part in self.parts.iter() {
            match widest {
                Some(w) if w.width() >= part.width() => {}
                _ => widest = Some(*part),
            }
        }
        widest
    }
}

impl From<Bounds> for IntervalSet {
    fn from(b: Bounds) -> Self {
        normalize(vec![b])
    }
}

impl fmt::Display for IntervalSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.parts.is_empty() {
            return write!(f, "{{}}");
        }
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                write!(f, " U ")?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

fn normalize(mut parts: Vec<Bounds>) -> IntervalSet {
    parts.retain(|b| !b.is_empty());
    // closed lower ends sort first, so a merge keeps them
    parts.sort_by(|a, b| {
        a.min
            .total_cmp(&b.min)
            .then_with(|| b.include_min.cmp(&a.include_min))
    });

    let mut merged: Vec<Bounds> = Vec::with_capacity(parts.len());
    for part in parts {
        if let Some(last) = merged.last_mut() {
            let touches = part.min < last.max
                || (part.min == last.max && (part.include_min || last.include_max));
            if touches {
                match part.max.total_cmp(&last.max) {
                    Ordering::Greater => {
                        last.max = part.max;
                        last.include_max = part.include_max;
                    }
                    Ordering::Equal => last.include_max |= part.include_max,
                    Ordering::Less => {}
                }
                continue;
            }
        }
        merged.push(part);
    }

    IntervalSet { parts: merged }
}
