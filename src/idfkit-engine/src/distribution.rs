// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Sampling distributions for design variables.
//!
//! Every draw lands strictly inside the bounds it is given (open ends are
//! respected) and never equals the variable's current value.  Integer
//! variables and `step:` distributions draw from a grid, so their values
//! are always exact grid points.

use std::fmt;
use std::str::FromStr;

use float_cmp::approx_eq;
use rand::Rng;

use crate::common::{Error, Result};
use crate::interval::Bounds;
use crate::var_err;

// continuous draws that hit the current value or an open end are retried
const MAX_REDRAWS: usize = 64;

// grid indices beyond this are not exact in an f64
const MAX_GRID_INDEX: f64 = (1u64 << 52) as f64;

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum Distribution {
    #[default]
    Uniform,
    /// peaks at the variable's current value
    Triangular,
    /// uniform over `minimum + k * step`
    Stepped(f64),
}

impl FromStr for Distribution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let tag = s.trim().to_ascii_lowercase();
        match tag.as_str() {
            "" | "uniform" => Ok(Distribution::Uniform),
            "triangular" => Ok(Distribution::Triangular),
            _ => match tag.strip_prefix("step:").map(|n| n.trim().parse::<f64>()) {
                Some(Ok(step)) if step > 0.0 && step.is_finite() => Ok(Distribution::Stepped(step)),
                _ => var_err!(BadDistribution, format!("{s:?}")),
            },
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Distribution::Uniform => write!(f, "uniform"),
            Distribution::Triangular => write!(f, "triangular"),
            Distribution::Stepped(step) => write!(f, "step:{step}"),
        }
    }
}

impl Distribution {
    /// Draw a value inside `bounds` that differs from `current`.  `anchor`
    /// is the origin of a `step:` grid.  Returns None when no such value
    /// exists, e.g. when the bounds hold only the current value.
    pub fn draw<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        bounds: &Bounds,
        current: f64,
        integer: bool,
        anchor: f64,
    ) -> Option<f64> {
        if bounds.is_empty() {
            return None;
        }
        match (*self, integer) {
            (Distribution::Stepped(step), false) => on_grid(rng, bounds, current, anchor, step, None),
            (Distribution::Stepped(step), true) => {
                on_grid(rng, bounds, current, anchor.round(), step.round().max(1.0), None)
            }
            (Distribution::Uniform, true) => on_grid(rng, bounds, current, 0.0, 1.0, None),
            (Distribution::Triangular, true) => {
                on_grid(rng, bounds, current, 0.0, 1.0, Some(current))
            }
            (Distribution::Uniform, false) => continuous(rng, bounds, current, |rng| {
                bounds.min + bounds.width() * rng.random::<f64>()
            }),
            (Distribution::Triangular, false) => {
                let mode = current.clamp(bounds.min, bounds.max);
                continuous(rng, bounds, current, |rng| {
                    triangular(rng, bounds.min, bounds.max, mode)
                })
            }
        }
    }
}

/// Draw a point of the grid `anchor + k * step` inside `bounds`.  Grids
/// too long to index are sampled continuously and snapped.
fn on_grid<R: Rng + ?Sized>(
    rng: &mut R,
    bounds: &Bounds,
    current: f64,
    anchor: f64,
    step: f64,
    mode: Option<f64>,
) -> Option<f64> {
    if !(bounds.min.is_finite() && bounds.max.is_finite()) {
        return None;
    }
    if Grid::countable(bounds, anchor, step) {
        return Grid::new(bounds, anchor, step)?.draw(rng, current, mode);
    }

    let (a, b) = (bounds.min, bounds.max);
    (0..MAX_REDRAWS)
        .map(|_| {
            let x = match mode {
                Some(mode) => triangular(rng, a, b, mode.clamp(a, b)),
                None => {
                    let u: f64 = rng.random();
                    a * (1.0 - u) + b * u
                }
            };
            clean(anchor + ((x - anchor) / step).round() * step)
        })
        .find(|x| bounds.contains(*x) && *x != current)
}

fn continuous<R, F>(rng: &mut R, bounds: &Bounds, current: f64, mut draw: F) -> Option<f64>
where
    R: Rng + ?Sized,
    F: FnMut(&mut R) -> f64,
{
    if bounds.width() == 0.0 {
        return if bounds.min != current {
            Some(bounds.min)
        } else {
            None
        };
    }
    (0..MAX_REDRAWS)
        .map(|_| draw(rng))
        .find(|x| bounds.contains(*x) && *x != current)
}

/// Inverse-CDF sample of the triangular distribution on [a, b] with
/// mode c.
fn triangular<R: Rng + ?Sized>(rng: &mut R, a: f64, b: f64, c: f64) -> f64 {
    if b <= a {
        return a;
    }
    let u: f64 = rng.random();
    let f = (c - a) / (b - a);
    if u < f {
        a + (u * (b - a) * (c - a)).sqrt()
    } else {
        b - ((1.0 - u) * (b - a) * (b - c)).sqrt()
    }
}

/// Strip the accumulated error of `anchor + k * step`, so that 0.5 +
/// 3 * 0.05 is written as 0.65.
fn clean(x: f64) -> f64 {
    if x.fract() == 0.0 {
        return x;
    }
    let rounded = (x * 1e12).round() / 1e12;
    if (rounded - x).abs() <= 1e-9 * x.abs().max(1.0) {
        rounded
    } else {
        x
    }
}

/// The points `anchor + k * step` with k in `lo..=hi`, all inside the
/// bounds the grid was built for.
struct Grid {
    anchor: f64,
    step: f64,
    lo: i64,
    hi: i64,
}

impl Grid {
    /// Whether every index of the grid over `bounds` fits comfortably in
    /// an i64.
    fn countable(bounds: &Bounds, anchor: f64, step: f64) -> bool {
        let lo = (bounds.min - anchor) / step;
        let hi = (bounds.max - anchor) / step;
        lo.abs() < MAX_GRID_INDEX && hi.abs() < MAX_GRID_INDEX
    }

    fn new(bounds: &Bounds, anchor: f64, step: f64) -> Option<Grid> {
        const EPS: f64 = 1e-9;
        if !Grid::countable(bounds, anchor, step) {
            return None;
        }
        let mut grid = Grid {
            anchor,
            step,
            lo: ((bounds.min - anchor) / step - EPS).ceil() as i64,
            hi: ((bounds.max - anchor) / step + EPS).floor() as i64,
        };
        while grid.lo <= grid.hi && !bounds.contains(grid.point(grid.lo)) {
            grid.lo += 1;
        }
        while grid.hi >= grid.lo && !bounds.contains(grid.point(grid.hi)) {
            grid.hi -= 1;
        }
        if grid.lo > grid.hi { None } else { Some(grid) }
    }

    fn point(&self, k: i64) -> f64 {
        clean(self.anchor + (k as f64) * self.step)
    }

    /// The index of `x`, if it is a point of this grid.
    fn index_of(&self, x: f64) -> Option<i64> {
        let k = ((x - self.anchor) / self.step).round() as i64;
        let on_grid = approx_eq!(f64, self.point(k), x, epsilon = 1e-9 * x.abs().max(1.0));
        if on_grid && self.lo <= k && k <= self.hi {
            Some(k)
        } else {
            None
        }
    }

    fn draw<R: Rng + ?Sized>(&self, rng: &mut R, current: f64, mode: Option<f64>) -> Option<f64> {
        let excluded = self.index_of(current);
        let count = self.hi - self.lo + 1 - i64::from(excluded.is_some());
        if count <= 0 {
            return None;
        }

        let k = match mode {
            None => {
                let k = self.lo + rng.random_range(0..count);
                match excluded {
                    Some(cur) if k >= cur => k + 1,
                    _ => k,
                }
            }
            Some(mode) => {
                let (a, b) = (self.point(self.lo), self.point(self.hi));
                let x = triangular(rng, a, b, mode.clamp(a, b));
                let k = (((x - self.anchor) / self.step).round() as i64).clamp(self.lo, self.hi);
                match excluded {
                    Some(cur) if k == cur && k < self.hi => k + 1,
                    Some(cur) if k == cur => k - 1,
                    _ => k,
                }
            }
        };

        Some(self.point(k))
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::common::ErrorCode;

    #[test]
    fn tags() {
        assert_eq!(Distribution::Uniform, "".parse().unwrap());
        assert_eq!(Distribution::Uniform, " Uniform ".parse().unwrap());
        assert_eq!(Distribution::Triangular, "triangular".parse().unwrap());
        assert_eq!(Distribution::Stepped(0.05), "step:0.05".parse().unwrap());
        assert_eq!("step:0.05", Distribution::Stepped(0.05).to_string());
        assert_eq!(
            Distribution::Stepped(0.25),
            Distribution::Stepped(0.25).to_string().parse().unwrap()
        );

        for bad in ["normal", "step:", "step:0", "step:-1", "step:abc"] {
            let err = bad.parse::<Distribution>().unwrap_err();
            assert_eq!(ErrorCode::BadDistribution, err.code, "{bad}");
            assert!(err.is_value_error());
        }
    }

    #[test]
    fn continuous_draws_respect_open_ends() {
        let mut rng = StdRng::seed_from_u64(12345);
        let bounds = Bounds {
            include_max: false,
            ..Bounds::closed(6.2, 13.4)
        };
        for dist in [Distribution::Uniform, Distribution::Triangular] {
            for _ in 0..500 {
                let x = dist.draw(&mut rng, &bounds, 10.0, false, 6.2).unwrap();
                assert!(bounds.contains(x), "{dist}: {x}");
                assert_ne!(10.0, x);
            }
        }
    }

    #[test]
    fn integer_draws_stay_on_integers() {
        let mut rng = StdRng::seed_from_u64(7);
        let bounds = Bounds::closed(21.0, 39.0);
        for dist in [Distribution::Uniform, Distribution::Triangular] {
            for _ in 0..500 {
                let x = dist.draw(&mut rng, &bounds, 30.0, true, 15.0).unwrap();
                assert_eq!(x, x.round());
                assert!((21.0..=39.0).contains(&x));
                assert_ne!(30.0, x);
            }
        }

        // only the current value is feasible
        let bounds = Bounds {
            include_max: false,
            ..Bounds::closed(3.0, 4.0)
        };
        assert_eq!(None, Distribution::Uniform.draw(&mut rng, &bounds, 3.0, true, 0.0));
        assert_eq!(Some(3.0), Distribution::Uniform.draw(&mut rng, &bounds, 2.0, true, 0.0));
    }

    #[test]
    fn stepped_draws_are_grid_points() {
        let mut rng = StdRng::seed_from_u64(99);
        let bounds = Bounds::closed(0.5, 0.8);
        let grid = [0.5, 0.55, 0.6, 0.65, 0.75, 0.8];
        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            let x = Distribution::Stepped(0.05)
                .draw(&mut rng, &bounds, 0.7, false, 0.5)
                .unwrap();
            assert!(grid.contains(&x), "{x} is not a grid point");
            seen.insert(x.to_bits());
        }
        assert_eq!(grid.len(), seen.len());
    }

    #[test]
    fn grids_too_long_to_index() {
        let mut rng = StdRng::seed_from_u64(3);
        let bounds = Bounds::closed(-1e19, 1e19);
        for dist in [Distribution::Uniform, Distribution::Triangular] {
            for _ in 0..100 {
                let x = dist.draw(&mut rng, &bounds, 0.0, true, -1e19).unwrap();
                assert_eq!(x, x.round());
                assert!(bounds.contains(x), "{dist}: {x}");
                assert_ne!(0.0, x);
            }
        }

        let bounds = Bounds::closed(0.0, 1e12);
        for _ in 0..100 {
            let x = Distribution::Stepped(1e-6)
                .draw(&mut rng, &bounds, 5.0, false, 0.0)
                .unwrap();
            assert!(bounds.contains(x), "{x}");
            assert_ne!(5.0, x);
        }
    }

    #[test]
    fn degenerate_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        let point = Bounds::point(2.0);
        assert_eq!(None, Distribution::Uniform.draw(&mut rng, &point, 2.0, false, 0.0));
        assert_eq!(Some(2.0), Distribution::Uniform.draw(&mut rng, &point, 1.0, false, 0.0));

        let empty = Bounds {
            include_min: false,
            ..Bounds::point(2.0)
        };
        assert_eq!(None, Distribution::Triangular.draw(&mut rng, &empty, 1.0, false, 0.0));
    }
}
