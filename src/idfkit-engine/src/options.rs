// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

/// Limits on the work a candidate search may do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchOptions {
    /// draws per group before a permutation pass gives up on it
    pub max_attempts: usize,
    /// full permutation passes before giving up entirely
    pub max_restarts: usize,
    /// grid size used when a constraint is not linear in a variable
    pub boundary_samples: usize,
    pub bisection_steps: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            max_attempts: 1000,
            max_restarts: 16,
            boundary_samples: 256,
            bisection_steps: 48,
        }
    }
}
