//! Fixed-grid integration.
//!
//! The domain is cut into `subdivisions` panels of equal width and the rule
//! is applied once per panel. With a closed rule the last node of a panel and
//! the first node of the next one coincide, so each interior grid point is
//! sampled once with the sum of both weights (Simpson, for example, sweeps
//! `1, 4, 2, 4, 2, ..., 4, 1`).
//!
//! In parallel mode thread `t` of `T` owns the panels `t, t + T, t + 2T, ...`
//! together with each owned panel's left grid point; the right end of the
//! domain is added once by the caller. Every sample of the sequential sweep
//! therefore appears in exactly one partial sum with the same weight, and the
//! two modes differ only by summation order.

use log::debug;
use parking_lot::Mutex;

use crate::error::{check_bounds, check_threads, QuadratureError};
use crate::integrand::Integrand;
use crate::rule::Rule;
use crate::sampler::sample;
use crate::workers::{build_pool, catch_panic, FirstFailure};

/// A fixed-grid integrator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedGrid {
    rule: Rule,
    subdivisions: usize,
    threads: usize,
}

impl FixedGrid {
    /// Creates a single-threaded integrator using `subdivisions` panels.
    ///
    /// # Arguments
    ///
    /// * `rule`: The Newton–Cotes rule applied on every panel.
    /// * `subdivisions`: The number of equal panels. Must be positive; this
    ///   is checked when integrating.
    pub fn new(rule: Rule, subdivisions: usize) -> Self {
        FixedGrid {
            rule,
            subdivisions,
            threads: 1,
        }
    }

    /// Stripes the panels across `threads` workers.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn rule(&self) -> Rule {
        self.rule
    }

    pub fn subdivisions(&self) -> usize {
        self.subdivisions
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Integrates `f` over `[a, b]`.
    pub fn integrate<F: Integrand + Sync + ?Sized>(
        &self,
        f: &F,
        a: f64,
        b: f64,
    ) -> Result<f64, QuadratureError> {
        let Some(grid) = self.validate(a, b)? else {
            return Ok(0.0);
        };

        let value = if self.threads == 1 {
            let sum = stripe_sum(self.rule, f, &grid, 0, 1);
            self.finish(f, &grid, sum)
        } else {
            let sum = self.striped_sum(f, &grid)?;
            catch_panic(|| self.finish(f, &grid, sum))?
        };

        debug!(
            "{} fixed grid over [{a}, {b}] with {} panels on {} thread(s): {value}",
            self.rule, self.subdivisions, self.threads
        );
        Ok(value)
    }

    /// Sequential sweep without the `Sync` requirement.
    fn integrate_sequential<F: Integrand + ?Sized>(
        &self,
        f: &F,
        a: f64,
        b: f64,
    ) -> Result<f64, QuadratureError> {
        let Some(grid) = self.validate(a, b)? else {
            return Ok(0.0);
        };
        let sum = stripe_sum(self.rule, f, &grid, 0, 1);
        let value = self.finish(f, &grid, sum);
        debug!(
            "{} fixed grid over [{a}, {b}] with {} panels: {value}",
            self.rule, self.subdivisions
        );
        Ok(value)
    }

    fn validate(&self, a: f64, b: f64) -> Result<Option<Grid>, QuadratureError> {
        check_bounds(a, b)?;
        check_threads(self.threads)?;
        if self.subdivisions == 0 {
            return Err(QuadratureError::ZeroSubdivisions);
        }
        if a == b {
            return Ok(None);
        }
        Ok(Some(Grid {
            a,
            b,
            step: (b - a) / self.subdivisions as f64,
            panels: self.subdivisions,
        }))
    }

    fn striped_sum<F: Integrand + Sync + ?Sized>(
        &self,
        f: &F,
        grid: &Grid,
    ) -> Result<f64, QuadratureError> {
        let pool = build_pool(self.threads)?;
        let total = Mutex::new(0.0);
        let failure = FirstFailure::default();
        let stride = self.threads;

        pool.scope(|scope| {
            for offset in 0..stride {
                let (total, failure) = (&total, &failure);
                scope.spawn(move |_| {
                    if let Some(partial) =
                        failure.catch(|| stripe_sum(self.rule, f, grid, offset, stride))
                    {
                        *total.lock() += partial;
                    }
                });
            }
        });

        failure.into_result()?;
        Ok(total.into_inner())
    }

    /// Adds the right end of the domain and scales the weighted sum.
    fn finish<F: Integrand + ?Sized>(&self, f: &F, grid: &Grid, mut sum: f64) -> f64 {
        let coefficients = self.rule.coefficients();
        if coefficients.shares_endpoints() {
            let last = coefficients.weights[coefficients.weights.len() - 1];
            sum += last * sample(f, grid.b, grid.step);
        }
        sum * grid.step / coefficients.divisor
    }
}

/// Integrates `f` over `[a, b]` on a uniform grid of `subdivisions` panels.
pub fn integrate_fixed_sequential<F: Integrand + ?Sized>(
    rule: Rule,
    f: &F,
    a: f64,
    b: f64,
    subdivisions: usize,
) -> Result<f64, QuadratureError> {
    FixedGrid::new(rule, subdivisions).integrate_sequential(f, a, b)
}

/// Integrates `f` over `[a, b]` on a uniform grid of `subdivisions` panels
/// striped across `threads` workers.
pub fn integrate_fixed_parallel<F: Integrand + Sync + ?Sized>(
    rule: Rule,
    f: &F,
    a: f64,
    b: f64,
    subdivisions: usize,
    threads: usize,
) -> Result<f64, QuadratureError> {
    FixedGrid::new(rule, subdivisions)
        .with_threads(threads)
        .integrate(f, a, b)
}

struct Grid {
    a: f64,
    b: f64,
    step: f64,
    panels: usize,
}

impl Grid {
    fn node(&self, panel: usize, frac: f64) -> f64 {
        if panel == 0 && frac == 0.0 {
            self.a
        } else if panel + 1 == self.panels && frac == 1.0 {
            self.b
        } else {
            self.a + (panel as f64 + frac) * self.step
        }
    }
}

/// Unscaled weighted sum over panels `offset, offset + stride, ...`.
///
/// For closed rules each panel contributes its left grid point (with the
/// merged weight of the two panels meeting there) and its interior nodes;
/// the right end of the domain is left to the caller.
fn stripe_sum<F: Integrand + ?Sized>(
    rule: Rule,
    f: &F,
    grid: &Grid,
    offset: usize,
    stride: usize,
) -> f64 {
    let coefficients = rule.coefficients();
    let n = coefficients.nodes.len();
    let shared = coefficients.shares_endpoints();
    let interior = if shared { 1..n - 1 } else { 0..n };
    let merged = coefficients.weights[0] + coefficients.weights[n - 1];

    let mut sum = 0.0;
    for panel in (offset..grid.panels).step_by(stride) {
        if shared {
            let weight = if panel == 0 {
                coefficients.weights[0]
            } else {
                merged
            };
            sum += weight * sample(f, grid.node(panel, 0.0), grid.step);
        }
        for k in interior.clone() {
            let x = grid.node(panel, coefficients.nodes[k]);
            sum += coefficients.weights[k] * sample(f, x, grid.step);
        }
    }
    sum
}
