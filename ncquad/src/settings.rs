//! Serializable integration settings.
//!
//! The settings structs carry the parameters of one integration mode and can
//! be read from any `serde` format. Missing fields take the values of the
//! accurate preset.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::adaptive::{Adaptive, AdaptiveResult};
use crate::error::{check_threads, QuadratureError};
use crate::fixed::FixedGrid;
use crate::integrand::Integrand;
use crate::rule::Rule;

const DEFAULT_THREADS: usize = 4;

/// Settings of the fixed-grid integrators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedSettings {
    pub rule: Rule,
    pub subdivisions: usize,
    pub threads: usize,
}

impl FixedSettings {
    /// A coarse grid of 100 panels.
    pub fn fast() -> Self {
        FixedSettings {
            rule: Rule::Simpson,
            subdivisions: 100,
            threads: DEFAULT_THREADS,
        }
    }

    /// A fine grid of 100000 panels.
    pub fn accurate() -> Self {
        FixedSettings {
            subdivisions: 100_000,
            ..Self::fast()
        }
    }

    pub fn validate(&self) -> Result<(), QuadratureError> {
        check_threads(self.threads)?;
        if self.subdivisions == 0 {
            return Err(QuadratureError::ZeroSubdivisions);
        }
        Ok(())
    }

    pub fn integrator(&self) -> Result<FixedGrid, QuadratureError> {
        self.validate()?;
        Ok(FixedGrid::new(self.rule, self.subdivisions).with_threads(self.threads))
    }

    /// Integrates `f` over `[a, b]` with these settings.
    pub fn integrate<F: Integrand + Sync + ?Sized>(
        &self,
        f: &F,
        a: f64,
        b: f64,
    ) -> Result<f64, QuadratureError> {
        self.integrator()?.integrate(f, a, b)
    }
}

impl Default for FixedSettings {
    fn default() -> Self {
        Self::accurate()
    }
}

/// Settings of the adaptive integrators.
///
/// `max_seconds` of zero disables the time limit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveSettings {
    pub rule: Rule,
    pub error_goal: f64,
    pub max_subdivisions: usize,
    pub max_seconds: f64,
    pub threads: usize,
}

impl AdaptiveSettings {
    pub fn fast() -> Self {
        AdaptiveSettings {
            rule: Rule::Simpson,
            error_goal: 1e-3,
            max_subdivisions: 100_000,
            max_seconds: 1.0,
            threads: DEFAULT_THREADS,
        }
    }

    pub fn accurate() -> Self {
        AdaptiveSettings {
            error_goal: 1e-6,
            max_seconds: 5.0,
            ..Self::fast()
        }
    }

    pub fn validate(&self) -> Result<(), QuadratureError> {
        check_threads(self.threads)?;
        check_error_goal(self.error_goal)?;
        if self.max_subdivisions == 0 {
            return Err(QuadratureError::ZeroMaxSubdivisions);
        }
        time_limit(self.max_seconds)?;
        Ok(())
    }

    pub fn integrator(&self) -> Result<Adaptive, QuadratureError> {
        self.validate()?;
        Ok(Adaptive::new(self.rule, self.error_goal)
            .with_threads(self.threads)
            .with_max_subdivisions(self.max_subdivisions)
            .with_max_time(time_limit(self.max_seconds)?))
    }

    pub fn integrate<F: Integrand + Sync + ?Sized>(
        &self,
        f: &F,
        a: f64,
        b: f64,
    ) -> Result<AdaptiveResult, QuadratureError> {
        self.integrator()?.integrate(f, a, b)
    }
}

impl Default for AdaptiveSettings {
    fn default() -> Self {
        Self::accurate()
    }
}

pub(crate) fn check_error_goal(error_goal: f64) -> Result<(), QuadratureError> {
    if !error_goal.is_finite() || error_goal <= 0.0 {
        return Err(QuadratureError::InvalidErrorGoal(error_goal));
    }
    Ok(())
}

/// Converts a limit in seconds into a duration; zero and infinity mean none.
pub(crate) fn time_limit(max_seconds: f64) -> Result<Option<Duration>, QuadratureError> {
    if max_seconds.is_nan() || max_seconds < 0.0 {
        return Err(QuadratureError::InvalidTimeLimit(max_seconds));
    }
    if max_seconds == 0.0 {
        return Ok(None);
    }
    Ok(Duration::try_from_secs_f64(max_seconds).ok())
}
