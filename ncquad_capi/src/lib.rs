//! The C-language interface for `ncquad`.
//!
//! Every entry point returns an [`NcquadResult`] whose `status` tells whether
//! `value` is meaningful. Integration never reports an error through global
//! state.

use std::ffi::{c_int, c_void};

use ncquad::integrand::Integrand;
use ncquad::{
    integrate_adaptive_parallel, integrate_adaptive_sequential, integrate_fixed_parallel,
    integrate_fixed_sequential, AdaptiveResult, QuadratureError, Rule,
};

/// The C-style integrand function pointer.
/// The first argument is the point `x`, the second a user-provided
/// `user_data` pointer passed through unchanged.
pub type CIntegrand = extern "C" fn(f64, *mut c_void) -> f64;

/// A wrapper that implements the Rust `Integrand` trait.
struct CIntegrandWrapper {
    func: CIntegrand,
    user_data: *mut c_void,
}

impl Integrand for CIntegrandWrapper {
    fn eval(&self, x: f64) -> f64 {
        (self.func)(x, self.user_data)
    }
}

// The parallel modes call the integrand from several threads at once. The
// caller of a parallel entry point guarantees that `func` and `user_data`
// are safe to use concurrently.
unsafe impl Sync for CIntegrandWrapper {}

/// The quadrature rules. Entry points take the rule as a plain `int`, so an
/// out-of-range value coming from C is reported as
/// [`NcquadStatus::UnknownRule`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NcquadRule {
    Midpoint = 0,
    Trapezoid = 1,
    Simpson = 2,
    Simpson38 = 3,
    Boole = 4,
}

impl TryFrom<c_int> for NcquadRule {
    type Error = QuadratureError;

    fn try_from(value: c_int) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(NcquadRule::Midpoint),
            1 => Ok(NcquadRule::Trapezoid),
            2 => Ok(NcquadRule::Simpson),
            3 => Ok(NcquadRule::Simpson38),
            4 => Ok(NcquadRule::Boole),
            _ => Err(QuadratureError::UnknownRule(value.to_string())),
        }
    }
}

fn rule_from_c(rule: c_int) -> Result<Rule, QuadratureError> {
    NcquadRule::try_from(rule).map(Rule::from)
}

impl From<NcquadRule> for Rule {
    fn from(rule: NcquadRule) -> Self {
        match rule {
            NcquadRule::Midpoint => Rule::Midpoint,
            NcquadRule::Trapezoid => Rule::Trapezoid,
            NcquadRule::Simpson => Rule::Simpson,
            NcquadRule::Simpson38 => Rule::Simpson38,
            NcquadRule::Boole => Rule::Boole,
        }
    }
}

/// Outcome of a call.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NcquadStatus {
    Ok = 0,
    InvalidBounds = 1,
    ZeroThreads = 2,
    ZeroSubdivisions = 3,
    ZeroMaxSubdivisions = 4,
    InvalidErrorGoal = 5,
    InvalidTimeLimit = 6,
    UnknownRule = 7,
    WorkerPanicked = 8,
    ThreadPool = 9,
}

impl From<&QuadratureError> for NcquadStatus {
    fn from(err: &QuadratureError) -> Self {
        match err {
            QuadratureError::InvalidBounds { .. } => NcquadStatus::InvalidBounds,
            QuadratureError::ZeroThreads => NcquadStatus::ZeroThreads,
            QuadratureError::ZeroSubdivisions => NcquadStatus::ZeroSubdivisions,
            QuadratureError::ZeroMaxSubdivisions => NcquadStatus::ZeroMaxSubdivisions,
            QuadratureError::InvalidErrorGoal(_) => NcquadStatus::InvalidErrorGoal,
            QuadratureError::InvalidTimeLimit(_) => NcquadStatus::InvalidTimeLimit,
            QuadratureError::UnknownRule(_) => NcquadStatus::UnknownRule,
            QuadratureError::WorkerPanicked(_) => NcquadStatus::WorkerPanicked,
            QuadratureError::ThreadPool(_) => NcquadStatus::ThreadPool,
        }
    }
}

/// The result of an integration.
///
/// For the fixed-grid modes `subdivisions` echoes the requested panel count
/// and `degraded` is always false.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NcquadResult {
    pub status: NcquadStatus,
    pub value: f64,
    pub subdivisions: usize,
    pub elapsed_s: f64,
    pub degraded: bool,
}

impl NcquadResult {
    fn failed(err: &QuadratureError) -> Self {
        NcquadResult {
            status: err.into(),
            value: f64::NAN,
            subdivisions: 0,
            elapsed_s: 0.0,
            degraded: false,
        }
    }

    fn fixed(result: Result<f64, QuadratureError>, subdivisions: usize, elapsed_s: f64) -> Self {
        match result {
            Ok(value) => NcquadResult {
                status: NcquadStatus::Ok,
                value,
                subdivisions,
                elapsed_s,
                degraded: false,
            },
            Err(err) => Self::failed(&err),
        }
    }

    fn adaptive(result: Result<AdaptiveResult, QuadratureError>) -> Self {
        match result {
            Ok(r) => NcquadResult {
                status: NcquadStatus::Ok,
                value: r.value,
                subdivisions: r.subdivisions,
                elapsed_s: r.elapsed.as_secs_f64(),
                degraded: r.degraded,
            },
            Err(err) => Self::failed(&err),
        }
    }
}

/// Integrates on a uniform grid on the calling thread.
#[no_mangle]
pub extern "C" fn ncquad_fixed_sequential(
    rule: c_int,
    integrand_func: CIntegrand,
    user_data: *mut c_void,
    a: f64,
    b: f64,
    subdivisions: usize,
) -> NcquadResult {
    let integrand = CIntegrandWrapper {
        func: integrand_func,
        user_data,
    };
    let rule = match rule_from_c(rule) {
        Ok(rule) => rule,
        Err(err) => return NcquadResult::failed(&err),
    };
    let start = std::time::Instant::now();
    let result = integrate_fixed_sequential(rule, &integrand, a, b, subdivisions);
    NcquadResult::fixed(result, subdivisions, start.elapsed().as_secs_f64())
}

/// Integrates on a uniform grid striped across `threads` workers.
///
/// # Safety
///
/// `integrand_func` is called concurrently from several threads with the
/// same `user_data`; both must be safe to use that way.
#[no_mangle]
pub unsafe extern "C" fn ncquad_fixed_parallel(
    rule: c_int,
    integrand_func: CIntegrand,
    user_data: *mut c_void,
    a: f64,
    b: f64,
    subdivisions: usize,
    threads: usize,
) -> NcquadResult {
    let integrand = CIntegrandWrapper {
        func: integrand_func,
        user_data,
    };
    let rule = match rule_from_c(rule) {
        Ok(rule) => rule,
        Err(err) => return NcquadResult::failed(&err),
    };
    let start = std::time::Instant::now();
    let result = integrate_fixed_parallel(rule, &integrand, a, b, subdivisions, threads);
    NcquadResult::fixed(result, subdivisions, start.elapsed().as_secs_f64())
}

/// Integrates adaptively on the calling thread. A `max_seconds` of zero
/// disables the time limit.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub extern "C" fn ncquad_adaptive_sequential(
    rule: c_int,
    integrand_func: CIntegrand,
    user_data: *mut c_void,
    a: f64,
    b: f64,
    error_goal: f64,
    max_subdivisions: usize,
    max_seconds: f64,
) -> NcquadResult {
    let integrand = CIntegrandWrapper {
        func: integrand_func,
        user_data,
    };
    let rule = match rule_from_c(rule) {
        Ok(rule) => rule,
        Err(err) => return NcquadResult::failed(&err),
    };
    NcquadResult::adaptive(integrate_adaptive_sequential(
        rule,
        &integrand,
        a,
        b,
        error_goal,
        max_subdivisions,
        max_seconds,
    ))
}

/// Integrates adaptively with `threads` workers sharing one queue.
///
/// # Safety
///
/// `integrand_func` is called concurrently from several threads with the
/// same `user_data`; both must be safe to use that way.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn ncquad_adaptive_parallel(
    rule: c_int,
    integrand_func: CIntegrand,
    user_data: *mut c_void,
    a: f64,
    b: f64,
    threads: usize,
    error_goal: f64,
    max_subdivisions: usize,
    max_seconds: f64,
) -> NcquadResult {
    let integrand = CIntegrandWrapper {
        func: integrand_func,
        user_data,
    };
    let rule = match rule_from_c(rule) {
        Ok(rule) => rule,
        Err(err) => return NcquadResult::failed(&err),
    };
    NcquadResult::adaptive(integrate_adaptive_parallel(
        rule,
        &integrand,
        a,
        b,
        threads,
        error_goal,
        max_subdivisions,
        max_seconds,
    ))
}
