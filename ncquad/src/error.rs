//! Errors reported by the integrators.

use thiserror::Error;

/// Errors that can occur when setting up or running an integration.
///
/// Failing to reach the requested accuracy is not an error: the adaptive
/// integrators return their best estimate and flag it as degraded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuadratureError {
    #[error("invalid integration bounds [{a}, {b}]: bounds must be finite with a <= b")]
    InvalidBounds { a: f64, b: f64 },

    #[error("the number of threads must be at least 1")]
    ZeroThreads,

    #[error("the number of subdivisions must be at least 1")]
    ZeroSubdivisions,

    #[error("the maximum number of subdivisions must be at least 1")]
    ZeroMaxSubdivisions,

    #[error("the error goal must be finite and positive, got {0}")]
    InvalidErrorGoal(f64),

    #[error("the time limit must be a non-negative number of seconds, got {0}")]
    InvalidTimeLimit(f64),

    #[error("unknown quadrature rule `{0}`")]
    UnknownRule(String),

    #[error("integrand panicked in a worker thread: {0}")]
    WorkerPanicked(String),

    #[error("failed to build the worker pool: {0}")]
    ThreadPool(String),
}

/// Checks that `[a, b]` is a usable integration domain.
pub(crate) fn check_bounds(a: f64, b: f64) -> Result<(), QuadratureError> {
    if !a.is_finite() || !b.is_finite() || a > b {
        return Err(QuadratureError::InvalidBounds { a, b });
    }
    Ok(())
}

pub(crate) fn check_threads(threads: usize) -> Result<(), QuadratureError> {
    if threads == 0 {
        return Err(QuadratureError::ZeroThreads);
    }
    Ok(())
}

/// Turns a caught panic payload into a readable message.
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_reversed_and_non_finite_bounds() {
        assert!(check_bounds(0.0, 1.0).is_ok());
        assert!(check_bounds(1.0, 1.0).is_ok());
        assert!(matches!(
            check_bounds(2.0, 1.0),
            Err(QuadratureError::InvalidBounds { .. })
        ));
        assert!(check_bounds(f64::NAN, 1.0).is_err());
        assert!(check_bounds(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn panic_messages_are_extracted() {
        let caught = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(caught), "boom");
        let caught = std::panic::catch_unwind(|| panic!("{} {}", "formatted", 1)).unwrap_err();
        assert_eq!(panic_message(caught), "formatted 1");
    }

    #[test]
    fn messages_mention_the_offending_value() {
        let err = QuadratureError::InvalidErrorGoal(-1.0);
        assert!(err.to_string().contains("-1"));
    }
}
