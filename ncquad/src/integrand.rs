//! The `Integrand` trait, which defines the function to be integrated.

/// A trait representing a scalar function of one real variable.
///
/// Any `Fn(f64) -> f64` closure or function pointer implements it, so most
/// callers never name this trait directly. Implement it by hand for types
/// that carry parameters.
///
/// Returning NaN or an infinity at a point is allowed and signals a
/// singular sample; the integrators substitute a local estimate there.
pub trait Integrand {
    /// Evaluates the function at `x`.
    fn eval(&self, x: f64) -> f64;
}

impl<F> Integrand for F
where
    F: Fn(f64) -> f64,
{
    #[inline]
    fn eval(&self, x: f64) -> f64 {
        self(x)
    }
}
