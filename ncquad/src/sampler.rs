//! Singularity-tolerant evaluation of the integrand.
//!
//! Every rule samples the integrand through [`sample`]. When the raw value is
//! NaN or infinite the point is treated as a removable singularity and a
//! value is reconstructed from neighbours at a distance proportional to the
//! current sub-interval width:
//!
//! * both neighbours at `x ± 0.001·width` finite: their average;
//! * one neighbour non-finite: a linear extrapolation toward `x` through the
//!   finite neighbour and a closer point on the same side at `0.0005·width`,
//!   or the closest finite value on that side when the extrapolation is not
//!   finite;
//! * no neighbour finite: zero.
//!
//! The result is always finite. It is only as good as the local linear
//! model, so a function that is singular densely around `x` at these scales
//! yields a degraded estimate; this is an accuracy caveat, never an error.

use crate::integrand::Integrand;
use log::trace;

/// Relative distance of the symmetric neighbour samples.
const NEIGHBOUR_OFFSET: f64 = 0.001;
/// Relative distance of the secondary sample used for extrapolation.
const SECONDARY_OFFSET: f64 = 0.0005;

/// Evaluates `f(x)`, replacing a non-finite result by a finite local
/// estimate.
///
/// `width` is the width of the sub-interval the sample belongs to.
#[inline]
pub fn sample<F: Integrand + ?Sized>(f: &F, x: f64, width: f64) -> f64 {
    let value = f.eval(x);
    if value.is_finite() {
        return value;
    }
    repair(f, x, width)
}

#[cold]
fn repair<F: Integrand + ?Sized>(f: &F, x: f64, width: f64) -> f64 {
    let below = f.eval(x - NEIGHBOUR_OFFSET * width);
    let above = f.eval(x + NEIGHBOUR_OFFSET * width);

    let estimate = match (below.is_finite(), above.is_finite()) {
        (true, true) => 0.5 * below + 0.5 * above,
        (false, true) => extrapolate(f.eval(x + SECONDARY_OFFSET * width), above),
        (true, false) => extrapolate(f.eval(x - SECONDARY_OFFSET * width), below),
        (false, false) => 0.0,
    };

    trace!("singular sample at x = {x:e} (width {width:e}) replaced by {estimate:e}");
    estimate
}

/// Linear extrapolation to the singular point through `near` (half way)
/// and the finite `far` neighbour: f(x) ≈ near - (far - near).
fn extrapolate(near: f64, far: f64) -> f64 {
    if !near.is_finite() {
        return far;
    }
    let estimate = 2.0 * near - far;
    if estimate.is_finite() {
        estimate
    } else {
        near
    }
}
