//! `ncquad` numerically approximates definite integrals of a scalar real
//! function with the closed Newton-Cotes family of rules.
//!
//! Every rule (midpoint, trapezoid, Simpson, Simpson 3/8 and Boole) can be
//! run in four modes:
//!
//! * a fixed uniform grid, on one thread ([`integrate_fixed_sequential`]);
//! * a fixed uniform grid striped across worker threads
//!   ([`integrate_fixed_parallel`]);
//! * error-adaptive bisection on one thread
//!   ([`integrate_adaptive_sequential`]);
//! * error-adaptive bisection over a shared work queue
//!   ([`integrate_adaptive_parallel`]).
//!
//! Integrands may return NaN or an infinity at isolated points; those samples
//! are replaced by a local estimate (see [`sampler`]).

pub mod adaptive;
pub mod benchmark;
pub mod error;
pub mod fixed;
pub mod integrand;
pub mod rule;
pub mod sampler;
pub mod settings;
mod workers;

pub use adaptive::{
    integrate_adaptive_parallel, integrate_adaptive_sequential, Adaptive, AdaptiveResult,
};
pub use error::QuadratureError;
pub use fixed::{integrate_fixed_parallel, integrate_fixed_sequential, FixedGrid};
pub use integrand::Integrand;
pub use rule::Rule;
pub use settings::{AdaptiveSettings, FixedSettings};
