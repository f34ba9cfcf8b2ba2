//! Standard one-dimensional test integrands with known values.
//!
//! The catalog mixes smooth functions, functions with removable or jump
//! discontinuities at an endpoint or inside the domain, and functions with
//! integrable singularities or wild oscillations.
use serde::Serialize;
use std::f64::consts::{E, FRAC_2_PI, LN_2, PI};
use std::fmt;

use libm::tgamma;

use crate::integrand::Integrand;

/// The broad behaviour of a test function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Simple,
    Discontinuous,
    BadlyBehaved,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Simple => "simple",
            Kind::Discontinuous => "discontinuous",
            Kind::BadlyBehaved => "badly behaved",
        };
        f.write_str(name)
    }
}

/// A function together with its integration domain and exact integral.
#[derive(Debug, Clone, Copy)]
pub struct TestFunction {
    pub name: &'static str,
    pub kind: Kind,
    pub f: fn(f64) -> f64,
    pub a: f64,
    pub b: f64,
    /// The exact value of the integral over `[a, b]`.
    pub value: f64,
    /// An interior point where the function is discontinuous or undefined.
    pub singularity: Option<f64>,
}

impl TestFunction {
    fn new(name: &'static str, kind: Kind, f: fn(f64) -> f64, a: f64, b: f64, value: f64) -> Self {
        Self {
            name,
            kind,
            f,
            a,
            b,
            value,
            singularity: None,
        }
    }

    fn singular_at(mut self, x: f64) -> Self {
        self.singularity = Some(x);
        self
    }

    pub fn abs_error(&self, estimate: f64) -> f64 {
        (estimate - self.value).abs()
    }

    /// A `name from a to b` description for reports.
    pub fn describe(&self) -> String {
        format!("{} from {} to {}", self.name, self.a, self.b)
    }
}

impl Integrand for TestFunction {
    fn eval(&self, x: f64) -> f64 {
        (self.f)(x)
    }
}

fn polynomial(x: f64) -> f64 {
    3.0 * x.powi(4) + 4.0 * x.powi(3) + 76.0 * x.powi(2) + 58.0 * x + 4.0
}

fn rational(x: f64) -> f64 {
    (x - 2.0) * (x + 2.0) / (x - 2.0)
}

fn piecewise(x: f64) -> f64 {
    if x < 1.0 {
        0.5 * x
    } else if x > 1.0 {
        1.5 * x
    } else {
        f64::NAN
    }
}

/// Returns the full catalog of test functions.
pub fn catalog() -> Vec<TestFunction> {
    use Kind::*;

    // sqrt(pi) * Gamma(1 / (4 pi)) / (8 Gamma((6 + 1/pi) / 4))
    let fractional_root =
        PI.sqrt() * tgamma(1.0 / (4.0 * PI)) / (8.0 * tgamma((6.0 + 1.0 / PI) / 4.0));

    vec![
        TestFunction::new("sin(x)", Simple, f64::sin, 0.0, 1.0, 1.0 - 1.0_f64.cos()),
        TestFunction::new("x^2", Simple, |x| x * x, 0.0, 1.0, 1.0 / 3.0),
        TestFunction::new("x^3", Simple, |x| x.powi(3), 0.0, 1.0, 0.25),
        TestFunction::new("x^10000", Simple, |x| x.powi(10_000), 0.0, 1.0, 1.0 / 10_001.0),
        TestFunction::new(
            "3*x^4+4*x^3+76*x^2+58*x+4",
            Simple,
            polynomial,
            -20.0,
            0.0,
            5_853_440.0 / 3.0,
        ),
        TestFunction::new("x^-1", Simple, |x| 1.0 / x, 1.0, 2.0, LN_2),
        TestFunction::new("e^x", Simple, f64::exp, 0.0, 1.0, E - 1.0),
        TestFunction::new("x^1/2", Simple, f64::sqrt, 0.0, 1.0, 2.0 / 3.0),
        // Ein(1) = Ei(1) - Euler's constant.
        TestFunction::new(
            "(e^x-1)/x",
            Discontinuous,
            |x| x.exp_m1() / x,
            0.0,
            1.0,
            1.317_902_151_454_403_9,
        ),
        TestFunction::new("1/sqrt(abs(x))", Discontinuous, |x| 1.0 / x.abs().sqrt(), -9.0, 1.0, 8.0),
        TestFunction::new(
            "sin(x)*sqrt(1-x^2)",
            Discontinuous,
            |x| x.sin() * (1.0 - x * x).sqrt(),
            0.0,
            1.0,
            0.311_736_054_731_514_1,
        ),
        // Si(3)
        TestFunction::new("sin(x)/x", Discontinuous, |x| x.sin() / x, 0.0, 3.0, 1.848_652_527_999_468_3),
        TestFunction::new(
            "sqrt(abs(x-0.7))",
            Discontinuous,
            |x| (x - 0.7).abs().sqrt(),
            0.0,
            1.0,
            2.0 / 3.0 * (0.7_f64.powf(1.5) + 0.3_f64.powf(1.5)),
        )
        .singular_at(0.7),
        TestFunction::new("(x+2)(x-2)/(x-2)", Discontinuous, rational, 1.0, 3.0, 8.0).singular_at(2.0),
        TestFunction::new("floor(x)", Discontinuous, f64::floor, 0.0, 2.0, 1.0).singular_at(1.0),
        TestFunction::new("piecewise", Discontinuous, piecewise, 0.0, 2.0, 2.5).singular_at(1.0),
        TestFunction::new(
            "e^x*ln(sin(x))",
            BadlyBehaved,
            |x| x.exp() * x.sin().ln(),
            0.0,
            PI,
            -20.844_941_546_933_557,
        ),
        TestFunction::new("ln(x)", BadlyBehaved, f64::ln, 0.0, 1.0, -1.0),
        TestFunction::new(
            "ln(x^2)",
            BadlyBehaved,
            |x| (x * x).ln(),
            8.0,
            9.0,
            -2.0 * (1.0 + 8.0 * 8.0_f64.ln() - 9.0 * 9.0_f64.ln()),
        ),
        TestFunction::new("ln(1/x)", BadlyBehaved, |x| (1.0 / x).ln(), 0.0, 1.0, 1.0),
        // (16 + pi^2 (pi Ci(pi/2) - 2)) / (6 pi^3)
        TestFunction::new(
            "x^2*sin(1/x)",
            BadlyBehaved,
            |x| x * x * (1.0 / x).sin(),
            0.0,
            FRAC_2_PI,
            0.058_567_571_667_196_52,
        ),
        TestFunction::new(
            "sqrt(1-x^4)/x^(1-1/pi)",
            BadlyBehaved,
            |x| (1.0 - x.powi(4)).sqrt() / x.powf(1.0 - 1.0 / PI),
            0.0,
            1.0,
            fractional_root,
        ),
        TestFunction::new(
            "e^x/x^(1/pi)",
            BadlyBehaved,
            |x| x.exp() / x.powf(1.0 / PI),
            0.0,
            1.0,
            2.303_904_211_820_843,
        ),
    ]
}

/// Looks a function up by its catalog name.
pub fn find(name: &str) -> Option<TestFunction> {
    catalog().into_iter().find(|t| t.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::integrate_fixed_sequential;
    use crate::rule::Rule;
    use approx::assert_relative_eq;

    #[test]
    fn catalog_is_complete() {
        let functions = catalog();
        assert_eq!(functions.len(), 23);
        let count = |kind| functions.iter().filter(|t| t.kind == kind).count();
        assert_eq!(count(Kind::Simple), 8);
        assert_eq!(count(Kind::Discontinuous), 8);
        assert_eq!(count(Kind::BadlyBehaved), 7);
        for t in &functions {
            assert!(t.a < t.b, "{}", t.name);
            assert!(t.value.is_finite(), "{}", t.name);
            if let Some(s) = t.singularity {
                assert!(t.a < s && s < t.b, "{}", t.name);
            }
        }
    }

    #[test]
    fn smooth_values_agree_with_quadrature() {
        // x^10000 and x^1/2 converge too slowly for a uniform grid.
        let smooth = catalog()
            .into_iter()
            .filter(|t| t.kind == Kind::Simple && !matches!(t.name, "x^10000" | "x^1/2"));
        for t in smooth {
            let estimate = integrate_fixed_sequential(Rule::Boole, &t, t.a, t.b, 2000).unwrap();
            assert_relative_eq!(estimate, t.value, max_relative = 1e-6);
        }
    }

    #[test]
    fn gamma_closed_form() {
        let t = find("sqrt(1-x^4)/x^(1-1/pi)").unwrap();
        assert_relative_eq!(t.value, 2.998_214_303_321_8, max_relative = 1e-9);
    }

    #[test]
    fn descriptions() {
        let t = find("floor(x)").unwrap();
        assert_eq!(t.describe(), "floor(x) from 0 to 2");
        assert_eq!(t.eval(1.5), 1.0);
        assert_eq!(t.kind.to_string(), "discontinuous");
        assert_eq!(t.abs_error(1.25), 0.25);
        assert!(find("gauss").is_none());
    }
}
