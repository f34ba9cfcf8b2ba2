//! The Newton-Cotes rules and the generic refinement kernel.
//!
//! All five rules share one kernel. A rule is described by a
//! [`RuleCoefficients`] table: the fractional positions of its nodes inside
//! an interval, their integer weights and common divisor, the order `p` used
//! by the Richardson error test, and the positions whose samples an
//! [`Interval`] carries from one bisection to the next.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::QuadratureError;
use crate::integrand::Integrand;
use crate::sampler::sample;

const THIRD: f64 = 1.0 / 3.0;
const TWO_THIRDS: f64 = 2.0 / 3.0;

/// A Newton-Cotes quadrature rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    Midpoint,
    Trapezoid,
    Simpson,
    #[serde(rename = "simpson38", alias = "simpson_3_8")]
    Simpson38,
    Boole,
}

/// The constant description of a rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleCoefficients {
    /// Node positions as fractions of the interval width, ascending.
    pub nodes: &'static [f64],
    /// Weight of each node, to be divided by `divisor`.
    pub weights: &'static [f64],
    pub divisor: f64,
    /// Order `p` of the Richardson error test.
    pub order: u32,
    /// Positions whose samples an interval keeps between bisections.
    pub carried: &'static [f64],
}

impl RuleCoefficients {
    /// The Richardson constant `4^p - 1`.
    pub fn error_constant(&self) -> f64 {
        (4_u32.pow(self.order) - 1) as f64
    }

    /// Whether the first and last nodes sit on the interval endpoints, so
    /// neighbouring panels of a grid share those samples.
    pub fn shares_endpoints(&self) -> bool {
        self.nodes.first() == Some(&0.0) && self.nodes.last() == Some(&1.0)
    }
}

static MIDPOINT: RuleCoefficients = RuleCoefficients {
    nodes: &[0.5],
    weights: &[1.0],
    divisor: 1.0,
    order: 1,
    carried: &[0.5],
};

static TRAPEZOID: RuleCoefficients = RuleCoefficients {
    nodes: &[0.0, 1.0],
    weights: &[1.0, 1.0],
    divisor: 2.0,
    order: 1,
    carried: &[0.0, 1.0],
};

static SIMPSON: RuleCoefficients = RuleCoefficients {
    nodes: &[0.0, 0.5, 1.0],
    weights: &[1.0, 4.0, 1.0],
    divisor: 6.0,
    order: 2,
    carried: &[0.0, 0.5, 1.0],
};

// The interior thirds of a parent never coincide with a child's thirds, so
// only the endpoints are carried.
static SIMPSON38: RuleCoefficients = RuleCoefficients {
    nodes: &[0.0, THIRD, TWO_THIRDS, 1.0],
    weights: &[1.0, 3.0, 3.0, 1.0],
    divisor: 8.0,
    order: 3,
    carried: &[0.0, 1.0],
};

static BOOLE: RuleCoefficients = RuleCoefficients {
    nodes: &[0.0, 0.25, 0.5, 0.75, 1.0],
    weights: &[7.0, 32.0, 12.0, 32.0, 7.0],
    divisor: 90.0,
    order: 4,
    carried: &[0.0, 0.5, 1.0],
};

impl Rule {
    /// Every rule, from lowest to highest order.
    pub const ALL: [Rule; 5] = [
        Rule::Midpoint,
        Rule::Trapezoid,
        Rule::Simpson,
        Rule::Simpson38,
        Rule::Boole,
    ];

    pub fn coefficients(self) -> &'static RuleCoefficients {
        match self {
            Rule::Midpoint => &MIDPOINT,
            Rule::Trapezoid => &TRAPEZOID,
            Rule::Simpson => &SIMPSON,
            Rule::Simpson38 => &SIMPSON38,
            Rule::Boole => &BOOLE,
        }
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Rule::Midpoint => "Midpoint Rule",
            Rule::Trapezoid => "Trapezoid Rule",
            Rule::Simpson => "Simpson Rule",
            Rule::Simpson38 => "Simpson 3/8 Rule",
            Rule::Boole => "Boole's Rule",
        }
    }

    pub fn order(self) -> u32 {
        self.coefficients().order
    }

    pub fn error_constant(self) -> f64 {
        self.coefficients().error_constant()
    }

    /// Samples the carried positions of `[a, b]` to start a refinement.
    pub fn whole<F: Integrand + ?Sized>(self, f: &F, a: f64, b: f64) -> Interval {
        let width = b - a;
        let samples = self
            .coefficients()
            .carried
            .iter()
            .map(|&frac| {
                let x = point(a, b, frac);
                Sample {
                    x,
                    value: sample(f, x, width),
                }
            })
            .collect();
        Interval { a, b, samples }
    }

    /// Estimates the integral over `interval` with one application of the
    /// rule and bisects it into two children.
    ///
    /// Samples already carried by `interval` are reused, so a split costs
    /// one to three new evaluations depending on the rule.
    pub fn split<F: Integrand + ?Sized>(self, f: &F, interval: &Interval) -> RefinementNode {
        let coefficients = self.coefficients();
        let mut stencil = Stencil::new(f, interval, coefficients.carried);

        let weighted: f64 = coefficients
            .nodes
            .iter()
            .zip(coefficients.weights)
            .map(|(&frac, &weight)| weight * stencil.value(frac))
            .sum();
        let estimate = interval.width() / coefficients.divisor * weighted;

        let mid = interval.point(0.5);
        let left = Interval {
            a: interval.a,
            b: mid,
            samples: coefficients
                .carried
                .iter()
                .map(|&c| stencil.sample(0.5 * c))
                .collect(),
        };
        let right = Interval {
            a: mid,
            b: interval.b,
            samples: coefficients
                .carried
                .iter()
                .map(|&c| stencil.sample(0.5 + 0.5 * c))
                .collect(),
        };

        RefinementNode {
            left,
            right,
            estimate,
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Rule {
    type Err = QuadratureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "midpoint" => Ok(Rule::Midpoint),
            "trapezoid" => Ok(Rule::Trapezoid),
            "simpson" => Ok(Rule::Simpson),
            "simpson38" | "simpson3/8" | "simpson_3_8" => Ok(Rule::Simpson38),
            "boole" | "booles" => Ok(Rule::Boole),
            _ => Err(QuadratureError::UnknownRule(s.to_string())),
        }
    }
}

/// A domain point paired with the (possibly reconstructed) function value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub x: f64,
    pub value: f64,
}

/// A closed range `[a, b]` with the samples its rule carries.
///
/// `samples[k]` sits at the fraction `carried[k]` of the rule's
/// coefficients. Intervals are never modified; refinement builds new ones.
#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    pub a: f64,
    pub b: f64,
    pub samples: SmallVec<[Sample; 3]>,
}

impl Interval {
    pub fn width(&self) -> f64 {
        self.b - self.a
    }

    /// The point at fraction `frac` of the interval. The endpoints are
    /// returned exactly.
    pub fn point(&self, frac: f64) -> f64 {
        point(self.a, self.b, frac)
    }
}

/// Two sibling intervals produced by bisecting a parent, together with the
/// parent's one-shot estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct RefinementNode {
    pub left: Interval,
    pub right: Interval,
    /// Estimate over `[left.a, right.b]` from a single rule application.
    pub estimate: f64,
}

impl RefinementNode {
    pub fn width(&self) -> f64 {
        self.right.b - self.left.a
    }
}

fn point(a: f64, b: f64, frac: f64) -> f64 {
    if frac == 0.0 {
        a
    } else if frac == 1.0 {
        b
    } else {
        a + frac * (b - a)
    }
}

/// Samples of one interval keyed by fractional position, filled lazily.
struct Stencil<'a, F: Integrand + ?Sized> {
    f: &'a F,
    interval: &'a Interval,
    known: SmallVec<[(f64, f64); 8]>,
}

impl<'a, F: Integrand + ?Sized> Stencil<'a, F> {
    fn new(f: &'a F, interval: &'a Interval, carried: &[f64]) -> Self {
        debug_assert_eq!(carried.len(), interval.samples.len());
        let known = carried
            .iter()
            .zip(&interval.samples)
            .map(|(&frac, s)| (frac, s.value))
            .collect();
        Stencil { f, interval, known }
    }

    fn value(&mut self, frac: f64) -> f64 {
        if let Some(&(_, v)) = self.known.iter().find(|(p, _)| *p == frac) {
            return v;
        }
        let v = sample(self.f, self.interval.point(frac), self.interval.width());
        self.known.push((frac, v));
        v
    }

    fn sample(&mut self, frac: f64) -> Sample {
        Sample {
            x: self.interval.point(frac),
            value: self.value(frac),
        }
    }
}
