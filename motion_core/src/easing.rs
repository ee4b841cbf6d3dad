// Cubic-Bezier easing with endpoints pinned at (0,0) and (1,1), equivalent to CSS `cubic-bezier()`.
// x -> t is inverted with Newton-Raphson, falling back to bisection.

use serde::{Deserialize, Serialize};

const EPSILON: f64 = 1e-6;
const NEWTON_ITERATIONS: usize = 8;

/// Control points of a CSS-style cubic Bezier timing curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CubicBezier {
    pub p1x: f64,
    pub p1y: f64,
    pub p2x: f64,
    pub p2y: f64,
}

/// Polynomial coefficients for one axis: `((a*t + b)*t + c)*t`.
#[derive(Debug, Clone, Copy)]
struct Axis {
    a: f64,
    b: f64,
    c: f64,
}

impl Axis {
    fn new(p1: f64, p2: f64) -> Self {
        let c = 3.0 * p1;
        let b = 3.0 * (p2 - p1) - c;
        let a = 1.0 - c - b;
        Axis { a, b, c }
    }

    fn sample(&self, t: f64) -> f64 {
        ((self.a * t + self.b) * t + self.c) * t
    }

    fn derivative(&self, t: f64) -> f64 {
        (3.0 * self.a * t + 2.0 * self.b) * t + self.c
    }
}

impl CubicBezier {
    /// Material "standard" curve, `cubic-bezier(0.4, 0, 0.2, 1)`.
    pub const STANDARD: CubicBezier = CubicBezier::new(0.4, 0.0, 0.2, 1.0);
    pub const LINEAR: CubicBezier = CubicBezier::new(0.0, 0.0, 1.0, 1.0);

    pub const fn new(p1x: f64, p1y: f64, p2x: f64, p2y: f64) -> Self {
        CubicBezier { p1x, p1y, p2x, p2y }
    }

    /// Eased progress for linear progress `x`. Inputs outside (0, 1) pin to 0 or 1 exactly.
    pub fn ease(&self, x: f64) -> f64 {
        if x <= 0.0 {
            return 0.0;
        }
        if x >= 1.0 {
            return 1.0;
        }
        // NaN falls through both guards; treat it as "not started".
        if x.is_nan() {
            return 0.0;
        }
        let ax = Axis::new(self.p1x, self.p2x);
        let ay = Axis::new(self.p1y, self.p2y);
        ay.sample(solve_x(&ax, x))
    }
}

impl Default for CubicBezier {
    fn default() -> Self {
        CubicBezier::STANDARD
    }
}

fn solve_x(ax: &Axis, x: f64) -> f64 {
    let mut t = x;
    for _ in 0..NEWTON_ITERATIONS {
        let err = ax.sample(t) - x;
        if err.abs() < EPSILON {
            return t;
        }
        let d = ax.derivative(t);
        if d.abs() < EPSILON {
            break;
        }
        t -= err / d;
    }

    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    t = x;
    while t0 < t1 {
        let x2 = ax.sample(t);
        if (x2 - x).abs() < EPSILON {
            return t;
        }
        if x > x2 {
            t0 = t;
        } else {
            t1 = t;
        }
        t = (t0 + t1) / 2.0;
        if (t1 - t0).abs() < EPSILON {
            break;
        }
    }
    t
}
