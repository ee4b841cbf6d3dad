// Transform codec: split a rendered 2-D affine transform into translation + residual
// (rotation/scale) and write translation back without clobbering the residual.
// Never fails: anything unparseable decodes as identity.

use std::fmt;

use serde::{Deserialize, Serialize};

const RESIDUAL_EPSILON: f64 = 1e-4;

/// 2-D affine matrix in CSS `matrix(a, b, c, d, e, f)` order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix2d {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix2d {
    pub const IDENTITY: Matrix2d = Matrix2d {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn translation(x: f64, y: f64) -> Self {
        Matrix2d {
            e: x,
            f: y,
            ..Matrix2d::IDENTITY
        }
    }

    pub fn rotation_deg(deg: f64) -> Self {
        let (sin, cos) = deg.to_radians().sin_cos();
        Matrix2d {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            ..Matrix2d::IDENTITY
        }
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Matrix2d {
            a: sx,
            d: sy,
            ..Matrix2d::IDENTITY
        }
    }

    /// `self * rhs`: `rhs` is applied to points first, as in a CSS transform list.
    pub fn then(&self, rhs: &Matrix2d) -> Matrix2d {
        Matrix2d {
            a: self.a * rhs.a + self.c * rhs.b,
            b: self.b * rhs.a + self.d * rhs.b,
            c: self.a * rhs.c + self.c * rhs.d,
            d: self.b * rhs.c + self.d * rhs.d,
            e: self.a * rhs.e + self.c * rhs.f + self.e,
            f: self.b * rhs.e + self.d * rhs.f + self.f,
        }
    }

    fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }

    /// Solve `L * v = (x, y)` for the linear part `L`; `None` when `L` is singular.
    fn solve_linear(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let det = self.determinant();
        if !det.is_finite() || det.abs() < 1e-12 {
            return None;
        }
        Some((
            (self.d * x - self.c * y) / det,
            (self.a * y - self.b * x) / det,
        ))
    }

    /// Parse a computed or authored CSS transform value.
    ///
    /// Accepts `none`, `matrix(...)` (6 values), `matrix3d(...)` (16 values) and transform
    /// function lists made of `translate*`, `rotate`, `scale*` in `px`/`deg`/`rad`/`turn`.
    /// Returns `None` on anything else.
    pub fn parse(raw: &str) -> Option<Matrix2d> {
        let s = raw.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("none") {
            return Some(Matrix2d::IDENTITY);
        }

        let mut acc = Matrix2d::IDENTITY;
        let mut rest = s;
        while !rest.is_empty() {
            let open = rest.find('(')?;
            let close = rest[open..].find(')')? + open;
            let name = rest[..open].trim().to_ascii_lowercase();
            let args: Vec<&str> = rest[open + 1..close]
                .split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .collect();
            acc = acc.then(&function_matrix(&name, &args)?);
            rest = rest[close + 1..].trim_start();
        }
        Some(acc)
    }
}

fn function_matrix(name: &str, args: &[&str]) -> Option<Matrix2d> {
    let m = match (name, args.len()) {
        ("matrix", 6) => {
            let v = numbers(args)?;
            Matrix2d {
                a: v[0],
                b: v[1],
                c: v[2],
                d: v[3],
                e: v[4],
                f: v[5],
            }
        }
        ("matrix3d", 16) => {
            let v = numbers(args)?;
            Matrix2d {
                a: v[0],
                b: v[1],
                c: v[4],
                d: v[5],
                e: v[12],
                f: v[13],
            }
        }
        ("translate", 1) => Matrix2d::translation(length(args[0])?, 0.0),
        ("translate", 2) | ("translate3d", 3) => {
            Matrix2d::translation(length(args[0])?, length(args[1])?)
        }
        ("translatex", 1) => Matrix2d::translation(length(args[0])?, 0.0),
        ("translatey", 1) => Matrix2d::translation(0.0, length(args[0])?),
        ("rotate", 1) | ("rotatez", 1) => Matrix2d::rotation_deg(angle_deg(args[0])?),
        ("scale", 1) => {
            let s = number(args[0])?;
            Matrix2d::scale(s, s)
        }
        ("scale", 2) => Matrix2d::scale(number(args[0])?, number(args[1])?),
        ("scalex", 1) => Matrix2d::scale(number(args[0])?, 1.0),
        ("scaley", 1) => Matrix2d::scale(1.0, number(args[0])?),
        _ => return None,
    };
    Some(m)
}

fn number(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn numbers(args: &[&str]) -> Option<Vec<f64>> {
    args.iter().map(|a| number(a)).collect()
}

fn length(raw: &str) -> Option<f64> {
    number(raw.strip_suffix("px").unwrap_or(raw))
}

fn angle_deg(raw: &str) -> Option<f64> {
    if let Some(v) = raw.strip_suffix("deg") {
        number(v)
    } else if let Some(v) = raw.strip_suffix("grad") {
        number(v).map(|g| g * 0.9)
    } else if let Some(v) = raw.strip_suffix("rad") {
        number(v).map(f64::to_degrees)
    } else if let Some(v) = raw.strip_suffix("turn") {
        number(v).map(|t| t * 360.0)
    } else {
        // Unitless zero is the only valid bare angle.
        number(raw).filter(|v| *v == 0.0)
    }
}

/// Uniform or per-axis scale kept in a residual.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Scale {
    Uniform(f64),
    Axes(f64, f64),
}

/// Non-translation part of a transform (rotation, then scale), stored at the
/// precision it is written with so repeated rewrites are stable.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Residual {
    pub rotation_deg: Option<f64>,
    pub scale: Option<Scale>,
}

impl Residual {
    pub fn is_empty(&self) -> bool {
        self.rotation_deg.is_none() && self.scale.is_none()
    }

    /// Extract rotation and scale from the linear part of `m`.
    pub fn from_matrix(m: &Matrix2d) -> Self {
        let scale_x = m.a.hypot(m.b);
        let scale_y = m.c.hypot(m.d);
        let rotation = m.b.atan2(m.a).to_degrees();

        let rotation_deg = (rotation.abs() > RESIDUAL_EPSILON).then(|| round_to(rotation, 4));
        let scaled = (scale_x - 1.0).abs() > RESIDUAL_EPSILON || (scale_y - 1.0).abs() > RESIDUAL_EPSILON;
        let scale = scaled.then(|| {
            if (scale_x - scale_y).abs() < RESIDUAL_EPSILON {
                Scale::Uniform(round_to(scale_x, 4))
            } else {
                Scale::Axes(round_to(scale_x, 4), round_to(scale_y, 4))
            }
        });

        Residual {
            rotation_deg,
            scale,
        }
    }

    /// Linear matrix this residual renders as.
    pub fn matrix(&self) -> Matrix2d {
        let rotation = self
            .rotation_deg
            .map_or(Matrix2d::IDENTITY, Matrix2d::rotation_deg);
        let scale = match self.scale {
            Some(Scale::Uniform(s)) => Matrix2d::scale(s, s),
            Some(Scale::Axes(sx, sy)) => Matrix2d::scale(sx, sy),
            None => Matrix2d::IDENTITY,
        };
        rotation.then(&scale)
    }
}

impl fmt::Display for Residual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        if let Some(deg) = self.rotation_deg {
            write!(f, "rotate({:.4}deg)", deg)?;
            sep = " ";
        }
        match self.scale {
            Some(Scale::Uniform(s)) => write!(f, "{sep}scale({:.4})", s),
            Some(Scale::Axes(sx, sy)) => write!(f, "{sep}scale({:.4}, {:.4})", sx, sy),
            None => Ok(()),
        }
    }
}

/// Translation plus residual recovered from an element's rendered transform.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Decomposed {
    pub x: f64,
    pub y: f64,
    pub residual: Residual,
}

/// Split a computed transform value into translation and residual.
///
/// `compose` writes the residual *before* the translation, so the translation it takes lives
/// in the residual's frame. The rendered offset `(e, f)` is mapped back through the residual
/// so that `compose(decompose(v))` renders the same matrix as `v`. Without a residual (or with
/// a degenerate one) the translation entries are used as-is.
pub fn decompose(computed: Option<&str>) -> Decomposed {
    let Some(m) = computed.and_then(Matrix2d::parse) else {
        return Decomposed::default();
    };
    let residual = Residual::from_matrix(&m);
    let (x, y) = if residual.is_empty() {
        (m.e, m.f)
    } else {
        residual.matrix().solve_linear(m.e, m.f).unwrap_or((m.e, m.f))
    };
    Decomposed {
        x: finite_or_zero(x),
        y: finite_or_zero(y),
        residual,
    }
}

/// Transform string for translation `(x, y)` behind `residual`, using `translate3d`
/// so the write stays on the compositor.
pub fn compose(x: f64, y: f64, residual: &Residual) -> String {
    // `+ 0.0` folds negative zero so it never prints as "-0.000".
    let (x, y) = (x + 0.0, y + 0.0);
    if residual.is_empty() {
        format!("translate3d({:.3}px, {:.3}px, 0)", x, y)
    } else {
        format!("{} translate3d({:.3}px, {:.3}px, 0)", residual, x, y)
    }
}

fn round_to(v: f64, places: i32) -> f64 {
    let k = 10f64.powi(places);
    (v * k).round() / k + 0.0
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v + 0.0
    } else {
        0.0
    }
}
