// Viewport geometry for both controllers: the entrance controller's visibility ratio and the
// parallax controller's margin-expanded intersection test.

use serde::{Deserialize, Serialize};

use crate::error::MotionError;
use crate::types::{Rect, ViewportSize};

/// Fraction of `rect`'s own area inside the viewport, ignoring ancestor clipping.
///
/// Degenerate rectangles count as 1px on the missing axis so the ratio stays finite.
pub fn visibility_ratio(rect: &Rect, viewport: ViewportSize) -> f64 {
    let w = (rect.right().min(viewport.width) - rect.left.max(0.0)).max(0.0);
    let h = (rect.bottom().min(viewport.height) - rect.top.max(0.0)).max(0.0);
    let area = (non_zero(rect.width) * non_zero(rect.height)).max(1.0);
    (w * h) / area
}

fn non_zero(v: f64) -> f64 {
    if v == 0.0 || !v.is_finite() {
        1.0
    } else {
        v
    }
}

/// One side of an activation margin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MarginLength {
    Px(f64),
    /// Percentage of the viewport extent on the same axis.
    Percent(f64),
}

impl MarginLength {
    fn parse(raw: &str) -> Option<Self> {
        if let Some(v) = raw.strip_suffix('%') {
            v.parse::<f64>().ok().filter(|v| v.is_finite()).map(MarginLength::Percent)
        } else {
            let v = raw.strip_suffix("px").unwrap_or(raw);
            v.parse::<f64>().ok().filter(|v| v.is_finite()).map(MarginLength::Px)
        }
    }

    fn resolve(&self, extent: f64) -> f64 {
        match *self {
            MarginLength::Px(px) => px,
            MarginLength::Percent(pct) => extent * pct / 100.0,
        }
    }
}

/// Padding around the viewport, written like a CSS `margin` shorthand
/// (`"35% 0px 35% 0px"`, 1 to 4 values). Positive values grow the active area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivationMargin {
    pub top: MarginLength,
    pub right: MarginLength,
    pub bottom: MarginLength,
    pub left: MarginLength,
}

impl ActivationMargin {
    pub const ZERO: ActivationMargin = ActivationMargin {
        top: MarginLength::Px(0.0),
        right: MarginLength::Px(0.0),
        bottom: MarginLength::Px(0.0),
        left: MarginLength::Px(0.0),
    };

    pub fn parse(raw: &str) -> Result<Self, MotionError> {
        let parts: Option<Vec<MarginLength>> =
            raw.split_whitespace().map(MarginLength::parse).collect();
        let parts = parts
            .ok_or_else(|| MotionError::InvalidConfig(format!("bad activation margin {raw:?}")))?;
        let (top, right, bottom, left) = match parts.as_slice() {
            [all] => (*all, *all, *all, *all),
            [v, h] => (*v, *h, *v, *h),
            [t, h, b] => (*t, *h, *b, *h),
            [t, r, b, l] => (*t, *r, *b, *l),
            _ => {
                return Err(MotionError::InvalidConfig(format!(
                    "activation margin needs 1-4 values, got {raw:?}"
                )))
            }
        };
        Ok(ActivationMargin {
            top,
            right,
            bottom,
            left,
        })
    }

    /// Viewport rectangle grown by this margin.
    pub fn expand(&self, viewport: ViewportSize) -> Rect {
        let top = self.top.resolve(viewport.height);
        let bottom = self.bottom.resolve(viewport.height);
        let left = self.left.resolve(viewport.width);
        let right = self.right.resolve(viewport.width);
        Rect::new(
            -left,
            -top,
            viewport.width + left + right,
            viewport.height + top + bottom,
        )
    }

    /// Whether `rect` touches the margin-expanded viewport. Edge contact counts,
    /// so zero-height elements sitting inside the area still activate.
    pub fn intersects(&self, rect: &Rect, viewport: ViewportSize) -> bool {
        let area = self.expand(viewport);
        rect.left <= area.right()
            && rect.right() >= area.left
            && rect.top <= area.bottom()
            && rect.bottom() >= area.top
    }
}

impl Default for ActivationMargin {
    fn default() -> Self {
        ActivationMargin::ZERO
    }
}

/// Visibility change for one observed element.
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionEntry<N> {
    pub node: N,
    pub is_intersecting: bool,
}
