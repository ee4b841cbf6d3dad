// Strong typing over raw numbers. Newtypes for frame timestamps, plain geometry, style slots.

use serde::{Deserialize, Serialize};

/// Frame timestamp in milliseconds, as delivered by `requestAnimationFrame`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize, Default)]
pub struct Timestamp(f64);

impl Timestamp {
    pub fn from_millis(ms: f64) -> Self {
        Timestamp(ms)
    }

    pub fn as_millis(&self) -> f64 {
        self.0
    }

    /// Milliseconds elapsed since `earlier` (negative if `earlier` is in the future).
    pub fn since(&self, earlier: Timestamp) -> f64 {
        self.0 - earlier.0
    }

    pub fn offset(&self, ms: f64) -> Timestamp {
        Timestamp(self.0 + ms)
    }
}

/// Axis-aligned rectangle in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Rect {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Same rectangle moved vertically by `dy`.
    pub fn shifted_y(&self, dy: f64) -> Self {
        Rect {
            top: self.top + dy,
            ..*self
        }
    }
}

/// Size of the layout viewport in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportSize {
    pub width: f64,
    pub height: f64,
}

impl ViewportSize {
    pub fn new(width: f64, height: f64) -> Self {
        ViewportSize { width, height }
    }
}

impl Default for ViewportSize {
    fn default() -> Self {
        ViewportSize::new(1280.0, 800.0)
    }
}

/// Inline style slots the controllers read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StyleProperty {
    Transform,
    Opacity,
    ClipPath,
    Overflow,
    WillChange,
}

impl StyleProperty {
    /// CSS property name as used by `style.setProperty`.
    pub fn css_name(&self) -> &'static str {
        match self {
            StyleProperty::Transform => "transform",
            StyleProperty::Opacity => "opacity",
            StyleProperty::ClipPath => "clip-path",
            StyleProperty::Overflow => "overflow",
            StyleProperty::WillChange => "will-change",
        }
    }
}

/// Everything a controller needs to know about the current animation frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub now: Timestamp,
    /// Best known vertical scroll offset of the document.
    pub scroll_y: f64,
}

/// Leading-number parse with the permissive rules of CSS/HTML attribute values:
/// surrounding whitespace is ignored and trailing garbage (`"12px"`) is dropped.
/// Returns `None` when no number prefix exists.
pub fn parse_leading_f64(raw: &str) -> Option<f64> {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut has_digits = end > digits_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if frac_end > frac_start || has_digits {
            has_digits = has_digits || frac_end > frac_start;
            end = frac_end;
        }
    }
    if !has_digits {
        return None;
    }
    // Optional exponent, only consumed when complete.
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }
    s[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Integer prefix in the manner of `parseInt(raw, 10)`: optional sign, then decimal digits.
/// Anything after the digits (`.5`, `e3`, `ms`) is ignored; no digits gives `None`.
pub fn parse_leading_int(raw: &str) -> Option<f64> {
    let s = raw.trim_start();
    let unsigned = s.strip_prefix(['+', '-']).unwrap_or(s);
    let digits = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(unsigned.len());
    if digits == 0 {
        return None;
    }
    let sign_len = s.len() - unsigned.len();
    s[..sign_len + digits].parse::<f64>().ok().filter(|v| v.is_finite())
}
