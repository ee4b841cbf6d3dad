// Controller configuration passed from JS (or built natively). Every field has a default,
// so `{}` is a valid config. camelCase option names from the JS API are accepted as aliases.

use serde::{Deserialize, Serialize};

use crate::easing::CubicBezier;
use crate::error::MotionError;
use crate::visibility::ActivationMargin;

/// Scroll-speed (parallax) controller settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallaxConfig {
    /// Selector of the subtree to scan. `None` scans the whole document.
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default = "default_parallax_selector")]
    pub selector: String,
    /// Attribute holding the per-element speed.
    #[serde(default = "default_speed_attribute")]
    pub attribute: String,
    /// Global intensity; lower is subtler.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Per-frame lerp factor in (0, 1].
    #[serde(default = "default_ease")]
    pub ease: f64,
    #[serde(default = "default_clamp")]
    pub clamp: [f64; 2],
    #[serde(default = "default_activation_margin", alias = "activationMargin", alias = "rootMargin")]
    pub activation_margin: String,
    #[serde(default = "default_true", alias = "autoObserve")]
    pub auto_observe: bool,
    #[serde(default = "default_true", alias = "willChangeHint", alias = "willChange")]
    pub will_change_hint: bool,
}

fn default_parallax_selector() -> String {
    "[speed]".to_string()
}

fn default_speed_attribute() -> String {
    "speed".to_string()
}

fn default_multiplier() -> f64 {
    0.12
}

fn default_ease() -> f64 {
    0.12
}

fn default_clamp() -> [f64; 2] {
    [-3.0, 3.0]
}

fn default_activation_margin() -> String {
    "35% 0px 35% 0px".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ParallaxConfig {
    fn default() -> Self {
        ParallaxConfig {
            root: None,
            selector: default_parallax_selector(),
            attribute: default_speed_attribute(),
            multiplier: default_multiplier(),
            ease: default_ease(),
            clamp: default_clamp(),
            activation_margin: default_activation_margin(),
            auto_observe: true,
            will_change_hint: true,
        }
    }
}

impl ParallaxConfig {
    pub fn from_json(json: &str) -> Result<Self, MotionError> {
        let config: ParallaxConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MotionError> {
        if !(self.ease > 0.0 && self.ease <= 1.0) {
            return Err(MotionError::InvalidConfig(format!(
                "ease must be in (0, 1], got {}",
                self.ease
            )));
        }
        if !self.multiplier.is_finite() {
            return Err(MotionError::InvalidConfig("multiplier must be finite".to_string()));
        }
        let [lo, hi] = self.clamp;
        if !(lo.is_finite() && hi.is_finite() && lo <= hi) {
            return Err(MotionError::InvalidConfig(format!(
                "clamp must be an ordered [min, max] pair, got [{lo}, {hi}]"
            )));
        }
        if self.selector.trim().is_empty() || self.attribute.trim().is_empty() {
            return Err(MotionError::InvalidConfig(
                "selector and attribute must not be empty".to_string(),
            ));
        }
        self.margin().map(|_| ())
    }

    pub fn margin(&self) -> Result<ActivationMargin, MotionError> {
        ActivationMargin::parse(&self.activation_margin)
    }
}

/// Entrance-animation controller settings. Durations are milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntranceConfig {
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default = "default_entrance_selector")]
    pub selector: String,
    #[serde(default = "default_duration", alias = "defaultDuration")]
    pub default_duration: f64,
    #[serde(default, alias = "defaultDelay")]
    pub default_delay: f64,
    #[serde(default = "default_hold", alias = "defaultHold")]
    pub default_hold: f64,
    /// Visible fraction that arms an element, 0..=1.
    #[serde(default = "default_trigger_ratio", alias = "triggerRatio")]
    pub trigger_ratio: f64,
    #[serde(default)]
    pub easing: CubicBezier,
    #[serde(default = "default_true", alias = "autoObserve")]
    pub auto_observe: bool,
    #[serde(default = "default_true", alias = "willChangeHint", alias = "willChange")]
    pub will_change_hint: bool,
}

fn default_entrance_selector() -> String {
    "[data-animate],[animate],[animte]".to_string()
}

fn default_duration() -> f64 {
    1200.0
}

fn default_hold() -> f64 {
    220.0
}

fn default_trigger_ratio() -> f64 {
    0.45
}

impl Default for EntranceConfig {
    fn default() -> Self {
        EntranceConfig {
            root: None,
            selector: default_entrance_selector(),
            default_duration: default_duration(),
            default_delay: 0.0,
            default_hold: default_hold(),
            trigger_ratio: default_trigger_ratio(),
            easing: CubicBezier::STANDARD,
            auto_observe: true,
            will_change_hint: true,
        }
    }
}

impl EntranceConfig {
    pub fn from_json(json: &str) -> Result<Self, MotionError> {
        let config: EntranceConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MotionError> {
        for (name, value) in [
            ("default_duration", self.default_duration),
            ("default_delay", self.default_delay),
            ("default_hold", self.default_hold),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(MotionError::InvalidConfig(format!(
                    "{name} must be a non-negative number of ms, got {value}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.trigger_ratio) {
            return Err(MotionError::InvalidConfig(format!(
                "trigger_ratio must be in [0, 1], got {}",
                self.trigger_ratio
            )));
        }
        let CubicBezier { p1x, p2x, .. } = self.easing;
        if !((0.0..=1.0).contains(&p1x) && (0.0..=1.0).contains(&p2x)) {
            return Err(MotionError::InvalidConfig(format!(
                "easing x control points must be in [0, 1], got {p1x} and {p2x}"
            )));
        }
        if self.selector.trim().is_empty() {
            return Err(MotionError::InvalidConfig("selector must not be empty".to_string()));
        }
        Ok(())
    }
}
