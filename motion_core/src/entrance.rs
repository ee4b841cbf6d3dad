// Viewport-entrance animations (fade, fade-up, reveal). Each element arms when enough of it
// is visible, holds, then plays once; `Done` is terminal until the element is re-collected.

use serde::{Deserialize, Serialize};

use crate::config::EntranceConfig;
use crate::error::MotionError;
use crate::host::{added_nodes_match, first_attribute, write_or_warn, Host, ScanRoot};
use crate::ticker::FrameClient;
use crate::transform::{compose, decompose, Decomposed};
use crate::types::{parse_leading_f64, parse_leading_int, Frame, StyleProperty, Timestamp};
use crate::visibility::visibility_ratio;

/// Travel unit when the computed font size is unavailable.
const FALLBACK_EM_PX: f64 = 16.0;

/// Closed set of entrance effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnimationKind {
    Fade,
    FadeUp,
    Reveal,
}

impl AnimationKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "fade" => Some(AnimationKind::Fade),
            "fade-up" => Some(AnimationKind::FadeUp),
            "reveal" => Some(AnimationKind::Reveal),
            _ => None,
        }
    }

    fn will_change(&self) -> &'static str {
        match self {
            AnimationKind::Reveal => "clip-path",
            AnimationKind::Fade | AnimationKind::FadeUp => "opacity, transform",
        }
    }
}

/// Where an element is in its one-shot lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Waiting { armed_at: Timestamp },
    Playing { start: Timestamp },
    Done,
}

/// Per-element entrance state. Timings are milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntranceRecord {
    pub kind: AnimationKind,
    /// Computed font size in px; fade-up travels one of these.
    pub em: f64,
    pub duration: f64,
    pub delay: f64,
    pub hold: f64,
    pub trigger: f64,
    /// Transform at collection time; fade-up offsets are applied on top of it.
    pub base: Decomposed,
    pub phase: Phase,
    /// Last measured visibility ratio. Diagnostic only.
    pub last_visibility: f64,
}

impl EntranceRecord {
    /// Run the arm/hold state machine for one frame.
    fn advance(&mut self, visibility: f64, now: Timestamp) {
        if self.phase == Phase::Idle && visibility >= self.trigger {
            self.phase = Phase::Waiting { armed_at: now };
        }
        if let Phase::Waiting { armed_at } = self.phase {
            if visibility < self.trigger {
                self.phase = Phase::Idle;
            } else if now.since(armed_at) >= self.hold {
                self.phase = Phase::Playing {
                    start: now.offset(self.delay),
                };
            }
        }
    }

    /// Linear progress in [0, 1] for a playing element.
    fn progress(&self, now: Timestamp, start: Timestamp) -> f64 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        (now.since(start) / self.duration).min(1.0)
    }
}

/// Attribute names tried for `base`, in order: `data-<base>`, `<base>`, then the legacy
/// misspelling with "animate" written as "animte".
pub fn attribute_candidates(base: &str) -> [String; 3] {
    [
        format!("data-{base}"),
        base.to_string(),
        base.replacen("animate", "animte", 1),
    ]
}

#[derive(Debug, Clone)]
struct Tracked<N> {
    node: N,
    record: EntranceRecord,
}

/// One entrance-animation controller instance.
#[derive(Debug)]
pub struct EntranceController<N> {
    config: EntranceConfig,
    reduced_motion: bool,
    tracked: Vec<Tracked<N>>,
}

impl<N: Clone + PartialEq + std::fmt::Debug> EntranceController<N> {
    /// Validate `config` and collect. With reduced motion every element is finalized here.
    pub fn new<H: Host<Node = N>>(host: &mut H, config: EntranceConfig) -> Result<Self, MotionError> {
        config.validate()?;
        let mut controller = EntranceController {
            config,
            reduced_motion: host.prefers_reduced_motion(),
            tracked: Vec::new(),
        };
        controller.collect(host);
        Ok(controller)
    }

    pub fn config(&self) -> &EntranceConfig {
        &self.config
    }

    pub fn reduced_motion(&self) -> bool {
        self.reduced_motion
    }

    /// Re-scan the root. Elements that still match keep their state; new ones get their
    /// initial style (or their final one under reduced motion).
    pub fn collect<H: Host<Node = N>>(&mut self, host: &mut H) {
        let mut previous = std::mem::take(&mut self.tracked);

        let root = ScanRoot::resolve(&*host, self.config.root.as_deref());
        for node in root.query(&*host, &self.config.selector) {
            if let Some(pos) = previous.iter().position(|t| t.node == node) {
                let kept = previous.swap_remove(pos);
                self.tracked.push(kept);
                continue;
            }
            let Some(mut record) = self.read_record(&*host, &node) else {
                continue;
            };

            if self.reduced_motion {
                apply_final(host, &node, &record);
                record.phase = Phase::Done;
            } else {
                apply_initial(host, &node, &record);
                if self.config.will_change_hint {
                    write_or_warn(host, &node, StyleProperty::WillChange, record.kind.will_change());
                }
            }
            self.tracked.push(Tracked { node, record });
        }
        log::debug!(
            "entrance: tracking {} elements ({} dropped)",
            self.tracked.len(),
            previous.len()
        );
    }

    /// Resolve one element's declared settings against the controller defaults.
    fn read_record<H: Host<Node = N>>(&self, host: &H, node: &N) -> Option<EntranceRecord> {
        let read = |base: &str| first_attribute(host, node, &attribute_candidates(base));

        let raw_kind = read("animate").unwrap_or_default();
        if raw_kind.trim().is_empty() {
            log::debug!("entrance: skipping {:?}, no animation type", node);
            return None;
        }
        let Some(kind) = AnimationKind::parse(&raw_kind) else {
            log::warn!("entrance: skipping {:?}, unknown animation {:?}", node, raw_kind);
            return None;
        };

        let millis = |base: &str, default: f64| {
            read(base)
                .and_then(|v| parse_leading_int(&v))
                .filter(|v| *v >= 0.0)
                .unwrap_or(default)
        };
        let trigger = read("animate-trigger")
            .and_then(|v| parse_leading_f64(&v))
            .map_or(self.config.trigger_ratio, |t| t.clamp(0.0, 1.0));

        Some(EntranceRecord {
            kind,
            em: read_em(host, node),
            duration: millis("animate-duration", self.config.default_duration),
            delay: millis("animate-delay", self.config.default_delay),
            hold: millis("animate-hold", self.config.default_hold),
            trigger,
            base: decompose(host.computed_transform(node).as_deref()),
            phase: Phase::Idle,
            last_visibility: 0.0,
        })
    }

    /// Recompute the font-size unit of every element.
    pub fn refresh<H: Host<Node = N>>(&mut self, host: &H) {
        for t in &mut self.tracked {
            t.record.em = read_em(host, &t.node);
        }
    }

    /// Stop tracking. Styles are left as they are.
    pub fn destroy(self) {
        log::debug!("entrance: destroyed, dropping {} elements", self.tracked.len());
    }

    /// Mutation hook: re-collect when an added subtree carries a match.
    pub fn nodes_added<H: Host<Node = N>>(&mut self, host: &mut H, added: &[N]) -> bool {
        if !self.config.auto_observe || !added_nodes_match(&*host, added, &self.config.selector) {
            return false;
        }
        self.collect(host);
        true
    }

    /// Advance every unfinished element to `now`.
    pub fn update<H: Host<Node = N>>(&mut self, host: &mut H, now: Timestamp) {
        if self.reduced_motion {
            return;
        }
        let viewport = host.viewport();
        let easing = self.config.easing;

        for t in &mut self.tracked {
            let record = &mut t.record;
            if record.phase == Phase::Done {
                continue;
            }

            let visibility = visibility_ratio(&host.bounding_rect(&t.node), viewport);
            record.last_visibility = visibility;
            record.advance(visibility, now);

            let Phase::Playing { start } = record.phase else {
                continue;
            };
            if now < start {
                continue;
            }

            let progress = record.progress(now, start);
            if progress >= 1.0 {
                record.phase = Phase::Done;
                apply_final(host, &t.node, record);
            } else {
                apply_progress(host, &t.node, record, easing.ease(progress));
            }
        }
    }

    pub fn phase(&self, node: &N) -> Option<Phase> {
        self.record(node).map(|r| r.phase)
    }

    pub fn last_visibility(&self, node: &N) -> Option<f64> {
        self.record(node).map(|r| r.last_visibility)
    }

    pub fn record(&self, node: &N) -> Option<&EntranceRecord> {
        self.tracked.iter().find(|t| &t.node == node).map(|t| &t.record)
    }

    pub fn records(&self) -> impl Iterator<Item = (&N, &EntranceRecord)> {
        self.tracked.iter().map(|t| (&t.node, &t.record))
    }

    pub fn tracked_len(&self) -> usize {
        self.tracked.len()
    }

    /// Number of elements that have not finished yet.
    pub fn pending_len(&self) -> usize {
        self.tracked
            .iter()
            .filter(|t| t.record.phase != Phase::Done)
            .count()
    }
}

impl<H: Host> FrameClient<H> for EntranceController<H::Node> {
    fn on_frame(&mut self, host: &mut H, frame: &Frame) {
        self.update(host, frame.now);
    }
}

fn read_em<H: Host>(host: &H, node: &H::Node) -> f64 {
    host.computed_font_size(node)
        .and_then(|v| parse_leading_f64(&v))
        .filter(|v| *v > 0.0)
        .unwrap_or(FALLBACK_EM_PX)
}

fn apply_initial<H: Host>(host: &mut H, node: &H::Node, record: &EntranceRecord) {
    match record.kind {
        AnimationKind::Fade => write_or_warn(host, node, StyleProperty::Opacity, "0"),
        AnimationKind::FadeUp => {
            write_or_warn(host, node, StyleProperty::Opacity, "0");
            let b = &record.base;
            let value = compose(b.x, b.y + record.em, &b.residual);
            write_or_warn(host, node, StyleProperty::Transform, &value);
        }
        AnimationKind::Reveal => {
            if host.inline_style(node, StyleProperty::Overflow).is_none() {
                write_or_warn(host, node, StyleProperty::Overflow, "hidden");
            }
            write_or_warn(host, node, StyleProperty::ClipPath, "inset(0 0 100% 0)");
        }
    }
}

fn apply_progress<H: Host>(host: &mut H, node: &H::Node, record: &EntranceRecord, k: f64) {
    match record.kind {
        AnimationKind::Fade => write_or_warn(host, node, StyleProperty::Opacity, &k.to_string()),
        AnimationKind::FadeUp => {
            write_or_warn(host, node, StyleProperty::Opacity, &k.to_string());
            let b = &record.base;
            let value = compose(b.x, b.y + (1.0 - k) * record.em, &b.residual);
            write_or_warn(host, node, StyleProperty::Transform, &value);
        }
        AnimationKind::Reveal => {
            let value = format!("inset(0 0 {}% 0)", (1.0 - k) * 100.0);
            write_or_warn(host, node, StyleProperty::ClipPath, &value);
        }
    }
}

/// Exact resting state, written instead of the last eased frame.
fn apply_final<H: Host>(host: &mut H, node: &H::Node, record: &EntranceRecord) {
    match record.kind {
        AnimationKind::Fade => write_or_warn(host, node, StyleProperty::Opacity, "1"),
        AnimationKind::FadeUp => {
            write_or_warn(host, node, StyleProperty::Opacity, "1");
            let b = &record.base;
            write_or_warn(host, node, StyleProperty::Transform, &compose(b.x, b.y, &b.residual));
        }
        AnimationKind::Reveal => {
            write_or_warn(host, node, StyleProperty::ClipPath, "inset(0 0 0% 0)");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::easing::CubicBezier;
    use crate::memory::{MemoryHost, NodeId};
    use crate::types::{Rect, ViewportSize};
    use proptest::prelude::*;

    const ON_SCREEN: Rect = Rect {
        left: 0.0,
        top: 100.0,
        width: 200.0,
        height: 200.0,
    };
    const OFF_SCREEN: Rect = Rect {
        left: 0.0,
        top: 5000.0,
        width: 200.0,
        height: 200.0,
    };

    fn host() -> MemoryHost {
        MemoryHost::new(ViewportSize::new(1000.0, 800.0))
    }

    fn at(ms: f64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    fn controller(h: &mut MemoryHost) -> EntranceController<NodeId> {
        EntranceController::new(h, EntranceConfig::default()).unwrap()
    }

    #[test]
    fn attribute_fallback_order() {
        assert_eq!(
            attribute_candidates("animate-hold"),
            [
                "data-animate-hold".to_string(),
                "animate-hold".to_string(),
                "animte-hold".to_string()
            ]
        );

        let mut h = host();
        let both = h.add(
            None,
            &[("data-animate", "reveal"), ("animate", "fade")],
            ON_SCREEN,
        );
        let bare = h.add(None, &[("animate", "fade-up")], ON_SCREEN);
        let legacy = h.add(None, &[("animte", "fade"), ("animte-duration", "300")], ON_SCREEN);
        let c = controller(&mut h);

        assert_eq!(c.record(&both).unwrap().kind, AnimationKind::Reveal);
        assert_eq!(c.record(&bare).unwrap().kind, AnimationKind::FadeUp);
        let r = c.record(&legacy).unwrap();
        assert_eq!(r.kind, AnimationKind::Fade);
        assert_eq!(r.duration, 300.0);
    }

    #[test]
    fn empty_or_unknown_type_is_skipped() {
        let mut h = host();
        // An empty data- attribute shadows the bare one.
        let shadowed = h.add(None, &[("data-animate", ""), ("animate", "fade")], ON_SCREEN);
        let unknown = h.add(None, &[("data-animate", "spin")], ON_SCREEN);
        let c = controller(&mut h);
        assert_eq!(c.tracked_len(), 0);
        assert!(c.record(&shadowed).is_none());
        assert_eq!(h.style(unknown, StyleProperty::Opacity), None);
    }

    #[test]
    fn per_element_settings_override_defaults() {
        let mut h = host();
        let n = h.add(
            None,
            &[
                ("data-animate", "fade"),
                ("data-animate-duration", "800ms"),
                ("data-animate-delay", "150"),
                ("data-animate-hold", "soon"),
                ("data-animate-trigger", "3"),
            ],
            ON_SCREEN,
        );
        let c = controller(&mut h);
        let r = c.record(&n).unwrap();
        assert_eq!(r.duration, 800.0);
        assert_eq!(r.delay, 150.0);
        assert_eq!(r.hold, 220.0);
        assert_eq!(r.trigger, 1.0);
    }

    #[test]
    fn initial_styles_per_kind() {
        let mut h = host();
        let fade = h.add(None, &[("data-animate", "fade")], ON_SCREEN);
        let up = h.add(None, &[("data-animate", "fade-up")], ON_SCREEN);
        let reveal = h.add(None, &[("data-animate", "reveal")], ON_SCREEN);
        let scroller = h.add(None, &[("data-animate", "reveal")], ON_SCREEN);
        h.set_font_size(up, "20px");
        h.set_inline(scroller, StyleProperty::Overflow, "auto");
        controller(&mut h);

        assert_eq!(h.style(fade, StyleProperty::Opacity), Some("0"));
        assert_eq!(h.style(up, StyleProperty::Opacity), Some("0"));
        assert_eq!(
            h.style(up, StyleProperty::Transform),
            Some("translate3d(0.000px, 20.000px, 0)")
        );
        assert_eq!(h.style(reveal, StyleProperty::Overflow), Some("hidden"));
        assert_eq!(h.style(reveal, StyleProperty::ClipPath), Some("inset(0 0 100% 0)"));
        assert_eq!(h.style(reveal, StyleProperty::WillChange), Some("clip-path"));
        assert_eq!(h.style(scroller, StyleProperty::Overflow), Some("auto"));
        assert_eq!(
            h.style(fade, StyleProperty::WillChange),
            Some("opacity, transform")
        );
    }

    #[test]
    fn fade_plays_to_exact_final_value() {
        let mut h = host();
        let n = h.add(
            None,
            &[
                ("data-animate", "fade"),
                ("data-animate-duration", "1000"),
                ("data-animate-trigger", "0.5"),
                ("data-animate-hold", "0"),
            ],
            ON_SCREEN,
        );
        let mut c = controller(&mut h);

        c.update(&mut h, at(0.0));
        assert_eq!(h.style(n, StyleProperty::Opacity), Some("0"));

        c.update(&mut h, at(500.0));
        let mid: f64 = h.style(n, StyleProperty::Opacity).unwrap().parse().unwrap();
        assert!((mid - CubicBezier::STANDARD.ease(0.5)).abs() < 1e-9);

        c.update(&mut h, at(1000.0));
        assert_eq!(h.style(n, StyleProperty::Opacity), Some("1"));
        assert_eq!(c.phase(&n), Some(Phase::Done));

        let writes = h.write_count();
        c.update(&mut h, at(1500.0));
        c.update(&mut h, at(9000.0));
        assert_eq!(h.style(n, StyleProperty::Opacity), Some("1"));
        assert_eq!(h.write_count(), writes);
    }

    #[test]
    fn hold_gates_start() {
        let mut h = host();
        let n = h.add(
            None,
            &[("data-animate", "fade"), ("data-animate-hold", "200")],
            ON_SCREEN,
        );
        let mut c = controller(&mut h);

        c.update(&mut h, at(1000.0));
        assert_eq!(c.phase(&n), Some(Phase::Waiting { armed_at: at(1000.0) }));
        c.update(&mut h, at(1199.0));
        assert!(matches!(c.phase(&n), Some(Phase::Waiting { .. })));
        c.update(&mut h, at(1200.0));
        assert_eq!(c.phase(&n), Some(Phase::Playing { start: at(1200.0) }));
    }

    #[test]
    fn dropping_below_trigger_disarms() {
        let mut h = host();
        let n = h.add(None, &[("data-animate", "fade")], ON_SCREEN);
        let mut c = controller(&mut h);

        c.update(&mut h, at(0.0));
        assert!(matches!(c.phase(&n), Some(Phase::Waiting { .. })));

        h.set_layout(n, OFF_SCREEN);
        c.update(&mut h, at(100.0));
        assert_eq!(c.phase(&n), Some(Phase::Idle));
        assert_eq!(c.last_visibility(&n), Some(0.0));

        h.set_layout(n, ON_SCREEN);
        c.update(&mut h, at(300.0));
        assert_eq!(c.phase(&n), Some(Phase::Waiting { armed_at: at(300.0) }));
    }

    #[test]
    fn delay_postpones_first_write() {
        let mut h = host();
        let n = h.add(
            None,
            &[
                ("data-animate", "fade"),
                ("data-animate-hold", "0"),
                ("data-animate-delay", "300"),
            ],
            ON_SCREEN,
        );
        let mut c = controller(&mut h);
        c.update(&mut h, at(0.0));
        assert_eq!(c.phase(&n), Some(Phase::Playing { start: at(300.0) }));
        let writes = h.write_count();
        c.update(&mut h, at(200.0));
        assert_eq!(h.write_count(), writes);
        c.update(&mut h, at(300.0));
        assert_eq!(h.style(n, StyleProperty::Opacity), Some("0"));
        assert_eq!(h.write_count(), writes + 1);
    }

    #[test]
    fn fade_up_keeps_author_residual() {
        let mut h = host();
        let n = h.add(
            None,
            &[
                ("data-animate", "fade-up"),
                ("data-animate-hold", "0"),
                ("data-animate-duration", "100"),
            ],
            ON_SCREEN,
        );
        h.set_computed_transform(n, "matrix(2, 0, 0, 2, 0, 0)");
        let mut c = controller(&mut h);
        assert_eq!(
            h.style(n, StyleProperty::Transform),
            Some("scale(2.0000) translate3d(0.000px, 16.000px, 0)")
        );
        c.update(&mut h, at(0.0));
        c.update(&mut h, at(100.0));
        assert_eq!(
            h.style(n, StyleProperty::Transform),
            Some("scale(2.0000) translate3d(0.000px, 0.000px, 0)")
        );
        assert_eq!(h.style(n, StyleProperty::Opacity), Some("1"));
    }

    #[test]
    fn reveal_finishes_fully_open() {
        let mut h = host();
        let n = h.add(
            None,
            &[("data-animate", "reveal"), ("data-animate-hold", "0")],
            ON_SCREEN,
        );
        let mut c = controller(&mut h);
        c.update(&mut h, at(0.0));
        c.update(&mut h, at(600.0));
        let mid = h.style(n, StyleProperty::ClipPath).unwrap().to_string();
        assert!(mid.starts_with("inset(0 0 ") && mid != "inset(0 0 100% 0)", "{mid}");
        c.update(&mut h, at(1200.0));
        c.update(&mut h, at(1300.0));
        assert_eq!(h.style(n, StyleProperty::ClipPath), Some("inset(0 0 0% 0)"));
    }

    #[test]
    fn zero_duration_completes_immediately() {
        let mut h = host();
        let n = h.add(
            None,
            &[
                ("data-animate", "fade"),
                ("data-animate-hold", "0"),
                ("data-animate-duration", "0"),
            ],
            ON_SCREEN,
        );
        let mut c = controller(&mut h);
        c.update(&mut h, at(0.0));
        assert_eq!(c.phase(&n), Some(Phase::Done));
        assert_eq!(h.style(n, StyleProperty::Opacity), Some("1"));
    }

    #[test]
    fn reduced_motion_finalizes_without_ticks() {
        let mut h = host();
        h.set_reduced_motion(true);
        let fade = h.add(None, &[("data-animate", "fade")], OFF_SCREEN);
        let reveal = h.add(None, &[("data-animate", "reveal")], OFF_SCREEN);
        let c = controller(&mut h);

        assert!(c.reduced_motion());
        assert_eq!(c.phase(&fade), Some(Phase::Done));
        assert_eq!(c.phase(&reveal), Some(Phase::Done));
        assert_eq!(h.style(fade, StyleProperty::Opacity), Some("1"));
        assert_eq!(h.style(reveal, StyleProperty::ClipPath), Some("inset(0 0 0% 0)"));
        assert_eq!(c.pending_len(), 0);
    }

    #[test]
    fn refresh_rereads_font_size() {
        let mut h = host();
        let n = h.add(None, &[("data-animate", "fade-up")], ON_SCREEN);
        let mut c = controller(&mut h);
        assert_eq!(c.record(&n).unwrap().em, 16.0);
        h.set_font_size(n, "24px");
        c.refresh(&h);
        assert_eq!(c.record(&n).unwrap().em, 24.0);
    }

    #[test]
    fn recollect_keeps_finished_elements_finished() {
        let mut h = host();
        let n = h.add(
            None,
            &[("data-animate", "fade"), ("data-animate-hold", "0"), ("data-animate-duration", "10")],
            ON_SCREEN,
        );
        let mut c = controller(&mut h);
        c.update(&mut h, at(0.0));
        c.update(&mut h, at(10.0));
        assert_eq!(c.phase(&n), Some(Phase::Done));

        let added = h.add(None, &[("data-animate", "reveal")], OFF_SCREEN);
        assert!(c.nodes_added(&mut h, &[added]));
        assert_eq!(c.phase(&n), Some(Phase::Done));
        assert_eq!(h.style(n, StyleProperty::Opacity), Some("1"));
        assert_eq!(c.phase(&added), Some(Phase::Idle));
    }

    #[test]
    fn failing_element_does_not_block_others() {
        let mut h = host();
        let broken = h.add(None, &[("data-animate", "fade"), ("data-animate-hold", "0")], ON_SCREEN);
        let ok = h.add(None, &[("data-animate", "fade"), ("data-animate-hold", "0")], ON_SCREEN);
        let mut c = controller(&mut h);
        h.fail_writes(broken, true);
        c.update(&mut h, at(0.0));
        c.update(&mut h, at(5000.0));
        assert_eq!(h.style(ok, StyleProperty::Opacity), Some("1"));
        assert_eq!(c.phase(&broken), Some(Phase::Done));
    }

    #[test]
    fn timings_read_integer_prefix_only() {
        let mut h = host();
        let n = h.add(
            None,
            &[
                ("data-animate", "fade"),
                ("data-animate-duration", "1e3"),
                ("data-animate-hold", ".5"),
                ("data-animate-delay", "40.9ms"),
            ],
            ON_SCREEN,
        );
        let c = controller(&mut h);
        let r = c.record(&n).unwrap();
        assert_eq!(r.duration, 1.0);
        assert_eq!(r.hold, 220.0);
        assert_eq!(r.delay, 40.0);
    }

    #[test]
    fn shrinking_viewport_disarms() {
        let mut h = host();
        let n = h.add(None, &[("data-animate", "fade")], ON_SCREEN);
        let mut c = controller(&mut h);
        c.update(&mut h, at(0.0));
        assert_eq!(c.last_visibility(&n), Some(1.0));

        // Only 50 of 200px remain on screen.
        h.set_viewport(ViewportSize::new(1000.0, 150.0));
        c.update(&mut h, at(16.0));
        assert_eq!(c.last_visibility(&n), Some(0.25));
        assert_eq!(c.phase(&n), Some(Phase::Idle));
    }

    mod property_tests {
        use super::*;

        proptest! {
            #[test]
            fn never_plays_before_hold_elapses(
                hold in 0u32..2000,
                trigger in 0.0f64..=1.0,
                step in 1u32..50,
            ) {
                let mut h = host();
                let hold_attr = hold.to_string();
                let trigger_attr = trigger.to_string();
                let n = h.add(
                    None,
                    &[
                        ("data-animate", "fade"),
                        ("data-animate-hold", hold_attr.as_str()),
                        ("data-animate-trigger", trigger_attr.as_str()),
                    ],
                    ON_SCREEN,
                );
                let mut c = controller(&mut h);
                let t0 = 10_000.0;
                let mut now = t0;
                loop {
                    c.update(&mut h, at(now));
                    let playing = matches!(c.phase(&n), Some(Phase::Playing { .. }));
                    if now - t0 < hold as f64 {
                        prop_assert!(!playing, "playing early at {}", now);
                    } else {
                        prop_assert!(playing, "not playing at {}", now);
                        break;
                    }
                    now += step as f64;
                }
            }
        }
    }
}
