// Scroll-speed (parallax) controller: collects `[speed]` elements, keeps their active flags
// current, and eases each element's translateY toward a scroll-derived target every frame.

use serde::Serialize;

use crate::config::ParallaxConfig;
use crate::error::MotionError;
use crate::host::{added_nodes_match, write_or_warn, Host, ScanRoot};
use crate::ticker::FrameClient;
use crate::transform::{compose, decompose, Residual};
use crate::types::{parse_leading_f64, Frame, StyleProperty};
use crate::visibility::{ActivationMargin, IntersectionEntry};

/// Below this distance (px) the lerp snaps to its target.
const SNAP_DISTANCE: f64 = 0.05;

/// Per-element parallax state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MotionRecord {
    /// Clamped speed factor; negative moves against the scroll.
    pub speed: f64,
    pub base_x: f64,
    pub base_y: f64,
    pub residual: Residual,
    pub current_y: f64,
    pub target_y: f64,
    /// Author inline transform, restored on destroy.
    pub original_transform: String,
    /// Top edge in document coordinates.
    pub page_top: f64,
    pub height: f64,
    pub is_visible: bool,
}

#[derive(Debug, Clone)]
struct Tracked<N> {
    node: N,
    record: MotionRecord,
}

/// One parallax controller instance. Register it with a [`Ticker`](crate::ticker::Ticker)
/// to receive frames.
#[derive(Debug)]
pub struct ParallaxController<N> {
    config: ParallaxConfig,
    margin: ActivationMargin,
    tracked: Vec<Tracked<N>>,
    needs_render: bool,
    last_scroll: Option<f64>,
}

impl<N: Clone + PartialEq + std::fmt::Debug> ParallaxController<N> {
    /// Validate `config`, collect matching elements and write their baseline transforms.
    pub fn new<H: Host<Node = N>>(host: &mut H, config: ParallaxConfig) -> Result<Self, MotionError> {
        config.validate()?;
        let margin = config.margin()?;
        let mut controller = ParallaxController {
            config,
            margin,
            tracked: Vec::new(),
            needs_render: true,
            last_scroll: None,
        };
        controller.collect(host);
        controller.needs_render = true;
        Ok(controller)
    }

    pub fn config(&self) -> &ParallaxConfig {
        &self.config
    }

    /// Re-scan the root. Elements that still match keep their record (re-reading only the
    /// speed); new matches get a fresh record and their baseline transform written.
    pub fn collect<H: Host<Node = N>>(&mut self, host: &mut H) {
        let mut previous = std::mem::take(&mut self.tracked);

        let root = ScanRoot::resolve(&*host, self.config.root.as_deref());
        let nodes = root.query(&*host, &self.config.selector);
        let [lo, hi] = self.config.clamp;
        let scroll = host.native_scroll_y();

        for node in nodes {
            let Some(raw) = host
                .attribute(&node, &self.config.attribute)
                .and_then(|v| parse_leading_f64(&v))
            else {
                log::debug!("parallax: skipping {:?}, no numeric {}", node, self.config.attribute);
                continue;
            };
            let speed = raw.clamp(lo, hi);

            if let Some(pos) = previous.iter().position(|t| t.node == node) {
                let mut kept = previous.swap_remove(pos);
                kept.record.speed = speed;
                self.tracked.push(kept);
                continue;
            }

            let base = decompose(host.computed_transform(&node).as_deref());
            let rect = host.bounding_rect(&node);
            let record = MotionRecord {
                speed,
                base_x: base.x,
                base_y: base.y,
                residual: base.residual,
                current_y: base.y,
                target_y: base.y,
                original_transform: host
                    .inline_style(&node, StyleProperty::Transform)
                    .unwrap_or_default(),
                page_top: rect.top + scroll,
                height: rect.height,
                is_visible: false,
            };

            if self.config.will_change_hint {
                write_or_warn(host, &node, StyleProperty::WillChange, "transform");
            }
            let baseline = compose(record.base_x, record.base_y, &record.residual);
            write_or_warn(host, &node, StyleProperty::Transform, &baseline);

            self.tracked.push(Tracked { node, record });
        }
        log::debug!(
            "parallax: tracking {} elements ({} dropped)",
            self.tracked.len(),
            previous.len()
        );
    }

    /// Recompute document offsets and heights after layout changes. Does not re-scan.
    pub fn refresh<H: Host<Node = N>>(&mut self, host: &H) {
        let scroll = host.native_scroll_y();
        for t in &mut self.tracked {
            let rect = host.bounding_rect(&t.node);
            t.record.page_top = rect.top + scroll;
            t.record.height = rect.height;
        }
        self.needs_render = true;
    }

    /// Restore author transforms. The controller is consumed, so no writes can follow.
    pub fn destroy<H: Host<Node = N>>(self, host: &mut H) {
        for t in &self.tracked {
            write_or_warn(host, &t.node, StyleProperty::Transform, &t.record.original_transform);
        }
        log::debug!("parallax: destroyed, restored {} elements", self.tracked.len());
    }

    /// Apply visibility changes from an intersection observer.
    pub fn on_intersection(&mut self, entries: &[IntersectionEntry<N>]) {
        for entry in entries {
            let Some(t) = self.tracked.iter_mut().find(|t| t.node == entry.node) else {
                continue;
            };
            t.record.is_visible = entry.is_intersecting;
            if entry.is_intersecting {
                self.needs_render = true;
            }
        }
    }

    /// Poll-based observer: compare every element against the margin-expanded viewport
    /// and feed the changes to [`on_intersection`](Self::on_intersection).
    pub fn observe_intersections<H: Host<Node = N>>(&mut self, host: &H) {
        let viewport = host.viewport();
        let entries: Vec<IntersectionEntry<N>> = self
            .tracked
            .iter()
            .filter_map(|t| {
                let hit = self.margin.intersects(&host.bounding_rect(&t.node), viewport);
                (hit != t.record.is_visible).then(|| IntersectionEntry {
                    node: t.node.clone(),
                    is_intersecting: hit,
                })
            })
            .collect();
        if !entries.is_empty() {
            self.on_intersection(&entries);
        }
    }

    /// Mutation hook: re-collect when an added subtree carries a match.
    /// Returns whether a re-scan happened.
    pub fn nodes_added<H: Host<Node = N>>(&mut self, host: &mut H, added: &[N]) -> bool {
        if !self.config.auto_observe || !added_nodes_match(&*host, added, &self.config.selector) {
            return false;
        }
        self.collect(host);
        self.needs_render = true;
        true
    }

    /// Advance every active element one frame toward its scroll target.
    pub fn update<H: Host<Node = N>>(&mut self, host: &mut H, scroll_y: f64) {
        if self.last_scroll != Some(scroll_y) {
            self.needs_render = true;
            self.last_scroll = Some(scroll_y);
        }
        if !self.needs_render {
            log::trace!("parallax: idle frame");
            return;
        }

        let (multiplier, ease) = (self.config.multiplier, self.config.ease);
        let any_active = self.tracked.iter().any(|t| t.record.is_visible);
        if !any_active {
            log::trace!("parallax: no active elements, sweeping all {}", self.tracked.len());
        }

        let mut still_animating = false;
        for t in self.tracked.iter_mut().filter(|t| !any_active || t.record.is_visible) {
            let d = &mut t.record;
            let delta = (scroll_y - d.page_top) * d.speed * multiplier;
            d.target_y = d.base_y + delta;

            let next_y = d.current_y + (d.target_y - d.current_y) * ease;
            if (next_y - d.target_y).abs() < SNAP_DISTANCE {
                d.current_y = d.target_y;
            } else {
                d.current_y = next_y;
                still_animating = true;
            }

            let value = compose(d.base_x, d.current_y, &d.residual);
            write_or_warn(host, &t.node, StyleProperty::Transform, &value);
        }

        self.needs_render = still_animating;
    }

    pub fn record(&self, node: &N) -> Option<&MotionRecord> {
        self.tracked.iter().find(|t| &t.node == node).map(|t| &t.record)
    }

    pub fn records(&self) -> impl Iterator<Item = (&N, &MotionRecord)> {
        self.tracked.iter().map(|t| (&t.node, &t.record))
    }

    pub fn tracked_len(&self) -> usize {
        self.tracked.len()
    }

    pub fn active_len(&self) -> usize {
        self.tracked.iter().filter(|t| t.record.is_visible).count()
    }

    /// Whether the next frame will write even if the scroll offset does not change.
    pub fn needs_render(&self) -> bool {
        self.needs_render
    }
}

impl<H: Host> FrameClient<H> for ParallaxController<H::Node> {
    fn on_frame(&mut self, host: &mut H, frame: &Frame) {
        self.update(host, frame.scroll_y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryHost, NodeId};
    use crate::types::{Rect, ViewportSize};
    use proptest::prelude::*;

    fn host() -> MemoryHost {
        MemoryHost::new(ViewportSize::new(1000.0, 800.0))
    }

    fn config(multiplier: f64, ease: f64) -> ParallaxConfig {
        ParallaxConfig {
            multiplier,
            ease,
            ..ParallaxConfig::default()
        }
    }

    fn add_speed(host: &mut MemoryHost, speed: &str, top: f64) -> NodeId {
        host.add(None, &[("speed", speed)], Rect::new(0.0, top, 100.0, 100.0))
    }

    #[test]
    fn instant_ease_reaches_target_in_one_frame() {
        let mut h = host();
        let n = add_speed(&mut h, "2", 0.0);
        let mut c = ParallaxController::new(&mut h, config(0.1, 1.0)).unwrap();

        c.update(&mut h, 0.0);
        c.update(&mut h, 100.0);

        let r = c.record(&n).unwrap();
        assert_eq!(r.target_y, 20.0);
        assert_eq!(r.current_y, 20.0);
        assert_eq!(
            h.style(n, StyleProperty::Transform),
            Some("translate3d(0.000px, 20.000px, 0)")
        );
        assert!(!c.needs_render());
    }

    #[test]
    fn collection_writes_baseline_and_hint() {
        let mut h = host();
        let n = add_speed(&mut h, "1", 300.0);
        h.set_computed_transform(n, "matrix(1, 0, 0, 1, 5, 10)");
        h.set_scroll_y(50.0);
        let c = ParallaxController::new(&mut h, ParallaxConfig::default()).unwrap();

        let r = c.record(&n).unwrap();
        assert_eq!((r.base_x, r.base_y), (5.0, 10.0));
        assert_eq!(r.page_top, 300.0);
        assert_eq!(
            h.style(n, StyleProperty::Transform),
            Some("translate3d(5.000px, 10.000px, 0)")
        );
        assert_eq!(h.style(n, StyleProperty::WillChange), Some("transform"));
    }

    #[test]
    fn non_numeric_speed_is_skipped() {
        let mut h = host();
        let bad = add_speed(&mut h, "fast", 0.0);
        let good = add_speed(&mut h, "0.5", 0.0);
        let c = ParallaxController::new(&mut h, ParallaxConfig::default()).unwrap();
        assert_eq!(c.tracked_len(), 1);
        assert!(c.record(&bad).is_none());
        assert!(c.record(&good).is_some());
        assert_eq!(h.style(bad, StyleProperty::Transform), None);
    }

    #[test]
    fn idle_frames_write_nothing() {
        let mut h = host();
        add_speed(&mut h, "1", 0.0);
        let mut c = ParallaxController::new(&mut h, config(0.1, 1.0)).unwrap();
        c.update(&mut h, 10.0);
        let writes = h.write_count();
        c.update(&mut h, 10.0);
        c.update(&mut h, 10.0);
        assert_eq!(h.write_count(), writes);
    }

    #[test]
    fn lerp_converges_within_predicted_frames() {
        let mut h = host();
        let n = add_speed(&mut h, "1", 0.0);
        // Target 100px away: scroll 1000 * speed 1 * multiplier 0.1.
        let mut c = ParallaxController::new(&mut h, config(0.1, 0.12)).unwrap();
        // Gap shrinks by 0.88 per frame: 100 * 0.88^n < 0.05 at n = 60.
        let bound = ((100.0_f64 / SNAP_DISTANCE).ln() / (1.0_f64 / 0.88).ln()).ceil() as usize;
        let mut frames = 0;
        loop {
            c.update(&mut h, 1000.0);
            frames += 1;
            if !c.needs_render() {
                break;
            }
            assert!(frames <= bound, "did not converge in {bound} frames");
        }
        let r = c.record(&n).unwrap();
        assert_eq!(r.current_y, r.target_y);
        assert_eq!(r.target_y, 100.0);
    }

    #[test]
    fn inactive_elements_freeze_while_others_are_active() {
        let mut h = host();
        let a = add_speed(&mut h, "1", 0.0);
        let b = add_speed(&mut h, "1", 5000.0);
        let mut c = ParallaxController::new(&mut h, config(0.1, 1.0)).unwrap();

        c.on_intersection(&[IntersectionEntry {
            node: a,
            is_intersecting: true,
        }]);
        c.update(&mut h, 200.0);

        assert_eq!(c.record(&a).unwrap().current_y, 20.0);
        assert_eq!(c.record(&b).unwrap().current_y, 0.0);
        assert_eq!(c.active_len(), 1);
    }

    #[test]
    fn no_active_elements_sweeps_all() {
        let mut h = host();
        let a = add_speed(&mut h, "1", 0.0);
        let b = add_speed(&mut h, "-1", 0.0);
        let mut c = ParallaxController::new(&mut h, config(0.1, 1.0)).unwrap();
        c.update(&mut h, 100.0);
        assert_eq!(c.record(&a).unwrap().current_y, 10.0);
        assert_eq!(c.record(&b).unwrap().current_y, -10.0);
    }

    #[test]
    fn polled_observer_uses_activation_margin() {
        let mut h = host();
        let near = add_speed(&mut h, "1", 1000.0);
        let far = add_speed(&mut h, "1", 3000.0);
        let mut c = ParallaxController::new(&mut h, ParallaxConfig::default()).unwrap();

        c.observe_intersections(&h);
        assert!(c.record(&near).unwrap().is_visible);
        assert!(!c.record(&far).unwrap().is_visible);

        h.set_scroll_y(2500.0);
        c.observe_intersections(&h);
        assert!(!c.record(&near).unwrap().is_visible);
        assert!(c.record(&far).unwrap().is_visible);
    }

    #[test]
    fn refresh_recomputes_offsets_only() {
        let mut h = host();
        let n = add_speed(&mut h, "1", 100.0);
        let mut c = ParallaxController::new(&mut h, ParallaxConfig::default()).unwrap();
        h.set_layout(n, Rect::new(0.0, 400.0, 100.0, 250.0));
        add_speed(&mut h, "1", 0.0);

        c.refresh(&h);
        let r = c.record(&n).unwrap();
        assert_eq!(r.page_top, 400.0);
        assert_eq!(r.height, 250.0);
        assert_eq!(c.tracked_len(), 1);
        assert!(c.needs_render());
    }

    #[test]
    fn destroy_restores_author_transform() {
        let mut h = host();
        let styled = add_speed(&mut h, "1", 0.0);
        let plain = add_speed(&mut h, "1", 0.0);
        h.set_inline(styled, StyleProperty::Transform, "rotate(10deg)");
        let mut c = ParallaxController::new(&mut h, config(0.1, 1.0)).unwrap();
        c.update(&mut h, 300.0);

        c.destroy(&mut h);
        assert_eq!(h.style(styled, StyleProperty::Transform), Some("rotate(10deg)"));
        assert_eq!(h.style(plain, StyleProperty::Transform), None);
    }

    #[test]
    fn residual_survives_every_rewrite() {
        let mut h = host();
        let n = add_speed(&mut h, "1", 0.0);
        h.set_inline(n, StyleProperty::Transform, "rotate(45deg) scale(2)");
        let mut c = ParallaxController::new(&mut h, config(0.1, 1.0)).unwrap();
        c.update(&mut h, 50.0);
        assert_eq!(
            h.style(n, StyleProperty::Transform),
            Some("rotate(45.0000deg) scale(2.0000) translate3d(0.000px, 5.000px, 0)")
        );
    }

    #[test]
    fn added_matching_subtree_triggers_recollect() {
        let mut h = host();
        add_speed(&mut h, "1", 0.0);
        let mut c = ParallaxController::new(&mut h, ParallaxConfig::default()).unwrap();

        let wrapper = h.add(None, &[], Rect::default());
        let inner = h.add(Some(wrapper), &[("speed", "2")], Rect::default());
        let unrelated = h.add(None, &[("class", "x")], Rect::default());

        assert!(!c.nodes_added(&mut h, &[unrelated]));
        assert!(c.nodes_added(&mut h, &[wrapper]));
        assert_eq!(c.tracked_len(), 2);
        assert!(c.record(&inner).is_some());
    }

    #[test]
    fn recollect_keeps_existing_state() {
        let mut h = host();
        let n = add_speed(&mut h, "1", 0.0);
        h.set_inline(n, StyleProperty::Transform, "translateY(7px)");
        let mut c = ParallaxController::new(&mut h, config(0.1, 1.0)).unwrap();
        c.update(&mut h, 100.0);

        h.set_attribute(n, "speed", "2");
        let extra = add_speed(&mut h, "1", 0.0);
        assert!(c.nodes_added(&mut h, &[extra]));

        let r = c.record(&n).unwrap();
        // Baseline comes from the author transform, not the animated one.
        assert_eq!(r.base_y, 7.0);
        assert_eq!(r.original_transform, "translateY(7px)");
        assert_eq!(r.speed, 2.0);
        assert_eq!(c.tracked_len(), 2);
    }

    #[test]
    fn removed_elements_are_dropped_on_recollect() {
        let mut h = host();
        let gone = add_speed(&mut h, "1", 0.0);
        let stays = add_speed(&mut h, "1", 0.0);
        let mut c = ParallaxController::new(&mut h, ParallaxConfig::default()).unwrap();
        h.remove(gone);
        c.collect(&mut h);
        assert!(c.record(&gone).is_none());
        assert!(c.record(&stays).is_some());
    }

    #[test]
    fn auto_observe_off_ignores_mutations() {
        let mut h = host();
        let cfg = ParallaxConfig {
            auto_observe: false,
            ..ParallaxConfig::default()
        };
        let mut c = ParallaxController::new(&mut h, cfg).unwrap();
        let n = add_speed(&mut h, "1", 0.0);
        assert!(!c.nodes_added(&mut h, &[n]));
        assert_eq!(c.tracked_len(), 0);
    }

    #[test]
    fn failing_element_does_not_stop_others() {
        let mut h = host();
        let broken = add_speed(&mut h, "1", 0.0);
        let ok = add_speed(&mut h, "1", 0.0);
        let mut c = ParallaxController::new(&mut h, config(0.1, 1.0)).unwrap();
        h.fail_writes(broken, true);
        c.update(&mut h, 100.0);
        assert_eq!(
            h.style(ok, StyleProperty::Transform),
            Some("translate3d(0.000px, 10.000px, 0)")
        );
    }

    #[test]
    fn missing_root_tracks_nothing() {
        let mut h = host();
        add_speed(&mut h, "1", 0.0);
        let cfg = ParallaxConfig {
            root: Some("[data-scroll-root]".to_string()),
            ..ParallaxConfig::default()
        };
        let c = ParallaxController::new(&mut h, cfg).unwrap();
        assert_eq!(c.tracked_len(), 0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut h = host();
        let cfg = ParallaxConfig {
            ease: 0.0,
            ..ParallaxConfig::default()
        };
        assert!(ParallaxController::new(&mut h, cfg).is_err());
    }

    #[test]
    fn unmarked_element_is_dropped_on_recollect() {
        let mut h = host();
        let a = add_speed(&mut h, "1", 0.0);
        let b = add_speed(&mut h, "1", 0.0);
        let mut c = ParallaxController::new(&mut h, ParallaxConfig::default()).unwrap();

        h.remove_attribute(a, "speed");
        c.collect(&mut h);
        assert!(c.record(&a).is_none());
        assert!(c.record(&b).is_some());
        assert_eq!(c.tracked_len(), 1);
    }

    mod property_tests {
        use super::*;

        proptest! {
            #[test]
            fn speed_is_clamped(raw in -50.0f64..50.0, lo in -5.0f64..0.0, hi in 0.0f64..5.0) {
                let mut h = host();
                let n = add_speed(&mut h, &raw.to_string(), 0.0);
                let cfg = ParallaxConfig { clamp: [lo, hi], ..ParallaxConfig::default() };
                let c = ParallaxController::new(&mut h, cfg).unwrap();
                let speed = c.record(&n).unwrap().speed;
                prop_assert!(speed >= lo && speed <= hi);
                if raw < lo {
                    prop_assert_eq!(speed, lo);
                } else if raw > hi {
                    prop_assert_eq!(speed, hi);
                } else {
                    prop_assert_eq!(speed, raw);
                }
            }

            #[test]
            fn lerp_always_converges(gap in -2000.0f64..2000.0, ease in 0.05f64..=1.0) {
                let mut h = host();
                let n = add_speed(&mut h, "1", 0.0);
                let mut c = ParallaxController::new(&mut h, config(1.0, ease)).unwrap();
                let mut frames = 0;
                loop {
                    c.update(&mut h, gap);
                    frames += 1;
                    if !c.needs_render() { break; }
                    prop_assert!(frames < 400);
                }
                let r = c.record(&n).unwrap();
                prop_assert_eq!(r.current_y, r.target_y);
            }
        }
    }
}
