// Shared per-frame scheduler, one per controller kind. The host drives it (from
// requestAnimationFrame in the browser, by hand in tests) with a timestamp.

use serde::Deserialize;

use crate::error::MotionError;
use crate::host::Host;
use crate::types::{Frame, Timestamp};

/// A controller that wants a callback every animation frame.
pub trait FrameClient<H: Host> {
    fn on_frame(&mut self, host: &mut H, frame: &Frame);
}

/// Registration handle returned by [`Ticker::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u32);

impl InstanceId {
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    pub fn from_u32(id: u32) -> Self {
        InstanceId(id)
    }
}

/// Scroll event payload from a smooth-scroll library. Different versions report
/// `scroll` or `animatedScroll`; the first numeric one wins.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
struct ScrollPayload {
    #[serde(default)]
    scroll: Option<f64>,
    #[serde(default, rename = "animatedScroll")]
    animated_scroll: Option<f64>,
}

/// Owns every live instance of one controller kind and ticks them in registration order.
#[derive(Debug)]
pub struct Ticker<C> {
    instances: Vec<(InstanceId, C)>,
    next_id: u32,
    pushed_scroll: Option<f64>,
}

impl<C> Ticker<C> {
    pub fn new() -> Self {
        Ticker {
            instances: Vec::new(),
            next_id: 1,
            pushed_scroll: None,
        }
    }

    pub fn register(&mut self, instance: C) -> InstanceId {
        let id = InstanceId(self.next_id);
        self.next_id += 1;
        self.instances.push((id, instance));
        log::debug!("ticker: registered instance {}", id.0);
        id
    }

    /// Remove an instance; it receives no further frames.
    pub fn unregister(&mut self, id: InstanceId) -> Option<C> {
        let pos = self.instances.iter().position(|(i, _)| *i == id)?;
        log::debug!("ticker: unregistered instance {}", id.0);
        Some(self.instances.remove(pos).1)
    }

    pub fn get(&self, id: InstanceId) -> Option<&C> {
        self.instances.iter().find(|(i, _)| *i == id).map(|(_, c)| c)
    }

    pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut C> {
        self.instances
            .iter_mut()
            .find(|(i, _)| *i == id)
            .map(|(_, c)| c)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut C> {
        self.instances.iter_mut().map(|(_, c)| c)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Push-based scroll offset from a smooth-scroll library. Once any value has been
    /// pushed it takes precedence over the host's native reading.
    pub fn push_scroll(&mut self, y: f64) {
        if y.is_finite() {
            self.pushed_scroll = Some(y);
        }
    }

    /// Push a raw scroll event (`{"scroll": ..}` or `{"animatedScroll": ..}`).
    /// Payloads without a usable number are ignored.
    pub fn push_scroll_event(&mut self, json: &str) -> Result<(), MotionError> {
        let payload: ScrollPayload = serde_json::from_str(json)?;
        if let Some(y) = payload.scroll.or(payload.animated_scroll) {
            self.push_scroll(y);
        }
        Ok(())
    }

    /// Best known vertical scroll offset.
    pub fn scroll_y<H: Host>(&self, host: &H) -> f64 {
        self.pushed_scroll.unwrap_or_else(|| host.native_scroll_y())
    }

    /// Run one frame for every registered instance.
    pub fn tick<H: Host>(&mut self, host: &mut H, now: Timestamp) -> Frame
    where
        C: FrameClient<H>,
    {
        let frame = Frame {
            now,
            scroll_y: self.scroll_y(host),
        };
        for (_, instance) in &mut self.instances {
            instance.on_frame(host, &frame);
        }
        frame
    }
}

impl<C> Default for Ticker<C> {
    fn default() -> Self {
        Self::new()
    }
}
