// Browser binding: `WebHost` implements `Host` over web-sys, and `MotionRuntime` is the
// JS-facing facade that owns both tickers and drives them from requestAnimationFrame.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::{Rc, Weak};

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    Document, Element, HtmlElement, IntersectionObserver, IntersectionObserverEntry,
    IntersectionObserverInit, MutationObserver, MutationObserverInit, MutationRecord, Node, Window,
};

use crate::config::{EntranceConfig, ParallaxConfig};
use crate::entrance::EntranceController;
use crate::error::{HostError, MotionError};
use crate::host::{Host, ScanRoot};
use crate::parallax::ParallaxController;
use crate::ticker::{InstanceId, Ticker};
use crate::types::{Rect, StyleProperty, Timestamp, ViewportSize};
use crate::visibility::IntersectionEntry;

const REDUCED_MOTION_QUERY: &str = "(prefers-reduced-motion: reduce)";

/// The live document of the current window.
#[derive(Debug, Clone)]
pub struct WebHost {
    window: Window,
    document: Document,
}

impl WebHost {
    pub fn new() -> Result<Self, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no global window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("window has no document"))?;
        Ok(WebHost { window, document })
    }

    fn computed(&self, node: &Element, property: &str) -> Option<String> {
        let style = self.window.get_computed_style(node).ok().flatten()?;
        style
            .get_property_value(property)
            .ok()
            .filter(|v| !v.is_empty())
    }
}

impl Host for WebHost {
    type Node = Element;

    fn query_all(&self, scope: Option<&Element>, selector: &str) -> Vec<Element> {
        let list = match scope {
            Some(root) => root.query_selector_all(selector),
            None => self.document.query_selector_all(selector),
        };
        let Ok(list) = list else {
            log::warn!("unsupported selector {:?}", selector);
            return Vec::new();
        };
        (0..list.length())
            .filter_map(|i| list.item(i))
            .filter_map(|n| n.dyn_into::<Element>().ok())
            .collect()
    }

    fn matches(&self, node: &Element, selector: &str) -> bool {
        node.matches(selector).unwrap_or(false)
    }

    fn attribute(&self, node: &Element, name: &str) -> Option<String> {
        node.get_attribute(name)
    }

    fn computed_transform(&self, node: &Element) -> Option<String> {
        self.computed(node, "transform")
    }

    fn computed_font_size(&self, node: &Element) -> Option<String> {
        self.computed(node, "font-size")
    }

    fn bounding_rect(&self, node: &Element) -> Rect {
        let r = node.get_bounding_client_rect();
        Rect::new(r.left(), r.top(), r.width(), r.height())
    }

    fn inline_style(&self, node: &Element, property: StyleProperty) -> Option<String> {
        node.dyn_ref::<HtmlElement>()?
            .style()
            .get_property_value(property.css_name())
            .ok()
            .filter(|v| !v.is_empty())
    }

    fn set_style(&mut self, node: &Element, property: StyleProperty, value: &str) -> Result<(), HostError> {
        let name = property.css_name();
        let style = node
            .dyn_ref::<HtmlElement>()
            .ok_or_else(|| HostError::StyleWrite {
                property: name,
                message: "not an HTML element".to_string(),
            })?
            .style();
        let result = if value.is_empty() {
            style.remove_property(name).map(|_| ())
        } else {
            style.set_property(name, value)
        };
        result.map_err(|e| HostError::StyleWrite {
            property: name,
            message: format!("{:?}", e),
        })
    }

    fn viewport(&self) -> ViewportSize {
        let read = |v: Result<JsValue, JsValue>| v.ok().and_then(|v| v.as_f64());
        let fallback = ViewportSize::default();
        ViewportSize::new(
            read(self.window.inner_width()).unwrap_or(fallback.width),
            read(self.window.inner_height()).unwrap_or(fallback.height),
        )
    }

    fn native_scroll_y(&self) -> f64 {
        self.window.scroll_y().unwrap_or(0.0)
    }

    fn prefers_reduced_motion(&self) -> bool {
        self.window
            .match_media(REDUCED_MOTION_QUERY)
            .ok()
            .flatten()
            .is_some_and(|m| m.matches())
    }
}

fn to_js(err: MotionError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

struct RuntimeState {
    host: WebHost,
    parallax: Ticker<ParallaxController<Element>>,
    entrance: Ticker<EntranceController<Element>>,
    /// Parallax instances without an IntersectionObserver; their visibility is polled per frame.
    polled: BTreeSet<InstanceId>,
}

impl RuntimeState {
    fn frame(&mut self, now: Timestamp) {
        let RuntimeState {
            host,
            parallax,
            entrance,
            polled,
        } = self;
        for id in polled.iter() {
            if let Some(controller) = parallax.get_mut(*id) {
                controller.observe_intersections(&*host);
            }
        }
        parallax.tick(host, now);
        entrance.tick(host, now);
    }

    fn refresh_parallax(&mut self) {
        let RuntimeState { host, parallax, .. } = self;
        for controller in parallax.iter_mut() {
            controller.refresh(&*host);
        }
    }

    /// Node a mutation observer for `root` should watch: the resolved root element, else the document.
    fn watch_root(&self, root: Option<&str>) -> Node {
        match ScanRoot::resolve(&self.host, root) {
            ScanRoot::Element(el) => el.into(),
            ScanRoot::Document | ScanRoot::Missing => self.host.document.clone().into(),
        }
    }
}

type SharedState = Rc<RefCell<RuntimeState>>;
type FrameCallback = Closure<dyn FnMut(f64)>;
type ObserverCallback = Closure<dyn FnMut(js_sys::Array)>;

/// Browser observers attached to one controller instance. Dropping disconnects them.
#[derive(Default)]
struct Watchers {
    mutation: Option<(MutationObserver, ObserverCallback)>,
    intersection: Option<(IntersectionObserver, ObserverCallback)>,
}

impl Drop for Watchers {
    fn drop(&mut self) {
        if let Some((observer, _)) = &self.mutation {
            observer.disconnect();
        }
        if let Some((observer, _)) = &self.intersection {
            observer.disconnect();
        }
    }
}

/// Run `f` against the live state if the runtime still exists and is not mid-frame.
fn with_state(weak: &Weak<RefCell<RuntimeState>>, f: impl FnOnce(&mut RuntimeState)) {
    let Some(shared) = weak.upgrade() else {
        return;
    };
    match shared.try_borrow_mut() {
        Ok(mut state) => f(&mut state),
        Err(_) => log::warn!("observer callback during a frame, skipped"),
    };
}

fn added_elements(records: &js_sys::Array) -> Vec<Element> {
    records
        .iter()
        .filter_map(|r| r.dyn_into::<MutationRecord>().ok())
        .flat_map(|r| {
            let nodes = r.added_nodes();
            (0..nodes.length()).filter_map(move |i| nodes.item(i))
        })
        .filter_map(|n| n.dyn_into::<Element>().ok())
        .collect()
}

fn intersection_entries(entries: &js_sys::Array) -> Vec<IntersectionEntry<Element>> {
    entries
        .iter()
        .filter_map(|e| e.dyn_into::<IntersectionObserverEntry>().ok())
        .map(|e| IntersectionEntry {
            node: e.target(),
            is_intersecting: e.is_intersecting(),
        })
        .collect()
}

/// Watch `root` for added subtrees (childList + subtree).
fn observe_mutations(
    root: &Node,
    mut on_added: impl FnMut(Vec<Element>) + 'static,
) -> Result<(MutationObserver, ObserverCallback), JsValue> {
    let callback = Closure::wrap(Box::new(move |records: js_sys::Array| {
        let added = added_elements(&records);
        if !added.is_empty() {
            on_added(added);
        }
    }) as Box<dyn FnMut(js_sys::Array)>);
    let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
    let init = MutationObserverInit::new();
    init.set_child_list(true);
    init.set_subtree(true);
    observer.observe_with_options(root, &init)?;
    Ok((observer, callback))
}

/// Viewport intersection observer grown by `root_margin`, reporting on entry and full visibility.
fn observe_visibility(
    root_margin: &str,
    mut on_entries: impl FnMut(Vec<IntersectionEntry<Element>>) + 'static,
) -> Result<(IntersectionObserver, ObserverCallback), JsValue> {
    let callback = Closure::wrap(Box::new(move |entries: js_sys::Array| {
        on_entries(intersection_entries(&entries));
    }) as Box<dyn FnMut(js_sys::Array)>);
    let init = IntersectionObserverInit::new();
    init.set_root_margin(root_margin);
    let thresholds = js_sys::Array::of2(&JsValue::from_f64(0.0), &JsValue::from_f64(1.0));
    init.set_threshold(&thresholds);
    let observer = IntersectionObserver::new_with_options(callback.as_ref().unchecked_ref(), &init)?;
    Ok((observer, callback))
}

/// Re-point `observer` at exactly the elements `controller` tracks.
fn observe_tracked(observer: &IntersectionObserver, controller: &ParallaxController<Element>) {
    observer.disconnect();
    for (node, _) in controller.records() {
        observer.observe(node);
    }
}

/// Observers for a freshly registered parallax instance. Falls back to per-frame polling
/// when the IntersectionObserver cannot be built (for instance a margin the browser rejects).
fn watch_parallax(shared: &SharedState, state: &mut RuntimeState, id: InstanceId) -> Watchers {
    let Some(config) = state.parallax.get(id).map(|c| c.config().clone()) else {
        return Watchers::default();
    };

    let weak = Rc::downgrade(shared);
    let intersection = match observe_visibility(&config.activation_margin, move |entries| {
        with_state(&weak, |s| {
            if let Some(controller) = s.parallax.get_mut(id) {
                controller.on_intersection(&entries);
            }
        })
    }) {
        Ok((observer, callback)) => {
            if let Some(controller) = state.parallax.get(id) {
                observe_tracked(&observer, controller);
            }
            Some((observer, callback))
        }
        Err(e) => {
            log::warn!("parallax {}: polling visibility, no IntersectionObserver: {:?}", id.as_u32(), e);
            state.polled.insert(id);
            None
        }
    };

    let mutation = if config.auto_observe {
        let weak = Rc::downgrade(shared);
        let visibility = intersection.as_ref().map(|(observer, _)| observer.clone());
        let root = state.watch_root(config.root.as_deref());
        observe_mutations(&root, move |added| {
            with_state(&weak, |s| {
                let RuntimeState { host, parallax, .. } = s;
                let Some(controller) = parallax.get_mut(id) else {
                    return;
                };
                if controller.nodes_added(host, &added) {
                    if let Some(observer) = &visibility {
                        observe_tracked(observer, controller);
                    }
                }
            })
        })
        .map_err(|e| log::warn!("parallax {}: no MutationObserver: {:?}", id.as_u32(), e))
        .ok()
    } else {
        None
    };

    Watchers {
        mutation,
        intersection,
    }
}

fn watch_entrance(shared: &SharedState, state: &RuntimeState, id: InstanceId) -> Watchers {
    let Some(config) = state.entrance.get(id).map(|c| c.config().clone()) else {
        return Watchers::default();
    };
    if !config.auto_observe {
        return Watchers::default();
    }

    let weak = Rc::downgrade(shared);
    let root = state.watch_root(config.root.as_deref());
    let mutation = observe_mutations(&root, move |added| {
        with_state(&weak, |s| {
            let RuntimeState { host, entrance, .. } = s;
            if let Some(controller) = entrance.get_mut(id) {
                controller.nodes_added(host, &added);
            }
        })
    })
    .map_err(|e| log::warn!("entrance {}: no MutationObserver: {:?}", id.as_u32(), e))
    .ok();

    Watchers {
        mutation,
        intersection: None,
    }
}

/// JS entry point. One runtime per page is the intended use.
#[wasm_bindgen]
pub struct MotionRuntime {
    state: SharedState,
    parallax_watchers: BTreeMap<InstanceId, Watchers>,
    entrance_watchers: BTreeMap<InstanceId, Watchers>,
    frame_loop: Rc<RefCell<Option<FrameCallback>>>,
    pending_frame: Rc<Cell<Option<i32>>>,
    on_resize: Closure<dyn FnMut()>,
}

#[wasm_bindgen]
impl MotionRuntime {
    /// Create the runtime and install resize/orientationchange listeners. Call `start()`
    /// to begin ticking, or drive `frame()` yourself.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<MotionRuntime, JsValue> {
        let host = WebHost::new()?;
        let window = host.window.clone();
        let state = Rc::new(RefCell::new(RuntimeState {
            host,
            parallax: Ticker::new(),
            entrance: Ticker::new(),
            polled: BTreeSet::new(),
        }));

        let resize_state = state.clone();
        let on_resize = Closure::wrap(Box::new(move || match resize_state.try_borrow_mut() {
            Ok(mut s) => s.refresh_parallax(),
            Err(_) => log::warn!("resize during frame, refresh skipped"),
        }) as Box<dyn FnMut()>);
        for event in ["resize", "orientationchange"] {
            window.add_event_listener_with_callback(event, on_resize.as_ref().unchecked_ref())?;
        }

        Ok(MotionRuntime {
            state,
            parallax_watchers: BTreeMap::new(),
            entrance_watchers: BTreeMap::new(),
            frame_loop: Rc::new(RefCell::new(None)),
            pending_frame: Rc::new(Cell::new(None)),
            on_resize,
        })
    }

    /// Add a parallax instance from a JSON config; returns its id. Visibility comes from an
    /// IntersectionObserver and, with `auto_observe`, added nodes from a MutationObserver.
    pub fn add_parallax(&mut self, config_json: &str) -> Result<u32, JsValue> {
        let config = ParallaxConfig::from_json(config_json).map_err(to_js)?;
        let (id, watchers) = {
            let mut state = self.state.borrow_mut();
            let controller = ParallaxController::new(&mut state.host, config).map_err(to_js)?;
            let id = state.parallax.register(controller);
            (id, watch_parallax(&self.state, &mut state, id))
        };
        self.parallax_watchers.insert(id, watchers);
        Ok(id.as_u32())
    }

    /// Add an entrance instance from a JSON config; returns its id.
    pub fn add_entrance(&mut self, config_json: &str) -> Result<u32, JsValue> {
        let config = EntranceConfig::from_json(config_json).map_err(to_js)?;
        let (id, watchers) = {
            let mut state = self.state.borrow_mut();
            let controller = EntranceController::new(&mut state.host, config).map_err(to_js)?;
            let id = state.entrance.register(controller);
            (id, watch_entrance(&self.state, &state, id))
        };
        self.entrance_watchers.insert(id, watchers);
        Ok(id.as_u32())
    }

    /// Disconnect the observers and destroy a parallax instance, restoring author transforms.
    pub fn remove_parallax(&mut self, id: u32) -> bool {
        let id = InstanceId::from_u32(id);
        self.parallax_watchers.remove(&id);
        let mut state = self.state.borrow_mut();
        state.polled.remove(&id);
        let RuntimeState { host, parallax, .. } = &mut *state;
        match parallax.unregister(id) {
            Some(controller) => {
                controller.destroy(host);
                true
            }
            None => false,
        }
    }

    pub fn remove_entrance(&mut self, id: u32) -> bool {
        let id = InstanceId::from_u32(id);
        self.entrance_watchers.remove(&id);
        let mut state = self.state.borrow_mut();
        match state.entrance.unregister(id) {
            Some(controller) => {
                controller.destroy();
                true
            }
            None => false,
        }
    }

    pub fn refresh_parallax(&mut self, id: u32) -> bool {
        let mut state = self.state.borrow_mut();
        let RuntimeState { host, parallax, .. } = &mut *state;
        match parallax.get_mut(InstanceId::from_u32(id)) {
            Some(controller) => {
                controller.refresh(&*host);
                true
            }
            None => false,
        }
    }

    pub fn refresh_entrance(&mut self, id: u32) -> bool {
        let mut state = self.state.borrow_mut();
        let RuntimeState { host, entrance, .. } = &mut *state;
        match entrance.get_mut(InstanceId::from_u32(id)) {
            Some(controller) => {
                controller.refresh(&*host);
                true
            }
            None => false,
        }
    }

    /// Scroll offset from a smooth-scroll library; overrides `window.scrollY` from now on.
    pub fn push_scroll(&mut self, y: f64) {
        self.state.borrow_mut().parallax.push_scroll(y);
    }

    /// Scroll event object carrying `scroll` or `animatedScroll`.
    pub fn push_scroll_event(&mut self, event: &JsValue) -> Result<(), JsValue> {
        let json: String = js_sys::JSON::stringify(event)?.into();
        self.state
            .borrow_mut()
            .parallax
            .push_scroll_event(&json)
            .map_err(to_js)
    }

    /// Feed nodes added by a page-side MutationObserver. Returns whether any instance re-scanned.
    pub fn nodes_added(&mut self, nodes: js_sys::Array) -> bool {
        let added: Vec<Element> = nodes
            .iter()
            .filter_map(|n| n.dyn_into::<Element>().ok())
            .collect();
        if added.is_empty() {
            return false;
        }
        let mut state = self.state.borrow_mut();
        let RuntimeState {
            host,
            parallax,
            entrance,
            ..
        } = &mut *state;
        let mut rescanned = false;
        for (id, watchers) in &self.parallax_watchers {
            let Some(controller) = parallax.get_mut(*id) else {
                continue;
            };
            if controller.nodes_added(host, &added) {
                rescanned = true;
                if let Some((observer, _)) = &watchers.intersection {
                    observe_tracked(observer, controller);
                }
            }
        }
        for controller in entrance.iter_mut() {
            rescanned |= controller.nodes_added(host, &added);
        }
        rescanned
    }

    /// Run one frame by hand with a `performance.now()`-style timestamp.
    pub fn frame(&mut self, now: f64) {
        self.state.borrow_mut().frame(Timestamp::from_millis(now));
    }

    /// Start the requestAnimationFrame loop. Calling it twice is a no-op.
    pub fn start(&mut self) -> Result<(), JsValue> {
        if self.pending_frame.get().is_some() {
            return Ok(());
        }
        if self.frame_loop.borrow().is_none() {
            let state = self.state.clone();
            let slot = self.frame_loop.clone();
            let pending = self.pending_frame.clone();
            *self.frame_loop.borrow_mut() = Some(Closure::wrap(Box::new(move |now: f64| {
                pending.set(None);
                state.borrow_mut().frame(Timestamp::from_millis(now));
                if let Some(callback) = slot.borrow().as_ref() {
                    match request_frame(callback) {
                        Ok(handle) => pending.set(Some(handle)),
                        Err(e) => log::error!("requestAnimationFrame failed: {:?}", e),
                    }
                }
            }) as Box<dyn FnMut(f64)>));
        }
        let handle = match self.frame_loop.borrow().as_ref() {
            Some(callback) => request_frame(callback)?,
            None => return Ok(()),
        };
        self.pending_frame.set(Some(handle));
        log::info!("motion runtime started");
        Ok(())
    }

    /// Cancel the pending frame. Instances keep their state.
    pub fn stop(&mut self) {
        if let Some(handle) = self.pending_frame.take() {
            if let Some(window) = web_sys::window() {
                let _ = window.cancel_animation_frame(handle);
            }
        }
    }

    /// Parallax records of one instance as JSON.
    pub fn parallax_state(&self, id: u32) -> Result<String, JsValue> {
        let state = self.state.borrow();
        let controller = state
            .parallax
            .get(InstanceId::from_u32(id))
            .ok_or_else(|| JsValue::from_str(&format!("no parallax instance {id}")))?;
        let records: Vec<_> = controller.records().map(|(_, r)| r).collect();
        serde_json::to_string(&records)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Entrance records of one instance as JSON.
    pub fn entrance_state(&self, id: u32) -> Result<String, JsValue> {
        let state = self.state.borrow();
        let controller = state
            .entrance
            .get(InstanceId::from_u32(id))
            .ok_or_else(|| JsValue::from_str(&format!("no entrance instance {id}")))?;
        let records: Vec<_> = controller.records().map(|(_, r)| r).collect();
        serde_json::to_string(&records)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }
}

impl Drop for MotionRuntime {
    fn drop(&mut self) {
        self.stop();
        // Breaks the closure <-> slot cycle; no frame is pending after `stop`.
        self.frame_loop.borrow_mut().take();
        if let Some(window) = web_sys::window() {
            for event in ["resize", "orientationchange"] {
                let _ = window
                    .remove_event_listener_with_callback(event, self.on_resize.as_ref().unchecked_ref());
            }
        }
    }
}

fn request_frame(callback: &FrameCallback) -> Result<i32, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no global window"))?;
    window.request_animation_frame(callback.as_ref().unchecked_ref())
}
