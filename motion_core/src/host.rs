// The document-like environment the controllers run against. Browsers implement it over
// web-sys (see `web`), native embedders and tests use `MemoryHost`.

use std::fmt::Debug;

use crate::error::HostError;
use crate::types::{Rect, StyleProperty, ViewportSize};

/// Live tree queries plus inline-style writes.
///
/// Reads never fail: a missing value is `None` and callers fall back to defaults.
/// Only writes report errors, and only for the element written.
pub trait Host {
    /// Handle to one element. Equality must mean "same element".
    type Node: Clone + PartialEq + Debug;

    /// Elements under `scope` (the whole document when `None`) matching `selector`,
    /// in document order. An unsupported selector matches nothing.
    fn query_all(&self, scope: Option<&Self::Node>, selector: &str) -> Vec<Self::Node>;

    fn matches(&self, node: &Self::Node, selector: &str) -> bool;

    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;

    /// Computed `transform` value (`"none"`, `matrix(...)`, `matrix3d(...)`).
    fn computed_transform(&self, node: &Self::Node) -> Option<String>;

    /// Computed `font-size`, e.g. `"16px"`.
    fn computed_font_size(&self, node: &Self::Node) -> Option<String>;

    /// Border box relative to the viewport.
    fn bounding_rect(&self, node: &Self::Node) -> Rect;

    /// Current inline style value; `None` when unset or empty.
    fn inline_style(&self, node: &Self::Node, property: StyleProperty) -> Option<String>;

    /// Set an inline style. An empty value removes the declaration.
    fn set_style(
        &mut self,
        node: &Self::Node,
        property: StyleProperty,
        value: &str,
    ) -> Result<(), HostError>;

    fn viewport(&self) -> ViewportSize;

    /// Platform scroll offset of the document.
    fn native_scroll_y(&self) -> f64;

    fn prefers_reduced_motion(&self) -> bool;
}

/// Where a controller scans for elements.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanRoot<N> {
    Document,
    Element(N),
    /// The configured root selector matched nothing.
    Missing,
}

impl<N: Clone> ScanRoot<N> {
    /// Resolve an optional root selector against `host`.
    pub fn resolve<H: Host<Node = N>>(host: &H, selector: Option<&str>) -> Self {
        match selector {
            None => ScanRoot::Document,
            Some(sel) => match host.query_all(None, sel).into_iter().next() {
                Some(node) => ScanRoot::Element(node),
                None => ScanRoot::Missing,
            },
        }
    }

    /// Matching elements inside this root. The root element itself is not a candidate,
    /// mirroring `querySelectorAll` on an element.
    pub fn query<H: Host<Node = N>>(&self, host: &H, selector: &str) -> Vec<N> {
        match self {
            ScanRoot::Document => host.query_all(None, selector),
            ScanRoot::Element(root) => host.query_all(Some(root), selector),
            ScanRoot::Missing => Vec::new(),
        }
    }
}

/// Whether any of `added` is, or contains, an element matching `selector`.
pub fn added_nodes_match<H: Host>(host: &H, added: &[H::Node], selector: &str) -> bool {
    added
        .iter()
        .any(|n| host.matches(n, selector) || !host.query_all(Some(n), selector).is_empty())
}

/// Attribute lookup over an ordered list of candidate names; the first present one wins,
/// even when its value is empty.
pub fn first_attribute<H: Host>(host: &H, node: &H::Node, candidates: &[String]) -> Option<String> {
    candidates.iter().find_map(|name| host.attribute(node, name))
}

/// One element's failure boundary: a rejected write is logged and the caller moves on.
pub(crate) fn write_or_warn<H: Host>(host: &mut H, node: &H::Node, property: StyleProperty, value: &str) {
    if let Err(err) = host.set_style(node, property, value) {
        log::warn!("{:?}: {}", node, err);
    }
}
