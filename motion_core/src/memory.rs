// In-memory document for native embedders and tests: a flat arena of elements with
// attributes, layout boxes in document coordinates, computed style and inline style.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::HostError;
use crate::host::Host;
use crate::types::{Rect, StyleProperty, ViewportSize};

/// Element handle into a [`MemoryHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Default)]
struct MemoryNode {
    parent: Option<NodeId>,
    attached: bool,
    attributes: BTreeMap<String, String>,
    /// Layout box in document coordinates (unaffected by scroll).
    layout: Rect,
    computed_transform: Option<String>,
    font_size: Option<String>,
    styles: BTreeMap<StyleProperty, String>,
}

/// A minimal live tree. Selectors support comma-separated attribute forms:
/// `[name]` and `[name="value"]`.
#[derive(Debug, Clone)]
pub struct MemoryHost {
    nodes: Vec<MemoryNode>,
    viewport: ViewportSize,
    scroll_y: f64,
    reduced_motion: bool,
    failing: BTreeSet<NodeId>,
    writes: usize,
}

impl MemoryHost {
    pub fn new(viewport: ViewportSize) -> Self {
        MemoryHost {
            nodes: Vec::new(),
            viewport,
            scroll_y: 0.0,
            reduced_motion: false,
            failing: BTreeSet::new(),
            writes: 0,
        }
    }

    /// Append a new element under `parent` (top level when `None`).
    pub fn add(&mut self, parent: Option<NodeId>, attributes: &[(&str, &str)], layout: Rect) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(MemoryNode {
            parent,
            attached: true,
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            layout,
            ..MemoryNode::default()
        });
        id
    }

    /// Detach `node` and, implicitly, everything under it.
    pub fn remove(&mut self, node: NodeId) {
        if let Some(n) = self.nodes.get_mut(node.0) {
            n.attached = false;
        }
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(n) = self.nodes.get_mut(node.0) {
            n.attributes.insert(name.to_string(), value.to_string());
        }
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) {
        if let Some(n) = self.nodes.get_mut(node.0) {
            n.attributes.remove(name);
        }
    }

    pub fn set_layout(&mut self, node: NodeId, layout: Rect) {
        if let Some(n) = self.nodes.get_mut(node.0) {
            n.layout = layout;
        }
    }

    /// Force the computed transform, as a stylesheet would.
    pub fn set_computed_transform(&mut self, node: NodeId, value: &str) {
        if let Some(n) = self.nodes.get_mut(node.0) {
            n.computed_transform = Some(value.to_string());
        }
    }

    pub fn set_font_size(&mut self, node: NodeId, value: &str) {
        if let Some(n) = self.nodes.get_mut(node.0) {
            n.font_size = Some(value.to_string());
        }
    }

    /// Seed an inline style without counting it as a controller write.
    pub fn set_inline(&mut self, node: NodeId, property: StyleProperty, value: &str) {
        if let Some(n) = self.nodes.get_mut(node.0) {
            n.styles.insert(property, value.to_string());
        }
    }

    pub fn style(&self, node: NodeId, property: StyleProperty) -> Option<&str> {
        self.nodes
            .get(node.0)
            .and_then(|n| n.styles.get(&property))
            .map(String::as_str)
    }

    pub fn set_scroll_y(&mut self, y: f64) {
        self.scroll_y = y;
    }

    pub fn set_viewport(&mut self, viewport: ViewportSize) {
        self.viewport = viewport;
    }

    pub fn set_reduced_motion(&mut self, reduced: bool) {
        self.reduced_motion = reduced;
    }

    /// Make every style write to `node` fail.
    pub fn fail_writes(&mut self, node: NodeId, failing: bool) {
        if failing {
            self.failing.insert(node);
        } else {
            self.failing.remove(&node);
        }
    }

    /// Number of successful style writes so far.
    pub fn write_count(&self) -> usize {
        self.writes
    }

    fn node(&self, id: NodeId) -> Option<&MemoryNode> {
        self.nodes.get(id.0)
    }

    fn is_connected(&self, id: NodeId) -> bool {
        let mut cur = Some(id);
        while let Some(c) = cur {
            match self.node(c) {
                Some(n) if n.attached => cur = n.parent,
                _ => return false,
            }
        }
        true
    }

    fn is_descendant(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut cur = self.node(id).and_then(|n| n.parent);
        while let Some(c) = cur {
            if c == ancestor {
                return true;
            }
            cur = self.node(c).and_then(|n| n.parent);
        }
        false
    }
}

/// One `[name]` / `[name="value"]` alternative of a selector list.
#[derive(Debug, PartialEq)]
struct AttributeSelector {
    name: String,
    value: Option<String>,
}

fn parse_selector(selector: &str) -> Option<Vec<AttributeSelector>> {
    selector
        .split(',')
        .map(|part| {
            let inner = part.trim().strip_prefix('[')?.strip_suffix(']')?;
            match inner.split_once('=') {
                Some((name, value)) => Some(AttributeSelector {
                    name: name.trim().to_string(),
                    value: Some(value.trim().trim_matches(|c| c == '"' || c == '\'').to_string()),
                }),
                None => Some(AttributeSelector {
                    name: inner.trim().to_string(),
                    value: None,
                }),
            }
        })
        .collect()
}

fn node_matches(node: &MemoryNode, selectors: &[AttributeSelector]) -> bool {
    selectors.iter().any(|s| match (&s.value, node.attributes.get(&s.name)) {
        (None, Some(_)) => true,
        (Some(want), Some(have)) => want == have,
        _ => false,
    })
}

impl Host for MemoryHost {
    type Node = NodeId;

    fn query_all(&self, scope: Option<&NodeId>, selector: &str) -> Vec<NodeId> {
        let Some(selectors) = parse_selector(selector) else {
            return Vec::new();
        };
        (0..self.nodes.len())
            .map(NodeId)
            .filter(|id| self.is_connected(*id))
            .filter(|id| scope.map_or(true, |root| self.is_descendant(*id, *root)))
            .filter(|id| self.node(*id).is_some_and(|n| node_matches(n, &selectors)))
            .collect()
    }

    fn matches(&self, node: &NodeId, selector: &str) -> bool {
        match (parse_selector(selector), self.node(*node)) {
            (Some(selectors), Some(n)) => node_matches(n, &selectors),
            _ => false,
        }
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        self.node(*node).and_then(|n| n.attributes.get(name).cloned())
    }

    fn computed_transform(&self, node: &NodeId) -> Option<String> {
        let n = self.node(*node)?;
        // Inline transforms win, like a computed style would report them.
        n.styles
            .get(&StyleProperty::Transform)
            .or(n.computed_transform.as_ref())
            .cloned()
    }

    fn computed_font_size(&self, node: &NodeId) -> Option<String> {
        self.node(*node).and_then(|n| n.font_size.clone())
    }

    fn bounding_rect(&self, node: &NodeId) -> Rect {
        self.node(*node)
            .map(|n| n.layout.shifted_y(-self.scroll_y))
            .unwrap_or_default()
    }

    fn inline_style(&self, node: &NodeId, property: StyleProperty) -> Option<String> {
        self.style(*node, property)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    fn set_style(&mut self, node: &NodeId, property: StyleProperty, value: &str) -> Result<(), HostError> {
        if self.failing.contains(node) {
            return Err(HostError::StyleWrite {
                property: property.css_name(),
                message: "write rejected".to_string(),
            });
        }
        let n = self.nodes.get_mut(node.0).ok_or(HostError::Detached)?;
        if value.is_empty() {
            n.styles.remove(&property);
        } else {
            n.styles.insert(property, value.to_string());
        }
        self.writes += 1;
        Ok(())
    }

    fn viewport(&self) -> ViewportSize {
        self.viewport
    }

    fn native_scroll_y(&self) -> f64 {
        self.scroll_y
    }

    fn prefers_reduced_motion(&self) -> bool {
        self.reduced_motion
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> MemoryHost {
        MemoryHost::new(ViewportSize::new(1000.0, 800.0))
    }

    #[test]
    fn selector_list_matching() {
        let mut h = host();
        let a = h.add(None, &[("data-animate", "fade")], Rect::default());
        let b = h.add(None, &[("animte", "reveal")], Rect::default());
        let _c = h.add(None, &[("class", "x")], Rect::default());
        assert_eq!(h.query_all(None, "[data-animate],[animate],[animte]"), vec![a, b]);
        assert_eq!(h.query_all(None, r#"[data-animate="fade"]"#), vec![a]);
        assert!(h.query_all(None, "div.card").is_empty());
    }

    #[test]
    fn scoped_query_excludes_root_and_outsiders() {
        let mut h = host();
        let root = h.add(None, &[("speed", "1"), ("data-scope", "")], Rect::default());
        let inside = h.add(Some(root), &[("speed", "2")], Rect::default());
        let _outside = h.add(None, &[("speed", "3")], Rect::default());
        assert_eq!(h.query_all(Some(&root), "[speed]"), vec![inside]);
    }

    #[test]
    fn removed_subtree_disappears() {
        let mut h = host();
        let parent = h.add(None, &[], Rect::default());
        let child = h.add(Some(parent), &[("speed", "1")], Rect::default());
        assert_eq!(h.query_all(None, "[speed]"), vec![child]);
        h.remove(parent);
        assert!(h.query_all(None, "[speed]").is_empty());
    }

    #[test]
    fn bounding_rect_follows_scroll() {
        let mut h = host();
        let n = h.add(None, &[], Rect::new(0.0, 1200.0, 100.0, 100.0));
        h.set_scroll_y(1000.0);
        assert_eq!(h.bounding_rect(&n).top, 200.0);
    }

    #[test]
    fn failing_writes_report_errors() {
        let mut h = host();
        let n = h.add(None, &[], Rect::default());
        h.fail_writes(n, true);
        assert!(h.set_style(&n, StyleProperty::Opacity, "0").is_err());
        h.fail_writes(n, false);
        assert!(h.set_style(&n, StyleProperty::Opacity, "0").is_ok());
        assert_eq!(h.style(n, StyleProperty::Opacity), Some("0"));
        assert_eq!(h.write_count(), 1);
    }

    #[test]
    fn empty_write_removes_declaration() {
        let mut h = host();
        let n = h.add(None, &[], Rect::default());
        h.set_inline(n, StyleProperty::Transform, "scale(2)");
        h.set_style(&n, StyleProperty::Transform, "").unwrap();
        assert_eq!(h.style(n, StyleProperty::Transform), None);
    }
}
