//! The rendered page the companion is mounted into.
//!
//! The host owns the real document; the companion only needs paragraph
//! nodes, their layout, and the ability to restyle and scroll to them.

pub mod static_doc;

pub use static_doc::StaticDocument;

/// Opaque handle to a paragraph node in the host document
pub type NodeId = usize;

/// Viewport-relative vertical extent of a node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub top: f64,
    pub height: f64,
}

impl Rect {
    pub fn center(&self) -> f64 {
        self.top + self.height / 2.0
    }
}

/// Read/write access to the host document
pub trait Document: Send + Sync {
    /// Every paragraph node in document order with its rendered inner text
    fn paragraph_nodes(&self) -> Vec<(NodeId, String)>;

    /// Current viewport-relative rectangle of a node
    fn bounding_rect(&self, node: NodeId) -> Option<Rect>;

    /// Height of the visible viewport
    fn viewport_height(&self) -> f64;

    /// Inline style of a node (the `style` attribute text)
    fn inline_style(&self, node: NodeId) -> String;

    /// Replace the inline style of a node
    fn set_inline_style(&self, node: NodeId, css: &str);

    /// Scroll so the node sits in the middle of the viewport
    fn scroll_into_view(&self, node: NodeId);
}
