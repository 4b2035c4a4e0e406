//! In-memory document with a synthetic vertical layout.
//!
//! Built from HTML (every `<p>` element) or from plain paragraph strings.
//! Paragraph heights are derived from text length so scrolling behaves like a
//! simple single-column article.

use std::collections::HashMap;

use html2text::render::text_renderer::TrivialDecorator;
use parking_lot::Mutex;

use super::{Document, NodeId, Rect};

/// Pixels per rendered line
const LINE_HEIGHT: f64 = 24.0;
/// Characters per rendered line
const CHARS_PER_LINE: usize = 80;
/// Vertical gap between paragraphs
const PARAGRAPH_GAP: f64 = 16.0;
/// Viewport height used when none is given
pub const DEFAULT_VIEWPORT_HEIGHT: f64 = 800.0;

#[derive(Debug, Clone)]
struct Node {
    text: String,
    top: f64,
    height: f64,
}

/// Static article document
#[derive(Debug)]
pub struct StaticDocument {
    nodes: Vec<Node>,
    viewport_height: f64,
    scroll_y: Mutex<f64>,
    styles: Mutex<HashMap<NodeId, String>>,
}

impl StaticDocument {
    /// Lay out plain paragraphs top to bottom
    pub fn from_paragraphs<I, S>(paragraphs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut nodes = Vec::new();
        let mut top = 0.0;
        for text in paragraphs {
            let text = text.into();
            let lines = (text.chars().count().max(1) + CHARS_PER_LINE - 1) / CHARS_PER_LINE;
            let height = lines as f64 * LINE_HEIGHT;
            nodes.push(Node { text, top, height });
            top += height + PARAGRAPH_GAP;
        }

        Self {
            nodes,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
            scroll_y: Mutex::new(0.0),
            styles: Mutex::new(HashMap::new()),
        }
    }

    /// Extract every `<p>` element of an HTML page
    pub fn from_html(html: &str) -> Self {
        let texts: Vec<String> = static_regex!(r"(?is)<p\b[^>]*>(.*?)</p>")
            .captures_iter(html)
            .map(|c| inner_text(&c[1]))
            .collect();
        Self::from_paragraphs(texts)
    }

    /// Use a different viewport height
    pub fn with_viewport_height(mut self, height: f64) -> Self {
        self.viewport_height = height.max(1.0);
        self
    }

    /// Total laid-out height of the document
    pub fn content_height(&self) -> f64 {
        self.nodes
            .last()
            .map(|n| n.top + n.height)
            .unwrap_or_default()
    }

    /// Largest meaningful scroll offset
    pub fn max_scroll(&self) -> f64 {
        (self.content_height() - self.viewport_height).max(0.0)
    }

    /// Current scroll offset
    pub fn scroll_y(&self) -> f64 {
        *self.scroll_y.lock()
    }

    /// Scroll to an absolute offset (clamped to the document)
    pub fn scroll_to(&self, y: f64) {
        *self.scroll_y.lock() = y.clamp(0.0, self.max_scroll());
    }
}

/// Rendered text of an HTML fragment, whitespace collapsed
fn inner_text(fragment: &str) -> String {
    let wrapped = format!("<p>{}</p>", fragment);
    let text =
        html2text::from_read_with_decorator(wrapped.as_bytes(), 10_000, TrivialDecorator::new());
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl Document for StaticDocument {
    fn paragraph_nodes(&self) -> Vec<(NodeId, String)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(id, n)| (id, n.text.clone()))
            .collect()
    }

    fn bounding_rect(&self, node: NodeId) -> Option<Rect> {
        let n = self.nodes.get(node)?;
        Some(Rect {
            top: n.top - self.scroll_y(),
            height: n.height,
        })
    }

    fn viewport_height(&self) -> f64 {
        self.viewport_height
    }

    fn inline_style(&self, node: NodeId) -> String {
        self.styles.lock().get(&node).cloned().unwrap_or_default()
    }

    fn set_inline_style(&self, node: NodeId, css: &str) {
        let mut styles = self.styles.lock();
        if css.is_empty() {
            styles.remove(&node);
        } else {
            styles.insert(node, css.to_string());
        }
    }

    fn scroll_into_view(&self, node: NodeId) {
        if let Some(n) = self.nodes.get(node) {
            let centered = n.top + n.height / 2.0 - self.viewport_height / 2.0;
            self.scroll_to(centered);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_html_extracts_paragraphs() {
        let html = r#"
<html><body>
  <h1>Headline</h1>
  <p class="lede">The council <b>approved</b> the budget on Tuesday.</p>
  <div><p>Short.</p></div>
  <P>Residents   voiced
     concerns about rising rents.</P>
</body></html>"#;

        let doc = StaticDocument::from_html(html);
        let nodes = doc.paragraph_nodes();
        assert_eq!(nodes.len(), 3);
        assert!(nodes[0].1.contains("approved the budget"));
        assert_eq!(nodes[1].1, "Short.");
        assert_eq!(nodes[2].1, "Residents voiced concerns about rising rents.");
    }

    #[test]
    fn test_layout_and_scroll() {
        let doc = StaticDocument::from_paragraphs(vec!["a".repeat(100), "b".repeat(40)])
            .with_viewport_height(50.0);

        // 100 chars → 2 lines
        let first = doc.bounding_rect(0).unwrap();
        assert_eq!(first, Rect { top: 0.0, height: 48.0 });

        let second = doc.bounding_rect(1).unwrap();
        assert_eq!(second.top, 64.0);

        // 88px of content in a 50px viewport
        assert_eq!(doc.max_scroll(), 38.0);
        doc.scroll_to(10.0);
        assert_eq!(doc.bounding_rect(1).unwrap().top, 54.0);

        doc.scroll_to(10_000.0);
        assert_eq!(doc.scroll_y(), doc.max_scroll());
    }

    #[test]
    fn test_inline_styles() {
        let doc = StaticDocument::from_paragraphs(vec!["text"]);
        assert_eq!(doc.inline_style(0), "");
        doc.set_inline_style(0, "color: red;");
        assert_eq!(doc.inline_style(0), "color: red;");
        doc.set_inline_style(0, "");
        assert_eq!(doc.inline_style(0), "");
    }
}
