//! Inline styles of article paragraphs.
//!
//! Two writers touch paragraph styles: the scroll tracker (active paragraph)
//! and reference highlights from the deep analysis. Both go through
//! `ParagraphStyles`, which remembers each node's original inline style the
//! first time it is touched and writes it back verbatim once neither
//! highlight applies.

use std::collections::HashMap;

use crate::page::{Document, NodeId};

/// Appended to the active paragraph while it is closest to the viewport centre
pub const ACTIVE_CSS: &str = "background: linear-gradient(135deg, rgba(255, 235, 59, 0.1) 0%, \
    rgba(255, 193, 7, 0.1) 100%); transform: scale(1.02); \
    box-shadow: 0 4px 20px rgba(255, 193, 7, 0.2); \
    transition: all 0.3s cubic-bezier(0.4, 0, 0.2, 1); border-radius: 8px; padding: 12px; \
    margin: 8px 0;";

/// Appended to a paragraph a reference points to
pub const REFERENCE_CSS: &str = "background: linear-gradient(135deg, rgba(102, 126, 234, 0.25) 0%, \
    rgba(118, 75, 162, 0.25) 100%) !important; \
    box-shadow: 0 0 0 3px rgba(102, 126, 234, 0.4), 0 4px 24px rgba(102, 126, 234, 0.3) !important; \
    transform: scale(1.02) !important; border-radius: 8px !important; padding: 16px !important; \
    margin: 12px 0 !important; transition: all 0.4s cubic-bezier(0.4, 0, 0.2, 1) !important;";

/// Appended while a reference highlight fades out
pub const REFERENCE_FADE_CSS: &str =
    "transition: all 0.8s ease-out; background: transparent; box-shadow: none; transform: scale(1);";

/// Stage of a reference highlight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferencePhase {
    Holding,
    Fading,
}

#[derive(Debug, Default)]
pub struct ParagraphStyles {
    original: HashMap<NodeId, String>,
    active: Option<NodeId>,
    reference: Option<(NodeId, ReferencePhase)>,
}

impl ParagraphStyles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<NodeId> {
        self.active
    }

    pub fn reference(&self) -> Option<(NodeId, ReferencePhase)> {
        self.reference
    }

    /// Move the scroll highlight to `node`
    pub fn set_active(&mut self, document: &dyn Document, node: Option<NodeId>) {
        let previous = std::mem::replace(&mut self.active, node);
        if previous == node {
            return;
        }
        if let Some(prev) = previous {
            self.repaint(document, prev);
        }
        if let Some(next) = node {
            self.repaint(document, next);
        }
    }

    /// Highlight `node` as a reference target, clearing any previous one
    pub fn set_reference(&mut self, document: &dyn Document, node: NodeId, phase: ReferencePhase) {
        let previous = self.reference.replace((node, phase));
        if let Some((prev, _)) = previous.filter(|(prev, _)| *prev != node) {
            self.repaint(document, prev);
        }
        self.repaint(document, node);
    }

    /// Drop the reference highlight from `node` if it still holds it
    pub fn clear_reference(&mut self, document: &dyn Document, node: NodeId) {
        if matches!(self.reference, Some((current, _)) if current == node) {
            self.reference = None;
            self.repaint(document, node);
        }
    }

    /// Restore every touched paragraph to its original style
    pub fn restore_all(&mut self, document: &dyn Document) {
        self.active = None;
        self.reference = None;
        for (node, css) in self.original.drain() {
            document.set_inline_style(node, &css);
        }
    }

    fn repaint(&mut self, document: &dyn Document, node: NodeId) {
        let reference = self
            .reference
            .filter(|(n, _)| *n == node)
            .map(|(_, phase)| phase);
        let extra = match reference {
            Some(ReferencePhase::Holding) => Some(REFERENCE_CSS),
            Some(ReferencePhase::Fading) => Some(REFERENCE_FADE_CSS),
            None if self.active == Some(node) => Some(ACTIVE_CSS),
            None => None,
        };

        match extra {
            Some(css) => {
                let original = self
                    .original
                    .entry(node)
                    .or_insert_with(|| document.inline_style(node));
                document.set_inline_style(node, &join_css(original, css));
            }
            None => {
                if let Some(original) = self.original.remove(&node) {
                    document.set_inline_style(node, &original);
                }
            }
        }
    }
}

fn join_css(base: &str, extra: &str) -> String {
    let base = base.trim();
    if base.is_empty() {
        extra.to_string()
    } else if base.ends_with(';') {
        format!("{} {}", base, extra)
    } else {
        format!("{}; {}", base, extra)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::StaticDocument;

    fn document() -> StaticDocument {
        let doc = StaticDocument::from_paragraphs(vec!["first paragraph", "second paragraph"]);
        doc.set_inline_style(0, "color: navy");
        doc
    }

    #[test]
    fn test_active_highlight_restores_original() {
        let doc = document();
        let mut styles = ParagraphStyles::new();

        styles.set_active(&doc, Some(0));
        assert!(doc.inline_style(0).starts_with("color: navy; background"));
        assert!(doc.inline_style(0).contains("scale(1.02)"));

        styles.set_active(&doc, Some(1));
        assert_eq!(doc.inline_style(0), "color: navy");
        assert_eq!(doc.inline_style(1), ACTIVE_CSS);
    }

    #[test]
    fn test_reference_over_active_paragraph() {
        let doc = document();
        let mut styles = ParagraphStyles::new();
        styles.set_active(&doc, Some(0));

        styles.set_reference(&doc, 0, ReferencePhase::Holding);
        assert!(doc.inline_style(0).contains("!important"));

        styles.set_reference(&doc, 0, ReferencePhase::Fading);
        assert!(doc.inline_style(0).contains("ease-out"));

        // Still the active paragraph, so the scroll highlight comes back
        styles.clear_reference(&doc, 0);
        assert_eq!(doc.inline_style(0), join_css("color: navy", ACTIVE_CSS));

        styles.set_active(&doc, None);
        assert_eq!(doc.inline_style(0), "color: navy");
    }

    #[test]
    fn test_new_reference_clears_previous() {
        let doc = document();
        let mut styles = ParagraphStyles::new();

        styles.set_reference(&doc, 0, ReferencePhase::Holding);
        styles.set_reference(&doc, 1, ReferencePhase::Holding);
        assert_eq!(doc.inline_style(0), "color: navy");
        assert!(doc.inline_style(1).contains("!important"));

        // A stale timer for the old node does nothing
        styles.clear_reference(&doc, 0);
        assert!(doc.inline_style(1).contains("!important"));

        styles.restore_all(&doc);
        assert_eq!(doc.inline_style(0), "color: navy");
        assert_eq!(doc.inline_style(1), "");
    }
}
