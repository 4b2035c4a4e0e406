//! Scroll tracking of the paragraph nearest the viewport centre.

use crate::domain::Paragraph;
use crate::page::Document;

/// Index of the paragraph whose centre is closest to the viewport centre.
///
/// The first paragraph wins ties. Paragraphs without layout are skipped.
pub fn closest_paragraph(document: &dyn Document, paragraphs: &[Paragraph]) -> Option<usize> {
    let viewport_center = document.viewport_height() / 2.0;
    let mut best: Option<(usize, f64)> = None;

    for paragraph in paragraphs {
        let Some(rect) = document.bounding_rect(paragraph.node) else {
            continue;
        };
        let distance = (rect.center() - viewport_center).abs();
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((paragraph.index, distance));
        }
    }
    best.map(|(index, _)| index)
}

/// Collapses bursts of scroll events into one recomputation per frame
#[derive(Debug, Default)]
pub struct ScrollTracker {
    frame_requested: bool,
    active: Option<usize>,
}

impl ScrollTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a scroll event; returns false when a frame is already pending
    pub fn on_scroll(&mut self) -> bool {
        if self.frame_requested {
            return false;
        }
        self.frame_requested = true;
        true
    }

    pub fn frame_requested(&self) -> bool {
        self.frame_requested
    }

    pub fn active(&self) -> Option<usize> {
        self.active
    }

    /// Run the pending recomputation, returning the new active index if it
    /// changed
    pub fn on_frame(&mut self, document: &dyn Document, paragraphs: &[Paragraph]) -> Option<usize> {
        if !self.frame_requested {
            return None;
        }
        self.frame_requested = false;

        let closest = closest_paragraph(document, paragraphs)?;
        if self.active == Some(closest) {
            return None;
        }
        self.active = Some(closest);
        Some(closest)
    }
}
