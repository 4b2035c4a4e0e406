//! Presentation state of the companion overlay.
//!
//! `ViewState` is what a host renders: which panels are open, what each
//! section shows, the chat transcript, the quiz form and both canvases. The
//! controller is its only writer.

pub mod styles;
pub mod tracking;

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::analysis::quiz::QuizGrade;
use crate::domain::{OptionLetter, QuizItem};
use crate::render::pulse::PulseCanvas;
use crate::render::{donut, Canvas};

pub use styles::ParagraphStyles;
pub use tracking::{closest_paragraph, ScrollTracker};

/// Overlay tabs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    #[default]
    Insights,
    Quiz,
    Chat,
    Analysis,
}

impl std::fmt::Display for Tab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Tab::Insights => "insights",
            Tab::Quiz => "quiz",
            Tab::Chat => "chat",
            Tab::Analysis => "analysis",
        };
        write!(f, "{}", s)
    }
}

/// Sections that own a loader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionId {
    Bias,
    Deep,
    Emotions,
    Quiz,
    Advanced,
}

/// What a section currently shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(tag = "type", content = "html", rename_all = "snake_case")]
pub enum SectionBody {
    #[default]
    Empty,
    Html(String),
    /// Error card markup
    Error(String),
}

impl SectionBody {
    pub fn html(&self) -> Option<&str> {
        match self {
            SectionBody::Html(html) | SectionBody::Error(html) => Some(html),
            SectionBody::Empty => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SectionBody::Error(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct Section {
    pub loader_visible: bool,
    pub body: SectionBody,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Assistant,
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatBubble {
    pub speaker: Speaker,
    pub html: String,
    /// Still waiting for (or receiving) the reply
    pub pending: bool,
}

/// The rendered quiz form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizForm {
    pub items: Vec<QuizItem>,
    pub answers: Vec<Option<OptionLetter>>,
    pub submit_enabled: bool,
    /// Present once graded; inputs are disabled from then on
    pub grade: Option<QuizGrade>,
    pub results_html: Option<String>,
}

/// Chart tooltip at canvas coordinates
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tooltip {
    pub html: String,
    pub x: f64,
    pub y: f64,
}

/// Everything the overlay displays
#[derive(Debug, Clone, Serialize)]
pub struct ViewState {
    pub overlay_visible: bool,
    pub active_tab: Tab,
    pub pulse_collapsed: bool,
    pub bias: Section,
    pub deep: Section,
    pub emotions: Section,
    pub quiz: Section,
    pub advanced: Section,
    /// Source-trust widget markup
    pub trust_html: Option<String>,
    /// Topic legend markup
    pub legend_html: Option<String>,
    pub quiz_form: Option<QuizForm>,
    pub chat: Vec<ChatBubble>,
    pub suggestions: Vec<String>,
    pub tooltip: Option<Tooltip>,
    pub active_paragraph: Option<usize>,
    pub pulse: PulseCanvas,
    pub chart: Canvas,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            overlay_visible: false,
            active_tab: Tab::default(),
            pulse_collapsed: false,
            bias: Section::default(),
            deep: Section::default(),
            emotions: Section::default(),
            quiz: Section::default(),
            advanced: Section::default(),
            trust_html: None,
            legend_html: None,
            quiz_form: None,
            chat: Vec::new(),
            suggestions: Vec::new(),
            tooltip: None,
            active_paragraph: None,
            pulse: PulseCanvas::new(),
            chart: Canvas::new(donut::SIZE, donut::SIZE),
        }
    }
}

impl ViewState {
    pub fn section(&self, id: SectionId) -> &Section {
        match id {
            SectionId::Bias => &self.bias,
            SectionId::Deep => &self.deep,
            SectionId::Emotions => &self.emotions,
            SectionId::Quiz => &self.quiz,
            SectionId::Advanced => &self.advanced,
        }
    }

    pub fn section_mut(&mut self, id: SectionId) -> &mut Section {
        match id {
            SectionId::Bias => &mut self.bias,
            SectionId::Deep => &mut self.deep,
            SectionId::Emotions => &mut self.emotions,
            SectionId::Quiz => &mut self.quiz,
            SectionId::Advanced => &mut self.advanced,
        }
    }

    /// Whether any section still shows its loader
    pub fn any_loader_visible(&self) -> bool {
        [
            SectionId::Bias,
            SectionId::Deep,
            SectionId::Emotions,
            SectionId::Quiz,
            SectionId::Advanced,
        ]
        .iter()
        .any(|id| self.section(*id).loader_visible)
    }
}

/// Shows a section's loader for as long as it lives
pub struct LoaderGuard {
    view: Arc<Mutex<ViewState>>,
    section: SectionId,
}

impl LoaderGuard {
    pub fn show(view: &Arc<Mutex<ViewState>>, section: SectionId) -> Self {
        view.lock().section_mut(section).loader_visible = true;
        Self {
            view: Arc::clone(view),
            section,
        }
    }
}

impl Drop for LoaderGuard {
    fn drop(&mut self) {
        self.view.lock().section_mut(self.section).loader_visible = false;
    }
}
