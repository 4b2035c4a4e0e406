//! Retained drawing surfaces and HTML fragments.
//!
//! Canvases record display lists instead of pixels: each redraw clears the
//! list and appends the operations a 2D context would receive. Hosts replay
//! them onto a real surface; tests assert on them directly.

pub mod donut;
pub mod markup;
pub mod pulse;

use serde::Serialize;

/// A point in canvas pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Fill or stroke style
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Paint {
    Solid(String),
    /// Top-to-bottom linear gradient
    VerticalGradient { from: String, to: String },
}

impl Paint {
    pub fn solid(color: &str) -> Self {
        Paint::Solid(color.to_string())
    }
}

/// Path construction command
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PathCmd {
    MoveTo(Point),
    LineTo(Point),
    QuadTo { control: Point, to: Point },
    Arc {
        center: Point,
        radius: f64,
        start: f64,
        end: f64,
        counter_clockwise: bool,
    },
    Close,
}

/// One recorded drawing operation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawOp {
    Clear,
    Stroke {
        path: Vec<PathCmd>,
        paint: Paint,
        width: f64,
        alpha: f64,
    },
    Fill {
        path: Vec<PathCmd>,
        paint: Paint,
        shadow_blur: f64,
    },
    Text {
        text: String,
        at: Point,
        color: String,
        font: String,
    },
}

/// A retained-mode canvas
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Canvas {
    pub width: f64,
    pub height: f64,
    ops: Vec<DrawOp>,
}

impl Canvas {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            ops: Vec::new(),
        }
    }

    /// Drop every recorded operation and record a clear
    pub fn clear(&mut self) {
        self.ops.clear();
        self.ops.push(DrawOp::Clear);
    }

    pub fn push(&mut self, op: DrawOp) {
        self.ops.push(op);
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    /// Filled shapes drawn with a non-zero shadow (glowing markers)
    pub fn glowing_fills(&self) -> Vec<&DrawOp> {
        self.ops
            .iter()
            .filter(|op| matches!(op, DrawOp::Fill { shadow_blur, .. } if *shadow_blur > 0.0))
            .collect()
    }
}
