//! Emotion pulse canvas.
//!
//! Draws the valence trace as a smooth curve with a glowing dot on the
//! active paragraph, or a breathing wave while scores are pending. The two
//! modes are exclusive: drawing data stops the loading wave.

use std::f64::consts::PI;

use serde::Serialize;

use super::{Canvas, DrawOp, Paint, PathCmd, Point};

pub const WIDTH: f64 = 240.0;
pub const HEIGHT: f64 = 60.0;
/// Vertical margin kept free above and below the curve
pub const MARGIN: f64 = 10.0;

const LINE_WIDTH: f64 = 3.0;
const DOT_COLOR: &str = "#ff6b6b";
const DOT_RADIUS: f64 = 6.0;
const DOT_GLOW: f64 = 15.0;

fn line_paint() -> Paint {
    Paint::VerticalGradient {
        from: "#667eea".to_string(),
        to: "#764ba2".to_string(),
    }
}

/// Canvas position of score `value` at index `i` of `n`
pub fn point(i: usize, n: usize, value: f64) -> Point {
    let step = WIDTH / n.saturating_sub(1).max(1) as f64;
    Point::new(step * i as f64, HEIGHT - value * (HEIGHT - 2.0 * MARGIN) - MARGIN)
}

/// Curve through every score, each segment a quadratic whose control point
/// sits halfway along x at the previous y
pub fn curve(scores: &[f64]) -> Vec<PathCmd> {
    let n = scores.len();
    let mut path = Vec::with_capacity(n);
    for (i, value) in scores.iter().enumerate() {
        let to = point(i, n, *value);
        if i == 0 {
            path.push(PathCmd::MoveTo(to));
        } else {
            let prev = point(i - 1, n, scores[i - 1]);
            path.push(PathCmd::QuadTo {
                control: Point::new((prev.x + to.x) / 2.0, prev.y),
                to,
            });
        }
    }
    path
}

/// Opacity of the breathing wave at `frame`
pub fn breathing_alpha(frame: u64) -> f64 {
    (frame as f64 * 0.02).sin() * 0.3 + 0.7
}

/// Breathing wave sampled every 3 px around the vertical centre
pub fn loading_wave(frame: u64) -> Vec<PathCmd> {
    let center = HEIGHT / 2.0;
    let mut path = Vec::new();
    let mut x = 0.0;
    while x < WIDTH {
        let offset = ((x / WIDTH) * PI * 2.0 + frame as f64 * 0.03).sin() * 8.0;
        let at = Point::new(x, center + offset);
        path.push(if path.is_empty() {
            PathCmd::MoveTo(at)
        } else {
            PathCmd::LineTo(at)
        });
        x += 3.0;
    }
    path
}

/// The pulse panel canvas and its loading animation state
#[derive(Debug, Clone, Serialize)]
pub struct PulseCanvas {
    canvas: Canvas,
    loading: bool,
    frame: u64,
}

impl Default for PulseCanvas {
    fn default() -> Self {
        Self::new()
    }
}

impl PulseCanvas {
    pub fn new() -> Self {
        Self {
            canvas: Canvas::new(WIDTH, HEIGHT),
            loading: false,
            frame: 0,
        }
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Start the breathing wave; no-op while it is already running
    pub fn start_loading(&mut self) {
        if self.loading {
            return;
        }
        self.loading = true;
        self.frame = 0;
        self.draw_loading_frame();
    }

    /// Advance the breathing wave by one animation frame
    pub fn tick(&mut self) {
        if !self.loading {
            return;
        }
        self.frame += 1;
        self.draw_loading_frame();
    }

    pub fn stop_loading(&mut self) {
        self.loading = false;
    }

    fn draw_loading_frame(&mut self) {
        self.canvas.clear();
        self.canvas.push(DrawOp::Stroke {
            path: loading_wave(self.frame),
            paint: line_paint(),
            width: LINE_WIDTH,
            alpha: breathing_alpha(self.frame),
        });
    }

    /// Draw the trace and the active dot, cancelling any loading wave
    pub fn draw(&mut self, scores: &[f64], active: Option<usize>) {
        self.stop_loading();
        if scores.is_empty() {
            return;
        }

        self.canvas.clear();
        self.canvas.push(DrawOp::Stroke {
            path: curve(scores),
            paint: line_paint(),
            width: LINE_WIDTH,
            alpha: 1.0,
        });

        if let Some(i) = active.filter(|i| *i < scores.len()) {
            let center = point(i, scores.len(), scores[i]);
            self.canvas.push(DrawOp::Fill {
                path: vec![PathCmd::Arc {
                    center,
                    radius: DOT_RADIUS,
                    start: 0.0,
                    end: 2.0 * PI,
                    counter_clockwise: false,
                }],
                paint: Paint::solid(DOT_COLOR),
                shadow_blur: DOT_GLOW,
            });
        }
    }

    /// Centre of the active-paragraph dot, if one is drawn
    pub fn dot_center(&self) -> Option<Point> {
        self.canvas.ops().iter().find_map(|op| match op {
            DrawOp::Fill { path, .. } => path.iter().find_map(|cmd| match cmd {
                PathCmd::Arc { center, .. } => Some(*center),
                _ => None,
            }),
            _ => None,
        })
    }
}
