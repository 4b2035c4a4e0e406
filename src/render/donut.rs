//! Topic donut chart with sweep animation and hover hit-testing.

use std::f64::consts::PI;
use std::time::Duration;

use tokio::time::Instant;

use crate::domain::{TopicDistribution, TopicSlice};

use super::{Canvas, DrawOp, Paint, PathCmd, Point};

pub const SIZE: f64 = 240.0;
pub const OUTER_RADIUS: f64 = 90.0;
pub const INNER_RADIUS: f64 = 50.0;

const TWO_PI: f64 = 2.0 * PI;
/// Canvas angle of 12 o'clock
const START_ANGLE: f64 = -PI / 2.0;

pub fn center() -> Point {
    Point::new(SIZE / 2.0, SIZE / 2.0)
}

pub fn ease_out_cubic(t: f64) -> f64 {
    1.0 - (1.0 - t.clamp(0.0, 1.0)).powi(3)
}

/// Sweep angle of a slice at full extent
fn sweep(slice: &TopicSlice) -> f64 {
    slice.percent as f64 / 100.0 * TWO_PI
}

/// Start and end canvas angles of every slice, clockwise from 12 o'clock,
/// scaled by the eased animation progress
pub fn slice_angles(distribution: &TopicDistribution, eased: f64) -> Vec<(f64, f64)> {
    let mut current = START_ANGLE;
    distribution
        .slices
        .iter()
        .map(|slice| {
            let start = current;
            current += sweep(slice) * eased;
            (start, current)
        })
        .collect()
}

/// Redraw the whole chart at animation progress `progress` (0..=1)
pub fn draw_frame(canvas: &mut Canvas, distribution: &TopicDistribution, progress: f64) {
    let eased = ease_out_cubic(progress);
    let c = center();
    canvas.clear();

    for (slice, (start, end)) in distribution
        .slices
        .iter()
        .zip(slice_angles(distribution, eased))
    {
        let ring = vec![
            PathCmd::Arc {
                center: c,
                radius: OUTER_RADIUS,
                start,
                end,
                counter_clockwise: false,
            },
            PathCmd::Arc {
                center: c,
                radius: INNER_RADIUS,
                start: end,
                end: start,
                counter_clockwise: true,
            },
            PathCmd::Close,
        ];
        canvas.push(DrawOp::Fill {
            path: ring.clone(),
            paint: Paint::solid(slice.color()),
            shadow_blur: 0.0,
        });
        canvas.push(DrawOp::Stroke {
            path: ring,
            paint: Paint::solid("rgba(255, 255, 255, 0.3)"),
            width: 2.0,
            alpha: 1.0,
        });
    }

    let disc = vec![PathCmd::Arc {
        center: c,
        radius: INNER_RADIUS,
        start: 0.0,
        end: TWO_PI,
        counter_clockwise: false,
    }];
    canvas.push(DrawOp::Fill {
        path: disc.clone(),
        paint: Paint::solid("white"),
        shadow_blur: 0.0,
    });
    canvas.push(DrawOp::Stroke {
        path: disc,
        paint: Paint::solid("rgba(102, 126, 234, 0.2)"),
        width: 2.0,
        alpha: 1.0,
    });
    canvas.push(DrawOp::Text {
        text: "Topics".to_string(),
        at: c,
        color: "#667eea".to_string(),
        font: "bold 14px sans-serif".to_string(),
    });
}

/// Index of the slice under canvas position (`x`, `y`), if the point lies
/// on the ring
pub fn hit_test(distribution: &TopicDistribution, x: f64, y: f64) -> Option<usize> {
    let c = center();
    let (dx, dy) = (x - c.x, y - c.y);
    let distance = (dx * dx + dy * dy).sqrt();
    if !(INNER_RADIUS..=OUTER_RADIUS).contains(&distance) {
        return None;
    }

    // Clockwise angle from 12 o'clock in [0, 2π)
    let mut angle = dy.atan2(dx);
    if angle < -PI / 2.0 {
        angle += TWO_PI;
    }
    angle += PI / 2.0;
    if angle >= TWO_PI {
        angle -= TWO_PI;
    }

    let mut current = 0.0;
    for (i, slice) in distribution.slices.iter().enumerate() {
        let end = current + sweep(slice);
        if angle >= current && angle < end {
            return Some(i);
        }
        current = end;
    }
    None
}

/// A running (or finished) sweep animation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartAnimation {
    /// Increments on every restart; frames of older generations are stale
    pub generation: u64,
    pub started: Instant,
    pub duration: Duration,
}

impl ChartAnimation {
    /// Progress in [0, 1] at `now`
    pub fn progress(&self, now: Instant) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started);
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
    }

    pub fn is_complete(&self, now: Instant) -> bool {
        self.progress(now) >= 1.0
    }
}
