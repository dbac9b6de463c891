//! Recording surface for tests and headless runs

use glam::DVec2;

use super::{Rgba, Surface, SurfaceSize, TextStyle};

/// One recorded draw call
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCmd {
    Clear(Rgba),
    FillRect { pos: DVec2, size: DVec2, color: Rgba },
    StrokeRect { pos: DVec2, size: DVec2, color: Rgba },
    FillCircle { center: DVec2, radius: f64, color: Rgba },
    StrokeCircle { center: DVec2, radius: f64, color: Rgba },
    Line { from: DVec2, to: DVec2, color: Rgba },
    Polyline { points: Vec<DVec2>, color: Rgba },
    Polygon { points: Vec<DVec2>, color: Rgba },
    Text { text: String, pos: DVec2, style: TextStyle },
}

#[derive(Debug, Clone)]
pub struct RecordingSurface {
    size: SurfaceSize,
    pub commands: Vec<DrawCmd>,
}

impl RecordingSurface {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            size: SurfaceSize {
                width,
                height,
                dpr: 1.0,
            },
            commands: Vec::new(),
        }
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        if let Some(size) = SurfaceSize::fit(width, height, self.size.dpr) {
            self.size = size;
        }
    }

    pub fn reset(&mut self) {
        self.commands.clear();
    }

    /// All text drawn so far
    pub fn texts(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCmd::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn has_text(&self, needle: &str) -> bool {
        self.texts().iter().any(|t| t.contains(needle))
    }

    /// Index of the first text command containing `needle`
    pub fn text_index(&self, needle: &str) -> Option<usize> {
        self.commands
            .iter()
            .position(|c| matches!(c, DrawCmd::Text { text, .. } if text.contains(needle)))
    }

    /// True if every coordinate recorded is finite
    pub fn all_finite(&self) -> bool {
        let ok = |v: &DVec2| v.x.is_finite() && v.y.is_finite();
        self.commands.iter().all(|c| match c {
            DrawCmd::FillRect { pos, size, .. } | DrawCmd::StrokeRect { pos, size, .. } => {
                ok(pos) && ok(size)
            }
            DrawCmd::FillCircle { center, radius, .. }
            | DrawCmd::StrokeCircle { center, radius, .. } => ok(center) && radius.is_finite(),
            DrawCmd::Line { from, to, .. } => ok(from) && ok(to),
            DrawCmd::Polyline { points, .. } | DrawCmd::Polygon { points, .. } => {
                points.iter().all(ok)
            }
            DrawCmd::Text { pos, .. } => ok(pos),
            DrawCmd::Clear(_) => true,
        })
    }
}

impl Surface for RecordingSurface {
    fn size(&self) -> SurfaceSize {
        self.size
    }

    fn clear(&mut self, color: Rgba) {
        self.commands.push(DrawCmd::Clear(color));
    }

    fn fill_rect(&mut self, pos: DVec2, size: DVec2, color: Rgba) {
        self.commands.push(DrawCmd::FillRect { pos, size, color });
    }

    fn stroke_rect(&mut self, pos: DVec2, size: DVec2, color: Rgba, _width: f64) {
        self.commands.push(DrawCmd::StrokeRect { pos, size, color });
    }

    fn fill_circle(&mut self, center: DVec2, radius: f64, color: Rgba) {
        self.commands.push(DrawCmd::FillCircle {
            center,
            radius,
            color,
        });
    }

    fn stroke_circle(&mut self, center: DVec2, radius: f64, color: Rgba, _width: f64) {
        self.commands.push(DrawCmd::StrokeCircle {
            center,
            radius,
            color,
        });
    }

    fn line(&mut self, from: DVec2, to: DVec2, color: Rgba, _width: f64) {
        self.commands.push(DrawCmd::Line { from, to, color });
    }

    fn polyline(&mut self, points: &[DVec2], color: Rgba, _width: f64) {
        self.commands.push(DrawCmd::Polyline {
            points: points.to_vec(),
            color,
        });
    }

    fn fill_polygon(&mut self, points: &[DVec2], color: Rgba) {
        self.commands.push(DrawCmd::Polygon {
            points: points.to_vec(),
            color,
        });
    }

    fn text(&mut self, text: &str, pos: DVec2, style: TextStyle) {
        self.commands.push(DrawCmd::Text {
            text: text.to_string(),
            pos,
            style,
        });
    }
}
