//! 2D rendering module
//!
//! Simulations draw through the `Surface` trait in CSS-pixel coordinates.
//! The Canvas 2D backend lives in `canvas`, a command recorder for tests and
//! headless runs in `recorder`.

pub mod canvas;
pub mod primitives;
pub mod recorder;

pub use canvas::SurfaceSize;
pub use recorder::{DrawCmd, RecordingSurface};

#[cfg(target_arch = "wasm32")]
pub use canvas::CanvasSurface;

use glam::DVec2;

/// Straight RGBA color, components in 0..=1
pub type Rgba = [f32; 4];

/// Shared palette
pub mod palette {
    use super::Rgba;

    pub const BACKGROUND: Rgba = [0.04, 0.05, 0.09, 1.0];
    pub const GRID: Rgba = [0.25, 0.28, 0.38, 0.35];
    pub const TRACK: Rgba = [0.45, 0.48, 0.58, 1.0];
    pub const TEXT: Rgba = [0.88, 0.90, 0.95, 1.0];
    pub const TEXT_DIM: Rgba = [0.55, 0.58, 0.68, 1.0];
    pub const PANEL: Rgba = [0.08, 0.09, 0.15, 0.85];
    pub const PANEL_BORDER: Rgba = [0.3, 0.55, 0.85, 0.8];
    pub const ACCENT: Rgba = [0.35, 0.75, 1.0, 1.0];
    pub const WARM: Rgba = [1.0, 0.55, 0.2, 1.0];
    pub const GOLD: Rgba = [1.0, 0.84, 0.2, 1.0];
    pub const GOOD: Rgba = [0.3, 0.9, 0.45, 1.0];
    pub const BAD: Rgba = [0.95, 0.3, 0.3, 1.0];
    pub const GHOST: Rgba = [0.7, 0.7, 0.9, 0.35];
}

/// Scale a color's alpha
#[inline]
pub fn with_alpha(color: Rgba, alpha: f32) -> Rgba {
    [color[0], color[1], color[2], color[3] * alpha.clamp(0.0, 1.0)]
}

/// CSS color string for a color
pub fn css_color(color: Rgba) -> String {
    let c = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    format!(
        "rgba({},{},{},{:.3})",
        c(color[0]),
        c(color[1]),
        c(color[2]),
        color[3].clamp(0.0, 1.0)
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub size: f64,
    pub color: Rgba,
    pub align: TextAlign,
    pub bold: bool,
}

impl TextStyle {
    pub fn new(size: f64, color: Rgba) -> Self {
        Self {
            size,
            color,
            align: TextAlign::Left,
            bold: false,
        }
    }

    pub fn centered(mut self) -> Self {
        self.align = TextAlign::Center;
        self
    }

    pub fn right(mut self) -> Self {
        self.align = TextAlign::Right;
        self
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }
}

/// A 2D raster target in CSS pixels, origin top-left, y down.
///
/// Draw calls never feed anything back into simulation state.
pub trait Surface {
    fn size(&self) -> SurfaceSize;
    fn clear(&mut self, color: Rgba);
    fn fill_rect(&mut self, pos: DVec2, size: DVec2, color: Rgba);
    fn stroke_rect(&mut self, pos: DVec2, size: DVec2, color: Rgba, width: f64);
    fn fill_circle(&mut self, center: DVec2, radius: f64, color: Rgba);
    fn stroke_circle(&mut self, center: DVec2, radius: f64, color: Rgba, width: f64);
    fn line(&mut self, from: DVec2, to: DVec2, color: Rgba, width: f64);
    fn polyline(&mut self, points: &[DVec2], color: Rgba, width: f64);
    fn fill_polygon(&mut self, points: &[DVec2], color: Rgba);
    fn text(&mut self, text: &str, pos: DVec2, style: TextStyle);
}

/// Simulation draw layers, in paint order.
///
/// After these the widget paints particles, score popups and the challenge
/// scoreboard, in that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Layer {
    /// Background, grid, track
    Background,
    /// Target zones, prediction markers, probes
    Overlays,
    /// Moving bodies
    Bodies,
    /// Vectors and labels
    Annotations,
    /// Graphs and energy panels
    Panels,
}

impl Layer {
    pub const ORDER: [Layer; 5] = [
        Layer::Background,
        Layer::Overlays,
        Layer::Bodies,
        Layer::Annotations,
        Layer::Panels,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_color() {
        assert_eq!(css_color([1.0, 0.0, 0.5, 0.25]), "rgba(255,0,128,0.250)");
        assert_eq!(css_color([2.0, -1.0, 0.0, 1.0]), "rgba(255,0,0,1.000)");
    }

    #[test]
    fn test_layer_order_sorted() {
        let mut sorted = Layer::ORDER;
        sorted.sort();
        assert_eq!(sorted, Layer::ORDER);
    }
}
