//! Canvas setup
//!
//! Sizes the backing store to the container's physical pixels and scales the
//! context by the device pixel ratio so strokes stay crisp. All drawing then
//! happens in CSS pixels.

/// Logical (CSS) size of a surface plus its device pixel ratio
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSize {
    pub width: f64,
    pub height: f64,
    pub dpr: f64,
}

impl SurfaceSize {
    /// Fit a surface to a container. Returns `None` for an empty or
    /// nonsensical container so callers keep their previous size.
    pub fn fit(css_width: f64, css_height: f64, dpr: f64) -> Option<Self> {
        if !css_width.is_finite() || !css_height.is_finite() {
            return None;
        }
        if css_width <= 0.0 || css_height <= 0.0 {
            return None;
        }
        let dpr = if dpr.is_finite() && dpr > 0.0 { dpr } else { 1.0 };
        Some(Self {
            width: css_width,
            height: css_height,
            dpr,
        })
    }

    /// Backing store size in physical pixels
    pub fn backing(&self) -> (u32, u32) {
        (
            (self.width * self.dpr).round().max(1.0) as u32,
            (self.height * self.dpr).round().max(1.0) as u32,
        )
    }

    /// Shorter side, handy for scale factors
    pub fn min_side(&self) -> f64 {
        self.width.min(self.height)
    }
}

#[cfg(target_arch = "wasm32")]
mod web {
    use glam::DVec2;
    use wasm_bindgen::JsCast;
    use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

    use super::SurfaceSize;
    use crate::error::{EngineError, Result};
    use crate::renderer::{Rgba, Surface, TextAlign, TextStyle, css_color};

    fn device_pixel_ratio() -> f64 {
        web_sys::window()
            .map(|w| w.device_pixel_ratio())
            .unwrap_or(1.0)
    }

    /// Canvas 2D backed surface
    pub struct CanvasSurface {
        ctx: CanvasRenderingContext2d,
        canvas: HtmlCanvasElement,
        size: SurfaceSize,
    }

    impl CanvasSurface {
        pub fn new(canvas: HtmlCanvasElement) -> Result<Self> {
            let ctx = canvas
                .get_context("2d")
                .map_err(|e| EngineError::Host(format!("{e:?}")))?
                .ok_or_else(|| EngineError::Host("no 2d context".into()))?
                .dyn_into::<CanvasRenderingContext2d>()
                .map_err(|_| EngineError::Host("not a 2d context".into()))?;

            let width = canvas.client_width() as f64;
            let height = canvas.client_height() as f64;
            let size = SurfaceSize::fit(width, height, device_pixel_ratio()).ok_or(
                EngineError::DegenerateSurface { width, height },
            )?;

            let mut surface = Self { ctx, canvas, size };
            surface.apply_size();
            log::info!(
                "canvas surface: {}x{} @{}x",
                size.width,
                size.height,
                size.dpr
            );
            Ok(surface)
        }

        fn apply_size(&mut self) {
            let (w, h) = self.size.backing();
            self.canvas.set_width(w);
            self.canvas.set_height(h);
            // Scale context so drawing ops use CSS pixels
            self.ctx
                .set_transform(self.size.dpr, 0.0, 0.0, self.size.dpr, 0.0, 0.0)
                .ok();
        }

        /// Re-fit to the container. Returns true if the size changed.
        pub fn resize_to_container(&mut self) -> bool {
            let width = self.canvas.client_width() as f64;
            let height = self.canvas.client_height() as f64;
            let Some(size) = SurfaceSize::fit(width, height, device_pixel_ratio()) else {
                return false;
            };
            if size == self.size {
                return false;
            }
            self.size = size;
            self.apply_size();
            true
        }

        pub fn canvas(&self) -> &HtmlCanvasElement {
            &self.canvas
        }

        fn path(&self, points: &[DVec2]) {
            self.ctx.begin_path();
            for (i, p) in points.iter().enumerate() {
                if i == 0 {
                    self.ctx.move_to(p.x, p.y);
                } else {
                    self.ctx.line_to(p.x, p.y);
                }
            }
        }
    }

    impl Surface for CanvasSurface {
        fn size(&self) -> SurfaceSize {
            self.size
        }

        fn clear(&mut self, color: Rgba) {
            self.ctx
                .clear_rect(0.0, 0.0, self.size.width, self.size.height);
            self.ctx.set_fill_style_str(&css_color(color));
            self.ctx
                .fill_rect(0.0, 0.0, self.size.width, self.size.height);
        }

        fn fill_rect(&mut self, pos: DVec2, size: DVec2, color: Rgba) {
            self.ctx.set_fill_style_str(&css_color(color));
            self.ctx.fill_rect(pos.x, pos.y, size.x, size.y);
        }

        fn stroke_rect(&mut self, pos: DVec2, size: DVec2, color: Rgba, width: f64) {
            self.ctx.set_stroke_style_str(&css_color(color));
            self.ctx.set_line_width(width);
            self.ctx.stroke_rect(pos.x, pos.y, size.x, size.y);
        }

        fn fill_circle(&mut self, center: DVec2, radius: f64, color: Rgba) {
            if radius <= 0.0 {
                return;
            }
            self.ctx.set_fill_style_str(&css_color(color));
            self.ctx.begin_path();
            self.ctx
                .arc(center.x, center.y, radius, 0.0, std::f64::consts::TAU)
                .ok();
            self.ctx.fill();
        }

        fn stroke_circle(&mut self, center: DVec2, radius: f64, color: Rgba, width: f64) {
            if radius <= 0.0 {
                return;
            }
            self.ctx.set_stroke_style_str(&css_color(color));
            self.ctx.set_line_width(width);
            self.ctx.begin_path();
            self.ctx
                .arc(center.x, center.y, radius, 0.0, std::f64::consts::TAU)
                .ok();
            self.ctx.stroke();
        }

        fn line(&mut self, from: DVec2, to: DVec2, color: Rgba, width: f64) {
            self.polyline(&[from, to], color, width);
        }

        fn polyline(&mut self, points: &[DVec2], color: Rgba, width: f64) {
            if points.len() < 2 {
                return;
            }
            self.ctx.set_stroke_style_str(&css_color(color));
            self.ctx.set_line_width(width);
            self.path(points);
            self.ctx.stroke();
        }

        fn fill_polygon(&mut self, points: &[DVec2], color: Rgba) {
            if points.len() < 3 {
                return;
            }
            self.ctx.set_fill_style_str(&css_color(color));
            self.path(points);
            self.ctx.close_path();
            self.ctx.fill();
        }

        fn text(&mut self, text: &str, pos: DVec2, style: TextStyle) {
            let weight = if style.bold { "bold " } else { "" };
            self.ctx
                .set_font(&format!("{weight}{}px 'IBM Plex Mono', monospace", style.size));
            self.ctx.set_text_align(match style.align {
                TextAlign::Left => "left",
                TextAlign::Center => "center",
                TextAlign::Right => "right",
            });
            self.ctx.set_text_baseline("middle");
            self.ctx.set_fill_style_str(&css_color(style.color));
            self.ctx.fill_text(text, pos.x, pos.y).ok();
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use web::CanvasSurface;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_rejects_empty_container() {
        assert!(SurfaceSize::fit(0.0, 300.0, 2.0).is_none());
        assert!(SurfaceSize::fit(400.0, -1.0, 2.0).is_none());
        assert!(SurfaceSize::fit(f64::NAN, 300.0, 1.0).is_none());
    }

    #[test]
    fn test_backing_scales_by_dpr() {
        let size = SurfaceSize::fit(400.0, 300.0, 2.0).unwrap();
        assert_eq!(size.backing(), (800, 600));

        let size = SurfaceSize::fit(401.0, 301.0, 1.5).unwrap();
        assert_eq!(size.backing(), (602, 452));
    }

    #[test]
    fn test_bad_dpr_falls_back_to_one() {
        let size = SurfaceSize::fit(400.0, 300.0, 0.0).unwrap();
        assert_eq!(size.dpr, 1.0);
        assert_eq!(size.backing(), (400, 300));
    }
}
