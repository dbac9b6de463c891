//! Interaction adapter
//!
//! Maps raw pointer events to surface coordinates and turns press/drag into
//! discrete click samples. Keyboard keys are normalized into `Key`.

use glam::DVec2;

use crate::renderer::SurfaceSize;

/// Minimum distance (CSS px) between two drag samples
pub const DRAG_SAMPLE_SPACING: f64 = 6.0;

/// Element geometry needed to map client coordinates into the surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerMapper {
    pub rect_left: f64,
    pub rect_top: f64,
    pub rect_width: f64,
    pub rect_height: f64,
    pub size: SurfaceSize,
}

impl PointerMapper {
    /// Client coordinates to surface CSS pixels, or `None` if the point is
    /// outside the element (or the element has no area)
    pub fn map(&self, client_x: f64, client_y: f64) -> Option<DVec2> {
        if self.rect_width <= 0.0 || self.rect_height <= 0.0 {
            return None;
        }
        let u = (client_x - self.rect_left) / self.rect_width;
        let v = (client_y - self.rect_top) / self.rect_height;
        if !(0.0..=1.0).contains(&u) || !(0.0..=1.0).contains(&v) {
            return None;
        }
        // The element may be CSS-stretched relative to the logical surface
        Some(DVec2::new(u * self.size.width, v * self.size.height))
    }

    /// Physical backing-store pixel under a client point
    pub fn map_physical(&self, client_x: f64, client_y: f64) -> Option<DVec2> {
        self.map(client_x, client_y).map(|p| p * self.size.dpr)
    }
}

/// Keyboard commands understood by the simulations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Launch / fire / emit
    Launch,
    /// Lock in a challenge answer
    Submit,
    Left,
    Right,
    Up,
    Down,
    Reset,
    Pause,
    Char(char),
}

impl Key {
    /// Map a DOM `KeyboardEvent.key` value
    pub fn from_dom(key: &str) -> Option<Self> {
        match key {
            " " | "Spacebar" => Some(Key::Launch),
            "Enter" => Some(Key::Submit),
            "ArrowLeft" | "Left" => Some(Key::Left),
            "ArrowRight" | "Right" => Some(Key::Right),
            "ArrowUp" | "Up" => Some(Key::Up),
            "ArrowDown" | "Down" => Some(Key::Down),
            "r" | "R" => Some(Key::Reset),
            "p" | "P" | "Escape" => Some(Key::Pause),
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(Key::Char(c)),
                    _ => None,
                }
            }
        }
    }
}

/// Turns pointer press and drag into click-equivalent samples
pub struct InteractionAdapter {
    on_click: Box<dyn FnMut(DVec2)>,
    pressed: bool,
    last_sample: Option<DVec2>,
}

impl InteractionAdapter {
    pub fn new(on_click: impl FnMut(DVec2) + 'static) -> Self {
        Self {
            on_click: Box::new(on_click),
            pressed: false,
            last_sample: None,
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    pub fn pointer_down(&mut self, point: DVec2) {
        self.pressed = true;
        self.last_sample = Some(point);
        (self.on_click)(point);
    }

    pub fn pointer_move(&mut self, point: DVec2) {
        if !self.pressed {
            return;
        }
        let far_enough = self
            .last_sample
            .is_none_or(|last| last.distance(point) >= DRAG_SAMPLE_SPACING);
        if far_enough {
            self.last_sample = Some(point);
            (self.on_click)(point);
        }
    }

    pub fn pointer_up(&mut self) {
        self.pressed = false;
        self.last_sample = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn mapper(dpr: f64) -> PointerMapper {
        PointerMapper {
            rect_left: 100.0,
            rect_top: 50.0,
            rect_width: 400.0,
            rect_height: 300.0,
            size: SurfaceSize::fit(400.0, 300.0, dpr).unwrap(),
        }
    }

    #[test]
    fn test_map_accounts_for_offset() {
        let m = mapper(1.0);
        assert_eq!(m.map(100.0, 50.0), Some(DVec2::ZERO));
        assert_eq!(m.map(300.0, 200.0), Some(DVec2::new(200.0, 150.0)));
        assert_eq!(m.map(99.0, 60.0), None);
        assert_eq!(m.map(200.0, 351.0), None);
    }

    #[test]
    fn test_physical_mapping_inverts_dpr() {
        let m = mapper(2.0);
        let css = m.map(300.0, 200.0).unwrap();
        let physical = m.map_physical(300.0, 200.0).unwrap();
        assert_eq!(physical / m.size.dpr, css);
        assert_eq!(physical, DVec2::new(400.0, 300.0));
    }

    #[test]
    fn test_stretched_element() {
        // Element displayed at twice its logical size
        let m = PointerMapper {
            rect_width: 800.0,
            rect_height: 600.0,
            ..mapper(1.0)
        };
        assert_eq!(m.map(500.0, 350.0), Some(DVec2::new(200.0, 150.0)));
    }

    #[test]
    fn test_key_from_dom() {
        assert_eq!(Key::from_dom(" "), Some(Key::Launch));
        assert_eq!(Key::from_dom("Enter"), Some(Key::Submit));
        assert_eq!(Key::from_dom("ArrowLeft"), Some(Key::Left));
        assert_eq!(Key::from_dom("r"), Some(Key::Reset));
        assert_eq!(Key::from_dom("3"), Some(Key::Char('3')));
        assert_eq!(Key::from_dom("Shift"), None);
    }

    #[test]
    fn test_drag_emits_spaced_samples() {
        let clicks = Rc::new(RefCell::new(Vec::new()));
        let sink = clicks.clone();
        let mut adapter = InteractionAdapter::new(move |p| sink.borrow_mut().push(p));

        // Moves before a press are ignored
        adapter.pointer_move(DVec2::new(0.0, 0.0));
        assert!(clicks.borrow().is_empty());

        adapter.pointer_down(DVec2::new(10.0, 10.0));
        for i in 1..=20 {
            adapter.pointer_move(DVec2::new(10.0 + i as f64, 10.0));
        }
        adapter.pointer_up();
        adapter.pointer_move(DVec2::new(100.0, 10.0));

        let clicks = clicks.borrow();
        // Down at 10, then samples at 16, 22, 28
        assert_eq!(clicks.len(), 4);
        for pair in clicks.windows(2) {
            assert!(pair[0].distance(pair[1]) >= DRAG_SAMPLE_SPACING);
        }
        assert!(!adapter.is_pressed());
    }
}
