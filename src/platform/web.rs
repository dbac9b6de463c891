//! `requestAnimationFrame` loop with a cancellable handle

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use crate::error::{EngineError, Result};

type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

/// Re-registers itself every frame until cancelled. Dropping the loop
/// cancels it and frees the callback.
pub struct AnimationLoop {
    handle: Rc<Cell<Option<i32>>>,
    callback: FrameCallback,
}

fn request(callback: &Closure<dyn FnMut(f64)>) -> Option<i32> {
    let window = web_sys::window()?;
    match window.request_animation_frame(callback.as_ref().unchecked_ref()) {
        Ok(id) => Some(id),
        Err(e) => {
            log::warn!("requestAnimationFrame failed: {e:?}");
            None
        }
    }
}

impl AnimationLoop {
    /// Start calling `on_frame(timestamp_ms)` once per display frame
    pub fn start(mut on_frame: impl FnMut(f64) + 'static) -> Result<Self> {
        let handle: Rc<Cell<Option<i32>>> = Rc::new(Cell::new(None));
        let callback: FrameCallback = Rc::new(RefCell::new(None));

        let next = callback.clone();
        let active = handle.clone();
        *callback.borrow_mut() = Some(Closure::new(move |now: f64| {
            on_frame(now);
            // Cancelled from inside the frame
            if active.get().is_none() {
                return;
            }
            if let Some(cb) = next.borrow().as_ref() {
                active.set(request(cb));
            }
        }));

        let id = callback
            .borrow()
            .as_ref()
            .and_then(request)
            .ok_or_else(|| EngineError::Host("requestAnimationFrame unavailable".into()))?;
        handle.set(Some(id));
        Ok(Self { handle, callback })
    }

    pub fn is_active(&self) -> bool {
        self.handle.get().is_some()
    }

    /// Deregister the pending frame. The callback is kept for `resume`.
    pub fn cancel(&self) {
        if let Some(id) = self.handle.take() {
            if let Some(window) = web_sys::window() {
                let _ = window.cancel_animation_frame(id);
            }
        }
    }

    pub fn resume(&self) {
        if self.is_active() {
            return;
        }
        if let Some(cb) = self.callback.borrow().as_ref() {
            self.handle.set(request(cb));
        }
    }
}

impl Drop for AnimationLoop {
    fn drop(&mut self) {
        self.cancel();
        // The closure holds a reference to its own slot
        self.callback.borrow_mut().take();
    }
}
