//! Physics Lab entry point
//!
//! On wasm, mounts a widget on every `canvas[data-sim]` in the page. Natively,
//! drives each simulation headless against a recording surface.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod web_host {
    use std::cell::RefCell;
    use std::rc::Rc;

    use wasm_bindgen::JsCast;
    use wasm_bindgen::prelude::*;
    use web_sys::{
        Document, Element, HtmlCanvasElement, HtmlInputElement, HtmlSelectElement, KeyboardEvent,
        PointerEvent,
    };

    use physics_lab::audio::AudioManager;
    use physics_lab::input::{InteractionAdapter, Key, PointerMapper};
    use physics_lab::platform::AnimationLoop;
    use physics_lab::renderer::{CanvasSurface, Surface};
    use physics_lab::sim::{Mode, Widget};
    use physics_lab::{EngineError, QualityPreset, Result, Settings};

    /// One mounted canvas
    struct Mounted {
        widget: Widget,
        surface: CanvasSurface,
        audio: AudioManager,
    }

    impl Mounted {
        fn frame(&mut self, now: f64) {
            self.surface.resize_to_container();
            self.widget.frame(now, &mut self.surface);
            for sound in self.widget.take_sounds() {
                self.audio.play(sound);
            }
            self.audio.set_tone(self.widget.tone());
        }

        fn mapper(&self) -> PointerMapper {
            let rect = self.surface.canvas().get_bounding_client_rect();
            PointerMapper {
                rect_left: rect.left(),
                rect_top: rect.top(),
                rect_width: rect.width(),
                rect_height: rect.height(),
                size: self.surface.size(),
            }
        }
    }

    type Mounts = Rc<RefCell<Vec<(Rc<RefCell<Mounted>>, AnimationLoop)>>>;

    pub fn run() -> Result<()> {
        console_error_panic_hook::set_once();
        if console_log::init_with_level(log::Level::Info).is_err() {
            web_sys::console::warn_1(&"logger already initialised".into());
        }

        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| EngineError::Host("no document".into()))?;
        // Host-injected settings win over the stored ones and replace them
        let settings = match document.body().and_then(|b| b.dataset().get("settings")) {
            Some(json) => match Settings::from_json(&json) {
                Ok(settings) => {
                    settings.save();
                    settings
                }
                Err(e) => {
                    log::warn!("{e}");
                    Settings::load()
                }
            },
            None => Settings::load(),
        };
        let seed = js_sys::Date::now() as u64;

        let canvases = document
            .query_selector_all("canvas[data-sim]")
            .map_err(|e| EngineError::Host(format!("{e:?}")))?;
        let mounts: Mounts = Rc::new(RefCell::new(Vec::new()));
        for i in 0..canvases.length() {
            let Some(canvas) = canvases
                .item(i)
                .and_then(|node| node.dyn_into::<HtmlCanvasElement>().ok())
            else {
                continue;
            };
            match mount(canvas, seed.wrapping_add(u64::from(i)), &settings) {
                Ok(mounted) => mounts.borrow_mut().push(mounted),
                Err(e) => log::warn!("skipping canvas {i}: {e}"),
            }
        }
        log::info!("Physics Lab mounted {} widget(s)", mounts.borrow().len());

        setup_visibility(&document, mounts.clone());
        setup_unmount(mounts);
        Ok(())
    }

    fn mount(
        canvas: HtmlCanvasElement,
        seed: u64,
        settings: &Settings,
    ) -> Result<(Rc<RefCell<Mounted>>, AnimationLoop)> {
        let name = canvas.dataset().get("sim").unwrap_or_default();
        let mut settings = settings.clone();
        if let Some(quality) = canvas.dataset().get("quality").and_then(|q| QualityPreset::parse(&q)) {
            settings.quality = quality;
        }
        let mut widget = Widget::create(&name, seed, settings.clone())?;
        if let Some(mode) = canvas.dataset().get("mode").and_then(|m| Mode::parse(&m)) {
            if let Err(e) = widget.set_mode(mode) {
                log::warn!("{name}: {e}");
            }
        }
        widget.start();

        let surface = CanvasSurface::new(canvas.clone())?;
        let mounted = Rc::new(RefCell::new(Mounted {
            widget,
            surface,
            audio: AudioManager::new(&settings),
        }));

        // Keyboard focus for key bindings
        let _ = canvas.set_attribute("tabindex", "0");
        setup_pointer(&canvas, mounted.clone());
        setup_keys(&canvas, mounted.clone());
        if let Some(container) = canvas.parent_element() {
            setup_sliders(&container, mounted.clone());
            setup_mode_picker(&container, mounted.clone());
        }

        let frame = mounted.clone();
        let animation = AnimationLoop::start(move |now| {
            // Skipped if an input handler holds the widget
            if let Ok(mut m) = frame.try_borrow_mut() {
                m.frame(now);
            }
        })?;
        log::info!("mounted {name} (seed {seed})");
        Ok((mounted, animation))
    }

    fn setup_pointer(canvas: &HtmlCanvasElement, mounted: Rc<RefCell<Mounted>>) {
        let target = mounted.clone();
        let adapter = Rc::new(RefCell::new(InteractionAdapter::new(move |point| {
            if let Ok(mut m) = target.try_borrow_mut() {
                let size = m.surface.size();
                m.widget.click(point, size);
            }
        })));

        let map = {
            let mounted = mounted.clone();
            move |event: &PointerEvent| {
                let mapper = mounted.try_borrow().ok()?.mapper();
                mapper.map(f64::from(event.client_x()), f64::from(event.client_y()))
            }
        };

        // Pointer down
        {
            let adapter = adapter.clone();
            let map = map.clone();
            let canvas_clone = canvas.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: PointerEvent| {
                let _ = canvas_clone.focus();
                if let Some(point) = map(&event) {
                    event.prevent_default();
                    adapter.borrow_mut().pointer_down(point);
                }
            });
            let _ = canvas
                .add_event_listener_with_callback("pointerdown", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Drag samples
        {
            let adapter = adapter.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: PointerEvent| {
                if !adapter.borrow().is_pressed() {
                    return;
                }
                if let Some(point) = map(&event) {
                    adapter.borrow_mut().pointer_move(point);
                }
            });
            let _ = canvas
                .add_event_listener_with_callback("pointermove", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        for name in ["pointerup", "pointercancel", "pointerleave"] {
            let adapter = adapter.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: PointerEvent| {
                adapter.borrow_mut().pointer_up();
            });
            let _ = canvas.add_event_listener_with_callback(name, closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn setup_keys(canvas: &HtmlCanvasElement, mounted: Rc<RefCell<Mounted>>) {
        let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
            let Some(key) = Key::from_dom(&event.key()) else {
                return;
            };
            // Keep space and arrows from scrolling the page
            if !matches!(key, Key::Char(_)) {
                event.prevent_default();
            }
            if let Ok(mut m) = mounted.try_borrow_mut() {
                m.widget.key(key);
            }
        });
        let _ = canvas.add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn setup_sliders(container: &Element, mounted: Rc<RefCell<Mounted>>) {
        let Ok(inputs) = container.query_selector_all("input[data-param]") else {
            return;
        };
        for i in 0..inputs.length() {
            let Some(input) = inputs
                .item(i)
                .and_then(|node| node.dyn_into::<HtmlInputElement>().ok())
            else {
                continue;
            };
            let Some(key) = input.dataset().get("param") else {
                continue;
            };

            // Slider bounds follow the parameter definition
            if let Some(param) = mounted
                .borrow()
                .widget
                .simulation()
                .state()
                .params
                .get(&key)
            {
                input.set_min(&param.min.to_string());
                input.set_max(&param.max.to_string());
                input.set_step(&param.step.to_string());
                input.set_value(&param.value.to_string());
            } else {
                log::warn!("slider for unknown parameter {key}");
                continue;
            }

            let mounted = mounted.clone();
            let input_clone = input.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                let Ok(value) = input_clone.value().parse::<f64>() else {
                    return;
                };
                let Ok(mut m) = mounted.try_borrow_mut() else {
                    return;
                };
                match m.widget.set_param(&key, value) {
                    Ok(stored) if stored != value => input_clone.set_value(&stored.to_string()),
                    Ok(_) => {}
                    Err(e) => log::warn!("{e}"),
                }
            });
            let _ = input.add_event_listener_with_callback("input", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn setup_mode_picker(container: &Element, mounted: Rc<RefCell<Mounted>>) {
        let Some(select) = container
            .query_selector("select[data-mode]")
            .ok()
            .flatten()
            .and_then(|el| el.dyn_into::<HtmlSelectElement>().ok())
        else {
            return;
        };
        let select_clone = select.clone();
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
            let Ok(mut m) = mounted.try_borrow_mut() else {
                return;
            };
            let result = Mode::parse(&select_clone.value())
                .ok_or_else(|| EngineError::Host(format!("unknown mode {}", select_clone.value())))
                .and_then(|mode| m.widget.set_mode(mode));
            if let Err(e) = result {
                log::warn!("{e}");
                select_clone.set_value(m.widget.simulation().mode().as_str());
            }
        });
        let _ = select.add_event_listener_with_callback("change", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    /// Pause or resume every mounted widget along with its frame loop
    fn set_suspended(mounts: &Mounts, suspended: bool) {
        for (mounted, animation) in mounts.borrow().iter() {
            let Ok(mut m) = mounted.try_borrow_mut() else {
                continue;
            };
            if suspended {
                m.widget.suspend();
                m.audio.set_tone(None);
                animation.cancel();
            } else {
                m.widget.wake();
                animation.resume();
            }
        }
    }

    fn setup_visibility(document: &Document, mounts: Mounts) {
        let document_clone = document.clone();
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
            let hidden = document_clone.visibility_state() == web_sys::VisibilityState::Hidden;
            set_suspended(&mounts, hidden);
            log::info!("visibility changed, hidden = {hidden}");
        });
        let _ = document
            .add_event_listener_with_callback("visibilitychange", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn setup_unmount(mounts: Mounts) {
        let Some(window) = web_sys::window() else {
            return;
        };

        // Pages kept in the back/forward cache are only suspended
        let hide_mounts = mounts.clone();
        let on_hide = Closure::<dyn FnMut(_)>::new(move |event: web_sys::PageTransitionEvent| {
            if event.persisted() {
                set_suspended(&hide_mounts, true);
                log::info!("page cached, widgets suspended");
                return;
            }
            for (mounted, animation) in hide_mounts.borrow_mut().drain(..) {
                animation.cancel();
                if let Ok(mut m) = mounted.try_borrow_mut() {
                    m.widget.pause();
                    m.audio.release();
                }
            }
            log::info!("unmounted all widgets");
        });
        let _ = window.add_event_listener_with_callback("pagehide", on_hide.as_ref().unchecked_ref());
        on_hide.forget();

        let on_show = Closure::<dyn FnMut(_)>::new(move |event: web_sys::PageTransitionEvent| {
            if event.persisted() {
                set_suspended(&mounts, false);
                log::info!("page restored, widgets resumed");
            }
        });
        let _ = window.add_event_listener_with_callback("pageshow", on_show.as_ref().unchecked_ref());
        on_show.forget();
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    if let Err(e) = web_host::run() {
        log::error!("Physics Lab failed to start: {e}");
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Physics Lab (native) starting headless demo");

    let only: Option<String> = std::env::args().nth(1);
    for name in physics_lab::sim::SIMULATIONS {
        if only.as_deref().is_some_and(|o| o != name) {
            continue;
        }
        if let Err(e) = demo(name) {
            log::error!("{name}: {e}");
        }
    }
}

/// Run one widget for a few simulated seconds, then a scored round if it has one
#[cfg(not(target_arch = "wasm32"))]
fn demo(name: &str) -> physics_lab::Result<()> {
    use glam::DVec2;
    use physics_lab::Settings;
    use physics_lab::input::Key;
    use physics_lab::renderer::{RecordingSurface, Surface};
    use physics_lab::sim::Widget;

    const FRAME_MS: f64 = 1000.0 / 60.0;

    let mut surface = RecordingSurface::new(800.0, 450.0);
    let settings = Settings::default();
    log::debug!("{name}: quality {}", settings.quality.as_str());
    let mut widget = Widget::create(name, 42, settings)?;
    widget.start();

    let mut now = 0.0;
    let mut run = |widget: &mut Widget, frames: usize, surface: &mut RecordingSurface| {
        for _ in 0..frames {
            widget.frame(now, surface);
            if !surface.all_finite() {
                log::warn!("{name}: non-finite draw command at {now:.0}ms");
            }
            surface.reset();
            now += FRAME_MS;
        }
    };

    run(&mut widget, 180, &mut surface);
    let sim = widget.simulation();
    match sim.energy() {
        Some(e) => log::info!("{name}: t = {:.2}s, E = {e:.4}", sim.state().sim_time),
        None => log::info!("{name}: t = {:.2}s", sim.state().sim_time),
    }

    let scored = sim.supported_modes().iter().copied().find(|m| m.is_scored());
    if let Some(mode) = scored {
        widget.set_mode(mode)?;
        run(&mut widget, 60, &mut surface);
        let size = surface.size();
        // Poke the usual answer controls
        widget.key(Key::Submit);
        widget.key(Key::Launch);
        widget.click(DVec2::new(size.width * 0.5, size.height * 0.5), size);
        run(&mut widget, 240, &mut surface);
        let c = widget.challenge();
        log::info!(
            "{name} [{mode}]: score {} over {} attempt(s), best streak {}",
            c.score,
            c.attempts,
            c.best_streak
        );
    }

    Ok(())
}
