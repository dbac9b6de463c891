use glam::DVec2;
use physics_lab::Settings;
use physics_lab::consts::DT_CAP;
use physics_lab::input::Key;
use physics_lab::renderer::{RecordingSurface, Surface};
use physics_lab::sim::{Mode, SIMULATIONS, Widget};

const FRAME_MS: f64 = 1000.0 / 60.0;

fn run(widget: &mut Widget, surface: &mut RecordingSurface, from_ms: f64, frames: usize) -> f64 {
    let mut now = from_ms;
    for _ in 0..frames {
        surface.reset();
        widget.frame(now, surface);
        assert!(
            surface.all_finite(),
            "{} drew a non-finite command",
            widget.simulation().name()
        );
        now += FRAME_MS;
    }
    now
}

#[test]
fn test_every_widget_runs_in_every_mode() {
    for name in SIMULATIONS {
        let mut surface = RecordingSurface::new(800.0, 450.0);
        let mut widget = Widget::create(name, 11, Settings::default()).unwrap();
        widget.start();
        let mut now = run(&mut widget, &mut surface, 0.0, 90);
        assert!(widget.simulation().state().sim_time > 1.0, "{name} did not advance");

        let modes: Vec<Mode> = widget.simulation().supported_modes().to_vec();
        for mode in modes {
            widget.set_mode(mode).unwrap();
            assert_eq!(widget.challenge().active, mode.is_scored());
            let size = surface.size();
            widget.click(DVec2::new(size.width * 0.4, size.height * 0.5), size);
            widget.key(Key::Submit);
            now = run(&mut widget, &mut surface, now, 30);
        }
    }
}

#[test]
fn test_paused_widget_renders_static_frame() {
    let mut surface = RecordingSurface::new(640.0, 360.0);
    let mut widget = Widget::create("waves", 1, Settings::default()).unwrap();
    widget.frame(0.0, &mut surface);
    widget.frame(500.0, &mut surface);
    assert!(!surface.commands.is_empty());
    assert_eq!(widget.simulation().state().sim_time, 0.0);
}

#[test]
fn test_long_gap_is_clamped() {
    let mut surface = RecordingSurface::new(800.0, 450.0);
    let mut widget = Widget::create("relativity", 1, Settings::default()).unwrap();
    widget.start();
    widget.frame(0.0, &mut surface);
    widget.frame(10_000.0, &mut surface);
    let t = widget.simulation().state().sim_time;
    assert!((t - DT_CAP).abs() < 1e-12, "sim_time {t}");
}

#[test]
fn test_challenge_submit_scores_and_shows_popup() {
    let mut surface = RecordingSurface::new(800.0, 450.0);
    let mut widget = Widget::create("spring", 3, Settings::default()).unwrap();
    widget.set_mode(Mode::Challenge).unwrap();
    widget.start();
    let now = run(&mut widget, &mut surface, 0.0, 10);
    widget.key(Key::Submit);
    assert_eq!(widget.challenge().attempts, 1);
    assert_eq!(widget.popups().len(), 1);

    surface.reset();
    widget.frame(now, &mut surface);
    assert!(surface.has_text("Score"));
}

#[test]
fn test_tiny_and_resized_surfaces() {
    let mut widget = Widget::create("taxonomy", 5, Settings::default()).unwrap();
    widget.start();
    let mut small = RecordingSurface::new(1.0, 1.0);
    let now = run(&mut widget, &mut small, 0.0, 5);
    let mut large = RecordingSurface::new(1920.0, 1080.0);
    run(&mut widget, &mut large, now, 5);
    assert_eq!(widget.simulation().state().viewport, large.size());
}
