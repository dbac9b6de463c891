//! Reusable draw routines: meters, panels, markers, popups, scoreboard

use glam::DVec2;
use std::f64::consts::TAU;

use super::{Rgba, Surface, TextStyle, palette, with_alpha};
use crate::scoring::{AccuracyTier, ChallengeState, ScorePopup};

/// Interpolate an energy color (low=blue, medium=green, high=red/orange)
pub fn energy_color(t: f64, alpha: f32) -> Rgba {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) as f32 } else { 0.0 };

    // Color gradient: blue (low) -> cyan -> green -> yellow -> orange -> red (high)
    let (r, g, b) = if t < 0.25 {
        // Blue to cyan
        let u = t / 0.25;
        (0.2, 0.4 + 0.4 * u, 1.0)
    } else if t < 0.5 {
        // Cyan to green
        let u = (t - 0.25) / 0.25;
        (0.2, 0.8, 1.0 - 0.6 * u)
    } else if t < 0.75 {
        // Green to yellow
        let u = (t - 0.5) / 0.25;
        (0.2 + 0.8 * u, 0.8, 0.4 - 0.2 * u)
    } else {
        // Yellow to red/orange
        let u = (t - 0.75) / 0.25;
        (1.0, 0.8 - 0.5 * u, 0.2)
    };

    [r, g, b, alpha]
}

/// Approximate display color of light with the given wavelength (nm).
/// Outside the visible band the color is a dim violet/red.
pub fn wavelength_color(nm: f64, alpha: f32) -> Rgba {
    let (r, g, b) = match nm {
        w if w < 380.0 => (0.45, 0.2, 0.6),
        w if w < 440.0 => ((440.0 - w) / 60.0, 0.0, 1.0),
        w if w < 490.0 => (0.0, (w - 440.0) / 50.0, 1.0),
        w if w < 510.0 => (0.0, 1.0, (510.0 - w) / 20.0),
        w if w < 580.0 => ((w - 510.0) / 70.0, 1.0, 0.0),
        w if w < 645.0 => (1.0, (645.0 - w) / 65.0, 0.0),
        w if w <= 750.0 => (1.0, 0.0, 0.0),
        _ => (0.55, 0.1, 0.1),
    };
    [r as f32, g as f32, b as f32, alpha]
}

pub fn tier_color(tier: AccuracyTier) -> Rgba {
    match tier {
        AccuracyTier::Perfect => palette::GOLD,
        AccuracyTier::Great => palette::GOOD,
        AccuracyTier::Close => palette::ACCENT,
        AccuracyTier::Miss => palette::BAD,
    }
}

/// Horizontal meter: label above, bar with fill fraction, value at the right
pub fn draw_meter(
    surface: &mut dyn Surface,
    pos: DVec2,
    size: DVec2,
    label: &str,
    value: f64,
    range: (f64, f64),
    color: Rgba,
) {
    let span = range.1 - range.0;
    let frac = if span.abs() > f64::EPSILON && value.is_finite() {
        ((value - range.0) / span).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let font = (size.y * 0.9).clamp(9.0, 14.0);

    surface.text(
        label,
        pos + DVec2::new(0.0, -font * 0.8),
        TextStyle::new(font, palette::TEXT_DIM),
    );
    surface.fill_rect(pos, size, palette::PANEL);
    surface.fill_rect(pos, DVec2::new(size.x * frac, size.y), color);
    surface.stroke_rect(pos, size, palette::PANEL_BORDER, 1.0);
    surface.text(
        &format_value(value),
        pos + DVec2::new(size.x, -font * 0.8),
        TextStyle::new(font, palette::TEXT).right(),
    );
}

/// Titled panel of key/value rows. Returns the panel size so callers can stack panels.
pub fn draw_info_panel(
    surface: &mut dyn Surface,
    pos: DVec2,
    title: &str,
    rows: &[(&str, String)],
    high_contrast: bool,
) -> DVec2 {
    let font = 12.0;
    let line = font * 1.45;
    let pad = 8.0;
    let widest = rows
        .iter()
        .map(|(k, v)| k.chars().count() + v.chars().count() + 2)
        .chain(std::iter::once(title.chars().count()))
        .max()
        .unwrap_or(0);
    let size = DVec2::new(
        widest as f64 * font * 0.62 + pad * 2.0,
        line * (rows.len() + 1) as f64 + pad * 2.0,
    );

    let (bg, text) = if high_contrast {
        ([0.0, 0.0, 0.0, 1.0], [1.0, 1.0, 1.0, 1.0])
    } else {
        (palette::PANEL, palette::TEXT)
    };
    surface.fill_rect(pos, size, bg);
    surface.stroke_rect(pos, size, palette::PANEL_BORDER, 1.0);
    surface.text(
        title,
        pos + DVec2::new(pad, pad + line * 0.5),
        TextStyle::new(font, palette::ACCENT).bold(),
    );
    for (i, (key, value)) in rows.iter().enumerate() {
        let y = pos.y + pad + line * (i as f64 + 1.5);
        surface.text(key, DVec2::new(pos.x + pad, y), TextStyle::new(font, palette::TEXT_DIM));
        surface.text(
            value,
            DVec2::new(pos.x + size.x - pad, y),
            TextStyle::new(font, text).right(),
        );
    }
    size
}

/// Pulsing ring with a crosshair marking a target or prediction
pub fn draw_target_marker(
    surface: &mut dyn Surface,
    center: DVec2,
    radius: f64,
    color: Rgba,
    time: f64,
    reduced_motion: bool,
) {
    let pulse = if reduced_motion {
        0.0
    } else {
        (time * TAU * 1.5).sin()
    };
    let r = radius * (1.0 + 0.15 * pulse);
    surface.fill_circle(center, r, with_alpha(color, 0.18));
    surface.stroke_circle(center, r, color, 2.0);
    surface.stroke_circle(center, r * 0.5, with_alpha(color, 0.7), 1.0);
    let arm = r * 1.3;
    surface.line(
        center - DVec2::new(arm, 0.0),
        center + DVec2::new(arm, 0.0),
        with_alpha(color, 0.6),
        1.0,
    );
    surface.line(
        center - DVec2::new(0.0, arm),
        center + DVec2::new(0.0, arm),
        with_alpha(color, 0.6),
        1.0,
    );
}

/// Draw a rising, fading score popup. Returns false once it has expired.
pub fn draw_score_popup(
    surface: &mut dyn Surface,
    popup: &ScorePopup,
    now: f64,
    duration: f64,
    reduced_motion: bool,
) -> bool {
    let age = popup.age(now);
    if age > duration {
        return false;
    }
    let t = age / duration.max(f64::EPSILON);
    let rise = if reduced_motion { 0.0 } else { 36.0 * t };
    let color = match popup.points {
        3 => palette::GOLD,
        2 => palette::GOOD,
        1 => palette::ACCENT,
        _ => palette::BAD,
    };
    surface.text(
        &popup.text,
        popup.pos - DVec2::new(0.0, rise),
        TextStyle::new(18.0, with_alpha(color, (1.0 - t) as f32))
            .centered()
            .bold(),
    );
    true
}

/// Challenge scoreboard, anchored at the top right corner
pub fn draw_scoreboard(surface: &mut dyn Surface, state: &ChallengeState) {
    if !state.active {
        return;
    }
    let size = surface.size();
    let panel = DVec2::new(150.0, 84.0);
    let pos = DVec2::new(size.width - panel.x - 10.0, 10.0);
    surface.fill_rect(pos, panel, palette::PANEL);
    surface.stroke_rect(pos, panel, palette::GOLD, 1.5);

    let style = TextStyle::new(13.0, palette::TEXT);
    let x = pos.x + 10.0;
    surface.text(
        &format!("Score  {}", state.score),
        DVec2::new(x, pos.y + 16.0),
        TextStyle::new(14.0, palette::GOLD).bold(),
    );
    surface.text(
        &format!("Streak {}", state.streak),
        DVec2::new(x, pos.y + 34.0),
        style,
    );
    surface.text(
        &format!("Best   {}", state.best_streak),
        DVec2::new(x, pos.y + 50.0),
        style,
    );
    if let Some(last) = state.last_result {
        surface.text(
            last.label(),
            DVec2::new(x, pos.y + 68.0),
            TextStyle::new(13.0, tier_color(last.tier)).bold(),
        );
    }
}

/// Vector arrow from `from` along `vector`
pub fn draw_arrow(surface: &mut dyn Surface, from: DVec2, vector: DVec2, color: Rgba, width: f64) {
    let len = vector.length();
    if !len.is_finite() || len < 1e-6 {
        return;
    }
    let to = from + vector;
    let dir = vector / len;
    let perp = DVec2::new(-dir.y, dir.x);
    let head = (len * 0.3).min(10.0);
    surface.line(from, to, color, width);
    surface.fill_polygon(
        &[to, to - dir * head + perp * head * 0.5, to - dir * head - perp * head * 0.5],
        color,
    );
}

/// Framed graph box with a title
pub fn draw_graph_frame(surface: &mut dyn Surface, pos: DVec2, size: DVec2, title: &str) {
    surface.fill_rect(pos, size, palette::PANEL);
    surface.stroke_rect(pos, size, palette::PANEL_BORDER, 1.0);
    // Zero line
    surface.line(
        DVec2::new(pos.x, pos.y + size.y * 0.5),
        DVec2::new(pos.x + size.x, pos.y + size.y * 0.5),
        palette::GRID,
        1.0,
    );
    surface.text(
        title,
        pos + DVec2::new(6.0, 10.0),
        TextStyle::new(11.0, palette::TEXT_DIM),
    );
}

/// Plot evenly spaced samples into a graph box, `range` mapped bottom..top
pub fn draw_series(
    surface: &mut dyn Surface,
    pos: DVec2,
    size: DVec2,
    values: &[f64],
    range: (f64, f64),
    color: Rgba,
) {
    if values.len() < 2 {
        return;
    }
    let span = range.1 - range.0;
    if span.abs() < f64::EPSILON {
        return;
    }
    let step = size.x / (values.len() - 1) as f64;
    let points: Vec<DVec2> = values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let t = if v.is_finite() {
                ((v - range.0) / span).clamp(0.0, 1.0)
            } else {
                0.5
            };
            DVec2::new(pos.x + i as f64 * step, pos.y + size.y * (1.0 - t))
        })
        .collect();
    surface.polyline(&points, color, 1.5);
}

/// Compact number formatting for readouts
pub fn format_value(v: f64) -> String {
    if !v.is_finite() {
        return "--".to_string();
    }
    let a = v.abs();
    if a != 0.0 && (a >= 1e5 || a < 1e-3) {
        format!("{:.2e}", v)
    } else if a >= 100.0 {
        format!("{:.0}", v)
    } else if a >= 10.0 {
        format!("{:.1}", v)
    } else {
        format!("{:.2}", v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{DrawCmd, RecordingSurface};
    use crate::scoring::{calculate_accuracy, update_challenge_state};

    #[test]
    fn test_popup_liveness() {
        let mut surface = RecordingSurface::new(400.0, 300.0);
        let r = calculate_accuracy(1.0, 1.0, 1.0);
        let popup = ScorePopup::new(&r, DVec2::new(100.0, 100.0), 0.0);
        assert!(draw_score_popup(&mut surface, &popup, 0.5, 1.2, false));
        assert!(!draw_score_popup(&mut surface, &popup, 1.3, 1.2, false));
        // Only the live call drew anything
        assert_eq!(surface.texts().len(), 1);
    }

    #[test]
    fn test_scoreboard_only_when_active() {
        let mut surface = RecordingSurface::new(400.0, 300.0);
        draw_scoreboard(&mut surface, &ChallengeState::exit());
        assert!(surface.commands.is_empty());

        let state = update_challenge_state(&ChallengeState::enter(), calculate_accuracy(5.0, 5.0, 1.0));
        draw_scoreboard(&mut surface, &state);
        assert!(surface.has_text("Score  3"));
        assert!(surface.has_text("Perfect!"));
    }

    #[test]
    fn test_meter_handles_degenerate_range() {
        let mut surface = RecordingSurface::new(400.0, 300.0);
        draw_meter(
            &mut surface,
            DVec2::new(10.0, 10.0),
            DVec2::new(100.0, 10.0),
            "Energy",
            f64::NAN,
            (0.0, 0.0),
            palette::ACCENT,
        );
        assert!(surface.all_finite());
        assert!(surface.has_text("--"));
    }

    #[test]
    fn test_zero_arrow_draws_nothing() {
        let mut surface = RecordingSurface::new(400.0, 300.0);
        draw_arrow(&mut surface, DVec2::ZERO, DVec2::ZERO, palette::ACCENT, 2.0);
        assert!(surface.commands.is_empty());
        draw_arrow(&mut surface, DVec2::ZERO, DVec2::new(50.0, 0.0), palette::ACCENT, 2.0);
        assert!(matches!(surface.commands[0], DrawCmd::Line { .. }));
    }

    #[test]
    fn test_wavelength_color_visible_band() {
        let red = wavelength_color(656.0, 1.0);
        assert_eq!(red[0], 1.0);
        let blue = wavelength_color(450.0, 1.0);
        assert_eq!(blue[2], 1.0);
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(3.14159), "3.14");
        assert_eq!(format_value(42.26), "42.3");
        assert_eq!(format_value(250.4), "250");
        assert_eq!(format_value(f64::INFINITY), "--");
    }
}
