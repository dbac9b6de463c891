//! Visual effect particles
//!
//! Purely cosmetic: particles never feed back into physics. The pool has no
//! internal cap, so emitters must fire small bounded bursts (a few dozen at
//! most per event) or idle animations will grow it without bound.

use glam::DVec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use std::f64::consts::TAU;

use crate::renderer::{Rgba, Surface, with_alpha};

/// Particle shape/behaviour presets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticleKind {
    /// Fast, short-lived streaks
    Spark,
    /// Soft, slow, growing halo
    Glow,
    /// Tumbling squares that fall under gravity
    Confetti,
    /// Stationary dots left behind a moving body
    Trail,
}

impl ParticleKind {
    /// Default emission bounds for this kind
    pub fn default_options(&self) -> EmitOptions {
        match self {
            ParticleKind::Spark => EmitOptions {
                speed: (80.0, 220.0),
                lifetime: (0.25, 0.6),
                size: (1.5, 3.0),
                gravity: 0.0,
                drag: 2.5,
                ..EmitOptions::default()
            },
            ParticleKind::Glow => EmitOptions {
                speed: (5.0, 30.0),
                lifetime: (0.5, 1.0),
                size: (4.0, 9.0),
                gravity: 0.0,
                drag: 1.0,
                ..EmitOptions::default()
            },
            ParticleKind::Confetti => EmitOptions {
                speed: (120.0, 260.0),
                lifetime: (0.8, 1.6),
                size: (3.0, 5.0),
                gravity: 320.0,
                drag: 0.8,
                direction: -std::f64::consts::FRAC_PI_2,
                spread: 1.6,
            },
            ParticleKind::Trail => EmitOptions {
                speed: (0.0, 0.0),
                lifetime: (0.4, 0.6),
                size: (2.0, 2.5),
                gravity: 0.0,
                drag: 0.0,
                ..EmitOptions::default()
            },
        }
    }
}

/// Randomization bounds for one burst
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmitOptions {
    /// Speed range (px/s)
    pub speed: (f64, f64),
    /// Lifetime range (s)
    pub lifetime: (f64, f64),
    /// Radius range (px)
    pub size: (f64, f64),
    /// Downward acceleration (px/s²)
    pub gravity: f64,
    /// Linear velocity damping (1/s)
    pub drag: f64,
    /// Central emission angle (radians, screen space)
    pub direction: f64,
    /// Full angular spread around `direction` (TAU = all directions)
    pub spread: f64,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            speed: (40.0, 120.0),
            lifetime: (0.4, 0.8),
            size: (2.0, 4.0),
            gravity: 0.0,
            drag: 0.0,
            direction: 0.0,
            spread: TAU,
        }
    }
}

/// A particle for visual effects
#[derive(Debug, Clone)]
pub struct Particle {
    pub kind: ParticleKind,
    pub pos: DVec2,
    pub vel: DVec2,
    pub color: Rgba,
    pub size: f64,
    /// Remaining lifetime (s)
    pub life: f64,
    /// Lifetime at spawn (s)
    pub max_life: f64,
    pub gravity: f64,
    pub drag: f64,
    /// Spin angle for confetti
    pub angle: f64,
}

impl Particle {
    /// Remaining life as a 0..1 fraction
    pub fn life_fraction(&self) -> f64 {
        if self.max_life <= 0.0 {
            0.0
        } else {
            (self.life / self.max_life).clamp(0.0, 1.0)
        }
    }
}

/// Pool of particles owned by one widget
#[derive(Debug, Clone)]
pub struct ParticleSystem {
    particles: Vec<Particle>,
    rng: Pcg32,
}

fn sample(rng: &mut Pcg32, range: (f64, f64)) -> f64 {
    let (lo, hi) = if range.0 <= range.1 {
        range
    } else {
        (range.1, range.0)
    };
    if hi - lo <= f64::EPSILON {
        lo
    } else {
        rng.random_range(lo..hi)
    }
}

impl ParticleSystem {
    pub fn new(seed: u64) -> Self {
        Self {
            particles: Vec::new(),
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    /// Spawn `count` particles at `at` using the kind's default bounds
    pub fn emit(&mut self, kind: ParticleKind, at: DVec2, count: usize, color: Rgba) {
        self.emit_with(kind, at, count, color, kind.default_options());
    }

    /// Spawn `count` particles at `at` with explicit bounds
    pub fn emit_with(
        &mut self,
        kind: ParticleKind,
        at: DVec2,
        count: usize,
        color: Rgba,
        options: EmitOptions,
    ) {
        if !at.x.is_finite() || !at.y.is_finite() {
            return;
        }
        self.particles.reserve(count);
        for _ in 0..count {
            let half = options.spread.abs() * 0.5;
            let angle = options.direction + sample(&mut self.rng, (-half, half));
            let speed = sample(&mut self.rng, options.speed);
            let life = sample(&mut self.rng, options.lifetime).max(1e-3);
            self.particles.push(Particle {
                kind,
                pos: at,
                vel: DVec2::new(angle.cos(), angle.sin()) * speed,
                color,
                size: sample(&mut self.rng, options.size),
                life,
                max_life: life,
                gravity: options.gravity,
                drag: options.drag,
                angle: sample(&mut self.rng, (0.0, TAU)),
            });
        }
    }

    /// Advance every particle and drop the expired ones
    pub fn update(&mut self, dt: f64) {
        if dt <= 0.0 || !dt.is_finite() {
            return;
        }
        for p in self.particles.iter_mut() {
            p.vel.y += p.gravity * dt;
            p.vel *= (1.0 - p.drag * dt).max(0.0);
            p.pos += p.vel * dt;
            p.life -= dt;
            match p.kind {
                ParticleKind::Glow => p.size *= 1.0 + 0.8 * dt,
                ParticleKind::Confetti => p.angle += 8.0 * dt,
                ParticleKind::Spark | ParticleKind::Trail => {}
            }
        }
        self.particles.retain(|p| p.life > 0.0);
    }

    /// Paint all live particles
    pub fn draw(&self, surface: &mut dyn Surface) {
        for p in &self.particles {
            let alpha = p.life_fraction() as f32;
            match p.kind {
                ParticleKind::Spark => {
                    let tail = p.vel * 0.03;
                    surface.line(p.pos - tail, p.pos, with_alpha(p.color, alpha), p.size);
                }
                ParticleKind::Glow => {
                    surface.fill_circle(p.pos, p.size, with_alpha(p.color, alpha * 0.35));
                    surface.fill_circle(p.pos, p.size * 0.4, with_alpha(p.color, alpha));
                }
                ParticleKind::Confetti => {
                    let (s, c) = p.angle.sin_cos();
                    let u = DVec2::new(c, s) * p.size;
                    let v = DVec2::new(-s, c) * p.size * 0.6;
                    surface.fill_polygon(
                        &[p.pos + u + v, p.pos - u + v, p.pos - u - v, p.pos + u - v],
                        with_alpha(p.color, alpha),
                    );
                }
                ParticleKind::Trail => {
                    surface.fill_circle(p.pos, p.size * (0.5 + 0.5 * alpha as f64), with_alpha(p.color, alpha * 0.6));
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::RecordingSurface;
    use proptest::prelude::*;

    const WHITE: Rgba = [1.0, 1.0, 1.0, 1.0];

    #[test]
    fn test_emit_appends() {
        let mut system = ParticleSystem::new(1);
        system.emit(ParticleKind::Spark, DVec2::new(10.0, 10.0), 12, WHITE);
        system.emit(ParticleKind::Glow, DVec2::new(10.0, 10.0), 3, WHITE);
        assert_eq!(system.len(), 15);
    }

    #[test]
    fn test_clear_empties_pool() {
        let mut system = ParticleSystem::new(2);
        system.emit(ParticleKind::Confetti, DVec2::ZERO, 40, WHITE);
        system.clear();
        assert!(system.is_empty());
    }

    #[test]
    fn test_confetti_falls() {
        let mut system = ParticleSystem::new(3);
        let options = EmitOptions {
            speed: (0.0, 0.0),
            lifetime: (5.0, 5.0),
            gravity: 100.0,
            ..EmitOptions::default()
        };
        system.emit_with(ParticleKind::Confetti, DVec2::ZERO, 1, WHITE, options);
        for _ in 0..10 {
            system.update(0.05);
        }
        assert!(system.particles()[0].pos.y > 0.0);
    }

    #[test]
    fn test_trail_particles_stay_put() {
        let mut system = ParticleSystem::new(4);
        system.emit(ParticleKind::Trail, DVec2::new(5.0, 5.0), 1, WHITE);
        system.update(0.1);
        assert_eq!(system.particles()[0].pos, DVec2::new(5.0, 5.0));
    }

    #[test]
    fn test_non_finite_origin_is_ignored() {
        let mut system = ParticleSystem::new(5);
        system.emit(ParticleKind::Spark, DVec2::new(f64::NAN, 0.0), 5, WHITE);
        assert!(system.is_empty());
    }

    #[test]
    fn test_draw_one_shape_per_particle() {
        let mut system = ParticleSystem::new(6);
        system.emit(ParticleKind::Spark, DVec2::new(50.0, 50.0), 4, WHITE);
        let mut surface = RecordingSurface::new(100.0, 100.0);
        system.draw(&mut surface);
        assert_eq!(surface.commands.len(), 4);
        assert!(surface.all_finite());
    }

    #[test]
    fn test_same_seed_same_burst() {
        let mut a = ParticleSystem::new(77);
        let mut b = ParticleSystem::new(77);
        a.emit(ParticleKind::Spark, DVec2::ZERO, 8, WHITE);
        b.emit(ParticleKind::Spark, DVec2::ZERO, 8, WHITE);
        for (pa, pb) in a.particles().iter().zip(b.particles()) {
            assert_eq!(pa.vel, pb.vel);
            assert_eq!(pa.life, pb.life);
        }
    }

    proptest! {
        #[test]
        fn prop_pool_drains_to_zero(
            seed in any::<u64>(),
            count in 0usize..200,
            dt in 0.005f64..0.05,
        ) {
            let mut system = ParticleSystem::new(seed);
            system.emit(ParticleKind::Confetti, DVec2::new(100.0, 100.0), count, WHITE);
            prop_assert_eq!(system.len(), count);
            // Longest confetti lifetime is 1.6 s
            let steps = (2.0 / dt).ceil() as usize;
            for _ in 0..steps {
                system.update(dt);
            }
            prop_assert_eq!(system.len(), 0);
        }
    }
}
