//! Fixed-size velocity-Verlet integrator
//!
//! Step-integrated simulations keep an `IntegratorState` as the single source
//! of truth for their generalized coordinates.

/// Generalized positions and velocities
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegratorState<const N: usize> {
    pub q: [f64; N],
    pub v: [f64; N],
}

impl<const N: usize> Default for IntegratorState<N> {
    fn default() -> Self {
        Self {
            q: [0.0; N],
            v: [0.0; N],
        }
    }
}

impl<const N: usize> IntegratorState<N> {
    pub fn new(q: [f64; N], v: [f64; N]) -> Self {
        Self { q, v }
    }

    pub fn is_finite(&self) -> bool {
        self.q.iter().chain(self.v.iter()).all(|x| x.is_finite())
    }
}

/// Advance `state` by one velocity-Verlet step.
///
/// `accel(q, v, t)` returns generalized accelerations. Velocity-dependent
/// forces see the predicted velocity `v + a0·dt` in the second evaluation.
pub fn verlet_step<const N: usize, F>(state: &mut IntegratorState<N>, t: f64, dt: f64, mut accel: F)
where
    F: FnMut(&[f64; N], &[f64; N], f64) -> [f64; N],
{
    if dt.is_nan() || dt <= 0.0 {
        return;
    }
    let a0 = accel(&state.q, &state.v, t);

    let mut predicted = state.v;
    for i in 0..N {
        state.q[i] += state.v[i] * dt + 0.5 * a0[i] * dt * dt;
        predicted[i] += a0[i] * dt;
    }

    let a1 = accel(&state.q, &predicted, t + dt);
    for i in 0..N {
        state.v[i] += 0.5 * (a0[i] + a1[i]) * dt;
    }
}
