//! Frame scheduling core
//!
//! The host owns the real per-frame callback (`requestAnimationFrame` on the
//! web, a synthetic clock in tests). This type only turns host timestamps
//! into clamped physics deltas, so it can be driven with any timestamps.

use crate::consts::DT_CAP;

#[derive(Debug, Clone)]
pub struct FrameScheduler {
    running: bool,
    /// Host timestamp of the previous tick (ms); `None` right after start
    last_timestamp: Option<f64>,
    dt_cap: f64,
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new(DT_CAP)
    }
}

impl FrameScheduler {
    pub fn new(dt_cap: f64) -> Self {
        Self {
            running: false,
            last_timestamp: None,
            dt_cap: dt_cap.max(0.0),
        }
    }

    pub fn dt_cap(&self) -> f64 {
        self.dt_cap
    }

    pub fn set_dt_cap(&mut self, dt_cap: f64) {
        self.dt_cap = dt_cap.max(0.0);
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn start(&mut self) {
        if !self.running {
            self.running = true;
            self.last_timestamp = None;
        }
    }

    /// Stop ticking; the next start measures from its own first frame
    pub fn stop(&mut self) {
        self.running = false;
        self.last_timestamp = None;
    }

    /// Physics delta (seconds) for a frame at `now_ms`, or `None` when stopped.
    ///
    /// The first tick after `start` only records the timestamp and yields 0.
    /// A clock that runs backwards yields 0 as well.
    pub fn tick(&mut self, now_ms: f64) -> Option<f64> {
        if !self.running {
            return None;
        }
        if !now_ms.is_finite() {
            return Some(0.0);
        }
        let dt = match self.last_timestamp {
            Some(last) => ((now_ms - last) / 1000.0).clamp(0.0, self.dt_cap),
            None => 0.0,
        };
        self.last_timestamp = Some(now_ms);
        Some(dt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_stopped_scheduler_does_not_tick() {
        let mut scheduler = FrameScheduler::default();
        assert_eq!(scheduler.tick(16.0), None);
    }

    #[test]
    fn test_first_tick_after_start_is_zero() {
        let mut scheduler = FrameScheduler::default();
        scheduler.start();
        assert_eq!(scheduler.tick(1000.0), Some(0.0));
        let dt = scheduler.tick(1016.0).unwrap();
        assert!((dt - 0.016).abs() < 1e-12);
    }

    #[test]
    fn test_backgrounded_gap_is_capped() {
        let mut scheduler = FrameScheduler::default();
        scheduler.start();
        scheduler.tick(0.0);
        // 10 second gap
        assert_eq!(scheduler.tick(10_000.0), Some(DT_CAP));
    }

    #[test]
    fn test_resume_does_not_apply_stale_delta() {
        let mut scheduler = FrameScheduler::default();
        scheduler.start();
        scheduler.tick(0.0);
        scheduler.tick(16.0);
        scheduler.stop();
        scheduler.start();
        assert_eq!(scheduler.tick(60_000.0), Some(0.0));
    }

    #[test]
    fn test_clock_going_backwards() {
        let mut scheduler = FrameScheduler::default();
        scheduler.start();
        scheduler.tick(500.0);
        assert_eq!(scheduler.tick(400.0), Some(0.0));
    }

    proptest! {
        #[test]
        fn prop_dt_never_exceeds_cap(
            start in 0.0f64..1e7,
            gaps in proptest::collection::vec(0.0f64..20_000.0, 1..50),
            cap in 0.001f64..0.25,
        ) {
            let mut scheduler = FrameScheduler::new(cap);
            scheduler.start();
            let mut now = start;
            scheduler.tick(now);
            for gap in gaps {
                now += gap;
                let dt = scheduler.tick(now).unwrap();
                prop_assert!(dt >= 0.0);
                prop_assert!(dt <= cap);
                prop_assert!((dt - (gap / 1000.0).min(cap)).abs() < 1e-9);
            }
        }
    }
}
