//! Challenge scoring
//!
//! Grading is a pure function of (guess, target, tolerance). The running
//! challenge state only changes through `update_challenge_state`.

use glam::DVec2;

use crate::guard_denominator;

/// Normalized error below which an attempt is Perfect
pub const PERFECT_THRESHOLD: f64 = 0.05;
/// Normalized error below which an attempt is Great
pub const GREAT_THRESHOLD: f64 = 0.15;
/// Normalized error below which an attempt is Close
pub const CLOSE_THRESHOLD: f64 = 0.35;

/// Discrete accuracy buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AccuracyTier {
    Miss,
    Close,
    Great,
    Perfect,
}

impl AccuracyTier {
    pub fn points(&self) -> u32 {
        match self {
            AccuracyTier::Perfect => 3,
            AccuracyTier::Great => 2,
            AccuracyTier::Close => 1,
            AccuracyTier::Miss => 0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AccuracyTier::Perfect => "Perfect!",
            AccuracyTier::Great => "Great!",
            AccuracyTier::Close => "Close",
            AccuracyTier::Miss => "Miss",
        }
    }

    fn from_error(error: f64) -> Self {
        if !error.is_finite() {
            AccuracyTier::Miss
        } else if error < PERFECT_THRESHOLD {
            AccuracyTier::Perfect
        } else if error < GREAT_THRESHOLD {
            AccuracyTier::Great
        } else if error < CLOSE_THRESHOLD {
            AccuracyTier::Close
        } else {
            AccuracyTier::Miss
        }
    }
}

/// Outcome of grading one attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccuracyResult {
    pub points: u32,
    pub tier: AccuracyTier,
    /// |value - target| / tolerance
    pub error: f64,
}

impl AccuracyResult {
    pub fn label(&self) -> &'static str {
        self.tier.label()
    }
}

/// Grade a guess against a target
pub fn calculate_accuracy(value: f64, target: f64, tolerance: f64) -> AccuracyResult {
    let error = (value - target).abs() / guard_denominator(tolerance.abs());
    let tier = AccuracyTier::from_error(error);
    AccuracyResult {
        points: tier.points(),
        tier,
        error,
    }
}

/// Running challenge state for one widget
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChallengeState {
    pub active: bool,
    pub score: u32,
    pub attempts: u32,
    pub streak: u32,
    pub best_streak: u32,
    pub last_result: Option<AccuracyResult>,
}

impl ChallengeState {
    /// Fresh active state on entering a scored mode
    pub fn enter() -> Self {
        Self {
            active: true,
            ..Self::default()
        }
    }

    /// Inactive state on leaving a scored mode
    pub fn exit() -> Self {
        Self::default()
    }
}

/// Fold one graded attempt into the challenge state
pub fn update_challenge_state(state: &ChallengeState, result: AccuracyResult) -> ChallengeState {
    if !state.active {
        return state.clone();
    }
    let streak = if result.points > 0 { state.streak + 1 } else { 0 };
    ChallengeState {
        active: true,
        score: state.score + result.points,
        attempts: state.attempts + 1,
        streak,
        best_streak: state.best_streak.max(streak),
        last_result: Some(result),
    }
}

/// Floating "+N label" text spawned by a graded attempt
#[derive(Debug, Clone, PartialEq)]
pub struct ScorePopup {
    pub text: String,
    pub points: u32,
    pub pos: DVec2,
    /// Widget clock (seconds) when spawned
    pub start_time: f64,
}

impl ScorePopup {
    pub fn new(result: &AccuracyResult, pos: DVec2, now: f64) -> Self {
        let text = if result.points > 0 {
            format!("+{} {}", result.points, result.label())
        } else {
            result.label().to_string()
        };
        Self {
            text,
            points: result.points,
            pos,
            start_time: now,
        }
    }

    pub fn age(&self, now: f64) -> f64 {
        (now - self.start_time).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn result_with(points: u32) -> AccuracyResult {
        let tier = match points {
            3 => AccuracyTier::Perfect,
            2 => AccuracyTier::Great,
            1 => AccuracyTier::Close,
            _ => AccuracyTier::Miss,
        };
        AccuracyResult {
            points: tier.points(),
            tier,
            error: 0.0,
        }
    }

    #[test]
    fn test_exact_guess_is_perfect() {
        let r = calculate_accuracy(42.0, 42.0, 5.0);
        assert_eq!(r.tier, AccuracyTier::Perfect);
        assert_eq!(r.points, 3);
        assert_eq!(r.label(), "Perfect!");
    }

    #[test]
    fn test_tier_thresholds() {
        assert_eq!(calculate_accuracy(10.4, 10.0, 10.0).tier, AccuracyTier::Perfect);
        assert_eq!(calculate_accuracy(11.0, 10.0, 10.0).tier, AccuracyTier::Great);
        assert_eq!(calculate_accuracy(13.0, 10.0, 10.0).tier, AccuracyTier::Close);
        assert_eq!(calculate_accuracy(14.0, 10.0, 10.0).tier, AccuracyTier::Miss);
    }

    #[test]
    fn test_zero_tolerance_does_not_nan() {
        let r = calculate_accuracy(1.0, 1.0, 0.0);
        assert_eq!(r.tier, AccuracyTier::Perfect);
        let r = calculate_accuracy(1.1, 1.0, 0.0);
        assert_eq!(r.tier, AccuracyTier::Miss);
    }

    #[test]
    fn test_nan_guess_is_miss() {
        assert_eq!(calculate_accuracy(f64::NAN, 1.0, 1.0).tier, AccuracyTier::Miss);
    }

    #[test]
    fn test_reducer_accumulates() {
        let state = ChallengeState::enter();
        let state = update_challenge_state(&state, result_with(3));
        let state = update_challenge_state(&state, result_with(2));
        assert_eq!(state.score, 5);
        assert_eq!(state.attempts, 2);
        assert_eq!(state.streak, 2);
        assert_eq!(state.best_streak, 2);
        assert_eq!(state.last_result.unwrap().points, 2);
    }

    #[test]
    fn test_streak_resets_and_restarts() {
        let mut state = ChallengeState::enter();
        for p in [3, 1, 0, 0] {
            state = update_challenge_state(&state, result_with(p));
        }
        assert_eq!(state.streak, 0);
        assert_eq!(state.best_streak, 2);
        state = update_challenge_state(&state, result_with(1));
        assert_eq!(state.streak, 1);
        assert_eq!(state.best_streak, 2);
    }

    #[test]
    fn test_inactive_state_ignores_results() {
        let state = ChallengeState::exit();
        let next = update_challenge_state(&state, result_with(3));
        assert_eq!(next, state);
    }

    #[test]
    fn test_popup_text() {
        let r = calculate_accuracy(1.0, 1.0, 1.0);
        let popup = ScorePopup::new(&r, DVec2::new(10.0, 20.0), 2.0);
        assert_eq!(popup.text, "+3 Perfect!");
        assert_eq!(popup.age(2.5), 0.5);
        let miss = calculate_accuracy(100.0, 1.0, 1.0);
        assert_eq!(ScorePopup::new(&miss, DVec2::ZERO, 0.0).text, "Miss");
    }

    proptest! {
        #[test]
        fn prop_on_target_is_top_tier(target in -1e6f64..1e6, tol in 1e-3f64..1e3) {
            prop_assert_eq!(calculate_accuracy(target, target, tol).tier, AccuracyTier::Perfect);
        }

        #[test]
        fn prop_ten_tolerances_off_is_lowest_tier(target in -1e6f64..1e6, tol in 1e-3f64..1e3) {
            let r = calculate_accuracy(target + 10.0 * tol, target, tol);
            prop_assert_eq!(r.tier, AccuracyTier::Miss);
            prop_assert_eq!(r.points, 0);
        }

        #[test]
        fn prop_best_streak_monotonic(points in proptest::collection::vec(0u32..4, 0..64)) {
            let mut state = ChallengeState::enter();
            let mut prev_best = 0;
            let mut prev_streak = 0;
            for p in points {
                state = update_challenge_state(&state, result_with(p));
                prop_assert!(state.best_streak >= prev_best);
                prop_assert!(state.best_streak >= state.streak);
                if p == 0 {
                    prop_assert_eq!(state.streak, 0);
                } else {
                    prop_assert_eq!(state.streak, prev_streak + 1);
                }
                prev_best = state.best_streak;
                prev_streak = state.streak;
            }
        }
    }
}
