//! Score breakdown for a completed run.
//!
//! Computed once at job termination from elapsed time, commit count, and
//! the push/pipeline outcomes; never mutated piecewise.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Base score every run starts from.
pub const BASE_SCORE: u32 = 100;

/// Maximum attainable total (base + speed bonus).
pub const MAX_SCORE: u32 = 110;

/// Speed bonus awarded when a verified fix lands within the window.
pub const SPEED_BONUS: u32 = 10;

/// Elapsed-time window for the speed bonus.
pub const SPEED_BONUS_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Commits allowed before the efficiency penalty starts accruing.
pub const FREE_COMMIT_ALLOWANCE: u32 = 20;

/// Penalty per commit beyond the free allowance.
pub const EFFICIENCY_PENALTY_PER_COMMIT: u32 = 2;

/// Penalty applied unless the fix was both pushed and pipeline-verified.
/// Intentionally steep: an unmerged, unverified fix has little value
/// regardless of effort invested.
pub const DELIVERY_PENALTY: u32 = 60;

/// Numeric breakdown of a run's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub total: u32,
    pub base: u32,
    pub max: u32,
    pub speed_bonus: u32,
    pub efficiency_penalty: u32,
    pub delivery_penalty: u32,
}

impl Default for ScoreBreakdown {
    fn default() -> Self {
        Self::zero()
    }
}

impl ScoreBreakdown {
    /// Placeholder breakdown for a job that has not terminated yet.
    pub fn zero() -> Self {
        Self {
            total: 0,
            base: BASE_SCORE,
            max: MAX_SCORE,
            speed_bonus: 0,
            efficiency_penalty: 0,
            delivery_penalty: 0,
        }
    }

    /// Compute the final breakdown.
    ///
    /// Total = base + speed bonus − efficiency penalty − delivery penalty,
    /// clamped to `[0, MAX_SCORE]`.
    pub fn compute(elapsed: Duration, commit_count: u32, pipeline_passed: bool, push_succeeded: bool) -> Self {
        let delivered = pipeline_passed && push_succeeded;
        let speed_bonus = if delivered && elapsed < SPEED_BONUS_WINDOW {
            SPEED_BONUS
        } else {
            0
        };
        let efficiency_penalty =
            commit_count.saturating_sub(FREE_COMMIT_ALLOWANCE) * EFFICIENCY_PENALTY_PER_COMMIT;
        let delivery_penalty = if delivered { 0 } else { DELIVERY_PENALTY };

        let total = (i64::from(BASE_SCORE) + i64::from(speed_bonus)
            - i64::from(efficiency_penalty)
            - i64::from(delivery_penalty))
        .clamp(0, i64::from(MAX_SCORE)) as u32;

        Self {
            total,
            base: BASE_SCORE,
            max: MAX_SCORE,
            speed_bonus,
            efficiency_penalty,
            delivery_penalty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivered_fast_run_earns_speed_bonus() {
        let score = ScoreBreakdown::compute(Duration::from_secs(90), 3, true, true);
        assert_eq!(score.speed_bonus, SPEED_BONUS);
        assert_eq!(score.delivery_penalty, 0);
        assert_eq!(score.total, 110);
    }

    #[test]
    fn delivered_slow_run_misses_speed_bonus() {
        let score = ScoreBreakdown::compute(Duration::from_secs(6 * 60), 3, true, true);
        assert_eq!(score.speed_bonus, 0);
        assert_eq!(score.total, 100);
    }

    #[test]
    fn undelivered_run_is_penalized_sixty() {
        // Scenario: failing tests, failed patches, nothing delivered.
        let score = ScoreBreakdown::compute(Duration::from_secs(30), 0, false, false);
        assert_eq!(score.delivery_penalty, DELIVERY_PENALTY);
        assert_eq!(score.total, 40);
    }

    #[test]
    fn pushed_but_pipeline_failed_still_counts_as_undelivered() {
        let score = ScoreBreakdown::compute(Duration::from_secs(30), 1, false, true);
        assert_eq!(score.delivery_penalty, DELIVERY_PENALTY);
    }

    #[test]
    fn commit_spam_accrues_efficiency_penalty() {
        let score = ScoreBreakdown::compute(Duration::from_secs(30), 25, true, true);
        assert_eq!(score.efficiency_penalty, 10);
        assert_eq!(score.total, 100); // 100 + 10 - 10
    }

    #[test]
    fn total_clamps_at_zero() {
        let score = ScoreBreakdown::compute(Duration::from_secs(30), 200, false, false);
        assert_eq!(score.total, 0);
    }

    #[test]
    fn breakdown_serializes_camel_case_field_names() {
        let json = serde_json::to_value(ScoreBreakdown::compute(Duration::from_secs(90), 25, true, true)).unwrap();
        assert_eq!(json["speedBonus"], 10);
        assert_eq!(json["efficiencyPenalty"], 10);
        assert_eq!(json["deliveryPenalty"], 0);
    }
}
