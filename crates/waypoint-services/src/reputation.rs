//! Reputation scoring.
//!
//! A pure function from a peer record and the current time to a score in
//! [0, 100]. The registry recomputes it on every counter mutation, so the
//! stored score is always derivable from the record itself.
//!
//! The shape of the formula: the observed success rate carries 60% of the
//! weight and the neutral baseline 40%, so a handful of outcomes can't
//! swing the score to either extreme. Malicious incidents cost 20 points
//! each but the penalty caps at 50, leaving a path back for a peer that
//! cleans up. A success within the last hour earns a small bonus.

use chrono::{DateTime, Duration, Utc};

use crate::record::PeerRecord;

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// Score for peers with no resolved outcomes yet.
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Weight of the observed success rate; the remainder goes to the
/// neutral baseline.
const SUCCESS_RATE_WEIGHT: f64 = 0.6;

/// Penalty per malicious incident, and the total penalty cap.
const MALICIOUS_PENALTY: f64 = 20.0;
const MALICIOUS_PENALTY_CAP: f64 = 50.0;

/// Bonus for a success inside the recency window.
const RECENCY_BONUS: f64 = 10.0;
const RECENCY_WINDOW_SECS: i64 = 3600;

/// Compute the reputation score for `record` as of `now`.
pub fn score(record: &PeerRecord, now: DateTime<Utc>) -> f64 {
    let total = record.successes + record.failures;
    let mut score = if total == 0 {
        NEUTRAL_SCORE
    } else {
        let success_rate = record.successes as f64 / total as f64 * 100.0;
        success_rate * SUCCESS_RATE_WEIGHT + NEUTRAL_SCORE * (1.0 - SUCCESS_RATE_WEIGHT)
    };

    score -= (record.malicious_count as f64 * MALICIOUS_PENALTY).min(MALICIOUS_PENALTY_CAP);

    if let Some(last_success) = record.last_success {
        if now.signed_duration_since(last_success) < Duration::seconds(RECENCY_WINDOW_SECS) {
            score += RECENCY_BONUS;
        }
    }

    score.clamp(MIN_SCORE, MAX_SCORE)
}
