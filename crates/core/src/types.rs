/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Integer score on the 0..=100 scale used by every numeric metric.
pub type Score = u8;

/// Upper bound of the score scale (inclusive).
pub const SCORE_MAX: i64 = 100;

/// Clamp an arbitrary integer onto the score scale.
pub fn clamp_score(value: i64) -> Score {
    value.clamp(0, SCORE_MAX) as Score
}
