//! Remaining-time announcements during battle

/// Next checkpoint to announce, in seconds remaining
///
/// The largest checkpoint not above `remaining_secs` and strictly below
/// the one announced before.
pub fn next_checkpoint(checkpoints: &[i64], remaining_secs: i64, previous: Option<i64>) -> Option<i64> {
    checkpoints
        .iter()
        .copied()
        .filter(|c| *c > 0 && *c <= remaining_secs)
        .filter(|c| previous.map_or(true, |p| *c < p))
        .max()
}
