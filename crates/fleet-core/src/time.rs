use std::time::{SystemTime, UNIX_EPOCH};

pub type EpochMillis = u64;

pub const MILLIS_PER_MINUTE: u64 = 60_000;

pub fn now_epoch_millis() -> EpochMillis {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as EpochMillis
}

/// Signed whole minutes from `start` to `end`, rounded half away from zero.
pub fn minutes_between(start: EpochMillis, end: EpochMillis) -> i64 {
    let delta_ms = end as i128 - start as i128;
    (delta_ms as f64 / MILLIS_PER_MINUTE as f64).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minutes_round_to_nearest() {
        assert_eq!(minutes_between(0, 37 * MILLIS_PER_MINUTE), 37);
        assert_eq!(minutes_between(0, 89_999), 1);
        assert_eq!(minutes_between(0, 90_000), 2);
        assert_eq!(minutes_between(5 * MILLIS_PER_MINUTE, 0), -5);
    }
}
