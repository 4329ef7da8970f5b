use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64); // ms since epoch, UTC

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    /// Saturates rather than overflowing; claims can carry arbitrary values.
    pub fn from_unix_secs(secs: i64) -> Self {
        Self(secs.saturating_mul(1000))
    }

    pub fn as_unix_secs(&self) -> i64 {
        self.0 / 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_secs_round_trip() {
        let ts = Timestamp::from_unix_secs(1_700_000_000);
        assert_eq!(ts.0, 1_700_000_000_000);
        assert_eq!(ts.as_unix_secs(), 1_700_000_000);
    }

    #[test]
    fn absurd_seconds_saturate_instead_of_overflowing() {
        assert_eq!(Timestamp::from_unix_secs(i64::MAX).0, i64::MAX);
        assert_eq!(Timestamp::from_unix_secs(i64::MIN).0, i64::MIN);
    }
}
