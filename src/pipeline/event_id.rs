//! Event id minting.
//!
//! Queue consumers expect ids that read as a UTC timestamp (`yymmddHHMM`).
//! Minute resolution alone collides whenever two scans land in the same
//! minute, so a busy minute borrows the following ones: each id is the later
//! of the current minute and the minute after the last id. Every id is a
//! valid timestamp; under sustained load ids run ahead of the wall clock
//! until traffic drops below one record per minute.

use chrono::{DateTime, Duration, DurationRound, Utc};

/// Strictly increasing, timestamp-shaped event ids.
#[derive(Debug, Default)]
pub struct EventIdGenerator {
    /// Minute the last id was stamped with
    last: Option<DateTime<Utc>>,
}

impl EventIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint an id for the current wall-clock time.
    pub fn mint(&mut self) -> u64 {
        self.mint_at(Utc::now())
    }

    /// Mint an id as if the clock read `now`.
    pub fn mint_at(&mut self, now: DateTime<Utc>) -> u64 {
        let minute = now.duration_trunc(Duration::minutes(1)).unwrap_or(now);
        let stamp = match self.last {
            Some(last) if last >= minute => last + Duration::minutes(1),
            _ => minute,
        };
        self.last = Some(stamp);
        timestamp_id(stamp)
    }

    /// Last id handed out, if any.
    pub fn last(&self) -> Option<u64> {
        self.last.map(timestamp_id)
    }
}

/// `yymmddHHMM` as an integer.
fn timestamp_id(stamp: DateTime<Utc>) -> u64 {
    // Only ASCII digits come out of this format string.
    stamp.format("%y%m%d%H%M").to_string().parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, h, m, s).unwrap()
    }

    #[test]
    fn test_id_reads_as_timestamp() {
        let mut ids = EventIdGenerator::new();
        assert_eq!(ids.mint_at(at(12, 30, 5)), 2610161230);
    }

    #[test]
    fn test_same_minute_ids_are_unique() {
        let mut ids = EventIdGenerator::new();
        let a = ids.mint_at(at(12, 30, 1));
        let b = ids.mint_at(at(12, 30, 40));
        let c = ids.mint_at(at(12, 30, 59));
        assert_eq!(a, 2610161230);
        assert_eq!(b, 2610161231);
        assert_eq!(c, 2610161232);
    }

    #[test]
    fn test_busy_minute_rolls_over_the_hour() {
        let mut ids = EventIdGenerator::new();
        let minted: Vec<u64> = (0..5).map(|i| ids.mint_at(at(12, 59, i * 10))).collect();
        assert_eq!(
            minted,
            vec![2610161259, 2610161300, 2610161301, 2610161302, 2610161303]
        );
    }

    #[test]
    fn test_busy_minute_rolls_over_the_day() {
        let mut ids = EventIdGenerator::new();
        ids.mint_at(at(23, 59, 0));
        assert_eq!(ids.mint_at(at(23, 59, 30)), 2610170000);
    }

    #[test]
    fn test_ids_always_parse_as_timestamps() {
        let mut ids = EventIdGenerator::new();
        for i in 0..200 {
            let id = ids.mint_at(at(12, 0, 0) + Duration::seconds(i));
            let minute = id % 100;
            let hour = (id / 100) % 100;
            assert!(minute < 60 && hour < 24, "id {} is not a timestamp", id);
        }
    }

    #[test]
    fn test_clock_catches_up() {
        let mut ids = EventIdGenerator::new();
        ids.mint_at(at(12, 30, 0));
        ids.mint_at(at(12, 30, 1));
        assert_eq!(ids.mint_at(at(12, 45, 0)), 2610161245);
    }

    #[test]
    fn test_clock_going_backwards_stays_monotonic() {
        let mut ids = EventIdGenerator::new();
        let a = ids.mint_at(at(13, 0, 0));
        let b = ids.mint_at(at(12, 0, 0));
        assert!(b > a);
        assert_eq!(ids.last(), Some(b));
    }
}
