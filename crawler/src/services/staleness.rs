//! Re-fetch policy for channels and videos.
//!
//! Channels are refreshed at most once per cooldown window. Videos get an
//! interval that widens with their age, so fresh uploads are polled often and
//! old ones rarely.

use chrono::{DateTime, Duration, Utc};

pub const CHANNEL_COOLDOWN_SECS: i64 = 24 * 60 * 60;

const HOUR: i64 = 60 * 60;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;

/// (age upper bound, re-fetch interval); the last bracket covers everything older.
const VIDEO_BRACKETS: [(i64, i64); 3] = [(WEEK, 3 * HOUR), (4 * WEEK, DAY), (24 * WEEK, WEEK)];
const VIDEO_OLDEST_INTERVAL: i64 = 4 * WEEK;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessPolicy {
    channel_cooldown: Duration,
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        StalenessPolicy {
            channel_cooldown: Duration::seconds(CHANNEL_COOLDOWN_SECS),
        }
    }
}

impl StalenessPolicy {
    pub fn with_channel_cooldown(channel_cooldown: Duration) -> Self {
        StalenessPolicy { channel_cooldown }
    }

    /// `true` when the channel may be fetched again; a channel never crawled is always due.
    pub fn channel_due(&self, last_crawl: Option<i64>, now: DateTime<Utc>) -> bool {
        match last_crawl {
            None => true,
            Some(last_crawl) => now.timestamp() - last_crawl >= self.channel_cooldown.num_seconds(),
        }
    }

    /// Interval after which a video of the given age is considered stale.
    pub fn video_interval(&self, age_secs: i64) -> Duration {
        let secs = VIDEO_BRACKETS
            .iter()
            .find(|(max_age, _)| age_secs < *max_age)
            .map(|(_, interval)| *interval)
            .unwrap_or(VIDEO_OLDEST_INTERVAL);

        Duration::seconds(secs)
    }

    pub fn video_due(&self, published_at: i64, updated_at: i64, now: DateTime<Utc>) -> bool {
        let now = now.timestamp();
        let age = now - published_at;
        let stale_for = now - updated_at;

        stale_for >= self.video_interval(age).num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn ago(d: Duration) -> i64 {
        (now() - d).timestamp()
    }

    #[test]
    fn channel_inside_cooldown_is_skipped() {
        let policy = StalenessPolicy::default();
        let last = ago(Duration::hours(23) + Duration::minutes(59));
        assert!(!policy.channel_due(Some(last), now()));
    }

    #[test]
    fn channel_past_cooldown_is_due() {
        let policy = StalenessPolicy::default();
        let last = ago(Duration::hours(24) + Duration::minutes(1));
        assert!(policy.channel_due(Some(last), now()));
        assert!(policy.channel_due(None, now()));
    }

    #[test]
    fn ten_day_old_video_uses_daily_bracket() {
        let policy = StalenessPolicy::default();
        let published = ago(Duration::days(10));

        assert!(policy.video_due(published, ago(Duration::hours(25)), now()));
        assert!(!policy.video_due(published, ago(Duration::hours(23)), now()));
    }

    #[test]
    fn brackets_widen_with_age() {
        let policy = StalenessPolicy::default();

        assert_eq!(policy.video_interval(DAY), Duration::hours(3));
        assert_eq!(policy.video_interval(WEEK), Duration::days(1));
        assert_eq!(policy.video_interval(4 * WEEK - 1), Duration::days(1));
        assert_eq!(policy.video_interval(4 * WEEK), Duration::weeks(1));
        assert_eq!(policy.video_interval(24 * WEEK), Duration::weeks(4));
        assert_eq!(policy.video_interval(300 * WEEK), Duration::weeks(4));
    }

    #[test]
    fn fresh_video_refetched_after_three_hours() {
        let policy = StalenessPolicy::default();
        let published = ago(Duration::days(2));

        assert!(policy.video_due(published, ago(Duration::hours(3)), now()));
        assert!(!policy.video_due(published, ago(Duration::hours(2)), now()));
    }
}
