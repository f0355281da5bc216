use crate::models::Snapshot;

/// Number of view snapshots the trend is fitted over.
pub const TREND_WINDOW: usize = 3;

/// Least-squares slope over `values` indexed `0..n`.
///
/// Values are expected oldest first. Fewer than two points (or a degenerate
/// denominator) yield a flat trend of `0.0`.
pub fn linear_trend(values: &[i64]) -> f64 {
    let n = values.len() as f64;
    if values.len() < 2 {
        return 0.0;
    }

    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0, 0.0, 0.0, 0.0);
    for (x, y) in values.iter().enumerate() {
        let x = x as f64;
        let y = *y as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }

    let denominator = n * sum_xx - sum_x * sum_x;
    if denominator == 0.0 {
        return 0.0;
    }

    (n * sum_xy - sum_x * sum_y) / denominator
}

/// Popularity score from view snapshots as returned by the store (newest first).
pub fn popularity_score(newest_first: &[Snapshot]) -> f64 {
    let values: Vec<i64> = newest_first
        .iter()
        .take(TREND_WINDOW)
        .rev()
        .map(|snapshot| snapshot.value)
        .collect();

    linear_trend(&values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(date: i32, value: i64) -> Snapshot {
        Snapshot {
            channel_id: "UC1".to_string(),
            date,
            year: 2024,
            month: 1,
            day: (date % 100) as u32,
            recorded_at: 0,
            value,
        }
    }

    #[test]
    fn steady_growth_yields_per_snapshot_slope() {
        assert_eq!(linear_trend(&[100, 150, 200]), 50.0);
    }

    #[test]
    fn single_or_no_snapshot_is_flat() {
        assert_eq!(linear_trend(&[100]), 0.0);
        assert_eq!(linear_trend(&[]), 0.0);
    }

    #[test]
    fn shrinking_views_yield_negative_slope() {
        assert_eq!(linear_trend(&[300, 200]), -100.0);
    }

    #[test]
    fn score_reorders_newest_first_input() {
        let snapshots = vec![
            snapshot(20240104, 400),
            snapshot(20240103, 200),
            snapshot(20240102, 150),
            snapshot(20240101, 100),
        ];

        assert_eq!(popularity_score(&snapshots), 125.0);
    }
}
