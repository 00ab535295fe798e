//! Story-point completion figures.

use crate::repo::task_repo::StoryPointTotals;

/// Completed share of story points as a percentage, rounded to two
/// decimals. Returns `0.0` when no points are estimated.
pub fn completion_percentage(totals: StoryPointTotals) -> f64 {
    if totals.total <= 0 {
        return 0.0;
    }
    let ratio = totals.completed as f64 / totals.total as f64 * 100.0;
    (ratio * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn totals(total: i64, completed: i64) -> StoryPointTotals {
        StoryPointTotals { total, completed }
    }

    #[test]
    fn zero_points_is_zero_percent() {
        assert_eq!(completion_percentage(totals(0, 0)), 0.0);
    }

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(completion_percentage(totals(3, 1)), 33.33);
        assert_eq!(completion_percentage(totals(3, 2)), 66.67);
        assert_eq!(completion_percentage(totals(8, 8)), 100.0);
    }
}
