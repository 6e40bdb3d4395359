use deadlines_types::LevelCounts;
use deadlines_types::clock::DAY_MS;
use deadlines_types::level::THRESHOLDS;

use crate::error::Result;
use crate::provider::Provider;

/// Turns inclusive cumulative counts into exclusive buckets by subtracting
/// everything already assigned to earlier buckets.
pub fn exclusive_buckets<const N: usize>(cumulative: [u64; N]) -> [u64; N] {
    let mut buckets = [0u64; N];
    let mut assigned = 0u64;
    for (bucket, total) in buckets.iter_mut().zip(cumulative) {
        *bucket = total.saturating_sub(assigned);
        assigned += *bucket;
    }
    buckets
}

impl Provider {
    /// Not-done deadlines per level (today, urgent, worrying, nice). Overdue
    /// deadlines land in today; nevermind is never counted.
    pub fn counts_by_level(&self) -> Result<LevelCounts> {
        let midnight = self.clock().today_midnight_millis();
        let limits = THRESHOLDS.map(|(days, _)| midnight + days * DAY_MS);

        let mut cumulative = [0u64; 4];
        for (slot, n) in cumulative
            .iter_mut()
            .zip(self.database().count_not_done_due_by(&limits)?)
        {
            *slot = n;
        }

        Ok(LevelCounts::from_array(exclusive_buckets(cumulative)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::tests::provider;
    use crate::provider::{Query, QueryResult};
    use deadlines_types::{NewDeadline, Route};

    #[test]
    fn running_subtraction() {
        assert_eq!(exclusive_buckets([1, 2, 3, 4]), [1, 1, 1, 1]);
        assert_eq!(exclusive_buckets([0, 0, 5, 5]), [0, 0, 5, 0]);
        assert_eq!(exclusive_buckets([3, 3, 3, 3]), [3, 0, 0, 0]);
        // A shrinking cumulative count never produces a negative bucket.
        assert_eq!(exclusive_buckets([4, 2, 6, 6]), [4, 0, 2, 0]);
    }

    #[test]
    fn one_deadline_per_level() {
        let (p, _) = provider();
        let midnight = p.clock().today_midnight_millis();
        for offset in [0, 2, 5, 10, 20] {
            p.insert(
                &Route::Deadlines,
                NewDeadline::new(format!("in {offset} days"), midnight + offset * DAY_MS),
            )
            .unwrap();
        }

        let counts = p.counts_by_level().unwrap();
        assert_eq!(counts.to_array(), [1, 1, 1, 1]);

        let via_route = p.query("count", &Query::default()).unwrap();
        assert_eq!(via_route, QueryResult::Counts(counts));
    }

    #[test]
    fn done_deadlines_and_overdue() {
        let (p, _) = provider();
        let midnight = p.clock().today_midnight_millis();
        p.insert(&Route::Deadlines, NewDeadline::new("overdue", midnight - 3 * DAY_MS))
            .unwrap();
        p.insert(&Route::Deadlines, NewDeadline::new("finished", midnight).done(true))
            .unwrap();
        p.insert(&Route::Deadlines, NewDeadline::new("edge", midnight + 3 * DAY_MS))
            .unwrap();

        let counts = p.counts_by_level().unwrap();
        assert_eq!(counts.today, 1);
        assert_eq!(counts.urgent, 1);
        assert_eq!(counts.total(), 2);
    }
}
