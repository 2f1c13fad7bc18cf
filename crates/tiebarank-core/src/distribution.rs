//! Level distribution math: cumulative snapshots, per-level buckets and
//! day-over-day deltas.
//!
//! Snapshots store, per level, how many members sit at or above that level.
//! Everything here iterates levels in explicit descending order; map order is
//! never relied on for the prefix sums.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::types::{DistributionDelta, Divider, LevelSnapshot};

/// The ranking site rolls its day over at UTC+8 midnight.
const SITE_UTC_OFFSET_HOURS: i64 = 8;

/// Convert cumulative counts into exclusive per-level bucket sizes.
///
/// Bucket sizes sum to the cumulative count of the most junior level. A
/// cumulative count that dips below a more senior one (site churn between
/// probes) yields an empty bucket rather than wrapping.
pub fn normalize_to_buckets(cumulative: &LevelSnapshot) -> BTreeMap<u32, u64> {
    let mut buckets = BTreeMap::new();
    let mut senior = 0u64;
    for (&level, &count) in cumulative.iter().rev() {
        let bucket = count.saturating_sub(senior);
        senior += bucket;
        buckets.insert(level, bucket);
    }
    buckets
}

/// Re-accumulate buckets, senior levels first.
fn prefix_sums(cumulative: &LevelSnapshot) -> BTreeMap<u32, u64> {
    let mut sums = BTreeMap::new();
    let mut running = 0u64;
    for (&level, &bucket) in normalize_to_buckets(cumulative).iter().rev() {
        running += bucket;
        sums.insert(level, running);
    }
    sums
}

/// Diff two cumulative snapshots, newest first.
///
/// Output follows the levels of `new`, ordered by descending level. `rank` is
/// the running prefix sum of the new buckets. For a level both snapshots
/// track, `delta` is how far the cumulative rank moved since `old`. A level
/// only `new` tracks has no baseline, so its whole new bucket is the delta.
pub fn compute_delta(new: &LevelSnapshot, old: &LevelSnapshot) -> Vec<DistributionDelta> {
    let new_buckets = normalize_to_buckets(new);
    let new_sums = prefix_sums(new);
    let old_sums = prefix_sums(old);

    new_sums
        .iter()
        .rev()
        .map(|(&level, &rank)| {
            let delta = match old_sums.get(&level) {
                Some(&before) => rank as i64 - before as i64,
                None => new_buckets.get(&level).copied().unwrap_or(0) as i64,
            };
            DistributionDelta { level, rank, delta }
        })
        .collect()
}

/// Build a snapshot from the stored dividers.
pub fn snapshot_from_dividers(dividers: &[Divider]) -> LevelSnapshot {
    dividers.iter().map(|d| (d.level, d.rank)).collect()
}

/// When the best-ranked member has out-levelled every tracked divider, start
/// tracking that level at rank 1. Returns the divider that was added.
pub fn ensure_top_divider(dividers: &mut Vec<Divider>, top_member_level: u32) -> Option<Divider> {
    let top_tracked = dividers.iter().map(|d| d.level).max();
    if top_tracked.is_some_and(|l| l >= top_member_level) {
        return None;
    }
    let added = Divider {
        level: top_member_level,
        rank: 1,
    };
    dividers.push(added);
    dividers.sort_by(|a, b| b.level.cmp(&a.level));
    Some(added)
}

/// Calendar day on the ranking site's clock.
pub fn site_date(now: DateTime<Utc>) -> NaiveDate {
    (now + Duration::hours(SITE_UTC_OFFSET_HOURS)).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snap(pairs: &[(u32, u64)]) -> LevelSnapshot {
        pairs.iter().copied().collect()
    }

    #[test]
    fn buckets_from_cumulative_counts() {
        let buckets = normalize_to_buckets(&snap(&[(10, 100), (9, 250), (8, 400)]));
        assert_eq!(buckets, snap(&[(10, 100), (9, 150), (8, 150)]));
        assert_eq!(buckets.values().sum::<u64>(), 400);
    }

    #[test]
    fn buckets_clamp_on_churn() {
        let buckets = normalize_to_buckets(&snap(&[(10, 100), (9, 90)]));
        assert_eq!(buckets[&9], 0);
        assert_eq!(buckets[&10], 100);
    }

    #[test]
    fn empty_snapshot_has_no_buckets() {
        assert!(normalize_to_buckets(&LevelSnapshot::new()).is_empty());
        assert!(compute_delta(&LevelSnapshot::new(), &LevelSnapshot::new()).is_empty());
    }

    #[test]
    fn delta_between_two_days() {
        let out = compute_delta(&snap(&[(10, 100), (9, 250)]), &snap(&[(10, 80), (9, 250)]));
        assert_eq!(
            out,
            vec![
                DistributionDelta { level: 10, rank: 100, delta: 20 },
                DistributionDelta { level: 9, rank: 250, delta: 0 },
            ]
        );
    }

    #[test]
    fn new_top_level_counts_its_whole_bucket() {
        let out = compute_delta(&snap(&[(11, 5), (10, 100)]), &snap(&[(10, 90)]));
        assert_eq!(out[0], DistributionDelta { level: 11, rank: 5, delta: 5 });
        assert_eq!(out[1], DistributionDelta { level: 10, rank: 100, delta: 10 });
    }

    #[test]
    fn level_missing_from_old_reports_its_new_bucket() {
        let out = compute_delta(
            &snap(&[(10, 100), (9, 180), (8, 300)]),
            &snap(&[(10, 90), (8, 280)]),
        );
        assert_eq!(
            out,
            vec![
                DistributionDelta { level: 10, rank: 100, delta: 10 },
                DistributionDelta { level: 9, rank: 180, delta: 80 },
                DistributionDelta { level: 8, rank: 300, delta: 20 },
            ]
        );
    }

    #[test]
    fn empty_baseline_reports_every_bucket() {
        let out = compute_delta(&snap(&[(10, 100), (9, 250)]), &LevelSnapshot::new());
        let deltas: Vec<i64> = out.iter().map(|d| d.delta).collect();
        assert_eq!(deltas, vec![100, 150]);
    }

    #[test]
    fn delta_output_is_descending_by_level() {
        let out = compute_delta(&snap(&[(3, 900), (7, 300), (5, 600)]), &LevelSnapshot::new());
        let levels: Vec<u32> = out.iter().map(|d| d.level).collect();
        assert_eq!(levels, vec![7, 5, 3]);
    }

    #[test]
    fn top_divider_added_once() {
        let mut dividers = vec![Divider { level: 17, rank: 40 }, Divider { level: 16, rank: 400 }];
        assert_eq!(ensure_top_divider(&mut dividers, 18), Some(Divider { level: 18, rank: 1 }));
        assert_eq!(dividers[0].level, 18);
        assert_eq!(ensure_top_divider(&mut dividers, 18), None);
        assert_eq!(dividers.len(), 3);
    }

    #[test]
    fn site_day_rolls_at_utc_plus_eight() {
        let late = Utc.with_ymd_and_hms(2024, 3, 1, 16, 30, 0).unwrap();
        assert_eq!(site_date(late), NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        let early = Utc.with_ymd_and_hms(2024, 3, 1, 15, 59, 0).unwrap();
        assert_eq!(site_date(early), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }
}
