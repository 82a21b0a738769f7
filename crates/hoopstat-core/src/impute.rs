// Era-local imputation of missing season metrics.
//
// Seasons are grouped by era. Within an era, a missing metric is filled from
// the nearest seasons (k-NN over games plus the era's observed metrics).
// Metrics an era never recorded are backfilled from another era's mean.

use crate::era::{season_start_year, year_to_era, Era};
use crate::season::{round3, Metric, SeasonTable};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

/// Upper bound on neighbors averaged per imputed value.
pub const MAX_NEIGHBORS: usize = 5;

#[derive(Debug, Error)]
pub enum ImputeError {
    #[error("season `{season}` for player `{player}` has no parseable starting year")]
    BadSeason { player: String, season: String },
}

/// Fill every missing imputable metric in the table. Returns a new table with
/// all numeric values rounded to three decimals; the input is untouched.
pub fn impute(table: &SeasonTable) -> Result<SeasonTable, ImputeError> {
    let cohorts = group_by_era(table)?;
    let targets: Vec<Metric> = table
        .schema
        .metrics
        .iter()
        .copied()
        .filter(|m| m.is_imputed())
        .collect();

    let mut out = table.clone();
    for (&era, rows) in &cohorts {
        let filled = impute_era(table, &mut out, rows, &targets);
        info!(
            "{} era: {} rows, {} values imputed from neighbors",
            era,
            rows.len(),
            filled
        );
    }

    backfill_across_eras(&mut out, &cohorts, &targets);

    for record in &mut out.records {
        for metric in Metric::ALL {
            if let Some(v) = record.stats.get(metric) {
                record.stats.set(metric, Some(round3(v)));
            }
        }
    }

    Ok(out)
}

/// Row indices per era, in chronological era order.
fn group_by_era(table: &SeasonTable) -> Result<BTreeMap<Era, Vec<usize>>, ImputeError> {
    let mut cohorts: BTreeMap<Era, Vec<usize>> = BTreeMap::new();
    for (i, record) in table.records.iter().enumerate() {
        let year = season_start_year(&record.season).ok_or_else(|| ImputeError::BadSeason {
            player: record.player.clone(),
            season: record.season.clone(),
        })?;
        cohorts.entry(year_to_era(year)).or_default().push(i);
    }
    Ok(cohorts)
}

/// First pass over one era. Reads only the original table so every target
/// sees the era as it was recorded. Returns the number of values filled.
fn impute_era(
    original: &SeasonTable,
    out: &mut SeasonTable,
    rows: &[usize],
    targets: &[Metric],
) -> usize {
    let observed = |metric: Metric| {
        rows.iter()
            .any(|&i| original.records[i].stats.get(metric).is_some())
    };
    let features: Vec<Metric> = targets.iter().copied().filter(|&m| observed(m)).collect();
    let mut filled = 0;

    for &target in targets {
        let missing: Vec<usize> = (0..rows.len())
            .filter(|&pos| original.records[rows[pos]].stats.get(target).is_none())
            .collect();
        if missing.is_empty() {
            continue;
        }

        if rows.len() == 1 {
            let fill = mean(original.records.iter().filter_map(|r| r.stats.get(target)))
                .unwrap_or_else(|| target.default_fill());
            out.records[rows[0]].stats.set(target, Some(fill));
            filled += 1;
            continue;
        }

        if missing.len() == rows.len() {
            debug!("{} never recorded in this era; deferring to backfill", target.header());
            continue;
        }

        // Games is always a feature; the target never is.
        let vectors: Vec<Vec<Option<f64>>> = rows
            .iter()
            .map(|&i| {
                let record = &original.records[i];
                std::iter::once(Some(f64::from(record.games)))
                    .chain(
                        features
                            .iter()
                            .filter(|&&m| m != target)
                            .map(|&m| record.stats.get(m)),
                    )
                    .collect()
            })
            .collect();
        let donors: Vec<(usize, f64)> = (0..rows.len())
            .filter_map(|pos| {
                original.records[rows[pos]]
                    .stats
                    .get(target)
                    .map(|value| (pos, value))
            })
            .collect();
        let k = MAX_NEIGHBORS.min(rows.len());

        for pos in missing {
            let value = knn_estimate(&vectors[pos], &vectors, &donors, k);
            out.records[rows[pos]].stats.set(target, Some(value));
            filled += 1;
        }
    }

    filled
}

/// Mean target value of the `k` donors closest to `receiver`. Donors sharing
/// no observed coordinate with the receiver are not candidates; with no
/// candidates at all the donor mean is returned.
fn knn_estimate(
    receiver: &[Option<f64>],
    vectors: &[Vec<Option<f64>>],
    donors: &[(usize, f64)],
    k: usize,
) -> f64 {
    let mut ranked: Vec<(f64, f64)> = donors
        .iter()
        .filter_map(|&(pos, value)| nan_euclidean(receiver, &vectors[pos]).map(|d| (d, value)))
        .collect();

    if ranked.is_empty() {
        return mean(donors.iter().map(|&(_, v)| v)).unwrap_or(0.0);
    }

    // Stable sort: equally distant donors keep row order.
    ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
    mean(ranked.iter().take(k).map(|&(_, v)| v)).unwrap_or(0.0)
}

/// Euclidean distance over coordinates observed in both rows, scaled up by
/// the fraction of coordinates that were usable. `None` when nothing overlaps.
pub fn nan_euclidean(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let mut present = 0usize;
    let mut sum = 0.0;
    for (x, y) in a.iter().zip(b) {
        if let (Some(x), Some(y)) = (x, y) {
            present += 1;
            sum += (x - y).powi(2);
        }
    }
    if present == 0 {
        return None;
    }
    let scale = a.len() as f64 / present as f64;
    Some((sum * scale).sqrt())
}

/// Second pass: metrics an era never recorded take the mean of the first
/// later era that has them, else the nearest earlier era, else the default.
fn backfill_across_eras(
    out: &mut SeasonTable,
    cohorts: &BTreeMap<Era, Vec<usize>>,
    targets: &[Metric],
) {
    for &target in targets {
        for (&era, rows) in cohorts {
            if rows.iter().any(|&i| out.records[i].stats.get(target).is_some()) {
                continue;
            }

            let later = Era::ALL.into_iter().filter(|e| *e > era);
            let earlier = Era::ALL.into_iter().rev().filter(|e| *e < era);
            let source = later.chain(earlier).find_map(|candidate| {
                let source_rows = cohorts.get(&candidate)?;
                mean(source_rows.iter().filter_map(|&i| out.records[i].stats.get(target)))
                    .map(|m| (candidate, m))
            });

            let fill = match source {
                Some((from, value)) => {
                    info!(
                        "backfilled {} for {} era from {} era mean {:.3}",
                        target.header(),
                        era,
                        from,
                        value
                    );
                    value
                }
                None => {
                    info!(
                        "{} absent in every era; {} era uses default {}",
                        target.header(),
                        era,
                        target.default_fill()
                    );
                    target.default_fill()
                }
            };

            for &i in rows {
                out.records[i].stats.set(target, Some(fill));
            }
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::season::{Competition, Schema, SeasonRecord};

    fn schema(metrics: &[Metric]) -> Schema {
        Schema {
            metrics: metrics.iter().copied().collect(),
            awards_classified: true,
            hof: false,
        }
    }

    fn row(season: &str, player: &str, games: u32, stats: &[(Metric, f64)]) -> SeasonRecord {
        let mut r = SeasonRecord::new(season, player, games);
        for &(m, v) in stats {
            r.stats.set(m, Some(v));
        }
        r
    }

    fn table(metrics: &[Metric], records: Vec<SeasonRecord>) -> SeasonTable {
        SeasonTable::new(Competition::RegularSeason, schema(metrics), records)
    }

    fn value(t: &SeasonTable, player: &str, m: Metric) -> Option<f64> {
        t.records.iter().find(|r| r.player == player)?.stats.get(m)
    }

    #[test]
    fn knn_averages_five_nearest_by_games() {
        let t = table(
            &[Metric::Per],
            vec![
                row("2010-2011", "a", 10, &[(Metric::Per, 10.0)]),
                row("2010-2011", "b", 11, &[(Metric::Per, 12.0)]),
                row("2010-2011", "c", 12, &[(Metric::Per, 14.0)]),
                row("2010-2011", "d", 13, &[(Metric::Per, 16.0)]),
                row("2010-2011", "e", 14, &[(Metric::Per, 18.0)]),
                row("2010-2011", "far", 100, &[(Metric::Per, 40.0)]),
                row("2010-2011", "gap", 12, &[]),
            ],
        );
        let out = impute(&t).unwrap();
        assert_eq!(value(&out, "gap", Metric::Per), Some(14.0));
        assert_eq!(value(&out, "far", Metric::Per), Some(40.0));
    }

    #[test]
    fn neighbor_count_capped_by_available_donors() {
        let t = table(
            &[Metric::Per],
            vec![
                row("1990-1991", "a", 10, &[(Metric::Per, 10.0)]),
                row("1990-1991", "b", 20, &[(Metric::Per, 20.0)]),
                row("1990-1991", "gap", 11, &[]),
            ],
        );
        let out = impute(&t).unwrap();
        assert_eq!(value(&out, "gap", Metric::Per), Some(15.0));
    }

    #[test]
    fn observed_metrics_steer_neighbor_choice() {
        // Same games everywhere, so only USG% separates the donors.
        let t = table(
            &[Metric::Per, Metric::UsagePct],
            vec![
                row("2005-2006", "low1", 50, &[(Metric::Per, 8.0), (Metric::UsagePct, 12.0)]),
                row("2005-2006", "low2", 50, &[(Metric::Per, 10.0), (Metric::UsagePct, 13.0)]),
                row("2005-2006", "high", 50, &[(Metric::Per, 30.0), (Metric::UsagePct, 35.0)]),
                row("2005-2006", "gap", 50, &[(Metric::UsagePct, 12.5)]),
            ],
        );
        let out = impute(&t).unwrap();
        // k = min(5, 4) = 4 but only three donors: all averaged.
        assert_eq!(value(&out, "gap", Metric::Per), Some(16.0));

        let mut rows: Vec<SeasonRecord> = (0..6)
            .map(|i| {
                row(
                    "2005-2006",
                    &format!("low{i}"),
                    50,
                    &[(Metric::Per, 10.0), (Metric::UsagePct, 12.0 + i as f64 * 0.1)],
                )
            })
            .collect();
        rows.push(row("2005-2006", "high", 50, &[(Metric::Per, 30.0), (Metric::UsagePct, 35.0)]));
        rows.push(row("2005-2006", "gap", 50, &[(Metric::UsagePct, 12.0)]));
        let out = impute(&table(&[Metric::Per, Metric::UsagePct], rows)).unwrap();
        assert_eq!(value(&out, "gap", Metric::Per), Some(10.0));
    }

    #[test]
    fn single_record_era_uses_global_mean() {
        let t = table(
            &[Metric::Per, Metric::MinutesPlayed, Metric::Bpm],
            vec![
                row("1950-1951", "lonely", 30, &[]),
                row("2010-2011", "a", 60, &[(Metric::Per, 10.0), (Metric::MinutesPlayed, 1000.0)]),
                row("2010-2011", "b", 70, &[(Metric::Per, 20.0), (Metric::MinutesPlayed, 2000.0)]),
            ],
        );
        let out = impute(&t).unwrap();
        assert_eq!(value(&out, "lonely", Metric::Per), Some(15.0));
        assert_eq!(value(&out, "lonely", Metric::MinutesPlayed), Some(1500.0));
        // BPM exists nowhere: fixed default.
        assert_eq!(value(&out, "lonely", Metric::Bpm), Some(0.0));
    }

    #[test]
    fn single_record_era_without_any_minutes_defaults_to_twenty() {
        let t = table(&[Metric::MinutesPlayed], vec![row("1950-1951", "solo", 30, &[])]);
        let out = impute(&t).unwrap();
        assert_eq!(value(&out, "solo", Metric::MinutesPlayed), Some(20.0));
    }

    #[test]
    fn unrecorded_metric_backfilled_from_later_era() {
        let t = table(
            &[Metric::TrueShooting],
            vec![
                row("1970-1971", "old1", 70, &[]),
                row("1970-1971", "old2", 80, &[]),
                row("2015-2016", "new1", 70, &[(Metric::TrueShooting, 0.5)]),
                row("2015-2016", "new2", 80, &[(Metric::TrueShooting, 0.6)]),
            ],
        );
        let out = impute(&t).unwrap();
        assert_eq!(value(&out, "old1", Metric::TrueShooting), Some(0.55));
        assert_eq!(value(&out, "old2", Metric::TrueShooting), Some(0.55));
        assert_eq!(value(&out, "new1", Metric::TrueShooting), Some(0.5));
    }

    #[test]
    fn backfill_prefers_later_era_then_earlier() {
        let t = table(
            &[Metric::Bpm],
            vec![
                row("1965-1966", "early1", 70, &[(Metric::Bpm, 1.0)]),
                row("1965-1966", "early2", 70, &[(Metric::Bpm, 3.0)]),
                row("1985-1986", "mid1", 70, &[]),
                row("1985-1986", "mid2", 70, &[]),
                row("2005-2006", "late1", 70, &[(Metric::Bpm, 5.0)]),
                row("2005-2006", "late2", 70, &[(Metric::Bpm, 7.0)]),
                row("2015-2016", "late3", 70, &[]),
            ],
        );
        let out = impute(&t).unwrap();
        // Modern era takes the contemporary mean (the next era forward).
        assert_eq!(value(&out, "mid1", Metric::Bpm), Some(6.0));

        let t = table(
            &[Metric::Bpm],
            vec![
                row("1985-1986", "mid1", 70, &[(Metric::Bpm, 2.0)]),
                row("1985-1986", "mid2", 70, &[(Metric::Bpm, 4.0)]),
                row("2015-2016", "late1", 70, &[]),
                row("2015-2016", "late2", 70, &[]),
            ],
        );
        let out = impute(&t).unwrap();
        // Nothing later than contemporary: nearest earlier era.
        assert_eq!(value(&out, "late1", Metric::Bpm), Some(3.0));
    }

    #[test]
    fn metric_absent_everywhere_gets_default() {
        let t = table(
            &[Metric::MinutesPlayed, Metric::OffensiveBpm],
            vec![row("2015-2016", "a", 70, &[]), row("2015-2016", "b", 60, &[])],
        );
        let out = impute(&t).unwrap();
        assert_eq!(value(&out, "a", Metric::MinutesPlayed), Some(20.0));
        assert_eq!(value(&out, "b", Metric::OffensiveBpm), Some(0.0));
    }

    #[test]
    fn counting_metrics_are_left_missing() {
        let t = table(
            &[Metric::Vorp, Metric::Per],
            vec![
                row("2015-2016", "a", 70, &[(Metric::Per, 10.0), (Metric::Vorp, 1.0)]),
                row("2015-2016", "b", 60, &[(Metric::Per, 12.0)]),
            ],
        );
        let out = impute(&t).unwrap();
        assert_eq!(value(&out, "b", Metric::Vorp), None);
    }

    #[test]
    fn complete_table_is_unchanged() {
        let t = table(
            &[Metric::Per, Metric::MinutesPlayed],
            vec![
                row("1955-1956", "a", 70, &[(Metric::Per, 10.123), (Metric::MinutesPlayed, 2000.0)]),
                row("1995-1996", "b", 60, &[(Metric::Per, 12.5), (Metric::MinutesPlayed, 1800.0)]),
                row("1995-1996", "c", 50, &[(Metric::Per, 14.0), (Metric::MinutesPlayed, 900.0)]),
            ],
        );
        let once = impute(&t).unwrap();
        assert_eq!(once, t);
        let twice = impute(&once).unwrap();
        assert_eq!(twice, once);
    }

    #[test]
    fn values_rounded_to_three_places() {
        let t = table(
            &[Metric::Per, Metric::Vorp],
            vec![
                row("2010-2011", "a", 10, &[(Metric::Per, 1.0), (Metric::Vorp, 0.12345)]),
                row("2010-2011", "b", 10, &[(Metric::Per, 2.0)]),
                row("2010-2011", "c", 10, &[(Metric::Per, 2.0)]),
                row("2010-2011", "gap", 10, &[]),
            ],
        );
        let out = impute(&t).unwrap();
        assert_eq!(value(&out, "gap", Metric::Per), Some(1.667));
        assert_eq!(value(&out, "a", Metric::Vorp), Some(0.123));
    }

    #[test]
    fn neighbors_come_only_from_the_same_era() {
        // The contemporary rows sit closer by games but belong to another era.
        let t = table(
            &[Metric::Per],
            vec![
                row("1990-1991", "a", 40, &[(Metric::Per, 10.0)]),
                row("1991-1992", "b", 60, &[(Metric::Per, 30.0)]),
                row("1990-1991", "gap", 50, &[]),
                row("2010-2011", "c", 50, &[(Metric::Per, 99.0)]),
                row("2011-2012", "d", 50, &[(Metric::Per, 99.0)]),
            ],
        );
        let out = impute(&t).unwrap();
        assert_eq!(value(&out, "gap", Metric::Per), Some(20.0));
        assert_eq!(value(&out, "c", Metric::Per), Some(99.0));
    }

    #[test]
    fn unparseable_season_is_an_error() {
        let t = table(&[Metric::Per], vec![row("Unknown", "a", 10, &[])]);
        let err = impute(&t).unwrap_err();
        match err {
            ImputeError::BadSeason { player, season } => {
                assert_eq!(player, "a");
                assert_eq!(season, "Unknown");
            }
        }
    }

    #[test]
    fn nan_euclidean_scales_by_observed_fraction() {
        let a = [Some(0.0), Some(3.0), None];
        let b = [Some(4.0), None, Some(1.0)];
        // One shared coordinate out of three: sqrt(16 * 3).
        let d = nan_euclidean(&a, &b).unwrap();
        assert!((d - 48f64.sqrt()).abs() < 1e-12);

        assert_eq!(nan_euclidean(&[None, Some(1.0)], &[Some(2.0), None]), None);
    }

    #[test]
    fn input_table_is_not_modified() {
        let t = table(
            &[Metric::Per],
            vec![
                row("2010-2011", "a", 10, &[(Metric::Per, 10.0)]),
                row("2010-2011", "gap", 10, &[]),
            ],
        );
        let before = t.clone();
        let _ = impute(&t).unwrap();
        assert_eq!(t, before);
    }
}
