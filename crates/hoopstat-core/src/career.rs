// Career aggregation: collapse each player's seasons into one row.
//
// Counting stats are summed, rate stats are averaged with minutes played as
// the weight, award flags become counts.

use crate::season::{round3, AwardCounts, CareerRule, Competition, Metric, SeasonTable};
use std::collections::HashMap;
use tracing::{info, warn};

/// Career column order for summed metrics.
pub const SUMMED_METRICS: [Metric; 5] = [
    Metric::MinutesPlayed,
    Metric::OffensiveWinShares,
    Metric::DefensiveWinShares,
    Metric::WinShares,
    Metric::Vorp,
];

/// Career column order for minutes-weighted metrics.
pub const WEIGHTED_METRICS: [Metric; 16] = [
    Metric::Per,
    Metric::TrueShooting,
    Metric::ThreePointRate,
    Metric::FreeThrowRate,
    Metric::UsagePct,
    Metric::WinSharesPer48,
    Metric::OffensiveReboundPct,
    Metric::DefensiveReboundPct,
    Metric::TotalReboundPct,
    Metric::AssistPct,
    Metric::StealPct,
    Metric::BlockPct,
    Metric::TurnoverPct,
    Metric::OffensiveBpm,
    Metric::DefensiveBpm,
    Metric::Bpm,
];

/// One player's aggregated, all-seasons row.
#[derive(Debug, Clone, PartialEq)]
pub struct CareerRecord {
    pub player: String,
    pub hof: bool,
    pub games: u32,
    /// Aggregated metric values, keyed like the season stat line. Only
    /// metrics in the table's schema are populated.
    pub stats: HashMap<Metric, Option<f64>>,
    pub awards: AwardCounts,
}

impl CareerRecord {
    pub fn stat(&self, metric: Metric) -> Option<f64> {
        self.stats.get(&metric).copied().flatten()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CareerTable {
    pub competition: Competition,
    /// Metric columns, in output order.
    pub metrics: Vec<Metric>,
    pub hof: bool,
    pub records: Vec<CareerRecord>,
    /// Players whose seasons disagree on HOF status.
    pub hof_conflicts: Vec<String>,
}

impl CareerTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, player: &str) -> Option<&CareerRecord> {
        self.records.iter().find(|r| r.player == player)
    }
}

/// Aggregate a (normally imputed) season table into one row per player, in
/// order of each player's first season row.
pub fn aggregate(table: &SeasonTable) -> CareerTable {
    let metrics: Vec<Metric> = SUMMED_METRICS
        .into_iter()
        .chain(WEIGHTED_METRICS)
        .filter(|m| table.schema.has(*m))
        .collect();
    let weighted_by_minutes = table.schema.has(Metric::MinutesPlayed);
    if !weighted_by_minutes {
        warn!("no MP column; career rate stats fall back to unweighted means");
    }

    // Group row indices by player, preserving first appearance.
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, record) in table.records.iter().enumerate() {
        groups
            .entry(record.player.as_str())
            .or_insert_with(|| {
                order.push(record.player.as_str());
                Vec::new()
            })
            .push(i);
    }

    let mut hof_conflicts = Vec::new();
    let records = order
        .into_iter()
        .map(|player| {
            let seasons: Vec<_> = groups[player].iter().map(|&i| &table.records[i]).collect();

            let hof = seasons[0].hof;
            if table.schema.hof && seasons.iter().any(|s| s.hof != hof) {
                warn!(
                    "player '{}' has conflicting HOF values across seasons; keeping first ({})",
                    player, hof
                );
                hof_conflicts.push(player.to_string());
            }

            let mut awards = AwardCounts::default();
            for season in &seasons {
                awards.add(&season.flags);
            }

            let stats = metrics
                .iter()
                .map(|&metric| {
                    let value = match metric.career_rule() {
                        CareerRule::Sum => {
                            Some(seasons.iter().filter_map(|s| s.stats.get(metric)).sum::<f64>())
                        }
                        CareerRule::MinutesWeighted => weighted_mean(
                            seasons.iter().filter_map(|s| {
                                let weight = if weighted_by_minutes {
                                    s.stats.get(Metric::MinutesPlayed).unwrap_or(0.0)
                                } else {
                                    0.0
                                };
                                s.stats.get(metric).map(|v| (v, weight))
                            }),
                        ),
                    };
                    (metric, value.map(round3))
                })
                .collect();

            CareerRecord {
                player: player.to_string(),
                hof,
                games: seasons.iter().map(|s| s.games).sum(),
                stats,
                awards,
            }
        })
        .collect::<Vec<_>>();

    info!(
        "aggregated {} {} season rows into {} careers",
        table.len(),
        table.competition.label(),
        records.len()
    );

    CareerTable {
        competition: table.competition,
        metrics,
        hof: table.schema.hof,
        records,
        hof_conflicts,
    }
}

/// Weighted mean of `(value, weight)` pairs. Falls back to the plain mean
/// when the weights sum to zero; `None` when there are no values.
///
/// Only seasons that recorded the metric are passed in, so a season with a
/// missing value contributes neither value nor weight to the zero check.
pub fn weighted_mean(pairs: impl Iterator<Item = (f64, f64)>) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = pairs.collect();
    if pairs.is_empty() {
        return None;
    }

    let total_weight: f64 = pairs.iter().map(|&(_, w)| w).sum();
    if total_weight == 0.0 {
        let n = pairs.len() as f64;
        return Some(pairs.iter().map(|&(v, _)| v).sum::<f64>() / n);
    }

    Some(pairs.iter().map(|&(v, w)| v * w).sum::<f64>() / total_weight)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
