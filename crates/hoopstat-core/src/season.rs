// Canonical season-record model: metric columns, award flags, and the
// schema-carrying SeasonTable every pipeline stage consumes and produces.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// Competition type
// ---------------------------------------------------------------------------

/// Which competition a season table covers. Award semantics and output file
/// names differ between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Competition {
    RegularSeason,
    Postseason,
}

impl Competition {
    pub const ALL: [Competition; 2] = [Competition::RegularSeason, Competition::Postseason];

    /// Award flag columns carried by season tables of this competition.
    pub fn award_flags(self) -> &'static [AwardFlag] {
        match self {
            Competition::RegularSeason => &AwardFlag::REGULAR_SEASON,
            Competition::Postseason => &AwardFlag::POSTSEASON,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Competition::RegularSeason => "regular season",
            Competition::Postseason => "postseason",
        }
    }
}

// ---------------------------------------------------------------------------
// Metric columns
// ---------------------------------------------------------------------------

/// How a metric rolls up into a career row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CareerRule {
    Sum,
    MinutesWeighted,
}

/// Every nullable numeric column of the canonical season schema, in header
/// order. Minutes played lives here too because it is itself imputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    MinutesPlayed,
    Per,
    TrueShooting,
    ThreePointRate,
    FreeThrowRate,
    OffensiveReboundPct,
    DefensiveReboundPct,
    TotalReboundPct,
    AssistPct,
    StealPct,
    BlockPct,
    TurnoverPct,
    UsagePct,
    OffensiveWinShares,
    DefensiveWinShares,
    WinShares,
    WinSharesPer48,
    OffensiveBpm,
    DefensiveBpm,
    Bpm,
    Vorp,
}

impl Metric {
    pub const COUNT: usize = 21;

    pub const ALL: [Metric; Metric::COUNT] = [
        Metric::MinutesPlayed,
        Metric::Per,
        Metric::TrueShooting,
        Metric::ThreePointRate,
        Metric::FreeThrowRate,
        Metric::OffensiveReboundPct,
        Metric::DefensiveReboundPct,
        Metric::TotalReboundPct,
        Metric::AssistPct,
        Metric::StealPct,
        Metric::BlockPct,
        Metric::TurnoverPct,
        Metric::UsagePct,
        Metric::OffensiveWinShares,
        Metric::DefensiveWinShares,
        Metric::WinShares,
        Metric::WinSharesPer48,
        Metric::OffensiveBpm,
        Metric::DefensiveBpm,
        Metric::Bpm,
        Metric::Vorp,
    ];

    /// Column header used in both the raw season files and the canonical
    /// output files.
    pub fn header(self) -> &'static str {
        match self {
            Metric::MinutesPlayed => "MP",
            Metric::Per => "PER",
            Metric::TrueShooting => "TS%",
            Metric::ThreePointRate => "3PAr",
            Metric::FreeThrowRate => "FTr",
            Metric::OffensiveReboundPct => "ORB%",
            Metric::DefensiveReboundPct => "DRB%",
            Metric::TotalReboundPct => "TRB%",
            Metric::AssistPct => "AST%",
            Metric::StealPct => "STL%",
            Metric::BlockPct => "BLK%",
            Metric::TurnoverPct => "TOV%",
            Metric::UsagePct => "USG%",
            Metric::OffensiveWinShares => "OWS",
            Metric::DefensiveWinShares => "DWS",
            Metric::WinShares => "WS",
            Metric::WinSharesPer48 => "WS/48",
            Metric::OffensiveBpm => "OBPM",
            Metric::DefensiveBpm => "DBPM",
            Metric::Bpm => "BPM",
            Metric::Vorp => "VORP",
        }
    }

    pub fn from_header(header: &str) -> Option<Metric> {
        let header = header.trim();
        Metric::ALL.into_iter().find(|m| m.header() == header)
    }

    /// Whether the era imputer fills this metric. Win-share totals and VORP
    /// are counting stats and stay as recorded.
    pub fn is_imputed(self) -> bool {
        !matches!(
            self,
            Metric::OffensiveWinShares
                | Metric::DefensiveWinShares
                | Metric::WinShares
                | Metric::Vorp
        )
    }

    pub fn career_rule(self) -> CareerRule {
        match self {
            Metric::MinutesPlayed
            | Metric::OffensiveWinShares
            | Metric::DefensiveWinShares
            | Metric::WinShares
            | Metric::Vorp => CareerRule::Sum,
            _ => CareerRule::MinutesWeighted,
        }
    }

    /// Fill value used when a metric has no observations anywhere.
    pub fn default_fill(self) -> f64 {
        match self {
            Metric::MinutesPlayed => 20.0,
            _ => 0.0,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// One row's worth of nullable metric values, indexed by `Metric`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StatLine([Option<f64>; Metric::COUNT]);

impl StatLine {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.0[metric.index()]
    }

    pub fn set(&mut self, metric: Metric, value: Option<f64>) {
        self.0[metric.index()] = value;
    }

    #[cfg(test)]
    pub(crate) fn with(mut self, metric: Metric, value: f64) -> Self {
        self.set(metric, Some(value));
        self
    }
}

// ---------------------------------------------------------------------------
// Award flags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AwardFlag {
    SixthMan,
    AllStar,
    AllDefensive1,
    AllDefensive2,
    AllLeague1,
    AllLeague2,
    AllLeague3,
    Mvp,
    DefensivePlayer,
    RookieOfTheYear,
    MostImproved,
    ClutchPlayer,
    FinalsMvp,
}

impl AwardFlag {
    pub const COUNT: usize = 13;

    pub const REGULAR_SEASON: [AwardFlag; 12] = [
        AwardFlag::SixthMan,
        AwardFlag::AllStar,
        AwardFlag::AllDefensive1,
        AwardFlag::AllDefensive2,
        AwardFlag::AllLeague1,
        AwardFlag::AllLeague2,
        AwardFlag::AllLeague3,
        AwardFlag::Mvp,
        AwardFlag::DefensivePlayer,
        AwardFlag::RookieOfTheYear,
        AwardFlag::MostImproved,
        AwardFlag::ClutchPlayer,
    ];

    pub const POSTSEASON: [AwardFlag; 1] = [AwardFlag::FinalsMvp];

    /// Column header for the flag; also the award's code in raw award text.
    pub fn header(self) -> &'static str {
        match self {
            AwardFlag::SixthMan => "6MOY",
            AwardFlag::AllStar => "AS",
            AwardFlag::AllDefensive1 => "DEF1",
            AwardFlag::AllDefensive2 => "DEF2",
            AwardFlag::AllLeague1 => "NBA1",
            AwardFlag::AllLeague2 => "NBA2",
            AwardFlag::AllLeague3 => "NBA3",
            AwardFlag::Mvp => "MVP",
            AwardFlag::DefensivePlayer => "DPOY",
            AwardFlag::RookieOfTheYear => "ROY",
            AwardFlag::MostImproved => "MIP",
            AwardFlag::ClutchPlayer => "CPOY",
            AwardFlag::FinalsMvp => "Finals MVP",
        }
    }

    pub fn from_header(header: &str) -> Option<AwardFlag> {
        let header = header.trim();
        AwardFlag::REGULAR_SEASON
            .into_iter()
            .chain(AwardFlag::POSTSEASON)
            .find(|f| f.header() == header)
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Per-flag counts. Season rows hold 0/1; career rows hold totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AwardCounts([u32; AwardFlag::COUNT]);

impl AwardCounts {
    pub fn get(&self, flag: AwardFlag) -> u32 {
        self.0[flag.index()]
    }

    pub fn set(&mut self, flag: AwardFlag, value: u32) {
        self.0[flag.index()] = value;
    }

    pub fn add(&mut self, other: &AwardCounts) {
        for (total, n) in self.0.iter_mut().zip(other.0.iter()) {
            *total += n;
        }
    }
}

// ---------------------------------------------------------------------------
// Season records and tables
// ---------------------------------------------------------------------------

/// One player's single-season row in the canonical schema.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonRecord {
    pub season: String,
    pub player: String,
    pub games: u32,
    pub stats: StatLine,
    /// Raw award text before classification, display list after.
    pub awards: Option<String>,
    pub flags: AwardCounts,
    pub hof: bool,
}

impl SeasonRecord {
    pub fn new(season: impl Into<String>, player: impl Into<String>, games: u32) -> Self {
        SeasonRecord {
            season: season.into(),
            player: player.into(),
            games,
            stats: StatLine::default(),
            awards: None,
            flags: AwardCounts::default(),
            hof: false,
        }
    }
}

/// Which optional columns a table carries. Decided once at the ingestion
/// boundary and threaded through every stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub metrics: BTreeSet<Metric>,
    /// `Awards List` (classified) vs `Awards` (raw).
    pub awards_classified: bool,
    pub hof: bool,
}

impl Schema {
    /// Every canonical metric column, raw awards, no HOF column.
    pub fn canonical() -> Self {
        Schema {
            metrics: Metric::ALL.into_iter().collect(),
            awards_classified: false,
            hof: false,
        }
    }

    pub fn has(&self, metric: Metric) -> bool {
        self.metrics.contains(&metric)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeasonTable {
    pub competition: Competition,
    pub schema: Schema,
    pub records: Vec<SeasonRecord>,
}

impl SeasonTable {
    pub fn new(competition: Competition, schema: Schema, records: Vec<SeasonRecord>) -> Self {
        SeasonTable {
            competition,
            schema,
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn unique_players(&self) -> usize {
        self.records
            .iter()
            .map(|r| r.player.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Remove metric columns whose missing fraction exceeds `threshold`.
    /// Returns the new table and the dropped metrics.
    pub fn drop_sparse_metrics(&self, threshold: f64) -> (SeasonTable, Vec<Metric>) {
        let mut table = self.clone();
        if table.records.is_empty() {
            return (table, Vec::new());
        }
        let total = table.records.len() as f64;
        let dropped: Vec<Metric> = self
            .schema
            .metrics
            .iter()
            .copied()
            .filter(|&m| {
                let missing = self.records.iter().filter(|r| r.stats.get(m).is_none()).count();
                missing as f64 / total > threshold
            })
            .collect();

        for &metric in &dropped {
            table.schema.metrics.remove(&metric);
            for record in &mut table.records {
                record.stats.set(metric, None);
            }
        }
        (table, dropped)
    }
}

/// Round to three decimal places, the precision of every numeric output.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
