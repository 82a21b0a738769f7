// Raw season-file normalization, multi-team consolidation, and merging.
//
// A raw file holds one season of one competition. Its name carries the season
// (`rg_1949_1950.csv`), its rank/team/position columns are discarded, and a
// player traded mid-season keeps only the stint with the most games.

use crate::season::{Competition, Schema, SeasonRecord, SeasonTable};
use crate::table_io::{parse_count, parse_number, Columns, GAMES_COLUMN, PLAYER_COLUMN, RAW_AWARDS_COLUMN};
use regex::Regex;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Aggregate row that season exports append after the players.
const LEAGUE_AVERAGE: &str = "League Average";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("no season years in file name: {path}")]
    NoSeason { path: String },

    #[error("{path}: required column `{column}` is missing")]
    MissingColumn { path: String, column: &'static str },

    #[error("none of the {attempted} {competition} season files could be merged")]
    NothingMerged {
        competition: &'static str,
        attempted: usize,
    },
}

// ---------------------------------------------------------------------------
// Season from file name
// ---------------------------------------------------------------------------

/// Extract `"YYYY-YYYY"` from the first pair of underscore-joined four-digit
/// years in a file name.
pub fn season_from_file_name(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let re = Regex::new(r"(\d{4})_(\d{4})").ok()?;
    let caps = re.captures(name)?;
    Some(format!("{}-{}", &caps[1], &caps[2]))
}

// ---------------------------------------------------------------------------
// Single-file normalization
// ---------------------------------------------------------------------------

fn normalize_season_from_reader<R: Read>(
    rdr: R,
    season: &str,
    label: &str,
) -> Result<Vec<SeasonRecord>, NormalizeError> {
    let mut reader = csv::Reader::from_reader(rdr);
    let headers = reader
        .headers()
        .map_err(|e| NormalizeError::Csv {
            path: label.to_string(),
            source: e,
        })?
        .clone();
    let columns = Columns::new(&headers);

    for required in [PLAYER_COLUMN, GAMES_COLUMN] {
        if columns.position(required).is_none() {
            return Err(NormalizeError::MissingColumn {
                path: label.to_string(),
                column: required,
            });
        }
    }
    let metrics = columns.metrics();

    let mut records = Vec::new();
    for result in reader.records() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                warn!("{}: skipping malformed row: {}", label, e);
                continue;
            }
        };

        let player = columns.cell(&row, PLAYER_COLUMN).unwrap_or_default();
        if player.is_empty() || player == LEAGUE_AVERAGE {
            continue;
        }
        let games = columns
            .cell(&row, GAMES_COLUMN)
            .and_then(parse_count)
            .unwrap_or(0);

        let mut record = SeasonRecord::new(season, player, games);
        for &metric in &metrics {
            record
                .stats
                .set(metric, columns.cell(&row, metric.header()).and_then(parse_number));
        }
        record.awards = columns
            .cell(&row, RAW_AWARDS_COLUMN)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        records.push(record);
    }

    Ok(records)
}

/// Collapse multiple rows of the same player into the one with the most
/// games, the first such row winning ties. Output is ordered by player name.
pub fn consolidate(records: Vec<SeasonRecord>) -> Vec<SeasonRecord> {
    let mut best: BTreeMap<String, SeasonRecord> = BTreeMap::new();
    for record in records {
        match best.get(&record.player) {
            Some(kept) if kept.games >= record.games => {}
            _ => {
                best.insert(record.player.clone(), record);
            }
        }
    }
    best.into_values().collect()
}

/// Read, clean, and consolidate one raw season file.
pub fn normalize_season_file(path: &Path) -> Result<Vec<SeasonRecord>, NormalizeError> {
    let label = path.display().to_string();
    let season = season_from_file_name(path).ok_or_else(|| NormalizeError::NoSeason {
        path: label.clone(),
    })?;
    let file = std::fs::File::open(path).map_err(|e| NormalizeError::Io {
        path: label.clone(),
        source: e,
    })?;

    let rows = normalize_season_from_reader(file, &season, &label)?;
    let raw_count = rows.len();
    let records = consolidate(rows);
    debug!(
        "{}: season {}, {} rows consolidated to {}",
        label,
        season,
        raw_count,
        records.len()
    );
    Ok(records)
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

/// Normalize every file and concatenate the results in file-name order. Files
/// that fail are logged and skipped; merging zero files is an error.
pub fn merge_files(paths: &[PathBuf], competition: Competition) -> Result<SeasonTable, NormalizeError> {
    let mut sorted: Vec<&PathBuf> = paths.iter().collect();
    sorted.sort();

    let mut records = Vec::new();
    let mut merged = 0usize;
    for path in sorted {
        match normalize_season_file(path) {
            Ok(rows) => {
                info!("merged {} ({} rows)", path.display(), rows.len());
                records.extend(rows);
                merged += 1;
            }
            Err(e) => warn!("skipping {}: {}", path.display(), e),
        }
    }

    if merged == 0 {
        return Err(NormalizeError::NothingMerged {
            competition: competition.label(),
            attempted: paths.len(),
        });
    }

    info!(
        "merged {} of {} {} files into {} rows",
        merged,
        paths.len(),
        competition.label(),
        records.len()
    );
    // Files lacking a metric column contribute missing values.
    Ok(SeasonTable::new(competition, Schema::canonical(), records))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
