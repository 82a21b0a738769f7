// Canonical CSV reading and writing for season and career tables.
//
// The header row decides the schema: metric columns that are absent stay
// absent all the way to the career output.

use crate::career::CareerTable;
use crate::season::{AwardCounts, AwardFlag, Competition, Metric, Schema, SeasonRecord, SeasonTable};
use csv::StringRecord;
use std::collections::{BTreeSet, HashMap};
use std::io::{Read, Write};
use std::path::Path;
use thiserror::Error;
use tracing::warn;

pub const SEASON_COLUMN: &str = "Season";
pub const PLAYER_COLUMN: &str = "Player";
pub const GAMES_COLUMN: &str = "G";
pub const RAW_AWARDS_COLUMN: &str = "Awards";
pub const AWARDS_LIST_COLUMN: &str = "Awards List";
pub const HOF_COLUMN: &str = "HOF";

/// Award columns of a career table, in output order.
const CAREER_AWARD_ORDER: [AwardFlag; 13] = [
    AwardFlag::Mvp,
    AwardFlag::DefensivePlayer,
    AwardFlag::RookieOfTheYear,
    AwardFlag::MostImproved,
    AwardFlag::ClutchPlayer,
    AwardFlag::AllStar,
    AwardFlag::AllDefensive1,
    AwardFlag::AllDefensive2,
    AwardFlag::AllLeague1,
    AwardFlag::AllLeague2,
    AwardFlag::AllLeague3,
    AwardFlag::SixthMan,
    AwardFlag::FinalsMvp,
];

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TableError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("{path}: required column `{column}` is missing")]
    MissingColumn { path: String, column: &'static str },
}

// ---------------------------------------------------------------------------
// Header lookup and cell parsing (shared with the raw-file normalizer)
// ---------------------------------------------------------------------------

/// Column positions by trimmed header name.
pub(crate) struct Columns(HashMap<String, usize>);

impl Columns {
    pub(crate) fn new(headers: &StringRecord) -> Self {
        Columns(
            headers
                .iter()
                .enumerate()
                .map(|(i, h)| (h.trim().to_string(), i))
                .collect(),
        )
    }

    pub(crate) fn position(&self, name: &str) -> Option<usize> {
        self.0.get(name).copied()
    }

    pub(crate) fn cell<'r>(&self, row: &'r StringRecord, name: &str) -> Option<&'r str> {
        self.position(name).and_then(|i| row.get(i)).map(str::trim)
    }

    pub(crate) fn metrics(&self) -> BTreeSet<Metric> {
        self.0.keys().filter_map(|h| Metric::from_header(h)).collect()
    }
}

/// Parse a numeric cell. Blank, non-numeric, and non-finite cells are missing.
pub(crate) fn parse_number(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub(crate) fn parse_count(cell: &str) -> Option<u32> {
    parse_number(cell).filter(|v| *v >= 0.0).map(|v| v.round() as u32)
}

fn parse_flag(cell: &str) -> bool {
    matches!(cell.trim(), "1" | "1.0" | "true" | "True" | "TRUE")
}

fn format_number(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Season tables
// ---------------------------------------------------------------------------

fn read_season_table_from_reader<R: Read>(
    rdr: R,
    competition: Competition,
    label: &str,
) -> Result<SeasonTable, TableError> {
    let csv_err = |source| TableError::Csv {
        path: label.to_string(),
        source,
    };
    let mut reader = csv::Reader::from_reader(rdr);
    let headers = reader.headers().map_err(csv_err)?.clone();
    let columns = Columns::new(&headers);

    for required in [SEASON_COLUMN, PLAYER_COLUMN, GAMES_COLUMN] {
        if columns.position(required).is_none() {
            return Err(TableError::MissingColumn {
                path: label.to_string(),
                column: required,
            });
        }
    }

    let (awards_column, awards_classified) = if columns.position(AWARDS_LIST_COLUMN).is_some() {
        (Some(AWARDS_LIST_COLUMN), true)
    } else if columns.position(RAW_AWARDS_COLUMN).is_some() {
        (Some(RAW_AWARDS_COLUMN), false)
    } else {
        (None, false)
    };

    let schema = Schema {
        metrics: columns.metrics(),
        awards_classified,
        hof: columns.position(HOF_COLUMN).is_some(),
    };

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
        if player.is_empty() {
            warn!("{}: skipping row without a player name", label);
            continue;
        }
        let season = columns.cell(&row, SEASON_COLUMN).unwrap_or_default();
        let games = columns
            .cell(&row, GAMES_COLUMN)
            .and_then(parse_count)
            .unwrap_or(0);

        let mut record = SeasonRecord::new(season, player, games);
        for &metric in &schema.metrics {
            let value = columns.cell(&row, metric.header()).and_then(parse_number);
            record.stats.set(metric, value);
        }
        record.awards = awards_column
            .and_then(|c| columns.cell(&row, c))
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let mut flags = AwardCounts::default();
        for &flag in competition.award_flags() {
            if let Some(n) = columns.cell(&row, flag.header()).and_then(parse_count) {
                flags.set(flag, n);
            }
        }
        record.flags = flags;
        record.hof = columns.cell(&row, HOF_COLUMN).is_some_and(parse_flag);
        records.push(record);
    }

    Ok(SeasonTable::new(competition, schema, records))
}

fn season_header(table: &SeasonTable) -> Vec<&'static str> {
    let mut header = vec![SEASON_COLUMN, PLAYER_COLUMN, GAMES_COLUMN];
    header.extend(table.schema.metrics.iter().map(|m| m.header()));
    header.push(if table.schema.awards_classified {
        AWARDS_LIST_COLUMN
    } else {
        RAW_AWARDS_COLUMN
    });
    header.extend(table.competition.award_flags().iter().map(|f| f.header()));
    if table.schema.hof {
        header.push(HOF_COLUMN);
    }
    header
}

fn write_season_table_to_writer<W: Write>(table: &SeasonTable, wtr: W) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(wtr);
    writer.write_record(season_header(table))?;

    for record in &table.records {
        let mut row = vec![
            record.season.clone(),
            record.player.clone(),
            record.games.to_string(),
        ];
        row.extend(
            table
                .schema
                .metrics
                .iter()
                .map(|&m| format_number(record.stats.get(m))),
        );
        row.push(record.awards.clone().unwrap_or_default());
        row.extend(
            table
                .competition
                .award_flags()
                .iter()
                .map(|&f| record.flags.get(f).to_string()),
        );
        if table.schema.hof {
            row.push(u8::from(record.hof).to_string());
        }
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Career tables
// ---------------------------------------------------------------------------

fn career_awards(table: &CareerTable) -> Vec<AwardFlag> {
    let carried = table.competition.award_flags();
    CAREER_AWARD_ORDER
        .into_iter()
        .filter(|f| carried.contains(f))
        .collect()
}

fn write_career_table_to_writer<W: Write>(table: &CareerTable, wtr: W) -> Result<(), csv::Error> {
    let awards = career_awards(table);
    let mut writer = csv::Writer::from_writer(wtr);

    let mut header = vec![PLAYER_COLUMN];
    if table.hof {
        header.push(HOF_COLUMN);
    }
    header.push(GAMES_COLUMN);
    header.extend(table.metrics.iter().map(|m| m.header()));
    header.extend(awards.iter().map(|f| f.header()));
    writer.write_record(&header)?;

    for record in &table.records {
        let mut row = vec![record.player.clone()];
        if table.hof {
            row.push(u8::from(record.hof).to_string());
        }
        row.push(record.games.to_string());
        row.extend(table.metrics.iter().map(|&m| format_number(record.stat(m))));
        row.extend(awards.iter().map(|&f| record.awards.get(f).to_string()));
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Public path-based entry points
// ---------------------------------------------------------------------------

/// Read a canonical season table. A missing `Season`, `Player`, or `G` column
/// is fatal; every other column is optional.
pub fn read_season_table(path: &Path, competition: Competition) -> Result<SeasonTable, TableError> {
    let file = std::fs::File::open(path).map_err(|e| TableError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    read_season_table_from_reader(file, competition, &path.display().to_string())
}

pub fn write_season_table(path: &Path, table: &SeasonTable) -> Result<(), TableError> {
    let file = std::fs::File::create(path).map_err(|e| TableError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    write_season_table_to_writer(table, file).map_err(|e| TableError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

pub fn write_career_table(path: &Path, table: &CareerTable) -> Result<(), TableError> {
    let file = std::fs::File::create(path).map_err(|e| TableError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    write_career_table_to_writer(table, file).map_err(|e| TableError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::career::aggregate;

    fn read(csv_data: &str, competition: Competition) -> Result<SeasonTable, TableError> {
        read_season_table_from_reader(csv_data.as_bytes(), competition, "test.csv")
    }

    fn written(table: &SeasonTable) -> String {
        let mut buf = Vec::new();
        write_season_table_to_writer(table, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn schema_follows_headers() {
        let csv_data = "\
Season,Player,G,MP,PER,Awards List,MVP,AS,HOF
1990-1991,Michael Jordan,82,3034,31.6,/MVP-1//AS/,1,1,1
1990-1991,Role Player,40,,9.5,,0,0,0";

        let table = read(csv_data, Competition::RegularSeason).unwrap();
        assert_eq!(
            table.schema.metrics,
            [Metric::MinutesPlayed, Metric::Per].into_iter().collect()
        );
        assert!(table.schema.awards_classified);
        assert!(table.schema.hof);

        let mj = &table.records[0];
        assert_eq!(mj.games, 82);
        assert_eq!(mj.stats.get(Metric::MinutesPlayed), Some(3034.0));
        assert_eq!(mj.awards.as_deref(), Some("/MVP-1//AS/"));
        assert_eq!(mj.flags.get(AwardFlag::Mvp), 1);
        assert!(mj.hof);

        let role = &table.records[1];
        assert_eq!(role.stats.get(Metric::MinutesPlayed), None);
        assert_eq!(role.awards, None);
        assert!(!role.hof);
    }

    #[test]
    fn missing_player_column_is_fatal() {
        let csv_data = "\
Season,Name,G,PER
1990-1991,Michael Jordan,82,31.6";
        let err = read(csv_data, Competition::RegularSeason).unwrap_err();
        match err {
            TableError::MissingColumn { column, .. } => assert_eq!(column, "Player"),
            other => panic!("expected MissingColumn, got: {other}"),
        }
    }

    #[test]
    fn non_numeric_cells_read_as_missing() {
        let csv_data = "\
Season,Player,G,PER,TS%
2001-2002,A,10,n/a,inf";
        let table = read(csv_data, Competition::RegularSeason).unwrap();
        assert_eq!(table.records[0].stats.get(Metric::Per), None);
        assert_eq!(table.records[0].stats.get(Metric::TrueShooting), None);
    }

    #[test]
    fn rows_without_player_skipped() {
        let csv_data = "\
Season,Player,G
2001-2002,,10
2001-2002,B,12";
        let table = read(csv_data, Competition::RegularSeason).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.records[0].player, "B");
    }

    #[test]
    fn season_table_written_then_read_back() {
        let csv_data = "\
Season,Player,G,MP,PER,Awards,Finals MVP
1990-1991,Michael Jordan,17,689,32,\"Finals MVP-1\",1";
        let table = read(csv_data, Competition::Postseason).unwrap();
        let out = written(&table);
        assert!(out.starts_with("Season,Player,G,MP,PER,Awards,Finals MVP\n"));
        assert!(out.contains("1990-1991,Michael Jordan,17,689,32,Finals MVP-1,1"));

        let again = read(&out, Competition::Postseason).unwrap();
        assert_eq!(again, table);
    }

    #[test]
    fn regular_season_header_lists_all_flags() {
        let table = SeasonTable::new(Competition::RegularSeason, Schema::canonical(), vec![]);
        let out = written(&table);
        assert_eq!(
            out.trim_end(),
            "Season,Player,G,MP,PER,TS%,3PAr,FTr,ORB%,DRB%,TRB%,AST%,STL%,BLK%,TOV%,USG%,\
OWS,DWS,WS,WS/48,OBPM,DBPM,BPM,VORP,Awards,6MOY,AS,DEF1,DEF2,NBA1,NBA2,NBA3,MVP,DPOY,ROY,MIP,CPOY"
        );
    }

    #[test]
    fn career_table_layout() {
        let csv_data = "\
Season,Player,G,MP,PER,WS,Awards List,MVP,AS,HOF
1990-1991,Michael Jordan,82,3034,31.6,20.3,/MVP-1//AS/,1,1,1
1991-1992,Michael Jordan,80,3102,27.7,17.7,/MVP-1//AS/,1,1,1";
        let table = read(csv_data, Competition::RegularSeason).unwrap();
        let careers = aggregate(&table);

        let mut buf = Vec::new();
        write_career_table_to_writer(&careers, &mut buf).unwrap();
        let out = String::from_utf8(buf).unwrap();
        let mut lines = out.lines();
        assert_eq!(
            lines.next(),
            Some("Player,HOF,G,MP,WS,PER,MVP,DPOY,ROY,MIP,CPOY,AS,DEF1,DEF2,NBA1,NBA2,NBA3,6MOY")
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("Michael Jordan,1,162,6136,38,"));
        assert!(row.ends_with(",2,0,0,0,0,2,0,0,0,0,0,0"));
    }
}
