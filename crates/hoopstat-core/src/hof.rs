// Hall-of-Fame tagging.
//
// Names are compared after normalization so that "Shaquille O'Neal*" in a
// season export matches "Shaquille O'Neal" in the roster.

use crate::season::SeasonTable;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use tracing::{info, warn};

/// Strips decoration and suffixes from player names before comparison.
#[derive(Debug, Clone)]
pub struct NameNormalizer {
    decoration: Regex,
    suffix: Regex,
    whitespace: Regex,
}

impl NameNormalizer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(NameNormalizer {
            decoration: Regex::new(r#"[*()'"]"#)?,
            suffix: Regex::new(r"\s+(?:Jr\.|Sr\.|III|II|IV)")?,
            whitespace: Regex::new(r"\s+")?,
        })
    }

    pub fn normalize(&self, name: &str) -> String {
        let name = self.decoration.replace_all(name, "");
        let name = self.suffix.replace_all(&name, "");
        self.whitespace.replace_all(&name, " ").trim().to_string()
    }
}

/// The configured Hall-of-Fame roster, keyed by normalized name.
#[derive(Debug, Clone)]
pub struct HofRoster {
    normalizer: NameNormalizer,
    /// Roster names as configured, for reporting.
    names: Vec<String>,
    normalized: HashSet<String>,
}

impl HofRoster {
    pub fn new<I, S>(names: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let normalizer = NameNormalizer::new()?;
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let normalized = names.iter().map(|n| normalizer.normalize(n)).collect();
        Ok(HofRoster {
            normalizer,
            names,
            normalized,
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, player: &str) -> bool {
        self.normalized.contains(&self.normalizer.normalize(player))
    }

    /// Copy of `table` with every row's HOF flag set from the roster and the
    /// HOF column added to the schema.
    pub fn tag(&self, table: &SeasonTable) -> SeasonTable {
        let mut tagged = table.clone();
        tagged.schema.hof = true;
        for record in &mut tagged.records {
            record.hof = self.contains(&record.player);
        }

        let rows = tagged.records.iter().filter(|r| r.hof).count();
        info!(
            "HOF players found in {} of {} {} rows",
            rows,
            tagged.len(),
            tagged.competition.label()
        );
        for name in self.missing_from(&tagged) {
            warn!("HOF player missing from {} data: {}", tagged.competition.label(), name);
        }
        tagged
    }

    /// Roster names (as configured, sorted) with no matching row in `table`.
    pub fn missing_from(&self, table: &SeasonTable) -> Vec<String> {
        let found: HashSet<String> = table
            .records
            .iter()
            .map(|r| self.normalizer.normalize(&r.player))
            .filter(|n| self.normalized.contains(n))
            .collect();
        self.names
            .iter()
            .filter(|n| !found.contains(&self.normalizer.normalize(n)))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Rows flagged HOF, with duplicate (player, season) rows removed.
pub fn hof_only(table: &SeasonTable) -> SeasonTable {
    let mut seen = HashSet::new();
    let records: Vec<_> = table
        .records
        .iter()
        .filter(|r| r.hof)
        .filter(|r| seen.insert((r.player.as_str(), r.season.as_str())))
        .cloned()
        .collect();

    let duplicates = table.records.iter().filter(|r| r.hof).count() - records.len();
    if duplicates > 0 {
        info!("removed {} duplicate HOF rows", duplicates);
    }
    SeasonTable::new(table.competition, table.schema.clone(), records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::season::{Competition, Schema, SeasonRecord};

    fn table(rows: &[(&str, &str)]) -> SeasonTable {
        let records = rows
            .iter()
            .map(|&(season, player)| SeasonRecord::new(season, player, 10))
            .collect();
        SeasonTable::new(Competition::RegularSeason, Schema::canonical(), records)
    }

    #[test]
    fn normalizer_strips_decoration_and_suffixes() {
        let n = NameNormalizer::new().unwrap();
        assert_eq!(n.normalize("Shaquille O'Neal*"), "Shaquille ONeal");
        assert_eq!(n.normalize("  Gary   Payton Jr. "), "Gary Payton");
        assert_eq!(n.normalize("Glen Rice Sr."), "Glen Rice");
        assert_eq!(n.normalize("Tim Hardaway III"), "Tim Hardaway");
        assert_eq!(n.normalize("Some (One) IV"), "Some One");
        assert_eq!(n.normalize("K.C. Jones"), "K.C. Jones");
    }

    #[test]
    fn roster_matches_decorated_names() {
        let roster = HofRoster::new(["Shaquille O'Neal", "Kobe Bryant"]).unwrap();
        assert!(roster.contains("Shaquille O'Neal*"));
        assert!(roster.contains("Kobe  Bryant"));
        assert!(!roster.contains("Kobe"));
        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn tag_sets_flag_and_schema() {
        let roster = HofRoster::new(["Michael Jordan"]).unwrap();
        let t = table(&[("1990-1991", "Michael Jordan*"), ("1990-1991", "Role Player")]);
        let tagged = roster.tag(&t);
        assert!(tagged.schema.hof);
        assert!(tagged.records[0].hof);
        assert!(!tagged.records[1].hof);
        assert!(!t.schema.hof);
    }

    #[test]
    fn missing_roster_players_reported_sorted() {
        let roster = HofRoster::new(["Zelmo Beaty", "Michael Jordan", "Bob Cousy"]).unwrap();
        let t = table(&[("1990-1991", "Michael Jordan")]);
        assert_eq!(roster.missing_from(&t), vec!["Bob Cousy", "Zelmo Beaty"]);
    }

    #[test]
    fn hof_only_drops_non_members_and_duplicates() {
        let roster = HofRoster::new(["Michael Jordan"]).unwrap();
        let t = table(&[
            ("1990-1991", "Michael Jordan"),
            ("1990-1991", "Michael Jordan"),
            ("1991-1992", "Michael Jordan"),
            ("1991-1992", "Role Player"),
        ]);
        let subset = hof_only(&roster.tag(&t));
        assert_eq!(subset.len(), 2);
        assert!(subset.records.iter().all(|r| r.player == "Michael Jordan"));
        assert!(subset.schema.hof);
    }
}
