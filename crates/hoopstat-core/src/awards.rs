// Award-text classification.
//
// Raw award annotations look like "MVP-1,AS,NBA1". Each comma-separated token
// is parsed into an `AwardToken`, wrapped in slashes for the display list, and
// (for first-place or unranked awards) turned into a flag.

use crate::season::{AwardCounts, AwardFlag, Competition, SeasonTable};
use std::collections::BTreeSet;

/// Ranked award prefixes for the regular season. The flag is set only for a
/// first-place finish.
const REGULAR_SEASON_RANKED: [(&str, AwardFlag); 6] = [
    ("MVP-", AwardFlag::Mvp),
    ("ROY-", AwardFlag::RookieOfTheYear),
    ("DPOY-", AwardFlag::DefensivePlayer),
    ("6MOY-", AwardFlag::SixthMan),
    ("CPOY-", AwardFlag::ClutchPlayer),
    ("MIP-", AwardFlag::MostImproved),
];

const REGULAR_SEASON_UNRANKED: [AwardFlag; 6] = [
    AwardFlag::AllStar,
    AwardFlag::AllDefensive1,
    AwardFlag::AllDefensive2,
    AwardFlag::AllLeague1,
    AwardFlag::AllLeague2,
    AwardFlag::AllLeague3,
];

const POSTSEASON_RANKED: [(&str, AwardFlag); 1] = [("Finals MVP-", AwardFlag::FinalsMvp)];

fn ranked_codes(competition: Competition) -> &'static [(&'static str, AwardFlag)] {
    match competition {
        Competition::RegularSeason => &REGULAR_SEASON_RANKED[..],
        Competition::Postseason => &POSTSEASON_RANKED[..],
    }
}

fn unranked_codes(competition: Competition) -> &'static [AwardFlag] {
    match competition {
        Competition::RegularSeason => &REGULAR_SEASON_UNRANKED[..],
        Competition::Postseason => &[],
    }
}

/// One parsed award token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwardToken<'a> {
    Unranked(AwardFlag),
    Ranked {
        award: AwardFlag,
        rank: u32,
        text: &'a str,
    },
    Unknown(&'a str),
}

impl<'a> AwardToken<'a> {
    /// Classify a single trimmed token under the given competition's grammar.
    pub fn parse(token: &'a str, competition: Competition) -> Self {
        if let Some(&flag) = unranked_codes(competition)
            .iter()
            .find(|f| f.header() == token)
        {
            return AwardToken::Unranked(flag);
        }

        for &(prefix, award) in ranked_codes(competition) {
            let Some(rest) = token.strip_prefix(prefix) else {
                continue;
            };
            // Ranks are written without padding; "MVP-01" is not a first place.
            if !rest.is_empty()
                && !rest.starts_with('0')
                && rest.bytes().all(|b| b.is_ascii_digit())
            {
                if let Ok(rank) = rest.parse::<u32>() {
                    return AwardToken::Ranked {
                        award,
                        rank,
                        text: token,
                    };
                }
            }
            break;
        }

        AwardToken::Unknown(token)
    }

    /// Text shown between the slashes of the display list.
    pub fn text(&self) -> &'a str {
        match *self {
            AwardToken::Unranked(flag) => flag.header(),
            AwardToken::Ranked { text, .. } => text,
            AwardToken::Unknown(text) => text,
        }
    }

    /// Flag this token sets, if any.
    pub fn flag(&self) -> Option<AwardFlag> {
        match *self {
            AwardToken::Unranked(flag) => Some(flag),
            AwardToken::Ranked { award, rank: 1, .. } => Some(award),
            AwardToken::Ranked { .. } | AwardToken::Unknown(_) => None,
        }
    }
}

/// Result of classifying one raw awards cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub display: String,
    pub flags: BTreeSet<AwardFlag>,
}

/// Parse a raw awards string into its display list and flag set.
pub fn classify(raw: &str, competition: Competition) -> Classification {
    let mut out = Classification::default();
    if raw.trim().is_empty() {
        return out;
    }

    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let token = AwardToken::parse(part, competition);
        out.display.push('/');
        out.display.push_str(token.text());
        out.display.push('/');
        if let Some(flag) = token.flag() {
            out.flags.insert(flag);
        }
    }

    // Never lose award text the tokenizer could not split into anything.
    if out.display.is_empty() {
        out.display = format!("/{raw}/");
    }

    out
}

/// Classify every row's awards and reset its flags from the result. The
/// awards column becomes the display list.
pub fn classify_table(table: &SeasonTable) -> SeasonTable {
    let competition = table.competition;
    let mut flagged = 0usize;

    let records = table
        .records
        .iter()
        .map(|record| {
            let mut record = record.clone();
            let mut flags = AwardCounts::default();
            if let Some(raw) = record.awards.take() {
                let c = classify(&raw, competition);
                for flag in &c.flags {
                    flags.set(*flag, 1);
                }
                if !c.flags.is_empty() {
                    flagged += 1;
                }
                record.awards = (!c.display.is_empty()).then_some(c.display);
            }
            record.flags = flags;
            record
        })
        .collect();

    tracing::info!(
        "classified awards for {} {} rows ({} with flags)",
        table.len(),
        competition.label(),
        flagged
    );

    let mut schema = table.schema.clone();
    schema.awards_classified = true;
    SeasonTable::new(competition, schema, records)
}
