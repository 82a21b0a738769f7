// Era buckets used to scope imputation.

use std::fmt;

/// Last starting year of the pre-modern era.
pub const PRE_MODERN_END: i32 = 1960;
/// Last starting year of the early-modern era.
pub const EARLY_MODERN_END: i32 = 1980;
/// Last starting year of the modern era. Later seasons are contemporary.
pub const MODERN_END: i32 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Era {
    PreModern,
    EarlyModern,
    Modern,
    Contemporary,
}

impl Era {
    /// Chronological order.
    pub const ALL: [Era; 4] = [Era::PreModern, Era::EarlyModern, Era::Modern, Era::Contemporary];

    pub fn label(self) -> &'static str {
        match self {
            Era::PreModern => "Pre-modern",
            Era::EarlyModern => "Early-modern",
            Era::Modern => "Modern",
            Era::Contemporary => "Contemporary",
        }
    }
}

impl fmt::Display for Era {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Bucket a season's starting year. Years before the first boundary fall in
/// the pre-modern era and years after the last in the contemporary era.
pub fn year_to_era(year: i32) -> Era {
    if year <= PRE_MODERN_END {
        Era::PreModern
    } else if year <= EARLY_MODERN_END {
        Era::EarlyModern
    } else if year <= MODERN_END {
        Era::Modern
    } else {
        Era::Contemporary
    }
}

/// Starting year of a `"YYYY-YYYY"` season token.
pub fn season_start_year(season: &str) -> Option<i32> {
    season.split('-').next()?.trim().parse().ok()
}
