use serde::{Serialize, Serializer};
use std::fmt;
use tracing::debug;

use crate::types::{Competition, Match};

pub const ALL_COMPETITIONS: &str = "all";

/// Competition scope selected on the player page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CompetitionFilter {
    #[default]
    All,
    Only(String),
}

impl CompetitionFilter {
    /// Parse the raw select value. Empty or `"all"` means every competition.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") | Some(ALL_COMPETITIONS) => CompetitionFilter::All,
            Some(id) => CompetitionFilter::Only(id.to_string()),
        }
    }

    /// Degrade to `All` when the id is not one of the known competitions.
    pub fn resolve(self, competitions: &[Competition]) -> Self {
        match self {
            CompetitionFilter::Only(id) if !competitions.iter().any(|c| c.id == id) => {
                debug!("Unknown competition {}, falling back to all competitions", id);
                CompetitionFilter::All
            }
            other => other,
        }
    }

    pub fn matches(&self, m: &Match) -> bool {
        match self {
            CompetitionFilter::All => true,
            CompetitionFilter::Only(id) => &m.competition_id == id,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CompetitionFilter::All => ALL_COMPETITIONS,
            CompetitionFilter::Only(id) => id,
        }
    }
}

impl fmt::Display for CompetitionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CompetitionFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Select the matches in scope, keeping input order.
///
/// `season_id` restricts to one season when given; with `CompetitionFilter::All`
/// and no season every match is returned.
pub fn filter_matches<'a>(
    matches: &'a [Match],
    competition: &CompetitionFilter,
    season_id: Option<&str>,
) -> Vec<&'a Match> {
    matches
        .iter()
        .filter(|m| season_id.map_or(true, |s| m.season_id == s))
        .filter(|m| competition.matches(m))
        .collect()
}
