use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Season;

/// Editable fields of a match, as sent by the admin match form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchUpdate {
    pub date: DateTime<Utc>,
    pub home: bool,
    pub scored: i32,
    pub conceeded: i32,
    pub competition_id: String,
    pub season_id: String,
    pub opponent_id: String,
}

impl MatchUpdate {
    pub fn validate(&self) -> Result<(), String> {
        if self.scored < 0 || self.conceeded < 0 {
            return Err(format!(
                "Scores cannot be negative ({}-{})",
                self.scored, self.conceeded
            ));
        }
        let missing: Vec<&str> = [
            ("competitionId", &self.competition_id),
            ("seasonId", &self.season_id),
            ("opponentId", &self.opponent_id),
        ]
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();
        if !missing.is_empty() {
            return Err(format!("Missing {}", missing.join(", ")));
        }
        Ok(())
    }
}

/// A row of the admin seasons table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonRow {
    pub id: String,
    pub label: String,
    pub start_date: DateTime<Utc>,
    pub squad_size: usize,
}

/// Seasons for the admin table, latest first.
pub fn season_rows(seasons: &[Season]) -> Vec<SeasonRow> {
    let mut rows: Vec<SeasonRow> = seasons
        .iter()
        .map(|s| SeasonRow {
            id: s.id.clone(),
            label: s.label(),
            start_date: s.start_date,
            squad_size: s.players.len(),
        })
        .collect();
    rows.sort_by(|a, b| b.start_date.cmp(&a.start_date));
    rows
}
