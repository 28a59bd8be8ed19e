use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: String,
    pub date: DateTime<Utc>,
    pub home: bool,
    pub scored: i32,
    pub conceeded: i32,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub archived: bool,
    pub competition_id: String,
    pub season_id: String,
    pub opponent_id: String,
    #[serde(default)]
    pub players: Vec<MatchPlayer>,
}

impl Match {
    pub fn player_ids(&self) -> Vec<String> {
        self.players.iter().map(|p| p.player_id.clone()).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MatchPlayer {
    pub id: String,
    pub player_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub birth_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl Player {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Age in whole years on `on`, or `None` when the birth date is unknown.
    pub fn age_on(&self, on: DateTime<Utc>) -> Option<u32> {
        let birth = self.birth_date?;
        let mut age = on.year() - birth.year();
        if (on.month(), on.day()) < (birth.month(), birth.day()) {
            age -= 1;
        }
        u32::try_from(age).ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub id: String,
    pub match_id: String,
    #[serde(default)]
    pub player_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    pub quantity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Season {
    pub id: String,
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub players: Vec<SeasonPlayer>,
}

impl Season {
    pub fn includes_player(&self, player_id: &str) -> bool {
        self.players.iter().any(|p| p.player_id == player_id)
    }

    /// Two-digit "start/end" label, e.g. "24/25".
    pub fn label(&self) -> String {
        let year = self.start_date.year();
        format!("{:02}/{:02}", year.rem_euclid(100), (year + 1).rem_euclid(100))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SeasonPlayer {
    #[serde(default)]
    pub id: Option<String>,
    pub player_id: String,
    #[serde(default)]
    pub player: Option<SquadPlayer>,
}

/// The slim player shape returned with season rosters and used by the squad editor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct SquadPlayer {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
}

impl SquadPlayer {
    /// "F. Last", as shown in the squad diff preview.
    pub fn short_name(&self) -> String {
        match self.first_name.chars().next() {
            Some(initial) => format!("{}. {}", initial, self.last_name),
            None => self.last_name.clone(),
        }
    }
}

impl From<&Player> for SquadPlayer {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id.clone(),
            first_name: player.first_name.clone(),
            last_name: player.last_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Competition {
    pub id: String,
    pub name: String,
    pub abbreviation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Club {
    pub id: String,
    pub name: String,
    pub abbreviation: String,
    #[serde(default)]
    pub primary: Option<String>,
    #[serde(default)]
    pub secondary: Option<String>,
}

/// Everything the player page needs for one player and season.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSeasonData {
    pub player: Option<Player>,
    #[serde(default)]
    pub matches: Vec<Match>,
    #[serde(default)]
    pub clubs: Vec<Club>,
    #[serde(default)]
    pub competitions: Vec<Competition>,
}

/// Whose ratings feed the averages.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Who {
    #[default]
    Community,
    User,
}

impl Who {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("user") => Who::User,
            _ => Who::Community,
        }
    }
}
