use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    admin::MatchUpdate,
    error::BoundaryError,
    types::{Club, Competition, Match, PlayerSeasonData, Rating, Season, SquadPlayer},
};

/// Everything played in one season, for the multi player views.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeasonData {
    #[serde(default)]
    pub matches: Vec<Match>,
    #[serde(default)]
    pub clubs: Vec<Club>,
    #[serde(default)]
    pub competitions: Vec<Competition>,
    #[serde(default)]
    pub players: Vec<SquadPlayer>,
}

/// Read side of the GraphQL API.
#[async_trait]
pub trait StatsSource: Send + Sync {
    async fn seasons(&self) -> Result<Vec<Season>, BoundaryError>;

    /// Archived matches of `season_id` plus the player and display metadata.
    async fn player_season_data(
        &self,
        player_id: &str,
        season_id: &str,
    ) -> Result<PlayerSeasonData, BoundaryError>;

    async fn player_season_ratings(
        &self,
        player_id: &str,
        season_id: &str,
    ) -> Result<Vec<Rating>, BoundaryError>;

    async fn season_data(&self, season_id: &str) -> Result<SeasonData, BoundaryError>;

    async fn season_ratings(&self, season_id: &str) -> Result<Vec<Rating>, BoundaryError>;

    async fn match_by_id(&self, match_id: &str) -> Result<Match, BoundaryError>;

    async fn season_players(&self, season_id: &str) -> Result<Vec<SquadPlayer>, BoundaryError>;
}

/// Write side used by the squad editor.
#[async_trait]
pub trait SquadMutation: Send + Sync {
    async fn update_match_players(
        &self,
        match_id: &str,
        player_ids: &[String],
    ) -> Result<(), BoundaryError>;
}

/// Admin writes outside the squad editor.
#[async_trait]
pub trait MatchAdmin: Send + Sync {
    async fn update_match(&self, match_id: &str, update: &MatchUpdate) -> Result<Match, BoundaryError>;

    /// Returns the id of the deleted season.
    async fn delete_season(&self, season_id: &str) -> Result<String, BoundaryError>;
}
