use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error};

use crate::{
    admin::MatchUpdate,
    config::GraphqlConfig,
    error::BoundaryError,
    metrics::MetricsCollector,
    source::{MatchAdmin, SeasonData, SquadMutation, StatsSource},
    types::{Match, PlayerSeasonData, Rating, Season, SeasonPlayer, SquadPlayer},
};

const MATCH_FIELDS: &str = r#"
    id
    date
    home
    scored
    conceeded
    active
    archived
    competitionId
    seasonId
    opponentId
    players {
      id
      playerId
    }
"#;

const CLUB_FIELDS: &str = "id name abbreviation primary secondary";
const COMPETITION_FIELDS: &str = "id name abbreviation";
const RATING_FIELDS: &str = "id matchId playerId userId quantity";

fn get_seasons_query() -> String {
    r#"query GetSeasons {
  seasons {
    id
    startDate
    players {
      id
      playerId
    }
  }
}"#
    .to_string()
}

fn get_match_query() -> String {
    format!(
        "query GetMatch($id: String!) {{\n  match(id: $id) {{{}}}\n}}",
        MATCH_FIELDS
    )
}

fn player_season_data_query() -> String {
    format!(
        r#"query PlayerSeasonData($playerId: String!, $seasonId: String!, $archived: Boolean) {{
  player(id: $playerId) {{
    id
    firstName
    lastName
    birthDate
    country
    countryCode
    image
  }}
  matches(where: {{ seasonId: $seasonId, archived: $archived }}) {{{matches}}}
  clubs {{ {clubs} }}
  competitions {{ {competitions} }}
}}"#,
        matches = MATCH_FIELDS,
        clubs = CLUB_FIELDS,
        competitions = COMPETITION_FIELDS,
    )
}

fn player_season_ratings_query() -> String {
    format!(
        r#"query PlayerSeasonRatings($playerId: String!, $seasonId: String!, $archived: Boolean) {{
  ratings(where: {{ playerId: $playerId, seasonId: $seasonId, archived: $archived }}) {{ {} }}
}}"#,
        RATING_FIELDS
    )
}

fn global_season_data_query() -> String {
    format!(
        r#"query GlobalSeasonData($seasonId: String!, $archived: Boolean) {{
  matches(where: {{ seasonId: $seasonId, archived: $archived }}) {{{matches}}}
  clubs {{ {clubs} }}
  competitions {{ {competitions} }}
  seasonPlayers(where: {{ seasonId: $seasonId }}) {{
    id
    playerId
    player {{ id firstName lastName }}
  }}
}}"#,
        matches = MATCH_FIELDS,
        clubs = CLUB_FIELDS,
        competitions = COMPETITION_FIELDS,
    )
}

fn season_ratings_query() -> String {
    format!(
        r#"query SeasonRatings($seasonId: String!, $archived: Boolean) {{
  ratings(where: {{ seasonId: $seasonId, archived: $archived }}) {{ {} }}
}}"#,
        RATING_FIELDS
    )
}

fn get_season_players_query() -> String {
    r#"query GetSeasonPlayers($where: SeasonPlayersWhereInput) {
  seasonPlayers(where: $where) {
    id
    playerId
    player { id firstName lastName }
  }
}"#
    .to_string()
}

fn update_match_players_mutation() -> String {
    r#"mutation UpdateMatchPlayers($matchId: String!, $playerIds: [String!]!) {
  updateMatchPlayers(matchId: $matchId, playerIds: $playerIds) {
    id
  }
}"#
    .to_string()
}

fn update_match_mutation() -> String {
    format!(
        "mutation UpdateMatch($id: String!, $data: MatchUpdateInput!) {{\n  updateMatch(id: $id, data: $data) {{{}}}\n}}",
        MATCH_FIELDS
    )
}

fn delete_season_mutation() -> String {
    r#"mutation DeleteSeason($id: String!) {
  deleteSeason(id: $id) {
    id
  }
}"#
    .to_string()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphqlRequest<'a> {
    operation_name: &'a str,
    query: String,
    variables: Value,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlErrorMessage>,
}

#[derive(Debug, Deserialize)]
struct GraphqlErrorMessage {
    message: String,
}

#[derive(Debug, Deserialize)]
struct SeasonsData {
    seasons: Vec<Season>,
}

#[derive(Debug, Deserialize)]
struct MatchData {
    #[serde(rename = "match")]
    game: Option<Match>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateMatchData {
    update_match: Option<Match>,
}

#[derive(Debug, Deserialize)]
struct Deleted {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteSeasonData {
    delete_season: Option<Deleted>,
}

#[derive(Debug, Deserialize)]
struct RatingsData {
    ratings: Vec<Rating>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeasonPlayersData {
    season_players: Vec<SeasonPlayer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GlobalSeasonData {
    #[serde(default)]
    matches: Vec<Match>,
    #[serde(default)]
    clubs: Vec<crate::types::Club>,
    #[serde(default)]
    competitions: Vec<crate::types::Competition>,
    #[serde(default)]
    season_players: Vec<SeasonPlayer>,
}

fn roster(season_players: Vec<SeasonPlayer>) -> Vec<SquadPlayer> {
    season_players.into_iter().filter_map(|sp| sp.player).collect()
}

/// HTTP client for the Gonerank GraphQL API.
#[derive(Clone)]
pub struct GraphqlClient {
    client: Client,
    endpoint: String,
    auth_token: Option<String>,
    metrics: MetricsCollector,
}

impl GraphqlClient {
    pub fn new(config: &GraphqlConfig, metrics: MetricsCollector) -> Result<Self, BoundaryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            auth_token: config.auth_token.clone(),
            metrics,
        })
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Run one operation and decode its `data`. GraphQL `errors` win over data.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        operation: &str,
        query: String,
        variables: Value,
    ) -> Result<T, BoundaryError> {
        let tracker = self.metrics.track(operation);
        let result = self.send(operation, query, variables).await;
        match &result {
            Ok(_) => tracker.succeeded(),
            Err(e) => {
                error!("GraphQL {} failed: {}", operation, e);
                tracker.failed(e);
            }
        }
        result
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &str,
        query: String,
        variables: Value,
    ) -> Result<T, BoundaryError> {
        debug!("GraphQL {} with {}", operation, variables);
        let body = GraphqlRequest {
            operation_name: operation,
            query,
            variables,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(BoundaryError::Status {
                status: status.as_u16(),
                message: text,
            });
        }

        let parsed: GraphqlResponse<T> = serde_json::from_str(&text)?;
        if let Some(first) = parsed.errors.into_iter().next() {
            return Err(BoundaryError::Graphql(first.message));
        }
        parsed
            .data
            .ok_or_else(|| BoundaryError::Decode(format!("{} returned no data", operation)))
    }
}

#[async_trait]
impl StatsSource for GraphqlClient {
    async fn seasons(&self) -> Result<Vec<Season>, BoundaryError> {
        let data: SeasonsData = self
            .execute("GetSeasons", get_seasons_query(), json!({}))
            .await?;
        Ok(data.seasons)
    }

    async fn player_season_data(
        &self,
        player_id: &str,
        season_id: &str,
    ) -> Result<PlayerSeasonData, BoundaryError> {
        self.execute(
            "PlayerSeasonData",
            player_season_data_query(),
            json!({ "playerId": player_id, "seasonId": season_id, "archived": true }),
        )
        .await
    }

    async fn player_season_ratings(
        &self,
        player_id: &str,
        season_id: &str,
    ) -> Result<Vec<Rating>, BoundaryError> {
        let data: RatingsData = self
            .execute(
                "PlayerSeasonRatings",
                player_season_ratings_query(),
                json!({ "playerId": player_id, "seasonId": season_id, "archived": true }),
            )
            .await?;
        Ok(data.ratings)
    }

    async fn season_data(&self, season_id: &str) -> Result<SeasonData, BoundaryError> {
        let data: GlobalSeasonData = self
            .execute(
                "GlobalSeasonData",
                global_season_data_query(),
                json!({ "seasonId": season_id, "archived": true }),
            )
            .await?;
        Ok(SeasonData {
            matches: data.matches,
            clubs: data.clubs,
            competitions: data.competitions,
            players: roster(data.season_players),
        })
    }

    async fn season_ratings(&self, season_id: &str) -> Result<Vec<Rating>, BoundaryError> {
        let data: RatingsData = self
            .execute(
                "SeasonRatings",
                season_ratings_query(),
                json!({ "seasonId": season_id, "archived": true }),
            )
            .await?;
        Ok(data.ratings)
    }

    async fn match_by_id(&self, match_id: &str) -> Result<Match, BoundaryError> {
        let data: MatchData = self
            .execute("GetMatch", get_match_query(), json!({ "id": match_id }))
            .await?;
        data.game
            .ok_or_else(|| BoundaryError::NotFound(format!("match {}", match_id)))
    }

    async fn season_players(&self, season_id: &str) -> Result<Vec<SquadPlayer>, BoundaryError> {
        let data: SeasonPlayersData = self
            .execute(
                "GetSeasonPlayers",
                get_season_players_query(),
                json!({ "where": { "seasonId": season_id } }),
            )
            .await?;
        Ok(roster(data.season_players))
    }
}

#[async_trait]
impl SquadMutation for GraphqlClient {
    async fn update_match_players(
        &self,
        match_id: &str,
        player_ids: &[String],
    ) -> Result<(), BoundaryError> {
        let _: Value = self
            .execute(
                "UpdateMatchPlayers",
                update_match_players_mutation(),
                json!({ "matchId": match_id, "playerIds": player_ids }),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl MatchAdmin for GraphqlClient {
    async fn update_match(&self, match_id: &str, update: &MatchUpdate) -> Result<Match, BoundaryError> {
        let data: UpdateMatchData = self
            .execute(
                "UpdateMatch",
                update_match_mutation(),
                json!({ "id": match_id, "data": serde_json::to_value(update)? }),
            )
            .await?;
        data.update_match
            .ok_or_else(|| BoundaryError::NotFound(format!("match {}", match_id)))
    }

    async fn delete_season(&self, season_id: &str) -> Result<String, BoundaryError> {
        let data: DeleteSeasonData = self
            .execute("DeleteSeason", delete_season_mutation(), json!({ "id": season_id }))
            .await?;
        data.delete_season
            .map(|deleted| deleted.id)
            .ok_or_else(|| BoundaryError::NotFound(format!("season {}", season_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queries_embed_match_fields() {
        let query = get_match_query();
        assert!(query.starts_with("query GetMatch($id: String!)"));
        assert!(query.contains("competitionId"));
        assert!(query.contains("playerId"));

        assert!(update_match_mutation().contains("updateMatch(id: $id, data: $data)"));
        assert!(update_match_mutation().contains("opponentId"));

        let data = player_season_data_query();
        assert!(data.contains("clubs { id name abbreviation primary secondary }"));
        assert!(data.contains("conceeded"));
    }

    #[test]
    fn test_error_payload_parses() {
        let raw = r#"{ "data": null, "errors": [{ "message": "Not authorized", "path": ["updateMatchPlayers"] }] }"#;
        let parsed: GraphqlResponse<Value> = serde_json::from_str(raw).unwrap();
        assert!(parsed.data.is_none());
        assert_eq!(parsed.errors[0].message, "Not authorized");
    }

    #[test]
    fn test_roster_skips_missing_players() {
        let players = vec![
            SeasonPlayer {
                id: Some("sp1".to_string()),
                player_id: "p1".to_string(),
                player: Some(SquadPlayer {
                    id: "p1".to_string(),
                    first_name: "Anthony".to_string(),
                    last_name: "Lopes".to_string(),
                }),
            },
            SeasonPlayer {
                id: Some("sp2".to_string()),
                player_id: "p2".to_string(),
                player: None,
            },
        ];
        let squad = roster(players);
        assert_eq!(squad.len(), 1);
        assert_eq!(squad[0].last_name, "Lopes");
    }
}
