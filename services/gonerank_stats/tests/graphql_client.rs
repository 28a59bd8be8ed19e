use anyhow::Result;
use mockito::{Matcher, Server, ServerGuard};
use pretty_assertions::assert_eq;
use serde_json::json;

use chrono::{TimeZone, Utc};

use gonerank_stats::{
    admin::MatchUpdate,
    config::GraphqlConfig,
    error::BoundaryError,
    graphql::GraphqlClient,
    metrics::MetricsCollector,
    source::{MatchAdmin, SquadMutation, StatsSource},
};

fn client(server: &ServerGuard, token: Option<&str>) -> Result<GraphqlClient> {
    let config = GraphqlConfig {
        endpoint: format!("{}/api/graphql", server.url()),
        request_timeout_secs: 5,
        auth_token: token.map(str::to_string),
        ..Default::default()
    };
    Ok(GraphqlClient::new(&config, MetricsCollector::new())?)
}

#[tokio::test]
async fn test_fetches_seasons() -> Result<()> {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/graphql")
        .match_body(Matcher::PartialJson(json!({ "operationName": "GetSeasons" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "data": {
                    "seasons": [
                        {
                            "id": "s22",
                            "startDate": "2022-07-01T00:00:00Z",
                            "players": [{ "playerId": "p1" }]
                        }
                    ]
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = client(&server, None)?;
    let seasons = client.seasons().await?;

    mock.assert_async().await;
    assert_eq!(seasons.len(), 1);
    assert_eq!(seasons[0].label(), "22/23");
    assert!(seasons[0].includes_player("p1"));

    let metrics = client.metrics().get_metrics();
    assert_eq!(metrics.total_requests, 1);
    assert_eq!(metrics.successful_requests, 1);
    Ok(())
}

#[tokio::test]
async fn test_missing_match_is_not_found() -> Result<()> {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/graphql")
        .match_body(Matcher::PartialJson(json!({ "variables": { "id": "m404" } })))
        .with_status(200)
        .with_body(r#"{ "data": { "match": null } }"#)
        .create_async()
        .await;

    let client = client(&server, None)?;
    let err = client.match_by_id("m404").await.unwrap_err();
    assert_eq!(err, BoundaryError::NotFound("match m404".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_graphql_errors_and_bad_status() -> Result<()> {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/graphql")
        .match_body(Matcher::PartialJson(json!({ "operationName": "SeasonRatings" })))
        .with_status(200)
        .with_body(r#"{ "data": null, "errors": [{ "message": "Season not found" }] }"#)
        .create_async()
        .await;
    server
        .mock("POST", "/api/graphql")
        .match_body(Matcher::PartialJson(json!({ "operationName": "GetSeasons" })))
        .with_status(503)
        .with_body("maintenance")
        .create_async()
        .await;

    let client = client(&server, None)?;

    let err = client.season_ratings("s99").await.unwrap_err();
    assert_eq!(err, BoundaryError::Graphql("Season not found".to_string()));

    let err = client.seasons().await.unwrap_err();
    assert_eq!(
        err,
        BoundaryError::Status {
            status: 503,
            message: "maintenance".to_string()
        }
    );

    let metrics = client.metrics().get_metrics();
    assert_eq!(metrics.failed_requests, 2);
    assert!(metrics.last_error.is_some());
    Ok(())
}

#[tokio::test]
async fn test_update_match_players_sends_token_and_ids() -> Result<()> {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/graphql")
        .match_header("authorization", "Bearer s3cret")
        .match_body(Matcher::PartialJson(json!({
            "operationName": "UpdateMatchPlayers",
            "variables": { "matchId": "m1", "playerIds": ["p2", "p3"] }
        })))
        .with_status(200)
        .with_body(r#"{ "data": { "updateMatchPlayers": { "id": "m1" } } }"#)
        .create_async()
        .await;

    let client = client(&server, Some("s3cret"))?;
    client
        .update_match_players("m1", &["p2".to_string(), "p3".to_string()])
        .await?;

    mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_update_match_sends_form_fields() -> Result<()> {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/graphql")
        .match_header("authorization", "Bearer s3cret")
        .match_body(Matcher::PartialJson(json!({
            "operationName": "UpdateMatch",
            "variables": {
                "id": "m1",
                "data": { "scored": 3, "conceeded": 0, "competitionId": "cdf", "home": false }
            }
        })))
        .with_status(200)
        .with_body(
            json!({
                "data": {
                    "updateMatch": {
                        "id": "m1",
                        "date": "2023-03-04T21:00:00Z",
                        "home": false,
                        "scored": 3,
                        "conceeded": 0,
                        "competitionId": "cdf",
                        "seasonId": "s22",
                        "opponentId": "fcn",
                        "players": []
                    }
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let update = MatchUpdate {
        date: Utc.with_ymd_and_hms(2023, 3, 4, 21, 0, 0).unwrap(),
        home: false,
        scored: 3,
        conceeded: 0,
        competition_id: "cdf".to_string(),
        season_id: "s22".to_string(),
        opponent_id: "fcn".to_string(),
    };
    let client = client(&server, Some("s3cret"))?;
    let updated = client.update_match("m1", &update).await?;

    mock.assert_async().await;
    assert_eq!(updated.competition_id, "cdf");
    assert_eq!(updated.scored, 3);
    Ok(())
}

#[tokio::test]
async fn test_delete_season() -> Result<()> {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/graphql")
        .match_body(Matcher::PartialJson(json!({
            "operationName": "DeleteSeason",
            "variables": { "id": "s21" }
        })))
        .with_status(200)
        .with_body(r#"{ "data": { "deleteSeason": { "id": "s21" } } }"#)
        .create_async()
        .await;
    server
        .mock("POST", "/api/graphql")
        .match_body(Matcher::PartialJson(json!({ "variables": { "id": "s99" } })))
        .with_status(200)
        .with_body(r#"{ "data": { "deleteSeason": null } }"#)
        .create_async()
        .await;

    let client = client(&server, None)?;
    assert_eq!(client.delete_season("s21").await?, "s21");
    match client.delete_season("s99").await {
        Err(BoundaryError::NotFound(what)) => assert_eq!(what, "season s99"),
        other => panic!("expected NotFound, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_season_data_flattens_roster() -> Result<()> {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/graphql")
        .with_status(200)
        .with_body(
            json!({
                "data": {
                    "matches": [{
                        "id": "m1",
                        "date": "2023-02-05T20:00:00Z",
                        "home": true,
                        "scored": 2,
                        "conceeded": 1,
                        "competitionId": "l1",
                        "seasonId": "s22",
                        "opponentId": "fcn",
                        "players": [{ "id": "mp1", "playerId": "p1" }]
                    }],
                    "competitions": [{ "id": "l1", "name": "Ligue 1", "abbreviation": "L1" }],
                    "seasonPlayers": [
                        { "playerId": "p1", "player": { "id": "p1", "firstName": "Alexandre", "lastName": "Lacazette" } },
                        { "playerId": "p9", "player": null }
                    ]
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = client(&server, None)?;
    let data = client.season_data("s22").await?;

    assert_eq!(data.matches.len(), 1);
    assert_eq!(data.matches[0].conceeded, 1);
    assert_eq!(data.matches[0].player_ids(), vec!["p1".to_string()]);
    assert!(data.clubs.is_empty());
    assert_eq!(data.players.len(), 1);
    assert_eq!(data.players[0].short_name(), "A. Lacazette");
    Ok(())
}
