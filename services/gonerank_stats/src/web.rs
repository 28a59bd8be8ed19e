use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{delete, get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use tokio::sync::{oneshot, Mutex, OwnedMutexGuard};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::{
    admin::{season_rows, MatchUpdate, SeasonRow},
    charts::{format_players_chart, player_chart_inputs, DisplayLookup, PlayersChart},
    error::{BoundaryError, SquadError},
    match_filter::{filter_matches, CompetitionFilter},
    metrics::MetricsCollector,
    player_stats::{effective_who, load_player_stats, PlayerSeasonView, PlayerStatsRequest},
    source::{MatchAdmin, SquadMutation, StatsSource},
    squad::{SquadDiff, SquadEditor, SquadState},
    types::{Match, SquadPlayer, Who},
    utils::split_ids,
};

/// Header set by the session layer in front of the service.
pub const VIEWER_HEADER: &str = "x-viewer-id";

/// Sessions kept before idle ones start being pruned.
pub const DEFAULT_SQUAD_CAPACITY: usize = 64;

const MAX_SESSION_ATTEMPTS: usize = 3;

/// One admin's squad edit for a match, with the season roster to pick from.
#[derive(Debug, Clone)]
pub struct SquadSession {
    pub editor: SquadEditor,
    pub season_players: Vec<SquadPlayer>,
    /// Set when the session is pruned. Holders of a stale handle must reload.
    pub closed: bool,
}

pub type SharedSession = Arc<Mutex<SquadSession>>;

#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn StatsSource>,
    pub mutation: Arc<dyn SquadMutation>,
    pub admin: Arc<dyn MatchAdmin>,
    pub metrics: MetricsCollector,
    /// One lock per match, so a slow commit only holds up its own match.
    pub squads: Arc<Mutex<HashMap<String, SharedSession>>>,
    /// Bumped every time sessions are pruned.
    pub squad_evictions: Arc<AtomicU64>,
    pub squad_capacity: usize,
}

impl AppState {
    pub fn new(
        source: Arc<dyn StatsSource>,
        mutation: Arc<dyn SquadMutation>,
        admin: Arc<dyn MatchAdmin>,
        metrics: MetricsCollector,
    ) -> Self {
        Self {
            source,
            mutation,
            admin,
            metrics,
            squads: Arc::new(Mutex::new(HashMap::new())),
            squad_evictions: Arc::new(AtomicU64::new(0)),
            squad_capacity: DEFAULT_SQUAD_CAPACITY,
        }
    }

    pub fn with_squad_capacity(mut self, capacity: usize) -> Self {
        self.squad_capacity = capacity;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Boundary(#[from] BoundaryError),
    #[error(transparent)]
    Squad(#[from] SquadError),
    #[error("Unknown player {0}")]
    UnknownPlayer(String),
    #[error("Invalid input: {0}")]
    Invalid(String),
    #[error("Squad of match {0} is busy, try again")]
    Contended(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Boundary(BoundaryError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Boundary(_) => StatusCode::BAD_GATEWAY,
            ApiError::Squad(SquadError::Boundary(BoundaryError::NotFound(_))) => StatusCode::NOT_FOUND,
            ApiError::Squad(SquadError::Boundary(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Squad(_) => StatusCode::CONFLICT,
            ApiError::UnknownPlayer(_) => StatusCode::NOT_FOUND,
            ApiError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Contended(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

fn viewer_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(VIEWER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsParams {
    pub season: Option<String>,
    pub competition: Option<String>,
    pub who: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChartParams {
    pub season: Option<String>,
    pub competition: Option<String>,
    pub who: Option<String>,
    pub shown: Option<String>,
    pub highlight: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineStyle {
    pub id: String,
    pub stroke: Option<String>,
    pub label_background: Option<String>,
    pub dot: bool,
    pub hidden: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartResponse {
    pub season_id: Option<String>,
    pub competition: CompetitionFilter,
    pub who: Who,
    pub has_data: bool,
    pub chart: PlayersChart,
    pub list_order: Vec<String>,
    pub lines: Vec<LineStyle>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SquadView {
    pub match_id: String,
    pub state: SquadState,
    pub squad: Vec<SquadPlayer>,
    pub diff: SquadDiff,
    pub preview: String,
    pub available: Vec<SquadPlayer>,
}

impl From<&SquadSession> for SquadView {
    fn from(session: &SquadSession) -> Self {
        let diff = session.editor.diff();
        Self {
            match_id: session.editor.match_id().to_string(),
            state: session.editor.state(),
            squad: session.editor.squad().to_vec(),
            preview: diff.preview(),
            diff,
            available: session
                .editor
                .available(&session.season_players)
                .into_iter()
                .cloned()
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SquadPlayerBody {
    pub player_id: String,
}

pub async fn index_handler(State(state): State<AppState>) -> Html<String> {
    let metrics = state.metrics.get_metrics();
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8" />
    <title>Gonerank Stats</title>
</head>
<body>
    <h1>Gonerank Stats</h1>
    <p>Upstream requests: {} ({} ok, {} failed)</p>
    <p>Avg response time: {:.2}ms</p>
    <p>Last error: {}</p>
</body>
</html>"#,
        metrics.total_requests,
        metrics.successful_requests,
        metrics.failed_requests,
        metrics.avg_response_time_ms,
        metrics
            .last_error
            .as_ref()
            .map_or_else(|| "none".to_string(), |e| format!("{} ({})", e.message, e.operation)),
    ))
}

pub async fn health_handler() -> &'static str {
    "ok"
}

#[axum::debug_handler]
pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.get_metrics())
}

#[axum::debug_handler]
pub async fn player_stats_handler(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
    Query(params): Query<StatsParams>,
    headers: HeaderMap,
) -> Result<Json<PlayerSeasonView>, ApiError> {
    let request = PlayerStatsRequest {
        player_id,
        season_id: params.season,
        competition: CompetitionFilter::parse(params.competition.as_deref()),
        who: Who::parse(params.who.as_deref()),
        viewer_id: viewer_id(&headers),
    };
    let view = load_player_stats(state.source.as_ref(), &request).await?;
    Ok(Json(view))
}

#[axum::debug_handler]
pub async fn players_chart_handler(
    State(state): State<AppState>,
    Query(params): Query<ChartParams>,
    headers: HeaderMap,
) -> Result<Json<ChartResponse>, ApiError> {
    let viewer = viewer_id(&headers);
    let who = effective_who(Who::parse(params.who.as_deref()), viewer.as_deref());

    let season_id = match params.season.filter(|s| !s.is_empty()) {
        Some(id) => Some(id),
        None => state
            .source
            .seasons()
            .await?
            .into_iter()
            .max_by_key(|s| s.start_date)
            .map(|s| s.id),
    };
    let Some(season_id) = season_id else {
        return Ok(Json(ChartResponse {
            season_id: None,
            competition: CompetitionFilter::All,
            who,
            has_data: false,
            chart: format_players_chart(&[], DisplayLookup::new(&[], &[]), &[]),
            list_order: Vec::new(),
            lines: Vec::new(),
        }));
    };

    let (data, ratings) = tokio::try_join!(
        state.source.season_data(&season_id),
        state.source.season_ratings(&season_id),
    )?;

    let competition = CompetitionFilter::parse(params.competition.as_deref()).resolve(&data.competitions);
    let matches = filter_matches(&data.matches, &competition, Some(&season_id));
    let inputs = player_chart_inputs(&data.players, &matches, &ratings, who, viewer.as_deref());
    let shown = split_ids(params.shown.as_deref());
    let chart = format_players_chart(
        &inputs,
        DisplayLookup::new(&data.clubs, &data.competitions),
        &shown,
    );

    let highlight = params.highlight.as_deref();
    let list_order = chart.list_order().iter().map(|s| s.id.clone()).collect();
    let lines = chart
        .chart_order()
        .iter()
        .map(|s| LineStyle {
            id: s.id.clone(),
            stroke: s.stroke(highlight),
            label_background: s.label_background(),
            dot: highlight.map_or(true, |h| h == s.id),
            hidden: !s.is_shown(),
        })
        .collect();

    Ok(Json(ChartResponse {
        season_id: Some(season_id),
        competition,
        who,
        has_data: chart.domain.is_some(),
        list_order,
        lines,
        chart,
    }))
}

/// Fetch the server squad of a match, resolved against the season roster.
async fn fetch_squad(state: &AppState, match_id: &str) -> Result<(SquadEditor, Vec<SquadPlayer>), ApiError> {
    let game = state.source.match_by_id(match_id).await?;
    let season_players = state.source.season_players(&game.season_id).await?;

    let squad: Vec<SquadPlayer> = game
        .players
        .iter()
        .filter_map(|mp| {
            let found = season_players.iter().find(|sp| sp.id == mp.player_id).cloned();
            if found.is_none() {
                warn!(
                    "Player {} of match {} is not registered in season {}",
                    mp.player_id, match_id, game.season_id
                );
            }
            found
        })
        .collect();

    Ok((SquadEditor::new(match_id, squad, game.archived), season_players))
}

/// Close `session` if nobody holds it and no edit is in progress.
fn close_if_idle(session: &SharedSession) -> bool {
    match session.try_lock() {
        Ok(mut s) if s.editor.state() == SquadState::Viewing => {
            s.closed = true;
            true
        }
        _ => false,
    }
}

/// Drop idle sessions once the registry outgrows its capacity. Sessions being
/// edited always stay.
fn prune_idle(squads: &mut HashMap<String, SharedSession>, keep: &str, capacity: usize, evictions: &AtomicU64) {
    if squads.len() <= capacity {
        return;
    }
    let before = squads.len();
    squads.retain(|id, session| id == keep || !close_if_idle(session));
    let pruned = before - squads.len();
    if pruned > 0 {
        evictions.fetch_add(1, Ordering::SeqCst);
        debug!("Pruned {} idle squad sessions", pruned);
    }
}

/// Load the squad session, creating it on first use.
///
/// The server squad is fetched without holding any lock. It only replaces an
/// existing session if that session did not change while the fetch was in
/// flight, and never while it is being edited.
async fn load_session(state: &AppState, match_id: &str) -> Result<SquadView, ApiError> {
    for _ in 0..MAX_SESSION_ATTEMPTS {
        let evictions = state.squad_evictions.load(Ordering::SeqCst);
        let existing = state.squads.lock().await.get(match_id).cloned();
        let seen = match existing {
            Some(session) => {
                let generation = session.lock().await.editor.generation();
                Some((session, generation))
            }
            None => None,
        };

        let (fresh, season_players) = fetch_squad(state, match_id).await?;

        if let Some((session, generation)) = seen {
            let mut session = session.lock().await;
            if session.closed {
                continue;
            }
            if session.editor.generation() != generation {
                debug!("Squad of match {} changed during refetch, keeping it", match_id);
            } else if session
                .editor
                .refresh(fresh.initial_squad().to_vec(), fresh.is_archived())
            {
                session.season_players = season_players;
            }
            return Ok(SquadView::from(&*session));
        }

        let mut squads = state.squads.lock().await;
        if let Some(session) = squads.get(match_id).cloned() {
            drop(squads);
            let session = session.lock().await;
            if session.closed {
                continue;
            }
            return Ok(SquadView::from(&*session));
        }
        if state.squad_evictions.load(Ordering::SeqCst) != evictions {
            debug!("Sessions pruned during refetch of match {}, fetching again", match_id);
            continue;
        }

        let session = SquadSession {
            editor: fresh,
            season_players,
            closed: false,
        };
        let view = SquadView::from(&session);
        squads.insert(match_id.to_string(), Arc::new(Mutex::new(session)));
        prune_idle(&mut squads, match_id, state.squad_capacity, &state.squad_evictions);
        return Ok(view);
    }
    Err(ApiError::Contended(match_id.to_string()))
}

/// Lock the session of a match, loading it first if needed.
async fn lock_session(state: &AppState, match_id: &str) -> Result<OwnedMutexGuard<SquadSession>, ApiError> {
    for _ in 0..MAX_SESSION_ATTEMPTS {
        let existing = state.squads.lock().await.get(match_id).cloned();
        match existing {
            Some(session) => {
                let guard = session.lock_owned().await;
                if !guard.closed {
                    return Ok(guard);
                }
            }
            None => {
                load_session(state, match_id).await?;
            }
        }
    }
    Err(ApiError::Contended(match_id.to_string()))
}

/// Forget an idle session so the next load sees the updated match.
async fn drop_idle_session(state: &AppState, match_id: &str) {
    let mut squads = state.squads.lock().await;
    let idle = squads.get(match_id).map_or(false, close_if_idle);
    if idle {
        squads.remove(match_id);
        state.squad_evictions.fetch_add(1, Ordering::SeqCst);
    }
}

#[axum::debug_handler]
pub async fn squad_handler(
    State(state): State<AppState>,
    Path(match_id): Path<String>,
) -> Result<Json<SquadView>, ApiError> {
    Ok(Json(load_session(&state, &match_id).await?))
}

#[axum::debug_handler]
pub async fn squad_add_handler(
    State(state): State<AppState>,
    Path(match_id): Path<String>,
    Json(body): Json<SquadPlayerBody>,
) -> Result<Json<SquadView>, ApiError> {
    let mut session = lock_session(&state, &match_id).await?;

    let player = session
        .season_players
        .iter()
        .find(|p| p.id == body.player_id)
        .cloned()
        .ok_or_else(|| ApiError::UnknownPlayer(body.player_id.clone()))?;
    session.editor.add(player)?;
    Ok(Json(SquadView::from(&*session)))
}

#[axum::debug_handler]
pub async fn squad_remove_handler(
    State(state): State<AppState>,
    Path(match_id): Path<String>,
    Json(body): Json<SquadPlayerBody>,
) -> Result<Json<SquadView>, ApiError> {
    let mut session = lock_session(&state, &match_id).await?;

    session.editor.remove(&body.player_id)?;
    Ok(Json(SquadView::from(&*session)))
}

#[axum::debug_handler]
pub async fn squad_cancel_handler(
    State(state): State<AppState>,
    Path(match_id): Path<String>,
) -> Result<Json<SquadView>, ApiError> {
    let mut session = lock_session(&state, &match_id).await?;

    session.editor.cancel();
    Ok(Json(SquadView::from(&*session)))
}

#[axum::debug_handler]
pub async fn squad_commit_handler(
    State(state): State<AppState>,
    Path(match_id): Path<String>,
) -> Result<Json<SquadView>, ApiError> {
    let mut session = lock_session(&state, &match_id).await?;

    session.editor.commit(state.mutation.as_ref()).await?;
    Ok(Json(SquadView::from(&*session)))
}

#[axum::debug_handler]
pub async fn update_match_handler(
    State(state): State<AppState>,
    Path(match_id): Path<String>,
    Json(update): Json<MatchUpdate>,
) -> Result<Json<Match>, ApiError> {
    update.validate().map_err(ApiError::Invalid)?;
    let updated = state.admin.update_match(&match_id, &update).await?;
    drop_idle_session(&state, &match_id).await;
    info!("Updated match {}", match_id);
    Ok(Json(updated))
}

#[axum::debug_handler]
pub async fn admin_seasons_handler(State(state): State<AppState>) -> Result<Json<Vec<SeasonRow>>, ApiError> {
    let seasons = state.source.seasons().await?;
    Ok(Json(season_rows(&seasons)))
}

#[axum::debug_handler]
pub async fn delete_season_handler(
    State(state): State<AppState>,
    Path(season_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = state.admin.delete_season(&season_id).await?;
    info!("Deleted season {}", id);
    Ok(Json(json!({ "id": id })))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/players/chart", get(players_chart_handler))
        .route("/players/{player_id}/stats", get(player_stats_handler))
        .route("/admin/matches/{match_id}", put(update_match_handler))
        .route("/admin/seasons", get(admin_seasons_handler))
        .route("/admin/seasons/{season_id}", delete(delete_season_handler))
        .route("/admin/matches/{match_id}/squad", get(squad_handler))
        .route("/admin/matches/{match_id}/squad/add", post(squad_add_handler))
        .route("/admin/matches/{match_id}/squad/remove", post(squad_remove_handler))
        .route("/admin/matches/{match_id}/squad/cancel", post(squad_cancel_handler))
        .route("/admin/matches/{match_id}/squad/commit", post(squad_commit_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` fires.
pub async fn serve(state: AppState, addr: SocketAddr, shutdown: oneshot::Receiver<()>) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Web interface available at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown.await;
        })
        .await?;
    Ok(())
}
