// HTTP API routes: one POST webhook per game action, plus status endpoints.

use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, FromRef, Json, MatchedPath, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::auth::{WebhookAuth, WebhookSecret};
use crate::engine::error::GameError;
use crate::engine::guild::summary_text;
use crate::engine::model::MonsterRef;
use crate::engine::Engine;
use crate::metrics;

// ── Request types ─────────────────────────────────────────────────────
//
// Every field is optional at the serde level so that a missing field turns
// into a descriptive rejection instead of a generic body error.

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRequest {
    pub player_id: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnRequest {
    pub player_id: Option<Value>,
    pub description: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonsterRequest {
    pub player_id: Option<Value>,
    pub monster_index: Option<Value>,
    pub monster_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    pub player_id: Option<Value>,
    pub index1: Option<Value>,
    pub index2: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGuildRequest {
    pub player_id: Option<Value>,
    pub name: Option<String>,
    pub join_requirement: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGuildRequest {
    pub player_id: Option<Value>,
    pub guild_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KickRequest {
    pub player_id: Option<Value>,
    pub target_id: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRequest {
    pub player_id: Option<Value>,
    pub amount: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopRequest {
    pub player_id: Option<Value>,
    pub buy_item: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildInfoRequest {
    pub player_id: Option<Value>,
    pub guild_name: Option<String>,
}

// ── Shared application state ─────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub webhook_secret: WebhookSecret,
}

impl FromRef<AppState> for WebhookSecret {
    fn from_ref(state: &AppState) -> Self {
        state.webhook_secret.clone()
    }
}

// ── Error helper ──────────────────────────────────────────────────────

/// Error kind attached to rejected responses so the metrics layer can
/// label them.
#[derive(Clone, Copy)]
struct ErrorKind(&'static str);

pub struct ApiError(GameError);

impl From<GameError> for ApiError {
    fn from(e: GameError) -> Self {
        ApiError(e)
    }
}

/// Game rejections are answered with 200 so webhook blocks still relay the
/// reason to the player; the `error` field tells them apart from success.
/// Only storage failures are hard failures.
pub fn status_for(err: &GameError) -> StatusCode {
    match err {
        GameError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::OK,
    }
}

fn json_error(status: StatusCode, kind: &'static str, msg: &str) -> Response {
    let mut response = (status, Json(json!({ "error": kind, "text": msg }))).into_response();
    response.extensions_mut().insert(ErrorKind(kind));
    response
}

fn internal_error(e: &GameError) -> Response {
    tracing::error!("Database error: {e}");
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        e.kind(),
        "⚠️ The rift is unstable right now. Try again shortly.",
    )
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        if matches!(err, GameError::Storage(_)) {
            return internal_error(&err);
        }
        let prefix = match err {
            GameError::CooldownActive { .. } | GameError::RateLimited(_) => "⏳",
            _ => "❌",
        };
        json_error(status_for(&err), err.kind(), &format!("{prefix} {err}"))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(GameError::InvalidRequest(format!(
            "request body must be a JSON object: {}",
            rejection.body_text()
        )))
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

/// Success body: the outcome's fields plus a `text` summary.
fn reply<T: Serialize>(text: String, outcome: &T) -> Json<Value> {
    let mut body = match serde_json::to_value(outcome) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    body.insert("text".to_string(), Value::String(text));
    Json(Value::Object(body))
}

// ── Field parsing ─────────────────────────────────────────────────────

/// Accept a string or a number (Discord ids often arrive unquoted).
fn id_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn require_player(value: Option<&Value>) -> Result<String, GameError> {
    id_field(value).ok_or_else(|| GameError::InvalidRequest("playerId is required".into()))
}

fn int_field(value: Option<&Value>, field: &str) -> Result<Option<i64>, GameError> {
    let invalid = || GameError::InvalidRequest(format!("{field} must be a whole number"));
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_i64().map(Some).ok_or_else(invalid),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s.trim().parse().map(Some).map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}

/// A monster selection: a 1-based position (number or numeric string) or a
/// monster id.
fn selection(value: Option<&Value>, field: &str) -> Result<MonsterRef, GameError> {
    let missing = || GameError::InvalidSelection(format!("{field} is required"));
    match value {
        None | Some(Value::Null) => Err(missing()),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|i| MonsterRef::Index(i as usize))
            .ok_or_else(|| GameError::InvalidSelection(format!("{field} must be 1 or more"))),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                Err(missing())
            } else if let Ok(i) = s.parse::<usize>() {
                Ok(MonsterRef::Index(i))
            } else {
                Ok(MonsterRef::Id(s.to_string()))
            }
        }
        Some(_) => Err(GameError::InvalidSelection(format!(
            "{field} must be a number or a monster id"
        ))),
    }
}

fn monster_selection(req: &MonsterRequest) -> Result<MonsterRef, GameError> {
    match req.monster_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => Ok(MonsterRef::Id(id.to_string())),
        _ => selection(req.monster_index.as_ref(), "monsterIndex"),
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn router(engine: Engine, webhook_secret: WebhookSecret) -> Router {
    metrics::register_metrics();
    let state = AppState {
        engine,
        webhook_secret,
    };

    Router::new()
        // Monsters
        .route("/spawn", post(spawn))
        .route("/collection", post(collection))
        .route("/claim", post(claim))
        .route("/battle", post(battle))
        .route("/evolve", post(evolve))
        .route("/merge", post(merge))
        // World boss
        .route("/raid", post(raid))
        .route("/boss", get(boss))
        // Guilds
        .route("/guild/create", post(guild_create))
        .route("/guild/join", post(guild_join))
        .route("/guild/kick", post(guild_kick))
        .route("/guild/leave", post(guild_leave))
        .route("/guild/disband", post(guild_disband))
        .route("/guild/deposit", post(guild_deposit))
        .route("/guild/shop", post(guild_shop))
        .route("/guild/info", post(guild_info))
        .route_layer(middleware::from_fn(track_action))
        // Service
        .route("/health", get(health_check))
        .route("/metrics", get(get_metrics))
        .route("/llms.txt", get(get_llms_txt))
        .with_state(state)
}

/// Count every action by outcome and time it.
async fn track_action(req: Request, next: Next) -> Response {
    let action = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().trim_start_matches('/').replace('/', "_"))
        .unwrap_or_else(|| "unknown".to_string());
    let started = Instant::now();

    let response = next.run(req).await;

    let outcome = match response.extensions().get::<ErrorKind>() {
        Some(kind) => kind.0,
        None if response.status().is_success() => "ok",
        // Auth rejections carry no kind
        None => "rejected",
    };
    metrics::ACTIONS_TOTAL
        .with_label_values(&[action.as_str(), outcome])
        .inc();
    metrics::API_REQUEST_DURATION_SECONDS
        .with_label_values(&[action.as_str()])
        .observe(started.elapsed().as_secs_f64());
    response
}

// ── Monster handlers ──────────────────────────────────────────────────

async fn spawn(
    State(state): State<AppState>,
    _auth: WebhookAuth,
    payload: Result<Json<SpawnRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let player_id = require_player(req.player_id.as_ref())?;
    let outcome = state
        .engine
        .spawn(&player_id, req.description.as_deref().unwrap_or(""))
        .await?;
    Ok(reply(outcome.text(), &outcome))
}

async fn collection(
    State(state): State<AppState>,
    _auth: WebhookAuth,
    payload: Result<Json<PlayerRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let player_id = require_player(req.player_id.as_ref())?;
    let view = state.engine.collection(&player_id).await?;
    Ok(reply(view.text(), &view))
}

async fn claim(
    State(state): State<AppState>,
    _auth: WebhookAuth,
    payload: Result<Json<PlayerRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let player_id = require_player(req.player_id.as_ref())?;
    let outcome = state.engine.claim(&player_id).await?;
    Ok(reply(outcome.text(), &outcome))
}

async fn battle(
    State(state): State<AppState>,
    _auth: WebhookAuth,
    payload: Result<Json<MonsterRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let player_id = require_player(req.player_id.as_ref())?;
    let pick = monster_selection(&req)?;
    let outcome = state.engine.battle(&player_id, &pick).await?;
    Ok(reply(outcome.text(), &outcome))
}

async fn evolve(
    State(state): State<AppState>,
    _auth: WebhookAuth,
    payload: Result<Json<MonsterRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let player_id = require_player(req.player_id.as_ref())?;
    let pick = monster_selection(&req)?;
    let outcome = state.engine.evolve(&player_id, &pick).await?;
    Ok(reply(outcome.text(), &outcome))
}

async fn merge(
    State(state): State<AppState>,
    _auth: WebhookAuth,
    payload: Result<Json<MergeRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let player_id = require_player(req.player_id.as_ref())?;
    let first = selection(req.index1.as_ref(), "index1")?;
    let second = selection(req.index2.as_ref(), "index2")?;
    let outcome = state.engine.merge(&player_id, &first, &second).await?;
    Ok(reply(outcome.text(), &outcome))
}

// ── World boss handlers ───────────────────────────────────────────────

async fn raid(
    State(state): State<AppState>,
    _auth: WebhookAuth,
    payload: Result<Json<MonsterRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let player_id = require_player(req.player_id.as_ref())?;
    let pick = monster_selection(&req)?;
    let outcome = state.engine.raid(&player_id, &pick).await?;
    Ok(reply(outcome.text(), &outcome))
}

async fn boss(State(state): State<AppState>) -> ApiResult {
    let status = state.engine.boss_status().await?;
    Ok(reply(status.text(), &status))
}

// ── Guild handlers ────────────────────────────────────────────────────

async fn guild_create(
    State(state): State<AppState>,
    _auth: WebhookAuth,
    payload: Result<Json<CreateGuildRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let player_id = require_player(req.player_id.as_ref())?;
    let requirement = int_field(req.join_requirement.as_ref(), "joinRequirement")?.unwrap_or(0);
    let summary = state
        .engine
        .create_guild(&player_id, req.name.as_deref().unwrap_or(""), requirement)
        .await?;
    let text = format!("🎉 Guild founded!\n\n{}", summary_text(&summary));
    Ok(reply(text, &summary))
}

async fn guild_join(
    State(state): State<AppState>,
    _auth: WebhookAuth,
    payload: Result<Json<JoinGuildRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let player_id = require_player(req.player_id.as_ref())?;
    let guild_name = req
        .guild_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| GameError::InvalidRequest("guildName is required".into()))?;
    let outcome = state.engine.join_guild(&player_id, guild_name).await?;
    Ok(reply(outcome.text(), &outcome))
}

async fn guild_kick(
    State(state): State<AppState>,
    _auth: WebhookAuth,
    payload: Result<Json<KickRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let player_id = require_player(req.player_id.as_ref())?;
    let target_id = id_field(req.target_id.as_ref())
        .ok_or_else(|| GameError::InvalidRequest("targetId is required".into()))?;
    let outcome = state.engine.kick_member(&player_id, &target_id).await?;
    Ok(reply(outcome.text(), &outcome))
}

async fn guild_leave(
    State(state): State<AppState>,
    _auth: WebhookAuth,
    payload: Result<Json<PlayerRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let player_id = require_player(req.player_id.as_ref())?;
    let outcome = state.engine.leave_guild(&player_id).await?;
    Ok(reply(outcome.text(), &outcome))
}

async fn guild_disband(
    State(state): State<AppState>,
    _auth: WebhookAuth,
    payload: Result<Json<PlayerRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let player_id = require_player(req.player_id.as_ref())?;
    let outcome = state.engine.disband_guild(&player_id).await?;
    Ok(reply(outcome.text(), &outcome))
}

async fn guild_deposit(
    State(state): State<AppState>,
    _auth: WebhookAuth,
    payload: Result<Json<DepositRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let player_id = require_player(req.player_id.as_ref())?;
    let amount = int_field(req.amount.as_ref(), "amount")?
        .ok_or_else(|| GameError::InvalidRequest("amount is required".into()))?;
    let outcome = state.engine.deposit(&player_id, amount).await?;
    Ok(reply(outcome.text(), &outcome))
}

async fn guild_shop(
    State(state): State<AppState>,
    _auth: WebhookAuth,
    payload: Result<Json<ShopRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let player_id = require_player(req.player_id.as_ref())?;
    let outcome = state
        .engine
        .shop(&player_id, req.buy_item.as_deref())
        .await?;
    Ok(reply(outcome.text(), &outcome))
}

async fn guild_info(
    State(state): State<AppState>,
    _auth: WebhookAuth,
    payload: Result<Json<GuildInfoRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let player_id = require_player(req.player_id.as_ref())?;
    let summary = state
        .engine
        .guild_info(&player_id, req.guild_name.as_deref())
        .await?;
    Ok(reply(summary_text(&summary), &summary))
}

// ── Service handlers ──────────────────────────────────────────────────

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "rift-backend" }))
}

async fn get_metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        metrics::gather_metrics(),
    )
}

async fn get_llms_txt() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        crate::llms_txt::LLMS_TXT,
    )
        .into_response()
}
