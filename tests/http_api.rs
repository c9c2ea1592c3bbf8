// HTTP surface tests: drive the router with oneshot requests.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use rift_backend::api;
use rift_backend::auth::WebhookSecret;
use rift_backend::db::Database;
use rift_backend::engine::Engine;
use rift_backend::oracle::{Oracle, ScriptedGenerator};
use rift_backend::rate_limit::RateLimiter;

async fn app_with(generator: ScriptedGenerator, secret: WebhookSecret) -> Router {
    let db = Arc::new(Database::new("sqlite::memory:").await.unwrap());
    let oracle = Oracle::new(Arc::new(generator), Duration::from_secs(1));
    let engine = Engine::with_seed(db, oracle, RateLimiter::disabled(), 3);
    api::router(engine, secret)
}

async fn test_app() -> Router {
    app_with(ScriptedGenerator::offline(), WebhookSecret::disabled()).await
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = test_app().await;
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_missing_player_id_is_rejected() {
    let app = test_app().await;
    for uri in ["/claim", "/collection", "/spawn", "/guild/leave"] {
        let (status, body) = send(&app, post(uri, json!({ "description": "x" }))).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(body["error"], "invalid_request");
        assert!(body["text"].as_str().unwrap().contains("playerId is required"));
    }
}

#[tokio::test]
async fn test_non_json_body_is_rejected() {
    let app = test_app().await;
    let req = Request::builder()
        .method("POST")
        .uri("/claim")
        .header("content-type", "application/json")
        .body(Body::from("playerId=P1"))
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn test_spawn_then_collection() {
    let app = app_with(
        ScriptedGenerator::repeating(
            r#"```json
{"name":"Emberclaw","element":"Inferno","elLore":"Born of magma","atk":"60","hp":300,"bio":"A fire lizard."}
```"#,
        ),
        WebhookSecret::disabled(),
    )
    .await;

    let (status, body) = send(
        &app,
        post("/spawn", json!({ "playerId": "P1", "description": "a fire lizard" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["monster"]["name"], "Emberclaw");
    assert_eq!(body["monster"]["atk"], 60);
    assert_eq!(body["emoji"], "🔥");
    assert_eq!(body["monster"]["rarity"], "Common");
    assert!(body["text"].as_str().unwrap().contains("Emberclaw"));

    let (status, body) = send(&app, post("/collection", json!({ "playerId": "P1" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["essence"], 1000);
    assert_eq!(body["monsters"].as_array().unwrap().len(), 1);
    assert!(body["monsters"][0]["id"].is_string());
    assert!(body["monsters"][0].get("playerId").is_none());

    // Numeric player ids are accepted too
    let (status, _) = send(&app, post("/collection", json!({ "playerId": 42 }))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_claim_cooldown_status() {
    let app = test_app().await;
    let (status, body) = send(&app, post("/claim", json!({ "playerId": "P1" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["essence"], 1500);
    assert!(body.get("error").is_none());

    let (status, body) = send(&app, post("/claim", json!({ "playerId": "P1" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error"], "cooldown_active");
    assert!(body["text"].as_str().unwrap().contains("try again in"));
}

#[tokio::test]
async fn test_battle_loss_text() {
    let app = app_with(
        ScriptedGenerator::new([
            r#"{"name":"Pebble","element":"Aura","atk":1,"hp":100}"#,
            r#"{"rivalName":"Gloomfang","narrative":"Pebble triumphs against all odds!"}"#,
        ]),
        WebhookSecret::disabled(),
    )
    .await;
    send(&app, post("/spawn", json!({ "playerId": "P1", "description": "a pebble" }))).await;

    let (status, body) = send(
        &app,
        post("/battle", json!({ "playerId": "P1", "monsterIndex": "1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["won"], false);
    assert_eq!(body["essence"], 1000);
    let text = body["text"].as_str().unwrap();
    assert!(text.contains("Defeat."));
    assert!(!text.contains("Victory"));
    assert!(!text.contains("triumphs"));
}

#[tokio::test]
async fn test_rejections_are_relayed_with_their_kind() {
    let app = test_app().await;
    let (status, body) = send(
        &app,
        post("/evolve", json!({ "playerId": "P1", "monsterIndex": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error"], "invalid_selection");

    let (status, body) = send(
        &app,
        post("/guild/create", json!({ "playerId": "P1", "name": "Vanguard", "joinRequirement": "200" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error"], "insufficient_funds");
    assert!(body["text"].as_str().unwrap().contains("need 5000, have 1000"));

    let (status, body) = send(
        &app,
        post("/guild/join", json!({ "playerId": "P1", "guildName": "Nowhere" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_boss_endpoint_and_raid() {
    let app = test_app().await;
    let (status, body) = send(&app, get("/boss")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["boss"].is_null());

    send(&app, post("/spawn", json!({ "playerId": "P1", "description": "x" }))).await;
    let (status, body) = send(
        &app,
        post("/raid", json!({ "playerId": "P1", "monsterIndex": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reward"], 50);
    assert_eq!(body["essence"], 1050);

    let (_, body) = send(&app, get("/boss")).await;
    assert_eq!(body["boss"]["maxHp"], 10000);
    assert!(body["boss"]["hp"].as_i64().unwrap() < 10000);
}

#[tokio::test]
async fn test_webhook_secret_required_when_configured() {
    let app = app_with(ScriptedGenerator::offline(), WebhookSecret::new(Some("s3cret"))).await;

    let (status, body) = send(&app, post("/claim", json!({ "playerId": "P1" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let mut req = post("/claim", json!({ "playerId": "P1" }));
    req.headers_mut()
        .insert("Authorization", "Bearer wrong".parse().unwrap());
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut req = post("/claim", json!({ "playerId": "P1" }));
    req.headers_mut()
        .insert("Authorization", "Bearer s3cret".parse().unwrap());
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    // Service routes stay open
    let (status, _) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_docs_and_metrics() {
    let app = test_app().await;
    send(&app, post("/claim", json!({ "playerId": "P1" }))).await;

    let response = app.clone().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("rift_actions_total"));

    let response = app.clone().oneshot(get("/llms.txt")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(String::from_utf8(bytes.to_vec()).unwrap().contains("/guild/shop"));
}
