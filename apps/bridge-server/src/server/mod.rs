// [[CRAFTLINK]]/apps/bridge-server/src/server/mod.rs
// Purpose: HTTP/WebSocket surface of the bridge.
// Architecture: API Layer
// Dependencies: Axum, Tower

pub mod error;
pub mod handlers;

use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::runtime::BridgeRuntime;

pub fn router(runtime: Arc<BridgeRuntime>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/events", get(handlers::query_events).post(handlers::ingest_event))
        .route("/events/stats", get(handlers::event_stats))
        .route("/ws/events", get(handlers::ws_event_stream))
        .route("/bot/move", post(handlers::move_bot))
        .route("/bot/command", post(handlers::execute_command))
        .route("/bot/pathfind", post(handlers::pathfind))
        .route("/bot/state", get(handlers::bot_state))
        .route("/bot/inspect", get(handlers::inspect_bot))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(runtime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::mock::ScriptedActuator;
    use crate::events::CategoryTable;
    use crate::reactions::testing::{Behaviour, RecordingReactor};
    use crate::registry::ReactionRules;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app_with(bot: ScriptedActuator) -> (Router, Arc<RecordingReactor>) {
        let reactor = Arc::new(RecordingReactor::new(Behaviour::Succeed));
        let runtime = BridgeRuntime::assemble(
            CategoryTable::default(),
            ReactionRules::default(),
            reactor.clone(),
            Arc::new(bot),
        );
        (router(Arc::new(runtime)), reactor)
    }

    async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app_with(ScriptedActuator::new());
        let (status, body) = call(&app, get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["totalEvents"], 0);
    }

    #[tokio::test]
    async fn test_ingest_then_query_by_category() {
        let (app, reactor) = app_with(ScriptedActuator::new());

        let (status, event) = call(
            &app,
            post_json("/events", json!({"type": "whisper", "payload": {"username": "steve", "message": "hi"}})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(event["id"], 1);
        assert_eq!(event["type"], "whisper");

        call(&app, post_json("/events", json!({"type": "blockUpdate", "payload": {}}))).await;

        let (status, events) = call(&app, get_req("/events?category=communication&limit=5")).await;
        assert_eq!(status, StatusCode::OK);
        let events = events.as_array().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["payload"]["username"], "steve");

        let (_, events) = call(&app, get_req("/events?types=blockUpdate,chat")).await;
        assert_eq!(events.as_array().unwrap().len(), 1);

        let (_, events) = call(&app, get_req("/events?category=weather")).await;
        assert!(events.as_array().unwrap().is_empty());

        // whispers always react
        assert_eq!(reactor.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_stats_report_every_category() {
        let (app, _) = app_with(ScriptedActuator::new());
        call(&app, post_json("/events", json!({"type": "chat", "payload": {"message": "x"}}))).await;

        let (status, stats) = call(&app, get_req("/events/stats")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["totalEvents"], 1);
        assert_eq!(stats["categories"]["communication"]["queueSize"], 1);
        assert_eq!(stats["categories"]["world"]["queueSize"], 0);
    }

    #[tokio::test]
    async fn test_empty_event_type_is_rejected() {
        let (app, _) = app_with(ScriptedActuator::new());
        let (status, body) = call(&app, post_json("/events", json!({"type": " "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["isError"], true);
        assert_eq!(body["error"]["code"], "INVALID_EVENT");
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_reports_reached_target() {
        let (app, _) = app_with(ScriptedActuator::new().moving(5.0));
        let (status, body) = call(
            &app,
            post_json(
                "/bot/move",
                json!({"command": "setControlState", "args": ["forward", true], "targetDistance": 2.0}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["stopReason"], "reached target");
        assert!(body["summary"].as_str().unwrap().contains("reached target"));
    }

    #[tokio::test]
    async fn test_invalid_move_is_a_structured_error() {
        let (app, _) = app_with(ScriptedActuator::new());
        let (status, body) = call(
            &app,
            post_json("/bot/move", json!({"command": "setControlState", "targetDistance": -1.0})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["isError"], true);
        assert_eq!(body["error"]["code"], "INVALID_MOVEMENT");
        assert!(body["error"]["message"].as_str().unwrap().starts_with("Error: "));
    }

    #[tokio::test]
    async fn test_rejected_command_keeps_serving() {
        let (app, _) = app_with(ScriptedActuator::new().rejecting("fly"));
        let (status, body) = call(&app, post_json("/bot/command", json!({"command": "fly", "params": []}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "COMMAND_REJECTED");

        let (status, body) = call(&app, get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_generic_command_summary() {
        let (app, _) = app_with(ScriptedActuator::new());
        let (status, body) = call(&app, post_json("/bot/command", json!({"command": "swingArm"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["kind"], "generic");
        assert_eq!(body["summary"], "Executed: bot.swingArm(). Result: null");
    }

    #[tokio::test]
    async fn test_pathfind_message() {
        let (app, _) = app_with(ScriptedActuator::new());
        let (status, body) = call(&app, post_json("/bot/pathfind", json!({"x": 1.0, "y": 70.0, "z": 3.0}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Started pathfinding to (1, 70, 3) exactly");
    }

    #[tokio::test]
    async fn test_state_and_inspect() {
        let (app, _) = app_with(ScriptedActuator::new());

        let (status, state) = call(&app, get_req("/bot/state")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(state["username"], "MCPBot");

        let (status, body) = call(&app, get_req("/bot/inspect?property=position.y")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["value"], 64.0);

        let (status, body) = call(&app, get_req("/bot/inspect?property=_client.socket")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "PROPERTY_NOT_ALLOWED");
    }

    #[tokio::test]
    async fn test_unreadable_bot_maps_to_gateway_error() {
        let (app, _) = app_with(ScriptedActuator::new().failing_reads_after(0));
        let (status, body) = call(&app, get_req("/bot/state")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "BOT_PROTOCOL");
    }
}
