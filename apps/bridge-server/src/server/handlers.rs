// [[CRAFTLINK]]/apps/bridge-server/src/server/handlers.rs
// Purpose: API Handlers. Event ingestion and query, live event stream, bot tools.
// Architecture: API Layer
// Dependencies: Axum, Runtime

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Json, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::buffer::{BufferStats, EventQuery, DEFAULT_QUERY_LIMIT};
use crate::commands::{CommandReport, PathfindRequest};
use crate::events::{Event, EventCategory};
use crate::inspect;
use crate::models::{BotSnapshot, CommandArg, MovementReport};
use crate::movement::MovementRequest;
use crate::observability::MetricsSnapshot;
use crate::runtime::BridgeRuntime;
use crate::server::error::ApiError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: String,
    message: String,
    uptime_seconds: i64,
    total_events: u64,
    metrics: MetricsSnapshot,
}

pub async fn health(State(runtime): State<Arc<BridgeRuntime>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "CRAFTLINK bridge is running".to_string(),
        uptime_seconds: runtime.uptime_seconds(),
        total_events: runtime.buffer().total_admitted(),
        metrics: runtime.metrics(),
    })
}

// === EVENTS ===

#[derive(Deserialize)]
pub struct IngestRequest {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    payload: Value,
}

pub async fn ingest_event(
    State(runtime): State<Arc<BridgeRuntime>>,
    Json(request): Json<IngestRequest>,
) -> Result<(StatusCode, Json<Event>), ApiError> {
    if request.event_type.trim().is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "INVALID_EVENT", "event type must not be empty"));
    }
    let event = runtime.admit_external_event(&request.event_type, request.payload);
    Ok((StatusCode::CREATED, Json(event)))
}

#[derive(Deserialize)]
pub struct EventsParams {
    category: Option<String>,
    since: Option<i64>,
    limit: Option<usize>,
    /// Comma-separated event types.
    types: Option<String>,
}

impl From<EventsParams> for EventQuery {
    fn from(params: EventsParams) -> Self {
        let types = params.types.map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect::<Vec<_>>()
        });
        EventQuery {
            category: params.category,
            since: params.since.unwrap_or(0),
            limit: params.limit.unwrap_or(DEFAULT_QUERY_LIMIT),
            types: types.filter(|t| !t.is_empty()),
        }
    }
}

pub async fn query_events(
    State(runtime): State<Arc<BridgeRuntime>>,
    Query(params): Query<EventsParams>,
) -> Json<Vec<Event>> {
    Json(runtime.query_events(&params.into()))
}

pub async fn event_stats(State(runtime): State<Arc<BridgeRuntime>>) -> Json<BufferStats> {
    Json(runtime.stats())
}

#[derive(Deserialize)]
pub struct StreamParams {
    category: Option<String>,
}

pub async fn ws_event_stream(
    State(runtime): State<Arc<BridgeRuntime>>,
    Query(params): Query<StreamParams>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    let category = match params.category {
        Some(raw) => Some(raw.parse::<EventCategory>().map_err(|e| {
            ApiError::new(StatusCode::BAD_REQUEST, "UNKNOWN_CATEGORY", e.to_string())
        })?),
        None => None,
    };
    Ok(ws.on_upgrade(move |socket| handle_event_stream(socket, runtime, category)))
}

async fn handle_event_stream(socket: WebSocket, runtime: Arc<BridgeRuntime>, category: Option<EventCategory>) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = runtime.subscribe();

    loop {
        tokio::select! {
            msg = receiver.next() => {
                if matches!(msg, None | Some(Err(_)) | Some(Ok(Message::Close(_)))) {
                    tracing::info!("Client disconnected from event stream");
                    break;
                }
            }

            received = events.recv() => {
                let event = match received {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Event stream client lagged, skipped {} events", skipped);
                        let notice = json!({"type": "lagged", "skipped": skipped});
                        if sender.send(Message::Text(notice.to_string())).await.is_err() {
                            break;
                        }
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                if let Some(wanted) = category {
                    if EventCategory::for_event_type(&event.event_type) != wanted {
                        continue;
                    }
                }

                let frame = match serde_json::to_string(&event) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::error!("Failed to encode event {}: {}", event.id, e);
                        continue;
                    }
                };
                if sender.send(Message::Text(frame)).await.is_err() {
                    tracing::info!("Failed to push event, client disconnected");
                    break;
                }
            }
        }
    }
}

// === BOT TOOLS ===

#[derive(Serialize)]
pub struct ToolResult<T> {
    summary: String,
    result: T,
}

pub async fn move_bot(
    State(runtime): State<Arc<BridgeRuntime>>,
    Json(request): Json<MovementRequest>,
) -> Result<Json<ToolResult<MovementReport>>, ApiError> {
    let report = runtime.run_movement(request).await?;
    Ok(Json(ToolResult {
        summary: report.summary(),
        result: report,
    }))
}

#[derive(Deserialize)]
pub struct CommandRequest {
    command: String,
    #[serde(default)]
    params: Vec<CommandArg>,
}

pub async fn execute_command(
    State(runtime): State<Arc<BridgeRuntime>>,
    Json(request): Json<CommandRequest>,
) -> Result<Json<ToolResult<CommandReport>>, ApiError> {
    if request.command.trim().is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "INVALID_PARAMETER", "command must not be empty"));
    }
    tracing::info!("Executing bot command: {}", request.command);

    let report = runtime.execute_command(&request.command, request.params).await?;
    Ok(Json(ToolResult {
        summary: report.summary(),
        result: report,
    }))
}

pub async fn pathfind(
    State(runtime): State<Arc<BridgeRuntime>>,
    Json(goal): Json<PathfindRequest>,
) -> Result<Json<Value>, ApiError> {
    let message = runtime.pathfind(goal).await?;
    Ok(Json(json!({ "message": message })))
}

pub async fn bot_state(State(runtime): State<Arc<BridgeRuntime>>) -> Result<Json<BotSnapshot>, ApiError> {
    Ok(Json(runtime.bot_state().await?))
}

#[derive(Deserialize)]
pub struct InspectParams {
    property: String,
}

pub async fn inspect_bot(
    State(runtime): State<Arc<BridgeRuntime>>,
    Query(params): Query<InspectParams>,
) -> Result<Json<Value>, ApiError> {
    let snapshot = runtime.bot_state().await?;
    let value = inspect::inspect(&snapshot, &params.property)?;
    Ok(Json(json!({
        "property": params.property,
        "value": value,
    })))
}
