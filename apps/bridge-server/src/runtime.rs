// [[CRAFTLINK]]/apps/bridge-server/src/runtime.rs
// Purpose: Wires the event buffer, reactions, movement controller and command executor
//          around one bot actuator.
// Architecture: Domain Logic Layer
// Dependencies: chrono, tokio-util

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::actuator::Actuator;
use crate::buffer::{BufferStats, EventBuffer, EventQuery};
use crate::commands::{CommandExecutor, CommandReport, PathfindRequest};
use crate::config::BridgeConfig;
use crate::decision::{DecisionReactor, HttpDecisionClient};
use crate::error::{ActuatorError, CommandError, MovementError};
use crate::events::{CategoryTable, Event};
use crate::models::{BotSnapshot, CommandArg, MovementReport};
use crate::movement::{MovementController, MovementRequest};
use crate::observability::{BridgeMetrics, MetricsSnapshot};
use crate::reactions::{LoggingReactor, ReactionDispatcher, ReactionHandler};
use crate::registry::ReactionRules;

pub struct BridgeRuntime {
    buffer: Arc<EventBuffer>,
    movement: MovementController,
    commands: CommandExecutor,
    bot: Arc<dyn Actuator>,
    metrics: Arc<BridgeMetrics>,
    started_at: DateTime<Utc>,
}

impl BridgeRuntime {
    pub fn new(config: &BridgeConfig, bot: Arc<dyn Actuator>) -> Self {
        let rules = ReactionRules::load(&config.rules_path).with_bot_name(&config.bot_name);

        let handler: Arc<dyn ReactionHandler> = match &config.decision_url {
            Some(url) => {
                tracing::info!("Reactions will consult decision service at {}", url);
                Arc::new(DecisionReactor::new(
                    Arc::new(HttpDecisionClient::new(url.clone())),
                    config.bot_name.clone(),
                ))
            }
            None => {
                tracing::warn!("DECISION_URL not set. Reactions will only be logged.");
                Arc::new(LoggingReactor)
            }
        };

        Self::assemble(config.categories.clone(), rules, handler, bot)
    }

    pub fn assemble(
        categories: CategoryTable,
        rules: ReactionRules,
        handler: Arc<dyn ReactionHandler>,
        bot: Arc<dyn Actuator>,
    ) -> Self {
        let metrics = Arc::new(BridgeMetrics::default());
        let dispatcher = ReactionDispatcher::new(rules, handler, bot.clone(), metrics.clone());
        let buffer = Arc::new(EventBuffer::new(categories, metrics.clone()).with_dispatcher(dispatcher));
        let movement = MovementController::new(bot.clone(), metrics.clone());
        let commands = CommandExecutor::new(bot.clone(), movement.clone());

        BridgeRuntime {
            buffer,
            movement,
            commands,
            bot,
            metrics,
            started_at: Utc::now(),
        }
    }

    pub fn buffer(&self) -> Arc<EventBuffer> {
        self.buffer.clone()
    }

    // === EVENT SURFACE ===

    pub fn admit_external_event(&self, event_type: &str, payload: Value) -> Event {
        self.buffer.admit(event_type, payload)
    }

    pub fn query_events(&self, query: &EventQuery) -> Vec<Event> {
        self.buffer.query(query)
    }

    pub fn stats(&self) -> BufferStats {
        self.buffer.stats()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.buffer.subscribe()
    }

    // === BOT SURFACE ===

    pub async fn run_movement(&self, request: MovementRequest) -> Result<MovementReport, MovementError> {
        self.movement.run(request).await
    }

    pub async fn execute_command(&self, command: &str, params: Vec<CommandArg>) -> Result<CommandReport, CommandError> {
        self.commands.execute(command, params).await
    }

    pub async fn pathfind(&self, goal: PathfindRequest) -> Result<String, CommandError> {
        self.commands.pathfind(goal).await
    }

    pub async fn bot_state(&self) -> Result<BotSnapshot, ActuatorError> {
        self.bot.snapshot().await
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}
