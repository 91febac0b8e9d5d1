// [[CRAFTLINK]]/apps/bridge-server/src/commands.rs
// Purpose: Generic bot command execution with movement and attack routing.
// Architecture: Domain Logic Layer
// Dependencies: Actuator, Movement

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::actuator::Actuator;
use crate::error::CommandError;
use crate::models::{CommandArg, MovementReport};
use crate::movement::{MovementController, MovementRequest};

pub const MOVEMENT_DIRECTIONS: [&str; 7] = ["forward", "back", "left", "right", "jump", "sneak", "sprint"];
pub const MAX_ATTACK_DISTANCE: f64 = 4.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CommandReport {
    Movement(MovementReport),
    #[serde(rename_all = "camelCase")]
    Attack {
        entity_id: i64,
        entity_name: String,
        distance: f64,
    },
    #[serde(rename_all = "camelCase")]
    Generic {
        command: String,
        args: Vec<CommandArg>,
        result: Value,
    },
}

impl CommandReport {
    pub fn summary(&self) -> String {
        match self {
            CommandReport::Movement(report) => report.summary(),
            CommandReport::Attack {
                entity_id,
                entity_name,
                distance,
            } => format!(
                "Attacked entity {} ({}) at distance {:.2} blocks",
                entity_id, entity_name, distance
            ),
            CommandReport::Generic { command, args, result } => {
                let args = args.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
                format!("Executed: bot.{}({}). Result: {}", command, args, result)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PathfindRequest {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub range: f64,
}

pub struct CommandExecutor {
    bot: Arc<dyn Actuator>,
    movement: MovementController,
}

impl CommandExecutor {
    pub fn new(bot: Arc<dyn Actuator>, movement: MovementController) -> Self {
        Self { bot, movement }
    }

    pub async fn execute(&self, command: &str, params: Vec<CommandArg>) -> Result<CommandReport, CommandError> {
        let params: Vec<CommandArg> = params.into_iter().map(CommandArg::normalize).collect();

        if is_movement_command(command, &params) {
            let request = movement_request(command, &params)?;
            // the movement controller owns its own cleanup
            return Ok(CommandReport::Movement(self.movement.run(request).await?));
        }

        let result = if command == "attack" && !params.is_empty() {
            self.attack(&params[0]).await
        } else {
            self.generic(command, params).await
        };

        if let Err(e) = &result {
            tracing::warn!("Command '{}' failed: {}", command, e);
            if let Err(clear_err) = self.bot.clear_control_states().await {
                tracing::error!("Failed to clear control states after error: {}", clear_err);
            }
        }
        result
    }

    async fn attack(&self, target: &CommandArg) -> Result<CommandReport, CommandError> {
        let entity_id = target
            .as_f64()
            .filter(|n| n.fract() == 0.0)
            .map(|n| n as i64)
            .ok_or_else(|| CommandError::InvalidEntityId(target.to_string()))?;

        let snapshot = self.bot.snapshot().await?;
        let entity = snapshot
            .entities
            .iter()
            .find(|e| e.id == entity_id)
            .ok_or(CommandError::EntityNotFound(entity_id))?;

        let distance = snapshot.position.distance_to(&entity.position);
        if distance > MAX_ATTACK_DISTANCE {
            return Err(CommandError::TargetTooFar {
                distance,
                max: MAX_ATTACK_DISTANCE,
            });
        }

        self.bot
            .issue("attack", &[CommandArg::Number(entity_id as f64)])
            .await?
            .resolve()
            .await?;

        tracing::info!("Attacked entity {} ({}) at {:.2} blocks", entity_id, entity.name, distance);
        Ok(CommandReport::Attack {
            entity_id,
            entity_name: entity.name.clone(),
            distance,
        })
    }

    async fn generic(&self, command: &str, args: Vec<CommandArg>) -> Result<CommandReport, CommandError> {
        let result = self.bot.issue(command, &args).await?.resolve().await?;
        Ok(CommandReport::Generic {
            command: command.to_string(),
            args,
            result,
        })
    }

    /// Hands navigation to the sidecar's pathfinder; returns once the goal is set.
    pub async fn pathfind(&self, goal: PathfindRequest) -> Result<String, CommandError> {
        for (axis, v) in [("x", goal.x), ("y", goal.y), ("z", goal.z), ("range", goal.range)] {
            if !v.is_finite() {
                return Err(CommandError::InvalidParameter {
                    command: "pathfindTo".to_string(),
                    reason: format!("{} must be a finite number", axis),
                });
            }
        }
        if goal.range < 0.0 {
            return Err(CommandError::InvalidParameter {
                command: "pathfindTo".to_string(),
                reason: "range must not be negative".to_string(),
            });
        }

        let args = [goal.x, goal.y, goal.z, goal.range].map(CommandArg::Number);
        self.bot.issue("pathfindTo", &args).await?.discard("pathfindTo");

        let scope = if goal.range > 0.0 {
            format!(" within {} blocks", goal.range)
        } else {
            " exactly".to_string()
        };
        Ok(format!("Started pathfinding to ({}, {}, {}){}", goal.x, goal.y, goal.z, scope))
    }
}

fn is_movement_command(command: &str, params: &[CommandArg]) -> bool {
    command == "setControlState"
        && params.len() >= 2
        && params[0]
            .as_text()
            .map_or(false, |direction| MOVEMENT_DIRECTIONS.contains(&direction))
}

/// Third param is the target distance, fourth the timeout in seconds.
fn movement_request(command: &str, params: &[CommandArg]) -> Result<MovementRequest, CommandError> {
    let mut request = MovementRequest::new(command, params[..2].to_vec());

    if let Some(arg) = params.get(2) {
        let distance = arg.as_f64().ok_or_else(|| CommandError::InvalidParameter {
            command: command.to_string(),
            reason: format!("target distance '{}' is not a number", arg),
        })?;
        request = request.target(distance);
    }
    if let Some(arg) = params.get(3) {
        let timeout = arg
            .as_f64()
            .filter(|s| *s > 0.0)
            .and_then(|s| Duration::try_from_secs_f64(s).ok())
            .filter(|d| u64::try_from(d.as_millis()).is_ok())
            .ok_or_else(|| CommandError::InvalidParameter {
                command: command.to_string(),
                reason: format!("timeout '{}' must be a positive number of seconds", arg),
            })?;
        request = request.max_duration(timeout);
    }
    Ok(request)
}
