// [[CRAFTLINK]]/apps/bridge-server/src/movement.rs
// Purpose: Polling movement controller. Drives one actuator command and supervises it
//          until the target distance is covered, the bot is stuck, or time runs out.
// Architecture: Domain Logic Layer
// Dependencies: tokio (time, sync), uuid

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::actuator::Actuator;
use crate::error::MovementError;
use crate::models::{CommandArg, MovementReport, Position, StopReason};
use crate::observability::BridgeMetrics;

pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(100);
pub const STUCK_DWELL: Duration = Duration::from_millis(2000);
pub const REACHED_TOLERANCE: f64 = 0.2;
pub const STUCK_MOVEMENT_THRESHOLD: f64 = 0.1;
pub const DEFAULT_TARGET_DISTANCE: f64 = 3.0;
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_millis(10_000);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementRequest {
    pub command: String,
    #[serde(default)]
    pub args: Vec<CommandArg>,
    pub target_distance: Option<f64>,
    pub max_duration_ms: Option<u64>,
}

impl MovementRequest {
    pub fn new(command: &str, args: Vec<CommandArg>) -> Self {
        Self {
            command: command.to_string(),
            args,
            target_distance: None,
            max_duration_ms: None,
        }
    }

    pub fn target(mut self, distance: f64) -> Self {
        self.target_distance = Some(distance);
        self
    }

    pub fn max_duration(mut self, d: Duration) -> Self {
        self.max_duration_ms = Some(d.as_millis() as u64);
        self
    }
}

/// Clears bot control state when dropped while still armed, so a cancelled
/// run never leaves a key held down.
struct ControlGuard {
    bot: Arc<dyn Actuator>,
    armed: bool,
}

impl ControlGuard {
    fn arm(bot: Arc<dyn Actuator>) -> Self {
        Self { bot, armed: true }
    }

    /// Stays armed until the clear completes, so cancelling mid-clear still cleans up.
    async fn release(mut self) {
        let cleared = self.bot.clear_control_states().await;
        self.armed = false;
        if let Err(e) = cleared {
            tracing::warn!("Failed to clear control states after movement: {}", e);
        }
    }
}

impl Drop for ControlGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let bot = self.bot.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = bot.clear_control_states().await {
                        tracing::warn!("Failed to clear control states after cancelled movement: {}", e);
                    }
                });
            }
            Err(_) => tracing::error!("Movement dropped outside a runtime; control state not cleared"),
        }
    }
}

struct Sampling {
    last_sample: Position,
    still_for: Duration,
}

#[derive(Clone)]
pub struct MovementController {
    bot: Arc<dyn Actuator>,
    in_flight: Arc<Mutex<()>>,
    metrics: Arc<BridgeMetrics>,
}

impl MovementController {
    pub fn new(bot: Arc<dyn Actuator>, metrics: Arc<BridgeMetrics>) -> Self {
        Self {
            bot,
            in_flight: Arc::new(Mutex::new(())),
            metrics,
        }
    }

    /// Runs one supervised movement. A second run while one is in flight is
    /// rejected with `MovementError::Busy`.
    pub async fn run(&self, request: MovementRequest) -> Result<MovementReport, MovementError> {
        let target = request.target_distance.unwrap_or(DEFAULT_TARGET_DISTANCE);
        if !target.is_finite() || target <= 0.0 {
            return Err(MovementError::InvalidRequest(format!(
                "target distance must be positive, got {}",
                target
            )));
        }
        let max_duration = request
            .max_duration_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_MAX_DURATION);
        if max_duration.is_zero() {
            return Err(MovementError::InvalidRequest("max duration must be positive".to_string()));
        }

        let _permit = self
            .in_flight
            .clone()
            .try_lock_owned()
            .map_err(|_| MovementError::Busy)?;

        let run_id = Uuid::new_v4().to_string();
        tracing::info!(
            "Movement {} starting: bot.{}({:?}) target={} max={}ms",
            run_id,
            request.command,
            request.args,
            target,
            max_duration.as_millis()
        );

        let guard = ControlGuard::arm(self.bot.clone());
        let started = Instant::now();
        let supervised = self.supervise(&request, target, max_duration, started).await;
        guard.release().await;

        let (start, sampling) = match supervised {
            Ok(result) => result,
            Err(e) => {
                self.metrics.movement_failed();
                tracing::error!("Movement {} aborted: {}", run_id, e);
                return Err(e);
            }
        };

        let final_position = match self.bot.position().await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("Final position read failed ({}); using last sample", e);
                sampling.last_sample
            }
        };
        let actual_distance = start.distance_to(&final_position);
        let elapsed = started.elapsed();
        let stop_reason = classify_stop(actual_distance, target, sampling.still_for, elapsed, max_duration);

        self.metrics.movement_finished(stop_reason);
        tracing::info!(
            "Movement {} finished: {:.2}/{} blocks in {}ms ({})",
            run_id,
            actual_distance,
            target,
            elapsed.as_millis(),
            stop_reason
        );

        Ok(MovementReport {
            run_id,
            command: request.command,
            args: request.args,
            final_position,
            actual_distance,
            target_distance: target,
            elapsed_ms: elapsed.as_millis() as u64,
            stop_reason,
        })
    }

    async fn supervise(
        &self,
        request: &MovementRequest,
        target: f64,
        max_duration: Duration,
        started: Instant,
    ) -> Result<(Position, Sampling), MovementError> {
        let start = self.bot.position().await?;

        let outcome = self.bot.issue(&request.command, &request.args).await?;
        outcome.discard(&request.command);

        let mut distance = 0.0;
        let mut last = start;
        let mut current = start;
        let mut still_for = Duration::ZERO;

        while started.elapsed() < max_duration && distance < target {
            tokio::time::sleep(SAMPLE_INTERVAL).await;
            current = self.bot.position().await?;
            distance = start.distance_to(&current);

            if last.distance_to(&current) < STUCK_MOVEMENT_THRESHOLD {
                still_for += SAMPLE_INTERVAL;
                if still_for >= STUCK_DWELL {
                    tracing::debug!("Bot has not moved for {}ms, stopping", still_for.as_millis());
                    break;
                }
            } else {
                still_for = Duration::ZERO;
                last = current;
            }
        }

        Ok((
            start,
            Sampling {
                last_sample: current,
                still_for,
            },
        ))
    }
}

/// Stop-reason precedence: reached, stuck, timeout, unknown.
pub fn classify_stop(
    actual_distance: f64,
    target_distance: f64,
    still_for: Duration,
    elapsed: Duration,
    max_duration: Duration,
) -> StopReason {
    if actual_distance >= target_distance - REACHED_TOLERANCE {
        StopReason::ReachedTarget
    } else if still_for >= STUCK_DWELL {
        StopReason::Stuck
    } else if elapsed >= max_duration {
        StopReason::Timeout
    } else {
        StopReason::Unknown
    }
}
