// [[CRAFTLINK]]/apps/bridge-server/src/actuator.rs
// Purpose: Boundary to the bot sidecar that owns the game-protocol connection.
// Architecture: Infrastructure Adapter
// Dependencies: reqwest, async-trait, futures

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;

use crate::error::ActuatorError;
use crate::models::{BotSnapshot, CommandArg, Position};

const PENDING_POLL_INTERVAL: Duration = Duration::from_millis(100);
const PENDING_MAX_WAIT: Duration = Duration::from_secs(60);

/// Result of issuing a command: either already complete, or a completion
/// the caller must await (`resolve`) or explicitly drop (`discard`).
pub enum CommandOutcome {
    Ready(Value),
    Pending(BoxFuture<'static, Result<Value, ActuatorError>>),
}

impl CommandOutcome {
    pub async fn resolve(self) -> Result<Value, ActuatorError> {
        match self {
            CommandOutcome::Ready(value) => Ok(value),
            CommandOutcome::Pending(completion) => completion.await,
        }
    }

    /// Lets a pending completion finish in the background; failures are only logged.
    pub fn discard(self, command: &str) {
        if let CommandOutcome::Pending(completion) = self {
            let command = command.to_string();
            tokio::spawn(async move {
                if let Err(e) = completion.await {
                    tracing::warn!("Discarded command '{}' completed with error: {}", command, e);
                }
            });
        }
    }
}

impl fmt::Debug for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOutcome::Ready(v) => f.debug_tuple("Ready").field(v).finish(),
            CommandOutcome::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

#[async_trait]
pub trait Actuator: Send + Sync {
    /// Sends one named command. Unknown commands surface as `ActuatorError::Rejected`.
    async fn issue(&self, command: &str, args: &[CommandArg]) -> Result<CommandOutcome, ActuatorError>;

    async fn snapshot(&self) -> Result<BotSnapshot, ActuatorError>;

    /// Must be idempotent.
    async fn clear_control_states(&self) -> Result<(), ActuatorError>;

    async fn position(&self) -> Result<Position, ActuatorError> {
        Ok(self.snapshot().await?.position)
    }

    async fn health(&self) -> Result<f64, ActuatorError> {
        Ok(self.snapshot().await?.health)
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum CommandResponse {
    Done {
        #[serde(default)]
        result: Value,
    },
    Pending {
        ticket: String,
    },
    Failed {
        error: String,
    },
}

/// Talks to the sidecar over plain HTTP.
pub struct HttpActuator {
    client: reqwest::Client,
    base_url: String,
}

impl HttpActuator {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Actuator for HttpActuator {
    async fn issue(&self, command: &str, args: &[CommandArg]) -> Result<CommandOutcome, ActuatorError> {
        let url = format!("{}/commands", self.base_url);
        tracing::debug!("Issuing bot command {} to {}", command, url);

        let response = self
            .client
            .post(&url)
            .json(&json!({ "command": command, "args": args }))
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            let reason = response.text().await.unwrap_or_default();
            return Err(ActuatorError::Rejected {
                command: command.to_string(),
                reason,
            });
        }
        if !status.is_success() {
            return Err(ActuatorError::Failed {
                command: command.to_string(),
                reason: format!("sidecar returned {}", status),
            });
        }

        match response.json::<CommandResponse>().await? {
            CommandResponse::Done { result } => Ok(CommandOutcome::Ready(result)),
            CommandResponse::Failed { error } => Err(ActuatorError::Failed {
                command: command.to_string(),
                reason: error,
            }),
            CommandResponse::Pending { ticket } => {
                let url = format!("{}/commands/{}", self.base_url, ticket);
                Ok(CommandOutcome::Pending(Box::pin(poll_ticket(
                    self.client.clone(),
                    url,
                    command.to_string(),
                ))))
            }
        }
    }

    async fn snapshot(&self) -> Result<BotSnapshot, ActuatorError> {
        let url = format!("{}/state", self.base_url);
        let snapshot = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<BotSnapshot>()
            .await?;
        Ok(snapshot)
    }

    async fn clear_control_states(&self) -> Result<(), ActuatorError> {
        let url = format!("{}/controls/clear", self.base_url);
        self.client.post(&url).send().await?.error_for_status()?;
        Ok(())
    }
}

async fn poll_ticket(client: reqwest::Client, url: String, command: String) -> Result<Value, ActuatorError> {
    match tokio::time::timeout(PENDING_MAX_WAIT, poll_until_done(&client, &url, &command)).await {
        Ok(result) => result,
        Err(_) => Err(ActuatorError::Failed {
            command,
            reason: format!("no completion after {}s", PENDING_MAX_WAIT.as_secs()),
        }),
    }
}

async fn poll_until_done(client: &reqwest::Client, url: &str, command: &str) -> Result<Value, ActuatorError> {
    let mut interval = tokio::time::interval(PENDING_POLL_INTERVAL);
    loop {
        interval.tick().await;
        let response = client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<CommandResponse>()
            .await?;
        match response {
            CommandResponse::Done { result } => return Ok(result),
            CommandResponse::Failed { error } => {
                return Err(ActuatorError::Failed {
                    command: command.to_string(),
                    reason: error,
                })
            }
            CommandResponse::Pending { .. } => continue,
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Serves `app` on an ephemeral local port and returns its base URL.
    pub async fn serve(app: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    /// Scripted bot: walks along +x at a fixed speed, optionally stopping
    /// after a while, optionally failing position reads.
    pub struct ScriptedActuator {
        origin: Instant,
        start: Position,
        speed_per_sec: f64,
        moving_for: Option<Duration>,
        fail_reads_after: Option<usize>,
        rejected: HashSet<String>,
        pending: HashSet<String>,
        clear_delay: Option<Duration>,
        snapshot: BotSnapshot,
        reads: AtomicUsize,
        clears: AtomicUsize,
        issued: Mutex<Vec<(String, Vec<CommandArg>)>>,
    }

    impl ScriptedActuator {
        pub fn new() -> Self {
            Self {
                origin: Instant::now(),
                start: Position::new(10.0, 64.0, -5.0),
                speed_per_sec: 0.0,
                moving_for: None,
                fail_reads_after: None,
                rejected: HashSet::new(),
                pending: HashSet::new(),
                clear_delay: None,
                snapshot: BotSnapshot {
                    username: "MCPBot".to_string(),
                    health: 20.0,
                    food: 18.0,
                    ..BotSnapshot::default()
                },
                reads: AtomicUsize::new(0),
                clears: AtomicUsize::new(0),
                issued: Mutex::new(Vec::new()),
            }
        }

        pub fn moving(mut self, speed_per_sec: f64) -> Self {
            self.speed_per_sec = speed_per_sec;
            self
        }

        pub fn stopping_after(mut self, d: Duration) -> Self {
            self.moving_for = Some(d);
            self
        }

        pub fn failing_reads_after(mut self, reads: usize) -> Self {
            self.fail_reads_after = Some(reads);
            self
        }

        pub fn rejecting(mut self, command: &str) -> Self {
            self.rejected.insert(command.to_string());
            self
        }

        pub fn pending_for(mut self, command: &str) -> Self {
            self.pending.insert(command.to_string());
            self
        }

        /// Clearing takes `d`; only completed clears are counted.
        pub fn slow_clear(mut self, d: Duration) -> Self {
            self.clear_delay = Some(d);
            self
        }

        pub fn with_snapshot(mut self, snapshot: BotSnapshot) -> Self {
            self.snapshot = snapshot;
            self
        }

        pub fn clears(&self) -> usize {
            self.clears.load(Ordering::SeqCst)
        }

        pub fn issued(&self) -> Vec<(String, Vec<CommandArg>)> {
            self.issued.lock().unwrap().clone()
        }

        fn current_position(&self) -> Position {
            let mut elapsed = self.origin.elapsed();
            if let Some(limit) = self.moving_for {
                elapsed = elapsed.min(limit);
            }
            let dx = self.speed_per_sec * elapsed.as_secs_f64();
            Position::new(self.start.x + dx, self.start.y, self.start.z)
        }
    }

    #[async_trait]
    impl Actuator for ScriptedActuator {
        async fn issue(&self, command: &str, args: &[CommandArg]) -> Result<CommandOutcome, ActuatorError> {
            if self.rejected.contains(command) {
                return Err(ActuatorError::Rejected {
                    command: command.to_string(),
                    reason: format!("bot.{} is not a function", command),
                });
            }
            self.issued
                .lock()
                .unwrap()
                .push((command.to_string(), args.to_vec()));
            if self.pending.contains(command) {
                return Ok(CommandOutcome::Pending(Box::pin(async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(json!("completed"))
                })));
            }
            Ok(CommandOutcome::Ready(Value::Null))
        }

        async fn snapshot(&self) -> Result<BotSnapshot, ActuatorError> {
            let reads = self.reads.fetch_add(1, Ordering::SeqCst);
            if let Some(limit) = self.fail_reads_after {
                if reads >= limit {
                    return Err(ActuatorError::Protocol("connection reset".to_string()));
                }
            }
            let mut snapshot = self.snapshot.clone();
            snapshot.position = self.current_position();
            Ok(snapshot)
        }

        async fn clear_control_states(&self) -> Result<(), ActuatorError> {
            if let Some(delay) = self.clear_delay {
                tokio::time::sleep(delay).await;
            }
            self.clears.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}
