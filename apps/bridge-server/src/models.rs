use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Position { x, y, z }
    }

    /// Plain 3-D Euclidean distance. No terrain awareness.
    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {})",
            self.x.floor() as i64,
            self.y.floor() as i64,
            self.z.floor() as i64
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub name: String,
    pub count: u32,
    pub slot: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyEntity {
    pub id: i64,
    pub name: String,
    pub position: Position,
}

/// Live state reported by the bot sidecar.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotSnapshot {
    pub username: String,
    pub position: Position,
    pub health: f64,
    pub food: f64,
    #[serde(default)]
    pub inventory: Vec<InventoryItem>,
    #[serde(default)]
    pub selected_slot: u32,
    #[serde(default)]
    pub held_item: Option<InventoryItem>,
    #[serde(default)]
    pub yaw: f64,
    #[serde(default)]
    pub pitch: f64,
    #[serde(default)]
    pub entities: Vec<NearbyEntity>,
}

/// Primitive argument passed through to an actuator command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandArg {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CommandArg {
    /// "true"/"false" strings become booleans; everything else is kept.
    pub fn normalize(self) -> Self {
        match self {
            CommandArg::Text(s) if s == "true" => CommandArg::Bool(true),
            CommandArg::Text(s) if s == "false" => CommandArg::Bool(false),
            other => other,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CommandArg::Number(n) => Some(*n),
            CommandArg::Text(s) => s.trim().parse().ok(),
            CommandArg::Bool(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CommandArg::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for CommandArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandArg::Bool(b) => write!(f, "{}", b),
            CommandArg::Number(n) => write!(f, "{}", n),
            CommandArg::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for CommandArg {
    fn from(s: &str) -> Self {
        CommandArg::Text(s.to_string())
    }
}

impl From<bool> for CommandArg {
    fn from(b: bool) -> Self {
        CommandArg::Bool(b)
    }
}

impl From<f64> for CommandArg {
    fn from(n: f64) -> Self {
        CommandArg::Number(n)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StopReason {
    #[serde(rename = "reached target")]
    ReachedTarget,
    #[serde(rename = "stuck/blocked")]
    Stuck,
    #[serde(rename = "timeout")]
    Timeout,
    #[serde(rename = "unknown")]
    Unknown,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::ReachedTarget => "reached target",
            StopReason::Stuck => "stuck/blocked",
            StopReason::Timeout => "timeout",
            StopReason::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementReport {
    pub run_id: String,
    pub command: String,
    pub args: Vec<CommandArg>,
    pub final_position: Position,
    pub actual_distance: f64,
    pub target_distance: f64,
    pub elapsed_ms: u64,
    pub stop_reason: StopReason,
}

impl MovementReport {
    pub fn summary(&self) -> String {
        let args = self
            .args
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Executed: bot.{}({}) for {:.2} blocks (target: {}, {}). Position: {}",
            self.command, args, self.actual_distance, self.target_distance, self.stop_reason, self.final_position
        )
    }
}
