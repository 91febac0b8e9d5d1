// [[CRAFTLINK]]/apps/bridge-server/src/events.rs
// Purpose: Observed-event records and the static category table that decides retention.
// Architecture: Domain Event Layer
// Dependencies: Serde, Chrono

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::UnknownCategory;

/// An immutable record of something the bridge observed about the remote bot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    #[serde(rename = "type")]
    pub event_type: String,
    /// Milliseconds since the Unix epoch. Never decreases between admissions.
    pub timestamp: i64,
    pub payload: Value,
}

impl Event {
    pub(crate) fn new(id: u64, event_type: &str, timestamp: i64, payload: Value) -> Self {
        Self {
            id,
            event_type: event_type.to_string(),
            timestamp,
            payload,
        }
    }

    /// Reads a string field from the payload, if present.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(|v| v.as_str())
    }

    /// Reads a numeric field from the payload, if present.
    pub fn payload_f64(&self, key: &str) -> Option<f64> {
        self.payload.get(key).and_then(|v| v.as_f64())
    }
}

/// Coarse grouping of event types sharing one retention policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Communication,
    Social,
    Entities,
    World,
    Bot,
    System,
}

impl EventCategory {
    pub const ALL: [EventCategory; 6] = [
        EventCategory::Communication,
        EventCategory::Social,
        EventCategory::Entities,
        EventCategory::World,
        EventCategory::Bot,
        EventCategory::System,
    ];

    /// Static type -> category lookup. Unmapped types land in `System`.
    pub fn for_event_type(event_type: &str) -> Self {
        match event_type {
            "chat" | "whisper" | "message" => EventCategory::Communication,
            "playerJoined" | "playerLeft" => EventCategory::Social,
            "entitySpawn" | "entityGone" => EventCategory::Entities,
            "blockUpdate" | "timeChange" => EventCategory::World,
            "botSpawned" | "botDied" | "botKicked" | "healthChanged" => EventCategory::Bot,
            _ => EventCategory::System,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Communication => "communication",
            EventCategory::Social => "social",
            EventCategory::Entities => "entities",
            EventCategory::World => "world",
            EventCategory::Bot => "bot",
            EventCategory::System => "system",
        }
    }

    fn default_capacity(&self) -> usize {
        match self {
            EventCategory::Communication => 50,
            EventCategory::Social => 30,
            EventCategory::Entities => 20,
            EventCategory::World => 20,
            EventCategory::Bot => 50,
            EventCategory::System => 20,
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// Per-category capacities. Every category always has a positive capacity.
#[derive(Debug, Clone)]
pub struct CategoryTable {
    capacities: BTreeMap<EventCategory, usize>,
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self {
            capacities: EventCategory::ALL
                .into_iter()
                .map(|c| (c, c.default_capacity()))
                .collect(),
        }
    }
}

impl CategoryTable {
    /// Overrides one category's capacity. Zero is clamped to one so the
    /// buffer can always hold the event it just admitted.
    pub fn with_capacity(mut self, category: EventCategory, capacity: usize) -> Self {
        self.capacities.insert(category, capacity.max(1));
        self
    }

    pub fn capacity(&self, category: EventCategory) -> usize {
        self.capacities
            .get(&category)
            .copied()
            .unwrap_or_else(|| category.default_capacity())
    }

    pub fn category_of(&self, event_type: &str) -> EventCategory {
        EventCategory::for_event_type(event_type)
    }
}
