// [[CRAFTLINK]]/apps/bridge-server/src/registry.rs
// Purpose: Reaction Rule Registry. Decides which observed events deserve a reaction.
// Architecture: Cortex Layer
// Dependencies: Serde

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::events::Event;

/// Which external reaction an event qualifies for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReactionKind {
    SpecialChat,
    LowHealth,
    HostileMob,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionRules {
    pub special_keywords: Vec<String>,
    pub hostile_mobs: Vec<String>,
    pub low_health_threshold: f64,
}

impl Default for ReactionRules {
    fn default() -> Self {
        Self {
            special_keywords: ["mcpbot", "bot", "help", "attack", "follow", "come"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            hostile_mobs: ["zombie", "skeleton", "spider", "creeper", "enderman"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            low_health_threshold: 10.0,
        }
    }
}

impl ReactionRules {
    /// Loads rules from a JSON file, falling back to the built-in set when
    /// the file is missing or unreadable.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(data) => match serde_json::from_str::<ReactionRules>(&data) {
                Ok(rules) => {
                    tracing::info!(
                        "Loaded reaction rules from '{}': {} keywords, {} hostile mobs",
                        path.display(),
                        rules.special_keywords.len(),
                        rules.hostile_mobs.len()
                    );
                    rules.normalized()
                }
                Err(e) => {
                    tracing::error!("Failed to parse reaction rules file: {}. Using defaults.", e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::warn!("Reaction rules not found at '{}'. Loading fallback defaults.", path.display());
                Self::default()
            }
        }
    }

    /// Adds the bot's own name to the keyword set so mentions always count.
    pub fn with_bot_name(mut self, name: &str) -> Self {
        let name = name.trim().to_lowercase();
        if !name.is_empty() && !self.special_keywords.contains(&name) {
            self.special_keywords.push(name);
        }
        self
    }

    fn normalized(mut self) -> Self {
        self.special_keywords = self.special_keywords.iter().map(|k| k.to_lowercase()).collect();
        self.special_keywords.retain(|k| !k.is_empty());
        self.hostile_mobs = self.hostile_mobs.iter().map(|m| m.to_lowercase()).collect();
        self
    }

    pub fn is_special_chat(&self, message: &str) -> bool {
        let message = message.to_lowercase();
        self.special_keywords.iter().any(|k| message.contains(k.as_str()))
    }

    pub fn is_hostile_mob(&self, entity_type: &str) -> bool {
        self.hostile_mobs.iter().any(|m| m.eq_ignore_ascii_case(entity_type))
    }

    pub fn is_low_health(&self, health: f64) -> bool {
        health < self.low_health_threshold
    }

    /// Per-type predicate. Missing payload fields never qualify.
    pub fn classify(&self, event: &Event) -> Option<ReactionKind> {
        match event.event_type.as_str() {
            "chat" => event
                .payload_str("message")
                .filter(|m| self.is_special_chat(m))
                .map(|_| ReactionKind::SpecialChat),
            "whisper" => Some(ReactionKind::SpecialChat),
            "healthChanged" => event
                .payload_f64("health")
                .filter(|h| self.is_low_health(*h))
                .map(|_| ReactionKind::LowHealth),
            "entitySpawn" => event
                .payload_str("entityType")
                .filter(|t| self.is_hostile_mob(t))
                .map(|_| ReactionKind::HostileMob),
            _ => None,
        }
    }
}
