// [[CRAFTLINK]]/apps/bridge-server/src/config.rs
// Purpose: Environment-driven configuration for the bridge.
// Architecture: Application Boot
// Dependencies: std::env

use std::collections::HashMap;
use std::env;

use crate::error::ConfigError;
use crate::events::{CategoryTable, EventCategory};

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub port: u16,
    pub bot_url: String,
    pub bot_events_url: String,
    pub bot_name: String,
    pub decision_url: Option<String>,
    pub rules_path: String,
    pub categories: CategoryTable,
}

impl BridgeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(env::vars().collect())
    }

    /// Builds the config from an explicit variable map.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| vars.get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match get("BRIDGE_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: "BRIDGE_PORT".to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => 3000,
        };

        let bot_host = get("BOT_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let bot_port = get("BOT_PORT").unwrap_or_else(|| "3001".to_string());
        let bot_url = format!("http://{}:{}", bot_host, bot_port);
        let bot_events_url = get("BOT_EVENTS_URL").unwrap_or_else(|| format!("ws://{}:{}/events", bot_host, bot_port));

        let mut categories = CategoryTable::default();
        for category in EventCategory::ALL {
            let key = format!("EVENT_CAPACITY_{}", category.as_str().to_uppercase());
            if let Some(raw) = get(&key) {
                let capacity = raw
                    .parse::<usize>()
                    .ok()
                    .filter(|c| *c > 0)
                    .ok_or_else(|| ConfigError::InvalidValue {
                        key: key.clone(),
                        value: raw.clone(),
                        reason: "capacity must be a positive integer".to_string(),
                    })?;
                categories = categories.with_capacity(category, capacity);
            }
        }

        Ok(Self {
            port,
            bot_url,
            bot_events_url,
            bot_name: get("BOT_NAME").unwrap_or_else(|| "MCPBot".to_string()),
            decision_url: get("DECISION_URL"),
            rules_path: get("REACTION_RULES_PATH").unwrap_or_else(|| "config/reaction_rules.json".to_string()),
            categories,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::from_vars(HashMap::new()).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.bot_url, "http://127.0.0.1:3001");
        assert_eq!(config.bot_events_url, "ws://127.0.0.1:3001/events");
        assert_eq!(config.bot_name, "MCPBot");
        assert!(config.decision_url.is_none());
        assert_eq!(config.categories.capacity(EventCategory::Communication), 50);
    }

    #[test]
    fn test_overrides() {
        let config = BridgeConfig::from_vars(vars(&[
            ("BRIDGE_PORT", "8080"),
            ("BOT_HOST", "10.0.0.5"),
            ("DECISION_URL", "http://llm:9000/decide"),
            ("EVENT_CAPACITY_ENTITIES", "5"),
            ("BOT_NAME", "  "),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.bot_url, "http://10.0.0.5:3001");
        assert_eq!(config.decision_url.as_deref(), Some("http://llm:9000/decide"));
        assert_eq!(config.categories.capacity(EventCategory::Entities), 5);
        assert_eq!(config.bot_name, "MCPBot");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(BridgeConfig::from_vars(vars(&[("BRIDGE_PORT", "http")])).is_err());
        assert!(BridgeConfig::from_vars(vars(&[("EVENT_CAPACITY_BOT", "0")])).is_err());
        assert!(BridgeConfig::from_vars(vars(&[("EVENT_CAPACITY_WORLD", "-3")])).is_err());
    }
}
