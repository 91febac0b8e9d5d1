// [[CRAFTLINK]]/apps/bridge-server/src/error.rs
// Purpose: Error taxonomy for the bridge. Every variant ends up as a structured tool result.
// Architecture: Cross-cutting
// Dependencies: thiserror

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown event category '{0}'")]
pub struct UnknownCategory(pub String);

#[derive(Error, Debug)]
pub enum ActuatorError {
    #[error("Command '{command}' rejected by bot: {reason}")]
    Rejected { command: String, reason: String },
    #[error("Command '{command}' failed: {reason}")]
    Failed { command: String, reason: String },
    #[error("Bot sidecar unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Unexpected sidecar response: {0}")]
    Protocol(String),
}

#[derive(Error, Debug)]
pub enum MovementError {
    #[error("Invalid movement request: {0}")]
    InvalidRequest(String),
    #[error("A movement run is already in progress")]
    Busy,
    #[error(transparent)]
    Actuator(#[from] ActuatorError),
}

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Invalid entity ID: {0}. Must be a number.")]
    InvalidEntityId(String),
    #[error("Entity with ID {0} not found")]
    EntityNotFound(i64),
    #[error("Target too far ({distance:.2} blocks). Must be within {max} blocks to attack.")]
    TargetTooFar { distance: f64, max: f64 },
    #[error("Invalid parameter for '{command}': {reason}")]
    InvalidParameter { command: String, reason: String },
    #[error(transparent)]
    Movement(#[from] MovementError),
    #[error(transparent)]
    Actuator(#[from] ActuatorError),
}

#[derive(Error, Debug, PartialEq)]
pub enum InspectError {
    #[error("Bot state could not be encoded for inspection: {0}")]
    Encoding(String),
    #[error("Property path must not be empty")]
    EmptyPath,
    #[error("Property '{property}' is not inspectable. Allowed: {allowed}")]
    NotAllowed { property: String, allowed: String },
    #[error("Property path '{path}' exceeds the maximum depth of {max}")]
    TooDeep { path: String, max: usize },
    #[error("Property path '{parent}' is null. Cannot access '{segment}' in '{path}'")]
    NullValue { parent: String, segment: String, path: String },
    #[error("Property path '{parent}' is not an object (type: {kind}). Cannot access '{segment}' in '{path}'")]
    NotAnObject { parent: String, kind: &'static str, segment: String, path: String },
    #[error("Property '{segment}' not found in '{parent}'. Available properties: {available}")]
    NotFound { parent: String, segment: String, available: String },
}

#[derive(Error, Debug)]
pub enum ReactionError {
    #[error("No async runtime available to run the reaction")]
    NoRuntime,
    #[error("Reaction failed: {0}")]
    Failed(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidValue { key: String, value: String, reason: String },
}

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Event feed connection failed: {0}")]
    Connect(#[from] tungstenite::Error),
    #[error("Event feed closed by remote")]
    Closed,
}
