// [[CRAFTLINK]]/apps/bridge-server/src/reactions.rs
// Purpose: Reaction Dispatcher. Runs at most one isolated reaction per admitted event.
// Architecture: Cortex Layer
// Dependencies: Registry, Actuator

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::actuator::Actuator;
use crate::error::ReactionError;
use crate::events::Event;
use crate::observability::BridgeMetrics;
use crate::registry::{ReactionKind, ReactionRules};

/// Injected reaction capability. Called synchronously from admission, so
/// implementations that need I/O must hand it off to a task.
pub trait ReactionHandler: Send + Sync {
    fn react(&self, kind: ReactionKind, event: &Event, bot: &Arc<dyn Actuator>) -> Result<(), ReactionError>;
}

/// Default handler: records the reaction in the log and does nothing else.
pub struct LoggingReactor;

impl ReactionHandler for LoggingReactor {
    fn react(&self, kind: ReactionKind, event: &Event, _bot: &Arc<dyn Actuator>) -> Result<(), ReactionError> {
        match kind {
            ReactionKind::SpecialChat => tracing::info!("Special chat event #{}: {}", event.id, event.payload),
            ReactionKind::LowHealth => tracing::warn!("Low health event #{}: {}", event.id, event.payload),
            ReactionKind::HostileMob => tracing::warn!("Hostile mob detected near bot (event #{}): {}", event.id, event.payload),
        }
        Ok(())
    }
}

pub struct ReactionDispatcher {
    rules: ReactionRules,
    handler: Arc<dyn ReactionHandler>,
    bot: Arc<dyn Actuator>,
    metrics: Arc<BridgeMetrics>,
}

impl ReactionDispatcher {
    pub fn new(
        rules: ReactionRules,
        handler: Arc<dyn ReactionHandler>,
        bot: Arc<dyn Actuator>,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        Self {
            rules,
            handler,
            bot,
            metrics,
        }
    }

    /// Evaluates the event against the rules and invokes the handler once if it
    /// qualifies. Handler errors and panics are contained here.
    pub fn dispatch(&self, event: &Event) -> Option<ReactionKind> {
        let kind = self.rules.classify(event)?;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.handler.react(kind, event, &self.bot)));
        match outcome {
            Ok(Ok(())) => {
                self.metrics.reaction_fired();
                tracing::debug!("Reaction {:?} fired for event #{} ({})", kind, event.id, event.event_type);
            }
            Ok(Err(e)) => {
                self.metrics.reaction_failed();
                tracing::error!("Error triggering {:?} reaction for event #{}: {}", kind, event.id, e);
            }
            Err(_) => {
                self.metrics.reaction_failed();
                tracing::error!("{:?} reaction panicked for event #{}", kind, event.id);
            }
        }

        Some(kind)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    #[derive(Clone, Copy, PartialEq)]
    pub enum Behaviour {
        Succeed,
        Fail,
        Panic,
    }

    /// Records every call; can be told to fail or panic.
    pub struct RecordingReactor {
        behaviour: Behaviour,
        calls: Mutex<Vec<(ReactionKind, u64)>>,
    }

    impl RecordingReactor {
        pub fn new(behaviour: Behaviour) -> Self {
            Self {
                behaviour,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> Vec<(ReactionKind, u64)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ReactionHandler for RecordingReactor {
        fn react(&self, kind: ReactionKind, event: &Event, _bot: &Arc<dyn Actuator>) -> Result<(), ReactionError> {
            self.calls.lock().unwrap().push((kind, event.id));
            match self.behaviour {
                Behaviour::Succeed => Ok(()),
                Behaviour::Fail => Err(ReactionError::Failed("decision service down".to_string())),
                Behaviour::Panic => panic!("reaction exploded"),
            }
        }
    }
}
