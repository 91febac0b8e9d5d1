// [[CRAFTLINK]]/apps/bridge-server/src/decision.rs
// Purpose: Decision-backed reactions. Hands qualifying events to the external model and
//          turns its reply into bot actions.
// Architecture: Cortex Layer
// Dependencies: reqwest, async-trait, tokio

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::actuator::Actuator;
use crate::error::ReactionError;
use crate::events::Event;
use crate::models::CommandArg;
use crate::reactions::ReactionHandler;
use crate::registry::ReactionKind;

const FALLBACK_CHAT: &str = "I received your message!";
const DEFAULT_CHAT: &str = "Hello!";

#[derive(Debug, Serialize)]
struct DecisionRequest<'a> {
    kind: ReactionKind,
    event: &'a Event,
    prompt: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Decision {
    pub text: String,
}

/// Opaque "what should the bot do" call.
#[async_trait]
pub trait DecisionMaker: Send + Sync {
    async fn decide(&self, kind: ReactionKind, event: &Event, prompt: String) -> Result<Decision, ReactionError>;
}

pub struct HttpDecisionClient {
    client: reqwest::Client,
    url: String,
}

impl HttpDecisionClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl DecisionMaker for HttpDecisionClient {
    async fn decide(&self, kind: ReactionKind, event: &Event, prompt: String) -> Result<Decision, ReactionError> {
        tracing::debug!("Requesting decision for {:?} event #{} from {}", kind, event.id, self.url);
        let response = self
            .client
            .post(&self.url)
            .json(&DecisionRequest { kind, event, prompt })
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ReactionError::Failed(format!("decision request failed: {}", e)))?;

        response
            .json::<Decision>()
            .await
            .map_err(|e| ReactionError::Failed(format!("malformed decision: {}", e)))
    }
}

/// Reaction handler that consults a `DecisionMaker` on a background task.
pub struct DecisionReactor {
    decider: Arc<dyn DecisionMaker>,
    bot_name: String,
}

impl DecisionReactor {
    pub fn new(decider: Arc<dyn DecisionMaker>, bot_name: impl Into<String>) -> Self {
        Self {
            decider,
            bot_name: bot_name.into(),
        }
    }
}

impl ReactionHandler for DecisionReactor {
    fn react(&self, kind: ReactionKind, event: &Event, bot: &Arc<dyn Actuator>) -> Result<(), ReactionError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| ReactionError::NoRuntime)?;
        let decider = self.decider.clone();
        let bot = bot.clone();
        let event = event.clone();
        let bot_name = self.bot_name.clone();

        handle.spawn(async move {
            respond(decider.as_ref(), kind, &event, bot.as_ref(), &bot_name).await;
        });
        Ok(())
    }
}

pub(crate) async fn respond(decider: &dyn DecisionMaker, kind: ReactionKind, event: &Event, bot: &dyn Actuator, bot_name: &str) {
    let prompt = build_prompt(kind, event, bot_name);

    match kind {
        ReactionKind::SpecialChat => {
            let reply = match decider.decide(kind, event, prompt).await {
                Ok(decision) => {
                    tracing::info!("Decision for chat event #{}: {}", event.id, decision.text);
                    if event.event_type == "whisper" {
                        Some(decision.text.trim().to_string()).filter(|t| !t.is_empty())
                    } else {
                        chat_reply(&decision.text)
                    }
                }
                Err(e) => {
                    tracing::error!("Decision failed for chat event #{}: {}", event.id, e);
                    Some(FALLBACK_CHAT.to_string())
                }
            };
            if let Some(message) = reply {
                send_reply(bot, event, message).await;
            }
        }
        ReactionKind::LowHealth | ReactionKind::HostileMob => {
            // live health, not the value carried by the event
            let prompt = match kind {
                ReactionKind::LowHealth => match bot.health().await {
                    Ok(current) => format!("{} Current health: {}.", prompt, current),
                    Err(_) => prompt,
                },
                _ => prompt,
            };
            match decider.decide(kind, event, prompt).await {
                Ok(decision) => tracing::info!("Decision for {:?} event #{}: {}", kind, event.id, decision.text),
                Err(e) => tracing::warn!("No decision for {:?} event #{}: {}", kind, event.id, e),
            }
        }
    }
}

async fn send_reply(bot: &dyn Actuator, event: &Event, message: String) {
    let (command, args) = match (event.event_type.as_str(), event.payload_str("username")) {
        ("whisper", Some(username)) => ("whisper", vec![CommandArg::from(username), CommandArg::Text(message)]),
        _ => ("chat", vec![CommandArg::Text(message)]),
    };

    match bot.issue(command, &args).await {
        Ok(outcome) => outcome.discard(command),
        Err(e) => tracing::error!("Failed to send {} reply for event #{}: {}", command, event.id, e),
    }
}

fn build_prompt(kind: ReactionKind, event: &Event, bot_name: &str) -> String {
    let event_json = serde_json::to_string(event).unwrap_or_default();
    match kind {
        ReactionKind::SpecialChat if event.event_type == "whisper" => format!(
            "You are the Minecraft bot's AI assistant responding to a whisper from a player. \
             Keep responses concise and relevant to Minecraft gameplay. Just provide the bot's reply message. \
             Your bot's name is {}. Whisper from {}: {}. What should the bot respond with?",
            bot_name,
            event.payload_str("username").unwrap_or("unknown"),
            event.payload_str("message").unwrap_or("")
        ),
        ReactionKind::SpecialChat => format!(
            "Special chat event: {}. What should the bot do or say in response?",
            event_json
        ),
        ReactionKind::LowHealth => format!(
            "The bot's health is low: {}. Decide how the bot should get to safety or heal.",
            event_json
        ),
        ReactionKind::HostileMob => format!(
            "A hostile mob spawned near the bot: {}. Decide what the bot should do.",
            event_json
        ),
    }
}

/// A reply is sent only when the decision talks about chatting; the first
/// double-quoted span is the message.
pub fn chat_reply(decision: &str) -> Option<String> {
    // keywords are matched case-sensitively
    if !decision.contains("chat") && !decision.contains("say") {
        return None;
    }
    let quoted = decision
        .split('"')
        .nth(1)
        .filter(|_| decision.matches('"').count() >= 2);
    Some(quoted.unwrap_or(DEFAULT_CHAT).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::mock::ScriptedActuator;
    use serde_json::json;
    use std::sync::Mutex;

    struct FixedDecider {
        reply: Option<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl FixedDecider {
        fn answering(text: &str) -> Self {
            Self {
                reply: Some(text.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: None,
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl DecisionMaker for FixedDecider {
        async fn decide(&self, _kind: ReactionKind, _event: &Event, prompt: String) -> Result<Decision, ReactionError> {
            self.prompts.lock().unwrap().push(prompt);
            match &self.reply {
                Some(text) => Ok(Decision { text: text.clone() }),
                None => Err(ReactionError::Failed("model offline".to_string())),
            }
        }
    }

    fn chat(message: &str) -> Event {
        Event::new(9, "chat", 0, json!({"username": "alex", "message": message}))
    }

    #[test]
    fn test_chat_reply_extracts_quoted_message() {
        assert_eq!(chat_reply(r#"I would say "on my way!" and walk over"#), Some("on my way!".to_string()));
        assert_eq!(chat_reply("Just chat back politely"), Some("Hello!".to_string()));
        assert_eq!(chat_reply("Walk towards the player"), None);
        assert_eq!(chat_reply(r#"say "unterminated"#), Some("Hello!".to_string()));
        assert_eq!(chat_reply(r#"Say "hi" to them"#), None);
        assert_eq!(chat_reply("CHAT with the player"), None);
    }

    #[tokio::test]
    async fn test_special_chat_sends_decided_message() {
        let decider = FixedDecider::answering(r#"I would say "coming!""#);
        let bot = ScriptedActuator::new();
        respond(&decider, ReactionKind::SpecialChat, &chat("bot come here"), &bot, "MCPBot").await;

        assert_eq!(bot.issued(), vec![("chat".to_string(), vec![CommandArg::from("coming!")])]);
        assert!(decider.prompts.lock().unwrap()[0].starts_with("Special chat event:"));
    }

    #[tokio::test]
    async fn test_failed_decision_falls_back_to_acknowledgement() {
        let decider = FixedDecider::failing();
        let bot = ScriptedActuator::new();
        respond(&decider, ReactionKind::SpecialChat, &chat("help"), &bot, "MCPBot").await;

        assert_eq!(bot.issued(), vec![("chat".to_string(), vec![CommandArg::from(FALLBACK_CHAT)])]);
    }

    #[tokio::test]
    async fn test_whisper_is_answered_privately() {
        let decider = FixedDecider::answering("Sure, meet me at spawn.");
        let bot = ScriptedActuator::new();
        let whisper = Event::new(3, "whisper", 0, json!({"username": "alex", "message": "where are you?"}));
        respond(&decider, ReactionKind::SpecialChat, &whisper, &bot, "MCPBot").await;

        assert_eq!(
            bot.issued(),
            vec![(
                "whisper".to_string(),
                vec![CommandArg::from("alex"), CommandArg::from("Sure, meet me at spawn.")]
            )]
        );
        assert!(decider.prompts.lock().unwrap()[0].contains("Your bot's name is MCPBot"));
    }

    #[tokio::test]
    async fn test_hostile_mob_decision_issues_nothing() {
        let decider = FixedDecider::answering("Run away and say nothing");
        let bot = ScriptedActuator::new();
        let spawn = Event::new(5, "entitySpawn", 0, json!({"entityType": "zombie"}));
        respond(&decider, ReactionKind::HostileMob, &spawn, &bot, "MCPBot").await;

        assert!(bot.issued().is_empty());
        assert_eq!(decider.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_low_health_prompt_includes_current_health() {
        let decider = FixedDecider::answering("Eat something");
        let bot = ScriptedActuator::new();
        let hurt = Event::new(6, "healthChanged", 0, json!({"health": 4}));
        respond(&decider, ReactionKind::LowHealth, &hurt, &bot, "MCPBot").await;

        assert!(bot.issued().is_empty());
        assert!(decider.prompts.lock().unwrap()[0].ends_with("Current health: 20."));
    }

    #[tokio::test]
    async fn test_http_decision_client_contract() {
        use crate::actuator::mock::serve;
        use axum::{routing::post, Json, Router};
        use serde_json::Value;

        async fn good(Json(body): Json<Value>) -> Json<Value> {
            let reply = format!("say \"{} noted\"", body["kind"].as_str().unwrap_or_default());
            Json(json!({ "text": reply }))
        }
        async fn malformed() -> &'static str {
            "thinking..."
        }

        let base = serve(Router::new().route("/good", post(good)).route("/bad", post(malformed))).await;
        let event = chat("bot help");

        let client = HttpDecisionClient::new(format!("{}/good", base));
        let decision = client
            .decide(ReactionKind::SpecialChat, &event, "prompt".to_string())
            .await
            .unwrap();
        assert_eq!(decision.text, r#"say "specialChat noted""#);
        assert_eq!(chat_reply(&decision.text), Some("specialChat noted".to_string()));

        let client = HttpDecisionClient::new(format!("{}/bad", base));
        let err = client
            .decide(ReactionKind::SpecialChat, &event, "prompt".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, ReactionError::Failed(ref reason) if reason.starts_with("malformed decision")));
    }

    #[tokio::test]
    async fn test_reactor_runs_in_background() {
        let decider: Arc<dyn DecisionMaker> = Arc::new(FixedDecider::answering(r#"chat "hi""#));
        let reactor = DecisionReactor::new(decider, "MCPBot");
        let concrete = Arc::new(ScriptedActuator::new());
        let bot: Arc<dyn Actuator> = concrete.clone();

        reactor.react(ReactionKind::SpecialChat, &chat("hey bot"), &bot).unwrap();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(concrete.issued().len(), 1);
    }

    #[test]
    fn test_reactor_without_runtime_reports_error() {
        let decider: Arc<dyn DecisionMaker> = Arc::new(FixedDecider::failing());
        let reactor = DecisionReactor::new(decider, "MCPBot");
        let bot: Arc<dyn Actuator> = Arc::new(ScriptedActuator::new());
        let err = reactor.react(ReactionKind::LowHealth, &chat("x"), &bot).unwrap_err();
        assert!(matches!(err, ReactionError::NoRuntime));
    }
}
