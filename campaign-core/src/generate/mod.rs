//! AI content generation.
//!
//! Every generator builds a prompt, asks the model for a JSON object and
//! decodes it into a wire struct whose lists and strings are decoded
//! leniently. The request and the decode are retried together, so a
//! malformed answer gets the same second chance as a network failure.

mod creatures;
mod itinerary;
mod location;
mod loot;

pub use creatures::NpcBrief;
pub use location::LocationBrief;
pub use loot::LootBrief;

use ai_gateway::{parse_json, retry, ChatRequest, Message, RetryPolicy, TextModel};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

const DEFAULT_TEMPERATURE: f32 = 0.8;
const DEFAULT_MAX_TOKENS: usize = 2048;

/// Typed outcome of a generation call.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// The model answered, but not with usable JSON.
    #[error("Malformed AI response: {0}")]
    Malformed(String),

    #[error(transparent)]
    Provider(ai_gateway::Error),
}

impl GenerationError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, GenerationError::Provider(e) if e.is_unauthorized())
    }
}

impl From<ai_gateway::Error> for GenerationError {
    fn from(error: ai_gateway::Error) -> Self {
        match error {
            ai_gateway::Error::Parse(message) => GenerationError::Malformed(message),
            other => GenerationError::Provider(other),
        }
    }
}

/// Knobs shared by all generators.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    pub temperature: f32,
    pub max_tokens: usize,
    /// Language the generated prose is written in.
    pub language: String,
    pub retry: RetryPolicy,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            language: "English".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Prompts a [`TextModel`] for campaign content.
#[derive(Clone)]
pub struct Generator {
    model: Arc<dyn TextModel>,
    config: GeneratorConfig,
}

impl Generator {
    pub fn new(model: Arc<dyn TextModel>, config: GeneratorConfig) -> Self {
        Self { model, config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: GeneratorConfig) {
        self.config = config;
    }

    fn system_prompt(&self, role: &str) -> String {
        format!(
            "{role}\n\nWrite all names and prose in {}. Respond with a single JSON object \
             and nothing else: no markdown, no commentary.",
            self.config.language
        )
    }

    /// Send one JSON-mode request and decode the answer, with retries.
    async fn request_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        role: &str,
        prompt: String,
    ) -> Result<T, GenerationError> {
        let request = ChatRequest::new(vec![Message::user(prompt)])
            .with_system(self.system_prompt(role))
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens)
            .json_mode();

        retry(&self.config.retry, operation, || {
            let request = request.clone();
            let model = Arc::clone(&self.model);
            async move {
                let text = model.complete_text(request).await?;
                parse_json::<T>(&text)
            }
        })
        .await
        .map_err(GenerationError::from)
    }
}

// ============================================================================
// Lenient decoding helpers
// ============================================================================

/// A list of names: strings are kept, objects contribute their `name`
/// field, anything else is dropped. Non-arrays become empty.
pub(crate) fn lenient_names<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let Some(Value::Array(items)) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s),
            Value::Object(map) => map.get("name").and_then(Value::as_str).map(str::to_string),
            _ => None,
        })
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

/// A number that may arrive as a JSON number or a numeric string.
pub(crate) fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => parse_leading_number(&s),
        _ => None,
    })
}

/// "15 (natural armor)" -> 15, "1/4" -> 0.25.
fn parse_leading_number(text: &str) -> Option<f64> {
    let token = text.split_whitespace().next()?;
    if let Some((num, den)) = token.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        return (den != 0.0).then(|| num / den);
    }
    token
        .trim_end_matches(|c: char| !c.is_ascii_digit())
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;
    use std::time::Duration;

    #[derive(Debug, Deserialize)]
    struct Wire {
        #[serde(default, deserialize_with = "lenient_names")]
        names: Vec<String>,
        #[serde(default, deserialize_with = "lenient_number")]
        count: Option<f64>,
    }

    #[test]
    fn test_lenient_names() {
        let wire: Wire =
            serde_json::from_str(r#"{"names": ["Goblin", {"name": "Wolf"}, 3, " "]}"#).unwrap();
        assert_eq!(wire.names, ["Goblin", "Wolf"]);

        let wire: Wire = serde_json::from_str(r#"{"names": "Goblin"}"#).unwrap();
        assert!(wire.names.is_empty());
    }

    #[test]
    fn test_lenient_number() {
        let wire: Wire = serde_json::from_str(r#"{"count": "15 (natural armor)"}"#).unwrap();
        assert_eq!(wire.count, Some(15.0));
        let wire: Wire = serde_json::from_str(r#"{"count": "1/4"}"#).unwrap();
        assert_eq!(wire.count, Some(0.25));
        let wire: Wire = serde_json::from_str(r#"{"count": "many"}"#).unwrap();
        assert_eq!(wire.count, None);
    }

    #[test]
    fn test_parse_error_becomes_malformed() {
        let err = GenerationError::from(ai_gateway::Error::Parse("bad".to_string()));
        assert!(matches!(err, GenerationError::Malformed(_)));

        let err = GenerationError::from(ai_gateway::Error::Api {
            status: 401,
            message: "no".to_string(),
        });
        assert!(err.is_unauthorized());
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_answer_is_retried() {
        let model = Arc::new(ScriptedModel::new());
        model.push_text("Sorry, I cannot do that.");
        model.push_text("```json\n{\"names\": [\"Imp\"]}\n```");

        let generator = Generator::new(model.clone(), GeneratorConfig::default());
        let wire: Wire = generator
            .request_json("test", "You are a test.", "names please".to_string())
            .await
            .unwrap();

        assert_eq!(wire.names, ["Imp"]);
        assert_eq!(model.request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_after_all_retries() {
        let model = Arc::new(ScriptedModel::new());
        for _ in 0..3 {
            model.push_text("not json");
        }
        let config = GeneratorConfig {
            retry: RetryPolicy::new(2, Duration::from_millis(10)),
            ..GeneratorConfig::default()
        };
        let generator = Generator::new(model.clone(), config);
        let result: Result<Wire, _> = generator
            .request_json("test", "You are a test.", "x".to_string())
            .await;

        assert!(matches!(result, Err(GenerationError::Malformed(_))));
        assert_eq!(model.request_count(), 3);
    }

    #[tokio::test]
    async fn test_request_carries_language_and_json_mode() {
        let model = Arc::new(ScriptedModel::new());
        model.push_text(r#"{"names": []}"#);
        let config = GeneratorConfig {
            language: "Russian".to_string(),
            ..GeneratorConfig::default()
        };
        let generator = Generator::new(model.clone(), config);
        let _: Wire = generator
            .request_json("test", "You are a test.", "x".to_string())
            .await
            .unwrap();

        let request = model.last_request().unwrap();
        assert!(request.json_mode);
        assert!(request.system.unwrap().contains("Russian"));
    }
}
