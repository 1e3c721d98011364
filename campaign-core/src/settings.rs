//! Provider credentials and generation preferences, persisted under
//! `settings`.

use crate::generate::GeneratorConfig;
use ai_gateway::{ChatConfig, Error, ImageConfig, Provider};
use serde::{Deserialize, Serialize};

const DEFAULT_LANGUAGE: &str = "English";
const DEFAULT_TEMPERATURE: f32 = 0.8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub provider: Provider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_model: Option<String>,
    /// Language generated content is written in.
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            api_key: None,
            base_url: None,
            text_model: None,
            image_model: None,
            language: default_language(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Values taken from `AI_*` variables for one session. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsOverrides {
    pub provider: Option<Provider>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub text_model: Option<String>,
    pub image_model: Option<String>,
    pub language: Option<String>,
}

impl SettingsOverrides {
    /// Read `AI_PROVIDER`, `AI_API_KEY`, `AI_BASE_URL`, `AI_MODEL`,
    /// `AI_IMAGE_MODEL` and `AI_LANGUAGE`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`SettingsOverrides::from_env`] with a custom lookup. Blank
    /// values are ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let provider = get("AI_PROVIDER").and_then(|p| match p.parse() {
            Ok(provider) => Some(provider),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring AI_PROVIDER");
                None
            }
        });
        Self {
            provider,
            api_key: get("AI_API_KEY"),
            base_url: get("AI_BASE_URL"),
            text_model: get("AI_MODEL"),
            image_model: get("AI_IMAGE_MODEL"),
            language: get("AI_LANGUAGE"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Layer these values over `settings`.
    pub fn apply(&self, mut settings: Settings) -> Settings {
        if let Some(provider) = self.provider {
            settings.provider = provider;
        }
        if let Some(key) = &self.api_key {
            settings.api_key = Some(key.clone());
        }
        if let Some(url) = &self.base_url {
            settings.base_url = Some(url.clone());
        }
        if let Some(model) = &self.text_model {
            settings.text_model = Some(model.clone());
        }
        if let Some(model) = &self.image_model {
            settings.image_model = Some(model.clone());
        }
        if let Some(language) = &self.language {
            settings.language = language.clone();
        }
        settings
    }
}

impl Settings {
    /// These settings with the `AI_*` environment variables applied.
    pub fn with_env_overrides(self) -> Self {
        SettingsOverrides::from_env().apply(self)
    }

    /// Same as [`Settings::with_env_overrides`] with a custom lookup.
    pub fn with_overrides_from(self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        SettingsOverrides::from_lookup(lookup).apply(self)
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    fn key(&self) -> Result<&str, Error> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(Error::NoApiKey)
    }

    /// Chat client configuration. Fails with [`Error::NoApiKey`] when no
    /// credential has been entered.
    pub fn chat_config(&self) -> Result<ChatConfig, Error> {
        let mut config = ChatConfig::new(self.provider, self.key()?);
        if let Some(url) = &self.base_url {
            config = config.with_base_url(url.as_str());
        }
        if let Some(model) = &self.text_model {
            config = config.with_model(model.as_str());
        }
        Ok(config)
    }

    pub fn image_config(&self) -> Result<ImageConfig, Error> {
        let mut config = ImageConfig::new(self.provider, self.key()?);
        if let Some(url) = &self.base_url {
            config = config.with_base_url(url.as_str());
        }
        if let Some(model) = &self.image_model {
            config = config.with_model(model.as_str());
        }
        Ok(config)
    }

    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            temperature: self.temperature,
            language: self.language.clone(),
            ..GeneratorConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_missing_key_is_no_api_key() {
        let settings = Settings::default();
        assert!(!settings.has_credentials());
        assert!(matches!(settings.chat_config(), Err(Error::NoApiKey)));

        let blank = Settings {
            api_key: Some("   ".to_string()),
            ..Settings::default()
        };
        assert!(matches!(blank.image_config(), Err(Error::NoApiKey)));
    }

    #[test]
    fn test_overrides_win_over_stored_values() {
        let stored = Settings {
            api_key: Some("stored".to_string()),
            text_model: Some("stored-model".to_string()),
            ..Settings::default()
        };
        let env: HashMap<&str, &str> = [
            ("AI_PROVIDER", "openai"),
            ("AI_API_KEY", "from-env"),
            ("AI_MODEL", ""),
        ]
        .into_iter()
        .collect();

        let settings = stored.with_overrides_from(|name| env.get(name).map(|v| v.to_string()));
        assert_eq!(settings.provider, Provider::OpenAi);
        assert_eq!(settings.api_key.as_deref(), Some("from-env"));
        // Blank values do not override.
        assert_eq!(settings.text_model.as_deref(), Some("stored-model"));

        let config = settings.chat_config().unwrap();
        assert_eq!(config.base_url(), "https://api.openai.com/v1");
        assert_eq!(config.model, "stored-model");
    }

    #[test]
    fn test_empty_overrides_change_nothing() {
        let overrides = SettingsOverrides::from_lookup(|_| Some("  ".to_string()));
        assert!(overrides.is_empty());

        let stored = Settings {
            language: "Русский".to_string(),
            ..Settings::default()
        };
        assert_eq!(overrides.apply(stored.clone()), stored);
    }

    #[test]
    fn test_sparse_document_uses_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"apiKey": "k"}"#).unwrap();
        assert_eq!(settings.provider, Provider::OpenRouter);
        assert_eq!(settings.language, "English");
        assert!(settings.has_credentials());
        assert_eq!(settings.generator_config().language, "English");
    }
}
