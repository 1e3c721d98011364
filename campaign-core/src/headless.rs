//! Headless campaign interface for programmatic use.
//!
//! Wires the real AI and bestiary clients into a [`Campaign`] from a
//! directory and [`Settings`]. Designed for:
//! - The `keeper` command-line front end
//! - Scripted sessions against a real provider
//!
//! # Example
//!
//! ```ignore
//! use campaign_core::headless::{open_campaign, HeadlessConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = HeadlessConfig::new("./my-campaign");
//!     let mut campaign = open_campaign(config).await?;
//!     println!("{} party members", campaign.party().len());
//!     Ok(())
//! }
//! ```

use crate::bestiary::Dnd5eApi;
use crate::campaign::{Campaign, CampaignError, CampaignServices};
use crate::settings::{Settings, SettingsOverrides};
use crate::store::{CampaignStore, Collection};
use ai_gateway::{ChatClient, ImageClient, ImageModel, TextModel};
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for a headless campaign.
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    /// Directory holding the campaign's documents and blobs.
    pub dir: PathBuf,
    /// Apply `AI_*` environment variables over the stored settings.
    pub env_overrides: bool,
    /// Base URL of the monster reference, if not the public one.
    pub bestiary_url: Option<String>,
}

impl HeadlessConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            env_overrides: true,
            bestiary_url: None,
        }
    }

    pub fn without_env(mut self) -> Self {
        self.env_overrides = false;
        self
    }

    pub fn with_bestiary_url(mut self, url: impl Into<String>) -> Self {
        self.bestiary_url = Some(url.into());
        self
    }
}

/// Build the text and image clients for `settings`.
///
/// Without an API key the text client is still built; every call then
/// fails with a 401-style error the front end turns into a settings prompt.
pub fn build_models(
    settings: &Settings,
) -> Result<(Arc<dyn TextModel>, Option<Arc<dyn ImageModel>>), CampaignError> {
    let chat_config = match settings.chat_config() {
        Ok(config) => config,
        Err(ai_gateway::Error::NoApiKey) => {
            tracing::warn!("no API key configured, AI features will ask for one");
            ai_gateway::ChatConfig::new(settings.provider, "")
        }
        Err(e) => return Err(e.into()),
    };
    let text: Arc<dyn TextModel> = Arc::new(ChatClient::new(chat_config)?);

    let images: Option<Arc<dyn ImageModel>> = match settings.image_config() {
        Ok(config) => Some(Arc::new(ImageClient::new(config)?)),
        Err(_) => None,
    };
    Ok((text, images))
}

/// Open the campaign in `config.dir` with live services.
pub async fn open_campaign(config: HeadlessConfig) -> Result<Campaign, CampaignError> {
    let store = CampaignStore::open(&config.dir).await?;
    let stored = match store.load::<Settings>(Collection::Settings).await {
        Ok(settings) => settings.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "stored settings unreadable, using defaults");
            Settings::default()
        }
    };
    let overrides = if config.env_overrides {
        SettingsOverrides::from_env()
    } else {
        SettingsOverrides::default()
    };

    let (text, images) = build_models(&overrides.apply(stored))?;
    let bestiary = match &config.bestiary_url {
        Some(url) => Dnd5eApi::with_base_url(url.clone()),
        None => Dnd5eApi::new(),
    };

    let mut services = CampaignServices::new(text, Arc::new(bestiary));
    if let Some(images) = images {
        services = services.with_images(images);
    }

    let mut campaign = Campaign::open(&config.dir, services).await?;
    if !overrides.is_empty() {
        campaign.set_overrides(overrides);
    }
    Ok(campaign)
}

/// Store settings the GM changed and re-create the clients from them.
///
/// Session overrides still apply on top and are not written.
pub async fn reconfigure(campaign: &mut Campaign, settings: Settings) -> Result<(), CampaignError> {
    campaign.update_settings(settings).await?;
    let (text, images) = build_models(&campaign.effective_settings())?;
    campaign.set_text_model(text);
    if let Some(images) = images {
        campaign.set_image_model(images);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_models_build_without_key() {
        let settings = Settings::default();
        let (_, images) = build_models(&settings).unwrap();
        assert!(images.is_none());
    }

    #[tokio::test]
    async fn test_open_campaign_in_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let campaign = open_campaign(HeadlessConfig::new(dir.path()).without_env())
            .await
            .unwrap();
        assert!(campaign.party().is_empty());
        assert!(campaign.corrupt_keys().is_empty());
    }
}
