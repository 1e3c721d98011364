//! Image-generation client.

use crate::chat::Provider;
use crate::error::{provider_message, Error};
use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";

/// Requested image shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AspectRatio {
    #[default]
    Square,
    Landscape,
    Portrait,
}

impl AspectRatio {
    /// The provider size string for this ratio.
    pub fn size(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1024x1024",
            AspectRatio::Landscape => "1792x1024",
            AspectRatio::Portrait => "1024x1792",
        }
    }
}

/// A generated image as returned by the provider.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub base64: String,
    pub revised_prompt: Option<String>,
}

impl GeneratedImage {
    /// Decode the base64 payload into raw image bytes.
    pub fn decode(&self) -> Result<Vec<u8>, Error> {
        base64::engine::general_purpose::STANDARD
            .decode(self.base64.trim())
            .map_err(|e| Error::Parse(format!("invalid base64 image: {e}")))
    }
}

/// Anything that can turn a prompt into an image.
#[async_trait]
pub trait ImageModel: Send + Sync {
    async fn generate_image(
        &self,
        prompt: &str,
        aspect: AspectRatio,
    ) -> Result<GeneratedImage, Error>;
}

/// Connection settings for an [`ImageClient`].
#[derive(Debug, Clone)]
pub struct ImageConfig {
    pub provider: Provider,
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: String,
}

impl ImageConfig {
    pub fn new(provider: Provider, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            base_url: None,
            model: DEFAULT_IMAGE_MODEL.to_string(),
        }
    }

    /// Read `AI_PROVIDER`, `AI_API_KEY`, `AI_BASE_URL` and `AI_IMAGE_MODEL`.
    pub fn from_env() -> Result<Self, Error> {
        let api_key = std::env::var("AI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(Error::NoApiKey)?;
        let provider = match std::env::var("AI_PROVIDER") {
            Ok(p) => p.parse()?,
            Err(_) => Provider::default(),
        };

        let mut config = Self::new(provider, api_key);
        if let Ok(url) = std::env::var("AI_BASE_URL") {
            config = config.with_base_url(url);
        }
        if let Ok(model) = std::env::var("AI_IMAGE_MODEL") {
            config = config.with_model(model);
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.base_url = Some(url.trim_end_matches('/').to_string());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }
}

/// Image-generation client.
#[derive(Clone)]
pub struct ImageClient {
    client: reqwest::Client,
    config: ImageConfig,
}

impl ImageClient {
    pub fn new(config: ImageConfig) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(180))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self, Error> {
        Self::new(ImageConfig::from_env()?)
    }

    fn build_request(&self, prompt: &str, aspect: AspectRatio) -> ApiImageRequest {
        ApiImageRequest {
            model: self.config.model.clone(),
            prompt: prompt.to_string(),
            n: 1,
            size: aspect.size().to_string(),
            response_format: "b64_json".to_string(),
        }
    }
}

#[async_trait]
impl ImageModel for ImageClient {
    async fn generate_image(
        &self,
        prompt: &str,
        aspect: AspectRatio,
    ) -> Result<GeneratedImage, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
                .map_err(|e| Error::Config(format!("Invalid API key: {e}")))?,
        );

        tracing::debug!(model = %self.config.model, size = aspect.size(), "requesting image");

        let response = self
            .client
            .post(format!("{}/images/generations", self.config.base_url()))
            .headers(headers)
            .json(&self.build_request(prompt, aspect))
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status,
                message: provider_message(&body),
            });
        }

        let api_response: ApiImageResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        parse_image_response(api_response)
    }
}

fn parse_image_response(response: ApiImageResponse) -> Result<GeneratedImage, Error> {
    let datum = response
        .data
        .into_iter()
        .next()
        .ok_or_else(|| Error::Parse("image response contained no data".to_string()))?;
    let base64 = datum
        .b64_json
        .filter(|b| !b.is_empty())
        .ok_or_else(|| Error::Parse("image response missing b64_json".to_string()))?;

    Ok(GeneratedImage {
        base64,
        revised_prompt: datum.revised_prompt,
    })
}

#[derive(Debug, Serialize)]
struct ApiImageRequest {
    model: String,
    prompt: String,
    n: u8,
    size: String,
    response_format: String,
}

#[derive(Debug, Deserialize)]
struct ApiImageResponse {
    #[serde(default)]
    data: Vec<ApiImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ApiImageDatum {
    #[serde(default)]
    b64_json: Option<String>,
    #[serde(default)]
    revised_prompt: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_sizes() {
        assert_eq!(AspectRatio::Square.size(), "1024x1024");
        assert_eq!(AspectRatio::Landscape.size(), "1792x1024");
        assert_eq!(AspectRatio::Portrait.size(), "1024x1792");
    }

    #[test]
    fn test_request_body() {
        let client = ImageClient::new(ImageConfig::new(Provider::OpenAi, "k")).unwrap();
        let body =
            serde_json::to_value(client.build_request("a ruined keep", AspectRatio::Landscape))
            .unwrap();

        assert_eq!(body["prompt"], "a ruined keep");
        assert_eq!(body["size"], "1792x1024");
        assert_eq!(body["response_format"], "b64_json");
        assert_eq!(body["n"], 1);
    }

    #[test]
    fn test_parse_and_decode() {
        let raw = r#"{"data": [{"b64_json": "aGVsbG8=", "revised_prompt": "hello"}]}"#;
        let image = parse_image_response(serde_json::from_str(raw).unwrap()).unwrap();

        assert_eq!(image.revised_prompt.as_deref(), Some("hello"));
        assert_eq!(image.decode().unwrap(), b"hello");
    }

    #[test]
    fn test_parse_empty_data() {
        let raw = r#"{"data": []}"#;
        assert!(matches!(
            parse_image_response(serde_json::from_str(raw).unwrap()),
            Err(Error::Parse(_))
        ));
    }
}
