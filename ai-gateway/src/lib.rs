//! Minimal AI gateway for campaign content generation.
//!
//! This crate provides:
//! - A chat-completion client for two interchangeable providers
//!   (OpenRouter and OpenAI) selected by a base-URL switch
//! - An image-generation client returning base64 payloads
//! - JSON extraction heuristics for model output wrapped in prose or fences
//! - A generic retry-with-backoff combinator used by every AI call
//!
//! # Quick Start
//!
//! ```ignore
//! use ai_gateway::{ChatClient, ChatRequest, Message, TextModel};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ai_gateway::Error> {
//!     let client = ChatClient::from_env()?;
//!     let request = ChatRequest::new(vec![Message::user("Name a tavern")]).json_mode();
//!     let text = client.complete_text(request).await?;
//!     println!("{text}");
//!     Ok(())
//! }
//! ```

pub mod chat;
pub mod error;
pub mod image;
pub mod json;
pub mod retry;

pub use chat::{
    ChatClient, ChatConfig, ChatRequest, ChatResponse, Message, Provider, Role, TextModel, Usage,
};
pub use error::Error;
pub use image::{AspectRatio, GeneratedImage, ImageClient, ImageConfig, ImageModel};
pub use json::{extract_json, lenient_string, lenient_vec, parse_json};
pub use retry::{retry, RetryPolicy};
