//! Provider traits for the external generation services
//!
//! The pipeline only sees these traits, so the OpenAI-compatible client can be
//! swapped for scripted generators in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Text-generation provider errors
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Empty response")]
    Empty,
}

/// Image-generation provider errors
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("{0}")]
    InvalidPrompt(String),

    #[error("Invalid image request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("No image data returned")]
    NoData,
}

/// Produces free text for a single prompt
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &'static str;

    /// Complete a prompt, returning the raw response text
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Supported output sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageSize {
    #[serde(rename = "1024x1024")]
    Square,
    #[serde(rename = "1792x1024")]
    Landscape,
    #[serde(rename = "1024x1792")]
    Portrait,
}

impl ImageSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSize::Square => "1024x1024",
            ImageSize::Landscape => "1792x1024",
            ImageSize::Portrait => "1024x1792",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "1024x1024" => Some(ImageSize::Square),
            "1792x1024" => Some(ImageSize::Landscape),
            "1024x1792" => Some(ImageSize::Portrait),
            _ => None,
        }
    }
}

/// One generated image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub url: String,
    pub revised_prompt: Option<String>,
}

/// Produces one image per call
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(
        &self,
        prompt: &str,
        size: ImageSize,
    ) -> Result<GeneratedImage, ImageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_size_parse() {
        assert_eq!(ImageSize::parse("1024x1024"), Some(ImageSize::Square));
        assert_eq!(ImageSize::parse(" 1792x1024 "), Some(ImageSize::Landscape));
        assert_eq!(ImageSize::parse("512x512"), None);
        assert_eq!(ImageSize::Portrait.as_str(), "1024x1792");
    }
}
