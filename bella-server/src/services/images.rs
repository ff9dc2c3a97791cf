//! Branded marketing image generation

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::provider::{ImageError, ImageGenerator, ImageSize};
use crate::generation::fallback::BRAND_HANDLE;

pub const MIN_PROMPT_CHARS: usize = 10;
pub const MAX_PROMPT_CHARS: usize = 4000;

/// Largest image count accepted from a request
pub const MAX_REQUESTED_IMAGES: u32 = 4;

/// Images actually generated per request
pub const MAX_GENERATED_IMAGES: u32 = 3;

const PROHIBITED_WORDS: [&str; 5] = ["nude", "nsfw", "violent", "illegal", "harmful"];

/// Validate and trim a user prompt
pub fn validate_prompt(prompt: &str) -> Result<String, ImageError> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(ImageError::InvalidPrompt("Prompt cannot be empty".to_string()));
    }

    let chars = prompt.chars().count();
    if chars < MIN_PROMPT_CHARS {
        return Err(ImageError::InvalidPrompt(format!(
            "Prompt must be at least {} characters long",
            MIN_PROMPT_CHARS
        )));
    }
    if chars > MAX_PROMPT_CHARS {
        return Err(ImageError::InvalidPrompt(format!(
            "Prompt must be less than {} characters",
            MAX_PROMPT_CHARS
        )));
    }

    let lower = prompt.to_lowercase();
    if PROHIBITED_WORDS.iter().any(|word| lower.contains(word)) {
        return Err(ImageError::InvalidPrompt(
            "Prompt contains prohibited content".to_string(),
        ));
    }

    Ok(prompt.to_string())
}

/// Append the mandatory brand placement instruction
pub fn enhance_prompt_with_branding(prompt: &str) -> String {
    format!(
        "{}. MANDATORY: Include '{}' prominently and clearly visible in the image (on a sign, window display, wall art, business card, or digital screen). Make the branding professional and naturally integrated into the scene as if it's the business name.",
        prompt, BRAND_HANDLE
    )
}

/// Combine a refinement with the prompt it refines
///
/// Returns `prompt` unchanged unless both the base prompt and the details are
/// non-blank.
pub fn refine_prompt(prompt: &str, base_prompt: &str, details: &str) -> String {
    let base_prompt = base_prompt.trim();
    let details = details.trim();
    if base_prompt.is_empty() || details.is_empty() {
        prompt.trim().to_string()
    } else {
        format!("{}, {}", base_prompt, details)
    }
}

/// One slot of an image request; failed slots carry an error instead of a URL
#[derive(Debug, Clone, Serialize)]
pub struct ImageOutcome {
    pub index: u32,
    pub size: ImageSize,
    pub url: Option<String>,
    pub revised_prompt: Option<String>,
    pub error: Option<String>,
}

/// Result of one image request
#[derive(Debug, Clone, Serialize)]
pub struct ImageBatch {
    pub images: Vec<ImageOutcome>,
    /// Set when the requested count was reduced
    pub notice: Option<String>,
}

/// Sequential, paced image generation
#[derive(Clone)]
pub struct ImageService {
    generator: Arc<dyn ImageGenerator>,
    pause: Duration,
}

impl ImageService {
    pub fn new(generator: Arc<dyn ImageGenerator>) -> Self {
        Self {
            generator,
            pause: Duration::from_secs(1),
        }
    }

    /// Override the pause between consecutive images
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Generate up to three images for a validated prompt
    ///
    /// Individual failures become placeholder slots; only invalid requests
    /// return an error.
    pub async fn generate(
        &self,
        prompt: &str,
        num_images: u32,
        size: ImageSize,
    ) -> Result<ImageBatch, ImageError> {
        if !(1..=MAX_REQUESTED_IMAGES).contains(&num_images) {
            return Err(ImageError::InvalidRequest(format!(
                "Number of images must be between 1 and {}",
                MAX_REQUESTED_IMAGES
            )));
        }

        let prompt = validate_prompt(prompt)?;
        let enhanced = enhance_prompt_with_branding(&prompt);

        let mut notice = None;
        let mut count = num_images;
        if count > MAX_GENERATED_IMAGES {
            warn!(requested = count, "Large image request, limiting to {}", MAX_GENERATED_IMAGES);
            notice = Some(format!(
                "Limited to {} images for stability. Generating {} images...",
                MAX_GENERATED_IMAGES, MAX_GENERATED_IMAGES
            ));
            count = MAX_GENERATED_IMAGES;
        }

        info!(count, size = size.as_str(), "Generating images");

        let mut images = Vec::with_capacity(count as usize);
        for index in 1..=count {
            match self.generator.generate_image(&enhanced, size).await {
                Ok(image) => {
                    info!(index, "Generated image");
                    images.push(ImageOutcome {
                        index,
                        size,
                        url: Some(image.url),
                        revised_prompt: Some(image.revised_prompt.unwrap_or_else(|| enhanced.clone())),
                        error: None,
                    });
                }
                Err(e) => {
                    error!(index, error = %e, "Image generation failed");
                    images.push(ImageOutcome {
                        index,
                        size,
                        url: None,
                        revised_prompt: None,
                        error: Some("Image generation temporarily unavailable".to_string()),
                    });
                }
            }

            if index < count && !self.pause.is_zero() {
                tokio::time::sleep(self.pause).await;
            }
        }

        Ok(ImageBatch { images, notice })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::provider::GeneratedImage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails every second call
    struct FlakyImages {
        calls: AtomicU32,
    }

    #[async_trait]
    impl ImageGenerator for FlakyImages {
        async fn generate_image(
            &self,
            prompt: &str,
            _size: ImageSize,
        ) -> Result<GeneratedImage, ImageError> {
            assert!(prompt.contains(BRAND_HANDLE));
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n % 2 == 0 {
                Err(ImageError::NoData)
            } else {
                Ok(GeneratedImage {
                    url: format!("https://img.example/{}.png", n),
                    revised_prompt: None,
                })
            }
        }
    }

    fn service() -> (ImageService, Arc<FlakyImages>) {
        let generator = Arc::new(FlakyImages {
            calls: AtomicU32::new(0),
        });
        let service = ImageService::new(generator.clone()).with_pause(Duration::ZERO);
        (service, generator)
    }

    #[test]
    fn test_validate_prompt_bounds() {
        assert!(validate_prompt("   ").is_err());
        assert!(validate_prompt("too short").is_err());
        assert!(validate_prompt(&"a".repeat(4001)).is_err());
        assert_eq!(
            validate_prompt("  A bright salon interior  ").unwrap(),
            "A bright salon interior"
        );
    }

    #[test]
    fn test_validate_prompt_prohibited() {
        let err = validate_prompt("A VIOLENT scene in a salon").unwrap_err();
        assert_eq!(err.to_string(), "Prompt contains prohibited content");
    }

    #[test]
    fn test_refine_prompt() {
        assert_eq!(refine_prompt("orig", "Salon chair", "warm light"), "Salon chair, warm light");
        assert_eq!(refine_prompt(" orig ", "Salon chair", " "), "orig");
    }

    #[test]
    fn test_branding_always_added() {
        let enhanced = enhance_prompt_with_branding("Nail studio");
        assert!(enhanced.starts_with("Nail studio. MANDATORY"));
        assert!(enhanced.contains("@salonsuitedigitalstudio"));
    }

    #[tokio::test]
    async fn test_generate_caps_at_three_with_placeholders() {
        let (service, generator) = service();
        let batch = service
            .generate("Modern salon with plants", 4, ImageSize::Square)
            .await
            .unwrap();

        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
        assert_eq!(batch.images.len(), 3);
        assert!(batch.notice.is_some());
        assert!(batch.images[0].url.is_some());
        assert!(batch.images[1].url.is_none());
        assert!(batch.images[1].error.is_some());
        assert_eq!(batch.images[2].index, 3);
    }

    #[tokio::test]
    async fn test_generate_rejects_bad_count() {
        let (service, _) = service();
        assert!(matches!(
            service.generate("Modern salon with plants", 0, ImageSize::Square).await,
            Err(ImageError::InvalidRequest(_))
        ));
        assert!(service
            .generate("Modern salon with plants", 5, ImageSize::Square)
            .await
            .is_err());
    }
}
