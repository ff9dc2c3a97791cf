//! OpenAI-compatible API client
//!
//! Chat completions for post ideas and image generations for marketing
//! images. The client never retries on its own: callers fall back to
//! template content on any failure.

use async_trait::async_trait;
use bella_common::config::OpenAiConfig;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;

use super::provider::{
    GeneratedImage, GenerationError, ImageError, ImageGenerator, ImageSize, TextGenerator,
};

const USER_AGENT: &str = concat!("bella-server/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'a str,
    quality: &'a str,
    n: u32,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
    revised_prompt: Option<String>,
}

/// OpenAI-compatible client shared by text and image generation
pub struct OpenAiClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    image_model: String,
    max_tokens: u32,
    temperature: f32,
    request_timeout: Duration,
    image_timeout: Duration,
    rate_limiter: governor::RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl OpenAiClient {
    pub fn new(config: &OpenAiConfig, api_key: String) -> Result<Self, GenerationError> {
        let per_second = NonZeroU32::new(config.requests_per_second).ok_or_else(|| {
            GenerationError::Network("requests_per_second must be non-zero".to_string())
        })?;

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            image_model: config.image_model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            image_timeout: Duration::from_secs(config.image_timeout_secs),
            rate_limiter: governor::RateLimiter::direct(governor::Quota::per_second(per_second)),
        })
    }

    fn map_send_error(e: reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            GenerationError::Timeout
        } else {
            GenerationError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        self.rate_limiter.until_ready().await;

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        tracing::debug!(model = %self.model, prompt_len = prompt.len(), "Requesting chat completion");

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(self.request_timeout)
            .json(&request)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api(status.as_u16(), error_text));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Parse(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(GenerationError::Empty)
    }
}

#[async_trait]
impl ImageGenerator for OpenAiClient {
    async fn generate_image(
        &self,
        prompt: &str,
        size: ImageSize,
    ) -> Result<GeneratedImage, ImageError> {
        self.rate_limiter.until_ready().await;

        let request = ImageRequest {
            model: &self.image_model,
            prompt,
            size: size.as_str(),
            quality: "standard",
            n: 1,
        };

        let response = self
            .http_client
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(self.image_timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| ImageError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ImageError::Api(status.as_u16(), error_text));
        }

        let body: ImageResponse = response
            .json()
            .await
            .map_err(|e| ImageError::Network(e.to_string()))?;

        body.data
            .into_iter()
            .next()
            .and_then(|data| {
                data.url.map(|url| GeneratedImage {
                    url,
                    revised_prompt: data.revised_prompt,
                })
            })
            .ok_or(ImageError::NoData)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use serde_json::{json, Value};

    async fn spawn_mock(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn config_for(base_url: String) -> OpenAiConfig {
        OpenAiConfig {
            base_url,
            request_timeout_secs: 2,
            requests_per_second: 50,
            ..Default::default()
        }
    }

    #[test]
    fn test_client_creation() {
        let client = OpenAiClient::new(&OpenAiConfig::default(), "test_key".to_string());
        assert!(client.is_ok());
    }

    #[test]
    fn test_zero_rate_is_rejected() {
        let config = OpenAiConfig {
            requests_per_second: 0,
            ..Default::default()
        };
        assert!(OpenAiClient::new(&config, "k".to_string()).is_err());
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice() {
        let router = Router::new().route(
            "/chat/completions",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["model"], "gpt-4o");
                assert_eq!(body["messages"][0]["role"], "user");
                Json(json!({
                    "choices": [{"message": {"content": "  Day 1 | a | b | c | d | e | f | g | h \n"}}]
                }))
            }),
        );
        let base = spawn_mock(router).await;
        let client = OpenAiClient::new(&config_for(base), "k".to_string()).unwrap();

        let text = client.complete("prompt").await.unwrap();
        assert_eq!(text, "Day 1 | a | b | c | d | e | f | g | h");
    }

    #[tokio::test]
    async fn test_complete_maps_api_error() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async { (axum::http::StatusCode::UNAUTHORIZED, "bad key") }),
        );
        let base = spawn_mock(router).await;
        let client = OpenAiClient::new(&config_for(base), "k".to_string()).unwrap();

        match client.complete("prompt").await {
            Err(GenerationError::Api(401, body)) => assert_eq!(body, "bad key"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_complete_empty_choices() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async { Json(json!({"choices": []})) }),
        );
        let base = spawn_mock(router).await;
        let client = OpenAiClient::new(&config_for(base), "k".to_string()).unwrap();
        assert!(matches!(client.complete("p").await, Err(GenerationError::Empty)));
    }

    #[tokio::test]
    async fn test_generate_image() {
        let router = Router::new().route(
            "/images/generations",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["size"], "1792x1024");
                assert_eq!(body["n"], 1);
                Json(json!({
                    "data": [{"url": "https://img.example/1.png", "revised_prompt": "revised"}]
                }))
            }),
        );
        let base = spawn_mock(router).await;
        let client = OpenAiClient::new(&config_for(base), "k".to_string()).unwrap();

        let image = client
            .generate_image("salon", ImageSize::Landscape)
            .await
            .unwrap();
        assert_eq!(image.url, "https://img.example/1.png");
        assert_eq!(image.revised_prompt.as_deref(), Some("revised"));
    }
}
