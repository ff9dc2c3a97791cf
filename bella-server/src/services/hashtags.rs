//! Live hashtag suggestions
//!
//! Optional lookup against a RiteKit-style auto-hashtag endpoint. Callers fall
//! back to the static trend table whenever this returns an error.

use serde::Deserialize;
use std::time::Duration;

use super::provider::GenerationError;

/// Suggestions kept from one response
const MAX_TAGS: usize = 8;

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Deserialize)]
struct HashtagResponse {
    #[serde(default)]
    hashtags: Vec<HashtagStat>,
}

#[derive(Debug, Deserialize)]
struct HashtagStat {
    tag: String,
}

/// Hashtag suggestion client
pub struct HashtagClient {
    http_client: reqwest::Client,
    url: String,
    token: String,
}

impl HashtagClient {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Result<Self, GenerationError> {
        let http_client = reqwest::Client::builder()
            .timeout(LOOKUP_TIMEOUT)
            .build()
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            url: url.into(),
            token: token.into(),
        })
    }

    /// Top suggestions for `keyword`, formatted as `#tag #tag ...`
    pub async fn suggest(&self, keyword: &str) -> Result<String, GenerationError> {
        let response = self
            .http_client
            .get(&self.url)
            .query(&[("text", keyword), ("client_id", self.token.as_str())])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout
                } else {
                    GenerationError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api(status.as_u16(), error_text));
        }

        let body: HashtagResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Parse(e.to_string()))?;

        let tags: Vec<String> = body
            .hashtags
            .into_iter()
            .map(|stat| stat.tag.trim().trim_start_matches('#').to_string())
            .filter(|tag| !tag.is_empty())
            .take(MAX_TAGS)
            .map(|tag| format!("#{}", tag))
            .collect();

        if tags.is_empty() {
            return Err(GenerationError::Empty);
        }
        Ok(tags.join(" "))
    }
}
