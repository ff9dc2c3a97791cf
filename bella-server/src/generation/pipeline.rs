//! Calendar generation pipeline
//!
//! Days are produced strictly in order. Each day tries the text-generation
//! service under a deadline, falls back to rotation content when the service
//! fails, times out, repeats itself or returns a short record, and falls back
//! again to an emergency record if producing the day blows up entirely.

use bella_common::calendar::{Calendar, CalendarEntry, ContentSource, MAX_CALENDAR_DAYS};
use bella_common::config::GenerationConfig;
use bella_common::time::millis_to_duration;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::fallback::{emergency_record, fallback_record, SignatureSet};
use super::parser::{extract_record, is_complete, parse_record};
use super::prompt::{build_prompt, trend_for};
use crate::services::{GenerationError, HashtagClient, TextGenerator};

/// Request rejected before any content is produced
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("Please select at least one niche and enter your city.")]
    MissingInput,

    #[error("Number of days must be between 1 and {0}.")]
    DaysOutOfRange(u32),
}

/// Validated input for one calendar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarRequest {
    pub niche: String,
    pub city: String,
    pub days: u32,
}

impl CalendarRequest {
    pub fn new(
        niche: impl Into<String>,
        city: impl Into<String>,
        days: u32,
        max_days: u32,
    ) -> Result<Self, RequestError> {
        let niche = niche.into().trim().to_string();
        let city = city.into().trim().to_string();
        if niche.is_empty() || city.is_empty() {
            return Err(RequestError::MissingInput);
        }

        let max_days = max_days.clamp(1, MAX_CALENDAR_DAYS);
        if days < 1 || days > max_days {
            return Err(RequestError::DaysOutOfRange(max_days));
        }

        Ok(Self { niche, city, days })
    }
}

/// Pause of `pause` after every `every`-th day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub every: u32,
    pub pause: Duration,
}

impl Pacing {
    pub fn none() -> Self {
        Self {
            every: 1,
            pause: Duration::ZERO,
        }
    }

    /// Pause after each day of an interactive request
    pub fn interactive(config: &GenerationConfig) -> Self {
        Self {
            every: 1,
            pause: millis_to_duration(config.day_pause_ms),
        }
    }

    /// Micro-pause every five posts inside a batch
    pub fn batch(config: &GenerationConfig) -> Self {
        Self {
            every: 5,
            pause: millis_to_duration(config.batch_post_pause_ms),
        }
    }

    fn pause_after(&self, day: u32) -> Option<Duration> {
        if self.pause.is_zero() || self.every == 0 || day % self.every != 0 {
            None
        } else {
            Some(self.pause)
        }
    }
}

struct PipelineInner {
    config: GenerationConfig,
    text: Option<Arc<dyn TextGenerator>>,
    hashtags: Option<Arc<HashtagClient>>,
}

/// The single generation pipeline shared by every surface
#[derive(Clone)]
pub struct CalendarPipeline {
    inner: Arc<PipelineInner>,
}

impl CalendarPipeline {
    pub fn new(
        config: GenerationConfig,
        text: Option<Arc<dyn TextGenerator>>,
        hashtags: Option<Arc<HashtagClient>>,
    ) -> Self {
        Self {
            inner: Arc::new(PipelineInner {
                config,
                text,
                hashtags,
            }),
        }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.inner.config
    }

    pub fn ai_enabled(&self) -> bool {
        self.inner.text.is_some()
    }

    /// Validate raw input against this pipeline's day limit
    pub fn request(
        &self,
        niche: impl Into<String>,
        city: impl Into<String>,
        days: u32,
    ) -> Result<CalendarRequest, RequestError> {
        CalendarRequest::new(niche, city, days, self.inner.config.max_days)
    }

    /// Produce a calendar with exactly `request.days` entries
    pub async fn generate(&self, request: &CalendarRequest, pacing: Pacing) -> Calendar {
        let use_ai = self.ai_enabled() && request.days <= self.inner.config.ai_max_days;
        info!(
            niche = %request.niche,
            city = %request.city,
            days = request.days,
            use_ai,
            "Generating calendar"
        );

        let mut calendar = Calendar::new(request.niche.clone(), request.city.clone());
        let mut used = SignatureSet::new();

        for day in 1..=request.days {
            let pipeline = self.clone();
            let niche = request.niche.clone();
            let city = request.city.clone();
            let prior = calendar.entries().to_vec();
            let used_so_far = used.clone();

            // Each day runs on its own task so a panic costs one day, not the calendar
            let outcome = tokio::spawn(async move {
                pipeline
                    .produce_day(&niche, &city, day, use_ai, &prior, &used_so_far)
                    .await
            })
            .await;

            let entry = match outcome {
                Ok(entry) => entry,
                Err(e) => {
                    error!(day, error = %e, "Day generation aborted, using emergency content");
                    parse_record(
                        &emergency_record(&request.niche, &request.city, day),
                        day,
                        &request.niche,
                        &request.city,
                        ContentSource::Emergency,
                    )
                }
            };

            used.insert(entry.signature());
            if let Err(e) = calendar.push(entry) {
                error!(day, error = %e, "Entry rejected by calendar");
                break;
            }
            debug!(day, total = request.days, "Day completed");

            if day < request.days {
                if let Some(pause) = pacing.pause_after(day) {
                    tokio::time::sleep(pause).await;
                }
            }
        }

        info!(
            niche = %request.niche,
            entries = calendar.len(),
            method = calendar.generation_method(),
            "Calendar generated"
        );
        calendar
    }

    async fn produce_day(
        &self,
        niche: &str,
        city: &str,
        day: u32,
        use_ai: bool,
        prior: &[CalendarEntry],
        used: &SignatureSet,
    ) -> CalendarEntry {
        if use_ai {
            let deadline = Duration::from_secs(self.inner.config.generation_timeout_secs);
            match tokio::time::timeout(deadline, self.ai_response(niche, city, day, prior)).await {
                Ok(Ok(response)) if is_complete(&response) => {
                    let entry =
                        parse_record(extract_record(&response), day, niche, city, ContentSource::Ai);
                    if !used.contains(&entry.signature()) {
                        return entry;
                    }
                    debug!(day, "Repeated content from service, using fallback content");
                }
                Ok(Ok(_)) => warn!(day, "Malformed service response, using fallback content"),
                Ok(Err(e)) => warn!(day, error = %e, "Service call failed, using fallback content"),
                Err(_) => warn!(
                    day,
                    timeout_secs = deadline.as_secs(),
                    "Generation deadline exceeded, using fallback content"
                ),
            }
        }

        parse_record(
            &fallback_record(niche, city, day, used),
            day,
            niche,
            city,
            ContentSource::Fallback,
        )
    }

    async fn ai_response(
        &self,
        niche: &str,
        city: &str,
        day: u32,
        prior: &[CalendarEntry],
    ) -> Result<String, GenerationError> {
        let Some(text) = self.inner.text.as_ref() else {
            return Err(GenerationError::Empty);
        };

        let trend = trend_for(niche);
        let hashtags = match self.inner.hashtags.as_ref() {
            Some(client) => match client.suggest(&format!("{} {}", niche, city)).await {
                Ok(tags) => tags,
                Err(e) => {
                    debug!(error = %e, "Hashtag lookup failed, using trend hashtags");
                    trend.hashtags.to_string()
                }
            },
            None => trend.hashtags.to_string(),
        };

        let prompt = build_prompt(niche, city, day, &trend, &hashtags, prior);
        debug!(day, provider = text.name(), "Requesting post idea");
        text.complete(&prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn test_config() -> GenerationConfig {
        GenerationConfig {
            day_pause_ms: 0,
            batch_post_pause_ms: 0,
            generation_timeout_secs: 1,
            ..Default::default()
        }
    }

    /// Returns a distinct, complete record per call
    struct Scripted {
        calls: AtomicU32,
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn complete(&self, _prompt: &str) -> Result<String, GenerationError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!(
                "Day {n} | Activity {n} | Script {n} | Visual {n} | Caption {n} | #Tag{n} | Morning | Book | Prompt {n}"
            ))
        }
    }

    struct Fixed(&'static str);

    #[async_trait]
    impl TextGenerator for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn complete(&self, _prompt: &str) -> Result<String, GenerationError> {
            Ok(self.0.to_string())
        }
    }

    struct Slow;

    #[async_trait]
    impl TextGenerator for Slow {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn complete(&self, _prompt: &str) -> Result<String, GenerationError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(GenerationError::Timeout)
        }
    }

    struct Panics;

    #[async_trait]
    impl TextGenerator for Panics {
        fn name(&self) -> &'static str {
            "panics"
        }

        async fn complete(&self, _prompt: &str) -> Result<String, GenerationError> {
            panic!("provider exploded");
        }
    }

    fn pipeline_with(text: Arc<dyn TextGenerator>) -> CalendarPipeline {
        CalendarPipeline::new(test_config(), Some(text), None)
    }

    fn assert_contiguous(calendar: &Calendar, days: u32) {
        assert_eq!(calendar.len(), days as usize);
        for (idx, entry) in calendar.entries().iter().enumerate() {
            assert_eq!(entry.day, idx as u32 + 1);
        }
    }

    #[test]
    fn test_request_validation() {
        assert_eq!(
            CalendarRequest::new("hair", "Austin", 0, 30).unwrap_err(),
            RequestError::DaysOutOfRange(30)
        );
        assert!(CalendarRequest::new("hair", "Austin", 31, 30).is_err());
        assert!(CalendarRequest::new("hair", "Austin", 31, 99).is_err());
        assert_eq!(
            CalendarRequest::new("  ", "Austin", 3, 30).unwrap_err(),
            RequestError::MissingInput
        );
        let request = CalendarRequest::new(" hair ", " Austin ", 30, 30).unwrap();
        assert_eq!(request.niche, "hair");
        assert_eq!(request.city, "Austin");
    }

    #[tokio::test]
    async fn test_offline_pipeline_uses_fallback() {
        let pipeline = CalendarPipeline::new(test_config(), None, None);
        let request = pipeline.request("hair", "Austin", 12).unwrap();
        let calendar = pipeline.generate(&request, Pacing::none()).await;

        assert_contiguous(&calendar, 12);
        assert_eq!(calendar.generation_method(), "fallback");
    }

    #[tokio::test]
    async fn test_ai_content_used_within_ai_limit() {
        let pipeline = pipeline_with(Arc::new(Scripted {
            calls: AtomicU32::new(0),
        }));
        let request = pipeline.request("nails", "Reno", 3).unwrap();
        let calendar = pipeline.generate(&request, Pacing::none()).await;

        assert_contiguous(&calendar, 3);
        assert_eq!(calendar.generation_method(), "ai");
        assert_eq!(calendar.entries()[2].activity, "Activity 3");
    }

    #[tokio::test]
    async fn test_long_request_skips_service() {
        let scripted = Arc::new(Scripted {
            calls: AtomicU32::new(0),
        });
        let pipeline = pipeline_with(scripted.clone());
        let request = pipeline.request("nails", "Reno", 8).unwrap();
        let calendar = pipeline.generate(&request, Pacing::none()).await;

        assert_contiguous(&calendar, 8);
        assert_eq!(scripted.calls.load(Ordering::SeqCst), 0);
        assert_eq!(calendar.ai_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_response_falls_back() {
        let pipeline = pipeline_with(Arc::new(Fixed("Day 1 | Reel | Hi")));
        let request = pipeline.request("hair", "Austin", 2).unwrap();
        let calendar = pipeline.generate(&request, Pacing::none()).await;

        assert_contiguous(&calendar, 2);
        for entry in calendar.entries() {
            assert_eq!(entry.source, ContentSource::Fallback);
            assert!(!entry.image_prompt.is_empty());
        }
    }

    #[tokio::test]
    async fn test_repeated_service_content_is_replaced() {
        let pipeline = pipeline_with(Arc::new(Fixed(
            "Day 1 | Reel | Same script | V | C | #H | Morning | Book | P",
        )));
        let request = pipeline.request("hair", "Austin", 3).unwrap();
        let calendar = pipeline.generate(&request, Pacing::none()).await;

        let entries = calendar.entries();
        assert_eq!(entries[0].source, ContentSource::Ai);
        assert_eq!(entries[1].source, ContentSource::Fallback);
        assert_eq!(entries[2].source, ContentSource::Fallback);
    }

    #[tokio::test]
    async fn test_deadline_substitutes_fallback() {
        let pipeline = pipeline_with(Arc::new(Slow));
        let request = pipeline.request("spa", "Boise", 1).unwrap();
        let calendar = pipeline.generate(&request, Pacing::none()).await;

        assert_contiguous(&calendar, 1);
        assert_eq!(calendar.entries()[0].source, ContentSource::Fallback);
    }

    #[tokio::test]
    async fn test_panicking_day_gets_emergency_entry() {
        let pipeline = pipeline_with(Arc::new(Panics));
        let request = pipeline.request("hair", "Austin", 2).unwrap();
        let calendar = pipeline.generate(&request, Pacing::none()).await;

        assert_contiguous(&calendar, 2);
        assert!(calendar
            .entries()
            .iter()
            .all(|e| e.source == ContentSource::Emergency));
        assert_eq!(calendar.entries()[0].activity, "Hair Content");
    }

    #[test]
    fn test_pacing_schedule() {
        let batch = Pacing {
            every: 5,
            pause: Duration::from_millis(100),
        };
        assert_eq!(batch.pause_after(4), None);
        assert_eq!(batch.pause_after(5), Some(Duration::from_millis(100)));
        assert_eq!(Pacing::none().pause_after(1), None);
    }
}
