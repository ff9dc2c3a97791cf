//! bella-server library interface
//!
//! Application state, router construction and background task startup, exposed
//! for the binary and for integration tests.

pub mod api;
pub mod db;
pub mod error;
pub mod generation;
pub mod governor;
pub mod logging;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use bella_common::config::TomlConfig;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::generation::{BatchRunner, CalendarPipeline};
use crate::governor::{MemoryMonitor, ResourceGovernor};
use crate::services::{
    HashtagClient, ImageGenerator, ImageService, OpenAiClient, TextGenerator,
};

/// External providers available to this process
#[derive(Clone, Default)]
pub struct Providers {
    pub text: Option<Arc<dyn TextGenerator>>,
    pub images: Option<Arc<dyn ImageGenerator>>,
    pub hashtags: Option<Arc<HashtagClient>>,
}

impl Providers {
    /// No external services; every day uses fallback content
    pub fn offline() -> Self {
        Self::default()
    }

    /// Build providers from configuration and environment
    ///
    /// A missing or unusable API key is not an error: the service runs with
    /// fallback content only.
    pub fn from_config(config: &TomlConfig) -> Self {
        let mut providers = Self::offline();

        // resolve_api_key warns when no key is configured
        if let Some(key) = config.resolve_api_key() {
            match OpenAiClient::new(&config.openai, key) {
                Ok(client) => {
                    let client = Arc::new(client);
                    let text: Arc<dyn TextGenerator> = client.clone();
                    let images: Arc<dyn ImageGenerator> = client;
                    info!(model = %config.openai.model, "Text and image generation enabled");
                    providers.text = Some(text);
                    providers.images = Some(images);
                }
                Err(e) => warn!(error = %e, "Generation client unavailable, using fallback content"),
            }
        }

        if let Some(token) = config.resolve_hashtag_token() {
            match HashtagClient::new(config.openai.hashtag_url.clone(), token) {
                Ok(client) => providers.hashtags = Some(Arc::new(client)),
                Err(e) => warn!(error = %e, "Hashtag client unavailable"),
            }
        }

        providers
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    pub config: Arc<TomlConfig>,
    pub pipeline: CalendarPipeline,
    pub batch: BatchRunner,
    /// Admission bound and memory sampling
    pub governor: ResourceGovernor,
    /// Absent when no image provider is configured
    pub images: Option<ImageService>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Cancelled on shutdown; stops background tasks
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        config: TomlConfig,
        providers: Providers,
        memory: MemoryMonitor,
    ) -> Self {
        let pipeline = CalendarPipeline::new(
            config.generation.clone(),
            providers.text,
            providers.hashtags,
        );
        let governor = ResourceGovernor::new(config.governor.clone(), memory.clone());
        let batch = BatchRunner::new(
            pipeline.clone(),
            memory,
            config.governor.post_generation_threshold,
        );

        Self {
            db,
            config: Arc::new(config),
            pipeline,
            batch,
            governor,
            images: providers.images.map(ImageService::new),
            startup_time: Utc::now(),
            shutdown: CancellationToken::new(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // UI routes (HTML pages)
        .merge(api::ui_routes())
        // API routes
        .merge(api::health_routes())
        .merge(api::calendar_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the memory monitor and the queue worker
///
/// Both stop when `state.shutdown` is cancelled.
pub fn start_background_tasks(state: &AppState) -> Vec<JoinHandle<()>> {
    let poll = Duration::from_secs(state.config.generation.queue_poll_interval_secs.max(1));
    vec![
        state.governor.spawn_monitor(state.shutdown.clone()),
        services::queue_worker::spawn_queue_worker(
            state.db.clone(),
            state.batch.clone(),
            poll,
            state.shutdown.clone(),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use bella_common::config::{API_KEY_ENV_VARS, HASHTAG_TOKEN_ENV};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    /// Counts WARN events
    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: Subscriber> Layer<S> for WarnCounter {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn test_missing_api_key_warns_once() {
        let env_configured = API_KEY_ENV_VARS
            .iter()
            .chain(std::iter::once(&HASHTAG_TOKEN_ENV))
            .any(|name| std::env::var(name).is_ok());
        if env_configured {
            return;
        }

        let warnings = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(WarnCounter(warnings.clone()));

        let providers = tracing::subscriber::with_default(subscriber, || {
            Providers::from_config(&TomlConfig::default())
        });

        assert!(providers.text.is_none());
        assert!(providers.images.is_none());
        assert_eq!(warnings.load(Ordering::SeqCst), 1);
    }
}
