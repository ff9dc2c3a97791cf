//! Batch generation across many businesses
//!
//! Businesses are processed in chunks whose size shrinks as memory
//! utilization rises. A business that cannot be generated yields a failed
//! result; the rest of the batch continues.

use bella_common::calendar::{Business, CalendarEntry};
use bella_common::config::GenerationConfig;
use bella_common::time::millis_to_duration;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::{info, warn};

use super::pipeline::{CalendarPipeline, Pacing};
use crate::governor::MemoryMonitor;

/// Chunk size for the sampled memory utilization
///
/// Above 60% chunks hold 3 businesses, above 40% they hold 5, otherwise the
/// requested size capped at 10.
pub fn chunk_size_for(memory_percent: f32, requested: usize) -> usize {
    if memory_percent > 60.0 {
        3
    } else if memory_percent > 40.0 {
        5
    } else {
        requested.clamp(1, 10)
    }
}

/// Contiguous index ranges of at most `size` items covering `0..total`
pub fn chunk_ranges(total: usize, size: usize) -> Vec<Range<usize>> {
    let size = size.max(1);
    (0..total)
        .step_by(size)
        .map(|start| start..(start + size).min(total))
        .collect()
}

/// Estimated processing time in seconds
pub fn estimate_processing_time(days: u32, businesses: usize, secs_per_post: f64) -> f64 {
    days as f64 * businesses as f64 * secs_per_post
}

/// Whether a batch is too large to run inline
pub fn should_queue(businesses: usize, days: u32, config: &GenerationConfig) -> bool {
    businesses > config.queue_business_threshold
        || estimate_processing_time(days, businesses, config.estimated_secs_per_post)
            > config.queue_time_threshold_secs
}

/// Split businesses so each group holds at most `max_business_days` business-days
///
/// A single business is never split across groups, so a group can exceed the
/// limit when `days` alone does.
pub fn split_large_request(
    businesses: &[Business],
    days: u32,
    max_business_days: usize,
) -> Vec<Vec<Business>> {
    let days = days.max(1) as usize;
    if businesses.len() * days <= max_business_days {
        return vec![businesses.to_vec()];
    }

    let per_group = (max_business_days / days).max(1);
    businesses
        .chunks(per_group)
        .map(|group| group.to_vec())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusinessStatus {
    Completed,
    Failed,
}

/// Outcome for one business in a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessResult {
    pub business: Business,
    pub status: BusinessStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar_data: Option<Vec<CalendarEntry>>,
    pub posts_generated: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Completed batch as returned inline and stored with queued jobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub status: String,
    pub total_businesses: usize,
    pub total_calendars: usize,
    pub total_posts: usize,
    pub results: Vec<BusinessResult>,
}

impl BatchReport {
    pub fn completed(total_businesses: usize, results: Vec<BusinessResult>) -> Self {
        Self {
            status: "completed".to_string(),
            total_businesses,
            total_calendars: results
                .iter()
                .filter(|r| r.status == BusinessStatus::Completed)
                .count(),
            total_posts: results.iter().map(|r| r.posts_generated).sum(),
            results,
        }
    }
}

/// Runs batches through the shared pipeline
#[derive(Clone)]
pub struct BatchRunner {
    pipeline: CalendarPipeline,
    memory: MemoryMonitor,
    pressure_threshold: f32,
}

impl BatchRunner {
    pub fn new(pipeline: CalendarPipeline, memory: MemoryMonitor, pressure_threshold: f32) -> Self {
        Self {
            pipeline,
            memory,
            pressure_threshold,
        }
    }

    /// Generate a calendar for every business, in input order
    ///
    /// `days` is capped at the batch day limit.
    pub async fn run(&self, businesses: &[Business], days: u32) -> Vec<BusinessResult> {
        let config = self.pipeline.config();
        let days = days.min(config.batch_max_days);
        let chunk_size = chunk_size_for(self.memory.sample(), config.batch_chunk_size);
        let chunks = chunk_ranges(businesses.len(), chunk_size);
        let chunk_pause = millis_to_duration(config.batch_chunk_pause_ms);

        info!(
            businesses = businesses.len(),
            days,
            chunk_size,
            chunks = chunks.len(),
            "Starting batch generation"
        );

        let mut results = Vec::with_capacity(businesses.len());
        let chunk_count = chunks.len();
        for (chunk_idx, range) in chunks.into_iter().enumerate() {
            for business in &businesses[range.clone()] {
                results.push(self.run_business(business, days).await);
            }

            self.memory.check_pressure("batch-chunk", self.pressure_threshold);
            info!(
                chunk = chunk_idx + 1,
                of = chunk_count,
                start = range.start,
                end = range.end,
                "Completed batch chunk"
            );

            if chunk_idx + 1 < chunk_count && !chunk_pause.is_zero() {
                tokio::time::sleep(chunk_pause).await;
            }
        }

        info!(processed = results.len(), "Batch generation completed");
        results
    }

    async fn run_business(&self, business: &Business, days: u32) -> BusinessResult {
        match self
            .pipeline
            .request(business.niche.clone(), business.city.clone(), days)
        {
            Ok(request) => {
                let calendar = self
                    .pipeline
                    .generate(&request, Pacing::batch(self.pipeline.config()))
                    .await;
                let entries = calendar.into_entries();
                BusinessResult {
                    business: business.clone(),
                    status: BusinessStatus::Completed,
                    posts_generated: entries.len(),
                    calendar_data: Some(entries),
                    error: None,
                }
            }
            Err(e) => {
                warn!(niche = %business.niche, city = %business.city, error = %e, "Business skipped");
                BusinessResult {
                    business: business.clone(),
                    status: BusinessStatus::Failed,
                    calendar_data: None,
                    posts_generated: 0,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn business(niche: &str, city: &str) -> Business {
        Business {
            niche: niche.to_string(),
            city: city.to_string(),
        }
    }

    fn offline_runner() -> BatchRunner {
        let config = GenerationConfig {
            batch_chunk_pause_ms: 0,
            batch_post_pause_ms: 0,
            ..Default::default()
        };
        BatchRunner::new(
            CalendarPipeline::new(config, None, None),
            MemoryMonitor::fixed(10.0),
            75.0,
        )
    }

    #[test]
    fn test_chunk_size_follows_memory() {
        assert_eq!(chunk_size_for(75.0, 8), 3);
        assert_eq!(chunk_size_for(50.0, 8), 5);
        assert_eq!(chunk_size_for(20.0, 8), 8);
        assert_eq!(chunk_size_for(20.0, 25), 10);
        assert_eq!(chunk_size_for(20.0, 0), 1);
    }

    #[test]
    fn test_chunk_ranges_cover_everything() {
        assert_eq!(chunk_ranges(7, 3), vec![0..3, 3..6, 6..7]);
        assert!(chunk_ranges(0, 3).is_empty());
    }

    #[test]
    fn test_queue_decision() {
        let config = GenerationConfig::default();
        assert!(!should_queue(10, 7, &config));
        assert!(should_queue(11, 1, &config));
        // 10 businesses x 20 days x 2s = 400s
        assert!(should_queue(10, 20, &config));
        assert_eq!(estimate_processing_time(5, 3, 2.0), 30.0);
    }

    #[test]
    fn test_split_large_request() {
        let businesses: Vec<_> = (0..12).map(|i| business("hair", &format!("City{}", i))).collect();

        assert_eq!(split_large_request(&businesses[..5], 10, 50).len(), 1);

        let groups = split_large_request(&businesses, 10, 50);
        assert_eq!(groups.iter().map(Vec::len).collect::<Vec<_>>(), vec![5, 5, 2]);
        assert_eq!(groups[1][0].city, "City5");
    }

    #[tokio::test]
    async fn test_run_caps_days_and_isolates_failures() {
        let runner = offline_runner();
        let businesses = vec![
            business("hair", "Austin"),
            business("", "Nowhere"),
            business("nails", "Reno"),
        ];

        let results = runner.run(&businesses, 30).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].status, BusinessStatus::Completed);
        assert_eq!(results[0].posts_generated, 10);
        assert_eq!(results[1].status, BusinessStatus::Failed);
        assert!(results[1].error.is_some());
        assert_eq!(results[2].business.city, "Reno");
        assert_eq!(results[2].calendar_data.as_ref().map(Vec::len), Some(10));

        let report = BatchReport::completed(businesses.len(), results);
        assert_eq!(report.total_businesses, 3);
        assert_eq!(report.total_calendars, 2);
        assert_eq!(report.total_posts, 20);
    }
}
