//! Background worker for queued batch jobs

use anyhow::Result;
use sqlx::SqlitePool;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::db::queue;
use crate::generation::{BatchReport, BatchRunner};

/// Claim and run the next pending job
///
/// Returns `false` when the queue was empty.
pub async fn process_next_job(db: &SqlitePool, runner: &BatchRunner) -> Result<bool> {
    let Some(job) = queue::claim_next(db).await? else {
        return Ok(false);
    };

    info!(
        job_id = job.id,
        user_id = job.user_id,
        businesses = job.request.businesses.len(),
        days = job.request.days,
        "Processing queued job"
    );

    let results = runner.run(&job.request.businesses, job.request.days).await;
    let report = BatchReport::completed(job.request.businesses.len(), results);

    let outcome = match serde_json::to_value(&report) {
        Ok(value) => queue::complete_job(db, job.id, &value).await,
        Err(e) => Err(anyhow::Error::new(e).context("Failed to encode job result")),
    };

    match outcome {
        Ok(()) => info!(
            job_id = job.id,
            status = queue::JobStatus::Completed.as_str(),
            posts = report.total_posts,
            "Queued job finished"
        ),
        Err(e) => {
            let message = format!("{:#}", e);
            error!(job_id = job.id, error = %message, "Failed to store job result");
            // Never leave a claimed job in `processing`
            if let Err(fail_err) = queue::fail_job(db, job.id, &message).await {
                error!(job_id = job.id, error = %fail_err, "Failed to mark job as failed");
                return Err(fail_err);
            }
        }
    }

    Ok(true)
}

/// Poll the queue until `token` is cancelled
///
/// Jobs still marked `processing` from an earlier run are requeued first.
/// Jobs are drained back to back; the worker only sleeps once the queue is
/// empty or a database error occurs.
pub fn spawn_queue_worker(
    db: SqlitePool,
    runner: BatchRunner,
    poll_interval: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(poll_secs = poll_interval.as_secs(), "Queue worker started");
        match queue::requeue_stale(&db).await {
            Ok(0) => {}
            Ok(count) => warn!(count, "Requeued jobs left processing by an earlier run"),
            Err(e) => error!(error = %e, "Failed to requeue stale jobs"),
        }
        loop {
            if token.is_cancelled() {
                break;
            }

            let idle = match process_next_job(&db, &runner).await {
                Ok(processed) => !processed,
                Err(e) => {
                    error!(error = %e, "Queue worker error");
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(poll_interval) => {}
                }
            }
        }
        info!("Queue worker stopped");
    })
}
