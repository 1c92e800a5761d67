use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::task::JoinHandle;

use super::ports::{ExpirationNotice, ExpirationNotifier, ScheduledJob};

struct Job {
    generation: u64,
    fire_at: chrono::DateTime<Utc>,
    handle: JoinHandle<()>,
}

type JobTable = Arc<Mutex<HashMap<String, Job>>>;

fn lock(jobs: &JobTable) -> MutexGuard<'_, HashMap<String, Job>> {
    jobs.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One-shot expiration jobs, at most one per token.
///
/// Jobs live only in memory; after a restart they are rebuilt from the stored
/// end dates (see `SubscriptionService::restore_schedule`).
pub struct ExpirationScheduler {
    notifier: Arc<dyn ExpirationNotifier>,
    jobs: JobTable,
    generation: AtomicU64,
}

impl ExpirationScheduler {
    pub fn new(notifier: Arc<dyn ExpirationNotifier>) -> Self {
        Self {
            notifier,
            jobs: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
        }
    }

    /// Arrange for `notice` to be delivered at `notice.end`, replacing any job
    /// already held for the same token. Past end times fire immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&self, notice: ExpirationNotice) -> ScheduledJob {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let token = notice.token.clone();
        let fire_at = notice.end;
        let delay = (fire_at - Utc::now())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);

        // Held across spawn so an immediately-firing job cannot finish before it is registered
        let mut table = lock(&self.jobs);
        let notifier = self.notifier.clone();
        let jobs = self.jobs.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            tracing::info!(
                "Expiration notice firing for token={} (end={})",
                notice.token,
                notice.end
            );
            if let Err(e) = notifier.notify(&notice).await {
                tracing::error!(
                    "Failed to deliver expiration notice for token={}: {}",
                    notice.token,
                    e
                );
            }

            let mut jobs = lock(&jobs);
            if jobs
                .get(&notice.token)
                .is_some_and(|job| job.generation == generation)
            {
                jobs.remove(&notice.token);
            }
        });

        let previous = table.insert(
            token.clone(),
            Job {
                generation,
                fire_at,
                handle,
            },
        );
        drop(table);
        if let Some(previous) = previous {
            previous.handle.abort();
            tracing::debug!(
                "Replaced expiration job for token={} ({} -> {})",
                token,
                previous.fire_at,
                fire_at
            );
        } else {
            tracing::debug!("Scheduled expiration job for token={} at {}", token, fire_at);
        }

        ScheduledJob { token, fire_at }
    }

    /// Drop the pending job for a token. Returns whether one existed.
    pub fn cancel(&self, token: &str) -> bool {
        match lock(&self.jobs).remove(token) {
            Some(job) => {
                job.handle.abort();
                tracing::debug!("Cancelled expiration job for token={}", token);
                true
            }
            None => false,
        }
    }

    /// Jobs that have not fired yet, soonest first
    pub fn pending(&self) -> Vec<ScheduledJob> {
        let mut pending: Vec<ScheduledJob> = lock(&self.jobs)
            .iter()
            .map(|(token, job)| ScheduledJob {
                token: token.clone(),
                fire_at: job.fire_at,
            })
            .collect();
        pending.sort_by(|a, b| a.fire_at.cmp(&b.fire_at).then(a.token.cmp(&b.token)));
        pending
    }

    pub fn shutdown(&self) {
        let mut jobs = lock(&self.jobs);
        let count = jobs.len();
        for (_, job) in jobs.drain() {
            job.handle.abort();
        }
        tracing::info!("Expiration scheduler stopped, {} pending jobs dropped", count);
    }
}

impl Drop for ExpirationScheduler {
    fn drop(&mut self) {
        for (_, job) in lock(&self.jobs).drain() {
            job.handle.abort();
        }
    }
}
