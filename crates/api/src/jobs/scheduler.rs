//! Periodic background jobs.
//!
//! Each registered job gets its own task that ticks at the job's frequency
//! until the scheduler is shut down. A failing run is logged and counted;
//! the job keeps its schedule.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::counter;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// How often a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobFrequency {
    Seconds(u64),
    Minutes(u64),
}

impl JobFrequency {
    pub fn duration(&self) -> Duration {
        match self {
            JobFrequency::Seconds(secs) => Duration::from_secs(*secs),
            JobFrequency::Minutes(mins) => Duration::from_secs(*mins * 60),
        }
    }
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("{0}")]
    Failed(String),
}

/// A unit of periodic work.
#[async_trait::async_trait]
pub trait Job: Send + Sync {
    /// Label for logs and the `job` metric label.
    fn name(&self) -> &'static str;

    fn frequency(&self) -> JobFrequency;

    async fn execute(&self) -> Result<(), JobError>;
}

/// Owns the job tasks and the shutdown signal they watch.
pub struct JobScheduler {
    jobs: Vec<Arc<dyn Job>>,
    stop: watch::Sender<bool>,
    tasks: JoinSet<()>,
}

impl JobScheduler {
    pub fn new() -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            jobs: Vec::new(),
            stop,
            tasks: JoinSet::new(),
        }
    }

    pub fn register<J: Job + 'static>(&mut self, job: J) {
        self.jobs.push(Arc::new(job));
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Spawns one task per registered job. The first run happens one period
    /// after start.
    pub fn start(&mut self) {
        info!(jobs = self.jobs.len(), "Starting background jobs");
        for job in &self.jobs {
            self.tasks
                .spawn(run_periodically(Arc::clone(job), self.stop.subscribe()));
        }
    }

    /// Signals every job to stop and waits up to `timeout` for in-flight
    /// runs to finish. Tasks still running after that are aborted.
    pub async fn shutdown(mut self, timeout: Duration) {
        self.stop.send_replace(true);

        let drain = async {
            while let Some(joined) = self.tasks.join_next().await {
                if let Err(e) = joined {
                    warn!(error = %e, "Background job task panicked");
                }
            }
        };

        if tokio::time::timeout(timeout, drain).await.is_err() {
            warn!(?timeout, "Background jobs did not stop in time, aborting");
            self.tasks.abort_all();
        } else {
            info!("Background jobs stopped");
        }
    }
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_periodically(job: Arc<dyn Job>, mut stop: watch::Receiver<bool>) {
    let name = job.name();
    let period = job.frequency().duration();
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!(job = name, ?period, "Job scheduled");

    loop {
        tokio::select! {
            _ = ticker.tick() => run_once(job.as_ref()).await,
            changed = stop.changed() => {
                // A dropped sender also ends the loop.
                if changed.is_err() || *stop.borrow() {
                    debug!(job = name, "Job stopped");
                    return;
                }
            }
        }
    }
}

async fn run_once(job: &dyn Job) {
    let name = job.name();
    let started = Instant::now();

    let outcome = match job.execute().await {
        Ok(()) => {
            debug!(job = name, elapsed_ms = started.elapsed().as_millis(), "Job run finished");
            "success"
        }
        Err(e) => {
            error!(job = name, elapsed_ms = started.elapsed().as_millis(), error = %e, "Job run failed");
            "failure"
        }
    };
    counter!("background_job_runs_total", "job" => name, "outcome" => outcome).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingJob {
        runs: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl Job for CountingJob {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn frequency(&self) -> JobFrequency {
            JobFrequency::Seconds(1)
        }

        async fn execute(&self) -> Result<(), JobError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(JobError::Failed("boom".to_string()));
            }
            Ok(())
        }
    }

    fn counting(fail: bool) -> (CountingJob, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        (
            CountingJob {
                runs: Arc::clone(&runs),
                fail,
            },
            runs,
        )
    }

    #[test]
    fn test_job_frequency_duration() {
        assert_eq!(JobFrequency::Seconds(30).duration(), Duration::from_secs(30));
        assert_eq!(JobFrequency::Minutes(5).duration(), Duration::from_secs(300));
    }

    #[test]
    fn test_register_counts_jobs() {
        let mut scheduler = JobScheduler::default();
        assert_eq!(scheduler.job_count(), 0);

        scheduler.register(counting(false).0);
        scheduler.register(counting(true).0);
        assert_eq!(scheduler.job_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_before_first_period() {
        let (job, runs) = counting(false);
        let mut scheduler = JobScheduler::new();
        scheduler.register(job);
        scheduler.start();

        tokio::time::sleep(Duration::from_millis(500)).await;
        scheduler.shutdown(Duration::from_secs(1)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_job_keeps_its_schedule() {
        let (job, runs) = counting(true);
        let mut scheduler = JobScheduler::new();
        scheduler.register(job);
        scheduler.start();

        tokio::time::sleep(Duration::from_millis(3500)).await;
        scheduler.shutdown(Duration::from_secs(1)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_shutdown_without_start() {
        let mut scheduler = JobScheduler::new();
        scheduler.register(counting(false).0);
        scheduler.shutdown(Duration::from_millis(50)).await;
    }
}
