// Interval job scheduler - tokio implementation of the scheduler collaborator
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use hostmon_core::application::{ShutdownSender, ShutdownToken};
use hostmon_core::domain::{JobPayload, ScheduleJobResult, ScheduledJobSpec, TriggerSpec};
use hostmon_core::port::{CollectionJob, JobScheduler};

/// Runs each scheduled job on its own periodic tokio task
///
/// The first run happens as soon as the job is accepted; later runs follow
/// the trigger period. A slow run delays the next tick instead of
/// overlapping with it.
pub struct IntervalJobScheduler {
    jobs: Mutex<HashMap<String, JoinHandle<()>>>,
    shutdown: ShutdownToken,
    fatal: Option<ShutdownSender>,
}

impl IntervalJobScheduler {
    /// Jobs stop when `shutdown` fires
    pub fn new(shutdown: ShutdownToken) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            shutdown,
            fatal: None,
        }
    }

    /// Signal `fatal` when a job reports an unrecoverable error
    pub fn with_fatal_signal(mut self, fatal: ShutdownSender) -> Self {
        self.fatal = Some(fatal);
        self
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Jobs accepted so far
    pub fn job_count(&self) -> usize {
        self.jobs().len()
    }

    pub fn is_scheduled(&self, identity: &str) -> bool {
        self.jobs().contains_key(identity)
    }

    /// Wait for every job task to stop after shutdown was signalled
    pub async fn join_all(&self) {
        let handles: Vec<_> = self.jobs().drain().map(|(_, h)| h).collect();
        for handle in handles {
            let _ = handle.await;
        }
    }
}

#[async_trait]
impl JobScheduler for IntervalJobScheduler {
    async fn schedule(
        &self,
        spec: ScheduledJobSpec,
        trigger: TriggerSpec,
        job: Arc<dyn CollectionJob>,
    ) -> ScheduleJobResult {
        let period = trigger.schedule.period;
        if period.is_zero() {
            error!(job = %spec.identity, "Trigger has no period");
            return ScheduleJobResult::failed(trigger.description);
        }

        let mut jobs = self.jobs();
        if jobs.contains_key(&spec.identity) {
            warn!(job = %spec.identity, "Job identity already scheduled");
            return ScheduleJobResult::failed(trigger.description);
        }

        info!(
            job = %spec.identity,
            trigger = %trigger.identity,
            cron = %trigger.schedule.expression,
            "Job scheduled"
        );
        let handle = tokio::spawn(run_periodic(
            spec.identity.clone(),
            spec.payload,
            period,
            job,
            self.shutdown.clone(),
            self.fatal.clone(),
        ));
        jobs.insert(spec.identity, handle);

        ScheduleJobResult::success(trigger.description)
    }
}

async fn run_periodic(
    identity: String,
    payload: JobPayload,
    period: Duration,
    job: Arc<dyn CollectionJob>,
    mut shutdown: ShutdownToken,
    fatal: Option<ShutdownSender>,
) {
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.wait() => break,
            _ = tick.tick() => {}
        }

        if let Err(e) = job.run(&payload).await {
            if e.is_fatal() {
                error!(job = %identity, error = %e, "Job hit a fatal error, stopping agent");
                if let Some(fatal) = &fatal {
                    fatal.shutdown();
                }
                break;
            }
            warn!(job = %identity, error = %e, "Job run failed");
        }
    }

    info!(job = %identity, "Job stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostmon_core::application::shutdown_channel;
    use hostmon_core::domain::{CronSchedule, JobActivationOutcome};
    use hostmon_core::port::job_scheduler::mocks::CountingJob;
    use hostmon_core::AppError;

    fn fast_trigger(id: &str) -> TriggerSpec {
        let schedule = CronSchedule {
            expression: "fast".to_string(),
            period: Duration::from_millis(20),
        };
        TriggerSpec::starting_now(id, format!("{} schedule", id), schedule)
    }

    fn spec(id: &str) -> ScheduledJobSpec {
        ScheduledJobSpec::new(id, format!("{} job", id), JobPayload::new())
    }

    struct FatalJob;

    #[async_trait]
    impl CollectionJob for FatalJob {
        async fn run(&self, _payload: &JobPayload) -> hostmon_core::Result<()> {
            Err(AppError::ConfigurationFatal("bad interval".to_string()))
        }
    }

    #[tokio::test]
    async fn test_job_runs_periodically_until_shutdown() {
        let (tx, token) = shutdown_channel();
        let scheduler = IntervalJobScheduler::new(token);
        let job = Arc::new(CountingJob::new());

        let result = scheduler
            .schedule(spec("svc"), fast_trigger("svc"), job.clone())
            .await;
        assert_eq!(result.outcome, JobActivationOutcome::Success);
        assert_eq!(result.trigger_description, "svc schedule");

        tokio::time::sleep(Duration::from_millis(150)).await;
        tx.shutdown();
        scheduler.join_all().await;

        let runs = job.runs();
        assert!(runs >= 3, "expected several runs, got {}", runs);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(job.runs(), runs);
    }

    #[tokio::test]
    async fn test_duplicate_identity_is_rejected() {
        let (_tx, token) = shutdown_channel();
        let scheduler = IntervalJobScheduler::new(token);
        let job = Arc::new(CountingJob::new());

        let first = scheduler
            .schedule(spec("svc"), fast_trigger("svc"), job.clone())
            .await;
        let second = scheduler.schedule(spec("svc"), fast_trigger("svc"), job).await;

        assert_eq!(first.outcome, JobActivationOutcome::Success);
        assert_eq!(second.outcome, JobActivationOutcome::Failed);
        assert_eq!(scheduler.job_count(), 1);
    }

    #[tokio::test]
    async fn test_fatal_job_error_signals_agent() {
        let (_tx, token) = shutdown_channel();
        let (fatal_tx, mut fatal_token) = shutdown_channel();
        let scheduler = IntervalJobScheduler::new(token).with_fatal_signal(fatal_tx);

        scheduler
            .schedule(spec("bad"), fast_trigger("bad"), Arc::new(FatalJob))
            .await;

        tokio::time::timeout(Duration::from_secs(1), fatal_token.wait())
            .await
            .unwrap();
        assert!(fatal_token.is_shutdown());
    }
}
