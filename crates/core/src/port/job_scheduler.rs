// External scheduler port
use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::{JobPayload, ScheduleJobResult, ScheduledJobSpec, TriggerSpec};
use crate::error::Result;

/// Periodic collection callback
///
/// Metric extraction lives behind this trait; the core only schedules it.
#[async_trait]
pub trait CollectionJob: Send + Sync {
    /// Run one collection cycle with the payload the job was scheduled with
    async fn run(&self, payload: &JobPayload) -> Result<()>;
}

/// Scheduler collaborator
///
/// Accepts a job and its trigger, and from then on is responsible for
/// invoking `job` on every trigger fire.
#[async_trait]
pub trait JobScheduler: Send + Sync {
    async fn schedule(
        &self,
        spec: ScheduledJobSpec,
        trigger: TriggerSpec,
        job: Arc<dyn CollectionJob>,
    ) -> ScheduleJobResult;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::JobActivationOutcome;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records every submission and answers with a scripted outcome
    pub struct MockJobScheduler {
        outcome: Mutex<JobActivationOutcome>,
        submissions: Mutex<Vec<(ScheduledJobSpec, TriggerSpec)>>,
    }

    impl MockJobScheduler {
        pub fn new(outcome: JobActivationOutcome) -> Self {
            Self {
                outcome: Mutex::new(outcome),
                submissions: Mutex::new(Vec::new()),
            }
        }
        pub fn new_success() -> Self {
            Self::new(JobActivationOutcome::Success)
        }
        pub fn new_failing() -> Self {
            Self::new(JobActivationOutcome::Failed)
        }
        pub fn set_outcome(&self, outcome: JobActivationOutcome) {
            *self.outcome.lock().unwrap() = outcome;
        }
        pub fn submission_count(&self) -> usize {
            self.submissions.lock().unwrap().len()
        }
        pub fn submissions(&self) -> Vec<(ScheduledJobSpec, TriggerSpec)> {
            self.submissions.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl JobScheduler for MockJobScheduler {
        async fn schedule(
            &self,
            spec: ScheduledJobSpec,
            trigger: TriggerSpec,
            _job: Arc<dyn CollectionJob>,
        ) -> ScheduleJobResult {
            let description = trigger.description.clone();
            self.submissions.lock().unwrap().push((spec, trigger));
            ScheduleJobResult {
                outcome: *self.outcome.lock().unwrap(),
                trigger_description: description,
            }
        }
    }

    /// Collection job that only counts its runs
    #[derive(Default)]
    pub struct CountingJob {
        runs: AtomicUsize,
    }

    impl CountingJob {
        pub fn new() -> Self {
            Self::default()
        }
        pub fn runs(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CollectionJob for CountingJob {
        async fn run(&self, _payload: &JobPayload) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}
