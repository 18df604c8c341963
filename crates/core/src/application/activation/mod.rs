//! Activation control plane
//!
//! Decides per service whether to schedule periodic collection and guarantees
//! that a service is activated at most once per process.
//!
//! ```text
//! UNCHECKED -> precondition -> ACTIVATING -> ACTIVATED (terminal, registered)
//!                                         -> FAILED    (retried on a later call)
//! ```

mod precondition;
mod registry;

pub use precondition::{
    AlwaysReady, DetectPrecondition, JdbcPrecondition, JmxPrecondition, Precondition,
    SnmpPrecondition,
};
pub use registry::ActivationRegistry;

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::application::constants::DISCOVERY_REFRESH_ID;
use crate::domain::{
    ActivationPolicy, CronSchedule, JobActivationOutcome, JobPayload, PluginCategory,
    ScheduledJobSpec, TriggerSpec,
};
use crate::error::{AppError, Result};
use crate::port::{CollectionJob, JobScheduler};

/// Result of one activation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    /// Already in the registry; nothing was done
    AlreadyActivated,
    /// Precondition false (or FORCE without required configuration)
    PreconditionNotMet,
    /// Job scheduled and registered
    Activated,
    /// Scheduler rejected the job; a later call may retry
    Failed,
}

/// Everything needed to activate one service
pub struct ActivationRequest {
    pub server_name: String,
    pub plugin_name: String,
    pub description: String,
    pub category: PluginCategory,
    pub policy: ActivationPolicy,
    pub poll_interval_secs: u32,
    pub precondition: Arc<dyn Precondition>,
    pub payload: JobPayload,
    pub job: Arc<dyn CollectionJob>,
}

/// One lock per plugin category
///
/// Activations of one category are serialized; different categories run in
/// parallel.
struct CategoryLocks {
    slots: [Mutex<()>; 4],
}

impl CategoryLocks {
    fn new() -> Self {
        Self {
            slots: [Mutex::new(()), Mutex::new(()), Mutex::new(()), Mutex::new(())],
        }
    }

    fn lock_for(&self, category: PluginCategory) -> &Mutex<()> {
        &self.slots[category.index()]
    }
}

/// Schedules collection jobs for discovered services
pub struct ActivationController {
    registry: Arc<ActivationRegistry>,
    scheduler: Arc<dyn JobScheduler>,
    locks: CategoryLocks,
}

impl ActivationController {
    pub fn new(registry: Arc<ActivationRegistry>, scheduler: Arc<dyn JobScheduler>) -> Self {
        Self {
            registry,
            scheduler,
            locks: CategoryLocks::new(),
        }
    }

    pub fn registry(&self) -> &Arc<ActivationRegistry> {
        &self.registry
    }

    /// Activate one service
    ///
    /// # Errors
    /// `AppError::ConfigurationFatal` when the poll interval has no periodic
    /// schedule. Every other outcome is reported through `ActivationState`.
    pub async fn activate(&self, request: ActivationRequest) -> Result<ActivationState> {
        let _guard = self.locks.lock_for(request.category).lock().await;

        if self.registry.has_activated(&request.server_name) {
            return Ok(ActivationState::AlreadyActivated);
        }

        let ready = match request.policy {
            ActivationPolicy::Auto => request.precondition.check().await,
            ActivationPolicy::Force => request.precondition.force_allowed(),
        };
        if !ready {
            debug!(
                server_name = %request.server_name,
                category = %request.category,
                policy = ?request.policy,
                "Precondition not met, skipping activation"
            );
            return Ok(ActivationState::PreconditionNotMet);
        }

        if request.policy == ActivationPolicy::Auto {
            info!(
                server_name = %request.server_name,
                plugin = %request.plugin_name,
                "Discovered service, starting plugin"
            );
        }

        self.schedule(
            &request.server_name,
            &request.description,
            request.poll_interval_secs,
            request.payload,
            request.job,
        )
        .await
    }

    /// Schedule the periodic discovery refresh job
    ///
    /// A zero interval disables the refresh.
    pub async fn activate_discovery_refresh(
        &self,
        interval_secs: u32,
        job: Arc<dyn CollectionJob>,
    ) -> Result<ActivationState> {
        if interval_secs == 0 {
            info!("Discovery refresh disabled");
            return Ok(ActivationState::PreconditionNotMet);
        }
        if self.registry.has_activated(DISCOVERY_REFRESH_ID) {
            return Ok(ActivationState::AlreadyActivated);
        }
        self.schedule(
            DISCOVERY_REFRESH_ID,
            DISCOVERY_REFRESH_ID,
            interval_secs,
            JobPayload::new(),
            job,
        )
        .await
    }

    async fn schedule(
        &self,
        server_name: &str,
        description: &str,
        poll_interval_secs: u32,
        payload: JobPayload,
        job: Arc<dyn CollectionJob>,
    ) -> Result<ActivationState> {
        let spec = ScheduledJobSpec::new(
            description,
            format!("{} metrics push job", description),
            payload,
        );
        let trigger = build_trigger(description, poll_interval_secs)?;

        let result = self.scheduler.schedule(spec, trigger, job).await;
        match result.outcome {
            JobActivationOutcome::Success => {
                info!(
                    server_name = %server_name,
                    trigger = %result.trigger_description,
                    "Collection job started"
                );
                self.registry.mark_activated(server_name);
                Ok(ActivationState::Activated)
            }
            JobActivationOutcome::Failed => {
                error!(
                    server_name = %server_name,
                    trigger = %result.trigger_description,
                    "Collection job failed to start"
                );
                Ok(ActivationState::Failed)
            }
        }
    }
}

/// Build the periodic trigger for `id`
fn build_trigger(id: &str, poll_interval_secs: u32) -> Result<TriggerSpec> {
    let description = format!("{} metrics push schedule", id);
    match CronSchedule::from_interval_secs(poll_interval_secs) {
        Ok(schedule) => {
            info!(trigger = %description, cron = %schedule.expression, "Building schedule");
            Ok(TriggerSpec::starting_now(id, description, schedule))
        }
        Err(e) => {
            error!(trigger = %description, error = %e, "Agent cannot start: schedule configuration invalid");
            Err(AppError::ConfigurationFatal(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::job_scheduler::mocks::{CountingJob, MockJobScheduler};
    use std::time::Duration;

    struct FixedPrecondition {
        ready: bool,
        force_ok: bool,
    }

    #[async_trait::async_trait]
    impl Precondition for FixedPrecondition {
        async fn check(&self) -> bool {
            self.ready
        }
        fn force_allowed(&self) -> bool {
            self.force_ok
        }
    }

    fn request(name: &str, policy: ActivationPolicy, ready: bool, force_ok: bool) -> ActivationRequest {
        ActivationRequest {
            server_name: name.to_string(),
            plugin_name: format!("jmx-{}", name),
            description: format!("jmx-{}", name),
            category: PluginCategory::Jmx,
            policy,
            poll_interval_secs: 30,
            precondition: Arc::new(FixedPrecondition { ready, force_ok }),
            payload: JobPayload::new().with("pluginName", format!("jmx-{}", name)),
            job: Arc::new(CountingJob::new()),
        }
    }

    fn controller(scheduler: Arc<MockJobScheduler>) -> ActivationController {
        ActivationController::new(Arc::new(ActivationRegistry::new()), scheduler)
    }

    #[tokio::test]
    async fn test_activates_at_most_once() {
        let scheduler = Arc::new(MockJobScheduler::new_success());
        let controller = controller(scheduler.clone());

        let first = controller
            .activate(request("logstash", ActivationPolicy::Auto, true, true))
            .await
            .unwrap();
        let second = controller
            .activate(request("logstash", ActivationPolicy::Auto, true, true))
            .await
            .unwrap();

        assert_eq!(first, ActivationState::Activated);
        assert_eq!(second, ActivationState::AlreadyActivated);
        assert_eq!(scheduler.submission_count(), 1);
        assert!(controller.registry().has_activated("logstash"));
        assert_eq!(controller.registry().len(), 1);
    }

    #[tokio::test]
    async fn test_precondition_false_skips_scheduling() {
        let scheduler = Arc::new(MockJobScheduler::new_success());
        let controller = controller(scheduler.clone());

        let state = controller
            .activate(request("kafka", ActivationPolicy::Auto, false, true))
            .await
            .unwrap();

        assert_eq!(state, ActivationState::PreconditionNotMet);
        assert_eq!(scheduler.submission_count(), 0);
        assert!(!controller.registry().has_activated("kafka"));
    }

    #[tokio::test]
    async fn test_force_bypasses_check_but_not_configuration() {
        let scheduler = Arc::new(MockJobScheduler::new_success());
        let controller = controller(scheduler.clone());

        let forced = controller
            .activate(request("tomcat", ActivationPolicy::Force, false, true))
            .await
            .unwrap();
        assert_eq!(forced, ActivationState::Activated);

        let unconfigured = controller
            .activate(request("mysql", ActivationPolicy::Force, true, false))
            .await
            .unwrap();
        assert_eq!(unconfigured, ActivationState::PreconditionNotMet);
        assert_eq!(scheduler.submission_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_outcome_is_retryable() {
        let scheduler = Arc::new(MockJobScheduler::new_failing());
        let controller = controller(scheduler.clone());

        let failed = controller
            .activate(request("zookeeper", ActivationPolicy::Auto, true, true))
            .await
            .unwrap();
        assert_eq!(failed, ActivationState::Failed);
        assert!(!controller.registry().has_activated("zookeeper"));

        scheduler.set_outcome(JobActivationOutcome::Success);
        let retried = controller
            .activate(request("zookeeper", ActivationPolicy::Auto, true, true))
            .await
            .unwrap();
        assert_eq!(retried, ActivationState::Activated);
        assert_eq!(scheduler.submission_count(), 2);
    }

    #[tokio::test]
    async fn test_invalid_interval_is_fatal() {
        let scheduler = Arc::new(MockJobScheduler::new_success());
        let controller = controller(scheduler.clone());

        let mut req = request("logstash", ActivationPolicy::Auto, true, true);
        req.poll_interval_secs = 0;

        let err = controller.activate(req).await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(scheduler.submission_count(), 0);
        assert!(!controller.registry().has_activated("logstash"));
    }

    #[tokio::test]
    async fn test_job_and_trigger_are_derived_from_description() {
        let scheduler = Arc::new(MockJobScheduler::new_success());
        let controller = controller(scheduler.clone());

        controller
            .activate(request("logstash", ActivationPolicy::Auto, true, true))
            .await
            .unwrap();

        let (spec, trigger) = scheduler.submissions().remove(0);
        assert_eq!(spec.identity, "jmx-logstash-scheduler-job");
        assert_eq!(spec.payload.get_str("pluginName"), Some("jmx-logstash"));
        assert_eq!(trigger.identity, "jmx-logstash-agent-scheduler-trigger");
        assert_eq!(trigger.schedule.expression, "*/30 * * * * *");
    }

    #[tokio::test]
    async fn test_concurrent_same_category_schedules_once() {
        let scheduler = Arc::new(MockJobScheduler::new_success());
        let controller = Arc::new(controller(scheduler.clone()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let controller = Arc::clone(&controller);
            handles.push(tokio::spawn(async move {
                controller
                    .activate(request("logstash", ActivationPolicy::Auto, true, true))
                    .await
                    .unwrap()
            }));
        }

        let mut activated = 0;
        for handle in handles {
            if handle.await.unwrap() == ActivationState::Activated {
                activated += 1;
            }
        }
        assert_eq!(activated, 1);
        assert_eq!(scheduler.submission_count(), 1);
    }

    #[tokio::test]
    async fn test_discovery_refresh() {
        let scheduler = Arc::new(MockJobScheduler::new_success());
        let controller = controller(scheduler.clone());
        let job: Arc<dyn CollectionJob> = Arc::new(CountingJob::new());

        let disabled = controller
            .activate_discovery_refresh(0, job.clone())
            .await
            .unwrap();
        assert_eq!(disabled, ActivationState::PreconditionNotMet);

        let started = controller
            .activate_discovery_refresh(60, job.clone())
            .await
            .unwrap();
        assert_eq!(started, ActivationState::Activated);
        assert!(controller.registry().has_activated(DISCOVERY_REFRESH_ID));

        let again = controller.activate_discovery_refresh(60, job).await.unwrap();
        assert_eq!(again, ActivationState::AlreadyActivated);
        assert_eq!(scheduler.submission_count(), 1);
    }

    /// Precondition that reports entry and then waits to be released
    struct GatedPrecondition {
        entered: Arc<tokio::sync::Notify>,
        release: Arc<tokio::sync::Notify>,
    }

    #[async_trait::async_trait]
    impl Precondition for GatedPrecondition {
        async fn check(&self) -> bool {
            self.entered.notify_one();
            self.release.notified().await;
            true
        }
    }

    #[tokio::test]
    async fn test_categories_activate_in_parallel() {
        let scheduler = Arc::new(MockJobScheduler::new_success());
        let controller = Arc::new(controller(scheduler.clone()));
        let entered = Arc::new(tokio::sync::Notify::new());
        let release = Arc::new(tokio::sync::Notify::new());

        let mut blocked = request("logstash", ActivationPolicy::Auto, true, true);
        blocked.precondition = Arc::new(GatedPrecondition {
            entered: entered.clone(),
            release: release.clone(),
        });
        let jmx = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.activate(blocked).await.unwrap() }
        });
        entered.notified().await;

        let mut ping = request("10.0.0.1", ActivationPolicy::Auto, true, true);
        ping.category = PluginCategory::Detect;
        let detect = tokio::time::timeout(Duration::from_secs(2), controller.activate(ping))
            .await
            .expect("detect activation waited on the jmx lock")
            .unwrap();

        assert_eq!(detect, ActivationState::Activated);
        assert!(!jmx.is_finished());
        assert!(!controller.registry().has_activated("logstash"));

        release.notify_one();
        assert_eq!(jmx.await.unwrap(), ActivationState::Activated);
        assert_eq!(scheduler.submission_count(), 2);
    }

    #[tokio::test]
    async fn test_same_category_waits_for_lock() {
        let scheduler = Arc::new(MockJobScheduler::new_success());
        let controller = Arc::new(controller(scheduler.clone()));
        let entered = Arc::new(tokio::sync::Notify::new());
        let release = Arc::new(tokio::sync::Notify::new());

        let mut blocked = request("logstash", ActivationPolicy::Auto, true, true);
        blocked.precondition = Arc::new(GatedPrecondition {
            entered: entered.clone(),
            release: release.clone(),
        });
        let first = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.activate(blocked).await.unwrap() }
        });
        entered.notified().await;

        let waiting = tokio::time::timeout(
            Duration::from_millis(200),
            controller.activate(request("kafka", ActivationPolicy::Auto, true, true)),
        )
        .await;
        assert!(waiting.is_err());

        release.notify_one();
        assert_eq!(first.await.unwrap(), ActivationState::Activated);
    }
}
