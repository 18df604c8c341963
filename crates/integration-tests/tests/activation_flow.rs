//! Activation control plane driving the real interval scheduler

use hostmon_core::application::activation::JmxPrecondition;
use hostmon_core::application::{
    shutdown_channel, ActivationController, ActivationRegistry, ActivationRequest,
    ActivationState, PluginRunner, ShutdownSender,
};
use hostmon_core::domain::{
    ActivationPolicy, JobPayload, PluginCategory, PluginDescriptor, PreconditionContext,
};
use hostmon_core::port::job_scheduler::mocks::CountingJob;
use hostmon_core::port::process_source::mocks::MockProcessSource;
use hostmon_core::port::{InMemoryPluginRegistry, SubstringMatcher};
use hostmon_infra_system::IntervalJobScheduler;
use std::sync::Arc;
use std::time::Duration;

struct Agent {
    scheduler: Arc<IntervalJobScheduler>,
    controller: Arc<ActivationController>,
    source: Arc<MockProcessSource>,
    shutdown: ShutdownSender,
}

impl Agent {
    fn new() -> Self {
        let (shutdown, token) = shutdown_channel();
        let scheduler = Arc::new(IntervalJobScheduler::new(token));
        let controller = Arc::new(ActivationController::new(
            Arc::new(ActivationRegistry::new()),
            scheduler.clone(),
        ));
        Self {
            scheduler,
            controller,
            source: Arc::new(MockProcessSource::default()),
            shutdown,
        }
    }

    fn runner(&self, plugins: Vec<PluginDescriptor>) -> Arc<PluginRunner> {
        Arc::new(PluginRunner::new(
            Arc::new(InMemoryPluginRegistry::new(plugins)),
            self.controller.clone(),
            self.source.clone(),
            Arc::new(SubstringMatcher),
        ))
    }

    async fn stop(&self) {
        self.shutdown.shutdown();
        self.scheduler.join_all().await;
    }
}

fn jmx_plugin(servers: &str, poll_interval_secs: u32, job: Arc<CountingJob>) -> PluginDescriptor {
    PluginDescriptor {
        plugin_name: "jmx".to_string(),
        server_name: "java".to_string(),
        activation_policy: ActivationPolicy::Auto,
        poll_interval_secs,
        context: PreconditionContext::Jmx {
            server_names: servers.to_string(),
        },
        job,
    }
}

#[tokio::test]
async fn test_repeated_passes_schedule_once_and_job_runs() {
    let agent = Agent::new();
    agent.source.spawn_instances("org.logstash.Logstash", 10, 1);
    let job = Arc::new(CountingJob::new());
    let runner = agent.runner(vec![jmx_plugin("logstash", 1, job.clone())]);

    for _ in 0..3 {
        runner.run().await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(agent.scheduler.job_count(), 1);
    assert!(agent.scheduler.is_scheduled("jmx-logstash-scheduler-job"));
    assert!(agent.controller.registry().has_activated("logstash"));
    assert!(job.runs() >= 1);

    agent.stop().await;
}

#[tokio::test]
async fn test_concurrent_activation_of_one_service() {
    let agent = Agent::new();
    agent.source.spawn_instances("org.logstash.Logstash", 10, 1);
    let job = Arc::new(CountingJob::new());

    let mut handles = Vec::new();
    for _ in 0..16 {
        let controller = agent.controller.clone();
        let source = agent.source.clone();
        let job = job.clone();
        handles.push(tokio::spawn(async move {
            let request = ActivationRequest {
                server_name: "logstash".to_string(),
                plugin_name: "jmx-logstash".to_string(),
                description: "jmx-logstash".to_string(),
                category: PluginCategory::Jmx,
                policy: ActivationPolicy::Auto,
                poll_interval_secs: 30,
                precondition: Arc::new(JmxPrecondition::new(
                    source,
                    Arc::new(SubstringMatcher),
                    "logstash",
                )),
                payload: JobPayload::new(),
                job,
            };
            controller.activate(request).await.unwrap()
        }));
    }

    let mut activated = 0;
    for handle in handles {
        if handle.await.unwrap() == ActivationState::Activated {
            activated += 1;
        }
    }

    assert_eq!(activated, 1);
    assert_eq!(agent.scheduler.job_count(), 1);

    agent.stop().await;
}

/// A service started after the agent is picked up by the refresh job
#[tokio::test]
async fn test_discovery_refresh_activates_late_service() {
    let agent = Agent::new();
    let job = Arc::new(CountingJob::new());
    let runner = agent.runner(vec![jmx_plugin("kafka", 30, job.clone())]);

    let first = runner.start(1).await.unwrap();
    assert_eq!(first.not_ready, 1);
    assert!(agent.scheduler.is_scheduled("AgentFlush-scheduler-job"));

    agent.source.spawn_instances("kafka.Kafka", 40, 1);
    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert!(agent.controller.registry().has_activated("kafka"));
    assert!(agent.scheduler.is_scheduled("jmx-kafka-scheduler-job"));
    assert!(job.runs() >= 1);

    agent.stop().await;
}

#[tokio::test]
async fn test_unschedulable_interval_is_fatal() {
    let agent = Agent::new();
    agent.source.spawn_instances("org.logstash.Logstash", 10, 1);
    let runner = agent.runner(vec![jmx_plugin("logstash", 90, Arc::new(CountingJob::new()))]);

    let err = runner.run().await.unwrap_err();

    assert!(err.is_fatal());
    assert_eq!(agent.scheduler.job_count(), 0);
    assert!(!agent.controller.registry().has_activated("logstash"));

    agent.stop().await;
}
