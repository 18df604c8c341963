// Scheduled job model: what ActivationController hands to the external scheduler

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::{DomainError, Result};

/// Job group shared by every metrics job
pub const JOB_GROUP: &str = "job-metricsScheduler";

/// Trigger group shared by every metrics trigger
pub const TRIGGER_GROUP: &str = "trigger-metricsScheduler";

/// Opaque key/value map handed to the scheduled job on every run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobPayload(serde_json::Map<String, serde_json::Value>);

impl JobPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Periodic schedule derived from a poll interval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronSchedule {
    /// Six-field cron expression (seconds first)
    pub expression: String,
    pub period: Duration,
}

impl CronSchedule {
    /// Convert a poll interval in seconds into a cron expression
    ///
    /// Accepted shapes:
    /// - 1..=59 seconds
    /// - whole minutes 1..=59
    /// - whole hours 1..=23
    ///
    /// Anything else has no periodic cron form.
    pub fn from_interval_secs(secs: u32) -> Result<Self> {
        let expression = match secs {
            1..=59 => format!("*/{} * * * * *", secs),
            s if s % 60 == 0 && (1..=59).contains(&(s / 60)) => {
                format!("0 */{} * * * *", s / 60)
            }
            s if s % 3600 == 0 && (1..=23).contains(&(s / 3600)) => {
                format!("0 0 */{} * * *", s / 3600)
            }
            _ => return Err(DomainError::InvalidPollInterval(secs)),
        };

        Ok(Self {
            expression,
            period: Duration::from_secs(u64::from(secs)),
        })
    }
}

/// Job half of a schedule submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledJobSpec {
    pub identity: String,
    pub group: String,
    pub description: String,
    pub payload: JobPayload,
}

impl ScheduledJobSpec {
    pub fn new(id: &str, description: impl Into<String>, payload: JobPayload) -> Self {
        Self {
            identity: format!("{}-scheduler-job", id),
            group: JOB_GROUP.to_string(),
            description: description.into(),
            payload,
        }
    }
}

/// Trigger half of a schedule submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerSpec {
    pub identity: String,
    pub group: String,
    pub description: String,
    pub schedule: CronSchedule,
    pub start_at: DateTime<Utc>,
}

impl TriggerSpec {
    /// Trigger firing from now on, every `schedule.period`
    pub fn starting_now(id: &str, description: impl Into<String>, schedule: CronSchedule) -> Self {
        Self {
            identity: format!("{}-agent-scheduler-trigger", id),
            group: TRIGGER_GROUP.to_string(),
            description: description.into(),
            schedule,
            start_at: Utc::now(),
        }
    }
}

/// Terminal result of one activation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobActivationOutcome {
    Success,
    Failed,
}

impl std::fmt::Display for JobActivationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobActivationOutcome::Success => write!(f, "SUCCESS"),
            JobActivationOutcome::Failed => write!(f, "FAILED"),
        }
    }
}

/// Scheduler answer: outcome plus the trigger description for logging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleJobResult {
    pub outcome: JobActivationOutcome,
    pub trigger_description: String,
}

impl ScheduleJobResult {
    pub fn success(trigger_description: impl Into<String>) -> Self {
        Self {
            outcome: JobActivationOutcome::Success,
            trigger_description: trigger_description.into(),
        }
    }

    pub fn failed(trigger_description: impl Into<String>) -> Self {
        Self {
            outcome: JobActivationOutcome::Failed,
            trigger_description: trigger_description.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_interval() {
        let schedule = CronSchedule::from_interval_secs(30).unwrap();
        assert_eq!(schedule.expression, "*/30 * * * * *");
        assert_eq!(schedule.period, Duration::from_secs(30));
    }

    #[test]
    fn test_minute_and_hour_intervals() {
        assert_eq!(
            CronSchedule::from_interval_secs(300).unwrap().expression,
            "0 */5 * * * *"
        );
        assert_eq!(
            CronSchedule::from_interval_secs(7200).unwrap().expression,
            "0 0 */2 * * *"
        );
    }

    #[test]
    fn test_unschedulable_intervals() {
        assert_eq!(
            CronSchedule::from_interval_secs(0),
            Err(DomainError::InvalidPollInterval(0))
        );
        assert!(CronSchedule::from_interval_secs(90).is_err());
        assert!(CronSchedule::from_interval_secs(86_400).is_err());
    }

    #[test]
    fn test_spec_identities() {
        let job = ScheduledJobSpec::new("logstash", "logstash metrics push job", JobPayload::new());
        assert_eq!(job.identity, "logstash-scheduler-job");
        assert_eq!(job.group, JOB_GROUP);

        let trigger = TriggerSpec::starting_now(
            "logstash",
            "logstash metrics push schedule",
            CronSchedule::from_interval_secs(10).unwrap(),
        );
        assert_eq!(trigger.identity, "logstash-agent-scheduler-trigger");
    }

    #[test]
    fn test_payload_accessors() {
        let payload = JobPayload::new()
            .with("pluginName", "jmx-logstash")
            .with("step", 30);
        assert_eq!(payload.get_str("pluginName"), Some("jmx-logstash"));
        assert_eq!(payload.get("step").and_then(|v| v.as_u64()), Some(30));
        assert_eq!(payload.len(), 2);
    }
}
