//! Strongly typed workflow definitions shared across the engine, the
//! coordinator client, and the CLI.
//!
//! A definition is the immutable step graph for one execution: an ordered
//! list of steps, each holding the activity specs that may run concurrently
//! within it. Definitions are produced once per execution by the engine's
//! builder (template plus run input) and never mutated afterwards.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Serde helper that writes [`Duration`] values as whole seconds.
///
/// The coordinator protocol expresses every timeout in integer seconds, so
/// the sub-second precision of [`Duration`] is intentionally dropped.
pub mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let seconds = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(seconds))
    }
}

/// The four coordinator-enforced timeouts attached to every activity.
///
/// The engine never enforces any of these itself; they are configuration
/// forwarded verbatim to the coordinator, which reports expiries back into
/// history as timed-out events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Longest gap allowed between activity heartbeats.
    #[serde(with = "duration_secs")]
    pub heartbeat_timeout: Duration,
    /// Total time allowed from scheduling to completion.
    #[serde(with = "duration_secs")]
    pub schedule_to_close_timeout: Duration,
    /// Time allowed to sit queued before a worker picks the task up.
    #[serde(with = "duration_secs")]
    pub schedule_to_start_timeout: Duration,
    /// Time allowed for a single execution attempt.
    #[serde(with = "duration_secs")]
    pub start_to_close_timeout: Duration,
}

/// One externally executed unit of work referenced by a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySpec {
    /// Activity type name resolved by the activity worker fleet.
    pub activity_type: String,
    /// Registered version of the activity type.
    pub version: String,
    /// Caller-assigned identifier, unique within the execution.
    pub activity_id: String,
    /// Static input payload; when absent the planner binds the run input or
    /// the payload carried from the prior step.
    #[serde(default)]
    pub input: Option<JsonValue>,
    /// Opaque control metadata forwarded unexamined to the coordinator.
    #[serde(default)]
    pub control: Option<JsonValue>,
    /// Timeouts forwarded verbatim with every schedule record.
    #[serde(flatten)]
    pub timeouts: TimeoutConfig,
}

/// One position in the workflow sequence.
///
/// All activities in a step are submitted together and may run concurrently;
/// the step is complete only when every one of them has succeeded. A step
/// with no activities is immediately complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Activity specs scheduled together when the step becomes current.
    pub activities: Vec<ActivitySpec>,
}

/// Immutable description of one workflow execution's step graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Workflow type name, e.g. `publish-article`.
    pub name: String,
    /// Registered version of the workflow type.
    pub version: String,
    /// Coordinator task list decision and activity tasks are posted to.
    pub task_list: String,
    /// Run input payload this execution was started with.
    #[serde(default)]
    pub input: JsonValue,
    /// Total time allowed for the whole execution.
    #[serde(with = "duration_secs")]
    pub execution_start_to_close_timeout: Duration,
    /// Time allowed for each decision task.
    #[serde(with = "duration_secs")]
    pub task_start_to_close_timeout: Duration,
    /// Ordered steps; position in this list is execution order.
    pub steps: Vec<Step>,
}

impl WorkflowDefinition {
    /// Iterates every activity spec across all steps, in step order.
    pub fn activities(&self) -> impl Iterator<Item = &ActivitySpec> {
        self.steps.iter().flat_map(|step| step.activities.iter())
    }

    /// Looks up an activity spec by identifier.
    pub fn activity(&self, activity_id: &str) -> Option<&ActivitySpec> {
        self.activities().find(|spec| spec.activity_id == activity_id)
    }

    /// Returns true when the definition references the identifier.
    pub fn contains_activity(&self, activity_id: &str) -> bool {
        self.activity(activity_id).is_some()
    }
}
