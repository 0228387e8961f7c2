//! Decision protocol records exchanged with the coordinator.
//!
//! A decision task hands the engine a (possibly paginated) view of one
//! execution's history; the engine answers with a list of decision records.
//! Records are plain structured data: building them is the engine's job,
//! transmitting them is the coordinator client's.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::history::HistoryPage;
use crate::workflow::TimeoutConfig;

/// Page size requested when fetching history, matching the coordinator's
/// maximum.
pub const DEFAULT_MAXIMUM_PAGE_SIZE: u32 = 100;

/// One invocation of the engine: the coordinator's view of an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTask {
    /// Opaque token echoed back when responding to the task.
    pub task_token: String,
    /// Workflow type name of the execution.
    pub workflow_type: String,
    /// Workflow type version of the execution.
    pub workflow_version: String,
    /// Identifier the execution was started with.
    pub execution_id: String,
    /// History pages delivered so far, oldest first.
    pub pages: Vec<HistoryPage>,
}

impl DecisionTask {
    /// Continuation token of the final page, when history is truncated.
    pub fn next_page_token(&self) -> Option<&str> {
        self.pages.last().and_then(|page| page.next_page_token.as_deref())
    }
}

/// Payload of one schedule-activity decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleActivityRecord {
    /// Activity type name for the worker fleet.
    pub activity_type: String,
    /// Registered version of the activity type.
    pub version: String,
    /// Identifier unique within the execution.
    pub activity_id: String,
    /// Task list the activity task is posted to.
    pub task_list: String,
    /// Input payload bound at planning time.
    #[serde(default)]
    pub input: JsonValue,
    /// Opaque control metadata forwarded from the activity spec.
    #[serde(default)]
    pub control: Option<JsonValue>,
    /// Timeouts forwarded verbatim from the activity spec.
    #[serde(flatten)]
    pub timeouts: TimeoutConfig,
}

/// One decision record in the response to a decision task.
///
/// A response carries zero or more of these; zero records is the no-op
/// continuation issued while scheduled activities are still in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision_type", rename_all = "snake_case")]
pub enum DecisionRecord {
    /// Schedule one activity task.
    ScheduleActivity(ScheduleActivityRecord),
    /// Close the execution successfully with a final payload.
    CompleteExecution {
        #[serde(default)]
        result: JsonValue,
    },
    /// Close the execution as failed.
    FailExecution {
        reason: String,
        #[serde(default)]
        details: Option<String>,
    },
}
