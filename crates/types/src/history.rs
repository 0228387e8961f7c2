//! Execution history events.
//!
//! History is the append-only, ordered log of facts about one execution and
//! the sole source of truth for decision making. The coordinator delivers it
//! in pages; when a page is truncated it carries a continuation token the
//! caller uses to fetch the rest before planning.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// One page of history events as delivered with a decision task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPage {
    /// Events in ascending sequence order within the page.
    pub events: Vec<HistoryEvent>,
    /// Continuation token; present when the history is truncated and a
    /// further page must be fetched before planning.
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// One recorded fact about an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    /// Monotonically increasing sequence number, unique per execution.
    pub event_id: u64,
    /// Kind-specific payload.
    #[serde(flatten)]
    pub attributes: EventAttributes,
}

/// Kind-specific event payloads.
///
/// The set grows over time on the coordinator side; anything this crate does
/// not recognize deserializes as [`EventAttributes::Unrecognized`] and is
/// skipped by the reducer rather than rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum EventAttributes {
    /// The execution started with the given run input.
    ExecutionStarted {
        #[serde(default)]
        input: JsonValue,
    },
    /// An activity task was placed on the task list.
    ActivityScheduled { activity_id: String },
    /// An activity finished successfully.
    ActivityCompleted {
        activity_id: String,
        #[serde(default)]
        result: JsonValue,
    },
    /// An activity reported a permanent failure.
    ActivityFailed {
        activity_id: String,
        reason: String,
        #[serde(default)]
        details: Option<String>,
    },
    /// The coordinator expired one of the activity's timeouts.
    ActivityTimedOut {
        activity_id: String,
        timeout_kind: TimeoutKind,
    },
    /// Cancellation of the whole execution was requested.
    ExecutionCancelRequested,
    /// Any event kind this crate does not know about.
    #[serde(other)]
    Unrecognized,
}

impl EventAttributes {
    /// The activity identifier this event concerns, if any.
    pub fn activity_id(&self) -> Option<&str> {
        match self {
            EventAttributes::ActivityScheduled { activity_id }
            | EventAttributes::ActivityCompleted { activity_id, .. }
            | EventAttributes::ActivityFailed { activity_id, .. }
            | EventAttributes::ActivityTimedOut { activity_id, .. } => Some(activity_id),
            _ => None,
        }
    }
}

/// Which of the four activity timeouts expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeoutKind {
    Heartbeat,
    ScheduleToClose,
    ScheduleToStart,
    StartToClose,
}

impl std::fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TimeoutKind::Heartbeat => "HEARTBEAT",
            TimeoutKind::ScheduleToClose => "SCHEDULE_TO_CLOSE",
            TimeoutKind::ScheduleToStart => "SCHEDULE_TO_START",
            TimeoutKind::StartToClose => "START_TO_CLOSE",
        };
        f.write_str(label)
    }
}
