//! History reduction: folding event pages into an execution snapshot.
//!
//! The engine holds no state across decision tasks. Each task rebuilds an
//! [`ExecutionState`] from the complete history supplied by the coordinator,
//! so the snapshot here is derived data, never persisted. Reduction is a pure
//! state transformation: it performs no I/O and never fetches pages itself.

use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::debug;

use galley_types::{EventAttributes, HistoryEvent, HistoryPage, TimeoutKind, WorkflowDefinition};

/// Structural violations of the history contract.
///
/// These are fatal to the decision task and must be surfaced to an operator;
/// the same delivery will fail the same way, so the engine never retries.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Sequence numbers went backwards or repeated.
    #[error("malformed history: event {event_id} does not follow event {last_event_id}")]
    NonMonotonicSequence { last_event_id: u64, event_id: u64 },
    /// An event referenced an activity the definition does not declare.
    #[error("malformed history: event {event_id} references unknown activity '{activity_id}'")]
    UnknownActivity { activity_id: String, event_id: u64 },
}

/// Where one activity currently stands, as far as history shows.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityOutcome {
    /// No schedule event observed yet.
    NotScheduled,
    /// Scheduled and awaiting a terminal event.
    Scheduled,
    /// Completed successfully with a result payload.
    Succeeded(JsonValue),
    /// Reported a permanent failure.
    Failed {
        reason: String,
        details: Option<String>,
    },
    /// One of the coordinator-enforced timeouts expired.
    TimedOut(TimeoutKind),
}

impl ActivityOutcome {
    /// True for a terminal success.
    pub fn is_succeeded(&self) -> bool {
        matches!(self, ActivityOutcome::Succeeded(_))
    }

    /// True while the activity is scheduled but not yet terminal.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, ActivityOutcome::Scheduled)
    }
}

/// Snapshot of one execution derived from its history.
#[derive(Debug, Clone)]
pub struct ExecutionState {
    /// Outcome per activity identifier, in definition order.
    outcomes: IndexMap<String, ActivityOutcome>,
    /// Input the execution was started with.
    run_input: JsonValue,
    /// Result payload of the most recent activity completion.
    carried: Option<JsonValue>,
    cancel_requested: bool,
    last_event_id: u64,
}

impl ExecutionState {
    /// Initial state for a definition: every activity not yet scheduled.
    pub fn new(definition: &WorkflowDefinition) -> Self {
        let outcomes = definition
            .activities()
            .map(|spec| (spec.activity_id.clone(), ActivityOutcome::NotScheduled))
            .collect();

        Self {
            outcomes,
            run_input: definition.input.clone(),
            carried: None,
            cancel_requested: false,
            last_event_id: 0,
        }
    }

    /// Folds every supplied page into a fresh state.
    ///
    /// Pages must cover the complete history for the task, oldest first;
    /// fetching missing pages is the caller's job. Any split of the same
    /// event sequence into pages produces the same state.
    pub fn reduce(definition: &WorkflowDefinition, pages: &[HistoryPage]) -> Result<Self, HistoryError> {
        let mut state = Self::new(definition);
        for page in pages {
            state.apply_page(page)?;
        }
        Ok(state)
    }

    /// Applies one page of events in order.
    ///
    /// Returns the page's continuation token when the history is truncated;
    /// the caller must fetch and apply the next page before planning.
    pub fn apply_page<'a>(&mut self, page: &'a HistoryPage) -> Result<Option<&'a str>, HistoryError> {
        for event in &page.events {
            self.apply_event(event)?;
        }
        Ok(page.next_page_token.as_deref())
    }

    fn apply_event(&mut self, event: &HistoryEvent) -> Result<(), HistoryError> {
        if event.event_id <= self.last_event_id {
            return Err(HistoryError::NonMonotonicSequence {
                last_event_id: self.last_event_id,
                event_id: event.event_id,
            });
        }
        self.last_event_id = event.event_id;

        match &event.attributes {
            EventAttributes::ExecutionStarted { input } => {
                self.run_input = input.clone();
            }
            EventAttributes::ActivityScheduled { activity_id } => {
                let outcome = self.outcome_mut(activity_id, event.event_id)?;
                // A schedule event never downgrades a terminal outcome.
                if matches!(outcome, ActivityOutcome::NotScheduled) {
                    *outcome = ActivityOutcome::Scheduled;
                }
            }
            EventAttributes::ActivityCompleted { activity_id, result } => {
                *self.outcome_mut(activity_id, event.event_id)? = ActivityOutcome::Succeeded(result.clone());
                self.carried = Some(result.clone());
            }
            EventAttributes::ActivityFailed {
                activity_id,
                reason,
                details,
            } => {
                *self.outcome_mut(activity_id, event.event_id)? = ActivityOutcome::Failed {
                    reason: reason.clone(),
                    details: details.clone(),
                };
            }
            EventAttributes::ActivityTimedOut {
                activity_id,
                timeout_kind,
            } => {
                *self.outcome_mut(activity_id, event.event_id)? = ActivityOutcome::TimedOut(*timeout_kind);
            }
            EventAttributes::ExecutionCancelRequested => {
                self.cancel_requested = true;
            }
            EventAttributes::Unrecognized => {
                debug!(event_id = event.event_id, "ignoring unrecognized history event");
            }
        }

        Ok(())
    }

    fn outcome_mut(&mut self, activity_id: &str, event_id: u64) -> Result<&mut ActivityOutcome, HistoryError> {
        self.outcomes
            .get_mut(activity_id)
            .ok_or_else(|| HistoryError::UnknownActivity {
                activity_id: activity_id.to_string(),
                event_id,
            })
    }

    /// Outcome of one activity; `NotScheduled` until history says otherwise.
    pub fn outcome(&self, activity_id: &str) -> &ActivityOutcome {
        static NOT_SCHEDULED: ActivityOutcome = ActivityOutcome::NotScheduled;
        self.outcomes.get(activity_id).unwrap_or(&NOT_SCHEDULED)
    }

    /// All outcomes keyed by activity identifier, in definition order.
    pub fn outcomes(&self) -> impl Iterator<Item = (&str, &ActivityOutcome)> {
        self.outcomes.iter().map(|(id, outcome)| (id.as_str(), outcome))
    }

    /// Input the execution was started with.
    pub fn run_input(&self) -> &JsonValue {
        &self.run_input
    }

    /// Payload carried forward from the most recent completion, falling back
    /// to the run input while nothing has completed yet.
    pub fn carried_payload(&self) -> &JsonValue {
        self.carried.as_ref().unwrap_or(&self.run_input)
    }

    /// True once history contains a cancel request for the execution.
    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested
    }

    /// Sequence number of the latest event folded in.
    pub fn last_event_id(&self) -> u64 {
        self.last_event_id
    }
}
