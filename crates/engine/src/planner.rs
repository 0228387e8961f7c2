//! Decision planning: choosing the next action for an execution.
//!
//! Planning is pure and replay-safe. The same (definition, state) pair always
//! yields the same decision, an activity identifier is never scheduled twice,
//! and a later step never schedules before every activity of the step ahead
//! of it has succeeded.

use serde_json::Value as JsonValue;

use galley_types::{ActivitySpec, WorkflowDefinition};

use crate::state::{ActivityOutcome, ExecutionState};

/// An activity spec bound to the input payload it will be scheduled with.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundActivity {
    /// The definition's spec for this activity.
    pub spec: ActivitySpec,
    /// Input resolved at planning time: the spec's static input when present,
    /// otherwise the run input (first step) or the carried payload.
    pub input: JsonValue,
}

/// The single action produced by one planning call.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Schedule these activities; empty means wait for in-flight work.
    Schedule(Vec<BoundActivity>),
    /// Every step succeeded; close the execution with the final payload.
    Complete(JsonValue),
    /// Close the execution as failed.
    Fail {
        reason: String,
        details: Option<String>,
    },
}

/// Computes the next action for an execution.
///
/// Any observed failure, timeout, or cancel request terminates the execution
/// immediately; retries are the activity worker layer's concern, never the
/// engine's. Otherwise the first step that has not fully succeeded determines
/// what to do: schedule its remaining activities, or wait while some are
/// still in flight. With no incomplete step left, the execution completes
/// with the payload carried from the final step.
pub fn plan(definition: &WorkflowDefinition, state: &ExecutionState) -> Decision {
    if state.cancel_requested() {
        return Decision::Fail {
            reason: "cancel requested".into(),
            details: None,
        };
    }

    if let Some(decision) = first_fault(state) {
        return decision;
    }

    for (step_index, step) in definition.steps.iter().enumerate() {
        let mut pending = Vec::new();
        let mut in_flight = false;

        for spec in &step.activities {
            match state.outcome(&spec.activity_id) {
                ActivityOutcome::Succeeded(_) => {}
                ActivityOutcome::Scheduled => in_flight = true,
                ActivityOutcome::NotScheduled => pending.push(spec),
                // Faults were handled above.
                ActivityOutcome::Failed { .. } | ActivityOutcome::TimedOut(_) => {}
            }
        }

        if in_flight {
            return Decision::Schedule(Vec::new());
        }
        if !pending.is_empty() {
            let bound = pending
                .into_iter()
                .map(|spec| BoundActivity {
                    spec: spec.clone(),
                    input: bind_input(spec, step_index, state),
                })
                .collect();
            return Decision::Schedule(bound);
        }
        // Step fully succeeded (or empty); fall through to the next one.
    }

    Decision::Complete(state.carried_payload().clone())
}

fn first_fault(state: &ExecutionState) -> Option<Decision> {
    for (activity_id, outcome) in state.outcomes() {
        match outcome {
            ActivityOutcome::Failed { reason, details } => {
                return Some(Decision::Fail {
                    reason: reason.clone(),
                    details: details.clone(),
                });
            }
            ActivityOutcome::TimedOut(kind) => {
                return Some(Decision::Fail {
                    reason: format!("activity '{activity_id}' timed out ({kind})"),
                    details: None,
                });
            }
            _ => {}
        }
    }
    None
}

fn bind_input(spec: &ActivitySpec, step_index: usize, state: &ExecutionState) -> JsonValue {
    if let Some(input) = &spec.input {
        return input.clone();
    }
    if step_index == 0 {
        state.run_input().clone()
    } else {
        state.carried_payload().clone()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use galley_types::{EventAttributes, HistoryEvent, HistoryPage};

    use super::*;
    use crate::builder::DefinitionTemplate;

    fn definition() -> WorkflowDefinition {
        let template: DefinitionTemplate = serde_yaml::from_str(
            r#"
name: publish-article
version: "1"
steps:
  - activities:
      - activity_type: ConvertImages
        activity_id: A1
      - activity_type: RenderPdf
        activity_id: A2
  - activities:
      - activity_type: DepositArchive
        activity_id: B1
"#,
        )
        .expect("parse template");
        template.build(json!({"article": 353}))
    }

    fn state_after(definition: &WorkflowDefinition, events: Vec<EventAttributes>) -> ExecutionState {
        let events = events
            .into_iter()
            .enumerate()
            .map(|(index, attributes)| HistoryEvent {
                event_id: index as u64 + 1,
                attributes,
            })
            .collect();
        ExecutionState::reduce(
            definition,
            &[HistoryPage {
                events,
                next_page_token: None,
            }],
        )
        .expect("reduce")
    }

    fn scheduled(activity_id: &str) -> EventAttributes {
        EventAttributes::ActivityScheduled {
            activity_id: activity_id.into(),
        }
    }

    fn completed(activity_id: &str, result: JsonValue) -> EventAttributes {
        EventAttributes::ActivityCompleted {
            activity_id: activity_id.into(),
            result,
        }
    }

    #[test]
    fn schedules_the_whole_first_step_with_the_run_input() {
        let definition = definition();
        let state = state_after(
            &definition,
            vec![EventAttributes::ExecutionStarted { input: json!({"article": 353}) }],
        );

        let Decision::Schedule(bound) = plan(&definition, &state) else {
            panic!("expected a schedule decision");
        };
        let ids: Vec<&str> = bound.iter().map(|b| b.spec.activity_id.as_str()).collect();
        assert_eq!(ids, vec!["A1", "A2"]);
        assert!(bound.iter().all(|b| b.input == json!({"article": 353})));
    }

    #[test]
    fn waits_while_the_current_step_is_in_flight() {
        let definition = definition();
        let state = state_after(
            &definition,
            vec![
                EventAttributes::ExecutionStarted { input: json!(null) },
                scheduled("A1"),
                scheduled("A2"),
            ],
        );

        assert_eq!(plan(&definition, &state), Decision::Schedule(Vec::new()));
    }

    #[test]
    fn gates_the_second_step_on_full_first_step_success() {
        let definition = definition();
        let state = state_after(
            &definition,
            vec![
                EventAttributes::ExecutionStarted { input: json!(null) },
                scheduled("A1"),
                scheduled("A2"),
                completed("A1", json!({"images": 4})),
            ],
        );

        // A2 still in flight: nothing new, and in particular no B1.
        assert_eq!(plan(&definition, &state), Decision::Schedule(Vec::new()));
    }

    #[test]
    fn carries_the_latest_completion_payload_into_the_next_step() {
        let definition = definition();
        let state = state_after(
            &definition,
            vec![
                EventAttributes::ExecutionStarted { input: json!({"article": 353}) },
                scheduled("A1"),
                scheduled("A2"),
                completed("A1", json!({"images": 4})),
                completed("A2", json!({"pdf": "353.pdf"})),
            ],
        );

        let Decision::Schedule(bound) = plan(&definition, &state) else {
            panic!("expected a schedule decision");
        };
        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].spec.activity_id, "B1");
        assert_eq!(bound[0].input, json!({"pdf": "353.pdf"}));
    }

    #[test]
    fn schedules_only_the_never_scheduled_remainder() {
        let definition = definition();
        // A1 already succeeded, A2 never scheduled, nothing in flight.
        let state = state_after(
            &definition,
            vec![
                EventAttributes::ExecutionStarted { input: json!(null) },
                scheduled("A1"),
                completed("A1", json!(1)),
            ],
        );

        let Decision::Schedule(bound) = plan(&definition, &state) else {
            panic!("expected a schedule decision");
        };
        let ids: Vec<&str> = bound.iter().map(|b| b.spec.activity_id.as_str()).collect();
        assert_eq!(ids, vec!["A2"]);
    }

    #[test]
    fn fails_fast_on_any_activity_failure() {
        let definition = definition();
        let state = state_after(
            &definition,
            vec![
                EventAttributes::ExecutionStarted { input: json!(null) },
                scheduled("A1"),
                scheduled("A2"),
                EventAttributes::ActivityFailed {
                    activity_id: "A2".into(),
                    reason: "x".into(),
                    details: None,
                },
            ],
        );

        assert_eq!(
            plan(&definition, &state),
            Decision::Fail {
                reason: "x".into(),
                details: None
            }
        );
    }

    #[test]
    fn fails_on_timeout_with_the_kind_in_the_reason() {
        let definition = definition();
        let state = state_after(
            &definition,
            vec![
                scheduled("A1"),
                EventAttributes::ActivityTimedOut {
                    activity_id: "A1".into(),
                    timeout_kind: galley_types::TimeoutKind::StartToClose,
                },
            ],
        );

        let Decision::Fail { reason, .. } = plan(&definition, &state) else {
            panic!("expected a fail decision");
        };
        assert!(reason.contains("A1"), "unexpected reason: {reason}");
        assert!(reason.contains("START_TO_CLOSE"), "unexpected reason: {reason}");
    }

    #[test]
    fn fails_on_cancel_request_regardless_of_in_flight_work() {
        let definition = definition();
        let state = state_after(
            &definition,
            vec![scheduled("A1"), EventAttributes::ExecutionCancelRequested],
        );

        assert_eq!(
            plan(&definition, &state),
            Decision::Fail {
                reason: "cancel requested".into(),
                details: None
            }
        );
    }

    #[test]
    fn completes_with_the_final_carried_payload() {
        let definition = definition();
        let state = state_after(
            &definition,
            vec![
                EventAttributes::ExecutionStarted { input: json!(null) },
                scheduled("A1"),
                scheduled("A2"),
                completed("A1", json!(1)),
                completed("A2", json!(2)),
                scheduled("B1"),
                completed("B1", json!({"archived": true})),
            ],
        );

        assert_eq!(plan(&definition, &state), Decision::Complete(json!({"archived": true})));
    }

    #[test]
    fn planning_a_terminal_state_is_idempotent() {
        let definition = definition();
        let state = state_after(
            &definition,
            vec![
                scheduled("A1"),
                EventAttributes::ActivityFailed {
                    activity_id: "A1".into(),
                    reason: "boom".into(),
                    details: Some("stack".into()),
                },
            ],
        );

        let first = plan(&definition, &state);
        let second = plan(&definition, &state);
        assert_eq!(first, second);
        assert!(matches!(first, Decision::Fail { .. }));
    }

    #[test]
    fn empty_steps_are_immediately_complete() {
        let template: DefinitionTemplate = serde_yaml::from_str(
            r#"
name: empty
version: "1"
steps:
  - activities: []
"#,
        )
        .expect("parse template");
        let definition = template.build(json!({"article": 1}));
        let state = ExecutionState::new(&definition);

        assert_eq!(plan(&definition, &state), Decision::Complete(json!({"article": 1})));
    }
}
