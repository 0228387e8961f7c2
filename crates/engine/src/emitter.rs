//! Rendering decisions into coordinator protocol records.
//!
//! The emitter only constructs records; posting them back to the coordinator
//! is the client's job. Timeouts and control metadata pass through verbatim
//! from the activity specs.

use galley_types::{DecisionRecord, ScheduleActivityRecord, WorkflowDefinition};

use crate::planner::Decision;

/// Renders one planned decision into the record list for the task response.
///
/// An empty schedule renders as an empty list: the no-op continuation that
/// lets already scheduled activities finish without new work.
pub fn emit(decision: &Decision, definition: &WorkflowDefinition) -> Vec<DecisionRecord> {
    match decision {
        Decision::Schedule(bound) => bound
            .iter()
            .map(|activity| {
                DecisionRecord::ScheduleActivity(ScheduleActivityRecord {
                    activity_type: activity.spec.activity_type.clone(),
                    version: activity.spec.version.clone(),
                    activity_id: activity.spec.activity_id.clone(),
                    task_list: definition.task_list.clone(),
                    input: activity.input.clone(),
                    control: activity.spec.control.clone(),
                    timeouts: activity.spec.timeouts,
                })
            })
            .collect(),
        Decision::Complete(result) => vec![DecisionRecord::CompleteExecution { result: result.clone() }],
        Decision::Fail { reason, details } => vec![DecisionRecord::FailExecution {
            reason: reason.clone(),
            details: details.clone(),
        }],
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use galley_types::DecisionRecord;

    use super::*;
    use crate::builder::DefinitionTemplate;
    use crate::planner::{BoundActivity, Decision};

    fn definition() -> WorkflowDefinition {
        let template: DefinitionTemplate = serde_yaml::from_str(
            r#"
name: admin-email
version: "1"
task_list: articles
steps:
  - activities:
      - activity_type: Ping
        heartbeat_timeout: 60
        schedule_to_close_timeout: 120
        schedule_to_start_timeout: 30
        start_to_close_timeout: 90
"#,
        )
        .expect("parse template");
        template.build(json!(null))
    }

    #[test]
    fn schedule_records_carry_spec_fields_verbatim() {
        let definition = definition();
        let spec = definition.steps[0].activities[0].clone();
        let decision = Decision::Schedule(vec![BoundActivity {
            spec: spec.clone(),
            input: json!({"digest": true}),
        }]);

        let records = emit(&decision, &definition);
        assert_eq!(records.len(), 1);
        let DecisionRecord::ScheduleActivity(schedule) = &records[0] else {
            panic!("expected a schedule record");
        };
        assert_eq!(schedule.activity_type, "Ping");
        assert_eq!(schedule.task_list, "articles");
        assert_eq!(schedule.input, json!({"digest": true}));
        assert_eq!(schedule.timeouts, spec.timeouts);
    }

    #[test]
    fn the_empty_schedule_emits_no_records() {
        let definition = definition();
        assert!(emit(&Decision::Schedule(Vec::new()), &definition).is_empty());
    }

    #[test]
    fn terminal_decisions_emit_a_single_record() {
        let definition = definition();

        let complete = emit(&Decision::Complete(json!({"sent": 3})), &definition);
        assert_eq!(complete, vec![DecisionRecord::CompleteExecution { result: json!({"sent": 3}) }]);

        let fail = emit(
            &Decision::Fail {
                reason: "cancel requested".into(),
                details: None,
            },
            &definition,
        );
        assert_eq!(
            fail,
            vec![DecisionRecord::FailExecution {
                reason: "cancel requested".into(),
                details: None
            }]
        );
    }
}
