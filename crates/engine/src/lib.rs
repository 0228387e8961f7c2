//! # Galley Engine
//!
//! The decision engine for the galley publication pipeline. Given a workflow
//! definition and the accumulated history of one execution, it computes the
//! next correct set of scheduling decisions. The engine is a pure function of
//! history: every invocation may be a replay of a decision made before, so it
//! never double-schedules, tolerates any pagination of the same event
//! sequence, and answers terminal states with the same terminal decision.
//!
//! ## Architecture
//!
//! - **`state`**: folds history pages into an [`ExecutionState`] snapshot
//! - **`planner`**: turns (definition, state) into one abstract [`Decision`]
//! - **`emitter`**: renders a decision into coordinator protocol records
//! - **`builder`**: resolves definition templates into immutable definitions
//! - **`registry`**: startup-validated map of workflow type name to template
//!
//! All I/O lives elsewhere: history pages arrive from the coordinator client,
//! decision records leave through it, and activity workers run the work.

use anyhow::{Result, bail};

use galley_types::{DecisionRecord, DecisionTask, WorkflowDefinition};

pub mod builder;
pub mod emitter;
pub mod planner;
pub mod registry;
pub mod state;

pub use builder::{DefinitionTemplate, TemplateBundle, builtin_templates, load_template_file};
pub use emitter::emit;
pub use planner::{BoundActivity, Decision, plan};
pub use registry::WorkflowRegistry;
pub use state::{ActivityOutcome, ExecutionState, HistoryError};

/// Runs one complete decision task: reduce, plan, emit.
///
/// The task must carry the execution's full history; a trailing continuation
/// token means pages are still pending and planning would act on a truncated
/// view, so the task is refused instead. Malformed history is fatal and
/// surfaces as an error with no records emitted.
pub fn decide(definition: &WorkflowDefinition, task: &DecisionTask) -> Result<Vec<DecisionRecord>> {
    if let Some(token) = task.next_page_token() {
        bail!(
            "decision task for execution '{}' is truncated (continuation token '{token}'); \
             fetch the remaining history pages before deciding",
            task.execution_id
        );
    }

    let state = ExecutionState::reduce(definition, &task.pages)?;
    Ok(emit(&plan(definition, &state), definition))
}
