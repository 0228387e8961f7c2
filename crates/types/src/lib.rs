//! Shared type definitions for the galley publication pipeline.
//!
//! Everything the decider, the coordinator client, and the CLI exchange lives
//! here: workflow definitions and their step graphs, the history event log,
//! and the decision records sent back to the coordinator. The types are plain
//! serde data with no I/O so every consumer sees the same wire shapes.

pub mod decision;
pub mod history;
pub mod workflow;

pub use decision::{DEFAULT_MAXIMUM_PAGE_SIZE, DecisionRecord, DecisionTask, ScheduleActivityRecord};
pub use history::{EventAttributes, HistoryEvent, HistoryPage, TimeoutKind};
pub use workflow::{ActivitySpec, Step, TimeoutConfig, WorkflowDefinition, duration_secs};
