//! Execution start: idempotent by execution identifier.
//!
//! Starting is a narrow, stateless operation: ask the coordinator to begin a
//! new execution of a named workflow type. The one twist is the collision
//! case — an execution with the same identifier already running is an
//! expected outcome of redelivered triggers, so it is logged and reported as
//! [`StartOutcome::AlreadyRunning`], never surfaced as an error.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, info};

use galley_types::{WorkflowDefinition, duration_secs};

use crate::CoordinatorClient;

/// Request to begin a new execution of a workflow type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartExecutionRequest {
    /// Workflow type name.
    pub workflow_type: String,
    /// Workflow type version.
    pub workflow_version: String,
    /// Caller-chosen execution identifier; the idempotency key.
    pub execution_id: String,
    /// Run input payload handed to the first decision task.
    #[serde(default)]
    pub input: JsonValue,
    /// Task list decision tasks for this execution are posted to.
    pub task_list: String,
    /// Total time allowed for the execution.
    #[serde(with = "duration_secs")]
    pub execution_start_to_close_timeout: Duration,
    /// Time allowed for each decision task.
    #[serde(with = "duration_secs")]
    pub task_start_to_close_timeout: Duration,
}

impl StartExecutionRequest {
    /// Builds the start request for one execution of a definition.
    pub fn for_definition(definition: &WorkflowDefinition, execution_id: impl Into<String>) -> Self {
        Self {
            workflow_type: definition.name.clone(),
            workflow_version: definition.version.clone(),
            execution_id: execution_id.into(),
            input: definition.input.clone(),
            task_list: definition.task_list.clone(),
            execution_start_to_close_timeout: definition.execution_start_to_close_timeout,
            task_start_to_close_timeout: definition.task_start_to_close_timeout,
        }
    }
}

/// Coordinator acknowledgement of a newly started execution.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StartedExecution {
    /// Coordinator-assigned run identifier, when reported.
    #[serde(default)]
    pub run_id: Option<String>,
}

/// Protocol-level outcome of a raw start request.
#[derive(Debug, Error)]
pub enum StartRequestError {
    /// An execution with this identifier is already active.
    #[error("an execution with this identifier is already running")]
    AlreadyStarted,
    /// The coordinator refused the request for any other reason.
    #[error("coordinator rejected the start request ({status}): {message}")]
    Rejected { status: u16, message: String },
    /// The request never completed.
    #[error("coordinator transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Start failure surfaced to callers; the benign collision is not in here.
#[derive(Debug, Error)]
pub enum StartError {
    /// The coordinator refused the request.
    #[error("coordinator rejected the start request ({status}): {message}")]
    Rejected { status: u16, message: String },
    /// The request never completed.
    #[error("coordinator transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Outcome of an idempotent execution start.
#[derive(Debug, Clone, PartialEq)]
pub enum StartOutcome {
    /// A new execution began.
    Started(StartedExecution),
    /// An execution with this identifier was already active; nothing changed.
    AlreadyRunning,
}

/// Raw start interface; [`start_execution`] layers the idempotent
/// already-running handling on top. A trait so tests can stand in a fake
/// coordinator.
#[async_trait]
pub trait CoordinatorStart: Send + Sync {
    async fn request_start(&self, request: &StartExecutionRequest) -> Result<StartedExecution, StartRequestError>;
}

#[async_trait]
impl CoordinatorStart for CoordinatorClient {
    async fn request_start(&self, request: &StartExecutionRequest) -> Result<StartedExecution, StartRequestError> {
        let response = self.request(Method::POST, "/v1/executions").json(request).send().await?;

        match response.status() {
            status if status.is_success() => {
                let started = response.json::<StartedExecution>().await.unwrap_or_default();
                Ok(started)
            }
            StatusCode::CONFLICT => Err(StartRequestError::AlreadyStarted),
            status => {
                let message = response.text().await.unwrap_or_default();
                Err(StartRequestError::Rejected {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

/// Requests a new execution, treating an identifier collision as a no-op.
///
/// Every other coordinator error propagates as [`StartError`].
pub async fn start_execution(
    coordinator: &dyn CoordinatorStart,
    request: &StartExecutionRequest,
) -> Result<StartOutcome, StartError> {
    match coordinator.request_start(request).await {
        Ok(started) => {
            debug!(
                workflow = %request.workflow_type,
                execution_id = %request.execution_id,
                "started execution"
            );
            Ok(StartOutcome::Started(started))
        }
        Err(StartRequestError::AlreadyStarted) => {
            info!(
                workflow = %request.workflow_type,
                execution_id = %request.execution_id,
                "execution already running; start request was a no-op"
            );
            Ok(StartOutcome::AlreadyRunning)
        }
        Err(StartRequestError::Rejected { status, message }) => Err(StartError::Rejected { status, message }),
        Err(StartRequestError::Transport(error)) => Err(StartError::Transport(error)),
    }
}
