//! Definition templates and the builder that resolves them.
//!
//! Templates are the authored form of a workflow: activity timeouts, versions,
//! and identifiers may be omitted and are resolved against the template's
//! defaults when a definition is built for one execution. The core data model
//! has no implicit defaults; everything optional is settled here, once, before
//! the engine ever sees the definition.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use galley_types::{ActivitySpec, Step, TimeoutConfig, WorkflowDefinition, duration_secs};

fn default_task_list() -> String {
    "default".into()
}

fn default_execution_timeout() -> Duration {
    Duration::from_secs(20 * 60)
}

fn default_task_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_activity_timeouts() -> TimeoutConfig {
    TimeoutConfig {
        heartbeat_timeout: Duration::from_secs(300),
        schedule_to_close_timeout: Duration::from_secs(300),
        schedule_to_start_timeout: Duration::from_secs(300),
        start_to_close_timeout: Duration::from_secs(300),
    }
}

/// Serde helper for optional whole-second durations in templates.
mod opt_duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&duration.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        let seconds = Option::<u64>::deserialize(deserializer)?;
        Ok(seconds.map(Duration::from_secs))
    }
}

/// Timeout defaults applied wherever a template leaves a value out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDefaults {
    /// Total time allowed for the whole execution.
    #[serde(with = "duration_secs", default = "default_execution_timeout")]
    pub execution_start_to_close_timeout: Duration,
    /// Time allowed for each decision task.
    #[serde(with = "duration_secs", default = "default_task_timeout")]
    pub task_start_to_close_timeout: Duration,
    /// Fallback for any activity timeout a template omits.
    #[serde(default = "default_activity_timeouts")]
    pub activity_timeouts: TimeoutConfig,
}

impl Default for TemplateDefaults {
    fn default() -> Self {
        Self {
            execution_start_to_close_timeout: default_execution_timeout(),
            task_start_to_close_timeout: default_task_timeout(),
            activity_timeouts: default_activity_timeouts(),
        }
    }
}

/// Authored form of one activity within a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityTemplate {
    /// Activity type name; also the identifier unless one is given.
    pub activity_type: String,
    /// Activity version; falls back to the workflow version.
    #[serde(default)]
    pub version: Option<String>,
    /// Identifier unique within the execution; falls back to the type name.
    #[serde(default)]
    pub activity_id: Option<String>,
    /// Static input payload, when the activity does not take the carried one.
    #[serde(default)]
    pub input: Option<JsonValue>,
    /// Opaque control metadata forwarded with every schedule record.
    #[serde(default)]
    pub control: Option<JsonValue>,
    #[serde(default, with = "opt_duration_secs")]
    pub heartbeat_timeout: Option<Duration>,
    #[serde(default, with = "opt_duration_secs")]
    pub schedule_to_close_timeout: Option<Duration>,
    #[serde(default, with = "opt_duration_secs")]
    pub schedule_to_start_timeout: Option<Duration>,
    #[serde(default, with = "opt_duration_secs")]
    pub start_to_close_timeout: Option<Duration>,
}

impl ActivityTemplate {
    fn activity_id(&self) -> &str {
        self.activity_id.as_deref().unwrap_or(&self.activity_type)
    }

    fn resolve(&self, workflow_version: &str, defaults: &TemplateDefaults) -> ActivitySpec {
        let fallback = defaults.activity_timeouts;
        ActivitySpec {
            activity_type: self.activity_type.clone(),
            version: self.version.clone().unwrap_or_else(|| workflow_version.to_string()),
            activity_id: self.activity_id().to_string(),
            input: self.input.clone(),
            control: self.control.clone(),
            timeouts: TimeoutConfig {
                heartbeat_timeout: self.heartbeat_timeout.unwrap_or(fallback.heartbeat_timeout),
                schedule_to_close_timeout: self.schedule_to_close_timeout.unwrap_or(fallback.schedule_to_close_timeout),
                schedule_to_start_timeout: self.schedule_to_start_timeout.unwrap_or(fallback.schedule_to_start_timeout),
                start_to_close_timeout: self.start_to_close_timeout.unwrap_or(fallback.start_to_close_timeout),
            },
        }
    }
}

/// Authored form of one step: the activity set scheduled together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepTemplate {
    #[serde(default)]
    pub activities: Vec<ActivityTemplate>,
}

/// Authored workflow template, loaded from a YAML/JSON document or built in
/// code, and instantiated into a [`WorkflowDefinition`] per execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionTemplate {
    /// Workflow type name.
    pub name: String,
    /// Workflow type version.
    pub version: String,
    /// Optional descriptive copy for listings.
    #[serde(default)]
    pub description: Option<String>,
    /// Coordinator task list; defaults to `default`.
    #[serde(default = "default_task_list")]
    pub task_list: String,
    /// Timeout defaults applied during resolution.
    #[serde(default)]
    pub defaults: TemplateDefaults,
    /// Ordered steps.
    pub steps: Vec<StepTemplate>,
}

impl DefinitionTemplate {
    /// Checks the template for construction-time mistakes.
    ///
    /// Rejects templates with no steps and templates whose resolved activity
    /// identifiers collide; both would otherwise surface as confusing
    /// decision-time behavior.
    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            bail!("workflow '{}' declares no steps", self.name);
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            for activity in &step.activities {
                if !seen.insert(activity.activity_id()) {
                    bail!(
                        "workflow '{}' declares duplicate activity identifier '{}'",
                        self.name,
                        activity.activity_id()
                    );
                }
            }
        }
        Ok(())
    }

    /// Builds the immutable definition for one execution.
    pub fn build(&self, run_input: JsonValue) -> WorkflowDefinition {
        WorkflowDefinition {
            name: self.name.clone(),
            version: self.version.clone(),
            task_list: self.task_list.clone(),
            input: run_input,
            execution_start_to_close_timeout: self.defaults.execution_start_to_close_timeout,
            task_start_to_close_timeout: self.defaults.task_start_to_close_timeout,
            steps: self
                .steps
                .iter()
                .map(|step| Step {
                    activities: step
                        .activities
                        .iter()
                        .map(|activity| activity.resolve(&self.version, &self.defaults))
                        .collect(),
                })
                .collect(),
        }
    }
}

/// Templates parsed from one definition document.
#[derive(Debug, Clone, Default)]
pub struct TemplateBundle {
    /// Templates keyed by workflow type name, in authoring order.
    pub templates: IndexMap<String, DefinitionTemplate>,
}

/// Loads a template file, accepting single- and multi-workflow documents.
///
/// YAML and JSON both parse; a multi-workflow document nests templates under
/// a `workflows` key while a single document is the template itself.
pub fn load_template_file(path: impl AsRef<Path>) -> Result<TemplateBundle> {
    let path = path.as_ref();
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read template file: {}", path.display()))?;

    #[derive(Deserialize)]
    struct MultiWorkflowDocument {
        workflows: IndexMap<String, DefinitionTemplate>,
    }

    // Multi-workflow first, so a multi document is never accepted as a single
    // template with its workflows ignored.
    if let Ok(document) = serde_yaml::from_str::<MultiWorkflowDocument>(&content) {
        return Ok(TemplateBundle {
            templates: document.workflows,
        });
    }

    if let Ok(template) = serde_yaml::from_str::<DefinitionTemplate>(&content) {
        let mut templates = IndexMap::new();
        templates.insert(template.name.clone(), template);
        return Ok(TemplateBundle { templates });
    }

    bail!(
        "unsupported template document format in {}: expected a single workflow \
         template or a multi-workflow document under a 'workflows' key",
        path.display()
    );
}

/// Templates shipped with the engine, mirroring the pipeline's stock
/// workflows.
pub fn builtin_templates() -> Result<Vec<DefinitionTemplate>> {
    [
        include_str!("../templates/publish_article.yaml"),
        include_str!("../templates/admin_email.yaml"),
        include_str!("../templates/checksum.yaml"),
    ]
    .iter()
    .map(|content| serde_yaml::from_str::<DefinitionTemplate>(content).context("parse built-in template"))
    .collect()
}
