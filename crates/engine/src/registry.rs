//! Workflow registry: type name to definition template, checked at startup.
//!
//! Lookups by workflow type name happen on every execution start and every
//! decision task, so the registry validates its templates once, when they are
//! registered, instead of discovering mistakes per call.

use anyhow::{Result, bail};
use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use galley_types::WorkflowDefinition;

use crate::builder::{DefinitionTemplate, builtin_templates};

/// Startup-validated map from workflow type name to its template.
#[derive(Debug, Clone, Default)]
pub struct WorkflowRegistry {
    templates: IndexMap<String, DefinitionTemplate>,
}

impl WorkflowRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the engine's built-in templates.
    pub fn with_builtins() -> Result<Self> {
        Self::from_templates(builtin_templates()?)
    }

    /// Builds a registry from templates, validating each.
    pub fn from_templates(templates: impl IntoIterator<Item = DefinitionTemplate>) -> Result<Self> {
        let mut registry = Self::new();
        for template in templates {
            registry.register(template)?;
        }
        Ok(registry)
    }

    /// Registers one template, rejecting invalid templates and duplicate
    /// workflow type names.
    pub fn register(&mut self, template: DefinitionTemplate) -> Result<()> {
        template.validate()?;
        if self.templates.contains_key(&template.name) {
            bail!("workflow type '{}' is already registered", template.name);
        }
        self.templates.insert(template.name.clone(), template);
        Ok(())
    }

    /// The template for a workflow type name, if registered.
    pub fn template(&self, name: &str) -> Option<&DefinitionTemplate> {
        self.templates.get(name)
    }

    /// Builds the definition for one execution of a registered workflow.
    pub fn definition_for(&self, name: &str, run_input: JsonValue) -> Result<WorkflowDefinition> {
        let Some(template) = self.templates.get(name) else {
            bail!("unknown workflow type '{name}'");
        };
        Ok(template.build(run_input))
    }

    /// Registered workflow type names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    /// Number of registered templates.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
