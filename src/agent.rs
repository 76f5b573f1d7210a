//! Agent definitions and the agent catalog.
//!
//! An [`Agent`] is one text-transformation stage: a system prompt plus a
//! sampling temperature. The [`AgentCatalog`] is the configuration store
//! that owns every known agent; only [`AgentKind::Core`] agents, in catalog
//! order, take part in a run. Optional agents stay in the catalog until the
//! user promotes them.
//!
//! The catalog is a plain JSON document so it can be edited by hand:
//!
//! ```json
//! { "agents": [
//!   { "id": 1, "name": "Structural Cleaner", "kind": "core",
//!     "description": "…", "temperature": 0.1, "prompt_template": "…" }
//! ] }
//! ```

use crate::error::{PipelineError, PreconditionError};
use crate::prompts;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// Whether an agent participates in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    /// Runs, in catalog order.
    #[default]
    Core,
    /// Held in the catalog; never executed.
    Optional,
}

/// One configured pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub kind: AgentKind,
    #[serde(default)]
    pub description: String,
    /// Sampling temperature in `[0, 1]`.
    pub temperature: f32,
    /// Sent as the system prompt of every model call of this stage.
    pub prompt_template: String,
}

impl Agent {
    pub fn new(
        id: u32,
        name: impl Into<String>,
        temperature: f32,
        prompt_template: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind: AgentKind::Core,
            description: String::new(),
            temperature,
            prompt_template: prompt_template.into(),
        }
    }

    pub fn optional(mut self) -> Self {
        self.kind = AgentKind::Optional;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn is_core(&self) -> bool {
        self.kind == AgentKind::Core
    }

    pub(crate) fn check_temperature(&self) -> Result<(), PreconditionError> {
        if (0.0..=1.0).contains(&self.temperature) {
            Ok(())
        } else {
            Err(PreconditionError::InvalidTemperature {
                agent: self.name.clone(),
                temperature: self.temperature.to_string(),
            })
        }
    }
}

/// Keep only core agents, preserving their order.
pub fn core_agents(agents: &[Agent]) -> Vec<Agent> {
    agents.iter().filter(|a| a.is_core()).cloned().collect()
}

/// The ordered set of known agents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentCatalog {
    pub agents: Vec<Agent>,
}

impl AgentCatalog {
    pub fn new(agents: Vec<Agent>) -> Self {
        Self { agents }
    }

    /// Load and validate a catalog from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::InvalidConfig(format!(
                "cannot read agent catalog '{}': {e}",
                path.display()
            ))
        })?;
        let catalog: AgentCatalog = serde_json::from_str(&raw).map_err(|e| {
            PipelineError::InvalidConfig(format!(
                "agent catalog '{}' is not valid JSON: {e}",
                path.display()
            ))
        })?;
        catalog.validate()?;
        debug!(
            "Loaded {} agents ({} core) from {}",
            catalog.agents.len(),
            catalog.core_agents().len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Write the catalog as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PipelineError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| PipelineError::Internal(format!("serialise catalog: {e}")))?;
        std::fs::write(path, json).map_err(|e| PipelineError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Ids must be unique, names and prompts non-empty, temperatures in `[0, 1]`.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let mut seen = HashSet::new();
        for agent in &self.agents {
            if !seen.insert(agent.id) {
                return Err(PipelineError::InvalidConfig(format!(
                    "duplicate agent id {}",
                    agent.id
                )));
            }
            if agent.name.trim().is_empty() {
                return Err(PipelineError::InvalidConfig(format!(
                    "agent {} has an empty name",
                    agent.id
                )));
            }
            if agent.prompt_template.trim().is_empty() {
                return Err(PipelineError::InvalidConfig(format!(
                    "agent '{}' has an empty prompt",
                    agent.name
                )));
            }
            agent.check_temperature()?;
        }
        Ok(())
    }

    /// Core agents in execution order.
    pub fn core_agents(&self) -> Vec<Agent> {
        core_agents(&self.agents)
    }

    pub fn optional_agents(&self) -> Vec<Agent> {
        self.agents.iter().filter(|a| !a.is_core()).cloned().collect()
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Agent> {
        self.agents
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// Move an agent into the core workflow. Returns false if `id` is unknown.
    pub fn promote(&mut self, id: u32) -> bool {
        self.set_kind(id, AgentKind::Core)
    }

    /// Take an agent out of the core workflow. Returns false if `id` is unknown.
    pub fn demote(&mut self, id: u32) -> bool {
        self.set_kind(id, AgentKind::Optional)
    }

    fn set_kind(&mut self, id: u32, kind: AgentKind) -> bool {
        match self.agents.iter_mut().find(|a| a.id == id) {
            Some(agent) => {
                agent.kind = kind;
                true
            }
            None => false,
        }
    }

    /// Four core stages (clean, structure, harmonise, format) and an optional
    /// synthesis stage.
    pub fn builtin() -> Self {
        Self::new(vec![
            Agent::new(1, "Structural Cleaner", 0.1, prompts::STRUCTURAL_CLEANER)
                .with_description("Removes noise (page numbers, running headers) and fixes transcription errors."),
            Agent::new(2, "Academic Architect", 0.2, prompts::ACADEMIC_ARCHITECT)
                .with_description("Organises the cleaned text into a logical structure with clear headings."),
            Agent::new(3, "Harmonizer", 0.5, prompts::HARMONIZER)
                .with_description("Rewrites the text into clear, fluent prose in a single language and register."),
            Agent::new(4, "Markdown Formatter", 0.2, prompts::MARKDOWN_FORMATTER)
                .with_description("Formats the final text with Obsidian-compatible Markdown."),
            Agent::new(5, "Synthesizer", 0.25, prompts::SYNTHESIZER)
                .with_description("Increases the information density of the text.")
                .optional(),
        ])
    }
}
