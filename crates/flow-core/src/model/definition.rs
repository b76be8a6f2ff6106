//! Definición compilada del flujo.

use serde_json::json;

use super::Step;
use crate::constants::COMPILER_VERSION;
use crate::hashing::hash_value;

/// Secuencia inmutable de pasos más su hash de definición.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowDefinition {
    pub steps: Vec<Step>,
    pub definition_hash: String,
}

impl FlowDefinition {
    pub fn new(steps: Vec<Step>) -> Self {
        let definition_hash = hash_value(&json!({
            "compiler_version": COMPILER_VERSION,
            "steps": steps,
        }));
        Self { steps, definition_hash }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn position(&self, step_id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == step_id)
    }

    pub fn by_id(&self, step_id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    pub fn last_index(&self) -> Option<usize> {
        self.steps.len().checked_sub(1)
    }
}
