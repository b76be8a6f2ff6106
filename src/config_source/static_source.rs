use std::collections::HashMap;

use async_trait::async_trait;
use flow_core::RawModuleConfig;

use super::ConfigSource;
use crate::errors::ConfigLoadError;

/// Configuraciones en memoria indexadas por investigación.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigSource {
    configs: HashMap<String, Vec<RawModuleConfig>>,
}

impl StaticConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_research(mut self, research_id: impl Into<String>, modules: Vec<RawModuleConfig>) -> Self {
        self.configs.insert(research_id.into(), modules);
        self
    }
}

#[async_trait]
impl ConfigSource for StaticConfigSource {
    async fn fetch_flow_config(&self, research_id: &str) -> Result<Vec<RawModuleConfig>, ConfigLoadError> {
        self.configs
            .get(research_id)
            .cloned()
            .ok_or_else(|| ConfigLoadError::NotFound(research_id.to_string()))
    }
}
