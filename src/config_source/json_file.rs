use std::path::PathBuf;

use async_trait::async_trait;
use flow_core::RawModuleConfig;
use log::debug;

use super::{modules_from_document, ConfigSource};
use crate::errors::ConfigLoadError;

/// Lee `<dir>/<research_id>.json`. Un archivo inexistente equivale a 404.
#[derive(Debug, Clone)]
pub struct JsonFileConfigSource {
    dir: PathBuf,
}

impl JsonFileConfigSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, research_id: &str) -> Result<PathBuf, ConfigLoadError> {
        let valid = !research_id.is_empty()
                    && research_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(ConfigLoadError::Malformed(format!("id de investigación inválido: {research_id:?}")));
        }
        Ok(self.dir.join(format!("{research_id}.json")))
    }
}

#[async_trait]
impl ConfigSource for JsonFileConfigSource {
    async fn fetch_flow_config(&self, research_id: &str) -> Result<Vec<RawModuleConfig>, ConfigLoadError> {
        let path = self.path_for(research_id)?;
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigLoadError::NotFound(research_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let doc: serde_json::Value =
            serde_json::from_str(&raw).map_err(|e| ConfigLoadError::Malformed(format!("{}: {e}", path.display())))?;
        let modules = modules_from_document(&doc)?;
        debug!("config: {} módulos leídos de {}", modules.len(), path.display());
        Ok(modules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pf-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let source = JsonFileConfigSource::new(temp_dir());
        let err = source.fetch_flow_config("r1").await.unwrap_err();
        assert!(matches!(err, ConfigLoadError::NotFound(ref id) if id == "r1"));
    }

    #[tokio::test]
    async fn reads_enveloped_document() {
        let dir = temp_dir();
        std::fs::write(dir.join("r1.json"),
                       r#"{"data":[{"id":"m1","sk":"SMART_VOC_FORM","questions":[{"id":"q1","type":"NPS"}]}]}"#).unwrap();
        let modules = JsonFileConfigSource::new(&dir).fetch_flow_config("r1").await.unwrap();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].sk, "SMART_VOC_FORM");
    }

    #[tokio::test]
    async fn rejects_path_like_research_ids() {
        let source = JsonFileConfigSource::new(temp_dir());
        assert!(matches!(source.fetch_flow_config("../etc").await, Err(ConfigLoadError::Malformed(_))));
    }

    #[tokio::test]
    async fn invalid_json_is_malformed() {
        let dir = temp_dir();
        std::fs::write(dir.join("r2.json"), "{oops").unwrap();
        let err = JsonFileConfigSource::new(&dir).fetch_flow_config("r2").await.unwrap_err();
        assert!(matches!(err, ConfigLoadError::Malformed(_)));
    }
}
