//! Fuente de configuración de módulos de una investigación (sólo lectura).
//!
//! `NotFound` no es un error para el flujo: el orquestador lo trata como
//! "sin configuración" y compila la secuencia mínima.

mod json_file;
mod static_source;

use async_trait::async_trait;
use flow_core::RawModuleConfig;

use crate::errors::ConfigLoadError;

pub use json_file::JsonFileConfigSource;
pub use static_source::StaticConfigSource;

#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn fetch_flow_config(&self, research_id: &str) -> Result<Vec<RawModuleConfig>, ConfigLoadError>;
}

/// Extrae los módulos de un documento: arreglo o envoltura `{ "data": [...] }`.
/// Los elementos que no son módulos se descartan (ver `RawModuleConfig::from_value`).
pub(crate) fn modules_from_document(doc: &serde_json::Value) -> Result<Vec<RawModuleConfig>, ConfigLoadError> {
    let items = match doc {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(obj) => obj.get("data")
                                             .and_then(serde_json::Value::as_array)
                                             .ok_or_else(|| ConfigLoadError::Malformed("falta el arreglo 'data'".into()))?,
        other => return Err(ConfigLoadError::Malformed(format!("se esperaba un arreglo, llegó {other}"))),
    };
    Ok(items.iter().filter_map(RawModuleConfig::from_value).collect())
}
