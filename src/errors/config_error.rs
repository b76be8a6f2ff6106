use flow_core::FlowError;
use thiserror::Error;

/// Fallos al obtener la configuración de módulos de una investigación.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("Configuración no encontrada para la investigación {0}")]
    NotFound(String),
    #[error("Error en IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuración malformada: {0}")]
    Malformed(String),
}

impl From<ConfigLoadError> for FlowError {
    fn from(err: ConfigLoadError) -> Self {
        FlowError::ConfigLoad(err.to_string())
    }
}
