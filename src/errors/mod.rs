//! Errores de los colaboradores del orquestador. Los errores del flujo en sí
//! viven en `flow_core::FlowError`.

pub mod config_error;
pub mod session_error;

pub use config_error::ConfigLoadError;
pub use session_error::SessionError;
