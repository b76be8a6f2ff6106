//! Taxonomía de errores del flujo del participante.
//!
//! Sólo `FatalSession` detiene la sesión; el resto degrada con contenido de
//! respaldo o se reporta sin bloquear la navegación.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum FlowError {
    #[error("config load failed: {0}")] ConfigLoad(String),
    #[error("hydration failed: {0}")] Hydration(String),
    #[error("save failed for step '{step_id}': {reason}")] Save { step_id: String, reason: String },
    #[error("navigation to step {target} blocked")] NavigationBlocked { target: usize },
    #[error("fatal session error: {0}")] FatalSession(String),
}

impl FlowError {
    /// Mensaje legible para la pantalla de error; nunca expone el texto crudo.
    pub fn user_message(&self) -> &'static str {
        match self {
            FlowError::ConfigLoad(_) => "No pudimos cargar la configuración del estudio. Continuaremos con el contenido básico.",
            FlowError::Hydration(_) => "No pudimos recuperar tus respuestas anteriores.",
            FlowError::Save { .. } => "Tu respuesta se guardó localmente pero aún no se pudo enviar.",
            FlowError::NavigationBlocked { .. } => "Ese paso todavía no está disponible.",
            FlowError::FatalSession(_) => "No se pudo iniciar la sesión del estudio. Verifica el enlace de la investigación.",
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, FlowError::FatalSession(_))
    }
}
