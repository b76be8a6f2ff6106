//! Errores del colaborador `ResponseApi`.
//! Se traducen a la taxonomía del flujo (`FlowError`) en el store.

use flow_core::FlowError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResponseApiError {
    #[error("not found")]
    NotFound,
    #[error("unauthorized")]
    Unauthorized,
    #[error("rejected by backend: {0}")]
    Rejected(String),
    #[error("transport error: {0}")]
    Transport(String),
}

impl ResponseApiError {
    pub fn into_save_error(self, step_id: &str) -> FlowError {
        FlowError::Save { step_id: step_id.to_string(),
                          reason: self.to_string() }
    }
}

impl From<ResponseApiError> for FlowError {
    fn from(err: ResponseApiError) -> Self {
        FlowError::Hydration(err.to_string())
    }
}
