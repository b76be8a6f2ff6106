//! Contrato del colaborador remoto de respuestas.
//!
//! La política de timeouts y reintentos pertenece a la implementación; el
//! store no impone ninguna.

use async_trait::async_trait;
use flow_core::ModuleResponse;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ResponseApiError;

/// Id del documento remoto de una respuesta.
pub type RemoteId = String;

/// Payload de guardado; también es la forma JSON que espera el backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub research_id: String,
    pub participant_id: String,
    pub step_id: String,
    pub step_type: String,
    pub step_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_key: Option<String>,
    /// Ya sanitizada.
    pub answer: Value,
    /// Presente => actualización del documento existente.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_remote_id: Option<RemoteId>,
}

#[async_trait]
pub trait ResponseApi: Send + Sync + 'static {
    async fn get_responses(&self, research_id: &str, participant_id: &str) -> Result<Vec<ModuleResponse>, ResponseApiError>;

    async fn save_or_update_response(&self, request: SaveRequest) -> Result<RemoteId, ResponseApiError>;

    async fn delete_all_responses(&self, research_id: &str, participant_id: &str) -> Result<(), ResponseApiError>;

    async fn mark_completed(&self, research_id: &str, participant_id: &str) -> Result<(), ResponseApiError>;
}
