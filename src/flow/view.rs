//! Modelo de lectura único para la capa de presentación.

use flow_core::{ParticipantFlowStep, Progress, Step};
use serde::Serialize;
use serde_json::Value;

/// Entrada de la navegación lateral.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSummary {
    pub index: usize,
    pub id: String,
    pub name: String,
    pub step_type: String,
    pub answered: bool,
    pub navigable: bool,
    pub current: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowView {
    pub phase: ParticipantFlowStep,
    pub is_loading: bool,
    /// Mensaje de la pantalla de error (fase `Error`).
    pub error: Option<String>,
    /// Aviso no bloqueante (guardado pendiente, configuración degradada...).
    pub notice: Option<String>,
    pub current_step_index: usize,
    pub max_visited_index: usize,
    pub current_step: Option<Step>,
    pub current_answer: Option<Value>,
    pub steps: Vec<StepSummary>,
    pub show_side_navigation: bool,
    pub progress: Progress,
}
