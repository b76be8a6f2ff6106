//! Tipos de evento de la sesión y estructura `FlowEvent`.
//!
//! El orquestador emite un evento por cada hecho relevante (compilación,
//! hidratación, avance, salto bloqueado, fallo de guardado). La capa de UI
//! se suscribe a ellos en lugar de observar estado mutable.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::navigation::ParticipantFlowStep;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FlowEventKind {
    /// Configuración compilada; fija el hash de la definición.
    StepsCompiled { definition_hash: String, step_count: usize },
    /// Hidratación terminada (`restored` = respuestas previas encontradas).
    ResponsesHydrated { restored: usize },
    HydrationFailed { reason: String },
    ConfigDegraded { reason: String },
    PhaseChanged { from: ParticipantFlowStep, to: ParticipantFlowStep },
    StepCompleted { step_index: usize, step_id: String },
    Navigated { from: usize, to: usize },
    NavigationBlocked { target: usize },
    SessionResumed { current: usize, max_visited: usize },
    ResponseSaved { step_id: String, remote_id: String },
    SaveFailed { step_id: String, reason: String },
    /// Se alcanzó el agradecimiento; `end_time` quedó fijado.
    FlowFinished,
    SessionReset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowEvent {
    pub seq: u64,
    pub session_id: Uuid,
    pub kind: FlowEventKind,
    pub ts: DateTime<Utc>,
}
