//! Orquestación del flujo del participante.

pub mod orchestrator;
pub mod view;

pub use orchestrator::{FlowObserver, ParticipantFlow};
pub use view::{FlowView, StepSummary};
