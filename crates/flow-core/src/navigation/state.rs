use serde::{Deserialize, Serialize};

use crate::model::{FlowDefinition, StepCategory};

/// Fase gruesa de la sesión, usada para el encuadre de la UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParticipantFlowStep {
    Login,
    LoadingSession,
    Welcome,
    SmartVoc,
    CognitiveTask,
    Done,
    Error,
}

impl ParticipantFlowStep {
    /// Fases en las que el participante está dentro de la secuencia compilada.
    pub fn is_in_sequence(self) -> bool {
        matches!(self,
                 ParticipantFlowStep::Welcome
                 | ParticipantFlowStep::SmartVoc
                 | ParticipantFlowStep::CognitiveTask
                 | ParticipantFlowStep::Done)
    }

    /// La navegación lateral se oculta en login, carga y error.
    pub fn shows_side_navigation(self) -> bool {
        self.is_in_sequence()
    }

    /// Proyección de la posición actual a una fase.
    pub fn project(definition: &FlowDefinition, index: usize) -> Self {
        if definition.last_index() == Some(index) {
            return ParticipantFlowStep::Done;
        }
        match definition.get(index).map(|s| s.category()) {
            Some(StepCategory::Welcome) | Some(StepCategory::Demographic) | None => ParticipantFlowStep::Welcome,
            Some(StepCategory::SmartVoc) => ParticipantFlowStep::SmartVoc,
            Some(StepCategory::ThankYou) => ParticipantFlowStep::Done,
            Some(_) => ParticipantFlowStep::CognitiveTask,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationState {
    pub current_step_index: usize,
    /// Marca de agua alta; sólo crece (salvo reinicio completo).
    pub max_visited_index: usize,
    /// Paso en el que se reanudó la sesión; sigue alcanzable tras saltar atrás.
    #[serde(default)]
    pub resume_index: usize,
    pub phase: ParticipantFlowStep,
}

impl Default for NavigationState {
    fn default() -> Self {
        Self { current_step_index: 0,
               max_visited_index: 0,
               resume_index: 0,
               phase: ParticipantFlowStep::LoadingSession }
    }
}

/// Avance del participante sin contar bienvenida ni agradecimiento.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub total_relevant: usize,
    pub completed_relevant: usize,
}

impl Progress {
    pub fn ratio(&self) -> f64 {
        if self.total_relevant == 0 {
            return 1.0;
        }
        self.completed_relevant as f64 / self.total_relevant as f64
    }
}
