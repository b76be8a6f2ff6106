//! Tabla de transiciones del controlador de navegación.
//!
//! Estados gruesos:
//! - `LoadingSession` -> `Login` (sin identidad) o directo a la secuencia.
//! - `Login` -> índice 0 (bienvenida) al autenticarse.
//! - Dentro de la secuencia la fase es una proyección del tipo del paso
//!   actual; el último índice es `Done`.
//! - `Error` es alcanzable desde cualquier estado y terminal hasta `Reset`.

use log::{debug, warn};

use super::state::{NavigationState, ParticipantFlowStep, Progress};
use crate::model::{FlowDefinition, Step, StepCategory};

/// Consulta de respuestas guardadas, provista por el store de respuestas.
pub trait AnswerLookup {
    fn has_response(&self, step_id: &str) -> bool;

    /// Bienvenida y agradecimiento cuentan como respondidos al visitarse.
    fn is_answered(&self, step: &Step) -> bool {
        step.is_answerless() || self.has_response(&step.id)
    }
}

/// Eventos explícitos que mueven la máquina de estados.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationEvent {
    SessionChecked { has_identity: bool },
    LoginSucceeded,
    /// La hidratación terminó (con o sin datos): se calcula la reanudación.
    ResponsesHydrated,
    StepCompleted { index: usize },
    JumpRequested { target: usize },
    Fatal { message: String },
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// El evento no aplica al estado actual.
    Ignored,
    /// Salto fuera del límite permitido; el estado no cambia.
    Blocked { target: usize },
    Moved { from: usize, to: usize },
    Resumed { current: usize, max_visited: usize },
    /// Se alcanzó el último paso de la secuencia.
    Completed { last: usize },
    Phase { from: ParticipantFlowStep, to: ParticipantFlowStep },
}

#[derive(Debug, Clone, Default)]
pub struct NavigationController {
    state: NavigationState,
    error: Option<String>,
}

impl NavigationController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> NavigationState {
        self.state
    }

    pub fn phase(&self) -> ParticipantFlowStep {
        self.state.phase
    }

    pub fn current_step_index(&self) -> usize {
        self.state.current_step_index
    }

    pub fn max_visited_index(&self) -> usize {
        self.state.max_visited_index
    }

    /// Mensaje legible del error terminal, si lo hay.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn set_phase(&mut self, to: ParticipantFlowStep) -> Transition {
        let from = self.state.phase;
        self.state.phase = to;
        Transition::Phase { from, to }
    }

    fn enter_sequence(&mut self, definition: &FlowDefinition) -> Transition {
        self.state.current_step_index = 0;
        self.set_phase(ParticipantFlowStep::project(definition, 0))
    }

    pub fn apply(&mut self, event: NavigationEvent, definition: &FlowDefinition, answers: &dyn AnswerLookup) -> Transition {
        let phase = self.state.phase;
        let transition = match event {
            NavigationEvent::Fatal { message } => {
                warn!("sesión en error: {message}");
                self.error = Some(message);
                self.set_phase(ParticipantFlowStep::Error)
            }
            NavigationEvent::Reset => {
                self.state = NavigationState::default();
                self.error = None;
                Transition::Phase { from: phase,
                                    to: ParticipantFlowStep::LoadingSession }
            }
            _ if phase == ParticipantFlowStep::Error => Transition::Ignored,
            NavigationEvent::SessionChecked { has_identity } => match phase {
                ParticipantFlowStep::LoadingSession if has_identity => self.enter_sequence(definition),
                ParticipantFlowStep::LoadingSession => self.set_phase(ParticipantFlowStep::Login),
                _ => Transition::Ignored,
            },
            NavigationEvent::LoginSucceeded => match phase {
                ParticipantFlowStep::Login | ParticipantFlowStep::LoadingSession => self.enter_sequence(definition),
                _ => Transition::Ignored,
            },
            NavigationEvent::ResponsesHydrated if phase.is_in_sequence() => self.resume(definition, answers),
            NavigationEvent::ResponsesHydrated => Transition::Ignored,
            NavigationEvent::StepCompleted { index } if phase.is_in_sequence() => self.advance(index, definition),
            NavigationEvent::StepCompleted { .. } => Transition::Ignored,
            NavigationEvent::JumpRequested { target } if phase.is_in_sequence() => self.jump(target, definition, answers),
            NavigationEvent::JumpRequested { target } => Transition::Blocked { target },
        };
        debug!("navegación: {:?} -> {:?}", phase, transition);
        transition
    }

    /// Regla de avance: `current = i + 1`, `max = max(max, i + 1)`.
    fn advance(&mut self, index: usize, definition: &FlowDefinition) -> Transition {
        let Some(last) = definition.last_index() else { return Transition::Ignored };
        if index != self.state.current_step_index || index >= last {
            return Transition::Ignored;
        }
        let next = index + 1;
        self.state.current_step_index = next;
        self.state.max_visited_index = self.state.max_visited_index.max(next);
        self.state.phase = ParticipantFlowStep::project(definition, next);
        if next == last {
            Transition::Completed { last }
        } else {
            Transition::Moved { from: index, to: next }
        }
    }

    /// ¿Puede la navegación lateral saltar a `target`? El agradecimiento sólo
    /// es alcanzable por avance o dentro de la marca de agua.
    pub fn can_navigate_to(&self, target: usize, definition: &FlowDefinition, answers: &dyn AnswerLookup) -> bool {
        let Some(step) = definition.get(target) else { return false };
        if !self.state.phase.is_in_sequence() {
            return false;
        }
        target == 0
        || target == self.state.current_step_index
        || target <= self.state.max_visited_index
        || target <= self.state.resume_index
        || (step.category() != StepCategory::ThankYou && answers.is_answered(step))
    }

    /// Salto manual. No modifica `max_visited_index`.
    fn jump(&mut self, target: usize, definition: &FlowDefinition, answers: &dyn AnswerLookup) -> Transition {
        if target == self.state.current_step_index {
            return Transition::Ignored;
        }
        if !self.can_navigate_to(target, definition, answers) {
            debug!("salto bloqueado a {target} (max_visited={})", self.state.max_visited_index);
            return Transition::Blocked { target };
        }
        let from = self.state.current_step_index;
        self.state.current_step_index = target;
        self.state.phase = ParticipantFlowStep::project(definition, target);
        Transition::Moved { from, to: target }
    }

    /// Reanudación de un participante que vuelve: `max` es el mayor índice
    /// con respuesta guardada y `current` el primer paso sin responder.
    fn resume(&mut self, definition: &FlowDefinition, answers: &dyn AnswerLookup) -> Transition {
        let (current, max_visited) = resume_position(definition, answers);
        self.state.current_step_index = current;
        self.state.max_visited_index = self.state.max_visited_index.max(max_visited);
        self.state.resume_index = self.state.resume_index.max(current);
        self.state.phase = ParticipantFlowStep::project(definition, current);
        Transition::Resumed { current,
                              max_visited: self.state.max_visited_index }
    }

    pub fn progress(&self, definition: &FlowDefinition, answers: &dyn AnswerLookup) -> Progress {
        let relevant: Vec<&Step> = definition.steps.iter().filter(|s| !s.is_answerless()).collect();
        Progress { total_relevant: relevant.len(),
                   completed_relevant: relevant.iter().filter(|s| answers.has_response(&s.id)).count() }
    }
}

/// Posición de reanudación `(current, max_visited)`. El agradecimiento no
/// cuenta como respondido para este cálculo: es el destino final.
pub(crate) fn resume_position(definition: &FlowDefinition, answers: &dyn AnswerLookup) -> (usize, usize) {
    let Some(last) = definition.last_index() else { return (0, 0) };
    let done = |step: &Step| match step.category() {
        StepCategory::Welcome => true,
        StepCategory::ThankYou => false,
        _ => answers.has_response(&step.id),
    };
    let max_visited = definition.steps
                                .iter()
                                .enumerate()
                                .filter(|(_, s)| done(s))
                                .map(|(i, _)| i)
                                .max()
                                .unwrap_or(0);
    if max_visited == 0 {
        return (0, 0);
    }
    let current = definition.steps.iter().position(|s| !done(s)).unwrap_or(last);
    (current, max_visited)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{compile, CompileOptions};
    use crate::model::RawModuleConfig;
    use serde_json::json;
    use std::collections::HashSet;

    struct Saved(HashSet<String>);
    impl AnswerLookup for Saved {
        fn has_response(&self, step_id: &str) -> bool {
            self.0.contains(step_id)
        }
    }

    fn saved(ids: &[&str]) -> Saved {
        Saved(ids.iter().map(|s| s.to_string()).collect())
    }

    fn five_steps() -> FlowDefinition {
        let m = RawModuleConfig::new("ct", "COGNITIVE_TASK").with_questions(vec![json!({"id": "q1", "type": "SHORT_TEXT"}),
                                                                                json!({"id": "q2", "type": "LONG_TEXT"}),
                                                                                json!({"id": "q3", "type": "RANKING"})]);
        compile(&[m], &CompileOptions::default())
    }

    fn in_flow(def: &FlowDefinition, answers: &dyn AnswerLookup) -> NavigationController {
        let mut nav = NavigationController::new();
        nav.apply(NavigationEvent::SessionChecked { has_identity: true }, def, answers);
        nav
    }

    #[test]
    fn loading_without_identity_goes_to_login_then_welcome() {
        let def = five_steps();
        let none = saved(&[]);
        let mut nav = NavigationController::new();
        nav.apply(NavigationEvent::SessionChecked { has_identity: false }, &def, &none);
        assert_eq!(nav.phase(), ParticipantFlowStep::Login);
        assert_eq!(nav.apply(NavigationEvent::JumpRequested { target: 1 }, &def, &none),
                   Transition::Blocked { target: 1 });
        nav.apply(NavigationEvent::LoginSucceeded, &def, &none);
        assert_eq!(nav.phase(), ParticipantFlowStep::Welcome);
        assert_eq!(nav.current_step_index(), 0);
    }

    #[test]
    fn advancing_to_the_end_reports_completion() {
        let def = five_steps();
        let none = saved(&[]);
        let mut nav = in_flow(&def, &none);
        for i in 0..3 {
            nav.apply(NavigationEvent::StepCompleted { index: i }, &def, &none);
        }
        assert_eq!(nav.phase(), ParticipantFlowStep::CognitiveTask);
        assert_eq!(nav.apply(NavigationEvent::StepCompleted { index: 3 }, &def, &none),
                   Transition::Completed { last: 4 });
        assert_eq!(nav.phase(), ParticipantFlowStep::Done);
        assert_eq!(nav.max_visited_index(), 4);
        assert_eq!(nav.apply(NavigationEvent::StepCompleted { index: 4 }, &def, &none), Transition::Ignored);
    }

    #[test]
    fn stale_completion_is_ignored() {
        let def = five_steps();
        let none = saved(&[]);
        let mut nav = in_flow(&def, &none);
        assert_eq!(nav.apply(NavigationEvent::StepCompleted { index: 2 }, &def, &none), Transition::Ignored);
        assert_eq!(nav.current_step_index(), 0);
    }

    #[test]
    fn jumps_respect_high_water_mark_and_do_not_raise_it() {
        let def = five_steps();
        let none = saved(&[]);
        let mut nav = in_flow(&def, &none);
        nav.apply(NavigationEvent::StepCompleted { index: 0 }, &def, &none);
        nav.apply(NavigationEvent::StepCompleted { index: 1 }, &def, &none);
        assert_eq!(nav.apply(NavigationEvent::JumpRequested { target: 0 }, &def, &none),
                   Transition::Moved { from: 2, to: 0 });
        assert_eq!(nav.apply(NavigationEvent::JumpRequested { target: 3 }, &def, &none),
                   Transition::Blocked { target: 3 });
        assert_eq!(nav.current_step_index(), 0);
        assert_eq!(nav.max_visited_index(), 2);
        // un paso respondido fuera del límite sí es alcanzable
        let answered = saved(&["q3"]);
        assert!(matches!(nav.apply(NavigationEvent::JumpRequested { target: 3 }, &def, &answered),
                         Transition::Moved { to: 3, .. }));
        assert_eq!(nav.max_visited_index(), 2);
    }

    #[test]
    fn resume_starts_at_first_unanswered_step() {
        let def = five_steps();
        let answers = saved(&["q1", "q2"]);
        let mut nav = in_flow(&def, &answers);
        assert_eq!(nav.apply(NavigationEvent::ResponsesHydrated, &def, &answers),
                   Transition::Resumed { current: 3, max_visited: 2 });
        for j in 0..=3 {
            assert!(nav.can_navigate_to(j, &def, &answers), "step {j} should be reachable");
        }
        assert!(!nav.can_navigate_to(4, &def, &answers));
    }

    #[test]
    fn resumed_step_stays_reachable_after_jumping_back() {
        let def = five_steps();
        let answers = saved(&["q1", "q2"]);
        let mut nav = in_flow(&def, &answers);
        nav.apply(NavigationEvent::ResponsesHydrated, &def, &answers);

        assert_eq!(nav.apply(NavigationEvent::JumpRequested { target: 1 }, &def, &answers),
                   Transition::Moved { from: 3, to: 1 });
        assert!(nav.can_navigate_to(3, &def, &answers));
        assert_eq!(nav.apply(NavigationEvent::JumpRequested { target: 3 }, &def, &answers),
                   Transition::Moved { from: 1, to: 3 });
        assert!(!nav.can_navigate_to(4, &def, &answers));
        assert_eq!(nav.state().max_visited_index, 2);
    }

    #[test]
    fn resume_with_everything_answered_lands_on_last_step() {
        let def = five_steps();
        let answers = saved(&["q1", "q2", "q3"]);
        let mut nav = in_flow(&def, &answers);
        nav.apply(NavigationEvent::ResponsesHydrated, &def, &answers);
        assert_eq!(nav.current_step_index(), 4);
        assert_eq!(nav.phase(), ParticipantFlowStep::Done);
    }

    #[test]
    fn error_is_terminal_until_reset() {
        let def = five_steps();
        let none = saved(&[]);
        let mut nav = in_flow(&def, &none);
        nav.apply(NavigationEvent::Fatal { message: "sin research id".into() }, &def, &none);
        assert_eq!(nav.phase(), ParticipantFlowStep::Error);
        assert_eq!(nav.apply(NavigationEvent::StepCompleted { index: 0 }, &def, &none), Transition::Ignored);
        assert_eq!(nav.apply(NavigationEvent::LoginSucceeded, &def, &none), Transition::Ignored);
        nav.apply(NavigationEvent::Reset, &def, &none);
        assert_eq!(nav.state(), NavigationState::default());
        assert!(nav.error().is_none());
    }

    #[test]
    fn progress_ignores_welcome_and_thankyou() {
        let def = five_steps();
        let nav = NavigationController::new();
        let p = nav.progress(&def, &saved(&["q2"]));
        assert_eq!(p, Progress { total_relevant: 3, completed_relevant: 1 });
    }
}
