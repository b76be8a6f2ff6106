//! Controlador de navegación: máquina de estados explícita sobre
//! `ParticipantFlowStep` más la posición fina dentro de la secuencia.

mod controller;
mod state;

pub use controller::{AnswerLookup, NavigationController, NavigationEvent, Transition};
pub use state::{NavigationState, ParticipantFlowStep, Progress};
