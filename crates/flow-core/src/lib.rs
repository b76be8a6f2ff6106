//! flow-core: compilador de pasos, modelo y navegación del flujo del
//! participante. Sin I/O ni async.
pub mod compiler;
pub mod constants;
pub mod errors;
pub mod event;
pub mod hashing;
pub mod model;
pub mod navigation;
pub mod sanitize;

pub use compiler::{compile, compile_value, CompileOptions};
pub use errors::FlowError;
pub use event::{EventStore, FlowEvent, FlowEventKind, InMemoryEventStore};
pub use model::{FlowDefinition, ModuleKind, ModuleResponse, RawModuleConfig, ResponsesData, Step, StepCategory};
pub use navigation::{AnswerLookup, NavigationController, NavigationEvent, NavigationState, ParticipantFlowStep, Progress,
                     Transition};
pub use sanitize::{prepare_answer, sanitize, AnswerValue};
