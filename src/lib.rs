//! Participant Flow
//!
//! Motor del recorrido de un participante por una investigación:
//! - `flow_core` compila la configuración en pasos y define la navegación.
//! - `flow_responses` mantiene las respuestas (escritura optimista + backend).
//! - Este crate compone ambos en `ParticipantFlow`, junto con la fuente de
//!   configuración y el repositorio de sesión.

pub mod config;
pub mod config_source;
pub mod errors;
pub mod flow;
pub mod session;

pub use config::{AppConfig, Environment, CONFIG};
pub use config_source::{ConfigSource, JsonFileConfigSource, StaticConfigSource};
pub use errors::{ConfigLoadError, SessionError};
pub use flow::{FlowObserver, FlowView, ParticipantFlow, StepSummary};
pub use session::{FileSessionRepository, InMemorySessionRepository, SessionRepository, StoredSession};
