//! Sesión persistida del participante (identidad + token), equivalente a
//! local storage: permite que una recarga retome la misma sesión sin volver
//! a autenticarse.

mod file;
mod memory;

use serde::{Deserialize, Serialize};

use crate::errors::SessionError;

pub use file::FileSessionRepository;
pub use memory::InMemorySessionRepository;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    pub research_id: String,
    pub participant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl StoredSession {
    pub fn new(research_id: impl Into<String>, participant_id: impl Into<String>) -> Self {
        Self { research_id: research_id.into(),
               participant_id: participant_id.into(),
               token: None }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Misma investigación con otro participante: la sesión previa debe
    /// descartarse antes de guardar la nueva.
    pub fn is_other_participant_of(&self, other: &StoredSession) -> bool {
        self.research_id == other.research_id && self.participant_id != other.participant_id
    }
}

pub trait SessionRepository: Send + Sync {
    fn load(&self) -> Result<Option<StoredSession>, SessionError>;
    fn save(&self, session: &StoredSession) -> Result<(), SessionError>;
    fn clear(&self) -> Result<(), SessionError>;
}
