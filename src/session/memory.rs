use std::sync::{Mutex, PoisonError};

use super::{SessionRepository, StoredSession};
use crate::errors::SessionError;

#[derive(Debug, Default)]
pub struct InMemorySessionRepository {
    inner: Mutex<Option<StoredSession>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: StoredSession) -> Self {
        Self { inner: Mutex::new(Some(session)) }
    }
}

impl SessionRepository for InMemorySessionRepository {
    fn load(&self) -> Result<Option<StoredSession>, SessionError> {
        Ok(self.inner.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save(&self, session: &StoredSession) -> Result<(), SessionError> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
