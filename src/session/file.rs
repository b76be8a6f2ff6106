use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use log::warn;

use super::{SessionRepository, StoredSession};
use crate::errors::SessionError;

/// Sesión en un archivo JSON. Un archivo corrupto se trata como ausente
/// (se registra y se ignora) para no bloquear el ingreso.
#[derive(Debug, Clone)]
pub struct FileSessionRepository {
    path: PathBuf,
}

impl FileSessionRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionRepository for FileSessionRepository {
    fn load(&self) -> Result<Option<StoredSession>, SessionError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!("sesión ilegible en {}: {e}; se ignora", self.path.display());
                Ok(None)
            }
        }
    }

    fn save(&self, session: &StoredSession) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(session)?;
        fs::write(&self.path, raw)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("pf-session-{}", uuid::Uuid::new_v4())).join("session.json")
    }

    #[test]
    fn save_load_clear() {
        let repo = FileSessionRepository::new(temp_path());
        assert_eq!(repo.load().unwrap(), None);

        let session = StoredSession::new("r1", "p1").with_token("t");
        repo.save(&session).unwrap();
        assert_eq!(repo.load().unwrap(), Some(session));

        repo.clear().unwrap();
        assert_eq!(repo.load().unwrap(), None);
        repo.clear().unwrap();
    }

    #[test]
    fn corrupt_file_is_treated_as_missing() {
        let path = temp_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "not json").unwrap();
        assert_eq!(FileSessionRepository::new(path).load().unwrap(), None);
    }
}
