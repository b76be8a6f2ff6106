use thiserror::Error;

/// Errores del repositorio de sesión persistida.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Error en IO de sesión: {0}")]
    Io(#[from] std::io::Error),
    #[error("Sesión corrupta: {0}")]
    Serde(#[from] serde_json::Error),
}
