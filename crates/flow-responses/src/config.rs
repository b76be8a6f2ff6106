//! Configuración del store de respuestas desde variables de entorno.

use std::env;

use dotenvy::dotenv;
use once_cell::sync::Lazy;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Re-hidratar desde el backend después de cada guardado confirmado.
    pub rehydrate_after_save: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { rehydrate_after_save: !cfg!(feature = "no-rehydrate-after-save") }
    }
}

impl StoreConfig {
    pub fn from_env() -> Self {
        Lazy::force(&DOTENV_LOADED);
        let rehydrate_after_save = env::var("RESPONSE_STORE_REHYDRATE_AFTER_SAVE").ok()
                                                                                  .and_then(|v| parse_flag(&v))
                                                                                  .unwrap_or(Self::default().rehydrate_after_save);
        Self { rehydrate_after_save }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::parse_flag;

    #[test]
    fn flags() {
        assert_eq!(parse_flag(" TRUE "), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
