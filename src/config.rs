//! Configuración central de la aplicación.
//! Carga variables de entorno (.env) y expone una estructura inmutable
//! (`CONFIG`). Ningún valor es obligatorio: la identidad del estudio puede
//! llegar también por el repositorio de sesión.
use std::env;
use std::path::PathBuf;

use flow_core::CompileOptions;
use flow_responses::StoreConfig;
use once_cell::sync::Lazy;

/// Entorno de ejecución. Sólo `Development` habilita las preguntas
/// demográficas de relleno.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Production,
    Development,
}

impl Environment {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Environment::Development,
            _ => Environment::Production,
        }
    }
}

/// Configuración global de la aplicación.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    /// Archivo JSON donde se persiste la sesión (equivalente a local storage).
    pub session_file: Option<PathBuf>,
    /// Investigación por defecto cuando no hay sesión previa.
    pub research_id: Option<String>,
    pub store: StoreConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let environment = env::var("PARTICIPANT_FLOW_ENV").map(|v| Environment::parse(&v)).unwrap_or_default();
        let session_file = env::var("PARTICIPANT_FLOW_SESSION_FILE").ok()
                                                                    .filter(|v| !v.trim().is_empty())
                                                                    .map(PathBuf::from);
        let research_id = env::var("PARTICIPANT_FLOW_RESEARCH_ID").ok().filter(|v| !v.trim().is_empty());
        Self { environment,
               session_file,
               research_id,
               store: StoreConfig::from_env() }
    }

    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions { development: self.environment == Environment::Development }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { environment: Environment::Production,
               session_file: None,
               research_id: None,
               store: StoreConfig::default() }
    }
}

/// Instancia global perezosa de configuración, evaluada una sola vez.
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);
