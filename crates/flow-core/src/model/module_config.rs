//! Configuración cruda de módulos tal como la entrega el backend.
//!
//! El contenido es autoría del investigador y puede venir incompleto; todo
//! se deserializa de forma permisiva y lo que no encaja se descarta con un
//! `warn!` en vez de fallar.

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Discriminante del módulo (`sk` en el backend).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    EyeTrackingConfig,
    WelcomeScreen,
    ThankYouScreen,
    SmartVocForm,
    CognitiveTask,
    EyeTracking,
    Other(String),
}

impl ModuleKind {
    pub fn from_sk(sk: &str) -> Self {
        match sk.trim().to_ascii_uppercase().as_str() {
            "EYE_TRACKING_CONFIG" => ModuleKind::EyeTrackingConfig,
            "WELCOME_SCREEN" => ModuleKind::WelcomeScreen,
            "THANK_YOU_SCREEN" => ModuleKind::ThankYouScreen,
            "SMART_VOC_FORM" => ModuleKind::SmartVocForm,
            "COGNITIVE_TASK" => ModuleKind::CognitiveTask,
            "EYE_TRACKING" => ModuleKind::EyeTracking,
            _ => ModuleKind::Other(sk.trim().to_string()),
        }
    }

    /// Los tres módulos que el compilador posiciona explícitamente.
    pub fn is_privileged(&self) -> bool {
        matches!(self,
                 ModuleKind::EyeTrackingConfig | ModuleKind::WelcomeScreen | ModuleKind::ThankYouScreen)
    }
}

/// Un módulo de la investigación.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawModuleConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub sk: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<Value>>,
    #[serde(default, rename = "questionKey", skip_serializing_if = "Option::is_none")]
    pub question_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Resto de campos específicos del tipo de módulo.
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl RawModuleConfig {
    pub fn new(id: impl Into<String>, sk: impl Into<String>) -> Self {
        Self { id: Some(id.into()),
               sk: sk.into(),
               ..Default::default() }
    }

    pub fn with_questions(mut self, questions: Vec<Value>) -> Self {
        self.questions = Some(questions);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn kind(&self) -> ModuleKind {
        ModuleKind::from_sk(&self.sk)
    }

    /// Título para nombres de pasos generados (`title`, luego `name`).
    pub fn display_title(&self) -> Option<&str> {
        self.title.as_deref().or(self.name.as_deref())
    }

    /// Clave del "bucket" de respuestas del módulo: su id o el `sk` en minúsculas.
    pub fn response_key(&self) -> String {
        match &self.id {
            Some(id) if !id.is_empty() => id.clone(),
            _ if !self.sk.is_empty() => self.sk.to_ascii_lowercase(),
            _ => "module".to_string(),
        }
    }

    /// Acepta tanto el módulo plano como la envoltura `{ id, config: {...} }`
    /// que devuelve la API de formularios. Devuelve `None` si el valor no es
    /// un módulo reconocible.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let (outer_id, body) = match obj.get("config") {
            Some(Value::Object(inner)) if !obj.contains_key("sk") => {
                (obj.get("id").and_then(Value::as_str).map(str::to_string), Value::Object(inner.clone()))
            }
            _ => (None, value.clone()),
        };
        match serde_json::from_value::<RawModuleConfig>(body) {
            Ok(mut module) => {
                if outer_id.is_some() {
                    module.id = outer_id;
                }
                Some(module)
            }
            Err(e) => {
                warn!("módulo descartado por formato inválido: {e}");
                None
            }
        }
    }
}

/// Vista permisiva sobre una pregunta dentro de un módulo.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionDef {
    pub id: Option<String>,
    pub title: Option<String>,
    pub question_type: Option<String>,
    pub instructions: Option<String>,
    pub question_key: Option<String>,
}

impl QuestionDef {
    /// Lee los campos conocidos; campos con tipos inesperados se ignoran
    /// individualmente. Devuelve `None` si el valor no es un objeto.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let text = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string).filter(|s| !s.is_empty());
        Some(Self { id: text("id"),
                    title: text("title"),
                    question_type: text("type"),
                    instructions: text("instructions"),
                    question_key: text("questionKey") })
    }
}
