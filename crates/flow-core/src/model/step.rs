use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{DEMOGRAPHIC_TYPE, THANKYOU_TYPE, WELCOME_TYPE};

/// Unidad navegable compilada. Inmutable; se reconstruye completa en cada
/// carga de configuración.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Estable entre recompilaciones (derivado de la pregunta o módulo).
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub step_type: String,
    /// Payload original de la pregunta/módulo, opaco para el compilador.
    pub config: Value,
    /// Bucket del módulo del backend al que pertenece la respuesta.
    pub response_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// `false` => la UI debe mostrar un placeholder "no soportado".
    pub supported: bool,
}

impl Step {
    pub fn category(&self) -> StepCategory {
        StepCategory::of(&self.step_type)
    }

    /// Bienvenida y agradecimiento no llevan respuesta.
    pub fn is_answerless(&self) -> bool {
        matches!(self.category(), StepCategory::Welcome | StepCategory::ThankYou)
    }
}

/// Clasificación gruesa del tipo fino de un paso.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepCategory {
    Welcome,
    ThankYou,
    Demographic,
    CognitiveTask,
    SmartVoc,
    EyeTracking,
    Other,
}

impl StepCategory {
    pub fn of(step_type: &str) -> Self {
        match step_type {
            WELCOME_TYPE => StepCategory::Welcome,
            THANKYOU_TYPE => StepCategory::ThankYou,
            DEMOGRAPHIC_TYPE => StepCategory::Demographic,
            t if t.starts_with("cognitive_") => StepCategory::CognitiveTask,
            t if t.starts_with("smartvoc_") => StepCategory::SmartVoc,
            t if t.starts_with("eye_tracking_") => StepCategory::EyeTracking,
            _ => StepCategory::Other,
        }
    }
}
