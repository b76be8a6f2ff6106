//! Pasos privilegiados: bienvenida, agradecimiento y demográfico.
//!
//! Se extraen en un único recorrido y el compilador los posiciona de forma
//! explícita. Bienvenida y agradecimiento siempre existen (con contenido por
//! defecto si faltan); el demográfico sólo si hay alguna pregunta habilitada.

use log::warn;
use serde_json::{json, Map, Value};

use crate::constants::*;
use crate::model::{ModuleKind, RawModuleConfig, Step};

#[derive(Debug, Default)]
pub(crate) struct CoreScreens {
    pub demographics: Option<Demographics>,
    pub welcome: Option<Map<String, Value>>,
    pub thankyou: Option<Map<String, Value>>,
}

#[derive(Debug)]
pub(crate) struct Demographics {
    pub questions: Value,
    pub title: String,
    pub description: String,
}

/// Vista del módulo como objeto JSON (campos conocidos + metadata).
fn module_object(module: &RawModuleConfig) -> Map<String, Value> {
    match serde_json::to_value(module) {
        Ok(Value::Object(map)) => map,
        _ => module.metadata.clone(),
    }
}

fn has_enabled_question(questions: &Value) -> bool {
    let enabled = |q: &Value| q.get("enabled").and_then(Value::as_bool) == Some(true);
    match questions {
        Value::Object(map) => map.values().any(enabled),
        Value::Array(items) => items.iter().any(enabled),
        _ => false,
    }
}

pub(crate) fn extract(modules: &[RawModuleConfig]) -> CoreScreens {
    let mut screens = CoreScreens::default();
    for module in modules {
        match module.kind() {
            ModuleKind::EyeTrackingConfig => {
                let Some(questions) = module.metadata.get("demographicQuestions") else { continue };
                if has_enabled_question(questions) {
                    screens.demographics =
                        Some(Demographics { questions: questions.clone(),
                                            title: module.title.clone().unwrap_or_else(|| DEFAULT_DEMOGRAPHIC_TITLE.into()),
                                            description: module.metadata
                                                               .get("description")
                                                               .and_then(Value::as_str)
                                                               .unwrap_or(DEFAULT_DEMOGRAPHIC_DESCRIPTION)
                                                               .to_string() });
                } else {
                    warn!("configuración demográfica sin preguntas habilitadas; se omite el paso");
                }
            }
            ModuleKind::WelcomeScreen => screens.welcome = Some(module_object(module)),
            ModuleKind::ThankYouScreen => screens.thankyou = Some(module_object(module)),
            _ => {}
        }
    }
    screens
}

/// Preguntas de relleno para desarrollo local. Sólo se usan con
/// `CompileOptions::development` activo.
pub(crate) fn development_demographics() -> Demographics {
    Demographics { questions: json!({
                       "age": { "enabled": true, "required": false, "options": ["18-24", "25-34", "35-44", "45+"] },
                       "gender": { "enabled": true, "required": false, "options": ["Femenino", "Masculino", "Otro"] },
                   }),
                   title: DEFAULT_DEMOGRAPHIC_TITLE.into(),
                   description: DEFAULT_DEMOGRAPHIC_DESCRIPTION.into() }
}

pub(crate) fn demographic_step(demo: Demographics) -> Step {
    Step { id: DEMOGRAPHIC_STEP_ID.into(),
           name: demo.title.clone(),
           step_type: DEMOGRAPHIC_TYPE.into(),
           config: json!({
               "title": demo.title,
               "description": demo.description,
               "demographicsConfig": { "questions": demo.questions },
           }),
           response_key: DEMOGRAPHIC_TYPE.into(),
           question_key: None,
           instructions: None,
           supported: true }
}

fn screen_step(config: Option<Map<String, Value>>,
               id: &str,
               step_type: &str,
               default_title: &str,
               default_message: &str)
               -> Step {
    let has_title = |c: &Map<String, Value>| c.get("title").and_then(Value::as_str).is_some_and(|t| !t.is_empty());
    let config = match config {
        Some(c) if has_title(&c) => c,
        _ => {
            let mut fallback = Map::new();
            fallback.insert("title".into(), json!(default_title));
            fallback.insert("message".into(), json!(default_message));
            fallback.insert("isFallback".into(), json!(true));
            fallback
        }
    };
    let name = config.get("title").and_then(Value::as_str).unwrap_or(default_title).to_string();
    Step { id: id.into(),
           name,
           step_type: step_type.into(),
           config: Value::Object(config),
           response_key: step_type.into(),
           question_key: None,
           instructions: None,
           supported: true }
}

pub(crate) fn welcome_step(config: Option<Map<String, Value>>) -> Step {
    screen_step(config, WELCOME_STEP_ID, WELCOME_TYPE, DEFAULT_WELCOME_TITLE, DEFAULT_WELCOME_MESSAGE)
}

pub(crate) fn thankyou_step(config: Option<Map<String, Value>>) -> Step {
    screen_step(config, THANKYOU_STEP_ID, THANKYOU_TYPE, DEFAULT_THANKYOU_TITLE, DEFAULT_THANKYOU_MESSAGE)
}
