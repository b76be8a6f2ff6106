//! Compilador de pasos: `RawModuleConfig[] -> FlowDefinition`.
//!
//! Transformación pura: sin reloj, sin red, sin estado oculto. El mismo
//! input produce exactamente la misma secuencia (ids incluidos) y el mismo
//! `definition_hash`. Nunca falla: datos ausentes o malformados degradan a
//! la secuencia mínima `[welcome, thankyou]`.
//!
//! Orden emitido: `[welcome, demographic?, <preguntas de los demás módulos
//! en orden de módulo>, thankyou]`.

mod screens;
pub mod type_map;

use std::collections::HashSet;

use log::{debug, warn};
use serde_json::Value;

use crate::model::{FlowDefinition, ModuleKind, QuestionDef, RawModuleConfig, Step};
use type_map::ResolvedType;

/// Opciones de compilación.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Sintetiza preguntas demográficas de relleno cuando no hay ninguna
    /// habilitada. Sólo para desarrollo local; debe activarse explícitamente.
    pub development: bool,
}

impl CompileOptions {
    pub fn development() -> Self {
        Self { development: true }
    }
}

/// La bienvenida va antes que las demográficas a propósito, para que el
/// índice 0 sea siempre la bienvenida (regla de salto y de reanudación).
pub fn compile(modules: &[RawModuleConfig], options: &CompileOptions) -> FlowDefinition {
    let core = screens::extract(modules);

    let mut steps = vec![screens::welcome_step(core.welcome)];

    let demographics = match core.demographics {
        Some(d) => Some(d),
        None if options.development => {
            warn!("modo desarrollo: se sintetizan preguntas demográficas de relleno");
            Some(screens::development_demographics())
        }
        None => None,
    };
    if let Some(demo) = demographics {
        steps.push(screens::demographic_step(demo));
    }

    for module in modules.iter().filter(|m| !m.kind().is_privileged()) {
        steps.extend(module_steps(module));
    }

    steps.push(screens::thankyou_step(core.thankyou));
    dedupe_ids(&mut steps);

    let definition = FlowDefinition::new(steps);
    debug!("flujo compilado: {} pasos, hash={}", definition.len(), definition.definition_hash);
    definition
}

/// Variante sobre JSON crudo: acepta un arreglo de módulos o la envoltura
/// `{ "data": [...] }` de la API.
pub fn compile_value(raw: &Value, options: &CompileOptions) -> FlowDefinition {
    let items = match raw {
        Value::Array(items) => Some(items),
        Value::Object(obj) => obj.get("data").and_then(Value::as_array),
        _ => None,
    };
    let modules: Vec<RawModuleConfig> = match items {
        Some(items) => items.iter().filter_map(RawModuleConfig::from_value).collect(),
        None => {
            warn!("configuración de flujo sin módulos válidos; se usa la secuencia mínima");
            Vec::new()
        }
    };
    compile(&modules, options)
}

fn default_module_title(module: &RawModuleConfig) -> String {
    if let Some(t) = module.display_title() {
        return t.to_string();
    }
    match module.kind() {
        ModuleKind::SmartVocForm => "SmartVOC".into(),
        ModuleKind::CognitiveTask => "Tarea Cognitiva".into(),
        ModuleKind::EyeTracking => "Eye Tracking".into(),
        _ if !module.sk.is_empty() => module.sk.clone(),
        _ => "Módulo".into(),
    }
}

fn module_steps(module: &RawModuleConfig) -> Vec<Step> {
    let kind = module.kind();
    let response_key = module.response_key();
    let questions = module.questions.as_deref().unwrap_or(&[]);

    if questions.is_empty() {
        // Un módulo sin preguntas pero con questionKey es un paso en sí mismo.
        return match &module.question_key {
            Some(qk) => {
                let step_type = if module.sk.is_empty() { "module".to_string() } else { module.sk.to_ascii_lowercase() };
                vec![Step { id: module.id.clone().unwrap_or_else(|| qk.clone()),
                            name: default_module_title(module),
                            step_type,
                            config: serde_json::to_value(module).unwrap_or(Value::Null),
                            response_key,
                            question_key: Some(qk.clone()),
                            instructions: module.metadata.get("instructions").and_then(Value::as_str).map(str::to_string),
                            supported: false }]
            }
            None => Vec::new(),
        };
    }

    let mut steps = Vec::with_capacity(questions.len());
    for (n, raw) in questions.iter().enumerate() {
        let Some(q) = QuestionDef::from_value(raw) else {
            warn!("módulo '{response_key}': pregunta {n} no es un objeto; se ignora");
            continue;
        };
        let (step_type, supported) = match type_map::resolve(&kind, q.question_type.as_deref()) {
            ResolvedType::Known(t) => (t, true),
            ResolvedType::Generic(t) => {
                debug!("módulo '{response_key}': tipo '{t}' sin render dedicado");
                (t, false)
            }
            ResolvedType::Dropped => {
                warn!("módulo '{response_key}': subtipo {:?} sin mapeo (pregunta {:?}); se descarta",
                      q.question_type, q.id);
                continue;
            }
        };
        let id = q.id.clone().unwrap_or_else(|| format!("{response_key}_{step_type}_{n}"));
        let name = q.title.clone().unwrap_or_else(|| {
                                      format!("{}: {}",
                                              default_module_title(module),
                                              q.question_type.as_deref().unwrap_or("Pregunta"))
                                  });
        if q.question_key.is_none() {
            debug!("pregunta '{id}' sin questionKey del backend");
        }
        steps.push(Step { question_key: q.question_key.clone().or_else(|| q.id.clone()),
                          id,
                          name,
                          step_type,
                          config: raw.clone(),
                          response_key: response_key.clone(),
                          instructions: q.instructions.clone(),
                          supported });
    }
    steps
}

/// Garantiza ids únicos con un sufijo determinista `#k`.
fn dedupe_ids(steps: &mut [Step]) {
    let mut seen: HashSet<String> = HashSet::new();
    for step in steps.iter_mut() {
        if seen.insert(step.id.clone()) {
            continue;
        }
        let mut k = 2;
        let mut candidate = format!("{}#{k}", step.id);
        while seen.contains(&candidate) {
            k += 1;
            candidate = format!("{}#{k}", step.id);
        }
        warn!("id de paso duplicado '{}'; se renombra a '{candidate}'", step.id);
        step.id = candidate.clone();
        seen.insert(candidate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn types(def: &FlowDefinition) -> Vec<&str> {
        def.steps.iter().map(|s| s.step_type.as_str()).collect()
    }

    #[test]
    fn empty_config_yields_minimal_sequence() {
        let def = compile(&[], &CompileOptions::default());
        assert_eq!(types(&def), vec!["welcome", "thankyou"]);
        assert_eq!(def.steps[0].config["isFallback"], json!(true));
    }

    #[test]
    fn malformed_value_degrades_to_minimal_sequence() {
        let def = compile_value(&json!({"error": true, "message": "404"}), &CompileOptions::default());
        assert_eq!(types(&def), vec!["welcome", "thankyou"]);
        let def = compile_value(&json!(42), &CompileOptions::default());
        assert_eq!(def.len(), 2);
    }

    #[test]
    fn demographic_only_when_a_question_is_enabled() {
        let disabled = RawModuleConfig::new("et", "EYE_TRACKING_CONFIG")
            .with_meta("demographicQuestions", json!({"age": {"enabled": false}}));
        let def = compile(&[disabled], &CompileOptions::default());
        assert!(!types(&def).contains(&"demographic"));

        let enabled = RawModuleConfig::new("et", "EYE_TRACKING_CONFIG")
            .with_meta("demographicQuestions", json!({"age": {"enabled": true}, "gender": {"enabled": false}}));
        let def = compile(&[enabled], &CompileOptions::default());
        assert_eq!(types(&def), vec!["welcome", "demographic", "thankyou"]);
    }

    #[test]
    fn development_placeholder_requires_explicit_flag() {
        assert_eq!(compile(&[], &CompileOptions::default()).len(), 2);
        let def = compile(&[], &CompileOptions::development());
        assert_eq!(types(&def), vec!["welcome", "demographic", "thankyou"]);
    }

    #[test]
    fn module_without_questions_but_with_key_is_a_step() {
        let mut m = RawModuleConfig::new("m9", "IMAGE_FEEDBACK");
        m.question_key = Some("m9_key".into());
        let def = compile(&[m, RawModuleConfig::new("m10", "EMPTY")], &CompileOptions::default());
        assert_eq!(types(&def), vec!["welcome", "image_feedback", "thankyou"]);
        assert_eq!(def.steps[1].id, "m9");
        assert!(!def.steps[1].supported);
    }

    #[test]
    fn duplicate_ids_are_renamed_deterministically() {
        let m = RawModuleConfig::new("m1", "COGNITIVE_TASK").with_questions(vec![json!({"id": "q", "type": "SHORT_TEXT"}),
                                                                                json!({"id": "q", "type": "LONG_TEXT"}),
                                                                                json!({"id": "welcome", "type": "RANKING"})]);
        let def = compile(&[m], &CompileOptions::default());
        let ids: Vec<&str> = def.steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["welcome", "q", "q#2", "welcome#2", "thankyou"]);
    }
}
