//! Derivación del tipo fino de un paso a partir del tipo de módulo y del
//! subtipo declarado por la pregunta.

use crate::model::ModuleKind;

/// Resultado de resolver el tipo de una pregunta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedType {
    /// Tipo conocido por la capa de render.
    Known(String),
    /// Tipo genérico: se conserva el paso pero se marca como no soportado.
    Generic(String),
    /// Subtipo sin mapeo en una tabla cerrada: el paso se descarta.
    Dropped,
}

const SMART_VOC_TYPES: [(&str, &str); 6] = [("CSAT", "smartvoc_csat"),
                                            ("CES", "smartvoc_ces"),
                                            ("CV", "smartvoc_cv"),
                                            ("NPS", "smartvoc_nps"),
                                            ("NEV", "smartvoc_nev"),
                                            ("VOC", "smartvoc_feedback")];

const EYE_TRACKING_TYPES: [(&str, &str); 5] = [("HEATMAP", "eye_tracking_heatmap"),
                                               ("GAZE", "eye_tracking_gaze"),
                                               ("FIXATION", "eye_tracking_fixation"),
                                               ("SACCADE", "eye_tracking_saccade"),
                                               ("GENERAL", "eye_tracking_general")];

const COGNITIVE_SUBTYPES: [&str; 8] = ["short_text",
                                       "long_text",
                                       "single_choice",
                                       "multiple_choice",
                                       "linear_scale",
                                       "ranking",
                                       "navigation_flow",
                                       "preference_test"];

fn lookup(table: &[(&str, &'static str)], key: &str) -> Option<&'static str> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

pub fn resolve(kind: &ModuleKind, subtype: Option<&str>) -> ResolvedType {
    let subtype = subtype.map(str::trim).filter(|s| !s.is_empty());
    match kind {
        ModuleKind::SmartVocForm => {
            let Some(sub) = subtype else { return ResolvedType::Dropped };
            if sub.to_ascii_lowercase().starts_with("smartvoc_") {
                let lower = sub.to_ascii_lowercase();
                return if SMART_VOC_TYPES.iter().any(|(_, v)| *v == lower) {
                    ResolvedType::Known(lower)
                } else {
                    ResolvedType::Dropped
                };
            }
            match lookup(&SMART_VOC_TYPES, &sub.to_ascii_uppercase()) {
                Some(t) => ResolvedType::Known(t.to_string()),
                None => ResolvedType::Dropped,
            }
        }
        ModuleKind::CognitiveTask => {
            let lower = subtype.unwrap_or("question").to_ascii_lowercase();
            let bare = lower.strip_prefix("cognitive_").unwrap_or(&lower).to_string();
            let full = format!("cognitive_{bare}");
            if COGNITIVE_SUBTYPES.contains(&bare.as_str()) {
                ResolvedType::Known(full)
            } else {
                ResolvedType::Generic(full)
            }
        }
        ModuleKind::EyeTracking => {
            let sub = subtype.unwrap_or("question");
            match lookup(&EYE_TRACKING_TYPES, &sub.to_ascii_uppercase()) {
                Some(t) => ResolvedType::Known(t.to_string()),
                None => ResolvedType::Generic(format!("eye_tracking_{}", sub.to_ascii_lowercase())),
            }
        }
        other => generic(other, subtype),
    }
}

fn generic(kind: &ModuleKind, subtype: Option<&str>) -> ResolvedType {
    let sub = subtype.unwrap_or("question").to_ascii_lowercase();
    match kind {
        ModuleKind::Other(sk) if !sk.is_empty() => ResolvedType::Generic(format!("{}_{}", sk.to_ascii_lowercase(), sub)),
        _ => ResolvedType::Generic(format!("unknown_{sub}")),
    }
}
