//! Sanitizador de respuestas.
//!
//! Las respuestas llegan desde la capa de render como un grafo
//! (`AnswerValue`) que puede contener nodos compartidos, elementos del DOM y
//! refs del framework. Antes de enviarse o compararse se convierten a un
//! `serde_json::Value` inerte: los ciclos, elementos y refs se reemplazan por
//! marcadores de texto y los valores no representables por `null`.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{json, Map, Number, Value};

use crate::constants::{CIRCULAR_MARKER, DOM_ELEMENT_MARKER, REF_MARKER};
use crate::model::StepCategory;

/// Prefijo de claves internas del framework que nunca se envían.
const INTERNAL_KEY_PREFIX: &str = "__react";
const MAX_DEPTH: usize = 128;
const MAX_DEPTH_MARKER: &str = "[Max Depth]";

pub type SharedAnswer = Rc<RefCell<AnswerValue>>;

/// Valor de respuesta tal como lo produce la capa de render.
#[derive(Debug, Clone, Default)]
pub enum AnswerValue {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<AnswerValue>),
    Map(Vec<(String, AnswerValue)>),
    /// Nodo compartido; puede formar ciclos.
    Shared(SharedAnswer),
    /// Nodo del DOM.
    Element { tag: String },
    /// Ref del framework (`{ current: ... }`).
    Ref(Box<AnswerValue>),
}

impl AnswerValue {
    pub fn shared(value: AnswerValue) -> SharedAnswer {
        Rc::new(RefCell::new(value))
    }

    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, AnswerValue)>) -> Self {
        AnswerValue::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, AnswerValue::Undefined | AnswerValue::Null)
    }
}

impl From<Value> for AnswerValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => AnswerValue::Null,
            Value::Bool(b) => AnswerValue::Bool(b),
            Value::Number(n) => AnswerValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => AnswerValue::Text(s),
            Value::Array(items) => AnswerValue::List(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => AnswerValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect()),
        }
    }
}

impl From<&str> for AnswerValue {
    fn from(s: &str) -> Self {
        AnswerValue::Text(s.to_string())
    }
}

impl From<String> for AnswerValue {
    fn from(s: String) -> Self {
        AnswerValue::Text(s)
    }
}

impl From<f64> for AnswerValue {
    fn from(n: f64) -> Self {
        AnswerValue::Number(n)
    }
}

impl From<bool> for AnswerValue {
    fn from(b: bool) -> Self {
        AnswerValue::Bool(b)
    }
}

struct Sanitizer {
    /// Nodos compartidos en el camino actual (detección de ciclos).
    path: Vec<*const RefCell<AnswerValue>>,
}

impl Sanitizer {
    fn value(&mut self, v: &AnswerValue, depth: usize) -> Option<Value> {
        if depth > MAX_DEPTH {
            return Some(json!(MAX_DEPTH_MARKER));
        }
        let out = match v {
            AnswerValue::Undefined => return None,
            AnswerValue::Null => Value::Null,
            AnswerValue::Bool(b) => Value::Bool(*b),
            AnswerValue::Number(n) => Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null),
            AnswerValue::Text(s) => Value::String(s.clone()),
            AnswerValue::List(items) => {
                Value::Array(items.iter().map(|i| self.value(i, depth + 1).unwrap_or(Value::Null)).collect())
            }
            AnswerValue::Map(entries) => {
                let mut map = Map::new();
                for (k, item) in entries {
                    if k.starts_with(INTERNAL_KEY_PREFIX) {
                        continue;
                    }
                    if let Some(clean) = self.value(item, depth + 1) {
                        map.insert(k.clone(), clean);
                    }
                }
                Value::Object(map)
            }
            AnswerValue::Shared(node) => {
                let ptr = Rc::as_ptr(node);
                if self.path.contains(&ptr) {
                    return Some(json!(CIRCULAR_MARKER));
                }
                let Ok(inner) = node.try_borrow() else {
                    return Some(json!(CIRCULAR_MARKER));
                };
                self.path.push(ptr);
                let out = self.value(&inner, depth + 1);
                self.path.pop();
                return out;
            }
            AnswerValue::Element { .. } => json!(DOM_ELEMENT_MARKER),
            AnswerValue::Ref(_) => json!(REF_MARKER),
        };
        Some(out)
    }
}

/// Convierte una respuesta en JSON seguro. `None` si el valor es `Undefined`.
pub fn sanitize(value: &AnswerValue) -> Option<Value> {
    Sanitizer { path: Vec::new() }.value(value, 0)
}

/// Placeholder tipado para respuestas ausentes: escalas/numéricas usan
/// `{ "value": 0 }`, el resto `{ "text": "" }`.
pub fn placeholder_for(step_type: &str) -> Value {
    let numeric = StepCategory::of(step_type) == StepCategory::SmartVoc
                  || ["scale", "rating", "nps"].iter().any(|k| step_type.contains(k));
    if numeric {
        json!({ "value": 0 })
    } else {
        json!({ "text": "" })
    }
}

/// Sanitiza la respuesta de un paso y sustituye las ausentes por el
/// placeholder del tipo, de modo que el backend nunca recibe `null`.
pub fn prepare_answer(answer: Option<&AnswerValue>, step_type: &str) -> Value {
    match answer.and_then(sanitize) {
        Some(Value::Null) | None => placeholder_for(step_type),
        Some(v) => v,
    }
}
