//! Respuestas persistidas y estado de respuestas de la sesión.
//!
//! `all_steps` es la única fuente de verdad. Las vistas por categoría se
//! calculan bajo demanda con `ResponsesData::modules()`, de modo que no hay
//! dos estructuras mutables que puedan divergir.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::constants::{DEMOGRAPHIC_TYPE, WELCOME_TYPE};

/// Respuesta de un paso. A lo sumo una viva por `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleResponse {
    /// Igual al id del paso dueño.
    pub id: String,
    pub step_type: String,
    pub step_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_key: Option<String>,
    pub response: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Id del documento remoto, una vez conocido.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
}

impl ModuleResponse {
    pub fn new(id: impl Into<String>,
               step_type: impl Into<String>,
               step_title: impl Into<String>,
               response: Value,
               now: DateTime<Utc>)
               -> Self {
        Self { id: id.into(),
               step_type: step_type.into(),
               step_title: step_title.into(),
               question_key: None,
               response,
               created_at: now,
               updated_at: now,
               remote_id: None }
    }

    pub fn category(&self) -> String {
        response_category(&self.step_type, &self.step_title)
    }
}

/// Bucket semántico de una respuesta. Orden de decisión: casos especiales
/// (demográfico, feedback por título, bienvenida), prefijo de tipo, y por
/// último el primer token del tipo.
pub fn response_category(step_type: &str, step_title: &str) -> String {
    if step_type == DEMOGRAPHIC_TYPE {
        return "demographic".into();
    }
    if step_title.to_lowercase().contains("feedback") {
        return "feedback".into();
    }
    if step_type == WELCOME_TYPE {
        return "welcome".into();
    }
    if step_type.starts_with("cognitive_") {
        return "cognitive_task".into();
    }
    if step_type.starts_with("smartvoc_") {
        return "smartvoc".into();
    }
    if step_type.starts_with("eye_tracking_") {
        return "eye_tracking".into();
    }
    step_type.split('_').next().filter(|t| !t.is_empty()).unwrap_or("other").to_string()
}

/// Categorías que se exportan como objeto único en vez de lista.
const SINGLETON_CATEGORIES: [&str; 3] = ["demographic", "feedback", "welcome"];
/// Categorías siempre presentes en la exportación, aunque vacías.
const BASE_CATEGORIES: [&str; 3] = ["cognitive_task", "smartvoc", "eye_tracking"];

/// Estado completo de respuestas de una sesión.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsesData {
    pub research_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<String>,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    all_steps: Vec<ModuleResponse>,
}

impl ResponsesData {
    pub fn new(research_id: impl Into<String>, participant_id: Option<String>, start_time: DateTime<Utc>) -> Self {
        Self { research_id: research_id.into(),
               participant_id,
               start_time,
               end_time: None,
               all_steps: Vec::new() }
    }

    pub fn all_steps(&self) -> &[ModuleResponse] {
        &self.all_steps
    }

    pub fn find(&self, step_id: &str) -> Option<&ModuleResponse> {
        self.all_steps.iter().find(|r| r.id == step_id)
    }

    /// Busca primero por `question_key` y, si no hay, por id de paso.
    pub fn find_by_key(&self, key: &str) -> Option<&ModuleResponse> {
        self.all_steps
            .iter()
            .find(|r| r.question_key.as_deref() == Some(key))
            .or_else(|| self.find(key))
    }

    pub fn find_mut(&mut self, step_id: &str) -> Option<&mut ModuleResponse> {
        self.all_steps.iter_mut().find(|r| r.id == step_id)
    }

    /// Inserta o reemplaza por id. Devuelve `true` si fue una actualización.
    /// En una actualización se conservan `created_at` y `remote_id` previos.
    pub fn upsert(&mut self, mut response: ModuleResponse) -> bool {
        match self.find_mut(&response.id) {
            Some(existing) => {
                response.created_at = existing.created_at;
                if response.remote_id.is_none() {
                    response.remote_id = existing.remote_id.clone();
                }
                *existing = response;
                true
            }
            None => {
                self.all_steps.push(response);
                false
            }
        }
    }

    /// Reemplaza todas las respuestas; si la fuente trae ids repetidos gana
    /// la última aparición.
    pub fn replace_all(&mut self, responses: Vec<ModuleResponse>) {
        self.all_steps.clear();
        for r in responses {
            self.upsert(r);
        }
    }

    pub fn remove(&mut self, step_id: &str) -> Option<ModuleResponse> {
        let idx = self.all_steps.iter().position(|r| r.id == step_id)?;
        Some(self.all_steps.remove(idx))
    }

    pub fn clear(&mut self) {
        self.all_steps.clear();
        self.end_time = None;
    }

    /// Fija `end_time` sólo la primera vez.
    pub fn stamp_end_time(&mut self, now: DateTime<Utc>) -> bool {
        if self.end_time.is_some() {
            return false;
        }
        self.end_time = Some(now);
        true
    }

    pub fn modules(&self) -> CategorizedResponses<'_> {
        let mut buckets: BTreeMap<String, Vec<&ModuleResponse>> = BTreeMap::new();
        for r in &self.all_steps {
            buckets.entry(r.category()).or_default().push(r);
        }
        CategorizedResponses { buckets,
                               all_steps: &self.all_steps }
    }

    /// Forma de exportación: metadatos de sesión y `modules` con las vistas
    /// por categoría más `all_steps`.
    pub fn to_export_value(&self) -> Value {
        let view = self.modules();
        let mut modules = Map::new();
        for base in BASE_CATEGORIES {
            modules.insert(base.to_string(), json!([]));
        }
        for (category, items) in &view.buckets {
            let value = if SINGLETON_CATEGORIES.contains(&category.as_str()) {
                items.last().map(|r| json!(r)).unwrap_or(Value::Null)
            } else {
                json!(items)
            };
            modules.insert(category.clone(), value);
        }
        modules.insert("all_steps".into(), json!(self.all_steps));
        json!({
            "researchId": self.research_id,
            "participantId": self.participant_id,
            "startTime": self.start_time,
            "endTime": self.end_time,
            "modules": modules,
        })
    }
}

/// Vista por categorías, derivada de `all_steps`.
#[derive(Debug)]
pub struct CategorizedResponses<'a> {
    buckets: BTreeMap<String, Vec<&'a ModuleResponse>>,
    all_steps: &'a [ModuleResponse],
}

impl<'a> CategorizedResponses<'a> {
    pub fn category(&self, name: &str) -> &[&'a ModuleResponse] {
        self.buckets.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Para categorías de respuesta única (demographic, feedback, welcome).
    pub fn single(&self, name: &str) -> Option<&'a ModuleResponse> {
        self.category(name).last().copied()
    }

    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.buckets.keys().map(String::as_str)
    }

    pub fn all_steps(&self) -> &'a [ModuleResponse] {
        self.all_steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resp(id: &str, ty: &str, title: &str) -> ModuleResponse {
        ModuleResponse::new(id, ty, title, json!({"v": id}), Utc::now())
    }

    #[test]
    fn category_policy() {
        assert_eq!(response_category("demographic", "Datos"), "demographic");
        assert_eq!(response_category("cognitive_short_text", "Module Feedback"), "feedback");
        assert_eq!(response_category("welcome", "Hola"), "welcome");
        assert_eq!(response_category("cognitive_ranking", "Q"), "cognitive_task");
        assert_eq!(response_category("smartvoc_nps", "Q"), "smartvoc");
        assert_eq!(response_category("eye_tracking_gaze", "Q"), "eye_tracking");
        assert_eq!(response_category("custom_rating", "Q"), "custom");
    }

    #[test]
    fn upsert_keeps_a_single_entry_and_original_creation() {
        let mut data = ResponsesData::new("r1", Some("p1".into()), Utc::now());
        let first = resp("q1", "cognitive_short_text", "Q1");
        let created = first.created_at;
        assert!(!data.upsert(first));
        let mut second = resp("q1", "cognitive_short_text", "Q1");
        second.response = json!({"text": "later"});
        assert!(data.upsert(second));
        assert_eq!(data.all_steps().len(), 1);
        assert_eq!(data.find("q1").unwrap().created_at, created);
        assert_eq!(data.find("q1").unwrap().response, json!({"text": "later"}));
    }

    #[test]
    fn category_views_never_diverge_from_all_steps() {
        let mut data = ResponsesData::new("r1", None, Utc::now());
        data.upsert(resp("demographic", "demographic", "Demo"));
        data.upsert(resp("q1", "cognitive_short_text", "Q1"));
        data.upsert(resp("q2", "smartvoc_csat", "CSAT"));
        data.remove("q1");
        let view = data.modules();
        let in_buckets: usize = view.category_names().map(|c| view.category(c).len()).sum();
        assert_eq!(in_buckets, view.all_steps().len());
        assert!(view.category("cognitive_task").is_empty());
        assert_eq!(view.single("demographic").map(|r| r.id.as_str()), Some("demographic"));
    }

    #[test]
    fn end_time_is_stamped_once() {
        let mut data = ResponsesData::new("r1", None, Utc::now());
        let t1 = Utc::now();
        assert!(data.stamp_end_time(t1));
        assert!(!data.stamp_end_time(Utc::now()));
        assert_eq!(data.end_time, Some(t1));
    }

    #[test]
    fn export_has_base_buckets_and_all_steps() {
        let mut data = ResponsesData::new("r1", Some("p1".into()), Utc::now());
        data.upsert(resp("welcome-ish", "welcome", "Hola"));
        let v = data.to_export_value();
        assert_eq!(v["modules"]["cognitive_task"], json!([]));
        assert_eq!(v["modules"]["welcome"]["id"], json!("welcome-ish"));
        assert_eq!(v["modules"]["all_steps"].as_array().map(Vec::len), Some(1));
    }
}
