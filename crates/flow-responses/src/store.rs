//! Store de respuestas del participante.
//!
//! Escritura optimista: `write_local` actualiza `all_steps` de forma
//! síncrona y la persistencia remota (`persist`) corre después, sin bloquear
//! la navegación. Reglas de consistencia:
//! - Guardados del mismo paso se serializan con un lock por `step_id` y
//!   re-resuelven el id remoto desde el snapshot más reciente, de modo que
//!   nunca se crean dos documentos remotos para un paso.
//! - Cada escritura local lleva una revisión. Mientras la última revisión de
//!   un paso no esté confirmada por el backend, la hidratación conserva la
//!   versión local (una respuesta vieja del servidor nunca pisa una escritura
//!   local más nueva, y un guardado fallido no se pierde).
//! - Cada escritura o confirmación avanza un `epoch`. Una hidratación sólo
//!   reemplaza pasos que nadie tocó desde que empezó su lectura remota.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use dashmap::DashMap;
use flow_core::constants::{THANKYOU_STEP_ID, WELCOME_STEP_ID};
use flow_core::{prepare_answer, AnswerLookup, AnswerValue, FlowError, ModuleResponse, ResponsesData, Step, StepCategory};
use log::{debug, error, warn};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::api::{RemoteId, ResponseApi, SaveRequest};
use crate::config::StoreConfig;
use crate::error::ResponseApiError;

/// Referencia liviana al paso dueño de una respuesta.
#[derive(Debug, Clone, Copy)]
pub struct StepRef<'a> {
    pub id: &'a str,
    pub step_type: &'a str,
    pub title: &'a str,
    pub question_key: Option<&'a str>,
}

impl<'a> From<&'a Step> for StepRef<'a> {
    fn from(step: &'a Step) -> Self {
        Self { id: &step.id,
               step_type: &step.step_type,
               title: &step.name,
               question_key: step.question_key.as_deref() }
    }
}

/// Escritura local pendiente de persistir.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSave {
    pub step_id: String,
    pub step_type: String,
    pub step_title: String,
    pub question_key: Option<String>,
    pub answer: Value,
    revision: u64,
    generation: u64,
}

#[derive(Debug)]
struct StoreState {
    data: ResponsesData,
    /// Última revisión local por paso.
    revisions: HashMap<String, u64>,
    /// Última revisión confirmada por el backend.
    confirmed: HashMap<String, u64>,
    /// Cambia con la identidad o al borrar todo; descarta resultados viejos.
    generation: u64,
    /// Contador de escrituras y confirmaciones locales.
    epoch: u64,
    /// Último `epoch` en que se escribió o confirmó cada paso.
    touched: HashMap<String, u64>,
    hydrated: bool,
}

impl StoreState {
    fn is_unconfirmed(&self, step_id: &str) -> bool {
        let local = self.revisions.get(step_id).copied().unwrap_or(0);
        local > self.confirmed.get(step_id).copied().unwrap_or(0)
    }

    fn touch(&mut self, step_id: &str) {
        self.epoch += 1;
        self.touched.insert(step_id.to_string(), self.epoch);
    }

    fn touched_since(&self, step_id: &str, epoch: u64) -> bool {
        self.touched.get(step_id).is_some_and(|&e| e > epoch)
    }

    fn reset(&mut self, research_id: String, participant_id: Option<String>) {
        self.data = ResponsesData::new(research_id, participant_id, Utc::now());
        self.revisions.clear();
        self.confirmed.clear();
        self.touched.clear();
        self.generation += 1;
        self.hydrated = false;
    }
}

pub struct ResponseStore<A: ResponseApi> {
    api: Arc<A>,
    state: Arc<RwLock<StoreState>>,
    step_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    config: StoreConfig,
}

impl<A: ResponseApi> Clone for ResponseStore<A> {
    fn clone(&self) -> Self {
        Self { api: self.api.clone(),
               state: self.state.clone(),
               step_locks: self.step_locks.clone(),
               config: self.config.clone() }
    }
}

impl<A: ResponseApi> ResponseStore<A> {
    pub fn new(api: Arc<A>, research_id: impl Into<String>, participant_id: Option<String>, config: StoreConfig) -> Self {
        let state = StoreState { data: ResponsesData::new(research_id, participant_id, Utc::now()),
                                 revisions: HashMap::new(),
                                 confirmed: HashMap::new(),
                                 generation: 0,
                                 epoch: 0,
                                 touched: HashMap::new(),
                                 hydrated: false };
        Self { api,
               state: Arc::new(RwLock::new(state)),
               step_locks: Arc::new(DashMap::new()),
               config }
    }

    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn step_lock(&self, step_id: &str) -> Arc<Mutex<()>> {
        self.step_locks.entry(step_id.to_string()).or_default().clone()
    }

    /// Fija la identidad de la sesión. Un cambio de participante o de
    /// investigación descarta el estado local anterior.
    pub fn set_identity(&self, research_id: &str, participant_id: &str) {
        let mut st = self.write();
        let same = st.data.research_id == research_id && st.data.participant_id.as_deref() == Some(participant_id);
        if same {
            return;
        }
        if st.data.participant_id.is_none() && st.data.research_id == research_id && st.data.all_steps().is_empty() {
            st.data.participant_id = Some(participant_id.to_string());
            return;
        }
        debug!("store: nueva identidad {research_id}/{participant_id}; se descarta el estado local");
        st.reset(research_id.to_string(), Some(participant_id.to_string()));
    }

    pub fn identity(&self) -> (String, Option<String>) {
        let st = self.read();
        (st.data.research_id.clone(), st.data.participant_id.clone())
    }

    pub fn is_hydrated(&self) -> bool {
        self.read().hydrated
    }

    /// Trae las respuestas guardadas y reemplaza el estado local, salvo las
    /// escrituras aún no confirmadas y los pasos escritos o confirmados
    /// mientras la lectura estaba en curso. Idempotente.
    pub async fn hydrate(&self) -> Result<usize, FlowError> {
        let (research_id, participant_id, generation, fetch_epoch) = {
            let st = self.read();
            (st.data.research_id.clone(), st.data.participant_id.clone(), st.generation, st.epoch)
        };
        let Some(participant_id) = participant_id else {
            return Err(FlowError::Hydration("participante no identificado".into()));
        };
        let remote = match self.api.get_responses(&research_id, &participant_id).await {
            Ok(list) => list,
            Err(ResponseApiError::NotFound) => Vec::new(),
            Err(e) => {
                warn!("store: hidratación fallida para {research_id}/{participant_id}: {e}");
                return Err(e.into());
            }
        };

        let mut guard = self.write();
        let st = &mut *guard;
        if st.generation != generation {
            debug!("store: hidratación descartada (identidad cambió)");
            return Ok(0);
        }
        let local_wins: Vec<ModuleResponse> = st.data
                                                .all_steps()
                                                .iter()
                                                .filter(|r| st.is_unconfirmed(&r.id) || st.touched_since(&r.id, fetch_epoch))
                                                .cloned()
                                                .collect();
        let remote_ids: HashMap<String, Option<RemoteId>> =
            remote.iter().map(|r| (r.id.clone(), r.remote_id.clone())).collect();
        let restored = remote.len();
        st.data.replace_all(remote);
        for mut local in local_wins {
            if local.remote_id.is_none() {
                local.remote_id = remote_ids.get(&local.id).cloned().flatten();
            }
            st.data.upsert(local);
        }
        st.hydrated = true;
        debug!("store: hidratadas {restored} respuestas ({} en total)", st.data.all_steps().len());
        Ok(restored)
    }

    /// Escritura optimista. La respuesta se sanitiza y, si falta, se
    /// sustituye por el placeholder del tipo de paso.
    pub fn write_local<'a>(&self, step: impl Into<StepRef<'a>>, answer: Option<&AnswerValue>) -> PendingSave {
        let step = step.into();
        let clean = prepare_answer(answer, step.step_type);
        let mut st = self.write();
        let revision = {
            let rev = st.revisions.entry(step.id.to_string()).or_insert(0);
            *rev += 1;
            *rev
        };
        let mut response = ModuleResponse::new(step.id, step.step_type, step.title, clean.clone(), Utc::now());
        response.question_key = step.question_key.map(str::to_string);
        st.data.upsert(response);
        st.touch(step.id);
        PendingSave { step_id: step.id.to_string(),
                      step_type: step.step_type.to_string(),
                      step_title: step.title.to_string(),
                      question_key: step.question_key.map(str::to_string),
                      answer: clean,
                      revision,
                      generation: st.generation }
    }

    /// Persiste una escritura local. Un fallo se registra y se devuelve como
    /// `FlowError::Save`; el estado local no se revierte.
    ///
    /// Si mientras esperaba el lock del paso llegó una escritura local más
    /// nueva, se envía esa versión en lugar de la propia.
    pub async fn persist(&self, mut pending: PendingSave) -> Result<RemoteId, FlowError> {
        let lock = self.step_lock(&pending.step_id);
        let _serial = lock.lock().await;

        let (research_id, participant_id, existing_remote_id) = {
            let st = self.read();
            if st.generation != pending.generation {
                return Err(FlowError::Save { step_id: pending.step_id,
                                             reason: "sesión reiniciada antes de guardar".into() });
            }
            let latest = st.revisions.get(&pending.step_id).copied().unwrap_or(0);
            let local = st.data.find(&pending.step_id);
            if latest > pending.revision {
                if let Some(local) = local {
                    debug!("store: paso '{}' rev {} reemplazada por rev {latest}", pending.step_id, pending.revision);
                    pending.answer = local.response.clone();
                    pending.step_title = local.step_title.clone();
                    pending.revision = latest;
                }
            }
            (st.data.research_id.clone(), st.data.participant_id.clone(), local.and_then(|r| r.remote_id.clone()))
        };
        let Some(participant_id) = participant_id else {
            return Err(FlowError::Save { step_id: pending.step_id,
                                         reason: "participante no identificado".into() });
        };

        let request = SaveRequest { research_id,
                                    participant_id,
                                    step_id: pending.step_id.clone(),
                                    step_type: pending.step_type.clone(),
                                    step_title: pending.step_title.clone(),
                                    question_key: pending.question_key.clone(),
                                    answer: pending.answer.clone(),
                                    existing_remote_id };
        let remote_id = match self.api.save_or_update_response(request).await {
            Ok(id) => id,
            Err(e) => {
                error!("store: no se pudo guardar el paso '{}': {e}", pending.step_id);
                return Err(e.into_save_error(&pending.step_id));
            }
        };

        {
            let mut st = self.write();
            if st.generation == pending.generation {
                if let Some(r) = st.data.find_mut(&pending.step_id) {
                    r.remote_id = Some(remote_id.clone());
                }
                let confirmed = st.confirmed.entry(pending.step_id.clone()).or_insert(0);
                *confirmed = (*confirmed).max(pending.revision);
                st.touch(&pending.step_id);
            }
        }
        debug!("store: paso '{}' rev {} guardado como {remote_id}", pending.step_id, pending.revision);

        if self.config.rehydrate_after_save {
            if let Err(e) = self.hydrate().await {
                warn!("store: re-hidratación tras guardar falló: {e}");
            }
        }
        Ok(remote_id)
    }

    /// `write_local` + `persist`.
    pub async fn save(&self,
                      step_id: &str,
                      step_type: &str,
                      step_title: &str,
                      answer: Option<&AnswerValue>)
                      -> Result<RemoteId, FlowError> {
        let pending = self.write_local(StepRef { id: step_id,
                                                 step_type,
                                                 title: step_title,
                                                 question_key: None },
                                       answer);
        self.persist(pending).await
    }

    pub async fn save_step(&self, step: &Step, answer: Option<&AnswerValue>) -> Result<RemoteId, FlowError> {
        let pending = self.write_local(step, answer);
        self.persist(pending).await
    }

    /// Respuesta guardada del paso, buscada por `question_key` y luego por id.
    /// Bienvenida y agradecimiento no tienen.
    pub fn get_answer(&self, key: &str) -> Option<Value> {
        if key == WELCOME_STEP_ID || key == THANKYOU_STEP_ID {
            return None;
        }
        let st = self.read();
        let r = st.data.find_by_key(key)?;
        match StepCategory::of(&r.step_type) {
            StepCategory::Welcome | StepCategory::ThankYou => None,
            _ => Some(r.response.clone()),
        }
    }

    pub fn has_response(&self, step_id: &str) -> bool {
        self.read().data.find(step_id).is_some()
    }

    pub fn is_answered(&self, step_id: &str, step_type: &str) -> bool {
        match StepCategory::of(step_type) {
            StepCategory::Welcome | StepCategory::ThankYou => true,
            _ => self.has_response(step_id),
        }
    }

    /// Fija `end_time` la primera vez que se alcanza el agradecimiento.
    pub fn mark_end_time(&self) -> bool {
        self.write().data.stamp_end_time(Utc::now())
    }

    pub async fn mark_completed(&self) -> Result<(), FlowError> {
        let (research_id, participant_id) = self.identity();
        let Some(participant_id) = participant_id else {
            return Err(FlowError::Save { step_id: THANKYOU_STEP_ID.into(),
                                         reason: "participante no identificado".into() });
        };
        self.api
            .mark_completed(&research_id, &participant_id)
            .await
            .map_err(|e| {
                error!("store: no se pudo marcar la sesión como completada: {e}");
                e.into_save_error(THANKYOU_STEP_ID)
            })
    }

    /// Borra todas las respuestas, remotas y locales.
    pub async fn delete_all(&self) -> Result<(), FlowError> {
        let (research_id, participant_id) = self.identity();
        if let Some(participant_id) = &participant_id {
            self.api
                .delete_all_responses(&research_id, participant_id)
                .await
                .map_err(|e| e.into_save_error("*"))?;
        }
        self.write().reset(research_id, participant_id);
        Ok(())
    }

    pub fn snapshot(&self) -> ResponsesData {
        self.read().data.clone()
    }

    /// JSON legible con vistas por categoría y `all_steps`.
    pub fn export_json(&self) -> String {
        let value = self.read().data.to_export_value();
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
    }
}

impl<A: ResponseApi> AnswerLookup for ResponseStore<A> {
    fn has_response(&self, step_id: &str) -> bool {
        ResponseStore::has_response(self, step_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryResponseApi;
    use serde_json::json;

    fn store() -> ResponseStore<InMemoryResponseApi> {
        ResponseStore::new(Arc::new(InMemoryResponseApi::new()), "r1", Some("p1".into()), StoreConfig::default())
    }

    #[test]
    fn write_local_is_visible_before_any_network() {
        let s = store();
        s.write_local(StepRef { id: "q1",
                                step_type: "cognitive_short_text",
                                title: "Q1",
                                question_key: None },
                      Some(&AnswerValue::from("hola")));
        assert_eq!(s.get_answer("q1"), Some(json!("hola")));
        assert!(s.is_answered("q1", "cognitive_short_text"));
        assert!(s.is_answered("welcome", "welcome"));
        assert!(!s.is_answered("q2", "cognitive_short_text"));
        assert_eq!(s.get_answer("welcome"), None);
    }

    #[tokio::test]
    async fn hydrate_on_new_participant_is_empty_and_idempotent() {
        let s = store();
        assert_eq!(s.hydrate().await, Ok(0));
        assert_eq!(s.hydrate().await, Ok(0));
        assert!(s.is_hydrated());
        assert!(s.snapshot().all_steps().is_empty());
    }

    #[tokio::test]
    async fn hydrate_without_participant_fails() {
        let s = ResponseStore::new(Arc::new(InMemoryResponseApi::new()), "r1", None, StoreConfig::default());
        assert!(matches!(s.hydrate().await, Err(FlowError::Hydration(_))));
    }

    #[tokio::test]
    async fn identity_change_discards_local_state() {
        let s = store();
        s.save("q1", "cognitive_short_text", "Q1", Some(&AnswerValue::from("a"))).await.unwrap();
        s.set_identity("r1", "p2");
        assert!(s.snapshot().all_steps().is_empty());
        assert_eq!(s.identity(), ("r1".to_string(), Some("p2".to_string())));
    }
}
