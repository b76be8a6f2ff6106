//! `ResponseApi` en memoria, con paridad de comportamiento con el backend
//! remoto: un documento por creación, actualización por id de documento.
//!
//! Incluye ganchos para tests: fallos inyectados, pausa de guardados y de
//! lecturas, y contadores de creaciones/actualizaciones.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use flow_core::ModuleResponse;
use log::debug;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use crate::api::{RemoteId, ResponseApi, SaveRequest};
use crate::error::ResponseApiError;

type SessionKey = (String, String);

#[derive(Debug, Default)]
struct MemoryState {
    documents: HashMap<SessionKey, Vec<ModuleResponse>>,
    completed: HashSet<SessionKey>,
    next_id: u64,
    creates: usize,
    updates: usize,
    failing_saves: usize,
    failing_reads: usize,
}

#[derive(Debug, Default)]
pub struct InMemoryResponseApi {
    state: Mutex<MemoryState>,
    /// Los guardados toman un read-lock; `pause_saves` toma el write-lock.
    save_gate: Arc<RwLock<()>>,
    /// Igual para lecturas: la foto se toma antes de esperar la compuerta.
    read_gate: Arc<RwLock<()>>,
}

/// Mientras exista, las operaciones de la compuerta tomada quedan retenidas.
pub struct Paused(#[allow(dead_code)] OwnedRwLockWriteGuard<()>);

impl InMemoryResponseApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pre-carga respuestas de un participante (sesión previa).
    pub fn seed(&self, research_id: &str, participant_id: &str, responses: Vec<ModuleResponse>) {
        let mut st = self.lock();
        for mut r in responses {
            st.next_id += 1;
            r.remote_id = Some(format!("doc-{}", st.next_id));
            st.documents.entry((research_id.into(), participant_id.into())).or_default().push(r);
        }
    }

    /// Los próximos `n` guardados fallan con error de transporte.
    pub fn fail_next_saves(&self, n: usize) {
        self.lock().failing_saves = n;
    }

    pub fn fail_next_reads(&self, n: usize) {
        self.lock().failing_reads = n;
    }

    pub async fn pause_saves(&self) -> Paused {
        Paused(self.save_gate.clone().write_owned().await)
    }

    /// Las lecturas en curso devuelven lo que había al empezar, aunque un
    /// guardado termine mientras están retenidas (respuesta lenta del backend).
    pub async fn pause_reads(&self) -> Paused {
        Paused(self.read_gate.clone().write_owned().await)
    }

    pub fn creates(&self) -> usize {
        self.lock().creates
    }

    pub fn updates(&self) -> usize {
        self.lock().updates
    }

    pub fn is_completed(&self, research_id: &str, participant_id: &str) -> bool {
        self.lock().completed.contains(&(research_id.to_string(), participant_id.to_string()))
    }

    pub fn documents(&self, research_id: &str, participant_id: &str) -> Vec<ModuleResponse> {
        self.lock()
            .documents
            .get(&(research_id.to_string(), participant_id.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ResponseApi for InMemoryResponseApi {
    async fn get_responses(&self, research_id: &str, participant_id: &str) -> Result<Vec<ModuleResponse>, ResponseApiError> {
        let snapshot = {
            let mut st = self.lock();
            if st.failing_reads > 0 {
                st.failing_reads -= 1;
                return Err(ResponseApiError::Transport("simulated read failure".into()));
            }
            st.documents.get(&(research_id.to_string(), participant_id.to_string())).cloned()
        };
        let _gate = self.read_gate.read().await;
        snapshot.ok_or(ResponseApiError::NotFound)
    }

    async fn save_or_update_response(&self, request: SaveRequest) -> Result<RemoteId, ResponseApiError> {
        let _gate = self.save_gate.read().await;
        let mut st = self.lock();
        if st.failing_saves > 0 {
            st.failing_saves -= 1;
            return Err(ResponseApiError::Transport("simulated save failure".into()));
        }
        let now = Utc::now();
        let key = (request.research_id.clone(), request.participant_id.clone());
        if let Some(remote_id) = &request.existing_remote_id {
            let existing = st.documents
                             .get_mut(&key)
                             .and_then(|docs| docs.iter_mut().find(|d| d.remote_id.as_ref() == Some(remote_id)));
            if let Some(doc) = existing {
                doc.response = request.answer;
                doc.step_type = request.step_type;
                doc.step_title = request.step_title;
                doc.updated_at = now;
                st.updates += 1;
                debug!("memoria: update {remote_id} step={}", request.step_id);
                return Ok(remote_id.clone());
            }
        }
        st.next_id += 1;
        let remote_id = format!("doc-{}", st.next_id);
        let mut doc = ModuleResponse::new(request.step_id, request.step_type, request.step_title, request.answer, now);
        doc.question_key = request.question_key;
        doc.remote_id = Some(remote_id.clone());
        st.documents.entry(key).or_default().push(doc);
        st.creates += 1;
        debug!("memoria: create {remote_id}");
        Ok(remote_id)
    }

    async fn delete_all_responses(&self, research_id: &str, participant_id: &str) -> Result<(), ResponseApiError> {
        let key = (research_id.to_string(), participant_id.to_string());
        let mut st = self.lock();
        st.documents.remove(&key);
        st.completed.remove(&key);
        Ok(())
    }

    async fn mark_completed(&self, research_id: &str, participant_id: &str) -> Result<(), ResponseApiError> {
        self.lock().completed.insert((research_id.to_string(), participant_id.to_string()));
        Ok(())
    }
}
