//! Orquestador del flujo del participante.
//! Se encarga de:
//! - Resolver la identidad (repositorio de sesión) y cargar la configuración
//!   de la investigación.
//! - Compilar la secuencia de pasos e hidratar las respuestas previas antes
//!   de calcular la posición de reanudación.
//! - Aplicar escrituras optimistas al completar un paso y persistirlas en
//!   segundo plano, sin revertir la navegación si el guardado falla.
//! - Registrar cada hecho relevante en un log de eventos por sesión y
//!   notificar a los observadores.
use std::sync::Arc;

use flow_core::constants::THANKYOU_STEP_ID;
use flow_core::{compile, AnswerValue, CompileOptions, EventStore, FlowDefinition, FlowError, FlowEvent, FlowEventKind,
                InMemoryEventStore, NavigationController, NavigationEvent, ParticipantFlowStep, Progress, RawModuleConfig,
                Step, Transition};
use flow_responses::{RemoteId, ResponseApi, ResponseStore, StoreConfig};
use log::{debug, error, warn};
use serde_json::Value;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::view::{FlowView, StepSummary};
use crate::config::AppConfig;
use crate::config_source::ConfigSource;
use crate::errors::ConfigLoadError;
use crate::session::{SessionRepository, StoredSession};

/// Callback de la capa de presentación; recibe cada evento registrado.
pub type FlowObserver = Box<dyn Fn(&FlowEvent) + Send + Sync>;

/// Resultado de una tarea en segundo plano, reportado por canal.
#[derive(Debug)]
enum BackgroundOutcome {
    Saved { step_id: String, result: Result<RemoteId, FlowError> },
    Completion(Result<(), FlowError>),
}

pub struct ParticipantFlow<C: ConfigSource, A: ResponseApi, S: SessionRepository> {
    config_source: C,
    sessions: S,
    store: ResponseStore<A>,
    options: CompileOptions,
    default_research_id: Option<String>,
    /// Investigación para la que se compiló `definition`.
    compiled_for: Option<String>,
    definition: FlowDefinition,
    nav: NavigationController,
    loading: bool,
    /// Último problema no bloqueante.
    notice: Option<FlowError>,
    session_id: Uuid,
    events: InMemoryEventStore,
    observers: Vec<FlowObserver>,
    background: Vec<JoinHandle<()>>,
    outcomes_tx: UnboundedSender<BackgroundOutcome>,
    outcomes_rx: UnboundedReceiver<BackgroundOutcome>,
}

impl<C: ConfigSource, A: ResponseApi, S: SessionRepository> ParticipantFlow<C, A, S> {
    pub fn new(config_source: C, api: Arc<A>, sessions: S, config: &AppConfig) -> Self {
        Self::with_store_config(config_source, api, sessions, config, config.store.clone())
    }

    pub fn with_store_config(config_source: C, api: Arc<A>, sessions: S, config: &AppConfig, store: StoreConfig) -> Self {
        let research_id = config.research_id.clone().unwrap_or_default();
        let (outcomes_tx, outcomes_rx) = unbounded_channel();
        Self { config_source,
               sessions,
               store: ResponseStore::new(api, research_id, None, store),
               options: config.compile_options(),
               default_research_id: config.research_id.clone(),
               compiled_for: None,
               definition: FlowDefinition::new(Vec::new()),
               nav: NavigationController::new(),
               loading: false,
               notice: None,
               session_id: Uuid::new_v4(),
               events: InMemoryEventStore::default(),
               observers: Vec::new(),
               background: Vec::new(),
               outcomes_tx,
               outcomes_rx }
    }

    pub fn subscribe(&mut self, observer: FlowObserver) {
        self.observers.push(observer);
    }

    fn record(&mut self, kind: FlowEventKind) {
        let event = self.events.append_kind(self.session_id, kind);
        for observer in &self.observers {
            observer(&event);
        }
    }

    /// Aplica un evento de navegación y registra el efecto observable.
    fn drive(&mut self, event: NavigationEvent) -> Transition {
        let before = self.nav.state();
        let transition = self.nav.apply(event, &self.definition, &self.store);
        match &transition {
            Transition::Moved { from, to } => self.record(FlowEventKind::Navigated { from: *from, to: *to }),
            Transition::Completed { last } => self.record(FlowEventKind::Navigated { from: before.current_step_index,
                                                                                     to: *last }),
            Transition::Resumed { current, max_visited } => {
                self.record(FlowEventKind::SessionResumed { current: *current,
                                                            max_visited: *max_visited })
            }
            Transition::Blocked { target } => self.record(FlowEventKind::NavigationBlocked { target: *target }),
            Transition::Ignored | Transition::Phase { .. } => {}
        }
        let after = self.nav.phase();
        if after != before.phase {
            self.record(FlowEventKind::PhaseChanged { from: before.phase,
                                                      to: after });
        }
        transition
    }

    fn fail(&mut self, err: FlowError) {
        error!("sesión fatal: {err}");
        self.drive(NavigationEvent::Fatal { message: err.user_message().to_string() });
    }

    /// Arranque: sesión persistida -> configuración -> compilación ->
    /// hidratación -> reanudación. Sin investigación resoluble la sesión
    /// pasa a `Error`.
    pub async fn start(&mut self) {
        self.loading = true;
        self.drain_outcomes();
        let stored = match self.sessions.load() {
            Ok(s) => s,
            Err(e) => {
                warn!("no se pudo leer la sesión persistida: {e}");
                None
            }
        };
        let research_id = stored.as_ref()
                                .map(|s| s.research_id.clone())
                                .filter(|r| !r.is_empty())
                                .or_else(|| self.default_research_id.clone());
        let Some(research_id) = research_id else {
            self.fail(FlowError::FatalSession("no hay researchId en la sesión ni en la configuración".into()));
            self.loading = false;
            return;
        };

        self.load_definition(&research_id).await;
        match stored {
            Some(session) if !session.participant_id.is_empty() => {
                self.store.set_identity(&research_id, &session.participant_id);
                self.drive(NavigationEvent::SessionChecked { has_identity: true });
                self.hydrate_and_resume().await;
            }
            _ => {
                self.drive(NavigationEvent::SessionChecked { has_identity: false });
            }
        }
        self.loading = false;
    }

    /// Carga y compila la configuración. Un fallo degrada a la secuencia
    /// mínima (bienvenida + agradecimiento) y queda como aviso.
    async fn load_definition(&mut self, research_id: &str) {
        if self.compiled_for.as_deref() == Some(research_id) {
            return;
        }
        let modules: Vec<RawModuleConfig> = match self.config_source.fetch_flow_config(research_id).await {
            Ok(modules) => modules,
            Err(ConfigLoadError::NotFound(_)) => {
                debug!("investigación {research_id} sin configuración; secuencia mínima");
                Vec::new()
            }
            Err(e) => {
                warn!("configuración de {research_id} no disponible: {e}");
                self.record(FlowEventKind::ConfigDegraded { reason: e.to_string() });
                self.notice = Some(e.into());
                Vec::new()
            }
        };
        self.definition = compile(&modules, &self.options);
        self.compiled_for = Some(research_id.to_string());
        self.record(FlowEventKind::StepsCompiled { definition_hash: self.definition.definition_hash.clone(),
                                                   step_count: self.definition.len() });
    }

    /// La posición de reanudación se calcula sólo cuando la hidratación
    /// terminó, con éxito o no.
    async fn hydrate_and_resume(&mut self) {
        match self.store.hydrate().await {
            Ok(restored) => self.record(FlowEventKind::ResponsesHydrated { restored }),
            Err(e) => {
                warn!("se continúa con las respuestas locales: {e}");
                self.record(FlowEventKind::HydrationFailed { reason: e.to_string() });
                self.notice = Some(e);
            }
        }
        self.drive(NavigationEvent::ResponsesHydrated);
    }

    /// Login exitoso. Si la sesión guardada pertenece a otro participante de
    /// la misma investigación se descarta antes de guardar la nueva.
    pub async fn handle_login_success(&mut self, mut identity: StoredSession) -> Result<(), FlowError> {
        self.loading = true;
        if identity.research_id.is_empty() {
            identity.research_id = self.compiled_for.clone().or_else(|| self.default_research_id.clone()).unwrap_or_default();
        }
        if identity.research_id.is_empty() || identity.participant_id.is_empty() {
            let err = FlowError::FatalSession("login sin researchId o participantId".into());
            self.fail(err.clone());
            self.loading = false;
            return Err(err);
        }

        match self.sessions.load() {
            Ok(Some(previous)) if previous.is_other_participant_of(&identity) => {
                debug!("login de otro participante en {}; se limpia la sesión previa", identity.research_id);
                if let Err(e) = self.sessions.clear() {
                    warn!("no se pudo limpiar la sesión previa: {e}");
                }
            }
            Ok(_) => {}
            Err(e) => warn!("no se pudo leer la sesión persistida: {e}"),
        }
        if let Err(e) = self.sessions.save(&identity) {
            warn!("no se pudo persistir la sesión: {e}");
        }

        self.flush_saves().await;
        self.store.set_identity(&identity.research_id, &identity.participant_id);
        self.load_definition(&identity.research_id).await;
        if !matches!(self.nav.phase(), ParticipantFlowStep::Login | ParticipantFlowStep::LoadingSession) {
            // re-login sobre una sesión en curso: la posición se recalcula desde cero
            self.drive(NavigationEvent::Reset);
        }
        self.drive(NavigationEvent::LoginSucceeded);
        self.hydrate_and_resume().await;
        self.loading = false;
        Ok(())
    }

    /// Completa el paso actual: escritura local inmediata, guardado en
    /// segundo plano y avance. Debe llamarse dentro de un runtime tokio.
    pub async fn handle_step_complete(&mut self, answer: Option<AnswerValue>) -> Transition {
        self.drain_outcomes();
        if !self.nav.phase().is_in_sequence() {
            return Transition::Ignored;
        }
        let index = self.nav.current_step_index();
        let Some(step) = self.definition.get(index).cloned() else { return Transition::Ignored };
        if self.definition.last_index() == Some(index) {
            return Transition::Ignored;
        }

        if !step.is_answerless() {
            let pending = self.store.write_local(&step, answer.as_ref());
            let store = self.store.clone();
            let tx = self.outcomes_tx.clone();
            let step_id = step.id.clone();
            self.background.push(tokio::spawn(async move {
                                     let result = store.persist(pending).await;
                                     let _ = tx.send(BackgroundOutcome::Saved { step_id, result });
                                 }));
        }
        self.record(FlowEventKind::StepCompleted { step_index: index,
                                                   step_id: step.id.clone() });

        let transition = self.drive(NavigationEvent::StepCompleted { index });
        if let Transition::Completed { .. } = transition {
            self.finish();
        }
        transition
    }

    /// Llegada al agradecimiento: `end_time` se fija una sola vez y la
    /// sesión se marca completada en el backend.
    fn finish(&mut self) {
        if !self.store.mark_end_time() {
            return;
        }
        self.record(FlowEventKind::FlowFinished);
        let store = self.store.clone();
        let tx = self.outcomes_tx.clone();
        self.background.push(tokio::spawn(async move {
                                 let result = store.mark_completed().await;
                                 let _ = tx.send(BackgroundOutcome::Completion(result));
                             }));
    }

    /// Salto desde la navegación lateral. Devuelve `true` si el paso actual
    /// es `target` después del intento; un salto bloqueado no es un error.
    pub fn navigate_to_step(&mut self, target: usize) -> bool {
        self.drain_outcomes();
        self.drive(NavigationEvent::JumpRequested { target });
        self.nav.phase().is_in_sequence() && self.nav.current_step_index() == target
    }

    /// Acepta tanto el `question_key` como el id del paso.
    pub fn get_step_response(&self, key: &str) -> Option<Value> {
        self.store.get_answer(key)
    }

    pub fn current_step(&self) -> Option<&Step> {
        if !self.nav.phase().is_in_sequence() {
            return None;
        }
        self.definition.get(self.nav.current_step_index())
    }

    pub fn steps(&self) -> &[Step] {
        &self.definition.steps
    }

    pub fn definition(&self) -> &FlowDefinition {
        &self.definition
    }

    pub fn current_step_index(&self) -> usize {
        self.nav.current_step_index()
    }

    pub fn max_visited_index(&self) -> usize {
        self.nav.max_visited_index()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Mensaje legible de la pantalla de error.
    pub fn error(&self) -> Option<&str> {
        self.nav.error()
    }

    pub fn notice(&self) -> Option<&FlowError> {
        self.notice.as_ref()
    }

    pub fn phase(&self) -> ParticipantFlowStep {
        self.nav.phase()
    }

    pub fn progress(&self) -> Progress {
        self.nav.progress(&self.definition, &self.store)
    }

    pub fn store(&self) -> &ResponseStore<A> {
        &self.store
    }

    pub fn session_repository(&self) -> &S {
        &self.sessions
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn view(&self) -> FlowView {
        let state = self.nav.state();
        let steps = self.definition
                        .steps
                        .iter()
                        .enumerate()
                        .map(|(index, step)| StepSummary { index,
                                                           id: step.id.clone(),
                                                           name: step.name.clone(),
                                                           step_type: step.step_type.clone(),
                                                           answered: self.store.has_response(&step.id),
                                                           navigable: self.nav.can_navigate_to(index, &self.definition, &self.store),
                                                           current: state.phase.is_in_sequence()
                                                                    && index == state.current_step_index })
                        .collect();
        let current_step = self.current_step().cloned();
        let current_answer = current_step.as_ref().and_then(|s| self.store.get_answer(&s.id));
        FlowView { phase: state.phase,
                   is_loading: self.loading,
                   error: self.nav.error().map(str::to_string),
                   notice: self.notice.as_ref().map(|n| n.user_message().to_string()),
                   current_step_index: state.current_step_index,
                   max_visited_index: state.max_visited_index,
                   current_step,
                   current_answer,
                   steps,
                   show_side_navigation: state.phase.shows_side_navigation(),
                   progress: self.progress() }
    }

    /// Recoge resultados de guardados terminados sin esperar a los demás.
    fn drain_outcomes(&mut self) {
        while let Ok(outcome) = self.outcomes_rx.try_recv() {
            self.apply_outcome(outcome);
        }
        self.background.retain(|h| !h.is_finished());
    }

    fn apply_outcome(&mut self, outcome: BackgroundOutcome) {
        match outcome {
            BackgroundOutcome::Saved { step_id, result: Ok(remote_id) } => {
                self.record(FlowEventKind::ResponseSaved { step_id, remote_id })
            }
            BackgroundOutcome::Saved { step_id, result: Err(e) } => {
                self.record(FlowEventKind::SaveFailed { step_id,
                                                        reason: e.to_string() });
                self.notice = Some(e);
            }
            BackgroundOutcome::Completion(Ok(())) => debug!("sesión marcada como completada"),
            BackgroundOutcome::Completion(Err(e)) => {
                self.record(FlowEventKind::SaveFailed { step_id: THANKYOU_STEP_ID.into(),
                                                        reason: e.to_string() });
                self.notice = Some(e);
            }
        }
    }

    /// Espera a que terminen todos los guardados en curso.
    pub async fn flush_saves(&mut self) {
        for handle in std::mem::take(&mut self.background) {
            if let Err(e) = handle.await {
                error!("tarea de guardado abortada: {e}");
            }
        }
        self.drain_outcomes();
    }

    /// Borra respuestas y sesión persistida y vuelve al login.
    pub async fn reset_session(&mut self) {
        self.flush_saves().await;
        if let Err(e) = self.store.delete_all().await {
            warn!("no se pudieron borrar las respuestas remotas: {e}");
        }
        if let Err(e) = self.sessions.clear() {
            warn!("no se pudo limpiar la sesión persistida: {e}");
        }
        self.notice = None;
        self.drive(NavigationEvent::Reset);
        self.record(FlowEventKind::SessionReset);
        if self.compiled_for.is_some() {
            self.drive(NavigationEvent::SessionChecked { has_identity: false });
        }
    }

    /// Log de eventos de esta sesión, en orden.
    pub fn events(&self) -> Vec<FlowEvent> {
        self.events.list(self.session_id)
    }
}
