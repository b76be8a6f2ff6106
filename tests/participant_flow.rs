use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use flow_core::{AnswerValue, FlowError, FlowEvent, FlowEventKind, ModuleResponse, ParticipantFlowStep, RawModuleConfig};
use flow_responses::InMemoryResponseApi;
use participant_flow::{AppConfig, ConfigLoadError, ConfigSource, InMemorySessionRepository, ParticipantFlow,
                       SessionRepository, StaticConfigSource, StoredSession};
use serde_json::json;

const RESEARCH: &str = "r1";

type Flow = ParticipantFlow<StaticConfigSource, InMemoryResponseApi, InMemorySessionRepository>;

fn app_config() -> AppConfig {
    AppConfig { research_id: Some(RESEARCH.into()),
                ..AppConfig::default() }
}

/// Tres preguntas cognitivas: [welcome, q1, q2, q3, thankyou].
fn three_questions() -> StaticConfigSource {
    let module = RawModuleConfig::new("ct", "COGNITIVE_TASK").with_questions(vec![json!({"id": "q1", "type": "SHORT_TEXT"}),
                                                                                 json!({"id": "q2", "type": "LONG_TEXT"}),
                                                                                 json!({"id": "q3", "type": "RANKING"})]);
    StaticConfigSource::new().with_research(RESEARCH, vec![module])
}

fn answered(ids: &[&str]) -> Vec<ModuleResponse> {
    ids.iter()
       .map(|id| ModuleResponse::new(*id, "cognitive_short_text", *id, json!({"text": id}), Utc::now()))
       .collect()
}

fn flow_with(source: StaticConfigSource, api: Arc<InMemoryResponseApi>, sessions: InMemorySessionRepository) -> Flow {
    ParticipantFlow::new(source, api, sessions, &app_config())
}

struct BrokenConfigSource;

#[async_trait]
impl ConfigSource for BrokenConfigSource {
    async fn fetch_flow_config(&self, _research_id: &str) -> Result<Vec<RawModuleConfig>, ConfigLoadError> {
        Err(ConfigLoadError::Io(std::io::Error::other("backend caído")))
    }
}

#[tokio::test]
async fn fresh_participant_gets_minimal_sequence() {
    let api = Arc::new(InMemoryResponseApi::new());
    let mut flow = flow_with(StaticConfigSource::new(), api, InMemorySessionRepository::new());

    flow.start().await;
    assert_eq!(flow.phase(), ParticipantFlowStep::Login);
    assert!(flow.current_step().is_none());

    flow.handle_login_success(StoredSession::new(RESEARCH, "p1")).await.unwrap();

    let types: Vec<&str> = flow.steps().iter().map(|s| s.step_type.as_str()).collect();
    assert_eq!(types, ["welcome", "thankyou"]);
    assert_eq!(flow.current_step_index(), 0);
    assert_eq!(flow.phase(), ParticipantFlowStep::Welcome);
    assert!(!flow.is_loading());
    assert!(flow.notice().is_none());
}

#[tokio::test]
async fn mid_study_reload_resumes_after_last_answer() {
    let api = Arc::new(InMemoryResponseApi::new());
    api.seed(RESEARCH, "p1", answered(&["q1", "q2"]));
    let sessions = InMemorySessionRepository::with_session(StoredSession::new(RESEARCH, "p1"));
    let mut flow = flow_with(three_questions(), api, sessions);

    flow.start().await;

    assert_eq!(flow.steps().len(), 5);
    assert_eq!(flow.current_step_index(), 3);
    assert_eq!(flow.max_visited_index(), 2);
    let view = flow.view();
    let navigable: Vec<bool> = view.steps.iter().map(|s| s.navigable).collect();
    assert_eq!(navigable, [true, true, true, true, false]);
    assert!(view.show_side_navigation);

    assert!(!flow.navigate_to_step(4));
    assert_eq!(flow.current_step_index(), 3);
    assert!(flow.navigate_to_step(1));
    assert_eq!(flow.get_step_response("q1"), Some(json!({"text": "q1"})));

    // Volver al paso de reanudación sin re-enviar los anteriores.
    assert!(flow.navigate_to_step(3));
    assert_eq!(flow.current_step_index(), 3);
    assert!(!flow.navigate_to_step(4));
    assert_eq!(flow.max_visited_index(), 2);
}

#[tokio::test]
async fn resume_lands_on_first_unanswered_step_for_every_prefix() {
    let ids = ["q1", "q2", "q3"];
    for k in 1..=ids.len() {
        let api = Arc::new(InMemoryResponseApi::new());
        api.seed(RESEARCH, "p1", answered(&ids[..k]));
        let sessions = InMemorySessionRepository::with_session(StoredSession::new(RESEARCH, "p1"));
        let mut flow = flow_with(three_questions(), api, sessions);
        flow.start().await;
        assert_eq!(flow.current_step_index(), k + 1, "prefijo {k}");
        assert_eq!(flow.max_visited_index(), k, "prefijo {k}");
    }
}

#[tokio::test]
async fn missing_research_id_is_fatal() {
    let mut flow: Flow = ParticipantFlow::new(StaticConfigSource::new(),
                                              Arc::new(InMemoryResponseApi::new()),
                                              InMemorySessionRepository::new(),
                                              &AppConfig::default());
    flow.start().await;

    assert_eq!(flow.phase(), ParticipantFlowStep::Error);
    let message = flow.error().unwrap();
    assert!(!message.contains("researchId"));
    assert!(flow.current_step().is_none());
    assert!(!flow.view().show_side_navigation);
    // Terminal: los eventos posteriores no mueven la sesión.
    assert!(!flow.navigate_to_step(0));
    assert_eq!(flow.phase(), ParticipantFlowStep::Error);
}

#[tokio::test]
async fn config_failure_degrades_to_minimal_sequence() {
    let sessions = InMemorySessionRepository::with_session(StoredSession::new(RESEARCH, "p1"));
    let mut flow = ParticipantFlow::new(BrokenConfigSource,
                                        Arc::new(InMemoryResponseApi::new()),
                                        sessions,
                                        &app_config());
    flow.start().await;

    assert_eq!(flow.steps().len(), 2);
    assert_eq!(flow.phase(), ParticipantFlowStep::Welcome);
    assert!(matches!(flow.notice(), Some(FlowError::ConfigLoad(_))));
    assert!(flow.events().iter().any(|e| matches!(e.kind, FlowEventKind::ConfigDegraded { .. })));
}

#[tokio::test]
async fn hydration_failure_proceeds_with_empty_responses() {
    let api = Arc::new(InMemoryResponseApi::new());
    api.seed(RESEARCH, "p1", answered(&["q1"]));
    api.fail_next_reads(1);
    let sessions = InMemorySessionRepository::with_session(StoredSession::new(RESEARCH, "p1"));
    let mut flow = flow_with(three_questions(), api, sessions);

    flow.start().await;

    assert_eq!(flow.phase(), ParticipantFlowStep::Welcome);
    assert_eq!(flow.current_step_index(), 0);
    assert!(matches!(flow.notice(), Some(FlowError::Hydration(_))));
}

#[tokio::test]
async fn failed_save_does_not_roll_back_navigation() {
    let api = Arc::new(InMemoryResponseApi::new());
    let mut flow = flow_with(three_questions(), api.clone(), InMemorySessionRepository::new());
    flow.start().await;
    flow.handle_login_success(StoredSession::new(RESEARCH, "p1")).await.unwrap();

    api.fail_next_saves(1);
    flow.handle_step_complete(None).await;
    flow.handle_step_complete(Some(AnswerValue::from("hola"))).await;
    flow.flush_saves().await;

    assert_eq!(flow.current_step_index(), 2);
    assert_eq!(flow.get_step_response("q1"), Some(json!("hola")));
    assert!(matches!(flow.notice(), Some(FlowError::Save { step_id, .. }) if step_id == "q1"));
    assert!(flow.view().notice.is_some());
    assert!(flow.events().iter().any(|e| matches!(&e.kind, FlowEventKind::SaveFailed { step_id, .. } if step_id == "q1")));
    assert!(api.documents(RESEARCH, "p1").is_empty());
}

#[tokio::test]
async fn rapid_double_submit_keeps_one_document() {
    let api = Arc::new(InMemoryResponseApi::new());
    let mut flow = flow_with(three_questions(), api.clone(), InMemorySessionRepository::new());
    flow.start().await;
    flow.handle_login_success(StoredSession::new(RESEARCH, "p1")).await.unwrap();
    flow.handle_step_complete(None).await;

    flow.handle_step_complete(Some(AnswerValue::from("a"))).await;
    assert!(flow.navigate_to_step(1));
    flow.handle_step_complete(Some(AnswerValue::from("b"))).await;
    flow.flush_saves().await;

    let docs = api.documents(RESEARCH, "p1");
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].response, json!("b"));
    assert_eq!(flow.store().snapshot().all_steps().len(), 1);
}

#[tokio::test]
async fn login_as_other_participant_clears_previous_session() {
    let api = Arc::new(InMemoryResponseApi::new());
    api.seed(RESEARCH, "old", answered(&["q1", "q2"]));
    let sessions = InMemorySessionRepository::with_session(StoredSession::new(RESEARCH, "old"));
    let mut flow = flow_with(three_questions(), api, sessions);
    flow.start().await;
    assert_eq!(flow.current_step_index(), 3);

    flow.handle_login_success(StoredSession::new(RESEARCH, "new")).await.unwrap();

    let stored = flow.session_repository().load().unwrap().unwrap();
    assert_eq!(stored.participant_id, "new");
    assert_eq!(flow.store().identity().1.as_deref(), Some("new"));
    assert!(flow.store().snapshot().all_steps().is_empty());
    assert_eq!(flow.get_step_response("q1"), None);
}

#[tokio::test]
async fn reaching_thankyou_stamps_end_time_once() {
    let api = Arc::new(InMemoryResponseApi::new());
    let mut flow = flow_with(three_questions(), api.clone(), InMemorySessionRepository::new());
    flow.start().await;
    flow.handle_login_success(StoredSession::new(RESEARCH, "p1")).await.unwrap();

    flow.handle_step_complete(None).await;
    for answer in ["a", "b", "c"] {
        flow.handle_step_complete(Some(AnswerValue::from(answer))).await;
    }
    flow.flush_saves().await;
    assert_eq!(flow.phase(), ParticipantFlowStep::Done);
    let end_time = flow.store().snapshot().end_time;
    assert!(end_time.is_some());
    assert!(api.is_completed(RESEARCH, "p1"));

    // Volver atrás y completar de nuevo no re-fija end_time.
    assert!(flow.navigate_to_step(3));
    flow.handle_step_complete(Some(AnswerValue::from("c2"))).await;
    flow.flush_saves().await;
    assert_eq!(flow.store().snapshot().end_time, end_time);
    let finished = flow.events().iter().filter(|e| e.kind == FlowEventKind::FlowFinished).count();
    assert_eq!(finished, 1);
    assert_eq!(flow.progress().completed_relevant, 3);
}

#[tokio::test]
async fn reset_session_returns_to_login_and_clears_everything() {
    let api = Arc::new(InMemoryResponseApi::new());
    let mut flow = flow_with(three_questions(), api.clone(), InMemorySessionRepository::new());
    flow.start().await;
    flow.handle_login_success(StoredSession::new(RESEARCH, "p1")).await.unwrap();
    flow.handle_step_complete(None).await;
    flow.handle_step_complete(Some(AnswerValue::from("a"))).await;

    flow.reset_session().await;

    assert_eq!(flow.phase(), ParticipantFlowStep::Login);
    assert_eq!(flow.current_step_index(), 0);
    assert!(flow.session_repository().load().unwrap().is_none());
    assert!(api.documents(RESEARCH, "p1").is_empty());
    assert!(flow.store().snapshot().all_steps().is_empty());
}

#[tokio::test]
async fn observers_receive_every_recorded_event() {
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    let mut flow = flow_with(three_questions(), Arc::new(InMemoryResponseApi::new()), InMemorySessionRepository::new());
    flow.subscribe(Box::new(move |_: &FlowEvent| {
                       counter.fetch_add(1, Ordering::SeqCst);
                   }));

    flow.start().await;
    flow.handle_login_success(StoredSession::new(RESEARCH, "p1")).await.unwrap();

    assert_eq!(seen.load(Ordering::SeqCst), flow.events().len());
    assert!(matches!(flow.events()[0].kind, FlowEventKind::StepsCompiled { step_count: 5, .. }));
}
