use std::sync::Arc;

use flow_core::{AnswerValue, FlowEvent, ParticipantFlowStep, RawModuleConfig};
use flow_responses::InMemoryResponseApi;
use participant_flow::{ConfigSource, FileSessionRepository, InMemorySessionRepository, JsonFileConfigSource,
                       ParticipantFlow, SessionRepository, StaticConfigSource, StoredSession, CONFIG};
use serde_json::json;

const DEMO_RESEARCH: &str = "demo-research";

/// Investigación de ejemplo cuando no se indica `--config-dir`.
fn demo_modules() -> Vec<RawModuleConfig> {
    vec![RawModuleConfig::new("welcome-screen", "WELCOME_SCREEN").with_title("Bienvenida al estudio")
                                                                 .with_meta("message", json!("Gracias por tu tiempo.")),
         RawModuleConfig::new("voc", "SMART_VOC_FORM").with_title("Experiencia")
                                                      .with_questions(vec![json!({"id": "csat", "type": "CSAT", "title": "Satisfacción"}),
                                                                           json!({"id": "nps", "type": "NPS", "title": "Recomendación"})]),
         RawModuleConfig::new("tasks", "COGNITIVE_TASK").with_title("Tareas")
                                                        .with_questions(vec![json!({"id": "opinion", "type": "LONG_TEXT", "title": "Opinión"})]),
         RawModuleConfig::new("thanks", "THANK_YOU_SCREEN").with_title("¡Listo!")]
}

async fn run<C: ConfigSource, S: SessionRepository>(mut flow: ParticipantFlow<C, InMemoryResponseApi, S>,
                                                    research_id: String,
                                                    participant_id: String) {
    flow.subscribe(Box::new(|ev: &FlowEvent| log::debug!("[evento #{}] {:?}", ev.seq, ev.kind)));
    flow.start().await;
    if flow.phase() == ParticipantFlowStep::Login {
        if let Err(e) = flow.handle_login_success(StoredSession::new(research_id, participant_id)).await {
            eprintln!("[participant-flow] {}", e.user_message());
            std::process::exit(3);
        }
    }
    if let Some(msg) = flow.error() {
        eprintln!("[participant-flow] {msg}");
        std::process::exit(3);
    }

    println!("pasos: {}", flow.steps().iter().map(|s| s.id.as_str()).collect::<Vec<_>>().join(" -> "));
    while let Some(step) = flow.current_step().cloned() {
        println!("[{}] {} ({})", flow.current_step_index(), step.name, step.step_type);
        let answer = match step.step_type.as_str() {
            "smartvoc_csat" | "smartvoc_nps" => Some(AnswerValue::map([("value", AnswerValue::from(8.0))])),
            t if t.starts_with("cognitive_") => Some(AnswerValue::from("Respuesta de ejemplo")),
            _ => None,
        };
        if flow.definition().last_index() == Some(flow.current_step_index()) {
            break;
        }
        flow.handle_step_complete(answer).await;
    }
    flow.flush_saves().await;

    let progress = flow.progress();
    println!("progreso: {}/{}", progress.completed_relevant, progress.total_relevant);
    if let Some(notice) = flow.notice() {
        println!("aviso: {}", notice.user_message());
    }
    println!("{}", flow.store().export_json());
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let mut config = CONFIG.clone();
    // CLI mínima: `participant-flow [--config-dir <DIR>] [--research <ID>] [--participant <ID>]`
    let args: Vec<String> = std::env::args().collect();
    let mut config_dir: Option<String> = None;
    let mut participant: Option<String> = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config-dir" => {
                i += 1;
                config_dir = args.get(i).cloned();
            }
            "--research" => {
                i += 1;
                config.research_id = args.get(i).cloned();
            }
            "--participant" => {
                i += 1;
                participant = args.get(i).cloned();
            }
            other => eprintln!("[participant-flow] argumento ignorado: {other}"),
        }
        i += 1;
    }

    let research_id = config.research_id.get_or_insert_with(|| DEMO_RESEARCH.to_string()).clone();
    let participant_id = participant.unwrap_or_else(|| format!("p-{}", uuid::Uuid::new_v4()));
    let api = Arc::new(InMemoryResponseApi::new());

    match (config_dir, config.session_file.clone()) {
        (Some(dir), Some(file)) => {
            let flow = ParticipantFlow::new(JsonFileConfigSource::new(dir), api, FileSessionRepository::new(file), &config);
            run(flow, research_id, participant_id).await;
        }
        (Some(dir), None) => {
            let flow = ParticipantFlow::new(JsonFileConfigSource::new(dir), api, InMemorySessionRepository::new(), &config);
            run(flow, research_id, participant_id).await;
        }
        (None, session_file) => {
            let source = StaticConfigSource::new().with_research(DEMO_RESEARCH, demo_modules());
            match session_file {
                Some(file) => {
                    let flow = ParticipantFlow::new(source, api, FileSessionRepository::new(file), &config);
                    run(flow, research_id, participant_id).await;
                }
                None => {
                    let flow = ParticipantFlow::new(source, api, InMemorySessionRepository::new(), &config);
                    run(flow, research_id, participant_id).await;
                }
            }
        }
    }
}
