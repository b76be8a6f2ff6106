//! Modelos neutrales del flujo (configuración cruda, pasos compilados,
//! respuestas).

pub mod definition;
pub mod module_config;
pub mod response;
pub mod step;

pub use definition::FlowDefinition;
pub use module_config::{ModuleKind, QuestionDef, RawModuleConfig};
pub use response::{response_category, CategorizedResponses, ModuleResponse, ResponsesData};
pub use step::{Step, StepCategory};
