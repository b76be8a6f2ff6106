//! flow-responses: store de respuestas del participante y contrato del
//! backend remoto (`ResponseApi`).

pub mod api;
pub mod config;
pub mod error;
pub mod memory;
pub mod store;

pub use api::{RemoteId, ResponseApi, SaveRequest};
pub use config::StoreConfig;
pub use error::ResponseApiError;
pub use memory::InMemoryResponseApi;
pub use store::{PendingSave, ResponseStore, StepRef};
