pub mod ai_backend;
pub mod command;
pub mod constants;
pub mod cors;
pub mod error;
pub mod prompt;
pub mod server;
pub mod service;
pub mod settings;

pub use ai_backend::AiBackend;
pub use command::{FormulaRelay, FormulaRelayArgs};
pub use cors::CorsPolicy;
pub use error::{BackendError, FormulaError};
pub use service::{FormulaRequest, FormulaRequestService, FormulaResponse, InvocationPolicy};
pub use settings::Settings;
