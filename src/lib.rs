pub mod asr;
pub mod config;
pub mod events;
pub mod http;
pub mod pipeline;
pub mod rules;
pub mod session;
pub mod store;
pub mod translate;

pub use config::Config;
pub use events::{AudioPayload, ClientEvent, ServerEvent};
pub use http::{create_router, AppState};
pub use pipeline::TranslationPipeline;
pub use rules::{Decision, DecisionReason, RulesEngine, TranscriptUpdate, Trigger};
pub use session::{ModeConfig, SessionCoordinator, SessionHandle};
pub use store::{TranslationLog, TranslationRecord, UsageTracker};
pub use translate::{TranslateError, TranslationRequest, Translator};
