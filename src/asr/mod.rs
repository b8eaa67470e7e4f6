//! Streaming speech recognition
//!
//! This path is used only when a session ingests raw audio; clients that
//! transcribe in the browser bypass it entirely. It manages:
//! - The provider stream lifecycle, including the proactive restart ahead
//!   of the provider's hard duration limit
//! - Audio buffering across the restart gap
//! - Fault classification and ordered recovery
//! - Write-path validation (chunk size, rate limit, wire format)

mod backend;
mod cloud;
mod controller;

pub use backend::{
    AsrFault, FaultClass, SpeechBackend, SpeechStream, StreamConfig, StreamEvent,
};
pub use cloud::CloudSpeechBackend;
pub use controller::{AsrSessionController, FaultDisposition, WriteRejection, MAX_RESTART_ATTEMPTS};
