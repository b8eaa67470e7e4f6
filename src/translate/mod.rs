//! Machine-translation client
//!
//! A retryable full-context translate call against the cloud translation
//! API, with directional glossary selection and a glossary-miss fallback.

mod client;
mod glossary;

pub use client::{CloudTranslator, TranslateError, TranslationRequest, Translator};
pub use glossary::glossary_for;
