//! # tokobot-providers
//!
//! AI provider implementations for tokobot.

pub mod gemini;

pub use gemini::GeminiProvider;
