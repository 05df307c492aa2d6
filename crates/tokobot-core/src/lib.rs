//! # tokobot-core
//!
//! Core types, seam traits, configuration, and error handling shared by the
//! tokobot crates.

pub mod config;
pub mod error;
pub mod message;
pub mod traits;

pub use config::shellexpand;
