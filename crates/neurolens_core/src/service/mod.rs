//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into check-in level APIs.
//! - Keep FFI/UI layers decoupled from storage details.

pub mod daily_log_service;
