//! Check-in domain model.
//!
//! # Responsibility
//! - Define the committed daily log and the in-progress draft shapes.
//! - Keep rating bounds and date-key rules next to the data they guard.
//!
//! # Invariants
//! - Every committed log is identified by a stable `LogId`.
//! - A draft never carries an id; it only becomes a log through `save`.

pub mod daily_log;
pub mod draft;
