//! Flutter bridge for the NeuroLens check-in core.

pub mod api;
