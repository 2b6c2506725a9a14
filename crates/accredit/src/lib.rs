//! Core library for the institution eligibility platform: document intake
//! and analysis, registry corroboration, eligibility decisions, appeals,
//! and the audit trail behind all of them.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod verification;
