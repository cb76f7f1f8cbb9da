//! Common types and utilities for the unweave bundle reconstructor.
//!
//! This crate provides foundational types used across all unweave crates:
//! - Diagnostics (`Diagnostic`, `DiagnosticCategory`)
//! - Centralized limits and thresholds

pub mod diagnostics;
pub use diagnostics::{Diagnostic, DiagnosticCategory};

pub mod limits;
