//! Bundle detection entry points.
//!
//! Recognizers are tried in a fixed order and the first match wins. Not
//! recognizing any bundle is an ordinary `Ok(None)` outcome, distinct
//! from a source that fails to parse at all.

use tracing::{debug, info, warn};
use unweave_binder::{BinderState, BindingTable};
use unweave_common::{Diagnostic, DiagnosticCategory};
use unweave_parser::{NodeArena, NodeIndex, parse};

use crate::bundle::Bundle;
use crate::transform::TransformError;
use crate::{browserify, webpack};

#[derive(Debug)]
pub enum UnpackError {
    /// The input is not valid JavaScript.
    Parse(Vec<Diagnostic>),
    /// A recognized bundle's module could not be extracted.
    Extract(String),
    /// A module's reconstruction pipeline failed.
    Transform(TransformError),
}

impl From<TransformError> for UnpackError {
    fn from(error: TransformError) -> UnpackError {
        UnpackError::Transform(error)
    }
}

impl std::fmt::Display for UnpackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnpackError::Parse(diagnostics) => {
                write!(f, "parse failed with {} diagnostic(s)", diagnostics.len())?;
                if let Some(first) = diagnostics.first() {
                    write!(f, ": {first}")?;
                }
                Ok(())
            }
            UnpackError::Extract(message) => write!(f, "extraction failed: {message}"),
            UnpackError::Transform(error) => write!(f, "transform failed: {error}"),
        }
    }
}

impl std::error::Error for UnpackError {}

pub type Recognizer =
    fn(&NodeArena, NodeIndex, &BindingTable) -> Result<Option<Bundle>, UnpackError>;

pub fn recognizers() -> [(&'static str, Recognizer); 2] {
    [
        ("webpack", webpack::recognize),
        ("browserify", browserify::recognize),
    ]
}

/// Parse a source file and try each recognizer. `Ok(None)` means the
/// input parsed but matched no known bundle shape.
pub fn unpack(source: &str) -> Result<Option<Bundle>, UnpackError> {
    let (arena, root, diagnostics) = parse("bundle.js", source);
    if diagnostics
        .iter()
        .any(|d| d.category == DiagnosticCategory::Error)
    {
        return Err(UnpackError::Parse(diagnostics));
    }
    let table = BinderState::bind(&arena, root);
    for (name, recognize) in recognizers() {
        if let Some(bundle) = recognize(&arena, root, &table)? {
            info!(
                kind = name,
                modules = bundle.modules.len(),
                "bundle detected"
            );
            return Ok(Some(bundle));
        }
        debug!(kind = name, "recognizer did not match");
    }
    Ok(None)
}

/// Detect and fully reconstruct: every module runs the import/export and
/// inlining pipeline. Per-module failures are reported and flagged on
/// the module; they do not fail the bundle.
pub fn unpack_and_reconstruct(source: &str) -> Result<Option<Bundle>, UnpackError> {
    let Some(mut bundle) = unpack(source)? else {
        return Ok(None);
    };
    for (id, error) in bundle.reconstruct() {
        warn!(module = %id, %error, "module reconstruction failed");
    }
    Ok(Some(bundle))
}
