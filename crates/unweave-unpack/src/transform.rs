//! Transform pipeline runner.
//!
//! Passes mutate one module's tree in place and report how many changes
//! they made. The runner rebuilds the binding table after every changed
//! pass, repeats fixed-point passes until an iteration reports zero
//! changes, and aborts the remaining pipeline on the first pass error
//! without rolling back.

use tracing::{debug, warn};
use unweave_binder::{BindError, BinderState, BindingTable};
use unweave_common::Diagnostic;
use unweave_common::limits::MAX_FIXED_POINT_ITERATIONS;
use unweave_parser::{NodeArena, NodeIndex};

#[derive(Debug)]
pub enum TransformError {
    /// A rename precondition failed; the tree was left untouched but the
    /// module's reconstruction cannot continue.
    Bind(BindError),
    /// A pass gave up midway; the partial tree is unreliable.
    Aborted {
        pass: &'static str,
        message: String,
    },
}

impl From<BindError> for TransformError {
    fn from(error: BindError) -> TransformError {
        TransformError::Bind(error)
    }
}

impl std::fmt::Display for TransformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransformError::Bind(error) => write!(f, "{error}"),
            TransformError::Aborted { pass, message } => {
                write!(f, "pass '{pass}' aborted: {message}")
            }
        }
    }
}

impl std::error::Error for TransformError {}

/// Shared state threaded through a module's pipeline: the binding table
/// (an index over the tree, rebuilt after structural edits) and the
/// diagnostics accumulated by local skips.
pub struct TransformContext {
    pub table: BindingTable,
    pub diagnostics: Vec<Diagnostic>,
    implicit: Vec<String>,
}

impl TransformContext {
    /// Bind `root`, pre-declaring `implicit` names in the program scope
    /// (the renamed loader parameters of an extracted module).
    pub fn new(arena: &NodeArena, root: NodeIndex, implicit: &[&str]) -> TransformContext {
        let table = BinderState::bind_with_implicit(arena, root, implicit);
        TransformContext {
            table,
            diagnostics: Vec::new(),
            implicit: implicit.iter().map(|name| name.to_string()).collect(),
        }
    }

    /// Rebuild the binding table from the mutated tree.
    pub fn crawl(&mut self, arena: &NodeArena, root: NodeIndex) {
        let implicit: Vec<&str> = self.implicit.iter().map(String::as_str).collect();
        self.table = BinderState::bind_with_implicit(arena, root, &implicit);
    }
}

pub trait Transform {
    fn name(&self) -> &'static str;

    /// Fixed-point passes are re-run until an iteration makes no changes.
    fn fixed_point(&self) -> bool {
        false
    }

    /// Apply the pass, returning the number of changes made.
    fn run(
        &mut self,
        arena: &mut NodeArena,
        root: NodeIndex,
        ctx: &mut TransformContext,
    ) -> Result<usize, TransformError>;
}

/// Apply `passes` in order, returning the total change count. The first
/// pass error aborts the rest of the pipeline; the tree keeps whatever
/// state the failing pass left behind and the caller must treat it as
/// unreliable.
pub fn apply_transforms(
    arena: &mut NodeArena,
    root: NodeIndex,
    ctx: &mut TransformContext,
    passes: &mut [Box<dyn Transform>],
) -> Result<usize, TransformError> {
    let mut total = 0;
    for pass in passes.iter_mut() {
        if pass.fixed_point() {
            let mut iterations = 0;
            loop {
                let changes = pass.run(arena, root, ctx)?;
                total += changes;
                if changes == 0 {
                    break;
                }
                debug!(pass = pass.name(), changes, "fixed-point iteration");
                ctx.crawl(arena, root);
                iterations += 1;
                if iterations >= MAX_FIXED_POINT_ITERATIONS {
                    warn!(
                        pass = pass.name(),
                        iterations, "fixed point not reached before the iteration cap"
                    );
                    break;
                }
            }
        } else {
            let changes = pass.run(arena, root, ctx)?;
            debug!(pass = pass.name(), changes, "pass applied");
            total += changes;
            if changes > 0 {
                ctx.crawl(arena, root);
            }
        }
    }
    Ok(total)
}
