//! The recovered module graph and the per-module reconstruction driver.

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};
use unweave_binder::BinderState;
use unweave_common::Diagnostic;
use unweave_emitter::emit;
use unweave_parser::{NodeArena, NodeIndex, NodeKind};

use crate::detect::UnpackError;
use crate::import_export::SynthesizeImportsExports;
use crate::inline::{InlineAliases, InlineWrappers};
use crate::transform::{Transform, TransformContext, TransformError, apply_transforms};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BundleKind {
    Webpack,
    Browserify,
}

impl BundleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BundleKind::Webpack => "webpack",
            BundleKind::Browserify => "browserify",
        }
    }

    /// Canonical names the extracted factory parameters are renamed to,
    /// in positional order.
    pub fn names(self) -> ModuleNames {
        match self {
            BundleKind::Webpack => ModuleNames {
                module: "__webpack_module__",
                exports: "__webpack_exports__",
                require: "__webpack_require__",
            },
            BundleKind::Browserify => ModuleNames {
                module: "module",
                exports: "exports",
                require: "require",
            },
        }
    }
}

/// The loader-supplied names a module body sees after extraction.
#[derive(Copy, Clone, Debug)]
pub struct ModuleNames {
    pub module: &'static str,
    pub exports: &'static str,
    pub require: &'static str,
}

impl ModuleNames {
    pub fn implicit(&self) -> [&'static str; 3] {
        [self.module, self.exports, self.require]
    }
}

/// Module id; numeric and string ids are both normalized to strings.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub String);

impl std::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(id: &str) -> ModuleId {
        ModuleId(id.to_string())
    }
}

/// One extracted module: a standalone program cloned out of its factory.
pub struct Module {
    pub id: ModuleId,
    pub arena: NodeArena,
    pub root: NodeIndex,
    pub is_entry: bool,
    pub diagnostics: Vec<Diagnostic>,
    /// A transform aborted; the tree is unreliable.
    pub failed: bool,
}

impl Module {
    pub fn new(id: ModuleId, arena: NodeArena, root: NodeIndex) -> Module {
        Module {
            id,
            arena,
            root,
            is_entry: false,
            diagnostics: Vec::new(),
            failed: false,
        }
    }

    /// Render the module's current tree.
    pub fn code(&self) -> String {
        emit(&self.arena, self.root)
    }
}

/// The terminal output artifact: modules keyed by id, in extraction order.
pub struct Bundle {
    pub kind: BundleKind,
    pub modules: IndexMap<ModuleId, Module>,
    pub entry_id: Option<ModuleId>,
}

impl Bundle {
    /// Build a bundle, dropping duplicate ids (first one wins) and an
    /// entry id that resolves to no module.
    pub fn new(kind: BundleKind, modules: Vec<Module>, entry_id: Option<ModuleId>) -> Bundle {
        let mut map: IndexMap<ModuleId, Module> = IndexMap::with_capacity(modules.len());
        for mut module in modules {
            if map.contains_key(&module.id) {
                warn!(id = %module.id, "duplicate module id, keeping the first");
                continue;
            }
            module.is_entry = entry_id.as_ref() == Some(&module.id);
            map.insert(module.id.clone(), module);
        }
        let entry_id = entry_id.filter(|id| map.contains_key(id));
        Bundle {
            kind,
            modules: map,
            entry_id,
        }
    }

    /// Run the reconstruction pipeline over every module. Modules own
    /// disjoint trees, so they are transformed in parallel. A failing
    /// module is flagged and reported; the others still complete.
    pub fn reconstruct(&mut self) -> Vec<(ModuleId, TransformError)> {
        let kind = self.kind;
        self.modules
            .par_values_mut()
            .filter_map(|module| match reconstruct_module(kind, module) {
                Ok(()) => None,
                Err(error) => {
                    module.failed = true;
                    Some((module.id.clone(), error))
                }
            })
            .collect()
    }

    pub fn summary(&self) -> BundleSummary {
        BundleSummary {
            kind: self.kind.as_str(),
            entry: self.entry_id.as_ref().map(|id| id.0.clone()),
            modules: self
                .modules
                .values()
                .map(|module| ModuleSummary {
                    id: module.id.0.clone(),
                    entry: module.is_entry,
                    failed: module.failed,
                    diagnostics: module
                        .diagnostics
                        .iter()
                        .map(|diagnostic| diagnostic.to_string())
                        .collect(),
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
pub struct BundleSummary {
    pub kind: &'static str,
    pub entry: Option<String>,
    pub modules: Vec<ModuleSummary>,
}

#[derive(Serialize)]
pub struct ModuleSummary {
    pub id: String,
    pub entry: bool,
    pub failed: bool,
    pub diagnostics: Vec<String>,
}

/// The standard per-module pipeline: import/export synthesis, then alias
/// and wrapper inlining to a fixed point, then restoring the source-level
/// `module`/`exports` names wherever the canonical ones survived.
pub fn reconstruct_module(kind: BundleKind, module: &mut Module) -> Result<(), TransformError> {
    let names = kind.names();
    let implicit = names.implicit();
    let mut ctx = TransformContext::new(&module.arena, module.root, &implicit);
    let mut passes: Vec<Box<dyn Transform>> = vec![
        Box::new(SynthesizeImportsExports::new(names)),
        Box::new(InlineAliases),
        Box::new(InlineWrappers),
    ];
    let changes = apply_transforms(&mut module.arena, module.root, &mut ctx, &mut passes)?;
    module.diagnostics.append(&mut ctx.diagnostics);
    restore_loader_names(module, names);
    debug!(id = %module.id, changes, "module reconstructed");
    Ok(())
}

/// Patterns the pipeline deliberately leaves in place (a nested
/// `exports.x = ...`, say) still reference the canonical parameter names.
/// Rename the survivors back to `module`/`exports` so the output reads
/// like ordinary CommonJS; a rename that would collide or shadow keeps
/// the canonical name instead.
fn restore_loader_names(module: &mut Module, names: ModuleNames) {
    let restored = [(names.module, "module"), (names.exports, "exports")];
    let implicit = names.implicit();
    let mut table = BinderState::bind_with_implicit(&module.arena, module.root, &implicit);
    for (canonical, original) in restored {
        if canonical == original {
            continue;
        }
        let Some(binding) = table.lookup_root(canonical) else {
            continue;
        };
        if table.binding(binding).references.is_empty() {
            continue;
        }
        if let Err(error) = table.rename_binding(&mut module.arena, binding, original) {
            debug!(name = canonical, %error, "kept canonical loader name");
        }
    }
}

/// Clone a factory's body into a standalone program and rename its
/// parameters to the loader's canonical names.
pub(crate) fn extract_module(
    arena: &NodeArena,
    id: &str,
    factory: NodeIndex,
    canonical_params: &[&str; 3],
) -> Result<Module, UnpackError> {
    let Some(NodeKind::Function { params, body, .. }) = arena.kind(factory).cloned() else {
        return Err(UnpackError::Extract(format!(
            "module '{id}' factory is not a function"
        )));
    };
    let mut module_arena = NodeArena::new(format!("{id}.js"));
    let statements: Vec<NodeIndex> = match arena.kind(body) {
        Some(NodeKind::Block { statements }) => {
            let statements = statements.clone();
            statements
                .iter()
                .map(|&stmt| module_arena.import_subtree(arena, stmt))
                .collect()
        }
        // Arrow factory with an expression body.
        Some(_) => {
            let expression = module_arena.import_subtree(arena, body);
            vec![module_arena.synth(NodeKind::ExprStatement { expression })]
        }
        None => Vec::new(),
    };
    let root = module_arena.alloc(NodeKind::Program { statements }, 0, 0);

    let original: Vec<String> = params
        .iter()
        .filter_map(|&param| arena.ident_name(param).map(String::from))
        .collect();
    if original.len() != params.len() {
        return Err(UnpackError::Extract(format!(
            "module '{id}' has a non-identifier factory parameter"
        )));
    }
    let implicit: Vec<&str> = original.iter().map(String::as_str).collect();
    let mut table = BinderState::bind_with_implicit(&module_arena, root, &implicit);
    for (position, name) in original.iter().enumerate() {
        let canonical = canonical_params[position];
        if name == canonical {
            continue;
        }
        let Some(binding) = table.lookup_root(name) else {
            continue;
        };
        table
            .rename_binding(&mut module_arena, binding, canonical)
            .map_err(|error| UnpackError::Extract(format!("module '{id}': {error}")))?;
    }
    Ok(Module::new(ModuleId(id.to_string()), module_arena, root))
}
