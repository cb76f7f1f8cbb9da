//! Import/export synthesis for one extracted module.
//!
//! The manager collects every call of the module's require parameter,
//! tracks the variables those calls are bound to, accumulates import and
//! export specifiers against them, and finally materializes the
//! specifiers as static declarations. Specifier accumulation is fed by
//! the export-shape detection in [`crate::exports`].

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;
use unweave_binder::{BindingId, BindingKind, BindingTable};
use unweave_matcher::skip_parens;
use unweave_parser::{ImportKind, NodeArena, NodeIndex, NodeKind};

use crate::bundle::{ModuleId, ModuleNames};
use crate::exports;
use crate::transform::{Transform, TransformContext, TransformError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImportSpec {
    Default { local: String },
    Named { imported: String, local: String },
    Namespace { local: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExportSpec {
    Named { local: String, exported: String },
    Namespace { exported: String },
}

/// A call of the loader carrying a literal module-id argument.
#[derive(Debug)]
pub struct RequireCall {
    pub call: NodeIndex,
    pub module_id: ModuleId,
    /// The call initializes a require-var; its statement is handled by
    /// that var's materialization instead of the bare-call rewrite.
    pub bound: bool,
}

/// A variable bound to a require call, plus the import/export specifiers
/// accumulated against it until materialization.
#[derive(Debug)]
pub struct RequireVar {
    pub declarator: NodeIndex,
    pub statement: NodeIndex,
    pub name_node: NodeIndex,
    pub name: String,
    pub module_id: ModuleId,
    pub imports: Vec<ImportSpec>,
    pub exports: Vec<ExportSpec>,
}

/// What became of one (name, value) export triple.
pub enum ExportOutcome {
    /// Consumed; carries the change count.
    Handled(usize),
    /// The value is not a binding reference; the caller may rewrite the
    /// assignment into a direct export declaration.
    Unsupported,
    /// The value cannot be represented as a static export at all; the
    /// caller leaves a diagnostic marker and skips it.
    Unrepresentable,
}

pub struct ImportExportManager {
    names: ModuleNames,
    pub require_calls: Vec<RequireCall>,
    pub require_vars: Vec<RequireVar>,
    taken_locals: FxHashSet<String>,
}

impl ImportExportManager {
    pub fn new(names: ModuleNames) -> ImportExportManager {
        ImportExportManager {
            names,
            require_calls: Vec::new(),
            require_vars: Vec::new(),
            taken_locals: FxHashSet::default(),
        }
    }

    /// Walk every reference of the require parameter, recording literal-id
    /// calls and the variables they are bound to.
    pub fn collect(&mut self, arena: &NodeArena, table: &BindingTable) {
        let Some(require) = table.lookup_root(self.names.require) else {
            return;
        };
        for &reference in &table.binding(require).references {
            let mut call = arena.parent(reference);
            while matches!(arena.kind(call), Some(NodeKind::Paren { .. })) {
                call = arena.parent(call);
            }
            let Some(NodeKind::Call {
                callee,
                arguments,
                is_new: false,
            }) = arena.kind(call)
            else {
                continue;
            };
            if skip_parens(arena, *callee) != reference || arguments.len() != 1 {
                continue;
            }
            let Some(id) = arena.literal_id_text(skip_parens(arena, arguments[0])) else {
                continue;
            };

            let mut holder = arena.parent(call);
            while matches!(arena.kind(holder), Some(NodeKind::Paren { .. })) {
                holder = arena.parent(holder);
            }
            let mut bound = false;
            if let Some(NodeKind::VarDeclarator { name, init }) = arena.kind(holder)
                && skip_parens(arena, *init) == call
                && let Some(var_name) = arena.ident_name(*name)
            {
                bound = true;
                self.require_vars.push(RequireVar {
                    declarator: holder,
                    statement: arena.statement_parent(holder),
                    name_node: *name,
                    name: var_name.to_string(),
                    module_id: ModuleId(id.clone()),
                    imports: Vec::new(),
                    exports: Vec::new(),
                });
            }
            self.require_calls.push(RequireCall {
                call,
                module_id: ModuleId(id),
                bound,
            });
        }
        debug!(
            calls = self.require_calls.len(),
            vars = self.require_vars.len(),
            "collected require sites"
        );
    }

    /// Reserve a local name so later named imports do not reuse it.
    pub fn reserve_local(&mut self, name: &str) {
        self.taken_locals.insert(name.to_string());
    }

    /// Index of the require-var an identifier reference resolves to.
    pub fn require_var_for_ident(
        &self,
        table: &BindingTable,
        ident: NodeIndex,
    ) -> Option<usize> {
        let binding = table.binding_of(ident)?;
        self.require_vars
            .iter()
            .position(|rv| table.binding_of(rv.name_node) == Some(binding))
    }

    pub fn add_default_import(&mut self, rv_index: usize, local: &str) {
        self.reserve_local(local);
        self.require_vars[rv_index].imports.push(ImportSpec::Default {
            local: local.to_string(),
        });
    }

    /// Consume one (name, value) export triple. `statement` is the
    /// assignment statement to remove/replace when the triple is handled;
    /// NONE when the triple came from a getter object, in which case new
    /// statements are inserted after `anchor` instead.
    pub fn add_export(
        &mut self,
        arena: &mut NodeArena,
        table: &mut BindingTable,
        name: &str,
        value: NodeIndex,
        statement: NodeIndex,
        anchor: NodeIndex,
    ) -> Result<ExportOutcome, TransformError> {
        let value = skip_parens(arena, value);
        if matches!(arena.kind(value), Some(NodeKind::Ident { .. })) {
            // Reference to a require-var: namespace re-export.
            if let Some(rv) = self.require_var_for_ident(table, value) {
                self.require_vars[rv].exports.push(ExportSpec::Namespace {
                    exported: name.to_string(),
                });
                arena.remove_statement(statement);
                return Ok(ExportOutcome::Handled(1));
            }
            if let Some(binding) = table.binding_of(value) {
                if table.binding(binding).kind == BindingKind::Implicit {
                    return Ok(ExportOutcome::Unrepresentable);
                }
                let changes =
                    self.export_local(arena, table, name, binding, statement, anchor)?;
                return Ok(ExportOutcome::Handled(changes));
            }
            // Unbound (global) identifier: exportable by direct rewrite.
            return Ok(ExportOutcome::Unsupported);
        }
        // Member access on a require-var: named re-export.
        if let Some(NodeKind::Member {
            object,
            property,
            computed: false,
        }) = arena.kind(value)
        {
            let object = skip_parens(arena, *object);
            if let Some(prop) = arena.ident_name(*property).map(String::from)
                && let Some(rv) = self.require_var_for_ident(table, object)
            {
                self.require_vars[rv].exports.push(ExportSpec::Named {
                    local: prop,
                    exported: name.to_string(),
                });
                arena.remove_statement(statement);
                return Ok(ExportOutcome::Handled(1));
            }
        }
        Ok(ExportOutcome::Unsupported)
    }

    /// Export a locally bound identifier: rewrite its declaration as a
    /// default export, rename-and-export it, or fall back to a specifier
    /// statement when the declaration cannot be wrapped.
    fn export_local(
        &mut self,
        arena: &mut NodeArena,
        table: &mut BindingTable,
        name: &str,
        binding: BindingId,
        statement: NodeIndex,
        anchor: NodeIndex,
    ) -> Result<usize, TransformError> {
        let declaration = table.binding(binding).declaration;
        let declaring_stmt = arena.statement_parent(declaration);
        let single_ref = table.binding(binding).reference_count() == 1;
        let wrappable = match arena.kind(declaring_stmt) {
            Some(NodeKind::VarStatement { declarations, .. }) => declarations.len() == 1,
            Some(NodeKind::Function {
                is_expression: false,
                ..
            }) => true,
            _ => false,
        };

        if name == "default" {
            if single_ref && wrappable {
                match arena.kind(declaring_stmt).cloned() {
                    Some(NodeKind::VarStatement { declarations, .. }) => {
                        if let Some(NodeKind::VarDeclarator { init, .. }) =
                            arena.kind(declarations[0]).cloned()
                            && init.is_some()
                        {
                            let export =
                                arena.synth(NodeKind::ExportDefault { declaration: NodeIndex::NONE });
                            arena.replace_statement(declaring_stmt, export);
                            arena.replace_kind(export, NodeKind::ExportDefault { declaration: init });
                            arena.remove_statement(statement);
                            return Ok(2);
                        }
                    }
                    Some(NodeKind::Function { .. }) => {
                        let export =
                            arena.synth(NodeKind::ExportDefault { declaration: NodeIndex::NONE });
                        arena.replace_statement(declaring_stmt, export);
                        arena.replace_kind(
                            export,
                            NodeKind::ExportDefault {
                                declaration: declaring_stmt,
                            },
                        );
                        arena.remove_statement(statement);
                        return Ok(2);
                    }
                    _ => {}
                }
            }
            // Still referenced elsewhere: keep the declaration and export
            // the identifier itself.
            let local = arena.make_ident(&table.binding(binding).name);
            let export = arena.synth(NodeKind::ExportDefault { declaration: local });
            place_statement(arena, statement, anchor, export);
            return Ok(1);
        }

        if wrappable {
            table.rename_binding(arena, binding, name)?;
            let export = arena.synth(NodeKind::ExportNamed {
                declaration: NodeIndex::NONE,
                specifiers: Vec::new(),
                source: NodeIndex::NONE,
            });
            arena.replace_statement(declaring_stmt, export);
            arena.replace_kind(
                export,
                NodeKind::ExportNamed {
                    declaration: declaring_stmt,
                    specifiers: Vec::new(),
                    source: NodeIndex::NONE,
                },
            );
            arena.remove_statement(statement);
            return Ok(2);
        }

        // Not a plain declaration: leave it alone, export by specifier.
        let local = arena.make_ident(&table.binding(binding).name);
        let exported = arena.make_ident(name);
        let specifier = arena.synth(NodeKind::ExportSpecifier {
            local,
            exported,
            namespace: false,
        });
        let export = arena.synth(NodeKind::ExportNamed {
            declaration: NodeIndex::NONE,
            specifiers: vec![specifier],
            source: NodeIndex::NONE,
        });
        place_statement(arena, statement, anchor, export);
        Ok(1)
    }

    /// Classify every require-var: all-property-read references become
    /// named imports (rewriting each reference, collapsing the
    /// `(0, x.prop)` idiom); anything else falls back to a namespace
    /// import bound to the original name. A var with zero remaining
    /// references and accumulated specifiers is a pure re-export and
    /// needs no import at all.
    pub fn classify_imports(&mut self, arena: &mut NodeArena, table: &mut BindingTable) -> usize {
        let mut changes = 0;
        for rv_index in 0..self.require_vars.len() {
            // Re-resolve through the name node; the table may have been
            // rebuilt since collection.
            let Some(binding) = table.binding_of(self.require_vars[rv_index].name_node) else {
                continue;
            };
            let references: Vec<NodeIndex> =
                table.binding(binding).references.iter().copied().collect();
            let has_writes = !table.binding(binding).writes.is_empty();
            let all_member_reads = !references.is_empty()
                && !has_writes
                && references.iter().all(|&r| is_member_read(arena, r));

            if all_member_reads {
                // Group references by property, in first-use order.
                let mut groups: Vec<(String, Vec<NodeIndex>)> = Vec::new();
                for &reference in &references {
                    let member = arena.parent(reference);
                    let Some(NodeKind::Member { property, .. }) = arena.kind(member) else {
                        continue;
                    };
                    let Some(prop) = arena.ident_name(*property).map(String::from) else {
                        continue;
                    };
                    match groups.iter_mut().find(|(name, _)| *name == prop) {
                        Some((_, members)) => members.push(member),
                        None => groups.push((prop, vec![member])),
                    }
                }
                for (prop, members) in groups {
                    let collides = self.taken_locals.contains(&prop)
                        || table.has_binding(table.root_scope, &prop)
                        || members.iter().any(|&member| {
                            table
                                .scope_of(member)
                                .is_some_and(|scope| table.resolve(scope, &prop).is_some())
                        });
                    let local = if collides {
                        table.generate_uid(&prop)
                    } else {
                        prop.clone()
                    };
                    self.taken_locals.insert(local.clone());
                    self.require_vars[rv_index].imports.push(ImportSpec::Named {
                        imported: prop,
                        local: local.clone(),
                    });
                    for member in members {
                        let target = sequence_paren_wrapper(arena, member).unwrap_or(member);
                        arena.replace_kind(target, NodeKind::Ident { name: local.clone() });
                        changes += 1;
                    }
                }
            } else {
                let rv = &mut self.require_vars[rv_index];
                let reexport_only = references.is_empty()
                    && (!rv.imports.is_empty() || !rv.exports.is_empty());
                if !reexport_only {
                    let local = rv.name.clone();
                    self.taken_locals.insert(local.clone());
                    rv.imports.push(ImportSpec::Namespace { local });
                }
            }
        }
        changes
    }

    /// Emit the accumulated specifiers as declarations positioned after
    /// each original require-var statement, remove the original
    /// declarations, and rewrite bare require calls to literal
    /// `require('id')` expressions.
    pub fn materialize(&mut self, arena: &mut NodeArena) -> usize {
        let mut changes = 0;
        let mut anchors: FxHashMap<u32, NodeIndex> = FxHashMap::default();
        for rv_index in 0..self.require_vars.len() {
            let statement = self.require_vars[rv_index].statement;
            let mut anchor = if arena.parent(statement).is_some() {
                statement
            } else {
                anchors
                    .get(&statement.0)
                    .copied()
                    .unwrap_or(NodeIndex::NONE)
            };
            if anchor.is_none() {
                continue;
            }

            let source_text = self.require_vars[rv_index].module_id.0.clone();
            let imports = self.require_vars[rv_index].imports.clone();
            let exports = self.require_vars[rv_index].exports.clone();

            // Default first, then named, grouped into one declaration.
            let grouped: Vec<&ImportSpec> = imports
                .iter()
                .filter(|spec| matches!(spec, ImportSpec::Default { .. }))
                .chain(
                    imports
                        .iter()
                        .filter(|spec| matches!(spec, ImportSpec::Named { .. })),
                )
                .collect();
            if !grouped.is_empty() {
                let mut specifiers = Vec::new();
                for spec in grouped {
                    let node = match spec {
                        ImportSpec::Default { local } => {
                            let local = arena.make_ident(local);
                            arena.synth(NodeKind::ImportSpecifier {
                                kind: ImportKind::Default,
                                imported: NodeIndex::NONE,
                                local,
                            })
                        }
                        ImportSpec::Named { imported, local } => {
                            let imported = arena.make_ident(imported);
                            let local = arena.make_ident(local);
                            arena.synth(NodeKind::ImportSpecifier {
                                kind: ImportKind::Named,
                                imported,
                                local,
                            })
                        }
                        ImportSpec::Namespace { .. } => unreachable!("filtered above"),
                    };
                    specifiers.push(node);
                }
                let source = arena.make_string(&source_text);
                let decl = arena.synth(NodeKind::ImportDecl { specifiers, source });
                if arena.insert_statement_after(anchor, decl) {
                    anchor = decl;
                    changes += 1;
                }
            }
            // Namespace specifiers always get their own declaration.
            for spec in &imports {
                let ImportSpec::Namespace { local } = spec else {
                    continue;
                };
                let local = arena.make_ident(local);
                let specifier = arena.synth(NodeKind::ImportSpecifier {
                    kind: ImportKind::Namespace,
                    imported: NodeIndex::NONE,
                    local,
                });
                let source = arena.make_string(&source_text);
                let decl = arena.synth(NodeKind::ImportDecl {
                    specifiers: vec![specifier],
                    source,
                });
                if arena.insert_statement_after(anchor, decl) {
                    anchor = decl;
                    changes += 1;
                }
            }

            for spec in &exports {
                let ExportSpec::Namespace { exported } = spec else {
                    continue;
                };
                let exported = arena.make_ident(exported);
                let specifier = arena.synth(NodeKind::ExportSpecifier {
                    local: NodeIndex::NONE,
                    exported,
                    namespace: true,
                });
                let source = arena.make_string(&source_text);
                let decl = arena.synth(NodeKind::ExportNamed {
                    declaration: NodeIndex::NONE,
                    specifiers: vec![specifier],
                    source,
                });
                if arena.insert_statement_after(anchor, decl) {
                    anchor = decl;
                    changes += 1;
                }
            }
            let named_exports: Vec<(String, String)> = exports
                .iter()
                .filter_map(|spec| match spec {
                    ExportSpec::Named { local, exported } => {
                        Some((local.clone(), exported.clone()))
                    }
                    ExportSpec::Namespace { .. } => None,
                })
                .collect();
            if !named_exports.is_empty() {
                let mut specifiers = Vec::new();
                for (local, exported) in named_exports {
                    let local = arena.make_ident(&local);
                    let exported = arena.make_ident(&exported);
                    specifiers.push(arena.synth(NodeKind::ExportSpecifier {
                        local,
                        exported,
                        namespace: false,
                    }));
                }
                let source = arena.make_string(&source_text);
                let decl = arena.synth(NodeKind::ExportNamed {
                    declaration: NodeIndex::NONE,
                    specifiers,
                    source,
                });
                if arena.insert_statement_after(anchor, decl) {
                    anchor = decl;
                    changes += 1;
                }
            }

            anchors.insert(statement.0, anchor);
            let declarator = self.require_vars[rv_index].declarator;
            changes += remove_declarator(arena, statement, declarator);
        }

        // Bare calls have no binding to anchor a declaration on; they
        // stay dynamic as literal require calls.
        for rc in &self.require_calls {
            if rc.bound {
                continue;
            }
            let already = match arena.kind(rc.call) {
                Some(NodeKind::Call {
                    callee, arguments, ..
                }) => {
                    arena.ident_name(*callee) == Some("require")
                        && arguments.len() == 1
                        && matches!(
                            arena.kind(arguments[0]),
                            Some(NodeKind::Str { value }) if *value == rc.module_id.0
                        )
                }
                _ => true,
            };
            if already {
                continue;
            }
            let callee = arena.make_ident("require");
            let argument = arena.make_string(&rc.module_id.0);
            arena.replace_kind(
                rc.call,
                NodeKind::Call {
                    callee,
                    arguments: vec![argument],
                    is_new: false,
                },
            );
            changes += 1;
        }
        changes
    }
}

/// The reference is the object of a non-computed member read.
fn is_member_read(arena: &NodeArena, reference: NodeIndex) -> bool {
    let member = arena.parent(reference);
    let Some(NodeKind::Member {
        object,
        property,
        computed: false,
    }) = arena.kind(member)
    else {
        return false;
    };
    if *object != reference || arena.ident_name(*property).is_none() {
        return false;
    }
    match arena.kind(arena.parent(member)) {
        Some(NodeKind::Assign { left, .. }) if *left == member => false,
        _ => true,
    }
}

/// For `(0, x.prop)` call-safety wrappers, the paren node to collapse.
fn sequence_paren_wrapper(arena: &NodeArena, member: NodeIndex) -> Option<NodeIndex> {
    let sequence = arena.parent(member);
    let Some(NodeKind::Sequence { expressions }) = arena.kind(sequence) else {
        return None;
    };
    if expressions.len() != 2 || expressions[1] != member {
        return None;
    }
    if !matches!(arena.kind(expressions[0]), Some(NodeKind::Number { .. })) {
        return None;
    }
    let paren = arena.parent(sequence);
    matches!(arena.kind(paren), Some(NodeKind::Paren { .. })).then_some(paren)
}

/// Drop one declarator from a `var` statement, removing the statement
/// when it was the last one.
pub(crate) fn remove_declarator(
    arena: &mut NodeArena,
    statement: NodeIndex,
    declarator: NodeIndex,
) -> usize {
    let Some(NodeKind::VarStatement { kind, declarations }) = arena.kind(statement).cloned() else {
        return 0;
    };
    let remaining: Vec<NodeIndex> = declarations
        .iter()
        .copied()
        .filter(|&d| d != declarator)
        .collect();
    if remaining.len() == declarations.len() {
        return 0;
    }
    if remaining.is_empty() {
        arena.remove_statement(statement);
    } else {
        arena.replace_kind(
            statement,
            NodeKind::VarStatement {
                kind,
                declarations: remaining,
            },
        );
    }
    1
}

/// Replace `statement` with `node`, or insert after `anchor` when there
/// is no host statement.
pub(crate) fn place_statement(
    arena: &mut NodeArena,
    statement: NodeIndex,
    anchor: NodeIndex,
    node: NodeIndex,
) -> bool {
    if statement.is_some() && arena.replace_statement(statement, node) {
        return true;
    }
    anchor.is_some() && arena.insert_statement_after(anchor, node)
}

/// The import/export synthesis pass: collection, export-shape detection,
/// classification, materialization. Runs once per module.
pub struct SynthesizeImportsExports {
    names: ModuleNames,
}

impl SynthesizeImportsExports {
    pub fn new(names: ModuleNames) -> SynthesizeImportsExports {
        SynthesizeImportsExports { names }
    }
}

impl Transform for SynthesizeImportsExports {
    fn name(&self) -> &'static str {
        "synthesize-imports-exports"
    }

    fn run(
        &mut self,
        arena: &mut NodeArena,
        root: NodeIndex,
        ctx: &mut TransformContext,
    ) -> Result<usize, TransformError> {
        let mut manager = ImportExportManager::new(self.names);
        manager.collect(arena, &ctx.table);
        let mut changes = 0;

        let c = exports::remove_es_module_markers(arena, root, self.names)
            + exports::collapse_default_interop(arena, &ctx.table, &mut manager, self.names);
        changes += c;
        if c > 0 {
            ctx.crawl(arena, root);
        }

        let c = exports::apply_property_getters(
            arena,
            &mut ctx.table,
            &mut manager,
            root,
            self.names,
            &mut ctx.diagnostics,
        )?;
        changes += c;
        if c > 0 {
            ctx.crawl(arena, root);
        }

        let c = exports::apply_export_assignments(
            arena,
            &mut ctx.table,
            &mut manager,
            root,
            self.names,
            &mut ctx.diagnostics,
        )?;
        changes += c;
        if c > 0 {
            ctx.crawl(arena, root);
        }

        changes += manager.classify_imports(arena, &mut ctx.table);
        changes += manager.materialize(arena);
        Ok(changes)
    }
}

/// `var x = init;` alias detection helper shared with the inliner: the
/// root identifier of an identifier or non-computed member chain.
pub(crate) fn member_chain_root(arena: &NodeArena, mut idx: NodeIndex) -> Option<NodeIndex> {
    idx = skip_parens(arena, idx);
    loop {
        match arena.kind(idx) {
            Some(NodeKind::Ident { .. }) => return Some(idx),
            Some(NodeKind::Member {
                object,
                property,
                computed: false,
            }) if arena.ident_name(*property).is_some() => {
                idx = skip_parens(arena, *object);
            }
            _ => return None,
        }
    }
}
