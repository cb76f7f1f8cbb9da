//! Export-shape detection.
//!
//! Recognizes the CommonJS and webpack-runtime patterns a module uses to
//! publish values (`exports.name = ...`, `module.exports = ...`,
//! define-property getters, esModule markers, default-export interop) and
//! feeds them to the [`ImportExportManager`] as (name, value) triples.
//! Patterns without a representable static form are skipped with a
//! diagnostic marker; they never abort the module.

use tracing::debug;
use unweave_binder::{BindingKind, BindingTable};
use unweave_common::Diagnostic;
use unweave_emitter::code_preview;
use unweave_matcher::{Captures, Slot, m, skip_parens};
use unweave_parser::{NodeArena, NodeIndex, NodeKind, VarKind};

use crate::bundle::ModuleNames;
use crate::import_export::{
    ExportOutcome, ImportExportManager, remove_declarator,
};
use crate::transform::TransformError;

/// Remove `require.r(exports)` calls and `exports.__esModule = true`
/// assignments; the marker has no counterpart in a real ES module.
pub fn remove_es_module_markers(
    arena: &mut NodeArena,
    root: NodeIndex,
    names: ModuleNames,
) -> usize {
    let Some(NodeKind::Program { statements }) = arena.kind(root).cloned() else {
        return 0;
    };
    let pattern = m::or(vec![
        m::call(
            m::member(m::ident(names.require), m::ident("r")),
            Some(vec![m::any()]),
        ),
        m::assign(
            m::member(m::ident(names.exports), m::ident("__esModule")),
            m::any(),
        ),
    ]);
    let mut changes = 0;
    for stmt in statements {
        let Some(NodeKind::ExprStatement { expression }) = arena.kind(stmt).cloned() else {
            continue;
        };
        let mut caps = Captures::with_slots(0);
        if pattern.matches(arena, expression, &mut caps) && arena.remove_statement(stmt) {
            changes += 1;
        }
    }
    changes
}

/// Collapse `var d = require.n(x)` default-export interop: `d` becomes a
/// default import of `x`'s module, and `d()` / `d.a` call sites collapse
/// to the bare identifier.
pub fn collapse_default_interop(
    arena: &mut NodeArena,
    table: &BindingTable,
    manager: &mut ImportExportManager,
    names: ModuleNames,
) -> usize {
    let Some(require) = table.lookup_root(names.require) else {
        return 0;
    };
    let references: Vec<NodeIndex> = table.binding(require).references.iter().copied().collect();
    let mut changes = 0;
    for reference in references {
        let member = arena.parent(reference);
        let Some(NodeKind::Member {
            object,
            property,
            computed: false,
        }) = arena.kind(member)
        else {
            continue;
        };
        if *object != reference || arena.ident_name(*property) != Some("n") {
            continue;
        }
        let call = arena.parent(member);
        let Some(NodeKind::Call {
            callee, arguments, ..
        }) = arena.kind(call)
        else {
            continue;
        };
        if *callee != member || arguments.len() != 1 {
            continue;
        }
        let wrapped = skip_parens(arena, arguments[0]);
        let Some(rv_index) = manager.require_var_for_ident(table, wrapped) else {
            continue;
        };

        let mut holder = arena.parent(call);
        while matches!(arena.kind(holder), Some(NodeKind::Paren { .. })) {
            holder = arena.parent(holder);
        }
        let Some(NodeKind::VarDeclarator { name, .. }) = arena.kind(holder) else {
            continue;
        };
        let Some(local) = arena.ident_name(*name).map(String::from) else {
            continue;
        };
        let Some(binding) = table.binding_of(*name) else {
            continue;
        };
        manager.add_default_import(rv_index, &local);

        // `d()` and `d.a` both resolve to the default export.
        let interop_refs: Vec<NodeIndex> =
            table.binding(binding).references.iter().copied().collect();
        for interop_ref in interop_refs {
            let parent = arena.parent(interop_ref);
            match arena.kind(parent) {
                Some(NodeKind::Call { callee, .. }) if *callee == interop_ref => {
                    arena.replace_kind(parent, NodeKind::Ident { name: local.clone() });
                    changes += 1;
                }
                Some(NodeKind::Member {
                    object,
                    property,
                    computed: false,
                }) if *object == interop_ref
                    && matches!(arena.ident_name(*property), Some("a") | Some("default")) =>
                {
                    arena.replace_kind(parent, NodeKind::Ident { name: local.clone() });
                    changes += 1;
                }
                _ => {}
            }
        }
        let statement = arena.statement_parent(holder);
        changes += remove_declarator(arena, statement, holder);
        debug!(local, "collapsed default-export interop");
    }
    changes
}

fn unexpected_export(
    arena: &mut NodeArena,
    diagnostics: &mut Vec<Diagnostic>,
    name: &str,
    value: NodeIndex,
) -> NodeIndex {
    let preview = code_preview(arena, value);
    let (pos, length) = arena
        .get(value)
        .map(|node| (node.pos, node.end.saturating_sub(node.pos)))
        .unwrap_or((0, 0));
    diagnostics.push(Diagnostic::warning(
        arena.file_name.clone(),
        pos,
        length,
        format!("unsupported export pattern for '{name}'"),
    ));
    arena.synth(NodeKind::CommentStmt {
        text: format!("unweave:unexpected-export: {name} = {preview}"),
    })
}

/// `require.d(exports, { name: () => value, ... })` define-property
/// getters: each getter becomes one export triple.
pub fn apply_property_getters(
    arena: &mut NodeArena,
    table: &mut BindingTable,
    manager: &mut ImportExportManager,
    root: NodeIndex,
    names: ModuleNames,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<usize, TransformError> {
    let Some(NodeKind::Program { statements }) = arena.kind(root).cloned() else {
        return Ok(0);
    };
    let getters = Slot(0);
    let pattern = m::call(
        m::member(m::ident(names.require), m::ident("d")),
        Some(vec![
            m::ident(names.exports),
            m::capture(getters, m::any_object()),
        ]),
    );
    let mut changes = 0;
    for stmt in statements {
        let Some(NodeKind::ExprStatement { expression }) = arena.kind(stmt).cloned() else {
            continue;
        };
        let mut caps = Captures::with_slots(1);
        if !pattern.matches(arena, expression, &mut caps) {
            continue;
        }
        let Some(object) = caps.node(getters) else {
            continue;
        };
        let Some(NodeKind::Object { properties }) = arena.kind(object).cloned() else {
            continue;
        };
        let mut anchor = stmt;
        for property in properties {
            let Some(NodeKind::Property {
                key,
                value,
                computed: false,
                ..
            }) = arena.kind(property).cloned()
            else {
                continue;
            };
            let Some(name) = arena
                .ident_name(key)
                .map(String::from)
                .or_else(|| arena.literal_id_text(key))
            else {
                continue;
            };
            let Some(exported_value) = getter_value(arena, value) else {
                let marker = unexpected_export(arena, diagnostics, &name, value);
                arena.insert_statement_after(anchor, marker);
                anchor = marker;
                changes += 1;
                continue;
            };
            match manager.add_export(arena, table, &name, exported_value, NodeIndex::NONE, anchor)? {
                ExportOutcome::Handled(c) => changes += c,
                ExportOutcome::Unsupported => {
                    // Hoist the getter's value into a direct declaration.
                    let cloned = arena.clone_subtree(exported_value);
                    let export = if name == "default" {
                        arena.synth(NodeKind::ExportDefault { declaration: cloned })
                    } else {
                        let ident = arena.make_ident(&name);
                        let declarator = arena.synth(NodeKind::VarDeclarator {
                            name: ident,
                            init: cloned,
                        });
                        let var_stmt = arena.synth(NodeKind::VarStatement {
                            kind: VarKind::Var,
                            declarations: vec![declarator],
                        });
                        arena.synth(NodeKind::ExportNamed {
                            declaration: var_stmt,
                            specifiers: Vec::new(),
                            source: NodeIndex::NONE,
                        })
                    };
                    arena.insert_statement_after(anchor, export);
                    anchor = export;
                    changes += 1;
                }
                ExportOutcome::Unrepresentable => {
                    let marker = unexpected_export(arena, diagnostics, &name, exported_value);
                    arena.insert_statement_after(anchor, marker);
                    anchor = marker;
                    changes += 1;
                }
            }
        }
        arena.remove_statement(stmt);
        changes += 1;
    }
    Ok(changes)
}

/// The expression a property getter yields: arrow bodies directly,
/// single-return function bodies through the return argument.
fn getter_value(arena: &NodeArena, value: NodeIndex) -> Option<NodeIndex> {
    let value = skip_parens(arena, value);
    let Some(NodeKind::Function { body, is_arrow, .. }) = arena.kind(value) else {
        return None;
    };
    if *is_arrow && !matches!(arena.kind(*body), Some(NodeKind::Block { .. })) {
        return Some(*body);
    }
    let Some(NodeKind::Block { statements }) = arena.kind(*body) else {
        return None;
    };
    if statements.len() != 1 {
        return None;
    }
    match arena.kind(statements[0]) {
        Some(NodeKind::Return { argument }) if argument.is_some() => Some(*argument),
        _ => None,
    }
}

/// `exports.<name> = value` / `module.exports = value` assignments at the
/// module top level. Assignments the manager cannot consume are rewritten
/// in place as export declarations; implicit-binding values are skipped
/// with a marker.
pub fn apply_export_assignments(
    arena: &mut NodeArena,
    table: &mut BindingTable,
    manager: &mut ImportExportManager,
    root: NodeIndex,
    names: ModuleNames,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<usize, TransformError> {
    let Some(NodeKind::Program { statements }) = arena.kind(root).cloned() else {
        return Ok(0);
    };
    let mut changes = 0;
    for stmt in statements {
        let Some(NodeKind::ExprStatement { expression }) = arena.kind(stmt).cloned() else {
            continue;
        };
        let expr = skip_parens(arena, expression);
        let Some(NodeKind::Assign {
            op: "=",
            left,
            right,
        }) = arena.kind(expr).cloned()
        else {
            continue;
        };
        let Some(name) = export_target_name(arena, table, left, names) else {
            continue;
        };
        match manager.add_export(arena, table, &name, right, stmt, stmt)? {
            ExportOutcome::Handled(c) => changes += c,
            ExportOutcome::Unsupported => {
                let export = if name == "default" {
                    arena.synth(NodeKind::ExportDefault { declaration: right })
                } else {
                    let ident = arena.make_ident(&name);
                    let declarator = arena.synth(NodeKind::VarDeclarator {
                        name: ident,
                        init: right,
                    });
                    let var_stmt = arena.synth(NodeKind::VarStatement {
                        kind: VarKind::Var,
                        declarations: vec![declarator],
                    });
                    arena.synth(NodeKind::ExportNamed {
                        declaration: var_stmt,
                        specifiers: Vec::new(),
                        source: NodeIndex::NONE,
                    })
                };
                arena.replace_statement(stmt, export);
                changes += 1;
            }
            ExportOutcome::Unrepresentable => {
                let marker = unexpected_export(arena, diagnostics, &name, right);
                arena.replace_statement(stmt, marker);
                changes += 1;
            }
        }
    }

    // Export assignments below the top level have no static counterpart;
    // they stay in place and are only reported.
    let mut nested = Vec::new();
    arena.walk(root, &mut |idx| {
        let Some(NodeKind::Assign { op: "=", left, .. }) = arena.kind(idx) else {
            return;
        };
        if export_target_name(arena, table, *left, names).is_none() {
            return;
        }
        let statement = arena.statement_parent(idx);
        if arena.parent(statement) != root {
            nested.push((idx, arena.get(idx).map(|n| (n.pos, n.end)).unwrap_or((0, 0))));
        }
    });
    for (_, (pos, end)) in nested {
        diagnostics.push(Diagnostic::warning(
            arena.file_name.clone(),
            pos,
            end.saturating_sub(pos),
            "export assignment outside the module top level was left in place",
        ));
    }
    Ok(changes)
}

/// The exported name an assignment target denotes, when the target is the
/// module's exports object: `exports.<name>`, `module.exports`
/// (`"default"`), or `module.exports.<name>`.
fn export_target_name(
    arena: &NodeArena,
    table: &BindingTable,
    left: NodeIndex,
    names: ModuleNames,
) -> Option<String> {
    let left = skip_parens(arena, left);
    let Some(NodeKind::Member {
        object,
        property,
        computed: false,
    }) = arena.kind(left)
    else {
        return None;
    };
    let object = skip_parens(arena, *object);
    let prop = arena.ident_name(*property)?;

    if is_implicit_named(arena, table, object, names.exports) {
        return Some(prop.to_string());
    }
    if is_implicit_named(arena, table, object, names.module) {
        return (prop == "exports").then(|| "default".to_string());
    }
    if let Some(NodeKind::Member {
        object: inner,
        property: inner_prop,
        computed: false,
    }) = arena.kind(object)
    {
        let inner = skip_parens(arena, *inner);
        if is_implicit_named(arena, table, inner, names.module)
            && arena.ident_name(*inner_prop) == Some("exports")
        {
            return Some(prop.to_string());
        }
    }
    None
}

/// The identifier is the loader-supplied binding with this name, not a
/// local shadow of it.
fn is_implicit_named(
    arena: &NodeArena,
    table: &BindingTable,
    ident: NodeIndex,
    name: &str,
) -> bool {
    if arena.ident_name(ident) != Some(name) {
        return false;
    }
    match table.binding_of(ident) {
        Some(binding) => table.binding(binding).kind == BindingKind::Implicit,
        None => false,
    }
}
