//! Alias and wrapper inlining.
//!
//! Minified bundles route values through throwaway names: `var b = a;`
//! aliases and one-line forwarding functions. Both inliners substitute
//! the underlying expression at every use site and drop the
//! intermediary. They run to a fixed point so alias chains collapse
//! fully.

use tracing::debug;
use unweave_binder::{BindingId, BindingKind, BindingTable};
use unweave_matcher::skip_parens;
use unweave_parser::{NodeArena, NodeIndex, NodeKind};

use crate::import_export::{member_chain_root, remove_declarator};
use crate::transform::{Transform, TransformContext, TransformError};

pub struct InlineAliases;

impl Transform for InlineAliases {
    fn name(&self) -> &'static str {
        "inline-aliases"
    }

    fn fixed_point(&self) -> bool {
        true
    }

    fn run(
        &mut self,
        arena: &mut NodeArena,
        _root: NodeIndex,
        ctx: &mut TransformContext,
    ) -> Result<usize, TransformError> {
        Ok(inline_variable_aliases(arena, &ctx.table))
    }
}

pub struct InlineWrappers;

impl Transform for InlineWrappers {
    fn name(&self) -> &'static str {
        "inline-wrappers"
    }

    fn fixed_point(&self) -> bool {
        true
    }

    fn run(
        &mut self,
        arena: &mut NodeArena,
        _root: NodeIndex,
        ctx: &mut TransformContext,
    ) -> Result<usize, TransformError> {
        Ok(inline_function_wrappers(arena, &ctx.table))
    }
}

/// Inline `var b = <ident or member chain>;` aliases: every read of `b`
/// becomes a copy of the initializer and the declarator is removed. The
/// assignment form `var b; b = <chain>;` (including the value position,
/// `(b = f)(1)` collapsing to `f(1)`) is handled the same way when the
/// assignment is the binding's only write.
///
/// The chain root must never be written and must resolve to the same
/// binding at every use site as at the aliasing site (no intervening
/// shadow). Violations skip the alias rather than failing the module.
pub fn inline_variable_aliases(arena: &mut NodeArena, table: &BindingTable) -> usize {
    struct Candidate {
        declarator: NodeIndex,
        init: NodeIndex,
        /// The `a = value` assignment supplying the alias, for the
        /// uninitialized-declarator form; NONE otherwise.
        write: NodeIndex,
        references: Vec<NodeIndex>,
    }

    let mut candidates = Vec::new();
    for id in table.binding_ids() {
        let binding = table.binding(id);
        if !matches!(
            binding.kind,
            BindingKind::Var | BindingKind::Let | BindingKind::Const
        ) {
            continue;
        }
        if binding.references.is_empty() {
            continue;
        }
        let declarator = binding.declaration;
        let Some(NodeKind::VarDeclarator { init, .. }) = arena.kind(declarator) else {
            continue;
        };
        let init = *init;

        if binding.writes.is_empty() {
            if !alias_shape_ok(arena, table, id, init) {
                continue;
            }
            candidates.push(Candidate {
                declarator,
                init,
                write: NodeIndex::NONE,
                references: binding.references.iter().copied().collect(),
            });
            continue;
        }

        // The assignment form: `var a; a = b;` with a single write.
        if init.is_some() || binding.writes.len() != 1 {
            continue;
        }
        let write = binding.writes[0];
        let assign = arena.parent(write);
        let Some(NodeKind::Assign {
            op: "=",
            left,
            right,
        }) = arena.kind(assign)
        else {
            continue;
        };
        if *left != write || !alias_shape_ok(arena, table, id, *right) {
            continue;
        }
        candidates.push(Candidate {
            declarator,
            init: *right,
            write,
            references: binding
                .references
                .iter()
                .copied()
                .filter(|&r| r != write)
                .collect(),
        });
    }

    let mut changes = 0;
    for candidate in candidates {
        // Earlier inlining this run may have rewritten the initializer in
        // place; re-check its shape and shadowing before substituting.
        let statement = arena.statement_parent(candidate.declarator);
        if !matches!(arena.kind(statement), Some(NodeKind::VarStatement { .. })) {
            continue;
        }
        let Some(root_ident) = member_chain_root(arena, candidate.init) else {
            continue;
        };
        let Some(root_name) = arena.ident_name(root_ident).map(String::from) else {
            continue;
        };
        let Some(init_scope) = table.scope_of(root_ident) else {
            continue;
        };
        let declared = table.resolve(init_scope, &root_name);
        let shadowed = candidate.references.iter().any(|&reference| {
            match table.scope_of(reference) {
                Some(scope) => table.resolve(scope, &root_name) != declared,
                None => true,
            }
        });
        if shadowed {
            debug!(name = %root_name, "alias chain root shadowed at a use site, skipping");
            continue;
        }

        for reference in candidate.references {
            let clone = arena.clone_subtree(candidate.init);
            if let Some(kind) = arena.kind(clone).cloned() {
                arena.replace_kind(reference, kind);
                changes += 1;
            }
        }
        if candidate.write.is_some() {
            changes += remove_alias_assignment(arena, candidate.write, candidate.init);
        }
        changes += remove_declarator(arena, statement, candidate.declarator);
    }
    changes
}

/// Dispose of the `a = value` assignment feeding an inlined alias: a
/// bare assignment statement is dropped, while a value position such as
/// `(a = b)(1)` collapses to the assigned expression itself.
fn remove_alias_assignment(arena: &mut NodeArena, write: NodeIndex, value: NodeIndex) -> usize {
    let assign = arena.parent(write);
    if !matches!(arena.kind(assign), Some(NodeKind::Assign { .. })) {
        return 0;
    }
    let mut outer = assign;
    while matches!(arena.kind(arena.parent(outer)), Some(NodeKind::Paren { .. })) {
        outer = arena.parent(outer);
    }
    let parent = arena.parent(outer);
    if let Some(NodeKind::ExprStatement { expression }) = arena.kind(parent)
        && *expression == outer
        && arena.remove_statement(parent)
    {
        return 1;
    }
    let clone = arena.clone_subtree(value);
    if let Some(kind) = arena.kind(clone).cloned() {
        arena.replace_kind(outer, kind);
        return 1;
    }
    0
}

/// The initializer is an identifier or non-computed member chain whose
/// root is a never-written binding other than the alias itself, or an
/// unresolved (global) name.
fn alias_shape_ok(
    arena: &NodeArena,
    table: &BindingTable,
    alias: BindingId,
    init: NodeIndex,
) -> bool {
    let Some(root_ident) = member_chain_root(arena, init) else {
        return false;
    };
    match table.binding_of(root_ident) {
        Some(root) => root != alias && table.binding(root).writes.is_empty(),
        None => true,
    }
}

/// Inline single-return forwarding functions:
///
/// ```text
/// function w(x, y) { return f(y, x); }
/// w(1, 2);            =>  f(2, 1);
/// ```
///
/// Every call site must pass exactly the wrapper's arity, the inner
/// call's arguments must be distinct wrapper parameters, and the inner
/// callee must resolve identically at the wrapper body and at each call
/// site. Anything else leaves the wrapper in place.
pub fn inline_function_wrappers(arena: &mut NodeArena, table: &BindingTable) -> usize {
    struct Candidate {
        function: NodeIndex,
        inner_call: NodeIndex,
        /// Inner-call argument positions as indexes into the wrapper's
        /// parameter list.
        arg_params: Vec<usize>,
        call_sites: Vec<NodeIndex>,
    }

    let mut candidates = Vec::new();
    'bindings: for id in table.binding_ids() {
        let binding = table.binding(id);
        if binding.kind != BindingKind::Function || !binding.writes.is_empty() {
            continue;
        }
        let function = binding.declaration;
        let Some(NodeKind::Function {
            params,
            body,
            is_expression: false,
            ..
        }) = arena.kind(function)
        else {
            continue;
        };
        let params = params.clone();
        let Some(inner_call) = single_return_call(arena, *body) else {
            continue;
        };

        let param_names: Vec<String> = params
            .iter()
            .filter_map(|&p| arena.ident_name(p).map(String::from))
            .collect();
        if param_names.len() != params.len() {
            continue;
        }

        // Inner callee must not depend on the wrapper's own parameters
        // (or recurse into the wrapper).
        let Some(NodeKind::Call {
            callee,
            arguments,
            is_new: false,
        }) = arena.kind(inner_call).cloned()
        else {
            continue;
        };
        let Some(callee_root) = member_chain_root(arena, callee) else {
            continue;
        };
        match table.binding_of(callee_root) {
            Some(root) if root == id => continue,
            Some(root) if matches!(table.binding(root).kind, BindingKind::Param) => continue,
            _ => {}
        }

        let mut arg_params = Vec::with_capacity(arguments.len());
        for &argument in &arguments {
            let argument = skip_parens(arena, argument);
            let Some(arg_binding) = table.binding_of(argument) else {
                continue 'bindings;
            };
            let position = params
                .iter()
                .position(|&p| table.binding_of(p) == Some(arg_binding));
            let Some(position) = position else {
                continue 'bindings;
            };
            // A parameter used twice would duplicate the call-site
            // argument expression.
            if arg_params.contains(&position) {
                continue 'bindings;
            }
            arg_params.push(position);
        }

        // Every reference must be a direct call with matching arity.
        let mut call_sites = Vec::with_capacity(binding.references.len());
        if binding.references.is_empty() {
            continue;
        }
        for &reference in &binding.references {
            let call = arena.parent(reference);
            let Some(NodeKind::Call {
                callee,
                arguments,
                is_new: false,
            }) = arena.kind(call)
            else {
                continue 'bindings;
            };
            if skip_parens(arena, *callee) != reference || arguments.len() != params.len() {
                continue 'bindings;
            }
            call_sites.push(call);
        }

        // The inner callee must mean the same thing at each call site.
        let callee_name = match arena.ident_name(callee_root) {
            Some(name) => name.to_string(),
            None => continue,
        };
        let Some(body_scope) = table.scope_of(callee_root) else {
            continue;
        };
        let meaning = table.resolve(body_scope, &callee_name);
        let diverges = call_sites.iter().any(|&site| match table.scope_of(site) {
            Some(scope) => table.resolve(scope, &callee_name) != meaning,
            None => true,
        });
        if diverges {
            continue;
        }

        candidates.push(Candidate {
            function,
            inner_call,
            arg_params,
            call_sites,
        });
    }

    let mut changes = 0;
    for candidate in candidates {
        let statement = arena.statement_parent(candidate.function);
        if statement.is_none() {
            continue;
        }
        for site in candidate.call_sites {
            let Some(NodeKind::Call { arguments, .. }) = arena.kind(site).cloned() else {
                continue;
            };
            // Build the replacement from a fresh copy of the inner call,
            // then swap each forwarded parameter for the site's argument.
            let clone = arena.clone_subtree(candidate.inner_call);
            let Some(NodeKind::Call {
                callee,
                arguments: inner_args,
                is_new,
            }) = arena.kind(clone).cloned()
            else {
                continue;
            };
            let mut substituted = Vec::with_capacity(inner_args.len());
            for (slot, _) in inner_args.iter().enumerate() {
                let position = candidate.arg_params[slot];
                substituted.push(arena.clone_subtree(arguments[position]));
            }
            arena.replace_kind(
                site,
                NodeKind::Call {
                    callee,
                    arguments: substituted,
                    is_new,
                },
            );
            changes += 1;
        }
        arena.remove_statement(statement);
        changes += 1;
        debug!("inlined forwarding function");
    }
    changes
}

/// The call expression of a `{ return f(...); }` body, if that is the
/// body's only statement.
fn single_return_call(arena: &NodeArena, body: NodeIndex) -> Option<NodeIndex> {
    let Some(NodeKind::Block { statements }) = arena.kind(body) else {
        return None;
    };
    if statements.len() != 1 {
        return None;
    }
    let Some(NodeKind::Return { argument }) = arena.kind(statements[0]) else {
        return None;
    };
    let call = skip_parens(arena, *argument);
    matches!(
        arena.kind(call),
        Some(NodeKind::Call { is_new: false, .. })
    )
    .then_some(call)
}
