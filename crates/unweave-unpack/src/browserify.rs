//! Browserify bundle recognition and module extraction.
//!
//! The browserify prelude is a three-argument call:
//!
//! ```text
//! (function e(t, n, r) { ... })(
//!   { 1: [function (require, module, exports) { ... }, { "./dep": 2 }] },
//!   {},
//!   [1]
//! );
//! ```
//!
//! The first argument maps ids to `[factory, depmap]` pairs; the depmap
//! translates the specifier strings a factory passes to `require` into
//! module ids. The third argument lists entry ids, first one first.

use rustc_hash::FxHashMap;
use tracing::debug;
use unweave_binder::{BinderState, BindingTable};
use unweave_parser::{NodeArena, NodeIndex, NodeKind};

use crate::bundle::{Bundle, BundleKind, Module, ModuleId};
use crate::detect::UnpackError;

/// Factory parameter order is `(require, module, exports)`.
pub const BROWSERIFY_PARAMS: [&str; 3] = ["require", "module", "exports"];

pub fn recognize(
    arena: &NodeArena,
    root: NodeIndex,
    _table: &BindingTable,
) -> Result<Option<Bundle>, UnpackError> {
    let Some(NodeKind::Program { statements }) = arena.kind(root) else {
        return Ok(None);
    };
    for &stmt in statements {
        let Some(NodeKind::ExprStatement { expression }) = arena.kind(stmt) else {
            continue;
        };
        let Some((map, entries_arg)) = prelude_parts(arena, *expression) else {
            continue;
        };
        let Some(raw_modules) = module_map_entries(arena, map) else {
            continue;
        };
        let entry = first_entry_id(arena, entries_arg);
        debug!(
            modules = raw_modules.len(),
            entry = entry.as_deref(),
            "recognized browserify bundle"
        );
        let mut modules = Vec::with_capacity(raw_modules.len());
        for (id, factory, depmap) in raw_modules {
            let mut module = crate::bundle::extract_module(
                arena,
                &id,
                factory,
                &BROWSERIFY_PARAMS,
            )?;
            if !depmap.is_empty() {
                rewrite_dep_specifiers(&mut module, &depmap);
            }
            modules.push(module);
        }
        return Ok(Some(Bundle::new(
            BundleKind::Browserify,
            modules,
            entry.map(ModuleId),
        )));
    }
    Ok(None)
}

/// Peel a statement down to the prelude call, yielding the module map
/// and the entry list arguments.
fn prelude_parts(arena: &NodeArena, mut expression: NodeIndex) -> Option<(NodeIndex, NodeIndex)> {
    loop {
        match arena.kind(expression) {
            Some(NodeKind::Paren { expression: inner }) => expression = *inner,
            Some(NodeKind::Unary {
                prefix: true,
                operand,
                ..
            }) => expression = *operand,
            _ => break,
        }
    }
    let Some(NodeKind::Call {
        callee,
        arguments,
        is_new: false,
    }) = arena.kind(expression)
    else {
        return None;
    };
    if arguments.len() != 3 {
        return None;
    }
    let mut callee = *callee;
    loop {
        match arena.kind(callee) {
            Some(NodeKind::Paren { expression: inner }) => callee = *inner,
            // `require = (function () { return loader; })()(...)` style
            // preludes resolve the loader through an inner call.
            Some(NodeKind::Call {
                callee: inner,
                arguments,
                ..
            }) if arguments.is_empty() => callee = *inner,
            _ => break,
        }
    }
    if !matches!(arena.kind(callee), Some(NodeKind::Function { .. })) {
        return None;
    }
    Some((arguments[0], arguments[2]))
}

type RawModule = (String, NodeIndex, FxHashMap<String, String>);

/// `{ id: [factory, depmap], ... }` entries.
fn module_map_entries(arena: &NodeArena, map: NodeIndex) -> Option<Vec<RawModule>> {
    let mut map = map;
    while let Some(NodeKind::Paren { expression }) = arena.kind(map) {
        map = *expression;
    }
    let Some(NodeKind::Object { properties }) = arena.kind(map) else {
        return None;
    };
    let mut entries = Vec::with_capacity(properties.len());
    for &property in properties {
        let Some(NodeKind::Property {
            key,
            value,
            computed: false,
            ..
        }) = arena.kind(property)
        else {
            return None;
        };
        let id = arena
            .ident_name(*key)
            .map(String::from)
            .or_else(|| arena.literal_id_text(*key))?;
        let Some(NodeKind::Array { elements }) = arena.kind(*value) else {
            return None;
        };
        if elements.len() != 2 {
            return None;
        }
        let factory = elements[0];
        let Some(NodeKind::Function { params, .. }) = arena.kind(factory) else {
            return None;
        };
        if params.len() > 3 {
            return None;
        }
        entries.push((id, factory, parse_depmap(arena, elements[1])?));
    }
    (!entries.is_empty()).then_some(entries)
}

/// `{ "./dep": 2, ... }` specifier-to-id pairs.
fn parse_depmap(arena: &NodeArena, object: NodeIndex) -> Option<FxHashMap<String, String>> {
    let Some(NodeKind::Object { properties }) = arena.kind(object) else {
        return None;
    };
    let mut depmap = FxHashMap::default();
    for &property in properties {
        let Some(NodeKind::Property {
            key,
            value,
            computed: false,
            ..
        }) = arena.kind(property)
        else {
            return None;
        };
        let specifier = arena
            .ident_name(*key)
            .map(String::from)
            .or_else(|| arena.literal_id_text(*key))?;
        let id = arena.literal_id_text(*value)?;
        depmap.insert(specifier, id);
    }
    Some(depmap)
}

fn first_entry_id(arena: &NodeArena, entries_arg: NodeIndex) -> Option<String> {
    let mut entries_arg = entries_arg;
    while let Some(NodeKind::Paren { expression }) = arena.kind(entries_arg) {
        entries_arg = *expression;
    }
    let Some(NodeKind::Array { elements }) = arena.kind(entries_arg) else {
        return None;
    };
    elements
        .first()
        .and_then(|&element| arena.literal_id_text(element))
}

/// Rewrite each `require("<specifier>")` in an extracted module to the
/// module id its depmap names, so requires line up with bundle keys.
fn rewrite_dep_specifiers(module: &mut Module, depmap: &FxHashMap<String, String>) {
    let table = BinderState::bind_with_implicit(&module.arena, module.root, &BROWSERIFY_PARAMS);
    let Some(require) = table.lookup_root("require") else {
        return;
    };
    let mut rewrites = Vec::new();
    for &reference in &table.binding(require).references {
        let call = module.arena.parent(reference);
        let Some(NodeKind::Call {
            callee, arguments, ..
        }) = module.arena.kind(call)
        else {
            continue;
        };
        if *callee != reference || arguments.len() != 1 {
            continue;
        }
        let argument = arguments[0];
        let Some(NodeKind::Str { value }) = module.arena.kind(argument) else {
            continue;
        };
        if let Some(id) = depmap.get(value) {
            rewrites.push((argument, id.clone()));
        }
    }
    for (argument, id) in rewrites {
        module.arena.replace_kind(argument, NodeKind::Str { value: id });
    }
}
