//! Webpack bundle recognition and module extraction.
//!
//! Two runtime shapes are recognized. The classic form passes a module
//! map to an immediately invoked runtime:
//!
//! ```text
//! (function (modules) { ... __webpack_require__.s = 0 ... })({
//!   0: function (module, exports, require) { ... },
//! });
//! ```
//!
//! The loader-variable form keeps the map in a top-level variable and
//! calls a separate loader function with the entry id.

use tracing::debug;
use unweave_binder::BindingTable;
use unweave_matcher::{Captures, Slot, m};
use unweave_parser::{NodeArena, NodeIndex, NodeKind};

use crate::bundle::{Bundle, BundleKind, Module, ModuleId};
use crate::detect::UnpackError;

/// Canonical names for the factory's positional parameters
/// `(module, exports, require)`.
pub const WEBPACK_PARAMS: [&str; 3] = [
    "__webpack_module__",
    "__webpack_exports__",
    "__webpack_require__",
];

pub fn recognize(
    arena: &NodeArena,
    root: NodeIndex,
    table: &BindingTable,
) -> Result<Option<Bundle>, UnpackError> {
    if let Some(bundle) = iife_bundle(arena, root)? {
        return Ok(Some(bundle));
    }
    loader_var_bundle(arena, root, table)
}

/// The immediately-invoked runtime form: a single-parameter function
/// applied to a module map, whose body indexes that parameter.
fn iife_bundle(arena: &NodeArena, root: NodeIndex) -> Result<Option<Bundle>, UnpackError> {
    let Some(NodeKind::Program { statements }) = arena.kind(root) else {
        return Ok(None);
    };
    for &stmt in statements {
        let Some(NodeKind::ExprStatement { expression }) = arena.kind(stmt) else {
            continue;
        };
        let Some((runtime, map)) = iife_parts(arena, *expression) else {
            continue;
        };
        let Some(NodeKind::Function { params, body, .. }) = arena.kind(runtime) else {
            continue;
        };
        if params.len() != 1 || !body_indexes_param(arena, *body, params[0]) {
            continue;
        }
        let Some(entries) = module_map_entries(arena, map) else {
            continue;
        };
        let entry = find_entry_assignment(arena, *body);
        debug!(
            modules = entries.len(),
            entry = entry.as_deref(),
            "recognized webpack iife bundle"
        );
        let mut modules = Vec::with_capacity(entries.len());
        for (id, factory) in entries {
            modules.push(crate::bundle::extract_module(
                arena,
                &id,
                factory,
                &WEBPACK_PARAMS,
            )?);
        }
        return Ok(Some(Bundle::new(
            BundleKind::Webpack,
            modules,
            entry.map(ModuleId),
        )));
    }
    Ok(None)
}

/// Peel an expression statement down to `(function (m) {...})(map)`,
/// tolerating wrapping parens and a `!`-style prefix.
fn iife_parts(arena: &NodeArena, mut expression: NodeIndex) -> Option<(NodeIndex, NodeIndex)> {
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
    if arguments.len() != 1 {
        return None;
    }
    let mut callee = *callee;
    while let Some(NodeKind::Paren { expression: inner }) = arena.kind(callee) {
        callee = *inner;
    }
    matches!(arena.kind(callee), Some(NodeKind::Function { .. }))
        .then_some((callee, arguments[0]))
}

/// The runtime body must read `param[something]` somewhere; that access
/// is what distinguishes a module-loading runtime from an ordinary iife.
fn body_indexes_param(arena: &NodeArena, body: NodeIndex, param: NodeIndex) -> bool {
    arena
        .ident_name(param)
        .is_some_and(|name| body_indexes_name(arena, body, name))
}

/// Does `body` contain a computed `name[...]` read anywhere?
fn body_indexes_name(arena: &NodeArena, body: NodeIndex, name: &str) -> bool {
    let mut found = false;
    arena.walk(body, &mut |idx| {
        if found {
            return;
        }
        if let Some(NodeKind::Member {
            object,
            computed: true,
            ..
        }) = arena.kind(idx)
            && arena.ident_name(*object) == Some(name)
        {
            found = true;
        }
    });
    found
}

/// The runtime marks its entry as `<loader>.s = <id>`.
fn find_entry_assignment(arena: &NodeArena, body: NodeIndex) -> Option<String> {
    let id = Slot(0);
    let pattern = m::assign(m::member(m::any(), m::ident("s")), m::capture(id, m::any()));
    let mut entry = None;
    arena.walk(body, &mut |idx| {
        if entry.is_some() {
            return;
        }
        let mut caps = Captures::with_slots(1);
        if pattern.matches(arena, idx, &mut caps)
            && let Some(value) = caps.node(id)
        {
            entry = arena.literal_id_text(value);
        }
    });
    entry
}

/// `(id, factory)` pairs of a module map: an object of functions keyed
/// by identifier or literal ids, or an array of functions indexed by
/// position.
fn module_map_entries(arena: &NodeArena, map: NodeIndex) -> Option<Vec<(String, NodeIndex)>> {
    let mut map = map;
    while let Some(NodeKind::Paren { expression }) = arena.kind(map) {
        map = *expression;
    }
    match arena.kind(map) {
        Some(NodeKind::Object { properties }) => {
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
                if !is_factory(arena, *value) {
                    return None;
                }
                entries.push((id, *value));
            }
            (!entries.is_empty()).then_some(entries)
        }
        Some(NodeKind::Array { elements }) => {
            let mut entries = Vec::with_capacity(elements.len());
            for (index, &element) in elements.iter().enumerate() {
                if !is_factory(arena, element) {
                    return None;
                }
                entries.push((index.to_string(), element));
            }
            (!entries.is_empty()).then_some(entries)
        }
        _ => None,
    }
}

/// A module factory takes at most `(module, exports, require)`.
fn is_factory(arena: &NodeArena, node: NodeIndex) -> bool {
    matches!(
        arena.kind(node),
        Some(NodeKind::Function { params, .. }) if params.len() <= 3
    )
}

/// The loader-variable form: the module map lives in a top-level
/// variable and a distinct top-level binding is called with the entry
/// id.
fn loader_var_bundle(
    arena: &NodeArena,
    root: NodeIndex,
    table: &BindingTable,
) -> Result<Option<Bundle>, UnpackError> {
    let Some(NodeKind::Program { statements }) = arena.kind(root) else {
        return Ok(None);
    };

    let mut map: Option<(NodeIndex, Vec<(String, NodeIndex)>)> = None;
    for &stmt in statements {
        let Some(NodeKind::VarStatement { declarations, .. }) = arena.kind(stmt) else {
            continue;
        };
        for &declarator in declarations {
            let Some(NodeKind::VarDeclarator { name, init }) = arena.kind(declarator) else {
                continue;
            };
            if !matches!(arena.kind(*init), Some(NodeKind::Object { .. })) {
                continue;
            }
            if let Some(entries) = module_map_entries(arena, *init) {
                map = Some((*name, entries));
                break;
            }
        }
        if map.is_some() {
            break;
        }
    }
    let Some((map_name, entries)) = map else {
        return Ok(None);
    };
    let Some(map_text) = arena.ident_name(map_name) else {
        return Ok(None);
    };
    let map_binding = table.binding_of(map_name);

    // The kickoff call names the entry module; its callee must be a
    // local loader function that actually indexes the module map, or
    // this is just an ordinary program with an object of functions.
    let callee_slot = Slot(0);
    let id_slot = Slot(1);
    let kickoff = m::call(
        m::capture(callee_slot, m::any_ident(None)),
        Some(vec![m::capture(id_slot, m::any())]),
    );
    let mut entry = None;
    for &stmt in statements {
        let Some(NodeKind::ExprStatement { expression }) = arena.kind(stmt) else {
            continue;
        };
        let mut caps = Captures::with_slots(2);
        if !kickoff.matches(arena, *expression, &mut caps) {
            continue;
        }
        let (Some(callee), Some(argument)) = (caps.node(callee_slot), caps.node(id_slot)) else {
            continue;
        };
        let Some(callee_binding) = table.binding_of(callee) else {
            continue;
        };
        if Some(callee_binding) == map_binding {
            continue;
        }
        if !loader_indexes_map(arena, table.binding(callee_binding).declaration, map_text) {
            continue;
        }
        if let Some(id) = arena.literal_id_text(argument) {
            entry = Some(id);
            break;
        }
    }
    let Some(entry) = entry else {
        return Ok(None);
    };

    debug!(
        modules = entries.len(),
        entry = entry.as_str(),
        "recognized webpack loader-variable bundle"
    );
    let mut modules: Vec<Module> = Vec::with_capacity(entries.len());
    for (id, factory) in entries {
        modules.push(crate::bundle::extract_module(
            arena,
            &id,
            factory,
            &WEBPACK_PARAMS,
        )?);
    }
    Ok(Some(Bundle::new(
        BundleKind::Webpack,
        modules,
        Some(ModuleId(entry)),
    )))
}

/// The kickoff callee declaration, as a function declaration or a
/// function-valued variable, whose body indexes the map variable.
fn loader_indexes_map(arena: &NodeArena, declaration: NodeIndex, map_name: &str) -> bool {
    let function = match arena.kind(declaration) {
        Some(NodeKind::Function { .. }) => declaration,
        Some(NodeKind::VarDeclarator { init, .. }) => *init,
        _ => return false,
    };
    let Some(NodeKind::Function { body, .. }) = arena.kind(function) else {
        return false;
    };
    body_indexes_name(arena, *body, map_name)
}
