//! Lexical scope and binding analysis.
//!
//! The binder builds a `BindingTable` over an arena AST: a parent-chained
//! scope arena plus one `Binding` per declaration site, carrying the
//! ordered list of non-owning reference sites. The table is an index over
//! the tree — any bulk structural edit that does not go through a
//! binding-aware rewrite invalidates it, and callers rebuild ("crawl")
//! by binding again.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use tracing::debug;
use unweave_parser::{NodeArena, NodeIndex, NodeKind, VarKind};

/// Index into the scope arena; the zero value is the root (program) scope.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BindingId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ContainerKind {
    Program,
    Function,
    Block,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BindingKind {
    Var,
    Let,
    Const,
    Function,
    Param,
    /// Program-scope name supplied by the caller (extracted module
    /// factory parameters such as `__webpack_require__`).
    Implicit,
}

#[derive(Debug)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub kind: ContainerKind,
    /// Node that introduced this scope (program, function, or block).
    pub node: NodeIndex,
    pub bindings: FxHashMap<String, BindingId>,
}

/// Declaration-site record: name, declaring node, and every reference.
#[derive(Debug)]
pub struct Binding {
    pub name: String,
    pub scope: ScopeId,
    pub kind: BindingKind,
    /// Declaring node: the `VarDeclarator`, `Function`, or param `Ident`;
    /// NONE for implicit bindings.
    pub declaration: NodeIndex,
    /// The declared name's `Ident` node; NONE for implicit bindings.
    pub name_node: NodeIndex,
    /// Identifier nodes referencing this binding, in traversal order.
    pub references: SmallVec<[NodeIndex; 4]>,
    /// Subset of `references` that are assignment targets.
    pub writes: SmallVec<[NodeIndex; 2]>,
}

impl Binding {
    pub fn reference_count(&self) -> usize {
        self.references.len()
    }
}

/// Rename/rewrite precondition failures. These are the fatal outcome of
/// the error model: the tree is left untouched and the caller aborts the
/// module's transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    /// The new name is already bound in the declaring scope.
    Collision { name: String },
    /// A reference would resolve the new name to a different binding.
    WouldShadow { name: String },
}

impl std::fmt::Display for BindError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindError::Collision { name } => {
                write!(f, "rename target '{name}' collides with an existing binding")
            }
            BindError::WouldShadow { name } => {
                write!(f, "rename target '{name}' would be shadowed at a reference site")
            }
        }
    }
}

impl std::error::Error for BindError {}

#[derive(Debug, Default)]
pub struct BindingTable {
    scopes: Vec<Scope>,
    bindings: Vec<Binding>,
    pub root_scope: ScopeId,
    node_scopes: FxHashMap<u32, ScopeId>,
    node_bindings: FxHashMap<u32, BindingId>,
    all_names: FxHashSet<String>,
}

impl BindingTable {
    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    pub fn binding(&self, id: BindingId) -> &Binding {
        &self.bindings[id.0 as usize]
    }

    pub fn binding_mut(&mut self, id: BindingId) -> &mut Binding {
        &mut self.bindings[id.0 as usize]
    }

    pub fn binding_ids(&self) -> impl Iterator<Item = BindingId> + '_ {
        (0..self.bindings.len() as u32).map(BindingId)
    }

    /// Scope containing `node`.
    pub fn scope_of(&self, node: NodeIndex) -> Option<ScopeId> {
        self.node_scopes.get(&node.0).copied()
    }

    /// Binding a declared-name or reference identifier resolves to.
    pub fn binding_of(&self, ident: NodeIndex) -> Option<BindingId> {
        self.node_bindings.get(&ident.0).copied()
    }

    /// Walk the scope chain resolving `name`.
    pub fn resolve(&self, scope: ScopeId, name: &str) -> Option<BindingId> {
        let mut current = Some(scope);
        let mut walked = 0usize;
        while let Some(id) = current {
            if let Some(&binding) = self.scope(id).bindings.get(name) {
                return Some(binding);
            }
            current = self.scope(id).parent;
            walked += 1;
            if walked > unweave_common::limits::MAX_SCOPE_WALK {
                break;
            }
        }
        None
    }

    pub fn has_binding(&self, scope: ScopeId, name: &str) -> bool {
        self.resolve(scope, name).is_some()
    }

    /// Resolve in the root (program) scope only.
    pub fn lookup_root(&self, name: &str) -> Option<BindingId> {
        self.scope(self.root_scope).bindings.get(name).copied()
    }

    /// Generate a fresh name based on `base` that collides with nothing
    /// in the table, and reserve it.
    pub fn generate_uid(&mut self, base: &str) -> String {
        let base = format!("_{}", base.trim_start_matches('_'));
        if !self.all_names.contains(&base) {
            self.all_names.insert(base.clone());
            return base;
        }
        for n in 1..unweave_common::limits::MAX_UID_ATTEMPTS {
            let candidate = format!("{base}{n}");
            if !self.all_names.contains(&candidate) {
                self.all_names.insert(candidate.clone());
                return candidate;
            }
        }
        // Unreachable with the attempt cap sized to the limit constant.
        base
    }

    /// Rename a binding and all its references in place (the binding-aware
    /// counterpart of a crawl-invalidating edit).
    ///
    /// Fails without touching the tree when the new name is already bound
    /// in the declaring scope or would resolve differently at any
    /// reference site.
    pub fn rename_binding(
        &mut self,
        arena: &mut NodeArena,
        id: BindingId,
        new_name: &str,
    ) -> Result<(), BindError> {
        let binding = self.binding(id);
        let scope = binding.scope;
        if binding.name == new_name {
            return Ok(());
        }
        if self.scope(scope).bindings.contains_key(new_name) {
            return Err(BindError::Collision {
                name: new_name.to_string(),
            });
        }
        for &reference in &self.binding(id).references {
            if let Some(ref_scope) = self.scope_of(reference)
                && self.resolve(ref_scope, new_name).is_some()
            {
                return Err(BindError::WouldShadow {
                    name: new_name.to_string(),
                });
            }
        }

        let old_name = self.binding(id).name.clone();
        let name_node = self.binding(id).name_node;
        let references: Vec<NodeIndex> = self.binding(id).references.iter().copied().collect();
        if name_node.is_some() {
            arena.set_ident_name(name_node, new_name);
        }
        for reference in references {
            arena.set_ident_name(reference, new_name);
        }
        let scope_map = &mut self.scopes[scope.0 as usize].bindings;
        scope_map.remove(&old_name);
        scope_map.insert(new_name.to_string(), id);
        self.bindings[id.0 as usize].name = new_name.to_string();
        self.all_names.insert(new_name.to_string());
        debug!(%old_name, %new_name, "renamed binding");
        Ok(())
    }
}

/// Two-phase binder: scope/declaration construction first, then reference
/// resolution against the finished scope tree. The second phase is what
/// makes `var` and function-declaration hoisting come out right.
pub struct BinderState {
    table: BindingTable,
    scope_stack: Vec<ScopeId>,
}

impl BinderState {
    pub fn bind(arena: &NodeArena, root: NodeIndex) -> BindingTable {
        Self::bind_with_implicit(arena, root, &[])
    }

    /// Bind, pre-declaring `implicit` names in the program scope. Used for
    /// extracted modules whose factory parameters have no declaration
    /// inside the standalone program.
    pub fn bind_with_implicit(
        arena: &NodeArena,
        root: NodeIndex,
        implicit: &[&str],
    ) -> BindingTable {
        let mut state = BinderState {
            table: BindingTable::default(),
            scope_stack: Vec::new(),
        };
        let root_scope = state.push_scope(ContainerKind::Program, root, None);
        state.table.root_scope = root_scope;
        for name in implicit {
            state.declare(name, BindingKind::Implicit, NodeIndex::NONE, NodeIndex::NONE, root_scope);
        }
        state.collect_declarations(arena, root);
        state.scope_stack.clear();
        state.scope_stack.push(root_scope);
        state.resolve_references(arena, root, false);
        debug!(
            scopes = state.table.scopes.len(),
            bindings = state.table.bindings.len(),
            "bound program"
        );
        state.table
    }

    fn push_scope(
        &mut self,
        kind: ContainerKind,
        node: NodeIndex,
        parent: Option<ScopeId>,
    ) -> ScopeId {
        let id = ScopeId(self.table.scopes.len() as u32);
        self.table.scopes.push(Scope {
            parent,
            kind,
            node,
            bindings: FxHashMap::default(),
        });
        self.scope_stack.push(id);
        id
    }

    fn current_scope(&self) -> ScopeId {
        *self.scope_stack.last().expect("scope stack never empty")
    }

    /// Nearest enclosing function or program scope (the `var` target).
    fn hoist_scope(&self) -> ScopeId {
        for &scope in self.scope_stack.iter().rev() {
            if self.table.scope(scope).kind != ContainerKind::Block {
                return scope;
            }
        }
        self.table.root_scope
    }

    fn declare(
        &mut self,
        name: &str,
        kind: BindingKind,
        declaration: NodeIndex,
        name_node: NodeIndex,
        scope: ScopeId,
    ) -> BindingId {
        self.table.all_names.insert(name.to_string());
        if let Some(&existing) = self.table.scope(scope).bindings.get(name) {
            // Redeclaration (var twice, or function overriding var):
            // keep the first binding record, update its declaring node.
            let binding = self.table.binding_mut(existing);
            if binding.declaration.is_none() {
                binding.declaration = declaration;
                binding.name_node = name_node;
            }
            if name_node.is_some() {
                self.table.node_bindings.insert(name_node.0, existing);
            }
            return existing;
        }
        let id = BindingId(self.table.bindings.len() as u32);
        self.table.bindings.push(Binding {
            name: name.to_string(),
            scope,
            kind,
            declaration,
            name_node,
            references: SmallVec::new(),
            writes: SmallVec::new(),
        });
        self.table.scopes[scope.0 as usize]
            .bindings
            .insert(name.to_string(), id);
        if name_node.is_some() {
            self.table.node_bindings.insert(name_node.0, id);
        }
        id
    }

    // ==================== Phase 1: scopes & declarations ====================

    fn collect_declarations(&mut self, arena: &NodeArena, idx: NodeIndex) {
        let Some(node) = arena.get(idx) else { return };
        self.table.node_scopes.insert(idx.0, self.current_scope());

        match &node.kind {
            NodeKind::Function {
                name,
                params,
                body,
                is_expression,
                ..
            } => {
                // Declarations bind in the enclosing scope; expression
                // names only inside the function itself.
                if name.is_some() {
                    let fn_name = arena.ident_name(*name).unwrap_or("").to_string();
                    if !is_expression {
                        let scope = self.hoist_scope();
                        self.declare(&fn_name, BindingKind::Function, idx, *name, scope);
                    }
                }
                let parent = Some(self.current_scope());
                let scope = self.push_scope(ContainerKind::Function, idx, parent);
                if *is_expression && name.is_some() {
                    let fn_name = arena.ident_name(*name).unwrap_or("").to_string();
                    self.declare(&fn_name, BindingKind::Function, idx, *name, scope);
                }
                for &param in params {
                    let param_name = arena.ident_name(param).unwrap_or("").to_string();
                    self.declare(&param_name, BindingKind::Param, param, param, scope);
                    self.table.node_scopes.insert(param.0, scope);
                }
                // The body block shares the function scope.
                if let Some(NodeKind::Block { statements }) = arena.kind(*body) {
                    self.table.node_scopes.insert(body.0, scope);
                    for &stmt in statements.clone().iter() {
                        self.collect_declarations(arena, stmt);
                    }
                } else {
                    self.collect_declarations(arena, *body);
                }
                self.scope_stack.pop();
            }
            NodeKind::Block { statements } => {
                let parent = Some(self.current_scope());
                self.push_scope(ContainerKind::Block, idx, parent);
                self.table.node_scopes.insert(idx.0, self.current_scope());
                for &stmt in statements.clone().iter() {
                    self.collect_declarations(arena, stmt);
                }
                self.scope_stack.pop();
            }
            NodeKind::VarStatement { kind, declarations } => {
                let (binding_kind, scope) = match kind {
                    VarKind::Var => (BindingKind::Var, self.hoist_scope()),
                    VarKind::Let => (BindingKind::Let, self.current_scope()),
                    VarKind::Const => (BindingKind::Const, self.current_scope()),
                };
                for &declarator in declarations.clone().iter() {
                    self.table.node_scopes.insert(declarator.0, self.current_scope());
                    if let Some(NodeKind::VarDeclarator { name, init }) = arena.kind(declarator) {
                        let (name, init) = (*name, *init);
                        let var_name = arena.ident_name(name).unwrap_or("").to_string();
                        self.declare(&var_name, binding_kind, declarator, name, scope);
                        self.table.node_scopes.insert(name.0, self.current_scope());
                        self.collect_declarations(arena, init);
                    }
                }
            }
            _ => {
                let mut children = Vec::new();
                node.kind.for_each_child(|c| children.push(c));
                for child in children {
                    self.collect_declarations(arena, child);
                }
            }
        }
    }

    // ==================== Phase 2: references ====================

    fn record_reference(&mut self, arena: &NodeArena, ident: NodeIndex, is_write: bool) {
        let Some(name) = arena.ident_name(ident) else {
            return;
        };
        let scope = self
            .table
            .scope_of(ident)
            .unwrap_or(self.table.root_scope);
        if let Some(id) = self.table.resolve(scope, name) {
            self.table.node_bindings.insert(ident.0, id);
            let binding = self.table.binding_mut(id);
            binding.references.push(ident);
            if is_write {
                binding.writes.push(ident);
            }
        }
    }

    fn resolve_references(&mut self, arena: &NodeArena, idx: NodeIndex, is_write: bool) {
        let Some(node) = arena.get(idx) else { return };
        match &node.kind {
            NodeKind::Ident { .. } => self.record_reference(arena, idx, is_write),
            NodeKind::Member {
                object,
                property,
                computed,
            } => {
                self.resolve_references(arena, *object, false);
                if *computed {
                    self.resolve_references(arena, *property, false);
                }
            }
            NodeKind::Property {
                key,
                value,
                computed,
                ..
            } => {
                if *computed {
                    self.resolve_references(arena, *key, false);
                }
                self.resolve_references(arena, *value, false);
            }
            NodeKind::Assign { op, left, right } => {
                // Assignment targets are still references (writes).
                if matches!(arena.kind(*left), Some(NodeKind::Ident { .. })) {
                    self.record_reference(arena, *left, true);
                } else {
                    self.resolve_references(arena, *left, false);
                }
                let _ = op;
                self.resolve_references(arena, *right, false);
            }
            NodeKind::VarDeclarator { init, .. } => {
                // The declared name is not a reference.
                self.resolve_references(arena, *init, false);
            }
            NodeKind::Function { params: _, body, .. } => {
                // Name and params are declarations.
                self.resolve_references(arena, *body, false);
            }
            NodeKind::ImportSpecifier { .. } => {}
            NodeKind::ExportSpecifier {
                local, namespace, ..
            } => {
                // `export { local as exported }` without a source reads the
                // local binding; re-exports from another module do not.
                let parent = arena.parent(idx);
                let from_other_module = matches!(
                    arena.kind(parent),
                    Some(NodeKind::ExportNamed { source, .. }) if source.is_some()
                );
                if !namespace && !from_other_module {
                    self.resolve_references(arena, *local, false);
                }
            }
            NodeKind::ImportDecl { .. } => {}
            _ => {
                let mut children = Vec::new();
                node.kind.for_each_child(|c| children.push(c));
                for child in children {
                    self.resolve_references(arena, child, false);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unweave_parser::parse;

    #[test]
    fn test_empty_table_root_scope_is_zero() {
        let table = BindingTable::default();
        assert_eq!(table.root_scope, ScopeId(0));
        let (arena, root, _) = parse("t.js", "var a = 1;");
        let bound = BinderState::bind(&arena, root);
        assert_eq!(bound.root_scope, ScopeId(0));
    }

    #[test]
    fn test_uid_generation() {
        let (arena, root, _) = parse("t.js", "var _foo = 1;");
        let mut table = BinderState::bind(&arena, root);
        let uid = table.generate_uid("foo");
        assert_eq!(uid, "_foo1", "base taken, numbered uid expected");
        let uid2 = table.generate_uid("bar");
        assert_eq!(uid2, "_bar");
    }
}
