//! Arena-allocated AST nodes.
//!
//! Nodes live in a `NodeArena` and refer to each other through stable
//! `NodeIndex` ids; every node is exclusively owned by its parent within
//! one program root. Structural edits detach children from their parent's
//! list — detached nodes stay in the arena as tombstones, which keeps all
//! outstanding indexes (scope bindings, reference lists) stable.

/// Stable id of a node inside one `NodeArena`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    pub const NONE: NodeIndex = NodeIndex(u32::MAX);

    #[inline]
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    #[inline]
    pub fn is_some(self) -> bool {
        self != Self::NONE
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VarKind {
    Var,
    Let,
    Const,
}

impl VarKind {
    pub fn keyword(self) -> &'static str {
        match self {
            VarKind::Var => "var",
            VarKind::Let => "let",
            VarKind::Const => "const",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ImportKind {
    Default,
    Named,
    Namespace,
}

/// Node payload. One closed variant set covering the JavaScript subset
/// bundles use plus the import/export declarations the reconstructor
/// synthesizes.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Program {
        statements: Vec<NodeIndex>,
    },

    // Expressions
    Ident {
        name: String,
    },
    Number {
        text: String,
    },
    Str {
        value: String,
    },
    Bool {
        value: bool,
    },
    Null,
    This,
    Array {
        elements: Vec<NodeIndex>,
    },
    Object {
        properties: Vec<NodeIndex>,
    },
    /// Object literal entry. `key` is an `Ident`, `Str`, `Number`, or an
    /// arbitrary expression when `computed`.
    Property {
        key: NodeIndex,
        value: NodeIndex,
        computed: bool,
        shorthand: bool,
    },
    /// Function declaration, function expression, or arrow function.
    /// Arrow bodies may be a `Block` or a bare expression.
    Function {
        name: NodeIndex,
        params: Vec<NodeIndex>,
        body: NodeIndex,
        is_arrow: bool,
        is_expression: bool,
    },
    Call {
        callee: NodeIndex,
        arguments: Vec<NodeIndex>,
        is_new: bool,
    },
    Member {
        object: NodeIndex,
        property: NodeIndex,
        computed: bool,
    },
    Assign {
        op: &'static str,
        left: NodeIndex,
        right: NodeIndex,
    },
    Binary {
        op: &'static str,
        left: NodeIndex,
        right: NodeIndex,
    },
    Unary {
        op: &'static str,
        operand: NodeIndex,
        prefix: bool,
    },
    Conditional {
        condition: NodeIndex,
        when_true: NodeIndex,
        when_false: NodeIndex,
    },
    Sequence {
        expressions: Vec<NodeIndex>,
    },
    Paren {
        expression: NodeIndex,
    },

    // Statements
    VarStatement {
        kind: VarKind,
        declarations: Vec<NodeIndex>,
    },
    VarDeclarator {
        name: NodeIndex,
        init: NodeIndex,
    },
    Return {
        argument: NodeIndex,
    },
    ExprStatement {
        expression: NodeIndex,
    },
    If {
        condition: NodeIndex,
        then_branch: NodeIndex,
        else_branch: NodeIndex,
    },
    Block {
        statements: Vec<NodeIndex>,
    },
    While {
        condition: NodeIndex,
        body: NodeIndex,
    },
    For {
        init: NodeIndex,
        test: NodeIndex,
        update: NodeIndex,
        body: NodeIndex,
    },
    Break,
    Continue,
    Empty,
    /// Standalone comment statement, used for diagnostic markers left in
    /// place of patterns the reconstructor cannot represent.
    CommentStmt {
        text: String,
    },

    // Module items
    ImportDecl {
        specifiers: Vec<NodeIndex>,
        source: NodeIndex,
    },
    ImportSpecifier {
        kind: ImportKind,
        /// Remote name for named imports; NONE for default/namespace.
        imported: NodeIndex,
        local: NodeIndex,
    },
    /// `export var x = 1;`, `export { a as b };`, `export { a } from 'id'`,
    /// `export * as ns from 'id'` (namespace specifier).
    ExportNamed {
        declaration: NodeIndex,
        specifiers: Vec<NodeIndex>,
        source: NodeIndex,
    },
    ExportSpecifier {
        local: NodeIndex,
        exported: NodeIndex,
        /// `* as exported` re-export.
        namespace: bool,
    },
    ExportDefault {
        declaration: NodeIndex,
    },
}

impl NodeKind {
    /// Visit every child index in source order.
    pub fn for_each_child(&self, mut f: impl FnMut(NodeIndex)) {
        use NodeKind::*;
        let mut one = |idx: NodeIndex, f: &mut dyn FnMut(NodeIndex)| {
            if idx.is_some() {
                f(idx);
            }
        };
        match self {
            Program { statements } | Block { statements } => {
                statements.iter().for_each(|&s| one(s, &mut f));
            }
            Array { elements } => elements.iter().for_each(|&e| one(e, &mut f)),
            Object { properties } => properties.iter().for_each(|&p| one(p, &mut f)),
            Property { key, value, .. } => {
                one(*key, &mut f);
                one(*value, &mut f);
            }
            Function {
                name, params, body, ..
            } => {
                one(*name, &mut f);
                params.iter().for_each(|&p| one(p, &mut f));
                one(*body, &mut f);
            }
            Call {
                callee, arguments, ..
            } => {
                one(*callee, &mut f);
                arguments.iter().for_each(|&a| one(a, &mut f));
            }
            Member {
                object, property, ..
            } => {
                one(*object, &mut f);
                one(*property, &mut f);
            }
            Assign { left, right, .. } | Binary { left, right, .. } => {
                one(*left, &mut f);
                one(*right, &mut f);
            }
            Unary { operand, .. } => one(*operand, &mut f),
            Conditional {
                condition,
                when_true,
                when_false,
            } => {
                one(*condition, &mut f);
                one(*when_true, &mut f);
                one(*when_false, &mut f);
            }
            Sequence { expressions } => expressions.iter().for_each(|&e| one(e, &mut f)),
            Paren { expression } | ExprStatement { expression } => one(*expression, &mut f),
            VarStatement { declarations, .. } => {
                declarations.iter().for_each(|&d| one(d, &mut f));
            }
            VarDeclarator { name, init } => {
                one(*name, &mut f);
                one(*init, &mut f);
            }
            Return { argument } => one(*argument, &mut f),
            If {
                condition,
                then_branch,
                else_branch,
            } => {
                one(*condition, &mut f);
                one(*then_branch, &mut f);
                one(*else_branch, &mut f);
            }
            While { condition, body } => {
                one(*condition, &mut f);
                one(*body, &mut f);
            }
            For {
                init,
                test,
                update,
                body,
            } => {
                one(*init, &mut f);
                one(*test, &mut f);
                one(*update, &mut f);
                one(*body, &mut f);
            }
            ImportDecl { specifiers, source } => {
                specifiers.iter().for_each(|&s| one(s, &mut f));
                one(*source, &mut f);
            }
            ImportSpecifier {
                imported, local, ..
            } => {
                one(*imported, &mut f);
                one(*local, &mut f);
            }
            ExportNamed {
                declaration,
                specifiers,
                source,
            } => {
                one(*declaration, &mut f);
                specifiers.iter().for_each(|&s| one(s, &mut f));
                one(*source, &mut f);
            }
            ExportSpecifier {
                local, exported, ..
            } => {
                one(*local, &mut f);
                one(*exported, &mut f);
            }
            ExportDefault { declaration } => one(*declaration, &mut f),
            Ident { .. } | Number { .. } | Str { .. } | Bool { .. } | Null | This | Break
            | Continue | Empty | CommentStmt { .. } => {}
        }
    }

    /// Clone the payload, remapping every child index through `f`.
    /// Used by subtree cloning; `NodeIndex::NONE` stays NONE.
    pub fn map_children(&self, mut f: impl FnMut(NodeIndex) -> NodeIndex) -> NodeKind {
        use NodeKind::*;
        let mut one = |idx: NodeIndex, f: &mut dyn FnMut(NodeIndex) -> NodeIndex| {
            if idx.is_some() { f(idx) } else { NodeIndex::NONE }
        };
        match self {
            Program { statements } => Program {
                statements: statements.iter().map(|&s| one(s, &mut f)).collect(),
            },
            Block { statements } => Block {
                statements: statements.iter().map(|&s| one(s, &mut f)).collect(),
            },
            Array { elements } => Array {
                elements: elements.iter().map(|&e| one(e, &mut f)).collect(),
            },
            Object { properties } => Object {
                properties: properties.iter().map(|&p| one(p, &mut f)).collect(),
            },
            Property {
                key,
                value,
                computed,
                shorthand,
            } => Property {
                key: one(*key, &mut f),
                value: one(*value, &mut f),
                computed: *computed,
                shorthand: *shorthand,
            },
            Function {
                name,
                params,
                body,
                is_arrow,
                is_expression,
            } => Function {
                name: one(*name, &mut f),
                params: params.iter().map(|&p| one(p, &mut f)).collect(),
                body: one(*body, &mut f),
                is_arrow: *is_arrow,
                is_expression: *is_expression,
            },
            Call {
                callee,
                arguments,
                is_new,
            } => Call {
                callee: one(*callee, &mut f),
                arguments: arguments.iter().map(|&a| one(a, &mut f)).collect(),
                is_new: *is_new,
            },
            Member {
                object,
                property,
                computed,
            } => Member {
                object: one(*object, &mut f),
                property: one(*property, &mut f),
                computed: *computed,
            },
            Assign { op, left, right } => Assign {
                op,
                left: one(*left, &mut f),
                right: one(*right, &mut f),
            },
            Binary { op, left, right } => Binary {
                op,
                left: one(*left, &mut f),
                right: one(*right, &mut f),
            },
            Unary {
                op,
                operand,
                prefix,
            } => Unary {
                op,
                operand: one(*operand, &mut f),
                prefix: *prefix,
            },
            Conditional {
                condition,
                when_true,
                when_false,
            } => Conditional {
                condition: one(*condition, &mut f),
                when_true: one(*when_true, &mut f),
                when_false: one(*when_false, &mut f),
            },
            Sequence { expressions } => Sequence {
                expressions: expressions.iter().map(|&e| one(e, &mut f)).collect(),
            },
            Paren { expression } => Paren {
                expression: one(*expression, &mut f),
            },
            ExprStatement { expression } => ExprStatement {
                expression: one(*expression, &mut f),
            },
            VarStatement { kind, declarations } => VarStatement {
                kind: *kind,
                declarations: declarations.iter().map(|&d| one(d, &mut f)).collect(),
            },
            VarDeclarator { name, init } => VarDeclarator {
                name: one(*name, &mut f),
                init: one(*init, &mut f),
            },
            Return { argument } => Return {
                argument: one(*argument, &mut f),
            },
            If {
                condition,
                then_branch,
                else_branch,
            } => If {
                condition: one(*condition, &mut f),
                then_branch: one(*then_branch, &mut f),
                else_branch: one(*else_branch, &mut f),
            },
            While { condition, body } => While {
                condition: one(*condition, &mut f),
                body: one(*body, &mut f),
            },
            For {
                init,
                test,
                update,
                body,
            } => For {
                init: one(*init, &mut f),
                test: one(*test, &mut f),
                update: one(*update, &mut f),
                body: one(*body, &mut f),
            },
            ImportDecl { specifiers, source } => ImportDecl {
                specifiers: specifiers.iter().map(|&s| one(s, &mut f)).collect(),
                source: one(*source, &mut f),
            },
            ImportSpecifier {
                kind,
                imported,
                local,
            } => ImportSpecifier {
                kind: *kind,
                imported: one(*imported, &mut f),
                local: one(*local, &mut f),
            },
            ExportNamed {
                declaration,
                specifiers,
                source,
            } => ExportNamed {
                declaration: one(*declaration, &mut f),
                specifiers: specifiers.iter().map(|&s| one(s, &mut f)).collect(),
                source: one(*source, &mut f),
            },
            ExportSpecifier {
                local,
                exported,
                namespace,
            } => ExportSpecifier {
                local: one(*local, &mut f),
                exported: one(*exported, &mut f),
                namespace: *namespace,
            },
            ExportDefault { declaration } => ExportDefault {
                declaration: one(*declaration, &mut f),
            },
            Ident { name } => Ident { name: name.clone() },
            Number { text } => Number { text: text.clone() },
            Str { value } => Str {
                value: value.clone(),
            },
            Bool { value } => Bool { value: *value },
            Null => Null,
            This => This,
            Break => Break,
            Continue => Continue,
            Empty => Empty,
            CommentStmt { text } => CommentStmt { text: text.clone() },
        }
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub pos: u32,
    pub end: u32,
}

impl Node {
    pub fn new(kind: NodeKind, pos: u32, end: u32) -> Node {
        Node { kind, pos, end }
    }
}

/// Arena owning all nodes of one file/program root.
#[derive(Clone, Debug, Default)]
pub struct NodeArena {
    nodes: Vec<Node>,
    parents: Vec<NodeIndex>,
    pub file_name: String,
}

impl NodeArena {
    pub fn new(file_name: impl Into<String>) -> NodeArena {
        NodeArena {
            nodes: Vec::new(),
            parents: Vec::new(),
            file_name: file_name.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocate a node and record it as parent of its children.
    pub fn alloc(&mut self, kind: NodeKind, pos: u32, end: u32) -> NodeIndex {
        let index = NodeIndex(self.nodes.len() as u32);
        self.nodes.push(Node::new(kind, pos, end));
        self.parents.push(NodeIndex::NONE);
        self.reparent_children(index);
        index
    }

    /// Allocate with no span information (synthesized nodes).
    pub fn synth(&mut self, kind: NodeKind) -> NodeIndex {
        self.alloc(kind, 0, 0)
    }

    pub fn get(&self, idx: NodeIndex) -> Option<&Node> {
        if idx.is_none() {
            return None;
        }
        self.nodes.get(idx.0 as usize)
    }

    pub fn kind(&self, idx: NodeIndex) -> Option<&NodeKind> {
        self.get(idx).map(|n| &n.kind)
    }

    pub fn parent(&self, idx: NodeIndex) -> NodeIndex {
        if idx.is_none() {
            return NodeIndex::NONE;
        }
        self.parents
            .get(idx.0 as usize)
            .copied()
            .unwrap_or(NodeIndex::NONE)
    }

    pub fn set_parent(&mut self, child: NodeIndex, parent: NodeIndex) {
        if child.is_some()
            && let Some(slot) = self.parents.get_mut(child.0 as usize)
        {
            *slot = parent;
        }
    }

    /// Point every direct child of `idx` back at `idx`. Must be called
    /// after a payload replacement that introduced new children.
    pub fn reparent_children(&mut self, idx: NodeIndex) {
        let mut children = Vec::new();
        if let Some(node) = self.get(idx) {
            node.kind.for_each_child(|c| children.push(c));
        }
        for child in children {
            self.set_parent(child, idx);
        }
    }

    /// Replace a node's payload in place, keeping its id (and therefore
    /// all outstanding references to it) valid.
    pub fn replace_kind(&mut self, idx: NodeIndex, kind: NodeKind) {
        if let Some(node) = self.nodes.get_mut(idx.0 as usize) {
            node.kind = kind;
            self.reparent_children(idx);
        }
    }

    /// Identifier name, if `idx` is an `Ident`.
    pub fn ident_name(&self, idx: NodeIndex) -> Option<&str> {
        match self.kind(idx)? {
            NodeKind::Ident { name } => Some(name),
            _ => None,
        }
    }

    /// Literal text of a module-id argument: numeric literals yield their
    /// raw text, string literals their value.
    pub fn literal_id_text(&self, idx: NodeIndex) -> Option<String> {
        match self.kind(idx)? {
            NodeKind::Number { text } => Some(text.clone()),
            NodeKind::Str { value } => Some(value.clone()),
            _ => None,
        }
    }

    pub fn set_ident_name(&mut self, idx: NodeIndex, new_name: &str) {
        if let Some(node) = self.nodes.get_mut(idx.0 as usize)
            && let NodeKind::Ident { name } = &mut node.kind
        {
            *name = new_name.to_string();
        }
    }

    /// Preorder walk from `root`.
    pub fn walk(&self, root: NodeIndex, f: &mut impl FnMut(NodeIndex)) {
        if root.is_none() {
            return;
        }
        f(root);
        let mut children = Vec::new();
        if let Some(node) = self.get(root) {
            node.kind.for_each_child(|c| children.push(c));
        }
        for child in children {
            self.walk(child, f);
        }
    }

    /// Nearest enclosing statement (a node sitting directly in a
    /// `Program`/`Block` statement list), including `idx` itself.
    pub fn statement_parent(&self, idx: NodeIndex) -> NodeIndex {
        let mut current = idx;
        while current.is_some() {
            let parent = self.parent(current);
            match self.kind(parent) {
                Some(NodeKind::Program { .. }) | Some(NodeKind::Block { .. }) => return current,
                _ => current = parent,
            }
        }
        NodeIndex::NONE
    }

    fn statement_list_mut(&mut self, idx: NodeIndex) -> Option<&mut Vec<NodeIndex>> {
        match &mut self.nodes.get_mut(idx.0 as usize)?.kind {
            NodeKind::Program { statements } | NodeKind::Block { statements } => Some(statements),
            _ => None,
        }
    }

    /// Detach a statement from its parent's statement list.
    /// Returns false when `stmt` is not in a statement list.
    pub fn remove_statement(&mut self, stmt: NodeIndex) -> bool {
        let parent = self.parent(stmt);
        if let Some(list) = self.statement_list_mut(parent)
            && let Some(at) = list.iter().position(|&s| s == stmt)
        {
            list.remove(at);
            self.set_parent(stmt, NodeIndex::NONE);
            return true;
        }
        false
    }

    /// Insert `new_stmt` immediately after `anchor` in the anchor's
    /// statement list. Returns false when the anchor is detached.
    pub fn insert_statement_after(&mut self, anchor: NodeIndex, new_stmt: NodeIndex) -> bool {
        let parent = self.parent(anchor);
        if let Some(list) = self.statement_list_mut(parent)
            && let Some(at) = list.iter().position(|&s| s == anchor)
        {
            list.insert(at + 1, new_stmt);
            self.set_parent(new_stmt, parent);
            return true;
        }
        false
    }

    /// Replace `old_stmt` with `new_stmt` in its statement list.
    pub fn replace_statement(&mut self, old_stmt: NodeIndex, new_stmt: NodeIndex) -> bool {
        let parent = self.parent(old_stmt);
        if let Some(list) = self.statement_list_mut(parent)
            && let Some(at) = list.iter().position(|&s| s == old_stmt)
        {
            list[at] = new_stmt;
            self.set_parent(new_stmt, parent);
            self.set_parent(old_stmt, NodeIndex::NONE);
            return true;
        }
        false
    }

    /// Deep-clone the subtree at `idx` within this arena.
    pub fn clone_subtree(&mut self, idx: NodeIndex) -> NodeIndex {
        if idx.is_none() {
            return NodeIndex::NONE;
        }
        let Some(node) = self.get(idx) else {
            return NodeIndex::NONE;
        };
        let (kind, pos, end) = (node.kind.clone(), node.pos, node.end);
        let mut cloned_children = Vec::new();
        kind.for_each_child(|_| cloned_children.push(NodeIndex::NONE));
        let mut slot = 0;
        let originals: Vec<NodeIndex> = {
            let mut v = Vec::new();
            kind.for_each_child(|c| v.push(c));
            v
        };
        for &child in &originals {
            cloned_children[slot] = self.clone_subtree(child);
            slot += 1;
        }
        let mut cursor = 0;
        let remapped = kind.map_children(|_| {
            let c = cloned_children[cursor];
            cursor += 1;
            c
        });
        self.alloc(remapped, pos, end)
    }

    /// Deep-clone the subtree at `idx` of `src` into this arena.
    pub fn import_subtree(&mut self, src: &NodeArena, idx: NodeIndex) -> NodeIndex {
        if idx.is_none() {
            return NodeIndex::NONE;
        }
        let Some(node) = src.get(idx) else {
            return NodeIndex::NONE;
        };
        let originals: Vec<NodeIndex> = {
            let mut v = Vec::new();
            node.kind.for_each_child(|c| v.push(c));
            v
        };
        let mut clones = Vec::with_capacity(originals.len());
        for &child in &originals {
            clones.push(self.import_subtree(src, child));
        }
        let mut cursor = 0;
        let remapped = node.kind.map_children(|_| {
            let c = clones[cursor];
            cursor += 1;
            c
        });
        self.alloc(remapped, node.pos, node.end)
    }

    // Convenience constructors for synthesized nodes.

    pub fn make_ident(&mut self, name: &str) -> NodeIndex {
        self.synth(NodeKind::Ident {
            name: name.to_string(),
        })
    }

    pub fn make_string(&mut self, value: &str) -> NodeIndex {
        self.synth(NodeKind::Str {
            value: value.to_string(),
        })
    }

    pub fn make_call(&mut self, callee: NodeIndex, arguments: Vec<NodeIndex>) -> NodeIndex {
        self.synth(NodeKind::Call {
            callee,
            arguments,
            is_new: false,
        })
    }
}
