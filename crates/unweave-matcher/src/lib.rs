//! Structural AST pattern matching with capture slots.
//!
//! Patterns are composable values describing a tree shape; matching a
//! pattern against a node returns a boolean and populates capture slots by
//! side effect. `or` and ordered sequences short-circuit in declaration
//! order. Captures are only meaningful after a successful match.
//!
//! ```
//! use unweave_matcher::{Captures, Slot, m};
//! use unweave_parser::parse;
//!
//! let (arena, root, _) = parse("t.js", "foo.bar;");
//! let prop = Slot(0);
//! let pattern = m::member(m::any_ident(None), m::any_ident(Some(prop)));
//! let mut caps = Captures::with_slots(1);
//! // Walk to the member expression and match it...
//! # let mut found = false;
//! # arena.walk(root, &mut |idx| {
//! #     caps.clear();
//! #     if pattern.matches(&arena, idx, &mut caps) {
//! #         assert_eq!(caps.text(prop), Some("bar"));
//! #         found = true;
//! #     }
//! # });
//! # assert!(found);
//! ```

use unweave_parser::{NodeArena, NodeIndex, NodeKind};

/// Capture slot id. Slots are plain indexes into a `Captures` buffer so
/// patterns stay cheap to clone and share.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Slot(pub usize);

#[derive(Clone, Debug, PartialEq)]
pub enum Captured {
    Node(NodeIndex),
    Text(String),
}

/// Capture buffer populated during a match.
#[derive(Clone, Debug, Default)]
pub struct Captures {
    slots: Vec<Option<Captured>>,
}

impl Captures {
    pub fn with_slots(count: usize) -> Captures {
        Captures {
            slots: vec![None; count],
        }
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }

    pub fn set_node(&mut self, slot: Slot, node: NodeIndex) {
        if let Some(cell) = self.slots.get_mut(slot.0) {
            *cell = Some(Captured::Node(node));
        }
    }

    pub fn set_text(&mut self, slot: Slot, text: &str) {
        if let Some(cell) = self.slots.get_mut(slot.0) {
            *cell = Some(Captured::Text(text.to_string()));
        }
    }

    pub fn node(&self, slot: Slot) -> Option<NodeIndex> {
        match self.slots.get(slot.0)? {
            Some(Captured::Node(idx)) => Some(*idx),
            _ => None,
        }
    }

    pub fn text(&self, slot: Slot) -> Option<&str> {
        match self.slots.get(slot.0)? {
            Some(Captured::Text(text)) => Some(text),
            _ => None,
        }
    }
}

/// Closed set of structural patterns.
#[derive(Clone, Debug)]
pub enum Pattern {
    /// Matches any present node.
    Any,
    /// Matches `inner`, capturing the node index on success.
    Capture(Slot, Box<Pattern>),
    /// Identifier with this exact name.
    Ident(String),
    /// Any identifier; optionally captures its name.
    AnyIdent(Option<Slot>),
    /// Numeric literal; optionally captures its raw text.
    NumberLit(Option<Slot>),
    /// String literal; optionally captures its value.
    StringLit(Option<Slot>),
    /// Non-computed member access `object.property`.
    Member {
        object: Box<Pattern>,
        property: Box<Pattern>,
    },
    /// Call expression. `arguments: None` matches any argument list;
    /// `Some` requires an exact ordered match.
    Call {
        callee: Box<Pattern>,
        arguments: Option<Vec<Pattern>>,
    },
    /// `var name = init` single declarator.
    VarDeclarator {
        name: Box<Pattern>,
        init: Box<Pattern>,
    },
    /// Plain `=` assignment.
    Assign {
        left: Box<Pattern>,
        right: Box<Pattern>,
    },
    /// Function whose body block contains exactly these statements.
    FunctionWithBody(Vec<Pattern>),
    /// `return <argument>;`
    ReturnStmt(Box<Pattern>),
    /// Any object literal.
    AnyObject,
    /// Sequence expression with exactly these elements, in order.
    Sequence(Vec<Pattern>),
    /// First matching alternative wins; tried in declaration order.
    Or(Vec<Pattern>),
}

impl Pattern {
    /// Match this pattern against `idx`, populating captures by side
    /// effect. Parenthesized expressions are transparent.
    pub fn matches(&self, arena: &NodeArena, idx: NodeIndex, caps: &mut Captures) -> bool {
        // See through parens so `(0, x.y)` and `0, x.y` match alike.
        let idx = skip_parens(arena, idx);
        let Some(kind) = arena.kind(idx) else {
            return false;
        };
        match self {
            Pattern::Any => true,
            Pattern::Capture(slot, inner) => {
                if inner.matches(arena, idx, caps) {
                    caps.set_node(*slot, idx);
                    true
                } else {
                    false
                }
            }
            Pattern::Ident(expected) => {
                matches!(kind, NodeKind::Ident { name } if name == expected)
            }
            Pattern::AnyIdent(slot) => {
                if let NodeKind::Ident { name } = kind {
                    if let Some(slot) = slot {
                        caps.set_text(*slot, name);
                    }
                    true
                } else {
                    false
                }
            }
            Pattern::NumberLit(slot) => {
                if let NodeKind::Number { text } = kind {
                    if let Some(slot) = slot {
                        caps.set_text(*slot, text);
                    }
                    true
                } else {
                    false
                }
            }
            Pattern::StringLit(slot) => {
                if let NodeKind::Str { value } = kind {
                    if let Some(slot) = slot {
                        caps.set_text(*slot, value);
                    }
                    true
                } else {
                    false
                }
            }
            Pattern::Member { object, property } => {
                if let NodeKind::Member {
                    object: obj,
                    property: prop,
                    computed: false,
                } = kind
                {
                    object.matches(arena, *obj, caps) && property.matches(arena, *prop, caps)
                } else {
                    false
                }
            }
            Pattern::Call { callee, arguments } => {
                if let NodeKind::Call {
                    callee: found_callee,
                    arguments: found_args,
                    is_new: false,
                } = kind
                {
                    if !callee.matches(arena, *found_callee, caps) {
                        return false;
                    }
                    match arguments {
                        None => true,
                        Some(patterns) => {
                            patterns.len() == found_args.len()
                                && patterns
                                    .iter()
                                    .zip(found_args.iter())
                                    .all(|(p, &a)| p.matches(arena, a, caps))
                        }
                    }
                } else {
                    false
                }
            }
            Pattern::VarDeclarator { name, init } => {
                if let NodeKind::VarDeclarator {
                    name: found_name,
                    init: found_init,
                } = kind
                {
                    found_init.is_some()
                        && name.matches(arena, *found_name, caps)
                        && init.matches(arena, *found_init, caps)
                } else {
                    false
                }
            }
            Pattern::Assign { left, right } => {
                if let NodeKind::Assign {
                    op: "=",
                    left: found_left,
                    right: found_right,
                } = kind
                {
                    left.matches(arena, *found_left, caps)
                        && right.matches(arena, *found_right, caps)
                } else {
                    false
                }
            }
            Pattern::FunctionWithBody(statements) => {
                if let NodeKind::Function { body, .. } = kind
                    && let Some(NodeKind::Block { statements: found }) = arena.kind(*body)
                {
                    statements.len() == found.len()
                        && statements
                            .iter()
                            .zip(found.iter())
                            .all(|(p, &s)| p.matches(arena, s, caps))
                } else {
                    false
                }
            }
            Pattern::ReturnStmt(argument) => {
                if let NodeKind::Return { argument: found } = kind {
                    found.is_some() && argument.matches(arena, *found, caps)
                } else {
                    false
                }
            }
            Pattern::AnyObject => matches!(kind, NodeKind::Object { .. }),
            Pattern::Sequence(patterns) => {
                if let NodeKind::Sequence { expressions } = kind {
                    patterns.len() == expressions.len()
                        && patterns
                            .iter()
                            .zip(expressions.iter())
                            .all(|(p, &e)| p.matches(arena, e, caps))
                } else {
                    false
                }
            }
            Pattern::Or(alternatives) => alternatives
                .iter()
                .any(|alternative| alternative.matches(arena, idx, caps)),
        }
    }
}

/// Resolve through `Paren` wrappers.
pub fn skip_parens(arena: &NodeArena, mut idx: NodeIndex) -> NodeIndex {
    while let Some(NodeKind::Paren { expression }) = arena.kind(idx) {
        idx = *expression;
    }
    idx
}

/// Constructor shorthands, mirroring the declarative matcher sub-language
/// the patterns are written in at the call sites.
pub mod m {
    use super::{Pattern, Slot};

    pub fn any() -> Pattern {
        Pattern::Any
    }

    pub fn capture(slot: Slot, inner: Pattern) -> Pattern {
        Pattern::Capture(slot, Box::new(inner))
    }

    pub fn ident(name: &str) -> Pattern {
        Pattern::Ident(name.to_string())
    }

    pub fn any_ident(slot: Option<Slot>) -> Pattern {
        Pattern::AnyIdent(slot)
    }

    pub fn number(slot: Option<Slot>) -> Pattern {
        Pattern::NumberLit(slot)
    }

    pub fn string(slot: Option<Slot>) -> Pattern {
        Pattern::StringLit(slot)
    }

    pub fn member(object: Pattern, property: Pattern) -> Pattern {
        Pattern::Member {
            object: Box::new(object),
            property: Box::new(property),
        }
    }

    pub fn call(callee: Pattern, arguments: Option<Vec<Pattern>>) -> Pattern {
        Pattern::Call {
            callee: Box::new(callee),
            arguments,
        }
    }

    pub fn var_declarator(name: Pattern, init: Pattern) -> Pattern {
        Pattern::VarDeclarator {
            name: Box::new(name),
            init: Box::new(init),
        }
    }

    pub fn assign(left: Pattern, right: Pattern) -> Pattern {
        Pattern::Assign {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn function_with_body(statements: Vec<Pattern>) -> Pattern {
        Pattern::FunctionWithBody(statements)
    }

    pub fn return_stmt(argument: Pattern) -> Pattern {
        Pattern::ReturnStmt(Box::new(argument))
    }

    pub fn any_object() -> Pattern {
        Pattern::AnyObject
    }

    pub fn sequence(elements: Vec<Pattern>) -> Pattern {
        Pattern::Sequence(elements)
    }

    pub fn or(alternatives: Vec<Pattern>) -> Pattern {
        Pattern::Or(alternatives)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unweave_parser::parse;

    fn first_expression(source: &str) -> (NodeArena, NodeIndex) {
        let (arena, root, diagnostics) = parse("t.js", source);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        let NodeKind::Program { statements } = arena.kind(root).unwrap() else {
            panic!("no program");
        };
        let NodeKind::ExprStatement { expression } = arena.kind(statements[0]).unwrap() else {
            panic!("expected expression statement");
        };
        (arena.clone(), *expression)
    }

    #[test]
    fn test_member_capture() {
        let (arena, expr) = first_expression("foo.bar;");
        let prop = Slot(0);
        let pattern = m::member(m::any_ident(None), m::any_ident(Some(prop)));
        let mut caps = Captures::with_slots(1);
        assert!(pattern.matches(&arena, expr, &mut caps));
        assert_eq!(caps.text(prop), Some("bar"));
    }

    #[test]
    fn test_call_with_literal_id() {
        let (arena, expr) = first_expression("__webpack_require__(42);");
        let id = Slot(0);
        let pattern = m::call(
            m::ident("__webpack_require__"),
            Some(vec![m::or(vec![
                m::number(Some(id)),
                m::string(Some(id)),
            ])]),
        );
        let mut caps = Captures::with_slots(1);
        assert!(pattern.matches(&arena, expr, &mut caps));
        assert_eq!(caps.text(id), Some("42"));
    }

    #[test]
    fn test_or_short_circuits_in_order() {
        let (arena, expr) = first_expression("x;");
        let first = Slot(0);
        let second = Slot(1);
        let pattern = m::or(vec![
            m::any_ident(Some(first)),
            m::any_ident(Some(second)),
        ]);
        let mut caps = Captures::with_slots(2);
        assert!(pattern.matches(&arena, expr, &mut caps));
        assert_eq!(caps.text(first), Some("x"), "first alternative wins");
        assert_eq!(caps.text(second), None);
    }

    #[test]
    fn test_sequence_sees_through_parens() {
        let (arena, expr) = first_expression("(0, x.foo);");
        let prop = Slot(0);
        let pattern = m::sequence(vec![
            m::number(None),
            m::member(m::any_ident(None), m::any_ident(Some(prop))),
        ]);
        let mut caps = Captures::with_slots(1);
        assert!(pattern.matches(&arena, expr, &mut caps));
        assert_eq!(caps.text(prop), Some("foo"));
    }

    #[test]
    fn test_no_match_on_wrong_shape() {
        let (arena, expr) = first_expression("foo[bar];");
        let pattern = m::member(m::any_ident(None), m::any_ident(None));
        let mut caps = Captures::with_slots(0);
        assert!(
            !pattern.matches(&arena, expr, &mut caps),
            "computed access must not match a non-computed member pattern"
        );
    }

    #[test]
    fn test_capture_node_index() {
        let (arena, expr) = first_expression("f(1);");
        let call = Slot(0);
        let pattern = m::capture(call, m::call(m::any_ident(None), None));
        let mut caps = Captures::with_slots(1);
        assert!(pattern.matches(&arena, expr, &mut caps));
        assert_eq!(caps.node(call), Some(expr));
    }
}
