use unweave_parser::{NodeIndex, NodeKind, parse};

fn parse_ok(source: &str) -> (unweave_parser::NodeArena, NodeIndex) {
    let (arena, root, diagnostics) = parse("test.js", source);
    assert!(
        diagnostics.is_empty(),
        "unexpected diagnostics for {source:?}: {diagnostics:?}"
    );
    (arena, root)
}

fn program_statements(arena: &unweave_parser::NodeArena, root: NodeIndex) -> Vec<NodeIndex> {
    match arena.kind(root) {
        Some(NodeKind::Program { statements }) => statements.clone(),
        other => panic!("expected program root, got {other:?}"),
    }
}

#[test]
fn test_var_statement() {
    let (arena, root) = parse_ok("var a = 1, b;");
    let stmts = program_statements(&arena, root);
    assert_eq!(stmts.len(), 1);
    let Some(NodeKind::VarStatement { declarations, .. }) = arena.kind(stmts[0]) else {
        panic!("expected var statement");
    };
    assert_eq!(declarations.len(), 2);
    let Some(NodeKind::VarDeclarator { name, init }) = arena.kind(declarations[0]) else {
        panic!("expected declarator");
    };
    assert_eq!(arena.ident_name(*name), Some("a"));
    assert!(init.is_some(), "first declarator has an initializer");
}

#[test]
fn test_exponent_assignment() {
    let (arena, root) = parse_ok("a **= b ** 2;");
    let stmts = program_statements(&arena, root);
    let Some(NodeKind::ExprStatement { expression }) = arena.kind(stmts[0]) else {
        panic!("expected expression statement");
    };
    let Some(NodeKind::Assign { op, right, .. }) = arena.kind(*expression) else {
        panic!("expected assignment");
    };
    assert_eq!(*op, "**=");
    let Some(NodeKind::Binary { op, .. }) = arena.kind(*right) else {
        panic!("expected binary right-hand side");
    };
    assert_eq!(*op, "**");
}

#[test]
fn test_member_call_chain() {
    let (arena, root) = parse_ok("console.log(\"hi\");");
    let stmts = program_statements(&arena, root);
    let Some(NodeKind::ExprStatement { expression }) = arena.kind(stmts[0]) else {
        panic!("expected expression statement");
    };
    let Some(NodeKind::Call { callee, arguments, .. }) = arena.kind(*expression) else {
        panic!("expected call");
    };
    assert_eq!(arguments.len(), 1);
    let Some(NodeKind::Member { object, property, computed }) = arena.kind(*callee) else {
        panic!("expected member callee");
    };
    assert!(!computed);
    assert_eq!(arena.ident_name(*object), Some("console"));
    assert_eq!(arena.ident_name(*property), Some("log"));
}

#[test]
fn test_iife_with_object_argument() {
    let (arena, root) = parse_ok("(function(m){ m[0](); })({0: function(a,b,c){ return 1; }});");
    let stmts = program_statements(&arena, root);
    let Some(NodeKind::ExprStatement { expression }) = arena.kind(stmts[0]) else {
        panic!("expected expression statement");
    };
    let Some(NodeKind::Call { callee, arguments, .. }) = arena.kind(*expression) else {
        panic!("expected outer call");
    };
    let Some(NodeKind::Paren { expression: inner }) = arena.kind(*callee) else {
        panic!("expected parenthesized callee");
    };
    assert!(matches!(arena.kind(*inner), Some(NodeKind::Function { .. })));
    let Some(NodeKind::Object { properties }) = arena.kind(arguments[0]) else {
        panic!("expected object literal argument");
    };
    assert_eq!(properties.len(), 1);
    let Some(NodeKind::Property { key, value, .. }) = arena.kind(properties[0]) else {
        panic!("expected property");
    };
    assert!(matches!(arena.kind(*key), Some(NodeKind::Number { .. })));
    assert!(matches!(arena.kind(*value), Some(NodeKind::Function { .. })));
}

#[test]
fn test_sequence_in_parens() {
    let (arena, root) = parse_ok("(0, x.foo)(1);");
    let stmts = program_statements(&arena, root);
    let Some(NodeKind::ExprStatement { expression }) = arena.kind(stmts[0]) else {
        panic!("expected expression statement");
    };
    let Some(NodeKind::Call { callee, .. }) = arena.kind(*expression) else {
        panic!("expected call");
    };
    let Some(NodeKind::Paren { expression: seq }) = arena.kind(*callee) else {
        panic!("expected paren");
    };
    let Some(NodeKind::Sequence { expressions }) = arena.kind(*seq) else {
        panic!("expected sequence");
    };
    assert_eq!(expressions.len(), 2);
}

#[test]
fn test_arrow_functions() {
    let (arena, root) = parse_ok("var f = () => lib.bar; var g = (a, b) => { return a + b; };");
    let stmts = program_statements(&arena, root);
    assert_eq!(stmts.len(), 2);
    for stmt in stmts {
        let Some(NodeKind::VarStatement { declarations, .. }) = arena.kind(stmt) else {
            panic!("expected var statement");
        };
        let Some(NodeKind::VarDeclarator { init, .. }) = arena.kind(declarations[0]) else {
            panic!("expected declarator");
        };
        let Some(NodeKind::Function { is_arrow, .. }) = arena.kind(*init) else {
            panic!("expected arrow initializer");
        };
        assert!(*is_arrow);
    }
}

#[test]
fn test_import_export_declarations() {
    let (arena, root) = parse_ok(
        "import def, { a as b } from 'mod';\n\
         import * as ns from 'mod2';\n\
         export var x = 1;\n\
         export { c as d } from 'mod3';\n\
         export * as e from 'mod4';\n\
         export default def;",
    );
    let stmts = program_statements(&arena, root);
    assert_eq!(stmts.len(), 6);
    assert!(matches!(arena.kind(stmts[0]), Some(NodeKind::ImportDecl { .. })));
    assert!(matches!(arena.kind(stmts[1]), Some(NodeKind::ImportDecl { .. })));
    assert!(matches!(arena.kind(stmts[2]), Some(NodeKind::ExportNamed { .. })));
    assert!(matches!(arena.kind(stmts[5]), Some(NodeKind::ExportDefault { .. })));
}

#[test]
fn test_conditional_and_binary_precedence() {
    let (arena, root) = parse_ok("var x = a + b * c === d ? e : f;");
    let stmts = program_statements(&arena, root);
    let Some(NodeKind::VarStatement { declarations, .. }) = arena.kind(stmts[0]) else {
        panic!("expected var statement");
    };
    let Some(NodeKind::VarDeclarator { init, .. }) = arena.kind(declarations[0]) else {
        panic!("expected declarator");
    };
    let Some(NodeKind::Conditional { condition, .. }) = arena.kind(*init) else {
        panic!("expected conditional");
    };
    let Some(NodeKind::Binary { op, .. }) = arena.kind(*condition) else {
        panic!("expected binary condition");
    };
    assert_eq!(*op, "===", "=== binds loosest in the condition");
}

#[test]
fn test_parse_error_reports_diagnostic() {
    let (_arena, _root, diagnostics) = parse("test.js", "var = 1;");
    assert!(!diagnostics.is_empty(), "should report a parse error");
}

#[test]
fn test_statement_parent_and_removal() {
    let (mut arena, root) = parse_ok("var a = 1; var b = 2;");
    let stmts = program_statements(&arena, root);
    assert_eq!(arena.statement_parent(stmts[0]), stmts[0]);
    assert!(arena.remove_statement(stmts[0]));
    let remaining = program_statements(&arena, root);
    assert_eq!(remaining, vec![stmts[1]]);
}
