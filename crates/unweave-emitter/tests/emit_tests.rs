use unweave_emitter::{code_preview, emit};
use unweave_parser::{parse, NodeKind};

fn roundtrip(source: &str) -> String {
    let (arena, root, diagnostics) = parse("test.js", source);
    assert!(diagnostics.is_empty(), "{diagnostics:?}");
    emit(&arena, root)
}

#[test]
fn test_emit_var_statement() {
    assert_eq!(roundtrip("var a = 1, b;"), "var a = 1, b;\n");
}

#[test]
fn test_emit_member_call() {
    assert_eq!(roundtrip("console.log(\"hi\");"), "console.log(\"hi\");\n");
}

#[test]
fn test_emit_function_declaration() {
    let out = roundtrip("function f(a, b) { return a + b; }");
    assert_eq!(out, "function f(a, b) {\n  return a + b;\n}\n");
}

#[test]
fn test_emit_preserves_parens() {
    assert_eq!(roundtrip("(0, x.foo)(1);"), "(0, x.foo)(1);\n");
}

#[test]
fn test_emit_precedence_parens() {
    // The tree for `(a + b) * c` built from source keeps its parens.
    assert_eq!(roundtrip("(a + b) * c;"), "(a + b) * c;\n");
    // Nested precedence without source parens stays correct.
    assert_eq!(roundtrip("a + b * c;"), "a + b * c;\n");
}

#[test]
fn test_emit_iife_statement() {
    let out = roundtrip("(function(m) { m(); })(mods);");
    assert_eq!(out, "(function (m) {\n  m();\n})(mods);\n");
}

#[test]
fn test_emit_import_declarations() {
    let out = roundtrip("import def, { a as b } from 'mod';\nimport * as ns from 'mod2';");
    assert_eq!(
        out,
        "import def, { a as b } from \"mod\";\nimport * as ns from \"mod2\";\n"
    );
}

#[test]
fn test_emit_export_forms() {
    assert_eq!(roundtrip("export var x = 1;"), "export var x = 1;\n");
    assert_eq!(
        roundtrip("export { a as b } from 'mod';"),
        "export { a as b } from \"mod\";\n"
    );
    assert_eq!(
        roundtrip("export * as ns from 'mod';"),
        "export * as ns from \"mod\";\n"
    );
    assert_eq!(roundtrip("export default foo;"), "export default foo;\n");
}

#[test]
fn test_emit_is_stable_on_reparse() {
    // Emitting, reparsing, and emitting again is a no-op.
    let first = roundtrip("var a = (1 + 2) * 3; function f() { return a; } f();");
    let second = roundtrip(&first);
    assert_eq!(first, second);
}

#[test]
fn test_emit_object_and_array() {
    assert_eq!(
        roundtrip("x = { a: 1, \"b\": 2, 3: c };"),
        "x = { a: 1, \"b\": 2, 3: c };\n"
    );
    assert_eq!(roundtrip("y = [1, 2, 3];"), "y = [1, 2, 3];\n");
}

#[test]
fn test_code_preview_truncates() {
    let source = format!("var long = \"{}\";", "x".repeat(200));
    let (arena, root, _) = parse("test.js", &source);
    let Some(NodeKind::Program { statements }) = arena.kind(root) else {
        panic!("expected program");
    };
    let Some(NodeKind::VarStatement { declarations, .. }) = arena.kind(statements[0]) else {
        panic!("expected var statement");
    };
    let Some(NodeKind::VarDeclarator { init, .. }) = arena.kind(declarations[0]) else {
        panic!("expected declarator");
    };
    let preview = code_preview(&arena, *init);
    assert!(preview.contains('…'), "long previews are truncated");
    assert!(preview.chars().count() < 110);
}
