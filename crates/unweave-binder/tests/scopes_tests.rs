use unweave_binder::{BindError, BinderState, BindingKind};
use unweave_parser::parse;

#[test]
fn test_program_scope_declarations() {
    let (arena, root, _) = parse("t.js", "var a = 1; function f(x) { return x; }");
    let table = BinderState::bind(&arena, root);
    let a = table.lookup_root("a").expect("a bound");
    let f = table.lookup_root("f").expect("f bound");
    assert_eq!(table.binding(a).kind, BindingKind::Var);
    assert_eq!(table.binding(f).kind, BindingKind::Function);
    assert!(table.lookup_root("x").is_none(), "param is not program-scoped");
}

#[test]
fn test_reference_collection_in_order() {
    let (arena, root, _) = parse("t.js", "var a = 1; a; a + a;");
    let table = BinderState::bind(&arena, root);
    let a = table.lookup_root("a").expect("a bound");
    assert_eq!(table.binding(a).reference_count(), 3);
    let refs = &table.binding(a).references;
    for window in refs.windows(2) {
        assert!(window[0] < window[1], "references recorded in traversal order");
    }
}

#[test]
fn test_member_property_is_not_a_reference() {
    let (arena, root, _) = parse("t.js", "var log = 1; console.log; obj[log];");
    let table = BinderState::bind(&arena, root);
    let log = table.lookup_root("log").expect("log bound");
    // Only the computed `obj[log]` use counts.
    assert_eq!(table.binding(log).reference_count(), 1);
}

#[test]
fn test_var_hoists_out_of_blocks() {
    let (arena, root, _) = parse("t.js", "if (x) { var hoisted = 1; } let scoped = 2;");
    let table = BinderState::bind(&arena, root);
    assert!(table.lookup_root("hoisted").is_some(), "var hoists to program scope");
    assert!(table.lookup_root("scoped").is_some(), "top-level let is program-scoped");
}

#[test]
fn test_shadowing_resolves_to_inner_binding() {
    let (arena, root, _) = parse("t.js", "var x = 1; function f(x) { x; } x;");
    let table = BinderState::bind(&arena, root);
    let outer = table.lookup_root("x").expect("outer x");
    assert_eq!(
        table.binding(outer).reference_count(),
        1,
        "inner use belongs to the parameter, not the outer var"
    );
}

#[test]
fn test_writes_are_tracked() {
    let (arena, root, _) = parse("t.js", "var a = 1; a = 2; a;");
    let table = BinderState::bind(&arena, root);
    let a = table.lookup_root("a").expect("a bound");
    assert_eq!(table.binding(a).reference_count(), 2);
    assert_eq!(table.binding(a).writes.len(), 1);
}

#[test]
fn test_implicit_bindings_collect_references() {
    let (arena, root, _) = parse("t.js", "__webpack_require__(1); __webpack_require__(2);");
    let table =
        BinderState::bind_with_implicit(&arena, root, &["__webpack_require__"]);
    let req = table.lookup_root("__webpack_require__").expect("implicit bound");
    assert_eq!(table.binding(req).kind, BindingKind::Implicit);
    assert_eq!(table.binding(req).reference_count(), 2);
}

#[test]
fn test_rename_binding_rewrites_references() {
    let (mut arena, root, _) = parse("t.js", "var a = 1; a; a;");
    let mut table = BinderState::bind(&arena, root);
    let a = table.lookup_root("a").expect("a bound");
    table.rename_binding(&mut arena, a, "renamed").expect("rename ok");
    let mut seen = 0;
    arena.walk(root, &mut |idx| {
        if arena.ident_name(idx) == Some("renamed") {
            seen += 1;
        }
    });
    assert_eq!(seen, 3, "declaration plus two references renamed");
}

#[test]
fn test_rename_collision_is_fatal() {
    let (mut arena, root, _) = parse("t.js", "var a = 1; var b = 2;");
    let mut table = BinderState::bind(&arena, root);
    let a = table.lookup_root("a").expect("a bound");
    let err = table.rename_binding(&mut arena, a, "b").unwrap_err();
    assert_eq!(err, BindError::Collision { name: "b".into() });
}

#[test]
fn test_rename_shadowing_is_fatal() {
    let (mut arena, root, _) = parse("t.js", "var a = 1; function f(inner) { a; } ");
    let mut table = BinderState::bind(&arena, root);
    let a = table.lookup_root("a").expect("a bound");
    let err = table.rename_binding(&mut arena, a, "inner").unwrap_err();
    assert_eq!(err, BindError::WouldShadow { name: "inner".into() });
}
