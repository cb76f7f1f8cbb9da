use unweave_emitter::emit;
use unweave_parser::{NodeArena, NodeKind, parse};
use unweave_unpack::{
    Bundle, BundleKind, InlineAliases, InlineWrappers, Module, ModuleId, Transform,
    TransformContext, UnpackError, apply_transforms, reconstruct_module, unpack,
    unpack_and_reconstruct,
};

fn reconstructed(source: &str) -> Bundle {
    unpack_and_reconstruct(source)
        .expect("unpack should succeed")
        .expect("a bundle should be detected")
}

fn module_code(bundle: &Bundle, id: &str) -> String {
    bundle
        .modules
        .get(&ModuleId::from(id))
        .expect("module should exist")
        .code()
}

fn run_passes(source: &str, mut passes: Vec<Box<dyn Transform>>) -> String {
    let (mut arena, root, diagnostics) = parse("test.js", source);
    assert!(diagnostics.is_empty(), "{diagnostics:?}");
    let mut ctx = TransformContext::new(&arena, root, &[]);
    apply_transforms(&mut arena, root, &mut ctx, &mut passes).expect("passes should succeed");
    emit(&arena, root)
}

#[test]
fn test_loader_var_bundle_export_assignment() {
    let source = r#"
var modules = {
  0: function (module, exports) {
    exports.x = 1;
  }
};
function load(id) {
  return modules[id];
}
load(0);
"#;
    let bundle = reconstructed(source);
    assert_eq!(bundle.kind, BundleKind::Webpack);
    assert_eq!(bundle.entry_id, Some(ModuleId::from("0")));
    let module = &bundle.modules[&ModuleId::from("0")];
    assert!(module.is_entry);
    assert!(!module.failed);
    assert_eq!(module.code(), "export var x = 1;\n");
}

#[test]
fn test_iife_bundle_named_imports() {
    let source = r#"
(function (modules) {
  function __webpack_require__(id) {
    return modules[id];
  }
  __webpack_require__.s = 0;
  __webpack_require__(0);
})([function (module, exports, __webpack_require__) {
  var lib = __webpack_require__(1);
  lib.greet("hi");
}, function (module, exports) {
  exports.greet = function (name) {
    console.log(name);
  };
}]);
"#;
    let bundle = reconstructed(source);
    assert_eq!(bundle.kind, BundleKind::Webpack);
    assert_eq!(bundle.entry_id, Some(ModuleId::from("0")));
    assert_eq!(
        module_code(&bundle, "0"),
        "import { greet } from \"1\";\ngreet(\"hi\");\n"
    );
    assert!(module_code(&bundle, "1").contains("export var greet = function"));
}

#[test]
fn test_namespace_import_fallback() {
    let source = r#"
(function (modules) {
  __webpack_require__.s = 0;
  function __webpack_require__(id) {
    return modules[id];
  }
})([function (module, exports, __webpack_require__) {
  var lib = __webpack_require__(1);
  lib("x");
  lib.go();
}, function (module, exports) {
  exports.go = 1;
}]);
"#;
    let bundle = reconstructed(source);
    let code = module_code(&bundle, "0");
    assert!(code.contains("import * as lib from \"1\";"), "{code}");
    assert!(code.contains("lib(\"x\");"), "{code}");
}

#[test]
fn test_sequence_paren_call_collapses() {
    let source = r#"
var modules = {
  0: function (module, exports, require) {
    var lib = require(1);
    (0, lib.log)("hi");
  }
};
function load(id) {
  return modules[id];
}
load(0);
"#;
    let bundle = reconstructed(source);
    assert_eq!(
        module_code(&bundle, "0"),
        "import { log } from \"1\";\nlog(\"hi\");\n"
    );
}

#[test]
fn test_default_export_interop_collapses() {
    let source = r#"
var modules = {
  0: function (module, exports, require) {
    var x = require(1);
    var d = require.n(x);
    d.a("hi");
  }
};
function load(id) {
  return modules[id];
}
load(0);
"#;
    let bundle = reconstructed(source);
    assert_eq!(
        module_code(&bundle, "0"),
        "import d from \"1\";\nd(\"hi\");\n"
    );
}

#[test]
fn test_browserify_bundle() {
    let source = r#"
(function e(t, n, r) {
  return r;
})({
  1: [function (require, module, exports) {
    var lib = require("./lib");
    module.exports = lib.word;
  }, { "./lib": 2 }],
  2: [function (require, module, exports) {
    var answer = require("./answer");
    exports.value = answer;
  }, { "./answer": 3 }],
  3: [function (require, module, exports) {
    module.exports = 42;
  }, {}]
}, {}, [1]);
"#;
    let bundle = reconstructed(source);
    assert_eq!(bundle.kind, BundleKind::Browserify);
    assert_eq!(bundle.entry_id, Some(ModuleId::from("1")));
    assert_eq!(bundle.modules.len(), 3);
    assert!(bundle.modules[&ModuleId::from("1")].is_entry);
    // Depmap specifiers are rewritten to bundle ids.
    assert_eq!(
        module_code(&bundle, "1"),
        "export { word as default } from \"2\";\n"
    );
    assert_eq!(module_code(&bundle, "2"), "export * as value from \"3\";\n");
    assert_eq!(module_code(&bundle, "3"), "export default 42;\n");
}

#[test]
fn test_unexpected_export_leaves_marker() {
    let source = r#"
var modules = {
  0: function (module, exports, require) {
    exports.r = require;
  }
};
function load(id) {
  return modules[id];
}
load(0);
"#;
    let bundle = reconstructed(source);
    let module = &bundle.modules[&ModuleId::from("0")];
    assert!(!module.failed);
    let code = module.code();
    assert!(
        code.contains("/* unweave:unexpected-export: r = __webpack_require__ */"),
        "{code}"
    );
    assert!(!module.diagnostics.is_empty());
    let summary = bundle.summary();
    assert_eq!(summary.kind, "webpack");
    assert!(!summary.modules[0].diagnostics.is_empty());
}

#[test]
fn test_nested_export_uses_source_level_names() {
    // The export pass leaves assignments below the top level in place;
    // the surviving references must read `exports`, not the canonical
    // parameter name.
    let source = r#"
var modules = {
  0: function (module, exports) {
    function late() {
      exports.x = 2;
    }
    late();
  }
};
function load(id) {
  return modules[id];
}
load(0);
"#;
    let bundle = reconstructed(source);
    let module = &bundle.modules[&ModuleId::from("0")];
    assert!(!module.failed);
    let code = module.code();
    assert!(code.contains("exports.x = 2;"), "{code}");
    assert!(!code.contains("__webpack_exports__"), "{code}");
    assert!(!module.diagnostics.is_empty(), "nested export is reported");
}

#[test]
fn test_handler_map_is_not_a_bundle() {
    // A top-level object of functions plus an unrelated call is an
    // ordinary program; only a callee that indexes the map is a loader.
    let source = r#"
var handlers = { 0: function (e) { e.focus(); } };
function show(x) {
  alert(x);
}
show(0);
"#;
    let result = unpack(source).expect("plain source should parse");
    assert!(result.is_none());
}

#[test]
fn test_rename_collision_fails_module() {
    // Exporting `a` as `x` requires renaming `a` to `x`, which collides
    // with the existing top-level `x`.
    let source = r#"
var modules = {
  0: function (module, exports) {
    var a = 1;
    var x = 5;
    exports.x = a;
  }
};
function load(id) {
  return modules[id];
}
load(0);
"#;
    let bundle = reconstructed(source);
    let module = &bundle.modules[&ModuleId::from("0")];
    assert!(module.failed);
    assert!(bundle.summary().modules[0].failed);
}

#[test]
fn test_reconstruction_is_idempotent() {
    let source = r#"
(function (modules) {
  function __webpack_require__(id) {
    return modules[id];
  }
  __webpack_require__.s = 0;
})([function (module, exports, __webpack_require__) {
  var lib = __webpack_require__(1);
  lib.greet("hi");
}, function (module, exports) {
  exports.greet = function (name) {
    console.log(name);
  };
}]);
"#;
    let bundle = reconstructed(source);
    for id in ["0", "1"] {
        let code = module_code(&bundle, id);
        let (arena, root, diagnostics) = parse("reparse.js", &code);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        let mut module = Module::new(ModuleId::from(id), arena, root);
        reconstruct_module(BundleKind::Webpack, &mut module)
            .expect("second reconstruction should succeed");
        assert_eq!(module.code(), code, "module {id} should be stable");
    }
}

#[test]
fn test_inline_alias_chain() {
    let out = run_passes(
        "var a = console.log; var b = a; b(\"hi\");",
        vec![Box::new(InlineAliases)],
    );
    assert_eq!(out, "console.log(\"hi\");\n");
}

#[test]
fn test_inline_assignment_alias() {
    let out = run_passes(
        "var a; a = console.log; a(\"hi\");",
        vec![Box::new(InlineAliases)],
    );
    assert_eq!(out, "console.log(\"hi\");\n");
}

#[test]
fn test_inline_alias_in_value_position() {
    let out = run_passes(
        "var a; (a = console.log)(\"hi\");",
        vec![Box::new(InlineAliases)],
    );
    assert_eq!(out, "console.log(\"hi\");\n");
}

#[test]
fn test_written_alias_is_kept() {
    let out = run_passes(
        "var a = x; a = y; a();",
        vec![Box::new(InlineAliases)],
    );
    assert!(out.contains("var a = x;"), "{out}");
}

#[test]
fn test_shadowed_alias_is_kept() {
    let source = r#"
var x = 1;
var a = x;
function f(x) {
  return a;
}
"#;
    let out = run_passes(source, vec![Box::new(InlineAliases)]);
    assert!(out.contains("var a = x;"), "{out}");
    assert!(out.contains("return a;"), "{out}");
}

#[test]
fn test_inline_forwarding_function() {
    let out = run_passes(
        "function w(x, y) { return f(y, x); } w(1, 2);",
        vec![Box::new(InlineWrappers)],
    );
    assert_eq!(out, "f(2, 1);\n");
}

#[test]
fn test_wrapper_arity_mismatch_is_kept() {
    let out = run_passes(
        "function w(x) { return f(x); } w(1, 2);",
        vec![Box::new(InlineWrappers)],
    );
    assert!(out.contains("function w(x)"), "{out}");
    assert!(out.contains("w(1, 2);"), "{out}");
}

#[test]
fn test_duplicate_ids_and_dangling_entry() {
    let make_module = |id: &str| {
        let mut arena = NodeArena::new(format!("{id}.js"));
        let root = arena.alloc(
            NodeKind::Program {
                statements: Vec::new(),
            },
            0,
            0,
        );
        Module::new(ModuleId::from(id), arena, root)
    };
    let bundle = Bundle::new(
        BundleKind::Webpack,
        vec![make_module("0"), make_module("0"), make_module("1")],
        Some(ModuleId::from("9")),
    );
    assert_eq!(bundle.modules.len(), 2);
    assert_eq!(bundle.entry_id, None, "dangling entry ids are dropped");
}

#[test]
fn test_plain_source_is_not_a_bundle() {
    let result = unpack("var a = 1;\nconsole.log(a);\n").expect("plain source should parse");
    assert!(result.is_none());
}

#[test]
fn test_invalid_source_is_a_parse_error() {
    let result = unpack("var = ;");
    assert!(matches!(result, Err(UnpackError::Parse(_))));
}
