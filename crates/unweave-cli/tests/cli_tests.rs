use std::fs;
use std::process::Command;

fn unweave() -> Command {
    Command::new(env!("CARGO_BIN_EXE_unweave"))
}

const BUNDLE: &str = r#"
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

#[test]
fn test_writes_modules_and_summary() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("bundle.js");
    fs::write(&input, BUNDLE).expect("write input");
    let out_dir = dir.path().join("out");

    let output = unweave()
        .arg(&input)
        .arg("-o")
        .arg(&out_dir)
        .arg("--json")
        .output()
        .expect("binary should run");
    assert!(output.status.success(), "{output:?}");

    let module = fs::read_to_string(out_dir.join("0.js")).expect("module file");
    assert_eq!(module, "export var x = 1;\n");

    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out_dir.join("bundle.json")).expect("summary"))
            .expect("valid json");
    assert_eq!(summary["kind"], "webpack");
    assert_eq!(summary["entry"], "0");
    assert_eq!(summary["modules"][0]["id"], "0");
    assert_eq!(summary["modules"][0]["entry"], true);
}

#[test]
fn test_list_prints_module_ids() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("bundle.js");
    fs::write(&input, BUNDLE).expect("write input");

    let output = unweave()
        .arg(&input)
        .arg("--list")
        .output()
        .expect("binary should run");
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("0 (entry)"), "{stdout}");
}

#[test]
fn test_plain_source_exits_nonzero() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("plain.js");
    fs::write(&input, "var a = 1;\nconsole.log(a);\n").expect("write input");

    let output = unweave().arg(&input).output().expect("binary should run");
    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(1));
}
