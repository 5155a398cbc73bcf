use std::fs;
use std::path::PathBuf;

use tlua_compiler::{Compilation, CompileOptions, Compiler, Diagnostic, SourceFile};

fn check_with_roots(
    source: &str,
    roots: Vec<PathBuf>,
) -> (anyhow::Result<Compilation>, Vec<Diagnostic>) {
    let options = CompileOptions {
        module_roots: roots,
        ..CompileOptions::default()
    };
    let mut compiler = Compiler::new(options).expect("environment should seed");
    let file = SourceFile::inline("main.tlua", source);
    let result = compiler.compile(&file);
    let diagnostics = compiler.diagnostics().entries().to_vec();
    (result, diagnostics)
}

#[test]
fn require_takes_the_module_return_type() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("greeting.tlua"), "return 'hello'\n").expect("write module");

    let source = "global want: string\nwant = require('greeting')\n";
    let (result, diagnostics) = check_with_roots(source, vec![dir.path().to_path_buf()]);
    assert!(result.is_ok(), "diagnostics: {diagnostics:?}");
    assert!(diagnostics.is_empty(), "got {diagnostics:?}");
}

#[test]
fn require_result_is_type_checked() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("greeting.tlua"), "return 'hello'\n").expect("write module");

    let source = "global want: number\nwant = require('greeting')\n";
    let (result, diagnostics) = check_with_roots(source, vec![dir.path().to_path_buf()]);
    assert!(result.is_err(), "diagnostics: {diagnostics:?}");
}

#[test]
fn module_tables_expose_their_fields() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("mathx.tlua"),
        "\
local m = {}

function m.double(n: number): number
  return n * 2
end

return m
",
    )
    .expect("write module");

    let source = "\
local mathx = require('mathx')
global want: number
want = mathx.double(21)
";
    let (result, diagnostics) = check_with_roots(source, vec![dir.path().to_path_buf()]);
    assert!(result.is_ok(), "diagnostics: {diagnostics:?}");
}

#[test]
fn dotted_module_names_map_to_directories() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::create_dir_all(dir.path().join("pkg")).expect("mkdir");
    fs::write(dir.path().join("pkg/util.tlua"), "return 42\n").expect("write module");

    let source = "global want: number\nwant = require('pkg.util')\n";
    let (result, diagnostics) = check_with_roots(source, vec![dir.path().to_path_buf()]);
    assert!(result.is_ok(), "diagnostics: {diagnostics:?}");
}

#[test]
fn missing_modules_resolve_to_any() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source = "global want: number\nwant = require('nowhere')\n";
    let (result, diagnostics) = check_with_roots(source, vec![dir.path().to_path_buf()]);
    assert!(result.is_ok(), "diagnostics: {diagnostics:?}");
}

#[test]
fn without_configured_roots_require_is_untyped() {
    let source = "global want: number\nwant = require('anything')\n";
    let (result, diagnostics) = check_with_roots(source, Vec::new());
    assert!(result.is_ok(), "diagnostics: {diagnostics:?}");
}

#[test]
fn transitive_requires_resolve() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("inner.tlua"), "return 7\n").expect("write module");
    fs::write(
        dir.path().join("outer.tlua"),
        "local inner = require('inner')\nreturn inner\n",
    )
    .expect("write module");

    let source = "global want: number\nwant = require('outer')\n";
    let (result, diagnostics) = check_with_roots(source, vec![dir.path().to_path_buf()]);
    assert!(result.is_ok(), "diagnostics: {diagnostics:?}");
}

#[test]
fn cyclic_requires_bottom_out_without_hanging() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("a.tlua"), "local b = require('b')\nreturn 1\n")
        .expect("write module");
    fs::write(dir.path().join("b.tlua"), "local a = require('a')\nreturn 2\n")
        .expect("write module");

    let source = "global want: number\nwant = require('a')\n";
    let (result, diagnostics) = check_with_roots(source, vec![dir.path().to_path_buf()]);
    assert!(result.is_ok(), "diagnostics: {diagnostics:?}");
}

#[test]
fn broken_modules_resolve_to_any() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("broken.tlua"), "local x: number = 'nope'\nreturn x\n")
        .expect("write module");

    let source = "global want: string\nwant = require('broken')\n";
    let (result, diagnostics) = check_with_roots(source, vec![dir.path().to_path_buf()]);
    assert!(result.is_ok(), "diagnostics: {diagnostics:?}");
}
