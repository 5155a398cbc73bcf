use tlua_compiler::{Compilation, CompileOptions, Compiler, Diagnostic, SourceFile};

fn check(source: &str) -> (anyhow::Result<Compilation>, Vec<Diagnostic>) {
    let mut compiler = Compiler::new(CompileOptions::default()).expect("environment should seed");
    let file = SourceFile::inline("test.tlua", source);
    let result = compiler.compile(&file);
    let diagnostics = compiler.diagnostics().entries().to_vec();
    (result, diagnostics)
}

#[test]
fn generic_parameter_is_inferred_from_the_argument() {
    let source = "\
global id: <T>(x: T): T
global want: number
want = id(42)
";
    let (result, diagnostics) = check(source);
    assert!(result.is_ok(), "diagnostics: {diagnostics:?}");
    assert!(diagnostics.is_empty(), "got {diagnostics:?}");

    let source = "\
global id: <T>(x: T): T
global want: string
want = id(42)
";
    let (result, _) = check(source);
    assert!(result.is_err(), "id(42) returns a number, not a string");
}

#[test]
fn inferred_parameter_constrains_later_arguments() {
    let source = "\
global pick: <T>(a: T, b: T): T
local n: number = 1
local m: number = 2
global want: number
want = pick(n, m)
";
    let (result, diagnostics) = check(source);
    assert!(result.is_ok(), "diagnostics: {diagnostics:?}");

    let source = "\
global pick: <T>(a: T, b: T): T
local n: number = 1
local s: string = 'x'
pick(n, s)
";
    let (result, diagnostics) = check(source);
    assert!(result.is_err(), "diagnostics: {diagnostics:?}");
    assert!(diagnostics
        .iter()
        .any(|d| d.message.contains("Invalid parameter 1")));
}

#[test]
fn generic_bound_rejects_out_of_bounds_arguments() {
    let source = "\
global shout: <T: string>(s: T): T
shout(42)
";
    let (result, diagnostics) = check(source);
    assert!(result.is_err());
    assert!(diagnostics
        .iter()
        .any(|d| d.message.contains("Invalid parameter 0")));
}

#[test]
fn generic_bound_infers_nested_parameters() {
    // The bound of T mentions V; checking an argument against the bound
    // must bind V as well.
    let source = "\
global first: <V, T: {[number]: V}>(t: T): V
local values: { [number]: string } = {}
global want: string
want = first(values)
";
    let (result, diagnostics) = check(source);
    assert!(result.is_ok(), "diagnostics: {diagnostics:?}");
}

#[test]
fn unused_generic_defaults_to_any() {
    let source = "\
global pass: <T, U>(x: T): U
local anything = pass(1)
";
    let (result, diagnostics) = check(source);
    assert!(result.is_ok(), "diagnostics: {diagnostics:?}");
}

#[test]
fn generic_local_function_checks_at_call_sites() {
    let source = "\
local function wrap<T>(value: T): T
  return value
end
global want: number
want = wrap(42)
";
    let (result, diagnostics) = check(source);
    assert!(result.is_ok(), "diagnostics: {diagnostics:?}");
}

#[test]
fn generic_interface_applies_type_arguments() {
    let source = "\
interface box<T>: { value: T }
global b: box<number>
b = { value = 3 }
";
    let (result, diagnostics) = check(source);
    assert!(result.is_ok(), "diagnostics: {diagnostics:?}");

    let source = "\
interface box<T>: { value: T }
global b: box<string>
b = { value = 3 }
";
    let (result, _) = check(source);
    assert!(result.is_err(), "box<string> rejects a number value");
}

#[test]
fn generic_interface_arity_is_checked() {
    let source = "\
interface pair<A, B>: { first: A; second: B }
global p: pair<number>
";
    let (result, diagnostics) = check(source);
    assert!(result.is_err());
    assert!(diagnostics
        .iter()
        .any(|d| d.message.contains("expects 2 type arguments")));
}

#[test]
fn non_generic_alias_rejects_type_arguments() {
    let source = "\
interface point: { x: number }
global p: point<number>
";
    let (result, diagnostics) = check(source);
    assert!(result.is_err());
    assert!(diagnostics
        .iter()
        .any(|d| d.message.contains("does not take type arguments")));
}

#[test]
fn setmetatable_returns_its_argument_type() {
    let source = "\
local t: { count: number } = { count = 0 }
global back: { count: number }
back = setmetatable(t, {})
";
    let (result, diagnostics) = check(source);
    assert!(result.is_ok(), "diagnostics: {diagnostics:?}");
}
