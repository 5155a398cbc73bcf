use tlua_compiler::{Compilation, CompileOptions, Compiler, Diagnostic, SourceFile};

fn check(source: &str) -> (anyhow::Result<Compilation>, Vec<Diagnostic>) {
    let mut compiler = Compiler::new(CompileOptions::default()).expect("environment should seed");
    let file = SourceFile::inline("test.tlua", source);
    let result = compiler.compile(&file);
    let diagnostics = compiler.diagnostics().entries().to_vec();
    (result, diagnostics)
}

#[test]
fn literal_local_widens_on_reassignment() {
    let (result, diagnostics) = check("local x = 1\nx = 'hello'\n");
    assert!(result.is_ok(), "diagnostics: {diagnostics:?}");
    assert!(diagnostics.is_empty(), "got {diagnostics:?}");
}

#[test]
fn widened_local_reads_as_the_union() {
    let source = "\
local x = 1
x = 'hello'
global both: number | string
both = x
";
    let (result, diagnostics) = check(source);
    assert!(result.is_ok(), "diagnostics: {diagnostics:?}");

    // A narrower slot no longer accepts the widened value.
    let source = "\
local x = 1
x = 'hello'
global narrow: number
narrow = x
";
    let (result, _) = check(source);
    assert!(result.is_err(), "widened local must not fit `number`");
}

#[test]
fn annotated_local_does_not_widen() {
    let (result, _) = check("local x: number = 1\nx = 'hello'\n");
    assert!(result.is_err(), "declared types are fixed");
}

#[test]
fn method_definition_narrows_empty_table() {
    let source = "\
local t = {}
function t:greet() return 'hi' end
print(t:greet())
";
    let (result, diagnostics) = check(source);
    assert!(result.is_ok(), "diagnostics: {diagnostics:?}");
    assert!(diagnostics.is_empty(), "got {diagnostics:?}");
}

#[test]
fn narrowed_method_result_is_typed() {
    let source = "\
local t = {}
function t:greet(): string return 'hi' end
global want: string
want = t:greet()
";
    let (result, diagnostics) = check(source);
    assert!(result.is_ok(), "diagnostics: {diagnostics:?}");

    let source = "\
local t = {}
function t:greet(): string return 'hi' end
global want: number
want = t:greet()
";
    let (result, _) = check(source);
    assert!(result.is_err(), "greet returns a string, not a number");
}

#[test]
fn field_assignment_narrows_empty_table() {
    let source = "\
local t = {}
t.count = 1
global want: number
want = t.count
";
    let (result, diagnostics) = check(source);
    assert!(result.is_ok(), "diagnostics: {diagnostics:?}");
}

#[test]
fn field_narrowing_accumulates_a_union() {
    let source = "\
local t = {}
t.value = 1
t.value = 'two'
global either: number | string
either = t.value
";
    let (result, diagnostics) = check(source);
    assert!(result.is_ok(), "diagnostics: {diagnostics:?}");
}

#[test]
fn index_assignment_narrows_empty_table() {
    let source = "\
local t = {}
local i: number = 1
t[i] = 'a'
global want: string
want = t[2]
";
    let (result, diagnostics) = check(source);
    assert!(result.is_ok(), "diagnostics: {diagnostics:?}");
}

#[test]
fn function_statement_narrows_table_field() {
    let source = "\
local handlers = {}
function handlers.start() return 1 end
print(handlers.start())
";
    let (result, diagnostics) = check(source);
    assert!(result.is_ok(), "diagnostics: {diagnostics:?}");
}

#[test]
fn non_empty_constructor_is_not_provisional() {
    // A constructor with fields has a concrete shape; unknown fields on
    // it are errors rather than narrowing writes.
    let source = "local t = { a = 1 }\nlocal x = t.b\n";
    let (result, _) = check(source);
    assert!(result.is_err());
}
