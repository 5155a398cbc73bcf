use tlua_compiler::{Compilation, CompileOptions, Compiler, Diagnostic, Severity, SourceFile};

fn check(source: &str) -> (anyhow::Result<Compilation>, Vec<Diagnostic>) {
    let mut compiler = Compiler::new(CompileOptions::default()).expect("environment should seed");
    let file = SourceFile::inline("test.tlua", source);
    let result = compiler.compile(&file);
    let diagnostics = compiler.diagnostics().entries().to_vec();
    (result, diagnostics)
}

fn errors(diagnostics: &[Diagnostic]) -> Vec<&Diagnostic> {
    diagnostics
        .iter()
        .filter(|diagnostic| diagnostic.is_error())
        .collect()
}

#[test]
fn reports_unknown_name_once() {
    let (result, diagnostics) = check("y = 1\ny = 2\n");
    assert!(result.is_err(), "expected unknown name to be rejected");
    let errors = errors(&diagnostics);
    assert_eq!(errors.len(), 1, "got {errors:?}");
    assert!(errors[0].message.contains("Name `y` is not in scope"));
}

#[test]
fn reports_unknown_type_alias() {
    let (result, diagnostics) = check("local x: wibble = 1\n");
    assert!(result.is_err());
    assert!(diagnostics
        .iter()
        .any(|d| d.message.contains("Type `wibble` not in scope")));
}

#[test]
fn contravariant_parameter_mismatch_carries_crumbs() {
    let source = "local f: (x: number): nil\nf = function(x: string) end\n";
    let (result, diagnostics) = check(source);
    assert!(result.is_err(), "expected assignment to be rejected");

    let errors = errors(&diagnostics);
    assert_eq!(errors.len(), 1, "got {errors:?}");
    let message = &errors[0].message;
    assert!(message.contains("At parameter 0"), "got: {message}");
    assert!(
        message.contains("Cannot assign `string` to `number`"),
        "got: {message}"
    );
}

#[test]
fn accepts_procedure_for_nil_returning_slot() {
    let source = "local f: (x: number): nil\nf = function(x: number) end\n";
    let (result, diagnostics) = check(source);
    assert!(result.is_ok(), "diagnostics: {diagnostics:?}");
    assert!(diagnostics.is_empty(), "got {diagnostics:?}");
}

#[test]
fn duplicate_annotation_field_unions_both_types() {
    let source = "local t: { a: number; a: string }\nt = { a = 1 }\nt = { a = 'x' }\n";
    let (_, diagnostics) = check(source);
    let errors = errors(&diagnostics);
    assert_eq!(errors.len(), 1, "got {errors:?}");
    assert!(errors[0].message.contains("Duplicate table key 'a'"));
}

#[test]
fn duplicate_constructor_key_is_reported() {
    let (result, diagnostics) = check("local t = { a = 1, a = 'x' }\n");
    assert!(result.is_err());
    assert!(diagnostics
        .iter()
        .any(|d| d.message.contains("Duplicate table key 'a'")));
}

#[test]
fn union_annotation_subsumes_literal_member() {
    let source = "interface t: number | 3 | nil\nglobal x: t\nx = 5\nx = nil\n";
    let (result, diagnostics) = check(source);
    assert!(result.is_ok(), "diagnostics: {diagnostics:?}");
    assert!(diagnostics.is_empty(), "got {diagnostics:?}");

    let (result, _) = check("interface t: number | 3 | nil\nglobal x: t\nx = 'no'\n");
    assert!(result.is_err(), "strings are outside the union");
}

#[test]
fn arithmetic_requires_numbers() {
    let (result, diagnostics) = check("local x = true + 1\n");
    assert!(result.is_err());
    assert!(diagnostics
        .iter()
        .any(|d| d.message.contains("In arithmetic operation")));
}

#[test]
fn concat_requires_strings() {
    let (result, diagnostics) = check("local x = 'a' .. true\n");
    assert!(result.is_err());
    assert!(diagnostics
        .iter()
        .any(|d| d.message.contains("In concat operation")));
}

#[test]
fn comparison_requires_matching_operands() {
    let (result, diagnostics) = check("local x = 1 < 'two'\n");
    assert!(result.is_err());
    assert!(diagnostics
        .iter()
        .any(|d| d.message.contains("Cannot compare")));
}

#[test]
fn equality_accepts_overlapping_operands() {
    let source = "local x = 1\nlocal same = x == 1\nlocal s: string = 'a'\nlocal eq = s == 'b'\n";
    let (result, diagnostics) = check(source);
    assert!(result.is_ok(), "diagnostics: {diagnostics:?}");

    let (result, _) = check("local x = 1\nlocal bad = x == {}\n");
    assert!(result.is_err(), "numbers and tables never compare");
}

#[test]
fn length_operator_accepts_strings_and_sequences() {
    let (result, diagnostics) = check("local a = #'abc'\nlocal b = #{1, 2}\n");
    assert!(result.is_ok(), "diagnostics: {diagnostics:?}");

    let (result, _) = check("local c = #true\n");
    assert!(result.is_err(), "length of a boolean is rejected");
}

#[test]
fn dots_outside_variadic_function_is_rejected() {
    let (result, diagnostics) = check("local f = function() return ... end\n");
    assert!(result.is_err());
    assert!(diagnostics
        .iter()
        .any(|d| d.message.contains("Scope does not contain `...`")));
}

#[test]
fn dots_at_top_level_and_in_variadic_functions_is_fine() {
    let (result, diagnostics) = check("print(...)\nlocal f = function(...) return ... end\n");
    assert!(result.is_ok(), "diagnostics: {diagnostics:?}");
}

#[test]
fn shadowing_warns_without_failing() {
    let (result, diagnostics) = check("local x = 1\ndo\n  local x = 2\nend\n");
    assert!(result.is_ok());
    assert!(diagnostics
        .iter()
        .any(|d| d.severity == Severity::Warning
            && d.message.contains("Local variable shadows name `x`")));
}

#[test]
fn parameter_shadowing_warns() {
    let (result, diagnostics) = check("local x = 1\nlocal f = function(x: number) return x end\n");
    assert!(result.is_ok());
    assert!(diagnostics
        .iter()
        .any(|d| d.message.contains("Function parameter shadows name `x`")));
}

#[test]
fn for_variable_shadowing_warns() {
    let source = "local i = 1\nfor i = 1, 10 do\n  print(i)\nend\n";
    let (result, diagnostics) = check(source);
    assert!(result.is_ok());
    assert!(diagnostics
        .iter()
        .any(|d| d.message.contains("For-loop variable shadows name `i`")));
}

#[test]
fn annotated_local_initializer_must_match() {
    let (result, diagnostics) = check("local x: number = 'oops'\n");
    assert!(result.is_err());
    assert!(diagnostics
        .iter()
        .any(|d| d.message.contains("Cannot assign `'oops'` to `number`")));
}

#[test]
fn fixed_return_type_rejects_mismatched_return() {
    let source = "local f = function(): number\n  return 'no'\nend\n";
    let (result, diagnostics) = check(source);
    assert!(result.is_err());
    assert!(diagnostics
        .iter()
        .any(|d| d.message.contains("Cannot assign")));
}

#[test]
fn calling_a_number_is_rejected() {
    let (result, diagnostics) = check("local x = 1\nlocal y = x()\n");
    assert!(result.is_err());
    assert!(diagnostics
        .iter()
        .any(|d| d.message.contains("cannot be called")));
}

#[test]
fn too_many_arguments_are_rejected() {
    let source = "local f = function(x: number): number\n  return x\nend\nf(1, 2)\n";
    let (result, diagnostics) = check(source);
    assert!(result.is_err());
    assert!(diagnostics
        .iter()
        .any(|d| d.message.contains("Too many arguments")));
}

#[test]
fn missing_argument_must_accept_nil() {
    let source = "local f = function(x: number): number\n  return x\nend\nf()\n";
    let (result, diagnostics) = check(source);
    assert!(result.is_err());
    assert!(diagnostics
        .iter()
        .any(|d| d.message.contains("Invalid parameter 0")));
}

#[test]
fn optional_parameters_accept_omission() {
    let source =
        "local f = function(x: number | nil): number\n  return 1\nend\nf()\nf(2)\n";
    let (result, diagnostics) = check(source);
    assert!(result.is_ok(), "diagnostics: {diagnostics:?}");
}

#[test]
fn too_many_assignment_values_are_rejected() {
    let (result, diagnostics) = check("local a, b = 1, 2\na, b = 1, 2, 3\n");
    assert!(result.is_err());
    assert!(diagnostics
        .iter()
        .any(|d| d.message.contains("Too many values")));

    // A single target simply takes the first value.
    let (result, diagnostics) = check("local a = 1\na = 2, 3\n");
    assert!(result.is_ok(), "diagnostics: {diagnostics:?}");
}

#[test]
fn multi_return_call_spreads_over_assignment_targets() {
    let source = "\
local f = function(): [number, string]
  return 1, 'x'
end
local a: number = 0
local b: string = ''
a, b = f()
";
    let (result, diagnostics) = check(source);
    assert!(result.is_ok(), "diagnostics: {diagnostics:?}");
    assert!(diagnostics.is_empty(), "got {diagnostics:?}");

    // Each target is paired with its own position of the spliced
    // result, so the second value is checked too.
    let source = "\
local g = function(): [number, number]
  return 1, 2
end
local a: number = 0
local b: string = ''
a, b = g()
";
    let (result, diagnostics) = check(source);
    assert!(result.is_err(), "diagnostics: {diagnostics:?}");
    assert!(diagnostics
        .iter()
        .any(|d| d.message.contains("Cannot assign `number` to `string`")));
}

#[test]
fn multi_return_call_widens_narrowing_targets() {
    let source = "\
local f = function(): [number, string]
  return 1, 'x'
end
local a = 0
local b = ''
a, b = f()
global want: string
want = b
";
    let (result, diagnostics) = check(source);
    assert!(result.is_ok(), "diagnostics: {diagnostics:?}");
}

#[test]
fn global_redeclaration_must_stay_compatible() {
    let (result, diagnostics) = check("global g: number\nglobal g: string\n");
    assert!(result.is_err());
    assert!(diagnostics
        .iter()
        .any(|d| d.message.contains("Global variable conflict")));
}

#[test]
fn interface_shadowing_warns() {
    let (result, diagnostics) = check("interface point: { x: number }\ninterface point: { y: number }\n");
    assert!(result.is_ok());
    assert!(diagnostics
        .iter()
        .any(|d| d.severity == Severity::Warning
            && d.message.contains("Interface `point` shadows existing type")));
}

#[test]
fn table_index_key_must_not_admit_nil() {
    let (result, diagnostics) = check("local t: { [nil|number]: string }\n");
    assert!(result.is_err());
    assert!(diagnostics
        .iter()
        .any(|d| d.message.contains("Key type must not be compatible with `nil`")));
}

#[test]
fn missing_field_is_reported_with_notes() {
    let source = "local t = { a = 1 }\nlocal x = t.b\n";
    let (result, diagnostics) = check(source);
    assert!(result.is_err());
    assert!(diagnostics
        .iter()
        .any(|d| d.message.contains("Could not find field 'b'")));
}

#[test]
fn recursive_interface_checks_cleanly() {
    let source = "\
interface node: { value: number; next: node | nil }
global head: node
head = { value = 1, next = nil }
head = { value = 2, next = { value = 3, next = nil } }
";
    let (result, diagnostics) = check(source);
    assert!(result.is_ok(), "diagnostics: {diagnostics:?}");
    assert!(diagnostics.is_empty(), "got {diagnostics:?}");
}

#[test]
fn syntax_error_is_reported_with_location() {
    let (result, diagnostics) = check("local = 1\n");
    assert!(result.is_err());
    let errors = errors(&diagnostics);
    assert!(!errors.is_empty());
    assert_eq!(errors[0].span.line, 1);
    assert_eq!(errors[0].span.column, 7);
}
