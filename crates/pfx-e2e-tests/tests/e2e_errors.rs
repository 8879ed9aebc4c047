//! Diagnostic behavior across the pipeline: what fails, and with which code.

mod common;

use pfx_bytecode::TranslateError;
use pfx_ir::code;

#[test]
fn unknown_names_carry_distinct_codes() {
    let analysis = common::analyze("void f() { Widget w; }");
    assert_eq!(common::errors_with(&analysis, code::UNKNOWN_TYPE), 1);

    let analysis = common::analyze("int f() { return missing; }");
    assert_eq!(common::errors_with(&analysis, code::UNKNOWN_VARIABLE), 1);

    let analysis = common::analyze("void f() { conjure(1.0); }");
    assert_eq!(common::errors_with(&analysis, code::UNKNOWN_FUNCTION), 1);
}

#[test]
fn recursion_blacklists_every_cycle_member() {
    let source = r#"
        int ping(int n) {
            return pong(n);
        }

        int pong(int n) {
            return ping(n);
        }
    "#;
    let analysis = common::analyze(source);
    assert_eq!(common::errors_with(&analysis, code::RECURSIVE_FUNCTION), 2);
    assert!(!analysis.success());
}

#[test]
fn entries_touching_recursion_are_not_compilable() {
    let source = r#"
        int spin(int n) {
            return spin(n);
        }

        [pixel] int main() {
            return spin(3);
        }
    "#;
    let analysis = common::analyze(source);
    assert_eq!(common::errors_with(&analysis, code::RECURSIVE_FUNCTION), 1);
    assert_eq!(common::errors_with(&analysis, code::BLACKLISTED_CALL), 1);
    assert_eq!(common::errors_with(&analysis, code::ENTRY_NOT_COMPILABLE), 1);
    assert!(analysis.module.entry_points.is_empty());
}

#[test]
fn matrix_division_is_rejected_for_every_shape() {
    for rows in 2..=4 {
        for cols in 2..=4 {
            let ty = format!("float{rows}x{cols}");
            let source = format!("void f({ty} a, {ty} b) {{ {ty} c = a / b; }}");
            let analysis = common::analyze(&source);
            assert_eq!(
                common::errors_with(&analysis, code::INVALID_BINARY_OPERANDS),
                1,
                "{ty} division must be rejected exactly once"
            );
        }
    }
}

#[test]
fn modulo_is_rejected_for_every_operand_type() {
    let analysis = common::analyze("void f(int a, int b) { int c = a % b; }");
    assert_eq!(common::errors_with(&analysis, code::INVALID_BINARY_OPERANDS), 1);

    let analysis = common::analyze("void f(float a, float b) { a %= b; }");
    assert_eq!(common::errors_with(&analysis, code::INVALID_BINARY_OPERANDS), 1);
}

#[test]
fn out_params_are_unreadable_until_written() {
    let source = r#"
        float f(out float r) {
            float x = r;
            r = 1.0;
            return x;
        }
    "#;
    let analysis = common::analyze(source);
    assert_eq!(common::errors_with(&analysis, code::NOT_READABLE), 1);

    let source = r#"
        float f(out float r) {
            r = 1.0;
            return r;
        }
    "#;
    let analysis = common::analyze(source);
    assert!(analysis.success(), "{:?}", analysis.report);
}

#[test]
fn vertex_entries_cannot_depend_on_thread_index() {
    let source = "[vertex] void main() { int i = threadIndex(); }";
    let analysis = common::analyze(source);
    assert_eq!(common::errors_with(&analysis, code::VERTEX_STAGE_MISMATCH), 1);
    assert!(analysis.module.entry_points.is_empty());
}

#[test]
fn conditions_must_be_boolean() {
    let analysis = common::analyze("void f() { if (1) { } }");
    assert_eq!(common::errors_with(&analysis, code::NON_BOOL_CONDITION), 1);
}

#[test]
fn value_functions_must_return_on_every_path() {
    let analysis = common::analyze("int f(bool c) { if (c) { return 1; } }");
    assert_eq!(common::errors_with(&analysis, code::MISSING_RETURN), 1);
}

#[test]
fn translation_faults_surface_as_errors() {
    let err = common::try_compile("[pixel] int main() { return 4; }", "absent").unwrap_err();
    assert!(matches!(err, TranslateError::NoSuchEntry(_)));

    let source = r#"
        [pixel] float main(int i) {
            float taps[4];
            taps[0] = 1.0;
            return taps[i];
        }
    "#;
    let err = common::try_compile(source, "main").unwrap_err();
    assert!(matches!(err, TranslateError::Unsupported(_)));

    let source = r#"
        float heights[];

        [pixel] float main() {
            return heights[0];
        }
    "#;
    let err = common::try_compile(source, "main").unwrap_err();
    assert!(matches!(err, TranslateError::UnresolvedLength(name) if name == "heights"));
}
