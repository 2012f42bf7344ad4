//! End-to-end `source -> stdout` scenarios from `spec.md` §8, driven
//! through the library's `run` entry point rather than by shelling out
//! to the compiled binary.

fn run_ok(source: &str) -> String {
    let mut out = Vec::new();
    venom::run(source, &mut out, false).expect("pipeline should succeed");
    String::from_utf8(out).expect("print output is valid UTF-8")
}

#[test]
fn arithmetic_precedence() {
    assert_eq!(run_ok("print 1 + 2 * 3;"), "7\n");
}

#[test]
fn globals_and_addition() {
    assert_eq!(run_ok("let x = 10; let y = 20; print x + y;"), "30\n");
}

#[test]
fn function_call() {
    assert_eq!(
        run_ok("fn add(a, b) { return a + b; } print add(2, 3);"),
        "5\n"
    );
}

#[test]
fn while_loop() {
    assert_eq!(
        run_ok("let i = 0; while (i < 3) { print i; i = i + 1; }"),
        "0\n1\n2\n"
    );
}

#[test]
fn struct_field_access() {
    assert_eq!(
        run_ok("struct P { x, y } let p = P { x: 1, y: 2 }; print p.x + p.y;"),
        "3\n"
    );
}

#[test]
fn break_outside_loop_is_a_static_error() {
    let mut out = Vec::new();
    let err = venom::run("break;", &mut out, false).unwrap_err();
    assert!(err.to_string().contains("outside the loop"));
}

#[test]
fn continue_outside_loop_is_a_static_error() {
    let mut out = Vec::new();
    let err = venom::run("continue;", &mut out, false).unwrap_err();
    assert!(err.to_string().contains("outside the loop"));
}

#[test]
fn optimizer_folds_constants_without_changing_output() {
    assert_eq!(
        run_ok("print (1 + 2) * 3;"),
        "9\n"
    );
    let mut out = Vec::new();
    venom::run("print (1 + 2) * 3;", &mut out, true).expect("pipeline should succeed");
    assert_eq!(String::from_utf8(out).unwrap(), "9\n");
}

#[test]
fn if_else_branches() {
    assert_eq!(
        run_ok("if (1 < 2) { print 1; } else { print 2; }"),
        "1\n"
    );
    assert_eq!(
        run_ok("if (2 < 1) { print 1; } else { print 2; }"),
        "2\n"
    );
}

#[test]
fn nested_loops_break_to_innermost() {
    assert_eq!(
        run_ok(
            "let i = 0; while (i < 2) { let j = 0; while (j < 5) { if (j == 1) { break; } print j; j = j + 1; } i = i + 1; }"
        ),
        "0\n0\n"
    );
}

#[test]
fn undefined_global_is_a_runtime_error() {
    let mut out = Vec::new();
    let err = venom::run("print missing;", &mut out, false).unwrap_err();
    assert!(err.to_string().contains("missing"));
}
