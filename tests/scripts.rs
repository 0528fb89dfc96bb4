use goscript::{exec, parse_file, Error};
use std::process::Command;

fn run_script(name: &str, src: &str) -> String {
    let mut out = vec![];
    if let Err(err) = exec(name, src, &mut out) {
        panic!("\n{name} failed: {err}\n");
    }
    String::from_utf8(out).unwrap()
}

#[test]
fn test_demo_scripts() {
    assert_eq!(run_script("hello.gs", include_str!("../demos/hello.gs")), "no\n3\n");
    assert_eq!(
        run_script("scopes.gs", include_str!("../demos/scopes.gs")),
        "20\n10\n20\n42\n"
    );
    assert_eq!(
        run_script("arithmetic.gs", include_str!("../demos/arithmetic.gs")),
        "9\n5\n14\n3\n1\n10\n253\ntrue\ntrue\n"
    );
}

#[test]
fn test_demo_scripts_parse_cleanly() {
    for (name, src) in [
        ("hello.gs", include_str!("../demos/hello.gs")),
        ("scopes.gs", include_str!("../demos/scopes.gs")),
        ("arithmetic.gs", include_str!("../demos/arithmetic.gs")),
    ] {
        let file = parse_file(name, src).unwrap();
        assert!(!file.stmts.is_empty());
    }
}

#[test]
fn test_twelve_syntax_errors_are_capped() {
    let src = "var = 1\n".repeat(12);
    let mut out = vec![];
    match exec("broken.gs", &src, &mut out) {
        Err(Error::Parse(errors)) => {
            assert_eq!(errors.len(), 10);
            for (line, err) in errors.iter().enumerate() {
                assert_eq!(
                    err.to_string(),
                    format!("broken.gs:{}:5: expected 'IDENT', found '='", line + 1)
                );
            }
        }
        other => panic!("expected parse errors, got {other:?}"),
    }
    assert!(out.is_empty());
}

fn goscript() -> Command {
    Command::new(env!("CARGO_BIN_EXE_goscript"))
}

#[test]
fn test_cli_runs_script() {
    let output = goscript().arg("demos/hello.gs").output().unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "no\n3\n");
}

#[test]
fn test_cli_evaluates_expression() {
    let output = goscript().args(["-e", "8 - (2+3) * 2"]).output().unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "-2\n");
}

#[test]
fn test_cli_reports_failures() {
    let output = goscript().arg("Cargo.toml").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("not a goscript file"));

    let output = goscript().args(["-e", "+"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(
        String::from_utf8_lossy(&output.stderr),
        "<expr>:1:1: expected operand after '+', found 'EOF'\n"
    );

    let output = goscript().args(["-e", "1 / 0"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("integer division by zero"));
}
