use aliasvm::{run, ErrorKind, RecordingExecutor, Result};

fn commands(source: &str) -> Result<Vec<String>> {
    let lines: Vec<&str> = source.lines().collect();
    let mut exec = RecordingExecutor::new();
    run(&lines, &mut exec)?;
    Ok(exec.commands)
}

#[test]
fn test_arithmetic_results() {
    let source = r#"
        a = 2 + 3 * 4
        b = 2 ^ 3
        c = (1 + 2) * 3
        d = 1 + 2 * 3
        e = 2 ^ 3 ^ 2
        f = 10 - 4 - 3
        say {$a} {$b} {$c} {$d} {$e} {$f}
    "#;
    assert_eq!(commands(source).unwrap(), ["say 14 8.0 9 7 512.0 3"]);
}

#[test]
fn test_string_concatenation_order() {
    let source = r#"
        s = "a" + "b"
        say {$s}
    "#;
    assert_eq!(commands(source).unwrap(), ["say ba"]);
}

#[test]
fn test_string_subtraction_is_rejected() {
    let err = commands("s = \"a\" - \"b\"").unwrap_err();
    assert!(err.is_compile_error());
    assert!(matches!(err.kind, ErrorKind::StringOperator(_)));
}

#[test]
fn test_countdown_loop() {
    let source = r#"
        # count down from five
        n = 5
        while n > 0
            if n % 2 = 0
                say {$n} is even
            else
                say {$n} is odd
            end
            n = n - 1
        end
        say liftoff
    "#;
    assert_eq!(
        commands(source).unwrap(),
        [
            "say 5 is odd",
            "say 4 is even",
            "say 3 is odd",
            "say 2 is even",
            "say 1 is odd",
            "say liftoff",
        ]
    );
}

#[test]
fn test_elif_picks_first_match() {
    let source = r#"
        score = 75
        if score >= 90
            say A
        elif score >= 70
            say C or better
        elif score >= 50
            say pass
        else
            say fail
        end
    "#;
    assert_eq!(commands(source).unwrap(), ["say C or better"]);
}

#[test]
fn test_mixed_types_widen() {
    let source = r#"
        i = 7
        l = 3000000000
        f = 1.5f
        sum = i + l
        half = i / 2d
        label = "total: " + sum
        say {$sum} {$half} {$f}
        say {$label}
    "#;
    assert_eq!(
        commands(source).unwrap(),
        ["say 3000000007 3.5 1.5", "say 3000000007total: "]
    );
}

#[test]
fn test_undeclared_variable_is_compile_error() {
    let err = commands("say start\nx = y + 1").unwrap_err();
    assert_eq!(err.kind, ErrorKind::UndeclaredVariable("y".to_string()));
    assert_eq!(err.line, Some(2));
}

#[test]
fn test_unterminated_if() {
    let err = commands("x = 1\nif x > 0\nsay hi").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnterminatedBlock { keyword: "if", line: 2 }));
}

#[test]
fn test_infinite_loop_hits_step_budget() {
    let err = commands("x = 1\nwhile x > 0\nx = x + 0\nend").unwrap_err();
    assert_eq!(err.kind, ErrorKind::StepBudgetExceeded(100_000));
    assert!(!err.is_compile_error());
}

#[test]
fn test_return_skips_rest() {
    let source = r#"
        i = 0
        while i < 10
            if i = 3
                return
            end
            say {$i}
            i = i + 1
        end
        say unreachable
    "#;
    assert_eq!(commands(source).unwrap(), ["say 0", "say 1", "say 2"]);
}

#[test]
fn test_error_display_points_at_column() {
    let err = commands("x = 1 + * 2").unwrap_err();
    let text = err.to_string();
    assert!(text.starts_with("[line 1:9] Error:"), "{}", text);
    assert!(text.contains("\n  | x = 1 + * 2\n  |         ^"), "{}", text);
}
