use anyhow::Result;
use coderun_eval::{
    CodeRunner, Constant, EvalOptions, FaultKind, Limits, Namespace, RESULT_NAME, ReturnMode,
    RuntimeFault, Value, call_function, eval_code, eval_code_with,
};
use coderun_syntax::{BinaryOp, CompileFlags, Mode, NodeKind, SyntaxError, should_quiet};
use coderun_syntax::ast::Constant as Literal;
use std::thread;

fn eval_with(source: &str, ns: &mut Namespace, return_mode: ReturnMode) -> Option<Value> {
    let options = EvalOptions {
        return_mode,
        ..EvalOptions::default()
    };
    eval_code_with(source, ns, &options).unwrap()
}

fn eval_loud(source: &str, ns: &mut Namespace) -> Option<Value> {
    let options = EvalOptions {
        quiet_trailing_semicolon: false,
        ..EvalOptions::default()
    };
    eval_code_with(source, ns, &options).unwrap()
}

fn syntax_error(err: &anyhow::Error) -> &SyntaxError {
    err.downcast_ref::<SyntaxError>()
        .unwrap_or_else(|| panic!("expected a syntax error, got {}", err))
}

#[test]
fn test_quieting_analyzer() {
    assert!(should_quiet("1+1;"));
    assert!(!should_quiet("1+1#;"));
    assert!(!should_quiet("5-2  # comment with trailing semicolon ;"));
    assert!(should_quiet("1+1; # note"));
}

#[test]
fn test_basic_runs() -> Result<()> {
    assert_eq!(CodeRunner::new("1+1").run_fresh()?, Some(Value::Int(2)));
    assert_eq!(CodeRunner::new("1+1\n1+1").run_fresh()?, Some(Value::Int(2)));

    let mut ns = Namespace::new().with("x", 3_i64);
    assert_eq!(CodeRunner::new("x + 7").run(&mut ns)?, Some(Value::Int(10)));
    Ok(())
}

#[test]
fn test_tree_and_artifact_edits() -> Result<()> {
    let mut runner = CodeRunner::new("x + 7");

    // x + 7  ->  x * 2 + 7
    let tree = runner.tree()?;
    let stmt = tree.body()[0];
    let NodeKind::Expr { value: sum } = tree[stmt].kind else {
        panic!("expected an expression statement");
    };
    let NodeKind::BinOp { left: x, .. } = tree[sum].kind else {
        panic!("expected a binary operation");
    };
    let two = tree.add(NodeKind::Constant { value: Literal::Int(2) });
    let product = tree.add(NodeKind::BinOp {
        left: x,
        op: BinaryOp::Mul,
        right: two,
    });
    if let NodeKind::BinOp { left, .. } = &mut tree[sum].kind {
        *left = product;
    }

    runner.compile()?;
    let mut ns = Namespace::new().with("x", 3_i64);
    assert_eq!(runner.run(&mut ns)?, Some(Value::Int(13)));

    // Swap the constant pool: 2 -> 3, 7 -> 5.
    let artifact = runner.artifact().unwrap();
    assert_eq!(
        artifact.constants,
        vec![Constant::Int(2), Constant::Int(7), Constant::None]
    );
    let edited = artifact.with_constants(vec![Constant::Int(3), Constant::Int(5), Constant::None]);
    runner.set_artifact(edited);

    let mut ns = Namespace::new().with("x", 4_i64);
    assert_eq!(runner.run(&mut ns)?, Some(Value::Int(17)));
    Ok(())
}

#[test]
fn test_artifact_mut_edit() -> Result<()> {
    let mut runner = CodeRunner::new("40 + 1");
    runner.compile()?;
    if let Some(artifact) = runner.artifact_mut() {
        for constant in &mut artifact.constants {
            if *constant == Constant::Int(1) {
                *constant = Constant::Int(2);
            }
        }
    }
    assert_eq!(runner.run_fresh()?, Some(Value::Int(42)));
    Ok(())
}

#[test]
fn test_modes() -> Result<()> {
    let exec = CodeRunner::new("1+1\n1+1").with_mode(Mode::Exec).run_fresh()?;
    assert_eq!(exec, Some(Value::Int(2)));

    let err = CodeRunner::new("1+1\n1+1").with_mode(Mode::Eval).run_fresh().unwrap_err();
    assert!(syntax_error(&err).to_string().starts_with("invalid syntax"));

    let err = CodeRunner::new("1+1\n1+1").with_mode(Mode::Single).run_fresh().unwrap_err();
    assert_eq!(
        syntax_error(&err).to_string(),
        "multiple statements found while compiling a single statement"
    );

    let err = CodeRunner::new("def f():\n  1")
        .with_mode(Mode::Single)
        .with_flags(CompileFlags::DONT_IMPLY_DEDENT)
        .run_fresh()
        .unwrap_err();
    assert!(syntax_error(&err).to_string().starts_with("invalid syntax"));

    let eval = CodeRunner::new("1 + 2, 3").with_mode(Mode::Eval).run_fresh()?;
    assert_eq!(eval, Some(Value::tuple(vec![Value::Int(3), Value::Int(3)])));

    let single = CodeRunner::new("x = 1; x + 1").with_mode(Mode::Single).run_fresh()?;
    assert_eq!(single, None);
    Ok(())
}

#[test]
fn test_unknown_mode_name() {
    let err = CodeRunner::new("1").with_mode_name("exe").unwrap_err();
    assert_eq!(err.option, "mode");
    assert_eq!(err.value, "exe");
}

#[test]
fn test_parse_errors_surface_from_every_stage() {
    let mut runner = CodeRunner::new("1 +");
    assert!(runner.parse().is_err());
    assert!(runner.tree().is_err());
    assert!(runner.compile().is_err());
    assert!(runner.artifact().is_none());
}

#[test]
fn test_eval_code_functions_and_walrus() -> Result<()> {
    let mut ns = Namespace::new();
    let value = eval_code(
        r#"
        def f(x):
            return 2*x + 5
        f(77)
    "#,
        &mut ns,
    )?;
    assert_eq!(value, Some(Value::Int(2 * 77 + 5)));

    let f = ns["f"].clone();
    let result = call_function(&f, vec![Value::Int(7)], &mut ns, &Limits::default())?;
    assert_eq!(result, Value::Int(19));

    assert_eq!(eval_code("(x:=4)", &mut ns)?, Some(Value::Int(4)));
    assert_eq!(ns["x"], Value::Int(4));
    assert_eq!(eval_code("x=7", &mut ns)?, None);
    assert_eq!(ns["x"], Value::Int(7));
    Ok(())
}

#[test]
fn test_last_expr_with_quieting() -> Result<()> {
    let mut ns = Namespace::new();
    assert_eq!(eval_code("1+1;", &mut ns)?, None);
    assert_eq!(eval_code("1+1#;", &mut ns)?, Some(Value::Int(2)));
    assert_eq!(
        eval_code("5-2  # comment with trailing semicolon ;", &mut ns)?,
        Some(Value::Int(3))
    );
    assert_eq!(eval_code("4//2\n", &mut ns)?, Some(Value::Int(2)));
    assert_eq!(eval_code("2**1\n\n", &mut ns)?, Some(Value::Int(2)));
    assert_eq!(eval_code("4//2;\n", &mut ns)?, None);
    assert_eq!(eval_code("2**1;\n\n", &mut ns)?, None);
    Ok(())
}

#[test]
fn test_last_expr_or_assign() {
    let mut ns = Namespace::new();
    let mode = ReturnMode::LastExprOrAssign;
    assert_eq!(eval_with("1 + 1", &mut ns, mode), Some(Value::Int(2)));
    assert_eq!(eval_with("x = 1 + 1", &mut ns, mode), Some(Value::Int(2)));
    assert_eq!(eval_with("a = 5 ; a += 1", &mut ns, mode), Some(Value::Int(6)));
    assert_eq!(ns["a"], Value::Int(6));
    assert_eq!(eval_with("a = 5 ; a += 1;", &mut ns, mode), None);
    assert_eq!(eval_with("l = [1, 1, 2] ; l[0] = 0", &mut ns, mode), None);
    assert_eq!(eval_with("a = b = 2", &mut ns, mode), Some(Value::Int(2)));
    assert_eq!(ns["b"], Value::Int(2));
}

#[test]
fn test_chained_assignment_evaluates_once() {
    let mut ns = Namespace::new();
    eval_code("calls = []\ndef g():\n    calls.append(1)\n    return 3", &mut ns).unwrap();
    let value = eval_with("a = b = g()", &mut ns, ReturnMode::LastExprOrAssign);
    assert_eq!(value, Some(Value::Int(3)));
    assert_eq!(eval_code("len(calls)", &mut ns).unwrap(), Some(Value::Int(1)));
}

#[test]
fn test_return_mode_none() {
    let mut ns = Namespace::new();
    let mode = ReturnMode::None;
    for source in [
        "1 + 1",
        "x = 1 + 1",
        "a = 5 ; a += 1",
        "a = 5 ; a += 1;",
        "l = [1, 1, 2] ; l[0] = 0",
    ] {
        assert_eq!(eval_with(source, &mut ns, mode), None, "{}", source);
    }
    assert_eq!(ns["x"], Value::Int(2));
}

#[test]
fn test_quieting_disabled() {
    let mut ns = Namespace::new();
    for source in [
        "1+1;",
        "1+1#;",
        "4//2\n",
        "2**1\n\n",
        "4//2;\n",
        "2**1;\n\n",
    ] {
        assert_eq!(eval_loud(source, &mut ns), Some(Value::Int(2)), "{:?}", source);
    }
    assert_eq!(
        eval_loud("5-2  # comment with trailing semicolon ;", &mut ns),
        Some(Value::Int(3))
    );
}

#[test]
fn test_no_result_residue() {
    let mut ns = Namespace::new().with("keep", 1_i64);
    eval_code("y = 2\ny * 3", &mut ns).unwrap();
    assert!(!ns.contains(RESULT_NAME));

    let err = eval_code("z = 1\n[1, 2][z] + undefined_name", &mut ns).unwrap_err();
    let fault = err.downcast_ref::<RuntimeFault>().unwrap();
    assert_eq!(fault.kind, FaultKind::NameError);
    assert!(!ns.contains(RESULT_NAME));
    assert_eq!(ns.names(), vec!["keep", "y", "z"]);
}

#[test]
fn test_faults_propagate_unchanged() {
    let mut ns = Namespace::new();
    let err = eval_code("[1, 2, 3][10]", &mut ns).unwrap_err();
    let fault = err.downcast_ref::<RuntimeFault>().unwrap();
    assert_eq!(fault.kind, FaultKind::IndexError);
    assert_eq!(fault.span.map(|s| s.line), Some(1));
}

#[test]
fn test_artifact_runs_concurrently() -> Result<()> {
    let mut runner = CodeRunner::new(
        "def sq(n):\n    return n * n\ntotal = 0\nfor i in range(k):\n    total += sq(i)\ntotal",
    );
    runner.compile()?;
    let artifact = runner.artifact().unwrap();

    let results: Vec<i64> = thread::scope(|s| {
        let handles: Vec<_> = (1..=4_i64)
            .map(|k| {
                s.spawn(move || {
                    let mut ns = Namespace::new().with("k", k * 10);
                    artifact.run(&mut ns, &Limits::default()).unwrap();
                    ns["total"].as_int().unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let expected: Vec<i64> = (1..=4_i64).map(|k| (0..k * 10).map(|i| i * i).sum()).collect();
    assert_eq!(results, expected);
    Ok(())
}

#[test]
fn test_indented_source_is_dedented() -> Result<()> {
    let mut ns = Namespace::new();
    let value = eval_code("    a = [3, 1, 2]\n    a.sort()\n    a", &mut ns)?;
    assert_eq!(value.map(|v| v.repr()), Some("[1, 2, 3]".to_string()));
    Ok(())
}
