use super::*;
use crate::error::ParseError;

const DEFAULT_SCRIPT: &str = r#"
# drive the order pages and capture a report
request = user_input()
modified = app_operation(request, instruction='open the orders page')
response(modified)
request2 = user_input()
pic = menu_action(request2, save_pic='save_pic')
report = menu_action(request2, get_report='get_report', pic=pic)
summary = summary_result(request2)
response(summary)
"#;

#[test]
fn test_parse_default_script() {
    let program = parse(DEFAULT_SCRIPT).unwrap();
    assert_eq!(program.len(), 8);

    assert_eq!(program.steps[0].op, OpKind::UserInput);
    assert_eq!(program.steps[0].result_var.as_deref(), Some("request"));

    assert_eq!(program.steps[1].op, OpKind::AppOperation);
    assert_eq!(program.steps[1].positional, vec![Arg::Var("request".to_string())]);
    assert_eq!(
        program.steps[1].kwarg("instruction"),
        Some(&Arg::Lit(Value::Str("open the orders page".to_string())))
    );

    // Bare call binds nothing.
    assert_eq!(program.steps[2].op, OpKind::Response);
    assert_eq!(program.steps[2].result_var, None);

    // Keyword value referencing an earlier binding.
    assert_eq!(
        program.steps[5].kwarg("pic"),
        Some(&Arg::Var("pic".to_string()))
    );
}

#[test]
fn test_parse_is_deterministic() {
    let a = parse(DEFAULT_SCRIPT).unwrap();
    let b = parse(DEFAULT_SCRIPT).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_comments_and_blank_lines_skipped() {
    let program = parse("# only a comment\n\n  # another\nx = user_input()\n").unwrap();
    assert_eq!(program.len(), 1);
}

#[test]
fn test_literal_kinds() {
    let program = parse(
        "x = user_input()\nresponse(x, count=3, ratio=-0.5, flag=true, missing=null, note=\"hi\")",
    )
    .unwrap();

    let step = &program.steps[1];
    assert_eq!(step.kwarg("count"), Some(&Arg::Lit(Value::Num(3.0))));
    assert_eq!(step.kwarg("ratio"), Some(&Arg::Lit(Value::Num(-0.5))));
    assert_eq!(step.kwarg("flag"), Some(&Arg::Lit(Value::Bool(true))));
    assert_eq!(step.kwarg("missing"), Some(&Arg::Lit(Value::Null)));
    assert_eq!(
        step.kwarg("note"),
        Some(&Arg::Lit(Value::Str("hi".to_string())))
    );
}

#[test]
fn test_unknown_operation_rejected() {
    let err = parse("x = frobnicate()").unwrap_err();
    match err {
        ParseError::UnknownOperation { name, line } => {
            assert_eq!(name, "frobnicate");
            assert_eq!(line, 1);
        }
        other => panic!("expected UnknownOperation, got {:?}", other),
    }
}

#[test]
fn test_undefined_variable_rejected() {
    let err = parse("response(nope)").unwrap_err();
    match err {
        ParseError::UndefinedVariable { name, .. } => assert_eq!(name, "nope"),
        other => panic!("expected UndefinedVariable, got {:?}", other),
    }
}

#[test]
fn test_binding_not_visible_to_same_step() {
    // A step cannot reference the variable it binds.
    let err = parse("x = app_operation(x, instruction='loop')").unwrap_err();
    assert!(matches!(err, ParseError::UndefinedVariable { .. }));
}

#[test]
fn test_reserved_input_variable_always_bound() {
    let program = parse("response(input)").unwrap();
    assert_eq!(program.len(), 1);
}

#[test]
fn test_variable_visible_after_binding() {
    let program = parse("x = user_input()\nresponse(x)").unwrap();
    assert_eq!(program.steps[1].positional, vec![Arg::Var("x".to_string())]);
}

#[test]
fn test_syntax_error_on_garbage() {
    assert!(matches!(
        parse("this is not a statement"),
        Err(ParseError::Syntax(_))
    ));
    assert!(matches!(parse("x = "), Err(ParseError::Syntax(_))));
    assert!(matches!(
        parse("response(unterminated'"),
        Err(ParseError::Syntax(_))
    ));
}

#[test]
fn test_empty_program_parses() {
    let program = parse("").unwrap();
    assert!(program.is_empty());
}
