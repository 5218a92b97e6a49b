use std::collections::BTreeMap;
use std::sync::Arc;

use hcl_value::{Function, FunctionError, Mark, Parameter, Type, Value};

use super::*;
use crate::diagnostics::FunctionCallDiagExtra;
use crate::eval_context::EvalContext;
use crate::expression::Expression;
use crate::structure::{AttributeSchema, BlockHeaderSchema, BodySchema};
use crate::traversal::Traverser;

fn expr(src: &str) -> Expr {
    let (expr, diags) = parse_expression(src.as_bytes(), "test.hcl", Pos::INITIAL);
    assert!(diags.is_empty(), "unexpected diagnostics for {src:?}: {diags}");
    expr
}

fn eval(src: &str, ctx: &Arc<EvalContext>) -> (Value, Diagnostics) {
    expr(src).value(Some(ctx))
}

fn eval_ok(src: &str, ctx: &Arc<EvalContext>) -> Value {
    let (val, diags) = eval(src, ctx);
    assert!(diags.is_empty(), "unexpected diagnostics for {src:?}: {diags}");
    val
}

fn summaries(diags: &Diagnostics) -> Vec<String> {
    diags.iter().map(|diag| diag.summary.clone()).collect()
}

fn empty_ctx() -> Arc<EvalContext> {
    Arc::new(EvalContext::new())
}

fn ctx_with(vars: &[(&str, Value)]) -> Arc<EvalContext> {
    let mut ctx = EvalContext::new();
    for (name, value) in vars {
        ctx.set_variable(*name, value.clone());
    }
    Arc::new(ctx)
}

fn upper() -> Function {
    Function::simple(
        vec![Parameter::new("str", Type::String)],
        None,
        Type::String,
        |args| Ok(Value::string(args[0].as_str().unwrap_or_default().to_uppercase())),
    )
}

fn sum() -> Function {
    Function::simple(
        Vec::new(),
        Some(Parameter::new("numbers", Type::Number)),
        Type::Number,
        |args| {
            let total = args
                .iter()
                .filter_map(|arg| arg.as_number().cloned())
                .sum();
            Ok(Value::number(total))
        },
    )
}

fn picky() -> Function {
    Function::simple(
        vec![Parameter::new("input", Type::String)],
        None,
        Type::String,
        |_| Err(FunctionError::arg(0, "this input is not acceptable")),
    )
}

fn function_ctx() -> Arc<EvalContext> {
    let mut ctx = EvalContext::new();
    ctx.set_function("upper", upper());
    ctx.set_function("sum", sum());
    ctx.set_function("picky", picky());
    Arc::new(ctx)
}

fn objects(names: &[&str]) -> Value {
    Value::list(
        names
            .iter()
            .map(|name| Value::object_from([("name", Value::string(*name))]))
            .collect(),
    )
}

#[test]
fn malformed_utf8_in_string_is_reported() {
    let (file, diags) = parse_config(b"a = \"\xff\"\n", "test.hcl", Pos::INITIAL);
    assert_eq!(summaries(&diags), vec!["Invalid character encoding"]);
    assert_eq!(diags[0].subject.as_ref().map(|range| range.start.byte), Some(5));

    let (attrs, _) = file.body.just_attributes();
    let (value, _) = attrs["a"].expr.value(None);
    assert_eq!(value, Value::string("\u{fffd}"));
}

#[test]
fn arithmetic_respects_precedence() {
    let ctx = empty_ctx();
    assert_eq!(eval_ok("1 + 2 * 3", &ctx), Value::int(7));
    assert_eq!(eval_ok("(1 + 2) * 3", &ctx), Value::int(9));
    assert_eq!(eval_ok("10 - 4 - 3", &ctx), Value::int(3));
    assert_eq!(eval_ok("-(2)", &ctx), Value::int(-2));
    assert_eq!(eval_ok("!true", &ctx), Value::bool(false));
    assert_eq!(eval_ok("1 < 2 && 2 <= 2", &ctx), Value::bool(true));
}

#[test]
fn equality_across_types_is_false() {
    let ctx = empty_ctx();
    assert_eq!(eval_ok("null == null", &ctx), Value::bool(true));
    assert_eq!(eval_ok("1 == \"one\"", &ctx), Value::bool(false));
    assert_eq!(eval_ok("\"a\" != \"b\"", &ctx), Value::bool(true));
}

#[test]
fn short_circuit_or_ignores_undefined_variable() {
    let (val, diags) = eval("true || undefined_var", &empty_ctx());
    assert_eq!(val, Value::bool(true));
    assert!(diags.is_empty(), "{diags}");
}

#[test]
fn short_circuit_without_context() {
    let (val, diags) = expr("false && undefined_var").value(None);
    assert_eq!(val, Value::bool(false));
    assert!(diags.is_empty(), "{diags}");
}

#[test]
fn short_circuit_still_type_checks_rhs() {
    let (val, diags) = eval("true || [1]", &empty_ctx());
    assert_eq!(summaries(&diags), vec!["Invalid operand"]);
    assert!(!val.is_known());
}

#[test]
fn unknown_lhs_makes_logical_result_unknown() {
    let ctx = ctx_with(&[("flag", Value::unknown(Type::Bool))]);
    let val = eval_ok("flag && true", &ctx);
    assert_eq!(val, Value::unknown(Type::Bool));
}

#[test]
fn null_operand_is_reported() {
    let (val, diags) = eval("null + 1", &empty_ctx());
    assert_eq!(summaries(&diags), vec!["Invalid operand"]);
    assert!(diags[0].detail.contains("left operand"), "{}", diags[0].detail);
    assert_eq!(val, Value::unknown(Type::Number));
}

#[test]
fn template_trim_markers() {
    let val = eval_ok(r#""a ${~ "b" ~} c""#, &empty_ctx());
    assert_eq!(val, Value::string("abc"));
}

#[test]
fn template_interpolation_converts_and_marks() {
    let ctx = ctx_with(&[
        ("n", Value::int(3)),
        ("secret", Value::string("s3cr3t").mark("sensitive")),
    ]);
    assert_eq!(eval_ok(r#""n=${n}""#, &ctx), Value::string("n=3"));

    let val = eval_ok(r#""key: ${secret}""#, &ctx);
    assert_eq!(val.as_str(), Some("key: s3cr3t"));
    assert!(val.has_mark(&Mark::new("sensitive")));
}

#[test]
fn template_null_interpolation_is_error() {
    let (_, diags) = eval(r#""x${null}""#, &empty_ctx());
    assert_eq!(summaries(&diags), vec!["Invalid template interpolation value"]);
}

#[test]
fn template_with_unknown_part_is_unknown() {
    let ctx = ctx_with(&[("later", Value::unknown(Type::String))]);
    let val = eval_ok(r#""a-${later}""#, &ctx);
    assert_eq!(val, Value::unknown(Type::String));
}

#[test]
fn template_directives() {
    let ctx = ctx_with(&[(
        "names",
        Value::tuple(vec![Value::string("a"), Value::string("b")]),
    )]);
    let val = eval_ok(r#""%{ for n in names }<${n}>%{ endfor }""#, &ctx);
    assert_eq!(val, Value::string("<a><b>"));

    let val = eval_ok(r#""%{ if true }yes%{ else }no%{ endif }""#, &ctx);
    assert_eq!(val, Value::string("yes"));
}

#[test]
fn for_expression_grouping() {
    let val = eval_ok(
        r#"{for i, v in ["a","b","c","b","d"]: v => i...}"#,
        &empty_ctx(),
    );
    let expected = Value::object_from([
        ("a", Value::tuple(vec![Value::int(0)])),
        ("b", Value::tuple(vec![Value::int(1), Value::int(3)])),
        ("c", Value::tuple(vec![Value::int(2)])),
        ("d", Value::tuple(vec![Value::int(4)])),
    ]);
    assert_eq!(val, expected);
}

#[test]
fn for_expression_duplicate_key() {
    let (_, diags) = eval(r#"{for v in ["a", "a"]: v => v}"#, &empty_ctx());
    assert_eq!(summaries(&diags), vec!["Duplicate object key"]);
    assert!(diags[0].detail.contains("\"a\""));
}

#[test]
fn for_expression_filter() {
    let val = eval_ok("[for v in [1, 2, 3]: v * 2 if v > 1]", &empty_ctx());
    assert_eq!(val, Value::tuple(vec![Value::int(4), Value::int(6)]));
}

#[test]
fn for_expression_over_object_binds_keys() {
    let ctx = ctx_with(&[(
        "m",
        Value::object_from([("x", Value::int(1)), ("y", Value::int(2))]),
    )]);
    let val = eval_ok("[for k, v in m: \"${k}${v}\"]", &ctx);
    assert_eq!(
        val,
        Value::tuple(vec![Value::string("x1"), Value::string("y2")])
    );
}

#[test]
fn for_expression_errors() {
    let ctx = empty_ctx();
    let (_, diags) = eval("[for v in null: v]", &ctx);
    assert_eq!(summaries(&diags), vec!["Iteration over null value"]);

    let (_, diags) = eval("[for v in 5: v]", &ctx);
    assert_eq!(summaries(&diags), vec!["Iteration over non-iterable value"]);

    let (_, diags) = eval("[for v in [1]: v if 1]", &ctx);
    assert_eq!(summaries(&diags), vec!["Invalid 'for' condition"]);
}

#[test]
fn for_expression_marks_propagate() {
    let ctx = ctx_with(&[(
        "xs",
        Value::tuple(vec![Value::int(1)]).mark("sensitive"),
    )]);
    let val = eval_ok("[for x in xs: x]", &ctx);
    assert!(val.has_mark(&Mark::new("sensitive")));
}

#[test]
fn splat_on_typed_null_is_empty_tuple() {
    let ctx = ctx_with(&[(
        "nullobj",
        Value::null(Type::object([("name", Type::String)])),
    )]);
    let val = eval_ok("nullobj.*.name", &ctx);
    assert_eq!(val, Value::empty_tuple());
}

#[test]
fn full_splat_over_list() {
    let ctx = ctx_with(&[("items", objects(&["a", "b"]))]);
    let val = eval_ok("items[*].name", &ctx);
    assert_eq!(
        val,
        Value::list(vec![Value::string("a"), Value::string("b")])
    );
}

#[test]
fn splat_over_single_value_wraps_it() {
    let ctx = ctx_with(&[(
        "single",
        Value::object_from([("name", Value::string("only"))]),
    )]);
    let val = eval_ok("single[*].name", &ctx);
    assert_eq!(val, Value::tuple(vec![Value::string("only")]));
}

#[test]
fn splat_over_unknown_list_keeps_type() {
    let ety = Type::object([("name", Type::String)]);
    let ctx = ctx_with(&[("items", Value::unknown(Type::list(ety)))]);
    let val = eval_ok("items[*].name", &ctx);
    assert_eq!(val, Value::unknown(Type::list(Type::String)));
}

#[test]
fn attribute_splat_index_applies_to_result() {
    let ctx = ctx_with(&[("items", objects(&["a", "b"]))]);
    let val = eval_ok("items.*.name[1]", &ctx);
    assert_eq!(val, Value::string("b"));
}

#[test]
fn conditional_type_mismatch() {
    let (val, diags) = eval("true ? 1 : true", &empty_ctx());
    assert_eq!(diags.len(), 1);
    assert!(diags.has_errors());
    assert_eq!(diags[0].summary, "Inconsistent conditional result types");
    assert!(diags[0].detail.contains("number"), "{}", diags[0].detail);
    assert!(diags[0].detail.contains("bool"), "{}", diags[0].detail);
    assert!(!val.is_known());
}

#[test]
fn conditional_describes_missing_attribute() {
    let (_, diags) = eval("true ? { a = 1 } : { b = 1 }", &empty_ctx());
    assert_eq!(diags.len(), 1);
    assert!(
        diags[0].detail.contains("object attribute \"a\""),
        "{}",
        diags[0].detail
    );
}

#[test]
fn conditional_null_branch_takes_other_type() {
    let val = eval_ok("true ? null : \"x\"", &empty_ctx());
    assert!(val.is_null());
    assert_eq!(val.ty(), &Type::String);
}

#[test]
fn conditional_with_unknown_condition() {
    let ctx = ctx_with(&[("c", Value::unknown(Type::Bool))]);
    let val = eval_ok("c ? 1 : 2", &ctx);
    assert_eq!(val, Value::unknown(Type::Number));
}

#[test]
fn conditional_condition_errors() {
    let ctx = empty_ctx();
    let (_, diags) = eval("null ? 1 : 2", &ctx);
    assert_eq!(summaries(&diags), vec!["Null condition"]);
    let (_, diags) = eval("[] ? 1 : 2", &ctx);
    assert_eq!(summaries(&diags), vec!["Incorrect condition type"]);
}

#[test]
fn function_calls() {
    let ctx = function_ctx();
    assert_eq!(eval_ok(r#"upper("a")"#, &ctx), Value::string("A"));
    assert_eq!(eval_ok("sum(1, 2, 3)", &ctx), Value::int(6));
    assert_eq!(eval_ok("sum([1, 2, 3]...)", &ctx), Value::int(6));
    assert_eq!(eval_ok("sum()", &ctx), Value::int(0));
}

#[test]
fn unknown_function_suggests_name() {
    let (_, diags) = eval(r#"uper("a")"#, &function_ctx());
    assert_eq!(summaries(&diags), vec!["Call to unknown function"]);
    assert!(diags[0].detail.contains("Did you mean \"upper\"?"));
}

#[test]
fn functions_not_allowed_without_table() {
    let (_, diags) = eval(r#"upper("a")"#, &empty_ctx());
    assert_eq!(summaries(&diags), vec!["Function calls not allowed"]);
}

#[test]
fn function_arity_errors() {
    let ctx = function_ctx();
    let (_, diags) = eval("upper()", &ctx);
    assert_eq!(summaries(&diags), vec!["Not enough function arguments"]);
    let (_, diags) = eval(r#"upper("a", "b")"#, &ctx);
    assert_eq!(summaries(&diags), vec!["Too many function arguments"]);
    let (_, diags) = eval("upper([])", &ctx);
    assert_eq!(summaries(&diags), vec!["Invalid function argument"]);
    let (_, diags) = eval(r#"sum("a"...)"#, &ctx);
    assert_eq!(summaries(&diags), vec!["Invalid expanding argument value"]);
}

#[test]
fn function_argument_error_carries_extra() {
    let (_, diags) = eval(r#"picky("x")"#, &function_ctx());
    assert_eq!(summaries(&diags), vec!["Invalid function argument"]);
    let extra = diags[0]
        .extra::<FunctionCallDiagExtra>()
        .expect("function call extra");
    assert_eq!(extra.function_name, "picky");
    assert!(matches!(extra.error, FunctionError::Arg { index: 0, .. }));
    // Subject is the argument, not the whole call.
    let subject = diags[0].subject.clone().expect("subject");
    assert!(subject.start.byte >= 6, "{subject:?}");
}

#[test]
fn object_constructor_keys() {
    let ctx = ctx_with(&[("k", Value::string("c"))]);
    let val = eval_ok(r#"{a = 1, "b" = 2, (k) = 3}"#, &ctx);
    let expected = Value::object_from([
        ("a", Value::int(1)),
        ("b", Value::int(2)),
        ("c", Value::int(3)),
    ]);
    assert_eq!(val, expected);
}

#[test]
fn object_constructor_ambiguous_key() {
    let (_, diags) = eval("{a.b = 1}", &empty_ctx());
    assert_eq!(summaries(&diags), vec!["Ambiguous attribute key"]);
}

#[test]
fn object_constructor_null_key() {
    let (val, diags) = eval("{(null) = 1}", &empty_ctx());
    assert_eq!(summaries(&diags), vec!["Null value as key"]);
    assert_eq!(val, Value::dynamic());
}

#[test]
fn indexing() {
    let ctx = ctx_with(&[(
        "m",
        Value::map(BTreeMap::from([("k".to_string(), Value::int(1))])),
    )]);
    assert_eq!(eval_ok("[1, 2, 3][1]", &ctx), Value::int(2));
    assert_eq!(eval_ok(r#"m["k"]"#, &ctx), Value::int(1));
    let (_, diags) = eval("[1, 2][5]", &ctx);
    assert_eq!(summaries(&diags), vec!["Invalid index"]);
    assert!(diags[0].expression.is_some());
}

#[test]
fn unknown_variable_suggests_name() {
    let ctx = ctx_with(&[("region", Value::string("x"))]);
    let (val, diags) = eval("regoin", &ctx);
    assert_eq!(val, Value::dynamic());
    assert_eq!(summaries(&diags), vec!["Unknown variable"]);
    assert!(diags[0].detail.contains("Did you mean \"region\"?"));
}

#[test]
fn variables_excludes_for_locals() {
    let roots: Vec<String> = expr("[for x in xs: x + y[0]]")
        .variables()
        .iter()
        .filter_map(|traversal| traversal.root_name().map(str::to_string))
        .collect();
    assert_eq!(roots, vec!["xs", "y"]);
}

#[test]
fn evaluation_is_repeatable() {
    let ctx = ctx_with(&[("xs", objects(&["a"]))]);
    let parsed = expr("[for x in xs: upper(x.name)]");
    let first = parsed.value(Some(&ctx));
    let second = parsed.value(Some(&ctx));
    assert_eq!(first.0, second.0);
    assert_eq!(summaries(&first.1), summaries(&second.1));
}

#[test]
fn extra_characters_after_expression() {
    let (_, diags) = parse_expression(b"1 2", "test.hcl", Pos::INITIAL);
    assert_eq!(summaries(&diags), vec!["Extra characters after expression"]);
}

#[test]
fn bare_template() {
    let ctx = ctx_with(&[("name", Value::string("world"))]);
    let (parsed, diags) = parse_template(b"hello ${name}!", "t.tmpl", Pos::INITIAL);
    assert!(diags.is_empty(), "{diags}");
    let (val, diags) = parsed.value(Some(&ctx));
    assert!(diags.is_empty(), "{diags}");
    assert_eq!(val, Value::string("hello world!"));
}

#[test]
fn static_traversal() {
    let (traversal, diags) = parse_traversal_abs(br#"a.b[0]["c"]"#, "t", Pos::INITIAL);
    assert!(diags.is_empty(), "{diags}");
    assert_eq!(traversal.len(), 4);
    assert_eq!(traversal.root_name(), Some("a"));
}

const CONFIG: &str = r#"
name = "example"

service "web" {
  port = 8080
}

service "db" {
  port = 5432
}
"#;

fn config_body(src: &str) -> Arc<dyn crate::structure::Body> {
    let (file, diags) = parse_config(src.as_bytes(), "test.hcl", Pos::INITIAL);
    assert!(diags.is_empty(), "{diags}");
    file.body
}

fn service_schema() -> BodySchema {
    BodySchema {
        attributes: vec![AttributeSchema::required("name")],
        blocks: vec![BlockHeaderSchema::new("service", &["name"])],
    }
}

#[test]
fn body_content_extracts_schema_items() {
    let body = config_body(CONFIG);
    let (content, diags) = body.content(&service_schema());
    assert!(diags.is_empty(), "{diags}");
    assert!(content.attributes.contains_key("name"));
    let labels: Vec<&str> = content
        .blocks
        .iter()
        .map(|block| block.labels[0].as_str())
        .collect();
    assert_eq!(labels, vec!["web", "db"]);

    let port_schema = BodySchema {
        attributes: vec![AttributeSchema::required("port")],
        blocks: Vec::new(),
    };
    let (inner, diags) = content.blocks[0].body.content(&port_schema);
    assert!(diags.is_empty(), "{diags}");
    let (port, _) = inner.attributes["port"].expr.value(None);
    assert_eq!(port, Value::int(8080));
}

#[test]
fn body_content_rejects_unknown_items() {
    let body = config_body("nmae = 1\nservce \"x\" {}\n");
    let (_, diags) = body.content(&service_schema());
    let found = summaries(&diags);
    assert!(found.contains(&"Missing required argument".to_string()));
    assert!(found.contains(&"Unsupported argument".to_string()));
    assert!(found.contains(&"Unsupported block type".to_string()));
    let unsupported = diags
        .iter()
        .find(|diag| diag.summary == "Unsupported argument")
        .map(|diag| diag.detail.clone())
        .unwrap_or_default();
    assert!(unsupported.contains("Did you mean \"name\"?"), "{unsupported}");
}

#[test]
fn partial_content_leaves_remainder() {
    let body = config_body(CONFIG);
    let name_only = BodySchema {
        attributes: vec![AttributeSchema::required("name")],
        blocks: Vec::new(),
    };
    let (content, remain, diags) = body.partial_content(&name_only);
    assert!(diags.is_empty(), "{diags}");
    assert_eq!(content.attributes.len(), 1);

    let blocks_only = BodySchema {
        attributes: Vec::new(),
        blocks: vec![BlockHeaderSchema::new("service", &["name"])],
    };
    let (rest, diags) = remain.content(&blocks_only);
    assert!(diags.is_empty(), "{diags}");
    assert_eq!(rest.blocks.len(), 2);
}

#[test]
fn block_label_mismatches() {
    let body = config_body("service {\n}\nservice \"a\" \"b\" {\n}\n");
    let (content, diags) = body.content(&service_schema());
    assert!(content.blocks.is_empty());
    let found = summaries(&diags);
    assert!(found.contains(&"Missing name for service".to_string()), "{found:?}");
    assert!(found.contains(&"Extraneous label for service".to_string()), "{found:?}");
}

#[test]
fn just_attributes_rejects_blocks() {
    let body = config_body(CONFIG);
    let (attrs, diags) = body.just_attributes();
    assert!(attrs.contains_key("name"));
    assert_eq!(summaries(&diags), vec!["Unexpected \"service\" block"]);
}

#[test]
fn duplicate_attribute_is_parse_error() {
    let (_, diags) = parse_config(b"a = 1\na = 2\n", "test.hcl", Pos::INITIAL);
    assert_eq!(summaries(&diags), vec!["Attribute redefined"]);
}

#[test]
fn navigation_names_enclosing_block() {
    let (file, _) = parse_config(CONFIG.as_bytes(), "test.hcl", Pos::INITIAL);
    let nav = file.nav.expect("native files carry navigation");
    let offset = CONFIG.find("8080").unwrap_or_default();
    assert_eq!(nav.context_string(offset), r#"service "web""#);
    assert!(nav.context_def_range(offset).is_some());
    assert_eq!(nav.context_string(0), "");
}

#[test]
fn flush_heredoc_strips_common_indent() {
    let src = "x = <<-EOT\n    a\n      b\n\n    c\n  EOT\n";
    let (file, diags) = parse_config(src.as_bytes(), "test.hcl", Pos::INITIAL);
    assert!(diags.is_empty(), "{diags}");
    let (attrs, _) = file.body.just_attributes();
    let (val, diags) = attrs["x"].expr.value(None);
    assert!(diags.is_empty(), "{diags}");
    assert_eq!(val, Value::string("a\n  b\n\nc\n"));
}

#[test]
fn plain_heredoc_keeps_indent() {
    let src = "x = <<EOT\n  a\nEOT\n";
    let (file, diags) = parse_config(src.as_bytes(), "test.hcl", Pos::INITIAL);
    assert!(diags.is_empty(), "{diags}");
    let (attrs, _) = file.body.just_attributes();
    let (val, _) = attrs["x"].expr.value(None);
    assert_eq!(val, Value::string("  a\n"));
}

#[test]
fn string_escapes() {
    let ctx = empty_ctx();
    assert_eq!(
        eval_ok(r#""café \"q\"\t$${x} %%{y}""#, &ctx),
        Value::string("café \"q\"\t${x} %{y}")
    );
    assert_eq!(eval_ok(r#""\U0001F600""#, &ctx), Value::string("\u{1F600}"));
}

#[test]
fn invalid_escapes_are_reported() {
    let (_, diags) = parse_expression(br#""a\qb""#, "test.hcl", Pos::INITIAL);
    assert_eq!(summaries(&diags), vec!["Invalid escape sequence"]);
    assert!(diags[0].detail.contains("\"q\""), "{}", diags[0].detail);
    let subject = diags[0].subject.as_ref().map(|r| (r.start.byte, r.end.byte));
    assert_eq!(subject, Some((2, 4)));

    let (_, diags) = parse_expression(br#""\u12""#, "test.hcl", Pos::INITIAL);
    assert_eq!(summaries(&diags), vec!["Invalid escape sequence"]);
    assert!(diags[0].detail.contains("4 hexadecimal digits"));
}

#[test]
fn string_literals_are_nfc_normalized() {
    // "e" followed by a combining acute accent.
    let (val, _) = expr("\"cafe\u{301}\"").value(None);
    assert_eq!(val, Value::string("caf\u{e9}"));
}

#[test]
fn traversal_with_splats_and_legacy_index() {
    let (traversal, diags) = parse_traversal_abs(b"a.b[*].c.*.d.0", "t", Pos::INITIAL);
    assert!(diags.is_empty(), "{diags}");
    let kinds: Vec<&str> = traversal
        .steps
        .iter()
        .map(|step| match step {
            Traverser::Root { .. } => "root",
            Traverser::Attr { .. } => "attr",
            Traverser::Index { .. } => "index",
            Traverser::Splat { .. } => "splat",
        })
        .collect();
    assert_eq!(
        kinds,
        vec!["root", "attr", "splat", "attr", "splat", "attr", "index"]
    );
    assert!(matches!(
        &traversal.steps[6],
        Traverser::Index { key, .. } if *key == Value::int(0)
    ));
}

#[test]
fn traversal_must_start_with_a_name() {
    let (traversal, diags) = parse_traversal_abs(b"1.a", "t", Pos::INITIAL);
    assert!(traversal.is_empty());
    assert_eq!(summaries(&diags), vec!["Variable name required"]);
}

#[test]
fn unclosed_quote_on_one_line() {
    let (_, diags) = parse_config(b"a = \"abc\nb = 1\n", "test.hcl", Pos::INITIAL);
    assert!(diags.has_errors());
}
