use std::collections::BTreeMap;
use std::sync::Arc;

use hcl::{
    merge_bodies, parse_expression, parse_native, AttributeSchema, BodySchema, EvalContext,
    Pos, Severity, Type, Value,
};

fn eval(src: &str, ctx: Option<&Arc<EvalContext>>) -> (Value, hcl::Diagnostics) {
    let (expr, diags) = parse_expression(src.as_bytes(), "scenario.hcl", Pos::INITIAL);
    assert!(diags.is_empty(), "parse errors in {src:?}: {diags}");
    expr.value(ctx)
}

#[test]
fn short_circuit_or_skips_undefined_variable() {
    let ctx = Arc::new(EvalContext::new());
    let (value, diags) = eval("true || undefined_var", Some(&ctx));
    assert!(diags.is_empty(), "{diags}");
    assert_eq!(value, Value::bool(true));
}

#[test]
fn number_literals_keep_full_precision() {
    let (value, diags) = eval("99999999999999999999999999999 + 1", None);
    assert!(diags.is_empty(), "{diags}");
    assert_eq!(value.to_string(), "100000000000000000000000000000");

    let (value, diags) = eval("1e40", None);
    assert!(diags.is_empty(), "{diags}");
    assert_eq!(value.to_string(), format!("1{}", "0".repeat(40)));

    let (value, diags) = eval("1e-40 * 1e40", None);
    assert!(diags.is_empty(), "{diags}");
    assert_eq!(value, Value::int(1));
}

#[test]
fn division_result_interpolates_as_decimal() {
    let (value, diags) = eval(r#""${1 / 8}""#, None);
    assert!(diags.is_empty(), "{diags}");
    assert_eq!(value, Value::string("0.125"));
}

#[test]
fn sets_compare_and_iterate_independent_of_construction_order() {
    let mut ctx = EvalContext::new();
    ctx.set_variable("s", Value::set(vec![Value::string("b"), Value::string("a")]));
    ctx.set_variable("s2", Value::set(vec![Value::string("a"), Value::string("b")]));
    let ctx = Arc::new(ctx);

    let (value, diags) = eval("s == s2", Some(&ctx));
    assert!(diags.is_empty(), "{diags}");
    assert_eq!(value, Value::bool(true));

    let (value, diags) = eval("[for v in s: v]", Some(&ctx));
    assert!(diags.is_empty(), "{diags}");
    assert_eq!(value, Value::tuple(vec![Value::string("a"), Value::string("b")]));
}

#[test]
fn template_strip_markers_remove_whitespace() {
    let (value, diags) = eval(r#""a ${~ "b" ~} c""#, None);
    assert!(diags.is_empty(), "{diags}");
    assert_eq!(value, Value::string("abc"));
}

#[test]
fn for_expression_grouping() {
    let (value, diags) = eval(r#"{for i, v in ["a","b","c","b","d"]: v => i...}"#, None);
    assert!(diags.is_empty(), "{diags}");
    let group = |indexes: &[i64]| Value::tuple(indexes.iter().map(|i| Value::int(*i)).collect());
    let expected = Value::object(BTreeMap::from([
        ("a".to_string(), group(&[0])),
        ("b".to_string(), group(&[1, 3])),
        ("c".to_string(), group(&[2])),
        ("d".to_string(), group(&[4])),
    ]));
    assert_eq!(value, expected);
}

#[test]
fn splat_on_typed_null_is_empty_tuple() {
    let mut ctx = EvalContext::new();
    ctx.set_variable(
        "nullobj",
        Value::null(Type::object([("name", Type::String)])),
    );
    let ctx = Arc::new(ctx);
    let (value, diags) = eval("nullobj.*.name", Some(&ctx));
    assert!(diags.is_empty(), "{diags}");
    assert_eq!(value, Value::empty_tuple());
}

#[test]
fn conditional_type_mismatch() {
    let (_, diags) = eval("true ? 1 : true", None);
    assert_eq!(diags.len(), 1, "{diags}");
    let diag = &diags[0];
    assert_eq!(diag.severity, Severity::Error);
    assert_eq!(diag.summary, "Inconsistent conditional result types");
    assert!(diag.detail.contains("number"), "{}", diag.detail);
    assert!(diag.detail.contains("bool"), "{}", diag.detail);
}

#[test]
fn merged_bodies_prefer_the_first_definition() {
    let (first, diags) = parse_native(b"foo = 1\n", "b1.hcl", Pos::INITIAL);
    assert!(diags.is_empty());
    let (second, diags) = parse_native(b"foo = 2\n", "b2.hcl", Pos::INITIAL);
    assert!(diags.is_empty());

    let merged = merge_bodies(vec![first.body, second.body]);
    let schema = BodySchema {
        attributes: vec![AttributeSchema::required("foo")],
        blocks: Vec::new(),
    };
    let (content, diags) = merged.content(&schema);
    assert!(diags.is_empty(), "{diags}");

    let foo = &content.attributes["foo"];
    let (value, _) = foo.expr.value(None);
    assert_eq!(value, Value::int(1));
    assert_eq!(foo.range.filename, "b1.hcl");
    assert_eq!(foo.expr.range().filename, "b1.hcl");
}
