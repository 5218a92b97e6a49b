use std::sync::Arc;

use hcl_value::Value;

use super::*;
use crate::eval_context::EvalContext;
use crate::expression::{abs_traversal_for_expr, expr_list, expr_map};
use crate::structure::{AttributeSchema, BlockHeaderSchema, BodySchema};

fn parse_ok(src: &str) -> File {
    let (file, diags) = parse(src.as_bytes(), "test.json");
    assert!(diags.is_empty(), "unexpected diagnostics: {diags}");
    file
}

fn summaries(diags: &Diagnostics) -> Vec<&str> {
    diags.iter().map(|diag| diag.summary.as_str()).collect()
}

fn schema(attrs: &[&str], blocks: &[(&str, &[&str])]) -> BodySchema {
    BodySchema {
        attributes: attrs.iter().map(|name| AttributeSchema::optional(*name)).collect(),
        blocks: blocks
            .iter()
            .map(|(name, labels)| BlockHeaderSchema::new(*name, labels))
            .collect(),
    }
}

fn ctx_with(name: &str, value: Value) -> Arc<EvalContext> {
    let mut ctx = EvalContext::new();
    ctx.set_variable(name, value);
    Arc::new(ctx)
}

#[test]
fn attributes_and_blocks_by_schema() {
    let file = parse_ok(r#"{"name": "web", "port": 80, "listener": {"protocol": "http"}}"#);
    let (content, diags) = file
        .body
        .content(&schema(&["name", "port"], &[("listener", &[])]));
    assert!(diags.is_empty(), "{diags}");

    let (name, _) = content.attributes["name"].expr.value(None);
    assert_eq!(name, Value::string("web"));
    let (port, _) = content.attributes["port"].expr.value(None);
    assert_eq!(port, Value::int(80));

    assert_eq!(content.blocks.len(), 1);
    let (inner, diags) = content.blocks[0]
        .body
        .content(&schema(&["protocol"], &[]));
    assert!(diags.is_empty());
    assert!(inner.attributes.contains_key("protocol"));
}

#[test]
fn labelled_blocks_from_nested_objects() {
    let file = parse_ok(
        r#"{"resource": {"aws_instance": {"a": {"ami": "x"}, "b": {"ami": "y"}}}}"#,
    );
    let (content, diags) = file
        .body
        .content(&schema(&[], &[("resource", &["type", "name"])]));
    assert!(diags.is_empty(), "{diags}");
    let labels: Vec<Vec<String>> = content.blocks.iter().map(|b| b.labels.clone()).collect();
    assert_eq!(
        labels,
        vec![
            vec!["aws_instance".to_string(), "a".to_string()],
            vec!["aws_instance".to_string(), "b".to_string()],
        ]
    );
    assert_eq!(content.blocks[1].label_ranges.len(), 2);
}

#[test]
fn array_of_objects_gives_several_blocks() {
    let file = parse_ok(r#"{"rule": [{"port": 1}, {"port": 2}]}"#);
    let (content, _) = file.body.content(&schema(&[], &[("rule", &[])]));
    assert_eq!(content.blocks_of_type("rule").count(), 2);
}

#[test]
fn null_block_is_absent() {
    let file = parse_ok(r#"{"rule": null}"#);
    let (content, diags) = file.body.content(&schema(&[], &[("rule", &[])]));
    assert!(diags.is_empty());
    assert!(content.blocks.is_empty());
}

#[test]
fn missing_label_level() {
    let file = parse_ok(r#"{"service": {}}"#);
    let (_, diags) = file.body.content(&schema(&[], &[("service", &["name"])]));
    assert_eq!(summaries(&diags), vec!["Missing block label"]);
}

#[test]
fn scalar_block_value_is_rejected() {
    let file = parse_ok(r#"{"service": 3}"#);
    let (_, diags) = file.body.content(&schema(&[], &[("service", &[])]));
    assert_eq!(summaries(&diags), vec!["Incorrect JSON value type"]);
}

#[test]
fn extraneous_property_with_suggestion() {
    let file = parse_ok(r#"{"nmae": "x", "//": "comments are ignored"}"#);
    let (_, diags) = file.body.content(&schema(&["name"], &[]));
    assert_eq!(summaries(&diags), vec!["Extraneous JSON object property"]);
    assert!(diags[0].detail.contains("Did you mean \"name\"?"));
}

#[test]
fn partial_content_keeps_the_rest() {
    let file = parse_ok(r#"{"a": 1, "b": 2}"#);
    let (content, remain, diags) = file.body.partial_content(&schema(&["a"], &[]));
    assert!(diags.is_empty());
    assert!(content.attributes.contains_key("a"));

    let (attrs, diags) = remain.just_attributes();
    assert!(diags.is_empty());
    assert_eq!(attrs.keys().collect::<Vec<_>>(), vec!["b"]);
}

#[test]
fn duplicate_attribute_is_reported() {
    let file = parse_ok(r#"{"a": 1, "a": 2}"#);
    let (content, diags) = file.body.content(&schema(&["a"], &[]));
    assert_eq!(summaries(&diags), vec!["Duplicate argument"]);
    let (value, _) = content.attributes["a"].expr.value(None);
    assert_eq!(value, Value::int(1));
}

#[test]
fn root_array_merges_objects() {
    let file = parse_ok(r#"[{"a": 1}, {"b": 2}]"#);
    let (content, diags) = file.body.content(&schema(&["a", "b"], &[]));
    assert!(diags.is_empty());
    assert_eq!(content.attributes.len(), 2);
}

#[test]
fn root_must_be_object() {
    let (file, diags) = parse(b"42", "test.json");
    assert_eq!(summaries(&diags), vec!["Root value must be object"]);
    let (content, diags) = file.body.content(&schema(&["a"], &[]));
    assert!(diags.is_empty());
    assert!(content.attributes.is_empty());
}

#[test]
fn syntax_errors() {
    let cases: &[(&str, &str)] = &[
        (r#"{"a": 1,}"#, "Trailing comma in object"),
        (r#"[1, 2,]"#, "Trailing comma in array"),
        (r#"{"a" = 1}"#, "Missing property value colon"),
        (r#"{a: 1}"#, "Invalid object property name"),
        (r#"{"a": 1 "b": 2}"#, "Missing property separator comma"),
        (r#"{"a": ture}"#, "Invalid JSON keyword"),
        (r#"{"a": 01}"#, "Invalid JSON number"),
        (r#"{} {}"#, "Extraneous data after value"),
        (r#"{"a": 1"#, "Unclosed object"),
    ];
    for (src, want) in cases {
        let (_, diags) = parse(src.as_bytes(), "test.json");
        assert_eq!(
            diags.iter().next().map(|d| d.summary.as_str()),
            Some(*want),
            "for {src}"
        );
    }
}

#[test]
fn keyword_suggestion() {
    let (_, diags) = parse(br#"{"a": ture}"#, "test.json");
    assert!(diags[0].detail.contains("Did you mean \"true\"?"));
}

#[test]
fn strings_are_templates_with_a_context() {
    let file = parse_ok(r#"{"greeting": "Hello, ${name}!"}"#);
    let (attrs, _) = file.body.just_attributes();
    let expr = &attrs["greeting"].expr;

    let (literal, diags) = expr.value(None);
    assert!(diags.is_empty());
    assert_eq!(literal, Value::string("Hello, ${name}!"));

    let ctx = ctx_with("name", Value::string("Ermintrude"));
    let (value, diags) = expr.value(Some(&ctx));
    assert!(diags.is_empty(), "{diags}");
    assert_eq!(value, Value::string("Hello, Ermintrude!"));

    let variables = expr.variables();
    assert_eq!(variables.len(), 1);
    assert_eq!(variables[0].root_name(), Some("name"));
}

#[test]
fn template_positions_point_into_the_string() {
    let file = parse_ok(r#"{"a": "${nope}"}"#);
    let (attrs, _) = file.body.just_attributes();
    let ctx = ctx_with("other", Value::int(1));
    let (_, diags) = attrs["a"].expr.value(Some(&ctx));
    assert_eq!(summaries(&diags), vec!["Unknown variable"]);
    let subject = diags[0].subject.clone().unwrap_or_default();
    assert_eq!(subject.start.byte, 9);
}

#[test]
fn numbers_outside_float_range_are_exact() {
    let file = parse_ok(r#"{"big": 1e400, "small": -2.5e-400, "long": 123456789012345678901234567890}"#);
    let (attrs, diags) = file.body.just_attributes();
    assert!(diags.is_empty(), "{diags}");
    let value = |name: &str| attrs[name].expr.value(None).0.to_string();
    assert_eq!(value("big"), format!("1{}", "0".repeat(400)));
    assert_eq!(value("small"), format!("-0.{}25", "0".repeat(399)));
    assert_eq!(value("long"), "123456789012345678901234567890");
}

#[test]
fn invalid_json_number_grammar_is_rejected() {
    let (_, diags) = parse(br#"{"a": 01}"#, "test.json");
    assert!(diags.has_errors());
}

#[test]
fn object_keys_honour_templates() {
    let (expr, diags) = parse_expression(br#"{"${k}": 1, "plain": [true, null]}"#, "test.json");
    assert!(diags.is_empty());
    let ctx = ctx_with("k", Value::string("dynamic"));
    let (value, diags) = expr.value(Some(&ctx));
    assert!(diags.is_empty(), "{diags}");
    assert_eq!(value.get_attr("dynamic"), Some(&Value::int(1)));
    let plain = value.get_attr("plain").cloned().unwrap_or_else(Value::dynamic);
    assert_eq!(plain.length(), Some(2));
}

#[test]
fn unknown_key_makes_object_dynamic() {
    let (expr, _) = parse_expression(br#"{"${k}": 1}"#, "test.json");
    let ctx = ctx_with("k", Value::unknown(hcl_value::Type::String));
    let (value, diags) = expr.value(Some(&ctx));
    assert!(diags.is_empty());
    assert!(!value.is_known());
}

#[test]
fn duplicate_object_attribute_in_expression() {
    let (expr, _) = parse_expression(br#"{"${k}": 1, "x": 2}"#, "test.json");
    let ctx = ctx_with("k", Value::string("x"));
    let (_, diags) = expr.value(Some(&ctx));
    assert_eq!(summaries(&diags), vec!["Duplicate object attribute"]);
}

#[test]
fn strings_as_traversals() {
    let (expr, _) = parse_expression(br#""var.foo[0]""#, "test.json");
    let (traversal, diags) = abs_traversal_for_expr(expr.as_ref());
    assert!(diags.is_empty());
    assert_eq!(traversal.root_name(), Some("var"));
    assert_eq!(traversal.len(), 3);

    let (expr, _) = parse_expression(b"12", "test.json");
    let (_, diags) = abs_traversal_for_expr(expr.as_ref());
    assert!(diags.has_errors());
}

#[test]
fn static_list_and_map() {
    let (expr, _) = parse_expression(br#"[1, "two"]"#, "test.json");
    let (items, diags) = expr_list(expr.as_ref());
    assert!(diags.is_empty());
    assert_eq!(items.len(), 2);

    let (expr, _) = parse_expression(br#"{"a": 1}"#, "test.json");
    let (pairs, diags) = expr_map(expr.as_ref());
    assert!(diags.is_empty());
    let (key, _) = pairs[0].key.value(None);
    assert_eq!(key, Value::string("a"));
}

#[test]
fn navigation_paths() {
    let src = r#"{"a": {"b": [{"c": 1}]}}"#;
    let file = parse_ok(src);
    let Some(nav) = file.nav.clone() else {
        panic!("json files carry navigation");
    };
    let offset = src.find("\"c\"").unwrap_or_default();
    assert_eq!(nav.context_string(offset), "a.b[0]");
    assert_eq!(nav.context_string(0), "");
    assert!(nav.context_def_range(offset).is_some());
}

#[test]
fn missing_required_points_at_closing_brace() {
    let file = parse_ok("{\n}");
    let schema = BodySchema {
        attributes: vec![AttributeSchema::required("name")],
        blocks: Vec::new(),
    };
    let (_, diags) = file.body.content(&schema);
    assert_eq!(summaries(&diags), vec!["Missing required argument"]);
    assert_eq!(diags[0].subject.as_ref().map(|r| r.start.line), Some(2));
}
