use std::sync::Arc;

use hcl::{
    body_with_diagnostics, deep, merge_bodies, parse_json, parse_native, AttributeSchema,
    BlockHeaderSchema, Body, BodySchema, Diagnostic, DiagnosticWriter, FileParser, Pos,
    Severity, TransformerFunc, Value, WriterConfig,
};

fn native(src: &str, filename: &str) -> Arc<dyn Body> {
    let (file, diags) = parse_native(src.as_bytes(), filename, Pos::INITIAL);
    assert!(diags.is_empty(), "{diags}");
    file.body
}

fn schema(attrs: &[&str], blocks: Vec<BlockHeaderSchema>) -> BodySchema {
    BodySchema {
        attributes: attrs.iter().map(|name| AttributeSchema::required(*name)).collect(),
        blocks,
    }
}

fn attr_value(body: &Arc<dyn Body>, name: &str) -> Value {
    let (attrs, diags) = body.just_attributes();
    assert!(diags.is_empty(), "{diags}");
    let (value, diags) = attrs[name].expr.value(None);
    assert!(diags.is_empty(), "{diags}");
    value
}

#[test]
fn deep_transform_reaches_nested_blocks() {
    let body = native("outer {\n  inner {\n    x = 1\n  }\n}\n", "deep.hcl");
    let visit = TransformerFunc(|body: Arc<dyn Body>| {
        body_with_diagnostics(body, Diagnostic::warning("Visited", "").into())
    });
    let body = deep(body, Arc::new(visit));

    let outer_schema = schema(&[], vec![BlockHeaderSchema::new("outer", &[])]);
    let (outer, diags) = body.content(&outer_schema);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].severity, Severity::Warning);

    let inner_schema = schema(&[], vec![BlockHeaderSchema::new("inner", &[])]);
    let (inner, diags) = outer.blocks[0].body.content(&inner_schema);
    assert_eq!(diags.len(), 1);

    let (content, diags) = inner.blocks[0].body.content(&schema(&["x"], Vec::new()));
    assert_eq!(diags.len(), 1);
    assert!(!diags.has_errors());
    let (value, _) = content.attributes["x"].expr.value(None);
    assert_eq!(value, Value::int(1));
}

#[test]
fn body_with_errors_hides_its_content() {
    let body = native("x = 1\n", "diag.hcl");
    let wrapped = body_with_diagnostics(body, Diagnostic::error("Broken", "nope").into());

    let (content, diags) = wrapped.content(&schema(&["x"], Vec::new()));
    assert!(content.attributes.is_empty());
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].summary, "Broken");

    let (attrs, diags) = wrapped.just_attributes();
    assert!(attrs.is_empty());
    assert!(diags.has_errors());
}

#[test]
fn native_and_json_bodies_merge() {
    let first = native("a = 1\n", "main.hcl");
    let (json, diags) = parse_json(br#"{"b": 2, "svc": {"x": {}}}"#, "extra.json");
    assert!(diags.is_empty(), "{diags}");

    let merged = merge_bodies(vec![first, json.body]);
    let merged_schema = schema(&["a", "b"], vec![BlockHeaderSchema::new("svc", &["name"])]);
    let (content, diags) = merged.content(&merged_schema);
    assert!(diags.is_empty(), "{diags}");
    assert_eq!(content.attributes.len(), 2);
    assert_eq!(content.attributes["b"].range.filename, "extra.json");
    assert_eq!(content.blocks.len(), 1);
    assert_eq!(content.blocks[0].labels, vec!["x".to_string()]);
}

#[test]
fn merged_required_attribute_is_checked_once() {
    let merged = merge_bodies(vec![native("a = 1\n", "1.hcl"), native("b = 2\n", "2.hcl")]);
    let (_, diags) = merged.content(&schema(&["a", "b"], Vec::new()));
    assert!(diags.is_empty(), "{diags}");

    let (_, diags) = merged.content(&schema(&["a", "b", "c"], Vec::new()));
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].summary, "Missing required argument");
}

#[test]
fn partial_content_chains() {
    let body = native("a = 1\nb = 2\nc = 3\n", "chain.hcl");
    let (first, rest, diags) = body.partial_content(&schema(&["a"], Vec::new()));
    assert!(diags.is_empty(), "{diags}");
    assert!(first.attributes.contains_key("a"));

    let (second, rest, diags) = rest.partial_content(&schema(&["b"], Vec::new()));
    assert!(diags.is_empty(), "{diags}");
    assert!(second.attributes.contains_key("b"));

    let (_, diags) = rest.content(&schema(&[], Vec::new()));
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].summary, "Unsupported argument");
    assert!(diags[0].detail.contains("\"c\""), "{}", diags[0].detail);

    assert_eq!(attr_value(&rest, "c"), Value::int(3));
}

#[test]
fn parser_files_render_diagnostics() {
    let mut parser = FileParser::new();
    let (_, diags) = parser.parse_native(b"name = \n", "main.hcl");
    assert!(diags.has_errors());

    let writer = DiagnosticWriter::new(parser.files(), WriterConfig::default());
    let text = writer.render_all(&diags);
    assert!(text.starts_with("Error: "), "{text}");
    assert!(text.contains("  on main.hcl line "), "{text}");
    assert!(text.contains("name = "), "{text}");
}
