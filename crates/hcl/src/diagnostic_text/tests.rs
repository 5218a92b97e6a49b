use std::sync::Arc;

use hcl_value::{Type, Value};
use indexmap::IndexMap;

use super::*;
use crate::eval_context::EvalContext;
use crate::expression::Expression;
use crate::native;
use crate::pos::Pos;

const SRC: &str = "service \"web\" {\n  port = \"eighty\"\n}\n";

fn files() -> IndexMap<String, File> {
    let (file, diags) = native::parse_config(SRC.as_bytes(), "test.hcl", Pos::INITIAL);
    assert!(diags.is_empty());
    IndexMap::from([("test.hcl".to_string(), file)])
}

fn range_of(needle: &str) -> Range {
    let start_byte = SRC.find(needle).unwrap();
    let start = Pos::INITIAL.advance(&SRC.as_bytes()[..start_byte]);
    let end = start.advance(needle.as_bytes());
    Range::new("test.hcl", start, end)
}

fn port_error() -> Diagnostic {
    Diagnostic::error("Invalid port", "The port must be a whole number.")
        .with_subject(range_of("\"eighty\""))
}

#[test]
fn snippet_with_context_lines() {
    let files = files();
    let writer = DiagnosticWriter::new(&files, WriterConfig::default());
    let text = writer.render(&port_error());
    let expected = [
        "Error: Invalid port",
        "",
        "  on test.hcl line 2, in service \"web\":",
        "     1: service \"web\" {",
        "→    2:   port = \"eighty\"",
        "     3: }",
        "",
        "The port must be a whole number.",
        "",
    ]
    .join("\n");
    assert_eq!(text, expected);
}

#[test]
fn no_context_lines() {
    let files = files();
    let config = WriterConfig {
        context_lines: 0,
        ..WriterConfig::default()
    };
    let text = DiagnosticWriter::new(&files, config).render(&port_error());
    assert!(!text.contains("1: service"));
    assert!(text.contains("2:   port"));
}

#[test]
fn colour_sequences() {
    let files = files();
    let config = WriterConfig {
        color: true,
        ..WriterConfig::default()
    };
    let writer = DiagnosticWriter::new(&files, config);
    assert!(writer.render(&port_error()).starts_with("\u{1b}[31m"));

    let warning = Diagnostic::warning("Deprecated", "").with_subject(range_of("port"));
    assert!(writer.render(&warning).starts_with("\u{1b}[33m"));
}

#[test]
fn detail_is_wrapped() {
    let files = files();
    let config = WriterConfig {
        width: 20,
        ..WriterConfig::default()
    };
    let diag = Diagnostic::error(
        "Wordy",
        "This detail text is quite a bit longer than twenty columns.",
    );
    let text = DiagnosticWriter::new(&files, config).render(&diag);
    let detail: Vec<&str> = text.lines().skip(2).collect();
    assert!(detail.len() > 1);
    assert!(detail.iter().all(|line| line.chars().count() <= 20), "{text}");

    let unwrapped = DiagnosticWriter::new(
        &files,
        WriterConfig {
            width: 0,
            ..WriterConfig::default()
        },
    )
    .render(&diag);
    assert_eq!(unwrapped.lines().count(), 3);
}

#[test]
fn long_source_lines_are_cut() {
    let files = files();
    let config = WriterConfig {
        width: 16,
        context_lines: 0,
        ..WriterConfig::default()
    };
    let text = DiagnosticWriter::new(&files, config).render(&port_error());
    let line = text
        .lines()
        .find(|line| line.starts_with('→'))
        .unwrap_or_default();
    assert!(line.ends_with('…'), "{line}");
    assert_eq!(line.chars().count(), 16);
}

#[test]
fn missing_source() {
    let files = IndexMap::new();
    let text = DiagnosticWriter::new(&files, WriterConfig::default()).render(&port_error());
    assert!(text.contains("  on test.hcl line 2:\n  (source code not available)"));
}

#[test]
fn variables_of_the_failing_expression() {
    let (expr, _) = native::parse_expression(b"a + b + c", "expr.hcl", Pos::INITIAL);
    let mut ctx = EvalContext::new();
    ctx.set_variable("a", Value::int(1));
    ctx.set_variable("b", Value::string("x"));
    ctx.set_variable("c", Value::null(Type::Number));
    let ctx = Arc::new(ctx);

    let diag = Diagnostic::error("Invalid operand", "")
        .with_subject(expr.range())
        .with_expression(Arc::new(expr), Some(&ctx));
    let files = IndexMap::new();
    let text = DiagnosticWriter::new(&files, WriterConfig::default()).render(&diag);
    assert!(
        text.contains("with a as 1,\n     b as \"x\",\n     c set to null\n"),
        "{text}"
    );
}

#[test]
fn value_descriptions() {
    assert_eq!(value_str(&Value::null_dynamic()), "null");
    assert_eq!(value_str(&Value::unknown(Type::String)), "(not yet known)");
    assert_eq!(value_str(&Value::bool(true)), "true");
    assert_eq!(
        value_str(&Value::list(vec![Value::int(1), Value::int(2), Value::int(3)])),
        "list with 3 elements"
    );
    assert_eq!(value_str(&Value::empty_tuple()), "empty tuple");
    assert_eq!(
        value_str(&Value::object_from([("a", Value::int(1))])),
        "object with 1 attribute \"a\""
    );
}

#[test]
fn several_diagnostics() {
    let files = files();
    let diags: Diagnostics = vec![port_error(), port_error()].into();
    let text = DiagnosticWriter::new(&files, WriterConfig::default()).render_all(&diags);
    assert_eq!(text.matches("Error: Invalid port").count(), 2);
}
