use std::collections::BTreeMap;
use std::sync::Arc;

use hcl_value::{convert, Marks, Type, Value};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::eval_context::EvalContext;
use crate::expression::{Expression, KeyValuePair};
use crate::native;
use crate::pos::{Pos, Range};
use crate::traversal::Traversal;

use super::ast::Node;

/// A JSON value used as an expression.
///
/// Without an evaluation context strings are taken literally. With one,
/// each string is parsed as a template so that `${...}` sequences are
/// evaluated.
#[derive(Debug, Clone)]
pub struct JsonExpr {
    src: Node,
}

impl JsonExpr {
    pub fn new(src: Node) -> Self {
        Self { src }
    }

    fn string_expr(value: &str, src_range: &Range) -> JsonExpr {
        JsonExpr::new(Node::String {
            value: value.to_string(),
            src_range: src_range.clone(),
        })
    }
}

/// Where the content of a string token starts, just past its quote.
fn content_start(src_range: &Range) -> Pos {
    let start = src_range.start;
    Pos {
        line: start.line,
        column: start.column + 1,
        byte: start.byte + 1,
    }
}

fn parse_string_template(value: &str, src_range: &Range) -> (native::Expr, Diagnostics) {
    native::parse_template(
        value.as_bytes(),
        &src_range.filename,
        content_start(src_range),
    )
}

fn eval_node(node: &Node, ctx: Option<&Arc<EvalContext>>) -> (Value, Diagnostics) {
    match node {
        Node::String { value, src_range } => match ctx {
            Some(ctx) => {
                // Positions inside the template are approximate when the
                // JSON string contained escapes.
                let (template, diags) = parse_string_template(value, src_range);
                if diags.has_errors() {
                    return (Value::dynamic(), diags);
                }
                let (val, eval_diags) = template.value(Some(ctx));
                let mut diags = diags;
                diags.extend(eval_diags);
                (val, diags)
            }
            None => (Value::string(value.clone()), Diagnostics::new()),
        },
        Node::Number { value, .. } => (Value::number(value.clone()), Diagnostics::new()),
        Node::Bool { value, .. } => (Value::bool(*value), Diagnostics::new()),
        Node::Null { .. } => (Value::null_dynamic(), Diagnostics::new()),
        Node::Array(array) => {
            let mut diags = Diagnostics::new();
            let elements = array
                .values
                .iter()
                .map(|element| {
                    let (val, element_diags) = eval_node(element, ctx);
                    diags.extend(element_diags);
                    val
                })
                .collect();
            (Value::tuple(elements), diags)
        }
        Node::Object(object) => {
            let mut diags = Diagnostics::new();
            let mut attrs: BTreeMap<String, Value> = BTreeMap::new();
            let mut defined_at: BTreeMap<String, Range> = BTreeMap::new();
            let mut key_marks = Marks::new();
            let mut known = true;
            let owned = || -> Arc<dyn Expression> { Arc::new(JsonExpr::new(node.clone())) };

            for property in &object.properties {
                let key_expr = JsonExpr::string_expr(&property.name, &property.name_range);
                let (key, key_diags) = key_expr.value(ctx);
                let (val, val_diags) = eval_node(&property.value, ctx);
                diags.extend(key_diags);
                diags.extend(val_diags);

                let key_error = |detail: String| {
                    Diagnostic::error("Invalid object key expression", detail)
                        .with_subject(property.name_range.clone())
                        .with_expression(owned(), ctx)
                };
                let key = match convert(&key, &Type::String) {
                    Ok(key) => key,
                    Err(err) => {
                        diags.push(key_error(format!(
                            "Cannot use this expression as an object key: {err}."
                        )));
                        continue;
                    }
                };
                if key.is_null() {
                    diags.push(key_error(
                        "Cannot use null value as an object key.".to_string(),
                    ));
                    continue;
                }
                if !key.is_known() {
                    // Without the key the object's type cannot be known;
                    // keep going to report problems in later properties.
                    known = false;
                    continue;
                }
                let (key, marks) = key.unmark();
                key_marks = key_marks.union(marks);
                let Some(name) = key.as_str().map(str::to_string) else {
                    continue;
                };
                if let Some(previous) = defined_at.get(&name) {
                    diags.push(
                        Diagnostic::error(
                            "Duplicate object attribute",
                            format!("An attribute named {name:?} was already defined at {previous}."),
                        )
                        .with_subject(property.name_range.clone())
                        .with_expression(owned(), ctx),
                    );
                    continue;
                }
                defined_at.insert(name.clone(), property.name_range.clone());
                attrs.insert(name, val);
            }

            if !known {
                return (Value::dynamic(), diags);
            }
            (Value::object(attrs).with_marks(key_marks), diags)
        }
    }
}

fn node_variables(node: &Node, variables: &mut Vec<Traversal>) {
    match node {
        Node::String { value, src_range } => {
            let (template, diags) = parse_string_template(value, src_range);
            if !diags.has_errors() {
                variables.extend(template.variables());
            }
        }
        Node::Array(array) => {
            for element in &array.values {
                node_variables(element, variables);
            }
        }
        Node::Object(object) => {
            for property in &object.properties {
                let key = Node::String {
                    value: property.name.clone(),
                    src_range: property.name_range.clone(),
                };
                node_variables(&key, variables);
                node_variables(&property.value, variables);
            }
        }
        Node::Number { .. } | Node::Bool { .. } | Node::Null { .. } => {}
    }
}

impl Expression for JsonExpr {
    fn value(&self, ctx: Option<&Arc<EvalContext>>) -> (Value, Diagnostics) {
        eval_node(&self.src, ctx)
    }

    fn variables(&self) -> Vec<Traversal> {
        let mut variables = Vec::new();
        node_variables(&self.src, &mut variables);
        variables
    }

    fn range(&self) -> Range {
        self.src.range().clone()
    }

    fn start_range(&self) -> Range {
        self.src.start_range().clone()
    }

    /// A string holding traversal syntax, such as `"var.foo[0]"`.
    fn as_traversal(&self) -> Option<Traversal> {
        let Node::String { value, src_range } = &self.src else {
            return None;
        };
        let (traversal, diags) = native::parse_traversal_abs(
            value.as_bytes(),
            &src_range.filename,
            content_start(src_range),
        );
        (!diags.has_errors()).then_some(traversal)
    }

    fn expr_list(&self) -> Option<Vec<Arc<dyn Expression>>> {
        let Node::Array(array) = &self.src else {
            return None;
        };
        Some(
            array
                .values
                .iter()
                .map(|element| Arc::new(JsonExpr::new(element.clone())) as Arc<dyn Expression>)
                .collect(),
        )
    }

    fn expr_map(&self) -> Option<Vec<KeyValuePair>> {
        let Node::Object(object) = &self.src else {
            return None;
        };
        Some(
            object
                .properties
                .iter()
                .map(|property| KeyValuePair {
                    key: Arc::new(JsonExpr::string_expr(&property.name, &property.name_range)),
                    value: Arc::new(JsonExpr::new(property.value.clone())),
                })
                .collect(),
        )
    }
}
