use std::fmt;
use std::sync::Arc;

use hcl_value::Value;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::eval_context::EvalContext;
use crate::pos::Range;
use crate::traversal::{Traversal, Traverser};

/// An expression that can be evaluated in an [`EvalContext`].
///
/// The required methods cover evaluation and static analysis. The
/// provided hooks are optional capabilities: an implementation opts in
/// by overriding them.
pub trait Expression: fmt::Debug + Send + Sync {
    /// Evaluates the expression. Evaluation never panics on user input:
    /// problems come back as diagnostics next to a placeholder value.
    fn value(&self, ctx: Option<&Arc<EvalContext>>) -> (Value, Diagnostics);

    /// Every absolute traversal the expression refers to.
    fn variables(&self) -> Vec<Traversal>;

    fn range(&self) -> Range;

    /// The range of the leading part of the expression, for use when the
    /// whole range would be too large to highlight usefully.
    fn start_range(&self) -> Range;

    /// Reinterprets the expression as a static traversal, if it is one.
    fn as_traversal(&self) -> Option<Traversal> {
        None
    }

    /// The wrapped expression, for wrappers that are transparent to
    /// static analysis.
    fn unwrap_expression(&self) -> Option<Arc<dyn Expression>> {
        None
    }

    /// The item expressions of a static list.
    fn expr_list(&self) -> Option<Vec<Arc<dyn Expression>>> {
        None
    }

    /// The key and value expressions of a static map.
    fn expr_map(&self) -> Option<Vec<KeyValuePair>> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct KeyValuePair {
    pub key: Arc<dyn Expression>,
    pub value: Arc<dyn Expression>,
}

/// An expression that always evaluates to a fixed value.
#[derive(Debug, Clone)]
pub struct StaticExpr {
    pub value: Value,
    pub src_range: Range,
}

impl StaticExpr {
    pub fn new(value: Value, src_range: Range) -> Self {
        Self { value, src_range }
    }
}

impl Expression for StaticExpr {
    fn value(&self, _ctx: Option<&Arc<EvalContext>>) -> (Value, Diagnostics) {
        (self.value.clone(), Diagnostics::new())
    }

    fn variables(&self) -> Vec<Traversal> {
        Vec::new()
    }

    fn range(&self) -> Range {
        self.src_range.clone()
    }

    fn start_range(&self) -> Range {
        self.src_range.clone()
    }
}

/// Follows `unwrap_expression` until `probe` accepts an expression.
fn find_unwrapped<T>(
    expr: &dyn Expression,
    probe: impl Fn(&dyn Expression) -> Option<T>,
) -> Option<T> {
    if let Some(found) = probe(expr) {
        return Some(found);
    }
    let mut next = expr.unwrap_expression();
    while let Some(inner) = next {
        if let Some(found) = probe(inner.as_ref()) {
            return Some(found);
        }
        next = inner.unwrap_expression();
    }
    None
}

/// Interprets `expr` as a static absolute traversal like `a.b[0]`.
pub fn abs_traversal_for_expr(expr: &dyn Expression) -> (Traversal, Diagnostics) {
    match find_unwrapped(expr, |e| e.as_traversal()) {
        Some(traversal) => (traversal, Diagnostics::new()),
        None => (
            Traversal::default(),
            Diagnostic::error(
                "Invalid expression",
                "A single static variable reference is required: only attribute access and indexing with constant keys. No calculations, function calls, template expressions, etc are allowed here.",
            )
            .with_subject(expr.range())
            .into(),
        ),
    }
}

/// Like [`abs_traversal_for_expr`] but with the root step turned into an
/// attribute step, for places where the root object is implied.
pub fn rel_traversal_for_expr(expr: &dyn Expression) -> (Traversal, Diagnostics) {
    let (mut traversal, diags) = abs_traversal_for_expr(expr);
    if let Some(Traverser::Root { name, src_range }) = traversal.steps.first().cloned() {
        traversal.steps[0] = Traverser::Attr { name, src_range };
    }
    (traversal, diags)
}

/// The name of a bare single-word reference such as `foo`, if `expr` is
/// one.
pub fn expr_as_keyword(expr: &dyn Expression) -> Option<String> {
    let traversal = find_unwrapped(expr, |e| e.as_traversal())?;
    match traversal.steps.as_slice() {
        [Traverser::Root { name, .. }] => Some(name.clone()),
        _ => None,
    }
}

/// The item expressions of a static list expression.
pub fn expr_list(expr: &dyn Expression) -> (Vec<Arc<dyn Expression>>, Diagnostics) {
    match find_unwrapped(expr, |e| e.expr_list()) {
        Some(items) => (items, Diagnostics::new()),
        None => (
            Vec::new(),
            Diagnostic::error("Invalid expression", "A static list expression is required.")
                .with_subject(expr.range())
                .into(),
        ),
    }
}

/// The key/value expression pairs of a static map expression.
pub fn expr_map(expr: &dyn Expression) -> (Vec<KeyValuePair>, Diagnostics) {
    match find_unwrapped(expr, |e| e.expr_map()) {
        Some(pairs) => (pairs, Diagnostics::new()),
        None => (
            Vec::new(),
            Diagnostic::error("Invalid expression", "A static map expression is required.")
                .with_subject(expr.range())
                .into(),
        ),
    }
}
