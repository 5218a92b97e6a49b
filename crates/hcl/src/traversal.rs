use std::fmt;
use std::sync::Arc;

use hcl_value::{Type, Value};

use crate::didyoumean::suggestion_sentence;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::eval_context::EvalContext;
use crate::ops;
use crate::pos::{range_between, Range};

/// One step of a [`Traversal`].
#[derive(Debug, Clone, PartialEq)]
pub enum Traverser {
    /// Looks up a variable by name; only valid as the first step.
    Root { name: String, src_range: Range },
    Attr { name: String, src_range: Range },
    Index { key: Value, src_range: Range },
    /// Applies every following step to each element of the collection.
    Splat { src_range: Range },
}

impl Traverser {
    pub fn src_range(&self) -> &Range {
        match self {
            Traverser::Root { src_range, .. }
            | Traverser::Attr { src_range, .. }
            | Traverser::Index { src_range, .. }
            | Traverser::Splat { src_range } => src_range,
        }
    }
}

/// A static chain of references such as `var.foo[0].bar`.
///
/// Absolute traversals start with a [`Traverser::Root`] step; relative
/// traversals apply to a value obtained elsewhere.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Traversal {
    pub steps: Vec<Traverser>,
}

impl Traversal {
    pub fn new(steps: Vec<Traverser>) -> Self {
        Self { steps }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_relative(&self) -> bool {
        !matches!(self.steps.first(), Some(Traverser::Root { .. }))
    }

    pub fn root_name(&self) -> Option<&str> {
        match self.steps.first() {
            Some(Traverser::Root { name, .. }) => Some(name),
            _ => None,
        }
    }

    /// Splits an absolute traversal into its root step and the relative
    /// remainder.
    pub fn simple_split(&self) -> (Traversal, Traversal) {
        if self.is_relative() {
            return (Traversal::default(), self.clone());
        }
        let (root, rest) = self.steps.split_at(1);
        (Traversal::new(root.to_vec()), Traversal::new(rest.to_vec()))
    }

    /// The range from the first step to the last.
    pub fn source_range(&self) -> Range {
        match (self.steps.first(), self.steps.last()) {
            (Some(first), Some(last)) => range_between(first.src_range(), last.src_range()),
            _ => Range::default(),
        }
    }

    /// Resolves the root step in `ctx` and applies the remaining steps.
    pub fn traverse_abs(&self, ctx: Option<&Arc<EvalContext>>) -> (Value, Diagnostics) {
        let Some(Traverser::Root { name, src_range }) = self.steps.first() else {
            return (
                Value::dynamic(),
                Diagnostic::error(
                    "Invalid traversal",
                    "An absolute traversal must start with a variable name.",
                )
                .with_subject(self.source_range())
                .into(),
            );
        };

        let Some(ctx) = ctx else {
            return (
                Value::dynamic(),
                Diagnostic::error("Variables not allowed", "Variables may not be used here.")
                    .with_subject(src_range.clone())
                    .into(),
            );
        };

        let root = match ctx.lookup_variable(name) {
            Some(value) => value,
            // Type-checking a discarded branch: unresolved names stay silent.
            None if ctx.is_type_check_scope() => return (Value::dynamic(), Diagnostics::new()),
            None => {
                let names = ctx.variable_names();
                let diag = if names.is_empty() {
                    Diagnostic::error("Variables not allowed", "Variables may not be used here.")
                } else {
                    Diagnostic::error(
                        "Unknown variable",
                        format!(
                            "There is no variable named {name:?}.{}",
                            suggestion_sentence(name, &names)
                        ),
                    )
                };
                return (Value::dynamic(), diag.with_subject(src_range.clone()).into());
            }
        };

        apply_steps(root, &self.steps[1..])
    }

    /// Applies every step to `value`. A root step in this position acts
    /// like an attribute step.
    pub fn traverse_rel(&self, value: &Value) -> (Value, Diagnostics) {
        apply_steps(value.clone(), &self.steps)
    }
}

fn apply_steps(mut current: Value, steps: &[Traverser]) -> (Value, Diagnostics) {
    let mut diags = Diagnostics::new();
    for (i, step) in steps.iter().enumerate() {
        let (next, step_diags) = match step {
            Traverser::Root { name, src_range } | Traverser::Attr { name, src_range } => {
                ops::get_attr(&current, name, Some(src_range))
            }
            Traverser::Index { key, src_range } => ops::index(&current, key, Some(src_range)),
            Traverser::Splat { .. } => return splat_rest(current, &steps[i + 1..], diags),
        };
        diags.extend(step_diags);
        if diags.has_errors() {
            return (Value::dynamic(), diags);
        }
        current = next;
    }
    (current, diags)
}

fn splat_rest(source: Value, rest: &[Traverser], mut diags: Diagnostics) -> (Value, Diagnostics) {
    let (source, marks) = source.unmark();
    if source.is_null() {
        return (Value::empty_tuple().with_marks(marks), diags);
    }
    if !source.is_known() {
        return (Value::dynamic().with_marks(marks), diags);
    }
    let elements: Vec<Value> = match source.ty() {
        Type::List(_) | Type::Set(_) | Type::Tuple(_) => {
            source.elements().map(<[Value]>::to_vec).unwrap_or_default()
        }
        _ => vec![source.clone()],
    };
    let mut results = Vec::with_capacity(elements.len());
    for element in elements {
        let (value, element_diags) = apply_steps(element, rest);
        diags.extend(element_diags);
        results.push(value);
    }
    let result = if source.ty().is_tuple() || !source.ty().is_sequence() {
        Value::tuple(results)
    } else {
        Value::list(results)
    };
    (result.with_marks(marks), diags)
}

impl fmt::Display for Traversal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                Traverser::Root { name, .. } => f.write_str(name)?,
                Traverser::Attr { name, .. } if i == 0 => f.write_str(name)?,
                Traverser::Attr { name, .. } => write!(f, ".{name}")?,
                Traverser::Index { key, .. } => write!(f, "[{key}]")?,
                Traverser::Splat { .. } => f.write_str("[*]")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root(name: &str) -> Traverser {
        Traverser::Root {
            name: name.to_string(),
            src_range: Range::default(),
        }
    }

    fn attr(name: &str) -> Traverser {
        Traverser::Attr {
            name: name.to_string(),
            src_range: Range::default(),
        }
    }

    fn ctx_with(name: &str, value: Value) -> Arc<EvalContext> {
        let mut ctx = EvalContext::new();
        ctx.set_variable(name, value);
        Arc::new(ctx)
    }

    #[test]
    fn abs_traversal_resolves() {
        let ctx = ctx_with("a", Value::object_from([("b", Value::int(3))]));
        let traversal = Traversal::new(vec![root("a"), attr("b")]);
        let (value, diags) = traversal.traverse_abs(Some(&ctx));
        assert!(diags.is_empty());
        assert_eq!(value, Value::int(3));
        assert_eq!(traversal.to_string(), "a.b");
    }

    #[test]
    fn unknown_variable_suggests() {
        let ctx = ctx_with("count", Value::int(1));
        let (_, diags) = Traversal::new(vec![root("cuont")]).traverse_abs(Some(&ctx));
        assert_eq!(diags[0].summary, "Unknown variable");
        assert!(diags[0].detail.contains("Did you mean \"count\"?"));
    }

    #[test]
    fn no_context_disallows_variables() {
        let (_, diags) = Traversal::new(vec![root("x")]).traverse_abs(None);
        assert_eq!(diags[0].summary, "Variables not allowed");
    }

    #[test]
    fn split_and_relative() {
        let traversal = Traversal::new(vec![root("a"), attr("b"), attr("c")]);
        assert!(!traversal.is_relative());
        assert_eq!(traversal.root_name(), Some("a"));
        let (abs, rel) = traversal.simple_split();
        assert_eq!(abs.len(), 1);
        assert_eq!(rel.len(), 2);
        assert!(rel.is_relative());
    }

    #[test]
    fn splat_step_maps_rest() {
        let list = Value::list(vec![
            Value::object_from([("n", Value::int(1))]),
            Value::object_from([("n", Value::int(2))]),
        ]);
        let traversal = Traversal::new(vec![
            Traverser::Splat {
                src_range: Range::default(),
            },
            attr("n"),
        ]);
        let (value, diags) = traversal.traverse_rel(&list);
        assert!(diags.is_empty());
        assert_eq!(value, Value::list(vec![Value::int(1), Value::int(2)]));
    }
}
