use std::collections::BTreeSet;
use std::sync::Arc;

use hcl_value::{BinaryOperator, UnaryOperator, Value};
use indexmap::IndexMap;

use crate::diagnostics::Diagnostics;
use crate::eval_context::EvalContext;
use crate::expression::{Expression, KeyValuePair};
use crate::pos::{range_between, Range};
use crate::traversal::Traversal;

use super::eval;

#[derive(Debug, Clone)]
pub enum Expr {
    Literal {
        val: Value,
        src_range: Range,
    },
    ScopeTraversal {
        traversal: Traversal,
        src_range: Range,
    },
    /// Traversal steps applied to the result of an arbitrary expression.
    RelativeTraversal {
        source: Arc<Expr>,
        traversal: Traversal,
        src_range: Range,
    },
    FunctionCall {
        name: String,
        args: Vec<Arc<Expr>>,
        /// The final argument was followed by `...` and is spread into
        /// the remaining parameters.
        expand_final: bool,
        name_range: Range,
        open_paren_range: Range,
        close_paren_range: Range,
    },
    Conditional {
        condition: Arc<Expr>,
        true_result: Arc<Expr>,
        false_result: Arc<Expr>,
        src_range: Range,
    },
    BinaryOp {
        lhs: Arc<Expr>,
        op: BinaryOperator,
        rhs: Arc<Expr>,
        src_range: Range,
    },
    UnaryOp {
        op: UnaryOperator,
        val: Arc<Expr>,
        src_range: Range,
        symbol_range: Range,
    },
    Index {
        collection: Arc<Expr>,
        key: Arc<Expr>,
        src_range: Range,
        open_range: Range,
        bracket_range: Range,
    },
    TupleCons {
        exprs: Vec<Arc<Expr>>,
        src_range: Range,
        open_range: Range,
    },
    ObjectCons {
        items: Vec<ObjectConsItem>,
        src_range: Range,
        open_range: Range,
    },
    /// An object constructor key. A bare name is taken literally unless
    /// `force_non_literal` is set by parenthesising it.
    ObjectConsKey {
        wrapped: Arc<Expr>,
        force_non_literal: bool,
    },
    For(Box<ForExpr>),
    Splat {
        source: Arc<Expr>,
        /// Applied to each element; refers to it through `AnonSymbol`.
        each: Arc<Expr>,
        src_range: Range,
        marker_range: Range,
    },
    /// The current element inside a splat's `each` expression.
    AnonSymbol {
        src_range: Range,
    },
    Template {
        parts: Vec<Arc<Expr>>,
        src_range: Range,
    },
    /// Concatenates the string elements of a tuple; the body of a
    /// `%{ for }` directive.
    TemplateJoin {
        tuple: Arc<Expr>,
    },
    /// A template consisting of a single interpolation, which yields the
    /// interpolated value unchanged.
    TemplateWrap {
        wrapped: Arc<Expr>,
        src_range: Range,
    },
    Parentheses {
        expr: Arc<Expr>,
        src_range: Range,
    },
}

#[derive(Debug, Clone)]
pub struct ObjectConsItem {
    pub key: Arc<Expr>,
    pub value: Arc<Expr>,
}

#[derive(Debug, Clone)]
pub struct ForExpr {
    pub key_var: Option<String>,
    pub val_var: String,
    pub coll_expr: Arc<Expr>,
    /// Present for the object-producing form.
    pub key_expr: Option<Arc<Expr>>,
    pub val_expr: Arc<Expr>,
    pub cond_expr: Option<Arc<Expr>>,
    /// `...` after the value: collect values with the same key in a tuple.
    pub group: bool,
    pub src_range: Range,
    pub open_range: Range,
    pub close_range: Range,
}

impl Expr {
    pub fn src_range(&self) -> Range {
        match self {
            Expr::Literal { src_range, .. }
            | Expr::ScopeTraversal { src_range, .. }
            | Expr::RelativeTraversal { src_range, .. }
            | Expr::Conditional { src_range, .. }
            | Expr::BinaryOp { src_range, .. }
            | Expr::UnaryOp { src_range, .. }
            | Expr::Index { src_range, .. }
            | Expr::TupleCons { src_range, .. }
            | Expr::ObjectCons { src_range, .. }
            | Expr::Splat { src_range, .. }
            | Expr::AnonSymbol { src_range }
            | Expr::Template { src_range, .. }
            | Expr::TemplateWrap { src_range, .. }
            | Expr::Parentheses { src_range, .. } => src_range.clone(),
            Expr::FunctionCall {
                name_range,
                close_paren_range,
                ..
            } => range_between(name_range, close_paren_range),
            Expr::ObjectConsKey { wrapped, .. } => wrapped.src_range(),
            Expr::TemplateJoin { tuple } => tuple.src_range(),
            Expr::For(for_expr) => for_expr.src_range.clone(),
        }
    }

    /// The direct sub-expressions, in source order.
    pub fn children(&self) -> Vec<&Arc<Expr>> {
        match self {
            Expr::Literal { .. } | Expr::ScopeTraversal { .. } | Expr::AnonSymbol { .. } => {
                Vec::new()
            }
            Expr::RelativeTraversal { source, .. } => vec![source],
            Expr::FunctionCall { args, .. } => args.iter().collect(),
            Expr::Conditional {
                condition,
                true_result,
                false_result,
                ..
            } => vec![condition, true_result, false_result],
            Expr::BinaryOp { lhs, rhs, .. } => vec![lhs, rhs],
            Expr::UnaryOp { val, .. } => vec![val],
            Expr::Index {
                collection, key, ..
            } => vec![collection, key],
            Expr::TupleCons { exprs, .. } => exprs.iter().collect(),
            Expr::ObjectCons { items, .. } => items
                .iter()
                .flat_map(|item| [&item.key, &item.value])
                .collect(),
            Expr::ObjectConsKey { wrapped, .. } => vec![wrapped],
            Expr::For(for_expr) => {
                let mut children = vec![&for_expr.coll_expr];
                children.extend(for_expr.key_expr.iter());
                children.push(&for_expr.val_expr);
                children.extend(for_expr.cond_expr.iter());
                children
            }
            Expr::Splat { source, each, .. } => vec![source, each],
            Expr::Template { parts, .. } => parts.iter().collect(),
            Expr::TemplateJoin { tuple } => vec![tuple],
            Expr::TemplateWrap { wrapped, .. } => vec![wrapped],
            Expr::Parentheses { expr, .. } => vec![expr],
        }
    }

    /// The value of a literal, or of a template made of one literal part.
    pub fn literal_value(&self) -> Option<&Value> {
        match self {
            Expr::Literal { val, .. } => Some(val),
            Expr::Template { parts, .. } if parts.len() == 1 => match parts[0].as_ref() {
                Expr::Literal { val, .. } => Some(val),
                _ => None,
            },
            _ => None,
        }
    }

    fn collect_variables(&self, out: &mut Vec<Traversal>) {
        match self {
            Expr::ScopeTraversal { traversal, .. } => out.push(traversal.clone()),
            Expr::For(for_expr) => {
                for_expr.coll_expr.collect_variables(out);
                let mut inner = Vec::new();
                for expr in for_expr
                    .key_expr
                    .iter()
                    .chain(Some(&for_expr.val_expr))
                    .chain(for_expr.cond_expr.iter())
                {
                    expr.collect_variables(&mut inner);
                }
                // Iteration variables are local to the expression.
                out.extend(inner.into_iter().filter(|traversal| {
                    let root = traversal.root_name();
                    root != Some(for_expr.val_var.as_str())
                        && root != for_expr.key_var.as_deref()
                }));
            }
            _ => {
                for child in self.children() {
                    child.collect_variables(out);
                }
            }
        }
    }
}

impl Expression for Expr {
    fn value(&self, ctx: Option<&Arc<EvalContext>>) -> (Value, Diagnostics) {
        eval::evaluate(self, ctx)
    }

    fn variables(&self) -> Vec<Traversal> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    fn range(&self) -> Range {
        self.src_range()
    }

    fn start_range(&self) -> Range {
        match self {
            Expr::FunctionCall {
                name_range,
                open_paren_range,
                ..
            } => range_between(name_range, open_paren_range),
            Expr::Conditional { condition, .. } => condition.start_range(),
            Expr::BinaryOp { lhs, .. } => lhs.start_range(),
            Expr::UnaryOp { symbol_range, .. } => symbol_range.clone(),
            Expr::Index { open_range, .. }
            | Expr::TupleCons { open_range, .. }
            | Expr::ObjectCons { open_range, .. } => open_range.clone(),
            Expr::For(for_expr) => for_expr.open_range.clone(),
            Expr::Splat { marker_range, .. } => marker_range.clone(),
            Expr::RelativeTraversal { source, .. } => source.start_range(),
            Expr::ObjectConsKey { wrapped, .. } => wrapped.start_range(),
            Expr::TemplateJoin { tuple } => tuple.start_range(),
            other => other.src_range(),
        }
    }

    fn as_traversal(&self) -> Option<Traversal> {
        match self {
            Expr::ScopeTraversal { traversal, .. } => Some(traversal.clone()),
            Expr::RelativeTraversal {
                source, traversal, ..
            } => {
                let mut abs = source.as_traversal()?;
                abs.steps.extend(traversal.steps.iter().cloned());
                Some(abs)
            }
            Expr::ObjectConsKey {
                wrapped,
                force_non_literal: false,
            } => wrapped.as_traversal(),
            _ => None,
        }
    }

    fn unwrap_expression(&self) -> Option<Arc<dyn Expression>> {
        match self {
            Expr::Parentheses { expr, .. } => Some(expr.clone() as Arc<dyn Expression>),
            Expr::TemplateWrap { wrapped, .. } => Some(wrapped.clone() as Arc<dyn Expression>),
            Expr::ObjectConsKey { wrapped, .. } => Some(wrapped.clone() as Arc<dyn Expression>),
            _ => None,
        }
    }

    fn expr_list(&self) -> Option<Vec<Arc<dyn Expression>>> {
        match self {
            Expr::TupleCons { exprs, .. } => Some(
                exprs
                    .iter()
                    .map(|expr| expr.clone() as Arc<dyn Expression>)
                    .collect(),
            ),
            _ => None,
        }
    }

    fn expr_map(&self) -> Option<Vec<KeyValuePair>> {
        match self {
            Expr::ObjectCons { items, .. } => Some(
                items
                    .iter()
                    .map(|item| KeyValuePair {
                        key: item.key.clone(),
                        value: item.value.clone(),
                    })
                    .collect(),
            ),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub expr: Arc<Expr>,
    pub src_range: Range,
    pub name_range: Range,
    pub equals_range: Range,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub type_name: String,
    pub labels: Vec<String>,
    pub body: Arc<Body>,
    pub type_range: Range,
    pub label_ranges: Vec<Range>,
    pub open_brace_range: Range,
    pub close_brace_range: Range,
}

impl Block {
    /// The block header: the type name and labels.
    pub fn def_range(&self) -> Range {
        let last = self.label_ranges.last().unwrap_or(&self.type_range);
        range_between(&self.type_range, last)
    }

    pub fn src_range(&self) -> Range {
        range_between(&self.type_range, &self.close_brace_range)
    }
}

/// The body of a native-syntax file or block.
///
/// Items already retrieved by a partial-content call are hidden from the
/// remainder body returned alongside them.
#[derive(Debug, Clone, Default)]
pub struct Body {
    pub attributes: IndexMap<String, Attribute>,
    pub blocks: Vec<Block>,
    pub src_range: Range,
    /// The empty range just before the closing brace, or at end of file.
    pub end_range: Range,
    pub(crate) hidden_attrs: BTreeSet<String>,
    pub(crate) hidden_blocks: BTreeSet<String>,
}
