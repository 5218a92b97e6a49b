//! Evaluation of native-syntax expressions.
//!
//! Evaluation never fails outright: every expression produces a value
//! (possibly unknown or dynamic) together with the diagnostics raised
//! along the way, so that callers can report as many problems as possible
//! in one pass.

use std::collections::BTreeMap;
use std::sync::Arc;

use hcl_value::ops as value_ops;
use hcl_value::{
    convert, unify, BinaryOperator, FunctionError, Marks, Operand, OperationError, Type,
    UnaryOperator, Value,
};
use tracing::trace;

use crate::diagnostics::{Diagnostic, Diagnostics, FunctionCallDiagExtra};
use crate::didyoumean::suggestion_sentence;
use crate::eval_context::EvalContext;
use crate::expression::Expression;
use crate::ops;
use crate::pos::{range_between, Range};

use super::ast::{Expr, ForExpr, ObjectConsItem};

type Ctx<'a> = Option<&'a Arc<EvalContext>>;

pub(crate) fn evaluate(expr: &Expr, ctx: Ctx<'_>) -> (Value, Diagnostics) {
    eval(expr, ctx, None)
}

/// `item` is the element currently bound to the innermost splat's
/// anonymous symbol.
fn eval(expr: &Expr, ctx: Ctx<'_>, item: Option<&Value>) -> (Value, Diagnostics) {
    match expr {
        Expr::Literal { val, .. } => (val.clone(), Diagnostics::new()),
        Expr::ScopeTraversal { traversal, .. } => {
            let (val, diags) = traversal.traverse_abs(ctx);
            (val, annotate(diags, expr, ctx))
        }
        Expr::RelativeTraversal {
            source, traversal, ..
        } => {
            let (source_val, mut diags) = eval(source, ctx, item);
            let (val, step_diags) = traversal.traverse_rel(&source_val);
            diags.extend(annotate(step_diags, expr, ctx));
            (val, diags)
        }
        Expr::FunctionCall { .. } => eval_call(expr, ctx, item),
        Expr::Conditional {
            condition,
            true_result,
            false_result,
            src_range,
        } => eval_conditional(
            expr,
            [condition, true_result, false_result],
            src_range,
            ctx,
            item,
        ),
        Expr::BinaryOp {
            lhs,
            op,
            rhs,
            src_range,
        } => eval_binary(expr, *op, lhs, rhs, src_range, ctx, item),
        Expr::UnaryOp {
            op, val, src_range, ..
        } => eval_unary(expr, *op, val, src_range, ctx, item),
        Expr::Index {
            collection,
            key,
            bracket_range,
            ..
        } => {
            let (coll, mut diags) = eval(collection, ctx, item);
            let (key, key_diags) = eval(key, ctx, item);
            diags.extend(key_diags);
            let (val, index_diags) = ops::index(&coll, &key, Some(bracket_range));
            diags.extend(annotate(index_diags, expr, ctx));
            (val, diags)
        }
        Expr::TupleCons { exprs, .. } => {
            let mut diags = Diagnostics::new();
            let vals = exprs
                .iter()
                .map(|element| {
                    let (val, element_diags) = eval(element, ctx, item);
                    diags.extend(element_diags);
                    val
                })
                .collect();
            (Value::tuple(vals), diags)
        }
        Expr::ObjectCons { items, .. } => eval_object(items, ctx, item),
        Expr::ObjectConsKey {
            wrapped,
            force_non_literal,
        } => eval_object_key(expr, wrapped, *force_non_literal, ctx, item),
        Expr::For(for_expr) => eval_for(for_expr, ctx, item),
        Expr::Splat { source, each, .. } => eval_splat(source, each, ctx, item),
        Expr::AnonSymbol { .. } => (
            item.cloned().unwrap_or_else(Value::dynamic),
            Diagnostics::new(),
        ),
        Expr::Template { parts, src_range } => eval_template(parts, src_range, ctx, item),
        Expr::TemplateJoin { tuple } => eval_template_join(expr, tuple, ctx, item),
        Expr::TemplateWrap { wrapped, .. } => eval(wrapped, ctx, item),
        Expr::Parentheses { expr: inner, .. } => eval(inner, ctx, item),
    }
}

fn own(expr: &Expr) -> Arc<dyn Expression> {
    Arc::new(expr.clone())
}

/// Attaches `expr` to diagnostics raised below it that carry no
/// expression of their own.
fn annotate(diags: Diagnostics, expr: &Expr, ctx: Ctx<'_>) -> Diagnostics {
    if diags.is_empty() {
        return diags;
    }
    let source = own(expr);
    diags
        .into_vec()
        .into_iter()
        .map(|diag| {
            if diag.expression.is_some() {
                diag
            } else {
                diag.with_expression(source.clone(), ctx)
            }
        })
        .collect()
}

fn eval_call(expr: &Expr, ctx: Ctx<'_>, item: Option<&Value>) -> (Value, Diagnostics) {
    let Expr::FunctionCall {
        name,
        args,
        expand_final,
        name_range,
        close_paren_range,
        ..
    } = expr
    else {
        return (Value::dynamic(), Diagnostics::new());
    };
    let call_range = expr.src_range();

    let Some(scope) = ctx.filter(|scope| scope.has_functions()) else {
        let diag = Diagnostic::error("Function calls not allowed", "Functions may not be called here.")
            .with_subject(call_range)
            .with_expression(own(expr), ctx);
        return (Value::dynamic(), diag.into());
    };
    let Some(function) = scope.lookup_function(name) else {
        let detail = format!(
            "There is no function named {name:?}.{}",
            suggestion_sentence(name, &scope.function_names())
        );
        let diag = Diagnostic::error("Call to unknown function", detail)
            .with_subject(name_range.clone())
            .with_context(call_range)
            .with_expression(own(expr), ctx);
        return (Value::dynamic(), diag.into());
    };

    let mut diags = Diagnostics::new();

    // Each argument is either evaluated from its expression or, for
    // elements spread from the final argument, already known.
    let mut pending: Vec<(&Arc<Expr>, Option<Value>)> = args.iter().map(|arg| (arg, None)).collect();
    if *expand_final {
        if let Some((expand_expr, _)) = pending.pop() {
            let (expand_val, expand_diags) = eval(expand_expr, ctx, item);
            let failed = expand_diags.has_errors();
            diags.extend(expand_diags);
            if failed {
                return (Value::dynamic(), diags);
            }
            let invalid = |detail: &str| {
                Diagnostic::error("Invalid expanding argument value", detail)
                    .with_subject(expand_expr.src_range())
                    .with_context(call_range.clone())
                    .with_expression(expand_expr.clone(), ctx)
            };
            let ty = expand_val.ty();
            if !(ty.is_dynamic() || ty.is_sequence()) {
                diags.push(invalid(
                    "The expanding argument (indicated by ...) must be of a tuple, list, or set type.",
                ));
                return (Value::dynamic(), diags);
            }
            if expand_val.is_null() {
                diags.push(invalid("The expanding argument (indicated by ...) must not be null."));
                return (Value::dynamic(), diags);
            }
            if !expand_val.is_known() {
                return (Value::dynamic(), diags);
            }
            let (expand_val, marks) = expand_val.unmark();
            for element in expand_val.elements().unwrap_or_default() {
                pending.push((expand_expr, Some(element.clone().with_marks(marks.clone()))));
            }
        }
    }

    let params = function.params();
    if pending.len() < params.len() {
        let qualifier = if function.var_param().is_some() {
            " at least"
        } else {
            ""
        };
        let detail = format!(
            "Function {name:?} expects{qualifier} {} argument(s). Missing value for {:?}.",
            params.len(),
            params[pending.len()].name
        );
        diags.push(
            Diagnostic::error("Not enough function arguments", detail)
                .with_subject(close_paren_range.clone())
                .with_context(call_range)
                .with_expression(own(expr), ctx),
        );
        return (Value::dynamic(), diags);
    }
    if function.var_param().is_none() && pending.len() > params.len() {
        let detail = format!(
            "Function {name:?} expects only {} argument(s).",
            params.len()
        );
        diags.push(
            Diagnostic::error("Too many function arguments", detail)
                .with_subject(pending[params.len()].0.start_range())
                .with_context(call_range)
                .with_expression(own(expr), ctx),
        );
        return (Value::dynamic(), diags);
    }

    let mut arg_vals = Vec::with_capacity(pending.len());
    for (index, (arg_expr, given)) in pending.iter().enumerate() {
        let val = match given {
            Some(val) => val.clone(),
            None => {
                let (val, arg_diags) = eval(arg_expr, ctx, item);
                diags.extend(arg_diags);
                val
            }
        };
        let Some(param) = function.param_for_arg(index) else {
            arg_vals.push(val);
            continue;
        };
        match convert(&val, &param.ty) {
            Ok(converted) => arg_vals.push(converted),
            Err(err) => {
                diags.push(
                    Diagnostic::error(
                        "Invalid function argument",
                        format!("Invalid value for {:?} parameter: {err}.", param.name),
                    )
                    .with_subject(arg_expr.start_range())
                    .with_context(call_range.clone())
                    .with_expression((*arg_expr).clone(), ctx),
                );
                arg_vals.push(Value::dynamic());
            }
        }
    }
    if diags.has_errors() {
        return (Value::dynamic(), diags);
    }

    trace!(function = %name, args = arg_vals.len(), "calling function");
    match function.call(arg_vals) {
        Ok(result) => (result, diags),
        Err(err) => {
            let extra = FunctionCallDiagExtra {
                function_name: name.clone(),
                error: err.clone(),
            };
            let param_name = match &err {
                FunctionError::Arg { index, .. } => {
                    function.param_for_arg(*index).map(|param| param.name.clone())
                }
                FunctionError::General(_) => None,
            };
            let diag = match (&err, param_name) {
                (FunctionError::Arg { index, .. }, Some(param_name)) if *index < pending.len() => {
                    let arg_expr = pending[*index].0;
                    Diagnostic::error(
                        "Invalid function argument",
                        format!("Invalid value for {param_name:?} parameter: {err}."),
                    )
                    .with_subject(arg_expr.start_range())
                    .with_context(call_range)
                    .with_expression(arg_expr.clone(), ctx)
                }
                // A variadic parameter that received no arguments.
                (FunctionError::Arg { .. }, Some(param_name)) => Diagnostic::error(
                    "Invalid function argument",
                    format!("Invalid value for {param_name:?} parameter: {err}."),
                )
                .with_subject(call_range)
                .with_expression(own(expr), ctx),
                _ => Diagnostic::error(
                    "Error in function call",
                    format!("Call to function {name:?} failed: {err}."),
                )
                .with_subject(expr.start_range())
                .with_context(call_range)
                .with_expression(own(expr), ctx),
            };
            diags.push(diag.with_extra(extra));
            (Value::dynamic(), diags)
        }
    }
}

fn eval_conditional(
    expr: &Expr,
    [condition, true_result, false_result]: [&Arc<Expr>; 3],
    src_range: &Range,
    ctx: Ctx<'_>,
    item: Option<&Value>,
) -> (Value, Diagnostics) {
    let (true_val, true_diags) = eval(true_result, ctx, item);
    let (false_val, false_diags) = eval(false_result, ctx, item);

    let Some(result_ty) = conditional_result_type(&true_val, &false_val) else {
        let detail = format!(
            "The true and false result expressions must have consistent types. {}.",
            describe_type_mismatch(true_val.ty(), false_val.ty())
        );
        let diag = Diagnostic::error("Inconsistent conditional result types", detail)
            .with_subject(range_between(
                &true_result.src_range(),
                &false_result.src_range(),
            ))
            .with_context(src_range.clone())
            .with_expression(own(expr), ctx);
        return (Value::dynamic(), diag.into());
    };

    let (cond, mut diags) = eval(condition, ctx, item);
    let condition_error = |summary: &str, detail: &str| {
        Diagnostic::error(summary, detail)
            .with_subject(condition.src_range())
            .with_context(src_range.clone())
            .with_expression(condition.clone(), ctx)
    };
    if cond.is_null() {
        diags.push(condition_error(
            "Null condition",
            "The condition value is null. Conditions must either be true or false.",
        ));
        return (Value::unknown(result_ty), diags);
    }
    if !cond.is_known() {
        return (Value::unknown(result_ty).with_marks(cond.marks().clone()), diags);
    }
    let Ok(cond) = convert(&cond, &Type::Bool) else {
        diags.push(condition_error(
            "Incorrect condition type",
            "The condition expression must be of type bool.",
        ));
        return (Value::unknown(result_ty), diags);
    };
    let (cond, cond_marks) = cond.unmark_deep();

    let (chosen, chosen_diags, chosen_expr, label) = if cond.as_bool() == Some(true) {
        (true_val, true_diags, true_result, "true")
    } else {
        (false_val, false_diags, false_result, "false")
    };
    diags.extend(chosen_diags);
    let result = match convert(&chosen, &result_ty) {
        Ok(result) => result,
        Err(err) => {
            diags.push(
                Diagnostic::error(
                    "Inconsistent conditional result types",
                    format!("The {label} result value has the wrong type: {err}."),
                )
                .with_subject(chosen_expr.src_range())
                .with_context(src_range.clone())
                .with_expression(chosen_expr.clone(), ctx),
            );
            Value::unknown(result_ty)
        }
    };
    (result.with_marks(cond_marks), diags)
}

/// A literal `null` on either side adopts the other side's type, and a
/// dynamic side leaves the result dynamic.
fn conditional_result_type(true_val: &Value, false_val: &Value) -> Option<Type> {
    let bare_null = |val: &Value| val.is_null() && val.ty().is_dynamic();
    if bare_null(true_val) {
        return Some(false_val.ty().clone());
    }
    if bare_null(false_val) {
        return Some(true_val.ty().clone());
    }
    if true_val.ty().is_dynamic() || false_val.ty().is_dynamic() {
        return Some(Type::Dynamic);
    }
    unify(&[true_val.ty().clone(), false_val.ty().clone()])
}

fn describe_type_mismatch(true_ty: &Type, false_ty: &Type) -> String {
    match (true_ty, false_ty) {
        (Type::Object(true_attrs), Type::Object(false_attrs)) => {
            for (name, true_aty) in true_attrs {
                match false_attrs.get(name) {
                    None => {
                        return format!(
                            "The 'true' value includes object attribute {name:?}, which is absent in the 'false' value"
                        )
                    }
                    Some(false_aty) if false_aty != true_aty => {
                        return format!(
                            "Type mismatch for object attribute {name:?}: {}",
                            describe_type_mismatch(true_aty, false_aty)
                        )
                    }
                    Some(_) => {}
                }
            }
            if let Some(name) = false_attrs.keys().find(|name| !true_attrs.contains_key(*name)) {
                return format!(
                    "The 'false' value includes object attribute {name:?}, which is absent in the 'true' value"
                );
            }
        }
        (Type::Tuple(true_etys), Type::Tuple(false_etys)) => {
            if true_etys.len() != false_etys.len() {
                return format!(
                    "The 'true' tuple has length {}, but the 'false' tuple has length {}",
                    true_etys.len(),
                    false_etys.len()
                );
            }
            if let Some((index, (true_ety, false_ety))) = true_etys
                .iter()
                .zip(false_etys)
                .enumerate()
                .find(|(_, (a, b))| a != b)
            {
                return format!(
                    "Type mismatch for tuple element {index}: {}",
                    describe_type_mismatch(true_ety, false_ety)
                );
            }
        }
        (Type::List(true_ety), Type::List(false_ety))
        | (Type::Map(true_ety), Type::Map(false_ety))
        | (Type::Set(true_ety), Type::Set(false_ety))
            if (true_ety.is_object() && false_ety.is_object())
                || (true_ety.is_tuple() && false_ety.is_tuple()) =>
        {
            let noun = match true_ty {
                Type::List(_) => "list",
                Type::Map(_) => "map",
                _ => "set",
            };
            return format!(
                "Mismatched {noun} element types: {}",
                describe_type_mismatch(true_ety, false_ety)
            );
        }
        _ => {}
    }
    let true_name = true_ty.friendly_name();
    let false_name = false_ty.friendly_name();
    if true_name == false_name {
        return "The 'true' and 'false' values have different types: at least one deeply-nested attribute or element is not compatible across both".to_string();
    }
    format!("The 'true' value is {true_name}, but the 'false' value is {false_name}")
}

fn operand_error(
    operand_expr: &Arc<Expr>,
    which: &str,
    message: impl std::fmt::Display,
    src_range: &Range,
    ctx: Ctx<'_>,
) -> Diagnostic {
    Diagnostic::error(
        "Invalid operand",
        format!("Unsuitable value for {which}: {message}."),
    )
    .with_subject(operand_expr.src_range())
    .with_context(src_range.clone())
    .with_expression(operand_expr.clone(), ctx)
}

fn convert_operand(
    given: &Value,
    ty: &Type,
    operand_expr: &Arc<Expr>,
    which: &str,
    src_range: &Range,
    ctx: Ctx<'_>,
    diags: &mut Diagnostics,
) -> Value {
    match convert(given, ty) {
        Ok(val) => val,
        Err(err) => {
            diags.push(operand_error(operand_expr, which, err, src_range, ctx));
            Value::unknown(ty.clone())
        }
    }
}

/// The result of a logical operator when the left operand alone decides
/// it (or is unknown), without looking at the right operand's value.
fn short_circuit(op: BinaryOperator, lhs: &Value) -> Option<Value> {
    if lhs.is_null() {
        return None;
    }
    if !lhs.is_known() {
        return Some(Value::unknown(Type::Bool).with_marks(lhs.marks().clone()));
    }
    let decided = match op {
        BinaryOperator::Or => lhs.as_bool() == Some(true),
        BinaryOperator::And => lhs.as_bool() == Some(false),
        _ => false,
    };
    decided.then(|| lhs.clone())
}

fn eval_binary(
    expr: &Expr,
    op: BinaryOperator,
    lhs: &Arc<Expr>,
    rhs: &Arc<Expr>,
    src_range: &Range,
    ctx: Ctx<'_>,
    item: Option<&Value>,
) -> (Value, Diagnostics) {
    let operand_ty = op.operand_type();
    let (given_lhs, mut diags) = eval(lhs, ctx, item);
    let lhs_val = convert_operand(
        &given_lhs,
        &operand_ty,
        lhs,
        "left operand",
        src_range,
        ctx,
        &mut diags,
    );

    if op.is_logical() {
        if let Some(result) = short_circuit(op, &lhs_val) {
            // The right operand is still checked, against a scope where
            // every variable is unknown.
            let check_scope = EvalContext::all_unknown_view(ctx);
            let (given_rhs, rhs_diags) = eval(rhs, Some(&check_scope), item);
            diags.extend(rhs_diags);
            convert_operand(
                &given_rhs,
                &operand_ty,
                rhs,
                "right operand",
                src_range,
                ctx,
                &mut diags,
            );
            if diags.has_errors() {
                return (Value::unknown(op.result_type()), diags);
            }
            return (result, diags);
        }
    }

    let (given_rhs, rhs_diags) = eval(rhs, ctx, item);
    diags.extend(rhs_diags);
    let rhs_val = convert_operand(
        &given_rhs,
        &operand_ty,
        rhs,
        "right operand",
        src_range,
        ctx,
        &mut diags,
    );
    if diags.has_errors() {
        return (Value::unknown(op.result_type()), diags);
    }

    match value_ops::binary(op, &lhs_val, &rhs_val) {
        Ok(result) => (result, diags),
        Err(OperationError::Operand { operand, message }) => {
            let operand_expr = if operand == Operand::Right { rhs } else { lhs };
            diags.push(operand_error(
                operand_expr,
                &operand.to_string(),
                message,
                src_range,
                ctx,
            ));
            (Value::unknown(op.result_type()), diags)
        }
        Err(OperationError::Failed(message)) => {
            diags.push(
                Diagnostic::error(
                    "Operation failed",
                    format!("Error during operation: {message}."),
                )
                .with_subject(src_range.clone())
                .with_expression(own(expr), ctx),
            );
            (Value::unknown(op.result_type()), diags)
        }
    }
}

fn eval_unary(
    expr: &Expr,
    op: UnaryOperator,
    operand: &Arc<Expr>,
    src_range: &Range,
    ctx: Ctx<'_>,
    item: Option<&Value>,
) -> (Value, Diagnostics) {
    let ty = op.operand_type();
    let (given, mut diags) = eval(operand, ctx, item);
    let val = convert_operand(
        &given,
        &ty,
        operand,
        "unary operand",
        src_range,
        ctx,
        &mut diags,
    );
    if diags.has_errors() {
        return (Value::unknown(ty), diags);
    }
    match value_ops::unary(op, &val) {
        Ok(result) => (result, diags),
        Err(OperationError::Operand { message, .. }) => {
            diags.push(operand_error(operand, "unary operand", message, src_range, ctx));
            (Value::unknown(ty), diags)
        }
        Err(OperationError::Failed(message)) => {
            diags.push(
                Diagnostic::error(
                    "Operation failed",
                    format!("Error during operation: {message}."),
                )
                .with_subject(src_range.clone())
                .with_expression(own(expr), ctx),
            );
            (Value::unknown(ty), diags)
        }
    }
}

fn eval_object(
    items: &[ObjectConsItem],
    ctx: Ctx<'_>,
    item: Option<&Value>,
) -> (Value, Diagnostics) {
    let mut attrs = BTreeMap::new();
    let mut marks = Marks::new();
    let mut diags = Diagnostics::new();
    // Any key that cannot be resolved leaves the set of attributes, and so
    // the result type, unknown.
    let mut known = true;

    for entry in items {
        let (key, key_diags) = eval(&entry.key, ctx, item);
        let key_failed = key_diags.has_errors();
        diags.extend(key_diags);
        let (val, val_diags) = eval(&entry.value, ctx, item);
        diags.extend(val_diags);
        if key_failed {
            known = false;
            continue;
        }

        let key_error = |summary: &str, detail: String| {
            Diagnostic::error(summary, detail)
                .with_subject(entry.key.src_range())
                .with_expression(entry.key.clone(), ctx)
        };
        if key.is_null() {
            diags.push(key_error(
                "Null value as key",
                "Can't use a null value as a key.".to_string(),
            ));
            known = false;
            continue;
        }
        let (key, key_marks) = key.unmark();
        marks = marks.union(key_marks);
        let key = match convert(&key, &Type::String) {
            Ok(key) => key,
            Err(err) => {
                diags.push(key_error(
                    "Incorrect key type",
                    format!("Can't use this value as a key: {err}."),
                ));
                known = false;
                continue;
            }
        };
        let Some(name) = key.as_str() else {
            known = false;
            continue;
        };
        attrs.insert(name.to_string(), val);
    }

    if !known {
        return (Value::dynamic(), diags);
    }
    (Value::object(attrs).with_marks(marks), diags)
}

fn eval_object_key(
    expr: &Expr,
    wrapped: &Arc<Expr>,
    force_non_literal: bool,
    ctx: Ctx<'_>,
    item: Option<&Value>,
) -> (Value, Diagnostics) {
    if !force_non_literal {
        if let Expr::ScopeTraversal { traversal, .. } = wrapped.as_ref() {
            if traversal.len() > 1 {
                let diag = Diagnostic::error(
                    "Ambiguous attribute key",
                    "If this expression is intended to be a reference, wrap it in parentheses. If it's instead intended as a literal name containing periods, wrap it in quotes to create a string literal.",
                )
                .with_subject(expr.src_range())
                .with_expression(own(expr), ctx);
                return (Value::dynamic(), diag.into());
            }
            if let Some(name) = traversal.root_name() {
                return (Value::string(name), Diagnostics::new());
            }
        }
    }
    eval(wrapped, ctx, item)
}

/// A child scope binding the iteration variables of a `for` expression.
fn for_scope(ctx: Ctx<'_>, for_expr: &ForExpr, key: Value, val: Value) -> Arc<EvalContext> {
    let mut scope = match ctx {
        Some(parent) => parent.new_child(),
        None => EvalContext::new(),
    };
    if let Some(key_var) = &for_expr.key_var {
        scope.set_variable(key_var.clone(), key);
    }
    scope.set_variable(for_expr.val_var.clone(), val);
    Arc::new(scope)
}

/// Key/value pairs visited by a `for` expression. Set elements are their
/// own keys.
fn iteration_pairs(coll: &Value) -> Vec<(Value, Value)> {
    if coll.ty().is_set() {
        return coll
            .elements()
            .unwrap_or_default()
            .iter()
            .map(|element| (element.clone(), element.clone()))
            .collect();
    }
    coll.element_pairs()
}

fn eval_for(for_expr: &ForExpr, ctx: Ctx<'_>, item: Option<&Value>) -> (Value, Diagnostics) {
    let (coll, mut diags) = eval(&for_expr.coll_expr, ctx, item);
    let coll_error = |summary: &str, detail: String| {
        Diagnostic::error(summary, detail)
            .with_subject(for_expr.coll_expr.src_range())
            .with_context(for_expr.src_range.clone())
            .with_expression(for_expr.coll_expr.clone(), ctx)
    };
    if coll.is_null() {
        diags.push(coll_error(
            "Iteration over null value",
            "A null value cannot be used as the collection in a 'for' expression.".to_string(),
        ));
        return (Value::dynamic(), diags);
    }
    if coll.ty().is_dynamic() {
        return (Value::dynamic(), diags);
    }
    let (coll, mut marks) = coll.unmark();
    if !coll.ty().is_iterable() {
        diags.push(coll_error(
            "Iteration over non-iterable value",
            format!(
                "A value of type {} cannot be used as the collection in a 'for' expression.",
                coll.ty().friendly_name()
            ),
        ));
        return (Value::dynamic(), diags);
    }

    let cond_error = |cond_expr: &Arc<Expr>, summary: &str, detail: String, scope: &Arc<EvalContext>| {
        Diagnostic::error(summary, detail)
            .with_subject(cond_expr.src_range())
            .with_context(for_expr.src_range.clone())
            .with_expression(cond_expr.clone(), Some(scope))
    };

    // Checking the condition once with unknown iteration variables
    // catches type errors up front instead of once per element.
    let mut cond_marks = Marks::new();
    if let Some(cond_expr) = &for_expr.cond_expr {
        let probe = for_scope(ctx, for_expr, Value::dynamic(), Value::dynamic());
        let (result, cond_diags) = eval(cond_expr, Some(&probe), item);
        let failed = cond_diags.has_errors();
        diags.extend(cond_diags);
        if result.is_null() {
            diags.push(cond_error(
                cond_expr,
                "Condition is null",
                "The value of the 'if' clause must not be null.".to_string(),
                &probe,
            ));
            return (Value::dynamic(), diags);
        }
        if let Err(err) = convert(&result, &Type::Bool) {
            diags.push(cond_error(
                cond_expr,
                "Invalid 'for' condition",
                format!("The 'if' clause value is invalid: {err}."),
                &probe,
            ));
            return (Value::dynamic(), diags);
        }
        if failed {
            return (Value::dynamic(), diags);
        }
        cond_marks = result.marks().clone();
    }

    if !coll.is_known() {
        return (Value::dynamic().with_marks(marks.union(cond_marks)), diags);
    }

    let mut known = true;
    let mut tuple_vals = Vec::new();
    let mut object_vals: BTreeMap<String, Value> = BTreeMap::new();
    let mut groups: BTreeMap<String, Vec<Value>> = BTreeMap::new();

    for (key, val) in iteration_pairs(&coll) {
        let scope = for_scope(ctx, for_expr, key, val);

        if let Some(cond_expr) = &for_expr.cond_expr {
            let (include, cond_diags) = eval(cond_expr, Some(&scope), item);
            diags.extend(cond_diags);
            if include.is_null() {
                if known {
                    diags.push(cond_error(
                        cond_expr,
                        "Invalid 'for' condition",
                        "The value of the 'if' clause must not be null.".to_string(),
                        &scope,
                    ));
                }
                known = false;
                continue;
            }
            let include = match convert(&include, &Type::Bool) {
                Ok(include) => include,
                Err(err) => {
                    if known {
                        diags.push(cond_error(
                            cond_expr,
                            "Invalid 'for' condition",
                            format!("The 'if' clause value is invalid: {err}."),
                            &scope,
                        ));
                    }
                    known = false;
                    continue;
                }
            };
            if !include.is_known() {
                known = false;
                continue;
            }
            let (include, include_marks) = include.unmark();
            marks = marks.union(include_marks);
            if include.as_bool() == Some(false) {
                continue;
            }
        }

        let Some(key_expr) = &for_expr.key_expr else {
            let (val, val_diags) = eval(&for_expr.val_expr, Some(&scope), item);
            diags.extend(val_diags);
            tuple_vals.push(val);
            continue;
        };

        let key_error = |summary: &str, detail: String| {
            Diagnostic::error(summary, detail)
                .with_subject(key_expr.src_range())
                .with_context(for_expr.src_range.clone())
                .with_expression(key_expr.clone(), Some(&scope))
        };
        let (key_raw, key_diags) = eval(key_expr, Some(&scope), item);
        diags.extend(key_diags);
        if key_raw.is_null() {
            if known {
                diags.push(key_error(
                    "Invalid object key",
                    "Key expression in 'for' expression must not produce a null value."
                        .to_string(),
                ));
            }
            known = false;
            continue;
        }
        if !key_raw.is_known() {
            known = false;
            continue;
        }
        let key = match convert(&key_raw, &Type::String) {
            Ok(key) => key,
            Err(err) => {
                if known {
                    diags.push(key_error(
                        "Invalid object key",
                        format!("The key expression produced an invalid result: {err}."),
                    ));
                }
                known = false;
                continue;
            }
        };
        let (key, key_marks) = key.unmark();
        marks = marks.union(key_marks);
        let name = key.as_str().unwrap_or_default().to_string();

        let (val, val_diags) = eval(&for_expr.val_expr, Some(&scope), item);
        diags.extend(val_diags);
        if for_expr.group {
            groups.entry(name).or_default().push(val);
        } else if object_vals.contains_key(&name) {
            diags.push(key_error(
                "Duplicate object key",
                format!(
                    "Two different items produced the key {name:?} in this 'for' expression. If duplicates are expected, use the ellipsis (...) after the value expression to enable grouping by key."
                ),
            ));
        } else {
            object_vals.insert(name, val);
        }
    }

    if !known {
        return (Value::dynamic().with_marks(marks), diags);
    }
    let result = match (&for_expr.key_expr, for_expr.group) {
        (None, _) => Value::tuple(tuple_vals),
        (Some(_), true) => Value::object(
            groups
                .into_iter()
                .map(|(name, vals)| (name, Value::tuple(vals)))
                .collect(),
        ),
        (Some(_), false) => Value::object(object_vals),
    };
    (result.with_marks(marks), diags)
}

/// The type a splat would produce over a collection of `source_ty`,
/// found by applying `each` to unknown elements.
fn splat_result_type(source_ty: &Type, each: &Expr, ctx: Ctx<'_>) -> (Type, Diagnostics) {
    let mut diags = Diagnostics::new();
    let mut apply = |ety: &Type| {
        let (val, each_diags) = eval(each, ctx, Some(&Value::unknown(ety.clone())));
        diags.extend(each_diags);
        val.ty().clone()
    };
    let ty = if source_ty.is_list() || source_ty.is_set() {
        let ety = source_ty.element_type().cloned().unwrap_or(Type::Dynamic);
        Type::list(apply(&ety))
    } else if let Some(etys) = source_ty.tuple_element_types() {
        Type::Tuple(etys.iter().map(&mut apply).collect())
    } else {
        Type::Dynamic
    };
    (ty, diags)
}

fn eval_splat(
    source: &Arc<Expr>,
    each: &Arc<Expr>,
    ctx: Ctx<'_>,
    item: Option<&Value>,
) -> (Value, Diagnostics) {
    let (source_val, mut diags) = eval(source, ctx, item);
    if diags.has_errors() {
        // Still look for problems in the per-element expression, which
        // sees a dynamic element here.
        let (_, each_diags) = eval(each, ctx, None);
        diags.extend(each_diags);
        return (Value::dynamic(), diags);
    }

    if source_val.is_null() {
        return (
            Value::empty_tuple().with_marks(source_val.marks().clone()),
            diags,
        );
    }
    if source_val.ty().is_dynamic() {
        return (Value::dynamic().with_marks(source_val.marks().clone()), diags);
    }

    let (mut source_val, marks) = source_val.unmark();
    // Any single value splats as a one-element tuple.
    if !source_val.ty().is_sequence() {
        source_val = Value::tuple(vec![source_val]);
    }
    let source_ty = source_val.ty().clone();

    if !source_val.is_known() {
        let (ty, ty_diags) = splat_result_type(&source_ty, each, ctx);
        diags.extend(ty_diags);
        return (Value::unknown(ty).with_marks(marks), diags);
    }

    let mut vals = Vec::new();
    let mut known = true;
    for element in source_val.elements().unwrap_or_default() {
        let (val, each_diags) = eval(each, ctx, Some(element));
        if each_diags.has_errors() {
            known = false;
        }
        diags.extend(each_diags);
        vals.push(val);
    }
    if !known {
        // The per-element diagnostics already describe the problem.
        let (ty, _) = splat_result_type(&source_ty, each, ctx);
        return (Value::unknown(ty).with_marks(marks), diags);
    }

    let result = if source_ty.is_tuple() {
        Value::tuple(vals)
    } else if vals.is_empty() {
        let (ty, ty_diags) = splat_result_type(&source_ty, each, ctx);
        diags.extend(ty_diags);
        Value::list_of(ty.element_type().cloned().unwrap_or(Type::Dynamic), vals)
    } else {
        Value::list(vals)
    };
    (result.with_marks(marks), diags)
}

fn eval_template(
    parts: &[Arc<Expr>],
    src_range: &Range,
    ctx: Ctx<'_>,
    item: Option<&Value>,
) -> (Value, Diagnostics) {
    let mut buf = String::new();
    let mut diags = Diagnostics::new();
    let mut marks = Marks::new();
    let mut known = true;

    for part in parts {
        let (val, part_diags) = eval(part, ctx, item);
        diags.extend(part_diags);
        let part_error = |detail: String| {
            Diagnostic::error("Invalid template interpolation value", detail)
                .with_subject(part.src_range())
                .with_context(src_range.clone())
                .with_expression(part.clone(), ctx)
        };
        if val.is_null() {
            diags.push(part_error(
                "The expression result is null. Cannot include a null value in a string template."
                    .to_string(),
            ));
            continue;
        }
        let (val, part_marks) = val.unmark();
        marks = marks.union(part_marks);
        if !val.is_known() {
            // Keep going for the diagnostics of later parts.
            known = false;
            continue;
        }
        match convert(&val, &Type::String) {
            Ok(text) => {
                if known && !diags.has_errors() {
                    buf.push_str(text.as_str().unwrap_or_default());
                }
            }
            Err(err) => diags.push(part_error(format!(
                "Cannot include the given value in a string template: {err}."
            ))),
        }
    }

    let result = if known {
        Value::string(buf)
    } else {
        Value::unknown(Type::String)
    };
    (result.with_marks(marks), diags)
}

fn eval_template_join(
    expr: &Expr,
    tuple: &Arc<Expr>,
    ctx: Ctx<'_>,
    item: Option<&Value>,
) -> (Value, Diagnostics) {
    let (tuple_val, mut diags) = eval(tuple, ctx, item);
    let (tuple_val, mut marks) = tuple_val.unmark();
    if tuple_val.is_null() || !tuple_val.is_known() || !tuple_val.ty().is_tuple() {
        return (Value::unknown(Type::String).with_marks(marks), diags);
    }

    let join_error = |detail: String| {
        Diagnostic::error("Invalid template interpolation value", detail)
            .with_subject(expr.src_range())
            .with_expression(own(expr), ctx)
    };
    let mut buf = String::new();
    for element in tuple_val.elements().unwrap_or_default() {
        if element.is_null() {
            diags.push(join_error(
                "An iteration result is null. Cannot include a null value in a string template."
                    .to_string(),
            ));
            continue;
        }
        if element.ty().is_dynamic() || !element.is_known() {
            return (Value::unknown(Type::String).with_marks(marks), diags);
        }
        let text = match convert(element, &Type::String) {
            Ok(text) => text,
            Err(err) => {
                diags.push(join_error(format!(
                    "Cannot include one of the interpolation results into the string template: {err}."
                )));
                continue;
            }
        };
        let (text, text_marks) = text.unmark();
        marks = marks.union(text_marks);
        buf.push_str(text.as_str().unwrap_or_default());
    }
    (Value::string(buf).with_marks(marks), diags)
}
