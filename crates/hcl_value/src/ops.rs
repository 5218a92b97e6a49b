use std::fmt;

use crate::error::{Operand, OperationError};
use crate::types::Type;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Or,
    And,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

impl BinaryOperator {
    /// The type both operands are converted to before the operation runs.
    pub fn operand_type(self) -> Type {
        match self {
            BinaryOperator::Or | BinaryOperator::And => Type::Bool,
            BinaryOperator::Equal | BinaryOperator::NotEqual => Type::Dynamic,
            _ => Type::Number,
        }
    }

    pub fn result_type(self) -> Type {
        match self {
            BinaryOperator::Add
            | BinaryOperator::Subtract
            | BinaryOperator::Multiply
            | BinaryOperator::Divide
            | BinaryOperator::Modulo => Type::Number,
            _ => Type::Bool,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Or => "||",
            BinaryOperator::And => "&&",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanOrEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanOrEqual => ">=",
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
        }
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOperator::Or | BinaryOperator::And)
    }

    pub fn is_equality(self) -> bool {
        matches!(self, BinaryOperator::Equal | BinaryOperator::NotEqual)
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Negate,
    Not,
}

impl UnaryOperator {
    pub fn operand_type(self) -> Type {
        match self {
            UnaryOperator::Negate => Type::Number,
            UnaryOperator::Not => Type::Bool,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOperator::Negate => "-",
            UnaryOperator::Not => "!",
        }
    }
}

/// Applies a binary operator to operands that have already been converted
/// to [`BinaryOperator::operand_type`].
///
/// Unknown operands produce an unknown result of the operator's result
/// type; the result always carries the marks of both operands.
pub fn binary(op: BinaryOperator, lhs: &Value, rhs: &Value) -> Result<Value, OperationError> {
    if op.is_equality() {
        let equal = lhs.equals(rhs);
        return Ok(if op == BinaryOperator::NotEqual {
            not(&equal)
        } else {
            equal
        });
    }

    check_not_null(lhs, Operand::Left)?;
    check_not_null(rhs, Operand::Right)?;
    let marks = lhs.marks().clone().union(rhs.marks().clone());

    if op.is_logical() {
        let (l, r) = (lhs.as_bool(), rhs.as_bool());
        // A known operand can decide the result even when the other is unknown.
        let result = match (op, l, r) {
            (BinaryOperator::Or, Some(true), _) | (BinaryOperator::Or, _, Some(true)) => {
                Value::bool(true)
            }
            (BinaryOperator::And, Some(false), _) | (BinaryOperator::And, _, Some(false)) => {
                Value::bool(false)
            }
            (_, Some(l), Some(r)) => Value::bool(if op == BinaryOperator::Or {
                l || r
            } else {
                l && r
            }),
            _ => Value::unknown(Type::Bool),
        };
        return Ok(result.with_marks(marks));
    }

    if !lhs.is_known() || !rhs.is_known() {
        return Ok(Value::unknown(op.result_type()).with_marks(marks));
    }
    let l = lhs
        .as_number()
        .ok_or_else(|| operand_error(Operand::Left, "number required"))?;
    let r = rhs
        .as_number()
        .ok_or_else(|| operand_error(Operand::Right, "number required"))?;

    let divide_by_zero = || OperationError::Failed("divide by zero".to_string());
    let result = match op {
        BinaryOperator::Add => Value::number(l.clone() + r.clone()),
        BinaryOperator::Subtract => Value::number(l.clone() - r.clone()),
        BinaryOperator::Multiply => Value::number(l.clone() * r.clone()),
        BinaryOperator::Divide => Value::number(l.checked_div(r).ok_or_else(divide_by_zero)?),
        BinaryOperator::Modulo => Value::number(l.checked_rem(r).ok_or_else(divide_by_zero)?),
        BinaryOperator::LessThan => Value::bool(l < r),
        BinaryOperator::LessThanOrEqual => Value::bool(l <= r),
        BinaryOperator::GreaterThan => Value::bool(l > r),
        BinaryOperator::GreaterThanOrEqual => Value::bool(l >= r),
        _ => unreachable!("logical and equality operators handled above"),
    };
    Ok(result.with_marks(marks))
}

pub fn unary(op: UnaryOperator, operand: &Value) -> Result<Value, OperationError> {
    check_not_null(operand, Operand::Only)?;
    if !operand.is_known() {
        return Ok(Value::unknown(op.operand_type()).with_marks(operand.marks().clone()));
    }
    let result = match op {
        UnaryOperator::Negate => {
            let number = operand
                .as_number()
                .ok_or_else(|| operand_error(Operand::Only, "number required"))?;
            Value::number(-number.clone())
        }
        UnaryOperator::Not => {
            let flag = operand
                .as_bool()
                .ok_or_else(|| operand_error(Operand::Only, "bool required"))?;
            Value::bool(!flag)
        }
    };
    Ok(result.with_marks(operand.marks().clone()))
}

/// Logical negation of a `Bool` value, passing through unknowns.
pub fn not(value: &Value) -> Value {
    match value.as_bool() {
        Some(flag) => Value::bool(!flag).with_marks(value.marks().clone()),
        None => value.clone(),
    }
}

fn check_not_null(value: &Value, operand: Operand) -> Result<(), OperationError> {
    if value.is_null() {
        return Err(operand_error(operand, "argument must not be null"));
    }
    Ok(())
}

fn operand_error(operand: Operand, message: &str) -> OperationError {
    OperationError::Operand {
        operand,
        message: message.to_string(),
    }
}
