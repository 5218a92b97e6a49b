//! The dynamic value domain used by the configuration language evaluator.
//!
//! Values are typed, may be null or unknown, and carry a set of marks that
//! every operation propagates.

pub mod convert;
mod error;
pub mod function;
mod marks;
mod number;
pub mod ops;
mod types;
mod value;

pub use convert::{conversion_possible, convert, parse_number};
pub use error::{ConversionError, FunctionError, Operand, OperationError};
pub use function::{Function, FunctionSpec, Parameter, ReturnType};
pub use marks::{union_marks, Mark, Marks};
pub use number::Number;
pub use ops::{BinaryOperator, UnaryOperator};
pub use types::{unify, Type};
pub use value::Value;
