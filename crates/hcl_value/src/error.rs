use thiserror::Error;

/// A failed type conversion, with the nested path at which it failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", self.render())]
pub struct ConversionError {
    pub path: Vec<String>,
    pub message: String,
}

impl ConversionError {
    pub fn new(path: &[String], message: impl Into<String>) -> Self {
        Self {
            path: path.to_vec(),
            message: message.into(),
        }
    }

    fn render(&self) -> String {
        if self.path.is_empty() {
            self.message.clone()
        } else {
            format!("{}: {}", self.path.join(", "), self.message)
        }
    }
}

/// An error raised by a function implementation or by argument checking.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FunctionError {
    /// The argument at `index` (counting variadic arguments) was invalid.
    #[error("{message}")]
    Arg { index: usize, message: String },
    #[error("{0}")]
    General(String),
}

impl FunctionError {
    pub fn arg(index: usize, message: impl Into<String>) -> Self {
        Self::Arg {
            index,
            message: message.into(),
        }
    }

    pub fn general(message: impl Into<String>) -> Self {
        Self::General(message.into())
    }
}

/// A failed arithmetic or logical operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    #[error("{operand}: {message}")]
    Operand { operand: Operand, message: String },
    #[error("{0}")]
    Failed(String),
}

/// Identifies the operand of a binary or unary operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Left,
    Right,
    Only,
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Left => f.write_str("left operand"),
            Operand::Right => f.write_str("right operand"),
            Operand::Only => f.write_str("operand"),
        }
    }
}
