use std::any::Any;
use std::fmt;
use std::sync::Arc;

use hcl_value::FunctionError;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::eval_context::EvalContext;
use crate::expression::Expression;
use crate::pos::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("Error"),
            Severity::Warning => f.write_str("Warning"),
        }
    }
}

/// A structured problem report.
///
/// `subject` is the range the problem is about; `context` is an optional
/// wider range that helps a reader orient themselves. When the problem came
/// from evaluating an expression, `expression` and `eval_context` say which
/// one and in what scope.
#[derive(Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
    pub subject: Option<Range>,
    pub context: Option<Range>,
    pub expression: Option<Arc<dyn Expression>>,
    pub eval_context: Option<Arc<EvalContext>>,
    pub extra: Option<Arc<dyn Any + Send + Sync>>,
}

impl Diagnostic {
    pub fn new(severity: Severity, summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity,
            summary: summary.into(),
            detail: detail.into(),
            subject: None,
            context: None,
            expression: None,
            eval_context: None,
            extra: None,
        }
    }

    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(Severity::Error, summary, detail)
    }

    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(Severity::Warning, summary, detail)
    }

    pub fn with_subject(mut self, subject: Range) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn with_context(mut self, context: Range) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_expression(
        mut self,
        expression: Arc<dyn Expression>,
        eval_context: Option<&Arc<EvalContext>>,
    ) -> Self {
        self.expression = Some(expression);
        self.eval_context = eval_context.cloned();
        self
    }

    pub fn with_extra<T: Any + Send + Sync>(mut self, extra: T) -> Self {
        self.extra = Some(Arc::new(extra));
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// The extra payload, if one of type `T` was attached.
    pub fn extra<T: Any>(&self) -> Option<&T> {
        self.extra.as_ref().and_then(|extra| extra.downcast_ref::<T>())
    }
}

impl fmt::Debug for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostic")
            .field("severity", &self.severity)
            .field("summary", &self.summary)
            .field("detail", &self.detail)
            .field("subject", &self.subject)
            .field("context", &self.context)
            .field("has_expression", &self.expression.is_some())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(subject) = &self.subject {
            write!(f, "{subject}: ")?;
        }
        write!(f, "{}", self.summary)?;
        if !self.detail.is_empty() {
            write!(f, "; {}", self.detail)?;
        }
        Ok(())
    }
}

impl Serialize for Diagnostic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Diagnostic", 5)?;
        state.serialize_field("severity", &self.severity)?;
        state.serialize_field("summary", &self.summary)?;
        state.serialize_field("detail", &self.detail)?;
        state.serialize_field("subject", &self.subject)?;
        state.serialize_field("context", &self.context)?;
        state.end()
    }
}

/// Attached as [`Diagnostic::extra`] when a function call fails.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCallDiagExtra {
    pub function_name: String,
    pub error: FunctionError,
}

/// An ordered, append-only collection of diagnostics.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(Diagnostic::is_error)
    }

    /// Only the error-severity diagnostics.
    pub fn errs(&self) -> Diagnostics {
        self.0.iter().filter(|d| d.is_error()).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.0
    }
}

impl From<Diagnostic> for Diagnostics {
    fn from(diagnostic: Diagnostic) -> Self {
        Self(vec![diagnostic])
    }
}

impl From<Vec<Diagnostic>> for Diagnostics {
    fn from(diagnostics: Vec<Diagnostic>) -> Self {
        Self(diagnostics)
    }
}

impl FromIterator<Diagnostic> for Diagnostics {
    fn from_iter<I: IntoIterator<Item = Diagnostic>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl std::ops::Index<usize> for Diagnostics {
    type Output = Diagnostic;

    fn index(&self, index: usize) -> &Diagnostic {
        &self.0[index]
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, diagnostic) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{diagnostic}")?;
        }
        Ok(())
    }
}
