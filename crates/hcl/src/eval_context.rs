use std::collections::BTreeMap;
use std::sync::Arc;

use hcl_value::{Function, Value};

/// The scope an expression is evaluated in.
///
/// Contexts form a chain through `parent`; lookups walk the chain and a
/// child's entries shadow its ancestors'. Children share their parent by
/// `Arc`, so a diagnostic can keep the scope it was raised in.
#[derive(Debug, Default)]
pub struct EvalContext {
    pub variables: BTreeMap<String, Value>,
    pub functions: BTreeMap<String, Function>,
    parent: Option<Arc<EvalContext>>,
    ancestors_unknown: bool,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variables(variables: BTreeMap<String, Value>) -> Self {
        Self {
            variables,
            ..Self::default()
        }
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn set_function(&mut self, name: impl Into<String>, function: Function) {
        self.functions.insert(name.into(), function);
    }

    pub fn parent(&self) -> Option<&Arc<EvalContext>> {
        self.parent.as_ref()
    }

    /// An empty child scope of `self`.
    pub fn new_child(self: &Arc<Self>) -> EvalContext {
        EvalContext {
            parent: Some(self.clone()),
            ..EvalContext::default()
        }
    }

    /// A child scope in which every variable inherited from an ancestor
    /// reads as an unknown value of the same type.
    ///
    /// Used to type-check expressions whose result will be discarded, such
    /// as the right side of a short-circuited `||`. Names that are not
    /// declared anywhere read as unknown of unknown type rather than
    /// failing, since nothing observable depends on them.
    pub fn new_child_all_variables_unknown(self: &Arc<Self>) -> EvalContext {
        EvalContext {
            parent: Some(self.clone()),
            ancestors_unknown: true,
            ..EvalContext::default()
        }
    }

    /// Like [`EvalContext::new_child_all_variables_unknown`] but also
    /// usable when no context was given at all.
    pub fn all_unknown_view(ctx: Option<&Arc<EvalContext>>) -> Arc<EvalContext> {
        let base = ctx
            .cloned()
            .unwrap_or_else(|| Arc::new(EvalContext::default()));
        Arc::new(base.new_child_all_variables_unknown())
    }

    /// True if this scope, or any ancestor, was created as an unknown view.
    pub fn is_type_check_scope(&self) -> bool {
        self.ancestors_unknown
            || self
                .parent
                .as_ref()
                .is_some_and(|parent| parent.is_type_check_scope())
    }

    pub fn lookup_variable(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.variables.get(name) {
            return Some(value.clone());
        }
        let parent = self.parent.as_ref()?;
        let found = parent.lookup_variable(name)?;
        if self.ancestors_unknown {
            let marks = found.marks().clone();
            return Some(Value::unknown(found.ty().clone()).with_marks(marks));
        }
        Some(found)
    }

    pub fn lookup_function(&self, name: &str) -> Option<&Function> {
        if let Some(function) = self.functions.get(name) {
            return Some(function);
        }
        self.parent.as_ref()?.lookup_function(name)
    }

    pub fn has_functions(&self) -> bool {
        !self.functions.is_empty()
            || self
                .parent
                .as_ref()
                .is_some_and(|parent| parent.has_functions())
    }

    /// All variable names visible from this scope, for suggestions.
    pub fn variable_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.variables.keys().cloned().collect();
        if let Some(parent) = &self.parent {
            for name in parent.variable_names() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// All function names visible from this scope, for suggestions.
    pub fn function_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        if let Some(parent) = &self.parent {
            for name in parent.function_names() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use hcl_value::Type;

    use super::*;

    #[test]
    fn child_shadows_parent() {
        let mut root = EvalContext::new();
        root.set_variable("a", Value::int(1));
        root.set_variable("b", Value::int(2));
        let root = Arc::new(root);
        let mut child = root.new_child();
        child.set_variable("a", Value::string("x"));
        assert_eq!(child.lookup_variable("a"), Some(Value::string("x")));
        assert_eq!(child.lookup_variable("b"), Some(Value::int(2)));
        assert_eq!(child.lookup_variable("c"), None);
    }

    #[test]
    fn unknown_view_hides_ancestor_values() {
        let mut root = EvalContext::new();
        root.set_variable("a", Value::int(1).mark("m"));
        let root = Arc::new(root);
        let mut view = root.new_child_all_variables_unknown();
        view.set_variable("own", Value::bool(true));
        let a = view.lookup_variable("a").expect("a");
        assert_eq!(a.ty(), &Type::Number);
        assert!(!a.is_known());
        assert!(a.is_marked());
        assert_eq!(view.lookup_variable("own"), Some(Value::bool(true)));
        assert!(view.is_type_check_scope());
        assert!(!root.is_type_check_scope());
    }
}
