use std::fmt;
use std::sync::Arc;

use crate::convert::convert;
use crate::error::FunctionError;
use crate::marks::Marks;
use crate::types::Type;
use crate::value::Value;

/// Describes one positional (or the variadic) parameter of a function.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub ty: Type,
    pub allow_null: bool,
    pub allow_unknown: bool,
    pub allow_dynamic_type: bool,
    pub allow_marked: bool,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            allow_null: false,
            allow_unknown: false,
            allow_dynamic_type: false,
            allow_marked: false,
        }
    }

    pub fn allow_null(mut self) -> Self {
        self.allow_null = true;
        self
    }

    pub fn allow_unknown(mut self) -> Self {
        self.allow_unknown = true;
        self
    }

    pub fn allow_dynamic_type(mut self) -> Self {
        self.allow_dynamic_type = true;
        self
    }

    pub fn allow_marked(mut self) -> Self {
        self.allow_marked = true;
        self
    }
}

pub type TypeFn = dyn Fn(&[Value]) -> Result<Type, FunctionError> + Send + Sync;
pub type ImplFn = dyn Fn(&[Value], &Type) -> Result<Value, FunctionError> + Send + Sync;

#[derive(Clone)]
pub enum ReturnType {
    Static(Type),
    Computed(Arc<TypeFn>),
}

pub struct FunctionSpec {
    pub description: String,
    pub params: Vec<Parameter>,
    pub var_param: Option<Parameter>,
    pub return_type: ReturnType,
    pub implementation: Arc<ImplFn>,
}

/// A host-supplied function that expressions may call.
#[derive(Clone)]
pub struct Function {
    spec: Arc<FunctionSpec>,
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("params", &self.spec.params)
            .field("var_param", &self.spec.var_param)
            .finish_non_exhaustive()
    }
}

impl Function {
    pub fn new(spec: FunctionSpec) -> Self {
        Self {
            spec: Arc::new(spec),
        }
    }

    /// Convenience constructor for functions with a fixed return type.
    pub fn simple<F>(params: Vec<Parameter>, var_param: Option<Parameter>, ret: Type, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        Self::new(FunctionSpec {
            description: String::new(),
            params,
            var_param,
            return_type: ReturnType::Static(ret),
            implementation: Arc::new(move |args, _| f(args)),
        })
    }

    pub fn description(&self) -> &str {
        &self.spec.description
    }

    pub fn params(&self) -> &[Parameter] {
        &self.spec.params
    }

    pub fn var_param(&self) -> Option<&Parameter> {
        self.spec.var_param.as_ref()
    }

    /// The parameter that the argument at `index` binds to.
    pub fn param_for_arg(&self, index: usize) -> Option<&Parameter> {
        self.spec.params.get(index).or(self.spec.var_param.as_ref())
    }

    pub fn return_type(&self, args: &[Value]) -> Result<Type, FunctionError> {
        match &self.spec.return_type {
            ReturnType::Static(ty) => Ok(ty.clone()),
            ReturnType::Computed(f) => f(args),
        }
    }

    /// Checks, converts and passes `args` to the implementation.
    pub fn call(&self, args: Vec<Value>) -> Result<Value, FunctionError> {
        let params = &self.spec.params;
        if args.len() < params.len() {
            return Err(FunctionError::general(format!(
                "not enough arguments; missing value for {:?}",
                params[args.len()].name
            )));
        }
        if args.len() > params.len() && self.spec.var_param.is_none() {
            return Err(FunctionError::general(format!(
                "too many arguments; only {} expected",
                params.len()
            )));
        }

        let mut result_marks = Marks::new();
        let mut converted = Vec::with_capacity(args.len());
        let mut any_unknown = false;
        for (index, arg) in args.into_iter().enumerate() {
            let Some(param) = self.param_for_arg(index) else {
                return Err(FunctionError::general("too many arguments"));
            };
            let arg = if param.allow_marked {
                arg
            } else {
                let (plain, marks) = arg.unmark_deep();
                result_marks = result_marks.union(marks);
                plain
            };
            if arg.is_null() && !param.allow_null {
                return Err(FunctionError::arg(index, "argument must not be null"));
            }
            if !arg.is_known() && !param.allow_unknown {
                any_unknown = true;
            }
            let arg = convert(&arg, &param.ty)
                .map_err(|err| FunctionError::arg(index, err.to_string()))?;
            converted.push(arg);
        }

        let ret = self.return_type(&converted)?;
        if any_unknown {
            tracing::trace!("function call short-circuited on unknown argument");
            return Ok(Value::unknown(ret).with_marks(result_marks));
        }
        let result = (self.spec.implementation)(&converted, &ret)?;
        Ok(result.with_marks(result_marks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upper() -> Function {
        Function::simple(
            vec![Parameter::new("str", Type::String)],
            None,
            Type::String,
            |args| {
                let text = args[0].as_str().unwrap_or_default();
                Ok(Value::string(text.to_uppercase()))
            },
        )
    }

    #[test]
    fn call_converts_arguments() {
        let result = upper().call(vec![Value::int(5)]).unwrap();
        assert_eq!(result, Value::string("5"));
    }

    #[test]
    fn call_rejects_null() {
        let err = upper().call(vec![Value::null(Type::String)]).unwrap_err();
        assert_eq!(err, FunctionError::arg(0, "argument must not be null"));
    }

    #[test]
    fn unknown_argument_gives_unknown_result() {
        let result = upper().call(vec![Value::unknown(Type::String)]).unwrap();
        assert_eq!(result, Value::unknown(Type::String));
    }

    #[test]
    fn marks_are_moved_to_result() {
        let result = upper().call(vec![Value::string("a").mark("m")]).unwrap();
        assert_eq!(result.as_str(), Some("A"));
        assert!(result.is_marked());
    }

    #[test]
    fn arity_is_checked() {
        assert!(upper().call(vec![]).is_err());
        assert!(upper().call(vec![Value::string("a"), Value::string("b")]).is_err());
    }
}
