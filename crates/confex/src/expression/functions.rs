//! Callable functions for `${name(args...)}`
//!
//! A [Function] declares its parameter types once when it is registered; every call is checked
//! against that declaration before the callable runs. User functions shadow builtins of the same
//! name.
//!
//! Builtins:
//! - `get_env(name: string) -> string`: fails when the variable is not set
//! - `set_env(name: string, value: string) -> string`: sets the variable and returns `value`
use crate::error::{Error, Result};
use crate::value::Value;
use std::sync::{Arc, OnceLock};

pub type Callable = dyn Fn(&[Value]) -> Result<Value> + Send + Sync;

/// Declared type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// accepts every value unchanged
    Any,
    String,
    Integer,
    /// also accepts integers, they are converted
    Decimal,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    pub fn name(self) -> &'static str {
        match self {
            ParamType::Any => "any",
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Decimal => "decimal",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }

    /// `value` as this type, `None` if it does not fit
    fn coerce(self, value: Value) -> Option<Value> {
        match (self, value) {
            (ParamType::Any, value) => Some(value),
            (ParamType::Decimal, Value::Integer(i)) => Some(Value::Decimal(i as f64)),
            (ParamType::String, value @ Value::String(_))
            | (ParamType::Integer, value @ Value::Integer(_))
            | (ParamType::Decimal, value @ Value::Decimal(_))
            | (ParamType::Boolean, value @ Value::Boolean(_))
            | (ParamType::Array, value @ Value::Array(_))
            | (ParamType::Object, value @ Value::Object(_)) => Some(value),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct Function {
    name: String,
    params: Vec<ParamType>,
    callable: Arc<Callable>,
}

impl Function {
    pub fn new<F>(name: impl Into<String>, params: &[ParamType], callable: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            params: params.to_vec(),
            callable: Arc::new(callable),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn params(&self) -> &[ParamType] {
        &self.params
    }

    /// Check `args` against the declared parameters and invoke the callable
    pub fn call(&self, args: Vec<Value>) -> Result<Value> {
        if args.len() != self.arity() {
            return Err(Error::ArityMismatch {
                function: self.name.clone(),
                expected: self.arity(),
                actual: args.len(),
            });
        }

        let mut checked = Vec::with_capacity(args.len());
        for (index, (param, arg)) in self.params.iter().zip(args).enumerate() {
            let found = arg.kind();
            let Some(arg) = param.coerce(arg) else {
                return Err(Error::IncompatibleArgType {
                    function: self.name.clone(),
                    index: index + 1,
                    expected: param.name(),
                    found,
                });
            };
            checked.push(arg);
        }

        (self.callable)(&checked)
    }
}

impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// User supplied functions
///
/// Lookups fall back to the builtins when a name is not registered here.
#[derive(Debug, Clone, Default)]
pub struct FunctionTable {
    functions: indexmap::IndexMap<String, Function>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callable` under `name`, replacing any previous registration
    ///
    /// Fails with [Error::BadFunctionSignature] if `name` could never be called from an
    /// expression.
    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        params: &[ParamType],
        callable: F,
    ) -> Result<()>
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        let function = Function::new(name, params, callable);

        let name = function.name();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::BadFunctionSignature {
                function: name.to_string(),
                reason: "name must be a non-empty identifier".to_string(),
            });
        }

        tracing::debug!(function = name, arity = function.arity(), "register function");
        self.functions.insert(function.name.clone(), function);
        Ok(())
    }

    /// User function named `name`, or the builtin of that name
    pub fn get(&self, name: &str) -> Option<&Function> {
        self.functions
            .get(name)
            .or_else(|| builtins().functions.get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

fn builtins() -> &'static FunctionTable {
    static BUILTINS: OnceLock<FunctionTable> = OnceLock::new();

    BUILTINS.get_or_init(|| {
        let mut table = FunctionTable::default();
        for function in [
            Function::new("get_env", &[ParamType::String], get_env),
            Function::new("set_env", &[ParamType::String, ParamType::String], set_env),
        ] {
            table.functions.insert(function.name.clone(), function);
        }
        table
    })
}

fn get_env(args: &[Value]) -> Result<Value> {
    let name = args[0].as_str()?;
    std::env::var(name)
        .map(Value::String)
        .map_err(|e| Error::Function {
            function: "get_env".to_string(),
            message: format!("{name}: {e}"),
        })
}

fn set_env(args: &[Value]) -> Result<Value> {
    let name = args[0].as_str()?;
    let value = args[1].as_str()?;

    if name.is_empty() || name.contains(['=', '\0']) {
        return Err(Error::Function {
            function: "set_env".to_string(),
            message: format!("invalid variable name {name:?}"),
        });
    }

    if value.contains('\0') {
        return Err(Error::Function {
            function: "set_env".to_string(),
            message: format!("value of {name} contains a NUL byte"),
        });
    }

    tracing::debug!(variable = name, "set environment variable");
    std::env::set_var(name, value);
    Ok(Value::String(value.to_string()))
}
