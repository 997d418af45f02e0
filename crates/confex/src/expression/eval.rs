//! Tree walking evaluation of [ExpressionNode]s
//!
//! Values come from three places:
//! - paths are resolved through a [ValueProvider] (the store)
//! - variables come from a plain name -> value table
//! - calls go through a [FunctionTable]
//!
//! Inside the evaluator failures travel as a [Fault] that remembers the node they belong to.
//! [execute] is the only place a fault becomes an [Error], it attaches the canonical expression
//! text with that node underlined.
use super::ast::{CallNode, ExpressionNode, Node, NumberNode, PathNode};
use super::functions::FunctionTable;
use crate::error::{Error, Result};
use crate::path::Path;
use crate::value::Value;

/// Read access to the store
pub trait ValueProvider {
    /// Value at `path`, [Error::PathNotFound] if there is none
    fn resolve(&self, path: &Path) -> Result<Value>;
}

// blanket impl for Fn
impl<F> ValueProvider for F
where
    F: Fn(&Path) -> Result<Value>,
{
    fn resolve(&self, path: &Path) -> Result<Value> {
        self(path)
    }
}

pub type Variables = indexmap::IndexMap<String, Value>;

/// An error and the node that caused it
#[derive(Debug)]
pub(crate) struct Fault<'e> {
    pub error: Error,
    pub node: &'e Node,
}

impl<'e> Fault<'e> {
    fn new(error: Error, node: &'e Node) -> Self {
        Self { error, node }
    }

    pub fn into_error(self, expression: &ExpressionNode) -> Error {
        Error::InExpression {
            context: expression.highlight(self.node),
            source: Box::new(self.error),
        }
    }
}

/// Evaluate `expression`
#[tracing::instrument(level = "trace", skip_all, fields(expression = %expression))]
pub fn execute(
    expression: &ExpressionNode,
    provider: &dyn ValueProvider,
    variables: &Variables,
    functions: &FunctionTable,
) -> Result<Value> {
    let evaluator = Evaluator {
        provider,
        variables,
        functions,
    };

    evaluator
        .node(&expression.node)
        .map_err(|fault| fault.into_error(expression))
}

/// Turn a path node into a [Path], substituting variable segments
///
/// Variable segments must hold scalars; their text may contain separators and then expands into
/// several segments.
pub(crate) fn resolve_path<'e>(
    node: &'e Node,
    path: &'e PathNode,
    variables: &Variables,
) -> Result<Path, Fault<'e>> {
    let mut segments = Vec::with_capacity(path.segments.len());
    for segment in &path.segments {
        let text = match segment {
            Node::Identifier(identifier) => identifier.name.clone(),
            Node::Variable(variable) => {
                let value = lookup_variable(&variable.name, variables)
                    .map_err(|error| Fault::new(error, segment))?;
                if !value.is_scalar() {
                    return Err(Fault::new(
                        Error::InvalidPathSegment {
                            name: variable.name.clone(),
                            found: value.kind(),
                        },
                        segment,
                    ));
                }
                value.to_string()
            }
            other => {
                return Err(Fault::new(
                    Error::InvalidPath(other.to_string()),
                    segment,
                ))
            }
        };
        segments.push(text);
    }

    Path::new(&segments).map_err(|_| Fault::new(Error::InvalidPath(segments.join(".")), node))
}

fn lookup_variable(name: &str, variables: &Variables) -> Result<Value> {
    variables
        .get(name)
        .cloned()
        .ok_or_else(|| Error::UndefinedVariable {
            name: name.to_string(),
        })
}

struct Evaluator<'c> {
    provider: &'c dyn ValueProvider,
    variables: &'c Variables,
    functions: &'c FunctionTable,
}

impl Evaluator<'_> {
    fn node<'e>(&self, node: &'e Node) -> Result<Value, Fault<'e>> {
        match node {
            Node::Path(path) => {
                let path = resolve_path(node, path, self.variables)?;
                tracing::trace!(%path, "resolve");
                self.provider
                    .resolve(&path)
                    .map_err(|error| Fault::new(error, node))
            }
            Node::Variable(variable) => lookup_variable(&variable.name, self.variables)
                .map_err(|error| Fault::new(error, node)),
            Node::Call(call) => self.call(node, call),
            Node::Identifier(identifier) => Ok(Value::String(identifier.name.clone())),
            Node::String(string) => Ok(Value::String(string.value.clone())),
            Node::Number(number) => Ok(number_value(number)),
        }
    }

    fn call<'e>(&self, node: &'e Node, call: &'e CallNode) -> Result<Value, Fault<'e>> {
        let name = &call.function.name;
        let Some(function) = self.functions.get(name) else {
            return Err(Fault::new(
                Error::UndefinedFunction { name: name.clone() },
                node,
            ));
        };

        if function.arity() != call.args.len() {
            return Err(Fault::new(
                Error::ArityMismatch {
                    function: name.clone(),
                    expected: function.arity(),
                    actual: call.args.len(),
                },
                node,
            ));
        }

        let args = call
            .args
            .iter()
            .map(|arg| self.node(arg))
            .collect::<Result<Vec<_>, _>>()?;

        match (function.call(args), &call.alternative) {
            (Ok(value), _) => Ok(value),
            (Err(error), Some(alternative)) => {
                tracing::debug!(function = %name, %error, "call failed, using alternative");
                self.node(&alternative.node)
            }
            (Err(error), None) => Err(Fault::new(error, node)),
        }
    }
}

fn number_value(number: &NumberNode) -> Value {
    match (number.int, number.float) {
        (Some(int), _) => Value::Integer(int),
        (None, Some(float)) => Value::Decimal(float),
        // the lexer only produces literals that parse as f64
        (None, None) => Value::String(number.literal.clone()),
    }
}
