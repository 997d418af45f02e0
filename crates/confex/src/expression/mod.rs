//! The `${...}` expression language
//!
//! `lexer` -> `parser` -> `ast` -> `eval`, with `functions` providing what calls can reach.
pub mod ast;
pub mod eval;
pub mod functions;
pub mod lexer;
pub mod parser;

pub use ast::ExpressionNode;
pub use eval::{execute, ValueProvider, Variables};
pub use functions::{Function, FunctionTable, ParamType};
pub use parser::{parse, parse_single};
