//! # confex - configuration expressions
//!
//! ## Introduction for developers
//!
//! Read this to understand how `confex` works internally.
//!
//! ### Values and paths
//!
//! A configuration is a tree of [value::Value]s: objects, arrays and scalars. Every value has a
//! [path::Path], its keys joined with `.` (array elements use their index):
//!
//! ```yaml
//! john:
//!   first: john
//!   last: doe
//!   name: "${john:first} ${john:last}"
//! servers:
//!   - host: alpha
//! ```
//!
//! | **path**         | **value**                        |
//! |------------------|----------------------------------|
//! | `john.first`     | `john`                           |
//! | `john.last`      | `doe`                            |
//! | `john.name`      | `${john:first} ${john:last}`     |
//! | `servers.0.host` | `alpha`                          |
//!
//! The engine reads and writes values only through two traits, [ValueProvider] and
//! [store::ValueTarget]. [store::MapStore] is the in-memory implementation, [documents] loads it
//! from YAML files.
//!
//! ### Expressions
//!
//! Any string may contain `${...}` expressions:
//!
//! - `${john:first}` a path, segments separated by `:` (at least two)
//! - `${john:$who}` a path with a variable segment
//! - `${name}` or `${$name}` a variable
//! - `${get_env("HOME")}` a function call, arguments are strings, numbers, variables, paths or calls
//! - `${get_env("X") || set_env("X", "v")}` a call with an alternative that is evaluated when the
//!   call fails
//!
//! Text goes through [expression::lexer] (tokens) and [expression::parser] (one
//! [expression::ExpressionNode] per `${...}`). [expression::eval::execute] walks the tree.
//!
//! ### Ordering
//!
//! [manager::ExpressionManager] parses every value of a store snapshot and records which values
//! hold expressions. Paths used in those expressions become edges in a [graph::DependencyGraph]:
//! `john.name` depends on `john.first` if that holds an expression too. Loops are rejected when an
//! edge is added.
//!
//! Evaluating runs vertices in topological order and writes the substituted value back to the
//! store, so later values see the results of earlier ones.
//!
//! ```
//! use confex::{ExpressionManager, FunctionTable, MapStore, Value, Variables};
//!
//! let mut store = MapStore::from_yaml(
//!     "john: {first: john, last: doe, name: '${john:first} ${john:last}'}",
//! )?;
//! let manager = ExpressionManager::new(&store.snapshot(), Variables::new(), FunctionTable::new())?;
//!
//! let name = manager.execute_input("${john:name}", &mut store)?;
//! assert_eq!(name, Value::from("john doe"));
//! # Ok::<(), confex::Error>(())
//! ```
pub mod documents;
pub mod error;
pub mod expression;
pub mod graph;
pub mod manager;
pub mod path;
pub mod store;
pub mod value;
mod visit;

pub use error::{Error, Result};
pub use expression::{FunctionTable, ParamType, ValueProvider, Variables};
pub use manager::ExpressionManager;
pub use path::Path;
pub use store::{MapStore, ValueTarget};
pub use value::Value;
