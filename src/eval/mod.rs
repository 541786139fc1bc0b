//! dnslua Evaluation System
//!
//! Executes a parsed program, in either dialect, and accumulates the
//! [`Document`](crate::document::Document) its directive calls build.
//!
//! # Core Components
//!
//! ## Evaluator
//! Entry point. Parses the source, installs the directive table and the
//! standard library as globals, runs the chunk and captures the final
//! top-level bindings for the finalizer.
//!
//! ## Statement / Expression
//! Tree-walking execution of the shared AST. Dialect differences
//! (truthiness, `+`, `/`, `%`, `#`/`.length`) are switched on the
//! [`Syntax`](crate::parser::Syntax) of the run.
//!
//! ## Execution Context
//! Lexical scope chain rooted at the globals, plus the name of the unit being
//! run for source locations.
//!
//! ## Builtins
//! `print`, `type`, `tostring`, `tonumber`, `pairs`, `ipairs`, `error`,
//! `assert`, and the `table` / `string` libraries.
//!
//! # Deferred names
//!
//! Reading an unbound name yields [`Value::Reference`]. Directives store it in
//! the document and the finalizer resolves it against the captured bindings.

pub mod builtins;
pub mod context;
pub mod evaluator;
pub mod expression;
pub mod statement;
pub mod value;

pub use evaluator::{Evaluator, FsResolver, MemoryResolver, SourceResolver, SourceUnit};
pub use value::Value;
