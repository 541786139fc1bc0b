//! # dnslua: dnscontrol configuration in Lua
//!
//! dnslua lets an operator write DNS zone configuration as a Lua program and
//! generates the `dnscontrol.js` the dnscontrol engine expects, mirroring its
//! JavaScript API one function for one function.
//!
//! ## Pipeline
//!
//! ```text
//! Source → Parser → Evaluator → Document → Finalizer → Snapshot → Serializer → dnscontrol.js
//! ```
//!
//! ### Stage 1: Parsing
//!
//! The [`parser`] module turns Lua (or dnscontrol JavaScript) into the shared
//! [`ast`]. Both front ends are `nom` combinators with line and column
//! tracking.
//!
//! ### Stage 2: Evaluation
//!
//! The [`eval`] module runs the program. Every call into the mirrored API is
//! dispatched through the closed [`directive`] table, whose builders append
//! domains, records and provider registrations to a [`document::Document`].
//! Statements run strictly in source order.
//!
//! ### Stage 3: Finalization
//!
//! [`finalize`] resolves names that were unbound when they were used, checks
//! that domains are unique, and freezes the result into a
//! [`snapshot::Snapshot`].
//!
//! ### Stage 4: Serialization
//!
//! The [`serializer`] renders the snapshot as dnscontrol JavaScript. The same
//! evaluator, configured for [`Syntax::JavaScript`], reads that output back into
//! an equal document.
//!
//! ## Errors
//!
//! Every stage reports through [`Error`]; nothing is written unless the whole
//! pipeline succeeds, and [`output::write_atomic`] commits the result.

pub mod ast;
pub mod config;
pub mod directive;
pub mod document;
pub mod error;
pub mod eval;
pub mod finalize;
pub mod output;
pub mod parser;
pub mod serializer;
pub mod snapshot;

use std::path::Path;

use tracing::instrument;

// Re-exports
pub use error::*;
pub use eval::{Evaluator, FsResolver, MemoryResolver, SourceResolver};
pub use finalize::finalize;
pub use parser::Syntax;
pub use serializer::{Serializer, SerializerConfig};
pub use snapshot::Snapshot;

/// Evaluate and finalize `source`.
pub fn evaluate(evaluator: &Evaluator, source: &str, filename: &str) -> Result<Snapshot> {
    let document = evaluator.evaluate(source, filename)?;
    finalize(&document)
}

/// Run the whole pipeline on an in-memory source and return the generated
/// JavaScript.
#[instrument(level = "debug", skip(evaluator, source, config))]
pub fn transpile(
    evaluator: &Evaluator,
    source: &str,
    filename: &str,
    config: &SerializerConfig,
) -> Result<String> {
    let snapshot = evaluate(evaluator, source, filename)?;
    Ok(Serializer::new(config.clone()).serialize(&snapshot, Some(filename))?)
}

/// Read `input`, transpile it and atomically replace `destination` with the
/// result. The dialect follows the input's extension, defaulting to Lua.
#[instrument(level = "debug", skip(config))]
pub fn transpile_file(input: &Path, destination: &Path, config: &SerializerConfig) -> Result<()> {
    let source = output::read_source(input)?;
    let syntax = Syntax::from_path(input).unwrap_or(Syntax::Lua);
    let filename = input.to_string_lossy();
    let generated = transpile(&Evaluator::new(syntax), &source, &filename, config)?;
    output::write_atomic(destination, &generated)
}
