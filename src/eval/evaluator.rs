use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use super::builtins;
use super::context::{ExecutionContext, Scope};
use super::statement::Flow;
use super::value::{Key, TableRef, Value};
use crate::ast::Chunk;
use crate::directive::{self, ArgKind, Host};
use crate::document::{Binding, Datum, Document, Reference, Slot};
use crate::error::{DslError, Error, Result, SourceLocation};
use crate::output;
use crate::parser::{self, Syntax};
use crate::snapshot::Modifiers;

/// Nesting limit for function calls and includes.
const MAX_DEPTH: usize = 100;

/// A source unit loaded for `require`.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    /// Canonical name, used in locations and for cycle detection.
    pub name: String,
    pub source: String,
}

/// Locates the units pulled in by `require`.
pub trait SourceResolver {
    fn load(&self, path: &str, including: &str) -> Result<SourceUnit>;
}

/// Resolves paths relative to the directory of the including file.
#[derive(Debug, Clone, Default)]
pub struct FsResolver;

impl SourceResolver for FsResolver {
    fn load(&self, path: &str, including: &str) -> Result<SourceUnit> {
        let requested = Path::new(path);
        let full: PathBuf = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            Path::new(including)
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join(requested)
        };
        let source = output::read_source(&full)?;
        Ok(SourceUnit {
            name: full.to_string_lossy().into_owned(),
            source,
        })
    }
}

/// In-memory units keyed by the exact path passed to `require`.
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    units: HashMap<String, String>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unit(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.units.insert(name.into(), source.into());
        self
    }
}

impl SourceResolver for MemoryResolver {
    fn load(&self, path: &str, _including: &str) -> Result<SourceUnit> {
        match self.units.get(path) {
            Some(source) => Ok(SourceUnit {
                name: path.to_string(),
                source: source.clone(),
            }),
            None => Err(Error::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such source unit"),
            )),
        }
    }
}

/// Runs a program in either dialect and returns the document it built.
pub struct Evaluator {
    syntax: Syntax,
    resolver: Box<dyn SourceResolver>,
}

impl Evaluator {
    pub fn new(syntax: Syntax) -> Self {
        Self {
            syntax,
            resolver: Box::new(FsResolver),
        }
    }

    pub fn with_resolver(mut self, resolver: impl SourceResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn syntax(&self) -> Syntax {
        self.syntax
    }

    /// Evaluate `source` top to bottom. Statements run strictly in order.
    #[instrument(level = "debug", skip(self, source))]
    pub fn evaluate(&self, source: &str, filename: &str) -> Result<Document> {
        let chunk = parser::parse(source, filename, self.syntax)?;
        let mut runtime = Runtime::new(self.syntax, self.resolver.as_ref());
        runtime.install_globals(filename)?;
        runtime.includes.push(filename.to_string());

        let scope = Scope::with_parent(&runtime.globals);
        let context = ExecutionContext::new(scope, Arc::from(filename)).with_varargs(Vec::new());
        runtime.run_chunk(&chunk, &context)?;
        runtime.capture_bindings(&context.scope);

        let document = runtime.document;
        info!(
            domains = document.domains().len(),
            records = document.records().len(),
            "evaluated {}",
            filename
        );
        Ok(document)
    }
}

/// Interpreter state for one evaluation pass.
pub struct Runtime<'a> {
    pub(crate) syntax: Syntax,
    resolver: &'a dyn SourceResolver,
    document: Document,
    globals: Rc<Scope>,
    includes: Vec<String>,
    depth: usize,
}

impl<'a> Runtime<'a> {
    fn new(syntax: Syntax, resolver: &'a dyn SourceResolver) -> Self {
        Self {
            syntax,
            resolver,
            document: Document::new(),
            globals: Scope::new(),
            includes: Vec::new(),
            depth: 0,
        }
    }

    /// Directives, predefined modifiers and the standard library.
    fn install_globals(&mut self, filename: &str) -> Result<()> {
        let location = SourceLocation::new(filename, 0, 0);
        for spec in directive::all() {
            let value = if spec.is_constant() {
                directive::invoke(self, spec, vec![], &location)?
            } else {
                Value::Directive(spec)
            };
            self.globals.declare(spec.name, value);
        }
        builtins::install(&self.globals);
        Ok(())
    }

    /// A chunk is a vararg function; its `...` is empty.
    fn run_chunk(&mut self, chunk: &Chunk, context: &ExecutionContext) -> Result<Vec<Value>> {
        match self.exec_block(&chunk.block, context)? {
            Flow::Normal => Ok(Vec::new()),
            Flow::Return(values) => Ok(values),
            Flow::Break(location) => {
                Err(DslError::runtime("break outside a loop", &context.at(location)).into())
            }
        }
    }

    /// Guard against runaway recursion.
    pub(crate) fn enter(&mut self, location: &SourceLocation) -> Result<()> {
        if self.depth >= MAX_DEPTH {
            return Err(DslError::runtime("stack overflow", location).into());
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Record the final top-level bindings for the finalizer. Locals of the
    /// entry unit shadow globals of the same name.
    fn capture_bindings(&mut self, top: &Scope) {
        let mut captured = self.globals.bindings();
        captured.extend(top.bindings());
        for (name, value) in captured {
            if let Some(binding) = binding_for(&name, &value) {
                self.document.bind(name, binding);
            }
        }
    }
}

impl Host for Runtime<'_> {
    fn document(&mut self) -> &mut Document {
        &mut self.document
    }

    fn include(&mut self, path: &str, location: &SourceLocation) -> Result<Value> {
        let unit = self.resolver.load(path, &location.file)?;
        if self.includes.contains(&unit.name) {
            return Err(DslError::IncludeCycle {
                name: unit.name,
                location: location.clone(),
            }
            .into());
        }
        debug!(unit = %unit.name, "include");
        let chunk = parser::parse(&unit.source, &unit.name, self.syntax)?;

        self.enter(location)?;
        self.includes.push(unit.name.clone());
        let context = ExecutionContext::new(
            Scope::with_parent(&self.globals),
            Arc::from(unit.name.as_str()),
        )
        .with_varargs(Vec::new());
        let result = self.run_chunk(&chunk, &context);
        self.includes.pop();
        self.leave();
        Ok(result?.into_iter().next().unwrap_or_default())
    }
}

fn binding_for(name: &str, value: &Value) -> Option<Binding> {
    match value {
        Value::Nil | Value::Builtin(_) | Value::Directive(_) => None,
        Value::Reference(unbound) => Some(Binding::Alias(unbound.name.clone())),
        other => Some(match datum_of(name, other, &mut Vec::new()) {
            Some(datum) => Binding::Datum(datum),
            None => Binding::Opaque(other.kind()),
        }),
    }
}

/// Document form of a bound value, if it has one.
fn datum_of(name: &str, value: &Value, visited: &mut Vec<TableRef>) -> Option<Datum> {
    match value {
        Value::String(s) => Some(Datum::String(s.clone())),
        Value::Integer(i) => Some(Datum::Integer(*i)),
        Value::Float(f) => Some(Datum::Float(*f)),
        Value::Boolean(b) => Some(Datum::Boolean(*b)),
        Value::Modifier(modifiers) => Some(Datum::Map((**modifiers).clone())),
        Value::Reference(unbound) => Some(Datum::Reference(Reference {
            name: unbound.name.clone(),
            location: unbound.location.clone(),
            slot: Slot {
                directive: name.to_string(),
                index: 1,
                expected: ArgKind::ModifierValue,
            },
        })),
        Value::Table(table) => {
            if visited.iter().any(|seen| Rc::ptr_eq(seen, table)) || !table.borrow().is_map() {
                return None;
            }
            visited.push(Rc::clone(table));
            let entries: Vec<(Key, Value)> = table
                .borrow()
                .entries()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let mut modifiers = Modifiers::new();
            for (key, value) in entries {
                let Key::String(key) = key else {
                    return None;
                };
                modifiers.set(key, datum_of(name, &value, visited)?);
            }
            visited.pop();
            Some(Datum::Map(modifiers))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluate(source: &str) -> Result<Document> {
        Evaluator::new(Syntax::Lua).evaluate(source, "test.lua")
    }

    #[test]
    fn test_evaluate_builds_document_in_order() {
        let document = evaluate(
            r#"
            D("example.com", "none",
                A("www", "1.2.3.4"),
                CNAME("blog", "www"),
                MX("@", 10, "mail.example.com.")
            )
            "#,
        )
        .unwrap();
        let domain = &document.domains()[0];
        let types: Vec<String> = domain
            .records
            .iter()
            .map(|id| document.record(*id).record_type.to_string())
            .collect();
        assert_eq!(types, vec!["A", "CNAME", "MX"]);
    }

    #[test]
    fn test_unknown_directive_carries_name_and_line() {
        let err = evaluate("local x = 1\n\n\n\n\n\nbogus(\"x\")\n").unwrap_err();
        match err {
            Error::Dsl(DslError::UnknownDirective { name, location }) => {
                assert_eq!(name, "bogus");
                assert_eq!(location.line, 7);
            }
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn test_include_shares_globals() {
        let resolver = MemoryResolver::new().with_unit(
            "common.lua",
            r#"
            WEB = "10.0.0.1"
            local hidden = 1
            return { ttl = 300 }
            "#,
        );
        let document = Evaluator::new(Syntax::Lua)
            .with_resolver(resolver)
            .evaluate(
                r#"
                local defaults = require("common.lua")
                D("example.com", "none", A("www", WEB, defaults), A("h", tostring(hidden)))
                "#,
                "main.lua",
            )
            .unwrap();
        let record = document.record(document.domains()[0].records[0]);
        assert_eq!(record.fields[1], Datum::String("10.0.0.1".into()));
        assert_eq!(record.modifiers.get("ttl"), Some(&Datum::Integer(300)));
        let hidden = document.record(document.domains()[0].records[1]);
        assert_eq!(hidden.fields[1], Datum::String("nil".into()));
    }

    #[test]
    fn test_include_cycle_is_detected() {
        let resolver = MemoryResolver::new()
            .with_unit("a.lua", "require('b.lua')")
            .with_unit("b.lua", "require('a.lua')");
        let err = Evaluator::new(Syntax::Lua)
            .with_resolver(resolver)
            .evaluate("require('a.lua')", "main.lua")
            .unwrap_err();
        match err {
            Error::Dsl(DslError::IncludeCycle { name, location }) => {
                assert_eq!(name, "a.lua");
                assert_eq!(&*location.file, "b.lua");
            }
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn test_missing_include_is_io_error() {
        let err = Evaluator::new(Syntax::Lua)
            .with_resolver(MemoryResolver::new())
            .evaluate("require('nope.lua')", "main.lua")
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_stack_depth_is_bounded() {
        // unoptimized frames are large; give the interpreter a main-thread sized stack
        let handle = std::thread::Builder::new()
            .stack_size(16 * 1024 * 1024)
            .spawn(|| {
                evaluate("local function f() return f() end\nf()")
                    .unwrap_err()
                    .to_string()
            })
            .unwrap();
        assert!(handle.join().unwrap().contains("stack overflow"));
    }

    #[test]
    fn test_bindings_are_captured() {
        let document = evaluate(
            r#"
            WEB_IP = "1.2.3.4"
            local port = 443
            OPTS = { ttl = 60 }
            ALIASED = LATER
            "#,
        )
        .unwrap();
        assert_eq!(
            document.binding("WEB_IP"),
            Some(&Binding::Datum(Datum::String("1.2.3.4".into())))
        );
        assert_eq!(
            document.binding("port"),
            Some(&Binding::Datum(Datum::Integer(443)))
        );
        assert!(matches!(
            document.binding("OPTS"),
            Some(Binding::Datum(Datum::Map(_)))
        ));
        assert_eq!(
            document.binding("ALIASED"),
            Some(&Binding::Alias("LATER".into()))
        );
        assert!(document.binding("print").is_none());
    }
}
