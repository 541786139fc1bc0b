use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::Arc;

use super::value::Value;
use crate::ast::Location;
use crate::error::SourceLocation;

/// One level of lexical scope. The root of every chain holds the globals.
#[derive(Default)]
pub struct Scope {
    vars: RefCell<HashMap<String, Value>>,
    /// Names declared `<const>` / `const` in this scope.
    constants: RefCell<HashSet<String>>,
    parent: Option<Rc<Scope>>,
}

impl Scope {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn with_parent(parent: &Rc<Scope>) -> Rc<Self> {
        Rc::new(Self {
            parent: Some(Rc::clone(parent)),
            ..Self::default()
        })
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.vars.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.lookup(name))
    }

    /// Bind in this scope, shadowing outer bindings.
    pub fn declare(&self, name: impl Into<String>, value: Value) {
        let name = name.into();
        self.constants.borrow_mut().remove(&name);
        self.vars.borrow_mut().insert(name, value);
    }

    /// Bind a name that later assignments may not change.
    pub fn declare_const(&self, name: impl Into<String>, value: Value) {
        let name = name.into();
        self.vars.borrow_mut().insert(name.clone(), value);
        self.constants.borrow_mut().insert(name);
    }

    /// Update the nearest binding; unbound names become globals. Returns
    /// false, leaving the value alone, when that binding is a constant.
    #[must_use]
    pub fn assign(&self, name: &str, value: Value) -> bool {
        if self.vars.borrow().contains_key(name) || self.parent.is_none() {
            if self.constants.borrow().contains(name) {
                return false;
            }
            self.vars.borrow_mut().insert(name.to_string(), value);
            return true;
        }
        match &self.parent {
            Some(parent) => parent.assign(name, value),
            None => true,
        }
    }

    /// Snapshot of the bindings held directly by this scope.
    pub fn bindings(&self) -> Vec<(String, Value)> {
        let vars = self.vars.borrow();
        let mut bindings: Vec<_> = vars.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        bindings.sort_by(|a, b| a.0.cmp(&b.0));
        bindings
    }
}

/// Where evaluation currently is: the innermost scope and the unit being run.
#[derive(Clone)]
pub struct ExecutionContext {
    pub scope: Rc<Scope>,
    pub file: Arc<str>,
    /// Extra arguments `...` expands to; `None` outside vararg functions.
    pub varargs: Option<Rc<Vec<Value>>>,
}

impl ExecutionContext {
    pub fn new(scope: Rc<Scope>, file: Arc<str>) -> Self {
        Self {
            scope,
            file,
            varargs: None,
        }
    }

    pub fn with_varargs(mut self, varargs: Vec<Value>) -> Self {
        self.varargs = Some(Rc::new(varargs));
        self
    }

    /// Context for a nested block.
    pub fn child(&self) -> Self {
        Self {
            scope: Scope::with_parent(&self.scope),
            file: Arc::clone(&self.file),
            varargs: self.varargs.clone(),
        }
    }

    pub fn at(&self, location: Location) -> SourceLocation {
        SourceLocation::new(Arc::clone(&self.file), location.line, location.column)
    }
}
