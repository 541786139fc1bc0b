use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use super::context::Scope;
use super::evaluator::Runtime;
use crate::ast::FunctionBody;
use crate::directive::DirectiveSpec;
use crate::document::{Datum, DirectiveUse, DomainId, ProviderUseEntry, RecordId};
use crate::error::{Result, SourceLocation};
use crate::snapshot::Modifiers;

pub type TableRef = Rc<RefCell<Table>>;

/// Runtime value shared by both dialects.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Table(TableRef),
    Function(Rc<Closure>),
    Builtin(&'static Builtin),
    Directive(&'static DirectiveSpec),
    Record(RecordId),
    Domain(DomainId),
    Modifier(Rc<Modifiers<Datum>>),
    /// `NO_PURGE`, `DefaultTTL(300)` and the other function-style `D` items.
    DomainDirective(Rc<DirectiveUse>),
    Provider(Rc<ProviderUseEntry>),
    /// Pairs produced by `pairs`/`ipairs`, consumed by generic `for`.
    Iterator(Rc<Vec<(Value, Value)>>),
    /// A name that was unbound when it was read.
    Reference(Rc<Unbound>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Unbound {
    pub name: String,
    pub location: SourceLocation,
}

pub struct Closure {
    pub body: Rc<FunctionBody>,
    pub scope: Rc<Scope>,
    pub file: Arc<str>,
}

pub type BuiltinFn = fn(&mut Runtime<'_>, Vec<Value>, &SourceLocation) -> Result<Value>;

/// Builtin that returns several values, like `next` or `select`.
pub type MultiBuiltinFn =
    fn(&mut Runtime<'_>, Vec<Value>, &SourceLocation) -> Result<Vec<Value>>;

pub enum Native {
    One(BuiltinFn),
    Many(MultiBuiltinFn),
}

pub struct Builtin {
    pub name: &'static str,
    pub call: Native,
}

impl Builtin {
    pub const fn one(name: &'static str, call: BuiltinFn) -> Self {
        Self {
            name,
            call: Native::One(call),
        }
    }

    pub const fn many(name: &'static str, call: MultiBuiltinFn) -> Self {
        Self {
            name,
            call: Native::Many(call),
        }
    }

    pub fn invoke(
        &self,
        runtime: &mut Runtime<'_>,
        args: Vec<Value>,
        location: &SourceLocation,
    ) -> Result<Vec<Value>> {
        match self.call {
            Native::One(call) => Ok(vec![call(runtime, args, location)?]),
            Native::Many(call) => call(runtime, args, location),
        }
    }
}

impl Value {
    pub fn string(value: impl Into<String>) -> Self {
        Value::String(value.into())
    }

    pub fn table(table: Table) -> Self {
        Value::Table(Rc::new(RefCell::new(table)))
    }

    /// Kind name used by `type()` and in argument errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) | Value::Float(_) => "number",
            Value::String(_) => "string",
            Value::Table(_) => "table",
            Value::Function(_) | Value::Builtin(_) | Value::Directive(_) => "function",
            Value::Record(_) => "record",
            Value::Domain(_) => "domain",
            Value::Modifier(_) => "modifier",
            Value::DomainDirective(_) => "domain directive",
            Value::Provider(_) => "provider",
            Value::Iterator(_) => "iterator",
            Value::Reference(_) => "reference",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil | Value::Reference(_))
    }

    /// Lua truthiness: only `nil` and `false` are false.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Reference(_) | Value::Boolean(false))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Identity for reference types, value equality otherwise.
    pub fn raw_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nil() && b.is_nil() => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                *a as f64 == *b
            }
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => std::ptr::eq(*a, *b),
            (Value::Directive(a), Value::Directive(b)) => std::ptr::eq(*a, *b),
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Domain(a), Value::Domain(b)) => a == b,
            (Value::Modifier(a), Value::Modifier(b)) => Rc::ptr_eq(a, b),
            (Value::DomainDirective(a), Value::DomainDirective(b)) => Rc::ptr_eq(a, b),
            (Value::Provider(a), Value::Provider(b)) => Rc::ptr_eq(a, b),
            (Value::Iterator(a), Value::Iterator(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(n) => write!(f, "{:?}", n),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Table(t) => write!(f, "table({} entries)", t.borrow().entries.len()),
            Value::Function(c) => match &c.body.name {
                Some(name) => write!(f, "function {}", name),
                None => write!(f, "function"),
            },
            Value::Builtin(b) => write!(f, "builtin {}", b.name),
            Value::Directive(d) => write!(f, "directive {}", d.name),
            Value::Record(id) => write!(f, "{:?}", id),
            Value::Domain(id) => write!(f, "{:?}", id),
            Value::Modifier(m) => write!(f, "modifier {:?}", m),
            Value::DomainDirective(d) => write!(f, "directive use {}", d.name),
            Value::Provider(p) => write!(f, "{:?}", p),
            Value::Iterator(items) => write!(f, "iterator({})", items.len()),
            Value::Reference(r) => write!(f, "reference {}", r.name),
        }
    }
}

/// Lua `tostring` rendering.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil | Value::Reference(_) => write!(f, "nil"),
            Value::String(s) => write!(f, "{}", s),
            Value::Float(n) if n.fract() == 0.0 && n.is_finite() => write!(f, "{:.1}", n),
            Value::Float(n) => write!(f, "{}", n),
            other => write!(f, "{:?}", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Integer(i64),
    String(String),
    Boolean(bool),
}

impl Key {
    /// Integral floats collapse onto integer keys; other values are not
    /// valid keys.
    pub fn from_value(value: &Value) -> Option<Key> {
        match value {
            Value::Integer(i) => Some(Key::Integer(*i)),
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(Key::Integer(*f as i64)),
            Value::String(s) => Some(Key::String(s.clone())),
            Value::Boolean(b) => Some(Key::Boolean(*b)),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Key::Integer(i) => Value::Integer(*i),
            Key::String(s) => Value::String(s.clone()),
            Key::Boolean(b) => Value::Boolean(*b),
        }
    }
}

/// Insertion-ordered table.
#[derive(Default)]
pub struct Table {
    entries: Vec<(Key, Value)>,
    index: HashMap<Key, usize>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sequence(values: impl IntoIterator<Item = Value>) -> Self {
        let mut table = Table::new();
        for value in values {
            table.push(value);
        }
        table
    }

    pub fn get(&self, key: &Key) -> Value {
        self.index
            .get(key)
            .map(|&i| self.entries[i].1.clone())
            .unwrap_or_default()
    }

    /// Assigning nil removes the key. Deferred references are kept so they
    /// can reach the document.
    pub fn set(&mut self, key: Key, value: Value) {
        if matches!(value, Value::Nil) {
            if let Some(position) = self.index.remove(&key) {
                self.entries.remove(position);
                self.reindex();
            }
            return;
        }
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    fn reindex(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, (k, _))| (k.clone(), i))
            .collect();
    }

    /// Border of the sequence part: count of contiguous integer keys from 1.
    pub fn len(&self) -> i64 {
        let mut n = 0;
        while self.index.contains_key(&Key::Integer(n + 1)) {
            n += 1;
        }
        n
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, value: Value) {
        let next = self.len() + 1;
        self.set(Key::Integer(next), value);
    }

    /// `table.insert(t, pos, v)`: shifts the tail of the sequence up.
    pub fn insert_at(&mut self, position: i64, value: Value) {
        let len = self.len();
        let mut i = len;
        while i >= position {
            let moved = self.get(&Key::Integer(i));
            self.set(Key::Integer(i + 1), moved);
            i -= 1;
        }
        self.set(Key::Integer(position), value);
    }

    pub fn entries(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// Insertion position of `key`.
    pub fn position(&self, key: &Key) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn entry_at(&self, position: usize) -> Option<(Key, Value)> {
        self.entries.get(position).cloned()
    }

    /// Values of the sequence part in order.
    pub fn sequence(&self) -> Vec<Value> {
        (1..=self.len()).map(|i| self.get(&Key::Integer(i))).collect()
    }

    /// Every key is an integer of the sequence `1..=n`.
    pub fn is_array(&self) -> bool {
        self.len() as usize == self.entries.len()
    }

    /// Every key is a string.
    pub fn is_map(&self) -> bool {
        self.entries.iter().all(|(k, _)| matches!(k, Key::String(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_preserves_insertion_order() {
        let mut table = Table::new();
        table.set(Key::String("b".into()), Value::Integer(1));
        table.set(Key::String("a".into()), Value::Integer(2));
        table.set(Key::String("b".into()), Value::Integer(3));
        let keys: Vec<_> = table.entries().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec![Key::String("b".into()), Key::String("a".into())]);
        assert!(table.is_map());
        assert!(!table.is_array());
    }

    #[test]
    fn test_nil_assignment_removes_key() {
        let mut table = Table::from_sequence(vec![Value::Integer(1), Value::Integer(2)]);
        table.set(Key::Integer(1), Value::Nil);
        assert_eq!(table.len(), 0);
        assert!(table.get(&Key::Integer(2)).raw_equals(&Value::Integer(2)));
    }

    #[test]
    fn test_insert_at_shifts_sequence() {
        let mut table = Table::from_sequence(vec![Value::string("a"), Value::string("c")]);
        table.insert_at(2, Value::string("b"));
        let values: Vec<String> = table.sequence().iter().map(|v| v.to_string()).collect();
        assert_eq!(values, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_positions_follow_insertion_order() {
        let mut table = Table::new();
        table.set(Key::String("b".into()), Value::Integer(1));
        table.set(Key::String("a".into()), Value::Integer(2));
        assert_eq!(table.position(&Key::String("a".into())), Some(1));
        assert_eq!(table.entry_at(0).map(|(k, _)| k), Some(Key::String("b".into())));
        assert!(table.entry_at(2).is_none());
        assert!(table.position(&Key::Integer(9)).is_none());
    }

    #[test]
    fn test_float_keys_collapse_to_integers() {
        assert_eq!(Key::from_value(&Value::Float(2.0)), Some(Key::Integer(2)));
        assert_eq!(Key::from_value(&Value::Float(2.5)), None);
        assert_eq!(Key::from_value(&Value::Nil), None);
    }

    #[test]
    fn test_truthiness_and_equality() {
        assert!(!Value::Nil.is_truthy());
        assert!(Value::Integer(0).is_truthy());
        assert!(Value::Integer(1).raw_equals(&Value::Float(1.0)));
        let t = Value::table(Table::new());
        assert!(t.raw_equals(&t.clone()));
        assert!(!t.raw_equals(&Value::table(Table::new())));
    }
}
