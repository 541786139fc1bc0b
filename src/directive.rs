//! The mirrored engine API as a closed table.
//!
//! Every directive declares its argument shape; [`invoke`] validates the
//! evaluated arguments against it and hands typed [`Arg`]s to the builder.
//! Builders are the only code that mutates the [`Document`].

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::rc::Rc;

use lazy_static::lazy_static;
use tracing::debug;

use crate::document::{
    Datum, DirectiveUse, Document, DomainItem, ProviderUseEntry, Reference, Registration, Slot,
};
use crate::error::{DslError, Result, SourceLocation};
use crate::eval::value::{TableRef, Value};
use crate::serializer::SerializationError;
use crate::snapshot::{Field, Modifiers, ProviderRole, RecordType};

/// Accepted shape of one argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    String,
    Number,
    /// IPv4 address as text or as the number `IP()` returns.
    Address,
    /// Provider configuration table.
    Config,
    /// Modifier value or string-keyed table; nil is skipped.
    Modifier,
    /// Anything `D` accepts: records, modifiers, provider uses, lists of those.
    Item,
    /// Entry of a modifier mapping.
    ModifierValue,
}

impl ArgKind {
    pub fn describe(self) -> &'static str {
        match self {
            ArgKind::String => "string",
            ArgKind::Number => "number",
            ArgKind::Address => "IPv4 address",
            ArgKind::Config => "table",
            ArgKind::Modifier => "modifier mapping",
            ArgKind::Item => "record, modifier or provider",
            ArgKind::ModifierValue => "string, number, boolean or table",
        }
    }

    /// Whether a resolved reference fits the slot it was passed for.
    pub fn accepts(self, field: &Field) -> bool {
        match self {
            ArgKind::String => matches!(field, Field::String(_)),
            ArgKind::Number => matches!(field, Field::Integer(_) | Field::Float(_)),
            ArgKind::Address => match field {
                Field::String(_) => true,
                Field::Integer(i) => u32::try_from(*i).is_ok(),
                _ => false,
            },
            ArgKind::Config | ArgKind::Modifier => matches!(field, Field::Map(_)),
            ArgKind::Item => false,
            ArgKind::ModifierValue => true,
        }
    }

    /// Canonical form of an accepted value: addresses given as numbers
    /// become dotted quads.
    pub fn normalize(self, field: Field) -> Field {
        match (self, field) {
            (ArgKind::Address, Field::Integer(i)) => match u32::try_from(i) {
                Ok(bits) => Field::String(Ipv4Addr::from(bits).to_string()),
                Err(_) => Field::Integer(i),
            },
            (_, field) => field,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Param {
    pub name: &'static str,
    pub kind: ArgKind,
    pub optional: bool,
}

impl Param {
    const fn required(name: &'static str, kind: ArgKind) -> Self {
        Self {
            name,
            kind,
            optional: false,
        }
    }

    const fn optional(name: &'static str, kind: ArgKind) -> Self {
        Self {
            name,
            kind,
            optional: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constant {
    Str(&'static str),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DirectiveKind {
    Domain,
    Record(RecordType),
    /// Builds a single-key modifier from its argument.
    Modifier(&'static str),
    /// Predefined modifier bound as a global value.
    Constant(&'static str, Constant),
    /// Bare domain item bound as a global value, e.g. `NO_PURGE`.
    DomainFlag,
    /// Domain item written as a call, e.g. `DefaultTTL(300)`.
    DomainModifier,
    Registration(ProviderRole),
    ProviderUse,
    Include,
    /// Plain function computing a value, e.g. `IP()`.
    Helper,
}

pub(crate) type Builder = fn(&mut dyn Host, &Call<'_>, Args) -> Result<Value>;

pub struct DirectiveSpec {
    pub name: &'static str,
    pub params: &'static [Param],
    /// Kind of the variadic tail, if any.
    pub rest: Option<ArgKind>,
    pub kind: DirectiveKind,
    build: Builder,
}

impl std::fmt::Debug for DirectiveSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectiveSpec")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

impl DirectiveSpec {
    fn required(&self) -> usize {
        self.params.iter().filter(|p| !p.optional).count()
    }

    /// Human readable arity, e.g. `2`, `1 to 3`, `at least 2`.
    pub fn arity(&self) -> String {
        let required = self.required();
        match (self.rest, self.params.len()) {
            (Some(_), _) => format!("at least {}", required),
            (None, max) if max == required => required.to_string(),
            (None, max) => format!("{} to {}", required, max),
        }
    }

    pub fn is_modifier(&self) -> bool {
        matches!(
            self.kind,
            DirectiveKind::Modifier(_) | DirectiveKind::Constant(..)
        )
    }

    /// Bound to its value instead of to itself when globals are installed.
    pub fn is_constant(&self) -> bool {
        matches!(
            self.kind,
            DirectiveKind::Constant(..) | DirectiveKind::DomainFlag
        )
    }
}

/// What builders may touch while a program runs.
pub(crate) trait Host {
    fn document(&mut self) -> &mut Document;
    fn include(&mut self, path: &str, location: &SourceLocation) -> Result<Value>;
}

pub(crate) struct Call<'a> {
    pub spec: &'static DirectiveSpec,
    pub location: &'a SourceLocation,
}

impl Call<'_> {
    fn slot(&self, index: usize, expected: ArgKind) -> Slot {
        Slot {
            directive: self.spec.name.to_string(),
            index,
            expected,
        }
    }

    fn argument_type(&self, index: usize, expected: ArgKind, received: &str) -> DslError {
        DslError::ArgumentType {
            directive: self.spec.name.to_string(),
            index,
            expected: expected.describe().to_string(),
            received: received.to_string(),
            location: self.location.clone(),
        }
    }

    fn malformed(&self) -> DslError {
        DslError::runtime(
            format!("malformed arguments for {}", self.spec.name),
            self.location,
        )
    }
}

/// A validated argument.
#[derive(Debug)]
pub(crate) enum Arg {
    Absent,
    Datum(Datum),
    Modifiers(Modifiers<Datum>),
    Items(Vec<DomainItem>),
}

/// Validated arguments in parameter order, variadic tail last.
pub(crate) struct Args {
    values: std::vec::IntoIter<Arg>,
}

impl Args {
    fn datum(&mut self) -> Option<Datum> {
        match self.values.next() {
            Some(Arg::Datum(datum)) => Some(datum),
            _ => None,
        }
    }

    fn modifiers(&mut self) -> Option<Modifiers<Datum>> {
        match self.values.next() {
            Some(Arg::Modifiers(modifiers)) => Some(modifiers),
            _ => None,
        }
    }

    /// Remaining modifier arguments merged in order.
    fn merged_modifiers(self) -> Modifiers<Datum> {
        let mut merged = Modifiers::new();
        for arg in self.values {
            if let Arg::Modifiers(modifiers) = arg {
                merged.merge(modifiers);
            }
        }
        merged
    }

    /// Remaining arguments with trailing absent ones dropped.
    fn optional_datums(self) -> Vec<Option<Datum>> {
        let mut datums: Vec<Option<Datum>> = self
            .values
            .map(|arg| match arg {
                Arg::Datum(datum) => Some(datum),
                _ => None,
            })
            .collect();
        while datums.last().is_some_and(Option::is_none) {
            datums.pop();
        }
        datums
    }

    fn items(self) -> Vec<DomainItem> {
        self.values
            .flat_map(|arg| match arg {
                Arg::Items(items) => items,
                _ => Vec::new(),
            })
            .collect()
    }
}

const NAME: Param = Param::required("name", ArgKind::String);
const TARGET: Param = Param::required("target", ArgKind::String);

const NAME_TARGET: &[Param] = &[NAME, TARGET];
const A_PARAMS: &[Param] = &[NAME, Param::required("address", ArgKind::Address)];
const MX_PARAMS: &[Param] = &[NAME, Param::required("priority", ArgKind::Number), TARGET];
const TXT_PARAMS: &[Param] = &[NAME, Param::required("text", ArgKind::String)];
const SRV_PARAMS: &[Param] = &[
    NAME,
    Param::required("priority", ArgKind::Number),
    Param::required("weight", ArgKind::Number),
    Param::required("port", ArgKind::Number),
    TARGET,
];
const CAA_PARAMS: &[Param] = &[
    NAME,
    Param::required("tag", ArgKind::String),
    Param::required("value", ArgKind::String),
];
const TLSA_PARAMS: &[Param] = &[
    NAME,
    Param::required("usage", ArgKind::Number),
    Param::required("selector", ArgKind::Number),
    Param::required("matching_type", ArgKind::Number),
    Param::required("certificate", ArgKind::String),
];
const SSHFP_PARAMS: &[Param] = &[
    NAME,
    Param::required("algorithm", ArgKind::Number),
    Param::required("fingerprint_type", ArgKind::Number),
    Param::required("fingerprint", ArgKind::String),
];
const DS_PARAMS: &[Param] = &[
    NAME,
    Param::required("key_tag", ArgKind::Number),
    Param::required("algorithm", ArgKind::Number),
    Param::required("digest_type", ArgKind::Number),
    Param::required("digest", ArgKind::String),
];
const NAPTR_PARAMS: &[Param] = &[
    NAME,
    Param::required("order", ArgKind::Number),
    Param::required("preference", ArgKind::Number),
    Param::required("flags", ArgKind::String),
    Param::required("service", ArgKind::String),
    Param::required("regexp", ArgKind::String),
    TARGET,
];
const SOA_PARAMS: &[Param] = &[
    NAME,
    Param::required("nameserver", ArgKind::String),
    Param::required("mailbox", ArgKind::String),
    Param::required("refresh", ArgKind::Number),
    Param::required("retry", ArgKind::Number),
    Param::required("expire", ArgKind::Number),
    Param::required("minimum", ArgKind::Number),
];
const SVCB_PARAMS: &[Param] = &[
    NAME,
    Param::required("priority", ArgKind::Number),
    TARGET,
    Param::required("params", ArgKind::String),
];
const DOMAIN_PARAMS: &[Param] = &[NAME, Param::required("registrar", ArgKind::String)];
const TTL_PARAMS: &[Param] = &[Param::required("ttl", ArgKind::Number)];
const NAMESERVER_PARAMS: &[Param] = &[NAME];
const IGNORE_NAME_PARAMS: &[Param] = &[
    Param::required("pattern", ArgKind::String),
    Param::optional("types", ArgKind::String),
];
const IGNORE_TARGET_PARAMS: &[Param] = &[
    Param::required("pattern", ArgKind::String),
    Param::required("type", ArgKind::String),
];
const IGNORE_PARAMS: &[Param] = &[
    Param::required("labels", ArgKind::String),
    Param::optional("types", ArgKind::String),
    Param::optional("targets", ArgKind::String),
];
const IP_PARAMS: &[Param] = &[Param::required("address", ArgKind::String)];
const REGISTRATION_PARAMS: &[Param] = &[
    NAME,
    Param::optional("type", ArgKind::String),
    Param::optional("config", ArgKind::Config),
];
const PROVIDER_USE_PARAMS: &[Param] = &[
    NAME,
    Param::optional("nameserver_count", ArgKind::Number),
];
const INCLUDE_PARAMS: &[Param] = &[Param::required("path", ArgKind::String)];

macro_rules! record {
    ($name:literal, $rtype:ident, $params:expr) => {
        DirectiveSpec {
            name: $name,
            params: $params,
            rest: Some(ArgKind::Modifier),
            kind: DirectiveKind::Record(RecordType::$rtype),
            build: build_record,
        }
    };
}

macro_rules! constant {
    ($name:literal, $key:literal, $value:expr) => {
        DirectiveSpec {
            name: $name,
            params: &[],
            rest: None,
            kind: DirectiveKind::Constant($key, $value),
            build: build_constant,
        }
    };
}

macro_rules! domain_flag {
    ($name:literal) => {
        DirectiveSpec {
            name: $name,
            params: &[],
            rest: None,
            kind: DirectiveKind::DomainFlag,
            build: build_domain_directive,
        }
    };
}

macro_rules! domain_modifier {
    ($name:literal, $params:expr) => {
        DirectiveSpec {
            name: $name,
            params: $params,
            rest: None,
            kind: DirectiveKind::DomainModifier,
            build: build_domain_directive,
        }
    };
}

static DIRECTIVES: &[DirectiveSpec] = &[
    DirectiveSpec {
        name: "D",
        params: DOMAIN_PARAMS,
        rest: Some(ArgKind::Item),
        kind: DirectiveKind::Domain,
        build: build_domain,
    },
    record!("A", A, A_PARAMS),
    record!("AAAA", AAAA, NAME_TARGET),
    record!("CNAME", CNAME, NAME_TARGET),
    record!("ALIAS", ALIAS, NAME_TARGET),
    record!("DNAME", DNAME, NAME_TARGET),
    record!("NS", NS, NAME_TARGET),
    record!("PTR", PTR, NAME_TARGET),
    record!("MX", MX, MX_PARAMS),
    record!("TXT", TXT, TXT_PARAMS),
    record!("SRV", SRV, SRV_PARAMS),
    record!("CAA", CAA, CAA_PARAMS),
    record!("TLSA", TLSA, TLSA_PARAMS),
    record!("SSHFP", SSHFP, SSHFP_PARAMS),
    record!("DS", DS, DS_PARAMS),
    record!("NAPTR", NAPTR, NAPTR_PARAMS),
    record!("SOA", SOA, SOA_PARAMS),
    record!("HTTPS", HTTPS, SVCB_PARAMS),
    record!("SVCB", SVCB, SVCB_PARAMS),
    DirectiveSpec {
        name: "TTL",
        params: TTL_PARAMS,
        rest: None,
        kind: DirectiveKind::Modifier("ttl"),
        build: build_modifier,
    },
    constant!("CF_PROXY_ON", "cloudflare_proxy", Constant::Str("on")),
    constant!("CF_PROXY_OFF", "cloudflare_proxy", Constant::Str("off")),
    constant!("CF_PROXY_FULL", "cloudflare_proxy", Constant::Str("full")),
    constant!("CAA_CRITICAL", "caa_critical", Constant::Bool(true)),
    domain_flag!("NO_PURGE"),
    domain_flag!("PURGE"),
    domain_flag!("AUTODNSSEC_ON"),
    domain_flag!("AUTODNSSEC_OFF"),
    domain_flag!("DISABLE_IGNORE_SAFETY_CHECK"),
    domain_modifier!("DefaultTTL", TTL_PARAMS),
    domain_modifier!("NAMESERVER_TTL", TTL_PARAMS),
    domain_modifier!("NAMESERVER", NAMESERVER_PARAMS),
    domain_modifier!("IGNORE_NAME", IGNORE_NAME_PARAMS),
    domain_modifier!("IGNORE_TARGET", IGNORE_TARGET_PARAMS),
    domain_modifier!("IGNORE", IGNORE_PARAMS),
    DirectiveSpec {
        name: "IP",
        params: IP_PARAMS,
        rest: None,
        kind: DirectiveKind::Helper,
        build: build_ip,
    },
    DirectiveSpec {
        name: "NewRegistrar",
        params: REGISTRATION_PARAMS,
        rest: None,
        kind: DirectiveKind::Registration(ProviderRole::Registrar),
        build: build_registration,
    },
    DirectiveSpec {
        name: "NewDnsProvider",
        params: REGISTRATION_PARAMS,
        rest: None,
        kind: DirectiveKind::Registration(ProviderRole::DnsProvider),
        build: build_registration,
    },
    DirectiveSpec {
        name: "DnsProvider",
        params: PROVIDER_USE_PARAMS,
        rest: None,
        kind: DirectiveKind::ProviderUse,
        build: build_provider_use,
    },
    DirectiveSpec {
        name: "require",
        params: INCLUDE_PARAMS,
        rest: None,
        kind: DirectiveKind::Include,
        build: build_include,
    },
];

lazy_static! {
    static ref INDEX: HashMap<&'static str, &'static DirectiveSpec> =
        DIRECTIVES.iter().map(|spec| (spec.name, spec)).collect();
}

pub fn lookup(name: &str) -> Option<&'static DirectiveSpec> {
    INDEX.get(name).copied()
}

pub fn all() -> &'static [DirectiveSpec] {
    DIRECTIVES
}

/// Validate `args` against `spec` and run its builder.
pub(crate) fn invoke(
    host: &mut dyn Host,
    spec: &'static DirectiveSpec,
    args: Vec<Value>,
    location: &SourceLocation,
) -> Result<Value> {
    let received = args.len();
    if received < spec.required() || (spec.rest.is_none() && received > spec.params.len()) {
        return Err(DslError::ArgumentCount {
            directive: spec.name.to_string(),
            expected: spec.arity(),
            received,
            location: location.clone(),
        }
        .into());
    }

    let call = Call { spec, location };
    let mut converted = Vec::with_capacity(received.max(spec.params.len()));
    for (i, value) in args.into_iter().enumerate() {
        let (kind, optional) = match (spec.params.get(i), spec.rest) {
            (Some(param), _) => (param.kind, param.optional),
            (None, Some(kind)) => (kind, true),
            (None, None) => break,
        };
        converted.push(convert(&call, i + 1, kind, optional, value)?);
    }
    while converted.len() < spec.params.len() {
        converted.push(Arg::Absent);
    }

    debug!(directive = spec.name, arguments = received, "invoke");
    let args = Args {
        values: converted.into_iter(),
    };
    (spec.build)(host, &call, args)
}

/// `target:Method(...)`: apply a modifier directive to a record in place.
pub(crate) fn apply_method(
    host: &mut dyn Host,
    target: &Value,
    spec: &'static DirectiveSpec,
    args: Vec<Value>,
    location: &SourceLocation,
) -> Result<Value> {
    if !spec.is_modifier() {
        return Err(DslError::UnknownDirective {
            name: spec.name.to_string(),
            location: location.clone(),
        }
        .into());
    }
    if let Value::Domain(id) = target {
        host.document().modify_domain(*id, location)?;
    }
    let Value::Record(id) = target else {
        return Err(DslError::runtime(
            format!("cannot apply {} to a {} value", spec.name, target.kind()),
            location,
        )
        .into());
    };
    let Value::Modifier(modifiers) = invoke(host, spec, args, location)? else {
        let message = format!("{} did not produce a modifier", spec.name);
        return Err(DslError::runtime(message, location).into());
    };
    host.document()
        .modify_record(*id, (*modifiers).clone(), location)?;
    Ok(target.clone())
}

fn convert(
    call: &Call<'_>,
    index: usize,
    kind: ArgKind,
    optional: bool,
    value: Value,
) -> Result<Arg> {
    match (kind, value) {
        (_, Value::Nil) if optional => Ok(Arg::Absent),
        (ArgKind::String | ArgKind::Number | ArgKind::Address, Value::Reference(unbound)) => {
            Ok(Arg::Datum(Datum::Reference(Reference {
                name: unbound.name.clone(),
                location: unbound.location.clone(),
                slot: call.slot(index, kind),
            })))
        }
        (ArgKind::String | ArgKind::Address, Value::String(s)) => {
            Ok(Arg::Datum(Datum::String(s)))
        }
        (ArgKind::Address, Value::Integer(i)) => match u32::try_from(i) {
            Ok(bits) => Ok(Arg::Datum(Datum::String(Ipv4Addr::from(bits).to_string()))),
            Err(_) => Err(call.argument_type(index, kind, "out-of-range number").into()),
        },
        (ArgKind::Number, Value::Integer(i)) => Ok(Arg::Datum(Datum::Integer(i))),
        (ArgKind::Number, Value::Float(f)) => Ok(Arg::Datum(Datum::Float(f))),
        (ArgKind::Config | ArgKind::Modifier, Value::Table(table)) => Ok(Arg::Modifiers(
            table_to_modifiers(call, index, &table, &mut Vec::new())?,
        )),
        (ArgKind::Modifier, Value::Modifier(modifiers)) => {
            Ok(Arg::Modifiers((*modifiers).clone()))
        }
        (ArgKind::Item, value) => {
            let mut items = Vec::new();
            collect_items(call, index, value, &mut items, &mut Vec::new())?;
            Ok(Arg::Items(items))
        }
        (_, Value::Reference(unbound)) => Err(DslError::UnresolvedReference {
            name: unbound.name.clone(),
            location: unbound.location.clone(),
        }
        .into()),
        (kind, value) => Err(call.argument_type(index, kind, value.kind()).into()),
    }
}

fn collect_items(
    call: &Call<'_>,
    index: usize,
    value: Value,
    items: &mut Vec<DomainItem>,
    visited: &mut Vec<TableRef>,
) -> Result<()> {
    match value {
        Value::Nil => {}
        Value::Record(id) => items.push(DomainItem::Record(id)),
        Value::Modifier(modifiers) => items.push(DomainItem::Modifiers((*modifiers).clone())),
        Value::Provider(provider) => items.push(DomainItem::Provider((*provider).clone())),
        Value::DomainDirective(directive) => {
            items.push(DomainItem::Directive((*directive).clone()))
        }
        Value::Table(table) => {
            if table.borrow().is_map() {
                let modifiers = table_to_modifiers(call, index, &table, visited)?;
                items.push(DomainItem::Modifiers(modifiers));
            } else if table.borrow().is_array() {
                if visited.iter().any(|seen| Rc::ptr_eq(seen, &table)) {
                    return Err(SerializationError::Cycle {
                        location: call.location.clone(),
                    }
                    .into());
                }
                visited.push(Rc::clone(&table));
                let elements = table.borrow().sequence();
                for element in elements {
                    collect_items(call, index, element, items, visited)?;
                }
                visited.pop();
            } else {
                return Err(call.argument_type(index, ArgKind::Item, "mixed table").into());
            }
        }
        Value::Reference(unbound) => {
            return Err(DslError::UnresolvedReference {
                name: unbound.name.clone(),
                location: unbound.location.clone(),
            }
            .into())
        }
        other => return Err(call.argument_type(index, ArgKind::Item, other.kind()).into()),
    }
    Ok(())
}

fn table_to_modifiers(
    call: &Call<'_>,
    index: usize,
    table: &TableRef,
    visited: &mut Vec<TableRef>,
) -> Result<Modifiers<Datum>> {
    if visited.iter().any(|seen| Rc::ptr_eq(seen, table)) {
        return Err(SerializationError::Cycle {
            location: call.location.clone(),
        }
        .into());
    }
    if !table.borrow().is_map() {
        return Err(call
            .argument_type(index, ArgKind::Modifier, "array table")
            .into());
    }
    visited.push(Rc::clone(table));
    let entries: Vec<(String, Value)> = table
        .borrow()
        .entries()
        .filter_map(|(key, value)| match key {
            crate::eval::value::Key::String(key) => Some((key.clone(), value.clone())),
            _ => None,
        })
        .collect();
    let mut modifiers = Modifiers::new();
    for (key, value) in entries {
        let datum = modifier_value(call, index, &key, value, visited)?;
        modifiers.set(key, datum);
    }
    visited.pop();
    Ok(modifiers)
}

fn modifier_value(
    call: &Call<'_>,
    index: usize,
    key: &str,
    value: Value,
    visited: &mut Vec<TableRef>,
) -> Result<Datum> {
    Ok(match value {
        Value::String(s) => Datum::String(s),
        Value::Integer(i) => Datum::Integer(i),
        Value::Float(f) => Datum::Float(f),
        Value::Boolean(b) => Datum::Boolean(b),
        Value::Table(table) => Datum::Map(table_to_modifiers(call, index, &table, visited)?),
        Value::Modifier(modifiers) => Datum::Map((*modifiers).clone()),
        Value::Reference(unbound) => Datum::Reference(Reference {
            name: unbound.name.clone(),
            location: unbound.location.clone(),
            slot: call.slot(index, ArgKind::ModifierValue),
        }),
        other => {
            return Err(SerializationError::Unrepresentable {
                what: format!("{} value for key '{}'", other.kind(), key),
                location: call.location.clone(),
            }
            .into())
        }
    })
}

// Builders

fn build_domain(host: &mut dyn Host, call: &Call<'_>, mut args: Args) -> Result<Value> {
    let (Some(name), Some(registrar)) = (args.datum(), args.datum()) else {
        return Err(call.malformed().into());
    };
    let items = args.items();
    let id = host
        .document()
        .add_domain(name, registrar, items, call.location.clone())?;
    Ok(Value::Domain(id))
}

fn build_record(host: &mut dyn Host, call: &Call<'_>, mut args: Args) -> Result<Value> {
    let DirectiveKind::Record(record_type) = call.spec.kind else {
        return Err(call.malformed().into());
    };
    let mut fields = Vec::with_capacity(call.spec.params.len());
    for _ in call.spec.params {
        fields.push(args.datum().ok_or_else(|| call.malformed())?);
    }
    let modifiers = args.merged_modifiers();
    let id = host
        .document()
        .add_record(record_type, fields, modifiers, call.location.clone());
    Ok(Value::Record(id))
}

fn build_modifier(_host: &mut dyn Host, call: &Call<'_>, mut args: Args) -> Result<Value> {
    let DirectiveKind::Modifier(key) = call.spec.kind else {
        return Err(call.malformed().into());
    };
    let value = args.datum().ok_or_else(|| call.malformed())?;
    let mut modifiers = Modifiers::new();
    modifiers.set(key, value);
    Ok(Value::Modifier(Rc::new(modifiers)))
}

fn build_constant(_host: &mut dyn Host, call: &Call<'_>, _args: Args) -> Result<Value> {
    let DirectiveKind::Constant(key, constant) = call.spec.kind else {
        return Err(call.malformed().into());
    };
    let value = match constant {
        Constant::Str(s) => Datum::String(s.to_string()),
        Constant::Bool(b) => Datum::Boolean(b),
    };
    let mut modifiers = Modifiers::new();
    modifiers.set(key, value);
    Ok(Value::Modifier(Rc::new(modifiers)))
}

fn build_domain_directive(_host: &mut dyn Host, call: &Call<'_>, args: Args) -> Result<Value> {
    let args = match call.spec.kind {
        DirectiveKind::DomainFlag => None,
        DirectiveKind::DomainModifier => Some(args.optional_datums()),
        _ => return Err(call.malformed().into()),
    };
    Ok(Value::DomainDirective(Rc::new(DirectiveUse {
        name: call.spec.name,
        args,
    })))
}

/// `IP("1.2.3.4")`: the address as a 32-bit number.
fn build_ip(_host: &mut dyn Host, call: &Call<'_>, mut args: Args) -> Result<Value> {
    match args.datum() {
        Some(Datum::String(text)) => match text.parse::<Ipv4Addr>() {
            Ok(address) => Ok(Value::Integer(i64::from(u32::from(address)))),
            Err(_) => Err(DslError::runtime(
                format!("IP: '{}' is not an IPv4 address", text),
                call.location,
            )
            .into()),
        },
        Some(Datum::Reference(reference)) => Err(DslError::UnresolvedReference {
            name: reference.name,
            location: reference.location,
        }
        .into()),
        _ => Err(call.malformed().into()),
    }
}

fn build_registration(host: &mut dyn Host, call: &Call<'_>, mut args: Args) -> Result<Value> {
    let DirectiveKind::Registration(role) = call.spec.kind else {
        return Err(call.malformed().into());
    };
    let name = args.datum().ok_or_else(|| call.malformed())?;
    let provider_type = args.datum();
    let config = args.modifiers();
    let result = match &name {
        Datum::String(s) => Value::String(s.clone()),
        Datum::Reference(reference) => {
            Value::Reference(Rc::new(crate::eval::value::Unbound {
                name: reference.name.clone(),
                location: reference.location.clone(),
            }))
        }
        _ => return Err(call.malformed().into()),
    };
    host.document().register_provider(Registration {
        role,
        name,
        provider_type,
        config,
        location: call.location.clone(),
    });
    Ok(result)
}

fn build_provider_use(_host: &mut dyn Host, call: &Call<'_>, mut args: Args) -> Result<Value> {
    let name = args.datum().ok_or_else(|| call.malformed())?;
    let nameserver_count = args.datum();
    Ok(Value::Provider(Rc::new(ProviderUseEntry {
        name,
        nameserver_count,
    })))
}

fn build_include(host: &mut dyn Host, call: &Call<'_>, mut args: Args) -> Result<Value> {
    match args.datum() {
        Some(Datum::String(path)) => host.include(&path, call.location),
        Some(Datum::Reference(reference)) => Err(DslError::UnresolvedReference {
            name: reference.name,
            location: reference.location,
        }
        .into()),
        _ => Err(call.malformed().into()),
    }
}
