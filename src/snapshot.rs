//! Immutable configuration tree handed to the serializer.

use std::fmt;
use std::sync::Arc;

use strum::{Display, EnumString};

use crate::error::SourceLocation;

/// Record constructors of the engine API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum RecordType {
    A,
    AAAA,
    CNAME,
    ALIAS,
    DNAME,
    NS,
    PTR,
    MX,
    TXT,
    SRV,
    CAA,
    TLSA,
    SSHFP,
    DS,
    NAPTR,
    SOA,
    HTTPS,
    SVCB,
}

/// Value of a record field or a modifier entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Map(Modifiers<Field>),
}

impl Field {
    pub fn kind(&self) -> &'static str {
        match self {
            Field::String(_) => "string",
            Field::Integer(_) | Field::Float(_) => "number",
            Field::Boolean(_) => "boolean",
            Field::Map(_) => "table",
        }
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Field::String(value.to_string())
    }
}

impl From<i64> for Field {
    fn from(value: i64) -> Self {
        Field::Integer(value)
    }
}

impl From<bool> for Field {
    fn from(value: bool) -> Self {
        Field::Boolean(value)
    }
}

/// Key/value attributes with last-write-wins semantics.
///
/// Keys keep the position of their first introduction, so iteration is
/// deterministic regardless of how often a key is overwritten.
#[derive(Debug, Clone, PartialEq)]
pub struct Modifiers<V> {
    entries: Vec<(String, V)>,
}

impl<V> Default for Modifiers<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<V> Modifiers<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Apply every entry of `other` in order, overriding existing keys.
    pub fn merge(&mut self, other: Modifiers<V>) {
        for (key, value) in other.entries {
            self.set(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn try_map<W, E>(self, mut f: impl FnMut(V) -> Result<W, E>) -> Result<Modifiers<W>, E> {
        let entries = self
            .entries
            .into_iter()
            .map(|(k, v)| Ok((k, f(v)?)))
            .collect::<Result<Vec<_>, E>>()?;
        Ok(Modifiers { entries })
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for Modifiers<V> {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut modifiers = Modifiers::new();
        for (key, value) in iter {
            modifiers.set(key, value);
        }
        modifiers
    }
}

/// Provider credentials, passed through to the output without inspection.
#[derive(Clone, PartialEq)]
pub struct ProviderConfig(Arc<Modifiers<Field>>);

impl ProviderConfig {
    pub fn new(entries: Modifiers<Field>) -> Self {
        Self(Arc::new(entries))
    }

    pub(crate) fn entries(&self) -> &Modifiers<Field> {
        &self.0
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProviderConfig(<{} redacted entries>)", self.0.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ProviderRole {
    #[strum(serialize = "NewRegistrar")]
    Registrar,
    #[strum(serialize = "NewDnsProvider")]
    DnsProvider,
}

#[derive(Debug, Clone)]
pub struct Provider {
    pub role: ProviderRole,
    pub name: String,
    pub provider_type: Option<String>,
    pub config: Option<ProviderConfig>,
    pub location: SourceLocation,
}

impl PartialEq for Provider {
    fn eq(&self, other: &Self) -> bool {
        self.role == other.role
            && self.name == other.name
            && self.provider_type == other.provider_type
            && self.config == other.config
    }
}

/// `DnsProvider(name, count?)` inside a domain.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderUse {
    pub name: String,
    pub nameserver_count: Option<Field>,
}

#[derive(Debug, Clone)]
pub struct Record {
    pub record_type: RecordType,
    pub fields: Vec<Field>,
    pub modifiers: Modifiers<Field>,
    pub location: SourceLocation,
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.record_type == other.record_type
            && self.fields == other.fields
            && self.modifiers == other.modifiers
    }
}

/// Function-style domain item such as `NO_PURGE` or `DefaultTTL(300)`.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainDirective {
    pub name: String,
    /// `None` for a bare name; absent optional arguments are `None` entries.
    pub args: Option<Vec<Option<Field>>>,
    /// Number of the domain's records declared before it.
    pub position: usize,
}

impl DomainDirective {
    pub fn bare(name: impl Into<String>, position: usize) -> Self {
        Self {
            name: name.into(),
            args: None,
            position,
        }
    }

    pub fn call(name: impl Into<String>, args: Vec<Field>, position: usize) -> Self {
        Self {
            name: name.into(),
            args: Some(args.into_iter().map(Some).collect()),
            position,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Domain {
    pub name: String,
    pub registrar: String,
    pub providers: Vec<ProviderUse>,
    pub records: Vec<Record>,
    /// Kept in declaration order.
    pub directives: Vec<DomainDirective>,
    pub modifiers: Modifiers<Field>,
    pub location: SourceLocation,
}

impl PartialEq for Domain {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.registrar == other.registrar
            && self.providers == other.providers
            && self.records == other.records
            && self.directives == other.directives
            && self.modifiers == other.modifiers
    }
}

/// Frozen result of a successful evaluation. Equality ignores source
/// locations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub providers: Vec<Provider>,
    pub domains: Vec<Domain>,
}

impl Snapshot {
    pub fn domain(&self, name: &str) -> Option<&Domain> {
        self.domains.iter().find(|d| d.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins_keeps_first_position() {
        let mut modifiers = Modifiers::new();
        modifiers.set("ttl", Field::Integer(300));
        modifiers.set("cloudflare_proxy", Field::from("on"));
        modifiers.set("ttl", Field::Integer(60));
        let keys: Vec<_> = modifiers.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["ttl", "cloudflare_proxy"]);
        assert_eq!(modifiers.get("ttl"), Some(&Field::Integer(60)));
        assert_eq!(modifiers.len(), 2);
    }

    #[test]
    fn test_merge_overrides_in_order() {
        let mut base: Modifiers<Field> = [("a", Field::Integer(1)), ("b", Field::Integer(2))]
            .into_iter()
            .collect();
        base.merge([("b", Field::Integer(3)), ("c", Field::Integer(4))].into_iter().collect());
        let flat: Vec<_> = base.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        assert_eq!(
            flat,
            vec![
                ("a".to_string(), Field::Integer(1)),
                ("b".to_string(), Field::Integer(3)),
                ("c".to_string(), Field::Integer(4)),
            ]
        );
    }

    #[test]
    fn test_provider_config_debug_is_redacted() {
        let config =
            ProviderConfig::new([("apitoken", Field::from("secret"))].into_iter().collect());
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn test_record_equality_ignores_location() {
        let record = |line| Record {
            record_type: RecordType::A,
            fields: vec![Field::from("www"), Field::from("1.2.3.4")],
            modifiers: Modifiers::new(),
            location: SourceLocation::new("x.lua", line, 1),
        };
        assert_eq!(record(1), record(9));
    }

    #[test]
    fn test_record_type_parses_from_name() {
        assert_eq!("AAAA".parse::<RecordType>().unwrap(), RecordType::AAAA);
        assert_eq!(RecordType::SSHFP.to_string(), "SSHFP");
    }
}
