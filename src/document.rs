//! Order-preserving accumulator filled while a program is evaluated.
//!
//! Only the directive builders mutate a [`Document`]; the finalizer reads it
//! and produces a [`crate::snapshot::Snapshot`].

use std::collections::HashMap;

use crate::directive::ArgKind;
use crate::error::{DslError, DslResult, SourceLocation};
use crate::snapshot::{Modifiers, ProviderRole, RecordType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DomainId(usize);

/// Value stored in the document. References are resolved by the finalizer.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Map(Modifiers<Datum>),
    Reference(Reference),
}

/// A name that was unbound when a directive received it.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub name: String,
    pub location: SourceLocation,
    pub slot: Slot,
}

/// The parameter a reference was passed for, re-checked once it resolves.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub directive: String,
    pub index: usize,
    pub expected: ArgKind,
}

/// Final top-level binding of a name, captured when evaluation ends.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Datum(Datum),
    /// Bound to another name that was itself unbound when assigned.
    Alias(String),
    /// Bound to something with no document representation.
    Opaque(&'static str),
}

#[derive(Debug, Clone)]
pub struct RecordEntry {
    pub record_type: RecordType,
    pub fields: Vec<Datum>,
    pub modifiers: Modifiers<Datum>,
    pub location: SourceLocation,
    owner: Option<DomainId>,
}

impl RecordEntry {
    pub fn is_closed(&self) -> bool {
        self.owner.is_some()
    }

    fn describe(&self) -> String {
        match self.fields.first() {
            Some(Datum::String(name)) => format!("{} record '{}'", self.record_type, name),
            _ => format!("{} record", self.record_type),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderUseEntry {
    pub name: Datum,
    pub nameserver_count: Option<Datum>,
}

/// A function-style domain directive as it was called.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectiveUse {
    pub name: &'static str,
    /// `None` for a bare name such as `NO_PURGE`.
    pub args: Option<Vec<Option<Datum>>>,
}

#[derive(Debug, Clone)]
pub struct DomainEntry {
    pub name: Datum,
    pub registrar: Datum,
    pub providers: Vec<ProviderUseEntry>,
    pub records: Vec<RecordId>,
    /// Each directive with the number of records that preceded it.
    pub directives: Vec<(usize, DirectiveUse)>,
    pub modifiers: Modifiers<Datum>,
    pub location: SourceLocation,
}

impl DomainEntry {
    fn describe(&self) -> String {
        match &self.name {
            Datum::String(name) => format!("domain '{}'", name),
            _ => "domain".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub role: ProviderRole,
    pub name: Datum,
    pub provider_type: Option<Datum>,
    pub config: Option<Modifiers<Datum>>,
    pub location: SourceLocation,
}

/// One argument of a `D` call after validation and flattening.
#[derive(Debug, Clone)]
pub enum DomainItem {
    Record(RecordId),
    Modifiers(Modifiers<Datum>),
    Provider(ProviderUseEntry),
    Directive(DirectiveUse),
}

#[derive(Debug, Default)]
pub struct Document {
    records: Vec<RecordEntry>,
    domains: Vec<DomainEntry>,
    registrations: Vec<Registration>,
    bindings: HashMap<String, Binding>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[RecordEntry] {
        &self.records
    }

    pub fn record(&self, id: RecordId) -> &RecordEntry {
        &self.records[id.0]
    }

    pub fn domains(&self) -> &[DomainEntry] {
        &self.domains
    }

    pub fn domain(&self, id: DomainId) -> &DomainEntry {
        &self.domains[id.0]
    }

    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub(crate) fn add_record(
        &mut self,
        record_type: RecordType,
        fields: Vec<Datum>,
        modifiers: Modifiers<Datum>,
        location: SourceLocation,
    ) -> RecordId {
        self.records.push(RecordEntry {
            record_type,
            fields,
            modifiers,
            location,
            owner: None,
        });
        RecordId(self.records.len() - 1)
    }

    /// Merge modifiers into a record that is still open.
    pub(crate) fn modify_record(
        &mut self,
        id: RecordId,
        modifiers: Modifiers<Datum>,
        location: &SourceLocation,
    ) -> DslResult<()> {
        let record = &mut self.records[id.0];
        if record.is_closed() {
            return Err(DslError::ImmutableTarget {
                target: record.describe(),
                declared: record.location.clone(),
                location: location.clone(),
            });
        }
        record.modifiers.merge(modifiers);
        Ok(())
    }

    /// Domains are closed as soon as their `D` call returns.
    pub(crate) fn modify_domain(&self, id: DomainId, location: &SourceLocation) -> DslResult<()> {
        let domain = &self.domains[id.0];
        Err(DslError::ImmutableTarget {
            target: domain.describe(),
            declared: domain.location.clone(),
            location: location.clone(),
        })
    }

    /// Append a domain and close every record it takes ownership of.
    pub(crate) fn add_domain(
        &mut self,
        name: Datum,
        registrar: Datum,
        items: Vec<DomainItem>,
        location: SourceLocation,
    ) -> DslResult<DomainId> {
        let id = DomainId(self.domains.len());
        let mut domain = DomainEntry {
            name,
            registrar,
            providers: Vec::new(),
            records: Vec::new(),
            directives: Vec::new(),
            modifiers: Modifiers::new(),
            location,
        };
        for item in items {
            match item {
                DomainItem::Record(record_id) => {
                    let record = &self.records[record_id.0];
                    if record.is_closed() || domain.records.contains(&record_id) {
                        return Err(DslError::ImmutableTarget {
                            target: record.describe(),
                            declared: record.location.clone(),
                            location: domain.location.clone(),
                        });
                    }
                    domain.records.push(record_id);
                }
                DomainItem::Modifiers(modifiers) => domain.modifiers.merge(modifiers),
                DomainItem::Provider(provider) => domain.providers.push(provider),
                DomainItem::Directive(directive) => {
                    domain.directives.push((domain.records.len(), directive))
                }
            }
        }
        for record_id in &domain.records {
            self.records[record_id.0].owner = Some(id);
        }
        self.domains.push(domain);
        Ok(id)
    }

    pub(crate) fn register_provider(&mut self, registration: Registration) {
        self.registrations.push(registration);
    }

    pub(crate) fn bind(&mut self, name: impl Into<String>, binding: Binding) {
        self.bindings.insert(name.into(), binding);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(line: u32) -> SourceLocation {
        SourceLocation::new("test.lua", line, 1)
    }

    fn a_record(document: &mut Document, name: &str) -> RecordId {
        document.add_record(
            RecordType::A,
            vec![Datum::String(name.into()), Datum::String("1.2.3.4".into())],
            Modifiers::new(),
            loc(1),
        )
    }

    #[test]
    fn test_records_close_when_domain_is_added() {
        let mut document = Document::new();
        let www = a_record(&mut document, "www");
        let ttl: Modifiers<Datum> = [("ttl", Datum::Integer(300))].into_iter().collect();
        document.modify_record(www, ttl.clone(), &loc(2)).unwrap();

        document
            .add_domain(
                Datum::String("example.com".into()),
                Datum::String("none".into()),
                vec![DomainItem::Record(www)],
                loc(3),
            )
            .unwrap();
        assert!(document.record(www).is_closed());

        let err = document.modify_record(www, ttl, &loc(4)).unwrap_err();
        match err {
            DslError::ImmutableTarget {
                target, location, ..
            } => {
                assert_eq!(target, "A record 'www'");
                assert_eq!(location.line, 4);
            }
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn test_record_cannot_join_two_domains() {
        let mut document = Document::new();
        let www = a_record(&mut document, "www");
        let domain = |name: &str| Datum::String(name.into());
        let items = || vec![DomainItem::Record(www)];
        document
            .add_domain(domain("a.com"), domain("none"), items(), loc(2))
            .unwrap();
        let result = document.add_domain(domain("b.com"), domain("none"), items(), loc(3));
        assert!(matches!(result, Err(DslError::ImmutableTarget { .. })));
        assert_eq!(document.domains().len(), 1);
    }

    #[test]
    fn test_domain_modifiers_merge_last_write_wins() {
        let mut document = Document::new();
        let ttl = |value| {
            DomainItem::Modifiers([("ttl", Datum::Integer(value))].into_iter().collect())
        };
        let id = document
            .add_domain(
                Datum::String("example.com".into()),
                Datum::String("none".into()),
                vec![ttl(300), ttl(60)],
                loc(1),
            )
            .unwrap();
        let domain = document.domain(id);
        assert_eq!(domain.modifiers.len(), 1);
        assert_eq!(domain.modifiers.get("ttl"), Some(&Datum::Integer(60)));
        assert!(document.modify_domain(id, &loc(2)).is_err());
    }

    #[test]
    fn test_directives_remember_their_position() {
        let mut document = Document::new();
        let www = a_record(&mut document, "www");
        let directive = |name, args| DomainItem::Directive(DirectiveUse { name, args });
        let id = document
            .add_domain(
                Datum::String("example.com".into()),
                Datum::String("none".into()),
                vec![
                    directive("DefaultTTL", Some(vec![Some(Datum::Integer(300))])),
                    DomainItem::Record(www),
                    directive("NO_PURGE", None),
                ],
                loc(1),
            )
            .unwrap();
        let positions: Vec<_> = document
            .domain(id)
            .directives
            .iter()
            .map(|(position, directive)| (*position, directive.name))
            .collect();
        assert_eq!(positions, vec![(0, "DefaultTTL"), (1, "NO_PURGE")]);
    }
}
