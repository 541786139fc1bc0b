//! Resolves deferred references, checks document-wide invariants and freezes
//! the [`Document`] into a [`Snapshot`].
//!
//! Nothing is returned unless every check passes, so the serializer never
//! sees a partially resolved tree.

use std::collections::HashMap;

use tracing::{debug, info, instrument};

use crate::directive::ArgKind;
use crate::document::{Binding, Datum, Document, Reference};
use crate::error::{DslError, Result, SourceLocation};
use crate::serializer::SerializationError;
use crate::snapshot::{
    Domain, DomainDirective, Field, Modifiers, Provider, ProviderConfig, ProviderUse, Record,
    Snapshot,
};

/// Provider type meaning "not specified".
const UNSPECIFIED_TYPE: &str = "-";

#[instrument(level = "debug", skip(document))]
pub fn finalize(document: &Document) -> Result<Snapshot> {
    let mut finalizer = Finalizer {
        document,
        resolving: Vec::new(),
    };
    let providers = finalizer.providers()?;
    let domains = finalizer.domains()?;
    info!(
        providers = providers.len(),
        domains = domains.len(),
        "document finalized"
    );
    Ok(Snapshot { providers, domains })
}

struct Finalizer<'a> {
    document: &'a Document,
    /// Names currently being resolved, for cycle detection.
    resolving: Vec<String>,
}

impl Finalizer<'_> {
    fn providers(&mut self) -> Result<Vec<Provider>> {
        let document = self.document;
        let mut providers: Vec<Provider> = Vec::new();
        for registration in document.registrations() {
            let location = &registration.location;
            let directive = registration.role.to_string();
            let name = self.text(&registration.name, &directive, 1, location)?;
            let provider_type = match &registration.provider_type {
                Some(datum) => Some(self.text(datum, &directive, 2, location)?)
                    .filter(|t| t != UNSPECIFIED_TYPE),
                None => None,
            };
            let config = match &registration.config {
                Some(config) => Some(ProviderConfig::new(
                    self.modifiers(config, &format!("{} '{}'", directive, name), location)?,
                )),
                None => None,
            };
            let provider = Provider {
                role: registration.role,
                name,
                provider_type,
                config,
                location: location.clone(),
            };

            match providers
                .iter()
                .find(|p| p.role == provider.role && p.name == provider.name)
            {
                Some(existing) if *existing == provider => {
                    debug!(name = %provider.name, "identical provider re-registered");
                }
                Some(existing) => {
                    return Err(DslError::DuplicateProvider {
                        name: provider.name,
                        first: existing.location.clone(),
                        second: provider.location,
                    }
                    .into())
                }
                None => providers.push(provider),
            }
        }
        Ok(providers)
    }

    fn domains(&mut self) -> Result<Vec<Domain>> {
        let document = self.document;
        let mut seen: HashMap<String, SourceLocation> = HashMap::new();
        let mut domains = Vec::with_capacity(document.domains().len());
        for entry in document.domains() {
            let location = &entry.location;
            let name = self.text(&entry.name, "D", 1, location)?;
            if let Some(first) = seen.get(&name) {
                return Err(DslError::DuplicateDomain {
                    name,
                    first: first.clone(),
                    second: location.clone(),
                }
                .into());
            }
            seen.insert(name.clone(), location.clone());

            let registrar = self.text(&entry.registrar, "D", 2, location)?;
            let mut providers = Vec::with_capacity(entry.providers.len());
            for provider in &entry.providers {
                providers.push(ProviderUse {
                    name: self.text(&provider.name, "DnsProvider", 1, location)?,
                    nameserver_count: provider
                        .nameserver_count
                        .as_ref()
                        .map(|count| self.field(count, "DnsProvider nameserver count", location))
                        .transpose()?,
                });
            }

            let mut records = Vec::with_capacity(entry.records.len());
            for id in &entry.records {
                let record = document.record(*id);
                let what = format!("{} record in '{}'", record.record_type, name);
                let fields = record
                    .fields
                    .iter()
                    .map(|datum| self.field(datum, &what, &record.location))
                    .collect::<Result<Vec<_>>>()?;
                records.push(Record {
                    record_type: record.record_type,
                    fields,
                    modifiers: self.modifiers(&record.modifiers, &what, &record.location)?,
                    location: record.location.clone(),
                });
            }

            let mut directives = Vec::with_capacity(entry.directives.len());
            for (position, directive) in &entry.directives {
                let what = format!("{} in '{}'", directive.name, name);
                let args = match &directive.args {
                    None => None,
                    Some(args) => Some(
                        args.iter()
                            .map(|arg| {
                                arg.as_ref()
                                    .map(|datum| self.field(datum, &what, location))
                                    .transpose()
                            })
                            .collect::<Result<Vec<_>>>()?,
                    ),
                };
                directives.push(DomainDirective {
                    name: directive.name.to_string(),
                    args,
                    position: *position,
                });
            }

            let what = format!("domain '{}'", name);
            let modifiers = self.modifiers(&entry.modifiers, &what, location)?;
            domains.push(Domain {
                name,
                registrar,
                providers,
                records,
                directives,
                modifiers,
                location: location.clone(),
            });
        }
        Ok(domains)
    }

    fn modifiers(
        &mut self,
        modifiers: &Modifiers<Datum>,
        what: &str,
        location: &SourceLocation,
    ) -> Result<Modifiers<Field>> {
        modifiers
            .clone()
            .try_map(|datum| self.field(&datum, what, location))
    }

    /// A field that must come out as a string.
    fn text(
        &mut self,
        datum: &Datum,
        directive: &str,
        index: usize,
        location: &SourceLocation,
    ) -> Result<String> {
        match self.field(datum, directive, location)? {
            Field::String(s) => Ok(s),
            other => Err(DslError::ArgumentType {
                directive: directive.to_string(),
                index,
                expected: ArgKind::String.describe().to_string(),
                received: other.kind().to_string(),
                location: location.clone(),
            }
            .into()),
        }
    }

    fn field(&mut self, datum: &Datum, what: &str, location: &SourceLocation) -> Result<Field> {
        Ok(match datum {
            Datum::String(s) => Field::String(s.clone()),
            Datum::Integer(i) => Field::Integer(*i),
            Datum::Float(f) if f.is_finite() => Field::Float(*f),
            Datum::Float(f) => {
                return Err(SerializationError::NonFinite {
                    value: *f,
                    context: format!("{} at {}", what, location),
                }
                .into())
            }
            Datum::Boolean(b) => Field::Boolean(*b),
            Datum::Map(map) => Field::Map(self.modifiers(map, what, location)?),
            Datum::Reference(reference) => self.resolve(reference, what)?,
        })
    }

    /// Follow a reference through the captured bindings, then re-check the
    /// value against the parameter it was passed for.
    fn resolve(&mut self, reference: &Reference, what: &str) -> Result<Field> {
        let document = self.document;
        let location = &reference.location;
        let unresolved = || DslError::UnresolvedReference {
            name: reference.name.clone(),
            location: location.clone(),
        };

        let mut name = reference.name.as_str();
        let mut hops = Vec::new();
        let datum = loop {
            if hops.contains(&name) {
                return Err(unresolved().into());
            }
            hops.push(name);
            match document.binding(name) {
                None => return Err(unresolved().into()),
                Some(Binding::Alias(next)) => name = next,
                Some(Binding::Opaque(kind)) => {
                    return Err(match reference.slot.expected {
                        ArgKind::String | ArgKind::Number | ArgKind::Address => {
                            DslError::ArgumentType {
                                directive: reference.slot.directive.clone(),
                                index: reference.slot.index,
                                expected: reference.slot.expected.describe().to_string(),
                                received: kind.to_string(),
                                location: location.clone(),
                            }
                            .into()
                        }
                        _ => SerializationError::Unrepresentable {
                            what: format!("{} value of '{}'", kind, name),
                            location: location.clone(),
                        }
                        .into(),
                    })
                }
                Some(Binding::Datum(datum)) => break datum,
            }
        };

        let bound = name.to_string();
        if self.resolving.contains(&bound) {
            return Err(SerializationError::Cycle {
                location: location.clone(),
            }
            .into());
        }
        self.resolving.push(bound);
        let field = self.field(datum, what, location);
        self.resolving.pop();
        let field = field?;

        if !reference.slot.expected.accepts(&field) {
            return Err(DslError::ArgumentType {
                directive: reference.slot.directive.clone(),
                index: reference.slot.index,
                expected: reference.slot.expected.describe().to_string(),
                received: field.kind().to_string(),
                location: location.clone(),
            }
            .into());
        }
        debug!(name = %reference.name, "reference resolved");
        Ok(reference.slot.expected.normalize(field))
    }
}
