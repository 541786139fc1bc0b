//! Renders a finalized [`Snapshot`] as dnscontrol JavaScript.
//!
//! Output is a pure function of the snapshot and the configuration:
//! provider registrations first, then one `D(...)` statement per domain, with
//! records and domain directives in document order and modifiers as a
//! trailing object literal.

pub mod config;
pub mod error;
pub mod visitor;

use tracing::instrument;

pub use config::SerializerConfig;
pub use error::SerializationError;
use visitor::SerializerVisitor;

use crate::snapshot::Snapshot;

#[derive(Debug, Clone, Default)]
pub struct Serializer {
    config: SerializerConfig,
}

impl Serializer {
    pub fn new(config: SerializerConfig) -> Self {
        Self { config }
    }

    /// `source_name` is mentioned in the banner line when one is emitted.
    #[instrument(level = "debug", skip(self, snapshot))]
    pub fn serialize(
        &self,
        snapshot: &Snapshot,
        source_name: Option<&str>,
    ) -> Result<String, SerializationError> {
        let mut visitor = SerializerVisitor::new(self.config.clone());
        visitor.serialize_snapshot(snapshot, source_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceLocation;
    use crate::snapshot::{
        Domain, DomainDirective, Field, Modifiers, Provider, ProviderConfig, ProviderRole,
        ProviderUse, Record, RecordType,
    };
    use pretty_assertions::assert_eq;

    fn loc() -> SourceLocation {
        SourceLocation::new("test.lua", 1, 1)
    }

    fn sample() -> Snapshot {
        let mut nested = Modifiers::new();
        nested.set("id", Field::Integer(1));
        let mut config = Modifiers::new();
        config.set("account-id", Field::from("x"));
        config.set("zone", Field::Map(nested));
        Snapshot {
            providers: vec![
                Provider {
                    role: ProviderRole::Registrar,
                    name: "none".into(),
                    provider_type: None,
                    config: None,
                    location: loc(),
                },
                Provider {
                    role: ProviderRole::DnsProvider,
                    name: "cf".into(),
                    provider_type: Some("CLOUDFLAREAPI".into()),
                    config: Some(ProviderConfig::new(config)),
                    location: loc(),
                },
            ],
            domains: vec![Domain {
                name: "example.com".into(),
                registrar: "none".into(),
                providers: vec![ProviderUse {
                    name: "cf".into(),
                    nameserver_count: None,
                }],
                records: vec![
                    Record {
                        record_type: RecordType::A,
                        fields: vec![Field::from("www"), Field::from("1.2.3.4")],
                        modifiers: [("ttl", Field::Integer(3600))].into_iter().collect(),
                        location: loc(),
                    },
                    Record {
                        record_type: RecordType::MX,
                        fields: vec![Field::from("@"), Field::Integer(10), Field::from("mail.")],
                        modifiers: Modifiers::new(),
                        location: loc(),
                    },
                ],
                directives: vec![
                    DomainDirective::call("DefaultTTL", vec![Field::Integer(300)], 0),
                    DomainDirective {
                        name: "IGNORE".into(),
                        args: Some(vec![
                            Some(Field::from("www")),
                            None,
                            Some(Field::from("*.cdn")),
                        ]),
                        position: 1,
                    },
                    DomainDirective::bare("NO_PURGE", 2),
                ],
                modifiers: [("cloudflare_proxy", Field::from("on"))].into_iter().collect(),
                location: loc(),
            }],
        }
    }

    #[test]
    fn test_serialize_snapshot() {
        let output = Serializer::default()
            .serialize(&sample(), Some("dnscontrol.lua"))
            .unwrap();
        assert_eq!(
            output,
            r#"// Generated by dnslua from dnscontrol.lua. Do not edit.

NewRegistrar("none");
NewDnsProvider("cf", "CLOUDFLAREAPI", {"account-id": "x", zone: {id: 1}});

D("example.com", "none",
    DnsProvider("cf"),
    DefaultTTL(300),
    A("www", "1.2.3.4", {ttl: 3600}),
    IGNORE("www", undefined, "*.cdn"),
    MX("@", 10, "mail."),
    NO_PURGE,
    {cloudflare_proxy: "on"}
);
"#
        );
    }

    #[test]
    fn test_config_controls_banner_and_indent() {
        let config = SerializerConfig {
            indent_spaces: 2,
            banner: false,
        };
        let mut snapshot = sample();
        snapshot.providers.clear();
        snapshot.domains[0].providers.clear();
        snapshot.domains[0].records.truncate(1);
        snapshot.domains[0].directives.clear();
        snapshot.domains[0].modifiers = Modifiers::new();
        let output = Serializer::new(config).serialize(&snapshot, None).unwrap();
        assert_eq!(
            output,
            "D(\"example.com\", \"none\",\n  A(\"www\", \"1.2.3.4\", {ttl: 3600})\n);\n"
        );
    }

    #[test]
    fn test_empty_domain_and_config_without_type() {
        let snapshot = Snapshot {
            providers: vec![Provider {
                role: ProviderRole::DnsProvider,
                name: "bind".into(),
                provider_type: None,
                config: Some(ProviderConfig::new(
                    [("directory", Field::from("zones"))].into_iter().collect(),
                )),
                location: loc(),
            }],
            domains: vec![Domain {
                name: "empty.example".into(),
                registrar: "none".into(),
                providers: Vec::new(),
                records: Vec::new(),
                directives: Vec::new(),
                modifiers: Modifiers::new(),
                location: loc(),
            }],
        };
        let output = Serializer::new(SerializerConfig {
            banner: false,
            ..SerializerConfig::default()
        })
        .serialize(&snapshot, None)
        .unwrap();
        assert_eq!(
            output,
            concat!(
                "NewDnsProvider(\"bind\", \"-\", {directory: \"zones\"});\n\n",
                "D(\"empty.example\", \"none\");\n"
            )
        );
    }

    #[test]
    fn test_output_is_deterministic() {
        let serializer = Serializer::default();
        let first = serializer.serialize(&sample(), Some("x.lua")).unwrap();
        let second = serializer.serialize(&sample(), Some("x.lua")).unwrap();
        assert_eq!(first, second);
    }
}
