use dnslua::error::SourceLocation;
use dnslua::snapshot::{
    Domain, DomainDirective, Field, Modifiers, Provider, ProviderConfig, ProviderRole,
    ProviderUse, Record, RecordType,
};
use dnslua::{Evaluator, Serializer, SerializerConfig, Snapshot, Syntax};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn location() -> SourceLocation {
    SourceLocation::new("generated.lua", 1, 1)
}

fn text() -> impl Strategy<Value = String> {
    r#"[a-zA-Z0-9 ._@:/"\\\n\t-]{0,12}"#
}

fn key() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z_][a-z0-9_]{0,8}",
        "[a-z][a-z0-9-]{0,6}-[a-z0-9]{1,3}",
    ]
}

fn number() -> impl Strategy<Value = Field> {
    prop_oneof![
        ((i64::MIN + 1)..=i64::MAX).prop_map(Field::Integer),
        (-1.0e9f64..1.0e9).prop_map(Field::Float),
    ]
}

fn field() -> impl Strategy<Value = Field> {
    let leaf = prop_oneof![
        text().prop_map(Field::String),
        number(),
        any::<bool>().prop_map(Field::Boolean),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop::collection::vec((key(), inner), 0..4)
            .prop_map(|entries| Field::Map(entries.into_iter().collect()))
    })
}

fn modifiers() -> impl Strategy<Value = Modifiers<Field>> {
    prop::collection::vec((key(), field()), 0..4).prop_map(|entries| entries.into_iter().collect())
}

fn fields(record_type: RecordType) -> BoxedStrategy<Vec<Field>> {
    let s = || text().prop_map(Field::String);
    match record_type {
        RecordType::MX => (s(), number(), s()).prop_map(|(a, b, c)| vec![a, b, c]).boxed(),
        RecordType::SRV => (s(), number(), number(), number(), s())
            .prop_map(|(a, b, c, d, e)| vec![a, b, c, d, e])
            .boxed(),
        RecordType::CAA => (s(), s(), s()).prop_map(|(a, b, c)| vec![a, b, c]).boxed(),
        _ => (s(), s()).prop_map(|(a, b)| vec![a, b]).boxed(),
    }
}

fn record() -> impl Strategy<Value = Record> {
    prop::sample::select(vec![
        RecordType::A,
        RecordType::AAAA,
        RecordType::CNAME,
        RecordType::TXT,
        RecordType::MX,
        RecordType::SRV,
        RecordType::CAA,
    ])
    .prop_flat_map(|record_type| (Just(record_type), fields(record_type), modifiers()))
    .prop_map(|(record_type, fields, modifiers)| Record {
        record_type,
        fields,
        modifiers,
        location: location(),
    })
}

fn provider_use() -> impl Strategy<Value = ProviderUse> {
    (text(), prop::option::of((0i64..10).prop_map(Field::Integer))).prop_map(
        |(name, nameserver_count)| ProviderUse {
            name,
            nameserver_count,
        },
    )
}

type DirectiveArgs = Option<Vec<Option<Field>>>;

fn directive() -> impl Strategy<Value = (String, DirectiveArgs)> {
    let s = || text().prop_map(|t| Some(Field::String(t)));
    prop_oneof![
        prop::sample::select(vec!["NO_PURGE", "PURGE", "AUTODNSSEC_ON"])
            .prop_map(|name| (name.to_string(), None)),
        number().prop_map(|ttl| ("DefaultTTL".to_string(), Some(vec![Some(ttl)]))),
        s().prop_map(|name| ("NAMESERVER".to_string(), Some(vec![name]))),
        (s(), prop::option::of(s())).prop_map(|(pattern, types)| {
            let mut args = vec![pattern];
            args.extend(types);
            ("IGNORE_NAME".to_string(), Some(args))
        }),
    ]
}

/// Directives sorted by position, each at most one past the last record.
fn directives(records: usize) -> impl Strategy<Value = Vec<DomainDirective>> {
    prop::collection::vec((0..=records, directive()), 0..4).prop_map(|mut entries| {
        entries.sort_by_key(|(position, _)| *position);
        entries
            .into_iter()
            .map(|(position, (name, args))| DomainDirective {
                name,
                args,
                position,
            })
            .collect()
    })
}

fn domain(index: usize) -> impl Strategy<Value = Domain> {
    (
        text(),
        prop::collection::vec(provider_use(), 0..3),
        prop::collection::vec(record(), 0..6),
        modifiers(),
    )
        .prop_flat_map(|(registrar, providers, records, modifiers)| {
            let count = records.len();
            (
                Just(registrar),
                Just(providers),
                Just(records),
                directives(count),
                Just(modifiers),
            )
        })
        .prop_map(
            move |(registrar, providers, records, directives, modifiers)| Domain {
                name: format!("d{}.example", index),
                registrar,
                providers,
                records,
                directives,
                modifiers,
                location: location(),
            },
        )
}

fn provider(index: usize) -> impl Strategy<Value = Provider> {
    (
        any::<bool>(),
        prop::option::of("[A-Z][A-Z0-9_]{0,10}"),
        prop::option::of(modifiers()),
    )
        .prop_map(move |(registrar, provider_type, config)| Provider {
            role: if registrar {
                ProviderRole::Registrar
            } else {
                ProviderRole::DnsProvider
            },
            name: format!("p{}", index),
            provider_type,
            config: config.map(ProviderConfig::new),
            location: location(),
        })
}

fn snapshot() -> impl Strategy<Value = Snapshot> {
    (0usize..3, 0usize..4).prop_flat_map(|(providers, domains)| {
        (
            (0..providers).map(provider).collect::<Vec<_>>(),
            (0..domains).map(domain).collect::<Vec<_>>(),
        )
            .prop_map(|(providers, domains)| Snapshot { providers, domains })
    })
}

fn read_back(output: &str) -> dnslua::Result<Snapshot> {
    dnslua::evaluate(&Evaluator::new(Syntax::JavaScript), output, "dnscontrol.js")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_serialized_snapshot_reads_back_equal(generated in snapshot()) {
        let output = Serializer::default()
            .serialize(&generated, Some("dnscontrol.lua"))
            .unwrap();
        let reread = read_back(&output).unwrap();
        prop_assert_eq!(&reread, &generated);

        let again = Serializer::default()
            .serialize(&reread, Some("dnscontrol.lua"))
            .unwrap();
        prop_assert_eq!(again, output);
    }

    #[test]
    fn test_indentation_does_not_change_meaning(generated in snapshot(), indent in 0usize..8) {
        let config = SerializerConfig { indent_spaces: indent, banner: false };
        let output = Serializer::new(config).serialize(&generated, None).unwrap();
        prop_assert_eq!(read_back(&output).unwrap(), generated);
    }
}

#[test]
fn test_lua_source_round_trips_through_javascript() {
    let source = r#"
        local REG = NewRegistrar("none")
        local DNS = NewDnsProvider("bind", "BIND", { directory = "zones" })
        D("example.com", REG, DnsProvider(DNS, 2), DefaultTTL(300), NO_PURGE,
            A("@", "192.0.2.1", CF_PROXY_ON, TTL(120)),
            IGNORE_NAME("legacy", "A,AAAA"),
            SRV("_sip._tcp", 10, 60, 5060, "sip.example.com."),
            CAA("@", "issue", "letsencrypt.org", CAA_CRITICAL),
            TXT("note", "quote \" and backslash \\"),
            { ttl = 300, meta = { owner = "ops", weight = 0.5 } }
        )
    "#;
    let evaluator = Evaluator::new(Syntax::Lua);
    let snapshot = dnslua::evaluate(&evaluator, source, "dnscontrol.lua").unwrap();
    let output = Serializer::default()
        .serialize(&snapshot, Some("dnscontrol.lua"))
        .unwrap();
    assert_eq!(read_back(&output).unwrap(), snapshot);

    let domain = snapshot.domain("example.com").unwrap();
    assert_eq!(domain.records.len(), 4);
    assert_eq!(domain.directives.len(), 3);
    assert_eq!(domain.directives[2].position, 1);
    assert_eq!(
        domain.records[0].modifiers.get("cloudflare_proxy"),
        Some(&Field::from("on"))
    );
}
