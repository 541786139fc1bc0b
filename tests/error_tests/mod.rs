use dnslua::{DslError, Error, Evaluator, MemoryResolver, Syntax};

use crate::{plain, transpile_lua};

#[test]
fn test_unknown_directive_reports_name_and_line() {
    let err = transpile_lua(
        "local REG = NewRegistrar(\"none\")\n\
         \n\
         -- records\n\
         D(\"example.com\", REG,\n\
             A(\"www\", \"1.2.3.4\")\n\
         )\n\
         bogus(\"example.net\")\n",
    )
    .unwrap_err();
    assert!(matches!(err, Error::Dsl(DslError::UnknownDirective { .. })));
    let message = err.to_string();
    assert!(message.contains("bogus"), "{message}");
    assert!(message.contains("dnscontrol.lua:7:"), "{message}");
}

#[test]
fn test_duplicate_domain_reports_both_lines() {
    let err = transpile_lua(
        "D(\"example.com\", \"none\")\n\
         A(\"x\", \"1.1.1.1\")\n\
         D(\"example.com\", \"none\")\n",
    )
    .unwrap_err();
    let message = err.to_string();
    assert!(message.starts_with("DSLError: DuplicateDomain"), "{message}");
    assert!(message.contains("dnscontrol.lua:1:"), "{message}");
    assert!(message.contains("dnscontrol.lua:3:"), "{message}");
}

#[test]
fn test_argument_errors() {
    let count = transpile_lua(r#"D("example.com", "none", A("www"))"#).unwrap_err();
    assert!(matches!(
        count,
        Error::Dsl(DslError::ArgumentCount { ref directive, received: 1, .. }) if directive == "A"
    ));

    let kind = transpile_lua(r#"D("example.com", "none", MX("@", "ten", "mail."))"#).unwrap_err();
    let message = kind.to_string();
    assert!(
        message.starts_with(
            "DSLError: ArgumentType: MX argument 2 expected number, got string at dnscontrol.lua:1:"
        ),
        "{message}"
    );
}

#[test]
fn test_record_is_closed_after_its_domain() {
    let err = transpile_lua(
        r#"
        local www = A("www", "1.2.3.4")
        D("example.com", "none", www)
        www:TTL(60)
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Dsl(DslError::ImmutableTarget { .. })));
}

#[test]
fn test_unresolved_reference_names_first_use() {
    let err =
        transpile_lua("D(\"example.com\", \"none\",\n    A(\"www\", MISSING_IP))\n").unwrap_err();
    match err {
        Error::Dsl(DslError::UnresolvedReference { name, location }) => {
            assert_eq!(name, "MISSING_IP");
            assert_eq!(location.line, 2);
        }
        other => panic!("unexpected {other}"),
    }
}

#[test]
fn test_conflicting_provider_registration() {
    let err = transpile_lua(
        r#"
        NewDnsProvider("cf", "CLOUDFLAREAPI")
        NewDnsProvider("cf", "ROUTE53")
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Dsl(DslError::DuplicateProvider { .. })));

    let same = transpile_lua(
        r#"
        NewDnsProvider("cf", "CLOUDFLAREAPI")
        NewDnsProvider("cf", "CLOUDFLAREAPI")
        "#,
    )
    .unwrap();
    assert_eq!(same, "NewDnsProvider(\"cf\", \"CLOUDFLAREAPI\");\n");
}

#[test]
fn test_include_cycle() {
    let resolver = MemoryResolver::new()
        .with_unit("a.lua", "require(\"b.lua\")")
        .with_unit("b.lua", "require(\"a.lua\")");
    let err = dnslua::transpile(
        &Evaluator::new(Syntax::Lua).with_resolver(resolver),
        "require(\"a.lua\")",
        "main.lua",
        &plain(),
    )
    .unwrap_err();
    assert!(err.to_string().starts_with("DSLError: IncludeCycle: 'a.lua'"));
}

#[test]
fn test_syntax_error() {
    let err = transpile_lua("D(\"example.com\", \"none\"\n").unwrap_err();
    assert!(matches!(err, Error::Syntax { .. }));
    assert!(err.to_string().starts_with("SyntaxError:"));
}

#[test]
fn test_script_error_and_assert() {
    let err = transpile_lua("error(\"zone list is empty\")").unwrap_err();
    assert!(matches!(err, Error::Dsl(DslError::Runtime { .. })));
    assert!(err.to_string().contains("zone list is empty"));

    let err = transpile_lua("assert(1 == 2, \"math broke\")").unwrap_err();
    assert!(err.to_string().contains("math broke"));
}

#[test]
fn test_unrepresentable_values() {
    let err = transpile_lua(r#"D("example.com", "none", A("www", "1.2.3.4", { hook = print }))"#)
        .unwrap_err();
    assert!(matches!(err, Error::Serialization(_)));

    let err = transpile_lua(r#"D("example.com", "none", A("www", "1.2.3.4", { ttl = 0/0 }))"#)
        .unwrap_err();
    assert!(err.to_string().contains("SerializationError"));
}

#[test]
fn test_deep_nesting_is_a_syntax_error_in_both_dialects() {
    // parsing up to the limit needs more stack than the default test thread
    let handle = std::thread::Builder::new()
        .stack_size(16 * 1024 * 1024)
        .spawn(|| {
            let cases = [
                (Syntax::Lua, format!("x = {}1{}", "(".repeat(500), ")".repeat(500))),
                (Syntax::Lua, format!("x = {}{}", "{".repeat(3000), "}".repeat(3000))),
                (Syntax::JavaScript, format!("x = {}1{};", "(".repeat(500), ")".repeat(500))),
                (Syntax::JavaScript, format!("x = {}{};", "[".repeat(3000), "]".repeat(3000))),
            ];
            for (syntax, source) in cases {
                let err = dnslua::transpile(&Evaluator::new(syntax), &source, "deep", &plain())
                    .unwrap_err();
                assert!(matches!(err, Error::Syntax { .. }), "{err}");
                let message = err.to_string();
                assert!(message.contains("nesting is deeper than 200 levels"), "{message}");
                assert!(message.contains("deep:1:"), "{message}");
            }
        })
        .unwrap();
    handle.join().unwrap();
}

#[test]
fn test_oversized_string_rep_is_a_script_error() {
    let err = transpile_lua(r#"TXT("x", string.rep("ab", 1e18))"#).unwrap_err();
    assert!(matches!(err, Error::Dsl(DslError::Runtime { .. })));
    assert!(err.to_string().contains("resulting string too large"));
}
