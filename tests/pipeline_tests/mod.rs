use std::fs;

use dnslua::{Evaluator, MemoryResolver, Syntax};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

use crate::{plain, transpile_lua};

#[test]
fn test_single_domain_end_to_end() {
    let output = transpile_lua(
        r#"
        D("example.com", "none",
            A("www", "1.2.3.4", TTL(3600))
        )
        "#,
    )
    .unwrap();
    assert_eq!(
        output,
        "D(\"example.com\", \"none\",\n    A(\"www\", \"1.2.3.4\", {ttl: 3600})\n);\n"
    );
}

#[test]
fn test_records_keep_source_order() {
    let output = transpile_lua(
        r#"
        local hosts = { "c", "a", "b" }
        local records = {}
        for i, host in ipairs(hosts) do
            table.insert(records, A(host, "10.0.0." .. i))
        end
        D("example.com", "none", records, CNAME("alias", "c"))
        "#,
    )
    .unwrap();
    let positions: Vec<usize> = [
        "A(\"c\", \"10.0.0.1\")",
        "A(\"a\", \"10.0.0.2\")",
        "A(\"b\", \"10.0.0.3\")",
        "CNAME(\"alias\", \"c\")",
    ]
    .iter()
    .map(|call| output.find(call).unwrap_or_else(|| panic!("missing {call}")))
    .collect();
    let mut sorted = positions.clone();
    sorted.sort_unstable();
    assert_eq!(positions, sorted);
}

#[test]
fn test_last_modifier_write_wins() {
    let output = transpile_lua(
        r#"
        local www = A("www", "1.2.3.4", TTL(300))
        www:TTL(60)
        D("example.com", "none", www)
        "#,
    )
    .unwrap();
    assert!(output.contains("A(\"www\", \"1.2.3.4\", {ttl: 60})"));
    assert_eq!(output.matches("ttl").count(), 1);

    let inline =
        transpile_lua(r#"D("example.com", "none", A("www", "1.2.3.4", TTL(300), { ttl = 60 }))"#)
            .unwrap();
    assert_eq!(output, inline);
}

#[test]
fn test_forward_reference_takes_final_value() {
    let output = transpile_lua(
        r#"
        D("example.com", "none", A("www", WEB_IP))
        WEB_IP = "10.0.0.1"
        WEB_IP = "10.0.0.2"
        "#,
    )
    .unwrap();
    assert!(output.contains("A(\"www\", \"10.0.0.2\")"));
}

#[test]
fn test_program_composes_with_functions() {
    let output = transpile_lua(
        r#"
        local REG = NewRegistrar("none")
        local CF = NewDnsProvider("cloudflare", "CLOUDFLAREAPI")

        local function web(name, v4, v6)
            return { A(name, v4), AAAA(name, v6) }
        end

        for _, zone in ipairs({ "example.com", "example.net" }) do
            D(zone, REG, DnsProvider(CF),
                DefaultTTL(300),
                web("@", "192.0.2.1", "2001:db8::1"),
                MX("@", 10, "mail." .. zone .. "."),
                TXT("@", string.format("v=spf1 include:%s -all", zone))
            )
        end
        "#,
    )
    .unwrap();
    assert_eq!(
        output,
        r#"NewRegistrar("none");
NewDnsProvider("cloudflare", "CLOUDFLAREAPI");

D("example.com", "none",
    DnsProvider("cloudflare"),
    DefaultTTL(300),
    A("@", "192.0.2.1"),
    AAAA("@", "2001:db8::1"),
    MX("@", 10, "mail.example.com."),
    TXT("@", "v=spf1 include:example.com -all")
);

D("example.net", "none",
    DnsProvider("cloudflare"),
    DefaultTTL(300),
    A("@", "192.0.2.1"),
    AAAA("@", "2001:db8::1"),
    MX("@", 10, "mail.example.net."),
    TXT("@", "v=spf1 include:example.net -all")
);
"#
    );
}

#[test]
fn test_both_dialects_produce_the_same_output() {
    let lua = transpile_lua(
        r#"D("example.com", "none", A("www", "1.2.3.4", { ttl = 3600 }), CF_PROXY_ON)"#,
    )
    .unwrap();
    let js = dnslua::transpile(
        &Evaluator::new(Syntax::JavaScript),
        r#"D("example.com", "none", A("www", "1.2.3.4", {ttl: 3600}), CF_PROXY_ON);"#,
        "dnscontrol.js",
        &plain(),
    )
    .unwrap();
    assert_eq!(lua, js);
}

#[test]
fn test_domain_directives_render_as_calls() {
    let source = concat!(
        r#"D("example.com","none",NO_PURGE,AUTODNSSEC_ON,"#,
        r#"DefaultTTL(300),NAMESERVER_TTL(600),A("www","1.2.3.4"))"#,
    );
    let expected = r#"D("example.com", "none",
    NO_PURGE,
    AUTODNSSEC_ON,
    DefaultTTL(300),
    NAMESERVER_TTL(600),
    A("www", "1.2.3.4")
);
"#;
    assert_eq!(transpile_lua(source).unwrap(), expected);
    let js = dnslua::transpile(
        &Evaluator::new(Syntax::JavaScript),
        &format!("{};", source),
        "dnscontrol.js",
        &plain(),
    )
    .unwrap();
    assert_eq!(js, expected);
}

#[test]
fn test_every_predefined_item_renders() {
    let output = transpile_lua(
        r#"
        D("example.com", "none",
            PURGE, AUTODNSSEC_OFF, DISABLE_IGNORE_SAFETY_CHECK,
            NAMESERVER("ns1.example.net."),
            A("@", IP("192.0.2.10"), CF_PROXY_ON),
            A("a", "192.0.2.11", CF_PROXY_OFF),
            A("b", "192.0.2.12", CF_PROXY_FULL, TTL(60)),
            IGNORE_NAME("legacy"),
            IGNORE_NAME("old", "A,MX"),
            IGNORE_TARGET("*.cdn.example.net.", "CNAME"),
            IGNORE("www", nil, "*.cdn"),
            CAA("@", "issue", "letsencrypt.org", CAA_CRITICAL),
            DNAME("legacy", "example.net."),
            NAPTR("@", 100, 10, "U", "E2U+sip", "!^.*$!sip:info@example.com!", "."),
            SOA("@", "ns1.example.net.", "hostmaster.example.com.", 3600, 600, 604800, 1440),
            HTTPS("@", 1, ".", "alpn=h2"),
            SVCB("_8443._foo", 1, "svc.example.net.", "port=8443"),
            CF_PROXY_ON
        )
        "#,
    )
    .unwrap();
    assert_eq!(
        output,
        r#"D("example.com", "none",
    PURGE,
    AUTODNSSEC_OFF,
    DISABLE_IGNORE_SAFETY_CHECK,
    NAMESERVER("ns1.example.net."),
    A("@", "192.0.2.10", {cloudflare_proxy: "on"}),
    A("a", "192.0.2.11", {cloudflare_proxy: "off"}),
    A("b", "192.0.2.12", {cloudflare_proxy: "full", ttl: 60}),
    IGNORE_NAME("legacy"),
    IGNORE_NAME("old", "A,MX"),
    IGNORE_TARGET("*.cdn.example.net.", "CNAME"),
    IGNORE("www", undefined, "*.cdn"),
    CAA("@", "issue", "letsencrypt.org", {caa_critical: true}),
    DNAME("legacy", "example.net."),
    NAPTR("@", 100, 10, "U", "E2U+sip", "!^.*$!sip:info@example.com!", "."),
    SOA("@", "ns1.example.net.", "hostmaster.example.com.", 3600, 600, 604800, 1440),
    HTTPS("@", 1, ".", "alpn=h2"),
    SVCB("_8443._foo", 1, "svc.example.net.", "port=8443"),
    {cloudflare_proxy: "on"}
);
"#
    );
}

#[test]
fn test_require_shares_definitions() {
    let resolver = MemoryResolver::new().with_unit(
        "providers.lua",
        r#"
        REG = NewRegistrar("none")
        return { ttl = 600 }
        "#,
    );
    let evaluator = Evaluator::new(Syntax::Lua).with_resolver(resolver);
    let output = dnslua::transpile(
        &evaluator,
        r#"
        local defaults = require("providers.lua")
        D("example.com", REG, A("www", "1.2.3.4", defaults))
        "#,
        "main.lua",
        &plain(),
    )
    .unwrap();
    assert!(output.starts_with("NewRegistrar(\"none\");\n\n"));
    assert!(output.contains("A(\"www\", \"1.2.3.4\", {ttl: 600})"));
}

#[test]
fn test_transpile_file_writes_output() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("dnscontrol.lua");
    let common = dir.path().join("common.lua");
    let output = dir.path().join("dnscontrol.js");
    fs::write(&common, "WEB = \"1.2.3.4\"\n").unwrap();
    fs::write(
        &input,
        "require(\"common.lua\")\nD(\"example.com\", \"none\", A(\"www\", WEB))\n",
    )
    .unwrap();

    dnslua::transpile_file(&input, &output, &plain()).unwrap();
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "D(\"example.com\", \"none\",\n    A(\"www\", \"1.2.3.4\")\n);\n"
    );
}

#[test]
fn test_failed_run_leaves_previous_output() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("dnscontrol.lua");
    let output = dir.path().join("dnscontrol.js");
    fs::write(&output, "// previous\n").unwrap();
    fs::write(
        &input,
        "D(\"example.com\", \"none\")\nD(\"example.com\", \"none\")\n",
    )
    .unwrap();

    let err = dnslua::transpile_file(&input, &output, &plain()).unwrap_err();
    assert!(err.to_string().contains("DuplicateDomain"));
    assert_eq!(fs::read_to_string(&output).unwrap(), "// previous\n");
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
}

#[test]
fn test_banner_names_the_source() {
    let output = dnslua::transpile(
        &Evaluator::new(Syntax::Lua),
        r#"D("example.com", "none")"#,
        "zones.lua",
        &dnslua::SerializerConfig::default(),
    )
    .unwrap();
    assert_eq!(
        output,
        "// Generated by dnslua from zones.lua. Do not edit.\n\nD(\"example.com\", \"none\");\n"
    );
}
