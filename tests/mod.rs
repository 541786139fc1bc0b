mod error_tests;
mod pipeline_tests;
mod roundtrip_tests;

use dnslua::{Evaluator, SerializerConfig, Syntax};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[ctor::ctor]
fn init_tests() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Serializer settings without the banner, so expected output stays short.
pub fn plain() -> SerializerConfig {
    SerializerConfig {
        banner: false,
        ..SerializerConfig::default()
    }
}

pub fn transpile_lua(source: &str) -> dnslua::Result<String> {
    dnslua::transpile(&Evaluator::new(Syntax::Lua), source, "dnscontrol.lua", &plain())
}
