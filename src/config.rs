use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path, path::PathBuf};

use crate::error::{Error, Result};
use crate::serializer::SerializerConfig;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "dnslua.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Entrypoint source; its extension selects the dialect.
    #[serde(default = "default_input")]
    pub input: PathBuf,

    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Binary run with the forwarded arguments after a successful build.
    #[serde(default = "default_engine")]
    pub engine: String,

    #[serde(default)]
    pub serializer: SerializerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: default_input(),
            output: default_output(),
            engine: default_engine(),
            serializer: SerializerConfig::default(),
        }
    }
}

impl Config {
    /// Load `path` if given (it must exist), else `dnslua.json` if present,
    /// else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => from_file(DEFAULT_CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }
}

pub fn from_file<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> Result<T> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).map_err(|e| Error::Config {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

pub fn from_str<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T> {
    serde_json::from_str(s).map_err(|e| Error::Config {
        path: PathBuf::from("<string>"),
        message: e.to_string(),
    })
}

fn default_input() -> PathBuf {
    PathBuf::from("dnscontrol.lua")
}

fn default_output() -> PathBuf {
    PathBuf::from("dnscontrol.js")
}

fn default_engine() -> String {
    "dnscontrol".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let json = r#"{"output": "build/out.js", "serializer": {"banner": false}}"#;
        let config: Config = from_str(json).unwrap();
        assert_eq!(config.input, PathBuf::from("dnscontrol.lua"));
        assert_eq!(config.output, PathBuf::from("build/out.js"));
        assert_eq!(config.engine, "dnscontrol");
        assert_eq!(config.serializer.indent_spaces, 4);
        assert!(!config.serializer.banner);
    }

    #[test]
    fn test_invalid_config_is_config_error() {
        let result: Result<Config> = from_str("{\"serializer\": 3}");
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"engine": "/opt/bin/dnscontrol"}}"#).unwrap();
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.engine, "/opt/bin/dnscontrol");

        let missing = Config::load(Some(Path::new("/nonexistent/dnslua.json")));
        assert!(matches!(missing, Err(Error::Io { .. })));
    }
}
