use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializerConfig {
    #[serde(default = "default_indent_spaces")]
    pub indent_spaces: usize,
    /// Emit the "generated, do not edit" comment line.
    #[serde(default = "default_banner")]
    pub banner: bool,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            indent_spaces: default_indent_spaces(),
            banner: default_banner(),
        }
    }
}

fn default_indent_spaces() -> usize {
    4
}

fn default_banner() -> bool {
    true
}
