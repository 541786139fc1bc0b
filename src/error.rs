use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::serializer::SerializationError;

/// Position of a construct in a source unit, 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file: Arc<str>,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<Arc<str>>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("SyntaxError: {message} at {location}")]
    Syntax {
        message: String,
        location: SourceLocation,
    },
    #[error("DSLError: {0}")]
    Dsl(#[from] DslError),
    #[error("SerializationError: {0}")]
    Serialization(#[from] SerializationError),
    #[error("IOError: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("ConfigError: {path}: {message}")]
    Config { path: PathBuf, message: String },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failures raised while evaluating the mirrored API or finalizing the
/// document it built.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DslError {
    #[error("UnknownDirective: '{name}' at {location}")]
    UnknownDirective {
        name: String,
        location: SourceLocation,
    },
    #[error(
        "ArgumentType: {directive} argument {index} expected {expected}, \
         got {received} at {location}"
    )]
    ArgumentType {
        directive: String,
        index: usize,
        expected: String,
        received: String,
        location: SourceLocation,
    },
    #[error(
        "ArgumentCount: {directive} expects {expected} arguments, \
         got {received} at {location}"
    )]
    ArgumentCount {
        directive: String,
        expected: String,
        received: usize,
        location: SourceLocation,
    },
    #[error("ImmutableTarget: {target} (declared at {declared}) is closed, modified at {location}")]
    ImmutableTarget {
        target: String,
        declared: SourceLocation,
        location: SourceLocation,
    },
    #[error("DuplicateDomain: '{name}' declared at {first} and again at {second}")]
    DuplicateDomain {
        name: String,
        first: SourceLocation,
        second: SourceLocation,
    },
    #[error("DuplicateProvider: '{name}' registered at {first} and differently at {second}")]
    DuplicateProvider {
        name: String,
        first: SourceLocation,
        second: SourceLocation,
    },
    #[error("UnresolvedReference: '{name}' first used at {location}")]
    UnresolvedReference {
        name: String,
        location: SourceLocation,
    },
    #[error("IncludeCycle: '{name}' is already being evaluated, included at {location}")]
    IncludeCycle {
        name: String,
        location: SourceLocation,
    },
    #[error("Runtime: {message} at {location}")]
    Runtime {
        message: String,
        location: SourceLocation,
    },
}

impl DslError {
    pub fn runtime(message: impl Into<String>, location: &SourceLocation) -> Self {
        DslError::Runtime {
            message: message.into(),
            location: location.clone(),
        }
    }
}

pub type DslResult<T> = std::result::Result<T, DslError>;
