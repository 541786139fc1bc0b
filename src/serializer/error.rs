use thiserror::Error;

use crate::error::SourceLocation;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SerializationError {
    #[error("{what} has no representation in the native syntax at {location}")]
    Unrepresentable {
        what: String,
        location: SourceLocation,
    },
    #[error("cyclic table cannot be serialized at {location}")]
    Cycle { location: SourceLocation },
    #[error("non-finite number {value} in {context}")]
    NonFinite { value: f64, context: String },
}
