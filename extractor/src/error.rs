//! Errors raised before the extraction loop starts.

use thiserror::Error;

/// Fatal input errors. These are surfaced immediately and never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    /// The fragment bytes are not valid UTF-8.
    #[error("Fragment is not decodable as text: {0}")]
    Undecodable(String),

    /// The markup renderer rejected the fragment.
    #[error("Fragment could not be rendered to text: {0}")]
    Render(String),

    /// A schema field has an empty name.
    #[error("Schema field at position {position} has an empty name")]
    EmptyFieldName {
        /// Zero-based position of the field in the descriptor.
        position: usize,
    },

    /// The same field name appears more than once.
    #[error("Schema field '{0}' is declared more than once")]
    DuplicateField(String),

    /// A field declares a type outside string, integer, number, boolean.
    #[error("Schema field '{field}' has unsupported type '{type_name}'")]
    UnknownFieldType {
        /// Field name.
        field: String,
        /// The type name as written.
        type_name: String,
    },

    /// The descriptor document itself is malformed.
    #[error("Malformed schema descriptor: {0}")]
    MalformedSchema(String),

    /// `max_tries` must allow at least one attempt.
    #[error("max_tries must be at least 1")]
    ZeroAttempts,
}
