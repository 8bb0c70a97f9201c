//! Schema-constrained extraction of structured data from HTML fragments.
//!
//! A fragment is rendered to plain text, wrapped in a prompt that describes
//! the expected JSON object, and sent to an injected [`ModelClient`]. The
//! model's free-form reply is searched for a JSON object, which is coerced to
//! the declared field types. Unusable replies are retried with repair
//! feedback until a conforming object appears or the attempt budget runs out.
//!
//! [`ModelClient`]: client::ModelClient

pub mod client;
pub mod error;
pub mod extraction;
pub mod prompt;
pub mod schema;
pub mod session;
pub mod text;

pub use extraction::{extract, extract_from_html};

/// Common traits and types for ergonomic usage of the extractor.
pub mod prelude {
    pub use crate::client::{model_fn, ModelClient, ModelError};
    pub use crate::error::InputError;
    pub use crate::extraction::{
        extract, extract_from_html, ExtractionConfig, ExtractionError, ExtractionMetrics,
        ExtractionResult, Extractor,
    };
    pub use crate::prompt::{OneShotExample, PromptConfig};
    pub use crate::schema::{FieldType, SchemaDescriptor};
    pub use crate::session::{ModelSession, SessionModelClient, SessionProvider};
    pub use crate::text::{html_bytes_to_text, html_to_text, TextConfig};
}
