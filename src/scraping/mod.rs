pub mod form_parser;
pub mod navigator;

pub use form_parser::{ExtractionError, FormParser};
