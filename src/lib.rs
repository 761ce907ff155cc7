pub mod core;
pub mod features;
pub mod llm;
pub mod nlp;
pub mod scraping;
pub mod tools;

// --- Primary core exports ---
pub use crate::core::types;
pub use crate::core::types::*;
pub use crate::core::AppState;

pub use crate::core::antibot;
pub use scraping::{form_parser, navigator};
pub use tools::{answer_builder, autofill, submit};
