pub mod answer_builder;
pub mod autofill;
pub mod submit;

pub use answer_builder::{AnswerError, AnswerSet};
pub use submit::{submit_payload, SubmitError};
