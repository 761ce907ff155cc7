pub mod answer_parse;
pub mod normalize;
pub mod reconcile;

pub use answer_parse::{extract_answer, ModelAnswer};
pub use normalize::normalize;
pub use reconcile::{resolve_multiple, resolve_single};
