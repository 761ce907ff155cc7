pub mod qa_cache;
pub mod section_context;

pub use qa_cache::QaCache;
