//! Provider families, one per [`ProviderCapability`](crate::ProviderCapability).

pub mod chunked;
pub mod grandfather;
pub mod llm;
pub mod repetition;

pub use chunked::{ChunkRequest, ChunkSegment, ChunkTranslator, ChunkedProvider};
pub use grandfather::GrandfatherProvider;
pub use llm::{CompletionClient, DEFAULT_SYSTEM_PROMPT, LlmTranslator};
pub use repetition::RepetitionProvider;
