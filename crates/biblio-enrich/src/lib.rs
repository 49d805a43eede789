//! Book metadata enrichment: static lookup table, then an OpenAI-compatible LLM, then a heuristic.
//!
//! Enrichment only ever produces descriptive fields; it has no access to loan state.

mod heuristic;
mod inference;
mod known;
mod layered;
mod llm;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

use async_trait::async_trait;

pub use biblio_types::{Enrichment, EnrichmentSource};
pub use heuristic::heuristic_enrichment;
pub use inference::LlmMetadataSource;
pub use known::KnownBooks;
pub use layered::LayeredEnricher;
pub use llm::{LLMClient, LLMError, Message, OpenAiLLMClient};

#[cfg(any(test, feature = "test-util"))]
pub use mock::MockLLMClient;

#[derive(Debug, thiserror::Error)]
pub enum EnrichError {
    #[error("llm: {0}")]
    Llm(#[from] LLMError),
    #[error("unparseable metadata: {0}")]
    Parse(String),
}

/// One metadata layer. `Ok(None)` means "no answer here, try the next layer".
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn enrich(&self, title: &str, author: &str) -> Result<Option<Enrichment>, EnrichError>;
}
