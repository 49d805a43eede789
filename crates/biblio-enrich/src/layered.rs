//! Tries each metadata layer in order and always ends with the heuristic.

use crate::heuristic::heuristic_enrichment;
use crate::inference::LlmMetadataSource;
use crate::known::KnownBooks;
use crate::llm::OpenAiLLMClient;
use crate::MetadataSource;
use biblio_types::{Enrichment, EnrichmentSource};

pub struct LayeredEnricher {
    layers: Vec<(EnrichmentSource, Box<dyn MetadataSource>)>,
}

impl LayeredEnricher {
    /// No layers besides the heuristic.
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    pub fn with_layer(
        mut self,
        source: EnrichmentSource,
        layer: impl MetadataSource + 'static,
    ) -> Self {
        self.layers.push((source, Box::new(layer)));
        self
    }

    /// Lookup table, then the OpenAI-compatible client when `LLM_API_KEY` is configured.
    pub fn from_env() -> Self {
        let enricher = Self::new().with_layer(EnrichmentSource::LocalDb, KnownBooks);
        match OpenAiLLMClient::from_env() {
            Some(client) => {
                tracing::info!(client = ?client, "LLM enrichment enabled");
                enricher.with_layer(EnrichmentSource::Llm, LlmMetadataSource::new(client))
            }
            None => enricher,
        }
    }

    /// Best effort: a failing layer is logged and skipped, never surfaced.
    pub async fn enrich(
        &self,
        title: &str,
        author: &str,
        current_genre: Option<&str>,
    ) -> (Enrichment, EnrichmentSource) {
        for (source, layer) in &self.layers {
            match layer.enrich(title, author).await {
                Ok(Some(found)) => {
                    tracing::debug!(source = source.as_str(), title, "enrichment found");
                    return (found, *source);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(source = source.as_str(), title, error = %e, "enrichment layer failed, falling back");
                }
            }
        }
        (
            heuristic_enrichment(title, author, current_genre),
            EnrichmentSource::Heuristic,
        )
    }
}

impl Default for LayeredEnricher {
    fn default() -> Self {
        Self::new()
    }
}
