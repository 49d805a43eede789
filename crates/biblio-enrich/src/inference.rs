//! Metadata from an LLM prompted for a JSON object.

use crate::llm::{LLMClient, Message};
use crate::{EnrichError, MetadataSource};
use async_trait::async_trait;
use biblio_types::Enrichment;
use serde_json::Value;

const SYSTEM_PROMPT: &str = "You are a librarian. Answer with a single JSON object and nothing else.";

fn user_prompt(title: &str, author: &str) -> String {
    format!(
        "For the book \"{title}\" by {author}, provide a JSON object with these exact keys:\n\
         - \"synopsis\": 2-3 sentence book summary\n\
         - \"tags\": array of 3-5 keyword tags\n\
         - \"genre\": primary genre (Fiction, Non-Fiction, Science Fiction, Fantasy, Mystery, Biography, Self-Help, History, Science, Technology)\n\
         - \"difficulty\": reading level (Easy, Moderate, Advanced)\n\
         Return ONLY valid JSON, nothing else."
    )
}

/// Slice from the first `{` to the last `}`; models often wrap JSON in prose or fences.
fn json_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parses a completion into an enrichment. Fields of the wrong type degrade to empty values.
pub(crate) fn parse_completion(text: &str) -> Result<Option<Enrichment>, EnrichError> {
    let Some(span) = json_span(text) else {
        return Ok(None);
    };
    let parsed: Value = serde_json::from_str(span).map_err(|e| EnrichError::Parse(e.to_string()))?;
    let string_field = |key: &str| {
        parsed
            .get(key)
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };
    let tags = parsed
        .get("tags")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.trim().to_string(),
                    other => other.to_string(),
                })
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();
    Ok(Some(Enrichment {
        synopsis: string_field("synopsis"),
        tags,
        genre: string_field("genre"),
        difficulty: string_field("difficulty"),
    }))
}

/// Asks an [`LLMClient`] for book metadata.
pub struct LlmMetadataSource<C> {
    client: C,
}

impl<C: LLMClient> LlmMetadataSource<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: LLMClient> MetadataSource for LlmMetadataSource<C> {
    async fn enrich(&self, title: &str, author: &str) -> Result<Option<Enrichment>, EnrichError> {
        let messages = [Message::system(SYSTEM_PROMPT), Message::user(user_prompt(title, author))];
        let text = self.client.chat(&messages).await?;
        parse_completion(&text)
    }
}
