use anyhow::{Context, Result};
use async_trait::async_trait;
use ollama_rs::{generation::completion::request::GenerationRequest, Ollama};
use serde::de::DeserializeOwned;

const CODE_FENCE: &str = "```";

/// A text-in, text-out language model.
#[async_trait]
pub(crate) trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Completion model served by an Ollama instance.
pub(crate) struct OllamaModel {
    client: Ollama,
    model: String,
}

impl OllamaModel {
    pub(crate) fn new(url: &str, model: &str) -> Result<Self> {
        let client = Ollama::try_new(url).with_context(|| format!("invalid Ollama URL {url}"))?;
        Ok(Self {
            client,
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl LanguageModel for OllamaModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerationRequest::new(self.model.clone(), prompt.to_string());
        let response = self
            .client
            .generate(request)
            .await
            .context("Ollama generation failed")?;
        Ok(response.response)
    }
}

/// Removes markdown code-fence markers from model output.
pub(crate) fn strip_code_fences(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for (i, piece) in raw.trim().split(CODE_FENCE).enumerate() {
        let piece = match piece.get(..4) {
            Some(tag) if i > 0 && tag.eq_ignore_ascii_case("json") => &piece[4..],
            _ => piece,
        };
        out.push_str(piece);
    }
    out.trim().to_string()
}

/// Parses fenced or bare model output as JSON.
pub(crate) fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let cleaned = strip_code_fences(raw);
    serde_json::from_str(&cleaned).with_context(|| format!("model output is not valid JSON: {raw}"))
}

/// Splits comma-separated model output into at most `limit` keywords.
pub(crate) fn parse_keywords(raw: &str, limit: usize) -> Vec<String> {
    strip_code_fences(raw)
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .take(limit)
        .map(ToString::to_string)
        .collect()
}
