//! Grounded answer generation.

use super::{ComponentPorts, PipelineComponent};
use crate::context::{ContextValue, RunContext};
use crate::errors::{ComponentError, ProviderError};
use crate::providers::{
    ChatMessage, GenerationRequest, LanguageModel, ANSWER_PREFIX, CONTEXT_HEADER, QUESTION_PREFIX,
};
use crate::registry::{ComponentFactory, ConfigSchema, OptionSpec, ResolvedConfig};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

const INSTRUCTION: &str =
    "Answer the question using only the context below. If the context is not enough, say so.";

fn default_system_prompt() -> String {
    "You are a helpful assistant that answers questions from the provided documents.".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_max_context_chars() -> usize {
    8000
}

fn default_true() -> bool {
    true
}

/// Options for [`ResponseGenerator`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeneratorOptions {
    /// System message sent ahead of the prompt. Empty sends none.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Completion token limit.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Context blocks are dropped once the prompt context exceeds this.
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
    /// Write the list of source paths to `sources`.
    #[serde(default = "default_true")]
    pub include_sources: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_context_chars: default_max_context_chars(),
            include_sources: true,
        }
    }
}

pub(crate) fn schema() -> ConfigSchema {
    ConfigSchema::new()
        .option(OptionSpec::string("system_prompt").default_value(json!(default_system_prompt())))
        .option(
            OptionSpec::float("temperature")
                .default_value(json!(default_temperature()))
                .min(0.0)
                .max(2.0),
        )
        .option(
            OptionSpec::integer("max_tokens")
                .default_value(json!(default_max_tokens()))
                .min(1.0),
        )
        .option(
            OptionSpec::integer("max_context_chars")
                .default_value(json!(default_max_context_chars()))
                .min(1.0),
        )
        .option(OptionSpec::boolean("include_sources").default_value(json!(true)))
}

pub(crate) fn factory(ports: ComponentPorts) -> ComponentFactory {
    Arc::new(move |cfg: &ResolvedConfig| {
        let llm = ports.require_llm(&cfg.instance_name)?;
        let options: GeneratorOptions = cfg.deserialize()?;
        Ok(Arc::new(ResponseGenerator::new(&cfg.instance_name, llm, options).enabled(cfg.enabled()))
            as Arc<dyn PipelineComponent>)
    })
}

/// A piece of context handed to the model, with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ContextBlock {
    pub(crate) source: String,
    pub(crate) content: String,
}

fn blocks_from(value: Option<&ContextValue>) -> Vec<ContextBlock> {
    match value {
        Some(ContextValue::Retrieved(results)) => results
            .iter()
            .map(|r| ContextBlock {
                source: r.chunk.source().unwrap_or("unknown").to_string(),
                content: r.chunk.content().to_string(),
            })
            .collect(),
        Some(ContextValue::Documents(docs)) => docs
            .iter()
            .map(|d| ContextBlock {
                source: d.source().unwrap_or("unknown").to_string(),
                content: d.content().to_string(),
            })
            .collect(),
        Some(ContextValue::Chunks(chunks)) => chunks
            .iter()
            .map(|c| ContextBlock {
                source: c.source().unwrap_or("unknown").to_string(),
                content: c.content().to_string(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((at, _)) => &text[..at],
        None => text,
    }
}

/// Builds the RAG prompt. With no blocks the query is returned unchanged.
pub(crate) fn build_prompt(query: &str, blocks: &[ContextBlock], max_context_chars: usize) -> String {
    if blocks.is_empty() {
        return query.to_string();
    }

    let mut context = String::new();
    let mut used = 0usize;
    for (i, block) in blocks.iter().enumerate() {
        let remaining = max_context_chars.saturating_sub(used);
        if remaining == 0 {
            break;
        }
        let content = truncate_chars(&block.content, remaining);
        used += content.chars().count();
        context.push_str(&format!("[source {}: {}]\n{}\n\n", i + 1, block.source, content));
    }

    format!(
        "{INSTRUCTION}\n\n{CONTEXT_HEADER}\n{}\n{QUESTION_PREFIX} {query}\n\n{ANSWER_PREFIX}",
        context.trim_end()
    )
}

fn unique_sources(blocks: &[ContextBlock]) -> Vec<String> {
    let mut seen = Vec::new();
    for block in blocks {
        if !seen.contains(&block.source) {
            seen.push(block.source.clone());
        }
    }
    seen
}

/// Reads `query` and optionally `documents`; writes `response`,
/// `response_generated` and `sources`.
pub struct ResponseGenerator {
    name: String,
    llm: Arc<dyn LanguageModel>,
    options: GeneratorOptions,
    enabled: bool,
}

impl fmt::Debug for ResponseGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseGenerator")
            .field("name", &self.name)
            .field("model", &self.llm.model_id())
            .field("options", &self.options)
            .finish()
    }
}

impl ResponseGenerator {
    /// Creates a generator.
    #[must_use]
    pub fn new(name: impl Into<String>, llm: Arc<dyn LanguageModel>, options: GeneratorOptions) -> Self {
        Self {
            name: name.into(),
            llm,
            options,
            enabled: true,
        }
    }

    /// Sets whether the generator is enabled.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    fn request(&self, prompt: String) -> GenerationRequest {
        let mut request = GenerationRequest::from_prompt(prompt)
            .with_temperature(self.options.temperature)
            .with_max_tokens(self.options.max_tokens);
        if !self.options.system_prompt.is_empty() {
            request
                .messages
                .insert(0, ChatMessage::system(&self.options.system_prompt));
        }
        request
    }
}

#[async_trait]
impl PipelineComponent for ResponseGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_keys(&self) -> Vec<String> {
        vec!["query".to_string()]
    }

    fn provided_keys(&self) -> Vec<String> {
        let mut keys = vec!["response".to_string(), "response_generated".to_string()];
        if self.options.include_sources {
            keys.push("sources".to_string());
        }
        keys
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn process(&self, ctx: &mut RunContext) -> Result<(), ComponentError> {
        let query = ctx.require_text(&self.name, "query")?.clone();
        let blocks = blocks_from(ctx.get("documents"));
        let prompt = build_prompt(&query, &blocks, self.options.max_context_chars);
        debug!(component = %self.name, blocks = blocks.len(), "Built prompt");

        let reply = self
            .llm
            .generate(&self.request(prompt))
            .await
            .map_err(|e| ComponentError::provider(&self.name, &e))?;
        if reply.content.trim().is_empty() {
            let err = ProviderError::invalid_response(self.llm.model_id(), "empty completion");
            return Err(ComponentError::provider(&self.name, &err));
        }

        info!(
            component = %self.name,
            model = %self.llm.model_id(),
            tokens = reply.total_tokens(),
            "Generated response"
        );
        ctx.insert("response", reply.content);
        ctx.insert("response_generated", true);
        if self.options.include_sources {
            ctx.insert("sources", unique_sources(&blocks));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Chunk, Document, Metadata, RetrievedChunk};
    use crate::errors::ComponentErrorKind;
    use crate::providers::{ExtractiveLanguageModel, MockLanguageModel, ModelReply};

    fn retrieved(source: &str, text: &str, rank: usize) -> RetrievedChunk {
        let mut meta = Metadata::new();
        meta.insert("source".to_string(), json!(source));
        RetrievedChunk {
            chunk: Chunk::whole(&Document::new(text, meta)),
            score: 0.9,
            rank,
        }
    }

    #[test]
    fn test_prompt_numbers_sources() {
        let blocks = vec![
            ContextBlock { source: "a.txt".into(), content: "Alpha.".into() },
            ContextBlock { source: "b.txt".into(), content: "Beta.".into() },
        ];
        let prompt = build_prompt("what?", &blocks, 1000);

        assert!(prompt.contains("[source 1: a.txt]\nAlpha."));
        assert!(prompt.contains("[source 2: b.txt]\nBeta."));
        assert!(prompt.ends_with("Question: what?\n\nAnswer:"));
    }

    #[test]
    fn test_prompt_respects_context_budget() {
        let blocks = vec![
            ContextBlock { source: "a".into(), content: "x".repeat(10) },
            ContextBlock { source: "b".into(), content: "y".repeat(10) },
        ];
        let prompt = build_prompt("q", &blocks, 12);
        assert!(prompt.contains(&"x".repeat(10)));
        assert!(prompt.contains("[source 2: b]\nyy\n"));

        let tight = build_prompt("q", &blocks, 10);
        assert!(!tight.contains("source 2"));
    }

    #[test]
    fn test_no_documents_sends_raw_query() {
        assert_eq!(build_prompt("just this", &[], 100), "just this");
    }

    #[tokio::test]
    async fn test_answers_from_retrieved_context() {
        let generator = ResponseGenerator::new(
            "gen",
            Arc::new(ExtractiveLanguageModel::new()),
            GeneratorOptions::default(),
        );
        let mut ctx = RunContext::new()
            .with("query", "Which planet has rings?")
            .with(
                "documents",
                vec![
                    retrieved("space.md", "Mars is red. Saturn has beautiful rings.", 0),
                    retrieved("space.md", "Jupiter is the largest planet.", 1),
                ],
            );

        generator.process(&mut ctx).await.unwrap();

        assert_eq!(ctx.text("response"), Some("Saturn has beautiful rings."));
        assert_eq!(ctx.bool("response_generated"), Some(true));
        assert_eq!(ctx.text_list("sources"), Some(vec!["space.md".to_string()]));
    }

    #[tokio::test]
    async fn test_system_prompt_and_settings_are_sent() {
        let mut llm = MockLanguageModel::new();
        llm.expect_model_id().return_const("mock".to_string());
        llm.expect_generate()
            .withf(|req| {
                req.messages.len() == 2
                    && req.messages[0].content == "be brief"
                    && req.max_tokens == 64
                    && req.last_user_message() == Some("hi")
            })
            .returning(|_| Ok(ModelReply::text("hello")));

        let options = GeneratorOptions {
            system_prompt: "be brief".into(),
            max_tokens: 64,
            ..GeneratorOptions::default()
        };
        let generator = ResponseGenerator::new("gen", Arc::new(llm), options);
        let mut ctx = RunContext::new().with("query", "hi");

        generator.process(&mut ctx).await.unwrap();
        assert_eq!(ctx.text("response"), Some("hello"));
    }

    #[tokio::test]
    async fn test_empty_completion_fails() {
        let mut llm = MockLanguageModel::new();
        llm.expect_model_id().return_const("mock".to_string());
        llm.expect_generate().returning(|_| Ok(ModelReply::text("  ")));

        let generator = ResponseGenerator::new("gen", Arc::new(llm), GeneratorOptions::default());
        let mut ctx = RunContext::new().with("query", "hi");
        let err = generator.process(&mut ctx).await.unwrap_err();

        assert_eq!(err.kind, ComponentErrorKind::Provider);
        assert!(!ctx.contains_key("response"));
    }
}
