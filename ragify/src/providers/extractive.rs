//! A local, deterministic language model that answers by extraction.

use super::{GenerationRequest, LanguageModel, ModelReply};
use crate::errors::ProviderError;
use async_trait::async_trait;
use std::collections::BTreeSet;

/// Marks the start of the context block in a RAG prompt.
pub(crate) const CONTEXT_HEADER: &str = "Context:";
/// Marks the start of the question in a RAG prompt.
pub(crate) const QUESTION_PREFIX: &str = "Question:";
/// Marks where the answer should begin in a RAG prompt.
pub(crate) const ANSWER_PREFIX: &str = "Answer:";

/// Answers a RAG prompt by returning the context sentence that shares the
/// most words with the question.
///
/// Never requests tool calls. Useful offline and wherever a reproducible
/// answer matters more than fluency.
#[derive(Debug, Clone)]
pub struct ExtractiveLanguageModel {
    model_id: String,
}

impl Default for ExtractiveLanguageModel {
    fn default() -> Self {
        Self {
            model_id: "extractive".to_string(),
        }
    }
}

impl ExtractiveLanguageModel {
    /// Creates a new extractive model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn answer(prompt: &str) -> String {
        let (context, question) = split_prompt(prompt);
        let question_words = words(question);

        let best = context
            .map(sentences)
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, s)| (words(s).intersection(&question_words).count(), i, s))
            .max_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

        match best {
            Some((_, _, sentence)) => sentence.to_string(),
            None => format!("No relevant context was found for: {}", question.trim()),
        }
    }
}

fn split_prompt(prompt: &str) -> (Option<&str>, &str) {
    let Some(ctx_at) = prompt.find(CONTEXT_HEADER) else {
        return (None, prompt);
    };
    let body = &prompt[ctx_at + CONTEXT_HEADER.len()..];
    match body.rfind(QUESTION_PREFIX) {
        Some(q_at) => {
            let question = &body[q_at + QUESTION_PREFIX.len()..];
            let question = question
                .find(ANSWER_PREFIX)
                .map_or(question, |a| &question[..a]);
            (Some(&body[..q_at]), question)
        }
        None => (Some(body), ""),
    }
}

fn sentences(context: &str) -> Vec<&str> {
    context
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !(l.starts_with('[') && l.ends_with(']')))
        .flat_map(|l| l.split_inclusive(['.', '!', '?']))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn words(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl LanguageModel for ExtractiveLanguageModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<ModelReply, ProviderError> {
        let prompt = request.last_user_message().ok_or_else(|| {
            ProviderError::invalid_response(&self.model_id, "request has no user message")
        })?;
        let mut reply = ModelReply::text(Self::answer(prompt));
        reply.model.clone_from(&self.model_id);
        reply.finish_reason = Some("stop".to_string());
        Ok(reply)
    }
}
