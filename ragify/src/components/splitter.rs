//! Cleans documents and cuts them into overlapping chunks.

use super::PipelineComponent;
use crate::context::RunContext;
use crate::core::{Chunk, Document, Modality};
use crate::errors::{ComponentError, ConfigValidationError};
use crate::registry::{ComponentFactory, ConfigSchema, OptionSpec, ResolvedConfig};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use std::sync::{Arc, OnceLock};
use tracing::info;

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    100
}

fn default_min_chunk_length() -> usize {
    20
}

fn default_true() -> bool {
    true
}

fn default_separators() -> Vec<String> {
    ["\n\n", "\n", ". ", "! ", "? ", " "]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

fn markdown_separators() -> Vec<String> {
    ["\n# ", "\n## ", "\n### ", "\n#### ", "\n```", "\n\n", "\n", ". ", " "]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

/// Options for [`TextSplitter`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SplitterOptions {
    /// Maximum chunk length in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Text chunks shorter than this (after trimming) are dropped.
    #[serde(default = "default_min_chunk_length")]
    pub min_chunk_length: usize,
    /// Normalize whitespace before splitting.
    #[serde(default = "default_true")]
    pub clean_text: bool,
    /// Separators tried in order, coarsest first.
    #[serde(default = "default_separators")]
    pub separators: Vec<String>,
}

impl Default for SplitterOptions {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            min_chunk_length: default_min_chunk_length(),
            clean_text: true,
            separators: default_separators(),
        }
    }
}

impl SplitterOptions {
    /// Checks cross-option constraints.
    pub fn validate(&self, target: &str) -> Result<(), ConfigValidationError> {
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigValidationError::new(
                target,
                "chunk_overlap",
                format!(
                    "must be smaller than chunk_size ({} >= {})",
                    self.chunk_overlap, self.chunk_size
                ),
            ));
        }
        Ok(())
    }
}

pub(crate) fn schema() -> ConfigSchema {
    ConfigSchema::new()
        .option(
            OptionSpec::integer("chunk_size")
                .default_value(json!(default_chunk_size()))
                .min(1.0)
                .describe("Maximum chunk length in characters"),
        )
        .option(
            OptionSpec::integer("chunk_overlap")
                .default_value(json!(default_chunk_overlap()))
                .min(0.0),
        )
        .option(
            OptionSpec::integer("min_chunk_length")
                .default_value(json!(default_min_chunk_length()))
                .min(0.0),
        )
        .option(OptionSpec::boolean("clean_text").default_value(json!(true)))
        .option(OptionSpec::string_list("separators").default_value(json!(default_separators())))
}

pub(crate) fn factory() -> ComponentFactory {
    Arc::new(|cfg: &ResolvedConfig| {
        let options: SplitterOptions = cfg.deserialize()?;
        Ok(Arc::new(TextSplitter::new(&cfg.instance_name, options)?.enabled(cfg.enabled()))
            as Arc<dyn PipelineComponent>)
    })
}

fn horizontal_space() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t\x0B\x0C\r]+").ok()).as_ref()
}

fn blank_lines() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n(?: ?\n)+").ok()).as_ref()
}

/// Collapses runs of spaces, trims each line and keeps at most one blank
/// line between paragraphs.
#[must_use]
pub fn clean_text(text: &str) -> String {
    let spaced = match horizontal_space() {
        Some(re) => re.replace_all(text, " ").into_owned(),
        None => text.to_string(),
    };
    let joined = spaced.lines().map(str::trim).collect::<Vec<_>>().join("\n");
    match blank_lines() {
        Some(re) => re.replace_all(&joined, "\n\n").trim().to_string(),
        None => joined.trim().to_string(),
    }
}

/// Reads `documents`, writes `chunks`, `chunk_count` and `processed_documents`.
///
/// Text is split recursively on the configured separators so that no chunk
/// exceeds `chunk_size` characters, then neighbouring pieces are merged with
/// `chunk_overlap` characters of overlap. Markdown files use heading-aware
/// separators. Image documents become a single chunk.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    name: String,
    options: SplitterOptions,
    enabled: bool,
}

impl TextSplitter {
    /// Creates a splitter, rejecting an overlap that is not smaller than the
    /// chunk size.
    pub fn new(name: impl Into<String>, options: SplitterOptions) -> Result<Self, ConfigValidationError> {
        let name = name.into();
        options.validate(&name)?;
        Ok(Self {
            name,
            options,
            enabled: true,
        })
    }

    /// Sets whether the splitter is enabled.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Splits a single document into chunks.
    #[must_use]
    pub fn split_document(&self, document: &Document) -> Vec<Chunk> {
        if document.modality() == Modality::Image {
            return vec![Chunk::whole(document)];
        }

        let is_markdown = matches!(
            document.metadata_str("file_type"),
            Some(".md" | ".markdown")
        );
        let separators = if is_markdown {
            markdown_separators()
        } else {
            self.options.separators.clone()
        };

        let text = document.content();
        let pieces = split_recursive(text, 0, text.len(), &separators, self.options.chunk_size);
        let windows = merge_pieces(text, &pieces, self.options.chunk_size, self.options.chunk_overlap);

        let spans: Vec<(usize, usize)> = windows
            .into_iter()
            .filter_map(|(start, end)| trim_span(text, start, end))
            .filter(|&(start, end)| text[start..end].chars().count() >= self.options.min_chunk_length)
            .collect();

        let total = spans.len();
        spans
            .into_iter()
            .enumerate()
            .filter_map(|(i, (start, end))| Chunk::from_document(document, start, end, i, total))
            .collect()
    }
}

fn char_len(text: &str, start: usize, end: usize) -> usize {
    text[start..end].chars().count()
}

/// Splits `text[start..end]` into contiguous pieces of at most `limit`
/// characters, preferring the earliest separator that works.
fn split_recursive(
    text: &str,
    start: usize,
    end: usize,
    separators: &[String],
    limit: usize,
) -> Vec<(usize, usize)> {
    if char_len(text, start, end) <= limit {
        return vec![(start, end)];
    }

    let Some((sep, rest)) = separators.split_first() else {
        return hard_split(text, start, end, limit);
    };

    let segment = &text[start..end];
    if sep.is_empty() || !segment.contains(sep.as_str()) {
        return split_recursive(text, start, end, rest, limit);
    }

    let mut pieces = Vec::new();
    let mut piece_start = start;
    for (offset, matched) in segment.match_indices(sep.as_str()) {
        let piece_end = start + offset + matched.len();
        if piece_end > piece_start {
            pieces.extend(split_recursive(text, piece_start, piece_end, rest, limit));
        }
        piece_start = piece_end;
    }
    if piece_start < end {
        pieces.extend(split_recursive(text, piece_start, end, rest, limit));
    }
    pieces
}

fn hard_split(text: &str, start: usize, end: usize, limit: usize) -> Vec<(usize, usize)> {
    let mut pieces = Vec::new();
    let mut piece_start = start;
    let mut count = 0;
    for (offset, _) in text[start..end].char_indices() {
        if count == limit {
            pieces.push((piece_start, start + offset));
            piece_start = start + offset;
            count = 0;
        }
        count += 1;
    }
    if piece_start < end {
        pieces.push((piece_start, end));
    }
    pieces
}

/// Greedily packs pieces into windows of at most `limit` characters. Each
/// new window starts with the trailing pieces of the previous one that fit
/// in `overlap` characters.
fn merge_pieces(text: &str, pieces: &[(usize, usize)], limit: usize, overlap: usize) -> Vec<(usize, usize)> {
    let mut windows = Vec::new();
    let mut current: Vec<(usize, usize)> = Vec::new();
    let mut current_len = 0;

    for &(start, end) in pieces {
        let len = char_len(text, start, end);
        if current_len + len > limit && !current.is_empty() {
            if let (Some(first), Some(last)) = (current.first(), current.last()) {
                windows.push((first.0, last.1));
            }
            while !current.is_empty() && (current_len > overlap || current_len + len > limit) {
                let (s, e) = current.remove(0);
                current_len -= char_len(text, s, e);
            }
        }
        current.push((start, end));
        current_len += len;
    }
    if let (Some(first), Some(last)) = (current.first(), current.last()) {
        windows.push((first.0, last.1));
    }
    windows
}

fn trim_span(text: &str, start: usize, end: usize) -> Option<(usize, usize)> {
    let slice = &text[start..end];
    let leading = slice.len() - slice.trim_start().len();
    let trailing = slice.len() - slice.trim_end().len();
    let (s, e) = (start + leading, end - trailing);
    (s < e).then_some((s, e))
}

#[async_trait]
impl PipelineComponent for TextSplitter {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_keys(&self) -> Vec<String> {
        vec!["documents".to_string()]
    }

    fn provided_keys(&self) -> Vec<String> {
        vec![
            "chunks".to_string(),
            "chunk_count".to_string(),
            "processed_documents".to_string(),
        ]
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn process(&self, ctx: &mut RunContext) -> Result<(), ComponentError> {
        let documents = ctx.require_documents(&self.name, "documents")?;

        let mut processed = Vec::with_capacity(documents.len());
        let mut chunks = Vec::new();
        for doc in documents {
            let doc = if self.options.clean_text && doc.modality() != Modality::Image {
                doc.derive(clean_text(doc.content()))
            } else {
                doc.clone()
            };
            chunks.extend(self.split_document(&doc));
            processed.push(doc);
        }

        info!(
            component = %self.name,
            documents = processed.len(),
            chunks = chunks.len(),
            "Split documents"
        );
        ctx.insert("processed_documents", processed);
        ctx.insert("chunk_count", chunks.len());
        ctx.insert("chunks", chunks);
        Ok(())
    }
}
