//! Loads text and image files into documents.

use super::PipelineComponent;
use crate::context::RunContext;
use crate::core::{Document, Metadata, Modality};
use crate::errors::{ComponentError, ComponentErrorKind};
use crate::registry::{ComponentFactory, ConfigSchema, OptionSpec, ResolvedConfig};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const OCR_SIDECAR_SUFFIX: &str = ".ocr.txt";

fn default_true() -> bool {
    true
}

fn default_text_extensions() -> Vec<String> {
    [".txt", ".md", ".markdown", ".rst", ".csv", ".json", ".html", ".log"]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

fn default_image_extensions() -> Vec<String> {
    [".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp"]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

fn default_max_image_bytes() -> u64 {
    5 * 1024 * 1024
}

/// Options for [`DocumentLoader`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoaderOptions {
    /// Explicit files to load. Overridden by a `file_paths` context key.
    #[serde(default)]
    pub file_paths: Vec<String>,
    /// Directory to walk. Overridden by a `directory_path` context key.
    #[serde(default)]
    pub directory_path: Option<String>,
    /// Descend into subdirectories.
    #[serde(default = "default_true")]
    pub recursive: bool,
    /// Follow symbolic links while walking.
    #[serde(default)]
    pub follow_symlinks: bool,
    /// Extensions (with dot) picked up as text when walking a directory.
    #[serde(default = "default_text_extensions")]
    pub text_extensions: Vec<String>,
    /// Load image files as image or mixed documents.
    #[serde(default)]
    pub multimodal: bool,
    /// Extensions (with dot) treated as images.
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
    /// Embed image bytes as base64 in metadata.
    #[serde(default = "default_true")]
    pub embed_images: bool,
    /// Images up to this size are embedded as base64 in metadata.
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,
    /// Read `<image>.ocr.txt` sidecars as the image's text.
    #[serde(default = "default_true")]
    pub ocr_enabled: bool,
    /// Log and skip unreadable files instead of failing.
    #[serde(default)]
    pub skip_errors: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            file_paths: Vec::new(),
            directory_path: None,
            recursive: true,
            follow_symlinks: false,
            text_extensions: default_text_extensions(),
            multimodal: false,
            image_extensions: default_image_extensions(),
            embed_images: true,
            max_image_bytes: default_max_image_bytes(),
            ocr_enabled: true,
            skip_errors: false,
        }
    }
}

pub(crate) fn schema() -> ConfigSchema {
    ConfigSchema::new()
        .option(OptionSpec::string_list("file_paths").default_value(json!([])))
        .option(OptionSpec::string("directory_path"))
        .option(OptionSpec::boolean("recursive").default_value(json!(true)))
        .option(OptionSpec::boolean("follow_symlinks").default_value(json!(false)))
        .option(OptionSpec::string_list("text_extensions").default_value(json!(default_text_extensions())))
        .option(OptionSpec::boolean("multimodal").default_value(json!(false)))
        .option(OptionSpec::string_list("image_extensions").default_value(json!(default_image_extensions())))
        .option(OptionSpec::boolean("embed_images").default_value(json!(true)))
        .option(
            OptionSpec::integer("max_image_bytes")
                .default_value(json!(default_max_image_bytes()))
                .min(0.0),
        )
        .option(OptionSpec::boolean("ocr_enabled").default_value(json!(true)))
        .option(OptionSpec::boolean("skip_errors").default_value(json!(false)))
}

pub(crate) fn factory() -> ComponentFactory {
    Arc::new(|cfg: &ResolvedConfig| {
        let options: LoaderOptions = cfg.deserialize()?;
        Ok(Arc::new(DocumentLoader::new(&cfg.instance_name, options).enabled(cfg.enabled()))
            as Arc<dyn PipelineComponent>)
    })
}

#[derive(Debug, Default)]
struct LoadStats {
    files_seen: usize,
    skipped: Vec<String>,
    by_type: BTreeMap<String, usize>,
}

/// Loads files into `documents`.
///
/// Reads `file_paths` / `directory_path` from the context when present,
/// otherwise from its options. With neither, the load is empty. Also writes
/// `loader_stats`.
#[derive(Debug, Clone)]
pub struct DocumentLoader {
    name: String,
    options: LoaderOptions,
    enabled: bool,
}

impl DocumentLoader {
    /// Creates a loader.
    #[must_use]
    pub fn new(name: impl Into<String>, options: LoaderOptions) -> Self {
        Self {
            name: name.into(),
            options,
            enabled: true,
        }
    }

    /// Sets whether the loader is enabled.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    fn has_extension(path: &Path, extensions: &[String]) -> bool {
        let ext = extension_of(path);
        extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext))
    }

    fn walk(&self, dir: &Path) -> Result<Vec<PathBuf>, ComponentError> {
        if !dir.is_dir() {
            return Err(ComponentError::new(
                &self.name,
                ComponentErrorKind::Io,
                format!("directory does not exist: {}", dir.display()),
            )
            .with_key("directory_path"));
        }

        let mut walker = WalkDir::new(dir)
            .follow_links(self.options.follow_symlinks)
            .sort_by_file_name();
        if !self.options.recursive {
            walker = walker.max_depth(1);
        }

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| {
                ComponentError::new(&self.name, ComponentErrorKind::Io, e.to_string())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if is_ocr_sidecar(path) {
                continue;
            }
            let is_text = Self::has_extension(path, &self.options.text_extensions);
            let is_image = self.options.multimodal
                && Self::has_extension(path, &self.options.image_extensions);
            if is_text || is_image {
                files.push(path.to_path_buf());
            }
        }
        debug!(component = %self.name, dir = %dir.display(), files = files.len(), "Walked directory");
        Ok(files)
    }

    async fn load_file(&self, path: &Path) -> Result<Option<Document>, ComponentError> {
        let file_type = extension_of(path);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            ComponentError::new(
                &self.name,
                ComponentErrorKind::Io,
                format!("{}: {e}", path.display()),
            )
        })?;

        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), json!(path.display().to_string()));
        metadata.insert("file_name".to_string(), json!(file_name));
        metadata.insert("file_type".to_string(), json!(file_type));
        metadata.insert("file_size".to_string(), json!(bytes.len()));

        if Self::has_extension(path, &self.options.image_extensions) {
            if !self.options.multimodal {
                warn!(component = %self.name, path = %path.display(), "Skipping image, multimodal loading is off");
                return Ok(None);
            }
            return Ok(Some(self.image_document(path, &file_name, &bytes, metadata).await));
        }

        let text = String::from_utf8_lossy(&bytes).into_owned();
        Ok(Some(Document::new(text, metadata)))
    }

    async fn image_document(
        &self,
        path: &Path,
        file_name: &str,
        bytes: &[u8],
        mut metadata: Metadata,
    ) -> Document {
        metadata.insert(
            "image_format".to_string(),
            json!(extension_of(path).trim_start_matches('.')),
        );
        if self.options.embed_images && bytes.len() as u64 <= self.options.max_image_bytes {
            metadata.insert(
                "image_base64".to_string(),
                json!(base64::engine::general_purpose::STANDARD.encode(bytes)),
            );
        }

        let ocr = if self.options.ocr_enabled {
            let sidecar = PathBuf::from(format!("{}{OCR_SIDECAR_SUFFIX}", path.display()));
            tokio::fs::read_to_string(&sidecar).await.ok()
        } else {
            None
        };
        match ocr {
            Some(ocr) if !ocr.trim().is_empty() => {
                let ocr = ocr.trim().to_string();
                let content = format!("[IMAGE] {file_name}\n\n{ocr}");
                metadata.insert("ocr_text".to_string(), json!(ocr));
                Document::with_modality(content, Modality::Mixed, metadata)
            }
            _ => Document::with_modality(format!("[IMAGE] {file_name}"), Modality::Image, metadata),
        }
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

fn is_ocr_sidecar(path: &Path) -> bool {
    path.to_string_lossy().ends_with(OCR_SIDECAR_SUFFIX)
}

#[async_trait]
impl PipelineComponent for DocumentLoader {
    fn name(&self) -> &str {
        &self.name
    }

    fn provided_keys(&self) -> Vec<String> {
        vec!["documents".to_string(), "loader_stats".to_string()]
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn process(&self, ctx: &mut RunContext) -> Result<(), ComponentError> {
        let file_paths = ctx
            .text_list("file_paths")
            .unwrap_or_else(|| self.options.file_paths.clone());
        let directory = ctx
            .text("directory_path")
            .map(str::to_string)
            .or_else(|| self.options.directory_path.clone());

        if file_paths.is_empty() && directory.is_none() {
            warn!(component = %self.name, "No file_paths or directory_path given, loading nothing");
        }

        let mut paths: Vec<PathBuf> = file_paths.iter().map(PathBuf::from).collect();
        if let Some(dir) = &directory {
            paths.extend(self.walk(Path::new(dir))?);
        }

        let mut stats = LoadStats::default();
        let mut documents = Vec::with_capacity(paths.len());
        for path in &paths {
            stats.files_seen += 1;
            match self.load_file(path).await {
                Ok(Some(doc)) => {
                    let file_type = doc.metadata_str("file_type").unwrap_or_default().to_string();
                    *stats.by_type.entry(file_type).or_default() += 1;
                    documents.push(doc);
                }
                Ok(None) => stats.skipped.push(path.display().to_string()),
                Err(e) if self.options.skip_errors => {
                    warn!(component = %self.name, error = %e, "Skipping unreadable file");
                    stats.skipped.push(path.display().to_string());
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            component = %self.name,
            files = stats.files_seen,
            documents = documents.len(),
            skipped = stats.skipped.len(),
            "Loaded documents"
        );
        ctx.insert(
            "loader_stats",
            json!({
                "files_seen": stats.files_seen,
                "documents_loaded": documents.len(),
                "document_count": documents.len(),
                "skipped": stats.skipped,
                "by_type": stats.by_type,
            }),
        );
        ctx.insert("documents", documents);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::write_text_fixtures;

    #[tokio::test]
    async fn test_loads_directory_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        write_text_fixtures(dir.path(), &[("b.txt", "second"), ("a.md", "first"), ("skip.bin", "x")]).unwrap();

        let loader = DocumentLoader::new(
            "loader",
            LoaderOptions {
                directory_path: Some(dir.path().display().to_string()),
                ..Default::default()
            },
        );
        let mut ctx = RunContext::new();
        loader.process(&mut ctx).await.unwrap();

        let docs = ctx.require_documents("test", "documents").unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].content(), "first");
        assert_eq!(docs[0].metadata_str("file_type"), Some(".md"));
        assert_eq!(docs[1].content(), "second");

        let stats = ctx.json("loader_stats").unwrap();
        assert_eq!(stats["documents_loaded"], 2);
    }

    #[tokio::test]
    async fn test_context_paths_override_options() {
        let dir = tempfile::tempdir().unwrap();
        write_text_fixtures(dir.path(), &[("one.txt", "one"), ("two.txt", "two")]).unwrap();
        let loader = DocumentLoader::new(
            "loader",
            LoaderOptions {
                file_paths: vec![dir.path().join("one.txt").display().to_string()],
                ..Default::default()
            },
        );

        let mut ctx = RunContext::new().with(
            "file_paths",
            vec![dir.path().join("two.txt").display().to_string()],
        );
        loader.process(&mut ctx).await.unwrap();

        let docs = ctx.require_documents("test", "documents").unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content(), "two");
    }

    #[tokio::test]
    async fn test_no_sources_is_empty_load() {
        let loader = DocumentLoader::new("loader", LoaderOptions::default());
        let mut ctx = RunContext::new();
        loader.process(&mut ctx).await.unwrap();

        assert!(ctx.require_documents("test", "documents").unwrap().is_empty());
        assert_eq!(ctx.json("loader_stats").unwrap()["files_seen"], 0);
    }

    #[tokio::test]
    async fn test_missing_directory_is_io_error() {
        let loader = DocumentLoader::new(
            "loader",
            LoaderOptions {
                directory_path: Some("/definitely/not/here".to_string()),
                ..Default::default()
            },
        );
        let err = loader.process(&mut RunContext::new()).await.unwrap_err();
        assert_eq!(err.kind, ComponentErrorKind::Io);
    }

    #[tokio::test]
    async fn test_skip_errors_skips_missing_file() {
        let loader = DocumentLoader::new(
            "loader",
            LoaderOptions {
                file_paths: vec!["/nope/missing.txt".to_string()],
                skip_errors: true,
                ..Default::default()
            },
        );
        let mut ctx = RunContext::new();
        loader.process(&mut ctx).await.unwrap();
        assert!(ctx.require_documents("test", "documents").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_images_with_and_without_ocr() {
        let dir = tempfile::tempdir().unwrap();
        write_text_fixtures(
            dir.path(),
            &[
                ("chart.png", "PNGDATA"),
                ("scan.png", "PNGDATA"),
                ("scan.png.ocr.txt", "Quarterly revenue grew."),
            ],
        ).unwrap();

        let loader = DocumentLoader::new(
            "loader",
            LoaderOptions {
                directory_path: Some(dir.path().display().to_string()),
                multimodal: true,
                ..Default::default()
            },
        );
        let mut ctx = RunContext::new();
        loader.process(&mut ctx).await.unwrap();

        let docs = ctx.require_documents("test", "documents").unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].modality(), Modality::Image);
        assert!(docs[0].metadata().contains_key("image_base64"));
        assert_eq!(docs[1].modality(), Modality::Mixed);
        assert!(docs[1].content().contains("Quarterly revenue grew."));
    }

    #[tokio::test]
    async fn test_images_ignored_when_not_multimodal() {
        let dir = tempfile::tempdir().unwrap();
        write_text_fixtures(dir.path(), &[("chart.png", "PNGDATA"), ("a.txt", "text")]).unwrap();

        let loader = DocumentLoader::new(
            "loader",
            LoaderOptions {
                directory_path: Some(dir.path().display().to_string()),
                ..Default::default()
            },
        );
        let mut ctx = RunContext::new();
        loader.process(&mut ctx).await.unwrap();
        assert_eq!(ctx.require_documents("test", "documents").unwrap().len(), 1);
    }
    #[tokio::test]
    async fn test_ocr_and_embedding_can_be_turned_off() {
        let dir = tempfile::tempdir().unwrap();
        write_text_fixtures(
            dir.path(),
            &[("scan.png", "PNGDATA"), ("scan.png.ocr.txt", "Hidden text.")],
        ).unwrap();

        let loader = DocumentLoader::new(
            "loader",
            LoaderOptions {
                directory_path: Some(dir.path().display().to_string()),
                multimodal: true,
                ocr_enabled: false,
                embed_images: false,
                ..Default::default()
            },
        );
        let mut ctx = RunContext::new();
        loader.process(&mut ctx).await.unwrap();

        let docs = ctx.require_documents("test", "documents").unwrap();
        assert_eq!(docs[0].modality(), Modality::Image);
        assert!(!docs[0].metadata().contains_key("image_base64"));
        assert!(!docs[0].content().contains("Hidden text."));
    }
}
