//! Pipeline builder with configuration-time validation.

use super::Pipeline;
use crate::components::PipelineComponent;
use crate::errors::{ConfigValidationError, ConfigViolation, ErrorInfo};
use crate::events::EventSink;
use crate::ranking::SimilarityMetric;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Collects components and validates them into a [`Pipeline`].
///
/// A builder corresponds to the `Created` state; a successful
/// [`build`](Self::build) yields a `Configured` pipeline.
#[derive(Default)]
pub struct PipelineBuilder {
    name: String,
    components: Vec<Arc<dyn PipelineComponent>>,
    component_timeout: Option<Duration>,
    event_sink: Option<Arc<dyn EventSink>>,
}

impl fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("name", &self.name)
            .field("components", &self.component_names())
            .field("component_timeout", &self.component_timeout)
            .finish_non_exhaustive()
    }
}

impl PipelineBuilder {
    /// Starts a builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Appends a component.
    #[must_use]
    pub fn component(mut self, component: Arc<dyn PipelineComponent>) -> Self {
        self.components.push(component);
        self
    }

    /// Appends several components in order.
    #[must_use]
    pub fn components(mut self, components: impl IntoIterator<Item = Arc<dyn PipelineComponent>>) -> Self {
        self.components.extend(components);
        self
    }

    /// Fails any component whose `process` runs longer than `timeout`.
    #[must_use]
    pub fn component_timeout(mut self, timeout: Duration) -> Self {
        self.component_timeout = Some(timeout);
        self
    }

    /// Sends lifecycle events to `sink` instead of the global sink.
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn component_names(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.name()).collect()
    }

    /// Validates and builds the pipeline.
    ///
    /// Rejects an empty name, an empty component list, duplicate instance
    /// names, and enabled components that disagree on the similarity metric.
    /// All violations are reported together.
    pub fn build(self) -> Result<Pipeline, ConfigValidationError> {
        let mut violations = Vec::new();

        if self.name.trim().is_empty() {
            violations.push(violation("name", "pipeline name cannot be empty"));
        }
        if self.components.is_empty() {
            violations.push(violation("components", "pipeline has no components"));
        }

        let mut seen = HashSet::new();
        for component in &self.components {
            if !seen.insert(component.name()) {
                violations.push(violation(
                    "components",
                    format!("component name '{}' is used more than once", component.name()),
                ));
            }
        }

        let mut metric: Option<(&str, SimilarityMetric)> = None;
        for component in self.components.iter().filter(|c| c.is_enabled()) {
            let Some(m) = component.similarity_metric() else {
                continue;
            };
            match metric {
                None => metric = Some((component.name(), m)),
                Some((first, expected)) if expected != m => violations.push(violation(
                    "similarity_metric",
                    format!(
                        "'{}' uses {m} but '{first}' uses {expected}; one pipeline scores with one metric",
                        component.name()
                    ),
                )),
                Some(_) => {}
            }
        }

        let metric = metric.map(|(_, m)| m);
        if !violations.is_empty() {
            let target = if self.name.is_empty() { "pipeline".to_string() } else { self.name };
            return Err(ConfigValidationError::from_violations(target.clone(), violations)
                .with_error_info(
                    ErrorInfo::new("PIPELINE-001-INVALID", "pipeline configuration rejected")
                        .with_context_entry("pipeline", target)
                        .with_fix_hint("Fix the listed problems before running the pipeline."),
                ));
        }

        Ok(Pipeline::configured(
            self.name,
            self.components,
            metric,
            self.component_timeout,
            self.event_sink,
        ))
    }
}

fn violation(option: &str, reason: impl Into<String>) -> ConfigViolation {
    ConfigViolation {
        option: option.to_string(),
        reason: reason.into(),
    }
}
