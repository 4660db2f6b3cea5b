//! Pipeline assembly and execution.
//!
//! A [`Pipeline`] is a fixed, ordered list of components. A run threads one
//! [`RunContext`] through every enabled component in order and stops at the
//! first failure, returning a [`PipelineError`] that carries the context
//! accumulated so far.

mod builder;
mod report;
mod spec;
mod summary;
mod variants;
mod workflow;

#[cfg(test)]
mod integration_tests;

pub use builder::PipelineBuilder;
pub use report::{PipelineRun, RunReport, StepRecord};
pub use spec::PipelineSpec;
pub use summary::{IndexingSummary, QuerySummary};
pub use variants::{create_pipeline, create_registered_pipeline, PipelineKind};
pub use workflow::{RagWorkflow, WorkflowRun};

use crate::components::PipelineComponent;
use crate::context::{RunContext, RunIdentity};
use crate::core::{ComponentStatus, PipelineState};
use crate::errors::{ComponentError, ComponentErrorKind, PipelineError, RagifyError};
use crate::events::{self, EventSink};
use crate::ranking::SimilarityMetric;
use crate::registry::ComponentRegistry;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// An ordered sequence of components sharing one run context.
///
/// The component list is fixed once built. Runs are independent: each
/// starts from the caller's initial context, and the instance keeps no
/// per-run data besides its last observed [`PipelineState`]. Distinct runs
/// may proceed concurrently from separate tasks.
pub struct Pipeline {
    name: String,
    components: Vec<Arc<dyn PipelineComponent>>,
    metric: Option<SimilarityMetric>,
    component_timeout: Option<Duration>,
    event_sink: Option<Arc<dyn EventSink>>,
    state: Mutex<PipelineState>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("components", &self.component_names())
            .field("metric", &self.metric)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Starts a [`PipelineBuilder`].
    #[must_use]
    pub fn builder(name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder::new(name)
    }

    /// Resolves every component in `spec` through `registry`, then builds.
    ///
    /// All components are created and validated before the pipeline exists,
    /// so a bad entry anywhere fails before any run can start.
    pub fn from_spec(spec: &PipelineSpec, registry: &ComponentRegistry) -> Result<Self, RagifyError> {
        let components = spec
            .components
            .iter()
            .map(|config| registry.create_from(config))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(pipeline = %spec.name, components = components.len(), "Resolved pipeline spec");
        Ok(PipelineBuilder::new(&spec.name).components(components).build()?)
    }

    pub(crate) fn configured(
        name: String,
        components: Vec<Arc<dyn PipelineComponent>>,
        metric: Option<SimilarityMetric>,
        component_timeout: Option<Duration>,
        event_sink: Option<Arc<dyn EventSink>>,
    ) -> Self {
        Self {
            name,
            components,
            metric,
            component_timeout,
            event_sink,
            state: Mutex::new(PipelineState::Configured),
        }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the state observed after the most recent transition.
    #[must_use]
    pub fn state(&self) -> PipelineState {
        *self.state.lock()
    }

    /// Returns the similarity metric shared by the scoring components.
    #[must_use]
    pub fn metric(&self) -> Option<SimilarityMetric> {
        self.metric
    }

    /// Returns every component name in execution order, including disabled
    /// ones.
    #[must_use]
    pub fn component_names(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.name()).collect()
    }

    /// Returns the number of configured components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns true if no components are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    fn sink(&self) -> Arc<dyn EventSink> {
        self.event_sink.clone().unwrap_or_else(events::get_event_sink)
    }

    fn set_state(&self, state: PipelineState) {
        *self.state.lock() = state;
    }

    /// Runs every enabled component in order against `initial`.
    pub async fn run(&self, initial: RunContext) -> Result<PipelineRun, PipelineError> {
        self.run_with_identity(RunIdentity::new(&self.name), initial).await
    }

    /// Runs with a caller-supplied identity, such as one tied to an agent
    /// session.
    pub async fn run_with_identity(
        &self,
        identity: RunIdentity,
        initial: RunContext,
    ) -> Result<PipelineRun, PipelineError> {
        let sink = self.sink();
        let run_id = identity.run_id;
        let started = Instant::now();
        let mut ctx = initial;
        let mut steps = Vec::with_capacity(self.components.len());
        let mut executed = Vec::new();

        self.set_state(PipelineState::Running);
        info!(pipeline = %self.name, run_id = %run_id, "Pipeline started");
        sink.emit(
            events::PIPELINE_STARTED,
            json!({"run": identity.to_json(), "components": self.component_names()}),
        )
        .await;

        for component in &self.components {
            let name = component.name().to_string();
            if !component.is_enabled() {
                debug!(pipeline = %self.name, component = %name, "Component disabled, skipping");
                sink.emit(events::COMPONENT_SKIPPED, json!({"run_id": run_id.to_string(), "component": name}))
                    .await;
                steps.push(StepRecord::skipped(name));
                continue;
            }

            sink.emit(events::COMPONENT_STARTED, json!({"run_id": run_id.to_string(), "component": name}))
                .await;
            let step_started = Instant::now();
            let outcome = self.run_component(component.as_ref(), &mut ctx).await;
            let duration_ms = step_started.elapsed().as_secs_f64() * 1000.0;

            match outcome {
                Ok(keys_written) => {
                    debug!(
                        pipeline = %self.name,
                        component = %name,
                        duration_ms,
                        keys = ?keys_written,
                        "Component completed"
                    );
                    sink.emit(
                        events::COMPONENT_COMPLETED,
                        json!({
                            "run_id": run_id.to_string(),
                            "component": name,
                            "duration_ms": duration_ms,
                            "keys_written": keys_written,
                        }),
                    )
                    .await;
                    steps.push(StepRecord {
                        component: name.clone(),
                        status: ComponentStatus::Completed,
                        duration_ms,
                        keys_written,
                        error: None,
                    });
                    executed.push(name);
                }
                Err(source) => {
                    self.set_state(PipelineState::Failed);
                    warn!(
                        pipeline = %self.name,
                        component = %name,
                        run_id = %run_id,
                        error = %source,
                        "Component failed"
                    );
                    sink.emit(
                        events::COMPONENT_FAILED,
                        json!({
                            "run_id": run_id.to_string(),
                            "component": name,
                            "kind": source.kind,
                            "key": source.key,
                            "error": source.cause,
                        }),
                    )
                    .await;
                    sink.emit(
                        events::PIPELINE_FAILED,
                        json!({
                            "run_id": run_id.to_string(),
                            "pipeline": self.name,
                            "failed_component": name,
                            "executed": executed,
                        }),
                    )
                    .await;
                    return Err(PipelineError {
                        pipeline: self.name.clone(),
                        run_id,
                        executed,
                        source,
                        partial_context: ctx,
                    });
                }
            }
        }

        let report = RunReport {
            steps,
            duration_ms: started.elapsed().as_secs_f64() * 1000.0,
        };
        self.set_state(PipelineState::Completed);
        info!(
            pipeline = %self.name,
            run_id = %run_id,
            duration_ms = report.duration_ms,
            "Pipeline completed"
        );
        sink.emit(
            events::PIPELINE_COMPLETED,
            json!({
                "run_id": run_id.to_string(),
                "pipeline": self.name,
                "executed": report.executed(),
                "skipped": report.skipped(),
                "duration_ms": report.duration_ms,
            }),
        )
        .await;

        Ok(PipelineRun {
            identity,
            context: ctx,
            report,
        })
    }

    /// Runs from a JSON object and returns the final context as JSON.
    pub async fn run_json(&self, input: serde_json::Value) -> Result<serde_json::Value, PipelineError> {
        let run = self.run(RunContext::from_json(input)).await?;
        Ok(run.context.to_json())
    }

    /// Checks the input contract, runs `process` and checks the output
    /// contract. Returns the keys the component added or replaced.
    async fn run_component(
        &self,
        component: &dyn PipelineComponent,
        ctx: &mut RunContext,
    ) -> Result<Vec<String>, ComponentError> {
        for key in component.required_keys() {
            ctx.require(component.name(), &key)?;
        }

        let before = ctx.key_set();
        match self.component_timeout {
            Some(limit) => tokio::time::timeout(limit, component.process(ctx))
                .await
                .map_err(|_| {
                    ComponentError::new(
                        component.name(),
                        ComponentErrorKind::Timeout,
                        format!("exceeded {} ms", limit.as_millis()),
                    )
                })??,
            None => component.process(ctx).await?,
        }

        let provided: BTreeSet<String> = component.provided_keys().into_iter().collect();
        if let Some(removed) = before
            .iter()
            .find(|k| !ctx.contains_key(k) && !provided.contains(*k))
        {
            return Err(ComponentError::new(
                component.name(),
                ComponentErrorKind::RemovedKey,
                "removed a key it does not provide",
            )
            .with_key(removed.clone()));
        }

        Ok(ctx
            .key_set()
            .into_iter()
            .filter(|k| !before.contains(k) || provided.contains(k))
            .collect())
    }
}
