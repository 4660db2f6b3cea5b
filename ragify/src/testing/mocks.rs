//! Scripted components and models for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

use crate::components::PipelineComponent;
use crate::context::{ContextValue, RunContext};
use crate::errors::{ComponentError, ComponentErrorKind, ProviderError};
use crate::providers::{GenerationRequest, LanguageModel, ModelReply};

/// A component that writes fixed values and records every context it sees.
#[derive(Debug)]
pub struct RecordingComponent {
    name: String,
    required: Vec<String>,
    writes: Vec<(String, ContextValue)>,
    removes: Vec<String>,
    enabled: bool,
    contexts: Mutex<Vec<RunContext>>,
}

impl RecordingComponent {
    /// Creates a component that reads nothing and writes nothing.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: Vec::new(),
            writes: Vec::new(),
            removes: Vec::new(),
            enabled: true,
            contexts: Mutex::new(Vec::new()),
        }
    }

    /// Writes `value` under `key` on every run.
    #[must_use]
    pub fn writing(mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.writes.push((key.into(), value.into()));
        self
    }

    /// Declares `key` as required.
    #[must_use]
    pub fn requiring(mut self, key: impl Into<String>) -> Self {
        self.required.push(key.into());
        self
    }

    /// Removes `key` without declaring it as provided.
    #[must_use]
    pub fn removing(mut self, key: impl Into<String>) -> Self {
        self.removes.push(key.into());
        self
    }

    /// Marks the component disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Returns the number of times `process` ran.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.contexts.lock().len()
    }

    /// Returns the context as it was on entry to each call.
    #[must_use]
    pub fn recorded_contexts(&self) -> Vec<RunContext> {
        self.contexts.lock().clone()
    }
}

#[async_trait]
impl PipelineComponent for RecordingComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_keys(&self) -> Vec<String> {
        self.required.clone()
    }

    fn provided_keys(&self) -> Vec<String> {
        self.writes.iter().map(|(k, _)| k.clone()).collect()
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn process(&self, ctx: &mut RunContext) -> Result<(), ComponentError> {
        self.contexts.lock().push(ctx.clone());
        for key in &self.removes {
            ctx.remove(key);
        }
        for (key, value) in &self.writes {
            ctx.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}

/// A component that always fails with the given cause.
#[derive(Debug)]
pub struct FailingComponent {
    name: String,
    cause: String,
}

impl FailingComponent {
    /// Creates a failing component.
    #[must_use]
    pub fn new(name: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cause: cause.into(),
        }
    }
}

#[async_trait]
impl PipelineComponent for FailingComponent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, _ctx: &mut RunContext) -> Result<(), ComponentError> {
        Err(ComponentError::new(&self.name, ComponentErrorKind::Other, &self.cause))
    }
}

/// A component that sleeps before succeeding.
#[derive(Debug)]
pub struct SlowComponent {
    name: String,
    delay: Duration,
}

impl SlowComponent {
    /// Creates a slow component.
    #[must_use]
    pub fn new(name: impl Into<String>, delay: Duration) -> Self {
        Self {
            name: name.into(),
            delay,
        }
    }
}

#[async_trait]
impl PipelineComponent for SlowComponent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, _ctx: &mut RunContext) -> Result<(), ComponentError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

/// A language model that plays back queued replies in order.
///
/// Every request is recorded. Once the queue is empty, `generate` fails.
#[derive(Debug, Default)]
pub struct ScriptedLanguageModel {
    replies: Mutex<VecDeque<ModelReply>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedLanguageModel {
    /// Creates a model that will answer with `replies`.
    #[must_use]
    pub fn new(replies: impl IntoIterator<Item = ModelReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Returns every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }

    /// Returns the number of replies still queued.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.replies.lock().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedLanguageModel {
    fn model_id(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<ModelReply, ProviderError> {
        self.requests.lock().push(request.clone());
        let reply = self.replies.lock().pop_front();
        reply.ok_or_else(|| ProviderError::request("scripted", "no scripted reply left"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_model_runs_dry() {
        let model = ScriptedLanguageModel::new([ModelReply::text("one")]);
        let request = GenerationRequest::from_prompt("hi");

        assert_eq!(model.generate(&request).await.unwrap().content, "one");
        assert!(model.generate(&request).await.is_err());
        assert_eq!(model.requests().len(), 2);
        assert_eq!(model.remaining(), 0);
    }

    #[tokio::test]
    async fn test_recording_component_removes_then_writes() {
        let component = RecordingComponent::new("r").removing("old").writing("new", 1_i64);
        let mut ctx = RunContext::new().with("old", "x");

        component.process(&mut ctx).await.unwrap();

        assert!(!ctx.contains_key("old"));
        assert_eq!(ctx.integer("new"), Some(1));
        assert_eq!(component.provided_keys(), vec!["new".to_string()]);
        assert_eq!(component.recorded_contexts()[0].text("old"), Some("x"));
    }
}
