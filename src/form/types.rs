//! Type definitions for the multi-step form orchestrator

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bounds shared by accumulated values and terminal payloads
pub trait FormValue: Clone + Send + Sync + 'static {}

impl<T> FormValue for T where T: Clone + Send + Sync + 'static {}

/// Stable identifier of a form step
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(String);

impl StepId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StepId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for StepId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&StepId> for StepId {
    fn from(id: &StepId) -> Self {
        id.clone()
    }
}

impl PartialEq<str> for StepId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for StepId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Predicate deciding whether a step's slice of the value is complete
pub type DonePredicate<V> = Arc<dyn Fn(&V) -> bool + Send + Sync>;

/// Per-step configuration supplied at registration
#[derive(Serialize)]
pub struct StepOptions<V> {
    #[serde(skip)]
    is_done: Option<DonePredicate<V>>,
    /// Human-readable label for progress indicators
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Free-form configuration owned by the step's view
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub meta: serde_json::Value,
}

impl<V> StepOptions<V> {
    pub fn new() -> Self {
        Self {
            is_done: None,
            label: None,
            meta: serde_json::Value::Null,
        }
    }

    /// Attach a completion predicate.
    ///
    /// The predicate runs while the form state is locked for writing and must
    /// only look at the value it is given; calling back into the
    /// `FormController` from inside it deadlocks.
    pub fn is_done(mut self, predicate: impl Fn(&V) -> bool + Send + Sync + 'static) -> Self {
        self.is_done = Some(Arc::new(predicate));
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = meta;
        self
    }

    pub fn has_predicate(&self) -> bool {
        self.is_done.is_some()
    }

    /// Run the predicate against a value, if one was supplied
    pub fn evaluate(&self, value: &V) -> Option<bool> {
        self.is_done.as_ref().map(|predicate| predicate(value))
    }
}

impl<V> Default for StepOptions<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for StepOptions<V> {
    fn clone(&self) -> Self {
        Self {
            is_done: self.is_done.clone(),
            label: self.label.clone(),
            meta: self.meta.clone(),
        }
    }
}

impl<V> fmt::Debug for StepOptions<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepOptions")
            .field("is_done", &self.is_done.as_ref().map(|_| "<predicate>"))
            .field("label", &self.label)
            .field("meta", &self.meta)
            .finish()
    }
}

/// One registered stage of the wizard
#[derive(Debug, Clone, Serialize)]
pub struct Step<V> {
    pub id: StepId,
    pub options: StepOptions<V>,
    /// Set once the step's local submit fired
    pub submitted: bool,
    /// Predicate result, or `submitted` when the step has no predicate
    pub done: bool,
}

impl<V> Step<V> {
    pub(crate) fn new(id: StepId, options: StepOptions<V>, value: &V) -> Self {
        let done = options.evaluate(value).unwrap_or(false);
        Self {
            id,
            options,
            submitted: false,
            done,
        }
    }

    pub(crate) fn refresh_done(&mut self, value: &V) {
        self.done = self.options.evaluate(value).unwrap_or(self.submitted);
    }
}

/// Captured failure of a terminal submit
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct SubmitFailure {
    pub message: String,
}

impl SubmitFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for SubmitFailure {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{err:#}"))
    }
}

/// Result of a terminal submit.
///
/// A submit handler may "fail softly" by resolving with `Payload::Error`
/// instead of returning `Err`; both end up flagged as failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Payload<P> {
    Value(P),
    Error(SubmitFailure),
}

impl<P> Payload<P> {
    pub fn error(message: impl Into<String>) -> Self {
        Payload::Error(SubmitFailure::new(message))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Payload::Error(_))
    }

    pub fn value(&self) -> Option<&P> {
        match self {
            Payload::Value(value) => Some(value),
            Payload::Error(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&SubmitFailure> {
        match self {
            Payload::Value(_) => None,
            Payload::Error(failure) => Some(failure),
        }
    }
}

/// Outcome of a per-step submit
#[derive(Debug, Clone)]
pub struct StepCommit<V> {
    pub step_id: StepId,
    /// False when no registered step carries `step_id`
    pub matched: bool,
    /// Accumulated value after the merge
    pub value: V,
}

/// Errors raised by structural misuse of the orchestrator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("step '{0}' is already registered")]
    DuplicateStep(StepId),

    #[error("a terminal submit is already in flight")]
    SubmitInFlight,
}
