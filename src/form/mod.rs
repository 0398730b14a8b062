//! Multi-step form orchestration.
//!
//! A [`FormController`] owns the state of one wizard: the registry of mounted
//! steps, the accumulated value, the current step and the terminal submit
//! status. Steps and views receive the controller explicitly and only mutate
//! through `register`, `submit_step`, `submit` and `set_current_step_id`.
//!
//! State lives in a `tokio::sync::watch` channel, so every mutation is
//! serialized through one entry point and subscribers see each commit.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::watch;
use uuid::Uuid;

use crate::config::FormConfig;

mod navigation;
mod step;
mod submission;
pub mod types;
pub mod value;

pub use step::{FormStep, MountedStep, StepGuard};
pub use submission::{StepSubmitContext, SubmitContext};
pub use types::*;


/// Callbacks supplied by the owner of a form
#[async_trait]
pub trait FormHooks<V: FormValue, P: FormValue>: Send + Sync {
    /// Terminal submit. `Err` and `Ok(Payload::Error(_))` both mark the form
    /// as failed to submit.
    async fn on_submit(&self, value: V, ctx: SubmitContext<V, P>) -> anyhow::Result<Payload<P>>;

    /// Runs after a step submit has been committed
    async fn on_step_submit(&self, _step_id: &StepId, _value: &V, _ctx: StepSubmitContext<V, P>) {}

    /// A different step was requested
    fn on_step_id_change(&self, _step_id: &StepId) {}
}

/// Aggregate state of one form instance
#[derive(Debug, Clone)]
pub struct FormState<V, P> {
    pub(crate) steps: Vec<Step<V>>,
    pub(crate) internal_step_id: Option<StepId>,
    pub(crate) pinned_step_id: Option<StepId>,
    /// Last id forwarded to the parent while pinned
    pub(crate) requested_step_id: Option<StepId>,
    pub(crate) value: V,
    pub(crate) payload: Option<Payload<P>>,
    pub(crate) is_submitting: bool,
    pub(crate) submitted: bool,
    pub(crate) failed_to_submit: bool,
    pub(crate) settings: FormConfig,
}

impl<V: Clone, P: Clone> FormState<V, P> {
    fn new(value: V, pinned_step_id: Option<StepId>, settings: FormConfig) -> Self {
        Self {
            steps: Vec::new(),
            internal_step_id: None,
            pinned_step_id,
            requested_step_id: None,
            value,
            payload: None,
            is_submitting: false,
            submitted: false,
            failed_to_submit: false,
            settings,
        }
    }

    pub fn steps(&self) -> &[Step<V>] {
        &self.steps
    }

    pub fn step(&self, id: &StepId) -> Option<&Step<V>> {
        self.steps.iter().find(|step| &step.id == id)
    }

    pub fn has_step(&self, id: &StepId) -> bool {
        self.steps.iter().any(|step| &step.id == id)
    }

    /// Resolve the current step: pinned, then internal, then first registered
    pub fn current_step_id(&self) -> Option<&StepId> {
        self.pinned_step_id
            .as_ref()
            .or(self.internal_step_id.as_ref())
            .or_else(|| {
                if self.settings.fall_back_to_first_step {
                    self.steps.first().map(|step| &step.id)
                } else {
                    None
                }
            })
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned_step_id.is_some()
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn payload(&self) -> Option<&Payload<P>> {
        self.payload.as_ref()
    }

    pub fn is_submitting(&self) -> bool {
        self.is_submitting
    }

    pub fn submitted(&self) -> bool {
        self.submitted
    }

    pub fn failed_to_submit(&self) -> bool {
        self.failed_to_submit
    }

    pub fn snapshot(&self) -> FormSnapshot<V, P> {
        FormSnapshot {
            steps: self.steps.clone(),
            current_step_id: self.current_step_id().cloned(),
            value: self.value.clone(),
            payload: self.payload.clone(),
            is_submitting: self.is_submitting,
            submitted: self.submitted,
            failed_to_submit: self.failed_to_submit,
        }
    }
}

/// Read-only copy of the form state handed to views
#[derive(Debug, Clone, Serialize)]
pub struct FormSnapshot<V, P> {
    pub steps: Vec<Step<V>>,
    pub current_step_id: Option<StepId>,
    pub value: V,
    pub payload: Option<Payload<P>>,
    pub is_submitting: bool,
    pub submitted: bool,
    pub failed_to_submit: bool,
}

impl<V, P> FormSnapshot<V, P> {
    pub fn step(&self, id: &str) -> Option<&Step<V>> {
        self.steps.iter().find(|step| step.id == id)
    }

    pub fn is_current(&self, id: &StepId) -> bool {
        self.current_step_id.as_ref() == Some(id)
    }

    /// Ids in registration order
    pub fn step_ids(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.id.as_str()).collect()
    }
}

/// Receives a fresh snapshot after every committed mutation
pub struct FormSubscription<V, P> {
    rx: watch::Receiver<FormState<V, P>>,
}

impl<V: Clone, P: Clone> FormSubscription<V, P> {
    pub fn current(&self) -> FormSnapshot<V, P> {
        self.rx.borrow().snapshot()
    }

    /// Wait for the next commit. `None` once the controller is gone.
    pub async fn changed(&mut self) -> Option<FormSnapshot<V, P>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().snapshot())
    }
}

struct Inner<V: FormValue, P: FormValue> {
    id: Uuid,
    state: watch::Sender<FormState<V, P>>,
    hooks: Arc<dyn FormHooks<V, P>>,
}

/// Shared handle to one form instance
pub struct FormController<V: FormValue, P: FormValue> {
    inner: Arc<Inner<V, P>>,
}

impl<V: FormValue, P: FormValue> Clone for FormController<V, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: FormValue, P: FormValue> fmt::Debug for FormController<V, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("FormController")
            .field("id", &self.inner.id)
            .field("steps", &state.steps.len())
            .field("current_step_id", &state.current_step_id())
            .field("is_submitting", &state.is_submitting)
            .finish()
    }
}

impl<V: FormValue, P: FormValue> FormController<V, P> {
    /// Create an uncontrolled form with default settings
    pub fn new(default_value: V, hooks: impl FormHooks<V, P> + 'static) -> Self {
        Self::with_settings(default_value, hooks, None, FormConfig::default())
    }

    /// Create a form, optionally pinned to an externally controlled step id
    pub fn with_settings(
        default_value: V,
        hooks: impl FormHooks<V, P> + 'static,
        step_id: Option<StepId>,
        settings: FormConfig,
    ) -> Self {
        let (state, _rx) = watch::channel(FormState::new(default_value, step_id, settings));
        let id = Uuid::new_v4();
        tracing::debug!(form = %id, "form created");
        Self {
            inner: Arc::new(Inner {
                id,
                state,
                hooks: Arc::new(hooks),
            }),
        }
    }

    /// Instance id used in log fields
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn snapshot(&self) -> FormSnapshot<V, P> {
        self.inner.state.borrow().snapshot()
    }

    pub fn subscribe(&self) -> FormSubscription<V, P> {
        FormSubscription {
            rx: self.inner.state.subscribe(),
        }
    }

    pub fn value(&self) -> V {
        self.inner.state.borrow().value.clone()
    }

    pub fn steps(&self) -> Vec<Step<V>> {
        self.inner.state.borrow().steps.clone()
    }

    pub fn current_step_id(&self) -> Option<StepId> {
        self.inner.state.borrow().current_step_id().cloned()
    }

    pub fn is_submitting(&self) -> bool {
        self.inner.state.borrow().is_submitting
    }

    pub(crate) fn state(&self) -> &watch::Sender<FormState<V, P>> {
        &self.inner.state
    }

    pub(crate) fn hooks(&self) -> &dyn FormHooks<V, P> {
        self.inner.hooks.as_ref()
    }
}
