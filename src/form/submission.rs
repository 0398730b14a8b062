//! Step submits and the terminal submit pipeline

use tracing::{debug, info, instrument, warn};

use super::{FormController, FormError, FormValue, Payload, Step, StepCommit, StepId, SubmitFailure};

impl<V: FormValue, P: FormValue> FormController<V, P> {
    /// Merge a step's fields into the accumulated value.
    ///
    /// The matching step is marked submitted and every step's `done` flag is
    /// re-evaluated against the new value. `on_step_submit` runs only after
    /// the update is committed, so it observes the new steps and value.
    ///
    /// An id with no registered step still merges the value but leaves every
    /// step's flags untouched; the commit is reported with `matched == false`.
    ///
    /// `merge` and the steps' `is_done` predicates run while the form state is
    /// locked for writing. They must not call back into this controller
    /// (`value()`, `steps()`, `snapshot()`, ...); doing so deadlocks. Read
    /// the current value from the closure argument instead.
    pub async fn submit_step(
        &self,
        step_id: impl Into<StepId>,
        merge: impl FnOnce(&V) -> V,
    ) -> StepCommit<V> {
        let step_id = step_id.into();
        let mut matched = false;
        let mut committed = None;

        self.state().send_modify(|state| {
            let next = merge(&state.value);
            state.value = next;
            matched = state.has_step(&step_id);
            if matched {
                for step in &mut state.steps {
                    if step.id == step_id {
                        step.submitted = true;
                    }
                    step.refresh_done(&state.value);
                }
            }
            committed = Some(state.value.clone());
        });

        let value = committed.unwrap_or_else(|| self.value());

        if matched {
            debug!(form = %self.id(), step = %step_id, "step submitted");
        } else {
            warn!(form = %self.id(), step = %step_id, "submit for unregistered step");
        }

        let ctx = StepSubmitContext {
            form: self.clone(),
            value: value.clone(),
        };
        self.hooks().on_step_submit(&step_id, &value, ctx).await;

        StepCommit {
            step_id,
            matched,
            value,
        }
    }

    /// Terminal submit: hand `value` to `on_submit` and record the outcome.
    ///
    /// Failures never propagate; they are captured into the payload and
    /// `failed_to_submit`. The only error is a second submit while one is
    /// still in flight.
    #[instrument(skip(self, value), fields(form = %self.id()))]
    pub async fn submit(&self, value: V) -> Result<Payload<P>, FormError> {
        let mut in_flight = false;
        self.state().send_if_modified(|state| {
            if state.is_submitting {
                in_flight = true;
                return false;
            }
            state.is_submitting = true;
            state.submitted = false;
            state.failed_to_submit = false;
            true
        });
        if in_flight {
            warn!("terminal submit already in flight");
            return Err(FormError::SubmitInFlight);
        }

        info!("terminal submit started");
        let mut pending = PendingSubmit {
            form: self,
            settled: false,
        };

        let ctx = SubmitContext { form: self.clone() };
        let payload = match self.hooks().on_submit(value, ctx).await {
            Ok(payload) => payload,
            Err(err) => Payload::Error(SubmitFailure::from(err)),
        };
        let failed = payload.is_error();

        self.state().send_modify(|state| {
            state.is_submitting = false;
            state.submitted = true;
            state.failed_to_submit = failed;
            state.payload = Some(payload.clone());
        });
        pending.settled = true;

        match payload.failure() {
            Some(failure) => warn!(error = %failure, "terminal submit failed"),
            None => info!("terminal submit succeeded"),
        }
        Ok(payload)
    }
}

/// Clears `is_submitting` and any earlier payload if the submit future is
/// dropped before settling
struct PendingSubmit<'a, V: FormValue, P: FormValue> {
    form: &'a FormController<V, P>,
    settled: bool,
}

impl<V: FormValue, P: FormValue> Drop for PendingSubmit<'_, V, P> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        warn!(form = %self.form.id(), "terminal submit abandoned before settling");
        self.form.state().send_modify(|state| {
            state.is_submitting = false;
            state.payload = None;
        });
    }
}

/// Context handed to `on_submit`
pub struct SubmitContext<V: FormValue, P: FormValue> {
    form: FormController<V, P>,
}

impl<V: FormValue, P: FormValue> SubmitContext<V, P> {
    pub fn set_current_step_id(&self, id: impl Into<StepId>) {
        self.form.set_current_step_id(id);
    }
}

/// Context handed to `on_step_submit`, observed after the step commit
pub struct StepSubmitContext<V: FormValue, P: FormValue> {
    form: FormController<V, P>,
    value: V,
}

impl<V: FormValue, P: FormValue> StepSubmitContext<V, P> {
    pub fn steps(&self) -> Vec<Step<V>> {
        self.form.steps()
    }

    pub fn current_step_id(&self) -> Option<StepId> {
        self.form.current_step_id()
    }

    pub fn is_submitting(&self) -> bool {
        self.form.is_submitting()
    }

    /// True when every registered step is done
    pub fn all_done(&self) -> bool {
        self.form.steps().iter().all(|step| step.done)
    }

    pub fn set_current_step_id(&self, id: impl Into<StepId>) {
        self.form.set_current_step_id(id);
    }

    /// Terminal submit bound to the value this step submit produced
    pub async fn submit(&self) -> Result<Payload<P>, FormError> {
        self.form.submit(self.value.clone()).await
    }

    pub fn form(&self) -> &FormController<V, P> {
        &self.form
    }
}
