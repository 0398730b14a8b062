//! Step registry and the step-view adapter

use tracing::{debug, warn};

use super::{FormController, FormError, FormSnapshot, FormValue, StepCommit, StepId, StepOptions};
use crate::form::types::Step;

impl<V: FormValue, P: FormValue> FormController<V, P> {
    /// Register a mounted step.
    ///
    /// The returned guard is the unregister function: dropping it (or calling
    /// [`StepGuard::unregister`]) removes the first entry with this id.
    ///
    /// The `is_done` predicate is evaluated here under the state write lock;
    /// see [`StepOptions::is_done`].
    pub fn register(
        &self,
        id: impl Into<StepId>,
        options: StepOptions<V>,
    ) -> Result<StepGuard<V, P>, FormError> {
        let id = id.into();
        let mut rejected = false;

        self.state().send_if_modified(|state| {
            if state.has_step(&id) {
                if state.settings.reject_duplicate_steps {
                    rejected = true;
                    return false;
                }
                warn!(form = %self.id(), step = %id, "duplicate step registration");
            }
            let step = Step::new(id.clone(), options, &state.value);
            state.steps.push(step);
            true
        });

        if rejected {
            warn!(form = %self.id(), step = %id, "rejected duplicate step registration");
            return Err(FormError::DuplicateStep(id));
        }

        debug!(form = %self.id(), step = %id, "step registered");
        Ok(StepGuard {
            form: self.clone(),
            id,
            active: true,
        })
    }

    /// Remove the first registered step with `id`. Returns false if none matched.
    pub(crate) fn unregister(&self, id: &StepId) -> bool {
        let removed = self.state().send_if_modified(|state| {
            match state.steps.iter().position(|step| &step.id == id) {
                Some(index) => {
                    state.steps.remove(index);
                    true
                }
                None => false,
            }
        });
        if removed {
            debug!(form = %self.id(), step = %id, "step unregistered");
        }
        removed
    }
}

/// Keeps a step registered for as long as it lives
#[must_use = "dropping the guard unregisters the step"]
pub struct StepGuard<V: FormValue, P: FormValue> {
    form: FormController<V, P>,
    id: StepId,
    active: bool,
}

impl<V: FormValue, P: FormValue> StepGuard<V, P> {
    pub fn id(&self) -> &StepId {
        &self.id
    }

    pub fn form(&self) -> &FormController<V, P> {
        &self.form
    }

    /// Remove the step from the registry now
    pub fn unregister(mut self) -> bool {
        self.release()
    }

    fn release(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.form.unregister(&self.id)
    }
}

impl<V: FormValue, P: FormValue> Drop for StepGuard<V, P> {
    fn drop(&mut self) {
        self.release();
    }
}

/// A view that only renders while its step is the current one
#[derive(Debug, Clone)]
pub struct FormStep<W> {
    id: StepId,
    view: W,
}

impl<W> FormStep<W> {
    pub fn new(id: impl Into<StepId>, view: W) -> Self {
        Self {
            id: id.into(),
            view,
        }
    }

    pub fn id(&self) -> &StepId {
        &self.id
    }

    /// Register with the form; the step stays registered until unmounted
    pub fn mount<V: FormValue, P: FormValue>(
        self,
        form: &FormController<V, P>,
        options: StepOptions<V>,
    ) -> Result<MountedStep<W, V, P>, FormError> {
        let guard = form.register(self.id, options)?;
        Ok(MountedStep {
            view: self.view,
            guard,
        })
    }
}

/// A registered step with its view
pub struct MountedStep<W, V: FormValue, P: FormValue> {
    view: W,
    guard: StepGuard<V, P>,
}

impl<W, V: FormValue, P: FormValue> MountedStep<W, V, P> {
    pub fn id(&self) -> &StepId {
        self.guard.id()
    }

    pub fn is_current(&self) -> bool {
        self.guard.form().current_step_id().as_ref() == Some(self.id())
    }

    /// The view, if this step is current
    pub fn view(&self) -> Option<&W> {
        self.is_current().then_some(&self.view)
    }

    /// The view, if this step is current in `snapshot`
    pub fn view_in(&self, snapshot: &FormSnapshot<V, P>) -> Option<&W> {
        snapshot.is_current(self.id()).then_some(&self.view)
    }

    /// Merge this step's fields into the form value
    pub async fn submit(&self, merge: impl FnOnce(&V) -> V) -> StepCommit<V> {
        self.guard.form().submit_step(self.id(), merge).await
    }

    /// Unregister and hand the view back
    pub fn unmount(self) -> W {
        let MountedStep { view, guard } = self;
        guard.unregister();
        view
    }
}
