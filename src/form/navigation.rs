//! Current-step resolution and navigation

use tracing::debug;

use super::{FormController, FormValue, StepId};

impl<V: FormValue, P: FormValue> FormController<V, P> {
    /// Request a different current step.
    ///
    /// No-op when `id` is already current, apart from dropping a pending
    /// request while pinned. While pinned to an external step id only
    /// `on_step_id_change` fires and the parent decides whether to re-pin;
    /// otherwise the internal step id is updated as well.
    pub fn set_current_step_id(&self, id: impl Into<StepId>) {
        let id = id.into();
        let mut notify = false;

        self.state().send_if_modified(|state| {
            if state.current_step_id() == Some(&id) {
                // Asking for the pinned step withdraws any other request
                state.requested_step_id = None;
                return false;
            }
            if state.pinned_step_id.is_some() {
                if state.requested_step_id.as_ref() != Some(&id) {
                    state.requested_step_id = Some(id.clone());
                    notify = true;
                }
                // Pinned: nothing observable changed
                return false;
            }
            state.internal_step_id = Some(id.clone());
            notify = true;
            true
        });

        if notify {
            debug!(form = %self.id(), step = %id, "step change requested");
            self.hooks().on_step_id_change(&id);
        }
    }

    /// Pin the current step to an externally controlled id, or release the pin.
    ///
    /// Returns true if the pin changed.
    pub fn pin_step_id(&self, id: Option<StepId>) -> bool {
        self.state().send_if_modified(|state| {
            if state.pinned_step_id == id {
                return false;
            }
            debug!(form = %self.id(), pinned = ?id, "step pin changed");
            state.pinned_step_id = id;
            state.requested_step_id = None;
            true
        })
    }

    /// Id of the step requested while pinned and not yet honoured by the parent
    pub fn requested_step_id(&self) -> Option<StepId> {
        self.state().borrow().requested_step_id.clone()
    }
}
