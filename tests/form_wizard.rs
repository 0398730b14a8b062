//! End-to-end wizard flows through the public form API
//!
//! Uses a typed application value rather than JSON to check that the
//! orchestrator stays generic over the accumulated value and payload.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use formflow::config::FormConfig;
use formflow::form::{
    FormController, FormError, FormHooks, FormStep, Payload, StepId, StepOptions,
    StepSubmitContext, SubmitContext,
};

#[derive(Debug, Clone, Default, PartialEq)]
struct Application {
    name: Option<String>,
    causes: Vec<String>,
    hours: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
struct Receipt {
    reference: u32,
    causes: usize,
}

/// Advances through `order` after each step submit and files the
/// application once every step is done
#[derive(Clone, Default)]
struct Signup {
    order: Vec<&'static str>,
    filed: Arc<Mutex<Vec<Application>>>,
    requested: Arc<Mutex<Vec<String>>>,
}

impl Signup {
    fn new(order: &[&'static str]) -> Self {
        Self {
            order: order.to_vec(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl FormHooks<Application, Receipt> for Signup {
    async fn on_submit(
        &self,
        value: Application,
        _ctx: SubmitContext<Application, Receipt>,
    ) -> anyhow::Result<Payload<Receipt>> {
        if value.hours == Some(0) {
            anyhow::bail!("at least one hour is required");
        }
        let receipt = Receipt {
            reference: 1000 + self.filed.lock().unwrap().len() as u32,
            causes: value.causes.len(),
        };
        self.filed.lock().unwrap().push(value);
        Ok(Payload::Value(receipt))
    }

    async fn on_step_submit(
        &self,
        step_id: &StepId,
        _value: &Application,
        ctx: StepSubmitContext<Application, Receipt>,
    ) {
        if ctx.all_done() {
            let _ = ctx.submit().await;
            return;
        }
        let position = self.order.iter().position(|id| step_id == id);
        if let Some(next) = position.and_then(|i| self.order.get(i + 1)) {
            ctx.set_current_step_id(*next);
        }
    }

    fn on_step_id_change(&self, step_id: &StepId) {
        self.requested.lock().unwrap().push(step_id.to_string());
    }
}

fn profile_done() -> StepOptions<Application> {
    StepOptions::new()
        .label("About you")
        .is_done(|app: &Application| app.name.is_some())
}

fn causes_done() -> StepOptions<Application> {
    StepOptions::new()
        .label("Causes")
        .is_done(|app: &Application| !app.causes.is_empty())
}

fn hours_done() -> StepOptions<Application> {
    StepOptions::new()
        .label("Availability")
        .is_done(|app: &Application| app.hours.is_some())
}

#[tokio::test]
async fn test_three_step_signup_files_application() {
    let hooks = Signup::new(&["profile", "causes", "hours"]);
    let filed = Arc::clone(&hooks.filed);
    let form = FormController::new(Application::default(), hooks);

    let profile = FormStep::new("profile", "ProfileView")
        .mount(&form, profile_done())
        .unwrap();
    let causes = FormStep::new("causes", "CausesView")
        .mount(&form, causes_done())
        .unwrap();
    let hours = FormStep::new("hours", "HoursView")
        .mount(&form, hours_done())
        .unwrap();

    // Only the current step renders
    assert_eq!(profile.view(), Some(&"ProfileView"));
    assert_eq!(causes.view(), None);

    let commit = profile
        .submit(|app| Application {
            name: Some("Ana".into()),
            ..app.clone()
        })
        .await;
    assert!(commit.matched);
    assert!(causes.is_current());

    causes
        .submit(|app| Application {
            causes: vec!["literacy".into(), "parks".into()],
            ..app.clone()
        })
        .await;
    assert!(hours.is_current());

    hours
        .submit(|app| Application {
            hours: Some(6),
            ..app.clone()
        })
        .await;

    let snapshot = form.snapshot();
    assert!(snapshot.submitted);
    assert!(!snapshot.failed_to_submit);
    assert_eq!(
        snapshot.payload,
        Some(Payload::Value(Receipt {
            reference: 1000,
            causes: 2
        }))
    );
    assert!(snapshot.steps.iter().all(|step| step.done));

    let filed = filed.lock().unwrap();
    assert_eq!(filed.len(), 1);
    assert_eq!(filed[0].name.as_deref(), Some("Ana"));
}

#[tokio::test]
async fn test_rejected_application_is_retryable() {
    let form = FormController::new(Application::default(), Signup::new(&["hours"]));
    let hours = FormStep::new("hours", ()).mount(&form, hours_done()).unwrap();

    hours
        .submit(|app| Application {
            hours: Some(0),
            ..app.clone()
        })
        .await;
    let snapshot = form.snapshot();
    assert!(snapshot.submitted);
    assert!(snapshot.failed_to_submit);
    assert_eq!(
        snapshot.payload.as_ref().and_then(|p| p.failure()).map(|f| f.message.as_str()),
        Some("at least one hour is required")
    );

    hours
        .submit(|app| Application {
            hours: Some(2),
            ..app.clone()
        })
        .await;
    let snapshot = form.snapshot();
    assert!(!snapshot.failed_to_submit);
    assert!(snapshot.payload.is_some_and(|p| !p.is_error()));
}

#[tokio::test]
async fn test_unmounting_removes_step() {
    let form = FormController::new(Application::default(), Signup::new(&[]));
    let profile = FormStep::new("profile", "ProfileView")
        .mount(&form, profile_done())
        .unwrap();
    let causes = FormStep::new("causes", "CausesView")
        .mount(&form, causes_done())
        .unwrap();

    assert_eq!(profile.unmount(), "ProfileView");
    assert_eq!(form.snapshot().step_ids(), vec!["causes"]);
    // Falls back to the remaining first step
    assert!(causes.is_current());

    drop(causes);
    assert!(form.steps().is_empty());
    assert_eq!(form.current_step_id(), None);
}

#[tokio::test]
async fn test_duplicate_mount_rejected() {
    let form = FormController::new(Application::default(), Signup::new(&[]));
    let _first = FormStep::new("profile", ()).mount(&form, profile_done()).unwrap();

    let err = FormStep::new("profile", ())
        .mount(&form, profile_done())
        .err()
        .unwrap();
    assert_eq!(err, FormError::DuplicateStep(StepId::from("profile")));
    assert_eq!(form.steps().len(), 1);
}

#[tokio::test]
async fn test_parent_controls_pinned_wizard() {
    let hooks = Signup::new(&["profile", "causes"]);
    let requested = Arc::clone(&hooks.requested);
    let form = FormController::with_settings(
        Application::default(),
        hooks,
        Some(StepId::from("profile")),
        FormConfig::default(),
    );
    let profile = FormStep::new("profile", ()).mount(&form, profile_done()).unwrap();
    let causes = FormStep::new("causes", ()).mount(&form, causes_done()).unwrap();

    profile
        .submit(|app| Application {
            name: Some("Ana".into()),
            ..app.clone()
        })
        .await;

    // The request reached the parent but the pin still holds
    assert!(profile.is_current());
    assert_eq!(*requested.lock().unwrap(), vec!["causes"]);
    assert_eq!(form.requested_step_id(), Some(StepId::from("causes")));

    // Asking again for the same step does not notify twice
    form.set_current_step_id("causes");
    assert_eq!(requested.lock().unwrap().len(), 1);

    // Parent honours the request
    assert!(form.pin_step_id(Some(StepId::from("causes"))));
    assert!(causes.is_current());
    assert_eq!(form.requested_step_id(), None);
}

#[tokio::test]
async fn test_subscriber_sees_each_commit() {
    let form = FormController::new(Application::default(), Signup::new(&["profile", "causes"]));
    let mut updates = form.subscribe();

    let profile = FormStep::new("profile", ()).mount(&form, profile_done()).unwrap();
    let snapshot = updates.changed().await.unwrap();
    assert_eq!(snapshot.step_ids(), vec!["profile"]);
    assert_eq!(snapshot.current_step_id, Some(StepId::from("profile")));

    form.submit_step("profile", |app| Application {
        name: Some("Lee".into()),
        ..app.clone()
    })
    .await;
    let snapshot = updates.changed().await.unwrap();
    assert_eq!(snapshot.value.name.as_deref(), Some("Lee"));
    assert!(snapshot.submitted);

    drop(profile);
    drop(form);
    // The unregister is still delivered after the form is gone
    let last = updates.changed().await.unwrap();
    assert!(last.steps.is_empty());
    assert!(updates.changed().await.is_none());
}
