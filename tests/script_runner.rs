//! Wizard scripts loaded from disk

use std::fs;

use serde_json::json;

use formflow::config::FormConfig;
use formflow::form::{Payload, StepId};
use formflow::script::{run_script, WizardScript};

const VOLUNTEER_YAML: &str = r"
initial:
  source: newsletter
auto_advance: true
steps:
  - id: contact
    label: Contact details
    required: [email]
  - id: skills
    required: [skills]
  - id: review
actions:
  - action: submit
    step: contact
    values:
      email: ana@example.org
  - action: submit
    step: skills
    values:
      skills: [carpentry]
  - action: submit
    step: review
";

#[tokio::test]
async fn test_yaml_script_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("volunteer.yml");
    fs::write(&path, VOLUNTEER_YAML).unwrap();

    let script = WizardScript::load(&path).unwrap();
    let report = run_script(&script, FormConfig::default()).await.unwrap();
    let form = report.form;

    assert_eq!(form.step_ids(), vec!["contact", "skills", "review"]);
    assert_eq!(form.current_step_id, Some(StepId::from("review")));
    assert!(form.submitted);
    assert_eq!(
        form.payload,
        Some(Payload::Value(json!({
            "source": "newsletter",
            "email": "ana@example.org",
            "skills": ["carpentry"],
        })))
    );
    // The review step has no predicate; it is done because it was submitted
    let review = form.step("review").unwrap();
    assert!(review.submitted && review.done);
}

#[tokio::test]
async fn test_unmount_then_finish() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.toml");
    fs::write(
        &path,
        r#"
        [[steps]]
        id = "contact"
        required = ["email"]

        [[steps]]
        id = "skills"

        [[actions]]
        action = "unmount"
        step = "skills"

        [[actions]]
        action = "navigate"
        step = "contact"

        [[actions]]
        action = "finish"
        "#,
    )
    .unwrap();

    let script = WizardScript::load(&path).unwrap();
    let report = run_script(&script, FormConfig::default()).await.unwrap();

    assert_eq!(report.form.step_ids(), vec!["contact"]);
    assert!(report.form.submitted);
    assert_eq!(report.form.payload, Some(Payload::Value(json!({}))));
}

#[tokio::test]
async fn test_duplicate_steps_follow_settings() {
    let script = WizardScript::from_str_with_format(
        r#"{"steps": [{"id": "a"}, {"id": "a"}]}"#,
        "json",
    )
    .unwrap();

    assert!(run_script(&script, FormConfig::default()).await.is_err());

    let tolerant = FormConfig {
        reject_duplicate_steps: false,
        ..FormConfig::default()
    };
    let report = run_script(&script, tolerant).await.unwrap();
    assert_eq!(report.form.step_ids(), vec!["a", "a"]);
}

#[test]
fn test_missing_file_reports_path() {
    let err = WizardScript::load(std::path::Path::new("/nonexistent/wizard.toml")).unwrap_err();
    assert!(err.to_string().contains("/nonexistent/wizard.toml"));
}
