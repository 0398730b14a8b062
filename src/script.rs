//! Scripted wizard runs.
//!
//! A script declares the steps of a wizard and a sequence of user actions.
//! Running it drives a [`FormController`] exactly as mounted step views
//! would, which makes it useful for reproducing form flows from the CLI.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::FormConfig;
use crate::form::value::{has_fields, merge_fields};
use crate::form::{
    FormController, FormError, FormHooks, FormSnapshot, Payload, StepGuard, StepId, StepOptions,
    StepSubmitContext, SubmitContext,
};

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("unsupported script format '{0}' (expected toml, json, yaml or yml)")]
    UnsupportedFormat(String),

    #[error("script refers to unknown step '{0}'")]
    UnknownStep(String),

    #[error(transparent)]
    Form(#[from] FormError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WizardScript {
    /// Starting value of the form
    #[serde(default = "empty_object")]
    pub initial: Value,
    pub steps: Vec<ScriptStep>,
    /// Pin the form to this step (controlled mode)
    #[serde(default)]
    pub pinned: Option<String>,
    /// Advance to the next step after each step submit, and submit the form
    /// once every step is done
    #[serde(default)]
    pub auto_advance: bool,
    /// Make the terminal submit resolve with this error
    #[serde(default)]
    pub fail_with: Option<String>,
    #[serde(default)]
    pub actions: Vec<ScriptAction>,
}

fn empty_object() -> Value {
    json!({})
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptStep {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    /// Fields that must be present for the step to count as done
    #[serde(default)]
    pub required: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScriptAction {
    /// Merge `values` into the form as `step`
    Submit {
        step: String,
        #[serde(default = "empty_object")]
        values: Value,
    },
    Navigate {
        step: String,
    },
    /// Remove a mounted step
    Unmount {
        step: String,
    },
    /// Terminal submit of the current value
    Finish,
}

impl WizardScript {
    pub fn from_str_with_format(content: &str, format: &str) -> Result<Self> {
        let script = match format {
            "toml" => toml::from_str(content).context("Failed to parse TOML script")?,
            "json" => serde_json::from_str(content).context("Failed to parse JSON script")?,
            "yaml" | "yml" => {
                serde_yaml::from_str(content).context("Failed to parse YAML script")?
            }
            other => return Err(ScriptError::UnsupportedFormat(other.to_string()).into()),
        };
        Ok(script)
    }

    /// Load a script, picking the format from the file extension
    pub fn load(path: &Path) -> Result<Self> {
        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script {}", path.display()))?;
        Self::from_str_with_format(&content, &format)
            .with_context(|| format!("Invalid script {}", path.display()))
    }
}

/// What a script run produced
#[derive(Debug, Clone, Serialize)]
pub struct ScriptReport {
    pub form: FormSnapshot<Value, Value>,
    /// Step submits that matched no mounted step
    pub unmatched: Vec<String>,
    /// Step id requested while pinned and never re-pinned
    pub requested: Option<StepId>,
}

struct ScriptHooks {
    order: Vec<StepId>,
    auto_advance: bool,
    fail_with: Option<String>,
}

#[async_trait]
impl FormHooks<Value, Value> for ScriptHooks {
    async fn on_submit(
        &self,
        value: Value,
        _ctx: SubmitContext<Value, Value>,
    ) -> anyhow::Result<Payload<Value>> {
        Ok(match &self.fail_with {
            Some(message) => Payload::error(message.clone()),
            None => Payload::Value(value),
        })
    }

    async fn on_step_submit(
        &self,
        step_id: &StepId,
        _value: &Value,
        ctx: StepSubmitContext<Value, Value>,
    ) {
        if !self.auto_advance {
            return;
        }
        if ctx.all_done() {
            if let Err(err) = ctx.submit().await {
                debug!(error = %err, "auto submit skipped");
            }
            return;
        }
        let next = self
            .order
            .iter()
            .skip_while(|id| *id != step_id)
            .nth(1);
        if let Some(next) = next {
            ctx.set_current_step_id(next);
        }
    }

    fn on_step_id_change(&self, step_id: &StepId) {
        info!(step = %step_id, "step change requested");
    }
}

/// Drive a form through `script`
pub async fn run_script(
    script: &WizardScript,
    settings: FormConfig,
) -> Result<ScriptReport, ScriptError> {
    let hooks = ScriptHooks {
        order: script.steps.iter().map(|s| StepId::new(&s.id)).collect(),
        auto_advance: script.auto_advance,
        fail_with: script.fail_with.clone(),
    };
    let form = FormController::with_settings(
        script.initial.clone(),
        hooks,
        script.pinned.clone().map(StepId::from),
        settings,
    );

    let mut mounted: Vec<StepGuard<Value, Value>> = Vec::new();
    for step in &script.steps {
        let mut options = StepOptions::new();
        if let Some(label) = &step.label {
            options = options.label(label.clone());
        }
        if !step.required.is_empty() {
            let required = step.required.clone();
            options = options.is_done(move |value: &Value| has_fields(value, &required));
        }
        mounted.push(form.register(step.id.as_str(), options)?);
    }

    let mut unmatched = Vec::new();
    for action in &script.actions {
        match action {
            ScriptAction::Submit { step, values } => {
                let commit = form
                    .submit_step(step.as_str(), |value: &Value| merge_fields(value, values))
                    .await;
                if !commit.matched {
                    unmatched.push(step.clone());
                }
            }
            ScriptAction::Navigate { step } => form.set_current_step_id(step.as_str()),
            ScriptAction::Unmount { step } => {
                let index = mounted
                    .iter()
                    .position(|guard| guard.id() == step.as_str())
                    .ok_or_else(|| ScriptError::UnknownStep(step.clone()))?;
                mounted.remove(index).unregister();
            }
            ScriptAction::Finish => {
                form.submit(form.value()).await?;
            }
        }
    }

    Ok(ScriptReport {
        form: form.snapshot(),
        unmatched,
        requested: form.requested_step_id(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNUP: &str = r#"
        auto_advance = true

        [[steps]]
        id = "profile"
        label = "About you"
        required = ["name"]

        [[steps]]
        id = "availability"
        required = ["hours"]

        [[actions]]
        action = "submit"
        step = "profile"
        values = { name = "Ana" }

        [[actions]]
        action = "submit"
        step = "availability"
        values = { hours = 4 }
    "#;

    #[test]
    fn test_parse_toml_script() {
        let script = WizardScript::from_str_with_format(SIGNUP, "toml").unwrap();
        assert_eq!(script.steps.len(), 2);
        assert_eq!(script.steps[0].required, vec!["name"]);
        assert!(matches!(
            &script.actions[0],
            ScriptAction::Submit { step, .. } if step == "profile"
        ));
        assert_eq!(script.initial, json!({}));
    }

    #[test]
    fn test_parse_yaml_script() {
        let yaml = r"
steps:
  - id: contact
actions:
  - action: navigate
    step: contact
  - action: finish
";
        let script = WizardScript::from_str_with_format(yaml, "yaml").unwrap();
        assert!(matches!(script.actions[1], ScriptAction::Finish));
    }

    #[test]
    fn test_unknown_format_rejected() {
        let err = WizardScript::from_str_with_format("", "ini").unwrap_err();
        assert!(err.to_string().contains("unsupported script format"));
    }

    #[tokio::test]
    async fn test_auto_advance_submits_when_all_done() {
        let script = WizardScript::from_str_with_format(SIGNUP, "toml").unwrap();
        let report = run_script(&script, FormConfig::default()).await.unwrap();

        let form = report.form;
        assert!(form.submitted);
        assert!(!form.failed_to_submit);
        assert_eq!(
            form.payload,
            Some(Payload::Value(json!({"name": "Ana", "hours": 4})))
        );
        assert_eq!(form.current_step_id, Some(StepId::from("availability")));
        assert!(report.unmatched.is_empty());
    }

    #[tokio::test]
    async fn test_soft_failure_and_unmatched_submit() {
        let mut script = WizardScript::from_str_with_format(SIGNUP, "toml").unwrap();
        script.auto_advance = false;
        script.fail_with = Some("project is full".to_string());
        script.actions.push(ScriptAction::Submit {
            step: "ghost".to_string(),
            values: json!({"extra": true}),
        });
        script.actions.push(ScriptAction::Finish);

        let report = run_script(&script, FormConfig::default()).await.unwrap();
        assert_eq!(report.unmatched, vec!["ghost"]);
        assert!(report.form.failed_to_submit);
        assert_eq!(report.form.payload, Some(Payload::error("project is full")));
        assert_eq!(report.form.value["extra"], true);
    }

    #[tokio::test]
    async fn test_pinned_script_records_request() {
        let mut script = WizardScript::from_str_with_format(SIGNUP, "toml").unwrap();
        script.pinned = Some("profile".to_string());

        let report = run_script(&script, FormConfig::default()).await.unwrap();
        // Nobody re-pinned, so the advance stays a pending request
        assert_eq!(report.form.current_step_id, Some(StepId::from("profile")));
        assert_eq!(report.requested, Some(StepId::from("availability")));
        assert!(report.form.submitted);
    }

    #[tokio::test]
    async fn test_unmount_unknown_step_errors() {
        let mut script = WizardScript::from_str_with_format(SIGNUP, "toml").unwrap();
        script.actions = vec![ScriptAction::Unmount {
            step: "nope".to_string(),
        }];
        let err = run_script(&script, FormConfig::default()).await.unwrap_err();
        assert!(matches!(err, ScriptError::UnknownStep(step) if step == "nope"));
    }

    #[test]
    fn test_load_picks_format_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signup.json");
        std::fs::write(
            &path,
            r#"{"steps": [{"id": "a"}], "actions": [{"action": "finish"}]}"#,
        )
        .unwrap();

        let script = WizardScript::load(&path).unwrap();
        assert_eq!(script.steps[0].id, "a");
    }
}
