//! Stage executors and the model seam they call through.
//!
//! Each executor is a free function that drives one `StageMachine`:
//! check inputs, gather context, prompt the model, validate, then (and only
//! then) persist. Executors do not enforce the triage workflow; that is the
//! orchestrator's job.

pub mod assigner;
pub mod classifier;
pub mod router;

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::openai;
use tracing::{debug, warn};

use coordination::validate::ValidationResult;
use coordination::Stage;

use crate::config::TriageConfig;
use crate::errors::{TriageError, TriageResult};
use crate::prompts::{self, PROMPT_VERSION};
use crate::state_machine::{IllegalStageTransition, StageMachine, StageState};

pub use assigner::assign;
pub use classifier::classify;
pub use router::route;

/// One chat completion per stage invocation.
///
/// Trait exists so tests can inject a scripted model without an endpoint.
#[async_trait]
pub trait TriageModel: Send + Sync {
    async fn complete(&self, stage: Stage, preamble: &str, prompt: &str) -> TriageResult<String>;
}

/// Production model backed by a Rig OpenAI-compatible completions client.
///
/// A fresh agent is built per call, so concurrent stages share nothing but
/// the HTTP client.
pub struct RigTriageModel {
    client: openai::CompletionsClient,
    model: String,
    classifier_temperature: f64,
    router_temperature: f64,
    assigner_temperature: f64,
}

impl RigTriageModel {
    pub fn from_config(config: &TriageConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: config.model_client()?,
            model: config.model.model.clone(),
            classifier_temperature: config.classifier_temperature,
            router_temperature: config.router_temperature,
            assigner_temperature: config.assigner_temperature,
        })
    }

    fn temperature(&self, stage: Stage) -> f64 {
        match stage {
            Stage::Classification => self.classifier_temperature,
            Stage::Routing => self.router_temperature,
            Stage::Assignment => self.assigner_temperature,
        }
    }
}

#[async_trait]
impl TriageModel for RigTriageModel {
    async fn complete(&self, stage: Stage, preamble: &str, prompt: &str) -> TriageResult<String> {
        let agent = self
            .client
            .agent(&self.model)
            .name(&format!("{stage}-agent"))
            .preamble(preamble)
            .temperature(self.temperature(stage))
            .build();

        let response: String = agent
            .prompt(prompt)
            .await
            .map_err(|e| TriageError::ModelInvocation(e.to_string()))?;

        if response.trim().is_empty() {
            return Err(TriageError::ModelInvocation(format!(
                "empty {stage} reply from {}",
                self.model
            )));
        }
        Ok(response)
    }
}

/// Map a failure onto the machine before propagating it.
pub(crate) fn or_fail<T, E: Into<TriageError>>(
    sm: &mut StageMachine,
    result: Result<T, E>,
) -> TriageResult<T> {
    result.map_err(|e| {
        let err = e.into();
        sm.fail(&err.to_string());
        err
    })
}

/// Prompt the model: `Pending → Prompted → ModelResponded`.
pub(crate) async fn invoke(
    sm: &mut StageMachine,
    model: &dyn TriageModel,
    prompt: &str,
) -> TriageResult<String> {
    let stage = sm.stage();
    let preamble = prompts::system_prompt(stage);
    sm.advance(StageState::Prompted, None)?;
    debug!(
        ticket_id = %sm.ticket_id(),
        stage = %stage,
        prompt_version = PROMPT_VERSION,
        prompt_chars = prompt.len(),
        "Invoking model"
    );

    match model.complete(stage, &preamble, prompt).await {
        Ok(reply) => {
            sm.advance(StageState::ModelResponded, None)?;
            Ok(reply)
        }
        Err(e) => {
            warn!(
                ticket_id = %sm.ticket_id(),
                stage = %stage,
                prompt_version = PROMPT_VERSION,
                elapsed_ms = sm.elapsed_ms(),
                "Model invocation failed: {e}"
            );
            sm.fail(&e.to_string());
            Err(e)
        }
    }
}

/// Accept or reject a validated reply: `ModelResponded → Validated | Failed`.
pub(crate) fn accept<T>(sm: &mut StageMachine, outcome: ValidationResult<T>) -> TriageResult<T> {
    match outcome {
        Ok(value) => {
            sm.advance(StageState::Validated, None)?;
            Ok(value)
        }
        Err(source) => {
            warn!(
                ticket_id = %sm.ticket_id(),
                stage = %sm.stage(),
                prompt_version = PROMPT_VERSION,
                "Rejected model reply: {source}"
            );
            sm.fail(&source.to_string());
            Err(TriageError::validation(sm.stage(), source))
        }
    }
}

/// Refuse writes unless the machine sits at `Validated`.
pub(crate) fn ensure_may_persist(sm: &mut StageMachine) -> TriageResult<()> {
    if sm.may_persist() {
        return Ok(());
    }
    let err = IllegalStageTransition {
        from: sm.current(),
        to: StageState::Persisted,
    };
    sm.fail(&err.to_string());
    Err(err.into())
}

/// Emit the transition history of a completed stage.
pub(crate) fn finish(sm: &StageMachine) {
    debug!(
        ticket_id = %sm.ticket_id(),
        history = %sm.summary(),
        "Stage finished"
    );
}
