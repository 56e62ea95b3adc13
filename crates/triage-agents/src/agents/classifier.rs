//! Classification stage. Suggests a category and never writes anything.

use coordination::model::ClassificationResult;
use coordination::{validate_classification, Stage};
use tracing::info;

use crate::config::TriageConfig;
use crate::errors::TriageResult;
use crate::prompts::{self, PROMPT_VERSION};
use crate::request::StageRequest;
use crate::state_machine::StageMachine;

use super::{accept, finish, invoke, or_fail, TriageModel};

/// Classify a ticket into one of the fixed categories.
///
/// The caller decides whether to store the suggested category.
pub async fn classify(
    model: &dyn TriageModel,
    config: &TriageConfig,
    request: &StageRequest,
) -> TriageResult<ClassificationResult> {
    let mut sm = StageMachine::new(Stage::Classification, &request.id);
    or_fail(&mut sm, request.check_text(config.min_title_len))?;

    let prompt = prompts::classification_prompt(request);
    let raw = invoke(&mut sm, model, &prompt).await?;
    let result = accept(&mut sm, validate_classification(&raw))?;

    info!(
        ticket_id = %request.id,
        stage = %Stage::Classification,
        prompt_version = PROMPT_VERSION,
        category = %result.category,
        confidence = result.confidence,
        requires_research = result.requires_research,
        elapsed_ms = sm.elapsed_ms(),
        "Ticket classified"
    );
    finish(&sm);
    Ok(result)
}
