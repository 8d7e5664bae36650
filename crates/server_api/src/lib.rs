use std::sync::Arc;

use lab_core::{
    accept_submission, grade_submission, ExperimentRepository, LabError, ReactionCatalog,
    ReactionDefinition, SubmissionRepository,
};
use shared::{
    domain::{ExperimentId, SubmissionId},
    error::{ApiError, ErrorCode},
    protocol::{
        ChangesResponse, CreatedResponse, ExperimentDefinition, ExperimentDraft, Submission,
        SubmissionRecord, SubmissionUpdate, WelcomeResponse,
    },
};
use storage::Storage;
use tracing::{error, info, warn};

pub const WELCOME_MESSAGE: &str = "Welcome to Chemistry Lab Simulator API";

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub catalog: Arc<ReactionCatalog>,
}

impl ApiContext {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            catalog: ReactionCatalog::standard(),
        }
    }
}

pub fn welcome() -> WelcomeResponse {
    WelcomeResponse {
        message: WELCOME_MESSAGE.to_string(),
    }
}

pub async fn health(ctx: &ApiContext) -> Result<(), ApiError> {
    ctx.storage.health_check().await.map_err(internal)
}

pub fn list_reactions(ctx: &ApiContext) -> Vec<ReactionDefinition> {
    ctx.catalog.entries().to_vec()
}

pub async fn list_experiments(ctx: &ApiContext) -> Result<Vec<ExperimentDefinition>, ApiError> {
    ctx.storage.list_experiments().await.map_err(internal)
}

pub async fn create_experiment(
    ctx: &ApiContext,
    draft: &ExperimentDraft,
) -> Result<CreatedResponse, ApiError> {
    ensure_title(draft)?;
    let id = ctx
        .storage
        .create_experiment(draft)
        .await
        .map_err(internal)?;
    info!(experiment_id = %id, title = %draft.title, "experiment created");
    Ok(CreatedResponse { id: id.0 })
}

/// Replaces an experiment's fields. Zero `changes` means the id was unknown.
pub async fn update_experiment(
    ctx: &ApiContext,
    id: ExperimentId,
    draft: &ExperimentDraft,
) -> Result<ChangesResponse, ApiError> {
    ensure_title(draft)?;
    let changes = ctx
        .storage
        .update_experiment(id, draft)
        .await
        .map_err(internal)?;
    Ok(ChangesResponse { changes })
}

pub async fn delete_experiment(
    ctx: &ApiContext,
    id: ExperimentId,
) -> Result<ChangesResponse, ApiError> {
    let changes = ctx.storage.delete_experiment(id).await.map_err(internal)?;
    if changes > 0 {
        info!(experiment_id = %id, "experiment deleted");
    }
    Ok(ChangesResponse { changes })
}

pub async fn list_submissions(
    ctx: &ApiContext,
    experiment_id: ExperimentId,
) -> Result<Vec<SubmissionRecord>, ApiError> {
    ctx.storage
        .list_submissions_for_experiment(experiment_id)
        .await
        .map_err(internal)
}

/// Stores a student submission sent by a front-end.
///
/// The flask must have reacted and the student must be named. Grading fields
/// sent by the client are discarded: new submissions are pending with no
/// marks, and `evaluation` is seeded from the experiment's criteria.
pub async fn create_submission(
    ctx: &ApiContext,
    submission: Submission,
) -> Result<CreatedResponse, ApiError> {
    let experiment = ctx
        .storage
        .get_experiment(submission.experiment_id)
        .await
        .map_err(internal)?;
    if experiment.is_none() {
        warn!(experiment_id = %submission.experiment_id, "submission for an unknown experiment");
    }
    let submission = accept_submission(
        submission,
        experiment
            .as_ref()
            .map(|experiment| experiment.evaluation_criteria.as_str()),
    )
    .map_err(lab_error)?;

    let id = ctx
        .storage
        .create_submission(&submission)
        .await
        .map_err(internal)?;
    info!(
        submission_id = %id,
        experiment_id = %submission.experiment_id,
        "submission received"
    );
    Ok(CreatedResponse { id: id.0 })
}

pub async fn update_submission(
    ctx: &ApiContext,
    id: SubmissionId,
    update: &SubmissionUpdate,
) -> Result<SubmissionRecord, ApiError> {
    grade_submission(&ctx.storage, id, update)
        .await
        .map_err(lab_error)
}

fn ensure_title(draft: &ExperimentDraft) -> Result<(), ApiError> {
    if draft.title.trim().is_empty() {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "experiment title is required",
        ));
    }
    Ok(())
}

pub fn lab_error(err: LabError) -> ApiError {
    let code = match &err {
        LabError::InvalidSelection(_)
        | LabError::UnrecognizedReaction { .. }
        | LabError::TemperatureOutOfRange(_)
        | LabError::IncompleteExperiment
        | LabError::MissingStudentName
        | LabError::InvalidMarks(_)
        | LabError::DuplicateReagentPair { .. } => ErrorCode::Validation,
        LabError::ConcurrentMix | LabError::AlreadyReacted | LabError::EvaluationLocked(_) => {
            ErrorCode::Conflict
        }
        LabError::SubmissionNotFound(_) => ErrorCode::NotFound,
        LabError::Repository(err) => {
            error!(error = %err, "repository failure");
            ErrorCode::Internal
        }
    };
    ApiError::new(code, err.to_string())
}

fn internal(err: anyhow::Error) -> ApiError {
    error!(error = %err, "repository failure");
    ApiError::new(ErrorCode::Internal, err.to_string())
}
