use chrono::{NaiveDate, Utc};
use shared::{
    domain::{ExperimentId, FlaskStage, SubmissionStatus},
    protocol::{
        split_criteria, CriterionEvaluation, Evaluation, SimulatedResults, Submission,
        SubmissionRecord,
    },
};
use tracing::{info, warn};

use crate::{
    error::{LabError, Result},
    repository::{ExperimentRepository, SubmissionRepository},
    session::SessionSnapshot,
};

/// Builds the pending submission for a finished session.
///
/// `evaluation_criteria` is the experiment's comma or line delimited criteria
/// list; each criterion gets an empty entry for the grader to fill in.
pub fn build_submission(
    snapshot: &SessionSnapshot,
    experiment_id: ExperimentId,
    student_name: &str,
    evaluation_criteria: Option<&str>,
    submission_date: NaiveDate,
) -> Result<Submission> {
    check_stage(has_reacted(snapshot))?;
    let student_name = check_student_name(student_name)?;

    Ok(Submission {
        experiment_id,
        student_name: student_name.to_string(),
        submission_date,
        status: SubmissionStatus::PendingEvaluation,
        total_marks: None,
        evaluation: seeded_evaluation(evaluation_criteria),
        overall_feedback: String::new(),
        simulated_results: Some(simulated_results(snapshot)),
    })
}

/// Normalises a submission received from a front-end into a new pending record.
///
/// The recorded results must show a reacted flask and the student must be
/// named. Everything a grader owns is discarded: the status is pending, there
/// is no total, the overall feedback is empty and `evaluation` holds only the
/// experiment's criteria with no marks.
pub fn accept_submission(
    submission: Submission,
    evaluation_criteria: Option<&str>,
) -> Result<Submission> {
    check_stage(
        submission
            .simulated_results
            .as_ref()
            .is_some_and(|results| results.final_flask_stage == FlaskStage::Reacted),
    )?;
    let student_name = check_student_name(&submission.student_name)?.to_string();

    Ok(Submission {
        student_name,
        status: SubmissionStatus::PendingEvaluation,
        total_marks: None,
        evaluation: seeded_evaluation(evaluation_criteria),
        overall_feedback: String::new(),
        ..submission
    })
}

pub fn simulated_results(snapshot: &SessionSnapshot) -> SimulatedResults {
    SimulatedResults {
        final_flask_stage: snapshot.flask_stage,
        final_progress: snapshot.progress,
        temperature: snapshot.temperature,
        chemicals_used: snapshot.selected_chemicals.clone(),
        reaction_equation: snapshot.equation().to_string(),
        reaction_observation: snapshot.observation().to_string(),
    }
}

fn seeded_evaluation(evaluation_criteria: Option<&str>) -> Evaluation {
    evaluation_criteria
        .map(split_criteria)
        .unwrap_or_default()
        .into_iter()
        .map(|criterion| (criterion, CriterionEvaluation::default()))
        .collect()
}

fn has_reacted(snapshot: &SessionSnapshot) -> bool {
    snapshot.flask_stage == FlaskStage::Reacted && snapshot.active_reaction.is_some()
}

fn check_stage(reacted: bool) -> Result<()> {
    if reacted {
        Ok(())
    } else {
        Err(LabError::IncompleteExperiment)
    }
}

fn check_student_name(student_name: &str) -> Result<&str> {
    let student_name = student_name.trim();
    if student_name.is_empty() {
        return Err(LabError::MissingStudentName);
    }
    Ok(student_name)
}

/// Validates the session, builds the submission dated today (UTC) and stores it.
///
/// The experiment is looked up only to pre-seed its criteria; an unknown
/// experiment id is stored as-is, there is no foreign key enforcement here.
pub async fn submit_session<R>(
    repository: &R,
    snapshot: &SessionSnapshot,
    experiment_id: ExperimentId,
    student_name: &str,
) -> Result<SubmissionRecord>
where
    R: ExperimentRepository + SubmissionRepository + ?Sized,
{
    check_stage(has_reacted(snapshot))?;
    check_student_name(student_name)?;

    let experiment = repository.get_experiment(experiment_id).await?;
    if experiment.is_none() {
        warn!(%experiment_id, "submitting against an unknown experiment");
    }
    let submission = build_submission(
        snapshot,
        experiment_id,
        student_name,
        experiment
            .as_ref()
            .map(|experiment| experiment.evaluation_criteria.as_str()),
        Utc::now().date_naive(),
    )?;

    let id = repository.create_submission(&submission).await?;
    info!(
        submission_id = %id,
        %experiment_id,
        session_id = %snapshot.session_id,
        "submission recorded"
    );
    Ok(SubmissionRecord { id, submission })
}

#[cfg(test)]
#[path = "tests/submission_tests.rs"]
mod tests;
