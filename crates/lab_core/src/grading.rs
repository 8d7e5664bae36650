use shared::{
    domain::{SubmissionId, SubmissionStatus},
    protocol::{SubmissionRecord, SubmissionUpdate},
};
use tracing::info;

use crate::{
    error::{LabError, Result},
    repository::SubmissionRepository,
};

pub const MAX_MARKS: i64 = 100;

/// Faculty-side edits of one submission.
///
/// Purely in memory: callers persist the result through a
/// [`SubmissionRepository`], see [`grade_submission`]. Failed operations leave
/// the record untouched.
#[derive(Debug, Clone)]
pub struct GradingWorkflow {
    record: SubmissionRecord,
}

impl GradingWorkflow {
    pub fn new(record: SubmissionRecord) -> Self {
        Self { record }
    }

    pub fn record(&self) -> &SubmissionRecord {
        &self.record
    }

    pub fn into_record(self) -> SubmissionRecord {
        self.record
    }

    pub fn status(&self) -> SubmissionStatus {
        self.record.submission.status
    }

    /// Upserts the feedback for `criterion`, keeping any marks already given.
    pub fn set_criterion_feedback(&mut self, criterion: &str, feedback: impl Into<String>) {
        self.record
            .submission
            .evaluation
            .entry(criterion.to_string())
            .or_default()
            .feedback = feedback.into();
    }

    pub fn set_criterion_marks(&mut self, criterion: &str, marks: Option<i64>) -> Result<()> {
        let marks = marks.map(check_marks).transpose()?;
        self.record
            .submission
            .evaluation
            .entry(criterion.to_string())
            .or_default()
            .marks = marks;
        Ok(())
    }

    /// Out-of-range marks are rejected, never clamped.
    pub fn set_total_marks(&mut self, marks: Option<i64>) -> Result<()> {
        self.record.submission.total_marks = marks.map(check_marks).transpose()?;
        Ok(())
    }

    pub fn set_overall_feedback(&mut self, feedback: impl Into<String>) {
        self.record.submission.overall_feedback = feedback.into();
    }

    /// Marks the submission as evaluated. Returns `false` if it already was.
    pub fn finalize(&mut self) -> bool {
        if self.record.submission.status == SubmissionStatus::Evaluated {
            return false;
        }
        self.record.submission.status = SubmissionStatus::Evaluated;
        true
    }

    /// Applies a partial update as a single all-or-nothing step.
    ///
    /// Evaluation entries are upserted per criterion. A status of `Evaluated`
    /// finalizes; asking for `Pending Evaluation` on an evaluated record fails.
    pub fn apply(&mut self, update: &SubmissionUpdate) -> Result<()> {
        let mut staged = self.clone();

        if let Some(evaluation) = &update.evaluation {
            for (criterion, entry) in evaluation {
                staged.set_criterion_marks(criterion, entry.marks)?;
                staged.set_criterion_feedback(criterion, entry.feedback.clone());
            }
        }
        if let Some(total_marks) = update.total_marks {
            staged.set_total_marks(total_marks)?;
        }
        if let Some(feedback) = &update.overall_feedback {
            staged.set_overall_feedback(feedback.clone());
        }
        match update.status {
            Some(SubmissionStatus::Evaluated) => {
                staged.finalize();
            }
            Some(SubmissionStatus::PendingEvaluation)
                if staged.status() == SubmissionStatus::Evaluated =>
            {
                return Err(LabError::EvaluationLocked(self.record.id));
            }
            _ => {}
        }

        *self = staged;
        Ok(())
    }

    /// The grader-owned fields, ready for [`SubmissionRepository::update_submission`].
    pub fn to_update(&self) -> SubmissionUpdate {
        let submission = &self.record.submission;
        SubmissionUpdate {
            status: Some(submission.status),
            total_marks: Some(submission.total_marks),
            evaluation: Some(submission.evaluation.clone()),
            overall_feedback: Some(submission.overall_feedback.clone()),
        }
    }
}

fn check_marks(marks: i64) -> Result<i64> {
    if (0..=MAX_MARKS).contains(&marks) {
        Ok(marks)
    } else {
        Err(LabError::InvalidMarks(marks))
    }
}

/// Loads a submission, applies `update` and writes the grader fields back.
pub async fn grade_submission<R>(
    repository: &R,
    id: SubmissionId,
    update: &SubmissionUpdate,
) -> Result<SubmissionRecord>
where
    R: SubmissionRepository + ?Sized,
{
    let record = repository
        .get_submission(id)
        .await?
        .ok_or(LabError::SubmissionNotFound(id))?;

    let mut workflow = GradingWorkflow::new(record);
    workflow.apply(update)?;
    repository.update_submission(id, &workflow.to_update()).await?;

    info!(
        submission_id = %id,
        status = %workflow.status(),
        total_marks = ?workflow.record().submission.total_marks,
        "submission graded"
    );
    Ok(workflow.into_record())
}

#[cfg(test)]
#[path = "tests/grading_tests.rs"]
mod tests;
