use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use lab_core::{
    grade_submission, submit_session, ExperimentRepository, ExperimentSession, LabError,
    ReactionCatalog, SubmissionRepository,
};
use shared::{
    domain::{ChemicalName, ExperimentId, SubmissionId, SubmissionStatus},
    protocol::{
        ExperimentDefinition, ExperimentDraft, Submission, SubmissionRecord, SubmissionUpdate,
    },
};
use tokio::sync::Mutex;

#[derive(Default)]
struct MemoryLab {
    experiments: Mutex<Vec<ExperimentDefinition>>,
    submissions: Mutex<Vec<SubmissionRecord>>,
}

#[async_trait]
impl ExperimentRepository for MemoryLab {
    async fn list_experiments(&self) -> Result<Vec<ExperimentDefinition>> {
        Ok(self.experiments.lock().await.clone())
    }

    async fn get_experiment(&self, id: ExperimentId) -> Result<Option<ExperimentDefinition>> {
        let experiments = self.experiments.lock().await;
        Ok(experiments.iter().find(|e| e.id == id).cloned())
    }

    async fn create_experiment(&self, draft: &ExperimentDraft) -> Result<ExperimentId> {
        let mut experiments = self.experiments.lock().await;
        let id = ExperimentId(experiments.len() as i64 + 1);
        experiments.push(ExperimentDefinition {
            id,
            title: draft.title.clone(),
            description: draft.description.clone(),
            status: draft.status.clone().unwrap_or_else(|| "active".into()),
            expected_reaction: draft.expected_reaction.clone(),
            evaluation_criteria: draft.evaluation_criteria.clone(),
        });
        Ok(id)
    }

    async fn update_experiment(&self, _id: ExperimentId, _draft: &ExperimentDraft) -> Result<u64> {
        Ok(0)
    }

    async fn delete_experiment(&self, _id: ExperimentId) -> Result<u64> {
        Ok(0)
    }
}

#[async_trait]
impl SubmissionRepository for MemoryLab {
    async fn create_submission(&self, submission: &Submission) -> Result<SubmissionId> {
        let mut submissions = self.submissions.lock().await;
        let id = SubmissionId(submissions.len() as i64 + 1);
        submissions.push(SubmissionRecord {
            id,
            submission: submission.clone(),
        });
        Ok(id)
    }

    async fn get_submission(&self, id: SubmissionId) -> Result<Option<SubmissionRecord>> {
        let submissions = self.submissions.lock().await;
        Ok(submissions.iter().find(|s| s.id == id).cloned())
    }

    async fn list_submissions_for_experiment(
        &self,
        experiment_id: ExperimentId,
    ) -> Result<Vec<SubmissionRecord>> {
        let submissions = self.submissions.lock().await;
        Ok(submissions
            .iter()
            .filter(|s| s.submission.experiment_id == experiment_id)
            .cloned()
            .collect())
    }

    async fn update_submission(&self, id: SubmissionId, update: &SubmissionUpdate) -> Result<u64> {
        let mut submissions = self.submissions.lock().await;
        let Some(record) = submissions.iter_mut().find(|s| s.id == id) else {
            return Ok(0);
        };
        let submission = &mut record.submission;
        if let Some(status) = update.status {
            submission.status = status;
        }
        if let Some(total_marks) = update.total_marks {
            submission.total_marks = total_marks;
        }
        if let Some(evaluation) = &update.evaluation {
            submission.evaluation = evaluation.clone();
        }
        if let Some(feedback) = &update.overall_feedback {
            submission.overall_feedback = feedback.clone();
        }
        Ok(1)
    }
}

async fn reacted_session() -> ExperimentSession {
    let mut session =
        ExperimentSession::new(ReactionCatalog::standard()).with_settle_delay(Duration::from_millis(10));
    session
        .toggle_chemical(ChemicalName::from("Sodium Thiosulfate"))
        .expect("first");
    session
        .toggle_chemical(ChemicalName::from("Hydrochloric Acid"))
        .expect("second");
    session.mix().expect("mix").settled().await.expect("settled");
    session
}

#[tokio::test]
async fn student_submits_and_faculty_grades() {
    let lab = MemoryLab::default();
    let experiment = lab
        .create_experiment(&ExperimentDraft {
            title: "Effect of Temperature on Reaction Rate".into(),
            evaluation_criteria: "Observation accuracy, Data analysis, Conclusion quality".into(),
            ..ExperimentDraft::default()
        })
        .await
        .expect("experiment");

    let session = reacted_session().await;
    let record = submit_session(&lab, &session.snapshot(), experiment, "Alice Smith")
        .await
        .expect("submit");
    assert_eq!(record.submission.status, SubmissionStatus::PendingEvaluation);
    assert_eq!(record.submission.evaluation.len(), 3);
    let results = record
        .submission
        .simulated_results
        .as_ref()
        .expect("results");
    assert!(results.reaction_equation.contains("Na2S2O3"));

    let listed = lab
        .list_submissions_for_experiment(experiment)
        .await
        .expect("list");
    assert_eq!(listed, vec![record.clone()]);

    let update: SubmissionUpdate = serde_json::from_str(
        r#"{"status":"Evaluated","totalMarks":85,"overallFeedback":"Good work, minor improvements needed."}"#,
    )
    .expect("update json");
    let graded = grade_submission(&lab, record.id, &update)
        .await
        .expect("grade");
    assert_eq!(graded.submission.status, SubmissionStatus::Evaluated);
    assert_eq!(graded.submission.total_marks, Some(85));

    let stored = lab
        .get_submission(record.id)
        .await
        .expect("get")
        .expect("stored");
    assert_eq!(stored, graded);
}

#[tokio::test]
async fn unknown_experiment_is_accepted_without_criteria() {
    let lab = MemoryLab::default();
    let session = reacted_session().await;

    let record = submit_session(&lab, &session.snapshot(), ExperimentId(42), "Bob Johnson")
        .await
        .expect("submit");
    assert_eq!(record.submission.experiment_id, ExperimentId(42));
    assert!(record.submission.evaluation.is_empty());
}

#[tokio::test]
async fn unfinished_session_is_not_stored() {
    let lab = MemoryLab::default();
    let session = ExperimentSession::new(ReactionCatalog::standard());

    let err = submit_session(&lab, &session.snapshot(), ExperimentId(1), "Alice")
        .await
        .expect_err("incomplete");
    assert!(matches!(err, LabError::IncompleteExperiment));
    assert!(lab.submissions.lock().await.is_empty());
}

#[tokio::test]
async fn grading_a_missing_submission_fails() {
    let lab = MemoryLab::default();
    let err = grade_submission(&lab, SubmissionId(9), &SubmissionUpdate::default())
        .await
        .expect_err("missing");
    assert!(matches!(err, LabError::SubmissionNotFound(SubmissionId(9))));
}

#[tokio::test]
async fn invalid_grade_leaves_stored_record_untouched() {
    let lab = MemoryLab::default();
    let session = reacted_session().await;
    let record = submit_session(&lab, &session.snapshot(), ExperimentId(1), "Alice")
        .await
        .expect("submit");

    let update = SubmissionUpdate {
        total_marks: Some(Some(150)),
        overall_feedback: Some("too generous".into()),
        ..SubmissionUpdate::default()
    };
    let err = grade_submission(&lab, record.id, &update)
        .await
        .expect_err("invalid");
    assert!(matches!(err, LabError::InvalidMarks(150)));

    let stored = lab.get_submission(record.id).await.expect("get");
    assert_eq!(stored, Some(record));
}
