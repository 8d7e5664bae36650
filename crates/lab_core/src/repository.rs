use anyhow::Result;
use async_trait::async_trait;
use shared::{
    domain::{ExperimentId, SubmissionId},
    protocol::{
        ExperimentDefinition, ExperimentDraft, Submission, SubmissionRecord, SubmissionUpdate,
    },
};

/// Faculty-owned experiment definitions.
///
/// Mutations return the number of rows changed; zero means the id did not exist.
#[async_trait]
pub trait ExperimentRepository: Send + Sync {
    async fn list_experiments(&self) -> Result<Vec<ExperimentDefinition>>;
    async fn get_experiment(&self, id: ExperimentId) -> Result<Option<ExperimentDefinition>>;
    async fn create_experiment(&self, draft: &ExperimentDraft) -> Result<ExperimentId>;
    async fn update_experiment(&self, id: ExperimentId, draft: &ExperimentDraft) -> Result<u64>;
    async fn delete_experiment(&self, id: ExperimentId) -> Result<u64>;
}

/// Student submissions. Concurrent updates of one record are last-write-wins.
#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    async fn create_submission(&self, submission: &Submission) -> Result<SubmissionId>;
    async fn get_submission(&self, id: SubmissionId) -> Result<Option<SubmissionRecord>>;
    async fn list_submissions_for_experiment(
        &self,
        experiment_id: ExperimentId,
    ) -> Result<Vec<SubmissionRecord>>;
    async fn update_submission(&self, id: SubmissionId, update: &SubmissionUpdate) -> Result<u64>;
}
