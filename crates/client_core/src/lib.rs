//! HTTP client for the lab server, shared by the student and faculty front-ends.

use chrono::Utc;
use lab_core::{build_submission, ReactionDefinition, SessionSnapshot};
use reqwest::{Client, Method, Response};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{ExperimentId, SubmissionId},
    error::{ApiError, ErrorCode},
    protocol::{
        ChangesResponse, CreatedResponse, ExperimentDefinition, ExperimentDraft, Submission,
        SubmissionRecord, SubmissionUpdate, WelcomeResponse,
    },
};
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("server rejected request ({status}): {error}")]
    Api { status: u16, error: ApiError },

    #[error(transparent)]
    Lab(#[from] lab_core::LabError),
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Clone)]
pub struct LabClient {
    http: Client,
    base_url: Url,
}

impl LabClient {
    pub fn new(server_url: &str) -> Result<Self> {
        Self::with_client(Client::new(), server_url)
    }

    pub fn with_client(http: Client, server_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(server_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn welcome(&self) -> Result<WelcomeResponse> {
        self.get("").await
    }

    pub async fn health(&self) -> Result<()> {
        let response = self.http.get(self.url("healthz")?).send().await?;
        check(response).await?;
        Ok(())
    }

    pub async fn list_reactions(&self) -> Result<Vec<ReactionDefinition>> {
        self.get("api/reactions").await
    }

    pub async fn list_experiments(&self) -> Result<Vec<ExperimentDefinition>> {
        self.get("api/experiments").await
    }

    pub async fn create_experiment(&self, draft: &ExperimentDraft) -> Result<ExperimentId> {
        let created: CreatedResponse = self
            .send_json(Method::POST, "api/experiments", draft)
            .await?;
        Ok(ExperimentId(created.id))
    }

    pub async fn update_experiment(&self, id: ExperimentId, draft: &ExperimentDraft) -> Result<u64> {
        let changes: ChangesResponse = self
            .send_json(Method::PUT, &format!("api/experiments/{id}"), draft)
            .await?;
        Ok(changes.changes)
    }

    pub async fn delete_experiment(&self, id: ExperimentId) -> Result<u64> {
        let response = self
            .http
            .delete(self.url(&format!("api/experiments/{id}"))?)
            .send()
            .await?;
        let changes: ChangesResponse = check(response).await?.json().await?;
        Ok(changes.changes)
    }

    pub async fn list_submissions(
        &self,
        experiment_id: ExperimentId,
    ) -> Result<Vec<SubmissionRecord>> {
        self.get(&format!("api/experiments/{experiment_id}/submissions"))
            .await
    }

    pub async fn create_submission(&self, submission: &Submission) -> Result<SubmissionId> {
        let created: CreatedResponse = self
            .send_json(Method::POST, "api/submissions", submission)
            .await?;
        Ok(SubmissionId(created.id))
    }

    /// Validates a finished session locally, then posts it as a new submission.
    ///
    /// Criteria are left empty; the server seeds them from the experiment.
    pub async fn submit_session(
        &self,
        snapshot: &SessionSnapshot,
        experiment_id: ExperimentId,
        student_name: &str,
    ) -> Result<SubmissionId> {
        let submission = build_submission(
            snapshot,
            experiment_id,
            student_name,
            None,
            Utc::now().date_naive(),
        )?;
        self.create_submission(&submission).await
    }

    pub async fn grade_submission(
        &self,
        id: SubmissionId,
        update: &SubmissionUpdate,
    ) -> Result<SubmissionRecord> {
        self.send_json(Method::PUT, &format!("api/submissions/{id}"), update)
            .await
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.http.get(self.url(path)?).send().await?;
        Ok(check(response).await?.json().await?)
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .request(method, self.url(path)?)
            .json(body)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }
}

/// Turns non-success statuses into [`ClientError::Api`], keeping the server's
/// error body when it sent one.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    debug!(%status, body = %text, "request rejected");
    let error = serde_json::from_str::<ApiError>(&text).unwrap_or_else(|_| {
        ApiError::new(
            ErrorCode::Internal,
            status.canonical_reason().unwrap_or("request failed"),
        )
    });
    Err(ClientError::Api {
        status: status.as_u16(),
        error,
    })
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
