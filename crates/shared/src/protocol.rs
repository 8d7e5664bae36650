use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::{ChemicalName, ExperimentId, FlaskStage, SubmissionId, SubmissionStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentDefinition {
    pub id: ExperimentId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub expected_reaction: String,
    #[serde(default)]
    pub evaluation_criteria: String,
}

impl ExperimentDefinition {
    /// Criterion names from the comma or line delimited `evaluationCriteria` field.
    pub fn criteria(&self) -> Vec<String> {
        split_criteria(&self.evaluation_criteria)
    }
}

pub fn split_criteria(raw: &str) -> Vec<String> {
    raw.split([',', '\n'])
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Body of experiment create and update requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub expected_reaction: String,
    #[serde(default)]
    pub evaluation_criteria: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionEvaluation {
    pub marks: Option<i64>,
    #[serde(default)]
    pub feedback: String,
}

pub type Evaluation = BTreeMap<String, CriterionEvaluation>;

/// Snapshot of the flask captured when the student submits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedResults {
    pub final_flask_stage: FlaskStage,
    pub final_progress: u8,
    pub temperature: f64,
    pub chemicals_used: Vec<ChemicalName>,
    pub reaction_equation: String,
    pub reaction_observation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub experiment_id: ExperimentId,
    pub student_name: String,
    pub submission_date: NaiveDate,
    #[serde(default)]
    pub status: SubmissionStatus,
    #[serde(default)]
    pub total_marks: Option<i64>,
    #[serde(default)]
    pub evaluation: Evaluation,
    #[serde(default)]
    pub overall_feedback: String,
    #[serde(default)]
    pub simulated_results: Option<SimulatedResults>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: SubmissionId,
    #[serde(flatten)]
    pub submission: Submission,
}

/// Partial faculty-side update. Absent fields are left untouched; an explicit
/// `"totalMarks": null` clears the marks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SubmissionStatus>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub total_marks: Option<Option<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<Evaluation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_feedback: Option<String>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangesResponse {
    pub changes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WelcomeResponse {
    pub message: String,
}
