use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use lab_core::{ExperimentRepository, SubmissionRepository};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::info;

use shared::{
    domain::{ExperimentId, SubmissionId, SubmissionStatus},
    protocol::{
        CriterionEvaluation, Evaluation, ExperimentDefinition, ExperimentDraft, Submission,
        SubmissionRecord, SubmissionUpdate,
    },
};

pub const DEFAULT_EXPERIMENT_STATUS: &str = "active";

const SUBMISSION_COLUMNS: &str = "id, experiment_id, student_name, submission_date, status, \
     total_marks, evaluation, overall_feedback, simulated_results";

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Inserts the demo experiment and its two submissions into an empty
    /// database. Returns `false` and does nothing if any experiment exists.
    pub async fn seed_demo_data(&self) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM experiments")
            .fetch_one(&mut *tx)
            .await?;
        if existing > 0 {
            return Ok(false);
        }

        let experiment_id = insert_experiment(
            &mut *tx,
            &ExperimentDraft {
                title: "Effect of Temperature on Reaction Rate".into(),
                description: "Study the relationship between temperature and reaction rate \
                              using Na₂S₂O₃ and HCl"
                    .into(),
                status: Some(DEFAULT_EXPERIMENT_STATUS.into()),
                expected_reaction: "Sodium Thiosulfate and Hydrochloric Acid".into(),
                evaluation_criteria: "Observation accuracy, Data analysis, Conclusion quality"
                    .into(),
            },
        )
        .await?;

        for submission in demo_submissions(experiment_id)? {
            insert_submission(&mut *tx, &submission).await?;
        }
        tx.commit().await?;
        info!(%experiment_id, "seeded demo experiment");
        Ok(true)
    }
}

fn demo_submissions(experiment_id: ExperimentId) -> Result<Vec<Submission>> {
    let criteria = ["Observation accuracy", "Data analysis", "Conclusion quality"];
    let graded = [
        (30, "Good observations."),
        (35, "Analysis is mostly correct."),
        (20, "Conclusion could be more detailed."),
    ];

    let alice: Evaluation = criteria
        .iter()
        .zip(graded)
        .map(|(criterion, (marks, feedback))| {
            (
                criterion.to_string(),
                CriterionEvaluation {
                    marks: Some(marks),
                    feedback: feedback.to_string(),
                },
            )
        })
        .collect();
    let bob: Evaluation = criteria
        .iter()
        .map(|criterion| (criterion.to_string(), CriterionEvaluation::default()))
        .collect();

    Ok(vec![
        Submission {
            experiment_id,
            student_name: "Alice Smith".into(),
            submission_date: demo_date(2023, 10, 27)?,
            status: SubmissionStatus::Evaluated,
            total_marks: Some(85),
            evaluation: alice,
            overall_feedback: "Good work, minor improvements needed.".into(),
            simulated_results: None,
        },
        Submission {
            experiment_id,
            student_name: "Bob Johnson".into(),
            submission_date: demo_date(2023, 10, 26)?,
            status: SubmissionStatus::PendingEvaluation,
            total_marks: None,
            evaluation: bob,
            overall_feedback: String::new(),
            simulated_results: None,
        },
    ])
}

fn demo_date(year: i32, month: u32, day: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
        .with_context(|| format!("invalid demo date {year}-{month}-{day}"))
}

fn experiment_from_row(r: &SqliteRow) -> ExperimentDefinition {
    ExperimentDefinition {
        id: ExperimentId(r.get::<i64, _>(0)),
        title: r.get::<String, _>(1),
        description: r.get::<String, _>(2),
        status: r.get::<String, _>(3),
        expected_reaction: r.get::<String, _>(4),
        evaluation_criteria: r.get::<String, _>(5),
    }
}

fn submission_from_row(r: &SqliteRow) -> Result<SubmissionRecord> {
    let id = SubmissionId(r.get::<i64, _>(0));
    let evaluation = serde_json::from_str(&r.get::<String, _>(6))
        .with_context(|| format!("corrupt evaluation json for submission {id}"))?;
    let simulated_results = r
        .get::<Option<String>, _>(8)
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .with_context(|| format!("corrupt simulated results json for submission {id}"))?;

    Ok(SubmissionRecord {
        id,
        submission: Submission {
            experiment_id: ExperimentId(r.get::<i64, _>(1)),
            student_name: r.get::<String, _>(2),
            submission_date: r.get::<NaiveDate, _>(3),
            status: SubmissionStatus::from_db(&r.get::<String, _>(4)),
            total_marks: r.get::<Option<i64>, _>(5),
            evaluation,
            overall_feedback: r.get::<String, _>(7),
            simulated_results,
        },
    })
}

async fn insert_experiment(
    conn: &mut SqliteConnection,
    draft: &ExperimentDraft,
) -> Result<ExperimentId> {
    let rec = sqlx::query(
        "INSERT INTO experiments (title, description, status, expected_reaction, evaluation_criteria)
         VALUES (?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(&draft.title)
    .bind(&draft.description)
    .bind(draft.status.as_deref().unwrap_or(DEFAULT_EXPERIMENT_STATUS))
    .bind(&draft.expected_reaction)
    .bind(&draft.evaluation_criteria)
    .fetch_one(&mut *conn)
    .await?;
    Ok(ExperimentId(rec.get::<i64, _>(0)))
}

async fn insert_submission(
    conn: &mut SqliteConnection,
    submission: &Submission,
) -> Result<SubmissionId> {
    let evaluation = serde_json::to_string(&submission.evaluation)?;
    let simulated_results = submission
        .simulated_results
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    let rec = sqlx::query(
        "INSERT INTO submissions (experiment_id, student_name, submission_date, status,
                                  total_marks, evaluation, overall_feedback, simulated_results)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(submission.experiment_id.0)
    .bind(&submission.student_name)
    .bind(submission.submission_date)
    .bind(submission.status.as_str())
    .bind(submission.total_marks)
    .bind(evaluation)
    .bind(&submission.overall_feedback)
    .bind(simulated_results)
    .fetch_one(&mut *conn)
    .await?;
    Ok(SubmissionId(rec.get::<i64, _>(0)))
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[async_trait]
impl ExperimentRepository for Storage {
    async fn list_experiments(&self) -> Result<Vec<ExperimentDefinition>> {
        let rows = sqlx::query(
            "SELECT id, title, description, status, expected_reaction, evaluation_criteria
             FROM experiments ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(experiment_from_row).collect())
    }

    async fn get_experiment(&self, id: ExperimentId) -> Result<Option<ExperimentDefinition>> {
        let row = sqlx::query(
            "SELECT id, title, description, status, expected_reaction, evaluation_criteria
             FROM experiments WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(experiment_from_row))
    }

    async fn create_experiment(&self, draft: &ExperimentDraft) -> Result<ExperimentId> {
        let mut conn = self.pool.acquire().await?;
        insert_experiment(&mut *conn, draft).await
    }

    async fn update_experiment(&self, id: ExperimentId, draft: &ExperimentDraft) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE experiments
             SET title = ?, description = ?, status = COALESCE(?, status),
                 expected_reaction = ?, evaluation_criteria = ?
             WHERE id = ?",
        )
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(draft.status.as_deref())
        .bind(&draft.expected_reaction)
        .bind(&draft.evaluation_criteria)
        .bind(id.0)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_experiment(&self, id: ExperimentId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM experiments WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SubmissionRepository for Storage {
    async fn create_submission(&self, submission: &Submission) -> Result<SubmissionId> {
        let mut conn = self.pool.acquire().await?;
        insert_submission(&mut *conn, submission).await
    }

    async fn get_submission(&self, id: SubmissionId) -> Result<Option<SubmissionRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE id = ?"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(submission_from_row).transpose()
    }

    async fn list_submissions_for_experiment(
        &self,
        experiment_id: ExperimentId,
    ) -> Result<Vec<SubmissionRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE experiment_id = ? ORDER BY id ASC"
        ))
        .bind(experiment_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(submission_from_row).collect()
    }

    async fn update_submission(&self, id: SubmissionId, update: &SubmissionUpdate) -> Result<u64> {
        let evaluation = update
            .evaluation
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        // totalMarks is tri-state: absent keeps the column, null clears it.
        let result = sqlx::query(
            "UPDATE submissions
             SET status = COALESCE(?, status),
                 total_marks = CASE WHEN ? THEN ? ELSE total_marks END,
                 evaluation = COALESCE(?, evaluation),
                 overall_feedback = COALESCE(?, overall_feedback)
             WHERE id = ?",
        )
        .bind(update.status.map(SubmissionStatus::as_str))
        .bind(update.total_marks.is_some())
        .bind(update.total_marks.flatten())
        .bind(evaluation)
        .bind(update.overall_feedback.as_deref())
        .bind(id.0)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
