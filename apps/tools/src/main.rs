use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use lab_core::{
    catalog::chemical_color, submit_session, ExperimentRepository, ExperimentSession,
    GradingWorkflow, ReactionCatalog, SubmissionRepository,
};
use shared::{
    domain::{ChemicalName, ExperimentId, SubmissionId},
    protocol::ExperimentDraft,
};
use storage::Storage;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "labctl", about = "Operate the chemistry lab database")]
struct Cli {
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite://./database/database.sqlite"
    )]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the bench reactions.
    Reactions,
    /// Insert the demo experiment and submissions into an empty database.
    Seed,
    Experiments,
    CreateExperiment {
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        expected_reaction: String,
        /// Comma separated criterion names.
        #[arg(long, default_value = "")]
        criteria: String,
        #[arg(long)]
        status: Option<String>,
    },
    /// Run a full session for two chemicals and store the resulting submission.
    Simulate {
        experiment_id: i64,
        #[arg(long)]
        student: String,
        #[arg(long = "chemical", num_args = 2, required = true)]
        chemicals: Vec<String>,
        #[arg(long, default_value_t = 25.0)]
        temperature: f64,
        #[arg(long, default_value_t = 1500)]
        settle_ms: u64,
    },
    Submissions {
        experiment_id: i64,
    },
    Grade {
        submission_id: i64,
        /// `CRITERION=MARKS`, repeatable.
        #[arg(long = "marks", value_parser = parse_assignment)]
        criterion_marks: Vec<(String, String)>,
        /// `CRITERION=TEXT`, repeatable.
        #[arg(long = "feedback", value_parser = parse_assignment)]
        criterion_feedback: Vec<(String, String)>,
        #[arg(long)]
        total: Option<i64>,
        #[arg(long)]
        overall: Option<String>,
        #[arg(long)]
        finalize: bool,
    },
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected CRITERION=VALUE, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing criterion name in '{raw}'"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url)
        .await
        .with_context(|| format!("failed to open {}", cli.database_url))?;

    match cli.command {
        Command::Reactions => {
            for reaction in ReactionCatalog::standard().entries() {
                let (first, second) = (reaction.reagents.first(), reaction.reagents.second());
                println!(
                    "{first} ({}) + {second} ({}): {}",
                    chemical_color(first).unwrap_or("?"),
                    chemical_color(second).unwrap_or("?"),
                    reaction.equation
                );
            }
        }
        Command::Seed => {
            if storage.seed_demo_data().await? {
                println!("seeded demo data");
            } else {
                println!("database already has experiments; nothing seeded");
            }
        }
        Command::Experiments => {
            for experiment in storage.list_experiments().await? {
                println!(
                    "{}\t{}\t{}\t{}",
                    experiment.id,
                    experiment.status,
                    experiment.title,
                    experiment.criteria().join("; ")
                );
            }
        }
        Command::CreateExperiment {
            title,
            description,
            expected_reaction,
            criteria,
            status,
        } => {
            let experiment_id = storage
                .create_experiment(&ExperimentDraft {
                    title,
                    description,
                    status,
                    expected_reaction,
                    evaluation_criteria: criteria,
                })
                .await?;
            println!("created experiment_id={experiment_id}");
        }
        Command::Simulate {
            experiment_id,
            student,
            chemicals,
            temperature,
            settle_ms,
        } => {
            let mut session = ExperimentSession::new(ReactionCatalog::standard())
                .with_settle_delay(Duration::from_millis(settle_ms));
            session.set_temperature(temperature)?;
            for chemical in chemicals {
                session.toggle_chemical(ChemicalName::new(chemical))?;
            }
            let pending = session.mix()?;
            println!("mixing {}...", pending.reaction_id());
            let Some(reaction) = pending.settled().await else {
                bail!("mix was cancelled before the flask settled");
            };
            println!("{}", reaction.observation);

            let record = submit_session(
                &storage,
                &session.snapshot(),
                ExperimentId(experiment_id),
                &student,
            )
            .await?;
            println!("created submission_id={}", record.id);
        }
        Command::Submissions { experiment_id } => {
            for record in storage
                .list_submissions_for_experiment(ExperimentId(experiment_id))
                .await?
            {
                let submission = record.submission;
                let marks = submission
                    .total_marks
                    .map(|marks| marks.to_string())
                    .unwrap_or_else(|| "-".into());
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    record.id,
                    submission.submission_date,
                    submission.student_name,
                    submission.status,
                    marks
                );
            }
        }
        Command::Grade {
            submission_id,
            criterion_marks,
            criterion_feedback,
            total,
            overall,
            finalize,
        } => {
            let id = SubmissionId(submission_id);
            let record = storage
                .get_submission(id)
                .await?
                .with_context(|| format!("submission {id} not found"))?;

            let mut workflow = GradingWorkflow::new(record);
            for (criterion, marks) in criterion_marks {
                let marks = match marks.as_str() {
                    "" | "-" => None,
                    raw => Some(
                        raw.parse::<i64>()
                            .with_context(|| format!("invalid marks for {criterion}: {raw}"))?,
                    ),
                };
                workflow.set_criterion_marks(&criterion, marks)?;
            }
            for (criterion, feedback) in criterion_feedback {
                workflow.set_criterion_feedback(&criterion, feedback);
            }
            if let Some(total) = total {
                workflow.set_total_marks(Some(total))?;
            }
            if let Some(overall) = overall {
                workflow.set_overall_feedback(overall);
            }
            if finalize && !workflow.finalize() {
                println!("submission {id} was already evaluated");
            }

            storage.update_submission(id, &workflow.to_update()).await?;
            println!("updated submission_id={id} status={}", workflow.status());
        }
    }

    Ok(())
}
