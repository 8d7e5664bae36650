use shared::domain::{ChemicalName, SubmissionId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LabError>;

/// Apart from `UnrecognizedReaction`, which empties the flask, a failure leaves
/// the session or record exactly as it was before the call.
#[derive(Debug, Error)]
pub enum LabError {
    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    #[error("{first} and {second} do not form a known reaction")]
    UnrecognizedReaction {
        first: ChemicalName,
        second: ChemicalName,
    },

    #[error("a mix is already in progress")]
    ConcurrentMix,

    #[error("the reaction has already completed; change the selection to start again")]
    AlreadyReacted,

    #[error("temperature {0} is outside the supported range 20-60 °C")]
    TemperatureOutOfRange(f64),

    #[error("the experiment has not been performed yet")]
    IncompleteExperiment,

    #[error("student name is required")]
    MissingStudentName,

    #[error("marks must be between 0 and 100, got {0}")]
    InvalidMarks(i64),

    #[error("submission {0} is already evaluated and cannot be reopened")]
    EvaluationLocked(SubmissionId),

    #[error("reagent pair {first} + {second} is declared more than once")]
    DuplicateReagentPair {
        first: ChemicalName,
        second: ChemicalName,
    },

    #[error("submission {0} not found")]
    SubmissionNotFound(SubmissionId),

    /// Persistence failure, surfaced unchanged.
    #[error(transparent)]
    Repository(#[from] anyhow::Error),
}
