//! Reaction sessions, submissions and grading for the virtual chemistry lab.
//!
//! The crate is transport and storage agnostic: persistence goes through the
//! [`ExperimentRepository`] and [`SubmissionRepository`] traits, which the
//! `storage` crate implements on SQLite.

pub mod catalog;
pub mod error;
pub mod grading;
pub mod repository;
pub mod session;
pub mod submission;

pub use catalog::{ProductAppearance, ReactionCatalog, ReactionDefinition, ReagentPair};
pub use error::LabError;
pub use grading::{grade_submission, GradingWorkflow, MAX_MARKS};
pub use repository::{ExperimentRepository, SubmissionRepository};
pub use session::{ExperimentSession, PendingMix, SessionSnapshot, DEFAULT_SETTLE_DELAY};
pub use submission::{accept_submission, build_submission, submit_session};
