use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(ExperimentId);
id_newtype!(SubmissionId);

/// Identifies one in-browser experiment visit. Only used for log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Name of a reagent as shown on the bench, e.g. `"Potassium Iodide"`.
///
/// Names are compared case-sensitively. Unknown names are accepted and simply
/// never match a reaction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChemicalName(String);

impl ChemicalName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChemicalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChemicalName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ChemicalName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlaskStage {
    #[default]
    Empty,
    OneChemical,
    TwoChemicalsSelected,
    Mixing,
    Reacted,
}

impl FlaskStage {
    /// Stage implied by a selection of `count` chemicals with no mix in progress.
    pub fn for_selection_count(count: usize) -> Self {
        match count {
            1 => FlaskStage::OneChemical,
            2 => FlaskStage::TwoChemicalsSelected,
            _ => FlaskStage::Empty,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FlaskStage::Empty => "empty",
            FlaskStage::OneChemical => "one_chemical",
            FlaskStage::TwoChemicalsSelected => "two_chemicals_selected",
            FlaskStage::Mixing => "mixing",
            FlaskStage::Reacted => "reacted",
        }
    }
}

impl fmt::Display for FlaskStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SubmissionStatus {
    #[default]
    #[serde(rename = "Pending Evaluation")]
    PendingEvaluation,
    #[serde(rename = "Evaluated")]
    Evaluated,
}

impl SubmissionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionStatus::PendingEvaluation => "Pending Evaluation",
            SubmissionStatus::Evaluated => "Evaluated",
        }
    }

    /// Parses the stored column value. Anything unrecognised is treated as pending.
    pub fn from_db(value: &str) -> Self {
        match value {
            "Evaluated" => SubmissionStatus::Evaluated,
            _ => SubmissionStatus::PendingEvaluation,
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
