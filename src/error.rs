use std::fmt::{self, Debug, Display};
use std::io;

use rand::distr::weighted::Error as WeightError;
use serde::Serialize;

/// Provides `OutbreakError` and maps other errors to
/// convert to an `OutbreakError`
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum OutbreakError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    CSVError(csv::Error),
    /// A seed record is missing a required field or holds a value that cannot be parsed.
    DataIntegrity {
        file: String,
        /// 1-based data row, `None` when the problem is with the header.
        row: Option<usize>,
        field: String,
        reason: String,
    },
    /// The scenario configuration is invalid in a way that cannot be clamped.
    Configuration(String),
    UnknownPerson(String),
    UnknownTest(String),
    /// A clinical record builder was asked to finish a record with fields still unset.
    IncompleteClinicalRecord {
        person_id: String,
        missing: String,
    },
    /// A categorical draw had no usable weights.
    WeightError(WeightError),
    ReportError(String),
}

impl OutbreakError {
    pub fn data_integrity(
        file: &str,
        row: Option<usize>,
        field: &str,
        reason: impl Into<String>,
    ) -> Self {
        OutbreakError::DataIntegrity {
            file: file.to_string(),
            row,
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<io::Error> for OutbreakError {
    fn from(error: io::Error) -> Self {
        OutbreakError::IoError(error)
    }
}

impl From<serde_json::Error> for OutbreakError {
    fn from(error: serde_json::Error) -> Self {
        OutbreakError::JsonError(error)
    }
}

impl From<csv::Error> for OutbreakError {
    fn from(error: csv::Error) -> Self {
        OutbreakError::CSVError(error)
    }
}

impl From<WeightError> for OutbreakError {
    fn from(error: WeightError) -> Self {
        OutbreakError::WeightError(error)
    }
}

impl std::error::Error for OutbreakError {}

impl Display for OutbreakError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OutbreakError::DataIntegrity {
                file,
                row: Some(row),
                field,
                reason,
            } => write!(f, "Error: {file}, row {row}: field `{field}` {reason}"),
            OutbreakError::DataIntegrity {
                file,
                row: None,
                field,
                reason,
            } => write!(f, "Error: {file}: field `{field}` {reason}"),
            OutbreakError::Configuration(message) => {
                write!(f, "Error: invalid scenario configuration: {message}")
            }
            OutbreakError::UnknownPerson(person_id) => {
                write!(f, "Error: no individual with id `{person_id}`")
            }
            OutbreakError::UnknownTest(code) => write!(f, "Error: unknown lab test `{code}`"),
            OutbreakError::WeightError(error) => {
                write!(f, "Error: cannot draw from a weighted table: {error}")
            }
            OutbreakError::ReportError(message) => write!(f, "Error: {message}"),
            OutbreakError::IncompleteClinicalRecord { person_id, missing } => write!(
                f,
                "Error: clinical record for `{person_id}` is missing `{missing}`"
            ),
            _ => write!(f, "Error: {self:?}"),
        }
    }
}

/// A problem that generation recovered from on its own. Warnings are logged when they occur and
/// kept on the value that produced them so callers can surface them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GenerationWarning {
    /// `target_cases` exceeded the number of individuals who could be infected.
    TargetCasesClamped { requested: usize, eligible: usize },
    /// Authored seed cases alone exceed `target_cases`; all of them are kept.
    SeedCasesExceedTarget { seed_cases: usize, target: usize },
    /// The configured `scenario_type` has no registered risk model.
    UnknownScenarioType { requested: String, fallback: String },
    /// An epicenter village has nobody eligible for infection, so sampling used the whole
    /// eligible pool.
    DegenerateEpicenter { village_id: String },
}

impl Display for GenerationWarning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GenerationWarning::TargetCasesClamped {
                requested,
                eligible,
            } => write!(
                f,
                "target_cases {requested} exceeds the {eligible} eligible individuals; clamped"
            ),
            GenerationWarning::SeedCasesExceedTarget { seed_cases, target } => write!(
                f,
                "{seed_cases} authored seed cases exceed target_cases {target}; keeping all seed cases"
            ),
            GenerationWarning::UnknownScenarioType {
                requested,
                fallback,
            } => write!(
                f,
                "unknown scenario_type `{requested}`; using the `{fallback}` risk model"
            ),
            GenerationWarning::DegenerateEpicenter { village_id } => write!(
                f,
                "epicenter village `{village_id}` has no eligible individuals; sampling from the full eligible pool"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_integrity_names_the_field() {
        let error = OutbreakError::data_integrity("villages.csv", Some(3), "population", "is empty");
        let message = error.to_string();
        assert!(message.contains("villages.csv"));
        assert!(message.contains("row 3"));
        assert!(message.contains("`population`"));
    }

    #[test]
    fn header_errors_have_no_row() {
        let error = OutbreakError::data_integrity("households_seed.csv", None, "hh_id", "is missing");
        assert_eq!(
            error.to_string(),
            "Error: households_seed.csv: field `hh_id` is missing"
        );
    }

    #[test]
    fn converts_io_errors() {
        let error: OutbreakError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(error, OutbreakError::IoError(_)));
    }

    #[test]
    fn converts_weight_errors() {
        let error: OutbreakError = WeightError::InsufficientNonZero.into();
        assert!(matches!(error, OutbreakError::WeightError(_)));
        assert!(error.to_string().contains("weighted table"));
    }

    #[test]
    fn warnings_serialize_with_kind_tag() {
        let warning = GenerationWarning::TargetCasesClamped {
            requested: 50,
            eligible: 12,
        };
        let json = serde_json::to_string(&warning).unwrap();
        assert_eq!(
            json,
            r#"{"kind":"target_cases_clamped","requested":50,"eligible":12}"#
        );
    }
}
