//! Laboratory tests.
//!
//! A test order is evaluated against the frozen clinical record: an infected person tests
//! positive with the test's sensitivity on that day since onset, anyone else tests (falsely)
//! positive with probability `1 - specificity`. Rule-out tests look for an alternative
//! diagnosis nobody in the outbreak has, so they are evaluated as if everyone were truly
//! negative.
//!
//! Every order draws from its own stream, seeded from the session seed, person, test, day and
//! repeat number. Results therefore do not depend on what else was ordered, or in which order.
mod ledger;
mod sensitivity;

use rand::rngs::SmallRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub use ledger::LabLedger;
pub use sensitivity::{SensitivityCurve, SensitivityPoint, SensitivityWindow};

use crate::config::check_probability;
use crate::error::OutbreakError;
use crate::population::PersonId;
use crate::random::{entity_rng, entity_seed};
use crate::HashSet;

/// What happens when the same person, test and day is ordered again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatOrders {
    /// The first result is returned again.
    #[default]
    Cached,
    /// Each repeat draws from the next repeat stream.
    Redraw,
}

fn default_turnaround_days() -> u32 {
    3
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabTestSpec {
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Other codes the test can be ordered under.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Used on days the curve does not cover.
    pub sensitivity: f64,
    pub specificity: f64,
    #[serde(default)]
    pub sensitivity_by_day: Option<SensitivityCurve>,
    /// Orders placed before this day since onset return `NotYetMeaningful`.
    #[serde(default)]
    pub earliest_meaningful_day: i32,
    #[serde(default)]
    pub inconclusive_rate: f64,
    #[serde(default = "default_turnaround_days")]
    pub turnaround_days: u32,
    /// The alternative diagnosis a rule-out test detects.
    #[serde(default)]
    pub rule_out: Option<String>,
}

impl LabTestSpec {
    pub fn sensitivity_on(&self, day_since_onset: i32) -> f64 {
        self.sensitivity_by_day
            .as_ref()
            .and_then(|curve| curve.at(day_since_onset))
            .unwrap_or(self.sensitivity)
    }

    pub fn is_rule_out(&self) -> bool {
        self.rule_out.is_some()
    }

    fn answers_to(&self, code: &str) -> bool {
        self.code.eq_ignore_ascii_case(code)
            || self
                .aliases
                .iter()
                .any(|alias| alias.eq_ignore_ascii_case(code))
    }

    fn validate(&self) -> Result<(), OutbreakError> {
        if self.code.trim().is_empty() {
            return Err(OutbreakError::Configuration(
                "lab test code must not be empty".to_string(),
            ));
        }
        let code = &self.code;
        check_probability(&format!("lab test {code} sensitivity"), self.sensitivity)?;
        check_probability(&format!("lab test {code} specificity"), self.specificity)?;
        check_probability(
            &format!("lab test {code} inconclusive_rate"),
            self.inconclusive_rate,
        )?;
        if let Some(curve) = &self.sensitivity_by_day {
            curve.validate(code)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabConfig {
    pub repeat_orders: RepeatOrders,
    pub tests: Vec<LabTestSpec>,
}

impl LabConfig {
    /// Finds a test by code or alias, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns `OutbreakError::UnknownTest` if no test answers to `code`.
    pub fn resolve(&self, code: &str) -> Result<&LabTestSpec, OutbreakError> {
        let code = code.trim();
        self.tests
            .iter()
            .find(|test| test.answers_to(code))
            .ok_or_else(|| OutbreakError::UnknownTest(code.to_string()))
    }

    /// # Errors
    ///
    /// Returns `OutbreakError::Configuration` for an invalid test or a code or alias used by
    /// two tests.
    pub fn validate(&self) -> Result<(), OutbreakError> {
        let mut codes = HashSet::default();
        for test in &self.tests {
            test.validate()?;
            for code in std::iter::once(&test.code).chain(&test.aliases) {
                if !codes.insert(code.to_ascii_lowercase()) {
                    return Err(OutbreakError::Configuration(format!(
                        "lab test code `{code}` is used more than once"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TestOutcome {
    Positive,
    Negative,
    Inconclusive,
    /// Ordered before the test can detect anything.
    NotYetMeaningful,
}

/// Enough to replay the draw behind a result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DrawProvenance {
    pub session_seed: u64,
    pub stream_seed: u64,
    /// 0 for the first order of a person, test and day.
    pub repeat: u32,
    /// The probability of a positive result the draw was compared against.
    pub positive_probability: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResult {
    pub person_id: PersonId,
    pub test_code: String,
    pub day_since_onset: i32,
    pub outcome: TestOutcome,
    pub turnaround_days: u32,
    pub provenance: DrawProvenance,
}

impl TestResult {
    /// The day a result ordered on `placed_day` comes back.
    pub fn ready_day(&self, placed_day: u32) -> u32 {
        placed_day.saturating_add(self.turnaround_days)
    }

    pub fn is_positive(&self) -> bool {
        self.outcome == TestOutcome::Positive
    }
}

/// Draws a single outcome. `truly_positive` is whether the person has what the test looks for.
/// Returns the outcome and the probability of a positive result it was drawn with.
pub fn run_test(
    spec: &LabTestSpec,
    truly_positive: bool,
    day_since_onset: i32,
    rng: &mut SmallRng,
) -> (TestOutcome, Option<f64>) {
    if day_since_onset < spec.earliest_meaningful_day {
        return (TestOutcome::NotYetMeaningful, None);
    }
    if spec.inconclusive_rate > 0.0 && rng.random_bool(spec.inconclusive_rate.min(1.0)) {
        return (TestOutcome::Inconclusive, None);
    }
    let positive_probability = if truly_positive {
        spec.sensitivity_on(day_since_onset)
    } else {
        1.0 - spec.specificity
    };
    let outcome = if rng.random_bool(positive_probability.clamp(0.0, 1.0)) {
        TestOutcome::Positive
    } else {
        TestOutcome::Negative
    };
    (outcome, Some(positive_probability))
}

/// Evaluates one order for `person_id`, who is `infected` or not, in the stream for
/// `(session_seed, person, test, day, repeat)`.
pub fn order_test(
    spec: &LabTestSpec,
    person_id: &PersonId,
    infected: bool,
    day_since_onset: i32,
    session_seed: u64,
    repeat: u32,
) -> TestResult {
    let stream_seed = entity_seed(
        session_seed,
        &[
            person_id.as_str().as_bytes(),
            spec.code.as_bytes(),
            &day_since_onset.to_le_bytes(),
            &repeat.to_le_bytes(),
        ],
    );
    let mut rng = entity_rng(stream_seed);
    let truly_positive = infected && !spec.is_rule_out();
    let (outcome, positive_probability) = run_test(spec, truly_positive, day_since_onset, &mut rng);
    TestResult {
        person_id: person_id.clone(),
        test_code: spec.code.clone(),
        day_since_onset,
        outcome,
        turnaround_days: spec.turnaround_days,
        provenance: DrawProvenance {
            session_seed,
            stream_seed,
            repeat,
            positive_probability,
        },
    }
}
