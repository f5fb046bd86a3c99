//! Disease parameters for the clinical simulator. The defaults describe post-flood
//! leptospirosis; a scenario overrides any of them in the `clinical` block of its config.
use serde::{Deserialize, Serialize};

use crate::clinical::{Outcome, Severity};
use crate::config::{check_probability, check_weights};
use crate::error::OutbreakError;
use crate::symptom::Symptom;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncubationParameters {
    /// Median of the lognormal incubation period.
    pub median_days: f64,
    /// Standard deviation of the underlying normal.
    pub sigma: f64,
    pub min_days: u32,
    pub max_days: u32,
}

impl Default for IncubationParameters {
    fn default() -> Self {
        IncubationParameters {
            median_days: 10.0,
            sigma: 0.5,
            min_days: 2,
            max_days: 30,
        }
    }
}

/// An inclusive range of whole days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRange {
    pub min: u32,
    pub max: u32,
}

/// The chance of a symptom, by severity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomProbability {
    pub symptom: Symptom,
    pub mild: f64,
    pub severe: f64,
}

impl SymptomProbability {
    pub fn for_severity(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Mild => self.mild,
            Severity::Severe => self.severe,
        }
    }
}

/// Relative weights of the statuses a survivor can be in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutcomeWeights {
    pub recovered: f64,
    pub recovering: f64,
    pub hospitalized: f64,
}

impl Default for OutcomeWeights {
    fn default() -> Self {
        OutcomeWeights {
            recovered: 1.0,
            recovering: 0.0,
            hospitalized: 0.0,
        }
    }
}

impl OutcomeWeights {
    pub(crate) const OUTCOMES: [Outcome; 3] =
        [Outcome::Recovered, Outcome::Recovering, Outcome::Hospitalized];

    pub(crate) fn weights(&self) -> [f64; 3] {
        [self.recovered, self.recovering, self.hospitalized]
    }
}

/// A value that differs between mild and severe cases.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BySeverity<T> {
    pub mild: T,
    pub severe: T,
}

impl<T: Copy> BySeverity<T> {
    pub fn get(&self, severity: Severity) -> T {
        match severity {
            Severity::Mild => self.mild,
            Severity::Severe => self.severe,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CareSeekingParameters {
    /// Chance that a symptomatic case presents to a health facility.
    pub report_rate: BySeverity<f64>,
    /// Days from onset to presentation.
    pub days_to_hospital: DayRange,
}

impl Default for CareSeekingParameters {
    fn default() -> Self {
        CareSeekingParameters {
            report_rate: BySeverity {
                mild: 0.3,
                severe: 0.65,
            },
            days_to_hospital: DayRange { min: 1, max: 5 },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicalParameters {
    pub incubation: IncubationParameters,
    pub symptomatic_rate: f64,
    /// Replaces `symptomatic_rate` for individuals younger than `child_age_limit`.
    pub child_symptomatic_rate: Option<f64>,
    pub child_age_limit: u8,
    /// Share of symptomatic cases that are severe.
    pub severe_rate: f64,
    /// Chance that a severe case dies.
    pub case_fatality_rate: f64,
    /// Chance that a mild case dies.
    pub mild_case_fatality_rate: f64,
    /// Days from onset to death.
    pub death_offset_days: DayRange,
    pub symptoms: Vec<SymptomProbability>,
    pub survivor_outcomes: BySeverity<OutcomeWeights>,
    /// Chance of lasting sequelae for a case that recovers or is recovering.
    pub sequelae_rate: BySeverity<f64>,
    pub care_seeking: CareSeekingParameters,
}

impl Default for ClinicalParameters {
    fn default() -> Self {
        ClinicalParameters {
            incubation: IncubationParameters::default(),
            symptomatic_rate: 0.15,
            child_symptomatic_rate: None,
            child_age_limit: 15,
            severe_rate: 0.25,
            case_fatality_rate: 0.10,
            mild_case_fatality_rate: 0.0,
            death_offset_days: DayRange { min: 3, max: 12 },
            symptoms: vec![
                symptom(Symptom::Fever, 0.98, 0.98),
                symptom(Symptom::Headache, 0.80, 0.80),
                symptom(Symptom::Myalgia, 0.85, 0.85),
                symptom(Symptom::ConjunctivalSuffusion, 0.45, 0.70),
                symptom(Symptom::Jaundice, 0.05, 0.85),
                symptom(Symptom::RenalFailure, 0.0, 0.60),
            ],
            survivor_outcomes: BySeverity {
                mild: OutcomeWeights {
                    recovered: 0.7,
                    recovering: 0.3,
                    hospitalized: 0.0,
                },
                severe: OutcomeWeights {
                    recovered: 0.0,
                    recovering: 0.4,
                    hospitalized: 0.6,
                },
            },
            sequelae_rate: BySeverity {
                mild: 0.0,
                severe: 0.0,
            },
            care_seeking: CareSeekingParameters::default(),
        }
    }
}

fn symptom(symptom: Symptom, mild: f64, severe: f64) -> SymptomProbability {
    SymptomProbability {
        symptom,
        mild,
        severe,
    }
}

fn check_day_range(name: &str, range: DayRange) -> Result<(), OutbreakError> {
    if range.min > range.max {
        return Err(OutbreakError::Configuration(format!(
            "{name} has min {} above max {}",
            range.min, range.max
        )));
    }
    Ok(())
}

impl ClinicalParameters {
    /// The symptomatic rate that applies to someone of `age`.
    pub fn symptomatic_rate_for(&self, age: u8) -> f64 {
        match self.child_symptomatic_rate {
            Some(rate) if age < self.child_age_limit => rate,
            _ => self.symptomatic_rate,
        }
    }

    pub fn case_fatality_rate_for(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Mild => self.mild_case_fatality_rate,
            Severity::Severe => self.case_fatality_rate,
        }
    }

    /// # Errors
    ///
    /// Returns `OutbreakError::Configuration` naming the first parameter out of range.
    pub fn validate(&self) -> Result<(), OutbreakError> {
        let incubation = &self.incubation;
        if !(incubation.median_days.is_finite() && incubation.median_days > 0.0) {
            return Err(OutbreakError::Configuration(
                "clinical.incubation.median_days must be positive".to_string(),
            ));
        }
        if !(incubation.sigma.is_finite() && incubation.sigma >= 0.0) {
            return Err(OutbreakError::Configuration(
                "clinical.incubation.sigma must be non-negative".to_string(),
            ));
        }
        check_day_range(
            "clinical.incubation",
            DayRange {
                min: incubation.min_days,
                max: incubation.max_days,
            },
        )?;
        check_day_range("clinical.death_offset_days", self.death_offset_days)?;
        check_day_range(
            "clinical.care_seeking.days_to_hospital",
            self.care_seeking.days_to_hospital,
        )?;

        check_probability("clinical.symptomatic_rate", self.symptomatic_rate)?;
        if let Some(rate) = self.child_symptomatic_rate {
            check_probability("clinical.child_symptomatic_rate", rate)?;
        }
        check_probability("clinical.severe_rate", self.severe_rate)?;
        check_probability("clinical.case_fatality_rate", self.case_fatality_rate)?;
        check_probability(
            "clinical.mild_case_fatality_rate",
            self.mild_case_fatality_rate,
        )?;
        check_probability("clinical.sequelae_rate.mild", self.sequelae_rate.mild)?;
        check_probability("clinical.sequelae_rate.severe", self.sequelae_rate.severe)?;
        check_probability(
            "clinical.care_seeking.report_rate.mild",
            self.care_seeking.report_rate.mild,
        )?;
        check_probability(
            "clinical.care_seeking.report_rate.severe",
            self.care_seeking.report_rate.severe,
        )?;
        for entry in &self.symptoms {
            check_probability(&format!("clinical.symptoms.{}.mild", entry.symptom), entry.mild)?;
            check_probability(
                &format!("clinical.symptoms.{}.severe", entry.symptom),
                entry.severe,
            )?;
        }
        check_weights(
            "clinical.survivor_outcomes.mild",
            &self.survivor_outcomes.mild.weights(),
        )?;
        check_weights(
            "clinical.survivor_outcomes.severe",
            &self.survivor_outcomes.severe.weights(),
        )?;
        Ok(())
    }
}
