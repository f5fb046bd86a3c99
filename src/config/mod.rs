//! The scenario configuration, read from `scenario_config.json`.
//!
//! Every field except `scenario_id`, `target_cases` and `exposure_window` has a default, so a
//! minimal config only names the scenario and how many cases it wants. Loading always runs
//! [`ScenarioConfig::validate`]; values that generation could only guess at (negative rates,
//! empty sensitivity curves, zero-weight outcome tables) are rejected there rather than clamped.
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{Days, NaiveDate};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::case_definition::CaseDefinition;
use crate::clinical::ClinicalParameters;
use crate::error::OutbreakError;
use crate::lab::LabConfig;
use crate::population::VillageId;

/// The period in which infected individuals were exposed: `start` and the `days` after it,
/// inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureWindow {
    pub start: NaiveDate,
    pub days: u32,
}

impl ExposureWindow {
    /// The last day of the window. Saturates at the start date if the window would overflow
    /// the calendar.
    pub fn end(&self) -> NaiveDate {
        self.start
            .checked_add_days(Days::new(u64::from(self.days)))
            .unwrap_or(self.start)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end()
    }
}

fn default_scenario_type() -> String {
    "lepto".to_string()
}

fn default_epicenter_risk_multiplier() -> f64 {
    3.0
}

fn default_risk_epsilon() -> f64 {
    1e-6
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub scenario_id: String,
    /// Selects the risk model; see [`crate::risk::ScenarioRegistry`].
    #[serde(default = "default_scenario_type")]
    pub scenario_type: String,
    pub target_cases: usize,
    /// Rescales village populations to sum to this many residents.
    #[serde(default)]
    pub target_population: Option<u32>,
    #[serde(default)]
    pub epicenter_village_ids: Vec<VillageId>,
    #[serde(default = "default_epicenter_risk_multiplier")]
    pub epicenter_risk_multiplier: f64,
    /// Floor for the risk score of an eligible individual.
    #[serde(default = "default_risk_epsilon")]
    pub risk_epsilon: f64,
    pub exposure_window: ExposureWindow,
    #[serde(default)]
    pub clinical: ClinicalParameters,
    #[serde(default)]
    pub lab: LabConfig,
    /// Exposure attributes that count as an epidemiological link.
    #[serde(default)]
    pub epi_link_fields: Vec<String>,
    /// The default case definition template offered to investigators.
    #[serde(default)]
    pub case_definition: Option<CaseDefinition>,
}

impl ScenarioConfig {
    /// Reads and validates a config file.
    ///
    /// # Errors
    ///
    /// Returns `OutbreakError::IoError` if the file cannot be opened,
    /// `OutbreakError::JsonError` if it is not a valid config, and
    /// `OutbreakError::Configuration` if [`ScenarioConfig::validate`] fails.
    pub fn from_json_file(path: &Path) -> Result<Self, OutbreakError> {
        debug!("loading scenario config from {}", path.display());
        let reader = BufReader::new(File::open(path)?);
        let config: ScenarioConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// See [`ScenarioConfig::from_json_file`].
    pub fn from_json_str(json: &str) -> Result<Self, OutbreakError> {
        let config: ScenarioConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every value that cannot be recovered from at generation time. Problems with the
    /// default case definition are only logged.
    ///
    /// # Errors
    ///
    /// Returns `OutbreakError::Configuration` describing the first invalid value.
    pub fn validate(&self) -> Result<(), OutbreakError> {
        if self.scenario_id.trim().is_empty() {
            return Err(OutbreakError::Configuration(
                "scenario_id must not be empty".to_string(),
            ));
        }
        if !(self.epicenter_risk_multiplier.is_finite() && self.epicenter_risk_multiplier > 0.0) {
            return Err(OutbreakError::Configuration(format!(
                "epicenter_risk_multiplier must be positive, got {}",
                self.epicenter_risk_multiplier
            )));
        }
        if !(self.risk_epsilon.is_finite() && self.risk_epsilon > 0.0) {
            return Err(OutbreakError::Configuration(format!(
                "risk_epsilon must be positive, got {}",
                self.risk_epsilon
            )));
        }
        if self
            .exposure_window
            .start
            .checked_add_days(Days::new(u64::from(self.exposure_window.days)))
            .is_none()
        {
            return Err(OutbreakError::Configuration(
                "exposure_window extends past the end of the calendar".to_string(),
            ));
        }
        self.clinical.validate()?;
        self.lab.validate()?;
        if let Some(definition) = &self.case_definition {
            for issue in definition
                .validate()
                .into_iter()
                .chain(definition.unknown_tests(&self.lab))
            {
                warn!("case_definition `{}`: {issue}", definition.name);
            }
        }
        Ok(())
    }
}

/// # Errors
///
/// Returns `OutbreakError::Configuration` unless `value` is a probability.
pub(crate) fn check_probability(name: &str, value: f64) -> Result<(), OutbreakError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(OutbreakError::Configuration(format!(
            "{name} must be between 0 and 1, got {value}"
        )))
    }
}

/// # Errors
///
/// Returns `OutbreakError::Configuration` if any weight is negative or not finite, or if no
/// weight is positive.
pub(crate) fn check_weights(name: &str, weights: &[f64]) -> Result<(), OutbreakError> {
    if let Some(weight) = weights
        .iter()
        .find(|weight| !(weight.is_finite() && **weight >= 0.0))
    {
        return Err(OutbreakError::Configuration(format!(
            "{name} has an invalid weight {weight}"
        )));
    }
    if weights.iter().sum::<f64>() <= 0.0 {
        return Err(OutbreakError::Configuration(format!(
            "{name} needs at least one positive weight"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "scenario_id": "minimal",
        "target_cases": 10,
        "exposure_window": { "start": "2024-10-01", "days": 14 }
    }"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = ScenarioConfig::from_json_str(MINIMAL).unwrap();
        assert_eq!(config.scenario_type, "lepto");
        assert_eq!(config.epicenter_risk_multiplier, 3.0);
        assert_eq!(config.risk_epsilon, 1e-6);
        assert_eq!(config.clinical, ClinicalParameters::default());
        assert!(config.case_definition.is_none());
        assert_eq!(
            config.exposure_window.end(),
            NaiveDate::from_ymd_opt(2024, 10, 15).unwrap()
        );
    }

    #[test]
    fn negative_rates_fail_validation() {
        let mut config = ScenarioConfig::from_json_str(MINIMAL).unwrap();
        config.clinical.severe_rate = -0.1;
        assert!(matches!(
            config.validate(),
            Err(OutbreakError::Configuration(message)) if message.contains("severe_rate")
        ));
    }

    #[test]
    fn zero_epicenter_multiplier_is_rejected() {
        let json = MINIMAL.replace(
            "\"target_cases\": 10,",
            "\"target_cases\": 10, \"epicenter_risk_multiplier\": 0,",
        );
        assert!(matches!(
            ScenarioConfig::from_json_str(&json),
            Err(OutbreakError::Configuration(_))
        ));
    }

    #[test]
    fn malformed_json_is_a_json_error() {
        assert!(matches!(
            ScenarioConfig::from_json_str("{ \"scenario_id\": "),
            Err(OutbreakError::JsonError(_))
        ));
    }

    #[test]
    fn weights_need_a_positive_entry() {
        assert!(check_weights("w", &[0.0, 0.0]).is_err());
        assert!(check_weights("w", &[1.0, -1.0]).is_err());
        assert!(check_weights("w", &[0.0, f64::NAN]).is_err());
        check_weights("w", &[0.0, 0.5]).unwrap();
        assert!(check_probability("p", 1.5).is_err());
        check_probability("p", 0.0).unwrap();
    }
}
