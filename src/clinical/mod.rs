//! Clinical progression: every infected individual gets an incubation period, an onset date, and
//! either an asymptomatic course or a symptomatic one with severity, symptoms, outcome and
//! care seeking.
//!
//! Symptom flags only exist inside [`SymptomaticCourse`], so an asymptomatic or uninfected
//! record cannot carry symptoms, and `severe` cannot be set on an asymptomatic one.
mod builder;
mod params;

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use log::{debug, info};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::rngs::SmallRng;
use rand::Rng;
use rand_distr::LogNormal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub use builder::ClinicalRecordBuilder;
pub use params::{
    BySeverity, CareSeekingParameters, ClinicalParameters, DayRange, IncubationParameters,
    OutcomeWeights, SymptomProbability,
};

use crate::config::ScenarioConfig;
use crate::error::OutbreakError;
use crate::infection::InfectionAssignment;
use crate::population::{Individual, PersonId, PopulationSnapshot};
use crate::random::{define_rng, RandomStreams};
use crate::symptom::{Symptom, SymptomSet};

define_rng!(ClinicalRng);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum Severity {
    #[strum(to_string = "mild", serialize = "moderate")]
    Mild,
    #[strum(to_string = "severe", serialize = "critical")]
    Severe,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Outcome {
    #[strum(to_string = "recovered", serialize = "recovered_sequelae")]
    Recovered,
    Recovering,
    Hospitalized,
    Died,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CareSeeking {
    pub reported_to_hospital: bool,
    /// Days from onset to presentation; `None` when the case never presented.
    pub days_to_hospital: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymptomaticCourse {
    pub severity: Severity,
    pub symptoms: SymptomSet,
    pub outcome: Outcome,
    pub death_date: Option<NaiveDate>,
    pub has_sequelae: bool,
    pub care: CareSeeking,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "presentation", rename_all = "snake_case")]
pub enum Presentation {
    Asymptomatic,
    Symptomatic(SymptomaticCourse),
}

/// The frozen clinical history of one infected individual.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClinicalRecord {
    pub person_id: PersonId,
    /// Authored in the seed files rather than drawn.
    pub seed_case: bool,
    pub exposure_date: NaiveDate,
    pub incubation_days: u32,
    pub onset_date: NaiveDate,
    pub presentation: Presentation,
}

impl ClinicalRecord {
    pub fn course(&self) -> Option<&SymptomaticCourse> {
        match &self.presentation {
            Presentation::Symptomatic(course) => Some(course),
            Presentation::Asymptomatic => None,
        }
    }

    pub fn is_symptomatic(&self) -> bool {
        self.course().is_some()
    }

    pub fn is_severe(&self) -> bool {
        self.course()
            .is_some_and(|course| course.severity == Severity::Severe)
    }

    pub fn symptoms(&self) -> Option<&SymptomSet> {
        self.course().map(|course| &course.symptoms)
    }

    pub fn has_symptom(&self, symptom: Symptom) -> bool {
        self.symptoms().is_some_and(|symptoms| symptoms.has(symptom))
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.course().map(|course| course.outcome)
    }
}

/// What is true about a person, as opposed to what an investigator can observe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InfectionState<'a> {
    Uninfected,
    Infected(&'a ClinicalRecord),
}

impl<'a> InfectionState<'a> {
    pub fn true_infection(&self) -> bool {
        matches!(self, InfectionState::Infected(_))
    }

    pub fn is_symptomatic(&self) -> bool {
        self.record().is_some_and(ClinicalRecord::is_symptomatic)
    }

    pub fn is_severe(&self) -> bool {
        self.record().is_some_and(ClinicalRecord::is_severe)
    }

    pub fn record(&self) -> Option<&'a ClinicalRecord> {
        match self {
            InfectionState::Infected(record) => Some(record),
            InfectionState::Uninfected => None,
        }
    }
}

/// Clinical records of every infected individual, keyed by person.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ClinicalRecords(BTreeMap<PersonId, ClinicalRecord>);

impl ClinicalRecords {
    pub fn get(&self, person_id: &PersonId) -> Option<&ClinicalRecord> {
        self.0.get(person_id)
    }

    pub fn state_of(&self, person_id: &PersonId) -> InfectionState<'_> {
        match self.0.get(person_id) {
            Some(record) => InfectionState::Infected(record),
            None => InfectionState::Uninfected,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClinicalRecord> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn symptomatic_count(&self) -> usize {
        self.iter().filter(|record| record.is_symptomatic()).count()
    }
}

/// Simulates the clinical course of every infected individual in `assignment`.
///
/// Authored seed values (symptomatic, severity, symptom flags, onset date, outcome, sequelae)
/// are kept; anything the author left blank is drawn conditioned on what was authored. When an
/// onset date is authored, the exposure date is back-dated from it by the drawn incubation
/// period.
///
/// # Errors
///
/// Fails if `config` is invalid, if an infected person is not in `population`, if the clinical
/// parameters cannot be sampled from, or if any record cannot be completed. Nothing is returned unless every
/// infected individual has a complete record.
pub fn simulate_clinical_course(
    population: &PopulationSnapshot,
    assignment: &InfectionAssignment,
    config: &ScenarioConfig,
) -> Result<ClinicalRecords, OutbreakError> {
    config.validate()?;
    let params = &config.clinical;
    let incubation = LogNormal::new(params.incubation.median_days.ln(), params.incubation.sigma)
        .map_err(|error| {
            OutbreakError::Configuration(format!("clinical.incubation is unusable: {error}"))
        })?;
    let streams = RandomStreams::new(assignment.seed());

    let mut records = BTreeMap::new();
    for person_id in assignment.infected() {
        let individual = population
            .individual(person_id)
            .ok_or_else(|| OutbreakError::UnknownPerson(person_id.to_string()))?;
        let exposure_date = assignment
            .exposure_date(person_id)
            .ok_or_else(|| OutbreakError::IncompleteClinicalRecord {
                person_id: person_id.to_string(),
                missing: "exposure_date".to_string(),
            })?;
        let record = streams.sample(ClinicalRng, |rng| {
            draw_course(rng, individual, exposure_date, params, &incubation)
        })?;
        records.insert(person_id.clone(), record);
    }

    let records = ClinicalRecords(records);
    debug!(
        "{} of {} infections are symptomatic",
        records.symptomatic_count(),
        records.len()
    );
    info!("simulated {} clinical courses", records.len());
    Ok(records)
}

fn draw_incubation(
    rng: &mut SmallRng,
    params: &IncubationParameters,
    incubation: &LogNormal<f64>,
) -> u32 {
    let days = incubation.sample(rng).floor();
    // Float to int casts saturate; the clamp handles the rest.
    (days as u32).clamp(params.min_days, params.max_days)
}

fn draw_in_range(rng: &mut SmallRng, range: DayRange) -> u32 {
    rng.random_range(range.min..=range.max)
}

fn draw_survivor_outcome(
    rng: &mut SmallRng,
    weights: &OutcomeWeights,
) -> Result<Outcome, OutbreakError> {
    let index = WeightedIndex::new(weights.weights()).map_err(|error| {
        OutbreakError::Configuration(format!("clinical.survivor_outcomes: {error}"))
    })?;
    Ok(OutcomeWeights::OUTCOMES[index.sample(rng)])
}

fn draw_course(
    rng: &mut SmallRng,
    individual: &Individual,
    exposure_date: NaiveDate,
    params: &ClinicalParameters,
    incubation: &LogNormal<f64>,
) -> Result<ClinicalRecord, OutbreakError> {
    let authored = &individual.authored;
    let mut builder = ClinicalRecordBuilder::new(individual.id.clone());
    builder.seed_case(authored.is_seed_case());

    let incubation_days = draw_incubation(rng, &params.incubation, incubation);
    builder.incubation_days(incubation_days);
    match authored.onset_date {
        Some(onset) => {
            let exposure = onset
                .checked_sub_days(Days::new(u64::from(incubation_days)))
                .unwrap_or(onset);
            builder.exposure_date(exposure);
        }
        None => {
            builder.exposure_date(exposure_date);
        }
    }

    let symptomatic = authored.symptomatic.unwrap_or_else(|| {
        authored.severity.is_some()
            || authored.symptoms.any_present()
            || authored.outcome.is_some()
            || rng.random_bool(params.symptomatic_rate_for(individual.demographics.age))
    });
    if !symptomatic {
        builder.asymptomatic();
        return builder.build();
    }

    let severity = authored.severity.unwrap_or_else(|| {
        if rng.random_bool(params.severe_rate) {
            Severity::Severe
        } else {
            Severity::Mild
        }
    });
    builder.symptomatic(severity);

    for entry in &params.symptoms {
        let present = match authored.symptom(entry.symptom) {
            Some(present) => present,
            None => rng.random_bool(entry.for_severity(severity)),
        };
        builder.symptom(entry.symptom, present);
    }
    // Authored symptoms outside the disease's table are kept as written.
    for (symptom, present) in authored.symptoms.iter() {
        builder.symptom(symptom, present);
    }

    let outcome = match authored.outcome {
        Some(outcome) => outcome,
        None if rng.random_bool(params.case_fatality_rate_for(severity)) => Outcome::Died,
        None => draw_survivor_outcome(rng, &params.survivor_outcomes.get(severity))?,
    };
    builder.outcome(outcome);

    let onset = authored.onset_date.unwrap_or_else(|| {
        exposure_date
            .checked_add_days(Days::new(u64::from(incubation_days)))
            .unwrap_or(exposure_date)
    });
    if outcome == Outcome::Died {
        let offset = draw_in_range(rng, params.death_offset_days);
        builder.death_date(
            onset
                .checked_add_days(Days::new(u64::from(offset)))
                .unwrap_or(onset),
        );
    }

    let has_sequelae = match authored.has_sequelae {
        Some(has_sequelae) => has_sequelae,
        None if matches!(outcome, Outcome::Recovered | Outcome::Recovering) => {
            rng.random_bool(params.sequelae_rate.get(severity))
        }
        None => false,
    };
    builder.sequelae(has_sequelae);

    let reported_to_hospital = outcome == Outcome::Hospitalized
        || rng.random_bool(params.care_seeking.report_rate.get(severity));
    let days_to_hospital =
        reported_to_hospital.then(|| draw_in_range(rng, params.care_seeking.days_to_hospital));
    builder.care(CareSeeking {
        reported_to_hospital,
        days_to_hospital,
    });

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{lepto_config, lepto_outbreak};

    #[test]
    fn every_infection_gets_a_record() {
        let outbreak = lepto_outbreak(42);
        assert_eq!(
            outbreak.clinical.len(),
            outbreak.assignment.infected().len()
        );
        for person_id in outbreak.assignment.infected() {
            assert!(outbreak.clinical.get(person_id).is_some());
        }
    }

    #[test]
    fn severity_implies_symptoms_implies_infection() {
        let outbreak = lepto_outbreak(7);
        for individual in outbreak.population.individuals() {
            let state = outbreak.clinical.state_of(&individual.id);
            if state.is_severe() {
                assert!(state.is_symptomatic());
            }
            if state.is_symptomatic() {
                assert!(state.true_infection());
            }
            if let Some(record) = state.record() {
                if !record.is_symptomatic() {
                    assert!(record.symptoms().is_none());
                }
                assert_eq!(
                    record.onset_date,
                    record.exposure_date + Days::new(u64::from(record.incubation_days))
                );
            }
        }
    }

    #[test]
    fn incubation_stays_within_bounds() {
        let config = lepto_config();
        let outbreak = lepto_outbreak(11);
        for record in outbreak.clinical.iter() {
            assert!(record.incubation_days >= config.clinical.incubation.min_days);
            assert!(record.incubation_days <= config.clinical.incubation.max_days);
        }
    }

    #[test]
    fn authored_seed_values_are_preserved() {
        let outbreak = lepto_outbreak(3);
        for individual in outbreak.population.individuals() {
            if !individual.authored.is_seed_case() {
                continue;
            }
            let record = outbreak.clinical.get(&individual.id).unwrap();
            assert!(record.seed_case);
            if let Some(onset) = individual.authored.onset_date {
                assert_eq!(record.onset_date, onset);
            }
            if let Some(severity) = individual.authored.severity {
                assert_eq!(record.course().unwrap().severity, severity);
            }
            if let Some(outcome) = individual.authored.outcome {
                assert_eq!(record.outcome(), Some(outcome));
            }
            for (symptom, present) in individual.authored.symptoms.iter() {
                assert_eq!(record.has_symptom(symptom), present);
            }
        }
    }

    #[test]
    fn deaths_follow_onset() {
        for seed in 0..5 {
            let outbreak = lepto_outbreak(seed);
            for record in outbreak.clinical.iter() {
                if let Some(course) = record.course() {
                    assert_eq!(course.death_date.is_some(), course.outcome == Outcome::Died);
                    if let Some(death) = course.death_date {
                        assert!(death >= record.onset_date);
                    }
                    assert_eq!(
                        course.care.days_to_hospital.is_some(),
                        course.care.reported_to_hospital
                    );
                }
            }
        }
    }

    #[test]
    fn severity_and_outcome_parse_source_spellings() {
        assert_eq!("critical".parse::<Severity>().unwrap(), Severity::Severe);
        assert_eq!("Moderate".parse::<Severity>().unwrap(), Severity::Mild);
        assert_eq!(
            "recovered_sequelae".parse::<Outcome>().unwrap(),
            Outcome::Recovered
        );
        assert_eq!(Outcome::Hospitalized.to_string(), "hospitalized");
    }

    #[test]
    fn invalid_config_is_an_error_not_a_panic() {
        let outbreak = lepto_outbreak(6);
        let mut config = lepto_config();
        config.clinical.symptomatic_rate = 1.5;
        assert!(matches!(
            simulate_clinical_course(&outbreak.population, &outbreak.assignment, &config),
            Err(OutbreakError::Configuration(_))
        ));

        let mut config = lepto_config();
        config.clinical.incubation.min_days = 20;
        config.clinical.incubation.max_days = 5;
        assert!(matches!(
            simulate_clinical_course(&outbreak.population, &outbreak.assignment, &config),
            Err(OutbreakError::Configuration(_))
        ));
    }
}
