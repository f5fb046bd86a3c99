//! Decides who was infected.
//!
//! Authored seed cases are always infected. The rest of `target_cases` is drawn from the
//! eligible, non-seed individuals by weighted sampling without replacement, with each person's
//! risk score as the weight, so epicenter villages and high-exposure households end up with the
//! highest attack rates. Every infected person also gets an exposure date inside the scenario's
//! exposure window.
use std::collections::{BTreeMap, BTreeSet};

use chrono::{Days, NaiveDate};
use log::{debug, info, warn};
use rand::Rng;
use serde::Serialize;

use crate::config::ScenarioConfig;
use crate::error::{GenerationWarning, OutbreakError};
use crate::population::{PersonId, PopulationSnapshot, VillageId};
use crate::random::{define_rng, sample_weighted_without_replacement, RandomStreams};
use crate::risk::{score_population, ScenarioRegistry};

define_rng!(InfectionRng, ExposureDateRng);

/// The infected set of one generation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InfectionAssignment {
    seed: u64,
    infected: BTreeSet<PersonId>,
    exposure_dates: BTreeMap<PersonId, NaiveDate>,
    seed_cases: usize,
    requested: usize,
    eligible: usize,
    warnings: Vec<GenerationWarning>,
}

impl InfectionAssignment {
    /// The seed of the population this assignment was drawn for.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn infected(&self) -> &BTreeSet<PersonId> {
        &self.infected
    }

    pub fn is_infected(&self, person_id: &PersonId) -> bool {
        self.infected.contains(person_id)
    }

    pub fn exposure_date(&self, person_id: &PersonId) -> Option<NaiveDate> {
        self.exposure_dates.get(person_id).copied()
    }

    /// The configured `target_cases`.
    pub fn requested(&self) -> usize {
        self.requested
    }

    /// Seed cases plus everyone who could have been sampled.
    pub fn eligible(&self) -> usize {
        self.eligible
    }

    pub fn seed_cases(&self) -> usize {
        self.seed_cases
    }

    pub fn warnings(&self) -> &[GenerationWarning] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.infected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infected.is_empty()
    }

    /// Infected share of each village's residents, in village order.
    pub fn attack_rates(&self, population: &PopulationSnapshot) -> BTreeMap<VillageId, AttackRate> {
        let mut rates: BTreeMap<VillageId, AttackRate> = population
            .villages()
            .iter()
            .map(|village| (village.id.clone(), AttackRate::default()))
            .collect();
        for individual in population.individuals() {
            if let Some(rate) = rates.get_mut(&individual.village_id) {
                rate.residents += 1;
                if self.is_infected(&individual.id) {
                    rate.infected += 1;
                }
            }
        }
        rates
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttackRate {
    pub residents: usize,
    pub infected: usize,
}

impl AttackRate {
    #[allow(clippy::cast_precision_loss)]
    pub fn rate(&self) -> f64 {
        if self.residents == 0 {
            0.0
        } else {
            self.infected as f64 / self.residents as f64
        }
    }
}

/// Assigns infections using the built-in risk models.
///
/// # Errors
///
/// See [`assign_infections_with_registry`].
pub fn assign_infections(
    population: &PopulationSnapshot,
    config: &ScenarioConfig,
) -> Result<InfectionAssignment, OutbreakError> {
    assign_infections_with_registry(&ScenarioRegistry::default(), population, config)
}

/// Selects the infected set for `population` with the risk model registered for the
/// population's scenario type. Draws come from the population's seed, so the same snapshot and
/// config always give the same assignment.
///
/// A `target_cases` above the number of people who could be infected is clamped, and an
/// epicenter village without eligible residents is reported; both are recorded as warnings on
/// the result.
///
/// # Errors
///
/// Returns `OutbreakError::Configuration` if `config` is invalid or no risk model can be
/// resolved.
pub fn assign_infections_with_registry(
    registry: &ScenarioRegistry,
    population: &PopulationSnapshot,
    config: &ScenarioConfig,
) -> Result<InfectionAssignment, OutbreakError> {
    config.validate()?;
    let (model, fallback_warning) = registry.resolve(population.scenario_type())?;
    let mut warnings: Vec<GenerationWarning> = fallback_warning.into_iter().collect();
    let scores = score_population(population, model, config);

    let mut infected = BTreeSet::new();
    let mut weights = Vec::with_capacity(population.len());
    for (position, individual) in population.individuals().iter().enumerate() {
        let authored = &individual.authored;
        if authored.is_seed_case() {
            infected.insert(individual.id.clone());
            weights.push(0.0);
        } else if authored.is_locked_uninfected() {
            weights.push(0.0);
        } else {
            weights.push(scores.get(position).unwrap_or(0.0));
        }
    }
    let seed_cases = infected.len();
    let candidates = weights.iter().filter(|weight| **weight > 0.0).count();
    let eligible = seed_cases + candidates;

    let mut target = config.target_cases;
    if target > eligible {
        let warning = GenerationWarning::TargetCasesClamped {
            requested: target,
            eligible,
        };
        warn!("{warning}");
        warnings.push(warning);
        target = eligible;
    }
    if seed_cases > target {
        let warning = GenerationWarning::SeedCasesExceedTarget { seed_cases, target };
        warn!("{warning}");
        warnings.push(warning);
    }

    for village_id in &config.epicenter_village_ids {
        let has_candidates = population
            .individuals()
            .iter()
            .zip(&weights)
            .any(|(individual, weight)| individual.village_id == *village_id && *weight > 0.0);
        if !has_candidates {
            let warning = GenerationWarning::DegenerateEpicenter {
                village_id: village_id.to_string(),
            };
            warn!("{warning}");
            warnings.push(warning);
        }
    }

    let streams = RandomStreams::new(population.seed());
    let needed = target.saturating_sub(seed_cases);
    let drawn = streams.sample(InfectionRng, |rng| {
        sample_weighted_without_replacement(rng, &weights, needed)
    });
    debug!(
        "sampled {} of {} candidates on top of {seed_cases} seed cases",
        drawn.len(),
        candidates
    );
    for position in drawn {
        infected.insert(population.individuals()[position].id.clone());
    }

    let window = config.exposure_window;
    let exposure_dates = streams.sample(ExposureDateRng, |rng| {
        infected
            .iter()
            .map(|person_id| {
                let offset = rng.random_range(0..=window.days);
                let date = window
                    .start
                    .checked_add_days(Days::new(u64::from(offset)))
                    .unwrap_or(window.start);
                (person_id.clone(), date)
            })
            .collect::<BTreeMap<_, _>>()
    });

    info!(
        "assigned {} infections ({} requested, {} eligible)",
        infected.len(),
        config.target_cases,
        eligible
    );
    Ok(InfectionAssignment {
        seed: population.seed(),
        infected,
        exposure_dates,
        seed_cases,
        requested: config.target_cases,
        eligible,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::population::generate_population;
    use crate::test_support::{lepto_config, lepto_seed_data};

    fn population(seed: u64) -> PopulationSnapshot {
        generate_population(&lepto_seed_data(), &lepto_config(), seed).unwrap()
    }

    #[test]
    fn infects_exactly_the_target() {
        let config = lepto_config();
        for seed in 0..5 {
            let assignment = assign_infections(&population(seed), &config).unwrap();
            assert_eq!(assignment.len(), config.target_cases);
            assert!(assignment.warnings().is_empty());
        }
    }

    #[test]
    fn seed_cases_are_always_infected() {
        let population = population(8);
        let assignment = assign_infections(&population, &lepto_config()).unwrap();
        let mut seed_cases = 0;
        for individual in population.individuals() {
            if individual.authored.is_seed_case() {
                seed_cases += 1;
                assert!(assignment.is_infected(&individual.id));
            }
            if individual.authored.is_locked_uninfected() {
                assert!(!assignment.is_infected(&individual.id));
            }
        }
        assert_eq!(assignment.seed_cases(), seed_cases);
        assert!(seed_cases > 0);
    }

    #[test]
    fn control_village_has_no_cases() {
        let population = population(21);
        let assignment = assign_infections(&population, &lepto_config()).unwrap();
        let rates = assignment.attack_rates(&population);
        assert_eq!(rates[&VillageId::from("V4")].infected, 0);
        assert!(rates[&VillageId::from("V1")].rate() > rates[&VillageId::from("V4")].rate());
    }

    #[test]
    fn oversized_target_is_clamped() {
        let population = population(2);
        let mut config = lepto_config();
        config.target_cases = 100_000;
        let assignment = assign_infections(&population, &config).unwrap();
        assert_eq!(assignment.len(), assignment.eligible());
        assert!(matches!(
            assignment.warnings(),
            [GenerationWarning::TargetCasesClamped { requested: 100_000, .. }]
        ));
    }

    #[test]
    fn target_below_seed_cases_keeps_every_seed() {
        let population = population(2);
        let mut config = lepto_config();
        config.target_cases = 1;
        let assignment = assign_infections(&population, &config).unwrap();
        assert_eq!(assignment.len(), assignment.seed_cases());
        assert!(matches!(
            assignment.warnings(),
            [GenerationWarning::SeedCasesExceedTarget { target: 1, .. }]
        ));
    }

    #[test]
    fn epicenter_without_candidates_is_reported() {
        let population = population(4);
        let mut config = lepto_config();
        config.epicenter_village_ids = vec!["V4".into()];
        let assignment = assign_infections(&population, &config).unwrap();
        assert_eq!(
            assignment.warnings(),
            [GenerationWarning::DegenerateEpicenter {
                village_id: "V4".to_string()
            }]
        );
        assert_eq!(assignment.len(), config.target_cases);
    }

    #[test]
    fn exposure_dates_fall_in_the_window() {
        let config = lepto_config();
        let assignment = assign_infections(&population(13), &config).unwrap();
        for person_id in assignment.infected() {
            let date = assignment.exposure_date(person_id).unwrap();
            assert!(config.exposure_window.contains(date));
        }
    }

    #[test]
    fn same_population_same_assignment() {
        let config = lepto_config();
        let first = assign_infections(&population(17), &config).unwrap();
        let second = assign_infections(&population(17), &config).unwrap();
        assert_eq!(first, second);
        let other = assign_infections(&population(18), &config).unwrap();
        assert_ne!(first.infected(), other.infected());
    }

    #[test]
    fn invalid_config_is_an_error() {
        let population = population(4);
        let mut config = lepto_config();
        config.risk_epsilon = 0.0;
        assert!(matches!(
            assign_infections(&population, &config),
            Err(OutbreakError::Configuration(_))
        ));
    }
}
