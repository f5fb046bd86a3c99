//! Expands seed records into a full [`PopulationSnapshot`].
//!
//! Villages are processed in seed order. For each village the generator first tops the seeded
//! residents up to the village's target with generated households (sizes and member
//! demographics drawn from the seed sample), then asks the scenario's risk model to synthesize
//! exposure attributes for every household and individual, seeded ones included. Authored
//! values always win: synthesized attributes only fill what the seed files left blank.
use log::{debug, info};

use crate::config::ScenarioConfig;
use crate::error::OutbreakError;
use crate::population::{
    DemographicSampler, Demographics, Household, HouseholdId, HouseholdSizeSampler, Individual,
    Origin, PersonId, PopulationSnapshot, Village,
};
use crate::random::{define_rng, RandomStreams};
use crate::risk::{RiskModel, ScenarioRegistry};
use crate::seed::SeedData;
use crate::{HashMap, HashSet};

define_rng!(PopulationRng, ExposureRng);

/// Generated person ids start here unless the seed ids already go higher.
const FIRST_GENERATED_PERSON: u32 = 3000;

/// Generates a population using the built-in risk models.
///
/// # Errors
///
/// See [`generate_population_with_registry`].
pub fn generate_population(
    seed_data: &SeedData,
    config: &ScenarioConfig,
    seed: u64,
) -> Result<PopulationSnapshot, OutbreakError> {
    generate_population_with_registry(&ScenarioRegistry::default(), seed_data, config, seed)
}

/// Generates a population whose exposure attributes come from the model `registry` resolves for
/// `config.scenario_type`. The result is a pure function of the arguments.
///
/// # Errors
///
/// Returns `OutbreakError::DataIntegrity` if the seed records contain duplicate ids or
/// dangling references, and `OutbreakError::Configuration` if `config` is invalid or no risk
/// model can be resolved.
pub fn generate_population_with_registry(
    registry: &ScenarioRegistry,
    seed_data: &SeedData,
    config: &ScenarioConfig,
    seed: u64,
) -> Result<PopulationSnapshot, OutbreakError> {
    // Config and seed records are checked before anything is drawn.
    config.validate()?;
    PopulationSnapshot::new(
        seed_data.villages.clone(),
        seed_data.households.clone(),
        seed_data.individuals.clone(),
    )?;
    let (model, warning) = registry.resolve(&config.scenario_type)?;

    let streams = RandomStreams::new(seed);
    let household_sizes =
        HouseholdSizeSampler::from_seed(&seed_data.households, &seed_data.individuals);
    let demographics = DemographicSampler::from_seed(&seed_data.individuals);
    let targets = village_targets(&seed_data.villages, config.target_population);
    let mut ids = IdAllocator::new(seed_data);

    let mut households = Vec::new();
    let mut individuals = Vec::new();
    for (village, target) in seed_data.villages.iter().zip(targets) {
        let generated = VillageGenerator {
            village,
            seed_data,
            streams: &streams,
            model,
        }
        .generate(
            target,
            config.target_population.is_none(),
            &household_sizes,
            &demographics,
            &mut ids,
        )?;
        households.extend(generated.0);
        individuals.extend(generated.1);
    }

    let mut population =
        PopulationSnapshot::new(seed_data.villages.clone(), households, individuals)?;
    population.set_provenance(seed, &config.scenario_id, model.scenario_type());
    if let Some(warning) = warning {
        population.push_warning(warning);
    }
    info!(
        "generated population for scenario `{}` ({}): {} villages, {} households, {} individuals (seed={seed})",
        config.scenario_id,
        model.scenario_type(),
        population.villages().len(),
        population.households().len(),
        population.len()
    );
    Ok(population)
}

/// Per-village resident targets. With an overall `target_population` the village populations
/// are rescaled to sum to it exactly (largest remainder, ties to the earlier village); a
/// population of zero everywhere splits the target evenly.
pub(crate) fn village_targets(villages: &[Village], target_population: Option<u32>) -> Vec<u32> {
    let Some(total) = target_population else {
        return villages.iter().map(|village| village.population).collect();
    };
    if villages.is_empty() {
        return Vec::new();
    }

    let weights: Vec<f64> = match villages.iter().map(|village| u64::from(village.population)).sum::<u64>() {
        0 => vec![1.0; villages.len()],
        _ => villages
            .iter()
            .map(|village| f64::from(village.population))
            .collect(),
    };
    let weight_sum: f64 = weights.iter().sum();
    let quotas: Vec<f64> = weights
        .iter()
        .map(|weight| f64::from(total) * weight / weight_sum)
        .collect();

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let mut targets: Vec<u32> = quotas.iter().map(|quota| quota.floor() as u32).collect();
    let assigned: u32 = targets.iter().sum();
    let mut by_remainder: Vec<usize> = (0..villages.len()).collect();
    by_remainder.sort_by(|&a, &b| {
        let remainder = |i: usize| quotas[i] - quotas[i].floor();
        remainder(b).total_cmp(&remainder(a)).then(a.cmp(&b))
    });
    for &position in by_remainder
        .iter()
        .cycle()
        .take(total.saturating_sub(assigned) as usize)
    {
        targets[position] += 1;
    }
    targets
}

/// Hands out `HH###` and `P####` ids that do not collide with seeded ones.
struct IdAllocator {
    next_household: u32,
    next_person: u32,
    taken_households: HashSet<HouseholdId>,
    taken_people: HashSet<PersonId>,
}

impl IdAllocator {
    fn new(seed_data: &SeedData) -> Self {
        let max_household = seed_data
            .households
            .iter()
            .filter_map(|household| household.id.numeric_suffix())
            .max()
            .unwrap_or(0);
        let max_person = seed_data
            .individuals
            .iter()
            .filter_map(|individual| individual.id.numeric_suffix())
            .max()
            .unwrap_or(0);
        IdAllocator {
            next_household: max_household.saturating_add(1),
            next_person: max_person.saturating_add(1).max(FIRST_GENERATED_PERSON),
            taken_households: seed_data
                .households
                .iter()
                .map(|household| household.id.clone())
                .collect(),
            taken_people: seed_data
                .individuals
                .iter()
                .map(|individual| individual.id.clone())
                .collect(),
        }
    }

    fn household(&mut self) -> HouseholdId {
        loop {
            let id = HouseholdId::new(format!("HH{:03}", self.next_household));
            self.next_household += 1;
            if self.taken_households.insert(id.clone()) {
                return id;
            }
        }
    }

    fn person(&mut self) -> PersonId {
        loop {
            let id = PersonId::new(format!("P{:04}", self.next_person));
            self.next_person += 1;
            if self.taken_people.insert(id.clone()) {
                return id;
            }
        }
    }
}

struct VillageGenerator<'a> {
    village: &'a Village,
    seed_data: &'a SeedData,
    streams: &'a RandomStreams,
    model: &'a dyn RiskModel,
}

struct PlannedHousehold {
    id: HouseholdId,
    size: u32,
    members: Vec<(PersonId, Demographics)>,
}

impl VillageGenerator<'_> {
    /// Returns the village's households and residents: seeded records first in seed order, then
    /// generated ones.
    fn generate(
        &self,
        target: u32,
        use_household_target: bool,
        household_sizes: &HouseholdSizeSampler,
        demographics: &DemographicSampler,
        ids: &mut IdAllocator,
    ) -> Result<(Vec<Household>, Vec<Individual>), OutbreakError> {
        let village = self.village;
        let mut households: Vec<Household> = self
            .seed_data
            .households
            .iter()
            .filter(|household| household.village_id == village.id)
            .cloned()
            .collect();
        let mut individuals: Vec<Individual> = self
            .seed_data
            .individuals
            .iter()
            .filter(|individual| individual.village_id == village.id)
            .cloned()
            .collect();

        let sizes = match village.household_target {
            Some(household_target) if use_household_target => {
                let missing = household_target.saturating_sub(households.len() as u32);
                self.streams.sample(PopulationRng, |rng| {
                    (0..missing).map(|_| household_sizes.sample(rng)).collect()
                })
            }
            _ => {
                let missing = target.saturating_sub(individuals.len() as u32);
                self.streams.sample(PopulationRng, |rng| {
                    let mut sizes = Vec::new();
                    let mut planned = 0;
                    while planned < missing {
                        let size = household_sizes.sample(rng).clamp(1, missing - planned);
                        planned += size;
                        sizes.push(size);
                    }
                    sizes
                })
            }
        };

        let planned: Vec<PlannedHousehold> = sizes
            .into_iter()
            .map(|size| PlannedHousehold {
                id: ids.household(),
                size,
                members: Vec::new(),
            })
            .collect();
        let planned = self.streams.sample(PopulationRng, |rng| {
            planned
                .into_iter()
                .map(|mut household| {
                    household.members = (0..household.size)
                        .map(|_| (ids.person(), demographics.sample(&village.id, rng)))
                        .collect();
                    household
                })
                .collect::<Vec<_>>()
        });

        let seeded_households = households.len();
        let seeded_individuals = individuals.len();
        self.streams.sample(ExposureRng, |rng| {
            for household in &mut households {
                let synthesized = self.model.household_attributes(village, rng)?;
                household.attributes.fill_missing(synthesized);
            }
            for plan in &planned {
                let mut attributes = self.model.household_attributes(village, rng)?;
                attributes.insert("household_size", plan.size);
                households.push(Household {
                    id: plan.id.clone(),
                    village_id: village.id.clone(),
                    attributes,
                    origin: Origin::Generated,
                });
            }

            let position: HashMap<HouseholdId, usize> = households
                .iter()
                .enumerate()
                .map(|(position, household)| (household.id.clone(), position))
                .collect();
            for individual in &mut individuals {
                let Some(&household) = position.get(&individual.household_id) else {
                    return Err(OutbreakError::data_integrity(
                        "population",
                        None,
                        "hh_id",
                        format!(
                            "individual `{}` references household `{}` outside village `{}`",
                            individual.id, individual.household_id, village.id
                        ),
                    ));
                };
                let synthesized = self.model.individual_exposure(
                    village,
                    &households[household],
                    &individual.demographics,
                    rng,
                );
                individual.exposure.fill_missing(synthesized);
            }
            for (offset, plan) in planned.iter().enumerate() {
                let household = &households[seeded_households + offset];
                for (person_id, member) in &plan.members {
                    let exposure = self
                        .model
                        .individual_exposure(village, household, member, rng);
                    individuals.push(Individual {
                        id: person_id.clone(),
                        household_id: plan.id.clone(),
                        village_id: village.id.clone(),
                        demographics: member.clone(),
                        exposure,
                        authored: Default::default(),
                        origin: Origin::Generated,
                    });
                }
            }
            Ok(())
        })?;

        debug!(
            "village {}: {} seeded + {} generated households, {} seeded + {} generated individuals",
            village.id,
            seeded_households,
            households.len() - seeded_households,
            seeded_individuals,
            individuals.len() - seeded_individuals
        );
        Ok((households, individuals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::population::{Attributes, Sex};
    use crate::test_support::{lepto_config, lepto_seed_data};

    fn village(id: &str, population: u32) -> Village {
        Village {
            id: id.into(),
            name: id.to_string(),
            population,
            household_target: None,
            attributes: Attributes::new(),
        }
    }

    #[test]
    fn targets_rescale_to_the_exact_total() {
        let villages = [village("V1", 420), village("V2", 380), village("V3", 200)];
        let targets = village_targets(&villages, Some(101));
        assert_eq!(targets.iter().sum::<u32>(), 101);
        assert_eq!(targets, [43, 38, 20]);

        assert_eq!(village_targets(&villages, None), [420, 380, 200]);

        let empty = [village("V1", 0), village("V2", 0), village("V3", 0)];
        assert_eq!(village_targets(&empty, Some(10)), [4, 3, 3]);
    }

    #[test]
    fn village_populations_hit_their_targets() {
        let seed_data = lepto_seed_data();
        let config = lepto_config();
        let population = generate_population(&seed_data, &config, 42).unwrap();

        for village in population.villages() {
            let residents = population.individuals_in_village(&village.id).count();
            assert_eq!(residents, village.population as usize, "{}", village.id);
        }
        assert_eq!(population.scenario_type(), "lepto");
        assert_eq!(population.seed(), 42);
        assert!(population.warnings().is_empty());
    }

    #[test]
    fn seeded_records_are_kept_first_and_verbatim() {
        let seed_data = lepto_seed_data();
        let population = generate_population(&seed_data, &lepto_config(), 7).unwrap();

        for seeded in &seed_data.individuals {
            let generated = population.individual(&seeded.id).unwrap();
            assert_eq!(generated.origin, Origin::Seed);
            assert_eq!(generated.demographics, seeded.demographics);
            assert_eq!(generated.authored, seeded.authored);
            for (name, value) in seeded.exposure.attributes.iter() {
                assert_eq!(generated.exposure.attributes.get(name), Some(value));
            }
        }
        for village in population.villages() {
            let origins: Vec<Origin> = population
                .individuals_in_village(&village.id)
                .map(|individual| individual.origin)
                .collect();
            let first_generated = origins
                .iter()
                .position(|origin| *origin == Origin::Generated)
                .unwrap_or(origins.len());
            assert!(origins[first_generated..]
                .iter()
                .all(|origin| *origin == Origin::Generated));
        }
    }

    #[test]
    fn generated_ids_do_not_collide_with_seeds() {
        let seed_data = lepto_seed_data();
        let population = generate_population(&seed_data, &lepto_config(), 11).unwrap();
        for individual in population.individuals() {
            if individual.origin == Origin::Generated {
                let suffix = individual.id.numeric_suffix().unwrap();
                assert!(suffix >= FIRST_GENERATED_PERSON);
                assert!(individual.authored.true_infection.is_none());
            }
        }
        for household in population.households() {
            if household.origin == Origin::Generated {
                assert!(household.attributes.contains("household_size"));
                assert!(household.attributes.contains("flood_depth_category"));
            }
        }
    }

    #[test]
    fn same_seed_same_population() {
        let seed_data = lepto_seed_data();
        let config = lepto_config();
        let first = serde_json::to_string(&generate_population(&seed_data, &config, 5).unwrap())
            .unwrap();
        let second = serde_json::to_string(&generate_population(&seed_data, &config, 5).unwrap())
            .unwrap();
        let other = serde_json::to_string(&generate_population(&seed_data, &config, 6).unwrap())
            .unwrap();
        assert_eq!(first, second);
        assert_ne!(first, other);
    }

    #[test]
    fn overall_target_rescales_villages() {
        let seed_data = lepto_seed_data();
        let mut config = lepto_config();
        config.target_population = Some(500);
        let population = generate_population(&seed_data, &config, 3).unwrap();
        assert_eq!(population.len(), 500);
    }

    #[test]
    fn household_target_mode_adds_households() {
        let mut seed_data = lepto_seed_data();
        seed_data.villages[3].household_target = Some(12);
        let population = generate_population(&seed_data, &lepto_config(), 3).unwrap();
        let village_id = seed_data.villages[3].id.clone();
        let households = population
            .households()
            .iter()
            .filter(|household| household.village_id == village_id)
            .count();
        assert_eq!(households, 12);
    }

    #[test]
    fn unknown_scenario_type_falls_back() {
        let seed_data = lepto_seed_data();
        let mut config = lepto_config();
        config.scenario_type = "cholera".to_string();
        let population = generate_population(&seed_data, &config, 1).unwrap();
        assert_eq!(population.scenario_type(), "lepto");
        assert_eq!(population.warnings().len(), 1);
    }

    #[test]
    fn empty_seed_uses_fallback_distributions() {
        let seed_data = SeedData {
            villages: vec![village("V1", 40)],
            households: Vec::new(),
            individuals: Vec::new(),
        };
        let population = generate_population(&seed_data, &lepto_config(), 9).unwrap();
        assert_eq!(population.len(), 40);
        assert!(population
            .individuals()
            .iter()
            .all(|individual| matches!(individual.demographics.sex, Sex::Male | Sex::Female)));
        assert_eq!(population.individuals()[0].id.as_str(), "P3000");
        assert_eq!(population.households()[0].id.as_str(), "HH001");
    }

    #[test]
    fn invalid_config_is_an_error() {
        let mut config = lepto_config();
        config.clinical.symptomatic_rate = 1.5;
        assert!(matches!(
            generate_population(&lepto_seed_data(), &config, 1),
            Err(OutbreakError::Configuration(_))
        ));
    }
}
