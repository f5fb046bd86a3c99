//! Villages, households and individuals, and the immutable [`PopulationSnapshot`] that holds a
//! generated population.
//!
//! A snapshot is only ever built through [`PopulationSnapshot::new`], which checks that every
//! individual belongs to exactly one known household and every household to exactly one known
//! village. Everything downstream (risk scoring, infection assignment, clinical simulation, the
//! line list) relies on that and looks records up by index.
mod attributes;
mod demographics;
mod generator;

use std::fmt::{self, Display};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{Display as StrumDisplay, EnumString};

pub use attributes::{parse_flag, AttributeValue, Attributes};
pub use demographics::{fallback_demographics, DemographicSampler, HouseholdSizeSampler};
pub use generator::{generate_population, generate_population_with_registry};

use crate::clinical::{Outcome, Severity};
use crate::error::{GenerationWarning, OutbreakError};
use crate::symptom::{Symptom, SymptomSet};
use crate::HashMap;

const POPULATION: &str = "population";

/// The trailing digits of an id, e.g. `42` for `HH042`.
fn numeric_suffix(id: &str) -> Option<u32> {
    let stem = id.trim_end_matches(|c: char| c.is_ascii_digit());
    id[stem.len()..].parse().ok()
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                $name(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn numeric_suffix(&self) -> Option<u32> {
                numeric_suffix(&self.0)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                $name(id.to_string())
            }
        }
    };
}

string_id!(VillageId);
string_id!(HouseholdId);
string_id!(
    /// Seed ids are kept as authored; generated ids are `P####`.
    PersonId
);

/// Whether a record was authored in the seed files or produced by the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Seed,
    Generated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, StrumDisplay, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Sex {
    #[serde(rename = "M")]
    #[strum(to_string = "M", serialize = "male")]
    Male,
    #[serde(rename = "F")]
    #[strum(to_string = "F", serialize = "female")]
    Female,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Village {
    pub id: VillageId,
    pub name: String,
    /// Target number of residents.
    pub population: u32,
    /// Optional target number of households.
    pub household_target: Option<u32>,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Household {
    pub id: HouseholdId,
    pub village_id: VillageId,
    pub attributes: Attributes,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Demographics {
    pub age: u8,
    pub sex: Sex,
    pub occupation: Option<String>,
}

/// Individual-level exposure attributes. The named fields are common to every scenario; the
/// strategy-specific ones (cleanup work, evening outdoor exposure, ...) live in `attributes`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExposureProfile {
    pub vaccinated: Option<bool>,
    pub protective_equipment: Option<bool>,
    pub distance_to_risk_site_m: Option<f64>,
    pub attributes: Attributes,
}

impl ExposureProfile {
    /// Fills every field this profile leaves unset from `synthesized`.
    pub fn fill_missing(&mut self, synthesized: ExposureProfile) {
        self.vaccinated = self.vaccinated.or(synthesized.vaccinated);
        self.protective_equipment = self
            .protective_equipment
            .or(synthesized.protective_equipment);
        self.distance_to_risk_site_m = self
            .distance_to_risk_site_m
            .or(synthesized.distance_to_risk_site_m);
        self.attributes.fill_missing(synthesized.attributes);
    }

    /// Looks a flag up by name across the named fields and the free-form attributes.
    pub fn flag(&self, name: &str) -> Option<bool> {
        match name {
            "vaccinated" => self.vaccinated,
            "protective_equipment" => self.protective_equipment,
            _ => self.attributes.flag(name),
        }
    }
}

/// Clinical values an author wrote into the individuals seed file. Anything left `None` is drawn
/// by the clinical simulator, conditioned on what was authored.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuthoredClinical {
    pub true_infection: Option<bool>,
    pub symptomatic: Option<bool>,
    pub severity: Option<Severity>,
    pub onset_date: Option<NaiveDate>,
    pub outcome: Option<Outcome>,
    pub has_sequelae: Option<bool>,
    pub symptoms: SymptomSet,
}

impl AuthoredClinical {
    /// A seed case is authored as infected and is always part of the infected set.
    pub fn is_seed_case(&self) -> bool {
        self.true_infection == Some(true)
            || self.symptomatic == Some(true)
            || self.severity == Some(Severity::Severe)
            || self.symptoms.any_present()
    }

    /// Authored as explicitly not infected; never sampled.
    pub fn is_locked_uninfected(&self) -> bool {
        self.true_infection == Some(false)
    }

    /// Checks that the authored values do not contradict `severe ⇒ symptomatic ⇒ infected`.
    /// Returns the offending field and a reason.
    pub fn check_consistency(&self) -> Result<(), (&'static str, String)> {
        let declared_asymptomatic = self.symptomatic == Some(false);
        if declared_asymptomatic && self.severity == Some(Severity::Severe) {
            return Err((
                "severe",
                "is set on a case authored as not symptomatic".to_string(),
            ));
        }
        if declared_asymptomatic {
            if let Some(symptom) = self.symptoms.present().next() {
                return Err((
                    "symptoms",
                    format!("`{symptom}` is present on a case authored as not symptomatic"),
                ));
            }
        }
        if self.is_locked_uninfected() {
            if self.symptomatic == Some(true)
                || self.severity.is_some()
                || self.symptoms.any_present()
            {
                return Err((
                    "true_infection",
                    "is false but clinical findings are authored".to_string(),
                ));
            }
            if self.outcome.is_some() || self.onset_date.is_some() {
                return Err((
                    "true_infection",
                    "is false but an onset date or outcome is authored".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn symptom(&self, symptom: Symptom) -> Option<bool> {
        self.symptoms
            .is_recorded(symptom)
            .then(|| self.symptoms.has(symptom))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Individual {
    pub id: PersonId,
    pub household_id: HouseholdId,
    pub village_id: VillageId,
    pub demographics: Demographics,
    pub exposure: ExposureProfile,
    pub authored: AuthoredClinical,
    pub origin: Origin,
}

/// An individual together with the household and village it belongs to.
#[derive(Debug, Clone, Copy)]
pub struct Placement<'a> {
    pub individual: &'a Individual,
    pub household: &'a Household,
    pub village: &'a Village,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct SnapshotIndex {
    villages: HashMap<VillageId, usize>,
    households: HashMap<HouseholdId, usize>,
    individuals: HashMap<PersonId, usize>,
    household_village: Vec<usize>,
    individual_household: Vec<usize>,
}

/// A generated population. Immutable once built; serializes deterministically.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopulationSnapshot {
    seed: u64,
    scenario_id: String,
    scenario_type: String,
    villages: Vec<Village>,
    households: Vec<Household>,
    individuals: Vec<Individual>,
    warnings: Vec<GenerationWarning>,
    #[serde(skip)]
    index: SnapshotIndex,
}

impl PopulationSnapshot {
    /// Builds a snapshot, checking ids are unique and every reference resolves.
    ///
    /// # Errors
    ///
    /// Returns `OutbreakError::DataIntegrity` for a duplicate id, an unknown village or household
    /// reference, or an individual whose `village_id` disagrees with its household's.
    pub fn new(
        villages: Vec<Village>,
        households: Vec<Household>,
        individuals: Vec<Individual>,
    ) -> Result<Self, OutbreakError> {
        let mut index = SnapshotIndex::default();

        for (position, village) in villages.iter().enumerate() {
            if index.villages.insert(village.id.clone(), position).is_some() {
                return Err(OutbreakError::data_integrity(
                    POPULATION,
                    None,
                    "village_id",
                    format!("`{}` is not unique", village.id),
                ));
            }
        }

        index.household_village.reserve(households.len());
        for (position, household) in households.iter().enumerate() {
            if index
                .households
                .insert(household.id.clone(), position)
                .is_some()
            {
                return Err(OutbreakError::data_integrity(
                    POPULATION,
                    None,
                    "hh_id",
                    format!("`{}` is not unique", household.id),
                ));
            }
            let Some(&village) = index.villages.get(&household.village_id) else {
                return Err(OutbreakError::data_integrity(
                    POPULATION,
                    None,
                    "village_id",
                    format!(
                        "household `{}` references unknown village `{}`",
                        household.id, household.village_id
                    ),
                ));
            };
            index.household_village.push(village);
        }

        index.individual_household.reserve(individuals.len());
        for (position, individual) in individuals.iter().enumerate() {
            if index
                .individuals
                .insert(individual.id.clone(), position)
                .is_some()
            {
                return Err(OutbreakError::data_integrity(
                    POPULATION,
                    None,
                    "person_id",
                    format!("`{}` is not unique", individual.id),
                ));
            }
            let Some(&household) = index.households.get(&individual.household_id) else {
                return Err(OutbreakError::data_integrity(
                    POPULATION,
                    None,
                    "hh_id",
                    format!(
                        "individual `{}` references unknown household `{}`",
                        individual.id, individual.household_id
                    ),
                ));
            };
            if households[household].village_id != individual.village_id {
                return Err(OutbreakError::data_integrity(
                    POPULATION,
                    None,
                    "village_id",
                    format!(
                        "individual `{}` is in village `{}` but household `{}` is in `{}`",
                        individual.id,
                        individual.village_id,
                        individual.household_id,
                        households[household].village_id
                    ),
                ));
            }
            index.individual_household.push(household);
        }

        Ok(PopulationSnapshot {
            seed: 0,
            scenario_id: String::new(),
            scenario_type: String::new(),
            villages,
            households,
            individuals,
            warnings: Vec::new(),
            index,
        })
    }

    pub(crate) fn set_provenance(&mut self, seed: u64, scenario_id: &str, scenario_type: &str) {
        self.seed = seed;
        self.scenario_id = scenario_id.to_string();
        self.scenario_type = scenario_type.to_string();
    }

    pub(crate) fn push_warning(&mut self, warning: GenerationWarning) {
        self.warnings.push(warning);
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn scenario_id(&self) -> &str {
        &self.scenario_id
    }

    /// The scenario type whose strategy synthesized the exposure attributes.
    pub fn scenario_type(&self) -> &str {
        &self.scenario_type
    }

    pub fn warnings(&self) -> &[GenerationWarning] {
        &self.warnings
    }

    pub fn villages(&self) -> &[Village] {
        &self.villages
    }

    pub fn households(&self) -> &[Household] {
        &self.households
    }

    pub fn individuals(&self) -> &[Individual] {
        &self.individuals
    }

    pub fn village(&self, village_id: &VillageId) -> Option<&Village> {
        self.index
            .villages
            .get(village_id)
            .map(|&position| &self.villages[position])
    }

    pub fn household(&self, household_id: &HouseholdId) -> Option<&Household> {
        self.index
            .households
            .get(household_id)
            .map(|&position| &self.households[position])
    }

    pub fn individual(&self, person_id: &PersonId) -> Option<&Individual> {
        self.index_of(person_id)
            .map(|position| &self.individuals[position])
    }

    /// Position of the individual in [`PopulationSnapshot::individuals`].
    pub fn index_of(&self, person_id: &PersonId) -> Option<usize> {
        self.index.individuals.get(person_id).copied()
    }

    /// The individual at `position` with its household and village.
    ///
    /// # Panics
    ///
    /// Panics if `position` is out of bounds.
    pub fn placement(&self, position: usize) -> Placement<'_> {
        let household = self.index.individual_household[position];
        let village = self.index.household_village[household];
        Placement {
            individual: &self.individuals[position],
            household: &self.households[household],
            village: &self.villages[village],
        }
    }

    pub fn placements(&self) -> impl Iterator<Item = Placement<'_>> {
        (0..self.individuals.len()).map(|position| self.placement(position))
    }

    pub fn individuals_in_village<'a>(
        &'a self,
        village_id: &VillageId,
    ) -> impl Iterator<Item = &'a Individual> + 'a {
        let village_id = village_id.clone();
        self.individuals
            .iter()
            .filter(move |individual| individual.village_id == village_id)
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }
}
