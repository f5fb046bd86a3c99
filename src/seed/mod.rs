//! Loads a scenario directory: `villages.csv`, `households_seed.csv`, `individuals_seed.csv` and
//! `scenario_config.json`.
//!
//! Required columns are `village_id,name,population` for villages, `hh_id,village_id` for
//! households and `person_id,hh_id,age,sex` for individuals. Every other column is kept as a risk
//! attribute of its record, except the individual columns the engine understands directly
//! (exposure fields, authored clinical values and `symptoms_<name>` flags). Loading fails fast
//! with `OutbreakError::DataIntegrity` naming the file, row and field of the first problem.
mod records;

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use log::{debug, error};

use crate::clinical::{Outcome, Severity};
use crate::config::ScenarioConfig;
use crate::error::OutbreakError;
use crate::population::{
    parse_flag, AuthoredClinical, Demographics, ExposureProfile, Household, HouseholdId,
    Individual, Origin, PersonId, Sex, Village, VillageId,
};
use crate::symptom::{Symptom, SymptomSet};
use crate::{HashMap, HashSet};
use records::{SeedRow, SeedTable};

pub const VILLAGES_FILE: &str = "villages.csv";
pub const HOUSEHOLDS_FILE: &str = "households_seed.csv";
pub const INDIVIDUALS_FILE: &str = "individuals_seed.csv";
pub const SCENARIO_CONFIG_FILE: &str = "scenario_config.json";

const VILLAGE_COLUMNS: [&str; 4] = ["village_id", "name", "population", "households"];
const HOUSEHOLD_COLUMNS: [&str; 2] = ["hh_id", "village_id"];

// Disease-specific spellings of the authored clinical columns are accepted as aliases.
const TRUE_INFECTION: [&str; 3] = ["true_infection", "true_lepto_infection", "true_je_infection"];
const SYMPTOMATIC: [&str; 3] = ["symptomatic", "symptomatic_lepto", "symptomatic_AES"];
const SEVERE: [&str; 3] = ["severe", "severe_lepto", "severe_neuro"];
const VACCINATED: [&str; 2] = ["vaccinated", "JE_vaccinated"];

const INDIVIDUAL_COLUMNS: [&str; 12] = [
    "person_id",
    "hh_id",
    "village_id",
    "age",
    "sex",
    "occupation",
    "protective_equipment",
    "distance_to_risk_site_m",
    "clinical_severity",
    "onset_date",
    "outcome",
    "has_sequelae",
];

/// The typed contents of a scenario's seed files, in file order.
#[derive(Debug, Clone, Default)]
pub struct SeedData {
    pub villages: Vec<Village>,
    pub households: Vec<Household>,
    pub individuals: Vec<Individual>,
}

impl SeedData {
    /// Parses the three seed tables.
    ///
    /// # Errors
    ///
    /// Returns `OutbreakError::DataIntegrity` when a required column is absent, a cell cannot be
    /// parsed, an id is duplicated, a reference does not resolve, or the authored clinical values
    /// of an individual contradict each other.
    pub fn from_readers<V: Read, H: Read, I: Read>(
        villages: V,
        households: H,
        individuals: I,
    ) -> Result<Self, OutbreakError> {
        let villages = parse_villages(&SeedTable::read(
            VILLAGES_FILE,
            villages,
            &["village_id", "name", "population"],
        )?)?;
        let households = parse_households(
            &SeedTable::read(HOUSEHOLDS_FILE, households, &HOUSEHOLD_COLUMNS)?,
            &villages,
        )?;
        let individuals = parse_individuals(
            &SeedTable::read(
                INDIVIDUALS_FILE,
                individuals,
                &["person_id", "hh_id", "age", "sex"],
            )?,
            &households,
        )?;
        debug!(
            "loaded seed data: {} villages, {} households, {} individuals",
            villages.len(),
            households.len(),
            individuals.len()
        );
        Ok(SeedData {
            villages,
            households,
            individuals,
        })
    }

    /// Seed individuals authored as infected.
    pub fn seed_cases(&self) -> impl Iterator<Item = &Individual> {
        self.individuals
            .iter()
            .filter(|individual| individual.authored.is_seed_case())
    }
}

fn open(dir: &Path, name: &str) -> Result<File, OutbreakError> {
    let path = dir.join(name);
    File::open(&path).map_err(|io_error| {
        error!("could not open {}: {io_error}", path.display());
        OutbreakError::from(io_error)
    })
}

/// Loads the three seed tables from `dir`.
///
/// # Errors
///
/// Returns an `OutbreakError::IoError` if a file cannot be opened, otherwise see
/// [`SeedData::from_readers`].
pub fn load_seed_data(dir: &Path) -> Result<SeedData, OutbreakError> {
    SeedData::from_readers(
        open(dir, VILLAGES_FILE)?,
        open(dir, HOUSEHOLDS_FILE)?,
        open(dir, INDIVIDUALS_FILE)?,
    )
}

/// Loads and validates `scenario_config.json` together with the seed tables.
pub fn load_scenario(dir: &Path) -> Result<(ScenarioConfig, SeedData), OutbreakError> {
    let config = ScenarioConfig::from_json_file(&dir.join(SCENARIO_CONFIG_FILE))?;
    let seed_data = load_seed_data(dir)?;
    Ok((config, seed_data))
}

fn parse_villages(table: &SeedTable) -> Result<Vec<Village>, OutbreakError> {
    let mut seen: HashSet<VillageId> = HashSet::default();
    let mut villages = Vec::new();
    for row in table.rows() {
        let id = VillageId::new(row.required("village_id")?);
        if !seen.insert(id.clone()) {
            return Err(row.error("village_id", format!("`{id}` is not unique")));
        }
        villages.push(Village {
            id,
            name: row.required("name")?.to_string(),
            population: row.parse_required("population")?,
            household_target: row.parse_optional("households")?,
            attributes: row.attributes_where(|column| !VILLAGE_COLUMNS.contains(&column)),
        });
    }
    Ok(villages)
}

fn parse_households(
    table: &SeedTable,
    villages: &[Village],
) -> Result<Vec<Household>, OutbreakError> {
    let known_villages: HashSet<&VillageId> = villages.iter().map(|village| &village.id).collect();
    let mut seen: HashSet<HouseholdId> = HashSet::default();
    let mut households = Vec::new();
    for row in table.rows() {
        let id = HouseholdId::new(row.required("hh_id")?);
        if !seen.insert(id.clone()) {
            return Err(row.error("hh_id", format!("`{id}` is not unique")));
        }
        let village_id = VillageId::new(row.required("village_id")?);
        if !known_villages.contains(&village_id) {
            return Err(row.error(
                "village_id",
                format!("references unknown village `{village_id}`"),
            ));
        }
        households.push(Household {
            id,
            village_id,
            attributes: row.attributes_where(|column| !HOUSEHOLD_COLUMNS.contains(&column)),
            origin: Origin::Seed,
        });
    }
    Ok(households)
}

fn is_individual_column(column: &str) -> bool {
    INDIVIDUAL_COLUMNS.contains(&column)
        || TRUE_INFECTION.contains(&column)
        || SYMPTOMATIC.contains(&column)
        || SEVERE.contains(&column)
        || VACCINATED.contains(&column)
        || Symptom::from_column(column).is_some()
}

/// The first of `aliases` present on the row.
fn first_flag(row: &SeedRow, aliases: &[&str]) -> Result<Option<bool>, OutbreakError> {
    for alias in aliases {
        if let Some(flag) = row.flag(alias)? {
            return Ok(Some(flag));
        }
    }
    Ok(None)
}

fn parse_individuals(
    table: &SeedTable,
    households: &[Household],
) -> Result<Vec<Individual>, OutbreakError> {
    let household_villages: HashMap<&HouseholdId, &VillageId> = households
        .iter()
        .map(|household| (&household.id, &household.village_id))
        .collect();
    let mut seen: HashSet<PersonId> = HashSet::default();
    let mut individuals = Vec::new();

    for row in table.rows() {
        let id = PersonId::new(row.required("person_id")?);
        if !seen.insert(id.clone()) {
            return Err(row.error("person_id", format!("`{id}` is not unique")));
        }
        let household_id = HouseholdId::new(row.required("hh_id")?);
        let Some(&household_village) = household_villages.get(&household_id) else {
            return Err(row.error(
                "hh_id",
                format!("references unknown household `{household_id}`"),
            ));
        };
        if let Some(village_id) = row.optional("village_id") {
            if village_id != household_village.as_str() {
                return Err(row.error(
                    "village_id",
                    format!(
                        "is `{village_id}` but household `{household_id}` is in `{household_village}`"
                    ),
                ));
            }
        }

        let demographics = Demographics {
            age: row.parse_required("age")?,
            sex: row.parse_required::<Sex>("sex")?,
            occupation: row.optional("occupation").map(str::to_string),
        };
        let exposure = ExposureProfile {
            vaccinated: first_flag(&row, &VACCINATED)?,
            protective_equipment: row.flag("protective_equipment")?,
            distance_to_risk_site_m: row.parse_optional("distance_to_risk_site_m")?,
            attributes: row.attributes_where(|column| !is_individual_column(column)),
        };
        let authored = parse_authored(&row)?;
        if let Err((field, reason)) = authored.check_consistency() {
            return Err(row.error(field, reason));
        }

        individuals.push(Individual {
            id,
            household_id,
            village_id: household_village.clone(),
            demographics,
            exposure,
            authored,
            origin: Origin::Seed,
        });
    }
    Ok(individuals)
}

fn parse_authored(row: &SeedRow) -> Result<AuthoredClinical, OutbreakError> {
    let symptomatic = first_flag(row, &SYMPTOMATIC)?;

    let mut severity = match row.optional("clinical_severity") {
        Some(raw) if matches!(raw.to_ascii_lowercase().as_str(), "none" | "asymptomatic") => None,
        Some(_) => Some(row.parse_required::<Severity>("clinical_severity")?),
        None => match first_flag(row, &SEVERE)? {
            Some(true) => Some(Severity::Severe),
            // "not severe" only says something about a symptomatic case.
            Some(false) if symptomatic == Some(true) => Some(Severity::Mild),
            _ => None,
        },
    };
    if symptomatic == Some(false) && severity == Some(Severity::Mild) {
        severity = None;
    }

    let mut symptoms = SymptomSet::new();
    for (column, raw) in row.cells_matching(|column| Symptom::from_column(column).is_some()) {
        let Some(symptom) = Symptom::from_column(column) else {
            continue;
        };
        let Some(present) = parse_flag(raw) else {
            return Err(row.error(column, format!("is not a yes/no value: `{raw}`")));
        };
        symptoms.set(symptom, present);
    }

    Ok(AuthoredClinical {
        true_infection: first_flag(row, &TRUE_INFECTION)?,
        symptomatic,
        severity,
        onset_date: row.parse_optional::<NaiveDate>("onset_date")?,
        outcome: row.parse_optional::<Outcome>("outcome")?,
        has_sequelae: row.flag("has_sequelae")?,
        symptoms,
    })
}
