//! Runs one scenario over a range of seeds and checks every generated outbreak for data-quality
//! problems. The report gives average case counts and how often each problem occurred.
// Loss of precision is allowable when averaging case counts.
#![allow(clippy::cast_precision_loss)]

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs::{create_dir_all, File};
use std::path::Path;

use csv::Writer;
use log::{debug, info, warn};
use serde::Serialize;
use strum::IntoStaticStr;

use crate::clinical::{InfectionState, Outcome};
use crate::config::ScenarioConfig;
use crate::error::{GenerationWarning, OutbreakError};
use crate::line_list::create_csv_file;
use crate::population::{PopulationSnapshot, VillageId};
use crate::risk::{score_population, ScenarioRegistry};
use crate::seed::SeedData;
use crate::session::Outbreak;
use crate::HashSet;

/// Something wrong with a generated outbreak.
#[derive(Debug, Clone, PartialEq, Serialize, IntoStaticStr)]
#[serde(tag = "issue", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DataQualityIssue {
    VillageWithoutHouseholds { village_id: VillageId },
    VillageWithoutResidents { village_id: VillageId },
    NoSymptomaticCases,
    /// More than one case away from the (clamped) target.
    CaseCountOffTarget { infected: usize, target: usize },
    /// Symptomatic cases in a village where nobody was eligible for exposure.
    CasesInIneligibleVillage { village_id: VillageId, cases: usize },
}

impl DataQualityIssue {
    pub fn kind(&self) -> &'static str {
        self.into()
    }
}

/// Checks an outbreak generated for `config`.
pub fn check_outbreak(
    outbreak: &Outbreak,
    config: &ScenarioConfig,
    registry: &ScenarioRegistry,
) -> Vec<DataQualityIssue> {
    let population = &outbreak.population;
    let mut issues = Vec::new();

    let with_households: HashSet<&VillageId> = population
        .households()
        .iter()
        .map(|household| &household.village_id)
        .collect();
    let with_residents: HashSet<&VillageId> = population
        .individuals()
        .iter()
        .map(|individual| &individual.village_id)
        .collect();
    for village in population.villages() {
        if !with_households.contains(&village.id) {
            issues.push(DataQualityIssue::VillageWithoutHouseholds {
                village_id: village.id.clone(),
            });
        }
        if !with_residents.contains(&village.id) {
            issues.push(DataQualityIssue::VillageWithoutResidents {
                village_id: village.id.clone(),
            });
        }
    }

    if outbreak.clinical.symptomatic_count() == 0 {
        issues.push(DataQualityIssue::NoSymptomaticCases);
    }

    let assignment = &outbreak.assignment;
    let target = config
        .target_cases
        .min(assignment.eligible())
        .max(assignment.seed_cases());
    if assignment.len().abs_diff(target) > 1 {
        issues.push(DataQualityIssue::CaseCountOffTarget {
            infected: assignment.len(),
            target,
        });
    }

    for (village_id, cases) in symptomatic_in_ineligible_villages(outbreak, config, registry) {
        issues.push(DataQualityIssue::CasesInIneligibleVillage { village_id, cases });
    }
    issues
}

fn symptomatic_in_ineligible_villages(
    outbreak: &Outbreak,
    config: &ScenarioConfig,
    registry: &ScenarioRegistry,
) -> BTreeMap<VillageId, usize> {
    let population = &outbreak.population;
    let Some(model) = registry.get(population.scenario_type()) else {
        return BTreeMap::new();
    };
    let scores = score_population(population, model, config);
    let mut eligible_villages: HashSet<&VillageId> = HashSet::default();
    for (position, score) in scores.iter().enumerate() {
        if score.is_some() {
            eligible_villages.insert(&population.individuals()[position].village_id);
        }
    }
    let mut cases = BTreeMap::new();
    for individual in population.individuals() {
        if !eligible_villages.contains(&individual.village_id)
            && outbreak.state_of(&individual.id).is_symptomatic()
        {
            *cases.entry(individual.village_id.clone()).or_default() += 1;
        }
    }
    cases
}

/// What one seed produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub seed: u64,
    pub residents: usize,
    pub infected: usize,
    pub symptomatic: usize,
    pub severe: usize,
    pub deaths: usize,
    pub symptomatic_by_village: BTreeMap<VillageId, usize>,
    pub attack_rates: BTreeMap<VillageId, f64>,
    pub warnings: Vec<GenerationWarning>,
    pub issues: Vec<DataQualityIssue>,
}

impl RunSummary {
    fn new(seed: u64, outbreak: &Outbreak, issues: Vec<DataQualityIssue>) -> Self {
        let population: &PopulationSnapshot = &outbreak.population;
        let mut symptomatic_by_village: BTreeMap<VillageId, usize> = population
            .villages()
            .iter()
            .map(|village| (village.id.clone(), 0))
            .collect();
        let (mut symptomatic, mut severe, mut deaths) = (0, 0, 0);
        for individual in population.individuals() {
            let InfectionState::Infected(record) = outbreak.state_of(&individual.id) else {
                continue;
            };
            if record.is_symptomatic() {
                symptomatic += 1;
                *symptomatic_by_village
                    .entry(individual.village_id.clone())
                    .or_default() += 1;
            }
            if record.is_severe() {
                severe += 1;
            }
            if record.outcome() == Some(Outcome::Died) {
                deaths += 1;
            }
        }
        RunSummary {
            seed,
            residents: population.len(),
            infected: outbreak.assignment.len(),
            symptomatic,
            severe,
            deaths,
            symptomatic_by_village,
            attack_rates: outbreak
                .assignment
                .attack_rates(population)
                .into_iter()
                .map(|(village_id, rate)| (village_id, rate.rate()))
                .collect(),
            warnings: outbreak.warnings(),
            issues,
        }
    }
}

/// One CSV row per run.
#[derive(Serialize)]
struct RunRow {
    seed: u64,
    residents: usize,
    infected: usize,
    symptomatic: usize,
    severe: usize,
    deaths: usize,
    warnings: usize,
    issues: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub scenario_id: String,
    pub runs: usize,
    pub first_seed: u64,
    /// How many runs raised each kind of issue.
    pub issues: BTreeMap<&'static str, usize>,
    pub average_infected: f64,
    pub average_symptomatic: f64,
    pub average_severe: f64,
    pub average_deaths: f64,
    pub summaries: Vec<RunSummary>,
}

impl BatchReport {
    fn average(&self, count: impl Fn(&RunSummary) -> usize) -> f64 {
        let total: usize = self.summaries.iter().map(count).sum();
        total as f64 / self.summaries.len().max(1) as f64
    }

    /// Writes the report as pretty JSON (`.json`) or one CSV row per run (`.csv`).
    ///
    /// # Errors
    ///
    /// Returns `OutbreakError::ReportError` for any other extension, or the underlying I/O,
    /// JSON or CSV error.
    pub fn write(&self, path: &Path) -> Result<(), OutbreakError> {
        match path.extension().and_then(OsStr::to_str) {
            Some("json") => {
                if let Some(parent) = path.parent() {
                    create_dir_all(parent)?;
                }
                serde_json::to_writer_pretty(File::create(path)?, self)?;
            }
            Some("csv") => {
                let mut writer = Writer::from_writer(create_csv_file(path)?);
                for summary in &self.summaries {
                    writer.serialize(RunRow {
                        seed: summary.seed,
                        residents: summary.residents,
                        infected: summary.infected,
                        symptomatic: summary.symptomatic,
                        severe: summary.severe,
                        deaths: summary.deaths,
                        warnings: summary.warnings.len(),
                        issues: summary
                            .issues
                            .iter()
                            .map(DataQualityIssue::kind)
                            .collect::<Vec<_>>()
                            .join(";"),
                    })?;
                }
                writer.flush()?;
            }
            _ => {
                return Err(OutbreakError::ReportError(
                    "Batch reports must be written as .json or .csv".to_string(),
                ))
            }
        }
        info!("wrote batch report to {}", path.display());
        Ok(())
    }
}

/// Generates the scenario for seeds `first_seed..first_seed + runs`.
///
/// # Errors
///
/// Returns the first generation error; a failing seed stops the batch.
pub fn run_batch(
    seed_data: &SeedData,
    config: &ScenarioConfig,
    first_seed: u64,
    runs: usize,
) -> Result<BatchReport, OutbreakError> {
    let registry = ScenarioRegistry::default();
    let mut summaries = Vec::with_capacity(runs);
    let mut issue_counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for seed in (first_seed..).take(runs) {
        let outbreak = Outbreak::generate_with_registry(&registry, seed_data, config, seed)?;
        let issues = check_outbreak(&outbreak, config, &registry);
        for issue in &issues {
            warn!("seed {seed}: {issue:?}");
            *issue_counts.entry(issue.kind()).or_default() += 1;
        }
        let summary = RunSummary::new(seed, &outbreak, issues);
        debug!(
            "seed {seed}: {} infected, {} symptomatic, {} severe",
            summary.infected, summary.symptomatic, summary.severe
        );
        summaries.push(summary);
    }

    let mut report = BatchReport {
        scenario_id: config.scenario_id.clone(),
        runs,
        first_seed,
        issues: issue_counts,
        average_infected: 0.0,
        average_symptomatic: 0.0,
        average_severe: 0.0,
        average_deaths: 0.0,
        summaries,
    };
    report.average_infected = report.average(|summary| summary.infected);
    report.average_symptomatic = report.average(|summary| summary.symptomatic);
    report.average_severe = report.average(|summary| summary.severe);
    report.average_deaths = report.average(|summary| summary.deaths);
    info!(
        "batch of {runs} runs: {:.1} symptomatic and {:.1} severe on average, {} issue kinds",
        report.average_symptomatic,
        report.average_severe,
        report.issues.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::population::{Attributes, Village};
    use crate::test_support::{lepto_config, lepto_seed_data};

    #[test]
    fn the_reference_scenario_is_clean() {
        let report = run_batch(&lepto_seed_data(), &lepto_config(), 42, 5).unwrap();
        assert_eq!(report.runs, 5);
        assert_eq!(
            report.summaries.iter().map(|summary| summary.seed).collect::<Vec<_>>(),
            [42, 43, 44, 45, 46]
        );
        assert!(report.issues.is_empty(), "{:?}", report.issues);
        assert_eq!(report.average_infected, 34.0);
        for summary in &report.summaries {
            assert_eq!(summary.symptomatic_by_village[&VillageId::from("V4")], 0);
            assert!(summary.severe <= summary.symptomatic);
        }
    }

    #[test]
    fn a_missing_village_is_reported() {
        let config = lepto_config();
        let mut seed_data = lepto_seed_data();
        seed_data.villages.push(Village {
            id: "V5".into(),
            name: "Bagong Silang".to_string(),
            population: 0,
            household_target: None,
            attributes: Attributes::new(),
        });
        let outbreak = Outbreak::generate(&seed_data, &config, 1).unwrap();
        let issues = check_outbreak(&outbreak, &config, &ScenarioRegistry::default());
        assert!(!issues.contains(&DataQualityIssue::NoSymptomaticCases));
        assert!(issues.contains(&DataQualityIssue::VillageWithoutHouseholds {
            village_id: "V5".into()
        }));
        assert!(issues.contains(&DataQualityIssue::VillageWithoutResidents {
            village_id: "V5".into()
        }));
    }

    #[test]
    fn reports_are_written_as_json_or_csv() {
        let report = run_batch(&lepto_seed_data(), &lepto_config(), 7, 2).unwrap();
        let temp_dir = tempdir().unwrap();

        let json_path = temp_dir.path().join("batch.json");
        report.write(&json_path).unwrap();
        let json: serde_json::Value =
            serde_json::from_reader(File::open(&json_path).unwrap()).unwrap();
        assert_eq!(json["runs"], 2);
        assert_eq!(json["summaries"].as_array().unwrap().len(), 2);

        let csv_path = temp_dir.path().join("runs").join("batch.csv");
        report.write(&csv_path).unwrap();
        let mut reader = csv::Reader::from_path(&csv_path).unwrap();
        assert_eq!(&reader.headers().unwrap()[0], "seed");
        assert_eq!(reader.records().count(), 2);

        assert!(matches!(
            report.write(&temp_dir.path().join("batch.txt")),
            Err(OutbreakError::ReportError(_))
        ));
    }
}
