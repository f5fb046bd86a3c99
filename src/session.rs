//! One generated outbreak and the investigation run against it.
//!
//! An [`Outbreak`] is the frozen result of the three generation stages. An [`OutbreakSession`]
//! owns one outbreak together with the lab ledger, which is the only state that changes while
//! a scenario is being played.
use std::path::Path;

use log::info;

use crate::case_definition::{
    classify, CaseDefinition, CaseFindingSummary, Classifications, DefinitionIssue, Tier,
};
use crate::clinical::{simulate_clinical_course, ClinicalRecords, InfectionState};
use crate::config::ScenarioConfig;
use crate::error::{GenerationWarning, OutbreakError};
use crate::infection::{assign_infections_with_registry, InfectionAssignment};
use crate::lab::{LabLedger, TestResult};
use crate::line_list::LineList;
use crate::population::{generate_population_with_registry, PersonId, PopulationSnapshot};
use crate::risk::{explain, RiskBreakdown, ScenarioRegistry};
use crate::seed::{load_scenario, SeedData};
use crate::study::{generate_study_dataset, StudyDataset, StudyDesign};
use crate::symptom::Symptom;

/// A generated population with its infections and clinical records.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbreak {
    pub population: PopulationSnapshot,
    pub assignment: InfectionAssignment,
    pub clinical: ClinicalRecords,
}

impl Outbreak {
    /// Runs generation, infection assignment and clinical simulation with the built-in risk
    /// models.
    ///
    /// # Errors
    ///
    /// Returns `OutbreakError::Configuration` if `config` is invalid. Otherwise propagates the
    /// first error of any stage; nothing is returned unless every stage completed.
    pub fn generate(
        seed_data: &SeedData,
        config: &ScenarioConfig,
        seed: u64,
    ) -> Result<Self, OutbreakError> {
        Outbreak::generate_with_registry(&ScenarioRegistry::default(), seed_data, config, seed)
    }

    /// # Errors
    ///
    /// See [`Outbreak::generate`].
    pub fn generate_with_registry(
        registry: &ScenarioRegistry,
        seed_data: &SeedData,
        config: &ScenarioConfig,
        seed: u64,
    ) -> Result<Self, OutbreakError> {
        config.validate()?;
        let population = generate_population_with_registry(registry, seed_data, config, seed)?;
        let assignment = assign_infections_with_registry(registry, &population, config)?;
        let clinical = simulate_clinical_course(&population, &assignment, config)?;
        info!(
            "generated outbreak `{}` with seed {seed}: {} residents, {} infected, {} symptomatic",
            population.scenario_id(),
            population.len(),
            assignment.len(),
            clinical.symptomatic_count()
        );
        Ok(Outbreak {
            population,
            assignment,
            clinical,
        })
    }

    /// Warnings from every stage, in the order they were raised.
    pub fn warnings(&self) -> Vec<GenerationWarning> {
        self.population
            .warnings()
            .iter()
            .chain(self.assignment.warnings())
            .cloned()
            .collect()
    }

    pub fn state_of(&self, person_id: &PersonId) -> InfectionState<'_> {
        self.clinical.state_of(person_id)
    }

    /// The line list with the lab history in `ledger`. Symptom columns follow `symptoms`.
    pub fn line_list(&self, ledger: &LabLedger, symptoms: &[Symptom]) -> LineList {
        LineList::build(&self.population, &self.clinical, ledger, symptoms)
    }
}

/// A scenario being investigated: the frozen outbreak and every lab result handed out so far.
pub struct OutbreakSession {
    config: ScenarioConfig,
    registry: ScenarioRegistry,
    outbreak: Outbreak,
    ledger: LabLedger,
}

impl OutbreakSession {
    /// Generates the outbreak for `config` from `seed_data`.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or any generation stage fails.
    pub fn new(
        seed_data: &SeedData,
        config: ScenarioConfig,
        seed: u64,
    ) -> Result<Self, OutbreakError> {
        OutbreakSession::with_registry(ScenarioRegistry::default(), seed_data, config, seed)
    }

    /// # Errors
    ///
    /// See [`OutbreakSession::new`].
    pub fn with_registry(
        registry: ScenarioRegistry,
        seed_data: &SeedData,
        config: ScenarioConfig,
        seed: u64,
    ) -> Result<Self, OutbreakError> {
        let outbreak = Outbreak::generate_with_registry(&registry, seed_data, &config, seed)?;
        Ok(OutbreakSession {
            config,
            registry,
            outbreak,
            ledger: LabLedger::new(),
        })
    }

    /// Loads `scenario_config.json` and the seed tables from `dir` and generates the outbreak.
    ///
    /// # Errors
    ///
    /// Fails if the scenario cannot be loaded or generated.
    pub fn from_scenario_dir(dir: &Path, seed: u64) -> Result<Self, OutbreakError> {
        let (config, seed_data) = load_scenario(dir)?;
        OutbreakSession::new(&seed_data, config, seed)
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub fn outbreak(&self) -> &Outbreak {
        &self.outbreak
    }

    pub fn seed(&self) -> u64 {
        self.outbreak.population.seed()
    }

    /// Orders `test` (a code or alias) for `person_id`, `day_since_onset` days after onset. The
    /// result is recorded in the session's lab history.
    ///
    /// # Errors
    ///
    /// Returns `OutbreakError::UnknownPerson` or `OutbreakError::UnknownTest`.
    pub fn order_test(
        &mut self,
        person_id: &PersonId,
        test: &str,
        day_since_onset: i32,
    ) -> Result<TestResult, OutbreakError> {
        if self.outbreak.population.individual(person_id).is_none() {
            return Err(OutbreakError::UnknownPerson(person_id.to_string()));
        }
        let spec = self.config.lab.resolve(test)?;
        let infected = self.outbreak.assignment.is_infected(person_id);
        let seed = self.outbreak.population.seed();
        Ok(self.ledger.order(
            spec,
            person_id,
            infected,
            day_since_onset,
            seed,
            self.config.lab.repeat_orders,
        ))
    }

    pub fn lab_history(&self, person_id: &PersonId) -> &[TestResult] {
        self.ledger.history(person_id)
    }

    pub fn ledger(&self) -> &LabLedger {
        &self.ledger
    }

    /// The current line list, with symptom columns in the order of the clinical symptom table.
    pub fn line_list(&self) -> LineList {
        let symptoms: Vec<Symptom> = self
            .config
            .clinical
            .symptoms
            .iter()
            .map(|entry| entry.symptom)
            .collect();
        self.outbreak.line_list(&self.ledger, &symptoms)
    }

    /// `definition` as this scenario evaluates it: the scenario's epi-link fields fill in for
    /// missing ones, and test aliases become test codes.
    fn prepare(&self, definition: CaseDefinition) -> CaseDefinition {
        definition
            .with_default_epi_link_fields(&self.config.epi_link_fields)
            .with_canonical_test_codes(&self.config.lab)
    }

    /// The scenario's case definition template, if it has one, prepared for this scenario.
    pub fn default_case_definition(&self) -> Option<CaseDefinition> {
        self.config
            .case_definition
            .clone()
            .map(|definition| self.prepare(definition))
    }

    /// Everything [`CaseDefinition::validate`] reports, plus lab tests this scenario does not
    /// offer.
    pub fn definition_issues(&self, definition: &CaseDefinition) -> Vec<DefinitionIssue> {
        let definition = self.prepare(definition.clone());
        let mut issues = definition.validate();
        issues.extend(definition.unknown_tests(&self.config.lab));
        issues
    }

    pub fn classify(&self, definition: &CaseDefinition) -> Classifications {
        classify(&self.line_list(), &self.prepare(definition.clone()))
    }

    pub fn case_finding(&self, definition: &CaseDefinition, threshold: Tier) -> CaseFindingSummary {
        let line_list = self.line_list();
        let classifications = classify(&line_list, &self.prepare(definition.clone()));
        CaseFindingSummary::evaluate(&line_list, &classifications, threshold)
    }

    /// Samples a study from the current line list; `definition` decides who is a case.
    ///
    /// # Errors
    ///
    /// See [`generate_study_dataset`].
    pub fn study_dataset(
        &self,
        definition: &CaseDefinition,
        design: &StudyDesign,
        seed: u64,
    ) -> Result<StudyDataset, OutbreakError> {
        let line_list = self.line_list();
        let classifications = classify(&line_list, &self.prepare(definition.clone()));
        generate_study_dataset(&line_list, &classifications, design, seed)
    }

    /// Why `person_id` was (or was not) likely to be infected.
    ///
    /// # Errors
    ///
    /// Returns `OutbreakError::UnknownPerson` if `person_id` is not in the population.
    pub fn explain_risk(&self, person_id: &PersonId) -> Result<RiskBreakdown, OutbreakError> {
        let (model, _) = self
            .registry
            .resolve(self.outbreak.population.scenario_type())?;
        explain(&self.outbreak.population, model, &self.config, person_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case_definition::{Classification, Criterion, TierCriteria};
    use crate::lab::TestOutcome;
    use crate::test_support::{lepto_config, lepto_seed_data, scenario_dir};

    fn session(seed: u64) -> OutbreakSession {
        OutbreakSession::new(&lepto_seed_data(), lepto_config(), seed).unwrap()
    }

    #[test]
    fn loads_from_a_scenario_directory() {
        let loaded = OutbreakSession::from_scenario_dir(&scenario_dir(), 11).unwrap();
        assert_eq!(loaded.outbreak(), session(11).outbreak());
        assert_eq!(loaded.seed(), 11);
    }

    #[test]
    fn invalid_configs_are_rejected_before_generation() {
        let mut config = lepto_config();
        config.clinical.symptomatic_rate = 1.5;
        assert!(matches!(
            Outbreak::generate(&lepto_seed_data(), &config, 1),
            Err(OutbreakError::Configuration(_))
        ));
        assert!(matches!(
            OutbreakSession::new(&lepto_seed_data(), config, 1),
            Err(OutbreakError::Configuration(_))
        ));
    }

    #[test]
    fn unknown_people_and_tests_are_errors() {
        let mut session = session(3);
        assert!(matches!(
            session.order_test(&"P9999".into(), "LEPTO_MAT", 10),
            Err(OutbreakError::UnknownPerson(_))
        ));
        let person = session.outbreak().population.individuals()[0].id.clone();
        assert!(matches!(
            session.order_test(&person, "CULTURE", 10),
            Err(OutbreakError::UnknownTest(_))
        ));
        assert!(session.lab_history(&person).is_empty());
    }

    #[test]
    fn orders_are_recorded_and_joined_into_the_line_list() {
        let mut session = session(3);
        let person = session
            .outbreak()
            .assignment
            .infected()
            .iter()
            .next()
            .unwrap()
            .clone();
        let result = session.order_test(&person, "mat", 10).unwrap();
        assert_eq!(result.test_code, "LEPTO_MAT");
        assert_eq!(session.order_test(&person, "MAT", 10).unwrap(), result);
        assert_eq!(session.lab_history(&person), [result.clone()]);

        let early = session.order_test(&person, "LEPTO_MAT", -2).unwrap();
        assert_eq!(early.outcome, TestOutcome::NotYetMeaningful);

        let line_list = session.line_list();
        assert_eq!(line_list.get(&person).unwrap().lab_results.len(), 2);
    }

    #[test]
    fn the_default_definition_classifies_everyone() {
        let session = session(8);
        let definition = session.default_case_definition().unwrap();
        assert!(!definition.epi_link_fields.is_empty());
        let classifications = session.classify(&definition);
        assert_eq!(classifications.len(), session.outbreak().population.len());

        let summary = session.case_finding(&definition, Tier::Suspected);
        assert_eq!(
            summary.true_positives + summary.false_negatives,
            session.outbreak().assignment.len()
        );
    }

    /// Orders `test` for `person` on successive days until one comes back positive.
    fn order_until_positive(session: &mut OutbreakSession, person: &PersonId, test: &str) {
        let positive =
            (0..500).any(|day| session.order_test(person, test, day).unwrap().is_positive());
        assert!(positive, "no positive {test} for {person}");
    }

    #[test]
    fn definitions_may_name_tests_by_alias() {
        let mut session = session(4);
        let index_case: PersonId = "P0001".into();
        order_until_positive(&mut session, &index_case, "MAT");

        let mut definition = session.default_case_definition().unwrap();
        definition.exclusion_tests.clear();
        definition.confirmed = Some(TierCriteria {
            mandatory: vec![
                Criterion::Symptom {
                    symptom: Symptom::Fever,
                },
                Criterion::PositiveLab {
                    tests: vec!["mat".to_string()],
                },
            ],
            ..TierCriteria::default()
        });
        assert!(session.definition_issues(&definition).is_empty());
        assert_eq!(
            session.classify(&definition).get(&index_case),
            Some(Classification::Confirmed)
        );

        definition.exclusion_tests = vec!["RDT".to_string()];
        order_until_positive(&mut session, &index_case, "RDT");
        assert_eq!(
            session.classify(&definition).get(&index_case),
            Some(Classification::Excluded)
        );
    }

    #[test]
    fn unknown_tests_in_a_definition_are_reported() {
        let session = session(4);
        let mut definition = session.default_case_definition().unwrap();
        definition.exclusion_tests = vec!["DENGUE_NS1".to_string()];
        assert!(session
            .definition_issues(&definition)
            .contains(&DefinitionIssue::UnknownTest {
                code: "DENGUE_NS1".to_string()
            }));
    }

    #[test]
    fn study_samples_depend_on_the_study_seed_only() {
        let mut session = session(4);
        let definition = session.default_case_definition().unwrap();
        let design = StudyDesign::SimpleRandom { size: 30 };
        let first = session.study_dataset(&definition, &design, 9).unwrap();
        assert_eq!(first.len(), 30);
        assert_eq!(first, session.study_dataset(&definition, &design, 9).unwrap());
        assert_ne!(
            first.participants(),
            session.study_dataset(&definition, &design, 10).unwrap().participants()
        );

        // Lab orders change the rows a study sees, not who is sampled.
        let cohort = StudyDesign::Cohort {
            villages: vec!["V1".into()],
            max_age: None,
        };
        let before = session.study_dataset(&definition, &cohort, 9).unwrap();
        let index_case: PersonId = "P0001".into();
        order_until_positive(&mut session, &index_case, "MAT");
        let after = session.study_dataset(&definition, &cohort, 9).unwrap();
        assert_eq!(before.participants(), after.participants());
        let row = after.line_list().get(&index_case).unwrap();
        assert!(row.has_positive_result(&["LEPTO_MAT".to_string()]));
    }

    #[test]
    fn risk_explanations_cover_control_villages() {
        let session = session(2);
        let population = &session.outbreak().population;
        let control = population
            .individuals_in_village(&"V4".into())
            .next()
            .unwrap()
            .id
            .clone();
        let breakdown = session.explain_risk(&control).unwrap();
        assert!(!breakdown.eligible);
        assert_eq!(breakdown.score, None);

        let epicenter = population
            .individuals_in_village(&"V1".into())
            .next()
            .unwrap()
            .id
            .clone();
        let breakdown = session.explain_risk(&epicenter).unwrap();
        assert!(breakdown.eligible);
        assert!(breakdown
            .factors
            .iter()
            .any(|factor| factor.name == crate::risk::EPICENTER_FACTOR));
    }
}
