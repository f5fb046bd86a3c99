pub use crate::case_definition::{
    classify, CaseDefinition, CaseFindingSummary, Classification, Classifications, Criterion,
    Tier, TierCriteria,
};
pub use crate::clinical::{simulate_clinical_course, ClinicalRecord, ClinicalRecords, Severity};
pub use crate::config::ScenarioConfig;
pub use crate::error::{GenerationWarning, OutbreakError};
pub use crate::infection::{assign_infections, InfectionAssignment};
pub use crate::lab::{order_test, LabTestSpec, TestOutcome, TestResult};
pub use crate::line_list::LineList;
pub use crate::log::{debug, error, info, trace, warn};
pub use crate::population::{generate_population, PersonId, PopulationSnapshot, VillageId};
pub use crate::risk::{RiskModel, ScenarioRegistry};
pub use crate::seed::{load_scenario, load_seed_data, SeedData};
pub use crate::session::{Outbreak, OutbreakSession};
pub use crate::study::{generate_study_dataset, inject_noise, DataNoise, StudyDataset, StudyDesign};
pub use crate::symptom::Symptom;
pub use crate::{define_rng, RandomStreams};
