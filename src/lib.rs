//! A synthetic outbreak generator for field-epidemiology training.
//!
//! The engine builds a population of villages, households and individuals from a small set of
//! authored seed records, decides who was exposed and infected using a disease-specific risk
//! model, simulates each infection's clinical course, and then answers the two questions an
//! investigator asks of the resulting line list: "what does this lab test say?" and "who meets
//! my case definition?".
//!
//! Every stage is a pure function of its inputs and an explicit random seed:
//! * [`population::generate_population`] expands the seed records into a
//!   [`PopulationSnapshot`].
//! * [`infection::assign_infections`] scores everyone with the scenario's [`risk::RiskModel`]
//!   and samples the infected set.
//! * [`clinical::simulate_clinical_course`] gives every infected person a complete
//!   [`clinical::ClinicalRecord`].
//! * [`lab::order_test`] and [`case_definition::classify`] evaluate the frozen outbreak on
//!   demand.
//!
//! [`session::OutbreakSession`] ties the stages together for a single scenario session and
//! keeps the lab ledger.
pub mod batch;
pub mod case_definition;
pub mod cli;
pub mod clinical;
pub mod config;
pub mod error;
pub mod hashing;
pub mod infection;
pub mod lab;
pub mod line_list;
pub mod log;
pub mod population;
pub mod prelude;
pub mod random;
pub mod risk;
pub mod seed;
pub mod session;
pub mod study;
pub mod symptom;

pub use config::ScenarioConfig;
pub use error::{GenerationWarning, OutbreakError};
pub use hashing::{HashMap, HashSet};
pub use population::{HouseholdId, PersonId, PopulationSnapshot, VillageId};
pub use random::{RandomStreams, RngId};
pub use session::{Outbreak, OutbreakSession};

// Re-exports for the `define_rng!` macro.
pub use paste;
pub use rand;

#[cfg(test)]
pub(crate) mod test_support;
