//! The Rivergate leptospirosis scenario under `tests/data`, shared by unit tests.
use std::path::PathBuf;

use crate::config::ScenarioConfig;
use crate::seed::{load_seed_data, SeedData, SCENARIO_CONFIG_FILE};
use crate::session::Outbreak;

pub(crate) fn scenario_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join("lepto_rivergate")
}

pub(crate) fn lepto_seed_data() -> SeedData {
    load_seed_data(&scenario_dir()).unwrap()
}

pub(crate) fn lepto_config() -> ScenarioConfig {
    ScenarioConfig::from_json_file(&scenario_dir().join(SCENARIO_CONFIG_FILE)).unwrap()
}

pub(crate) fn lepto_outbreak(seed: u64) -> Outbreak {
    Outbreak::generate(&lepto_seed_data(), &lepto_config(), seed).unwrap()
}
