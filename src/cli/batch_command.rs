use std::io;
use std::path::Path;

use anyhow::{Context, Result};

use crate::batch::run_batch;
use crate::seed::load_scenario;

pub fn batch(scenario_dir: &Path, runs: usize, seed: u64, output: Option<&Path>) -> Result<()> {
    let (config, seed_data) = load_scenario(scenario_dir)
        .with_context(|| format!("could not load the scenario in {}", scenario_dir.display()))?;
    let report = run_batch(&seed_data, &config, seed, runs)?;
    match output {
        Some(path) => report.write(path)?,
        None => serde_json::to_writer_pretty(io::stdout().lock(), &report)?,
    }
    Ok(())
}
