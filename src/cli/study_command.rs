use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use anyhow::{Context, Result};

use super::classify_command::load_definition;
use super::main::{ScenarioArgs, StudyArgs};
use crate::study::{inject_noise, DataNoise, StudyDataset, StudyDesign};

pub fn study(scenario: &ScenarioArgs, args: &StudyArgs) -> Result<()> {
    let session = scenario.session()?;
    let definition = load_definition(&session, args.definition.as_deref())?;
    let design: StudyDesign = {
        let path = &args.design;
        let file =
            File::open(path).with_context(|| format!("could not open {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("{} is not a study design", path.display()))?
    };

    let dataset = session.study_dataset(&definition, &design, scenario.seed)?;
    let mut table = dataset.to_table();
    if !args.clean {
        let noise = DataNoise {
            missing_rate: args.missing_rate,
            error_rate: args.error_rate,
        };
        table = inject_noise(&table, &noise, scenario.seed)?;
    }

    match args.output.as_deref() {
        Some(path) => table.export(path)?,
        None => table.write_csv(io::stdout().lock())?,
    }
    if let Some(path) = args.report.as_deref() {
        write_report(path, &dataset)?;
    }
    Ok(())
}

fn write_report(path: &Path, dataset: &StudyDataset) -> Result<()> {
    let file = File::create(path).with_context(|| format!("could not create {}", path.display()))?;
    serde_json::to_writer_pretty(file, dataset.report())?;
    Ok(())
}
