use std::io;
use std::path::Path;

use anyhow::{Context, Result};

use super::main::ScenarioArgs;

pub fn generate(
    scenario: &ScenarioArgs,
    output: Option<&Path>,
    include_truth: bool,
    classify: bool,
) -> Result<()> {
    let session = scenario.session()?;
    for warning in session.outbreak().warnings() {
        eprintln!("warning: {warning}");
    }

    let line_list = session.line_list();
    let classifications = if classify {
        let definition = session
            .default_case_definition()
            .context("the scenario config has no case_definition to classify with")?;
        Some(session.classify(&definition))
    } else {
        None
    };

    match output {
        Some(path) => line_list.export(path, classifications.as_ref(), include_truth)?,
        None => line_list.write_csv(io::stdout().lock(), classifications.as_ref(), include_truth)?,
    }
    Ok(())
}
