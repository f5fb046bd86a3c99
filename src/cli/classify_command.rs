use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use super::main::ScenarioArgs;
use crate::case_definition::{CaseDefinition, CaseFindingSummary, Classification, Tier};
use crate::session::OutbreakSession;

#[derive(Serialize)]
struct ClassifyOutput<'a> {
    definition: &'a str,
    issues: Vec<String>,
    tally: BTreeMap<Classification, usize>,
    summary: CaseFindingSummary,
}

/// The case definition in `path`, or the scenario's own if no path is given.
pub(super) fn load_definition(
    session: &OutbreakSession,
    path: Option<&Path>,
) -> Result<CaseDefinition> {
    match path {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("could not open {}", path.display()))?;
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("{} is not a case definition", path.display()))
        }
        None => session
            .default_case_definition()
            .context("the scenario config has no case_definition; pass --definition"),
    }
}

pub fn classify(scenario: &ScenarioArgs, definition: Option<&Path>, threshold: Tier) -> Result<()> {
    let session = scenario.session()?;
    let definition = load_definition(&session, definition)?;

    let classifications = session.classify(&definition);
    let output = ClassifyOutput {
        definition: &definition.name,
        issues: session
            .definition_issues(&definition)
            .iter()
            .map(ToString::to_string)
            .collect(),
        tally: classifications.tally(),
        summary: session.case_finding(&definition, threshold),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
