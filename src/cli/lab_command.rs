use anyhow::Result;

use super::main::ScenarioArgs;
use crate::population::PersonId;

pub fn lab(scenario: &ScenarioArgs, person: &str, test: &str, day: i32) -> Result<()> {
    let mut session = scenario.session()?;
    let result = session.order_test(&PersonId::new(person), test, day)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
