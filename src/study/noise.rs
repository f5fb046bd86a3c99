//! Data-quality noise for exported tables: blank cells where a field worker skipped a question,
//! and yes/no answers recorded the wrong way round. The person id and case status columns are
//! never touched so the table can still be joined and analysed.
// Cell counts are whole numbers of rows.
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use log::debug;
use rand::seq::index::sample;
use serde::{Deserialize, Serialize};

use crate::error::OutbreakError;
use crate::line_list::LineListTable;
use crate::random::{define_rng, RandomStreams};

define_rng!(DataNoiseRng);

/// Columns noise never touches.
pub const PROTECTED_COLUMNS: [&str; 2] = ["person_id", "case_status"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataNoise {
    /// Share of each column's cells left blank.
    pub missing_rate: f64,
    /// Share of each yes/no column's cells answered the wrong way.
    pub error_rate: f64,
}

impl Default for DataNoise {
    fn default() -> Self {
        DataNoise {
            missing_rate: 0.08,
            error_rate: 0.02,
        }
    }
}

impl DataNoise {
    /// # Errors
    ///
    /// Returns `OutbreakError::Configuration` unless both rates lie in `[0, 1]`.
    pub fn validate(&self) -> Result<(), OutbreakError> {
        for (name, rate) in [
            ("missing_rate", self.missing_rate),
            ("error_rate", self.error_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(OutbreakError::Configuration(format!(
                    "{name} must lie in [0, 1], got {rate}"
                )));
            }
        }
        Ok(())
    }
}

fn cells(rows: usize, rate: f64) -> usize {
    (rows as f64 * rate).floor() as usize
}

/// A column holds yes/no answers if every filled cell is `yes` or `no` and at least one is
/// filled.
fn is_yes_no(records: &[Vec<String>], column: usize) -> bool {
    let mut filled = records
        .iter()
        .map(|record| record[column].as_str())
        .filter(|cell| !cell.is_empty())
        .peekable();
    filled.peek().is_some() && filled.all(|cell| cell == "yes" || cell == "no")
}

/// A copy of `table` with noise applied column by column. Each unprotected column loses
/// `missing_rate` of its cells, picked uniformly; each yes/no column then has `error_rate` of
/// its cells flipped. Blank cells stay blank. The result depends only on `table`, `noise` and
/// `seed`.
///
/// # Errors
///
/// Returns `OutbreakError::Configuration` if `noise` is invalid.
pub fn inject_noise(
    table: &LineListTable,
    noise: &DataNoise,
    seed: u64,
) -> Result<LineListTable, OutbreakError> {
    noise.validate()?;
    let mut noisy = table.clone();
    let rows = noisy.len();
    let missing = cells(rows, noise.missing_rate);
    let errors = cells(rows, noise.error_rate);
    let columns: Vec<usize> = noisy
        .header()
        .iter()
        .enumerate()
        .filter(|(_, name)| !PROTECTED_COLUMNS.contains(&name.as_str()))
        .map(|(column, _)| column)
        .collect();

    let streams = RandomStreams::new(seed);
    let mut flipped = 0;
    streams.sample(DataNoiseRng, |rng| {
        let records = noisy.records_mut();
        for column in columns {
            let yes_no = is_yes_no(records, column);
            for row in sample(rng, rows, missing) {
                records[row][column].clear();
            }
            if yes_no {
                for row in sample(rng, rows, errors) {
                    let cell = &mut records[row][column];
                    let swapped = match cell.as_str() {
                        "yes" => "no",
                        "no" => "yes",
                        _ => continue,
                    };
                    *cell = swapped.to_string();
                    flipped += 1;
                }
            }
        }
    });
    debug!("blanked {missing} cells per column and flipped {flipped} yes/no answers");
    Ok(noisy)
}
