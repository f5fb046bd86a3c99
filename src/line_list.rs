//! The line list: one row per resident, joining demographics, the clinical record and the
//! session's lab history. This is what investigators see and what case definitions are
//! evaluated against.
use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::fs::{create_dir_all, File};
use std::io::Write;
use std::path::Path;

use chrono::NaiveDate;
use csv::Writer;
use log::info;
use serde::Serialize;

use crate::case_definition::Classifications;
use crate::clinical::{ClinicalRecords, Outcome, Severity};
use crate::error::OutbreakError;
use crate::lab::{LabLedger, TestResult};
use crate::population::{
    Attributes, ExposureProfile, HouseholdId, PersonId, PopulationSnapshot, Sex, VillageId,
};
use crate::symptom::{Symptom, SymptomSet};

/// What only the simulation knows; exported on request for debriefs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroundTruth {
    pub true_infection: bool,
    pub seed_case: bool,
    pub symptomatic: bool,
    pub exposure_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineListRow {
    pub person_id: PersonId,
    pub village_id: VillageId,
    pub household_id: HouseholdId,
    pub age: u8,
    pub sex: Sex,
    pub occupation: Option<String>,
    /// Only symptomatic cases have an observable onset.
    pub onset_date: Option<NaiveDate>,
    pub severity: Option<Severity>,
    pub symptoms: SymptomSet,
    pub outcome: Option<Outcome>,
    pub death_date: Option<NaiveDate>,
    pub reported_to_hospital: bool,
    pub days_to_hospital: Option<u32>,
    pub exposure: ExposureProfile,
    pub household_attributes: Attributes,
    pub lab_results: Vec<TestResult>,
    pub truth: GroundTruth,
}

impl LineListRow {
    /// An exposure flag of the individual, falling back to the household's attributes.
    pub fn exposure_flag(&self, name: &str) -> Option<bool> {
        self.exposure
            .flag(name)
            .or_else(|| self.household_attributes.flag(name))
    }

    /// Whether any result for one of `codes` came back positive.
    pub fn has_positive_result(&self, codes: &[String]) -> bool {
        self.lab_results.iter().any(|result| {
            result.is_positive()
                && codes
                    .iter()
                    .any(|code| code.eq_ignore_ascii_case(&result.test_code))
        })
    }

    pub fn is_severe(&self) -> bool {
        self.severity == Some(Severity::Severe)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LineList {
    rows: Vec<LineListRow>,
    symptom_columns: Vec<Symptom>,
}

impl LineList {
    /// Joins every resident of `population` with their clinical record and lab history.
    /// `symptoms` orders the symptom columns; any other symptom that appears on a record is
    /// appended after them.
    pub fn build(
        population: &PopulationSnapshot,
        clinical: &ClinicalRecords,
        ledger: &LabLedger,
        symptoms: &[Symptom],
    ) -> Self {
        let listed: BTreeSet<Symptom> = symptoms.iter().copied().collect();
        let extra: BTreeSet<Symptom> = clinical
            .iter()
            .filter_map(|record| record.symptoms())
            .flat_map(|set| set.iter().map(|(symptom, _)| symptom))
            .filter(|symptom| !listed.contains(symptom))
            .collect();
        let mut symptom_columns: Vec<Symptom> = Vec::with_capacity(listed.len() + extra.len());
        for symptom in symptoms.iter().copied().chain(extra) {
            if !symptom_columns.contains(&symptom) {
                symptom_columns.push(symptom);
            }
        }

        let rows = population
            .placements()
            .map(|placement| {
                let individual = placement.individual;
                let state = clinical.state_of(&individual.id);
                let record = state.record();
                let course = record.and_then(|record| record.course());
                LineListRow {
                    person_id: individual.id.clone(),
                    village_id: individual.village_id.clone(),
                    household_id: individual.household_id.clone(),
                    age: individual.demographics.age,
                    sex: individual.demographics.sex,
                    occupation: individual.demographics.occupation.clone(),
                    onset_date: course.and(record.map(|record| record.onset_date)),
                    severity: course.map(|course| course.severity),
                    symptoms: course
                        .map(|course| course.symptoms.clone())
                        .unwrap_or_default(),
                    outcome: course.map(|course| course.outcome),
                    death_date: course.and_then(|course| course.death_date),
                    reported_to_hospital: course
                        .is_some_and(|course| course.care.reported_to_hospital),
                    days_to_hospital: course.and_then(|course| course.care.days_to_hospital),
                    exposure: individual.exposure.clone(),
                    household_attributes: placement.household.attributes.clone(),
                    lab_results: ledger.history(&individual.id).to_vec(),
                    truth: GroundTruth {
                        true_infection: state.true_infection(),
                        seed_case: record.is_some_and(|record| record.seed_case),
                        symptomatic: state.is_symptomatic(),
                        exposure_date: record.map(|record| record.exposure_date),
                    },
                }
            })
            .collect();

        LineList {
            rows,
            symptom_columns,
        }
    }

    /// A line list over rows assembled elsewhere. Symptom columns follow the order the rows
    /// record them in.
    pub fn from_rows(rows: Vec<LineListRow>) -> Self {
        let mut symptom_columns: Vec<Symptom> = Vec::new();
        for row in &rows {
            for (symptom, _) in row.symptoms.iter() {
                if !symptom_columns.contains(&symptom) {
                    symptom_columns.push(symptom);
                }
            }
        }
        LineList {
            rows,
            symptom_columns,
        }
    }

    pub fn rows(&self) -> &[LineListRow] {
        &self.rows
    }

    pub fn get(&self, person_id: &PersonId) -> Option<&LineListRow> {
        self.rows.iter().find(|row| row.person_id == *person_id)
    }

    pub fn symptom_columns(&self) -> &[Symptom] {
        &self.symptom_columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn header(&self, classified: bool, include_truth: bool) -> Vec<String> {
        let mut header: Vec<String> = [
            "person_id",
            "village_id",
            "hh_id",
            "age",
            "sex",
            "occupation",
        ]
        .iter()
        .map(ToString::to_string)
        .collect();
        header.extend(self.symptom_columns.iter().map(|symptom| symptom.column_name()));
        header.extend(
            [
                "onset_date",
                "severity",
                "outcome",
                "death_date",
                "reported_to_hospital",
                "days_to_hospital",
                "lab_results",
            ]
            .iter()
            .map(ToString::to_string),
        );
        if classified {
            header.push("classification".to_string());
        }
        if include_truth {
            header.extend(
                ["true_infection", "seed_case", "symptomatic", "exposure_date"]
                    .iter()
                    .map(ToString::to_string),
            );
        }
        header
    }

    /// The rows of `person_ids` that are on the list, in that order, with this list's symptom
    /// columns.
    pub fn select(&self, person_ids: &[PersonId]) -> LineList {
        let rows = person_ids
            .iter()
            .filter_map(|person_id| self.get(person_id).cloned())
            .collect();
        LineList {
            rows,
            symptom_columns: self.symptom_columns.clone(),
        }
    }

    /// The line list as text cells in export order. A classification column is added when
    /// `classifications` is given, and the ground-truth columns when `include_truth` is set.
    pub fn to_table(
        &self,
        classifications: Option<&Classifications>,
        include_truth: bool,
    ) -> LineListTable {
        let records = self
            .rows
            .iter()
            .map(|row| {
                let mut record: Vec<String> = vec![
                    row.person_id.to_string(),
                    row.village_id.to_string(),
                    row.household_id.to_string(),
                    row.age.to_string(),
                    row.sex.to_string(),
                    row.occupation.clone().unwrap_or_default(),
                ];
                record.extend(
                    self.symptom_columns
                        .iter()
                        .map(|symptom| yes_no(row.symptoms.has(*symptom))),
                );
                record.extend([
                    optional(row.onset_date),
                    optional(row.severity),
                    optional(row.outcome),
                    optional(row.death_date),
                    yes_no(row.reported_to_hospital),
                    optional(row.days_to_hospital),
                    lab_summary(&row.lab_results),
                ]);
                if let Some(classifications) = classifications {
                    record.push(optional(classifications.get(&row.person_id)));
                }
                if include_truth {
                    record.extend([
                        yes_no(row.truth.true_infection),
                        yes_no(row.truth.seed_case),
                        yes_no(row.truth.symptomatic),
                        optional(row.truth.exposure_date),
                    ]);
                }
                record
            })
            .collect();
        LineListTable {
            header: self.header(classifications.is_some(), include_truth),
            records,
        }
    }

    /// Writes the line list as CSV; see [`LineList::to_table`] for the columns.
    ///
    /// # Errors
    ///
    /// Returns `OutbreakError::CSVError` or `OutbreakError::IoError` if writing fails.
    pub fn write_csv<W: Write>(
        &self,
        writer: W,
        classifications: Option<&Classifications>,
        include_truth: bool,
    ) -> Result<(), OutbreakError> {
        self.to_table(classifications, include_truth)
            .write_csv(writer)
    }

    /// Writes the line list to a `.csv` file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns `OutbreakError::ReportError` if `path` is not a CSV file, otherwise see
    /// [`LineList::write_csv`].
    pub fn export(
        &self,
        path: &Path,
        classifications: Option<&Classifications>,
        include_truth: bool,
    ) -> Result<(), OutbreakError> {
        self.to_table(classifications, include_truth).export(path)
    }
}

/// A line list rendered to text: what lands in the CSV, and what data-quality noise is applied
/// to. Empty cells are missing values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineListTable {
    header: Vec<String>,
    records: Vec<Vec<String>>,
}

impl LineListTable {
    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn records(&self) -> &[Vec<String>] {
        &self.records
    }

    pub(crate) fn records_mut(&mut self) -> &mut [Vec<String>] {
        &mut self.records
    }

    /// The index of the column named `name`.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|column| column == name)
    }

    /// Adds a column at `index`, taking one cell per record from `cells`.
    pub(crate) fn insert_column(
        &mut self,
        index: usize,
        name: &str,
        cells: impl IntoIterator<Item = String>,
    ) {
        self.header.insert(index, name.to_string());
        for (record, cell) in self.records.iter_mut().zip(cells) {
            record.insert(index, cell);
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// # Errors
    ///
    /// Returns `OutbreakError::CSVError` or `OutbreakError::IoError` if writing fails.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), OutbreakError> {
        let mut writer = Writer::from_writer(writer);
        writer.write_record(&self.header)?;
        for record in &self.records {
            writer.write_record(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Writes the table to a `.csv` file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns `OutbreakError::ReportError` if `path` is not a CSV file, otherwise see
    /// [`LineListTable::write_csv`].
    pub fn export(&self, path: &Path) -> Result<(), OutbreakError> {
        let file = create_csv_file(path)?;
        self.write_csv(file)?;
        info!("wrote {} line list rows to {}", self.len(), path.display());
        Ok(())
    }
}

/// Creates `path` and its parent directories. Only `.csv` paths are accepted.
pub(crate) fn create_csv_file(path: &Path) -> Result<File, OutbreakError> {
    match path.extension().and_then(OsStr::to_str) {
        Some("csv") => {
            if let Some(parent) = path.parent() {
                create_dir_all(parent)?;
            }
            Ok(File::create(path)?)
        }
        _ => Err(OutbreakError::ReportError(
            "Line list output files must be CSVs".to_string(),
        )),
    }
}

fn yes_no(flag: bool) -> String {
    let text = if flag { "yes" } else { "no" };
    text.to_string()
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|value| value.to_string()).unwrap_or_default()
}

/// `CODE@day:outcome` entries separated by `; `.
fn lab_summary(results: &[TestResult]) -> String {
    results
        .iter()
        .map(|result| {
            format!(
                "{}@{}:{}",
                result.test_code, result.day_since_onset, result.outcome
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}
