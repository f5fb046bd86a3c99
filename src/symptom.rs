//! The fixed set of clinical signs the engine tracks. Seed files carry them as
//! `symptoms_<name>` columns; a [`SymptomSet`] only exists on symptomatic clinical records.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

const COLUMN_PREFIX: &str = "symptoms_";

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Symptom {
    Fever,
    Headache,
    Myalgia,
    ConjunctivalSuffusion,
    Jaundice,
    RenalFailure,
    Vomiting,
    Seizure,
    #[serde(alias = "confusion")]
    #[strum(to_string = "altered_mental_status", serialize = "confusion")]
    AlteredMentalStatus,
    NeckStiffness,
    Paralysis,
}

impl Symptom {
    /// The seed/line-list column holding this flag, e.g. `symptoms_fever`.
    pub fn column_name(self) -> String {
        format!("{COLUMN_PREFIX}{self}")
    }

    /// Recognizes a `symptoms_<name>` column. Returns `None` for any other column, including a
    /// `symptoms_` column naming a sign the engine does not track.
    pub fn from_column(column: &str) -> Option<Symptom> {
        column
            .strip_prefix(COLUMN_PREFIX)
            .and_then(|name| name.parse().ok())
    }

    pub fn all() -> impl Iterator<Item = Symptom> {
        Symptom::iter()
    }
}

/// Presence flags for the symptoms a record has an opinion on. A symptom missing from the set
/// reads as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymptomSet(BTreeMap<Symptom, bool>);

impl SymptomSet {
    pub fn new() -> Self {
        SymptomSet::default()
    }

    pub fn set(&mut self, symptom: Symptom, present: bool) {
        self.0.insert(symptom, present);
    }

    pub fn has(&self, symptom: Symptom) -> bool {
        self.0.get(&symptom).copied().unwrap_or(false)
    }

    /// Whether the set records a value (present or absent) for `symptom`.
    pub fn is_recorded(&self, symptom: Symptom) -> bool {
        self.0.contains_key(&symptom)
    }

    pub fn present(&self) -> impl Iterator<Item = Symptom> + '_ {
        self.0
            .iter()
            .filter(|(_, present)| **present)
            .map(|(symptom, _)| *symptom)
    }

    pub fn any_present(&self) -> bool {
        self.0.values().any(|present| *present)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Symptom, bool)> + '_ {
        self.0.iter().map(|(symptom, present)| (*symptom, *present))
    }
}

impl FromIterator<(Symptom, bool)> for SymptomSet {
    fn from_iter<T: IntoIterator<Item = (Symptom, bool)>>(iter: T) -> Self {
        SymptomSet(iter.into_iter().collect())
    }
}
