use std::collections::BTreeMap;

use log::debug;
use serde::Serialize;

use crate::case_definition::{CaseDefinition, Classification, Criterion, Tier, TierCriteria};
use crate::line_list::{LineList, LineListRow};
use crate::population::PersonId;

impl Criterion {
    pub fn holds(&self, row: &LineListRow, epi_link_fields: &[String]) -> bool {
        match self {
            Criterion::Symptom { symptom } => row.symptoms.has(*symptom),
            Criterion::AnySymptom { symptoms } => {
                symptoms.iter().any(|symptom| row.symptoms.has(*symptom))
            }
            Criterion::EpiLink => epi_link_fields
                .iter()
                .any(|field| row.exposure_flag(field) == Some(true)),
            Criterion::Exposure { attribute } => row.exposure_flag(attribute) == Some(true),
            Criterion::PositiveLab { tests } => row.has_positive_result(tests),
            Criterion::Severe => row.is_severe(),
            Criterion::AgeAtLeast { years } => row.age >= *years,
            Criterion::AgeBelow { years } => row.age < *years,
        }
    }
}

impl TierCriteria {
    /// All mandatory criteria and at least `min_optional` optional ones hold.
    pub fn is_met(&self, row: &LineListRow, epi_link_fields: &[String]) -> bool {
        self.mandatory
            .iter()
            .all(|criterion| criterion.holds(row, epi_link_fields))
            && self
                .optional
                .iter()
                .filter(|criterion| criterion.holds(row, epi_link_fields))
                .count()
                >= self.min_optional
    }
}

impl CaseDefinition {
    /// Whether the row falls inside the definition's onset window and village list. A bounded
    /// window needs an onset date.
    pub fn in_scope(&self, row: &LineListRow) -> bool {
        let in_place = self.villages.is_empty() || self.villages.contains(&row.village_id);
        let in_time = !self.time_window.is_bounded()
            || row
                .onset_date
                .is_some_and(|onset| self.time_window.contains(onset));
        in_place && in_time
    }

    /// The highest tier the row meets, checked from confirmed down.
    pub fn classify(&self, row: &LineListRow) -> Classification {
        if !self.in_scope(row) {
            return Classification::NotACase;
        }
        if row.has_positive_result(&self.exclusion_tests) {
            return Classification::Excluded;
        }
        [Tier::Confirmed, Tier::Probable, Tier::Suspected]
            .into_iter()
            .find(|tier| {
                self.tier(*tier)
                    .is_some_and(|criteria| criteria.is_met(row, &self.epi_link_fields))
            })
            .map_or(Classification::NotACase, Classification::from)
    }
}

/// Classifies every row of `line_list`.
pub fn classify(line_list: &LineList, definition: &CaseDefinition) -> Classifications {
    let classifications = Classifications(
        line_list
            .rows()
            .iter()
            .map(|row| (row.person_id.clone(), definition.classify(row)))
            .collect(),
    );
    debug!(
        "case definition `{}`: {} confirmed, {} probable, {} suspected, {} excluded",
        definition.name,
        classifications.count(Classification::Confirmed),
        classifications.count(Classification::Probable),
        classifications.count(Classification::Suspected),
        classifications.count(Classification::Excluded)
    );
    classifications
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Classifications(BTreeMap<PersonId, Classification>);

impl Classifications {
    pub fn get(&self, person_id: &PersonId) -> Option<Classification> {
        self.0.get(person_id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PersonId, Classification)> {
        self.0.iter().map(|(person_id, class)| (person_id, *class))
    }

    pub fn count(&self, classification: Classification) -> usize {
        self.0.values().filter(|class| **class == classification).count()
    }

    /// How many records were classified at `threshold` or above.
    pub fn count_meeting(&self, threshold: Tier) -> usize {
        self.0.values().filter(|class| class.meets(threshold)).count()
    }

    pub fn tally(&self) -> BTreeMap<Classification, usize> {
        let mut tally = BTreeMap::new();
        for class in self.0.values() {
            *tally.entry(*class).or_default() += 1;
        }
        tally
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// How well a definition finds the true infections, treating records classified at
/// `threshold` or above as cases.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseFindingSummary {
    pub threshold: Tier,
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub true_negatives: usize,
    /// `None` when there is nothing to divide by.
    pub sensitivity: Option<f64>,
    pub specificity: Option<f64>,
    pub positive_predictive_value: Option<f64>,
    pub false_positive_ids: Vec<PersonId>,
    pub false_negative_ids: Vec<PersonId>,
}

#[allow(clippy::cast_precision_loss)]
fn ratio(numerator: usize, denominator: usize) -> Option<f64> {
    (denominator > 0).then(|| numerator as f64 / denominator as f64)
}

impl CaseFindingSummary {
    pub fn evaluate(
        line_list: &LineList,
        classifications: &Classifications,
        threshold: Tier,
    ) -> Self {
        let mut summary = CaseFindingSummary {
            threshold,
            true_positives: 0,
            false_positives: 0,
            false_negatives: 0,
            true_negatives: 0,
            sensitivity: None,
            specificity: None,
            positive_predictive_value: None,
            false_positive_ids: Vec::new(),
            false_negative_ids: Vec::new(),
        };
        for row in line_list.rows() {
            let classified = classifications
                .get(&row.person_id)
                .is_some_and(|class| class.meets(threshold));
            match (classified, row.truth.true_infection) {
                (true, true) => summary.true_positives += 1,
                (true, false) => {
                    summary.false_positives += 1;
                    summary.false_positive_ids.push(row.person_id.clone());
                }
                (false, true) => {
                    summary.false_negatives += 1;
                    summary.false_negative_ids.push(row.person_id.clone());
                }
                (false, false) => summary.true_negatives += 1,
            }
        }
        summary.sensitivity = ratio(
            summary.true_positives,
            summary.true_positives + summary.false_negatives,
        );
        summary.specificity = ratio(
            summary.true_negatives,
            summary.true_negatives + summary.false_positives,
        );
        summary.positive_predictive_value = ratio(
            summary.true_positives,
            summary.true_positives + summary.false_positives,
        );
        summary
    }
}
