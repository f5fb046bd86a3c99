//! Case definitions and classification.
//!
//! A [`CaseDefinition`] has up to three tiers (suspected, probable, confirmed), each a list of
//! mandatory criteria plus optional criteria of which at least `min_optional` must hold. All
//! tiers share the definition's onset window and village list, and a positive result on one of
//! its exclusion tests excludes a record outright. Classification reads only the line list, so
//! it can be re-run against any definition an investigator writes.
mod evaluation;

use std::collections::BTreeSet;
use std::fmt::{self, Display};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{Display as StrumDisplay, EnumString};

pub use evaluation::{classify, CaseFindingSummary, Classifications};

use crate::lab::LabConfig;
use crate::population::VillageId;
use crate::symptom::Symptom;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Criterion {
    Symptom { symptom: Symptom },
    AnySymptom { symptoms: Vec<Symptom> },
    /// Any of the definition's epi-link exposure attributes is true.
    EpiLink,
    Exposure { attribute: String },
    /// A positive result on any of `tests`.
    PositiveLab { tests: Vec<String> },
    Severe,
    AgeAtLeast { years: u8 },
    AgeBelow { years: u8 },
}

impl Criterion {
    /// Whether the criterion describes illness rather than exposure, age or lab evidence.
    pub fn is_clinical(&self) -> bool {
        matches!(
            self,
            Criterion::Symptom { .. } | Criterion::AnySymptom { .. } | Criterion::Severe
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierCriteria {
    pub mandatory: Vec<Criterion>,
    pub optional: Vec<Criterion>,
    pub min_optional: usize,
}

impl TierCriteria {
    fn criteria(&self) -> impl Iterator<Item = &Criterion> {
        self.mandatory.iter().chain(&self.optional)
    }
}

/// Onset dates a case must fall within. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl TimeWindow {
    pub fn is_bounded(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.is_none_or(|start| start <= date) && self.end.is_none_or(|end| date <= end)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, StrumDisplay,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Tier {
    Suspected,
    Probable,
    Confirmed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseDefinition {
    pub name: String,
    #[serde(default)]
    pub time_window: TimeWindow,
    /// Villages a case must live in; empty means anywhere.
    #[serde(default)]
    pub villages: Vec<VillageId>,
    /// Rule-out tests whose positive result excludes a record.
    #[serde(default)]
    pub exclusion_tests: Vec<String>,
    /// Attributes the `epi_link` criterion looks at.
    #[serde(default)]
    pub epi_link_fields: Vec<String>,
    #[serde(default)]
    pub suspected: Option<TierCriteria>,
    #[serde(default)]
    pub probable: Option<TierCriteria>,
    #[serde(default)]
    pub confirmed: Option<TierCriteria>,
}

impl CaseDefinition {
    pub fn tier(&self, tier: Tier) -> Option<&TierCriteria> {
        match tier {
            Tier::Suspected => self.suspected.as_ref(),
            Tier::Probable => self.probable.as_ref(),
            Tier::Confirmed => self.confirmed.as_ref(),
        }
    }

    fn tiers(&self) -> impl Iterator<Item = (Tier, &TierCriteria)> {
        [Tier::Suspected, Tier::Probable, Tier::Confirmed]
            .into_iter()
            .filter_map(|tier| self.tier(tier).map(|criteria| (tier, criteria)))
    }

    /// Returns the definition with `fields` as its epi-link attributes if it has none of its own.
    #[must_use]
    pub fn with_default_epi_link_fields(mut self, fields: &[String]) -> Self {
        if self.epi_link_fields.is_empty() {
            self.epi_link_fields = fields.to_vec();
        }
        self
    }

    /// Every lab test code the definition mentions, in exclusion tests and positive-lab criteria.
    fn test_codes_mut(&mut self) -> impl Iterator<Item = &mut String> {
        let CaseDefinition {
            exclusion_tests,
            suspected,
            probable,
            confirmed,
            ..
        } = self;
        let in_tiers = [suspected, probable, confirmed]
            .into_iter()
            .flatten()
            .flat_map(|criteria| criteria.mandatory.iter_mut().chain(&mut criteria.optional))
            .filter_map(|criterion| match criterion {
                Criterion::PositiveLab { tests } => Some(tests.iter_mut()),
                _ => None,
            })
            .flatten();
        exclusion_tests.iter_mut().chain(in_tiers)
    }

    fn test_codes(&self) -> BTreeSet<&str> {
        let in_tiers = self
            .tiers()
            .flat_map(|(_, criteria)| criteria.criteria())
            .filter_map(|criterion| match criterion {
                Criterion::PositiveLab { tests } => Some(tests),
                _ => None,
            })
            .flatten();
        self.exclusion_tests
            .iter()
            .chain(in_tiers)
            .map(String::as_str)
            .collect()
    }

    /// Returns the definition with every test code `lab` answers to, by code or alias, replaced
    /// by that test's code. Codes `lab` does not know are left as written.
    #[must_use]
    pub fn with_canonical_test_codes(mut self, lab: &LabConfig) -> Self {
        for code in self.test_codes_mut() {
            if let Ok(spec) = lab.resolve(code.as_str()) {
                code.clone_from(&spec.code);
            }
        }
        self
    }

    /// Test codes no test in `lab` answers to. Results for them can never be positive.
    pub fn unknown_tests(&self, lab: &LabConfig) -> Vec<DefinitionIssue> {
        self.test_codes()
            .into_iter()
            .filter(|code| lab.resolve(code).is_err())
            .map(|code| DefinitionIssue::UnknownTest {
                code: code.to_string(),
            })
            .collect()
    }

    /// Problems that make the definition unlikely to be useful. None of them prevents
    /// classification.
    pub fn validate(&self) -> Vec<DefinitionIssue> {
        let mut issues = Vec::new();
        if self.tiers().next().is_none() {
            issues.push(DefinitionIssue::NoTiers);
        }
        if !self.time_window.is_bounded() {
            issues.push(DefinitionIssue::NoTimeWindow);
        }
        if self.villages.is_empty() {
            issues.push(DefinitionIssue::NoPlaceRestriction);
        }
        if let (Some(start), Some(end)) = (self.time_window.start, self.time_window.end) {
            if start > end {
                issues.push(DefinitionIssue::EmptyTimeWindow);
            }
        }
        for (tier, criteria) in self.tiers() {
            if criteria.mandatory.is_empty() && criteria.min_optional == 0 {
                issues.push(DefinitionIssue::MatchesEveryone { tier });
            }
            if !criteria.criteria().any(Criterion::is_clinical) {
                issues.push(DefinitionIssue::NoClinicalCriteria { tier });
            }
            if criteria.min_optional > criteria.optional.len() {
                issues.push(DefinitionIssue::UnreachableOptional {
                    tier,
                    min_optional: criteria.min_optional,
                    available: criteria.optional.len(),
                });
            }
            if criteria.criteria().any(|criterion| *criterion == Criterion::EpiLink)
                && self.epi_link_fields.is_empty()
            {
                issues.push(DefinitionIssue::EpiLinkWithoutFields { tier });
            }
        }
        issues
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum DefinitionIssue {
    NoTiers,
    NoTimeWindow,
    EmptyTimeWindow,
    NoPlaceRestriction,
    NoClinicalCriteria {
        tier: Tier,
    },
    MatchesEveryone {
        tier: Tier,
    },
    UnreachableOptional {
        tier: Tier,
        min_optional: usize,
        available: usize,
    },
    EpiLinkWithoutFields {
        tier: Tier,
    },
    UnknownTest {
        code: String,
    },
}

impl Display for DefinitionIssue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DefinitionIssue::NoTiers => write!(f, "defines no tiers"),
            DefinitionIssue::NoTimeWindow => write!(f, "has no onset time window"),
            DefinitionIssue::EmptyTimeWindow => {
                write!(f, "has a time window that ends before it starts")
            }
            DefinitionIssue::NoPlaceRestriction => write!(f, "is not restricted to any villages"),
            DefinitionIssue::NoClinicalCriteria { tier } => {
                write!(f, "{tier} tier has no clinical criteria")
            }
            DefinitionIssue::MatchesEveryone { tier } => {
                write!(f, "{tier} tier has no required criteria and matches everyone")
            }
            DefinitionIssue::UnreachableOptional {
                tier,
                min_optional,
                available,
            } => write!(
                f,
                "{tier} tier needs {min_optional} optional criteria but lists {available}"
            ),
            DefinitionIssue::EpiLinkWithoutFields { tier } => write!(
                f,
                "{tier} tier uses an epi link but no epi-link fields are configured"
            ),
            DefinitionIssue::UnknownTest { code } => {
                write!(f, "refers to lab test `{code}`, which the scenario does not offer")
            }
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, StrumDisplay,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Classification {
    NotACase,
    Suspected,
    Probable,
    Confirmed,
    /// A positive rule-out test points to another diagnosis.
    Excluded,
}

impl Classification {
    pub fn tier(self) -> Option<Tier> {
        match self {
            Classification::Suspected => Some(Tier::Suspected),
            Classification::Probable => Some(Tier::Probable),
            Classification::Confirmed => Some(Tier::Confirmed),
            Classification::NotACase | Classification::Excluded => None,
        }
    }

    /// Whether the record was classified at `threshold` or a higher tier.
    pub fn meets(self, threshold: Tier) -> bool {
        self.tier().is_some_and(|tier| tier >= threshold)
    }
}

impl From<Tier> for Classification {
    fn from(tier: Tier) -> Self {
        match tier {
            Tier::Suspected => Classification::Suspected,
            Tier::Probable => Classification::Probable,
            Tier::Confirmed => Classification::Confirmed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition() -> CaseDefinition {
        serde_json::from_str(
            r#"{
                "name": "Leptospirosis (Rivergate)",
                "time_window": { "start": "2024-10-01", "end": "2024-11-15" },
                "villages": ["V1", "V2", "V3", "V4"],
                "exclusion_tests": ["MALARIA_RDT"],
                "epi_link_fields": ["exposure_cleanup_work"],
                "suspected": {
                    "mandatory": [ { "type": "symptom", "symptom": "fever" } ],
                    "optional": [
                        { "type": "symptom", "symptom": "myalgia" },
                        { "type": "symptom", "symptom": "headache" }
                    ],
                    "min_optional": 1
                },
                "probable": {
                    "mandatory": [ { "type": "symptom", "symptom": "fever" }, { "type": "epi_link" } ]
                },
                "confirmed": {
                    "mandatory": [
                        { "type": "any_symptom", "symptoms": ["fever", "jaundice"] },
                        { "type": "positive_lab", "tests": ["LEPTO_MAT", "LEPTO_PCR_BLOOD"] }
                    ]
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn a_complete_definition_has_no_issues() {
        assert_eq!(definition().validate(), Vec::new());
    }

    #[test]
    fn missing_bounds_and_clinical_criteria_are_flagged() {
        let mut definition = definition();
        definition.time_window = TimeWindow::default();
        definition.villages.clear();
        definition.confirmed = Some(TierCriteria {
            mandatory: vec![Criterion::PositiveLab {
                tests: vec!["LEPTO_MAT".to_string()],
            }],
            optional: Vec::new(),
            min_optional: 0,
        });
        definition.epi_link_fields.clear();
        let issues = definition.validate();
        assert!(issues.contains(&DefinitionIssue::NoTimeWindow));
        assert!(issues.contains(&DefinitionIssue::NoPlaceRestriction));
        assert!(issues.contains(&DefinitionIssue::NoClinicalCriteria {
            tier: Tier::Confirmed
        }));
        assert!(issues.contains(&DefinitionIssue::EpiLinkWithoutFields {
            tier: Tier::Probable
        }));
        assert_eq!(
            DefinitionIssue::NoClinicalCriteria {
                tier: Tier::Confirmed
            }
            .to_string(),
            "confirmed tier has no clinical criteria"
        );
    }

    #[test]
    fn test_aliases_resolve_to_codes() {
        let lab = crate::test_support::lepto_config().lab;
        let mut definition = definition();
        definition.exclusion_tests = vec!["rdt".to_string()];
        definition.confirmed = Some(TierCriteria {
            mandatory: vec![Criterion::PositiveLab {
                tests: vec!["MAT".to_string(), "CULTURE".to_string()],
            }],
            ..TierCriteria::default()
        });
        assert_eq!(
            definition.unknown_tests(&lab),
            [DefinitionIssue::UnknownTest {
                code: "CULTURE".to_string()
            }]
        );

        let definition = definition.with_canonical_test_codes(&lab);
        assert_eq!(definition.exclusion_tests, ["MALARIA_RDT"]);
        assert_eq!(
            definition.confirmed.unwrap().mandatory,
            [Criterion::PositiveLab {
                tests: vec!["LEPTO_MAT".to_string(), "CULTURE".to_string()],
            }]
        );
    }

    #[test]
    fn classifications_rank_by_tier() {
        assert!(Classification::Confirmed.meets(Tier::Probable));
        assert!(Classification::Probable.meets(Tier::Probable));
        assert!(!Classification::Suspected.meets(Tier::Probable));
        assert!(!Classification::Excluded.meets(Tier::Suspected));
        assert!(!Classification::NotACase.meets(Tier::Suspected));
        assert_eq!(Classification::NotACase.to_string(), "not_a_case");
    }
}
