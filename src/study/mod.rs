//! Study datasets: the people an investigator actually interviews, drawn from the line list
//! according to a study design.
//!
//! A case-control study samples cases from those meeting a case definition and controls from
//! the non-cases living in the same villages (or a chosen set of villages). Controls come from
//! the community at large, from clinic attendees, or mostly from the case households'
//! neighbours. Some of the people sampled never respond; with replacement enabled they are
//! replaced, preferring people of the same village and age group. Cohort and simple random
//! designs are supported as well.
//!
//! Sampling has its own random streams, so a dataset depends only on the line list, the
//! classifications, the design and the seed. [`inject_noise`] then degrades the exported table
//! the way field data is degraded.
mod noise;

use std::collections::{BTreeMap, BTreeSet};

use log::{info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use strum::{Display as StrumDisplay, IntoStaticStr};

pub use noise::{inject_noise, DataNoise, PROTECTED_COLUMNS};

use crate::case_definition::{Classifications, Tier};
use crate::error::OutbreakError;
use crate::line_list::{LineList, LineListRow, LineListTable};
use crate::population::{PersonId, VillageId};
use crate::random::{define_rng, sample_weighted_without_replacement, RandomStreams};
use crate::HashSet;

define_rng!(StudySampleRng, NonresponseRng);

/// Some people always answer the door.
const MAX_NONRESPONSE_RATE: f64 = 0.95;

// Chance of having attended a clinic: a base rate, raised by illness.
const CLINIC_BASE_RATE: f64 = 0.04;
const CLINIC_SYMPTOMATIC_BOOST: f64 = 0.20;
const CLINIC_SEVERE_BOOST: f64 = 0.35;

/// Household number distance at which neighbourhood weights stop falling.
const NEIGHBOURHOOD_SPAN: u32 = 50;
const NEIGHBOURHOOD_SCALE: f64 = 8.0;

/// Where controls are recruited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ControlSource {
    #[default]
    Community,
    /// People who were seen at a clinic, whether or not they were ill.
    #[serde(alias = "hospital")]
    Clinic,
    /// Weighted toward households numbered close to a case household.
    #[serde(alias = "neighbourhood")]
    Neighborhood,
}

/// Inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeRange {
    pub min: u8,
    pub max: u8,
}

impl AgeRange {
    pub fn contains(&self, age: u8) -> bool {
        (self.min..=self.max).contains(&age)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseControlPlan {
    /// Cases to sample when none are selected by hand.
    pub cases: usize,
    pub controls_per_case: usize,
    /// Lowest tier that makes someone a case.
    pub threshold: Tier,
    pub control_source: ControlSource,
    /// Villages controls may come from; empty means the villages of the sampled cases.
    pub eligible_villages: Vec<VillageId>,
    pub control_age_range: Option<AgeRange>,
    /// Allow ill people who do not meet the definition as controls.
    pub include_symptomatic_noncases: bool,
    /// Hand-picked cases; replaces sampling when given.
    pub selected_cases: Vec<PersonId>,
    /// Hand-picked controls; replaces sampling when given.
    pub selected_controls: Vec<PersonId>,
    pub nonresponse_rate: f64,
    pub allow_replacement: bool,
}

impl Default for CaseControlPlan {
    fn default() -> Self {
        CaseControlPlan {
            cases: 15,
            controls_per_case: 2,
            threshold: Tier::Suspected,
            control_source: ControlSource::default(),
            eligible_villages: Vec::new(),
            control_age_range: None,
            include_symptomatic_noncases: false,
            selected_cases: Vec::new(),
            selected_controls: Vec::new(),
            nonresponse_rate: 0.0,
            allow_replacement: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, IntoStaticStr)]
#[serde(tag = "type", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StudyDesign {
    CaseControl(CaseControlPlan),
    /// Everyone in `villages` (all villages if empty) up to `max_age`. Being symptomatic is the
    /// outcome.
    Cohort {
        #[serde(default)]
        villages: Vec<VillageId>,
        #[serde(default)]
        max_age: Option<u8>,
    },
    /// `size` residents drawn uniformly.
    SimpleRandom { size: usize },
}

impl StudyDesign {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// # Errors
    ///
    /// Returns `OutbreakError::Configuration` for a nonresponse rate outside `[0, 1]` or an
    /// empty control age range.
    pub fn validate(&self) -> Result<(), OutbreakError> {
        let StudyDesign::CaseControl(plan) = self else {
            return Ok(());
        };
        if !(0.0..=1.0).contains(&plan.nonresponse_rate) {
            return Err(OutbreakError::Configuration(format!(
                "nonresponse_rate must lie in [0, 1], got {}",
                plan.nonresponse_rate
            )));
        }
        if let Some(range) = plan.control_age_range {
            if range.min > range.max {
                return Err(OutbreakError::Configuration(format!(
                    "control_age_range {}..={} is empty",
                    range.min, range.max
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, StrumDisplay)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SampleRole {
    Case,
    Control,
    CohortMember,
    Sample,
}

/// One person in the study.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    pub person_id: PersonId,
    pub case_status: bool,
    pub role: SampleRole,
    /// How the person was recruited, e.g. `case_pool` or `clinic`.
    pub source: &'static str,
    /// Recruited in place of someone who did not respond.
    pub replacement: bool,
}

/// How sampling went for cases or for controls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupReport {
    /// Eligible people.
    pub pool: usize,
    pub target: usize,
    pub selected: usize,
    pub responded: usize,
    pub nonresponded: usize,
    pub replaced: usize,
    /// Replacements that did not match a responder's village and age group.
    pub replacement_relaxed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SamplingReport {
    pub design: &'static str,
    pub seed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cases: Option<GroupReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controls: Option<GroupReport>,
    pub participants: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudyDataset {
    line_list: LineList,
    participants: Vec<Participant>,
    report: SamplingReport,
}

impl StudyDataset {
    /// The participants' line list rows, in participant order.
    pub fn line_list(&self) -> &LineList {
        &self.line_list
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn report(&self) -> &SamplingReport {
        &self.report
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// The observable line list columns with the study columns (`case_status`, `sample_role`,
    /// `sampling_source`, `replacement`) after the identifiers. Ground truth is never included.
    pub fn to_table(&self) -> LineListTable {
        let mut table = self.line_list.to_table(None, false);
        let at = table.column("hh_id").map_or(0, |column| column + 1);
        let participants = &self.participants;
        table.insert_column(
            at,
            "case_status",
            participants
                .iter()
                .map(|p| u8::from(p.case_status).to_string()),
        );
        table.insert_column(
            at + 1,
            "sample_role",
            participants.iter().map(|p| p.role.to_string()),
        );
        table.insert_column(
            at + 2,
            "sampling_source",
            participants.iter().map(|p| p.source.to_string()),
        );
        table.insert_column(
            at + 3,
            "replacement",
            participants
                .iter()
                .map(|p| if p.replacement { "yes" } else { "no" }.to_string()),
        );
        table
    }
}

#[derive(Clone, Copy)]
struct Candidate<'a> {
    row: &'a LineListRow,
    weight: f64,
}

impl<'a> Candidate<'a> {
    fn uniform(row: &'a LineListRow) -> Self {
        Candidate { row, weight: 1.0 }
    }
}

/// Only symptomatic residents have an onset an interviewer can ask about.
fn is_symptomatic(row: &LineListRow) -> bool {
    row.onset_date.is_some()
}

fn age_group(age: u8) -> &'static str {
    match age {
        0..=4 => "0-4",
        5..=14 => "5-14",
        15..=29 => "15-29",
        30..=44 => "30-44",
        45..=59 => "45-59",
        _ => "60+",
    }
}

fn stratum(row: &LineListRow) -> (&VillageId, &'static str) {
    (&row.village_id, age_group(row.age))
}

fn clinic_attendance(row: &LineListRow) -> f64 {
    let mut chance = CLINIC_BASE_RATE;
    if is_symptomatic(row) {
        chance += CLINIC_SYMPTOMATIC_BOOST;
    }
    if row.is_severe() {
        chance += CLINIC_SEVERE_BOOST;
    }
    chance.clamp(0.01, 0.95)
}

fn neighbourhood_weight(distance: u32) -> f64 {
    (-f64::from(distance.min(NEIGHBOURHOOD_SPAN)) / NEIGHBOURHOOD_SCALE).exp()
}

/// Indexes of up to `count` candidates drawn without replacement in proportion to weight, in
/// pool order.
fn draw<R: Rng>(rng: &mut R, pool: &[Candidate], count: usize) -> Vec<usize> {
    let weights: Vec<f64> = pool.iter().map(|candidate| candidate.weight).collect();
    sample_weighted_without_replacement(rng, &weights, count)
}

fn draw_candidates<'a, R: Rng>(
    rng: &mut R,
    pool: &[Candidate<'a>],
    count: usize,
) -> Vec<Candidate<'a>> {
    draw(rng, pool, count)
        .into_iter()
        .map(|index| pool[index])
        .collect()
}

/// The hand-picked members of `pool`. Ids not on the line list are an error; ids that are on it
/// but not eligible are skipped with a warning.
fn pick<'a>(
    line_list: &LineList,
    pool: &[Candidate<'a>],
    ids: &[PersonId],
    role: SampleRole,
) -> Result<Vec<Candidate<'a>>, OutbreakError> {
    let mut seen: HashSet<&PersonId> = HashSet::default();
    let mut picked = Vec::new();
    for person_id in ids {
        if line_list.get(person_id).is_none() {
            return Err(OutbreakError::UnknownPerson(person_id.to_string()));
        }
        if !seen.insert(person_id) {
            continue;
        }
        match pool.iter().find(|candidate| candidate.row.person_id == *person_id) {
            Some(candidate) => picked.push(*candidate),
            None => warn!("{person_id} was selected as a {role} but is not eligible"),
        }
    }
    Ok(picked)
}

fn recruit_controls<'a, R: Rng>(
    rng: &mut R,
    eligible: Vec<&'a LineListRow>,
    source: ControlSource,
    cases: &[Candidate],
) -> Vec<Candidate<'a>> {
    match source {
        ControlSource::Community => eligible.into_iter().map(Candidate::uniform).collect(),
        ControlSource::Clinic => eligible
            .into_iter()
            .filter(|row| {
                let attended = rng.random::<f64>() < clinic_attendance(row);
                row.reported_to_hospital || attended
            })
            .map(Candidate::uniform)
            .collect(),
        ControlSource::Neighborhood => {
            let case_households: Vec<u32> = cases
                .iter()
                .filter_map(|case| case.row.household_id.numeric_suffix())
                .collect();
            if case_households.is_empty() {
                return eligible.into_iter().map(Candidate::uniform).collect();
            }
            eligible
                .into_iter()
                .map(|row| {
                    let distance = row
                        .household_id
                        .numeric_suffix()
                        .and_then(|number| {
                            case_households
                                .iter()
                                .map(|case| number.abs_diff(*case))
                                .min()
                        })
                        .unwrap_or(NEIGHBOURHOOD_SPAN);
                    Candidate {
                        row,
                        weight: neighbourhood_weight(distance),
                    }
                })
                .collect()
        }
    }
}

/// Drops nonresponders and, if allowed, tops the group back up to `target` from the rest of
/// `pool`. Replacements first follow the responders' mix of village and age group, then come
/// from anyone left. Returns each enrolled row with whether it is a replacement.
fn respond<'a, R: Rng>(
    rng: &mut R,
    selected: &[Candidate<'a>],
    pool: &[Candidate<'a>],
    target: usize,
    plan: &CaseControlPlan,
) -> (Vec<(&'a LineListRow, bool)>, GroupReport) {
    let rate = plan.nonresponse_rate.min(MAX_NONRESPONSE_RATE);
    let responders: Vec<Candidate<'a>> = selected
        .iter()
        .copied()
        .filter(|_| rng.random::<f64>() >= rate)
        .collect();
    let mut report = GroupReport {
        pool: pool.len(),
        target,
        selected: selected.len(),
        responded: responders.len(),
        nonresponded: selected.len() - responders.len(),
        ..GroupReport::default()
    };
    let mut enrolled: Vec<(&'a LineListRow, bool)> =
        responders.iter().map(|candidate| (candidate.row, false)).collect();
    let need = target.saturating_sub(responders.len());
    if !plan.allow_replacement || need == 0 {
        return (enrolled, report);
    }

    let mut taken: HashSet<&PersonId> = selected
        .iter()
        .map(|candidate| &candidate.row.person_id)
        .collect();
    let mut strata: BTreeMap<(&VillageId, &'static str), usize> = BTreeMap::new();
    for responder in &responders {
        *strata.entry(stratum(responder.row)).or_default() += 1;
    }

    let mut replacements: Vec<&'a LineListRow> = Vec::new();
    for (key, size) in strata {
        let wanted = size.min(need - replacements.len());
        if wanted == 0 {
            break;
        }
        let matching: Vec<Candidate<'a>> = pool
            .iter()
            .copied()
            .filter(|candidate| {
                !taken.contains(&candidate.row.person_id) && stratum(candidate.row) == key
            })
            .collect();
        for candidate in draw_candidates(rng, &matching, wanted) {
            taken.insert(&candidate.row.person_id);
            replacements.push(candidate.row);
        }
    }
    let matched = replacements.len();
    if matched < need {
        let rest: Vec<Candidate<'a>> = pool
            .iter()
            .copied()
            .filter(|candidate| !taken.contains(&candidate.row.person_id))
            .collect();
        replacements.extend(
            draw_candidates(rng, &rest, need - matched)
                .into_iter()
                .map(|candidate| candidate.row),
        );
    }

    report.replaced = replacements.len();
    report.replacement_relaxed = replacements.len() - matched;
    enrolled.extend(replacements.into_iter().map(|row| (row, true)));
    (enrolled, report)
}

fn case_control(
    line_list: &LineList,
    classifications: &Classifications,
    plan: &CaseControlPlan,
    streams: &RandomStreams,
) -> Result<(Vec<Participant>, GroupReport, GroupReport), OutbreakError> {
    let case_pool: Vec<Candidate> = line_list
        .rows()
        .iter()
        .filter(|row| {
            classifications
                .get(&row.person_id)
                .is_some_and(|classification| classification.meets(plan.threshold))
        })
        .map(Candidate::uniform)
        .collect();
    let (cases, case_target) = if plan.selected_cases.is_empty() {
        let cases = streams.sample(StudySampleRng, |rng| {
            draw_candidates(rng, &case_pool, plan.cases)
        });
        (cases, plan.cases.min(case_pool.len()))
    } else {
        let cases = pick(line_list, &case_pool, &plan.selected_cases, SampleRole::Case)?;
        let target = cases.len();
        (cases, target)
    };

    let in_case_pool: HashSet<&PersonId> = case_pool
        .iter()
        .map(|candidate| &candidate.row.person_id)
        .collect();
    let villages: BTreeSet<&VillageId> = if plan.eligible_villages.is_empty() {
        cases.iter().map(|case| &case.row.village_id).collect()
    } else {
        plan.eligible_villages.iter().collect()
    };
    let eligible: Vec<&LineListRow> = line_list
        .rows()
        .iter()
        .filter(|row| {
            !in_case_pool.contains(&row.person_id)
                && (plan.include_symptomatic_noncases || !is_symptomatic(row))
                && villages.contains(&row.village_id)
                && plan
                    .control_age_range
                    .is_none_or(|range| range.contains(row.age))
        })
        .collect();
    let control_pool = streams.sample(StudySampleRng, |rng| {
        recruit_controls(rng, eligible, plan.control_source, &cases)
    });
    let (controls, control_target) = if plan.selected_controls.is_empty() {
        let target = cases.len() * plan.controls_per_case;
        let controls = streams.sample(StudySampleRng, |rng| {
            draw_candidates(rng, &control_pool, target)
        });
        (controls, target)
    } else {
        let controls = pick(
            line_list,
            &control_pool,
            &plan.selected_controls,
            SampleRole::Control,
        )?;
        let target = controls.len();
        (controls, target)
    };

    let (enrolled_cases, case_report) = streams.sample(NonresponseRng, |rng| {
        respond(rng, &cases, &case_pool, case_target, plan)
    });
    let (enrolled_controls, control_report) = streams.sample(NonresponseRng, |rng| {
        respond(rng, &controls, &control_pool, control_target, plan)
    });

    let control_source: &'static str = plan.control_source.into();
    let participants = enrolled_cases
        .into_iter()
        .map(|(row, replacement)| Participant {
            person_id: row.person_id.clone(),
            case_status: true,
            role: SampleRole::Case,
            source: "case_pool",
            replacement,
        })
        .chain(
            enrolled_controls
                .into_iter()
                .map(|(row, replacement)| Participant {
                    person_id: row.person_id.clone(),
                    case_status: false,
                    role: SampleRole::Control,
                    source: control_source,
                    replacement,
                }),
        )
        .collect();
    Ok((participants, case_report, control_report))
}

fn observed(row: &LineListRow, role: SampleRole, source: &'static str) -> Participant {
    Participant {
        person_id: row.person_id.clone(),
        case_status: is_symptomatic(row),
        role,
        source,
        replacement: false,
    }
}

/// Draws the participants of a study from `line_list`. For case-control designs `classifications`
/// decides who is a case.
///
/// # Errors
///
/// Returns `OutbreakError::Configuration` if `design` is invalid and
/// `OutbreakError::UnknownPerson` if a hand-picked participant is not on the line list.
pub fn generate_study_dataset(
    line_list: &LineList,
    classifications: &Classifications,
    design: &StudyDesign,
    seed: u64,
) -> Result<StudyDataset, OutbreakError> {
    design.validate()?;
    let streams = RandomStreams::new(seed);
    let mut report = SamplingReport {
        design: design.name(),
        seed,
        cases: None,
        controls: None,
        participants: 0,
    };

    let participants: Vec<Participant> = match design {
        StudyDesign::CaseControl(plan) => {
            let (participants, cases, controls) =
                case_control(line_list, classifications, plan, &streams)?;
            report.cases = Some(cases);
            report.controls = Some(controls);
            participants
        }
        StudyDesign::Cohort { villages, max_age } => line_list
            .rows()
            .iter()
            .filter(|row| {
                (villages.is_empty() || villages.contains(&row.village_id))
                    && max_age.is_none_or(|max_age| row.age <= max_age)
            })
            .map(|row| observed(row, SampleRole::CohortMember, "village_cohort"))
            .collect(),
        StudyDesign::SimpleRandom { size } => {
            let everyone: Vec<Candidate> =
                line_list.rows().iter().map(Candidate::uniform).collect();
            streams
                .sample(StudySampleRng, |rng| draw_candidates(rng, &everyone, *size))
                .into_iter()
                .map(|candidate| observed(candidate.row, SampleRole::Sample, "simple_random"))
                .collect()
        }
    };
    report.participants = participants.len();
    info!(
        "sampled {} participants for a {} study",
        participants.len(),
        report.design
    );

    let ids: Vec<PersonId> = participants
        .iter()
        .map(|participant| participant.person_id.clone())
        .collect();
    Ok(StudyDataset {
        line_list: line_list.select(&ids),
        participants,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::OutbreakSession;
    use crate::test_support::{lepto_config, lepto_seed_data};

    fn inputs() -> (LineList, Classifications) {
        let session = OutbreakSession::new(&lepto_seed_data(), lepto_config(), 3).unwrap();
        let definition = session.default_case_definition().unwrap();
        (session.line_list(), session.classify(&definition))
    }

    fn case_control_design(plan: CaseControlPlan) -> StudyDesign {
        StudyDesign::CaseControl(plan)
    }

    fn count(dataset: &StudyDataset, role: SampleRole) -> usize {
        dataset
            .participants()
            .iter()
            .filter(|participant| participant.role == role)
            .count()
    }

    #[test]
    fn designs_parse_with_defaults() {
        let design: StudyDesign = serde_json::from_str(
            r#"{ "type": "case_control", "cases": 10, "control_source": "neighbourhood" }"#,
        )
        .unwrap();
        assert_eq!(
            design,
            case_control_design(CaseControlPlan {
                cases: 10,
                control_source: ControlSource::Neighborhood,
                ..CaseControlPlan::default()
            })
        );
        assert_eq!(design.name(), "case_control");

        let design: StudyDesign =
            serde_json::from_str(r#"{ "type": "simple_random", "size": 20 }"#).unwrap();
        assert_eq!(design, StudyDesign::SimpleRandom { size: 20 });
    }

    #[test]
    fn same_seed_same_sample() {
        let (line_list, classifications) = inputs();
        let design = case_control_design(CaseControlPlan {
            nonresponse_rate: 0.2,
            allow_replacement: true,
            ..CaseControlPlan::default()
        });
        let first = generate_study_dataset(&line_list, &classifications, &design, 7).unwrap();
        let again = generate_study_dataset(&line_list, &classifications, &design, 7).unwrap();
        assert_eq!(first, again);
        let other = generate_study_dataset(&line_list, &classifications, &design, 8).unwrap();
        assert_ne!(first.participants(), other.participants());
    }

    #[test]
    fn cases_meet_the_definition_and_controls_do_not() {
        let (line_list, classifications) = inputs();
        let plan = CaseControlPlan::default();
        let pool = classifications.count_meeting(Tier::Suspected);
        let dataset = generate_study_dataset(
            &line_list,
            &classifications,
            &case_control_design(plan),
            1,
        )
        .unwrap();

        let cases = count(&dataset, SampleRole::Case);
        assert_eq!(cases, pool.min(15));
        assert!(count(&dataset, SampleRole::Control) <= cases * 2);
        let case_villages: BTreeSet<&VillageId> = dataset
            .line_list()
            .rows()
            .iter()
            .zip(dataset.participants())
            .filter(|(_, participant)| participant.role == SampleRole::Case)
            .map(|(row, _)| &row.village_id)
            .collect();
        for (row, participant) in dataset.line_list().rows().iter().zip(dataset.participants()) {
            assert_eq!(row.person_id, participant.person_id);
            let classification = classifications.get(&row.person_id).unwrap();
            if participant.role == SampleRole::Case {
                assert!(participant.case_status);
                assert!(classification.meets(Tier::Suspected));
            } else {
                assert!(!participant.case_status);
                assert!(!classification.meets(Tier::Suspected));
                assert!(!is_symptomatic(row));
                assert!(case_villages.contains(&row.village_id));
                assert_eq!(participant.source, "community");
            }
        }
        let report = dataset.report();
        assert_eq!(report.cases.as_ref().unwrap().pool, pool);
        assert_eq!(report.participants, dataset.len());
    }

    #[test]
    fn replacements_top_up_nonresponders() {
        let (line_list, classifications) = inputs();
        let design = case_control_design(CaseControlPlan {
            cases: 4,
            controls_per_case: 5,
            nonresponse_rate: 0.4,
            allow_replacement: true,
            ..CaseControlPlan::default()
        });
        let dataset = generate_study_dataset(&line_list, &classifications, &design, 21).unwrap();
        let controls = dataset.report().controls.clone().unwrap();
        assert_eq!(
            controls.target,
            dataset.report().cases.as_ref().unwrap().selected * 5
        );
        assert_eq!(controls.responded + controls.nonresponded, controls.selected);
        assert_eq!(controls.replaced, controls.target - controls.responded);
        assert_eq!(count(&dataset, SampleRole::Control), controls.target);
        let replacements = dataset
            .participants()
            .iter()
            .filter(|participant| participant.replacement && participant.role == SampleRole::Control)
            .count();
        assert_eq!(replacements, controls.replaced);

        let unique: HashSet<&PersonId> = dataset
            .participants()
            .iter()
            .map(|participant| &participant.person_id)
            .collect();
        assert_eq!(unique.len(), dataset.len());
    }

    #[test]
    fn without_replacement_nonresponders_are_dropped() {
        let (line_list, classifications) = inputs();
        let design = case_control_design(CaseControlPlan {
            nonresponse_rate: 0.5,
            ..CaseControlPlan::default()
        });
        let dataset = generate_study_dataset(&line_list, &classifications, &design, 2).unwrap();
        let cases = dataset.report().cases.clone().unwrap();
        let controls = dataset.report().controls.clone().unwrap();
        assert_eq!(dataset.len(), cases.responded + controls.responded);
        assert_eq!(cases.replaced + controls.replaced, 0);
        assert!(dataset.participants().iter().all(|p| !p.replacement));
    }

    #[test]
    fn hand_picked_participants_are_used() {
        let (line_list, classifications) = inputs();
        let case_ids: Vec<PersonId> = classifications
            .iter()
            .filter(|(_, classification)| classification.meets(Tier::Suspected))
            .map(|(person_id, _)| person_id.clone())
            .take(2)
            .collect();
        let first_case = line_list.get(&case_ids[0]).unwrap();
        let control = line_list
            .rows()
            .iter()
            .find(|row| {
                row.village_id == first_case.village_id
                    && !is_symptomatic(row)
                    && !classifications
                        .get(&row.person_id)
                        .is_some_and(|classification| classification.meets(Tier::Suspected))
            })
            .unwrap();
        let plan = CaseControlPlan {
            selected_cases: vec![case_ids[0].clone(), case_ids[0].clone(), case_ids[1].clone()],
            selected_controls: vec![control.person_id.clone()],
            ..CaseControlPlan::default()
        };
        let dataset =
            generate_study_dataset(&line_list, &classifications, &case_control_design(plan), 4)
                .unwrap();
        let ids: Vec<&PersonId> = dataset
            .participants()
            .iter()
            .map(|participant| &participant.person_id)
            .collect();
        assert_eq!(ids, vec![&case_ids[0], &case_ids[1], &control.person_id]);

        let unknown = CaseControlPlan {
            selected_cases: vec![PersonId::from("NOBODY")],
            ..CaseControlPlan::default()
        };
        assert!(matches!(
            generate_study_dataset(&line_list, &classifications, &case_control_design(unknown), 4),
            Err(OutbreakError::UnknownPerson(_))
        ));
    }

    #[test]
    fn neighbourhood_weights_fall_with_distance() {
        assert!((neighbourhood_weight(0) - 1.0).abs() < f64::EPSILON);
        assert!(neighbourhood_weight(1) > neighbourhood_weight(8));
        assert!((neighbourhood_weight(50) - neighbourhood_weight(500)).abs() < f64::EPSILON);
    }

    #[test]
    fn cohort_takes_everyone_eligible() {
        let (line_list, classifications) = inputs();
        let design = StudyDesign::Cohort {
            villages: vec![VillageId::from("V1")],
            max_age: Some(15),
        };
        let dataset = generate_study_dataset(&line_list, &classifications, &design, 0).unwrap();
        let expected = line_list
            .rows()
            .iter()
            .filter(|row| row.village_id.as_str() == "V1" && row.age <= 15)
            .count();
        assert_eq!(dataset.len(), expected);
        for (row, participant) in dataset.line_list().rows().iter().zip(dataset.participants()) {
            assert_eq!(participant.case_status, is_symptomatic(row));
            assert_eq!(participant.role, SampleRole::CohortMember);
        }
        assert!(dataset.report().cases.is_none());
    }

    #[test]
    fn simple_random_sample_has_the_requested_size() {
        let (line_list, classifications) = inputs();
        let design = StudyDesign::SimpleRandom { size: 25 };
        let dataset = generate_study_dataset(&line_list, &classifications, &design, 5).unwrap();
        assert_eq!(dataset.len(), 25);
        assert_eq!(count(&dataset, SampleRole::Sample), 25);
    }

    #[test]
    fn invalid_designs_are_rejected() {
        let (line_list, classifications) = inputs();
        let design = case_control_design(CaseControlPlan {
            nonresponse_rate: 1.5,
            ..CaseControlPlan::default()
        });
        assert!(matches!(
            generate_study_dataset(&line_list, &classifications, &design, 0),
            Err(OutbreakError::Configuration(_))
        ));
        let design = case_control_design(CaseControlPlan {
            control_age_range: Some(AgeRange { min: 40, max: 20 }),
            ..CaseControlPlan::default()
        });
        assert!(design.validate().is_err());
    }

    #[test]
    fn study_table_carries_study_columns_through_noise() {
        let (line_list, classifications) = inputs();
        let dataset = generate_study_dataset(
            &line_list,
            &classifications,
            &case_control_design(CaseControlPlan::default()),
            6,
        )
        .unwrap();
        let table = dataset.to_table();
        assert_eq!(table.column("case_status"), Some(3));
        assert_eq!(table.column("replacement"), Some(6));
        assert!(table.column("true_infection").is_none());
        assert_eq!(table.len(), dataset.len());

        let noisy = inject_noise(&table, &DataNoise::default(), 6).unwrap();
        let status = table.column("case_status").unwrap();
        for (before, after) in table.records().iter().zip(noisy.records()) {
            assert_eq!(before[status], after[status]);
        }
        let first = &noisy.records()[0];
        assert_eq!(first[status], "1");
    }
}
