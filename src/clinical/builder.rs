use chrono::{Days, NaiveDate};

use crate::clinical::{
    CareSeeking, ClinicalRecord, Outcome, Presentation, Severity, SymptomaticCourse,
};
use crate::error::OutbreakError;
use crate::population::PersonId;
use crate::symptom::{Symptom, SymptomSet};

/// Collects the pieces of a clinical record as the simulator decides them. [`build`] either
/// returns a complete record or says which piece is missing; no partially filled record ever
/// escapes.
///
/// [`build`]: ClinicalRecordBuilder::build
#[derive(Debug, Clone)]
pub struct ClinicalRecordBuilder {
    person_id: PersonId,
    seed_case: bool,
    exposure_date: Option<NaiveDate>,
    incubation_days: Option<u32>,
    symptomatic: Option<bool>,
    severity: Option<Severity>,
    symptoms: SymptomSet,
    outcome: Option<Outcome>,
    death_date: Option<NaiveDate>,
    has_sequelae: bool,
    care: Option<CareSeeking>,
}

impl ClinicalRecordBuilder {
    pub fn new(person_id: PersonId) -> Self {
        ClinicalRecordBuilder {
            person_id,
            seed_case: false,
            exposure_date: None,
            incubation_days: None,
            symptomatic: None,
            severity: None,
            symptoms: SymptomSet::new(),
            outcome: None,
            death_date: None,
            has_sequelae: false,
            care: None,
        }
    }

    pub fn seed_case(&mut self, seed_case: bool) -> &mut Self {
        self.seed_case = seed_case;
        self
    }

    pub fn exposure_date(&mut self, exposure_date: NaiveDate) -> &mut Self {
        self.exposure_date = Some(exposure_date);
        self
    }

    pub fn incubation_days(&mut self, days: u32) -> &mut Self {
        self.incubation_days = Some(days);
        self
    }

    pub fn asymptomatic(&mut self) -> &mut Self {
        self.symptomatic = Some(false);
        self
    }

    pub fn symptomatic(&mut self, severity: Severity) -> &mut Self {
        self.symptomatic = Some(true);
        self.severity = Some(severity);
        self
    }

    pub fn symptom(&mut self, symptom: Symptom, present: bool) -> &mut Self {
        self.symptoms.set(symptom, present);
        self
    }

    pub fn outcome(&mut self, outcome: Outcome) -> &mut Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn death_date(&mut self, death_date: NaiveDate) -> &mut Self {
        self.death_date = Some(death_date);
        self
    }

    pub fn sequelae(&mut self, has_sequelae: bool) -> &mut Self {
        self.has_sequelae = has_sequelae;
        self
    }

    pub fn care(&mut self, care: CareSeeking) -> &mut Self {
        self.care = Some(care);
        self
    }

    fn missing(&self, field: &str) -> OutbreakError {
        OutbreakError::IncompleteClinicalRecord {
            person_id: self.person_id.to_string(),
            missing: field.to_string(),
        }
    }

    /// # Errors
    ///
    /// Returns `OutbreakError::IncompleteClinicalRecord` naming the first unset field. A
    /// symptomatic record needs a severity, an outcome and a care-seeking record; a death needs
    /// a death date.
    pub fn build(self) -> Result<ClinicalRecord, OutbreakError> {
        let exposure_date = self
            .exposure_date
            .ok_or_else(|| self.missing("exposure_date"))?;
        let incubation_days = self
            .incubation_days
            .ok_or_else(|| self.missing("incubation_days"))?;
        let onset_date = exposure_date
            .checked_add_days(Days::new(u64::from(incubation_days)))
            .ok_or_else(|| self.missing("onset_date"))?;
        let symptomatic = self.symptomatic.ok_or_else(|| self.missing("symptomatic"))?;

        let presentation = if symptomatic {
            let severity = self.severity.ok_or_else(|| self.missing("severity"))?;
            let outcome = self.outcome.ok_or_else(|| self.missing("outcome"))?;
            let care = self.care.ok_or_else(|| self.missing("care_seeking"))?;
            let death_date = match outcome {
                Outcome::Died => Some(self.death_date.ok_or_else(|| self.missing("death_date"))?),
                _ => None,
            };
            Presentation::Symptomatic(SymptomaticCourse {
                severity,
                symptoms: self.symptoms,
                outcome,
                death_date,
                has_sequelae: self.has_sequelae && outcome != Outcome::Died,
                care,
            })
        } else {
            Presentation::Asymptomatic
        };

        Ok(ClinicalRecord {
            person_id: self.person_id,
            seed_case: self.seed_case,
            exposure_date,
            incubation_days,
            onset_date,
            presentation,
        })
    }
}
