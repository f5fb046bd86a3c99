//! Japanese encephalitis. Culex mosquitoes breeding in rice paddies carry the virus from pigs to
//! people, so risk follows pig ownership, distance to the paddies and the pig pen, evening
//! outdoor activity and bed net use. Vaccination is strongly protective.
use rand::rngs::SmallRng;
use rand::Rng;
use rand_distr::{Distribution, Poisson};

use crate::population::{
    Attributes, Demographics, ExposureProfile, Household, Placement, Village,
};
use crate::error::OutbreakError;
use crate::risk::{draw_category, ExposureSynthesis, RiskFactor, RiskModel};

const CHILD_AGE_LIMIT: u8 = 15;
const MAX_PIGS: f64 = 12.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct JapaneseEncephalitis;

/// Vaccination probability for a child in a household with the given campaign reach.
fn child_vaccination_rate(level: Option<&str>) -> f64 {
    match level {
        Some("high") => 0.85,
        Some("medium") => 0.5,
        Some("low") => 0.2,
        _ => 0.0,
    }
}

impl ExposureSynthesis for JapaneseEncephalitis {
    fn household_attributes(
        &self,
        village: &Village,
        rng: &mut SmallRng,
    ) -> Result<Attributes, OutbreakError> {
        let conditions = &village.attributes;
        let mut attributes = Attributes::new();

        let pig_lambda = conditions.number("pig_lambda").unwrap_or(1.0);
        let pigs = match Poisson::new(pig_lambda) {
            Ok(poisson) if pig_lambda > 0.0 => poisson.sample(rng).min(MAX_PIGS),
            _ => 0.0,
        };
        attributes.insert("pigs_owned", pigs);
        if pigs > 0.0 {
            attributes.insert("pig_pen_distance_m", rng.random_range(5.0..50.0_f64).round());
        }

        let net_use_rate = conditions
            .number("net_use_rate")
            .unwrap_or(0.5)
            .clamp(0.0, 1.0);
        attributes.insert("uses_mosquito_nets", rng.random_bool(net_use_rate));

        let near = conditions.number("rice_field_distance_min_m").unwrap_or(80.0);
        let far = conditions
            .number("rice_field_distance_max_m")
            .unwrap_or(200.0)
            .max(near + 1.0);
        attributes.insert("rice_field_distance_m", rng.random_range(near..far).round());

        let coverage = conditions
            .number("je_vacc_coverage")
            .unwrap_or(0.0)
            .clamp(0.0, 1.0);
        attributes.insert(
            "JE_vaccination_children",
            draw_category(
                rng,
                &[
                    ("none", 1.0 - coverage),
                    ("low", 0.4 * coverage),
                    ("medium", 0.35 * coverage),
                    ("high", 0.25 * coverage),
                ],
            )?,
        );
        Ok(attributes)
    }

    fn individual_exposure(
        &self,
        village: &Village,
        household: &Household,
        demographics: &Demographics,
        rng: &mut SmallRng,
    ) -> ExposureProfile {
        let is_child = demographics.age < CHILD_AGE_LIMIT;
        let vaccinated = if is_child {
            rng.random_bool(child_vaccination_rate(
                household.attributes.text("JE_vaccination_children"),
            ))
        } else {
            let coverage = village
                .attributes
                .number("je_vacc_coverage")
                .unwrap_or(0.0)
                .clamp(0.0, 1.0);
            rng.random_bool(coverage * 0.5)
        };

        let outdoor_rate = if is_child {
            0.7
        } else if demographics.occupation.as_deref() == Some("farmer") {
            0.8
        } else {
            0.4
        };
        let mut attributes = Attributes::new();
        attributes.insert("evening_outdoor_exposure", rng.random_bool(outdoor_rate));

        ExposureProfile {
            vaccinated: Some(vaccinated),
            protective_equipment: household.attributes.flag("uses_mosquito_nets"),
            distance_to_risk_site_m: household.attributes.number("rice_field_distance_m"),
            attributes,
        }
    }
}

impl RiskModel for JapaneseEncephalitis {
    fn scenario_type(&self) -> &'static str {
        "je"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["japanese_encephalitis", "aes"]
    }

    fn risk_factors(&self, placement: &Placement) -> Vec<RiskFactor> {
        let household = &placement.household.attributes;
        let exposure = &placement.individual.exposure;
        let mut factors = vec![RiskFactor::new(
            "vector_density",
            placement
                .village
                .attributes
                .number("vector_density")
                .unwrap_or(1.0),
        )];

        if household.number("pigs_owned").unwrap_or(0.0) >= 3.0 {
            factors.push(RiskFactor::new("pigs_owned", 2.0));
        }
        if household
            .number("pig_pen_distance_m")
            .is_some_and(|distance| distance < 20.0)
        {
            factors.push(RiskFactor::new("pig_pen_nearby", 1.5));
        }
        if household.flag("uses_mosquito_nets") == Some(false) {
            factors.push(RiskFactor::new("no_mosquito_nets", 1.5));
        }
        if household
            .number("rice_field_distance_m")
            .is_some_and(|distance| distance < 100.0)
        {
            factors.push(RiskFactor::new("rice_field_nearby", 1.4));
        }
        if exposure.flag("evening_outdoor_exposure") == Some(true) {
            factors.push(RiskFactor::new("evening_outdoor_exposure", 1.3));
        }
        if exposure.vaccinated == Some(true) {
            factors.push(RiskFactor::new("vaccinated", 0.15));
        }
        factors
    }
}
