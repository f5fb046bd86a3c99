//! Post-flood leptospirosis. Exposure comes from wading and cleanup work in floodwater
//! contaminated by rat urine, so risk follows flood depth, cleanup participation, rat
//! sightings, sanitation and water source, and is highest for working-age men.
use rand::rngs::SmallRng;
use rand::Rng;
use rand_distr::{Distribution, Poisson};

use crate::population::{
    AttributeValue, Attributes, Demographics, ExposureProfile, Household, Placement, Sex, Village,
};
use crate::error::OutbreakError;
use crate::risk::{draw_category, is_control_village, ExposureSynthesis, RiskFactor, RiskModel};

/// Villages with less standing water than this saw no meaningful flooding.
const MIN_FLOOD_DEPTH_M: f64 = 0.3;

const PIG_LAMBDA: f64 = 1.1;
const MAX_PIGS: f64 = 8.0;
const CHICKEN_LAMBDA: f64 = 3.0;
const MAX_CHICKENS: f64 = 12.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct Leptospirosis;

fn flood_depth_category(rng: &mut SmallRng, depth_m: f64) -> Result<&'static str, OutbreakError> {
    if depth_m >= 1.5 {
        draw_category(rng, &[("deep", 0.7), ("moderate", 0.3)])
    } else if depth_m >= 0.8 {
        draw_category(rng, &[("moderate", 0.6), ("shallow", 0.4)])
    } else if depth_m >= MIN_FLOOD_DEPTH_M {
        draw_category(rng, &[("shallow", 0.7), ("minimal", 0.3)])
    } else {
        draw_category(rng, &[("minimal", 0.8), ("shallow", 0.2)])
    }
}

/// Village cleanup intensity is either a share or a label.
fn cleanup_intensity(value: Option<&AttributeValue>) -> f64 {
    match value {
        Some(AttributeValue::Number(intensity)) => *intensity,
        Some(AttributeValue::Text(label)) => match label.to_ascii_lowercase().as_str() {
            "very_high" => 0.85,
            "high" => 0.75,
            "medium" => 0.6,
            "low" => 0.35,
            "minimal" => 0.15,
            _ => 0.5,
        },
        _ => 0.5,
    }
}

fn cleanup_participation(rng: &mut SmallRng, intensity: f64) -> Result<&'static str, OutbreakError> {
    if intensity >= 0.75 {
        draw_category(
            rng,
            &[
                ("heavy", 0.5),
                ("moderate", 0.3),
                ("light", 0.15),
                ("none", 0.05),
            ],
        )
    } else if intensity >= 0.45 {
        draw_category(
            rng,
            &[
                ("heavy", 0.3),
                ("moderate", 0.4),
                ("light", 0.2),
                ("none", 0.1),
            ],
        )
    } else {
        draw_category(rng, &[("moderate", 0.3), ("light", 0.5), ("none", 0.2)])
    }
}

fn sanitation_type(rng: &mut SmallRng, coverage: f64) -> Result<&'static str, OutbreakError> {
    let weights = if coverage >= 0.8 {
        [0.7, 0.25, 0.05]
    } else if coverage >= 0.6 {
        [0.5, 0.35, 0.15]
    } else {
        [0.3, 0.45, 0.25]
    };
    draw_category(
        rng,
        &[
            ("flush_toilet", weights[0]),
            ("pit_latrine", weights[1]),
            ("none", weights[2]),
        ],
    )
}

fn water_source(rng: &mut SmallRng, quality: &str) -> Result<&'static str, OutbreakError> {
    match quality {
        "good" => draw_category(rng, &[("municipal", 0.6), ("spring", 0.25), ("well", 0.15)]),
        "fair" => draw_category(
            rng,
            &[("well", 0.45), ("municipal", 0.25), ("irrigation_canal", 0.3)],
        ),
        _ => draw_category(
            rng,
            &[("river", 0.5), ("irrigation_canal", 0.35), ("well", 0.15)],
        ),
    }
}

fn rat_sightings(rng: &mut SmallRng, rat_population: &str) -> Result<&'static str, OutbreakError> {
    match rat_population {
        "very_high" | "high" => draw_category(
            rng,
            &[
                ("very_many", 0.45),
                ("many", 0.3),
                ("some", 0.2),
                ("few", 0.05),
            ],
        ),
        "medium" => draw_category(
            rng,
            &[("many", 0.3), ("some", 0.35), ("few", 0.25), ("rare", 0.1)],
        ),
        _ => draw_category(
            rng,
            &[("some", 0.3), ("few", 0.35), ("rare", 0.25), ("none", 0.1)],
        ),
    }
}

fn distance_to_river_m(rng: &mut SmallRng, flood_risk: &str) -> f64 {
    match flood_risk {
        "very_high" | "high" => rng.random_range(10.0..200.0),
        "medium" => rng.random_range(80.0..400.0),
        _ => rng.random_range(250.0..800.0),
    }
}

fn capped_poisson(rng: &mut SmallRng, lambda: f64, cap: f64) -> f64 {
    match Poisson::new(lambda) {
        Ok(poisson) => poisson.sample(rng).min(cap),
        Err(_) => 0.0,
    }
}

fn lowercase_text(attributes: &Attributes, name: &str, default: &str) -> String {
    attributes
        .text(name)
        .unwrap_or(default)
        .to_ascii_lowercase()
}

impl ExposureSynthesis for Leptospirosis {
    fn household_attributes(
        &self,
        village: &Village,
        rng: &mut SmallRng,
    ) -> Result<Attributes, OutbreakError> {
        let conditions = &village.attributes;
        let mut attributes = Attributes::new();
        attributes.insert(
            "flood_depth_category",
            flood_depth_category(rng, conditions.number("flood_depth_m").unwrap_or(0.3))?,
        );
        attributes.insert(
            "cleanup_participation",
            cleanup_participation(rng, cleanup_intensity(conditions.get("cleanup_intensity")))?,
        );
        attributes.insert(
            "sanitation_type",
            sanitation_type(rng, conditions.number("sanitation_coverage").unwrap_or(0.6))?,
        );
        attributes.insert(
            "water_source",
            water_source(
                rng,
                &lowercase_text(conditions, "water_source_quality", "fair"),
            )?,
        );
        attributes.insert(
            "rat_sightings_post_flood",
            rat_sightings(rng, &lowercase_text(conditions, "rat_population", "medium"))?,
        );
        attributes.insert(
            "distance_to_river_m",
            distance_to_river_m(rng, &lowercase_text(conditions, "flood_risk", "medium")).round(),
        );
        attributes.insert(
            "pig_ownership",
            capped_poisson(rng, PIG_LAMBDA, MAX_PIGS),
        );
        attributes.insert(
            "chicken_ownership",
            capped_poisson(rng, CHICKEN_LAMBDA, MAX_CHICKENS),
        );
        Ok(attributes)
    }

    fn individual_exposure(
        &self,
        _village: &Village,
        household: &Household,
        demographics: &Demographics,
        rng: &mut SmallRng,
    ) -> ExposureProfile {
        let conditions = &household.attributes;
        let participation = conditions.text("cleanup_participation").unwrap_or("none");
        let cleanup_rate = match participation {
            "heavy" => 0.7,
            "moderate" => 0.5,
            "light" => 0.3,
            "none" => 0.05,
            _ => 0.2,
        };
        let cleanup_work = if demographics.age >= 12 {
            rng.random_bool(cleanup_rate)
        } else {
            rng.random_bool(0.1)
        };
        let barefoot_rate = if matches!(participation, "heavy" | "moderate") {
            0.6
        } else {
            0.3
        };
        let barefoot = cleanup_work && rng.random_bool(barefoot_rate);
        let skin_wounds = barefoot && rng.random_bool(0.45);
        let owns_animals = conditions.number("pig_ownership").unwrap_or(0.0)
            + conditions.number("chicken_ownership").unwrap_or(0.0)
            > 0.0;
        let animal_contact = owns_animals && rng.random_bool(0.45);
        let many_rats = matches!(
            conditions.text("rat_sightings_post_flood"),
            Some("very_many" | "many")
        );
        let rat_contact = rng.random_bool(if many_rats { 0.55 } else { 0.25 });
        let protective_equipment = cleanup_work && rng.random_bool(0.25);

        let mut attributes = Attributes::new();
        attributes.insert("exposure_cleanup_work", cleanup_work);
        attributes.insert("exposure_barefoot_water", barefoot);
        attributes.insert("exposure_skin_wounds", skin_wounds);
        attributes.insert("exposure_animal_contact", animal_contact);
        attributes.insert("exposure_rat_contact", rat_contact);
        ExposureProfile {
            vaccinated: None,
            protective_equipment: Some(protective_equipment),
            distance_to_risk_site_m: conditions.number("distance_to_river_m"),
            attributes,
        }
    }
}

fn lookup(table: &[(&str, f64)], key: Option<&str>, default: f64) -> f64 {
    key.and_then(|key| {
        table
            .iter()
            .find(|(candidate, _)| *candidate == key)
            .map(|(_, multiplier)| *multiplier)
    })
    .unwrap_or(default)
}

impl RiskModel for Leptospirosis {
    fn scenario_type(&self) -> &'static str {
        "lepto"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["leptospirosis"]
    }

    fn is_eligible(&self, placement: &Placement) -> bool {
        let flooded = placement
            .village
            .attributes
            .number("flood_depth_m")
            .is_none_or(|depth| depth >= MIN_FLOOD_DEPTH_M);
        flooded && !is_control_village(placement.village)
    }

    fn risk_factors(&self, placement: &Placement) -> Vec<RiskFactor> {
        let household = &placement.household.attributes;
        let exposure = &placement.individual.exposure;
        let demographics = &placement.individual.demographics;
        let mut factors = Vec::new();

        if let Some(depth) = placement.village.attributes.number("flood_depth_m") {
            factors.push(RiskFactor::new("village_flood_depth", depth.max(0.1)));
        }
        factors.push(RiskFactor::new(
            "flood_depth_category",
            lookup(
                &[
                    ("deep", 1.5),
                    ("moderate", 1.0),
                    ("shallow", 0.5),
                    ("minimal", 0.1),
                ],
                household.text("flood_depth_category"),
                0.5,
            ),
        ));
        factors.push(RiskFactor::new(
            "cleanup_participation",
            lookup(
                &[
                    ("heavy", 1.5),
                    ("moderate", 1.0),
                    ("light", 0.6),
                    ("none", 0.3),
                ],
                household.text("cleanup_participation"),
                0.5,
            ),
        ));
        factors.push(RiskFactor::new(
            "rat_sightings",
            lookup(
                &[
                    ("very_many", 1.8),
                    ("many", 1.4),
                    ("some", 1.0),
                    ("few", 0.6),
                    ("rare", 0.3),
                    ("none", 0.1),
                ],
                household.text("rat_sightings_post_flood"),
                0.5,
            ),
        ));
        factors.push(RiskFactor::new(
            "sanitation",
            lookup(
                &[("none", 1.5), ("pit_latrine", 1.0), ("flush_toilet", 0.5)],
                household.text("sanitation_type"),
                0.5,
            ),
        ));
        factors.push(RiskFactor::new(
            "water_source",
            lookup(
                &[
                    ("river", 1.6),
                    ("irrigation_canal", 1.4),
                    ("well", 1.0),
                    ("municipal", 0.6),
                    ("spring", 0.4),
                ],
                household.text("water_source"),
                0.5,
            ),
        ));

        let working_age = (18..=60).contains(&demographics.age);
        match (demographics.sex, working_age) {
            (Sex::Male, true) => factors.push(RiskFactor::new("male_working_age", 1.8)),
            (Sex::Male, false) => factors.push(RiskFactor::new("male", 1.2)),
            (Sex::Female, true) => factors.push(RiskFactor::new("female_working_age", 0.8)),
            (Sex::Female, false) => {}
        }

        for (attribute, name, multiplier) in [
            ("exposure_cleanup_work", "cleanup_work", 1.6),
            ("exposure_barefoot_water", "barefoot_water", 1.4),
            ("exposure_skin_wounds", "skin_wounds", 1.3),
            ("exposure_rat_contact", "rat_contact", 1.2),
        ] {
            if exposure.attributes.flag(attribute).unwrap_or(false) {
                factors.push(RiskFactor::new(name, multiplier));
            }
        }
        if exposure.protective_equipment == Some(true) {
            factors.push(RiskFactor::new("protective_equipment", 0.6));
        }
        factors
    }
}
