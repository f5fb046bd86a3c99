//! Per-individual exposure risk.
//!
//! Each disease is a [`RiskModel`] registered in a [`ScenarioRegistry`] under its scenario type.
//! A model does two jobs: during population generation it synthesizes household and individual
//! exposure attributes from village conditions ([`ExposureSynthesis`]), and afterwards it turns
//! those attributes into named multiplicative factors. The composite score is the product of the
//! factors (plus the epicenter multiplier), floored at the configured epsilon for everyone the
//! model considers eligible.
mod japanese_encephalitis;
mod leptospirosis;
mod registry;

use rand::rngs::SmallRng;
use rand::seq::IndexedRandom;
use serde::Serialize;

pub use japanese_encephalitis::JapaneseEncephalitis;
pub use leptospirosis::Leptospirosis;
pub use registry::ScenarioRegistry;

use crate::config::ScenarioConfig;
use crate::error::OutbreakError;
use crate::population::{
    Attributes, Demographics, ExposureProfile, Household, PersonId, Placement, PopulationSnapshot,
    Village,
};

pub const EPICENTER_FACTOR: &str = "epicenter";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskFactor {
    pub name: &'static str,
    pub multiplier: f64,
}

impl RiskFactor {
    pub fn new(name: &'static str, multiplier: f64) -> Self {
        RiskFactor { name, multiplier }
    }
}

/// Synthesizes the exposure attributes a disease's risk factors read.
pub trait ExposureSynthesis {
    /// # Errors
    ///
    /// Returns `OutbreakError::WeightError` if a category table has no usable weight.
    fn household_attributes(
        &self,
        village: &Village,
        rng: &mut SmallRng,
    ) -> Result<Attributes, OutbreakError>;

    fn individual_exposure(
        &self,
        village: &Village,
        household: &Household,
        demographics: &Demographics,
        rng: &mut SmallRng,
    ) -> ExposureProfile;
}

pub trait RiskModel: ExposureSynthesis {
    /// The `scenario_type` this model is registered under.
    fn scenario_type(&self) -> &'static str;

    /// Other names the model answers to.
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    /// Ineligible individuals are never sampled for infection. By default only villages flagged
    /// `control` are excluded.
    fn is_eligible(&self, placement: &Placement) -> bool {
        !is_control_village(placement.village)
    }

    /// The disease-specific factors for an eligible individual. The epicenter factor is added by
    /// the caller.
    fn risk_factors(&self, placement: &Placement) -> Vec<RiskFactor>;
}

pub(crate) fn is_control_village(village: &Village) -> bool {
    village.attributes.flag("control").unwrap_or(false)
}

/// Picks one of `options` with probability proportional to its weight.
pub(crate) fn draw_category(
    rng: &mut SmallRng,
    options: &[(&'static str, f64)],
) -> Result<&'static str, OutbreakError> {
    let (category, _) = options.choose_weighted(rng, |(_, weight)| *weight)?;
    Ok(*category)
}

/// Every factor that applies to `placement`, or `None` if the individual is ineligible.
pub fn factor_breakdown(
    model: &dyn RiskModel,
    placement: &Placement,
    config: &ScenarioConfig,
) -> Option<Vec<RiskFactor>> {
    if !model.is_eligible(placement) {
        return None;
    }
    let mut factors = model.risk_factors(placement);
    if config
        .epicenter_village_ids
        .contains(&placement.village.id)
    {
        factors.push(RiskFactor::new(
            EPICENTER_FACTOR,
            config.epicenter_risk_multiplier,
        ));
    }
    Some(factors)
}

/// The product of `factors`, never below `epsilon`.
pub fn composite_score(factors: &[RiskFactor], epsilon: f64) -> f64 {
    let product: f64 = factors.iter().map(|factor| factor.multiplier).product();
    if product.is_finite() {
        product.max(epsilon)
    } else {
        epsilon
    }
}

/// Scores aligned with [`PopulationSnapshot::individuals`]; `None` marks an ineligible
/// individual.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskScores(Vec<Option<f64>>);

impl RiskScores {
    pub fn get(&self, position: usize) -> Option<f64> {
        self.0.get(position).copied().flatten()
    }

    pub fn eligible_count(&self) -> usize {
        self.0.iter().filter(|score| score.is_some()).count()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<f64>> + '_ {
        self.0.iter().copied()
    }
}

pub fn score_population(
    population: &PopulationSnapshot,
    model: &dyn RiskModel,
    config: &ScenarioConfig,
) -> RiskScores {
    RiskScores(
        population
            .placements()
            .map(|placement| {
                factor_breakdown(model, &placement, config)
                    .map(|factors| composite_score(&factors, config.risk_epsilon))
            })
            .collect(),
    )
}

/// A debrief view of one individual's score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskBreakdown {
    pub person_id: PersonId,
    pub eligible: bool,
    pub factors: Vec<RiskFactor>,
    pub score: Option<f64>,
}

/// # Errors
///
/// Returns `OutbreakError::UnknownPerson` if `person_id` is not in the population.
pub fn explain(
    population: &PopulationSnapshot,
    model: &dyn RiskModel,
    config: &ScenarioConfig,
    person_id: &PersonId,
) -> Result<RiskBreakdown, OutbreakError> {
    let position = population
        .index_of(person_id)
        .ok_or_else(|| OutbreakError::UnknownPerson(person_id.to_string()))?;
    let placement = population.placement(position);
    Ok(match factor_breakdown(model, &placement, config) {
        Some(factors) => RiskBreakdown {
            person_id: person_id.clone(),
            eligible: true,
            score: Some(composite_score(&factors, config.risk_epsilon)),
            factors,
        },
        None => RiskBreakdown {
            person_id: person_id.clone(),
            eligible: false,
            factors: Vec::new(),
            score: None,
        },
    })
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::test_support::lepto_outbreak;

    #[test]
    fn composite_is_the_floored_product() {
        let factors = [RiskFactor::new("a", 2.0), RiskFactor::new("b", 0.25)];
        assert_eq!(composite_score(&factors, 1e-6), 0.5);
        assert_eq!(composite_score(&[RiskFactor::new("zero", 0.0)], 1e-6), 1e-6);
        assert_eq!(composite_score(&[RiskFactor::new("nan", f64::NAN)], 1e-6), 1e-6);
        assert_eq!(composite_score(&[], 1e-6), 1.0);
    }

    #[test]
    fn draw_category_respects_zero_weights() {
        let mut rng = SmallRng::seed_from_u64(5);
        for _ in 0..200 {
            let category = draw_category(&mut rng, &[("never", 0.0), ("always", 1.0)]).unwrap();
            assert_eq!(category, "always");
        }
    }

    #[test]
    fn draw_category_rejects_unusable_weights() {
        let mut rng = SmallRng::seed_from_u64(5);
        assert!(matches!(
            draw_category(&mut rng, &[("a", 0.0), ("b", 0.0)]),
            Err(OutbreakError::WeightError(_))
        ));
        assert!(matches!(
            draw_category(&mut rng, &[]),
            Err(OutbreakError::WeightError(_))
        ));
    }

    #[test]
    fn eligible_scores_are_positive() {
        let outbreak = lepto_outbreak(42);
        let registry = ScenarioRegistry::default();
        let model = registry.get("lepto").unwrap();
        let config = crate::test_support::lepto_config();
        let scores = score_population(&outbreak.population, model, &config);

        assert_eq!(scores.len(), outbreak.population.len());
        for (placement, score) in outbreak.population.placements().zip(scores.iter()) {
            match score {
                Some(score) => assert!(score >= config.risk_epsilon),
                // Only the flood-free control village is excluded.
                None => assert_eq!(placement.village.id.as_str(), "V4"),
            }
        }
    }

    #[test]
    fn explain_lists_the_epicenter_factor() {
        let outbreak = lepto_outbreak(42);
        let registry = ScenarioRegistry::default();
        let model = registry.get("lepto").unwrap();
        let config = crate::test_support::lepto_config();

        let in_epicenter = outbreak
            .population
            .individuals_in_village(&"V1".into())
            .next()
            .unwrap();
        let breakdown = explain(&outbreak.population, model, &config, &in_epicenter.id).unwrap();
        assert!(breakdown.eligible);
        assert!(breakdown
            .factors
            .iter()
            .any(|factor| factor.name == EPICENTER_FACTOR));
        let product: f64 = breakdown.factors.iter().map(|f| f.multiplier).product();
        assert_eq!(breakdown.score, Some(product.max(config.risk_epsilon)));

        let control = outbreak
            .population
            .individuals_in_village(&"V4".into())
            .next()
            .unwrap();
        let breakdown = explain(&outbreak.population, model, &config, &control.id).unwrap();
        assert!(!breakdown.eligible);
        assert_eq!(breakdown.score, None);

        assert!(matches!(
            explain(&outbreak.population, model, &config, &"nobody".into()),
            Err(OutbreakError::UnknownPerson(_))
        ));
    }
}
