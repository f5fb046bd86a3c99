use std::collections::BTreeMap;

use log::warn;

use crate::error::{GenerationWarning, OutbreakError};
use crate::risk::{JapaneseEncephalitis, Leptospirosis, RiskModel};

/// Risk models keyed by scenario type and alias. Lookups are case-insensitive.
pub struct ScenarioRegistry {
    models: Vec<Box<dyn RiskModel>>,
    by_name: BTreeMap<String, usize>,
    default_type: String,
}

impl Default for ScenarioRegistry {
    /// Leptospirosis (the default) and Japanese encephalitis.
    fn default() -> Self {
        let mut registry = ScenarioRegistry::new("lepto");
        registry.register(Box::new(Leptospirosis));
        registry.register(Box::new(JapaneseEncephalitis));
        registry
    }
}

impl ScenarioRegistry {
    /// An empty registry that falls back to `default_type` for unknown scenario types.
    pub fn new(default_type: &str) -> Self {
        ScenarioRegistry {
            models: Vec::new(),
            by_name: BTreeMap::new(),
            default_type: default_type.to_ascii_lowercase(),
        }
    }

    /// Registers `model` under its scenario type and aliases. A model already registered under
    /// the same scenario type is replaced in place, and its aliases are dropped.
    pub fn register(&mut self, model: Box<dyn RiskModel>) {
        let scenario_type = model.scenario_type().to_ascii_lowercase();
        let aliases = model.aliases();
        let existing = self
            .models
            .iter()
            .position(|registered| registered.scenario_type().eq_ignore_ascii_case(&scenario_type));
        let position = match existing {
            Some(position) => {
                self.by_name.retain(|_, registered| *registered != position);
                self.models[position] = model;
                position
            }
            None => {
                self.models.push(model);
                self.models.len() - 1
            }
        };
        self.by_name.insert(scenario_type, position);
        for alias in aliases {
            self.by_name.insert(alias.to_ascii_lowercase(), position);
        }
    }

    pub fn get(&self, scenario_type: &str) -> Option<&dyn RiskModel> {
        self.by_name
            .get(&scenario_type.trim().to_ascii_lowercase())
            .map(|&position| self.models[position].as_ref())
    }

    /// Looks `scenario_type` up, falling back to the default model with a warning when it is
    /// unknown.
    ///
    /// # Errors
    ///
    /// Returns `OutbreakError::Configuration` if neither `scenario_type` nor the default type is
    /// registered.
    pub fn resolve(
        &self,
        scenario_type: &str,
    ) -> Result<(&dyn RiskModel, Option<GenerationWarning>), OutbreakError> {
        if let Some(model) = self.get(scenario_type) {
            return Ok((model, None));
        }
        let fallback = self.get(&self.default_type).ok_or_else(|| {
            OutbreakError::Configuration(format!(
                "unknown scenario_type `{scenario_type}` and no default risk model `{}`",
                self.default_type
            ))
        })?;
        let warning = GenerationWarning::UnknownScenarioType {
            requested: scenario_type.to_string(),
            fallback: fallback.scenario_type().to_string(),
        };
        warn!("{warning}");
        Ok((fallback, Some(warning)))
    }

    /// Canonical scenario types in registration order.
    pub fn scenario_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.models.iter().map(|model| model.scenario_type())
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;

    use super::*;
    use crate::population::{
        Attributes, Demographics, ExposureProfile, Household, Placement, Village,
    };
    use crate::risk::{ExposureSynthesis, RiskFactor};

    #[test]
    fn aliases_resolve_to_the_same_model() {
        let registry = ScenarioRegistry::default();
        assert_eq!(registry.get("LEPTO").unwrap().scenario_type(), "lepto");
        assert_eq!(
            registry.get("leptospirosis").unwrap().scenario_type(),
            "lepto"
        );
        assert_eq!(registry.get("AES").unwrap().scenario_type(), "je");
        assert!(registry.get("cholera").is_none());
        assert_eq!(registry.scenario_types().collect::<Vec<_>>(), ["lepto", "je"]);
    }

    #[test]
    fn unknown_types_fall_back_with_a_warning() {
        let registry = ScenarioRegistry::default();
        let (model, warning) = registry.resolve("cholera").unwrap();
        assert_eq!(model.scenario_type(), "lepto");
        assert_eq!(
            warning,
            Some(GenerationWarning::UnknownScenarioType {
                requested: "cholera".to_string(),
                fallback: "lepto".to_string(),
            })
        );

        let (model, warning) = registry.resolve("je").unwrap();
        assert_eq!(model.scenario_type(), "je");
        assert!(warning.is_none());
    }

    struct FloodOnly;

    impl ExposureSynthesis for FloodOnly {
        fn household_attributes(
            &self,
            _village: &Village,
            _rng: &mut SmallRng,
        ) -> Result<Attributes, OutbreakError> {
            Ok(Attributes::new())
        }

        fn individual_exposure(
            &self,
            _village: &Village,
            _household: &Household,
            _demographics: &Demographics,
            _rng: &mut SmallRng,
        ) -> ExposureProfile {
            ExposureProfile::default()
        }
    }

    impl RiskModel for FloodOnly {
        fn scenario_type(&self) -> &'static str {
            "LEPTO"
        }

        fn risk_factors(&self, _placement: &Placement) -> Vec<RiskFactor> {
            vec![RiskFactor::new("flood", 2.0)]
        }
    }

    #[test]
    fn registering_a_type_again_replaces_the_model() {
        let mut registry = ScenarioRegistry::default();
        registry.register(Box::new(FloodOnly));
        registry.register(Box::new(FloodOnly));

        assert_eq!(registry.scenario_types().collect::<Vec<_>>(), ["LEPTO", "je"]);
        assert_eq!(registry.get("lepto").unwrap().scenario_type(), "LEPTO");
        // The replaced model's alias went with it.
        assert!(registry.get("leptospirosis").is_none());
        assert_eq!(registry.get("aes").unwrap().scenario_type(), "je");
    }

    #[test]
    fn empty_registry_cannot_resolve() {
        let registry = ScenarioRegistry::new("lepto");
        assert!(matches!(
            registry.resolve("lepto"),
            Err(OutbreakError::Configuration(_))
        ));
    }
}
