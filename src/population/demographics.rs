//! Empirical samplers for household size and member demographics. Both are built from the seed
//! records so generated villages keep the seed sample's shape; when the seeds are empty a
//! built-in rural distribution is used instead.
use std::collections::BTreeMap;

use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::rngs::SmallRng;
use rand::Rng;

use crate::population::{Demographics, Household, HouseholdId, Individual, Sex, VillageId};
use crate::random::sample_single_from_known_length;
use crate::HashMap;

/// A village needs at least this many seeded individuals before its own pool is used instead of
/// the pooled seed sample.
const MIN_VILLAGE_POOL: usize = 10;

const FALLBACK_HOUSEHOLD_SIZES: [u32; 5] = [3, 4, 5, 6, 7];
const FALLBACK_HOUSEHOLD_WEIGHTS: [f64; 5] = [0.15, 0.25, 0.25, 0.2, 0.15];

const ADULT_OCCUPATIONS: [&str; 8] = [
    "farmer",
    "construction",
    "day_laborer",
    "vendor",
    "fisher",
    "teacher",
    "healthcare",
    "other",
];
const ADULT_OCCUPATION_WEIGHTS: [f64; 8] = [0.35, 0.15, 0.15, 0.1, 0.1, 0.05, 0.04, 0.06];

/// Draws household sizes from the empirical distribution of seeded households.
#[derive(Debug, Clone)]
pub struct HouseholdSizeSampler {
    sizes: Vec<u32>,
    index: WeightedIndex<f64>,
}

impl HouseholdSizeSampler {
    /// A seeded household contributes its `household_size` attribute when present, otherwise the
    /// number of seeded members it has. Households with neither are skipped.
    pub fn from_seed(households: &[Household], individuals: &[Individual]) -> Self {
        let mut members: HashMap<&HouseholdId, u32> = HashMap::default();
        for individual in individuals {
            *members.entry(&individual.household_id).or_default() += 1;
        }

        let mut counts: BTreeMap<u32, f64> = BTreeMap::new();
        for household in households {
            let size = household
                .attributes
                .number("household_size")
                .filter(|size| *size >= 1.0)
                .map(|size| size.round() as u32)
                .or_else(|| members.get(&household.id).copied());
            if let Some(size) = size {
                *counts.entry(size).or_default() += 1.0;
            }
        }

        let (sizes, weights): (Vec<u32>, Vec<f64>) = counts.into_iter().unzip();
        match WeightedIndex::new(&weights) {
            Ok(index) => HouseholdSizeSampler { sizes, index },
            Err(_) => HouseholdSizeSampler::fallback(),
        }
    }

    pub fn fallback() -> Self {
        HouseholdSizeSampler {
            sizes: FALLBACK_HOUSEHOLD_SIZES.to_vec(),
            index: WeightedIndex::new(FALLBACK_HOUSEHOLD_WEIGHTS)
                .expect("fallback household weights are positive"),
        }
    }

    pub fn sample(&self, rng: &mut SmallRng) -> u32 {
        self.sizes[self.index.sample(rng)]
    }
}

/// Resamples whole (age, sex, occupation) tuples from the seeded individuals, so the joint
/// distribution (not just the marginals) carries over to generated people.
#[derive(Debug, Clone, Default)]
pub struct DemographicSampler {
    by_village: BTreeMap<VillageId, Vec<Demographics>>,
    pooled: Vec<Demographics>,
}

impl DemographicSampler {
    pub fn from_seed(individuals: &[Individual]) -> Self {
        let mut sampler = DemographicSampler::default();
        for individual in individuals {
            sampler
                .by_village
                .entry(individual.village_id.clone())
                .or_default()
                .push(individual.demographics.clone());
            sampler.pooled.push(individual.demographics.clone());
        }
        sampler
    }

    pub fn sample(&self, village_id: &VillageId, rng: &mut SmallRng) -> Demographics {
        let pool = match self.by_village.get(village_id) {
            Some(pool) if pool.len() >= MIN_VILLAGE_POOL => pool,
            _ => &self.pooled,
        };
        match sample_single_from_known_length(rng, pool.iter()) {
            Some(demographics) => demographics.clone(),
            None => fallback_demographics(rng),
        }
    }
}

/// A rural age pyramid: a quarter children, most working age, some elderly.
pub fn fallback_demographics(rng: &mut SmallRng) -> Demographics {
    let bucket: f64 = rng.random();
    let age: u8 = if bucket < 0.25 {
        rng.random_range(1..15)
    } else if bucket < 0.85 {
        rng.random_range(15..61)
    } else {
        rng.random_range(61..85)
    };
    let sex = if rng.random_bool(0.5) {
        Sex::Male
    } else {
        Sex::Female
    };
    Demographics {
        age,
        sex,
        occupation: Some(fallback_occupation(age, rng).to_string()),
    }
}

fn fallback_occupation(age: u8, rng: &mut SmallRng) -> &'static str {
    if age < 6 {
        return "child";
    }
    if age < 18 {
        return "student";
    }
    let index = WeightedIndex::new(ADULT_OCCUPATION_WEIGHTS)
        .expect("occupation weights are positive");
    ADULT_OCCUPATIONS[index.sample(rng)]
}
