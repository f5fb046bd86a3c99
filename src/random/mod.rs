//! Named, independently seeded random number streams.
//!
//! Each generation stage draws from its own stream (`define_rng!(PopulationRng)`,
//! `define_rng!(InfectionRng)`, ...) so that adding a draw to one stage never shifts the numbers
//! another stage sees. A stream's seed is the base seed offset by a hash of the stream's name.
//!
//! Lab orders need one stream per order rather than per stage; [`entity_seed`] derives those
//! seeds from the base seed and the order's identifying parts.
mod macros;
mod sampling_algorithms;

use std::any::{Any, TypeId};
use std::cell::{RefCell, RefMut};

use log::trace;

pub use macros::define_rng;
pub use sampling_algorithms::{sample_single_from_known_length, sample_weighted_without_replacement};

use crate::hashing::{hash_parts, hash_str};
use crate::rand::rngs::SmallRng;
use crate::rand::SeedableRng;
use crate::HashMap;

pub trait RngId: Copy + Clone {
    type RngType: SeedableRng;
    fn get_name() -> &'static str;
}

// This is a wrapper that allows for future support for different types of
// random number generators (anything that implements SeedableRng is valid).
struct RngHolder {
    rng: Box<dyn Any>,
}

/// The set of streams belonging to one generation pass. Streams are created lazily on first
/// use. The map is stored in a `RefCell` so sampling only needs a shared borrow.
pub struct RandomStreams {
    base_seed: u64,
    rng_holders: RefCell<HashMap<TypeId, RngHolder>>,
}

impl RandomStreams {
    pub fn new(base_seed: u64) -> Self {
        trace!("initializing random streams (seed={base_seed})");
        RandomStreams {
            base_seed,
            rng_holders: RefCell::new(HashMap::default()),
        }
    }

    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    /// Gets a mutable reference to the random number generator associated with the given
    /// [`RngId`]. If the Rng has not been used before, one will be created with the base seed.
    fn get_rng<R: RngId + 'static>(&self) -> RefMut<'_, R::RngType> {
        let rng_holders = self.rng_holders.borrow_mut();
        RefMut::map(rng_holders, |holders| {
            holders
                .entry(TypeId::of::<R>())
                // Create a new rng holder if it doesn't exist yet
                .or_insert_with(|| {
                    trace!(
                        "creating new RNG `{}` (seed={})",
                        R::get_name(),
                        self.base_seed
                    );
                    let seed_offset = hash_str(R::get_name());
                    RngHolder {
                        rng: Box::new(R::RngType::seed_from_u64(
                            self.base_seed.wrapping_add(seed_offset),
                        )),
                    }
                })
                .rng
                .downcast_mut::<R::RngType>()
                .expect("rng holder keyed by TypeId holds that RngId's type")
        })
    }

    /// Gets a random sample from the random number generator associated with the given
    /// [`RngId`] by applying the specified sampler function.
    pub fn sample<R: RngId + 'static, T>(
        &self,
        _rng_type: R,
        sampler: impl FnOnce(&mut R::RngType) -> T,
    ) -> T {
        let mut rng = self.get_rng::<R>();
        sampler(&mut rng)
    }
}

/// Derives the seed of a single-use stream from the base seed and the parts that identify the
/// entity (for a lab order: person, test, day and repeat number).
pub fn entity_seed(base_seed: u64, parts: &[&[u8]]) -> u64 {
    let mut all_parts: Vec<&[u8]> = Vec::with_capacity(parts.len() + 1);
    let base = base_seed.to_le_bytes();
    all_parts.push(&base);
    all_parts.extend_from_slice(parts);
    hash_parts(&all_parts)
}

/// A fresh generator for a single-use stream.
pub fn entity_rng(stream_seed: u64) -> SmallRng {
    SmallRng::seed_from_u64(stream_seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rand::RngCore;

    define_rng!(FooRng, pub(super) BarRng);

    #[test]
    fn streams_are_named_after_their_keys() {
        assert_eq!(FooRng::get_name(), "FooRng");
        assert_eq!(BarRng::get_name(), "BarRng");
        assert_eq!(format!("{BarRng:?}"), "BarRng");
    }

    #[test]
    fn get_rng_basic() {
        let streams = RandomStreams::new(42);

        assert_ne!(
            streams.sample(FooRng, RngCore::next_u64),
            streams.sample(FooRng, RngCore::next_u64)
        );
    }

    #[test]
    fn multiple_rng_types() {
        let streams = RandomStreams::new(42);

        assert_ne!(
            streams.sample(FooRng, RngCore::next_u64),
            streams.sample(BarRng, RngCore::next_u64)
        );
    }

    #[test]
    fn same_seed_same_values() {
        let first = RandomStreams::new(42);
        let run_0 = first.sample(FooRng, RngCore::next_u64);
        let run_1 = first.sample(FooRng, RngCore::next_u64);

        let second = RandomStreams::new(42);
        assert_eq!(run_0, second.sample(FooRng, RngCore::next_u64));
        assert_eq!(run_1, second.sample(FooRng, RngCore::next_u64));

        let third = RandomStreams::new(88);
        assert_ne!(run_0, third.sample(FooRng, RngCore::next_u64));
    }

    #[test]
    fn streams_are_independent_of_each_other() {
        // Drawing from BarRng must not shift FooRng's sequence.
        let first = RandomStreams::new(7);
        let expected = first.sample(FooRng, RngCore::next_u64);

        let second = RandomStreams::new(7);
        let _ = second.sample(BarRng, RngCore::next_u64);
        assert_eq!(expected, second.sample(FooRng, RngCore::next_u64));
    }

    #[test]
    fn entity_seeds_depend_on_every_part() {
        let base = entity_seed(1, &[b"P0001".as_slice(), b"LEPTO_MAT".as_slice()]);
        assert_eq!(
            base,
            entity_seed(1, &[b"P0001".as_slice(), b"LEPTO_MAT".as_slice()])
        );
        assert_ne!(
            base,
            entity_seed(2, &[b"P0001".as_slice(), b"LEPTO_MAT".as_slice()])
        );
        assert_ne!(
            base,
            entity_seed(1, &[b"P0002".as_slice(), b"LEPTO_MAT".as_slice()])
        );
    }
}
