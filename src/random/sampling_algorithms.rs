//! Sampling algorithms used by population generation and infection assignment. These are
//! written to be generic over the rng and container type.

use std::cmp::Ordering;

use crate::rand::Rng;

/// Sample a random element uniformly from a container of known length.
///
/// We do not assume the container is randomly indexable, only that it can be iterated over.
pub fn sample_single_from_known_length<I, R, T>(rng: &mut R, mut iter: I) -> Option<T>
where
    R: Rng,
    I: Iterator<Item = T> + ExactSizeIterator<Item = T>,
{
    let len = iter.len();
    if len == 0 {
        return None;
    }
    // This little trick with `u32` makes this function 30% faster.
    let index = rng.random_range(0..len as u32) as usize;
    // The set need not be randomly indexable, so we have to use the `nth` method.
    iter.nth(index)
}

/// Sample `requested` distinct indexes into `weights` without replacement, where the chance of
/// an index being drawn at each step is proportional to its weight among the indexes not yet
/// drawn.
///
/// This implements the "A-ES" algorithm of Efraimidis and Spirakis, Weighted random sampling
/// with a reservoir <https://doi.org/10.1016/j.ipl.2005.11.003>: every item gets the key
/// `ln(u) / w` for a uniform `u`, and the items with the largest keys are the sample. Working
/// with the logarithm avoids the underflow of `u^(1/w)` for small weights.
///
/// Indexes with a weight that is not strictly positive (or not finite) are never drawn, so the
/// result may be shorter than `requested`. Exactly one uniform is drawn per item, in index
/// order, so the result is a deterministic function of the rng state. The returned indexes are
/// sorted ascending.
pub fn sample_weighted_without_replacement<R: Rng>(
    rng: &mut R,
    weights: &[f64],
    requested: usize,
) -> Vec<usize> {
    let mut keyed: Vec<(f64, usize)> = Vec::with_capacity(weights.len());
    for (index, &weight) in weights.iter().enumerate() {
        // Drawn even for unusable weights so the stream position depends only on the length.
        let uniform: f64 = rng.random_range(f64::MIN_POSITIVE..1.0);
        if weight > 0.0 && weight.is_finite() {
            keyed.push((uniform.ln() / weight, index));
        }
    }

    let take = requested.min(keyed.len());
    if take == 0 {
        return Vec::new();
    }
    // Largest keys first, ties broken by the lower index.
    let by_key = |a: &(f64, usize), b: &(f64, usize)| -> Ordering {
        b.0.total_cmp(&a.0).then(a.1.cmp(&b.1))
    };
    if take < keyed.len() {
        keyed.select_nth_unstable_by(take - 1, by_key);
        keyed.truncate(take);
    }

    let mut selected: Vec<usize> = keyed.into_iter().map(|(_, index)| index).collect();
    selected.sort_unstable();
    selected
}
