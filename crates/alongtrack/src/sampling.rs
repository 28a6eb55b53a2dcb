//! Random selection of tracks for visual inspection.

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Pick `k` items uniformly without replacement.
///
/// With a seed the selection and its order are reproducible; without one the
/// generator is seeded from system entropy. When `k` is at least the number
/// of items, every item is returned in shuffled order.
pub fn sample_tracks<T>(items: &[T], k: usize, seed: Option<u64>) -> Vec<&T> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let amount = k.min(items.len());
    rand::seq::index::sample(&mut rng, items.len(), amount)
        .into_iter()
        .map(|i| &items[i])
        .collect()
}
