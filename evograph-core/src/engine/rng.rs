//! Per-population random generators derived from the scenario seed.

use rand::{SeedableRng, rngs::SmallRng};

/// SplitMix64 increment (the 64-bit golden ratio) used for per-population
/// seed derivation.
const POPULATION_SEED_SPACING: u64 = 0x9E37_79B9_7F4A_7C15;
const SPLITMIX_MULT_A: u64 = 0xBF58_476D_1CE4_E5B9;
const SPLITMIX_MULT_B: u64 = 0x94D0_49BB_1331_11EB;

#[inline]
pub(super) fn mix_population_seed(base_seed: u64, population_index: usize) -> u64 {
    splitmix64(base_seed ^ ((population_index as u64 + 1).wrapping_mul(POPULATION_SEED_SPACING)))
}

#[inline]
fn splitmix64(mut state: u64) -> u64 {
    state = state.wrapping_add(POPULATION_SEED_SPACING);
    state = (state ^ (state >> 30)).wrapping_mul(SPLITMIX_MULT_A);
    state = (state ^ (state >> 27)).wrapping_mul(SPLITMIX_MULT_B);
    state ^ (state >> 31)
}

/// Generator owned by the population at `population_index`.
///
/// Vertex populations take indices `0..vertices`, edge populations follow,
/// so the stream of a population never depends on thread scheduling.
pub(super) fn population_rng(base_seed: u64, population_index: usize) -> SmallRng {
    SmallRng::seed_from_u64(mix_population_seed(base_seed, population_index))
}
