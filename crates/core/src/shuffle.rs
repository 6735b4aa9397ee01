//! Seedless shuffling behind a pluggable random source.

use rand::Rng;

use crate::model::{BlockCode, Round};

/// Source of uniformly distributed values in `[0, 1)`.
pub trait RandomSource {
    fn next_unit(&mut self) -> f64;
}

/// Thread-local entropy; the production source.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_unit(&mut self) -> f64 {
        rand::rng().random::<f64>()
    }
}

impl<F> RandomSource for F
where
    F: FnMut() -> f64,
{
    fn next_unit(&mut self) -> f64 {
        self()
    }
}

/// Fisher–Yates shuffle returning a new vector; the input is left untouched.
pub fn shuffle<T: Clone>(items: &[T], rng: &mut dyn RandomSource) -> Vec<T> {
    let mut out = items.to_vec();
    for i in (1..out.len()).rev() {
        let j = pick_index(rng.next_unit(), i + 1);
        out.swap(i, j);
    }
    out
}

/// Block order for one pass through `round`.
///
/// Shuffled rounds draw a fresh permutation on every call, so each repetition
/// gets its own ordering.
pub fn resolve_play_order(round: &Round, rng: &mut dyn RandomSource) -> Vec<BlockCode> {
    if round.shuffle {
        shuffle(&round.block_codes, rng)
    } else {
        round.block_codes.clone()
    }
}

// Maps a unit sample onto `0..len`, clamping sources that misbehave at the edges.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn pick_index(sample: f64, len: usize) -> usize {
    let sample = if sample.is_finite() { sample.clamp(0.0, 1.0) } else { 0.0 };
    ((sample * len as f64) as usize).min(len - 1)
}
