use iat_core::{Stimulus, StimulusCategory};
use rand::RngCore;

use crate::error::SelectionError;

/// Uniform integer source behind every random decision of a run.
pub trait RandomSource {
    /// Returns a value in `0..bound`; `bound` is never zero.
    fn below(&mut self, bound: usize) -> usize;
}

impl<R: RngCore> RandomSource for R {
    fn below(&mut self, bound: usize) -> usize {
        rand::Rng::random_range(self, 0..bound)
    }
}

/// Replays a fixed list of draws, cycling when exhausted. Each draw is
/// reduced modulo the requested bound.
#[derive(Debug, Clone, Default)]
pub struct FixedDraws {
    draws: Vec<usize>,
    next: usize,
}

impl FixedDraws {
    pub fn new(draws: impl IntoIterator<Item = usize>) -> Self {
        Self {
            draws: draws.into_iter().collect(),
            next: 0,
        }
    }
}

impl RandomSource for FixedDraws {
    fn below(&mut self, bound: usize) -> usize {
        if self.draws.is_empty() {
            return 0;
        }
        let draw = self.draws[self.next % self.draws.len()];
        self.next += 1;
        draw % bound
    }
}

/// Picks one stimulus with probability proportional to pool size.
///
/// `active` holds one entry per mapped position, so a category shown in two
/// quadrants is weighted twice.
pub fn select_stimulus<'a, R>(
    active: &[&'a StimulusCategory],
    rng: &mut R,
) -> Result<&'a Stimulus, SelectionError>
where
    R: RandomSource + ?Sized,
{
    let total: usize = active.iter().map(|c| c.len()).sum();
    if total == 0 {
        return Err(SelectionError::EmptyPool);
    }

    let mut countdown = rng.below(total);
    for category in active {
        if countdown < category.len() {
            return Ok(&category.stimuli[countdown]);
        }
        countdown -= category.len();
    }
    // Only reachable if the source ignores its bound.
    Err(SelectionError::EmptyPool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn pool(id: u32, name: &str, words: &[&str]) -> StimulusCategory {
        words
            .iter()
            .enumerate()
            .fold(StimulusCategory::new(id, name), |c, (i, w)| {
                c.with_word(id * 100 + i as u32, *w)
            })
    }

    #[test]
    fn single_category_in_every_position_only_yields_that_category() {
        let a = pool(1, "A", &["one", "two", "three"]);
        let active = vec![&a, &a, &a, &a];
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let s = select_stimulus(&active, &mut rng).unwrap();
            assert_eq!(s.category, 1);
        }
    }

    #[test]
    fn draw_walks_categories_in_order() {
        let a = pool(1, "A", &["a0", "a1", "a2"]);
        let b = pool(2, "B", &["b0"]);
        let active = vec![&a, &b];
        let mut draws = FixedDraws::new([0, 2, 3]);
        let picked: Vec<&str> = (0..3)
            .map(|_| select_stimulus(&active, &mut draws).unwrap().word.as_str())
            .collect();
        assert_eq!(picked, vec!["a0", "a2", "b0"]);
    }

    #[test]
    fn exhaustive_draws_match_pool_ratio() {
        let a = pool(1, "A", &["a0", "a1", "a2"]);
        let b = pool(2, "B", &["b0"]);
        let active = vec![&a, &b];
        let mut draws = FixedDraws::new(0..4);
        let mut counts = [0usize; 2];
        for _ in 0..4_000 {
            let s = select_stimulus(&active, &mut draws).unwrap();
            counts[(s.category - 1) as usize] += 1;
        }
        assert_eq!(counts, [3_000, 1_000]);
    }

    #[test]
    fn seeded_draws_converge_to_pool_ratio() {
        let a = pool(1, "A", &["a0", "a1", "a2"]);
        let b = pool(2, "B", &["b0"]);
        let active = vec![&a, &b];
        let mut rng = StdRng::seed_from_u64(42);
        let n = 40_000;
        let hits_a = (0..n)
            .filter(|_| select_stimulus(&active, &mut rng).unwrap().category == 1)
            .count();
        let ratio = hits_a as f64 / n as f64;
        assert!((ratio - 0.75).abs() < 0.02, "ratio was {ratio}");
    }

    #[test]
    fn duplicated_category_is_weighted_twice() {
        let a = pool(1, "A", &["a0"]);
        let b = pool(2, "B", &["b0"]);
        let active = vec![&a, &b, &a];
        let mut draws = FixedDraws::new(0..3);
        let hits_a = (0..300)
            .filter(|_| select_stimulus(&active, &mut draws).unwrap().category == 1)
            .count();
        assert_eq!(hits_a, 200);
    }

    #[test]
    fn empty_pool_is_an_error() {
        let a = StimulusCategory::new(1, "A");
        let mut draws = FixedDraws::new([0]);
        assert_eq!(
            select_stimulus(&[&a], &mut draws),
            Err(SelectionError::EmptyPool)
        );
        assert_eq!(
            select_stimulus(&[], &mut draws),
            Err(SelectionError::EmptyPool)
        );
    }
}
