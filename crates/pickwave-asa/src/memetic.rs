// Copyright (c) 2025 Felix Kahle.
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the
// "Software"), to deal in the Software without restriction, including
// without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to
// permit persons to whom the Software is furnished to do so, subject to
// the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE
// LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION
// WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! Memetic tabu intensification over the elite archive.
//!
//! Each elite solution is refined by a short tabu search. The neighborhood is
//! the union of all single moves (add/remove order, add/remove aisle) and all
//! aisle swaps; candidates are delta-evaluated in parallel, shuffled to avoid
//! order bias, and the best non-tabu move is applied — unless a tabu move
//! would beat the global best, in which case aspiration overrides the ban.
//! Applied move keys enter a FIFO tabu list with a fixed tenure.
//!
//! The best refined solution across all elites is returned; the archive
//! itself is never mutated here.

use crate::{
    elite::EliteArchive, eval::SurrogateEvaluator, repair::Validator, state::SolutionState,
};
use pickwave_core::num::UnitNumeric;
use pickwave_model::index::{AisleIndex, OrderIndex};
use rand::{Rng, seq::SliceRandom};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::{HashSet, VecDeque};

/// One move of the tabu neighborhood, also serving as its own tabu key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TabuMove {
    AddOrder(usize),
    RemoveOrder(usize),
    AddAisle(usize),
    RemoveAisle(usize),
    SwapAisle(usize, usize),
}

/// Short tabu refinement applied to each elite solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabuIntensifier {
    tenure: usize,
    max_iterations: u64,
}

impl TabuIntensifier {
    /// Creates an intensifier with the given tabu tenure and iteration
    /// budget.
    ///
    /// # Panics
    ///
    /// Panics if `tenure` is zero.
    pub fn new(tenure: usize, max_iterations: u64) -> Self {
        assert!(
            tenure > 0,
            "called `TabuIntensifier::new` with tenure 0, but tenure must be greater than 0"
        );
        Self {
            tenure,
            max_iterations,
        }
    }

    /// Refines every elite solution with a tabu search and returns the best
    /// refined result, or `None` for an empty archive.
    pub fn intensify<'a, T, R>(
        &self,
        archive: &EliteArchive<'a, T>,
        validator: &Validator<T>,
        eval: &mut SurrogateEvaluator<T>,
        rng: &mut R,
    ) -> Option<SolutionState<'a, T>>
    where
        T: UnitNumeric,
        R: Rng,
    {
        if archive.is_empty() {
            return None;
        }

        let mut best: Option<SolutionState<'a, T>> = None;
        for elite in archive.solutions() {
            let refined = self.refine(elite, validator, eval, rng);
            let replace = match &best {
                Some(current) => refined.current_cost() < current.current_cost(),
                None => true,
            };
            if replace {
                best = Some(refined);
            }
        }
        best
    }

    /// Tabu search from one starting solution; returns the best solution
    /// visited.
    fn refine<'a, T, R>(
        &self,
        start: &SolutionState<'a, T>,
        validator: &Validator<T>,
        eval: &mut SurrogateEvaluator<T>,
        rng: &mut R,
    ) -> SolutionState<'a, T>
    where
        T: UnitNumeric,
        R: Rng,
    {
        let mut current = start.clone();
        let mut current_cost = eval.cost(&mut current);
        let mut best = current.clone();
        let mut best_cost = current_cost;

        let mut tabu_queue: VecDeque<TabuMove> = VecDeque::with_capacity(self.tenure);
        let mut tabu_set: HashSet<TabuMove> = HashSet::with_capacity(self.tenure);

        for _ in 0..self.max_iterations {
            let mut moves = generate_moves(&current);
            moves.shuffle(rng);
            if moves.is_empty() {
                break;
            }

            // Delta-evaluate the whole neighborhood in parallel, then pick
            // the best admissible move sequentially (shuffled slot order
            // breaks ties).
            let evaluated: Vec<(usize, f64)> = {
                let scan_eval: &SurrogateEvaluator<T> = eval;
                let scan_state: &SolutionState<'a, T> = &current;
                moves
                    .par_iter()
                    .enumerate()
                    .map(|(slot, mv)| (slot, move_delta(mv, scan_state, scan_eval)))
                    .collect()
            };

            let mut chosen: Option<(usize, f64)> = None;
            for (slot, delta) in evaluated {
                let candidate_cost = current_cost + delta;
                let is_tabu = tabu_set.contains(&moves[slot]);
                if is_tabu && candidate_cost >= best_cost {
                    continue; // banned and no aspiration
                }
                let better = match chosen {
                    Some((_, best_delta)) => {
                        delta.partial_cmp(&best_delta) == Some(Ordering::Less)
                    }
                    None => true,
                };
                if better {
                    chosen = Some((slot, delta));
                }
            }

            let Some((slot, _)) = chosen else {
                break;
            };

            apply_move(&moves[slot], &mut current, validator, eval);
            current_cost = eval.cost(&mut current);

            // Tenure bookkeeping: newest in, oldest out.
            if tabu_set.insert(moves[slot]) {
                tabu_queue.push_back(moves[slot]);
            }
            while tabu_queue.len() > self.tenure
                && let Some(oldest) = tabu_queue.pop_front()
            {
                tabu_set.remove(&oldest);
            }

            if current_cost < best_cost {
                best = current.clone();
                best_cost = current_cost;
            }
        }

        best
    }
}

/// All single moves plus all aisle swaps for the current solution.
fn generate_moves<T: UnitNumeric>(state: &SolutionState<'_, T>) -> Vec<TabuMove> {
    let chosen_aisles: Vec<usize> = state.chosen_aisle_ids().collect();
    let unchosen_aisles: Vec<usize> = state.unchosen_aisle_ids().collect();

    let mut moves = Vec::new();
    moves.extend(state.unchosen_order_ids().map(TabuMove::AddOrder));
    moves.extend(state.chosen_order_ids().map(TabuMove::RemoveOrder));
    moves.extend(unchosen_aisles.iter().copied().map(TabuMove::AddAisle));
    moves.extend(chosen_aisles.iter().copied().map(TabuMove::RemoveAisle));
    for &out in &chosen_aisles {
        for &inn in &unchosen_aisles {
            moves.push(TabuMove::SwapAisle(out, inn));
        }
    }
    moves
}

fn move_delta<T: UnitNumeric>(
    mv: &TabuMove,
    state: &SolutionState<'_, T>,
    eval: &SurrogateEvaluator<T>,
) -> f64 {
    match *mv {
        TabuMove::AddOrder(id) => eval.delta_add_order_uncached(state, id),
        TabuMove::RemoveOrder(id) => eval.delta_remove_order_uncached(state, id),
        TabuMove::AddAisle(id) => eval.delta_add_aisle_uncached(state, id),
        TabuMove::RemoveAisle(id) => eval.delta_remove_aisle_uncached(state, id),
        TabuMove::SwapAisle(out, inn) => eval.delta_swap_aisle(state, out, inn),
    }
}

fn apply_move<T: UnitNumeric>(
    mv: &TabuMove,
    state: &mut SolutionState<'_, T>,
    validator: &Validator<T>,
    eval: &mut SurrogateEvaluator<T>,
) {
    match *mv {
        TabuMove::AddOrder(id) => {
            eval.apply_add_order(state, OrderIndex::new(id));
        }
        TabuMove::RemoveOrder(id) => {
            eval.apply_remove_order(state, OrderIndex::new(id));
        }
        TabuMove::AddAisle(id) => {
            eval.apply_add_aisle(state, AisleIndex::new(id));
        }
        TabuMove::RemoveAisle(id) => {
            eval.apply_remove_aisle(state, AisleIndex::new(id));
        }
        TabuMove::SwapAisle(out, inn) => {
            eval.apply_swap_aisle(state, AisleIndex::new(out), AisleIndex::new(inn));
        }
    }
    if !validator.is_feasible(state) {
        validator.repair(state, eval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::CostWeights;
    use pickwave_model::instance::{Instance, InstanceBuilder};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn oi(i: usize) -> OrderIndex {
        OrderIndex::new(i)
    }

    fn ai(i: usize) -> AisleIndex {
        AisleIndex::new(i)
    }

    fn build_instance() -> Instance<u32> {
        let mut builder = InstanceBuilder::<u32>::new(3);
        builder.push_order([(0, 2)]);
        builder.push_order([(1, 2)]);
        builder.push_order([(2, 2)]);
        builder.push_aisle([(0, 4)]);
        builder.push_aisle([(1, 4)]);
        builder.push_aisle([(0, 2), (1, 2), (2, 2)]);
        builder.wave_bounds(1, 10);
        builder.build()
    }

    #[test]
    #[should_panic(expected = "called `TabuIntensifier::new` with tenure 0")]
    fn test_zero_tenure_panics() {
        let _ = TabuIntensifier::new(0, 10);
    }

    #[test]
    fn test_intensify_empty_archive_returns_none() {
        let instance = build_instance();
        let validator = Validator::new(&instance);
        let mut eval = SurrogateEvaluator::new(&instance, CostWeights::default());
        let mut rng = ChaCha8Rng::seed_from_u64(31);
        let archive = EliteArchive::new(3);

        let result =
            TabuIntensifier::new(10, 20).intensify(&archive, &validator, &mut eval, &mut rng);
        assert!(result.is_none());
    }

    #[test]
    fn test_refinement_never_returns_worse_than_the_elite() {
        let instance = build_instance();
        let validator = Validator::new(&instance);
        let mut eval = SurrogateEvaluator::new(&instance, CostWeights::default());
        let mut rng = ChaCha8Rng::seed_from_u64(32);

        // A deliberately wasteful elite: two aisles where aisle 2 would do.
        let mut elite = SolutionState::new(&instance, [oi(0), oi(1)], [ai(0), ai(1)]);
        let elite_cost = eval.reevaluate(&mut elite);

        let mut archive = EliteArchive::new(3);
        assert!(archive.offer(&elite, &validator));

        let refined = TabuIntensifier::new(5, 30)
            .intensify(&archive, &validator, &mut eval, &mut rng)
            .expect("non-empty archive must yield a result");

        assert!(refined.current_cost() <= elite_cost);
        assert!(validator.is_feasible(&refined));
    }

    #[test]
    fn test_refinement_finds_the_consolidating_swap() {
        let instance = build_instance();
        let validator = Validator::new(&instance);
        let mut eval = SurrogateEvaluator::new(&instance, CostWeights::default());
        let mut rng = ChaCha8Rng::seed_from_u64(33);

        // Orders 0 and 1 through aisles 0 and 1; aisle 2 covers everything
        // alone, so the tabu search should consolidate onto it.
        let mut elite = SolutionState::new(&instance, [oi(0), oi(1)], [ai(0), ai(1)]);
        eval.reevaluate(&mut elite);

        let mut archive = EliteArchive::new(2);
        archive.offer(&elite, &validator);

        let refined = TabuIntensifier::new(5, 50)
            .intensify(&archive, &validator, &mut eval, &mut rng)
            .expect("archive is non-empty");

        assert!(
            refined.num_chosen_aisles() <= elite.num_chosen_aisles(),
            "refinement should not inflate the aisle set"
        );
        assert!(validator.is_feasible(&refined));
    }
}
