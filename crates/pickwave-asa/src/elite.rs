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

//! The elite archive: a bounded set of high-quality, mutually diverse
//! solutions.
//!
//! Admission balances quality against diversity. Infeasible candidates,
//! duplicates, and unknown-cost candidates are rejected outright; while the
//! archive is not full every feasible newcomer is taken. At capacity, every
//! resident is scored by a convex combination of quality (`-1/cost`, higher
//! is better) and diversity (minimum pairwise distance to the other
//! residents); the candidate replaces the worst-scoring resident when it
//! beats that score, or when it strictly improves quality while staying at
//! least `MIN_DISTANCE` away from everyone.
//!
//! Distance is a weighted symmetric-difference Jaccard over the chosen sets,
//! with aisles weighted more heavily than orders because they dominate the
//! objective. The archive is kept sorted by cost ascending, so index 0 is
//! always the best elite.

use crate::{repair::Validator, state::SolutionState};
use pickwave_core::num::UnitNumeric;

/// Weight of the diversity term in the combined admission score.
const DIVERSITY_WEIGHT: f64 = 0.3;
/// Minimum pairwise distance required by the quality-only replacement rule.
const MIN_DISTANCE: f64 = 0.2;
/// Weight of the order-set distance in the combined distance.
const ORDER_DISTANCE_WEIGHT: f64 = 0.4;
/// Weight of the aisle-set distance in the combined distance.
const AISLE_DISTANCE_WEIGHT: f64 = 0.6;

/// Normalized symmetric-difference distance between two solutions:
/// `0.4 * |O1 Δ O2| / (|O1|+|O2|) + 0.6 * |A1 Δ A2| / (|A1|+|A2|)`,
/// in `[0, 1]` (0 = identical sets).
pub fn solution_distance<T: UnitNumeric>(
    a: &SolutionState<'_, T>,
    b: &SolutionState<'_, T>,
) -> f64 {
    fn set_distance(lhs: impl Iterator<Item = usize>, rhs: &[bool], rhs_len: usize, lhs_len: usize) -> f64 {
        let mut shared = 0usize;
        for id in lhs {
            if rhs[id] {
                shared += 1;
            }
        }
        let sym_diff = lhs_len + rhs_len - 2 * shared;
        sym_diff as f64 / (lhs_len + rhs_len).max(1) as f64
    }

    let order_membership: Vec<bool> = {
        let mut membership = vec![false; a.instance().num_orders()];
        for id in b.chosen_order_ids() {
            membership[id] = true;
        }
        membership
    };
    let aisle_membership: Vec<bool> = {
        let mut membership = vec![false; a.instance().num_aisles()];
        for id in b.chosen_aisle_ids() {
            membership[id] = true;
        }
        membership
    };

    let order_distance = set_distance(
        a.chosen_order_ids(),
        &order_membership,
        b.num_chosen_orders(),
        a.num_chosen_orders(),
    );
    let aisle_distance = set_distance(
        a.chosen_aisle_ids(),
        &aisle_membership,
        b.num_chosen_aisles(),
        a.num_chosen_aisles(),
    );

    ORDER_DISTANCE_WEIGHT * order_distance + AISLE_DISTANCE_WEIGHT * aisle_distance
}

/// A bounded archive of feasible, mutually diverse elite solutions, sorted by
/// cost ascending.
pub struct EliteArchive<'a, T>
where
    T: UnitNumeric,
{
    capacity: usize,
    solutions: Vec<SolutionState<'a, T>>,
}

impl<'a, T> EliteArchive<'a, T>
where
    T: UnitNumeric,
{
    /// Creates an empty archive with the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(
            capacity > 0,
            "called `EliteArchive::new` with capacity 0, but the archive needs room for at least one solution"
        );
        Self {
            capacity,
            solutions: Vec::with_capacity(capacity),
        }
    }

    /// Number of archived solutions.
    #[inline]
    pub fn len(&self) -> usize {
        self.solutions.len()
    }

    /// Returns `true` if the archive holds no solutions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }

    /// Maximum number of archived solutions.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The archived solutions, best (lowest cost) first.
    #[inline]
    pub fn solutions(&self) -> &[SolutionState<'a, T>] {
        &self.solutions
    }

    /// The best archived solution, if any.
    #[inline]
    pub fn best(&self) -> Option<&SolutionState<'a, T>> {
        self.solutions.first()
    }

    /// Offers a candidate to the archive. Returns `true` if it was admitted.
    ///
    /// The candidate's `current_cost` must be up to date; candidates with an
    /// unknown (non-finite) cost are rejected, as are infeasible ones and
    /// duplicates.
    pub fn offer(&mut self, candidate: &SolutionState<'a, T>, validator: &Validator<T>) -> bool {
        if !candidate.current_cost().is_finite() {
            return false;
        }
        if !validator.is_feasible(candidate) {
            return false;
        }
        if self.solutions.iter().any(|elite| elite == candidate) {
            return false;
        }

        if self.solutions.len() < self.capacity {
            self.solutions.push(candidate.clone());
            self.sort_by_cost();
            return true;
        }

        // Archive full: score every resident (quality + diversity), find the
        // worst, and decide whether the candidate earns its slot.
        let candidate_min_distance = self
            .solutions
            .iter()
            .map(|elite| solution_distance(candidate, elite))
            .fold(f64::INFINITY, f64::min);
        let candidate_score = combined_score(candidate.current_cost(), candidate_min_distance);

        let mut worst_index = 0;
        let mut worst_score = f64::INFINITY;
        for index in 0..self.solutions.len() {
            let score = combined_score(
                self.solutions[index].current_cost(),
                self.min_distance_excluding(index),
            );
            if score < worst_score {
                worst_score = score;
                worst_index = index;
            }
        }

        let beats_on_score = candidate_score > worst_score;
        let beats_on_quality = candidate.current_cost()
            < self.solutions[worst_index].current_cost()
            && candidate_min_distance >= MIN_DISTANCE;

        if beats_on_score || beats_on_quality {
            self.solutions[worst_index] = candidate.clone();
            self.sort_by_cost();
            return true;
        }
        false
    }

    /// Minimum pairwise distance from resident `index` to the others (or 1.0
    /// for a lone resident).
    fn min_distance_excluding(&self, index: usize) -> f64 {
        let mut min = f64::INFINITY;
        for other in 0..self.solutions.len() {
            if other != index {
                min = min.min(solution_distance(
                    &self.solutions[index],
                    &self.solutions[other],
                ));
            }
        }
        if min.is_finite() { min } else { 1.0 }
    }

    fn sort_by_cost(&mut self) {
        self.solutions.sort_by(|a, b| {
            a.current_cost()
                .partial_cmp(&b.current_cost())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }
}

/// The admission score: `(1 - w) * (-1/cost) + w * diversity`, higher is
/// better.
#[inline]
fn combined_score(cost: f64, min_distance: f64) -> f64 {
    (1.0 - DIVERSITY_WEIGHT) * (-1.0 / cost) + DIVERSITY_WEIGHT * min_distance
}

impl<'a, T> std::fmt::Debug for EliteArchive<'a, T>
where
    T: UnitNumeric,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "EliteArchive({}/{}, costs: {:?})",
            self.len(),
            self.capacity,
            self.solutions
                .iter()
                .map(|s| s.current_cost())
                .collect::<Vec<_>>()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{CostWeights, SurrogateEvaluator};
    use pickwave_model::index::{AisleIndex, OrderIndex};
    use pickwave_model::instance::{Instance, InstanceBuilder};

    fn oi(i: usize) -> OrderIndex {
        OrderIndex::new(i)
    }

    fn ai(i: usize) -> AisleIndex {
        AisleIndex::new(i)
    }

    // Four independent orders/aisles so arbitrary feasible subsets exist.
    fn build_instance() -> Instance<u32> {
        let mut builder = InstanceBuilder::<u32>::new(4);
        for item in 0..4 {
            builder.push_order([(item, 1)]);
        }
        for item in 0..4 {
            builder.push_aisle([(item, 2)]);
        }
        builder.wave_bounds(1, 10);
        builder.build()
    }

    fn feasible_state<'a>(
        instance: &'a Instance<u32>,
        orders: &[usize],
        aisles: &[usize],
        eval: &SurrogateEvaluator<u32>,
    ) -> SolutionState<'a, u32> {
        let mut state = SolutionState::new(
            instance,
            orders.iter().copied().map(oi),
            aisles.iter().copied().map(ai),
        );
        eval.reevaluate(&mut state);
        state
    }

    #[test]
    fn test_rejects_infeasible_and_unknown_cost_candidates() {
        let instance = build_instance();
        let validator = Validator::new(&instance);
        let eval = SurrogateEvaluator::new(&instance, CostWeights::default());
        let mut archive = EliteArchive::new(3);

        // Chosen order 0 but no aisle covering it: infeasible.
        let infeasible = feasible_state(&instance, &[0], &[1], &eval);
        assert!(!archive.offer(&infeasible, &validator));

        // Feasible but the cost was never evaluated (empty wave = infinity).
        let unknown = SolutionState::new(&instance, [], [ai(0)]);
        assert!(!archive.offer(&unknown, &validator));

        assert!(archive.is_empty());
    }

    #[test]
    fn test_rejects_duplicates_and_respects_capacity() {
        let instance = build_instance();
        let validator = Validator::new(&instance);
        let eval = SurrogateEvaluator::new(&instance, CostWeights::default());
        let mut archive = EliteArchive::new(2);

        let a = feasible_state(&instance, &[0], &[0], &eval);
        let b = feasible_state(&instance, &[1], &[1], &eval);
        let c = feasible_state(&instance, &[0, 1], &[0, 1], &eval);

        assert!(archive.offer(&a, &validator));
        assert!(!archive.offer(&a, &validator), "duplicate must be rejected");
        assert!(archive.offer(&b, &validator));
        assert_eq!(archive.len(), 2);

        // Full archive: the third candidate must displace someone or be
        // rejected, never grow the archive.
        archive.offer(&c, &validator);
        assert_eq!(archive.len(), 2);
    }

    #[test]
    fn test_archive_stays_sorted_by_cost() {
        let instance = build_instance();
        let validator = Validator::new(&instance);
        let eval = SurrogateEvaluator::new(&instance, CostWeights::default());
        let mut archive = EliteArchive::new(3);

        // Costs: singles are cheaper than the pair.
        let cheap = feasible_state(&instance, &[0], &[0], &eval);
        let expensive = feasible_state(&instance, &[0, 1, 2], &[0, 1, 2], &eval);
        let mid = feasible_state(&instance, &[0, 1], &[0, 1], &eval);

        archive.offer(&expensive, &validator);
        archive.offer(&cheap, &validator);
        archive.offer(&mid, &validator);

        let costs: Vec<f64> = archive
            .solutions()
            .iter()
            .map(|s| s.current_cost())
            .collect();
        let mut sorted = costs.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(costs, sorted, "archive must be sorted best-first");
        assert_eq!(archive.best().unwrap(), &cheap);
    }

    #[test]
    fn test_distance_is_zero_for_identical_and_positive_for_disjoint() {
        let instance = build_instance();
        let eval = SurrogateEvaluator::new(&instance, CostWeights::default());

        let a = feasible_state(&instance, &[0], &[0], &eval);
        let b = feasible_state(&instance, &[0], &[0], &eval);
        let c = feasible_state(&instance, &[1], &[1], &eval);

        assert_eq!(solution_distance(&a, &b), 0.0);
        // Fully disjoint singleton sets: both Jaccard terms are 1.
        assert!((solution_distance(&a, &c) - 1.0).abs() <= 1e-12);
    }

    #[test]
    fn test_quality_replacement_requires_min_distance() {
        // Aisle 4 stocks items 2 and 3, so a two-order one-aisle wave exists.
        let mut builder = InstanceBuilder::<u32>::new(4);
        for item in 0..4 {
            builder.push_order([(item, 1)]);
        }
        for item in 0..4 {
            builder.push_aisle([(item, 2)]);
        }
        builder.push_aisle([(2, 2), (3, 2)]);
        builder.wave_bounds(1, 10);
        let instance = builder.build();

        let validator = Validator::new(&instance);
        let eval = SurrogateEvaluator::new(&instance, CostWeights::default());
        let mut archive = EliteArchive::new(2);

        let a = feasible_state(&instance, &[0], &[0], &eval);
        let b = feasible_state(&instance, &[1], &[1], &eval);
        archive.offer(&a, &validator);
        archive.offer(&b, &validator);

        // Strictly better quality (two orders through one aisle), maximally
        // distant from both residents: the quality rule must admit it.
        let better = feasible_state(&instance, &[2, 3], &[4], &eval);
        assert!(better.current_cost() < a.current_cost().min(b.current_cost()));
        assert!(archive.offer(&better, &validator));
        assert!(archive.solutions().contains(&better));
    }
}
