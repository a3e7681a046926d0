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

//! Surrogate cost and incremental delta evaluation.
//!
//! The search does not optimize the reported objective directly; it minimizes
//! a penalty-based surrogate: a large penalty for every chosen order that is
//! not fully covered, a per-aisle cost, and a weighted aisle/order ratio term.
//! An empty wave costs infinity. The true objective (picked units per visited
//! aisle) is computed only for reporting and final selection.
//!
//! Every move the engine considers is delta-evaluated: the evaluator returns
//! the exact change the move would cause in the surrogate, reading the
//! solution's coverage counters instead of re-scanning the instance. Computed
//! deltas are memoized per (operation, id) and stamped with the state's
//! identity and version counters, so any mutation invalidates the affected
//! entries automatically. The simulated per-order coverage used inside the
//! aisle deltas has its own version-stamped memo.
//!
//! Batched evaluation (`batch_order_deltas`, `batch_aisle_deltas`) fans the
//! read-only delta computation out over rayon; no cache is touched on that
//! path, matching the rule that parallel work never mutates the solution.

use crate::state::SolutionState;
use fixedbitset::FixedBitSet;
use pickwave_core::num::UnitNumeric;
use pickwave_model::{
    index::{AisleIndex, OrderIndex},
    instance::{Instance, ItemEntry},
};
use rayon::prelude::*;
use std::collections::HashMap;

/// The weights of the surrogate cost function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostWeights {
    /// Penalty charged per chosen order that is not fully covered.
    pub penalty_missing: f64,
    /// Cost charged per visited aisle.
    pub cost_per_aisle: f64,
    /// Weight of the aisles-per-order ratio term.
    pub ratio_weight: f64,
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            penalty_missing: 1_000.0,
            cost_per_aisle: 10.0,
            ratio_weight: 50.0,
        }
    }
}

/// Identity and versions a cache generation was filled at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct CacheStamp {
    state_id: u64,
    order_version: u64,
    aisle_version: u64,
}

impl CacheStamp {
    #[inline]
    fn of<T: UnitNumeric>(state: &SolutionState<'_, T>) -> Self {
        Self {
            state_id: state.state_id(),
            order_version: state.order_version(),
            aisle_version: state.aisle_version(),
        }
    }
}

/// The incremental surrogate evaluator.
///
/// One evaluator can serve any number of `SolutionState` values of the same
/// instance; its caches are keyed by state identity and version, so switching
/// between states (or between a state and its clones) is safe and merely
/// costs cache refills.
#[derive(Debug, Clone)]
pub struct SurrogateEvaluator<T>
where
    T: UnitNumeric,
{
    weights: CostWeights,
    /// Per-aisle bitset of stocked items (positive units only).
    aisle_masks: Vec<FixedBitSet>,
    cache_stamp: CacheStamp,
    order_add: HashMap<usize, f64>,
    order_remove: HashMap<usize, f64>,
    aisle_add: HashMap<usize, f64>,
    aisle_remove: HashMap<usize, f64>,
    /// Simulated-coverage memo: (order, aisle) -> order fully covered after
    /// the aisle change. Guarded by the coverage (aisle) version.
    sim_stamp: (u64, u64),
    sim_add_covered: HashMap<(usize, usize), bool>,
    sim_remove_covered: HashMap<(usize, usize), bool>,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> SurrogateEvaluator<T>
where
    T: UnitNumeric,
{
    /// Creates an evaluator for the given instance with the given weights.
    pub fn new(instance: &Instance<T>, weights: CostWeights) -> Self {
        let aisle_masks = (0..instance.num_aisles())
            .map(|a| {
                let mut mask = FixedBitSet::with_capacity(instance.num_items());
                for entry in instance.aisle_stock(AisleIndex::new(a)) {
                    mask.insert(entry.item.get());
                }
                mask
            })
            .collect();

        Self {
            weights,
            aisle_masks,
            cache_stamp: CacheStamp::default(),
            order_add: HashMap::new(),
            order_remove: HashMap::new(),
            aisle_add: HashMap::new(),
            aisle_remove: HashMap::new(),
            sim_stamp: (0, 0),
            sim_add_covered: HashMap::new(),
            sim_remove_covered: HashMap::new(),
            _phantom: std::marker::PhantomData,
        }
    }

    /// Returns the configured weights.
    #[inline]
    pub fn weights(&self) -> &CostWeights {
        &self.weights
    }

    /// Full surrogate cost of the state as-is (coverage counters are trusted).
    ///
    /// Returns `f64::INFINITY` for an empty wave; a NaN result is coerced to
    /// infinity as well.
    pub fn evaluate_cost(&self, state: &SolutionState<'_, T>) -> f64 {
        let num_orders = state.num_chosen_orders();
        if num_orders == 0 {
            return f64::INFINITY;
        }
        let num_aisles = state.num_chosen_aisles();

        let mut total = 0.0;
        for order_id in state.chosen_order_ids() {
            if !state.is_order_covered(order_id) {
                total += self.weights.penalty_missing;
            }
        }
        total += num_aisles as f64 * self.weights.cost_per_aisle;
        total += self.weights.ratio_weight * (num_aisles as f64 / num_orders as f64);

        if total.is_nan() { f64::INFINITY } else { total }
    }

    /// Rebuilds the coverage counters, recomputes the surrogate from scratch,
    /// and stores it on the state. This is the drift guard.
    pub fn reevaluate(&self, state: &mut SolutionState<'_, T>) -> f64 {
        state.update_coverage();
        let cost = self.evaluate_cost(state);
        state.set_cost(cost);
        cost
    }

    /// Reads the state's cost, re-evaluating if it is still tagged unknown
    /// (or the wave is empty, which evaluates to infinity anyway).
    pub fn cost(&self, state: &mut SolutionState<'_, T>) -> f64 {
        if !state.current_cost().is_finite() {
            self.reevaluate(state);
        }
        state.current_cost()
    }

    // ------------------------------------------------------------------
    // Uncached deltas (read-only; safe to call from parallel batches)
    // ------------------------------------------------------------------

    /// Exact surrogate change of adding the order. Zero if already chosen.
    pub fn delta_add_order_uncached(&self, state: &SolutionState<'_, T>, order_id: usize) -> f64 {
        if state.contains_order(OrderIndex::new(order_id)) {
            return 0.0;
        }
        let old_orders = state.num_chosen_orders();
        let aisles = state.num_chosen_aisles() as f64;

        let new_ratio = aisles / (old_orders + 1) as f64;
        let old_ratio = if old_orders > 0 {
            aisles / old_orders as f64
        } else {
            0.0
        };
        let mut delta = (new_ratio - old_ratio) * self.weights.ratio_weight;

        if !state.is_order_covered(order_id) {
            delta += self.weights.penalty_missing;
        }
        delta
    }

    /// Exact surrogate change of removing the order. Zero if not chosen;
    /// infinity if the removal would empty the wave.
    pub fn delta_remove_order_uncached(
        &self,
        state: &SolutionState<'_, T>,
        order_id: usize,
    ) -> f64 {
        if !state.contains_order(OrderIndex::new(order_id)) {
            return 0.0;
        }
        let old_orders = state.num_chosen_orders();
        if old_orders == 1 {
            return f64::INFINITY;
        }
        let aisles = state.num_chosen_aisles() as f64;

        let mut delta = 0.0;
        if !state.is_order_covered(order_id) {
            delta -= self.weights.penalty_missing;
        }
        let old_ratio = aisles / old_orders as f64;
        let new_ratio = aisles / (old_orders - 1) as f64;
        delta += (new_ratio - old_ratio) * self.weights.ratio_weight;
        delta
    }

    /// Exact surrogate change of visiting the aisle. Zero if already visited.
    pub fn delta_add_aisle_uncached(&self, state: &SolutionState<'_, T>, aisle_id: usize) -> f64 {
        if state.contains_aisle(AisleIndex::new(aisle_id)) {
            return 0.0;
        }
        let mut delta = self.aisle_count_delta(state, 1.0);
        let mask = &self.aisle_masks[aisle_id];

        for &order_id in state.aisle_to_orders(aisle_id) {
            if !state.contains_order(OrderIndex::new(order_id)) {
                continue;
            }
            if state.is_order_covered(order_id) {
                continue;
            }
            if Self::covered_with_mask(state, order_id, mask) {
                delta -= self.weights.penalty_missing;
            }
        }
        delta
    }

    /// Exact surrogate change of leaving the aisle. Zero if not visited.
    pub fn delta_remove_aisle_uncached(
        &self,
        state: &SolutionState<'_, T>,
        aisle_id: usize,
    ) -> f64 {
        if !state.contains_aisle(AisleIndex::new(aisle_id)) {
            return 0.0;
        }
        let mut delta = self.aisle_count_delta(state, -1.0);
        let mask = &self.aisle_masks[aisle_id];

        for &order_id in state.aisle_to_orders(aisle_id) {
            if !state.contains_order(OrderIndex::new(order_id)) {
                continue;
            }
            if !state.is_order_covered(order_id) {
                continue;
            }
            if !Self::covered_without_mask(state, order_id, mask) {
                delta += self.weights.penalty_missing;
            }
        }
        delta
    }

    /// Exact surrogate change of swapping `remove` for `add`: the removal
    /// delta in the current state plus the addition delta evaluated against
    /// the simulated post-removal coverage. The simulation never leaks back
    /// into the state.
    ///
    /// Returns zero on degenerate input (same aisle, `remove` not visited, or
    /// `add` already visited).
    pub fn delta_swap_aisle(
        &self,
        state: &SolutionState<'_, T>,
        remove_id: usize,
        add_id: usize,
    ) -> f64 {
        if remove_id == add_id
            || !state.contains_aisle(AisleIndex::new(remove_id))
            || state.contains_aisle(AisleIndex::new(add_id))
        {
            return 0.0;
        }

        let delta_remove = self.delta_remove_aisle_uncached(state, remove_id);

        // Addition evaluated in the post-removal world: same aisle-count
        // increment (|A|-1 -> |A|), coverage adjusted by the removed aisle's
        // contribution.
        let mut delta_add = self.weights.cost_per_aisle;
        let orders = state.num_chosen_orders();
        if orders > 0 {
            delta_add += self.weights.ratio_weight / orders as f64;
        }

        let remove_mask = &self.aisle_masks[remove_id];
        let add_mask = &self.aisle_masks[add_id];
        let instance = state.instance();

        for &order_id in state.aisle_to_orders(add_id) {
            if !state.contains_order(OrderIndex::new(order_id)) {
                continue;
            }
            let demand = instance.order_demand(OrderIndex::new(order_id));
            let coverage = state.coverage_of(order_id);

            let mut covered_before = true;
            let mut covered_after = true;
            for (slot, entry) in demand.iter().enumerate() {
                let item = entry.item.get();
                let base = coverage[slot].saturating_sub(u32::from(remove_mask.contains(item)));
                if base < 1 {
                    covered_before = false;
                }
                if base + u32::from(add_mask.contains(item)) < 1 {
                    covered_after = false;
                    break;
                }
            }
            if !covered_before && covered_after {
                delta_add -= self.weights.penalty_missing;
            }
        }

        delta_remove + delta_add
    }

    /// Exact surrogate change of swapping two orders: the removal delta of the
    /// contained one plus the addition delta of the absent one, both in the
    /// current state. Zero unless exactly one of the two is chosen.
    pub fn delta_swap_orders(&self, state: &SolutionState<'_, T>, order_a: usize, order_b: usize) -> f64 {
        let has_a = state.contains_order(OrderIndex::new(order_a));
        let has_b = state.contains_order(OrderIndex::new(order_b));
        if has_a == has_b {
            return 0.0;
        }
        if has_a {
            self.delta_remove_order_uncached(state, order_a)
                + self.delta_add_order_uncached(state, order_b)
        } else {
            self.delta_remove_order_uncached(state, order_b)
                + self.delta_add_order_uncached(state, order_a)
        }
    }

    // ------------------------------------------------------------------
    // Cached deltas
    // ------------------------------------------------------------------

    /// Cached variant of `delta_add_order_uncached`.
    pub fn delta_add_order(&mut self, state: &SolutionState<'_, T>, order_id: usize) -> f64 {
        self.refresh_caches(state);
        if let Some(&delta) = self.order_add.get(&order_id) {
            return delta;
        }
        let delta = self.delta_add_order_uncached(state, order_id);
        self.order_add.insert(order_id, delta);
        delta
    }

    /// Cached variant of `delta_remove_order_uncached`.
    pub fn delta_remove_order(&mut self, state: &SolutionState<'_, T>, order_id: usize) -> f64 {
        self.refresh_caches(state);
        if let Some(&delta) = self.order_remove.get(&order_id) {
            return delta;
        }
        let delta = self.delta_remove_order_uncached(state, order_id);
        self.order_remove.insert(order_id, delta);
        delta
    }

    /// Cached variant of `delta_add_aisle_uncached`, routing the per-order
    /// coverage simulation through the version-stamped memo.
    pub fn delta_add_aisle(&mut self, state: &SolutionState<'_, T>, aisle_id: usize) -> f64 {
        self.refresh_caches(state);
        if let Some(&delta) = self.aisle_add.get(&aisle_id) {
            return delta;
        }

        let delta = if state.contains_aisle(AisleIndex::new(aisle_id)) {
            0.0
        } else {
            let mut d = self.aisle_count_delta(state, 1.0);
            for idx in 0..state.aisle_to_orders(aisle_id).len() {
                let order_id = state.aisle_to_orders(aisle_id)[idx];
                if !state.contains_order(OrderIndex::new(order_id)) {
                    continue;
                }
                if state.is_order_covered(order_id) {
                    continue;
                }
                if self.covered_after_add_memo(state, order_id, aisle_id) {
                    d -= self.weights.penalty_missing;
                }
            }
            d
        };
        self.aisle_add.insert(aisle_id, delta);
        delta
    }

    /// Cached variant of `delta_remove_aisle_uncached`.
    pub fn delta_remove_aisle(&mut self, state: &SolutionState<'_, T>, aisle_id: usize) -> f64 {
        self.refresh_caches(state);
        if let Some(&delta) = self.aisle_remove.get(&aisle_id) {
            return delta;
        }

        let delta = if !state.contains_aisle(AisleIndex::new(aisle_id)) {
            0.0
        } else {
            let mut d = self.aisle_count_delta(state, -1.0);
            for idx in 0..state.aisle_to_orders(aisle_id).len() {
                let order_id = state.aisle_to_orders(aisle_id)[idx];
                if !state.contains_order(OrderIndex::new(order_id)) {
                    continue;
                }
                if !state.is_order_covered(order_id) {
                    continue;
                }
                if !self.covered_after_remove_memo(state, order_id, aisle_id) {
                    d += self.weights.penalty_missing;
                }
            }
            d
        };
        self.aisle_remove.insert(aisle_id, delta);
        delta
    }

    // ------------------------------------------------------------------
    // Apply helpers: delta-evaluate, commit, return the applied delta
    // ------------------------------------------------------------------

    /// Adds the order, committing the delta onto the state's cost.
    pub fn apply_add_order(&mut self, state: &mut SolutionState<'_, T>, order: OrderIndex) -> f64 {
        if state.contains_order(order) {
            return 0.0;
        }
        let delta = self.delta_add_order(state, order.get());
        state.apply_add_order(order, delta);
        delta
    }

    /// Removes the order, committing the delta onto the state's cost.
    pub fn apply_remove_order(
        &mut self,
        state: &mut SolutionState<'_, T>,
        order: OrderIndex,
    ) -> f64 {
        if !state.contains_order(order) {
            return 0.0;
        }
        let delta = self.delta_remove_order(state, order.get());
        state.apply_remove_order(order, delta);
        delta
    }

    /// Visits the aisle, committing the delta onto the state's cost.
    pub fn apply_add_aisle(&mut self, state: &mut SolutionState<'_, T>, aisle: AisleIndex) -> f64 {
        if state.contains_aisle(aisle) {
            return 0.0;
        }
        let delta = self.delta_add_aisle(state, aisle.get());
        state.apply_add_aisle(aisle, delta);
        delta
    }

    /// Leaves the aisle, committing the delta onto the state's cost.
    pub fn apply_remove_aisle(
        &mut self,
        state: &mut SolutionState<'_, T>,
        aisle: AisleIndex,
    ) -> f64 {
        if !state.contains_aisle(aisle) {
            return 0.0;
        }
        let delta = self.delta_remove_aisle(state, aisle.get());
        state.apply_remove_aisle(aisle, delta);
        delta
    }

    /// Swaps one visited aisle for an unvisited one: removal first, then the
    /// addition delta-evaluated in the real post-removal state. Returns the
    /// total committed delta.
    pub fn apply_swap_aisle(
        &mut self,
        state: &mut SolutionState<'_, T>,
        remove: AisleIndex,
        add: AisleIndex,
    ) -> f64 {
        if remove == add || !state.contains_aisle(remove) || state.contains_aisle(add) {
            return 0.0;
        }
        let delta_remove = self.apply_remove_aisle(state, remove);
        let delta_add = self.apply_add_aisle(state, add);
        delta_remove + delta_add
    }

    // ------------------------------------------------------------------
    // Batched evaluation (read-only, parallel)
    // ------------------------------------------------------------------

    /// Delta-evaluates many order candidates in parallel. Every delta reads
    /// the state; none mutates it.
    pub fn batch_order_deltas(
        &self,
        state: &SolutionState<'_, T>,
        ids: &[usize],
        add: bool,
    ) -> Vec<(usize, f64)> {
        ids.par_iter()
            .map(|&id| {
                let delta = if add {
                    self.delta_add_order_uncached(state, id)
                } else {
                    self.delta_remove_order_uncached(state, id)
                };
                (id, delta)
            })
            .collect()
    }

    /// Delta-evaluates many aisle candidates in parallel.
    pub fn batch_aisle_deltas(
        &self,
        state: &SolutionState<'_, T>,
        ids: &[usize],
        add: bool,
    ) -> Vec<(usize, f64)> {
        ids.par_iter()
            .map(|&id| {
                let delta = if add {
                    self.delta_add_aisle_uncached(state, id)
                } else {
                    self.delta_remove_aisle_uncached(state, id)
                };
                (id, delta)
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// The aisle-count component of an aisle delta: the per-aisle cost plus
    /// the ratio term change, for a +1/-1 change in the visited count.
    #[inline]
    fn aisle_count_delta(&self, state: &SolutionState<'_, T>, sign: f64) -> f64 {
        let mut delta = sign * self.weights.cost_per_aisle;
        let orders = state.num_chosen_orders();
        if orders > 0 {
            delta += sign * self.weights.ratio_weight / orders as f64;
        }
        delta
    }

    /// Would the order be fully covered with the extra aisle described by
    /// `mask`?
    #[inline]
    fn covered_with_mask(state: &SolutionState<'_, T>, order_id: usize, mask: &FixedBitSet) -> bool {
        let demand = state.instance().order_demand(OrderIndex::new(order_id));
        let coverage = state.coverage_of(order_id);
        Self::covered_shifted(demand, coverage, mask, true)
    }

    /// Would the order still be fully covered without the aisle described by
    /// `mask`?
    #[inline]
    fn covered_without_mask(
        state: &SolutionState<'_, T>,
        order_id: usize,
        mask: &FixedBitSet,
    ) -> bool {
        let demand = state.instance().order_demand(OrderIndex::new(order_id));
        let coverage = state.coverage_of(order_id);
        Self::covered_shifted(demand, coverage, mask, false)
    }

    #[inline]
    fn covered_shifted(
        demand: &[ItemEntry<T>],
        coverage: &[u32],
        mask: &FixedBitSet,
        add: bool,
    ) -> bool {
        for (slot, entry) in demand.iter().enumerate() {
            let hit = u32::from(mask.contains(entry.item.get()));
            let count = if add {
                coverage[slot] + hit
            } else {
                coverage[slot].saturating_sub(hit)
            };
            if count < 1 {
                return false;
            }
        }
        true
    }

    fn covered_after_add_memo(
        &mut self,
        state: &SolutionState<'_, T>,
        order_id: usize,
        aisle_id: usize,
    ) -> bool {
        let key = (order_id, aisle_id);
        if let Some(&covered) = self.sim_add_covered.get(&key) {
            return covered;
        }
        let covered = Self::covered_with_mask(state, order_id, &self.aisle_masks[aisle_id]);
        self.sim_add_covered.insert(key, covered);
        covered
    }

    fn covered_after_remove_memo(
        &mut self,
        state: &SolutionState<'_, T>,
        order_id: usize,
        aisle_id: usize,
    ) -> bool {
        let key = (order_id, aisle_id);
        if let Some(&covered) = self.sim_remove_covered.get(&key) {
            return covered;
        }
        let covered = Self::covered_without_mask(state, order_id, &self.aisle_masks[aisle_id]);
        self.sim_remove_covered.insert(key, covered);
        covered
    }

    /// Drops stale cache generations. Delta caches are invalidated by any
    /// mutation (order counts feed the aisle ratio terms and coverage feeds
    /// the order penalties, so the two categories are coupled both ways); the
    /// simulated-coverage memo only depends on the coverage version.
    fn refresh_caches(&mut self, state: &SolutionState<'_, T>) {
        let stamp = CacheStamp::of(state);
        if self.cache_stamp != stamp {
            self.order_add.clear();
            self.order_remove.clear();
            self.aisle_add.clear();
            self.aisle_remove.clear();
            self.cache_stamp = stamp;
        }
        let sim_stamp = (state.state_id(), state.aisle_version());
        if self.sim_stamp != sim_stamp {
            self.sim_add_covered.clear();
            self.sim_remove_covered.clear();
            self.sim_stamp = sim_stamp;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pickwave_model::instance::InstanceBuilder;

    fn oi(i: usize) -> OrderIndex {
        OrderIndex::new(i)
    }

    fn ai(i: usize) -> AisleIndex {
        AisleIndex::new(i)
    }

    // Three orders, four items, three aisles with partial overlap.
    fn build_instance() -> Instance<u32> {
        let mut builder = InstanceBuilder::<u32>::new(4);
        builder.push_order([(0, 1), (1, 2)]);
        builder.push_order([(2, 3)]);
        builder.push_order([(1, 1), (3, 1)]);
        builder.push_aisle([(0, 5), (1, 5)]);
        builder.push_aisle([(2, 5)]);
        builder.push_aisle([(1, 2), (3, 2)]);
        builder.wave_bounds(1, 20);
        builder.build()
    }

    fn evaluator(instance: &Instance<u32>) -> SurrogateEvaluator<u32> {
        SurrogateEvaluator::new(instance, CostWeights::default())
    }

    /// Applies the delta/commit pair and checks the committed cost against a
    /// full recomputation.
    fn assert_cost_consistent(state: &mut SolutionState<'_, u32>, eval: &SurrogateEvaluator<u32>) {
        let incremental = state.current_cost();
        let mut fresh = state.clone();
        let full = eval.reevaluate(&mut fresh);
        if full.is_finite() {
            assert!(
                (incremental - full).abs() <= 1e-9 * (1.0 + full.abs()),
                "incremental cost {} diverged from full recompute {}",
                incremental,
                full
            );
        } else {
            assert!(!incremental.is_finite());
        }
    }

    #[test]
    fn test_empty_wave_costs_infinity() {
        let instance = build_instance();
        let eval = evaluator(&instance);
        let state = SolutionState::new(&instance, [], [ai(0)]);
        assert_eq!(eval.evaluate_cost(&state), f64::INFINITY);
    }

    #[test]
    fn test_full_cost_composition() {
        let instance = build_instance();
        let eval = evaluator(&instance);
        // Order 0 covered by aisle 0; order 1 uncovered (aisle 1 not chosen).
        let state = SolutionState::new(&instance, [oi(0), oi(1)], [ai(0)]);

        // One missing order + 1 aisle + ratio 1/2.
        let expected = 1_000.0 + 10.0 + 50.0 * 0.5;
        assert_eq!(eval.evaluate_cost(&state), expected);
    }

    #[test]
    fn test_delta_add_order_matches_full_recompute() {
        let instance = build_instance();
        let mut eval = evaluator(&instance);
        let mut state = SolutionState::new(&instance, [oi(0)], [ai(0)]);
        eval.reevaluate(&mut state);

        let before = state.current_cost();
        // Order 1 is uncovered: expect the missing penalty plus ratio change.
        let delta = eval.delta_add_order(&state, 1);
        state.apply_add_order(oi(1), delta);

        let mut fresh = state.clone();
        let full = eval.reevaluate(&mut fresh);
        assert!((before + delta - full).abs() <= 1e-9 * (1.0 + full.abs()));
    }

    #[test]
    fn test_delta_remove_last_order_is_infinite() {
        let instance = build_instance();
        let eval = evaluator(&instance);
        let state = SolutionState::new(&instance, [oi(0)], [ai(0)]);
        assert_eq!(eval.delta_remove_order_uncached(&state, 0), f64::INFINITY);
    }

    #[test]
    fn test_delta_add_aisle_flips_uncovered_order() {
        let instance = build_instance();
        let mut eval = evaluator(&instance);
        let mut state = SolutionState::new(&instance, [oi(0), oi(1)], [ai(0)]);
        eval.reevaluate(&mut state);

        // Adding aisle 1 covers order 1 (item 2): -penalty +aisle +ratio.
        let expected = -1_000.0 + 10.0 + 50.0 / 2.0;
        let delta = eval.delta_add_aisle(&state, 1);
        assert!((delta - expected).abs() < 1e-9, "delta was {}", delta);

        state.apply_add_aisle(ai(1), delta);
        assert_cost_consistent(&mut state, &eval);
    }

    #[test]
    fn test_delta_remove_aisle_matches_full_recompute() {
        let instance = build_instance();
        let mut eval = evaluator(&instance);
        let mut state = SolutionState::new(&instance, [oi(0), oi(1)], [ai(0), ai(1)]);
        eval.reevaluate(&mut state);

        let delta = eval.delta_remove_aisle(&state, 1);
        state.apply_remove_aisle(ai(1), delta);
        assert_cost_consistent(&mut state, &eval);
    }

    #[test]
    fn test_delta_swap_aisle_uses_post_removal_state() {
        let instance = build_instance();
        let mut eval = evaluator(&instance);
        // Order 2 demands items 1 and 3. Aisle 0 stocks item 1, aisle 2
        // stocks both. Swapping 0 -> 2 keeps item 1 covered through aisle 2.
        let mut state = SolutionState::new(&instance, [oi(2)], [ai(0)]);
        eval.reevaluate(&mut state);

        let swap_delta = eval.delta_swap_aisle(&state, 0, 2);

        // Committing the same swap sequentially must realize the same total.
        let before = state.current_cost();
        let committed = eval.apply_swap_aisle(&mut state, ai(0), ai(2));
        let mut fresh = state.clone();
        let full = eval.reevaluate(&mut fresh);

        assert!((swap_delta - committed).abs() <= 1e-9);
        assert!((before + committed - full).abs() <= 1e-9 * (1.0 + full.abs()));
    }

    #[test]
    fn test_delta_swap_aisle_degenerate_inputs_are_zero() {
        let instance = build_instance();
        let eval = evaluator(&instance);
        let state = SolutionState::new(&instance, [oi(0)], [ai(0)]);

        assert_eq!(eval.delta_swap_aisle(&state, 0, 0), 0.0); // same aisle
        assert_eq!(eval.delta_swap_aisle(&state, 1, 2), 0.0); // remove not chosen

        let both = SolutionState::new(&instance, [oi(0)], [ai(0), ai(2)]);
        assert_eq!(eval.delta_swap_aisle(&both, 0, 2), 0.0); // add already chosen
    }

    #[test]
    fn test_delta_swap_orders_requires_exactly_one_chosen() {
        let instance = build_instance();
        let eval = evaluator(&instance);
        let state = SolutionState::new(&instance, [oi(0), oi(1)], [ai(0), ai(1)]);

        assert_eq!(eval.delta_swap_orders(&state, 0, 1), 0.0); // both chosen
        let delta = eval.delta_swap_orders(&state, 0, 2);
        let expected = eval.delta_remove_order_uncached(&state, 0)
            + eval.delta_add_order_uncached(&state, 2);
        assert_eq!(delta, expected);
    }

    #[test]
    fn test_cached_deltas_survive_repeat_queries_and_invalidate_on_mutation() {
        let instance = build_instance();
        let mut eval = evaluator(&instance);
        let mut state = SolutionState::new(&instance, [oi(0)], [ai(0)]);
        eval.reevaluate(&mut state);

        let first = eval.delta_add_order(&state, 1);
        let second = eval.delta_add_order(&state, 1);
        assert_eq!(first, second, "repeat query must hit the cache");

        // Mutating the state must not leak the stale delta.
        state.apply_add_aisle(ai(1), eval.delta_add_aisle(&state, 1));
        let refreshed = eval.delta_add_order(&state, 1);
        assert!(
            (refreshed - eval.delta_add_order_uncached(&state, 1)).abs() <= 1e-12,
            "cache must be refreshed after a mutation"
        );
        assert_ne!(first, refreshed, "aisle 1 covers order 1, delta must drop");
    }

    #[test]
    fn test_batch_deltas_match_sequential() {
        let instance = build_instance();
        let eval = evaluator(&instance);
        let state = SolutionState::new(&instance, [oi(0), oi(1)], [ai(0)]);

        let ids: Vec<usize> = (0..instance.num_aisles()).collect();
        let batched = eval.batch_aisle_deltas(&state, &ids, true);
        for (id, delta) in batched {
            assert_eq!(delta, eval.delta_add_aisle_uncached(&state, id));
        }

        let order_ids: Vec<usize> = (0..instance.num_orders()).collect();
        let batched = eval.batch_order_deltas(&state, &order_ids, false);
        for (id, delta) in batched {
            assert_eq!(delta, eval.delta_remove_order_uncached(&state, id));
        }
    }

    #[test]
    fn test_chained_deltas_do_not_drift() {
        let instance = build_instance();
        let mut eval = evaluator(&instance);
        let mut state = SolutionState::new(&instance, [oi(0)], [ai(0)]);
        eval.reevaluate(&mut state);

        // A fixed walk through adds/removes/swaps across both categories.
        let add_o = eval.delta_add_order(&state, 1);
        state.apply_add_order(oi(1), add_o);
        let add_a = eval.delta_add_aisle(&state, 1);
        state.apply_add_aisle(ai(1), add_a);
        eval.apply_swap_aisle(&mut state, ai(0), ai(2));
        let add_o2 = eval.delta_add_order(&state, 2);
        state.apply_add_order(oi(2), add_o2);
        let rm = eval.delta_remove_order(&state, 1);
        state.apply_remove_order(oi(1), rm);

        assert_cost_consistent(&mut state, &eval);
    }
}
