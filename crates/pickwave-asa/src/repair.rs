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

//! Feasibility validation and set-cover repair.
//!
//! During the search, feasibility is presence-based: a solution is feasible
//! when every demanded item of every chosen order is stocked (with positive
//! units) by at least one visited aisle. The validator keeps one bitset of
//! stocked items per aisle and answers feasibility queries by unioning the
//! visited masks — deliberately independent of the solution's incremental
//! coverage counters, so it stays trustworthy even at drift-suspected points.
//!
//! `repair` covers the uncovered (order, item) pairs with a greedy set-cover
//! pass and then prunes redundant aisles in ascending id order; the prune runs
//! unconditionally, so an already-feasible but wasteful aisle set still gets
//! tightened. `remove_infeasible_orders` applies the stricter per-unit rule
//! (an order whose demanded units exceed the units available across the
//! visited aisles can never be satisfied, no matter what the presence masks
//! say). The per-unit wave-bound gate lives in the solver facade.

use crate::{eval::SurrogateEvaluator, state::SolutionState};
use fixedbitset::FixedBitSet;
use pickwave_core::num::UnitNumeric;
use pickwave_model::{
    index::{AisleIndex, OrderIndex},
    instance::Instance,
};
use std::collections::HashSet;

/// Presence-based feasibility checks and greedy repair for solution states.
#[derive(Debug, Clone)]
pub struct Validator<T>
where
    T: UnitNumeric,
{
    /// Per-aisle bitset of stocked items (positive units only).
    aisle_masks: Vec<FixedBitSet>,
    num_items: usize,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Validator<T>
where
    T: UnitNumeric,
{
    /// Creates a validator for the given instance.
    pub fn new(instance: &Instance<T>) -> Self {
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
            aisle_masks,
            num_items: instance.num_items(),
            _phantom: std::marker::PhantomData,
        }
    }

    /// The union of the stocked-item masks over the visited aisles.
    fn union_mask(&self, state: &SolutionState<'_, T>) -> FixedBitSet {
        let mut union = FixedBitSet::with_capacity(self.num_items);
        for aisle_id in state.chosen_aisle_ids() {
            union.union_with(&self.aisle_masks[aisle_id]);
        }
        union
    }

    /// Returns `true` if every demanded item of every chosen order is stocked
    /// by at least one visited aisle.
    pub fn is_feasible(&self, state: &SolutionState<'_, T>) -> bool {
        let union = self.union_mask(state);
        let instance = state.instance();
        for order_id in state.chosen_order_ids() {
            let demand = instance.order_demand(OrderIndex::new(order_id));
            if demand
                .iter()
                .any(|entry| !union.contains(entry.item.get()))
            {
                return false;
            }
        }
        true
    }

    /// Returns the fraction of chosen orders that are fully covered
    /// (presence-based). `0.0` for an empty wave.
    pub fn coverage_quality(&self, state: &SolutionState<'_, T>) -> f64 {
        if state.num_chosen_orders() == 0 {
            return 0.0;
        }
        let union = self.union_mask(state);
        let instance = state.instance();
        let mut fully_covered = 0usize;
        for order_id in state.chosen_order_ids() {
            let demand = instance.order_demand(OrderIndex::new(order_id));
            if demand
                .iter()
                .all(|entry| union.contains(entry.item.get()))
            {
                fully_covered += 1;
            }
        }
        fully_covered as f64 / state.num_chosen_orders() as f64
    }

    /// Repairs the state towards presence feasibility.
    ///
    /// 1. Collects the universe of uncovered (order, item) pairs.
    /// 2. Greedy set-cover: repeatedly visits the unvisited aisle covering the
    ///    most remaining pairs (smallest id wins ties) until the universe is
    ///    empty or no aisle contributes.
    /// 3. Prune pass, unconditionally: tentatively leaves each visited aisle
    ///    in ascending id order and keeps it out if the state stays feasible.
    ///
    /// Returns `true` if the state is feasible afterwards. On failure the
    /// partial cover produced so far is left in place.
    pub fn repair(
        &self,
        state: &mut SolutionState<'_, T>,
        eval: &mut SurrogateEvaluator<T>,
    ) -> bool {
        let instance = state.instance();

        // 1. Universe of uncovered pairs.
        let union = self.union_mask(state);
        let mut universe: HashSet<(usize, usize)> = HashSet::new();
        for order_id in state.chosen_order_ids() {
            let demand = instance.order_demand(OrderIndex::new(order_id));
            for entry in demand {
                let item = entry.item.get();
                if !union.contains(item) {
                    universe.insert((order_id, item));
                }
            }
        }

        // 2. Greedy cover.
        if !universe.is_empty() {
            // Candidate contributions, ascending aisle id for determinism.
            let mut contributions: Vec<(usize, HashSet<(usize, usize)>)> = Vec::new();
            for aisle_id in state.unchosen_aisle_ids() {
                let mask = &self.aisle_masks[aisle_id];
                let mut pairs = HashSet::new();
                for &order_id in state.aisle_to_orders(aisle_id) {
                    if !state.contains_order(OrderIndex::new(order_id)) {
                        continue;
                    }
                    let demand = instance.order_demand(OrderIndex::new(order_id));
                    for entry in demand {
                        let item = entry.item.get();
                        if mask.contains(item) && universe.contains(&(order_id, item)) {
                            pairs.insert((order_id, item));
                        }
                    }
                }
                if !pairs.is_empty() {
                    contributions.push((aisle_id, pairs));
                }
            }

            while !universe.is_empty() && !contributions.is_empty() {
                let mut best_slot = 0;
                let mut best_len = 0;
                for (slot, (_, pairs)) in contributions.iter().enumerate() {
                    if pairs.len() > best_len {
                        best_len = pairs.len();
                        best_slot = slot;
                    }
                }
                if best_len == 0 {
                    break;
                }

                let (aisle_id, covered) = contributions.swap_remove(best_slot);
                eval.apply_add_aisle(state, AisleIndex::new(aisle_id));
                for pair in &covered {
                    universe.remove(pair);
                }
                for (_, pairs) in &mut contributions {
                    pairs.retain(|pair| !covered.contains(pair));
                }
                contributions.retain(|(_, pairs)| !pairs.is_empty());
            }
        }

        // 3. Prune pass (ascending aisle id, deterministic).
        let visited: Vec<usize> = state.chosen_aisle_ids().collect();
        for aisle_id in visited {
            eval.apply_remove_aisle(state, AisleIndex::new(aisle_id));
            if !self.is_feasible(state) {
                eval.apply_add_aisle(state, AisleIndex::new(aisle_id));
            }
        }

        self.is_feasible(state)
    }

    /// Drops every chosen order whose demand cannot be met even with all
    /// currently visited aisles, under the per-unit rule: for some demanded
    /// item, the demanded units exceed the total units stocked across the
    /// visited aisles. Returns the number of orders removed.
    pub fn remove_infeasible_orders(
        &self,
        state: &mut SolutionState<'_, T>,
        eval: &mut SurrogateEvaluator<T>,
    ) -> usize {
        let instance = state.instance();

        // Units available per item over the visited aisles.
        let mut available = vec![T::zero(); self.num_items];
        for aisle_id in state.chosen_aisle_ids() {
            for entry in instance.aisle_stock(AisleIndex::new(aisle_id)) {
                let item = entry.item.get();
                available[item] = available[item].saturating_add(entry.units);
            }
        }

        let doomed: Vec<usize> = state
            .chosen_order_ids()
            .filter(|&order_id| {
                instance
                    .order_demand(OrderIndex::new(order_id))
                    .iter()
                    .any(|entry| entry.units > available[entry.item.get()])
            })
            .collect();

        for order_id in &doomed {
            eval.apply_remove_order(state, OrderIndex::new(*order_id));
        }
        doomed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::CostWeights;
    use pickwave_model::instance::InstanceBuilder;

    fn oi(i: usize) -> OrderIndex {
        OrderIndex::new(i)
    }

    fn ai(i: usize) -> AisleIndex {
        AisleIndex::new(i)
    }

    fn setup(instance: &Instance<u32>) -> (Validator<u32>, SurrogateEvaluator<u32>) {
        (
            Validator::new(instance),
            SurrogateEvaluator::new(instance, CostWeights::default()),
        )
    }

    #[test]
    fn test_feasibility_requires_presence_of_every_item() {
        let mut builder = InstanceBuilder::<u32>::new(2);
        builder.push_order([(0, 2), (1, 2)]);
        builder.push_aisle([(0, 2)]);
        builder.push_aisle([(1, 2)]);
        builder.wave_bounds(4, 4);
        let instance = builder.build();
        let (validator, _) = setup(&instance);

        let partial = SolutionState::new(&instance, [oi(0)], [ai(0)]);
        assert!(!validator.is_feasible(&partial));

        let full = SolutionState::new(&instance, [oi(0)], [ai(0), ai(1)]);
        assert!(validator.is_feasible(&full));
    }

    #[test]
    fn test_repair_adds_the_missing_aisle() {
        // Two-aisle cover scenario: the order needs both aisles.
        let mut builder = InstanceBuilder::<u32>::new(2);
        builder.push_order([(0, 2), (1, 2)]);
        builder.push_aisle([(0, 2)]);
        builder.push_aisle([(1, 2)]);
        builder.wave_bounds(4, 4);
        let instance = builder.build();
        let (validator, mut eval) = setup(&instance);

        let mut state = SolutionState::new(&instance, [oi(0)], [ai(0)]);
        eval.reevaluate(&mut state);

        assert!(validator.repair(&mut state, &mut eval));
        assert!(state.contains_aisle(ai(0)));
        assert!(state.contains_aisle(ai(1)));
        assert!(validator.is_feasible(&state));
    }

    #[test]
    fn test_repair_prunes_redundant_aisles_even_when_feasible() {
        // Redundant aisle prune scenario: both aisles stock the only item.
        let mut builder = InstanceBuilder::<u32>::new(1);
        builder.push_order([(0, 1)]);
        builder.push_aisle([(0, 5)]);
        builder.push_aisle([(0, 5)]);
        builder.wave_bounds(1, 1);
        let instance = builder.build();
        let (validator, mut eval) = setup(&instance);

        let mut state = SolutionState::new(&instance, [oi(0)], [ai(0), ai(1)]);
        eval.reevaluate(&mut state);

        assert!(validator.repair(&mut state, &mut eval));
        assert_eq!(
            state.num_chosen_aisles(),
            1,
            "one of the two redundant aisles must be pruned"
        );
        assert!(validator.is_feasible(&state));
    }

    #[test]
    fn test_repair_reports_failure_on_unsatisfiable_demand() {
        // No aisle stocks item 1 at all.
        let mut builder = InstanceBuilder::<u32>::new(2);
        builder.push_order([(0, 1), (1, 1)]);
        builder.push_aisle([(0, 5)]);
        builder.wave_bounds(1, 2);
        let instance = builder.build();
        let (validator, mut eval) = setup(&instance);

        let mut state = SolutionState::new(&instance, [oi(0)], []);
        eval.reevaluate(&mut state);

        assert!(!validator.repair(&mut state, &mut eval));
        assert!(!validator.is_feasible(&state));
    }

    #[test]
    fn test_repair_keeps_committed_cost_consistent() {
        let mut builder = InstanceBuilder::<u32>::new(3);
        builder.push_order([(0, 1), (1, 1)]);
        builder.push_order([(2, 2)]);
        builder.push_aisle([(0, 2)]);
        builder.push_aisle([(1, 2), (2, 2)]);
        builder.push_aisle([(2, 1)]);
        builder.wave_bounds(1, 10);
        let instance = builder.build();
        let (validator, mut eval) = setup(&instance);

        let mut state = SolutionState::new(&instance, [oi(0), oi(1)], []);
        eval.reevaluate(&mut state);
        assert!(validator.repair(&mut state, &mut eval));

        let incremental = state.current_cost();
        let mut fresh = state.clone();
        let full = eval.reevaluate(&mut fresh);
        assert!(
            (incremental - full).abs() <= 1e-9 * (1.0 + full.abs()),
            "repair must keep the delta-maintained cost in sync ({} vs {})",
            incremental,
            full
        );
    }

    #[test]
    fn test_remove_infeasible_orders_applies_per_unit_rule() {
        // Infeasible eviction scenario: order 1 demands 10 units, the only
        // visited aisle stocks 3.
        let mut builder = InstanceBuilder::<u32>::new(1);
        builder.push_order([(0, 1)]);
        builder.push_order([(0, 10)]);
        builder.push_aisle([(0, 3)]);
        builder.wave_bounds(1, 10);
        let instance = builder.build();
        let (validator, mut eval) = setup(&instance);

        let mut state = SolutionState::new(&instance, [oi(0), oi(1)], [ai(0)]);
        eval.reevaluate(&mut state);

        let removed = validator.remove_infeasible_orders(&mut state, &mut eval);
        assert_eq!(removed, 1);
        assert!(state.contains_order(oi(0)));
        assert!(!state.contains_order(oi(1)));
        assert!(validator.is_feasible(&state));
    }

    #[test]
    fn test_coverage_quality_counts_fully_covered_orders() {
        let mut builder = InstanceBuilder::<u32>::new(2);
        builder.push_order([(0, 1)]);
        builder.push_order([(1, 1)]);
        builder.push_aisle([(0, 1)]);
        builder.wave_bounds(1, 2);
        let instance = builder.build();
        let (validator, _) = setup(&instance);

        let empty = SolutionState::new(&instance, [], [ai(0)]);
        assert_eq!(validator.coverage_quality(&empty), 0.0);

        let half = SolutionState::new(&instance, [oi(0), oi(1)], [ai(0)]);
        assert_eq!(validator.coverage_quality(&half), 0.5);
    }
}
