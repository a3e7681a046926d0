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

//! The mutable working solution of the wave-picking search.
//!
//! `SolutionState` owns the chosen order and aisle sets, the per-(order, item)
//! coverage counters, and the cached surrogate cost. It holds a non-owning
//! handle to the immutable `Instance` and derives the order/aisle adjacency
//! maps once at construction.
//!
//! Coverage counters depend only on the chosen aisles: `coverage[o][k]` is the
//! number of chosen aisles stocking the k-th demanded item of order `o`,
//! maintained for every order of the instance (chosen or not) so candidate
//! insertions can be delta-evaluated without touching the aisle set. Aisle
//! mutations shift the affected counters incrementally; `update_coverage`
//! rebuilds them from scratch and restores the invariant unconditionally.
//!
//! Two version counters (`order_version`, `aisle_version`) are bumped on the
//! corresponding mutations. The evaluator stamps its delta caches with these
//! versions, so a stale cache can never leak a delta that was computed against
//! a different state snapshot.

use pickwave_core::num::UnitNumeric;
use pickwave_model::{
    index::{AisleIndex, OrderIndex},
    instance::Instance,
};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of unique state identities. Clones receive a fresh id so evaluator
/// caches can never mix deltas across diverged copies.
static NEXT_STATE_ID: AtomicU64 = AtomicU64::new(1);

#[inline]
fn next_state_id() -> u64 {
    NEXT_STATE_ID.fetch_add(1, Ordering::Relaxed)
}

/// The mutable working solution: chosen orders, chosen aisles, coverage
/// counters, and the delta-maintained surrogate cost.
///
/// The cost field is tagged "unknown" with `f64::INFINITY` until the first
/// full evaluation; an empty wave also evaluates to infinity, so reading the
/// cost through the evaluator transparently re-evaluates in both cases.
pub struct SolutionState<'a, T>
where
    T: UnitNumeric,
{
    instance: &'a Instance<T>,
    state_id: u64,
    chosen_orders: Vec<bool>,
    chosen_aisles: Vec<bool>,
    num_chosen_orders: usize,
    num_chosen_aisles: usize,
    /// `coverage[o][k]` counts the chosen aisles stocking the k-th demanded
    /// item of order `o`.
    coverage: Vec<Vec<u32>>,
    order_to_aisles: Vec<Vec<usize>>,
    aisle_to_orders: Vec<Vec<usize>>,
    current_cost: f64,
    order_version: u64,
    aisle_version: u64,
    // Item-stamp scratch for incremental coverage shifts.
    item_epoch: Vec<u64>,
    epoch: u64,
}

impl<'a, T> SolutionState<'a, T>
where
    T: UnitNumeric,
{
    /// Creates a new solution state over the given instance with the given
    /// initial chosen sets. The adjacency maps are derived from the instance
    /// and the coverage counters are rebuilt from the chosen aisles.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if any id is outside the instance's dense id
    /// domain.
    pub fn new<O, A>(instance: &'a Instance<T>, orders: O, aisles: A) -> Self
    where
        O: IntoIterator<Item = OrderIndex>,
        A: IntoIterator<Item = AisleIndex>,
    {
        let adjacency = instance.compute_adjacency();
        let coverage = (0..instance.num_orders())
            .map(|o| vec![0u32; instance.order_demand(OrderIndex::new(o)).len()])
            .collect();

        let mut state = Self {
            instance,
            state_id: next_state_id(),
            chosen_orders: vec![false; instance.num_orders()],
            chosen_aisles: vec![false; instance.num_aisles()],
            num_chosen_orders: 0,
            num_chosen_aisles: 0,
            coverage,
            order_to_aisles: adjacency.order_to_aisles,
            aisle_to_orders: adjacency.aisle_to_orders,
            current_cost: f64::INFINITY,
            order_version: 0,
            aisle_version: 0,
            item_epoch: vec![0; instance.num_items()],
            epoch: 0,
        };

        for order in orders {
            let id = order.get();
            debug_assert!(
                id < instance.num_orders(),
                "called `SolutionState::new` with order index out of bounds: the len is {} but the index is {}",
                instance.num_orders(),
                id
            );
            if !state.chosen_orders[id] {
                state.chosen_orders[id] = true;
                state.num_chosen_orders += 1;
            }
        }
        for aisle in aisles {
            let id = aisle.get();
            debug_assert!(
                id < instance.num_aisles(),
                "called `SolutionState::new` with aisle index out of bounds: the len is {} but the index is {}",
                instance.num_aisles(),
                id
            );
            if !state.chosen_aisles[id] {
                state.chosen_aisles[id] = true;
                state.num_chosen_aisles += 1;
            }
        }

        state.update_coverage();
        state
    }

    /// Returns the instance this state belongs to.
    #[inline]
    pub fn instance(&self) -> &'a Instance<T> {
        self.instance
    }

    /// Returns the number of chosen orders.
    #[inline]
    pub fn num_chosen_orders(&self) -> usize {
        self.num_chosen_orders
    }

    /// Returns the number of chosen aisles.
    #[inline]
    pub fn num_chosen_aisles(&self) -> usize {
        self.num_chosen_aisles
    }

    /// Returns `true` if the given order is part of the wave.
    #[inline]
    pub fn contains_order(&self, order: OrderIndex) -> bool {
        self.chosen_orders[order.get()]
    }

    /// Returns `true` if the given aisle is visited.
    #[inline]
    pub fn contains_aisle(&self, aisle: AisleIndex) -> bool {
        self.chosen_aisles[aisle.get()]
    }

    /// Iterates the chosen order ids in ascending order.
    #[inline]
    pub fn chosen_order_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.chosen_orders
            .iter()
            .enumerate()
            .filter_map(|(id, &chosen)| chosen.then_some(id))
    }

    /// Iterates the order ids not in the wave, ascending.
    #[inline]
    pub fn unchosen_order_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.chosen_orders
            .iter()
            .enumerate()
            .filter_map(|(id, &chosen)| (!chosen).then_some(id))
    }

    /// Iterates the chosen aisle ids in ascending order.
    #[inline]
    pub fn chosen_aisle_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.chosen_aisles
            .iter()
            .enumerate()
            .filter_map(|(id, &chosen)| chosen.then_some(id))
    }

    /// Iterates the aisle ids not visited, ascending.
    #[inline]
    pub fn unchosen_aisle_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.chosen_aisles
            .iter()
            .enumerate()
            .filter_map(|(id, &chosen)| (!chosen).then_some(id))
    }

    /// Returns the aisles whose stock intersects the demand set of the order.
    #[inline]
    pub fn order_to_aisles(&self, order_id: usize) -> &[usize] {
        &self.order_to_aisles[order_id]
    }

    /// Returns the orders whose demand set intersects the stock of the aisle.
    #[inline]
    pub fn aisle_to_orders(&self, aisle_id: usize) -> &[usize] {
        &self.aisle_to_orders[aisle_id]
    }

    /// Returns the coverage counters of the order, aligned with its demand
    /// list.
    #[inline]
    pub fn coverage_of(&self, order_id: usize) -> &[u32] {
        &self.coverage[order_id]
    }

    /// Returns `true` if every demanded item of the order is stocked by at
    /// least one chosen aisle.
    #[inline]
    pub fn is_order_covered(&self, order_id: usize) -> bool {
        self.coverage[order_id].iter().all(|&count| count >= 1)
    }

    /// Returns the cached surrogate cost. `f64::INFINITY` means "unknown or
    /// empty wave"; use the evaluator to read a refreshed value.
    #[inline]
    pub fn current_cost(&self) -> f64 {
        self.current_cost
    }

    /// Overwrites the cached surrogate cost.
    #[inline]
    pub fn set_cost(&mut self, cost: f64) {
        self.current_cost = cost;
    }

    /// Returns the unique identity of this state. Clones carry a fresh id.
    #[inline]
    pub fn state_id(&self) -> u64 {
        self.state_id
    }

    /// Returns the order-mutation version counter.
    #[inline]
    pub fn order_version(&self) -> u64 {
        self.order_version
    }

    /// Returns the aisle-mutation version counter. This doubles as the
    /// coverage version: coverage counters change exactly when this does.
    #[inline]
    pub fn aisle_version(&self) -> u64 {
        self.aisle_version
    }

    /// Total demanded units over the chosen orders.
    pub fn total_picked_units(&self) -> T {
        let mut total = T::zero();
        for id in 0..self.chosen_orders.len() {
            if self.chosen_orders[id] {
                total = total.saturating_add(self.instance.order_units(OrderIndex::new(id)));
            }
        }
        total
    }

    /// Inserts an order into the wave, adding the stored cost delta. No-op if
    /// the order is already chosen. Coverage counters are not affected (they
    /// depend only on the chosen aisles).
    pub fn apply_add_order(&mut self, order: OrderIndex, delta: f64) {
        let id = order.get();
        debug_assert!(
            id < self.chosen_orders.len(),
            "called `SolutionState::apply_add_order` with order index out of bounds: the len is {} but the index is {}",
            self.chosen_orders.len(),
            id
        );

        if self.chosen_orders[id] {
            return;
        }
        self.chosen_orders[id] = true;
        self.num_chosen_orders += 1;
        self.current_cost += delta;
        self.order_version += 1;
    }

    /// Removes an order from the wave, adding the stored cost delta. No-op if
    /// the order is not chosen.
    pub fn apply_remove_order(&mut self, order: OrderIndex, delta: f64) {
        let id = order.get();
        debug_assert!(
            id < self.chosen_orders.len(),
            "called `SolutionState::apply_remove_order` with order index out of bounds: the len is {} but the index is {}",
            self.chosen_orders.len(),
            id
        );

        if !self.chosen_orders[id] {
            return;
        }
        self.chosen_orders[id] = false;
        self.num_chosen_orders -= 1;
        self.current_cost += delta;
        self.order_version += 1;
    }

    /// Visits an aisle, incrementing the coverage counters of every (order,
    /// item) pair the aisle stocks, and adding the stored cost delta. No-op if
    /// the aisle is already visited.
    pub fn apply_add_aisle(&mut self, aisle: AisleIndex, delta: f64) {
        let id = aisle.get();
        debug_assert!(
            id < self.chosen_aisles.len(),
            "called `SolutionState::apply_add_aisle` with aisle index out of bounds: the len is {} but the index is {}",
            self.chosen_aisles.len(),
            id
        );

        if self.chosen_aisles[id] {
            return;
        }
        self.chosen_aisles[id] = true;
        self.num_chosen_aisles += 1;
        self.shift_coverage_for_aisle(id, true);
        self.current_cost += delta;
        self.aisle_version += 1;
    }

    /// Leaves an aisle, decrementing the affected coverage counters and adding
    /// the stored cost delta. No-op if the aisle is not visited.
    pub fn apply_remove_aisle(&mut self, aisle: AisleIndex, delta: f64) {
        let id = aisle.get();
        debug_assert!(
            id < self.chosen_aisles.len(),
            "called `SolutionState::apply_remove_aisle` with aisle index out of bounds: the len is {} but the index is {}",
            self.chosen_aisles.len(),
            id
        );

        if !self.chosen_aisles[id] {
            return;
        }
        self.chosen_aisles[id] = false;
        self.num_chosen_aisles -= 1;
        self.shift_coverage_for_aisle(id, false);
        self.current_cost += delta;
        self.aisle_version += 1;
    }

    /// Rebuilds all coverage counters from the chosen aisles. Restores the
    /// coverage invariant unconditionally; used after bulk operations and at
    /// drift-suspected points.
    pub fn update_coverage(&mut self) {
        for counters in &mut self.coverage {
            counters.fill(0);
        }
        for aisle_id in 0..self.chosen_aisles.len() {
            if self.chosen_aisles[aisle_id] {
                self.shift_coverage_for_aisle(aisle_id, true);
            }
        }
    }

    /// Shifts the coverage counters touched by one aisle by +1/-1.
    fn shift_coverage_for_aisle(&mut self, aisle_id: usize, increment: bool) {
        let instance = self.instance;

        // Stamp the aisle's stocked items, then walk only the adjacent orders'
        // short demand lists.
        self.epoch += 1;
        let epoch = self.epoch;
        for entry in instance.aisle_stock(AisleIndex::new(aisle_id)) {
            self.item_epoch[entry.item.get()] = epoch;
        }

        for idx in 0..self.aisle_to_orders[aisle_id].len() {
            let order_id = self.aisle_to_orders[aisle_id][idx];
            let demand = instance.order_demand(OrderIndex::new(order_id));
            for (slot, entry) in demand.iter().enumerate() {
                if self.item_epoch[entry.item.get()] == epoch {
                    if increment {
                        self.coverage[order_id][slot] += 1;
                    } else {
                        debug_assert!(
                            self.coverage[order_id][slot] > 0,
                            "called `SolutionState::apply_remove_aisle` with a coverage counter underflow for order {} slot {}",
                            order_id,
                            slot
                        );
                        self.coverage[order_id][slot] -= 1;
                    }
                }
            }
        }
    }

    /// Returns a stable signature of the chosen sets, suitable for memo keys
    /// and tabu bookkeeping.
    pub fn signature(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

impl<'a, T> Clone for SolutionState<'a, T>
where
    T: UnitNumeric,
{
    /// Deep copy. The clone owns independent sets and counters and receives a
    /// fresh state identity.
    fn clone(&self) -> Self {
        Self {
            instance: self.instance,
            state_id: next_state_id(),
            chosen_orders: self.chosen_orders.clone(),
            chosen_aisles: self.chosen_aisles.clone(),
            num_chosen_orders: self.num_chosen_orders,
            num_chosen_aisles: self.num_chosen_aisles,
            coverage: self.coverage.clone(),
            order_to_aisles: self.order_to_aisles.clone(),
            aisle_to_orders: self.aisle_to_orders.clone(),
            current_cost: self.current_cost,
            order_version: self.order_version,
            aisle_version: self.aisle_version,
            item_epoch: self.item_epoch.clone(),
            epoch: self.epoch,
        }
    }
}

impl<'a, T> PartialEq for SolutionState<'a, T>
where
    T: UnitNumeric,
{
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.instance, other.instance)
            && self.chosen_orders == other.chosen_orders
            && self.chosen_aisles == other.chosen_aisles
    }
}

impl<'a, T> Eq for SolutionState<'a, T> where T: UnitNumeric {}

impl<'a, T> Hash for SolutionState<'a, T>
where
    T: UnitNumeric,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        for id in self.chosen_order_ids() {
            id.hash(state);
        }
        usize::MAX.hash(state); // separator between the two id spaces
        for id in self.chosen_aisle_ids() {
            id.hash(state);
        }
    }
}

impl<'a, T> std::fmt::Debug for SolutionState<'a, T>
where
    T: UnitNumeric,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SolutionState(orders: {:?}, aisles: {:?}, cost: {})",
            self.chosen_order_ids().collect::<Vec<_>>(),
            self.chosen_aisle_ids().collect::<Vec<_>>(),
            if self.current_cost.is_finite() {
                format!("{:.2}", self.current_cost)
            } else {
                "INF".to_string()
            }
        )
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

    // Two orders over three items, three aisles with overlapping stock.
    fn build_instance() -> Instance<u32> {
        let mut builder = InstanceBuilder::<u32>::new(3);
        builder.push_order([(0, 1), (1, 2)]);
        builder.push_order([(2, 3)]);
        builder.push_aisle([(0, 5)]);
        builder.push_aisle([(1, 5), (2, 5)]);
        builder.push_aisle([(0, 1), (2, 1)]);
        builder.wave_bounds(1, 10);
        builder.build()
    }

    #[test]
    fn test_new_initializes_coverage_from_chosen_aisles() {
        let instance = build_instance();
        let state = SolutionState::new(&instance, [oi(0)], [ai(0), ai(1)]);

        // Order 0 demands items 0 and 1: aisle 0 covers item 0, aisle 1
        // covers item 1.
        assert_eq!(state.coverage_of(0), &[1, 1]);
        assert!(state.is_order_covered(0));
        // Order 1 demands item 2, covered once by aisle 1 even though the
        // order is not chosen: counters depend only on aisles.
        assert_eq!(state.coverage_of(1), &[1]);
        assert_eq!(state.num_chosen_orders(), 1);
        assert_eq!(state.num_chosen_aisles(), 2);
    }

    #[test]
    fn test_apply_add_order_is_idempotent_and_coverage_neutral() {
        let instance = build_instance();
        let mut state = SolutionState::new(&instance, [], [ai(0)]);
        state.set_cost(10.0);

        let coverage_before = state.coverage_of(0).to_vec();
        state.apply_add_order(oi(0), 2.5);
        assert_eq!(state.num_chosen_orders(), 1);
        assert_eq!(state.current_cost(), 12.5);
        assert_eq!(state.coverage_of(0), &coverage_before[..]);

        // Second add is a no-op and must not re-apply the delta.
        state.apply_add_order(oi(0), 2.5);
        assert_eq!(state.num_chosen_orders(), 1);
        assert_eq!(state.current_cost(), 12.5);
    }

    #[test]
    fn test_apply_remove_order_on_absent_id_is_noop() {
        let instance = build_instance();
        let mut state = SolutionState::new(&instance, [], []);
        state.set_cost(1.0);
        state.apply_remove_order(oi(1), -5.0);
        assert_eq!(state.num_chosen_orders(), 0);
        assert_eq!(state.current_cost(), 1.0);
    }

    #[test]
    fn test_aisle_round_trip_restores_coverage_exactly() {
        let instance = build_instance();
        let mut state = SolutionState::new(&instance, [oi(0), oi(1)], [ai(0)]);
        state.set_cost(0.0);

        let before: Vec<Vec<u32>> = (0..2).map(|o| state.coverage_of(o).to_vec()).collect();
        state.apply_add_aisle(ai(2), 1.0);
        state.apply_remove_aisle(ai(2), -1.0);
        let after: Vec<Vec<u32>> = (0..2).map(|o| state.coverage_of(o).to_vec()).collect();

        assert_eq!(before, after, "add/remove aisle must restore counters");
        assert_eq!(state.current_cost(), 0.0);
    }

    #[test]
    fn test_incremental_coverage_matches_full_rebuild() {
        let instance = build_instance();
        let mut state = SolutionState::new(&instance, [oi(0), oi(1)], []);
        state.apply_add_aisle(ai(1), 0.0);
        state.apply_add_aisle(ai(2), 0.0);
        state.apply_remove_aisle(ai(1), 0.0);

        let incremental: Vec<Vec<u32>> = (0..2).map(|o| state.coverage_of(o).to_vec()).collect();
        state.update_coverage();
        let rebuilt: Vec<Vec<u32>> = (0..2).map(|o| state.coverage_of(o).to_vec()).collect();

        assert_eq!(incremental, rebuilt);
    }

    #[test]
    fn test_versions_bump_per_category() {
        let instance = build_instance();
        let mut state = SolutionState::new(&instance, [], []);
        let (ov, av) = (state.order_version(), state.aisle_version());

        state.apply_add_order(oi(0), 0.0);
        assert_eq!(state.order_version(), ov + 1);
        assert_eq!(state.aisle_version(), av);

        state.apply_add_aisle(ai(0), 0.0);
        assert_eq!(state.order_version(), ov + 1);
        assert_eq!(state.aisle_version(), av + 1);
    }

    #[test]
    fn test_clone_is_a_deep_copy() {
        let instance = build_instance();
        let mut state = SolutionState::new(&instance, [oi(0)], [ai(0)]);
        let copy = state.clone();

        state.apply_add_order(oi(1), 0.0);
        state.apply_add_aisle(ai(1), 0.0);

        assert!(!copy.contains_order(oi(1)));
        assert!(!copy.contains_aisle(ai(1)));
        assert_ne!(state, copy);
    }

    #[test]
    fn test_equality_and_signature_follow_chosen_sets() {
        let instance = build_instance();
        let a = SolutionState::new(&instance, [oi(0)], [ai(0), ai(1)]);
        let b = SolutionState::new(&instance, [oi(0)], [ai(1), ai(0)]);
        let c = SolutionState::new(&instance, [oi(1)], [ai(0)]);

        assert_eq!(a, b, "insertion order must not matter");
        assert_eq!(a.signature(), b.signature());
        assert_ne!(a, c);
    }

    #[test]
    fn test_total_picked_units_sums_chosen_orders() {
        let instance = build_instance();
        let state = SolutionState::new(&instance, [oi(0), oi(1)], []);
        assert_eq!(state.total_picked_units(), 6); // (1 + 2) + 3
    }
}
