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

//! The move operator family of the adaptive search.
//!
//! Operators are a tagged variant (`OperatorKind`) rather than a trait-object
//! hierarchy: each variant carries its parameters (destruction rate, swap
//! count, intensity) and dispatches through a single
//! `apply(state, validator, evaluator, rng) -> delta` entry point. The
//! returned value is the realized change in surrogate cost, `0.0` when the
//! operator could not act.
//!
//! Class invariant: after `apply` returns, the solution is presence-feasible
//! (operators invoke repair when they leave it broken) and `current_cost`
//! reflects every committed change, because all mutations are routed through
//! the evaluator's delta-committing helpers.

use crate::{eval::SurrogateEvaluator, repair::Validator, state::SolutionState};
use pickwave_core::num::UnitNumeric;
use pickwave_model::index::{AisleIndex, OrderIndex};
use rand::Rng;
use std::cmp::Ordering;

/// The named move operators over a wave-picking solution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperatorKind {
    /// Add one uniform-random unchosen order.
    AddOrder,
    /// Remove one uniform-random chosen order.
    RemoveOrder,
    /// Visit one uniform-random unvisited aisle.
    AddAisle,
    /// Leave one uniform-random visited aisle.
    RemoveAisle,
    /// Swap one visited aisle for one unvisited aisle, both uniform-random.
    SwapAisle,
    /// Swap one chosen order for one unchosen order, both uniform-random.
    SwapOrder,
    /// Swap `count` visited aisles for `count` unvisited ones, sampled
    /// without replacement.
    MultiSwapAisle {
        /// Number of aisles exchanged on each side.
        count: usize,
    },
    /// Destroy a fraction of the chosen orders, then greedily re-insert the
    /// best-ranked candidates.
    LnsOrder {
        /// Fraction of the chosen orders destroyed, in (0, 1).
        destruction_rate: f64,
    },
    /// Destroy a fraction of the visited aisles, then greedily re-insert the
    /// best-ranked candidates.
    LnsAisle {
        /// Fraction of the visited aisles destroyed, in (0, 1).
        destruction_rate: f64,
    },
    /// Evict the chosen orders contributing least to the true objective and
    /// pull in dense candidates.
    ObjectiveFocused {
        /// Fraction of the chosen orders replaced, in (0, 1).
        intensity: f64,
    },
}

impl OperatorKind {
    /// Short display name, stable across runs (used by the selector's
    /// statistics table).
    pub fn name(&self) -> &'static str {
        match self {
            OperatorKind::AddOrder => "AddOrder",
            OperatorKind::RemoveOrder => "RemoveOrder",
            OperatorKind::AddAisle => "AddAisle",
            OperatorKind::RemoveAisle => "RemoveAisle",
            OperatorKind::SwapAisle => "SwapAisle",
            OperatorKind::SwapOrder => "SwapOrder",
            OperatorKind::MultiSwapAisle { .. } => "MltSwap",
            OperatorKind::LnsOrder { .. } => "LNSOrder",
            OperatorKind::LnsAisle { .. } => "LNSAisle",
            OperatorKind::ObjectiveFocused { .. } => "ObjFocus",
        }
    }

    /// Applies the operator to the state and returns the realized surrogate
    /// delta (`0.0` if the operator could not act).
    pub fn apply<T, R>(
        &self,
        state: &mut SolutionState<'_, T>,
        validator: &Validator<T>,
        eval: &mut SurrogateEvaluator<T>,
        rng: &mut R,
    ) -> f64
    where
        T: UnitNumeric,
        R: Rng,
    {
        match *self {
            OperatorKind::AddOrder => add_order(state, validator, eval, rng),
            OperatorKind::RemoveOrder => remove_order(state, eval, rng),
            OperatorKind::AddAisle => add_aisle(state, eval, rng),
            OperatorKind::RemoveAisle => remove_aisle(state, validator, eval, rng),
            OperatorKind::SwapAisle => swap_aisle(state, validator, eval, rng),
            OperatorKind::SwapOrder => swap_order(state, validator, eval, rng),
            OperatorKind::MultiSwapAisle { count } => {
                multi_swap_aisle(state, validator, eval, rng, count)
            }
            OperatorKind::LnsOrder { destruction_rate } => {
                lns_order(state, validator, eval, rng, destruction_rate)
            }
            OperatorKind::LnsAisle { destruction_rate } => {
                lns_aisle(state, validator, eval, rng, destruction_rate)
            }
            OperatorKind::ObjectiveFocused { intensity } => {
                objective_focused(state, validator, eval, rng, intensity)
            }
        }
    }
}

impl std::fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The default operator portfolio handed to the adaptive selector.
pub fn default_operator_set() -> Vec<OperatorKind> {
    vec![
        OperatorKind::AddOrder,
        OperatorKind::RemoveOrder,
        OperatorKind::AddAisle,
        OperatorKind::RemoveAisle,
        OperatorKind::SwapAisle,
        OperatorKind::SwapOrder,
        OperatorKind::LnsOrder {
            destruction_rate: 0.3,
        },
        OperatorKind::LnsAisle {
            destruction_rate: 0.3,
        },
        OperatorKind::MultiSwapAisle { count: 2 },
        OperatorKind::ObjectiveFocused { intensity: 0.2 },
    ]
}

/// Strong perturbation for stagnation escapes: order LNS followed by aisle
/// LNS at the given strength, then repair. Returns `true` if the solution
/// changed.
pub fn perturb<T, R>(
    state: &mut SolutionState<'_, T>,
    validator: &Validator<T>,
    eval: &mut SurrogateEvaluator<T>,
    rng: &mut R,
    strength: f64,
) -> bool
where
    T: UnitNumeric,
    R: Rng,
{
    let changed_orders = lns_order(state, validator, eval, rng, strength) != 0.0;
    let changed_aisles = lns_aisle(state, validator, eval, rng, strength) != 0.0;
    if !validator.is_feasible(state) {
        validator.repair(state, eval);
    }
    changed_orders || changed_aisles
}

// ----------------------------------------------------------------------
// Individual operators
// ----------------------------------------------------------------------

/// Realized delta between two cost snapshots; NaN (infinity minus infinity)
/// collapses to zero so empty-wave transitions never poison the selector.
#[inline]
fn realized(initial: f64, final_cost: f64) -> f64 {
    let delta = final_cost - initial;
    if delta.is_nan() { 0.0 } else { delta }
}

#[inline]
fn pick<R: Rng>(ids: &[usize], rng: &mut R) -> usize {
    ids[rng.random_range(0..ids.len())]
}

/// Samples `k` distinct ids via a partial Fisher-Yates shuffle.
fn sample_distinct<R: Rng>(mut ids: Vec<usize>, k: usize, rng: &mut R) -> Vec<usize> {
    let k = k.min(ids.len());
    for i in 0..k {
        let j = rng.random_range(i..ids.len());
        ids.swap(i, j);
    }
    ids.truncate(k);
    ids
}

/// Sorts (id, delta) pairs ascending by delta, ties broken by id for
/// deterministic replay under a fixed seed.
fn sort_by_delta(candidates: &mut [(usize, f64)]) {
    candidates.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
}

fn add_order<T, R>(
    state: &mut SolutionState<'_, T>,
    validator: &Validator<T>,
    eval: &mut SurrogateEvaluator<T>,
    rng: &mut R,
) -> f64
where
    T: UnitNumeric,
    R: Rng,
{
    let candidates: Vec<usize> = state.unchosen_order_ids().collect();
    if candidates.is_empty() {
        return 0.0;
    }
    let initial = eval.cost(state);
    let order = pick(&candidates, rng);
    eval.apply_add_order(state, OrderIndex::new(order));
    if !validator.is_feasible(state) {
        validator.repair(state, eval);
    }
    realized(initial, eval.cost(state))
}

fn remove_order<T, R>(
    state: &mut SolutionState<'_, T>,
    eval: &mut SurrogateEvaluator<T>,
    rng: &mut R,
) -> f64
where
    T: UnitNumeric,
    R: Rng,
{
    let chosen: Vec<usize> = state.chosen_order_ids().collect();
    if chosen.is_empty() {
        return 0.0;
    }
    let initial = eval.cost(state);
    let order = pick(&chosen, rng);
    eval.apply_remove_order(state, OrderIndex::new(order));
    // Shrinking the wave cannot break presence feasibility.
    realized(initial, eval.cost(state))
}

fn add_aisle<T, R>(
    state: &mut SolutionState<'_, T>,
    eval: &mut SurrogateEvaluator<T>,
    rng: &mut R,
) -> f64
where
    T: UnitNumeric,
    R: Rng,
{
    let candidates: Vec<usize> = state.unchosen_aisle_ids().collect();
    if candidates.is_empty() {
        return 0.0;
    }
    let initial = eval.cost(state);
    let aisle = pick(&candidates, rng);
    eval.apply_add_aisle(state, AisleIndex::new(aisle));
    realized(initial, eval.cost(state))
}

fn remove_aisle<T, R>(
    state: &mut SolutionState<'_, T>,
    validator: &Validator<T>,
    eval: &mut SurrogateEvaluator<T>,
    rng: &mut R,
) -> f64
where
    T: UnitNumeric,
    R: Rng,
{
    let visited: Vec<usize> = state.chosen_aisle_ids().collect();
    if visited.is_empty() {
        return 0.0;
    }
    let initial = eval.cost(state);
    let aisle = pick(&visited, rng);
    eval.apply_remove_aisle(state, AisleIndex::new(aisle));
    if !validator.is_feasible(state) {
        validator.repair(state, eval);
    }
    realized(initial, eval.cost(state))
}

fn swap_aisle<T, R>(
    state: &mut SolutionState<'_, T>,
    validator: &Validator<T>,
    eval: &mut SurrogateEvaluator<T>,
    rng: &mut R,
) -> f64
where
    T: UnitNumeric,
    R: Rng,
{
    let visited: Vec<usize> = state.chosen_aisle_ids().collect();
    let candidates: Vec<usize> = state.unchosen_aisle_ids().collect();
    if visited.is_empty() || candidates.is_empty() {
        return 0.0;
    }
    let initial = eval.cost(state);
    let remove = pick(&visited, rng);
    let add = pick(&candidates, rng);
    eval.apply_swap_aisle(state, AisleIndex::new(remove), AisleIndex::new(add));
    if !validator.is_feasible(state) {
        validator.repair(state, eval);
    }
    realized(initial, eval.cost(state))
}

fn swap_order<T, R>(
    state: &mut SolutionState<'_, T>,
    validator: &Validator<T>,
    eval: &mut SurrogateEvaluator<T>,
    rng: &mut R,
) -> f64
where
    T: UnitNumeric,
    R: Rng,
{
    let chosen: Vec<usize> = state.chosen_order_ids().collect();
    let candidates: Vec<usize> = state.unchosen_order_ids().collect();
    if chosen.is_empty() || candidates.is_empty() {
        return 0.0;
    }
    let initial = eval.cost(state);
    let remove = pick(&chosen, rng);
    let add = pick(&candidates, rng);
    eval.apply_remove_order(state, OrderIndex::new(remove));
    eval.apply_add_order(state, OrderIndex::new(add));
    if !validator.is_feasible(state) {
        validator.repair(state, eval);
    }
    realized(initial, eval.cost(state))
}

fn multi_swap_aisle<T, R>(
    state: &mut SolutionState<'_, T>,
    validator: &Validator<T>,
    eval: &mut SurrogateEvaluator<T>,
    rng: &mut R,
    count: usize,
) -> f64
where
    T: UnitNumeric,
    R: Rng,
{
    let visited: Vec<usize> = state.chosen_aisle_ids().collect();
    let candidates: Vec<usize> = state.unchosen_aisle_ids().collect();
    if count == 0 || visited.len() < count || candidates.len() < count {
        return 0.0;
    }
    let initial = eval.cost(state);

    let removals = sample_distinct(visited, count, rng);
    let additions = sample_distinct(candidates, count, rng);
    for aisle in removals {
        eval.apply_remove_aisle(state, AisleIndex::new(aisle));
    }
    for aisle in additions {
        eval.apply_add_aisle(state, AisleIndex::new(aisle));
    }

    if !validator.is_feasible(state) {
        validator.repair(state, eval);
    }
    realized(initial, eval.cost(state))
}

fn lns_order<T, R>(
    state: &mut SolutionState<'_, T>,
    validator: &Validator<T>,
    eval: &mut SurrogateEvaluator<T>,
    rng: &mut R,
    destruction_rate: f64,
) -> f64
where
    T: UnitNumeric,
    R: Rng,
{
    let chosen: Vec<usize> = state.chosen_order_ids().collect();
    if chosen.is_empty() {
        return 0.0;
    }
    let initial = eval.cost(state);

    // Destroy.
    let num_destroyed = ((chosen.len() as f64 * destruction_rate).ceil() as usize)
        .max(1)
        .min(chosen.len());
    for order in sample_distinct(chosen, num_destroyed, rng) {
        eval.apply_remove_order(state, OrderIndex::new(order));
    }

    // Repair: rank every absent order by its insertion delta and re-insert
    // the best ones up to the destroyed count.
    let candidates: Vec<usize> = state.unchosen_order_ids().collect();
    let mut ranked = eval.batch_order_deltas(state, &candidates, true);
    sort_by_delta(&mut ranked);

    for &(order, _) in ranked.iter().take(num_destroyed) {
        eval.apply_add_order(state, OrderIndex::new(order));
        if !validator.is_feasible(state) {
            validator.repair(state, eval);
        }
    }

    realized(initial, eval.cost(state))
}

fn lns_aisle<T, R>(
    state: &mut SolutionState<'_, T>,
    validator: &Validator<T>,
    eval: &mut SurrogateEvaluator<T>,
    rng: &mut R,
    destruction_rate: f64,
) -> f64
where
    T: UnitNumeric,
    R: Rng,
{
    let visited: Vec<usize> = state.chosen_aisle_ids().collect();
    if visited.is_empty() {
        return 0.0;
    }
    let initial = eval.cost(state);

    let num_destroyed = ((visited.len() as f64 * destruction_rate).ceil() as usize)
        .max(1)
        .min(visited.len());
    for aisle in sample_distinct(visited, num_destroyed, rng) {
        eval.apply_remove_aisle(state, AisleIndex::new(aisle));
    }

    let candidates: Vec<usize> = state.unchosen_aisle_ids().collect();
    let mut ranked = eval.batch_aisle_deltas(state, &candidates, true);
    sort_by_delta(&mut ranked);

    for &(aisle, _) in ranked.iter().take(num_destroyed) {
        eval.apply_add_aisle(state, AisleIndex::new(aisle));
    }

    if !validator.is_feasible(state) {
        validator.repair(state, eval);
    }
    realized(initial, eval.cost(state))
}

fn objective_focused<T, R>(
    state: &mut SolutionState<'_, T>,
    validator: &Validator<T>,
    eval: &mut SurrogateEvaluator<T>,
    _rng: &mut R,
    intensity: f64,
) -> f64
where
    T: UnitNumeric,
    R: Rng,
{
    let chosen: Vec<usize> = state.chosen_order_ids().collect();
    if chosen.is_empty() || state.num_chosen_aisles() == 0 {
        return 0.0;
    }
    let initial = eval.cost(state);
    let instance = state.instance();

    // Per-order contribution to the true objective: demanded units divided by
    // one plus the aisles exclusively serving this order among the chosen
    // ones.
    let mut adjacency_usage = vec![0u32; instance.num_aisles()];
    for &order in &chosen {
        for &aisle in state.order_to_aisles(order) {
            adjacency_usage[aisle] += 1;
        }
    }
    let mut contributions: Vec<(usize, f64)> = chosen
        .iter()
        .map(|&order| {
            let exclusive = state
                .order_to_aisles(order)
                .iter()
                .filter(|&&aisle| adjacency_usage[aisle] == 1)
                .count();
            let units = instance
                .order_units(OrderIndex::new(order))
                .to_f64()
                .unwrap_or(0.0);
            (order, units / (1.0 + exclusive as f64))
        })
        .collect();
    sort_by_delta(&mut contributions);

    let num_replaced = ((chosen.len() as f64 * intensity).ceil() as usize)
        .max(1)
        .min(chosen.len());
    for &(order, _) in contributions.iter().take(num_replaced) {
        eval.apply_remove_order(state, OrderIndex::new(order));
    }

    // Candidates ranked by density: units per unit of insertion resistance.
    let candidates: Vec<usize> = state.unchosen_order_ids().collect();
    let deltas = eval.batch_order_deltas(state, &candidates, true);
    let mut impacts: Vec<(usize, f64)> = deltas
        .into_iter()
        .map(|(order, delta)| {
            let units = instance
                .order_units(OrderIndex::new(order))
                .to_f64()
                .unwrap_or(0.0);
            (order, units / (1.0 + delta.max(0.0)))
        })
        .collect();
    // Highest impact first, ties by id.
    impacts.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    for &(order, _) in impacts.iter().take(num_replaced) {
        eval.apply_add_order(state, OrderIndex::new(order));
        if !validator.is_feasible(state) {
            validator.repair(state, eval);
        }
    }

    realized(initial, eval.cost(state))
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

    // Four orders over four items, four aisles with overlapping stock.
    fn build_instance() -> Instance<u32> {
        let mut builder = InstanceBuilder::<u32>::new(4);
        builder.push_order([(0, 2)]);
        builder.push_order([(1, 3)]);
        builder.push_order([(2, 1), (3, 1)]);
        builder.push_order([(0, 1), (2, 2)]);
        builder.push_aisle([(0, 5), (1, 5)]);
        builder.push_aisle([(1, 4)]);
        builder.push_aisle([(2, 4), (3, 4)]);
        builder.push_aisle([(0, 2), (2, 2)]);
        builder.wave_bounds(1, 20);
        builder.build()
    }

    fn setup(instance: &Instance<u32>) -> (Validator<u32>, SurrogateEvaluator<u32>, ChaCha8Rng) {
        (
            Validator::new(instance),
            SurrogateEvaluator::new(instance, CostWeights::default()),
            ChaCha8Rng::seed_from_u64(7),
        )
    }

    fn assert_invariants(
        state: &mut SolutionState<'_, u32>,
        validator: &Validator<u32>,
        eval: &SurrogateEvaluator<u32>,
        context: &str,
    ) {
        assert!(
            validator.is_feasible(state),
            "{}: operator must leave a feasible solution",
            context
        );
        let incremental = state.current_cost();
        let mut fresh = state.clone();
        let full = eval.reevaluate(&mut fresh);
        if full.is_finite() {
            assert!(
                (incremental - full).abs() <= 1e-6 * (1.0 + full.abs()),
                "{}: committed cost {} diverged from full recompute {}",
                context,
                incremental,
                full
            );
        }
    }

    #[test]
    fn test_every_operator_preserves_feasibility_and_cost() {
        let instance = build_instance();
        let (validator, mut eval, mut rng) = setup(&instance);
        let mut state = SolutionState::new(&instance, [oi(0), oi(2)], [ai(0), ai(2)]);
        eval.reevaluate(&mut state);

        for kind in default_operator_set() {
            let before = eval.cost(&mut state);
            let delta = kind.apply(&mut state, &validator, &mut eval, &mut rng);
            let after = eval.cost(&mut state);

            if before.is_finite() && after.is_finite() {
                assert!(
                    (before + delta - after).abs() <= 1e-6 * (1.0 + after.abs()),
                    "{}: returned delta {} does not bridge {} -> {}",
                    kind.name(),
                    delta,
                    before,
                    after
                );
            }
            assert_invariants(&mut state, &validator, &eval, kind.name());
        }
    }

    #[test]
    fn test_add_order_on_saturated_wave_is_a_noop() {
        let instance = build_instance();
        let (validator, mut eval, mut rng) = setup(&instance);
        let mut state = SolutionState::new(
            &instance,
            (0..instance.num_orders()).map(oi),
            (0..instance.num_aisles()).map(ai),
        );
        eval.reevaluate(&mut state);

        let delta = OperatorKind::AddOrder.apply(&mut state, &validator, &mut eval, &mut rng);
        assert_eq!(delta, 0.0);
        assert_eq!(state.num_chosen_orders(), instance.num_orders());
    }

    #[test]
    fn test_remove_order_on_empty_wave_is_a_noop() {
        let instance = build_instance();
        let (validator, mut eval, mut rng) = setup(&instance);
        let mut state = SolutionState::new(&instance, [], [ai(0)]);

        let delta = OperatorKind::RemoveOrder.apply(&mut state, &validator, &mut eval, &mut rng);
        assert_eq!(delta, 0.0);
    }

    #[test]
    fn test_multi_swap_requires_enough_aisles_on_both_sides() {
        let instance = build_instance();
        let (validator, mut eval, mut rng) = setup(&instance);
        // Only one aisle visited: a 2-swap cannot act.
        let mut state = SolutionState::new(&instance, [oi(0)], [ai(0)]);
        eval.reevaluate(&mut state);

        let delta = OperatorKind::MultiSwapAisle { count: 2 }.apply(
            &mut state,
            &validator,
            &mut eval,
            &mut rng,
        );
        assert_eq!(delta, 0.0);
        assert!(state.contains_aisle(ai(0)));
    }

    #[test]
    fn test_lns_order_keeps_wave_size_reasonable() {
        let instance = build_instance();
        let (validator, mut eval, mut rng) = setup(&instance);
        let mut state = SolutionState::new(
            &instance,
            [oi(0), oi(1), oi(2)],
            [ai(0), ai(1), ai(2)],
        );
        eval.reevaluate(&mut state);

        OperatorKind::LnsOrder {
            destruction_rate: 0.3,
        }
        .apply(&mut state, &validator, &mut eval, &mut rng);

        // ceil(0.3 * 3) = 1 destroyed, 1 re-inserted from the full candidate
        // pool: the wave stays at three orders.
        assert_eq!(state.num_chosen_orders(), 3);
        assert!(validator.is_feasible(&state));
    }

    #[test]
    fn test_objective_focused_replaces_low_contribution_orders() {
        let instance = build_instance();
        let (validator, mut eval, mut rng) = setup(&instance);
        let mut state = SolutionState::new(&instance, [oi(1), oi(2)], [ai(1), ai(2)]);
        eval.reevaluate(&mut state);

        let before = state.num_chosen_orders();
        OperatorKind::ObjectiveFocused { intensity: 0.5 }.apply(
            &mut state,
            &validator,
            &mut eval,
            &mut rng,
        );

        assert_eq!(state.num_chosen_orders(), before);
        assert!(validator.is_feasible(&state));
    }

    #[test]
    fn test_perturb_repairs_and_reports_change() {
        let instance = build_instance();
        let (validator, mut eval, mut rng) = setup(&instance);
        let mut state = SolutionState::new(
            &instance,
            [oi(0), oi(1), oi(2), oi(3)],
            [ai(0), ai(2)],
        );
        eval.reevaluate(&mut state);

        let changed = perturb(&mut state, &validator, &mut eval, &mut rng, 0.3);
        assert!(changed, "a 0.3-strength perturbation must act on this state");
        assert!(validator.is_feasible(&state));
    }

    #[test]
    fn test_thousand_random_applications_do_not_drift() {
        // A larger pseudo-random instance; no periodic recomputation, only
        // chained deltas.
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let num_items = 12;
        let mut builder = InstanceBuilder::<u32>::new(num_items);
        for _ in 0..20 {
            let entries: Vec<(usize, u32)> = (0..rng.random_range(1..4usize))
                .map(|_| (rng.random_range(0..num_items), rng.random_range(1..5u32)))
                .collect();
            builder.push_order(entries);
        }
        for _ in 0..10 {
            let entries: Vec<(usize, u32)> = (0..rng.random_range(2..6usize))
                .map(|_| (rng.random_range(0..num_items), rng.random_range(1..8u32)))
                .collect();
            builder.push_aisle(entries);
        }
        builder.wave_bounds(1, 500);
        let instance = builder.build();

        let validator = Validator::new(&instance);
        let mut eval = SurrogateEvaluator::new(&instance, CostWeights::default());
        let mut state = SolutionState::new(&instance, [oi(0), oi(1)], []);
        validator.repair(&mut state, &mut eval);
        eval.reevaluate(&mut state);

        let operators = default_operator_set();
        for _ in 0..1_000 {
            let kind = operators[rng.random_range(0..operators.len())];
            kind.apply(&mut state, &validator, &mut eval, &mut rng);
        }

        let incremental = state.current_cost();
        let mut fresh = state.clone();
        let full = eval.reevaluate(&mut fresh);
        if full.is_finite() {
            assert!(
                (incremental - full).abs() <= 1e-6 * (1.0 + full.abs()),
                "after 1000 random applications: incremental {} vs full {}",
                incremental,
                full
            );
        } else {
            assert!(!incremental.is_finite());
        }
    }

    #[test]
    fn test_sample_distinct_returns_unique_ids() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let sampled = sample_distinct((0..10).collect(), 4, &mut rng);
        assert_eq!(sampled.len(), 4);
        let mut unique = sampled.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), 4, "sampled ids must be distinct");
    }
}
