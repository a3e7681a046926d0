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

//! The wave-picking solver facade.
//!
//! `WaveSolver::solve` wires the whole pipeline together:
//!
//! 1. Build a randomized initial solution: 20-50% of the orders, one random
//!    covering aisle per chosen order, plus a few extra random aisles.
//! 2. Run the ASA engine under the configured wall-clock budget.
//! 3. Gate the best solution with the strict per-unit feasibility rule (total
//!    picked units within the wave bounds, per-item picked units within the
//!    units available across the visited aisles). The search itself uses the
//!    cheaper presence-based coverage; the gate is where the per-unit
//!    semantics are enforced. When the gate fails, hopeless orders are
//!    evicted and the cover re-repaired once before giving up.
//! 4. Report the final `PickingSolution` with the true objective.

use pickwave_asa::{
    config::AsaConfig,
    engine::AsaEngine,
    eval::SurrogateEvaluator,
    monitor::search_monitor::NoopMonitor,
    repair::Validator,
    result::{AsaTerminationReason, state_to_picking_solution},
    state::SolutionState,
    stats::AsaStatistics,
};
use pickwave_core::num::UnitNumeric;
use pickwave_model::{
    index::{AisleIndex, OrderIndex},
    instance::Instance,
    solution::PickingSolution,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// The result of a full solver run.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    /// The reported solution (orders, aisles, true objective).
    pub solution: PickingSolution,
    /// Whether the reported solution passed the strict per-unit gate.
    pub unit_feasible: bool,
    /// Aggregate statistics of the underlying ASA run.
    pub statistics: AsaStatistics,
    /// Why the underlying ASA run stopped.
    pub termination_reason: AsaTerminationReason,
}

impl std::fmt::Display for SolveOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Pickwave Solve Outcome")?;
        writeln!(f, "   Termination:   {}", self.termination_reason)?;
        writeln!(f, "   Unit Feasible: {}", self.unit_feasible)?;
        writeln!(f, "   Objective:     {:.4}", self.solution.objective())?;
        writeln!(
            f,
            "   Orders/Aisles: {}/{}",
            self.solution.num_orders(),
            self.solution.num_aisles()
        )?;
        write!(f, "{}", self.statistics)
    }
}

/// The high-level wave-picking solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveSolver {
    config: AsaConfig,
}

impl Default for WaveSolver {
    fn default() -> Self {
        Self::new(AsaConfig::default())
    }
}

impl WaveSolver {
    /// Creates a solver with the given engine configuration.
    pub fn new(config: AsaConfig) -> Self {
        Self { config }
    }

    /// Returns the active configuration.
    #[inline]
    pub fn config(&self) -> &AsaConfig {
        &self.config
    }

    /// Solves the instance: initial construction, ASA run, per-unit gate.
    pub fn solve<T>(&self, instance: &Instance<T>) -> SolveOutcome
    where
        T: UnitNumeric,
    {
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let initial = build_initial_state(instance, &mut rng);

        let mut monitor = NoopMonitor::new();
        let outcome = AsaEngine::new().run(initial, &self.config, &mut monitor);
        let termination_reason = outcome.termination_reason().clone();
        let statistics = outcome.statistics().clone();

        let mut best = outcome.into_best();
        let mut unit_feasible = is_unit_feasible(&best);

        if !unit_feasible {
            // One salvage attempt: evict orders that can never be satisfied
            // with the visited aisles, re-cover, re-check.
            let validator = Validator::new(instance);
            let mut eval = SurrogateEvaluator::new(instance, self.config.weights);
            let mut salvaged = best.clone();
            validator.remove_infeasible_orders(&mut salvaged, &mut eval);
            validator.repair(&mut salvaged, &mut eval);
            eval.reevaluate(&mut salvaged);
            if is_unit_feasible(&salvaged) {
                best = salvaged;
                unit_feasible = true;
            }
        }

        SolveOutcome {
            solution: state_to_picking_solution(&best),
            unit_feasible,
            statistics,
            termination_reason,
        }
    }
}

/// Builds the randomized starting point: 20% of the orders plus up to 30%
/// more (at least one), one random covering aisle per chosen order, and
/// 1 + up to 10% of the aisles extra. The engine repairs it before searching.
fn build_initial_state<'a, T, R>(instance: &'a Instance<T>, rng: &mut R) -> SolutionState<'a, T>
where
    T: UnitNumeric,
    R: Rng,
{
    let num_orders = instance.num_orders();
    let num_aisles = instance.num_aisles();
    let adjacency = instance.compute_adjacency();

    let mut chosen_orders = vec![false; num_orders];
    let mut chosen_aisles = vec![false; num_aisles];

    if num_orders > 0 {
        let base = num_orders / 5; // 20%
        let spread = (num_orders * 3 / 10).max(1); // up to 30% more
        let target = (base + rng.random_range(0..spread)).clamp(1, num_orders);
        for _ in 0..target {
            chosen_orders[rng.random_range(0..num_orders)] = true;
        }
    }

    // One random covering aisle per chosen order.
    for order_id in 0..num_orders {
        if !chosen_orders[order_id] {
            continue;
        }
        let covering = &adjacency.order_to_aisles[order_id];
        if !covering.is_empty() {
            chosen_aisles[covering[rng.random_range(0..covering.len())]] = true;
        }
    }

    // A few extra aisles for slack.
    if num_aisles > 0 {
        let extra = 1 + rng.random_range(0..(num_aisles / 10).max(1));
        for _ in 0..extra {
            chosen_aisles[rng.random_range(0..num_aisles)] = true;
        }
    }

    SolutionState::new(
        instance,
        chosen_orders
            .iter()
            .enumerate()
            .filter_map(|(id, &chosen)| chosen.then_some(OrderIndex::new(id))),
        chosen_aisles
            .iter()
            .enumerate()
            .filter_map(|(id, &chosen)| chosen.then_some(AisleIndex::new(id))),
    )
}

/// The strict per-unit feasibility gate: a non-empty wave whose total picked
/// units lie within `[LB, UB]` and whose per-item picked units never exceed
/// the units available across the visited aisles.
fn is_unit_feasible<T>(state: &SolutionState<'_, T>) -> bool
where
    T: UnitNumeric,
{
    if state.num_chosen_orders() == 0 || state.num_chosen_aisles() == 0 {
        return false;
    }
    let instance = state.instance();

    let mut picked = vec![T::zero(); instance.num_items()];
    for order_id in state.chosen_order_ids() {
        for entry in instance.order_demand(OrderIndex::new(order_id)) {
            let item = entry.item.get();
            picked[item] = picked[item].saturating_add(entry.units);
        }
    }

    let mut available = vec![T::zero(); instance.num_items()];
    for aisle_id in state.chosen_aisle_ids() {
        for entry in instance.aisle_stock(AisleIndex::new(aisle_id)) {
            let item = entry.item.get();
            available[item] = available[item].saturating_add(entry.units);
        }
    }

    let total = picked
        .iter()
        .fold(T::zero(), |acc, units| acc.saturating_add(*units));
    if total < instance.wave_size_lb() || total > instance.wave_size_ub() {
        return false;
    }

    picked
        .iter()
        .zip(&available)
        .all(|(demanded, stocked)| demanded <= stocked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pickwave_model::instance::InstanceBuilder;
    use std::time::Duration;

    fn quick_config(seed: u64) -> AsaConfig {
        AsaConfig::default()
            .with_max_runtime(Duration::from_millis(400))
            .with_seed(seed)
    }

    fn oi(i: usize) -> OrderIndex {
        OrderIndex::new(i)
    }

    fn ai(i: usize) -> AisleIndex {
        AisleIndex::new(i)
    }

    #[test]
    fn test_trivial_instance_is_solved_exactly() {
        // One order demanding 3 units of the only item, one aisle stocking 5.
        let mut builder = InstanceBuilder::<u32>::new(1);
        builder.push_order([(0, 3)]);
        builder.push_aisle([(0, 5)]);
        builder.wave_bounds(3, 3);
        let instance = builder.build();

        let outcome = WaveSolver::new(quick_config(1)).solve(&instance);

        assert!(outcome.unit_feasible);
        assert_eq!(outcome.solution.orders(), &[oi(0)]);
        assert_eq!(outcome.solution.aisles(), &[ai(0)]);
        assert_eq!(outcome.solution.objective(), 3.0);
    }

    #[test]
    fn test_two_aisle_cover_reaches_objective_two() {
        // The single order needs both aisles; any feasible wave visits both.
        let mut builder = InstanceBuilder::<u32>::new(2);
        builder.push_order([(0, 2), (1, 2)]);
        builder.push_aisle([(0, 2)]);
        builder.push_aisle([(1, 2)]);
        builder.wave_bounds(4, 4);
        let instance = builder.build();

        let outcome = WaveSolver::new(quick_config(2)).solve(&instance);

        assert!(outcome.unit_feasible);
        assert_eq!(outcome.solution.orders(), &[oi(0)]);
        assert_eq!(outcome.solution.aisles(), &[ai(0), ai(1)]);
        assert_eq!(outcome.solution.objective(), 2.0);
    }

    #[test]
    fn test_redundant_aisle_is_pruned_to_objective_one() {
        // Both aisles stock the only demanded item; one must be pruned.
        let mut builder = InstanceBuilder::<u32>::new(1);
        builder.push_order([(0, 1)]);
        builder.push_aisle([(0, 5)]);
        builder.push_aisle([(0, 5)]);
        builder.wave_bounds(1, 1);
        let instance = builder.build();

        let outcome = WaveSolver::new(quick_config(3)).solve(&instance);

        assert!(outcome.unit_feasible);
        assert_eq!(outcome.solution.num_orders(), 1);
        assert_eq!(
            outcome.solution.num_aisles(),
            1,
            "the redundant aisle must not be visited"
        );
        assert_eq!(outcome.solution.objective(), 1.0);
    }

    #[test]
    fn test_oversized_order_is_evicted_by_the_gate() {
        // Order 1 demands 10 units but only 3 are stocked anywhere; the gate
        // must fall back to the satisfiable order.
        let mut builder = InstanceBuilder::<u32>::new(1);
        builder.push_order([(0, 1)]);
        builder.push_order([(0, 10)]);
        builder.push_aisle([(0, 3)]);
        builder.wave_bounds(1, 10);
        let instance = builder.build();

        let outcome = WaveSolver::new(quick_config(4)).solve(&instance);

        assert!(outcome.unit_feasible);
        assert_eq!(outcome.solution.orders(), &[oi(0)]);
        assert_eq!(outcome.solution.objective(), 1.0);
    }

    #[test]
    fn test_initial_state_respects_order_share_bounds() {
        let mut builder = InstanceBuilder::<u32>::new(4);
        for item in 0..4 {
            builder.push_order([(item, 1)]);
            builder.push_aisle([(item, 2)]);
        }
        builder.wave_bounds(1, 10);
        let instance = builder.build();

        let mut rng = ChaCha8Rng::seed_from_u64(77);
        for _ in 0..20 {
            let state = build_initial_state(&instance, &mut rng);
            assert!(state.num_chosen_orders() >= 1);
            assert!(state.num_chosen_orders() <= instance.num_orders());
            assert!(state.num_chosen_aisles() >= 1);
        }
    }

    #[test]
    fn test_outcome_display_is_complete() {
        let mut builder = InstanceBuilder::<u32>::new(1);
        builder.push_order([(0, 2)]);
        builder.push_aisle([(0, 2)]);
        builder.wave_bounds(2, 2);
        let instance = builder.build();

        let outcome = WaveSolver::new(quick_config(5)).solve(&instance);
        let rendered = format!("{}", outcome);
        assert!(rendered.contains("Termination"));
        assert!(rendered.contains("Objective"));
        assert!(rendered.contains("Iterations"));
    }
}
