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

//! The Adaptive Simulated Annealing driver.
//!
//! A flat single-threaded loop: each iteration asks the bandit selector for
//! an operator, applies it (operators commit their own mutations and repair
//! behind themselves), derives a Metropolis-style acceptance flag that feeds
//! the selector and the stagnation bookkeeping, and periodically hands the
//! current and best solutions to the intensification stack — focused local
//! search (best-improvement when deeply stagnated), elite path relinking,
//! and memetic tabu refinement, each adopted only when it strictly improves
//! the current solution.
//!
//! Numeric drift is bounded by a full surrogate recomputation at least every
//! `drift_check_interval` iterations and after every strong perturbation.
//! Termination: the time oracle runs dry, the stagnation counter reaches its
//! budget, or a monitor requests an abort. The best feasible solution
//! observed is returned together with the run statistics.

use crate::{
    config::AsaConfig,
    elite::EliteArchive,
    eval::SurrogateEvaluator,
    fls::{FocusedLocalSearch, Mode},
    memetic::TabuIntensifier,
    monitor::{
        search_monitor::{SearchCommand, SolveMonitor},
        time::TimeBudget,
    },
    operator::{self, default_operator_set},
    relink::PathRelinker,
    repair::Validator,
    result::{AsaOutcome, AsaTerminationReason},
    selector::OperatorSelector,
    state::SolutionState,
    stats::AsaStatistics,
};
use pickwave_core::num::UnitNumeric;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::time::{Duration, Instant};

/// The intensification stack: focused local search, path relinking over the
/// elite archive, and memetic tabu refinement.
pub struct Intensifier<'a, T>
where
    T: UnitNumeric,
{
    fls: FocusedLocalSearch,
    relinker: PathRelinker,
    archive: EliteArchive<'a, T>,
    tabu: TabuIntensifier,
}

impl<'a, T> Intensifier<'a, T>
where
    T: UnitNumeric,
{
    /// Builds the stack from the driver configuration.
    pub fn new(config: &AsaConfig) -> Self {
        Self {
            fls: FocusedLocalSearch::new(config.fls),
            relinker: PathRelinker::default(),
            archive: EliteArchive::new(config.elite_size),
            tabu: TabuIntensifier::new(config.tabu_tenure, config.tabu_max_iterations),
        }
    }

    /// Number of archived elite solutions.
    #[inline]
    pub fn elite_count(&self) -> usize {
        self.archive.len()
    }

    /// Read access to the elite archive.
    #[inline]
    pub fn archive(&self) -> &EliteArchive<'a, T> {
        &self.archive
    }

    /// Offers a candidate to the elite archive.
    pub fn offer_elite(
        &mut self,
        candidate: &SolutionState<'a, T>,
        validator: &Validator<T>,
    ) -> bool {
        self.archive.offer(candidate, validator)
    }

    /// Runs the focused local search from `current`, best-improvement when
    /// `deep` (deeply stagnated), first-improvement otherwise. The descent's
    /// wall-clock budget is capped by the remaining run budget.
    pub fn focused_local_search<R>(
        &mut self,
        current: &SolutionState<'a, T>,
        deep: bool,
        validator: &Validator<T>,
        eval: &mut SurrogateEvaluator<T>,
        rng: &mut R,
        remaining: Duration,
    ) -> SolutionState<'a, T>
    where
        R: Rng,
    {
        let base = *self.fls.config();
        let mut capped = base;
        capped.timeout = base.timeout.min(remaining);
        self.fls.set_config(capped);

        let mode = if deep {
            Mode::BestImprovement
        } else {
            Mode::FirstImprovement
        };
        let result = self.fls.apply(current, mode, validator, eval, rng);
        self.fls.set_config(base);
        result
    }

    /// Runs path relinking over every ordered pair of elites (both
    /// directions), offers each improving result back to the archive, and
    /// returns the best solution found. `None` without at least two elites.
    /// The budget is polled between pairs.
    pub fn elite_path_relinking<R>(
        &mut self,
        validator: &Validator<T>,
        eval: &mut SurrogateEvaluator<T>,
        rng: &mut R,
        budget: &TimeBudget,
    ) -> Option<SolutionState<'a, T>>
    where
        R: Rng,
    {
        if self.archive.len() < 2 {
            return None;
        }

        let elites: Vec<SolutionState<'a, T>> = self.archive.solutions().to_vec();
        let mut best: Option<SolutionState<'a, T>> = None;

        'pairs: for i in 0..elites.len() {
            for j in (i + 1)..elites.len() {
                if budget.is_exhausted() {
                    break 'pairs;
                }
                for (origin, guide) in [(&elites[i], &elites[j]), (&elites[j], &elites[i])] {
                    let relinked = self.relinker.relink(
                        origin,
                        guide,
                        validator,
                        eval,
                        &mut self.fls,
                        rng,
                    );
                    let better = match &best {
                        Some(current) => relinked.current_cost() < current.current_cost(),
                        None => true,
                    };
                    if better {
                        best = Some(relinked);
                    }
                }
            }
        }

        if let Some(solution) = &best {
            self.archive.offer(solution, validator);
        }
        best
    }

    /// Runs the memetic tabu refinement over the archive.
    pub fn memetic_intensification<R>(
        &mut self,
        validator: &Validator<T>,
        eval: &mut SurrogateEvaluator<T>,
        rng: &mut R,
    ) -> Option<SolutionState<'a, T>>
    where
        R: Rng,
    {
        self.tabu.intensify(&self.archive, validator, eval, rng)
    }
}

/// The ASA driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AsaEngine;

impl AsaEngine {
    /// Creates a new engine.
    pub fn new() -> Self {
        Self
    }

    /// Runs the adaptive search from `initial` under `config`, reporting
    /// lifecycle events to `monitor`. Returns the best feasible solution
    /// observed with statistics and the termination reason.
    ///
    /// # Panics
    ///
    /// Panics if the configuration fails validation.
    pub fn run<'a, T, M>(
        &self,
        initial: SolutionState<'a, T>,
        config: &AsaConfig,
        monitor: &mut M,
    ) -> AsaOutcome<'a, T>
    where
        T: UnitNumeric,
        M: SolveMonitor<T>,
    {
        config.validate();

        let instance = initial.instance();
        let validator = Validator::new(instance);
        let mut eval = SurrogateEvaluator::new(instance, config.weights);
        let selector = OperatorSelector::new(
            default_operator_set(),
            config.strategy,
            config.selector_update_frequency,
        );
        let mut intensifier = Intensifier::new(config);
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut stats = AsaStatistics::default();
        let budget = TimeBudget::new(config.max_runtime);
        let started = Instant::now();

        let mut current = initial;

        // Repair the starting point; if no cover exists for the chosen
        // orders, evict the hopeless ones and try again.
        if !validator.is_feasible(&current) && !validator.repair(&mut current, &mut eval) {
            validator.remove_infeasible_orders(&mut current, &mut eval);
            validator.repair(&mut current, &mut eval);
        }
        eval.reevaluate(&mut current);
        stats.on_full_evaluation();

        let mut best = current.clone();
        let mut best_cost = if validator.is_feasible(&best) {
            best.current_cost()
        } else {
            f64::INFINITY
        };

        monitor.on_start(&current);

        let mut no_improve: u64 = 0;
        let termination_reason = loop {
            if budget.is_exhausted() {
                break AsaTerminationReason::TimeLimit;
            }
            if no_improve >= config.max_no_improvement {
                break AsaTerminationReason::Stagnation;
            }
            if let SearchCommand::Terminate(reason) = monitor.search_command(&stats) {
                break AsaTerminationReason::Aborted(reason);
            }

            stats.on_iteration();
            let iteration = stats.iterations;

            // 1-3: operator application, acceptance bookkeeping, feedback.
            let cost_before = eval.cost(&mut current);
            let op_index = selector.select(&mut rng);
            let delta =
                selector.operators()[op_index].apply(&mut current, &validator, &mut eval, &mut rng);
            let moved = delta != 0.0;
            let accepted = if delta < 0.0 {
                true
            } else if delta > 0.0 {
                let temperature = cost_before * config.temperature_scale_factor;
                temperature.is_finite()
                    && temperature > 0.0
                    && rng.random_bool((-delta / temperature).exp().clamp(0.0, 1.0))
            } else {
                false
            };
            selector.feedback(op_index, delta, accepted);
            if accepted {
                stats.on_accepted_move();
            } else {
                stats.on_rejected_move();
            }

            let mut intensification_improved = false;

            // 4: periodic elite offers.
            if iteration % config.elite_update_frequency == 0 {
                eval.cost(&mut current);
                intensifier.offer_elite(&current, &validator);
                intensifier.offer_elite(&best, &validator);
            }

            // 5: focused local search, rolled back when it worsens.
            if iteration % config.intensification_frequency == 0
                || no_improve > config.max_no_improvement / 2
            {
                let deep = no_improve > config.max_no_improvement / 2;
                let before = eval.cost(&mut current);
                let refined = intensifier.focused_local_search(
                    &current,
                    deep,
                    &validator,
                    &mut eval,
                    &mut rng,
                    budget.remaining(),
                );
                if refined.current_cost() < before {
                    current = refined;
                    intensification_improved = true;
                    no_improve = 0;
                    stats.on_fls(true);
                } else {
                    stats.on_fls(false);
                }
            }

            // 6: elite path relinking, adopted when better.
            if (iteration % config.path_relinking_frequency == 0
                || no_improve as f64 > 0.7 * config.max_no_improvement as f64)
                && intensifier.elite_count() >= 2
            {
                if let Some(relinked) =
                    intensifier.elite_path_relinking(&validator, &mut eval, &mut rng, &budget)
                {
                    if relinked.current_cost() < eval.cost(&mut current) {
                        current = relinked;
                        intensification_improved = true;
                        no_improve = 0;
                        stats.on_path_relinking(true);
                    } else {
                        stats.on_path_relinking(false);
                    }
                }
            }

            // 7: memetic tabu refinement under heavy stagnation.
            if no_improve as f64 > 0.8 * config.max_no_improvement as f64
                && intensifier.elite_count() > 0
            {
                if let Some(refined) =
                    intensifier.memetic_intensification(&validator, &mut eval, &mut rng)
                {
                    if refined.current_cost() < eval.cost(&mut current) {
                        current = refined;
                        intensification_improved = true;
                        no_improve = 0;
                        stats.on_memetic(true);
                    } else {
                        stats.on_memetic(false);
                    }
                }
            }

            // 8-9: best tracking, stagnation accounting, escape perturbation.
            let current_cost = eval.cost(&mut current);
            if current_cost < best_cost && validator.is_feasible(&current) {
                best = current.clone();
                best_cost = current_cost;
                no_improve = 0;
                stats.on_best_update();
                monitor.on_best_solution_updated(&best, &stats);
            } else if !moved && !intensification_improved {
                no_improve += 1;
                if no_improve % config.stagnation_perturbation_interval == 0 {
                    operator::perturb(
                        &mut current,
                        &validator,
                        &mut eval,
                        &mut rng,
                        config.perturbation_strength,
                    );
                    if !validator.is_feasible(&current) {
                        validator.repair(&mut current, &mut eval);
                    }
                    // Heavy perturbation: recompute from scratch.
                    eval.reevaluate(&mut current);
                    stats.on_full_evaluation();
                    stats.on_perturbation();
                }
            }

            // Numeric drift guard.
            if iteration % config.drift_check_interval == 0 {
                eval.reevaluate(&mut current);
                stats.on_full_evaluation();
            }

            monitor.on_iteration(&current, &stats);
        };

        stats.set_total_time(started.elapsed());
        monitor.on_end(&best, &stats);

        AsaOutcome::new(best, termination_reason, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::search_monitor::NoopMonitor;
    use pickwave_model::index::{AisleIndex, OrderIndex};
    use pickwave_model::instance::{Instance, InstanceBuilder};

    fn oi(i: usize) -> OrderIndex {
        OrderIndex::new(i)
    }

    fn ai(i: usize) -> AisleIndex {
        AisleIndex::new(i)
    }

    fn small_config() -> AsaConfig {
        AsaConfig::default()
            .with_max_runtime(Duration::from_millis(200))
            .with_seed(99)
    }

    fn build_instance() -> Instance<u32> {
        let mut builder = InstanceBuilder::<u32>::new(3);
        builder.push_order([(0, 2)]);
        builder.push_order([(1, 3)]);
        builder.push_order([(2, 1)]);
        builder.push_aisle([(0, 4)]);
        builder.push_aisle([(1, 4), (2, 4)]);
        builder.push_aisle([(0, 2), (1, 2), (2, 2)]);
        builder.wave_bounds(1, 10);
        builder.build()
    }

    #[test]
    fn test_run_returns_a_feasible_best_with_statistics() {
        let instance = build_instance();
        let initial = SolutionState::new(&instance, [oi(0)], [ai(0)]);
        let mut monitor = NoopMonitor::new();

        let outcome = AsaEngine::new().run(initial, &small_config(), &mut monitor);

        let validator = Validator::new(&instance);
        assert!(validator.is_feasible(outcome.best()));
        assert!(outcome.statistics().iterations > 0);
        assert!(outcome.best().current_cost().is_finite());
        assert!(matches!(
            outcome.termination_reason(),
            AsaTerminationReason::TimeLimit | AsaTerminationReason::Stagnation
        ));
    }

    #[test]
    fn test_run_repairs_an_infeasible_start() {
        let instance = build_instance();
        // Order 1 chosen with no covering aisle.
        let initial = SolutionState::new(&instance, [oi(1)], []);
        let mut monitor = NoopMonitor::new();

        let config = small_config().with_max_runtime(Duration::from_millis(100));
        let outcome = AsaEngine::new().run(initial, &config, &mut monitor);

        let validator = Validator::new(&instance);
        assert!(validator.is_feasible(outcome.best()));
    }

    #[test]
    fn test_best_cost_never_drifts_from_a_full_recompute() {
        let instance = build_instance();
        let initial = SolutionState::new(&instance, [oi(0), oi(1)], [ai(0), ai(1)]);
        let mut monitor = NoopMonitor::new();

        let outcome = AsaEngine::new().run(initial, &small_config(), &mut monitor);

        let eval = SurrogateEvaluator::new(&instance, AsaConfig::default().weights);
        let reported = outcome.best().current_cost();
        let mut fresh = outcome.best().clone();
        let full = eval.reevaluate(&mut fresh);
        assert!(
            (reported - full).abs() <= 1e-6 * (1.0 + full.abs()),
            "best cost {} diverged from full recompute {}",
            reported,
            full
        );
    }

    #[test]
    fn test_monitor_abort_is_propagated() {
        struct AbortAfter {
            iterations: u64,
        }

        impl<T: UnitNumeric> SolveMonitor<T> for AbortAfter {
            fn name(&self) -> &str {
                "AbortAfter"
            }
            fn on_start(&mut self, _initial: &SolutionState<'_, T>) {}
            fn on_iteration(&mut self, _c: &SolutionState<'_, T>, _s: &AsaStatistics) {}
            fn on_best_solution_updated(&mut self, _b: &SolutionState<'_, T>, _s: &AsaStatistics) {}
            fn on_end(&mut self, _b: &SolutionState<'_, T>, _s: &AsaStatistics) {}
            fn search_command(&mut self, statistics: &AsaStatistics) -> SearchCommand {
                if statistics.iterations >= self.iterations {
                    SearchCommand::Terminate("external stop".to_string())
                } else {
                    SearchCommand::Continue
                }
            }
        }

        let instance = build_instance();
        let initial = SolutionState::new(&instance, [oi(0)], [ai(0)]);
        let mut monitor = AbortAfter { iterations: 25 };

        let config = AsaConfig::default()
            .with_max_runtime(Duration::from_secs(30))
            .with_seed(5);
        let outcome = AsaEngine::new().run(initial, &config, &mut monitor);

        assert_eq!(
            outcome.termination_reason(),
            &AsaTerminationReason::Aborted("external stop".to_string())
        );
        assert!(outcome.statistics().iterations >= 25);
    }
}
