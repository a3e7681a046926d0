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

//! Focused Local Search (variable neighborhood descent).
//!
//! The search iterates two move neighborhoods — order toggles, then aisle
//! toggles — in one of two modes. Best-improvement scans every neighbor of
//! both neighborhoods (delta evaluation fanned out over rayon) and commits
//! the strictly best feasible one. First-improvement shuffles each
//! neighborhood, commits the first strictly improving feasible neighbor, and
//! restarts that neighborhood until it runs dry before falling through to the
//! next.
//!
//! Patience scales with the solution size and shrinks geometrically as the
//! improvement ratio grows, so an already-profitable descent gives up on
//! plateaus sooner. When restarts are allowed and the descent stagnates, a
//! light mutation (remove one random chosen order or aisle, then repair)
//! kicks the search away from the incumbent.
//!
//! Neighbor move lists are memoized per solution signature in a cache that is
//! external to the solution and simply dropped when it grows too large. A
//! stale memo entry is harmless: toggles that no longer apply delta-evaluate
//! to zero and are never committed.

use crate::{eval::SurrogateEvaluator, repair::Validator, state::SolutionState};
use pickwave_core::num::UnitNumeric;
use pickwave_model::index::{AisleIndex, OrderIndex};
use rand::{Rng, seq::SliceRandom};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Entries kept in the neighborhood memo before it is dropped wholesale.
const MEMO_CAPACITY: usize = 128;

/// Search mode of the descent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Scan all neighbors in all neighborhoods; move to the strictly best
    /// feasible one.
    BestImprovement,
    /// Per neighborhood, move to the first strictly improving feasible
    /// neighbor found in shuffled order, then restart that neighborhood.
    FirstImprovement,
}

/// A single toggle move over the chosen sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToggleMove {
    /// Add the order to the wave.
    AddOrder(usize),
    /// Remove the order from the wave.
    RemoveOrder(usize),
    /// Visit the aisle.
    AddAisle(usize),
    /// Leave the aisle.
    RemoveAisle(usize),
}

impl ToggleMove {
    /// The exact surrogate delta of this move in the given state.
    pub fn delta<T: UnitNumeric>(
        &self,
        state: &SolutionState<'_, T>,
        eval: &SurrogateEvaluator<T>,
    ) -> f64 {
        match *self {
            ToggleMove::AddOrder(id) => eval.delta_add_order_uncached(state, id),
            ToggleMove::RemoveOrder(id) => eval.delta_remove_order_uncached(state, id),
            ToggleMove::AddAisle(id) => eval.delta_add_aisle_uncached(state, id),
            ToggleMove::RemoveAisle(id) => eval.delta_remove_aisle_uncached(state, id),
        }
    }

    /// Commits this move, repairing afterwards if it broke feasibility.
    pub fn commit<T: UnitNumeric>(
        &self,
        state: &mut SolutionState<'_, T>,
        validator: &Validator<T>,
        eval: &mut SurrogateEvaluator<T>,
    ) {
        match *self {
            ToggleMove::AddOrder(id) => {
                eval.apply_add_order(state, OrderIndex::new(id));
            }
            ToggleMove::RemoveOrder(id) => {
                eval.apply_remove_order(state, OrderIndex::new(id));
            }
            ToggleMove::AddAisle(id) => {
                eval.apply_add_aisle(state, AisleIndex::new(id));
            }
            ToggleMove::RemoveAisle(id) => {
                eval.apply_remove_aisle(state, AisleIndex::new(id));
            }
        }
        if !validator.is_feasible(state) {
            validator.repair(state, eval);
        }
    }
}

/// The two neighborhood generators, iterated in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum NeighborhoodKind {
    Orders,
    Aisles,
}

const NEIGHBORHOOD_ORDER: [NeighborhoodKind; 2] =
    [NeighborhoodKind::Orders, NeighborhoodKind::Aisles];

/// Configuration of the focused local search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlsConfig {
    /// Maximum number of descent iterations.
    pub max_iterations: u64,
    /// Wall-clock budget for one `apply` call.
    pub timeout: Duration,
    /// Stop as soon as the best cost reaches this value.
    pub target_cost: f64,
    /// Stagnation threshold triggering the restart mutation (when allowed).
    pub max_no_improvement: u64,
    /// Whether stagnation triggers a light mutation restart from the best.
    pub allow_restart: bool,
    /// Patience per unit of solution size.
    pub patience_factor: usize,
    /// Minimum cost decrease considered an improvement.
    pub improvement_epsilon: f64,
}

impl Default for FlsConfig {
    fn default() -> Self {
        Self {
            max_iterations: u64::MAX,
            timeout: Duration::MAX,
            target_cost: f64::NEG_INFINITY,
            max_no_improvement: u64::MAX,
            allow_restart: false,
            patience_factor: 10,
            improvement_epsilon: 1e-8,
        }
    }
}

impl FlsConfig {
    /// Sets the iteration budget.
    pub fn with_max_iterations(mut self, value: u64) -> Self {
        self.max_iterations = value;
        self
    }

    /// Sets the wall-clock budget.
    pub fn with_timeout(mut self, value: Duration) -> Self {
        self.timeout = value;
        self
    }

    /// Sets the stagnation threshold.
    pub fn with_max_no_improvement(mut self, value: u64) -> Self {
        self.max_no_improvement = value;
        self
    }

    /// Enables or disables restart mutations.
    pub fn with_allow_restart(mut self, value: bool) -> Self {
        self.allow_restart = value;
        self
    }

    /// Sets the patience factor.
    pub fn with_patience_factor(mut self, value: usize) -> Self {
        self.patience_factor = value;
        self
    }
}

/// Variable neighborhood descent over order and aisle toggles.
pub struct FocusedLocalSearch {
    config: FlsConfig,
    memo: HashMap<(u64, NeighborhoodKind), Vec<ToggleMove>>,
}

impl FocusedLocalSearch {
    /// Creates a new search with the given configuration.
    pub fn new(config: FlsConfig) -> Self {
        Self {
            config,
            memo: HashMap::new(),
        }
    }

    /// Returns the active configuration.
    #[inline]
    pub fn config(&self) -> &FlsConfig {
        &self.config
    }

    /// Replaces the active configuration.
    #[inline]
    pub fn set_config(&mut self, config: FlsConfig) {
        self.config = config;
    }

    /// Runs the descent from `start` and returns the best solution found
    /// (`start` itself if nothing improved).
    pub fn apply<'a, T, R>(
        &mut self,
        start: &SolutionState<'a, T>,
        mode: Mode,
        validator: &Validator<T>,
        eval: &mut SurrogateEvaluator<T>,
        rng: &mut R,
    ) -> SolutionState<'a, T>
    where
        T: UnitNumeric,
        R: Rng,
    {
        let started = Instant::now();
        let mut current = start.clone();
        let initial_cost = eval.cost(&mut current);
        let mut best = current.clone();
        let mut best_cost = initial_cost;

        let size = current.num_chosen_orders() + current.num_chosen_aisles();
        let patience_base = (self.config.patience_factor * size).max(1) as u64;
        let mut patience = patience_base;
        let mut no_improve = 0u64;
        let mut iterations = 0u64;

        while !self.should_stop(iterations, &started, best_cost, no_improve, patience) {
            match mode {
                Mode::BestImprovement => {
                    self.best_improvement_step(&mut current, validator, eval);
                }
                Mode::FirstImprovement => {
                    self.first_improvement_step(&mut current, validator, eval, rng);
                }
            }
            iterations += 1;

            let cost = eval.cost(&mut current);
            if cost < best_cost - self.config.improvement_epsilon {
                best_cost = cost;
                best = current.clone();
                no_improve = 0;
                // Geometric patience reduction as the improvement ratio grows.
                if initial_cost.is_finite() && initial_cost.abs() > f64::EPSILON {
                    let ratio = (initial_cost - best_cost) / initial_cost;
                    patience = ((patience_base as f64) * (1.0 - ratio)).max(1.0) as u64;
                }
            } else {
                no_improve += 1;
            }

            if self.config.allow_restart && no_improve >= self.config.max_no_improvement {
                current = self.mutate_lightly(&best, validator, eval, rng);
                no_improve = 0;
            }
        }

        best
    }

    fn should_stop(
        &self,
        iterations: u64,
        started: &Instant,
        best_cost: f64,
        no_improve: u64,
        patience: u64,
    ) -> bool {
        iterations >= self.config.max_iterations
            || started.elapsed() > self.config.timeout
            || best_cost <= self.config.target_cost
            || no_improve >= patience
    }

    /// One best-improvement step: parallel scan of both neighborhoods, commit
    /// the strictly best move if it survives the feasibility check.
    fn best_improvement_step<T>(
        &mut self,
        current: &mut SolutionState<'_, T>,
        validator: &Validator<T>,
        eval: &mut SurrogateEvaluator<T>,
    ) where
        T: UnitNumeric,
    {
        let mut moves = self.neighborhood_moves(current, NeighborhoodKind::Orders);
        moves.extend(self.neighborhood_moves(current, NeighborhoodKind::Aisles));
        if moves.is_empty() {
            return;
        }

        let best_move = {
            let scan_eval: &SurrogateEvaluator<T> = eval;
            let scan_state: &SolutionState<'_, T> = current;
            moves
                .par_iter()
                .enumerate()
                .map(|(slot, mv)| (mv.delta(scan_state, scan_eval), slot))
                .min_by(|a, b| {
                    a.0.partial_cmp(&b.0)
                        .unwrap_or(Ordering::Equal)
                        .then_with(|| a.1.cmp(&b.1))
                })
        };

        if let Some((delta, slot)) = best_move
            && delta < -self.config.improvement_epsilon
        {
            let before = eval.cost(current);
            let backup = current.clone();
            moves[slot].commit(current, validator, eval);
            // Repair may overshoot; only keep genuinely improving commits.
            if eval.cost(current) >= before - self.config.improvement_epsilon {
                *current = backup;
            }
        }
    }

    /// One first-improvement sweep: per neighborhood, shuffled, committing
    /// improving moves and restarting the neighborhood after each success.
    fn first_improvement_step<T, R>(
        &mut self,
        current: &mut SolutionState<'_, T>,
        validator: &Validator<T>,
        eval: &mut SurrogateEvaluator<T>,
        rng: &mut R,
    ) where
        T: UnitNumeric,
        R: Rng,
    {
        for kind in NEIGHBORHOOD_ORDER {
            loop {
                let mut moves = self.neighborhood_moves(current, kind);
                moves.shuffle(rng);

                let mut committed = false;
                for mv in moves {
                    let delta = mv.delta(current, eval);
                    if delta >= -self.config.improvement_epsilon {
                        continue;
                    }
                    let before = eval.cost(current);
                    let backup = current.clone();
                    mv.commit(current, validator, eval);
                    if eval.cost(current) < before - self.config.improvement_epsilon {
                        committed = true;
                        break;
                    }
                    *current = backup;
                }

                if !committed {
                    break;
                }
            }
        }
    }

    /// Move list of a neighborhood for this solution, via the signature memo.
    fn neighborhood_moves<T>(
        &mut self,
        state: &SolutionState<'_, T>,
        kind: NeighborhoodKind,
    ) -> Vec<ToggleMove>
    where
        T: UnitNumeric,
    {
        if self.memo.len() > MEMO_CAPACITY {
            self.memo.clear();
        }

        let key = (state.signature(), kind);
        if let Some(moves) = self.memo.get(&key) {
            return moves.clone();
        }

        let moves: Vec<ToggleMove> = match kind {
            NeighborhoodKind::Orders => state
                .unchosen_order_ids()
                .map(ToggleMove::AddOrder)
                .chain(state.chosen_order_ids().map(ToggleMove::RemoveOrder))
                .collect(),
            NeighborhoodKind::Aisles => state
                .unchosen_aisle_ids()
                .map(ToggleMove::AddAisle)
                .chain(state.chosen_aisle_ids().map(ToggleMove::RemoveAisle))
                .collect(),
        };
        self.memo.insert(key, moves.clone());
        moves
    }

    /// Light mutation used by restarts: drop one random chosen order or
    /// aisle from the best known solution, then repair.
    fn mutate_lightly<'a, T, R>(
        &self,
        best: &SolutionState<'a, T>,
        validator: &Validator<T>,
        eval: &mut SurrogateEvaluator<T>,
        rng: &mut R,
    ) -> SolutionState<'a, T>
    where
        T: UnitNumeric,
        R: Rng,
    {
        let mut mutated = best.clone();
        let orders: Vec<usize> = mutated.chosen_order_ids().collect();
        let aisles: Vec<usize> = mutated.chosen_aisle_ids().collect();

        if !orders.is_empty() && (aisles.is_empty() || rng.random_bool(0.5)) {
            let id = orders[rng.random_range(0..orders.len())];
            eval.apply_remove_order(&mut mutated, OrderIndex::new(id));
        } else if !aisles.is_empty() {
            let id = aisles[rng.random_range(0..aisles.len())];
            eval.apply_remove_aisle(&mut mutated, AisleIndex::new(id));
        }

        if !validator.is_feasible(&mutated) {
            validator.repair(&mut mutated, eval);
        }
        mutated
    }
}

impl std::fmt::Debug for FocusedLocalSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "FocusedLocalSearch(config: {:?}, memoized: {})",
            self.config,
            self.memo.len()
        )
    }
}
