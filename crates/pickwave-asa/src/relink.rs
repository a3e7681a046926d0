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

//! Path relinking between two solutions.
//!
//! Relinking walks from an origin solution towards a guide solution, one
//! differing element at a time. The move list is the symmetric difference of
//! the chosen sets (orders and aisles, adds and removes). Each move's benefit
//! is estimated on a fresh copy of the origin; the most promising quarter of
//! the moves keeps its rank order while the trailing three quarters are
//! shuffled to avoid order bias. Moves are applied sequentially on a working
//! copy, repairing after each step, and the best intermediate solution seen
//! is returned. Optionally, every new best is refined with a
//! first-improvement descent.

use crate::{
    eval::SurrogateEvaluator,
    fls::{FocusedLocalSearch, Mode, ToggleMove},
    repair::Validator,
    state::SolutionState,
};
use pickwave_core::num::UnitNumeric;
use pickwave_model::index::{AisleIndex, OrderIndex};
use rand::{Rng, seq::SliceRandom};
use std::cmp::Ordering;

/// Path relinking driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathRelinker {
    /// Refine every improving intermediate with a first-improvement descent.
    pub refine: bool,
}

impl Default for PathRelinker {
    fn default() -> Self {
        Self { refine: true }
    }
}

impl PathRelinker {
    /// Creates a relinker; `refine` enables local-search polishing of
    /// improving intermediates.
    pub fn new(refine: bool) -> Self {
        Self { refine }
    }

    /// Relinks `origin` towards `guide` and returns the best solution seen on
    /// the path (a copy of `origin` when the two are identical).
    pub fn relink<'a, T, R>(
        &self,
        origin: &SolutionState<'a, T>,
        guide: &SolutionState<'a, T>,
        validator: &Validator<T>,
        eval: &mut SurrogateEvaluator<T>,
        fls: &mut FocusedLocalSearch,
        rng: &mut R,
    ) -> SolutionState<'a, T>
    where
        T: UnitNumeric,
        R: Rng,
    {
        if origin == guide {
            return origin.clone();
        }

        let moves = self.ranked_moves(origin, guide, validator, eval, rng);

        let mut current = origin.clone();
        let mut best = current.clone();
        let mut best_cost = eval.cost(&mut current);

        for mv in moves {
            mv.commit(&mut current, validator, eval);
            let cost = eval.cost(&mut current);
            if cost < best_cost {
                best = current.clone();
                best_cost = cost;

                if self.refine {
                    let refined =
                        fls.apply(&best, Mode::FirstImprovement, validator, eval, rng);
                    if refined.current_cost() < best_cost {
                        best_cost = refined.current_cost();
                        best = refined;
                    }
                }
            }
        }

        best
    }

    /// Builds the symmetric-difference move list, ranked by estimated
    /// improvement (largest first) with the trailing 75% shuffled.
    fn ranked_moves<T, R>(
        &self,
        origin: &SolutionState<'_, T>,
        guide: &SolutionState<'_, T>,
        validator: &Validator<T>,
        eval: &mut SurrogateEvaluator<T>,
        rng: &mut R,
    ) -> Vec<ToggleMove>
    where
        T: UnitNumeric,
        R: Rng,
    {
        let mut moves = Vec::new();
        for id in guide.chosen_order_ids() {
            if !origin.contains_order(OrderIndex::new(id)) {
                moves.push(ToggleMove::AddOrder(id));
            }
        }
        for id in origin.chosen_order_ids() {
            if !guide.contains_order(OrderIndex::new(id)) {
                moves.push(ToggleMove::RemoveOrder(id));
            }
        }
        for id in guide.chosen_aisle_ids() {
            if !origin.contains_aisle(AisleIndex::new(id)) {
                moves.push(ToggleMove::AddAisle(id));
            }
        }
        for id in origin.chosen_aisle_ids() {
            if !guide.contains_aisle(AisleIndex::new(id)) {
                moves.push(ToggleMove::RemoveAisle(id));
            }
        }

        // Estimate each move's improvement on a fresh copy of the origin.
        let mut estimated: Vec<(ToggleMove, f64)> = moves
            .into_iter()
            .map(|mv| {
                let mut probe = origin.clone();
                let before = eval.cost(&mut probe);
                mv.commit(&mut probe, validator, eval);
                let after = eval.cost(&mut probe);
                let improvement = if before.is_finite() || after.is_finite() {
                    before - after
                } else {
                    0.0
                };
                (mv, improvement)
            })
            .collect();

        // Biggest improvement first; ties keep a stable move order.
        estimated.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        let mut ranked: Vec<ToggleMove> = estimated.into_iter().map(|(mv, _)| mv).collect();

        // Keep the top quarter ordered, shuffle the rest.
        let keep = (ranked.len() / 4).max(1);
        if keep < ranked.len() {
            ranked[keep..].shuffle(rng);
        }
        ranked
    }
}
