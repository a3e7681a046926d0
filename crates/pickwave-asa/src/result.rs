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

//! ASA outcome and termination reporting.
//!
//! The outcome bundles the best solution state observed during the run, the
//! aggregate statistics, and a concise termination reason, and can project
//! the state into the reported `PickingSolution` (true objective: picked
//! units per visited aisle).

use crate::{state::SolutionState, stats::AsaStatistics};
use pickwave_core::num::UnitNumeric;
use pickwave_model::{
    index::{AisleIndex, OrderIndex},
    solution::PickingSolution,
};

/// Why the ASA driver stopped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AsaTerminationReason {
    /// The stagnation counter reached its configured maximum.
    Stagnation,
    /// The time oracle reported no remaining budget.
    TimeLimit,
    /// A monitor requested termination; the string carries its reason.
    Aborted(String),
}

impl std::fmt::Display for AsaTerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AsaTerminationReason::Stagnation => write!(f, "Stagnation limit reached"),
            AsaTerminationReason::TimeLimit => write!(f, "Time limit exceeded"),
            AsaTerminationReason::Aborted(reason) => write!(f, "Aborted: {}", reason),
        }
    }
}

/// Result of one ASA run.
pub struct AsaOutcome<'a, T>
where
    T: UnitNumeric,
{
    termination_reason: AsaTerminationReason,
    best: SolutionState<'a, T>,
    statistics: AsaStatistics,
}

impl<'a, T> AsaOutcome<'a, T>
where
    T: UnitNumeric,
{
    /// Creates a new outcome.
    pub fn new(
        best: SolutionState<'a, T>,
        termination_reason: AsaTerminationReason,
        statistics: AsaStatistics,
    ) -> Self {
        Self {
            termination_reason,
            best,
            statistics,
        }
    }

    /// Why the run stopped.
    #[inline]
    pub fn termination_reason(&self) -> &AsaTerminationReason {
        &self.termination_reason
    }

    /// The best solution state observed (surrogate-cost minimal among the
    /// feasible states encountered).
    #[inline]
    pub fn best(&self) -> &SolutionState<'a, T> {
        &self.best
    }

    /// Consumes the outcome and returns the best state.
    #[inline]
    pub fn into_best(self) -> SolutionState<'a, T> {
        self.best
    }

    /// The run statistics.
    #[inline]
    pub fn statistics(&self) -> &AsaStatistics {
        &self.statistics
    }

    /// Projects the best state into the reported solution, computing the
    /// true objective: total picked units divided by the number of visited
    /// aisles (zero for an empty wave or no aisles).
    pub fn to_picking_solution(&self) -> PickingSolution {
        state_to_picking_solution(&self.best)
    }
}

/// Projects any solution state into the reported `PickingSolution`.
pub fn state_to_picking_solution<T>(state: &SolutionState<'_, T>) -> PickingSolution
where
    T: UnitNumeric,
{
    let orders: Vec<OrderIndex> = state.chosen_order_ids().map(OrderIndex::new).collect();
    let aisles: Vec<AisleIndex> = state.chosen_aisle_ids().map(AisleIndex::new).collect();
    let num_aisles = aisles.len();

    let objective = if orders.is_empty() || num_aisles == 0 {
        0.0
    } else {
        let units = state.total_picked_units().to_f64().unwrap_or(0.0);
        units / num_aisles as f64
    };

    PickingSolution::new(orders, aisles, objective)
}

impl<'a, T> std::fmt::Debug for AsaOutcome<'a, T>
where
    T: UnitNumeric,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "AsaOutcome(termination: {}, best: {:?})",
            self.termination_reason, self.best
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pickwave_model::instance::InstanceBuilder;

    #[test]
    fn test_objective_is_units_per_aisle() {
        let mut builder = InstanceBuilder::<u32>::new(1);
        builder.push_order([(0, 3)]);
        builder.push_aisle([(0, 5)]);
        builder.wave_bounds(3, 3);
        let instance = builder.build();

        let state = SolutionState::new(
            &instance,
            [OrderIndex::new(0)],
            [AisleIndex::new(0)],
        );
        let solution = state_to_picking_solution(&state);
        assert_eq!(solution.objective(), 3.0);
        assert_eq!(solution.orders().len(), 1);
        assert_eq!(solution.aisles().len(), 1);
    }

    #[test]
    fn test_empty_wave_reports_zero_objective() {
        let mut builder = InstanceBuilder::<u32>::new(1);
        builder.push_order([(0, 3)]);
        builder.push_aisle([(0, 5)]);
        builder.wave_bounds(0, 3);
        let instance = builder.build();

        let state = SolutionState::new(&instance, [], [AisleIndex::new(0)]);
        let solution = state_to_picking_solution(&state);
        assert_eq!(solution.objective(), 0.0);
    }

    #[test]
    fn test_termination_reason_display() {
        assert_eq!(
            format!("{}", AsaTerminationReason::Stagnation),
            "Stagnation limit reached"
        );
        assert_eq!(
            format!("{}", AsaTerminationReason::TimeLimit),
            "Time limit exceeded"
        );
        assert_eq!(
            format!("{}", AsaTerminationReason::Aborted("external".into())),
            "Aborted: external"
        );
    }
}
