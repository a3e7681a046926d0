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

//! Wall-clock budgeting for the ASA driver.
//!
//! `TimeBudget` is the opaque "time remaining" oracle the driver polls once
//! per outer iteration and between intensification sub-iterations.
//! `TimeLimitMonitor` exposes the same mechanism through the monitor
//! interface; to minimize overhead its clock checks are throttled with a step
//! mask applied to the iteration counter, so the clock is queried roughly
//! every 4096 iterations by default.

use crate::{
    monitor::search_monitor::{SearchCommand, SolveMonitor},
    state::SolutionState,
    stats::AsaStatistics,
};
use pickwave_core::num::UnitNumeric;
use std::time::{Duration, Instant};

/// A restartable wall-clock budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBudget {
    started: Instant,
    limit: Duration,
}

impl TimeBudget {
    /// Creates a budget of `limit`, starting now.
    pub fn new(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    /// Restarts the budget from now.
    #[inline]
    pub fn restart(&mut self) {
        self.started = Instant::now();
    }

    /// Remaining time, saturating at zero.
    #[inline]
    pub fn remaining(&self) -> Duration {
        self.limit.saturating_sub(self.started.elapsed())
    }

    /// Returns `true` once the budget is used up.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.remaining() == Duration::ZERO
    }
}

/// A lightweight monitor that terminates the run after a fixed wall-clock
/// duration. Clock checks are throttled by `clock_check_mask`: the clock is
/// only queried when `iterations & mask == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeLimitMonitor {
    budget: TimeBudget,
    clock_check_mask: u64,
}

impl TimeLimitMonitor {
    /// Default mask for clock checks; queries the clock every 4096 steps.
    const DEFAULT_STEP_CLOCK_CHECK_MASK: u64 = 0x0FFF;

    /// Creates a monitor with the specified time limit.
    pub fn new(time_limit: Duration) -> Self {
        Self {
            budget: TimeBudget::new(time_limit),
            clock_check_mask: Self::DEFAULT_STEP_CLOCK_CHECK_MASK,
        }
    }

    /// Creates a monitor with a custom step clock check mask. Lower mask
    /// values check more often; higher values check less often.
    pub fn with_mask(time_limit: Duration, clock_check_mask: u64) -> Self {
        Self {
            budget: TimeBudget::new(time_limit),
            clock_check_mask,
        }
    }
}

impl<T> SolveMonitor<T> for TimeLimitMonitor
where
    T: UnitNumeric,
{
    fn name(&self) -> &str {
        "TimeLimitMonitor"
    }

    fn on_start(&mut self, _initial_solution: &SolutionState<'_, T>) {
        self.budget.restart();
    }

    fn on_iteration(
        &mut self,
        _current_solution: &SolutionState<'_, T>,
        _statistics: &AsaStatistics,
    ) {
    }

    fn on_best_solution_updated(
        &mut self,
        _best_solution: &SolutionState<'_, T>,
        _statistics: &AsaStatistics,
    ) {
    }

    fn on_end(&mut self, _best_solution: &SolutionState<'_, T>, _statistics: &AsaStatistics) {}

    fn search_command(&mut self, statistics: &AsaStatistics) -> SearchCommand {
        if (statistics.iterations & self.clock_check_mask) == 0 && self.budget.is_exhausted() {
            return SearchCommand::Terminate("time limit exceeded".to_string());
        }
        SearchCommand::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_counts_down_and_exhausts() {
        let budget = TimeBudget::new(Duration::ZERO);
        assert!(budget.is_exhausted());
        assert_eq!(budget.remaining(), Duration::ZERO);

        let generous = TimeBudget::new(Duration::from_secs(3600));
        assert!(!generous.is_exhausted());
        assert!(generous.remaining() > Duration::from_secs(3000));
    }

    #[test]
    fn test_monitor_terminates_on_exhausted_budget() {
        let mut monitor = TimeLimitMonitor::with_mask(Duration::ZERO, 0);
        let stats = AsaStatistics::default();
        let command = <TimeLimitMonitor as SolveMonitor<u32>>::search_command(&mut monitor, &stats);
        assert!(matches!(command, SearchCommand::Terminate(_)));
    }

    #[test]
    fn test_monitor_mask_throttles_checks() {
        // Mask 0x1 means odd iteration counts never query the clock.
        let mut monitor = TimeLimitMonitor::with_mask(Duration::ZERO, 0x1);
        let mut stats = AsaStatistics::default();
        stats.iterations = 3;
        let command = <TimeLimitMonitor as SolveMonitor<u32>>::search_command(&mut monitor, &stats);
        assert_eq!(command, SearchCommand::Continue);
    }
}
