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

//! # Solve Monitoring Interface
//!
//! An extensible callback interface for observing and controlling the
//! lifecycle of an ASA run. Implementations can collect metrics, log
//! progress, react to new best solutions, and issue termination commands
//! based on external criteria (time, iteration budgets, external
//! controllers).

use crate::{state::SolutionState, stats::AsaStatistics};
use pickwave_core::num::UnitNumeric;

/// Control signal emitted by monitors to continue or abort the run.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub enum SearchCommand {
    /// Keep iterating.
    #[default]
    Continue,
    /// Stop the run; the string explains why.
    Terminate(String),
}

impl std::fmt::Display for SearchCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchCommand::Continue => write!(f, "Continue"),
            SearchCommand::Terminate(reason) => write!(f, "Terminate: {}", reason),
        }
    }
}

/// Lifecycle hooks of one ASA run.
pub trait SolveMonitor<T>
where
    T: UnitNumeric,
{
    /// Human-readable monitor name.
    fn name(&self) -> &str;

    /// Called once before the first iteration.
    fn on_start(&mut self, initial_solution: &SolutionState<'_, T>);

    /// Called at the end of every outer-loop iteration.
    fn on_iteration(&mut self, current_solution: &SolutionState<'_, T>, statistics: &AsaStatistics);

    /// Called whenever a new global best is recorded.
    fn on_best_solution_updated(
        &mut self,
        best_solution: &SolutionState<'_, T>,
        statistics: &AsaStatistics,
    );

    /// Called once after the loop terminates.
    fn on_end(&mut self, best_solution: &SolutionState<'_, T>, statistics: &AsaStatistics);

    /// Polled once per iteration; return `Terminate` to stop the run.
    fn search_command(&mut self, statistics: &AsaStatistics) -> SearchCommand;
}

impl<T> std::fmt::Debug for dyn SolveMonitor<T>
where
    T: UnitNumeric,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SolveMonitor({})", self.name())
    }
}

/// A monitor that observes nothing and never terminates. Useful as a default
/// and in tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoopMonitor;

impl NoopMonitor {
    /// Creates a new no-op monitor.
    pub fn new() -> Self {
        Self
    }
}

impl<T> SolveMonitor<T> for NoopMonitor
where
    T: UnitNumeric,
{
    fn name(&self) -> &str {
        "NoopMonitor"
    }

    fn on_start(&mut self, _initial_solution: &SolutionState<'_, T>) {}

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

    fn search_command(&mut self, _statistics: &AsaStatistics) -> SearchCommand {
        SearchCommand::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_command_display() {
        assert_eq!(format!("{}", SearchCommand::Continue), "Continue");
        assert_eq!(
            format!("{}", SearchCommand::Terminate("budget".into())),
            "Terminate: budget"
        );
    }

    #[test]
    fn test_noop_monitor_never_terminates() {
        let mut monitor = NoopMonitor::new();
        let stats = AsaStatistics::default();
        let command = <NoopMonitor as SolveMonitor<u32>>::search_command(&mut monitor, &stats);
        assert_eq!(command, SearchCommand::Continue);
    }
}
