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

//! A monitor that fans every hook out to a stack of monitors.
//!
//! Termination requests short-circuit: the first monitor returning
//! `Terminate` wins and its reason is propagated.

use crate::{
    monitor::search_monitor::{SearchCommand, SolveMonitor},
    state::SolutionState,
    stats::AsaStatistics,
};
use pickwave_core::num::UnitNumeric;

/// A stack of monitors treated as one.
pub struct CompositeMonitor<T>
where
    T: UnitNumeric,
{
    monitors: Vec<Box<dyn SolveMonitor<T>>>,
}

impl<T> CompositeMonitor<T>
where
    T: UnitNumeric,
{
    /// Creates an empty composite.
    pub fn new() -> Self {
        Self {
            monitors: Vec::new(),
        }
    }

    /// Adds a monitor to the stack.
    pub fn add_monitor<M>(&mut self, monitor: M)
    where
        M: SolveMonitor<T> + 'static,
    {
        self.monitors.push(Box::new(monitor));
    }

    /// Number of stacked monitors.
    #[inline]
    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    /// Returns `true` if no monitors are stacked.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }
}

impl<T> Default for CompositeMonitor<T>
where
    T: UnitNumeric,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SolveMonitor<T> for CompositeMonitor<T>
where
    T: UnitNumeric,
{
    fn name(&self) -> &str {
        "CompositeMonitor"
    }

    fn on_start(&mut self, initial_solution: &SolutionState<'_, T>) {
        for monitor in &mut self.monitors {
            monitor.on_start(initial_solution);
        }
    }

    fn on_iteration(
        &mut self,
        current_solution: &SolutionState<'_, T>,
        statistics: &AsaStatistics,
    ) {
        for monitor in &mut self.monitors {
            monitor.on_iteration(current_solution, statistics);
        }
    }

    fn on_best_solution_updated(
        &mut self,
        best_solution: &SolutionState<'_, T>,
        statistics: &AsaStatistics,
    ) {
        for monitor in &mut self.monitors {
            monitor.on_best_solution_updated(best_solution, statistics);
        }
    }

    fn on_end(&mut self, best_solution: &SolutionState<'_, T>, statistics: &AsaStatistics) {
        for monitor in &mut self.monitors {
            monitor.on_end(best_solution, statistics);
        }
    }

    fn search_command(&mut self, statistics: &AsaStatistics) -> SearchCommand {
        for monitor in &mut self.monitors {
            if let SearchCommand::Terminate(reason) = monitor.search_command(statistics) {
                return SearchCommand::Terminate(reason);
            }
        }
        SearchCommand::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::search_monitor::NoopMonitor;
    use crate::monitor::time::TimeLimitMonitor;
    use std::time::Duration;

    #[test]
    fn test_empty_composite_continues() {
        let mut composite = CompositeMonitor::<u32>::new();
        assert!(composite.is_empty());
        let stats = AsaStatistics::default();
        assert_eq!(composite.search_command(&stats), SearchCommand::Continue);
    }

    #[test]
    fn test_first_terminating_monitor_wins() {
        let mut composite = CompositeMonitor::<u32>::new();
        composite.add_monitor(NoopMonitor::new());
        composite.add_monitor(TimeLimitMonitor::with_mask(Duration::ZERO, 0));
        assert_eq!(composite.len(), 2);

        let stats = AsaStatistics::default();
        assert!(matches!(
            composite.search_command(&stats),
            SearchCommand::Terminate(_)
        ));
    }
}
