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

//! Statistics reporting for ASA runs.
//!
//! A lightweight container for tracking aggregate metrics during a run:
//! iteration and acceptance counts, intensification activity, perturbations,
//! and drift-guard recomputations. Updates rely on saturating arithmetic to
//! avoid overflow traps in the hot loop, and the struct is owned by the
//! driver and returned inside the outcome — there is no global mutable state.

use std::time::Duration;

/// Aggregate counters of one ASA run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AsaStatistics {
    /// Number of outer-loop iterations performed.
    pub iterations: u64,

    /// Number of accepted operator applications.
    pub accepted_moves: u64,

    /// Number of rejected operator applications.
    pub rejected_moves: u64,

    /// Number of times a new global best was recorded.
    pub best_updates: u64,

    /// Number of full surrogate recomputations (drift guard).
    pub full_evaluations: u64,

    /// Focused local search: applications and improvements.
    pub fls_applied: u64,
    /// Focused local search improvements.
    pub fls_improved: u64,

    /// Path relinking: applications and improvements.
    pub path_relinking_applied: u64,
    /// Path relinking improvements.
    pub path_relinking_improved: u64,

    /// Memetic tabu intensification: applications and improvements.
    pub memetic_applied: u64,
    /// Memetic tabu improvements.
    pub memetic_improved: u64,

    /// Number of stagnation-escape perturbations fired.
    pub perturbations: u64,

    /// Total wall-clock time of the run.
    pub time_total: Duration,
}

impl Default for AsaStatistics {
    fn default() -> Self {
        Self {
            iterations: 0,
            accepted_moves: 0,
            rejected_moves: 0,
            best_updates: 0,
            full_evaluations: 0,
            fls_applied: 0,
            fls_improved: 0,
            path_relinking_applied: 0,
            path_relinking_improved: 0,
            memetic_applied: 0,
            memetic_improved: 0,
            perturbations: 0,
            time_total: Duration::ZERO,
        }
    }
}

impl AsaStatistics {
    /// Called at each outer-loop iteration.
    #[inline]
    pub fn on_iteration(&mut self) {
        self.iterations = self.iterations.saturating_add(1);
    }

    /// Called when an operator application is accepted.
    #[inline]
    pub fn on_accepted_move(&mut self) {
        self.accepted_moves = self.accepted_moves.saturating_add(1);
    }

    /// Called when an operator application is rejected.
    #[inline]
    pub fn on_rejected_move(&mut self) {
        self.rejected_moves = self.rejected_moves.saturating_add(1);
    }

    /// Called when a new global best is recorded.
    #[inline]
    pub fn on_best_update(&mut self) {
        self.best_updates = self.best_updates.saturating_add(1);
    }

    /// Called for every drift-guard full recomputation.
    #[inline]
    pub fn on_full_evaluation(&mut self) {
        self.full_evaluations = self.full_evaluations.saturating_add(1);
    }

    /// Called per focused local search invocation; `improved` marks success.
    #[inline]
    pub fn on_fls(&mut self, improved: bool) {
        self.fls_applied = self.fls_applied.saturating_add(1);
        if improved {
            self.fls_improved = self.fls_improved.saturating_add(1);
        }
    }

    /// Called per path relinking invocation; `improved` marks success.
    #[inline]
    pub fn on_path_relinking(&mut self, improved: bool) {
        self.path_relinking_applied = self.path_relinking_applied.saturating_add(1);
        if improved {
            self.path_relinking_improved = self.path_relinking_improved.saturating_add(1);
        }
    }

    /// Called per memetic intensification; `improved` marks success.
    #[inline]
    pub fn on_memetic(&mut self, improved: bool) {
        self.memetic_applied = self.memetic_applied.saturating_add(1);
        if improved {
            self.memetic_improved = self.memetic_improved.saturating_add(1);
        }
    }

    /// Called per stagnation-escape perturbation.
    #[inline]
    pub fn on_perturbation(&mut self) {
        self.perturbations = self.perturbations.saturating_add(1);
    }

    /// Sets the total wall-clock time of the run.
    #[inline]
    pub fn set_total_time(&mut self, duration: Duration) {
        self.time_total = duration;
    }

    /// Number of operator applications (accepted + rejected).
    #[inline]
    pub fn total_moves(&self) -> u64 {
        self.accepted_moves.saturating_add(self.rejected_moves)
    }
}

impl std::fmt::Display for AsaStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn rate(part: u64, whole: u64) -> f64 {
            if whole == 0 {
                0.0
            } else {
                100.0 * part as f64 / whole as f64
            }
        }

        writeln!(f, "Pickwave-ASA Statistics:")?;
        writeln!(f, "   Iterations:           {}", self.iterations)?;
        writeln!(f, "   Accepted Moves:       {}", self.accepted_moves)?;
        writeln!(f, "   Rejected Moves:       {}", self.rejected_moves)?;
        writeln!(f, "   Best Updates:         {}", self.best_updates)?;
        writeln!(f, "   Full Evaluations:     {}", self.full_evaluations)?;
        writeln!(
            f,
            "   Focused Local Search: {} applications, {} improvements ({:.1}%)",
            self.fls_applied,
            self.fls_improved,
            rate(self.fls_improved, self.fls_applied)
        )?;
        writeln!(
            f,
            "   Path Relinking:       {} applications, {} improvements ({:.1}%)",
            self.path_relinking_applied,
            self.path_relinking_improved,
            rate(self.path_relinking_improved, self.path_relinking_applied)
        )?;
        writeln!(
            f,
            "   Memetic Tabu:         {} applications, {} improvements ({:.1}%)",
            self.memetic_applied,
            self.memetic_improved,
            rate(self.memetic_improved, self.memetic_applied)
        )?;
        writeln!(f, "   Perturbations:        {}", self.perturbations)?;
        writeln!(f, "   Total Time:           {:?}", self.time_total)?;
        Ok(())
    }
}
