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

//! # Pickwave ASA
//!
//! **The Adaptive Simulated Annealing engine for the Pickwave solver.**
//!
//! This crate implements the algorithmic core of the wave-picking search: a
//! mutable solution state with incremental coverage bookkeeping, a
//! delta-evaluated surrogate cost function, a set-cover based repair layer, a
//! family of move operators selected by a multi-armed bandit, and the
//! intensification stack (focused local search, path relinking, an elite
//! archive, and memetic tabu refinement) orchestrated by a flat ASA driver
//! loop.
//!
//! ## Architecture
//!
//! * **`state`**: The working solution — chosen orders/aisles, per-(order,
//!   item) coverage counters, adjacency maps, and the delta-maintained cost.
//! * **`eval`**: The surrogate cost and exact delta evaluation with caching
//!   and a parallel batch API.
//! * **`repair`**: Presence-based feasibility, greedy set-cover repair,
//!   redundant-aisle pruning, and infeasible-order eviction.
//! * **`operator`**: The tagged-variant move operators (add/remove/swap/LNS/
//!   objective-focused).
//! * **`selector`**: The adaptive operator selector (UCB1, ε-greedy,
//!   roulette).
//! * **`fls`**, **`relink`**, **`elite`**, **`memetic`**: Intensification.
//! * **`monitor`**: Lifecycle observation and the wall-clock time budget.
//! * **`config`**, **`stats`**, **`result`**, **`engine`**: Driver surface.
//!
//! All state transitions on a solution are totally ordered; deltas are valid
//! only with respect to the state snapshot at which they were computed, and
//! every mutation bumps a version counter that invalidates the evaluator's
//! caches. Parallelism is confined to pure read-only inner computations
//! (batched delta evaluation, best-improvement scans).

pub mod config;
pub mod elite;
pub mod engine;
pub mod eval;
pub mod fls;
pub mod memetic;
pub mod monitor;
pub mod operator;
pub mod relink;
pub mod repair;
pub mod result;
pub mod selector;
pub mod state;
pub mod stats;
