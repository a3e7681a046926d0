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

//! Adaptive operator selection (multi-armed bandit).
//!
//! The selector owns per-operator statistics (uses, successes, accumulated
//! reward, an exponentially decayed score) and picks the next operator
//! through one of three pluggable strategies: UCB1, ε-greedy, or roulette.
//! After every application the engine reports `(delta, accepted)` back;
//! improving moves earn a full reward, accepted-but-not-improving moves a
//! small one.
//!
//! Counters are lock-free atomics so batched parallel evaluation can report
//! feedback concurrently. The selection-probability table (used by the
//! roulette strategy's observers and the statistics display) is recomputed
//! every `update_frequency` applications behind a short writer critical
//! section of a readers-writer lock; readers always observe a consistent
//! probability vector.

use crate::operator::OperatorKind;
use rand::Rng;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Reward credited for a strictly improving move.
const REWARD_IMPROVEMENT: f64 = 1.0;
/// Reward credited for an accepted but non-improving move.
const REWARD_ACCEPTED: f64 = 0.1;
/// Decay applied to the running score before crediting a new reward.
const SCORE_DECAY: f64 = 0.95;

/// Adds `value` to an `AtomicU64` holding `f64` bits.
fn atomic_f64_add(cell: &AtomicU64, value: f64) {
    let mut current = cell.load(Ordering::Relaxed);
    loop {
        let next = (f64::from_bits(current) + value).to_bits();
        match cell.compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return,
            Err(actual) => current = actual,
        }
    }
}

/// Applies `score <- score * decay + reward` to an `AtomicU64` holding `f64`
/// bits.
fn atomic_f64_decay_credit(cell: &AtomicU64, decay: f64, reward: f64) {
    let mut current = cell.load(Ordering::Relaxed);
    loop {
        let next = (f64::from_bits(current) * decay + reward).to_bits();
        match cell.compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return,
            Err(actual) => current = actual,
        }
    }
}

/// The selection rule used by the `OperatorSelector`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionStrategy {
    /// Upper Confidence Bound: every operator is tried once, then the one
    /// maximizing `mean + c * sqrt(ln N / uses)` wins.
    Ucb1 {
        /// The exploration constant `c` (√2 by default).
        exploration_factor: f64,
    },
    /// With probability ε pick uniformly, otherwise the best mean reward.
    EpsilonGreedy {
        /// The exploration probability ε.
        epsilon: f64,
    },
    /// Pick proportionally to the mean reward shifted to non-negative;
    /// uniform fallback when the total mass vanishes.
    Roulette,
}

impl Default for SelectionStrategy {
    fn default() -> Self {
        SelectionStrategy::Ucb1 {
            exploration_factor: std::f64::consts::SQRT_2,
        }
    }
}

impl std::fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionStrategy::Ucb1 { exploration_factor } => {
                write!(f, "UCB1(c={})", exploration_factor)
            }
            SelectionStrategy::EpsilonGreedy { epsilon } => {
                write!(f, "EpsilonGreedy(eps={})", epsilon)
            }
            SelectionStrategy::Roulette => write!(f, "Roulette"),
        }
    }
}

/// Thread-safe per-operator statistics.
#[derive(Debug)]
struct OperatorStats {
    uses: AtomicU64,
    successes: AtomicU64,
    /// Sum of credited rewards, stored as `f64` bits.
    sum_reward: AtomicU64,
    /// Exponentially decayed score, stored as `f64` bits. Starts at 1.0.
    score: AtomicU64,
}

impl OperatorStats {
    fn new() -> Self {
        Self {
            uses: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            sum_reward: AtomicU64::new(0f64.to_bits()),
            score: AtomicU64::new(1f64.to_bits()),
        }
    }
}

/// The adaptive operator selector.
pub struct OperatorSelector {
    operators: Vec<OperatorKind>,
    stats: Vec<OperatorStats>,
    strategy: SelectionStrategy,
    update_frequency: u64,
    total_applications: AtomicU64,
    /// Selection probabilities, refreshed by `update_weights`. Initialized to
    /// the uniform distribution.
    probabilities: RwLock<Vec<f64>>,
}

impl OperatorSelector {
    /// Creates a selector over the given operator portfolio.
    ///
    /// # Panics
    ///
    /// Panics if `operators` is empty or `update_frequency` is zero.
    pub fn new(
        operators: Vec<OperatorKind>,
        strategy: SelectionStrategy,
        update_frequency: u64,
    ) -> Self {
        assert!(
            !operators.is_empty(),
            "called `OperatorSelector::new` with an empty operator portfolio"
        );
        assert!(
            update_frequency > 0,
            "called `OperatorSelector::new` with update_frequency 0, but it must be positive"
        );

        let n = operators.len();
        Self {
            stats: (0..n).map(|_| OperatorStats::new()).collect(),
            probabilities: RwLock::new(vec![1.0 / n as f64; n]),
            operators,
            strategy,
            update_frequency,
            total_applications: AtomicU64::new(0),
        }
    }

    /// Returns the operator portfolio.
    #[inline]
    pub fn operators(&self) -> &[OperatorKind] {
        &self.operators
    }

    /// Returns the number of operators.
    #[inline]
    pub fn len(&self) -> usize {
        self.operators.len()
    }

    /// Returns `true` if the portfolio is empty (never, by construction).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// Total number of feedbacks received so far.
    #[inline]
    pub fn total_applications(&self) -> u64 {
        self.total_applications.load(Ordering::Relaxed)
    }

    /// Number of times the operator has been applied.
    #[inline]
    pub fn uses(&self, index: usize) -> u64 {
        self.stats[index].uses.load(Ordering::Relaxed)
    }

    /// Number of successful (improving or accepted) applications.
    #[inline]
    pub fn successes(&self, index: usize) -> u64 {
        self.stats[index].successes.load(Ordering::Relaxed)
    }

    /// Sum of rewards credited to the operator.
    #[inline]
    pub fn sum_reward(&self, index: usize) -> f64 {
        f64::from_bits(self.stats[index].sum_reward.load(Ordering::Relaxed))
    }

    /// Exponentially decayed score of the operator.
    #[inline]
    pub fn score(&self, index: usize) -> f64 {
        f64::from_bits(self.stats[index].score.load(Ordering::Relaxed))
    }

    /// Mean credited reward per use (0 before the first use).
    pub fn mean_reward(&self, index: usize) -> f64 {
        let uses = self.uses(index);
        if uses == 0 {
            0.0
        } else {
            self.sum_reward(index) / uses as f64
        }
    }

    /// A snapshot of the selection-probability table.
    pub fn selection_probabilities(&self) -> Vec<f64> {
        self.probabilities
            .read()
            .expect("operator selector probability lock poisoned")
            .clone()
    }

    /// Picks the next operator index according to the configured strategy.
    pub fn select<R: Rng>(&self, rng: &mut R) -> usize {
        match self.strategy {
            SelectionStrategy::Ucb1 { exploration_factor } => self.select_ucb1(exploration_factor),
            SelectionStrategy::EpsilonGreedy { epsilon } => self.select_epsilon(epsilon, rng),
            SelectionStrategy::Roulette => self.select_roulette(rng),
        }
    }

    fn select_ucb1(&self, exploration_factor: f64) -> usize {
        // Guarantee once-each before scoring.
        for index in 0..self.len() {
            if self.uses(index) == 0 {
                return index;
            }
        }

        let ln_total = (self.total_applications().max(2) as f64).ln();
        let mut best = 0;
        let mut best_value = f64::NEG_INFINITY;
        for index in 0..self.len() {
            let uses = self.uses(index) as f64;
            let value = self.mean_reward(index) + exploration_factor * (ln_total / uses).sqrt();
            if value > best_value {
                best_value = value;
                best = index;
            }
        }
        best
    }

    fn select_epsilon<R: Rng>(&self, epsilon: f64, rng: &mut R) -> usize {
        if rng.random::<f64>() < epsilon {
            return rng.random_range(0..self.len());
        }
        let mut best = 0;
        let mut best_mean = f64::NEG_INFINITY;
        for index in 0..self.len() {
            let mean = self.mean_reward(index);
            if mean > best_mean {
                best_mean = mean;
                best = index;
            }
        }
        best
    }

    fn select_roulette<R: Rng>(&self, rng: &mut R) -> usize {
        let means: Vec<f64> = (0..self.len()).map(|i| self.mean_reward(i)).collect();
        let min = means.iter().copied().fold(f64::INFINITY, f64::min);
        let offset = if min < 0.0 { -min } else { 0.0 };
        let total: f64 = means.iter().map(|m| m + offset).sum();
        if total <= 1e-9 {
            return rng.random_range(0..self.len());
        }

        let mut threshold = rng.random::<f64>() * total;
        for (index, mean) in means.iter().enumerate() {
            threshold -= mean + offset;
            if threshold <= 0.0 {
                return index;
            }
        }
        self.len() - 1
    }

    /// Reports the outcome of one operator application.
    ///
    /// Increments the use counter; when the move improved (`delta < 0`) or
    /// was accepted, increments the success counter and credits a reward
    /// (1.0 on improvement, 0.1 on accept-without-improve). Every
    /// `update_frequency` feedbacks the probability table is recomputed.
    pub fn feedback(&self, index: usize, delta: f64, accepted: bool) {
        debug_assert!(
            index < self.len(),
            "called `OperatorSelector::feedback` with operator index out of bounds: the len is {} but the index is {}",
            self.len(),
            index
        );

        let total = self.total_applications.fetch_add(1, Ordering::Relaxed) + 1;
        self.stats[index].uses.fetch_add(1, Ordering::Relaxed);

        if delta < 0.0 || accepted {
            self.stats[index].successes.fetch_add(1, Ordering::Relaxed);
            let reward = if delta < 0.0 {
                REWARD_IMPROVEMENT
            } else {
                REWARD_ACCEPTED
            };
            atomic_f64_add(&self.stats[index].sum_reward, reward);
            atomic_f64_decay_credit(&self.stats[index].score, SCORE_DECAY, reward);
        }

        if total % self.update_frequency == 0 {
            self.update_weights();
        }
    }

    /// Recomputes the selection probabilities from the mean rewards. The
    /// writer section is short; readers always see a consistent vector that
    /// sums to one.
    pub fn update_weights(&self) {
        let means: Vec<f64> = (0..self.len()).map(|i| self.mean_reward(i)).collect();
        let min = means.iter().copied().fold(f64::INFINITY, f64::min);
        let offset = if min < 0.0 { -min } else { 0.0 };
        let total: f64 = means.iter().map(|m| m + offset).sum();

        let mut probabilities = self
            .probabilities
            .write()
            .expect("operator selector probability lock poisoned");
        if total <= 1e-9 {
            let uniform = 1.0 / self.len() as f64;
            probabilities.iter_mut().for_each(|p| *p = uniform);
        } else {
            for (slot, mean) in probabilities.iter_mut().zip(&means) {
                *slot = (mean + offset) / total;
            }
        }
    }
}

impl std::fmt::Debug for OperatorSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "OperatorSelector(strategy: {}, operators: {}, applications: {})",
            self.strategy,
            self.len(),
            self.total_applications()
        )
    }
}

impl std::fmt::Display for OperatorSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let probabilities = self.selection_probabilities();
        writeln!(
            f,
            "Operator Statistics (total applications: {})",
            self.total_applications()
        )?;
        writeln!(
            f,
            "   {:<12} | {:>7} | {:>7} | {:>5} | {:>10} | {:>8} | {:>7} | {:>6}",
            "Operator", "Uses", "Success", "Rate", "Reward", "Score", "Mean", "Prob"
        )?;
        for (index, operator) in self.operators.iter().enumerate() {
            let uses = self.uses(index);
            let successes = self.successes(index);
            let rate = if uses > 0 {
                successes as f64 / uses as f64
            } else {
                0.0
            };
            writeln!(
                f,
                "   {:<12} | {:>7} | {:>7} | {:>5.2} | {:>10.2} | {:>8.4} | {:>7.4} | {:>6.3}",
                operator.name(),
                uses,
                successes,
                rate,
                self.sum_reward(index),
                self.score(index),
                self.mean_reward(index),
                probabilities[index]
            )?;
        }
        Ok(())
    }
}
