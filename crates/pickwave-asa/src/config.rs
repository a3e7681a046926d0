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

//! The configuration surface of the ASA driver.
//!
//! Defaults: ten minutes of runtime, a stagnation budget of 1000,
//! intensification every 150 iterations, path relinking every 400, elite
//! offers every 30, temperature scale 0.15, an elite archive of five, tabu
//! tenure 10 with 100 iterations, UCB1 operator selection, and the
//! 1000/10/50 surrogate weights.

use crate::{eval::CostWeights, fls::FlsConfig, selector::SelectionStrategy};
use std::time::Duration;

/// Full parameterization of one ASA run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AsaConfig {
    /// Wall-clock budget of the run.
    pub max_runtime: Duration,
    /// Stagnation budget: the run stops after this many iterations without
    /// progress.
    pub max_no_improvement: u64,
    /// Focused local search fires every this many iterations.
    pub intensification_frequency: u64,
    /// Elite path relinking fires every this many iterations.
    pub path_relinking_frequency: u64,
    /// Current and best solutions are offered to the elite archive every this
    /// many iterations.
    pub elite_update_frequency: u64,
    /// Scale factor of the Metropolis acceptance temperature (relative to the
    /// current cost).
    pub temperature_scale_factor: f64,
    /// Capacity of the elite archive.
    pub elite_size: usize,
    /// Tabu tenure of the memetic intensification.
    pub tabu_tenure: usize,
    /// Iteration budget of each memetic tabu search.
    pub tabu_max_iterations: u64,
    /// The bandit strategy of the operator selector.
    pub strategy: SelectionStrategy,
    /// The selector recomputes its probability table every this many
    /// feedbacks.
    pub selector_update_frequency: u64,
    /// Weights of the surrogate cost.
    pub weights: CostWeights,
    /// Configuration of the focused local search.
    pub fls: FlsConfig,
    /// A full surrogate recomputation runs at least every this many
    /// iterations.
    pub drift_check_interval: u64,
    /// A strong perturbation fires every this many stagnation steps.
    pub stagnation_perturbation_interval: u64,
    /// Destruction strength of the stagnation perturbation.
    pub perturbation_strength: f64,
    /// Seed of the driver-owned deterministic generator.
    pub seed: u64,
}

impl Default for AsaConfig {
    fn default() -> Self {
        Self {
            max_runtime: Duration::from_millis(600_000),
            max_no_improvement: 1_000,
            intensification_frequency: 150,
            path_relinking_frequency: 400,
            elite_update_frequency: 30,
            temperature_scale_factor: 0.15,
            elite_size: 5,
            tabu_tenure: 10,
            tabu_max_iterations: 100,
            strategy: SelectionStrategy::default(),
            selector_update_frequency: 100,
            weights: CostWeights::default(),
            fls: FlsConfig::default()
                .with_max_iterations(40)
                .with_timeout(Duration::from_millis(1_500))
                .with_max_no_improvement(25)
                .with_patience_factor(4),
            drift_check_interval: 500,
            stagnation_perturbation_interval: 100,
            perturbation_strength: 0.3,
            seed: 0x5eed_cafe,
        }
    }
}

impl AsaConfig {
    /// Sets the wall-clock budget.
    pub fn with_max_runtime(mut self, value: Duration) -> Self {
        self.max_runtime = value;
        self
    }

    /// Sets the stagnation budget.
    pub fn with_max_no_improvement(mut self, value: u64) -> Self {
        self.max_no_improvement = value;
        self
    }

    /// Sets the bandit strategy.
    pub fn with_strategy(mut self, value: SelectionStrategy) -> Self {
        self.strategy = value;
        self
    }

    /// Sets the RNG seed.
    pub fn with_seed(mut self, value: u64) -> Self {
        self.seed = value;
        self
    }

    /// Sets the surrogate weights.
    pub fn with_weights(mut self, value: CostWeights) -> Self {
        self.weights = value;
        self
    }

    /// Validates the configuration invariants.
    ///
    /// # Panics
    ///
    /// Panics on non-positive frequencies, a zero elite size or tabu tenure,
    /// an out-of-range perturbation strength, or a non-positive temperature
    /// scale.
    pub fn validate(&self) {
        assert!(
            self.intensification_frequency > 0
                && self.path_relinking_frequency > 0
                && self.elite_update_frequency > 0
                && self.drift_check_interval > 0
                && self.stagnation_perturbation_interval > 0
                && self.selector_update_frequency > 0,
            "called `AsaConfig::validate` with a zero frequency, but all schedule frequencies must be positive"
        );
        assert!(
            self.elite_size > 0,
            "called `AsaConfig::validate` with elite_size 0, but the archive needs capacity"
        );
        assert!(
            self.tabu_tenure > 0,
            "called `AsaConfig::validate` with tabu_tenure 0, but tenure must be positive"
        );
        assert!(
            self.temperature_scale_factor > 0.0,
            "called `AsaConfig::validate` with temperature_scale_factor {}, but it must be positive",
            self.temperature_scale_factor
        );
        assert!(
            self.perturbation_strength > 0.0 && self.perturbation_strength < 1.0,
            "called `AsaConfig::validate` with perturbation_strength {}, but it must lie in (0, 1)",
            self.perturbation_strength
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_stable() {
        let config = AsaConfig::default();
        assert_eq!(config.max_runtime, Duration::from_millis(600_000));
        assert_eq!(config.max_no_improvement, 1_000);
        assert_eq!(config.intensification_frequency, 150);
        assert_eq!(config.path_relinking_frequency, 400);
        assert_eq!(config.elite_update_frequency, 30);
        assert_eq!(config.elite_size, 5);
        assert_eq!(config.tabu_tenure, 10);
        assert_eq!(config.tabu_max_iterations, 100);
        assert_eq!(config.drift_check_interval, 500);
        assert_eq!(config.weights.penalty_missing, 1_000.0);
        config.validate();
    }

    #[test]
    #[should_panic(expected = "perturbation_strength")]
    fn test_validate_rejects_out_of_range_strength() {
        let config = AsaConfig {
            perturbation_strength: 1.5,
            ..AsaConfig::default()
        };
        config.validate();
    }

    #[test]
    fn test_builder_style_setters() {
        let config = AsaConfig::default()
            .with_max_runtime(Duration::from_secs(5))
            .with_max_no_improvement(50)
            .with_seed(42);
        assert_eq!(config.max_runtime, Duration::from_secs(5));
        assert_eq!(config.max_no_improvement, 50);
        assert_eq!(config.seed, 42);
    }
}
