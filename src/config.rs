//! ACES Core - Configuration Management
//!
//! Run configuration for the co-evolution loop: population sizing, operator
//! rates, matchup sampling, stagnation handling and scoring weights. All
//! fields are serde-durable so a run can be replayed from its archived
//! `config.json`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AcesError, AcesResult};

/// Scoring weights applied when folding matchup summaries into fitness vectors
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoringWeights {
    /// Multiplier on the summed criticality of compromised hosts
    pub host_criticality_multiplier: f64,
    /// Value of each harvested credential
    pub credential_value: f64,
    /// One-time bonus for a successful exfiltration
    pub exfiltration_bonus: f64,
    /// Value per kill-chain gene, rewarding longer viable campaigns
    pub kill_chain_length_value: f64,
    /// Weight on the defender detection ratio
    pub detection_value: f64,
    /// Value per prevented technique
    pub prevention_value: f64,
    /// Bonus when no exfiltration occurred on the defender's watch
    pub no_exfil_bonus: f64,
    /// Penalty multiplier on accumulated false-positive rates
    pub false_positive_penalty: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            host_criticality_multiplier: 10.0,
            credential_value: 3.0,
            exfiltration_bonus: 50.0,
            kill_chain_length_value: 2.0,
            detection_value: 10.0,
            prevention_value: 10.0,
            no_exfil_bonus: 30.0,
            false_positive_penalty: 5.0,
        }
    }
}

impl ScoringWeights {
    fn validate(&self) -> AcesResult<()> {
        let named = [
            ("host_criticality_multiplier", self.host_criticality_multiplier),
            ("credential_value", self.credential_value),
            ("exfiltration_bonus", self.exfiltration_bonus),
            ("kill_chain_length_value", self.kill_chain_length_value),
            ("detection_value", self.detection_value),
            ("prevention_value", self.prevention_value),
            ("no_exfil_bonus", self.no_exfil_bonus),
            ("false_positive_penalty", self.false_positive_penalty),
        ];
        for (name, value) in named {
            if !value.is_finite() || value < 0.0 {
                return Err(AcesError::Config(format!(
                    "scoring weight {} must be finite and non-negative, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Top-level run configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvolutionConfig {
    /// Individuals per population (attackers and defenders each)
    pub population_size: usize,
    /// Generations to run before terminating
    pub num_generations: u32,
    /// Tournament arity for parent selection
    pub tournament_size: usize,
    /// Probability a parent pair recombines instead of cloning
    pub crossover_rate: f64,
    /// Per-child mutation probability
    pub mutation_rate: f64,
    /// Upper bound on attacker kill-chain length
    pub max_attack_chain_length: usize,
    /// Total deployment budget per defender genome
    pub defender_budget: u32,
    /// Opponents sampled per individual per generation
    pub matchups_per_eval: usize,
    /// Hall of Fame capacity per population
    pub hall_of_fame_size: usize,
    /// Generations without improvement before immigration triggers
    pub stagnation_window: u32,
    /// Minimum objective improvement that resets the stagnation counter
    pub stagnation_epsilon: f64,
    /// Fraction of each population replaced by random immigrants
    pub immigrant_fraction: f64,
    /// Fraction of matchup opponents drawn from the opposing Hall of Fame
    pub hof_opponent_fraction: f64,
    /// Master seed; every stream in the run derives from it
    pub seed: u64,
    /// Run artifact directory
    pub output_dir: PathBuf,
    pub weights: ScoringWeights,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 80,
            num_generations: 300,
            tournament_size: 5,
            crossover_rate: 0.7,
            mutation_rate: 0.2,
            max_attack_chain_length: 12,
            defender_budget: 15,
            matchups_per_eval: 5,
            hall_of_fame_size: 10,
            stagnation_window: 20,
            stagnation_epsilon: 1e-6,
            immigrant_fraction: 0.1,
            hof_opponent_fraction: 0.2,
            seed: 42,
            output_dir: PathBuf::from("aces_results"),
            weights: ScoringWeights::default(),
        }
    }
}

impl EvolutionConfig {
    /// Fail-fast validation run before any evaluation
    pub fn validate(&self) -> AcesResult<()> {
        if self.population_size < 2 {
            return Err(AcesError::Config(format!(
                "population_size must be at least 2, got {}",
                self.population_size
            )));
        }
        if self.num_generations == 0 {
            return Err(AcesError::Config("num_generations must be positive".into()));
        }
        if self.tournament_size < 1 || self.tournament_size > self.population_size {
            return Err(AcesError::Config(format!(
                "tournament_size must be in [1, population_size], got {}",
                self.tournament_size
            )));
        }
        if self.max_attack_chain_length < 1 {
            return Err(AcesError::Config(
                "max_attack_chain_length must be at least 1".into(),
            ));
        }
        if self.defender_budget < 1 {
            return Err(AcesError::Config("defender_budget must be at least 1".into()));
        }
        if self.matchups_per_eval < 1 {
            return Err(AcesError::Config("matchups_per_eval must be at least 1".into()));
        }
        if self.hall_of_fame_size < 1 {
            return Err(AcesError::Config("hall_of_fame_size must be at least 1".into()));
        }
        if self.stagnation_window == 0 {
            return Err(AcesError::Config("stagnation_window must be positive".into()));
        }
        for (name, rate) in [
            ("crossover_rate", self.crossover_rate),
            ("mutation_rate", self.mutation_rate),
            ("immigrant_fraction", self.immigrant_fraction),
            ("hof_opponent_fraction", self.hof_opponent_fraction),
        ] {
            if !rate.is_finite() || !(0.0..=1.0).contains(&rate) {
                return Err(AcesError::Config(format!(
                    "{} must lie in [0, 1], got {}",
                    name, rate
                )));
            }
        }
        if !self.stagnation_epsilon.is_finite() || self.stagnation_epsilon < 0.0 {
            return Err(AcesError::Config(
                "stagnation_epsilon must be finite and non-negative".into(),
            ));
        }
        self.weights.validate()
    }
}
