//! ACES Core - Fitness Scoring
//!
//! Folds matchup summaries into the two-objective fitness vectors driving
//! NSGA-II: (effectiveness, stealth) for attackers, (coverage, efficiency)
//! for defenders. Each individual's fitness is the componentwise mean over
//! its sampled matchups.

use crate::config::ScoringWeights;
use crate::models::{DefenseGenome, Fitness, MatchupSummary};
use crate::network::NetworkGraph;

/// Attacker objectives for a single matchup
fn attacker_objectives(
    summary: &MatchupSummary,
    network: &NetworkGraph,
    weights: &ScoringWeights,
) -> (f64, f64) {
    let compromised_value: f64 = summary
        .compromised_host_ids
        .iter()
        .filter_map(|id| network.host(id))
        .map(|h| h.criticality)
        .sum();
    let effectiveness = compromised_value * weights.host_criticality_multiplier
        + summary.credentials_harvested as f64 * weights.credential_value
        + if summary.exfiltrated {
            weights.exfiltration_bonus
        } else {
            0.0
        }
        + summary.chain_length as f64 * weights.kill_chain_length_value;
    let attempted = summary.techniques_attempted.max(1) as f64;
    let stealth = 1.0 - summary.techniques_detected as f64 / attempted;
    (effectiveness, stealth)
}

/// Defender objectives for a single matchup
fn defender_objectives(
    summary: &MatchupSummary,
    defender: &DefenseGenome,
    budget: u32,
    weights: &ScoringWeights,
) -> (f64, f64) {
    let attempted = summary.techniques_attempted.max(1) as f64;
    let coverage = summary.techniques_detected as f64 / attempted * weights.detection_value
        + summary.techniques_prevented as f64 * weights.prevention_value
        + if summary.exfiltrated {
            0.0
        } else {
            weights.no_exfil_bonus
        };
    let fp_load = defender.total_fp_rate() * weights.false_positive_penalty;
    let budget_headroom = 1.0 - defender.total_cost() as f64 / budget.max(1) as f64;
    let efficiency = 1.0 / (1.0 + fp_load) * budget_headroom;
    (coverage, efficiency)
}

/// Mean attacker fitness over the matchups sampled this generation
pub fn score_attacker(
    summaries: &[MatchupSummary],
    network: &NetworkGraph,
    weights: &ScoringWeights,
) -> Fitness {
    if summaries.is_empty() {
        return Fitness::zero();
    }
    let count = summaries.len() as f64;
    let (effectiveness, stealth) = summaries
        .iter()
        .map(|s| attacker_objectives(s, network, weights))
        .fold((0.0, 0.0), |acc, obj| (acc.0 + obj.0, acc.1 + obj.1));
    Fitness::new(effectiveness / count, stealth / count)
}

/// Mean defender fitness over the matchups sampled this generation
pub fn score_defender(
    summaries: &[MatchupSummary],
    defender: &DefenseGenome,
    budget: u32,
    weights: &ScoringWeights,
) -> Fitness {
    if summaries.is_empty() {
        return Fitness::zero();
    }
    let count = summaries.len() as f64;
    let (coverage, efficiency) = summaries
        .iter()
        .map(|s| defender_objectives(s, defender, budget, weights))
        .fold((0.0, 0.0), |acc, obj| (acc.0 + obj.0, acc.1 + obj.1));
    Fitness::new(coverage / count, efficiency / count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::corporate_medium;

    fn empty_summary() -> MatchupSummary {
        MatchupSummary {
            compromised_host_ids: Vec::new(),
            credentials_harvested: 0,
            exfiltrated: false,
            persistence_established: false,
            techniques_attempted: 0,
            techniques_detected: 0,
            techniques_prevented: 0,
            chain_length: 0,
        }
    }

    #[test]
    fn lone_exploit_effectiveness_matches_the_weighted_sum() {
        let network = corporate_medium();
        let summary = MatchupSummary {
            compromised_host_ids: vec!["vpn-01".to_string()],
            credentials_harvested: 0,
            exfiltrated: false,
            persistence_established: false,
            techniques_attempted: 1,
            techniques_detected: 0,
            techniques_prevented: 0,
            chain_length: 1,
        };
        let fitness = score_attacker(&[summary], &network, &ScoringWeights::default());
        // criticality 0.3 * 10 + chain length 1 * 2
        assert!((fitness.objectives[0] - 5.0).abs() < 1e-9);
        assert!((fitness.objectives[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn undetected_attacker_has_perfect_stealth() {
        let network = corporate_medium();
        let mut summary = empty_summary();
        summary.techniques_attempted = 4;
        let fitness = score_attacker(&[summary], &network, &ScoringWeights::default());
        assert!((fitness.objectives[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn adding_a_compromise_never_decreases_effectiveness() {
        let network = corporate_medium();
        let weights = ScoringWeights::default();
        let mut summary = empty_summary();
        summary.techniques_attempted = 2;
        summary.chain_length = 2;
        let base = score_attacker(&[summary.clone()], &network, &weights);
        summary.compromised_host_ids.push("dc-01".to_string());
        let richer = score_attacker(&[summary], &network, &weights);
        assert!(richer.objectives[0] >= base.objectives[0]);
    }

    #[test]
    fn adding_a_detection_never_decreases_coverage() {
        let network = corporate_medium();
        let weights = ScoringWeights::default();
        let defender = DefenseGenome { rules: Vec::new() };
        let mut summary = empty_summary();
        summary.techniques_attempted = 4;
        summary.techniques_detected = 1;
        let base = score_defender(&[summary.clone()], &defender, 15, &weights);
        summary.techniques_detected = 2;
        let better = score_defender(&[summary], &defender, 15, &weights);
        assert!(better.objectives[0] >= base.objectives[0]);
        let _ = network;
    }

    #[test]
    fn empty_rule_set_has_unit_efficiency() {
        let defender = DefenseGenome { rules: Vec::new() };
        let fitness =
            score_defender(&[empty_summary()], &defender, 15, &ScoringWeights::default());
        assert!((fitness.objectives[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn fitness_is_the_mean_over_matchups() {
        let network = corporate_medium();
        let weights = ScoringWeights::default();
        let mut detected = empty_summary();
        detected.techniques_attempted = 1;
        detected.techniques_detected = 1;
        detected.chain_length = 1;
        let mut clean = empty_summary();
        clean.techniques_attempted = 1;
        clean.chain_length = 1;
        let fitness = score_attacker(&[detected, clean], &network, &weights);
        assert!((fitness.objectives[1] - 0.5).abs() < 1e-9);
    }
}
