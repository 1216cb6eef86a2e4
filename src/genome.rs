//! ACES Core - Genome Construction and Validation
//!
//! Random initialization for both populations plus the constructor-time
//! invariant checks the genetic operators rely on: attacker chains start with
//! initial access and stay length-bounded, defender rule sets stay unique and
//! within budget.

use rand::Rng;

use crate::catalog;
use crate::error::{AcesError, AcesResult};
use crate::models::{
    AttackGene, AttackGenome, DataSource, DefenseGenome, DetectionGene, DetectionLogic,
    ResponseAction, TargetSelector,
};
use crate::network::HostRole;

const ROLES: [HostRole; 6] = [
    HostRole::Workstation,
    HostRole::Server,
    HostRole::DomainController,
    HostRole::Firewall,
    HostRole::Database,
    HostRole::Dmz,
];

const LOGICS: [DetectionLogic; 4] = [
    DetectionLogic::Signature,
    DetectionLogic::Behavioral,
    DetectionLogic::Correlation,
    DetectionLogic::MlAnomaly,
];

const RESPONSES: [ResponseAction; 5] = [
    ResponseAction::IsolateHost,
    ResponseAction::RevokeCredential,
    ResponseAction::KillProcess,
    ResponseAction::AlertOnly,
    ResponseAction::BlockTraffic,
];

/// Probability a randomly initialized gene carries a fallback technique
const FALLBACK_CHANCE: f64 = 0.25;

/// Uniform target selector draw, including a uniformly drawn role for the
/// role-specific variant
pub fn random_target_selector<R: Rng>(rng: &mut R) -> TargetSelector {
    match rng.gen_range(0..5) {
        0 => TargetSelector::HighestCriticality,
        1 => TargetSelector::LeastDefended,
        2 => TargetSelector::MostConnected,
        3 => TargetSelector::RandomReachable,
        _ => TargetSelector::SpecificRole(ROLES[rng.gen_range(0..ROLES.len())]),
    }
}

pub fn random_response_action<R: Rng>(rng: &mut R) -> ResponseAction {
    RESPONSES[rng.gen_range(0..RESPONSES.len())]
}

/// Default false-positive rate for a rule on this telemetry feed
pub fn default_fp_rate(data_source: DataSource, logic: DetectionLogic) -> f64 {
    (logic.base_fp_rate() * data_source.noise_factor()).clamp(0.0, 1.0)
}

/// Build one random attack gene referencing the given technique
pub fn random_attack_gene<R: Rng>(rng: &mut R, technique_id: &str) -> AttackGene {
    let fallback = if rng.gen_bool(FALLBACK_CHANCE) {
        let ids = catalog::all_ids();
        Some(ids[rng.gen_range(0..ids.len())].to_string())
    } else {
        None
    };
    AttackGene {
        technique_id: technique_id.to_string(),
        target_selector: random_target_selector(rng),
        stealth_modifier: rng.gen_range(0.0..=1.0),
        fallback_technique_id: fallback,
    }
}

impl AttackGenome {
    /// Sample a random kill chain: length in [1, max_len], gene 0 from the
    /// initial-access subset, remaining genes uniform over the catalog.
    pub fn random<R: Rng>(rng: &mut R, max_len: usize) -> Self {
        let max_len = max_len.max(1);
        let length = rng.gen_range(1..=max_len);
        let initial = catalog::initial_access_ids();
        let all = catalog::all_ids();
        let mut genes = Vec::with_capacity(length);
        let head_id = initial[rng.gen_range(0..initial.len())];
        genes.push(random_attack_gene(rng, head_id));
        for _ in 1..length {
            let technique_id = all[rng.gen_range(0..all.len())];
            genes.push(random_attack_gene(rng, technique_id));
        }
        Self { genes }
    }

    /// Constructor-time invariant check: non-empty, bounded, initial-access
    /// head, every referenced technique resolves, stealth in range.
    pub fn validate(&self, max_len: usize) -> AcesResult<()> {
        if self.genes.is_empty() {
            return Err(AcesError::InvalidGenome("attack chain is empty".into()));
        }
        if self.genes.len() > max_len {
            return Err(AcesError::InvalidGenome(format!(
                "attack chain length {} exceeds maximum {}",
                self.genes.len(),
                max_len
            )));
        }
        for (index, gene) in self.genes.iter().enumerate() {
            let spec = catalog::technique(&gene.technique_id)
                .ok_or_else(|| AcesError::UnknownTechnique(gene.technique_id.clone()))?;
            if index == 0 && spec.tactic != crate::models::Tactic::InitialAccess {
                return Err(AcesError::InvalidGenome(format!(
                    "gene 0 must be initial access, found {}",
                    gene.technique_id
                )));
            }
            if !(0.0..=1.0).contains(&gene.stealth_modifier) {
                return Err(AcesError::InvalidGenome(format!(
                    "stealth modifier {} out of range at gene {}",
                    gene.stealth_modifier, index
                )));
            }
            if let Some(fallback) = &gene.fallback_technique_id {
                if catalog::technique(fallback).is_none() {
                    return Err(AcesError::UnknownTechnique(fallback.clone()));
                }
            }
        }
        Ok(())
    }
}

/// Build one random detection rule for the given technique. The data source
/// is drawn from the technique's own telemetry so the rule is applicable.
pub fn random_detection_gene<R: Rng>(rng: &mut R, rule_id: u32) -> DetectionGene {
    let specs = catalog::all_specs();
    let technique = specs[rng.gen_range(0..specs.len())];
    let data_source = technique.data_sources[rng.gen_range(0..technique.data_sources.len())];
    let logic = LOGICS[rng.gen_range(0..LOGICS.len())];
    DetectionGene {
        rule_id,
        technique_detected: technique.id.to_string(),
        data_source,
        detection_logic: logic,
        confidence: rng.gen_range(0.4..=0.95),
        fp_rate: default_fp_rate(data_source, logic),
        response_action: random_response_action(rng),
        deploy_cost: logic.deploy_cost(),
    }
}

impl DefenseGenome {
    /// Sample a random rule set, drawing rules until the next draw would
    /// exceed the deployment budget. Duplicate (technique, source, logic)
    /// draws are discarded; a bounded number of attempts keeps construction
    /// finite at small budgets.
    pub fn random<R: Rng>(rng: &mut R, budget: u32) -> Self {
        let mut rules: Vec<DetectionGene> = Vec::new();
        let mut spent = 0u32;
        let mut next_id = 0u32;
        for _ in 0..(budget as usize * 4).max(8) {
            let candidate = random_detection_gene(rng, next_id);
            if spent + candidate.deploy_cost > budget {
                break;
            }
            if rules
                .iter()
                .any(|r| r.dedup_key() == candidate.dedup_key())
            {
                continue;
            }
            spent += candidate.deploy_cost;
            next_id += 1;
            rules.push(candidate);
        }
        Self { rules }
    }

    /// Constructor-time invariant check: budget bound, unique rule triples,
    /// probabilities in range, cost consistent with logic type.
    pub fn validate(&self, budget: u32) -> AcesResult<()> {
        if self.total_cost() > budget {
            return Err(AcesError::InvalidGenome(format!(
                "rule set cost {} exceeds budget {}",
                self.total_cost(),
                budget
            )));
        }
        for (index, rule) in self.rules.iter().enumerate() {
            if catalog::technique(&rule.technique_detected).is_none() {
                return Err(AcesError::UnknownTechnique(rule.technique_detected.clone()));
            }
            if !(0.0..=1.0).contains(&rule.confidence) || !(0.0..=1.0).contains(&rule.fp_rate) {
                return Err(AcesError::InvalidGenome(format!(
                    "rule {} has out-of-range probabilities",
                    index
                )));
            }
            if rule.deploy_cost != rule.detection_logic.deploy_cost() {
                return Err(AcesError::InvalidGenome(format!(
                    "rule {} cost {} does not match its logic type",
                    index, rule.deploy_cost
                )));
            }
            if self.rules[..index]
                .iter()
                .any(|other| other.dedup_key() == rule.dedup_key())
            {
                return Err(AcesError::InvalidGenome(format!(
                    "duplicate rule triple at index {}",
                    index
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Tactic;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn random_attack_genomes_satisfy_invariants() {
        for seed in 0..50 {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let genome = AttackGenome::random(&mut rng, 12);
            genome.validate(12).unwrap();
            let head = catalog::technique(&genome.genes[0].technique_id).unwrap();
            assert_eq!(head.tactic, Tactic::InitialAccess);
            assert!(!genome.is_empty() && genome.len() <= 12);
        }
    }

    #[test]
    fn single_gene_chain_is_valid() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let genome = AttackGenome::random(&mut rng, 1);
        assert_eq!(genome.len(), 1);
        genome.validate(1).unwrap();
    }

    #[test]
    fn random_defense_genomes_respect_budget() {
        for seed in 0..50 {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let genome = DefenseGenome::random(&mut rng, 15);
            genome.validate(15).unwrap();
            assert!(genome.total_cost() <= 15);
        }
    }

    #[test]
    fn unit_budget_admits_at_most_one_signature_rule() {
        for seed in 0..20 {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let genome = DefenseGenome::random(&mut rng, 1);
            genome.validate(1).unwrap();
            assert!(genome.len() <= 1);
            if let Some(rule) = genome.rules.first() {
                assert_eq!(rule.deploy_cost, 1);
            }
        }
    }

    #[test]
    fn attack_genome_json_round_trip_is_identity() {
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let genome = AttackGenome::random(&mut rng, 8);
        let json = serde_json::to_string(&genome).unwrap();
        let back: AttackGenome = serde_json::from_str(&json).unwrap();
        assert_eq!(genome, back);
    }

    #[test]
    fn defense_genome_json_round_trip_is_identity() {
        let mut rng = ChaCha20Rng::seed_from_u64(13);
        let genome = DefenseGenome::random(&mut rng, 15);
        let json = serde_json::to_string(&genome).unwrap();
        let back: DefenseGenome = serde_json::from_str(&json).unwrap();
        assert_eq!(genome, back);
    }

    #[test]
    fn default_fp_rates_scale_with_source_noise() {
        let noisy = default_fp_rate(DataSource::NetworkTraffic, DetectionLogic::MlAnomaly);
        let quiet = default_fp_rate(DataSource::Authentication, DetectionLogic::MlAnomaly);
        assert!(noisy > quiet);
        assert!((0.0..=1.0).contains(&noisy));
    }
}
