//! End-to-end scenarios over the public API: deterministic replay, canonical
//! matchup outcomes and full-run behavior.

use std::fs;

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use aces_core::{
    corporate_medium, score_attacker, score_defender, simulate, AttackGene, AttackGenome,
    CoEvolution, DefenseGenome, DetectionGene, DetectionLogic, EvolutionConfig, ResponseAction,
    RunArchive, ScoringWeights, StepOutcome, TargetSelector, EVOLUTION_LOG_FILE,
    HOF_ATTACKERS_FILE, HOF_DEFENDERS_FILE,
};

fn replay_config(dir: &std::path::Path) -> EvolutionConfig {
    EvolutionConfig {
        seed: 42,
        population_size: 10,
        num_generations: 5,
        matchups_per_eval: 3,
        defender_budget: 5,
        max_attack_chain_length: 4,
        output_dir: dir.to_path_buf(),
        ..Default::default()
    }
}

#[test]
fn deterministic_replay_archives_identical_bytes() {
    let _ = env_logger::builder().is_test(true).try_init();
    let tmp_a = tempfile::tempdir().unwrap();
    let tmp_b = tempfile::tempdir().unwrap();
    let network = corporate_medium();

    for dir in [tmp_a.path(), tmp_b.path()] {
        let config = replay_config(dir);
        let mut engine = CoEvolution::new(config.clone(), network.clone()).unwrap();
        let outcome = engine.run().unwrap();
        let archive = RunArchive::create(dir).unwrap();
        archive.write_outcome(&outcome).unwrap();
    }

    for file in [EVOLUTION_LOG_FILE, HOF_ATTACKERS_FILE, HOF_DEFENDERS_FILE] {
        let bytes_a = fs::read(tmp_a.path().join(file)).unwrap();
        let bytes_b = fs::read(tmp_b.path().join(file)).unwrap();
        assert!(!bytes_a.is_empty());
        assert_eq!(bytes_a, bytes_b, "{} differs between replays", file);
    }
}

#[test]
fn lone_exploit_attacker_scores_the_weighted_sum() {
    let network = corporate_medium();
    let attacker = AttackGenome {
        genes: vec![AttackGene {
            technique_id: "T1190".to_string(),
            target_selector: TargetSelector::HighestCriticality,
            stealth_modifier: 0.0,
            fallback_technique_id: None,
        }],
    };
    let defender = DefenseGenome { rules: Vec::new() };
    let weights = ScoringWeights::default();

    for seed in 0..32 {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let (trace, summary) = simulate(&attacker, &defender, &network, &mut rng);
        assert_eq!(summary.techniques_attempted, 1);
        assert_eq!(summary.techniques_detected, 0);
        assert!(!summary.exfiltrated);
        let fitness = score_attacker(&[summary.clone()], &network, &weights);
        // stealth is perfect against an empty rule set
        assert!((fitness.objectives[1] - 1.0).abs() < 1e-9);
        if trace[0].outcome == StepOutcome::Success {
            let target = trace[0].target_host_id.as_deref().unwrap();
            let criticality = network.host(target).unwrap().criticality;
            let expected = criticality * weights.host_criticality_multiplier
                + weights.kill_chain_length_value;
            assert!((fitness.objectives[0] - expected).abs() < 1e-9);
        }
    }
}

#[test]
fn perfect_signature_wall_earns_the_full_coverage_sum() {
    let network = corporate_medium();
    let weights = ScoringWeights::default();
    let attacker = AttackGenome {
        genes: vec![AttackGene {
            technique_id: "T1190".to_string(),
            target_selector: TargetSelector::HighestCriticality,
            stealth_modifier: 0.0,
            fallback_technique_id: None,
        }],
    };
    let spec = aces_core::technique("T1190").unwrap();
    let defender = DefenseGenome {
        rules: vec![DetectionGene {
            rule_id: 0,
            technique_detected: "T1190".to_string(),
            data_source: spec.data_sources[0],
            detection_logic: DetectionLogic::Signature,
            confidence: 1.0,
            fp_rate: 0.0,
            response_action: ResponseAction::IsolateHost,
            deploy_cost: 1,
        }],
    };

    for seed in 0..32 {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let (trace, summary) = simulate(&attacker, &defender, &network, &mut rng);
        assert_eq!(trace[0].outcome, StepOutcome::DetectedAndPrevented);
        assert_eq!(summary.techniques_detected, summary.techniques_attempted);
        let fitness = score_defender(&[summary.clone()], &defender, 15, &weights);
        // full detection ratio + one prevention + the clean-network bonus
        let expected = weights.detection_value
            + weights.prevention_value * summary.techniques_prevented as f64
            + weights.no_exfil_bonus;
        assert!((fitness.objectives[0] - expected).abs() < 1e-9);
    }
}

#[test]
fn full_run_completes_with_valid_populations() {
    let tmp = tempfile::tempdir().unwrap();
    let config = replay_config(tmp.path());
    let mut engine = CoEvolution::new(config.clone(), corporate_medium()).unwrap();
    let outcome = engine.run().unwrap();
    assert_eq!(outcome.generations_completed, config.num_generations);
    assert_eq!(outcome.history.len(), config.num_generations as usize);
    assert!(!outcome.attacker_hall_of_fame.is_empty());
    assert!(!outcome.defender_hall_of_fame.is_empty());
    for entry in &outcome.attacker_hall_of_fame {
        entry
            .genome
            .validate(config.max_attack_chain_length)
            .unwrap();
    }
    for entry in &outcome.defender_hall_of_fame {
        entry.genome.validate(config.defender_budget).unwrap();
    }
    for record in &outcome.history {
        assert!(record.attacker_diversity >= 0.0);
        assert_eq!(record.technique_histogram.len(), aces_core::catalog_size());
    }
}
