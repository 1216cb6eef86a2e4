//! ACES Core - Adversarial Co-Evolution Simulation Engine
//!
//! Co-evolves offensive kill chains and defensive detection rule sets with a
//! multi-objective genetic algorithm against a simulated enterprise network.
//! The crate covers the full research loop: the ATT&CK technique catalog,
//! the cloneable network model, genome representation and operators, the
//! deterministic matchup engine, two-objective scoring, NSGA-II selection
//! with Hall of Fame elitism and stagnation recovery, per-generation metrics
//! and the on-disk run archive.

mod catalog;
mod config;
mod error;
mod evolution;
mod genome;
mod metrics;
mod models;
mod network;
mod nsga;
mod operators;
mod scoring;
mod simulation;
mod storage;

pub use catalog::{
    all_ids, all_specs, catalog_size, ids_in_tactic, initial_access_ids, technique,
    Preconditions, TechniqueSpec,
};
pub use config::{EvolutionConfig, ScoringWeights};
pub use error::{AcesError, AcesResult};
pub use evolution::{CoEvolution, EvolutionOutcome, HallOfFame, HofEntry};
pub use genome::{default_fp_rate, random_detection_gene, random_target_selector};
pub use metrics::{GenerationMetrics, MetricsBus, ObjectiveStats};
pub use models::{
    AttackGene, AttackGenome, DataSource, DefenseGenome, DetectionGene, DetectionLogic, Fitness,
    MatchupSummary, PrivilegeLevel, RequiredPosition, ResponseAction, SimEvent, StepOutcome,
    Tactic, TargetSelector, TechniqueEffect,
};
pub use network::{
    corporate_medium, Credential, Edge, Host, HostRole, HostSpec, NetworkGraph, OsTag, Protocol,
    ReachabilityNeeds, Service, TopologySpec, Vulnerability, EXTERNAL_HOST_ID,
};
pub use nsga::{non_dominated_sort, rank_population, Ranked};
pub use operators::Operators;
pub use scoring::{score_attacker, score_defender};
pub use simulation::simulate;
pub use storage::{
    RunArchive, RunManifest, CONFIG_FILE, EVOLUTION_LOG_FILE, HOF_ATTACKERS_FILE,
    HOF_DEFENDERS_FILE, MANIFEST_FILE,
};
