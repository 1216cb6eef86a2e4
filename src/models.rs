//! ACES Core - Data Models and Types
//!
//! Data models shared across the catalog, simulation engine, scoring and
//! evolution loop: tactics, genes, genomes, trace events and fitness vectors.

use serde::{Deserialize, Serialize};

/// MITRE ATT&CK tactic categories covered by the technique catalog
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Tactic {
    InitialAccess,
    Execution,
    Persistence,
    PrivilegeEscalation,
    DefenseEvasion,
    CredentialAccess,
    Discovery,
    LateralMovement,
    Collection,
    Exfiltration,
    Impact,
}

/// Data source types detection rules subscribe to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataSource {
    ProcessMonitoring,
    FileMonitoring,
    NetworkTraffic,
    Authentication,
    WindowsEventLogs,
    CommandLineInterface,
    Registry,
    DnsLogs,
    WebProxy,
    CloudLogs,
    Email,
}

impl DataSource {
    /// Relative alert-noise factor of this telemetry feed, used to default
    /// false-positive rates for rules that subscribe to it.
    pub fn noise_factor(&self) -> f64 {
        match self {
            DataSource::NetworkTraffic => 1.5,
            DataSource::WebProxy => 1.4,
            DataSource::DnsLogs => 1.2,
            DataSource::ProcessMonitoring => 1.0,
            DataSource::CommandLineInterface => 1.0,
            DataSource::FileMonitoring => 0.9,
            DataSource::WindowsEventLogs => 0.8,
            DataSource::CloudLogs => 0.8,
            DataSource::Registry => 0.6,
            DataSource::Email => 0.7,
            DataSource::Authentication => 0.5,
        }
    }
}

/// Privilege ladder on a host. Escalation raises one level at a time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PrivilegeLevel {
    None,
    User,
    Admin,
    System,
}

impl PrivilegeLevel {
    /// Next rung of the ladder; System is terminal.
    pub fn escalated(&self) -> PrivilegeLevel {
        match self {
            PrivilegeLevel::None => PrivilegeLevel::User,
            PrivilegeLevel::User => PrivilegeLevel::Admin,
            PrivilegeLevel::Admin | PrivilegeLevel::System => PrivilegeLevel::System,
        }
    }
}

/// Where the attacker must stand for a technique to be attempted
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RequiredPosition {
    /// No foothold yet; the technique is launched from outside the perimeter
    External,
    /// Any foothold inside the network
    Internal,
    /// Code execution on the target host itself
    OnHost,
}

/// Effects a successful technique applies to the matchup state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TechniqueEffect {
    Foothold,
    PrivEscalation,
    CredentialHarvest,
    Persistence,
    LateralMove,
    Exfil,
    Impact,
}

/// How an attack gene picks its victim among reachable hosts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TargetSelector {
    HighestCriticality,
    LeastDefended,
    MostConnected,
    RandomReachable,
    SpecificRole(crate::network::HostRole),
}

/// Detection rule families, priced by analytic complexity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DetectionLogic {
    Signature,
    Behavioral,
    Correlation,
    MlAnomaly,
}

impl DetectionLogic {
    /// Deployment cost charged against the defender budget
    pub fn deploy_cost(&self) -> u32 {
        match self {
            DetectionLogic::Signature => 1,
            DetectionLogic::Behavioral => 2,
            DetectionLogic::Correlation => 3,
            DetectionLogic::MlAnomaly => 3,
        }
    }

    /// Baseline false-positive rate before data-source noise scaling
    pub fn base_fp_rate(&self) -> f64 {
        match self {
            DetectionLogic::Signature => 0.01,
            DetectionLogic::Behavioral => 0.05,
            DetectionLogic::Correlation => 0.03,
            DetectionLogic::MlAnomaly => 0.08,
        }
    }
}

/// What the SOC does when a rule fires
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ResponseAction {
    IsolateHost,
    RevokeCredential,
    KillProcess,
    AlertOnly,
    BlockTraffic,
}

impl ResponseAction {
    /// Preventive responses abort the detected technique's effects
    pub fn is_preventive(&self) -> bool {
        !matches!(self, ResponseAction::AlertOnly)
    }
}

/// One step of an attacker kill chain
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttackGene {
    pub technique_id: String,
    pub target_selector: TargetSelector,
    /// Extra effort spent on tradecraft, 0.0 (noisy) to 1.0 (maximum care)
    pub stealth_modifier: f64,
    /// Substituted once if this gene cannot fire (no target or preconditions fail)
    pub fallback_technique_id: Option<String>,
}

/// Ordered kill chain. Gene 0 always references an initial-access technique.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttackGenome {
    pub genes: Vec<AttackGene>,
}

impl AttackGenome {
    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// The kill chain as an ordered technique-id tuple, used for uniqueness
    /// metrics across a population.
    pub fn chain_signature(&self) -> Vec<String> {
        self.genes.iter().map(|g| g.technique_id.clone()).collect()
    }
}

/// One deployed detection rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectionGene {
    /// Stable identifier within the genome, lowest wins attribution ties
    pub rule_id: u32,
    pub technique_detected: String,
    pub data_source: DataSource,
    pub detection_logic: DetectionLogic,
    pub confidence: f64,
    pub fp_rate: f64,
    pub response_action: ResponseAction,
    pub deploy_cost: u32,
}

impl DetectionGene {
    /// Duplicate key: no two rules in a genome may share this triple
    pub fn dedup_key(&self) -> (String, DataSource, DetectionLogic) {
        (
            self.technique_detected.clone(),
            self.data_source,
            self.detection_logic,
        )
    }

    /// Selection utility when trimming an over-budget rule pool
    pub fn utility(&self) -> f64 {
        self.confidence / self.deploy_cost.max(1) as f64
    }
}

/// Unordered, budget-bounded detection rule set
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DefenseGenome {
    pub rules: Vec<DetectionGene>,
}

impl DefenseGenome {
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Total deployment cost charged against the defender budget
    pub fn total_cost(&self) -> u32 {
        self.rules
            .iter()
            .fold(0u32, |acc, r| acc.saturating_add(r.deploy_cost))
    }

    /// Sum of per-rule false-positive rates, the alert-fatigue input to the
    /// efficiency objective
    pub fn total_fp_rate(&self) -> f64 {
        self.rules.iter().map(|r| r.fp_rate).sum()
    }
}

/// Outcome of a single kill-chain step
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    PreconditionFailure,
    DetectedAndPrevented,
    DetectedButSucceeded,
    FailedRoll,
}

/// One entry of the deterministic matchup trace
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimEvent {
    pub step_index: usize,
    pub technique_id: String,
    pub target_host_id: Option<String>,
    pub outcome: StepOutcome,
    pub detection_rule_id: Option<u32>,
    pub effects_applied: Vec<TechniqueEffect>,
}

/// Aggregated result of one matchup, the scoring input
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchupSummary {
    pub compromised_host_ids: Vec<String>,
    pub credentials_harvested: u32,
    pub exfiltrated: bool,
    pub persistence_established: bool,
    pub techniques_attempted: u32,
    pub techniques_detected: u32,
    pub techniques_prevented: u32,
    pub chain_length: u32,
}

/// Two-objective fitness vector, both dimensions maximized
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Fitness {
    pub objectives: [f64; 2],
}

impl Fitness {
    pub fn new(first: f64, second: f64) -> Self {
        Self {
            objectives: [first, second],
        }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Componentwise Pareto dominance: at least as good everywhere and
    /// strictly better somewhere.
    pub fn dominates(&self, other: &Fitness) -> bool {
        let ge = self.objectives[0] >= other.objectives[0]
            && self.objectives[1] >= other.objectives[1];
        let gt = self.objectives[0] > other.objectives[0]
            || self.objectives[1] > other.objectives[1];
        ge && gt
    }
}
