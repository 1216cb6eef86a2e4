//! ACES Core - Generation Metrics
//!
//! Per-generation statistics streamed to presentation collaborators and
//! archived in the run's evolution log. The bus is bounded and best-effort:
//! a slow subscriber loses the oldest records, never the loop's time.

use std::collections::VecDeque;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::catalog;
use crate::models::{AttackGenome, DefenseGenome, Fitness};

/// Summary statistics of one fitness objective across a population
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObjectiveStats {
    pub min: f64,
    pub mean: f64,
    pub max: f64,
    pub stdev: f64,
}

impl ObjectiveStats {
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                min: 0.0,
                mean: 0.0,
                max: 0.0,
                stdev: 0.0,
            };
        }
        let count = values.len() as f64;
        let mean = values.iter().sum::<f64>() / count;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count;
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        Self {
            min,
            mean,
            max,
            stdev: variance.sqrt(),
        }
    }
}

/// One generation's worth of observability data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationMetrics {
    pub generation: u32,
    /// (effectiveness, stealth) statistics over the attacker population
    pub attacker_objectives: [ObjectiveStats; 2],
    /// (coverage, efficiency) statistics over the defender population
    pub defender_objectives: [ObjectiveStats; 2],
    /// Technique frequency across all attacker genes
    pub technique_histogram: IndexMap<String, u32>,
    /// Distinct kill chains, counted as ordered technique-id tuples
    pub unique_kill_chains: usize,
    /// Mean pairwise Hamming distance on technique-presence vectors
    pub attacker_diversity: f64,
    /// Data sources covered by deployed defender rules
    pub data_source_coverage: IndexMap<String, u32>,
    pub hof_top_attacker: Option<Fitness>,
    pub hof_top_defender: Option<Fitness>,
}

/// Compute the metrics record for one completed generation
pub fn collect(
    generation: u32,
    attackers: &[AttackGenome],
    attacker_fitness: &[Fitness],
    defenders: &[DefenseGenome],
    defender_fitness: &[Fitness],
    hof_top_attacker: Option<Fitness>,
    hof_top_defender: Option<Fitness>,
) -> GenerationMetrics {
    let stats = |fitness: &[Fitness], objective: usize| {
        let values: Vec<f64> = fitness.iter().map(|f| f.objectives[objective]).collect();
        ObjectiveStats::from_values(&values)
    };

    let mut technique_histogram: IndexMap<String, u32> = IndexMap::new();
    for id in catalog::all_ids() {
        technique_histogram.insert(id.to_string(), 0);
    }
    for genome in attackers {
        for gene in &genome.genes {
            if let Some(count) = technique_histogram.get_mut(&gene.technique_id) {
                *count += 1;
            }
        }
    }

    let mut chains: Vec<Vec<String>> = attackers.iter().map(|a| a.chain_signature()).collect();
    chains.sort();
    chains.dedup();
    let unique_kill_chains = chains.len();

    let mut data_source_coverage: IndexMap<String, u32> = IndexMap::new();
    for genome in defenders {
        for rule in &genome.rules {
            *data_source_coverage
                .entry(format!("{:?}", rule.data_source))
                .or_insert(0) += 1;
        }
    }
    data_source_coverage.sort_keys();

    GenerationMetrics {
        generation,
        attacker_objectives: [stats(attacker_fitness, 0), stats(attacker_fitness, 1)],
        defender_objectives: [stats(defender_fitness, 0), stats(defender_fitness, 1)],
        technique_histogram,
        unique_kill_chains,
        attacker_diversity: population_diversity(attackers),
        data_source_coverage,
        hof_top_attacker,
        hof_top_defender,
    }
}

/// Mean pairwise Hamming distance between attacker genomes on a fixed-length
/// technique-presence vector over the catalog
pub fn population_diversity(attackers: &[AttackGenome]) -> f64 {
    if attackers.len() < 2 {
        return 0.0;
    }
    let ids = catalog::all_ids();
    let vectors: Vec<Vec<bool>> = attackers
        .iter()
        .map(|genome| {
            ids.iter()
                .map(|id| genome.genes.iter().any(|g| g.technique_id == *id))
                .collect()
        })
        .collect();
    let mut total = 0usize;
    let mut pairs = 0usize;
    for a in 0..vectors.len() {
        for b in a + 1..vectors.len() {
            total += vectors[a]
                .iter()
                .zip(vectors[b].iter())
                .filter(|(x, y)| x != y)
                .count();
            pairs += 1;
        }
    }
    total as f64 / pairs as f64
}

/// Bounded, clonable metrics stream. Publishing never blocks; once the
/// buffer is full the oldest record is dropped.
#[derive(Debug, Clone)]
pub struct MetricsBus {
    buffer: Arc<Mutex<VecDeque<GenerationMetrics>>>,
    capacity: usize,
    dropped: Arc<Mutex<u64>>,
}

impl MetricsBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.max(1)))),
            capacity: capacity.max(1),
            dropped: Arc::new(Mutex::new(0)),
        }
    }

    /// Append a record, evicting the oldest when the subscriber lags
    pub fn publish(&self, metrics: GenerationMetrics) {
        let mut buffer = self.buffer.lock();
        if buffer.len() == self.capacity {
            buffer.pop_front();
            *self.dropped.lock() += 1;
        }
        buffer.push_back(metrics);
    }

    /// Drain everything currently buffered, oldest first
    pub fn drain(&self) -> Vec<GenerationMetrics> {
        self.buffer.lock().drain(..).collect()
    }

    /// Records evicted because no subscriber kept up
    pub fn dropped_count(&self) -> u64 {
        *self.dropped.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttackGene, TargetSelector};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn chain(ids: &[&str]) -> AttackGenome {
        AttackGenome {
            genes: ids
                .iter()
                .map(|id| AttackGene {
                    technique_id: id.to_string(),
                    target_selector: TargetSelector::RandomReachable,
                    stealth_modifier: 0.5,
                    fallback_technique_id: None,
                })
                .collect(),
        }
    }

    #[test]
    fn objective_stats_cover_the_sample() {
        let stats = ObjectiveStats::from_values(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 4.0);
        assert!((stats.mean - 2.5).abs() < 1e-9);
        assert!((stats.stdev - (1.25f64).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn identical_genomes_have_zero_diversity() {
        let population = vec![chain(&["T1190", "T1059"]); 5];
        assert_eq!(population_diversity(&population), 0.0);
    }

    #[test]
    fn disjoint_genomes_have_positive_diversity() {
        let population = vec![chain(&["T1190", "T1059"]), chain(&["T1566", "T1003"])];
        assert_eq!(population_diversity(&population), 4.0);
    }

    #[test]
    fn unique_chain_count_deduplicates_orderings() {
        let attackers = vec![
            chain(&["T1190", "T1059"]),
            chain(&["T1190", "T1059"]),
            chain(&["T1059", "T1190"]),
        ];
        let fitness = vec![Fitness::zero(); 3];
        let metrics = collect(0, &attackers, &fitness, &[], &[], None, None);
        assert_eq!(metrics.unique_kill_chains, 2);
        assert_eq!(metrics.technique_histogram["T1190"], 3);
    }

    #[test]
    fn bus_drops_oldest_on_overflow() {
        let bus = MetricsBus::new(2);
        for generation in 0..5u32 {
            let metrics = collect(generation, &[], &[], &[], &[], None, None);
            bus.publish(metrics);
        }
        let drained = bus.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].generation, 3);
        assert_eq!(drained[1].generation, 4);
        assert_eq!(bus.dropped_count(), 3);
        assert!(bus.drain().is_empty());
    }

    #[test]
    fn metrics_serialize_to_json() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let attackers: Vec<AttackGenome> =
            (0..4).map(|_| AttackGenome::random(&mut rng, 6)).collect();
        let defenders: Vec<DefenseGenome> =
            (0..4).map(|_| DefenseGenome::random(&mut rng, 15)).collect();
        let fitness = vec![Fitness::new(1.0, 0.5); 4];
        let metrics = collect(3, &attackers, &fitness, &defenders, &fitness, None, None);
        let json = serde_json::to_string(&metrics).unwrap();
        let back: GenerationMetrics = serde_json::from_str(&json).unwrap();
        assert_eq!(metrics, back);
    }
}
