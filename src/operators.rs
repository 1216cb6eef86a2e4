//! ACES Core - Genetic Operators
//!
//! Crossover and mutation for both populations, bundled in an explicit
//! `Operators` value owned by the evolution loop. Every operator preserves
//! the genome invariants: attacker chains keep their initial-access head and
//! length bound, defender rule sets stay unique and within budget. A child
//! that still violates an invariant after a bounded number of re-samples is
//! replaced by a clone of the fitter parent.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::catalog;
use crate::genome::{
    default_fp_rate, random_attack_gene, random_detection_gene, random_response_action,
    random_target_selector,
};
use crate::models::{
    AttackGenome, DefenseGenome, DetectionGene, DetectionLogic, Fitness,
};

/// Re-sample attempts before falling back to the fitter parent
const RESAMPLE_BOUND: usize = 4;

/// Standard deviation of the gaussian used to nudge continuous gene fields
const TUNE_SIGMA: f64 = 0.1;

/// Operator bundle for one run. Owned by the loop; nothing here is global.
#[derive(Debug, Clone)]
pub struct Operators {
    pub max_chain_len: usize,
    pub defender_budget: u32,
    pub crossover_rate: f64,
    pub mutation_rate: f64,
}

impl Operators {
    fn gaussian<R: Rng>(&self, rng: &mut R) -> f64 {
        // sigma is a small positive constant, so the distribution is valid
        Normal::new(0.0, TUNE_SIGMA)
            .map(|n| n.sample(rng))
            .unwrap_or(0.0)
    }

    /// Single-point crossover on gene sequences. The child keeps parent A's
    /// initial-access head and inherits parent B's suffix, truncated to the
    /// chain length bound.
    pub fn attacker_crossover<R: Rng>(
        &self,
        rng: &mut R,
        parent_a: &AttackGenome,
        parent_b: &AttackGenome,
    ) -> AttackGenome {
        let shorter = parent_a.len().min(parent_b.len());
        if shorter < 2 {
            // Nothing to exchange below the head; inherit parent A
            return parent_a.clone();
        }
        let point = rng.gen_range(1..shorter);
        let mut genes = Vec::with_capacity(self.max_chain_len);
        genes.extend_from_slice(&parent_a.genes[..point]);
        genes.extend_from_slice(&parent_b.genes[point..]);
        genes.truncate(self.max_chain_len);
        genes[0] = parent_a.genes[0].clone();
        AttackGenome { genes }
    }

    /// Apply one uniformly chosen mutation, skipping arms whose guard fails
    pub fn attacker_mutate<R: Rng>(&self, rng: &mut R, genome: &mut AttackGenome) {
        let len = genome.len();
        match rng.gen_range(0..6) {
            0 => {
                // append a random gene
                if len < self.max_chain_len {
                    let ids = catalog::all_ids();
                    let technique_id = ids[rng.gen_range(0..ids.len())];
                    genome.genes.push(random_attack_gene(rng, technique_id));
                }
            }
            1 => {
                // remove a non-head gene
                if len > 1 {
                    let index = rng.gen_range(1..len);
                    genome.genes.remove(index);
                }
            }
            2 => {
                // swap two non-head positions
                if len > 2 {
                    let first = rng.gen_range(1..len);
                    let second = rng.gen_range(1..len);
                    genome.genes.swap(first, second);
                }
            }
            3 => {
                // replace a technique with a sibling from the same tactic
                let index = rng.gen_range(0..len);
                if let Some(spec) = catalog::technique(&genome.genes[index].technique_id) {
                    let siblings = catalog::ids_in_tactic(spec.tactic);
                    genome.genes[index].technique_id =
                        siblings[rng.gen_range(0..siblings.len())].to_string();
                }
            }
            4 => {
                let index = rng.gen_range(0..len);
                genome.genes[index].target_selector = random_target_selector(rng);
            }
            _ => {
                let index = rng.gen_range(0..len);
                let nudged = genome.genes[index].stealth_modifier + self.gaussian(rng);
                genome.genes[index].stealth_modifier = nudged.clamp(0.0, 1.0);
            }
        }
    }

    /// Two children from one parent pair: a single crossover decision covers
    /// both, then each child is independently mutated and invariant-repaired.
    /// A child that stays invalid after the re-sample bound falls back to a
    /// clone of the fitter parent.
    pub fn attacker_pair_offspring<R: Rng>(
        &self,
        rng: &mut R,
        parent_a: (&AttackGenome, Fitness),
        parent_b: (&AttackGenome, Fitness),
    ) -> (AttackGenome, AttackGenome) {
        let crossed = rng.gen_bool(self.crossover_rate);
        let first = self.finish_attacker_child(rng, crossed, parent_a, parent_b);
        let second = self.finish_attacker_child(rng, crossed, parent_b, parent_a);
        (first, second)
    }

    fn finish_attacker_child<R: Rng>(
        &self,
        rng: &mut R,
        crossed: bool,
        head: (&AttackGenome, Fitness),
        tail: (&AttackGenome, Fitness),
    ) -> AttackGenome {
        for _ in 0..RESAMPLE_BOUND {
            let mut child = if crossed {
                self.attacker_crossover(rng, head.0, tail.0)
            } else {
                head.0.clone()
            };
            if rng.gen_bool(self.mutation_rate) {
                self.attacker_mutate(rng, &mut child);
            }
            if child.validate(self.max_chain_len).is_ok() {
                return child;
            }
        }
        fitter(head, tail).clone()
    }

    /// Uniform crossover: pool both parents' rules, take each with p = 0.5,
    /// drop duplicates, then shed the lowest-utility rules until the budget
    /// holds. Rule ids are reassigned in child order.
    pub fn defender_crossover<R: Rng>(
        &self,
        rng: &mut R,
        parent_a: &DefenseGenome,
        parent_b: &DefenseGenome,
    ) -> DefenseGenome {
        let mut rules: Vec<DetectionGene> = Vec::new();
        for rule in parent_a.rules.iter().chain(parent_b.rules.iter()) {
            if rng.gen_bool(0.5) && !rules.iter().any(|r| r.dedup_key() == rule.dedup_key()) {
                rules.push(rule.clone());
            }
        }
        let mut child = DefenseGenome { rules };
        self.enforce_budget(&mut child);
        reassign_rule_ids(&mut child);
        child
    }

    fn enforce_budget(&self, genome: &mut DefenseGenome) {
        while genome.total_cost() > self.defender_budget {
            let worst = genome
                .rules
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    a.utility()
                        .partial_cmp(&b.utility())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(index, _)| index);
            match worst {
                Some(index) => {
                    genome.rules.remove(index);
                }
                None => break,
            }
        }
    }

    /// Apply one uniformly chosen defender mutation, skipping arms whose
    /// guard fails
    pub fn defender_mutate<R: Rng>(&self, rng: &mut R, genome: &mut DefenseGenome) {
        match rng.gen_range(0..6) {
            0 => {
                // add a rule if the budget permits
                let next_id = genome.rules.iter().map(|r| r.rule_id + 1).max().unwrap_or(0);
                let candidate = random_detection_gene(rng, next_id);
                let fits = genome.total_cost() + candidate.deploy_cost <= self.defender_budget;
                let fresh = !genome
                    .rules
                    .iter()
                    .any(|r| r.dedup_key() == candidate.dedup_key());
                if fits && fresh {
                    genome.rules.push(candidate);
                }
            }
            1 => {
                if !genome.rules.is_empty() {
                    let index = rng.gen_range(0..genome.rules.len());
                    genome.rules.remove(index);
                }
            }
            2 => {
                // switch detection logic, repricing cost and fp rate
                if !genome.rules.is_empty() {
                    let index = rng.gen_range(0..genome.rules.len());
                    let logics = [
                        DetectionLogic::Signature,
                        DetectionLogic::Behavioral,
                        DetectionLogic::Correlation,
                        DetectionLogic::MlAnomaly,
                    ];
                    let logic = logics[rng.gen_range(0..logics.len())];
                    let rule = &mut genome.rules[index];
                    rule.detection_logic = logic;
                    rule.deploy_cost = logic.deploy_cost();
                    rule.fp_rate = default_fp_rate(rule.data_source, logic);
                    self.dedup_and_budget(genome, index);
                }
            }
            3 => {
                if !genome.rules.is_empty() {
                    let index = rng.gen_range(0..genome.rules.len());
                    let nudge = self.gaussian(rng);
                    let rule = &mut genome.rules[index];
                    rule.confidence = (rule.confidence + nudge).clamp(0.0, 1.0);
                }
            }
            4 => {
                if !genome.rules.is_empty() {
                    let index = rng.gen_range(0..genome.rules.len());
                    genome.rules[index].response_action = random_response_action(rng);
                }
            }
            _ => {
                // retarget to another technique, resampling an applicable
                // data source so the rule stays live
                if !genome.rules.is_empty() {
                    let index = rng.gen_range(0..genome.rules.len());
                    let specs = catalog::all_specs();
                    let technique = specs[rng.gen_range(0..specs.len())];
                    let source =
                        technique.data_sources[rng.gen_range(0..technique.data_sources.len())];
                    let rule = &mut genome.rules[index];
                    rule.technique_detected = technique.id.to_string();
                    rule.data_source = source;
                    rule.fp_rate = default_fp_rate(source, rule.detection_logic);
                    self.dedup_and_budget(genome, index);
                }
            }
        }
    }

    /// After an in-place edit at `index`, drop the edited rule if it now
    /// duplicates another, then restore the budget bound.
    fn dedup_and_budget(&self, genome: &mut DefenseGenome, index: usize) {
        let key = genome.rules[index].dedup_key();
        let duplicated = genome
            .rules
            .iter()
            .enumerate()
            .any(|(other, rule)| other != index && rule.dedup_key() == key);
        if duplicated {
            genome.rules.remove(index);
        }
        self.enforce_budget(genome);
    }

    /// Defender counterpart of [`Operators::attacker_pair_offspring`]. Both
    /// children of a crossed pair are independent uniform samples of the
    /// pooled parent rules.
    pub fn defender_pair_offspring<R: Rng>(
        &self,
        rng: &mut R,
        parent_a: (&DefenseGenome, Fitness),
        parent_b: (&DefenseGenome, Fitness),
    ) -> (DefenseGenome, DefenseGenome) {
        let crossed = rng.gen_bool(self.crossover_rate);
        let first = self.finish_defender_child(rng, crossed, parent_a, parent_b);
        let second = self.finish_defender_child(rng, crossed, parent_b, parent_a);
        (first, second)
    }

    fn finish_defender_child<R: Rng>(
        &self,
        rng: &mut R,
        crossed: bool,
        head: (&DefenseGenome, Fitness),
        tail: (&DefenseGenome, Fitness),
    ) -> DefenseGenome {
        for _ in 0..RESAMPLE_BOUND {
            let mut child = if crossed {
                self.defender_crossover(rng, head.0, tail.0)
            } else {
                head.0.clone()
            };
            if rng.gen_bool(self.mutation_rate) {
                self.defender_mutate(rng, &mut child);
            }
            if child.validate(self.defender_budget).is_ok() {
                return child;
            }
        }
        fitter(head, tail).clone()
    }
}

fn fitter<'a, T>(a: (&'a T, Fitness), b: (&'a T, Fitness)) -> &'a T {
    if b.1.dominates(&a.1) {
        b.0
    } else {
        a.0
    }
}

fn reassign_rule_ids(genome: &mut DefenseGenome) {
    for (index, rule) in genome.rules.iter_mut().enumerate() {
        rule.rule_id = index as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn operators() -> Operators {
        Operators {
            max_chain_len: 8,
            defender_budget: 15,
            crossover_rate: 0.7,
            mutation_rate: 0.2,
        }
    }

    #[test]
    fn attacker_crossover_keeps_parent_a_head() {
        let ops = operators();
        for seed in 0..50 {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let parent_a = AttackGenome::random(&mut rng, 8);
            let parent_b = AttackGenome::random(&mut rng, 8);
            let child = ops.attacker_crossover(&mut rng, &parent_a, &parent_b);
            assert_eq!(child.genes[0], parent_a.genes[0]);
            assert!(child.len() <= 8);
            child.validate(8).unwrap();
        }
    }

    #[test]
    fn attacker_invariants_survive_operator_storm() {
        let ops = operators();
        let mut rng = ChaCha20Rng::seed_from_u64(21);
        let mut genome = AttackGenome::random(&mut rng, 8);
        for _ in 0..500 {
            ops.attacker_mutate(&mut rng, &mut genome);
            genome.validate(8).unwrap();
        }
    }

    #[test]
    fn defender_crossover_respects_budget_and_uniqueness() {
        let ops = operators();
        for seed in 0..50 {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let parent_a = DefenseGenome::random(&mut rng, 15);
            let parent_b = DefenseGenome::random(&mut rng, 15);
            let child = ops.defender_crossover(&mut rng, &parent_a, &parent_b);
            child.validate(15).unwrap();
        }
    }

    #[test]
    fn defender_invariants_survive_operator_storm() {
        let ops = operators();
        let mut rng = ChaCha20Rng::seed_from_u64(33);
        let mut genome = DefenseGenome::random(&mut rng, 15);
        for _ in 0..500 {
            ops.defender_mutate(&mut rng, &mut genome);
            genome.validate(15).unwrap();
        }
    }

    #[test]
    fn unit_budget_survives_crossover_and_mutation_rounds() {
        let ops = Operators {
            defender_budget: 1,
            ..operators()
        };
        let mut rng = ChaCha20Rng::seed_from_u64(8);
        let mut left = DefenseGenome::random(&mut rng, 1);
        let mut right = DefenseGenome::random(&mut rng, 1);
        for _ in 0..10 {
            let mut child = ops.defender_crossover(&mut rng, &left, &right);
            ops.defender_mutate(&mut rng, &mut child);
            child.validate(1).unwrap();
            assert!(child.len() <= 1);
            left = right;
            right = child;
        }
    }

    #[test]
    fn offspring_pairs_are_always_valid() {
        let ops = operators();
        let mut rng = ChaCha20Rng::seed_from_u64(55);
        for _ in 0..50 {
            let parent_a = AttackGenome::random(&mut rng, 8);
            let parent_b = AttackGenome::random(&mut rng, 8);
            let (first, second) = ops.attacker_pair_offspring(
                &mut rng,
                (&parent_a, Fitness::zero()),
                (&parent_b, Fitness::zero()),
            );
            first.validate(8).unwrap();
            second.validate(8).unwrap();

            let defense_a = DefenseGenome::random(&mut rng, 15);
            let defense_b = DefenseGenome::random(&mut rng, 15);
            let (first, second) = ops.defender_pair_offspring(
                &mut rng,
                (&defense_a, Fitness::zero()),
                (&defense_b, Fitness::zero()),
            );
            first.validate(15).unwrap();
            second.validate(15).unwrap();
        }
    }
}
