//! ACES Core - Matchup Simulation Engine
//!
//! Executes one attacker kill chain against one defender rule set on a
//! private clone of the network and emits a deterministic event trace.
//! Given identical (attacker, defender, seed) the trace is byte-identical
//! across runs and platforms; every step draws from the supplied rng in a
//! fixed order: selector, then detection, then success.

use rand::Rng;

use crate::catalog::{self, TechniqueSpec};
use crate::models::{
    AttackGene, AttackGenome, DefenseGenome, DetectionGene, MatchupSummary, PrivilegeLevel,
    RequiredPosition, ResponseAction, SimEvent, StepOutcome, TargetSelector, TechniqueEffect,
};
use crate::network::{NetworkGraph, ReachabilityNeeds, EXTERNAL_HOST_ID};

/// Detection probability malus applied to the success roll once a step has
/// been spotted by the SOC
const DETECTED_SUCCESS_MALUS: f64 = 0.3;

struct MatchupState {
    net: NetworkGraph,
    /// Host the attacker currently operates from; None until first foothold
    current_host: Option<String>,
    held_credentials: Vec<String>,
    exfiltrated: bool,
    persistence_established: bool,
    attempted: u32,
    detected: u32,
    prevented: u32,
}

/// Run one matchup. Malformed genomes never panic: a malformed attacker
/// yields an empty trace, a malformed defender detects nothing.
pub fn simulate<R: Rng>(
    attacker: &AttackGenome,
    defender: &DefenseGenome,
    network: &NetworkGraph,
    rng: &mut R,
) -> (Vec<SimEvent>, MatchupSummary) {
    let defender_rules: &[DetectionGene] = if defender.validate(u32::MAX).is_ok() {
        &defender.rules
    } else {
        &[]
    };
    let mut state = MatchupState {
        net: network.clone(),
        current_host: None,
        held_credentials: Vec::new(),
        exfiltrated: false,
        persistence_established: false,
        attempted: 0,
        detected: 0,
        prevented: 0,
    };
    let mut trace = Vec::new();

    if attacker.validate(usize::MAX).is_ok() {
        for (step_index, gene) in attacker.genes.iter().enumerate() {
            let completed =
                attempt_step(step_index, gene, defender_rules, &mut state, &mut trace, rng);
            if !completed {
                if let Some(fallback_id) = &gene.fallback_technique_id {
                    let fallback = AttackGene {
                        technique_id: fallback_id.clone(),
                        target_selector: gene.target_selector.clone(),
                        stealth_modifier: gene.stealth_modifier,
                        fallback_technique_id: None,
                    };
                    attempt_step(
                        step_index,
                        &fallback,
                        defender_rules,
                        &mut state,
                        &mut trace,
                        rng,
                    );
                }
            }
        }
    }

    let compromised_host_ids: Vec<String> = state
        .net
        .hosts()
        .filter(|h| h.is_compromised)
        .map(|h| h.id.clone())
        .collect();
    let summary = MatchupSummary {
        compromised_host_ids,
        credentials_harvested: state.held_credentials.len() as u32,
        exfiltrated: state.exfiltrated,
        persistence_established: state.persistence_established,
        techniques_attempted: state.attempted,
        techniques_detected: state.detected,
        techniques_prevented: state.prevented,
        chain_length: attacker.genes.len() as u32,
    };
    (trace, summary)
}

/// Attempt a single gene. Returns false when the step ended in a
/// precondition failure, in which case the caller may substitute the
/// fallback technique once.
fn attempt_step<R: Rng>(
    step_index: usize,
    gene: &AttackGene,
    defender_rules: &[DetectionGene],
    state: &mut MatchupState,
    trace: &mut Vec<SimEvent>,
    rng: &mut R,
) -> bool {
    let spec = match catalog::technique(&gene.technique_id) {
        Some(spec) => spec,
        None => {
            trace.push(precondition_failure(step_index, gene, None));
            return false;
        }
    };

    let target = match resolve_target(gene, spec, defender_rules, state, rng) {
        Some(target) => target,
        None => {
            trace.push(precondition_failure(step_index, gene, None));
            return false;
        }
    };

    if !preconditions_hold(spec, &target, state) {
        trace.push(precondition_failure(step_index, gene, Some(target)));
        return false;
    }

    // The step is live from here on.
    state.attempted += 1;

    // Detection: one uniform draw against the OR-combined firing probability
    // of every applicable rule.
    let matching: Vec<&DetectionGene> = {
        let mut rules: Vec<&DetectionGene> = defender_rules
            .iter()
            .filter(|d| {
                d.technique_detected == gene.technique_id
                    && spec.data_sources.contains(&d.data_source)
            })
            .collect();
        rules.sort_by_key(|d| (d.deploy_cost, d.rule_id));
        rules
    };
    let firing_probability = |rule: &DetectionGene| {
        rule.confidence * (1.0 - gene.stealth_modifier * (1.0 - spec.stealth_base))
    };
    let combined = 1.0
        - matching
            .iter()
            .map(|d| 1.0 - firing_probability(d))
            .product::<f64>();
    let detection_draw: f64 = rng.gen();
    let is_detected = detection_draw < combined;
    let detecting_rule = if is_detected {
        matching
            .iter()
            .find(|d| firing_probability(d) > detection_draw)
            .or_else(|| {
                matching.iter().max_by(|a, b| {
                    firing_probability(a)
                        .partial_cmp(&firing_probability(b))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
            })
            .copied()
    } else {
        None
    };

    if is_detected {
        state.detected += 1;
    }

    if let Some(rule) = detecting_rule {
        if rule.response_action.is_preventive() {
            state.prevented += 1;
            apply_response(rule, spec, &target, state);
            trace.push(SimEvent {
                step_index,
                technique_id: gene.technique_id.clone(),
                target_host_id: Some(target),
                outcome: StepOutcome::DetectedAndPrevented,
                detection_rule_id: Some(rule.rule_id),
                effects_applied: Vec::new(),
            });
            return true;
        }
    }

    // Success roll, degraded when the SOC is watching
    let success_probability = if is_detected {
        spec.base_success * (1.0 - DETECTED_SUCCESS_MALUS)
    } else {
        spec.base_success
    };
    let success_draw: f64 = rng.gen();
    if success_draw >= success_probability {
        trace.push(SimEvent {
            step_index,
            technique_id: gene.technique_id.clone(),
            target_host_id: Some(target),
            outcome: StepOutcome::FailedRoll,
            detection_rule_id: detecting_rule.map(|d| d.rule_id),
            effects_applied: Vec::new(),
        });
        return true;
    }

    let effects_applied = apply_effects(spec, &target, state);
    trace.push(SimEvent {
        step_index,
        technique_id: gene.technique_id.clone(),
        target_host_id: Some(target),
        outcome: if is_detected {
            StepOutcome::DetectedButSucceeded
        } else {
            StepOutcome::Success
        },
        detection_rule_id: detecting_rule.map(|d| d.rule_id),
        effects_applied,
    });
    true
}

fn precondition_failure(step_index: usize, gene: &AttackGene, target: Option<String>) -> SimEvent {
    SimEvent {
        step_index,
        technique_id: gene.technique_id.clone(),
        target_host_id: target,
        outcome: StepOutcome::PreconditionFailure,
        detection_rule_id: None,
        effects_applied: Vec::new(),
    }
}

/// Candidate pool for a gene, sorted by host id so every tie-break and
/// uniform draw is deterministic.
fn candidate_pool(
    spec: &TechniqueSpec,
    state: &MatchupState,
) -> Vec<String> {
    let mut pool = match spec.preconditions.required_position {
        // On-host techniques run wherever the attacker already executes code
        RequiredPosition::OnHost => state
            .net
            .hosts()
            .filter(|h| h.is_compromised)
            .map(|h| h.id.clone())
            .collect(),
        // External techniques always launch from the outside vantage
        RequiredPosition::External => state.net.reachable_from(
            EXTERNAL_HOST_ID,
            &ReachabilityNeeds {
                protocol: None,
                held_credentials: state.held_credentials.clone(),
            },
        ),
        RequiredPosition::Internal => match &state.current_host {
            Some(current) => state.net.reachable_from(
                current,
                &ReachabilityNeeds {
                    protocol: None,
                    held_credentials: state.held_credentials.clone(),
                },
            ),
            None => Vec::new(),
        },
    };
    pool.sort();
    pool
}

fn resolve_target<R: Rng>(
    gene: &AttackGene,
    spec: &TechniqueSpec,
    defender_rules: &[DetectionGene],
    state: &MatchupState,
    rng: &mut R,
) -> Option<String> {
    let pool = candidate_pool(spec, state);
    if pool.is_empty() {
        return None;
    }
    match &gene.target_selector {
        TargetSelector::HighestCriticality => pool
            .iter()
            .max_by(|a, b| {
                let ca = state.net.host(a).map(|h| h.criticality).unwrap_or(0.0);
                let cb = state.net.host(b).map(|h| h.criticality).unwrap_or(0.0);
                ca.partial_cmp(&cb)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    // pool is id-sorted; prefer the earlier id on ties
                    .then(b.cmp(a))
            })
            .cloned(),
        TargetSelector::LeastDefended => {
            // Rule sets are deployed network-wide, so the applicable-rule
            // count ties across hosts and the lowest id wins.
            let _applicable = defender_rules
                .iter()
                .filter(|d| {
                    d.technique_detected == gene.technique_id
                        && spec.data_sources.contains(&d.data_source)
                })
                .count();
            pool.first().cloned()
        }
        TargetSelector::MostConnected => pool
            .iter()
            .max_by(|a, b| {
                state
                    .net
                    .out_degree(a)
                    .cmp(&state.net.out_degree(b))
                    .then(b.cmp(a))
            })
            .cloned(),
        TargetSelector::RandomReachable => {
            Some(pool[rng.gen_range(0..pool.len())].clone())
        }
        TargetSelector::SpecificRole(role) => {
            let of_role: Vec<&String> = pool
                .iter()
                .filter(|id| state.net.host(id).map(|h| h.role == *role).unwrap_or(false))
                .collect();
            if of_role.is_empty() {
                None
            } else {
                Some(of_role[rng.gen_range(0..of_role.len())].clone())
            }
        }
    }
}

fn preconditions_hold(spec: &TechniqueSpec, target: &str, state: &MatchupState) -> bool {
    let pre = &spec.preconditions;
    let target_host = match state.net.host(target) {
        Some(host) => host,
        None => return false,
    };
    let privilege_ok = match pre.required_position {
        // Privilege is held on the host the technique executes on
        RequiredPosition::OnHost => target_host.privilege_level >= pre.required_privilege,
        RequiredPosition::Internal => match &state.current_host {
            Some(current) => state
                .net
                .host(current)
                .map(|h| h.privilege_level >= pre.required_privilege)
                .unwrap_or(false),
            None => pre.required_privilege == PrivilegeLevel::None,
        },
        RequiredPosition::External => true,
    };
    if !privilege_ok {
        return false;
    }
    if pre.requires_service {
        let service_ok = if pre.required_position == RequiredPosition::External {
            target_host.has_exposed_service()
        } else {
            !target_host.services.is_empty()
        };
        if !service_ok {
            return false;
        }
    }
    if pre.requires_vuln && !target_host.has_vuln_for(spec.id) {
        return false;
    }
    if pre.requires_credential {
        let has_credential = state.held_credentials.iter().any(|id| {
            state
                .net
                .credential(id)
                .map(|c| !c.revoked && c.authorized_hosts.iter().any(|h| h == target))
                .unwrap_or(false)
        });
        if !has_credential {
            return false;
        }
    }
    true
}

/// Preventive responses abort the step's effects and then act on the network
fn apply_response(
    rule: &DetectionGene,
    spec: &TechniqueSpec,
    target: &str,
    state: &mut MatchupState,
) {
    match rule.response_action {
        ResponseAction::IsolateHost => state.net.isolate(target),
        ResponseAction::RevokeCredential => {
            // Only the credentials this step would have harvested are pulled
            if spec.effects.contains(&TechniqueEffect::CredentialHarvest) {
                let cached: Vec<String> = state
                    .net
                    .host(target)
                    .map(|h| h.credential_ids.clone())
                    .unwrap_or_default();
                for id in cached {
                    state.net.revoke(&id);
                }
            }
        }
        ResponseAction::KillProcess | ResponseAction::BlockTraffic => {}
        ResponseAction::AlertOnly => {}
    }
}

fn apply_effects(spec: &TechniqueSpec, target: &str, state: &mut MatchupState) -> Vec<TechniqueEffect> {
    let mut applied = Vec::new();
    for effect in spec.effects {
        match effect {
            TechniqueEffect::Foothold => {
                state.net.compromise(target, PrivilegeLevel::User);
                state.current_host = Some(target.to_string());
                applied.push(*effect);
            }
            TechniqueEffect::PrivEscalation => {
                if let Some(host) = state.net.host_mut(target) {
                    host.privilege_level = host.privilege_level.escalated();
                    applied.push(*effect);
                }
            }
            TechniqueEffect::CredentialHarvest => {
                let harvested = state.net.harvest_credentials(target);
                for id in harvested {
                    if !state.held_credentials.contains(&id) {
                        state.held_credentials.push(id);
                    }
                }
                applied.push(*effect);
            }
            TechniqueEffect::Persistence => {
                state.persistence_established = true;
                applied.push(*effect);
            }
            TechniqueEffect::LateralMove => {
                state.net.compromise(target, PrivilegeLevel::User);
                state.current_host = Some(target.to_string());
                applied.push(*effect);
            }
            TechniqueEffect::Exfil => {
                // Exfiltration only counts once something worth taking is held
                let has_loot = state
                    .net
                    .hosts()
                    .any(|h| h.is_compromised && h.criticality >= 0.4);
                if has_loot {
                    state.exfiltrated = true;
                    applied.push(*effect);
                }
            }
            TechniqueEffect::Impact => {
                applied.push(*effect);
            }
        }
    }
    applied
}
