//! ACES Core - Technique Catalog
//!
//! Immutable process-wide registry of the 38 ATT&CK techniques the simulator
//! models, spanning 11 tactics. Every id a genome may encode resolves here;
//! random genome construction draws only from these keys.

use indexmap::IndexMap;
use once_cell::sync::Lazy;

use crate::models::{DataSource, PrivilegeLevel, RequiredPosition, Tactic, TechniqueEffect};

use DataSource::*;
use RequiredPosition::*;
use Tactic::{
    Collection, CredentialAccess, DefenseEvasion, Discovery, Execution, Exfiltration,
    InitialAccess, LateralMovement, PrivilegeEscalation,
};
use TechniqueEffect::{CredentialHarvest, Exfil, Foothold, LateralMove, PrivEscalation};

/// Technique preconditions checked against the candidate target and the
/// attacker's current state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preconditions {
    pub required_position: RequiredPosition,
    pub required_privilege: PrivilegeLevel,
    pub requires_service: bool,
    pub requires_vuln: bool,
    pub requires_credential: bool,
}

/// Static catalog entry for one ATT&CK technique
#[derive(Debug, Clone, PartialEq)]
pub struct TechniqueSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub tactic: Tactic,
    pub preconditions: Preconditions,
    pub effects: &'static [TechniqueEffect],
    pub base_success: f64,
    pub stealth_base: f64,
    pub data_sources: &'static [DataSource],
}

struct Entry {
    id: &'static str,
    name: &'static str,
    tactic: Tactic,
    position: RequiredPosition,
    privilege: PrivilegeLevel,
    needs_service: bool,
    needs_vuln: bool,
    needs_credential: bool,
    effects: &'static [TechniqueEffect],
    base_success: f64,
    stealth_base: f64,
    data_sources: &'static [DataSource],
}

#[rustfmt::skip]
const ENTRIES: &[Entry] = &[
    // Initial Access
    Entry { id: "T1190", name: "Exploit Public-Facing Application", tactic: InitialAccess, position: External, privilege: PrivilegeLevel::None, needs_service: true, needs_vuln: true, needs_credential: false, effects: &[Foothold], base_success: 0.75, stealth_base: 0.50, data_sources: &[NetworkTraffic, WebProxy] },
    Entry { id: "T1566", name: "Phishing", tactic: InitialAccess, position: External, privilege: PrivilegeLevel::None, needs_service: true, needs_vuln: false, needs_credential: false, effects: &[Foothold], base_success: 0.55, stealth_base: 0.60, data_sources: &[Email, WebProxy] },
    Entry { id: "T1133", name: "External Remote Services", tactic: InitialAccess, position: External, privilege: PrivilegeLevel::None, needs_service: true, needs_vuln: true, needs_credential: false, effects: &[Foothold], base_success: 0.65, stealth_base: 0.55, data_sources: &[Authentication, NetworkTraffic] },
    Entry { id: "T1078", name: "Valid Accounts", tactic: InitialAccess, position: External, privilege: PrivilegeLevel::None, needs_service: false, needs_vuln: false, needs_credential: true, effects: &[Foothold], base_success: 0.90, stealth_base: 0.90, data_sources: &[Authentication] },
    // Execution
    Entry { id: "T1059", name: "Command and Scripting Interpreter", tactic: Execution, position: OnHost, privilege: PrivilegeLevel::User, needs_service: false, needs_vuln: false, needs_credential: false, effects: &[], base_success: 0.90, stealth_base: 0.45, data_sources: &[CommandLineInterface, ProcessMonitoring] },
    Entry { id: "T1204", name: "User Execution", tactic: Execution, position: Internal, privilege: PrivilegeLevel::None, needs_service: false, needs_vuln: false, needs_credential: false, effects: &[], base_success: 0.80, stealth_base: 0.50, data_sources: &[ProcessMonitoring, Email] },
    Entry { id: "T1047", name: "Windows Management Instrumentation", tactic: Execution, position: OnHost, privilege: PrivilegeLevel::Admin, needs_service: false, needs_vuln: false, needs_credential: false, effects: &[], base_success: 0.85, stealth_base: 0.60, data_sources: &[WindowsEventLogs, ProcessMonitoring] },
    Entry { id: "T1053", name: "Scheduled Task/Job", tactic: Execution, position: OnHost, privilege: PrivilegeLevel::Admin, needs_service: false, needs_vuln: false, needs_credential: false, effects: &[TechniqueEffect::Persistence], base_success: 0.85, stealth_base: 0.65, data_sources: &[WindowsEventLogs, ProcessMonitoring] },
    // Persistence
    Entry { id: "T1547", name: "Boot or Logon Autostart Execution", tactic: Tactic::Persistence, position: OnHost, privilege: PrivilegeLevel::Admin, needs_service: false, needs_vuln: false, needs_credential: false, effects: &[TechniqueEffect::Persistence], base_success: 0.85, stealth_base: 0.60, data_sources: &[Registry, ProcessMonitoring] },
    Entry { id: "T1136", name: "Create Account", tactic: Tactic::Persistence, position: OnHost, privilege: PrivilegeLevel::Admin, needs_service: false, needs_vuln: false, needs_credential: false, effects: &[TechniqueEffect::Persistence], base_success: 0.80, stealth_base: 0.50, data_sources: &[Authentication, WindowsEventLogs] },
    Entry { id: "T1505", name: "Server Software Component", tactic: Tactic::Persistence, position: OnHost, privilege: PrivilegeLevel::Admin, needs_service: true, needs_vuln: false, needs_credential: false, effects: &[TechniqueEffect::Persistence], base_success: 0.75, stealth_base: 0.70, data_sources: &[FileMonitoring, NetworkTraffic] },
    Entry { id: "T1543", name: "Create or Modify System Process", tactic: Tactic::Persistence, position: OnHost, privilege: PrivilegeLevel::Admin, needs_service: false, needs_vuln: false, needs_credential: false, effects: &[TechniqueEffect::Persistence], base_success: 0.80, stealth_base: 0.55, data_sources: &[ProcessMonitoring, WindowsEventLogs] },
    // Privilege Escalation
    Entry { id: "T1068", name: "Exploitation for Privilege Escalation", tactic: PrivilegeEscalation, position: OnHost, privilege: PrivilegeLevel::User, needs_service: false, needs_vuln: true, needs_credential: false, effects: &[PrivEscalation], base_success: 0.70, stealth_base: 0.50, data_sources: &[ProcessMonitoring] },
    Entry { id: "T1548", name: "Abuse Elevation Control Mechanism", tactic: PrivilegeEscalation, position: OnHost, privilege: PrivilegeLevel::User, needs_service: false, needs_vuln: false, needs_credential: false, effects: &[PrivEscalation], base_success: 0.75, stealth_base: 0.55, data_sources: &[ProcessMonitoring, CommandLineInterface] },
    Entry { id: "T1055", name: "Process Injection", tactic: PrivilegeEscalation, position: OnHost, privilege: PrivilegeLevel::User, needs_service: false, needs_vuln: false, needs_credential: false, effects: &[PrivEscalation], base_success: 0.80, stealth_base: 0.70, data_sources: &[ProcessMonitoring] },
    Entry { id: "T1134", name: "Access Token Manipulation", tactic: PrivilegeEscalation, position: OnHost, privilege: PrivilegeLevel::User, needs_service: false, needs_vuln: false, needs_credential: false, effects: &[PrivEscalation], base_success: 0.75, stealth_base: 0.65, data_sources: &[WindowsEventLogs, ProcessMonitoring] },
    // Defense Evasion
    Entry { id: "T1070", name: "Indicator Removal", tactic: DefenseEvasion, position: OnHost, privilege: PrivilegeLevel::User, needs_service: false, needs_vuln: false, needs_credential: false, effects: &[], base_success: 0.85, stealth_base: 0.80, data_sources: &[FileMonitoring, WindowsEventLogs] },
    Entry { id: "T1027", name: "Obfuscated Files or Information", tactic: DefenseEvasion, position: OnHost, privilege: PrivilegeLevel::User, needs_service: false, needs_vuln: false, needs_credential: false, effects: &[], base_success: 0.90, stealth_base: 0.85, data_sources: &[ProcessMonitoring, FileMonitoring] },
    Entry { id: "T1562", name: "Impair Defenses", tactic: DefenseEvasion, position: OnHost, privilege: PrivilegeLevel::Admin, needs_service: false, needs_vuln: false, needs_credential: false, effects: &[], base_success: 0.70, stealth_base: 0.60, data_sources: &[ProcessMonitoring, WindowsEventLogs] },
    // Credential Access
    Entry { id: "T1003", name: "OS Credential Dumping", tactic: CredentialAccess, position: OnHost, privilege: PrivilegeLevel::Admin, needs_service: false, needs_vuln: false, needs_credential: false, effects: &[CredentialHarvest], base_success: 0.80, stealth_base: 0.55, data_sources: &[ProcessMonitoring, WindowsEventLogs] },
    Entry { id: "T1110", name: "Brute Force", tactic: CredentialAccess, position: Internal, privilege: PrivilegeLevel::None, needs_service: true, needs_vuln: false, needs_credential: false, effects: &[CredentialHarvest], base_success: 0.40, stealth_base: 0.30, data_sources: &[Authentication] },
    Entry { id: "T1558", name: "Steal or Forge Kerberos Tickets", tactic: CredentialAccess, position: Internal, privilege: PrivilegeLevel::User, needs_service: false, needs_vuln: false, needs_credential: false, effects: &[CredentialHarvest], base_success: 0.65, stealth_base: 0.60, data_sources: &[Authentication, WindowsEventLogs] },
    Entry { id: "T1552", name: "Unsecured Credentials", tactic: CredentialAccess, position: OnHost, privilege: PrivilegeLevel::User, needs_service: false, needs_vuln: false, needs_credential: false, effects: &[CredentialHarvest], base_success: 0.70, stealth_base: 0.70, data_sources: &[FileMonitoring, CommandLineInterface] },
    // Discovery
    Entry { id: "T1046", name: "Network Service Discovery", tactic: Discovery, position: Internal, privilege: PrivilegeLevel::None, needs_service: false, needs_vuln: false, needs_credential: false, effects: &[], base_success: 0.95, stealth_base: 0.40, data_sources: &[NetworkTraffic] },
    Entry { id: "T1087", name: "Account Discovery", tactic: Discovery, position: OnHost, privilege: PrivilegeLevel::User, needs_service: false, needs_vuln: false, needs_credential: false, effects: &[], base_success: 0.90, stealth_base: 0.60, data_sources: &[CommandLineInterface, WindowsEventLogs] },
    Entry { id: "T1018", name: "Remote System Discovery", tactic: Discovery, position: Internal, privilege: PrivilegeLevel::None, needs_service: false, needs_vuln: false, needs_credential: false, effects: &[], base_success: 0.95, stealth_base: 0.50, data_sources: &[NetworkTraffic, CommandLineInterface] },
    // Lateral Movement
    Entry { id: "T1021", name: "Remote Services", tactic: LateralMovement, position: Internal, privilege: PrivilegeLevel::User, needs_service: false, needs_vuln: false, needs_credential: true, effects: &[LateralMove], base_success: 0.80, stealth_base: 0.60, data_sources: &[Authentication, NetworkTraffic] },
    Entry { id: "T1550", name: "Use Alternate Authentication Material", tactic: LateralMovement, position: Internal, privilege: PrivilegeLevel::User, needs_service: false, needs_vuln: false, needs_credential: true, effects: &[LateralMove], base_success: 0.75, stealth_base: 0.55, data_sources: &[Authentication, WindowsEventLogs] },
    Entry { id: "T1570", name: "Lateral Tool Transfer", tactic: LateralMovement, position: Internal, privilege: PrivilegeLevel::User, needs_service: false, needs_vuln: false, needs_credential: false, effects: &[LateralMove], base_success: 0.70, stealth_base: 0.50, data_sources: &[NetworkTraffic, FileMonitoring] },
    Entry { id: "T1210", name: "Exploitation of Remote Services", tactic: LateralMovement, position: Internal, privilege: PrivilegeLevel::None, needs_service: true, needs_vuln: true, needs_credential: false, effects: &[LateralMove], base_success: 0.65, stealth_base: 0.45, data_sources: &[NetworkTraffic, ProcessMonitoring] },
    // Collection
    Entry { id: "T1005", name: "Data from Local System", tactic: Collection, position: OnHost, privilege: PrivilegeLevel::User, needs_service: false, needs_vuln: false, needs_credential: false, effects: &[], base_success: 0.90, stealth_base: 0.65, data_sources: &[FileMonitoring, CommandLineInterface] },
    Entry { id: "T1039", name: "Data from Network Shared Drive", tactic: Collection, position: Internal, privilege: PrivilegeLevel::User, needs_service: false, needs_vuln: false, needs_credential: false, effects: &[], base_success: 0.80, stealth_base: 0.55, data_sources: &[NetworkTraffic, FileMonitoring] },
    Entry { id: "T1114", name: "Email Collection", tactic: Collection, position: OnHost, privilege: PrivilegeLevel::User, needs_service: false, needs_vuln: false, needs_credential: false, effects: &[], base_success: 0.75, stealth_base: 0.60, data_sources: &[Email, CloudLogs] },
    // Exfiltration
    Entry { id: "T1041", name: "Exfiltration Over C2 Channel", tactic: Exfiltration, position: OnHost, privilege: PrivilegeLevel::User, needs_service: false, needs_vuln: false, needs_credential: false, effects: &[Exfil], base_success: 0.75, stealth_base: 0.50, data_sources: &[NetworkTraffic] },
    Entry { id: "T1048", name: "Exfiltration Over Alternative Protocol", tactic: Exfiltration, position: OnHost, privilege: PrivilegeLevel::User, needs_service: false, needs_vuln: false, needs_credential: false, effects: &[Exfil], base_success: 0.70, stealth_base: 0.55, data_sources: &[NetworkTraffic, DnsLogs] },
    Entry { id: "T1567", name: "Exfiltration Over Web Service", tactic: Exfiltration, position: OnHost, privilege: PrivilegeLevel::User, needs_service: false, needs_vuln: false, needs_credential: false, effects: &[Exfil], base_success: 0.70, stealth_base: 0.60, data_sources: &[WebProxy, NetworkTraffic] },
    // Impact
    Entry { id: "T1486", name: "Data Encrypted for Impact", tactic: Tactic::Impact, position: OnHost, privilege: PrivilegeLevel::Admin, needs_service: false, needs_vuln: false, needs_credential: false, effects: &[TechniqueEffect::Impact], base_success: 0.80, stealth_base: 0.30, data_sources: &[FileMonitoring, ProcessMonitoring] },
    Entry { id: "T1489", name: "Service Stop", tactic: Tactic::Impact, position: OnHost, privilege: PrivilegeLevel::Admin, needs_service: false, needs_vuln: false, needs_credential: false, effects: &[TechniqueEffect::Impact], base_success: 0.85, stealth_base: 0.35, data_sources: &[WindowsEventLogs, ProcessMonitoring] },
];

static CATALOG: Lazy<IndexMap<&'static str, TechniqueSpec>> = Lazy::new(|| {
    ENTRIES
        .iter()
        .map(|e| {
            (
                e.id,
                TechniqueSpec {
                    id: e.id,
                    name: e.name,
                    tactic: e.tactic,
                    preconditions: Preconditions {
                        required_position: e.position,
                        required_privilege: e.privilege,
                        requires_service: e.needs_service,
                        requires_vuln: e.needs_vuln,
                        requires_credential: e.needs_credential,
                    },
                    effects: e.effects,
                    base_success: e.base_success,
                    stealth_base: e.stealth_base,
                    data_sources: e.data_sources,
                },
            )
        })
        .collect()
});

/// Look up a technique by ATT&CK id
pub fn technique(id: &str) -> Option<&'static TechniqueSpec> {
    CATALOG.get(id)
}

/// Every technique id, in catalog order
pub fn all_ids() -> Vec<&'static str> {
    CATALOG.keys().copied().collect()
}

/// Every technique spec, in catalog order
pub fn all_specs() -> Vec<&'static TechniqueSpec> {
    CATALOG.values().collect()
}

/// The initial-access subset genomes must start from
pub fn initial_access_ids() -> Vec<&'static str> {
    ids_in_tactic(Tactic::InitialAccess)
}

/// Technique ids of one tactic, in catalog order
pub fn ids_in_tactic(tactic: Tactic) -> Vec<&'static str> {
    CATALOG
        .values()
        .filter(|t| t.tactic == tactic)
        .map(|t| t.id)
        .collect()
}

/// Number of catalog entries; also the length of the technique-presence
/// vector used for diversity metrics
pub fn catalog_size() -> usize {
    CATALOG.len()
}
