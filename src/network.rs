//! ACES Core - Enterprise Network Model
//!
//! Hosts, services, vulnerabilities, credentials and the directed segment
//! graph the matchup engine runs against. Every matchup mutates a private
//! clone; the topology template itself is never touched after construction.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{AcesError, AcesResult};
use crate::models::PrivilegeLevel;

/// Sentinel source id for techniques launched from outside the perimeter
pub const EXTERNAL_HOST_ID: &str = "internet";

/// Operating system tags
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum OsTag {
    Windows,
    Linux,
    NetworkAppliance,
}

/// Host roles used for targeting and criticality banding
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum HostRole {
    Workstation,
    Server,
    DomainController,
    Firewall,
    Database,
    Dmz,
}

/// Protocols carried on graph edges
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Protocol {
    Http,
    Https,
    Smtp,
    Dns,
    Vpn,
    Smb,
    Rdp,
    Ssh,
    Ldap,
    Kerberos,
}

/// A listening service on a host
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Service {
    pub name: String,
    pub port: u16,
    pub version: String,
    pub exposed: bool,
}

/// A known vulnerability and the techniques it enables
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vulnerability {
    pub cve_id: String,
    pub cvss: f64,
    pub techniques_enabled: Vec<String>,
}

/// A credential identity. The secret itself is opaque; only the handle moves
/// through the simulation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Credential {
    pub id: String,
    pub username: String,
    pub secret_ref: String,
    pub authorized_hosts: Vec<String>,
    pub privilege: PrivilegeLevel,
    pub compromised: bool,
    pub revoked: bool,
}

/// One host of the simulated enterprise
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Host {
    pub id: String,
    pub hostname: String,
    pub os: OsTag,
    pub role: HostRole,
    pub criticality: f64,
    pub services: Vec<Service>,
    pub vulnerabilities: Vec<Vulnerability>,
    pub installed_software: Vec<String>,
    /// Ids of credentials cached on this host, harvestable after compromise
    pub credential_ids: Vec<String>,
    pub is_compromised: bool,
    pub privilege_level: PrivilegeLevel,
    pub has_credential_cache: bool,
}

impl Host {
    /// Whether any vulnerability on this host enables the given technique
    pub fn has_vuln_for(&self, technique_id: &str) -> bool {
        self.vulnerabilities
            .iter()
            .any(|v| v.techniques_enabled.iter().any(|t| t == technique_id))
    }

    pub fn has_exposed_service(&self) -> bool {
        self.services.iter().any(|s| s.exposed)
    }
}

/// Directed connectivity between two hosts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Edge {
    pub src: String,
    pub dst: String,
    pub protocols: Vec<Protocol>,
    pub requires_credential: bool,
    pub crosses_segment: bool,
}

/// Predicates applied when querying reachability from a source host
#[derive(Debug, Clone, Default)]
pub struct ReachabilityNeeds {
    /// Restrict to edges carrying this protocol; None accepts any edge
    pub protocol: Option<Protocol>,
    /// Credential ids currently held by the caller
    pub held_credentials: Vec<String>,
}

/// Durable topology shape, the JSON interface consumed and produced by the
/// network model. Credentials are embedded on the host caching them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopologySpec {
    pub segments: IndexMap<String, Vec<String>>,
    pub hosts: Vec<HostSpec>,
    pub edges: Vec<Edge>,
}

/// Host entry of the topology JSON
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostSpec {
    pub id: String,
    pub hostname: String,
    pub os: OsTag,
    pub role: HostRole,
    pub criticality: f64,
    pub services: Vec<Service>,
    pub vulnerabilities: Vec<Vulnerability>,
    pub credentials: Vec<Credential>,
}

/// The simulated enterprise network. Cloning is deep: a clone shares no
/// mutable state with the original.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkGraph {
    hosts: IndexMap<String, Host>,
    edges: Vec<Edge>,
    segments: IndexMap<String, Vec<String>>,
    credentials: IndexMap<String, Credential>,
}

impl NetworkGraph {
    /// Build a graph from its durable topology form
    pub fn from_spec(spec: &TopologySpec) -> AcesResult<Self> {
        let mut hosts = IndexMap::new();
        let mut credentials = IndexMap::new();
        for host_spec in &spec.hosts {
            let mut credential_ids = Vec::new();
            for credential in &host_spec.credentials {
                credential_ids.push(credential.id.clone());
                if credentials
                    .insert(credential.id.clone(), credential.clone())
                    .is_some()
                {
                    return Err(AcesError::Topology(format!(
                        "credential {} cached on more than one host",
                        credential.id
                    )));
                }
            }
            let host = Host {
                id: host_spec.id.clone(),
                hostname: host_spec.hostname.clone(),
                os: host_spec.os,
                role: host_spec.role,
                criticality: host_spec.criticality,
                services: host_spec.services.clone(),
                vulnerabilities: host_spec.vulnerabilities.clone(),
                installed_software: Vec::new(),
                credential_ids,
                is_compromised: false,
                privilege_level: PrivilegeLevel::None,
                has_credential_cache: false,
            };
            if hosts.insert(host.id.clone(), host).is_some() {
                return Err(AcesError::Topology(format!(
                    "duplicate host id {}",
                    host_spec.id
                )));
            }
        }
        for edge in &spec.edges {
            if !hosts.contains_key(&edge.src) || !hosts.contains_key(&edge.dst) {
                return Err(AcesError::Topology(format!(
                    "edge {} -> {} references an unknown host",
                    edge.src, edge.dst
                )));
            }
        }
        for (segment, members) in &spec.segments {
            for member in members {
                if !hosts.contains_key(member) {
                    return Err(AcesError::Topology(format!(
                        "segment {} lists unknown host {}",
                        segment, member
                    )));
                }
            }
        }
        Ok(Self {
            hosts,
            edges: spec.edges.clone(),
            segments: spec.segments.clone(),
            credentials,
        })
    }

    /// Dump the graph back into its durable topology form. Ordering follows
    /// insertion order throughout, so load -> clone -> dump is byte identity.
    pub fn to_spec(&self) -> TopologySpec {
        let hosts = self
            .hosts
            .values()
            .map(|host| HostSpec {
                id: host.id.clone(),
                hostname: host.hostname.clone(),
                os: host.os,
                role: host.role,
                criticality: host.criticality,
                services: host.services.clone(),
                vulnerabilities: host.vulnerabilities.clone(),
                credentials: host
                    .credential_ids
                    .iter()
                    .filter_map(|id| self.credentials.get(id).cloned())
                    .collect(),
            })
            .collect();
        TopologySpec {
            segments: self.segments.clone(),
            hosts,
            edges: self.edges.clone(),
        }
    }

    pub fn host(&self, id: &str) -> Option<&Host> {
        self.hosts.get(id)
    }

    pub fn host_mut(&mut self, id: &str) -> Option<&mut Host> {
        self.hosts.get_mut(id)
    }

    pub fn hosts(&self) -> impl Iterator<Item = &Host> {
        self.hosts.values()
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    pub fn credential(&self, id: &str) -> Option<&Credential> {
        self.credentials.get(id)
    }

    pub fn segment_of(&self, host_id: &str) -> Option<&str> {
        self.segments
            .iter()
            .find(|(_, members)| members.iter().any(|m| m == host_id))
            .map(|(segment, _)| segment.as_str())
    }

    /// Number of outbound edges, the most_connected selector input
    pub fn out_degree(&self, host_id: &str) -> usize {
        self.edges.iter().filter(|e| e.src == host_id).count()
    }

    /// Host ids reachable from `src` over edges satisfying every predicate.
    /// The source must be compromised, or be the external sentinel. Result
    /// order follows edge insertion order and is deduplicated.
    pub fn reachable_from(&self, src: &str, needs: &ReachabilityNeeds) -> Vec<String> {
        if src != EXTERNAL_HOST_ID {
            match self.hosts.get(src) {
                Some(host) if host.is_compromised => {}
                _ => return Vec::new(),
            }
        }
        let mut reachable = Vec::new();
        for edge in self.edges.iter().filter(|e| e.src == src) {
            if let Some(protocol) = needs.protocol {
                if !edge.protocols.contains(&protocol) {
                    continue;
                }
            }
            if edge.requires_credential && !self.credential_opens(&needs.held_credentials, &edge.dst)
            {
                continue;
            }
            if !reachable.iter().any(|h| h == &edge.dst) {
                reachable.push(edge.dst.clone());
            }
        }
        reachable
    }

    fn credential_opens(&self, held: &[String], dst: &str) -> bool {
        held.iter().any(|id| {
            self.credentials
                .get(id)
                .map(|c| !c.revoked && c.authorized_hosts.iter().any(|h| h == dst))
                .unwrap_or(false)
        })
    }

    /// Mark a host compromised at the given privilege. Privilege never
    /// degrades below a level already obtained.
    pub fn compromise(&mut self, host_id: &str, privilege: PrivilegeLevel) {
        if let Some(host) = self.hosts.get_mut(host_id) {
            host.is_compromised = true;
            if privilege > host.privilege_level {
                host.privilege_level = privilege;
            }
        }
    }

    /// Collect the credential cache of a compromised host, marking every
    /// cached credential compromised. Uncompromised hosts yield nothing.
    pub fn harvest_credentials(&mut self, host_id: &str) -> Vec<String> {
        let cached = match self.hosts.get_mut(host_id) {
            Some(host) if host.is_compromised => {
                host.has_credential_cache = !host.credential_ids.is_empty();
                host.credential_ids.clone()
            }
            _ => return Vec::new(),
        };
        let mut harvested = Vec::new();
        for id in cached {
            if let Some(credential) = self.credentials.get_mut(&id) {
                if !credential.revoked {
                    credential.compromised = true;
                    harvested.push(id);
                }
            }
        }
        harvested
    }

    /// Containment: drop every outbound edge of the host. Inbound edges stay
    /// so later attempts against it remain observable.
    pub fn isolate(&mut self, host_id: &str) {
        self.edges.retain(|e| e.src != host_id);
    }

    /// Invalidate a credential; revoked credentials no longer open edges and
    /// can no longer be harvested.
    pub fn revoke(&mut self, credential_id: &str) {
        if let Some(credential) = self.credentials.get_mut(credential_id) {
            credential.revoked = true;
            credential.compromised = false;
        }
    }
}

/// Segment layout of the reference 25-host corporate topology
const SEGMENT_EXTERNAL: &str = "external";
const SEGMENT_DMZ: &str = "dmz";
const SEGMENT_USER: &str = "user";
const SEGMENT_IT: &str = "it";
const SEGMENT_SERVER: &str = "server";
const SEGMENT_RESTRICTED: &str = "restricted";

/// Build the reference medium corporate network: 25 hosts across external,
/// dmz, user, it, server and restricted segments with the standard
/// reachability matrix.
pub fn corporate_medium() -> NetworkGraph {
    let mut spec = TopologySpec {
        segments: IndexMap::new(),
        hosts: Vec::new(),
        edges: Vec::new(),
    };

    // (id, os, role, segment, criticality)
    let host_table: Vec<(&str, OsTag, HostRole, &str, f64)> = vec![
        (EXTERNAL_HOST_ID, OsTag::NetworkAppliance, HostRole::Firewall, SEGMENT_EXTERNAL, 0.0),
        ("web-01", OsTag::Linux, HostRole::Dmz, SEGMENT_DMZ, 0.30),
        ("mail-01", OsTag::Linux, HostRole::Dmz, SEGMENT_DMZ, 0.20),
        ("vpn-01", OsTag::NetworkAppliance, HostRole::Dmz, SEGMENT_DMZ, 0.30),
        ("dns-01", OsTag::Linux, HostRole::Dmz, SEGMENT_DMZ, 0.10),
        ("ws-01", OsTag::Windows, HostRole::Workstation, SEGMENT_USER, 0.10),
        ("ws-02", OsTag::Windows, HostRole::Workstation, SEGMENT_USER, 0.15),
        ("ws-03", OsTag::Windows, HostRole::Workstation, SEGMENT_USER, 0.10),
        ("ws-04", OsTag::Windows, HostRole::Workstation, SEGMENT_USER, 0.20),
        ("ws-05", OsTag::Windows, HostRole::Workstation, SEGMENT_USER, 0.15),
        ("eng-ws-01", OsTag::Linux, HostRole::Workstation, SEGMENT_USER, 0.25),
        ("hr-ws-01", OsTag::Windows, HostRole::Workstation, SEGMENT_USER, 0.30),
        ("exec-ws-01", OsTag::Windows, HostRole::Workstation, SEGMENT_USER, 0.50),
        ("it-admin-01", OsTag::Windows, HostRole::Workstation, SEGMENT_IT, 0.45),
        ("it-admin-02", OsTag::Linux, HostRole::Workstation, SEGMENT_IT, 0.45),
        ("jump-01", OsTag::Linux, HostRole::Server, SEGMENT_IT, 0.50),
        ("dc-01", OsTag::Windows, HostRole::DomainController, SEGMENT_SERVER, 0.95),
        ("file-01", OsTag::Windows, HostRole::Server, SEGMENT_SERVER, 0.50),
        ("app-01", OsTag::Linux, HostRole::Server, SEGMENT_SERVER, 0.45),
        ("app-02", OsTag::Linux, HostRole::Server, SEGMENT_SERVER, 0.40),
        ("intranet-01", OsTag::Linux, HostRole::Server, SEGMENT_SERVER, 0.40),
        ("db-01", OsTag::Linux, HostRole::Database, SEGMENT_SERVER, 0.90),
        ("backup-01", OsTag::Linux, HostRole::Server, SEGMENT_SERVER, 0.90),
        ("hr-db-01", OsTag::Linux, HostRole::Database, SEGMENT_RESTRICTED, 0.95),
        ("fin-db-01", OsTag::Windows, HostRole::Database, SEGMENT_RESTRICTED, 0.92),
    ];

    for (id, os, role, segment, criticality) in &host_table {
        spec.segments
            .entry(segment.to_string())
            .or_default()
            .push(id.to_string());
        spec.hosts.push(HostSpec {
            id: id.to_string(),
            hostname: id.to_string(),
            os: *os,
            role: *role,
            criticality: *criticality,
            services: services_for(id),
            vulnerabilities: vulnerabilities_for(id),
            credentials: credentials_for(id),
        });
    }

    let segment_hosts = |segment: &str| -> Vec<String> {
        spec.segments
            .get(segment)
            .cloned()
            .unwrap_or_default()
    };
    let dmz = segment_hosts(SEGMENT_DMZ);
    let user = segment_hosts(SEGMENT_USER);
    let it = segment_hosts(SEGMENT_IT);
    let server = segment_hosts(SEGMENT_SERVER);
    let restricted = segment_hosts(SEGMENT_RESTRICTED);

    // external -> dmz on each host's exposed service ports
    for dst in &dmz {
        spec.edges.push(Edge {
            src: EXTERNAL_HOST_ID.to_string(),
            dst: dst.clone(),
            protocols: exposed_protocols_for(dst),
            requires_credential: false,
            crosses_segment: true,
        });
    }
    // user -> server via SMB / HTTP
    for src in &user {
        for dst in &server {
            spec.edges.push(Edge {
                src: src.clone(),
                dst: dst.clone(),
                protocols: vec![Protocol::Smb, Protocol::Http],
                requires_credential: false,
                crosses_segment: true,
            });
        }
    }
    // it -> user, server, restricted (dc included via server): the RDP/SSH
    // admin paths require a credential, SMB stays open
    for src in &it {
        for dst in user.iter().chain(server.iter()).chain(restricted.iter()) {
            spec.edges.push(Edge {
                src: src.clone(),
                dst: dst.clone(),
                protocols: vec![Protocol::Rdp, Protocol::Ssh],
                requires_credential: true,
                crosses_segment: true,
            });
            spec.edges.push(Edge {
                src: src.clone(),
                dst: dst.clone(),
                protocols: vec![Protocol::Smb],
                requires_credential: false,
                crosses_segment: true,
            });
        }
    }
    // server -> server all-pairs
    for src in &server {
        for dst in &server {
            if src != dst {
                spec.edges.push(Edge {
                    src: src.clone(),
                    dst: dst.clone(),
                    protocols: vec![Protocol::Smb, Protocol::Http, Protocol::Ssh],
                    requires_credential: false,
                    crosses_segment: false,
                });
            }
        }
    }
    // dc reachable from every internal segment via LDAP / Kerberos
    for src in dmz
        .iter()
        .chain(user.iter())
        .chain(it.iter())
        .chain(server.iter())
        .chain(restricted.iter())
    {
        if src != "dc-01" {
            let crosses = !server.iter().any(|h| h == src);
            spec.edges.push(Edge {
                src: src.clone(),
                dst: "dc-01".to_string(),
                protocols: vec![Protocol::Ldap, Protocol::Kerberos],
                requires_credential: false,
                crosses_segment: crosses,
            });
        }
    }

    NetworkGraph::from_spec(&spec).expect("reference topology is well formed")
}

fn services_for(host_id: &str) -> Vec<Service> {
    let service = |name: &str, port: u16, version: &str, exposed: bool| Service {
        name: name.to_string(),
        port,
        version: version.to_string(),
        exposed,
    };
    match host_id {
        "web-01" => vec![
            service("http", 80, "nginx/1.18.0", true),
            service("https", 443, "nginx/1.18.0", true),
        ],
        "mail-01" => vec![service("smtp", 25, "postfix/3.4.13", true)],
        "vpn-01" => vec![service("vpn", 1194, "openvpn/2.4.7", true)],
        "dns-01" => vec![service("dns", 53, "bind/9.16.1", true)],
        "dc-01" => vec![
            service("ldap", 389, "ad-ds", false),
            service("kerberos", 88, "ad-ds", false),
        ],
        "file-01" => vec![service("smb", 445, "samba/4.11.6", false)],
        "app-01" | "app-02" | "intranet-01" => {
            vec![service("http", 8080, "tomcat/9.0.31", false)]
        }
        "db-01" => vec![service("postgres", 5432, "postgresql/12.2", false)],
        "hr-db-01" => vec![service("postgres", 5432, "postgresql/12.2", false)],
        "fin-db-01" => vec![service("mssql", 1433, "sqlserver/2019", false)],
        "jump-01" => vec![service("ssh", 22, "openssh/8.2", false)],
        _ => Vec::new(),
    }
}

fn vulnerabilities_for(host_id: &str) -> Vec<Vulnerability> {
    let vuln = |cve: &str, cvss: f64, techniques: &[&str]| Vulnerability {
        cve_id: cve.to_string(),
        cvss,
        techniques_enabled: techniques.iter().map(|t| t.to_string()).collect(),
    };
    match host_id {
        "web-01" => vec![vuln("CVE-2021-41773", 9.8, &["T1190"])],
        "mail-01" => vec![vuln("CVE-2020-1147", 7.8, &["T1190"])],
        "vpn-01" => vec![vuln("CVE-2019-11510", 10.0, &["T1190", "T1133"])],
        "ws-01" | "ws-04" => vec![vuln("CVE-2021-1675", 8.8, &["T1068"])],
        "exec-ws-01" => vec![vuln("CVE-2021-34527", 8.8, &["T1068"])],
        "file-01" => vec![vuln("CVE-2020-0796", 10.0, &["T1068", "T1210"])],
        "app-01" => vec![vuln("CVE-2021-44228", 10.0, &["T1190", "T1210"])],
        "app-02" => vec![vuln("CVE-2017-0144", 9.3, &["T1210"])],
        "db-01" => vec![vuln("CVE-2019-9193", 9.0, &["T1210"])],
        "hr-db-01" => vec![vuln("CVE-2019-9193", 9.0, &["T1210"])],
        _ => Vec::new(),
    }
}

fn credentials_for(host_id: &str) -> Vec<Credential> {
    let cred = |id: &str, user: &str, hosts: &[&str], privilege: PrivilegeLevel| Credential {
        id: id.to_string(),
        username: user.to_string(),
        secret_ref: format!("vault://{}", id),
        authorized_hosts: hosts.iter().map(|h| h.to_string()).collect(),
        privilege,
        compromised: false,
        revoked: false,
    };
    match host_id {
        "ws-02" => vec![cred(
            "cred-alice",
            "alice",
            &["ws-02", "file-01", "intranet-01"],
            PrivilegeLevel::User,
        )],
        "ws-04" => vec![cred(
            "cred-bob",
            "bob",
            &["ws-04", "file-01"],
            PrivilegeLevel::User,
        )],
        "hr-ws-01" => vec![cred(
            "cred-hr-app",
            "hr-svc",
            &["hr-db-01"],
            PrivilegeLevel::User,
        )],
        "it-admin-01" => vec![cred(
            "cred-it-ops",
            "it-ops",
            &[
                "ws-01", "ws-02", "ws-03", "ws-04", "ws-05", "eng-ws-01", "hr-ws-01",
                "exec-ws-01", "file-01", "app-01", "app-02", "intranet-01", "jump-01",
                "hr-db-01", "fin-db-01",
            ],
            PrivilegeLevel::Admin,
        )],
        "it-admin-02" => vec![cred(
            "cred-dba",
            "dba",
            &["db-01", "fin-db-01", "hr-db-01"],
            PrivilegeLevel::Admin,
        )],
        "jump-01" => vec![cred(
            "cred-web-deploy",
            "deploy",
            &["web-01", "app-01", "app-02", "intranet-01"],
            PrivilegeLevel::User,
        )],
        "file-01" => vec![cred(
            "cred-svc-backup",
            "svc-backup",
            &["backup-01", "file-01"],
            PrivilegeLevel::Admin,
        )],
        "dc-01" => vec![cred(
            "cred-domain-admin",
            "da",
            &[
                "dc-01", "file-01", "app-01", "app-02", "intranet-01", "db-01",
                "backup-01", "hr-db-01", "fin-db-01",
            ],
            PrivilegeLevel::System,
        )],
        _ => Vec::new(),
    }
}

fn exposed_protocols_for(host_id: &str) -> Vec<Protocol> {
    match host_id {
        "web-01" => vec![Protocol::Http, Protocol::Https],
        "mail-01" => vec![Protocol::Smtp],
        "vpn-01" => vec![Protocol::Vpn],
        "dns-01" => vec![Protocol::Dns],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corporate_medium_has_25_hosts_in_six_segments() {
        let network = corporate_medium();
        assert_eq!(network.host_count(), 25);
        let spec = network.to_spec();
        assert_eq!(spec.segments.len(), 6);
        let total: usize = spec.segments.values().map(|m| m.len()).sum();
        assert_eq!(total, 25);
    }

    #[test]
    fn criticality_bands_hold() {
        let network = corporate_medium();
        for id in ["dc-01", "db-01", "hr-db-01", "backup-01"] {
            assert!(network.host(id).unwrap().criticality >= 0.9, "{}", id);
        }
        for id in ["app-01", "file-01", "exec-ws-01"] {
            let c = network.host(id).unwrap().criticality;
            assert!((0.4..=0.6).contains(&c), "{}", id);
        }
        for id in ["ws-01", "web-01", "dns-01"] {
            let c = network.host(id).unwrap().criticality;
            assert!((0.1..=0.3).contains(&c), "{}", id);
        }
    }

    #[test]
    fn external_reaches_exactly_the_dmz() {
        let network = corporate_medium();
        let mut reachable =
            network.reachable_from(EXTERNAL_HOST_ID, &ReachabilityNeeds::default());
        reachable.sort();
        assert_eq!(reachable, vec!["dns-01", "mail-01", "vpn-01", "web-01"]);
    }

    #[test]
    fn uncompromised_source_reaches_nothing() {
        let network = corporate_medium();
        assert!(network
            .reachable_from("ws-01", &ReachabilityNeeds::default())
            .is_empty());
    }

    #[test]
    fn user_reaches_servers_over_smb() {
        let mut network = corporate_medium();
        network.compromise("ws-01", PrivilegeLevel::User);
        let reachable = network.reachable_from(
            "ws-01",
            &ReachabilityNeeds {
                protocol: Some(Protocol::Smb),
                held_credentials: Vec::new(),
            },
        );
        assert!(reachable.iter().any(|h| h == "file-01"));
        assert!(reachable.iter().any(|h| h == "db-01"));
        // restricted hosts are only reachable from the it segment
        assert!(!reachable.iter().any(|h| h == "hr-db-01"));
    }

    #[test]
    fn admin_protocols_from_it_require_a_credential() {
        let mut network = corporate_medium();
        network.compromise("it-admin-01", PrivilegeLevel::Admin);
        let without_cred = network.reachable_from(
            "it-admin-01",
            &ReachabilityNeeds {
                protocol: Some(Protocol::Rdp),
                held_credentials: Vec::new(),
            },
        );
        assert!(without_cred.is_empty());
        let with_cred = network.reachable_from(
            "it-admin-01",
            &ReachabilityNeeds {
                protocol: Some(Protocol::Rdp),
                held_credentials: vec!["cred-it-ops".to_string()],
            },
        );
        assert!(with_cred.iter().any(|h| h == "hr-db-01"));
        assert!(with_cred.iter().any(|h| h == "fin-db-01"));
    }

    #[test]
    fn it_segment_reaches_the_fleet_over_uncredentialed_smb() {
        let mut network = corporate_medium();
        network.compromise("jump-01", PrivilegeLevel::User);
        let reachable = network.reachable_from(
            "jump-01",
            &ReachabilityNeeds {
                protocol: Some(Protocol::Smb),
                held_credentials: Vec::new(),
            },
        );
        assert!(reachable.iter().any(|h| h == "ws-01"));
        assert!(reachable.iter().any(|h| h == "file-01"));
        assert!(reachable.iter().any(|h| h == "hr-db-01"));
        // restricted stays reachable only from the it segment
        let mut elsewhere = corporate_medium();
        elsewhere.compromise("ws-01", PrivilegeLevel::User);
        let from_user = elsewhere.reachable_from("ws-01", &ReachabilityNeeds::default());
        assert!(!from_user.iter().any(|h| h == "hr-db-01"));
    }

    #[test]
    fn dc_is_reachable_from_dmz_over_ldap() {
        let mut network = corporate_medium();
        network.compromise("web-01", PrivilegeLevel::User);
        let reachable = network.reachable_from(
            "web-01",
            &ReachabilityNeeds {
                protocol: Some(Protocol::Ldap),
                held_credentials: Vec::new(),
            },
        );
        assert_eq!(reachable, vec!["dc-01".to_string()]);
    }

    #[test]
    fn clone_is_functionally_independent() {
        let original = corporate_medium();
        let mut clone = original.clone();
        clone.compromise("web-01", PrivilegeLevel::User);
        clone.harvest_credentials("web-01");
        clone.isolate("dc-01");
        clone.revoke("cred-alice");
        assert!(!original.host("web-01").unwrap().is_compromised);
        assert_eq!(
            original.host("web-01").unwrap().privilege_level,
            PrivilegeLevel::None
        );
        assert!(original.out_degree("dc-01") > 0);
        assert!(!original.credential("cred-alice").unwrap().revoked);
    }

    #[test]
    fn isolate_preserves_inbound_edges() {
        let mut network = corporate_medium();
        let inbound_before = network
            .edges
            .iter()
            .filter(|e| e.dst == "file-01")
            .count();
        network.isolate("file-01");
        assert_eq!(network.out_degree("file-01"), 0);
        let inbound_after = network
            .edges
            .iter()
            .filter(|e| e.dst == "file-01")
            .count();
        assert_eq!(inbound_before, inbound_after);
    }

    #[test]
    fn harvest_requires_compromise() {
        let mut network = corporate_medium();
        assert!(network.harvest_credentials("dc-01").is_empty());
        network.compromise("dc-01", PrivilegeLevel::System);
        let harvested = network.harvest_credentials("dc-01");
        assert_eq!(harvested, vec!["cred-domain-admin".to_string()]);
        assert!(network.credential("cred-domain-admin").unwrap().compromised);
        assert!(network.host("dc-01").unwrap().has_credential_cache);
    }

    #[test]
    fn revoked_credential_stops_opening_edges() {
        let mut network = corporate_medium();
        network.compromise("it-admin-01", PrivilegeLevel::Admin);
        network.revoke("cred-it-ops");
        let reachable = network.reachable_from(
            "it-admin-01",
            &ReachabilityNeeds {
                protocol: None,
                held_credentials: vec!["cred-it-ops".to_string()],
            },
        );
        assert!(!reachable.iter().any(|h| h == "hr-db-01"));
    }

    #[test]
    fn topology_load_clone_dump_is_byte_identity() {
        let network = corporate_medium();
        let spec = network.to_spec();
        let json = serde_json::to_string_pretty(&spec).unwrap();
        let reloaded: TopologySpec = serde_json::from_str(&json).unwrap();
        let graph = NetworkGraph::from_spec(&reloaded).unwrap();
        let dumped = serde_json::to_string_pretty(&graph.clone().to_spec()).unwrap();
        assert_eq!(json, dumped);
    }
}
