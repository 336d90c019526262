//! Desired rule specifications and the canonical rule identity.
//!
//! A [`RuleSpec`] is the validated form of one entry of the module's `rules`
//! parameter. The peer selector is a sum type, so a rule naming both a peer
//! group and a CIDR block (or neither) cannot be constructed.
//!
//! [`RuleIdentity`] is the comparison key shared by desired rules and the
//! grants of existing rules. Two permissions are the same iff their
//! identities are equal: exact field equality after `all` normalization, no
//! subnet containment and no protocol aliasing.

use crate::modules::{ModuleError, ModuleResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol token the EC2 API uses for "all traffic".
pub const ALL_PROTOCOLS: &str = "-1";

/// IP protocol accepted in a desired rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
    /// Every protocol; ports are ignored
    All,
}

impl Protocol {
    pub fn from_str(s: &str) -> ModuleResult<Self> {
        match s.to_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            "icmp" => Ok(Protocol::Icmp),
            "all" | ALL_PROTOCOLS => Ok(Protocol::All),
            _ => Err(ModuleError::InvalidParameter(format!(
                "Invalid protocol '{}'. Valid protocols: tcp, udp, icmp, all",
                s
            ))),
        }
    }

    /// Token sent to and reported by the remote API
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Icmp => "icmp",
            Protocol::All => ALL_PROTOCOLS,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source a permission is granted to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Peer {
    /// Another security group, by id
    Group(String),
    /// An IPv4 CIDR block
    Cidr(String),
}

impl Peer {
    pub fn group_id(&self) -> Option<&str> {
        match self {
            Peer::Group(id) => Some(id),
            Peer::Cidr(_) => None,
        }
    }

    pub fn cidr_ip(&self) -> Option<&str> {
        match self {
            Peer::Cidr(cidr) => Some(cidr),
            Peer::Group(_) => None,
        }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Peer::Group(id) => write!(f, "group={}", id),
            Peer::Cidr(cidr) => write!(f, "cidr={}", cidr),
        }
    }
}

/// Rule direction. Only ingress rules are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ingress,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Ingress => "ingress",
        }
    }
}

/// Canonical identity of a single permission
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleIdentity {
    pub direction: Direction,
    pub protocol: String,
    pub from_port: Option<i32>,
    pub to_port: Option<i32>,
    pub peer: Peer,
}

impl RuleIdentity {
    /// Build the identity from already-normalized fields.
    ///
    /// No normalization happens here: callers map `all` to [`ALL_PROTOCOLS`]
    /// with no ports before encoding.
    pub fn encode(
        direction: Direction,
        protocol: impl Into<String>,
        from_port: Option<i32>,
        to_port: Option<i32>,
        peer: Peer,
    ) -> Self {
        Self {
            direction,
            protocol: protocol.into(),
            from_port,
            to_port,
            peer,
        }
    }
}

impl fmt::Display for RuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ports = match (self.from_port, self.to_port) {
            (None, None) => "any".to_string(),
            (from, to) => format!(
                "{}-{}",
                from.map_or_else(|| "*".to_string(), |p| p.to_string()),
                to.map_or_else(|| "*".to_string(), |p| p.to_string())
            ),
        };
        write!(
            f,
            "{} {} {} {}",
            self.direction.as_str(),
            self.protocol,
            ports,
            self.peer
        )
    }
}

/// A validated desired ingress rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleSpec {
    pub protocol: Protocol,
    pub from_port: Option<i32>,
    pub to_port: Option<i32>,
    pub peer: Peer,
}

/// Wire shape of one `rules` entry
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRuleSpec {
    #[serde(alias = "protocol")]
    proto: String,
    from_port: Option<i64>,
    to_port: Option<i64>,
    group_id: Option<String>,
    cidr_ip: Option<String>,
}

impl RuleSpec {
    pub fn new(protocol: Protocol, from_port: Option<i32>, to_port: Option<i32>, peer: Peer) -> Self {
        Self {
            protocol,
            from_port,
            to_port,
            peer,
        }
    }

    /// Parse and validate one entry of the `rules` parameter.
    pub fn from_value(value: &serde_json::Value) -> ModuleResult<Self> {
        let raw: RawRuleSpec = serde_json::from_value(value.clone())
            .map_err(|e| ModuleError::InvalidParameter(format!("Invalid rule {}: {}", value, e)))?;

        let protocol = Protocol::from_str(&raw.proto)?;

        let group_id = non_empty("group_id", raw.group_id)?;
        let cidr_ip = non_empty("cidr_ip", raw.cidr_ip)?;
        let peer = match (group_id, cidr_ip) {
            (Some(group_id), None) => Peer::Group(group_id),
            (None, Some(cidr_ip)) => Peer::Cidr(cidr_ip),
            (Some(_), Some(_)) => {
                return Err(ModuleError::ConflictingRule(format!(
                    "rule {} specifies both group_id and cidr_ip",
                    value
                )))
            }
            (None, None) => {
                return Err(ModuleError::ConflictingRule(format!(
                    "rule {} specifies neither group_id nor cidr_ip",
                    value
                )))
            }
        };

        let (from_port, to_port) = if protocol == Protocol::All {
            (None, None)
        } else {
            let from_port = port("from_port", raw.from_port)?;
            let to_port = port("to_port", raw.to_port)?;
            validate_ports(protocol, from_port, to_port)?;
            (Some(from_port), Some(to_port))
        };

        Ok(Self::new(protocol, from_port, to_port, peer))
    }

    /// Parse the whole `rules` list; the first invalid entry fails the list.
    pub fn from_list(values: &[serde_json::Value]) -> ModuleResult<Vec<Self>> {
        values.iter().map(Self::from_value).collect()
    }

    /// Ports as compared and sent to the API; `all` has no port restriction.
    pub fn ports(&self) -> (Option<i32>, Option<i32>) {
        match self.protocol {
            Protocol::All => (None, None),
            _ => (self.from_port, self.to_port),
        }
    }

    pub fn identity(&self) -> RuleIdentity {
        let (from_port, to_port) = self.ports();
        RuleIdentity::encode(
            Direction::Ingress,
            self.protocol.as_str(),
            from_port,
            to_port,
            self.peer.clone(),
        )
    }
}

fn non_empty(key: &str, value: Option<String>) -> ModuleResult<Option<String>> {
    match value {
        Some(s) if s.trim().is_empty() => Err(ModuleError::InvalidParameter(format!(
            "{} must not be empty",
            key
        ))),
        other => Ok(other),
    }
}

fn port(key: &str, value: Option<i64>) -> ModuleResult<i32> {
    let value = value.ok_or_else(|| {
        ModuleError::MissingParameter(format!("{} is required unless proto is 'all'", key))
    })?;
    i32::try_from(value)
        .map_err(|_| ModuleError::InvalidParameter(format!("{} out of range: {}", key, value)))
}

fn validate_ports(protocol: Protocol, from_port: i32, to_port: i32) -> ModuleResult<()> {
    match protocol {
        Protocol::Tcp | Protocol::Udp => {
            if !(0..=65535).contains(&from_port) || !(0..=65535).contains(&to_port) {
                return Err(ModuleError::InvalidParameter(format!(
                    "{} ports must be within 0-65535, got {}-{}",
                    protocol, from_port, to_port
                )));
            }
            if from_port > to_port {
                return Err(ModuleError::InvalidParameter(format!(
                    "from_port {} is greater than to_port {}",
                    from_port, to_port
                )));
            }
        }
        // ICMP carries type and code in the port fields; -1 means any
        Protocol::Icmp => {
            if !(-1..=255).contains(&from_port) || !(-1..=255).contains(&to_port) {
                return Err(ModuleError::InvalidParameter(format!(
                    "icmp type/code must be within -1-255, got {}/{}",
                    from_port, to_port
                )));
            }
        }
        Protocol::All => {}
    }
    Ok(())
}
