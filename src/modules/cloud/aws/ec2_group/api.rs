//! Remote state model and the EC2 operations the reconciler depends on.
//!
//! The remote API is the only source of truth: nothing here is cached across
//! invocations, and there is no versioning between the read and the write
//! phase. A concurrent writer to the same group wins or loses at the API
//! level (last write wins).

use super::rule::Peer;
use crate::modules::ModuleResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// An ingress rule as reported by the API: one protocol/port range shared by
/// one or more grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingRule {
    pub protocol: String,
    pub from_port: Option<i32>,
    pub to_port: Option<i32>,
    pub grants: Vec<Peer>,
}

impl ExistingRule {
    pub fn new(
        protocol: impl Into<String>,
        from_port: Option<i32>,
        to_port: Option<i32>,
        grants: Vec<Peer>,
    ) -> Self {
        Self {
            protocol: protocol.into(),
            from_port,
            to_port,
            grants,
        }
    }
}

/// A security group visible to the account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub group_id: String,
    pub group_name: String,
    pub description: String,
    pub vpc_id: Option<String>,
    #[serde(default)]
    pub ingress: Vec<ExistingRule>,
}

impl SecurityGroup {
    /// Reference used when this group is the source of a permission
    pub fn group_ref(&self) -> GroupRef {
        GroupRef {
            group_id: self.group_id.clone(),
            group_name: Some(self.group_name.clone()),
        }
    }
}

/// A lightweight reference to a security group
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupRef {
    pub group_id: String,
    pub group_name: Option<String>,
}

/// Group memberships of one running instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceMembership {
    pub instance_id: String,
    pub groups: Vec<GroupRef>,
}

/// Source of a permission handed to authorize/revoke
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionSource {
    Cidr(String),
    Group(GroupRef),
}

/// A single (protocol, ports, source) grant, the unit of authorize/revoke
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub protocol: String,
    pub from_port: Option<i32>,
    pub to_port: Option<i32>,
    pub source: PermissionSource,
}

impl Permission {
    pub fn cidr_ip(&self) -> Option<&str> {
        match &self.source {
            PermissionSource::Cidr(cidr) => Some(cidr),
            PermissionSource::Group(_) => None,
        }
    }

    pub fn source_group(&self) -> Option<&GroupRef> {
        match &self.source {
            PermissionSource::Group(group) => Some(group),
            PermissionSource::Cidr(_) => None,
        }
    }
}

/// Remote EC2 operations used by the reconciler.
///
/// Every call is one blocking round trip from the reconciler's point of view;
/// implementations must not batch, retry or reorder.
#[async_trait]
pub trait Ec2Api: Send + Sync {
    /// All security groups visible to the account, with their ingress rules
    async fn list_groups(&self) -> ModuleResult<Vec<SecurityGroup>>;

    /// Every running instance with the groups attached to it
    async fn list_running_instances(&self) -> ModuleResult<Vec<InstanceMembership>>;

    async fn create_group(
        &self,
        name: &str,
        description: &str,
        vpc_id: Option<&str>,
    ) -> ModuleResult<SecurityGroup>;

    async fn delete_group(&self, group: &SecurityGroup) -> ModuleResult<()>;

    async fn authorize(&self, group: &SecurityGroup, permission: &Permission) -> ModuleResult<()>;

    async fn revoke(&self, group: &SecurityGroup, permission: &Permission) -> ModuleResult<()>;
}
