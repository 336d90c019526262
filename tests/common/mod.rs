//! Shared test utilities for sgsync integration tests.
//!
//! Provides an in-memory EC2 that records every call made against it and
//! applies mutations to its own state, so consecutive runs observe the
//! effects of earlier ones.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use sgsync::modules::cloud::aws::ec2_group::{
    Ec2Api, ExistingRule, GroupRef, InstanceMembership, Peer, Permission, PermissionSource,
    SecurityGroup,
};
use sgsync::modules::{ModuleError, ModuleParams, ModuleResult};

/// A call recorded by [`MockEc2`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListGroups,
    ListInstances,
    Create {
        name: String,
        description: String,
        vpc_id: Option<String>,
    },
    Delete(String),
    Authorize {
        group_id: String,
        permission: Permission,
    },
    Revoke {
        group_id: String,
        permission: Permission,
    },
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Call::ListGroups | Call::ListInstances)
    }
}

/// A mock EC2 endpoint for testing purposes.
///
/// # Example
///
/// ```rust,ignore
/// let ec2 = MockEc2::new();
/// ec2.add_group(group("sg-1", "web", "web servers", None, vec![]));
/// let result = reconcile(&ec2, &config, false).await.unwrap();
/// assert_eq!(ec2.mutation_count(), 0);
/// ```
#[derive(Debug, Default)]
pub struct MockEc2 {
    groups: RwLock<Vec<SecurityGroup>>,
    instances: RwLock<Vec<InstanceMembership>>,
    calls: RwLock<Vec<Call>>,
    fail_mutations_after: RwLock<Option<usize>>,
    next_id: AtomicU32,
}

impl MockEc2 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_group(&self, group: SecurityGroup) {
        self.groups.write().push(group);
    }

    /// Attach a running instance to the given group ids.
    pub fn add_instance(&self, instance_id: &str, group_ids: &[&str]) {
        let groups = group_ids
            .iter()
            .map(|id| GroupRef {
                group_id: id.to_string(),
                group_name: None,
            })
            .collect();
        self.instances.write().push(InstanceMembership {
            instance_id: instance_id.to_string(),
            groups,
        });
    }

    /// Reject every mutation after the first `n` succeed.
    pub fn fail_mutations_after(&self, n: usize) {
        *self.fail_mutations_after.write() = Some(n);
    }

    pub fn group(&self, group_id: &str) -> Option<SecurityGroup> {
        self.groups
            .read()
            .iter()
            .find(|g| g.group_id == group_id)
            .cloned()
    }

    pub fn groups_named(&self, name: &str) -> Vec<SecurityGroup> {
        self.groups
            .read()
            .iter()
            .filter(|g| g.group_name == name)
            .cloned()
            .collect()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.read().clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn mutation_count(&self) -> usize {
        self.mutations().len()
    }

    pub fn reset_calls(&self) {
        self.calls.write().clear();
    }

    fn record(&self, call: Call) -> ModuleResult<()> {
        let mutation = call.is_mutation();
        let mut calls = self.calls.write();
        if mutation {
            let done = calls.iter().filter(|c| c.is_mutation()).count();
            if let Some(limit) = *self.fail_mutations_after.read() {
                if done >= limit {
                    return Err(ModuleError::ExecutionFailed(format!(
                        "mock rejected {:?}",
                        call
                    )));
                }
            }
        }
        calls.push(call);
        Ok(())
    }

    fn with_group<T>(
        &self,
        group_id: &str,
        f: impl FnOnce(&mut SecurityGroup) -> ModuleResult<T>,
    ) -> ModuleResult<T> {
        let mut groups = self.groups.write();
        let group = groups
            .iter_mut()
            .find(|g| g.group_id == group_id)
            .ok_or_else(|| {
                ModuleError::ExecutionFailed(format!("InvalidGroup.NotFound: {}", group_id))
            })?;
        f(group)
    }
}

fn grant_of(permission: &Permission) -> Peer {
    match &permission.source {
        PermissionSource::Cidr(cidr) => Peer::Cidr(cidr.clone()),
        PermissionSource::Group(group) => Peer::Group(group.group_id.clone()),
    }
}

fn same_ports(rule: &ExistingRule, permission: &Permission) -> bool {
    rule.protocol == permission.protocol
        && rule.from_port == permission.from_port
        && rule.to_port == permission.to_port
}

#[async_trait]
impl Ec2Api for MockEc2 {
    async fn list_groups(&self) -> ModuleResult<Vec<SecurityGroup>> {
        self.record(Call::ListGroups)?;
        Ok(self.groups.read().clone())
    }

    async fn list_running_instances(&self) -> ModuleResult<Vec<InstanceMembership>> {
        self.record(Call::ListInstances)?;
        Ok(self.instances.read().clone())
    }

    async fn create_group(
        &self,
        name: &str,
        description: &str,
        vpc_id: Option<&str>,
    ) -> ModuleResult<SecurityGroup> {
        self.record(Call::Create {
            name: name.to_string(),
            description: description.to_string(),
            vpc_id: vpc_id.map(String::from),
        })?;

        let group = SecurityGroup {
            group_id: format!("sg-new{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
            group_name: name.to_string(),
            description: description.to_string(),
            vpc_id: vpc_id.map(String::from),
            ingress: Vec::new(),
        };
        self.groups.write().push(group.clone());
        Ok(group)
    }

    async fn delete_group(&self, group: &SecurityGroup) -> ModuleResult<()> {
        self.record(Call::Delete(group.group_id.clone()))?;
        self.groups.write().retain(|g| g.group_id != group.group_id);
        Ok(())
    }

    async fn authorize(&self, group: &SecurityGroup, permission: &Permission) -> ModuleResult<()> {
        self.record(Call::Authorize {
            group_id: group.group_id.clone(),
            permission: permission.clone(),
        })?;

        let grant = grant_of(permission);
        self.with_group(&group.group_id, |g| {
            match g.ingress.iter_mut().find(|r| same_ports(r, permission)) {
                Some(rule) if rule.grants.contains(&grant) => {
                    return Err(ModuleError::ExecutionFailed(
                        "InvalidPermission.Duplicate".to_string(),
                    ))
                }
                Some(rule) => rule.grants.push(grant),
                None => g.ingress.push(ExistingRule::new(
                    permission.protocol.clone(),
                    permission.from_port,
                    permission.to_port,
                    vec![grant],
                )),
            }
            Ok(())
        })
    }

    async fn revoke(&self, group: &SecurityGroup, permission: &Permission) -> ModuleResult<()> {
        self.record(Call::Revoke {
            group_id: group.group_id.clone(),
            permission: permission.clone(),
        })?;

        let grant = grant_of(permission);
        self.with_group(&group.group_id, |g| {
            let rule = g
                .ingress
                .iter_mut()
                .find(|r| same_ports(r, permission) && r.grants.contains(&grant))
                .ok_or_else(|| {
                    ModuleError::ExecutionFailed("InvalidPermission.NotFound".to_string())
                })?;
            rule.grants.retain(|existing| existing != &grant);
            g.ingress.retain(|r| !r.grants.is_empty());
            Ok(())
        })
    }
}

// ============================================================================
// Builders
// ============================================================================

pub fn group(
    id: &str,
    name: &str,
    description: &str,
    vpc_id: Option<&str>,
    ingress: Vec<ExistingRule>,
) -> SecurityGroup {
    SecurityGroup {
        group_id: id.to_string(),
        group_name: name.to_string(),
        description: description.to_string(),
        vpc_id: vpc_id.map(String::from),
        ingress,
    }
}

pub fn tcp_cidr(port: i32, cidr: &str) -> ExistingRule {
    ExistingRule::new("tcp", Some(port), Some(port), vec![Peer::Cidr(cidr.to_string())])
}

pub fn params(value: serde_json::Value) -> ModuleParams {
    serde_json::from_value(value).expect("params must be a JSON object")
}
