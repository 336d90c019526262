//! Computes the minimal add/remove set between a group's current ingress
//! grants and the desired rule list.

use super::api::{ExistingRule, Permission, PermissionSource};
use super::locator::GroupIndex;
use super::rule::{Direction, Peer, RuleIdentity, RuleSpec};
use crate::modules::ModuleResult;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashSet;

/// One permission to authorize or revoke
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleAction {
    pub identity: RuleIdentity,
    pub permission: Permission,
}

/// Actions needed to converge a group's ingress rules
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleDiff {
    pub add: Vec<RuleAction>,
    pub remove: Vec<RuleAction>,
    /// Desired rules already present
    pub kept: usize,
}

impl RuleDiff {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }

    pub fn added(&self) -> Vec<String> {
        self.add.iter().map(|a| a.identity.to_string()).collect()
    }

    pub fn removed(&self) -> Vec<String> {
        self.remove.iter().map(|a| a.identity.to_string()).collect()
    }
}

/// Identity of one grant of an existing ingress rule
pub fn grant_identity(rule: &ExistingRule, grant: &Peer) -> RuleIdentity {
    RuleIdentity::encode(
        Direction::Ingress,
        rule.protocol.clone(),
        rule.from_port,
        rule.to_port,
        grant.clone(),
    )
}

/// Diff `current` against `desired`.
///
/// Every grant of every current rule is one lookup entry. Each desired rule
/// claims the entry with its identity; unclaimed desired rules become adds
/// and unclaimed entries become removes. Removes keep the API's listing
/// order. Repeated desired rules are claimed once.
pub fn diff_rules(
    current: &[ExistingRule],
    desired: &[RuleSpec],
    index: &GroupIndex,
) -> ModuleResult<RuleDiff> {
    let mut lookup: IndexMap<RuleIdentity, Permission> = IndexMap::new();
    for rule in current {
        for grant in &rule.grants {
            lookup.insert(
                grant_identity(rule, grant),
                Permission {
                    protocol: rule.protocol.clone(),
                    from_port: rule.from_port,
                    to_port: rule.to_port,
                    source: index.resolve_grant(grant),
                },
            );
        }
    }

    let mut diff = RuleDiff::default();
    let mut claimed = HashSet::new();

    for spec in desired {
        let identity = spec.identity();
        if !claimed.insert(identity.clone()) {
            continue;
        }

        if lookup.shift_remove(&identity).is_some() {
            diff.kept += 1;
            continue;
        }

        let (from_port, to_port) = spec.ports();
        let source: PermissionSource = index.resolve(&spec.peer)?;
        diff.add.push(RuleAction {
            identity,
            permission: Permission {
                protocol: spec.protocol.as_str().to_string(),
                from_port,
                to_port,
                source,
            },
        });
    }

    diff.remove = lookup
        .into_iter()
        .map(|(identity, permission)| RuleAction {
            identity,
            permission,
        })
        .collect();

    tracing::debug!(
        "Rule diff: {} to add, {} to remove, {} unchanged",
        diff.add.len(),
        diff.remove.len(),
        diff.kept
    );

    Ok(diff)
}
