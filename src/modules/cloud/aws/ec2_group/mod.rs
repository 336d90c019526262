//! AWS EC2 security group reconciliation.
//!
//! Converges one security group, identified by name and VPC scope, to a
//! declared description and ingress rule list:
//!
//! - the group is created when absent,
//! - a description mismatch destroys and recreates the group, unless a
//!   running instance is attached to it, which fails the run untouched,
//! - every declared rule is authorized and every undeclared grant revoked.
//!
//! ### Parameters
//!
//! | Parameter | Required | Description |
//! |-----------|----------|-------------|
//! | `name` | Yes | Security group name |
//! | `description` | Yes | Security group description |
//! | `vpc_id` | No | VPC scope of the group |
//! | `rules` | No | Ingress rules; absent or empty revokes every rule |
//!
//! Each rule takes `proto` (`tcp`, `udp`, `icmp`, `all`), `from_port` and
//! `to_port` (ignored for `all`), and exactly one of `group_id` or `cidr_ip`.
//!
//! ### Example
//!
//! ```yaml
//! - name: Web tier firewall
//!   aws_ec2_group:
//!     name: web
//!     description: web servers
//!     vpc_id: vpc-123456
//!     rules:
//!       - proto: tcp
//!         from_port: 80
//!         to_port: 80
//!         cidr_ip: 0.0.0.0/0
//!       - proto: all
//!         group_id: sg-0a1b2c3d
//! ```

pub mod api;
pub mod apply;
pub mod differ;
pub mod guard;
pub mod locator;
pub mod rule;
#[cfg(feature = "aws")]
pub mod sdk;

pub use api::{
    Ec2Api, ExistingRule, GroupRef, InstanceMembership, Permission, PermissionSource,
    SecurityGroup,
};
pub use differ::{RuleAction, RuleDiff};
pub use rule::{Peer, Protocol, RuleIdentity, RuleSpec};

use crate::modules::{
    Diff, Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleResult, ParamExt,
};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Security group configuration parsed from module parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ec2GroupConfig {
    pub name: String,
    pub description: String,
    pub vpc_id: Option<String>,
    pub rules: Vec<RuleSpec>,
}

impl Ec2GroupConfig {
    /// Parse and validate every parameter, including the whole rule list.
    pub fn from_params(params: &ModuleParams) -> ModuleResult<Self> {
        let name = params.get_string_required("name")?;
        if name.trim().is_empty() {
            return Err(ModuleError::InvalidParameter(
                "name must not be empty".to_string(),
            ));
        }

        let rules = match params.get("rules") {
            None | Some(serde_json::Value::Null) => Vec::new(),
            Some(serde_json::Value::Array(values)) => RuleSpec::from_list(values)?,
            Some(_) => {
                return Err(ModuleError::InvalidParameter(
                    "rules must be a list".to_string(),
                ))
            }
        };

        Ok(Self {
            name,
            description: params.get_string_required("description")?,
            vpc_id: params.get_string("vpc_id")?,
            rules,
        })
    }
}

/// Where the target group stands relative to the desired description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupState {
    Absent,
    PresentMatch,
    PresentMismatch,
}

impl GroupState {
    pub fn classify(existing: Option<&SecurityGroup>, description: &str) -> Self {
        match existing {
            None => GroupState::Absent,
            Some(group) if group.description == description => GroupState::PresentMatch,
            Some(_) => GroupState::PresentMismatch,
        }
    }
}

/// Outcome of one reconciliation run
#[derive(Debug, Clone, Serialize)]
pub struct Reconciliation {
    pub changed: bool,
    /// Resolved group id; `None` when the group would be created in check mode
    pub group_id: Option<String>,
    pub state: GroupState,
    pub rules: RuleDiff,
    /// Grant identities before the run
    pub before: Vec<String>,
    /// Desired rule identities
    pub after: Vec<String>,
}

/// Converge the group described by `config`.
///
/// With `check_mode` set, the same reads, decisions and failures happen but
/// no create/delete/authorize/revoke call is made.
pub async fn reconcile(
    api: &dyn Ec2Api,
    config: &Ec2GroupConfig,
    check_mode: bool,
) -> ModuleResult<Reconciliation> {
    let groups = api.list_groups().await?;
    let located = locator::locate(groups, &config.name, config.vpc_id.as_deref());

    let state = GroupState::classify(located.group.as_ref(), &config.description);

    // Unknown peers fail the run before anything is mutated. A group that
    // is about to be recreated cannot name itself as a peer.
    let recreated = match (state, located.group.as_ref()) {
        (GroupState::PresentMismatch, Some(group)) => Some(group.group_id.as_str()),
        _ => None,
    };
    for rule in &config.rules {
        if let Peer::Group(id) = &rule.peer {
            if !located.index.contains(id) || recreated == Some(id.as_str()) {
                return Err(ModuleError::UnknownPeerGroup(id.clone()));
            }
        }
    }

    let before = located.group.as_ref().map(grant_identities).unwrap_or_default();
    let mut changed = false;

    let target = match (state, located.group) {
        (GroupState::PresentMatch, Some(group)) => Some(group),
        (_, existing) => {
            if let Some(group) = existing {
                let attached = guard::attached_instances(api, &group).await?;
                if !attached.is_empty() {
                    return Err(ModuleError::GroupInUse {
                        name: group.group_name.clone(),
                        group_id: group.group_id.clone(),
                        instances: attached.join(", "),
                    });
                }

                if !check_mode {
                    api.delete_group(&group).await?;
                    tracing::info!(
                        "Deleted security group '{}' ({}) to change its description",
                        group.group_name,
                        group.group_id
                    );
                }
            }

            changed = true;
            if check_mode {
                None
            } else {
                let group = api
                    .create_group(&config.name, &config.description, config.vpc_id.as_deref())
                    .await?;
                tracing::info!(
                    "Created security group '{}' ({}) in VPC {:?}",
                    group.group_name,
                    group.group_id,
                    group.vpc_id
                );
                Some(group)
            }
        }
    };

    let current = target
        .as_ref()
        .map(|group| group.ingress.as_slice())
        .unwrap_or_default();
    let rules = differ::diff_rules(current, &config.rules, &located.index)?;

    if !rules.is_empty() {
        changed = true;
        if let (Some(group), false) = (target.as_ref(), check_mode) {
            apply::apply(api, group, &rules).await?;
        }
    }

    let mut seen = HashSet::new();
    let after = config
        .rules
        .iter()
        .map(|rule| rule.identity())
        .filter(|identity| seen.insert(identity.clone()))
        .map(|identity| identity.to_string())
        .collect();

    Ok(Reconciliation {
        changed,
        group_id: target.map(|group| group.group_id),
        state,
        rules,
        before,
        after,
    })
}

fn grant_identities(group: &SecurityGroup) -> Vec<String> {
    group
        .ingress
        .iter()
        .flat_map(|rule| {
            rule.grants
                .iter()
                .map(move |grant| differ::grant_identity(rule, grant).to_string())
        })
        .collect()
}

/// AWS EC2 security group module
pub struct Ec2GroupModule {
    api: Arc<dyn Ec2Api>,
}

impl Ec2GroupModule {
    pub fn new(api: Arc<dyn Ec2Api>) -> Self {
        Self { api }
    }

    /// Execute the security group module
    pub async fn execute_async(
        &self,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let config = Ec2GroupConfig::from_params(params)?;
        let result = reconcile(self.api.as_ref(), &config, context.check_mode).await?;

        let msg = Self::message(&config, &result, context.check_mode);
        let mut output = if result.changed {
            ModuleOutput::changed(msg)
        } else {
            ModuleOutput::ok(msg)
        };

        output = output
            .with_data(
                "group_id",
                result
                    .group_id
                    .clone()
                    .map_or(serde_json::Value::Null, serde_json::Value::String),
            )
            .with_data("rules_added", serde_json::json!(result.rules.added()))
            .with_data("rules_removed", serde_json::json!(result.rules.removed()));

        if context.diff_mode {
            output = output.with_diff(
                Diff::new(result.before.join("\n"), result.after.join("\n")).with_details(
                    format!(
                        "+{} -{} ={}",
                        result.rules.add.len(),
                        result.rules.remove.len(),
                        result.rules.kept
                    ),
                ),
            );
        }

        Ok(output)
    }

    fn message(config: &Ec2GroupConfig, result: &Reconciliation, check_mode: bool) -> String {
        let id = result.group_id.as_deref().unwrap_or("new");
        let rules = format!(
            "{} rule(s) added, {} removed",
            result.rules.add.len(),
            result.rules.remove.len()
        );
        match (result.state, check_mode) {
            (GroupState::Absent, true) => {
                format!("Would create security group '{}' ({})", config.name, rules)
            }
            (GroupState::Absent, false) => {
                format!("Created security group '{}' ({}; {})", config.name, id, rules)
            }
            (GroupState::PresentMismatch, true) => format!(
                "Would recreate security group '{}' with a new description ({})",
                config.name, rules
            ),
            (GroupState::PresentMismatch, false) => format!(
                "Recreated security group '{}' ({}; {})",
                config.name, id, rules
            ),
            (GroupState::PresentMatch, _) if !result.changed => {
                format!("Security group '{}' ({}) is up to date", config.name, id)
            }
            (GroupState::PresentMatch, true) => {
                format!("Would update security group '{}' ({}; {})", config.name, id, rules)
            }
            (GroupState::PresentMatch, false) => {
                format!("Updated security group '{}' ({}; {})", config.name, id, rules)
            }
        }
    }
}

impl Module for Ec2GroupModule {
    fn name(&self) -> &'static str {
        "aws_ec2_group"
    }

    fn description(&self) -> &'static str {
        "Reconcile an AWS EC2 security group's description and ingress rules"
    }

    fn required_params(&self) -> &[&'static str] {
        &["name", "description"]
    }

    fn validate_params(&self, params: &ModuleParams) -> ModuleResult<()> {
        Ec2GroupConfig::from_params(params).map(|_| ())
    }

    fn execute(
        &self,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|_| ModuleError::ExecutionFailed("No tokio runtime available".to_string()))?;

        std::thread::scope(|s| {
            s.spawn(|| handle.block_on(self.execute_async(params, context)))
                .join()
                .unwrap_or_else(|_| {
                    Err(ModuleError::ExecutionFailed(
                        "Security group reconciliation panicked".to_string(),
                    ))
                })
        })
    }
}
