//! Executes a computed rule diff against the remote API.

use super::api::{Ec2Api, SecurityGroup};
use super::differ::RuleDiff;
use crate::modules::ModuleResult;

/// Authorize every add, then revoke every remove, one call per grant.
///
/// The first failing call aborts the run. Calls that already succeeded are
/// not rolled back; re-running converges the rest.
pub async fn apply(api: &dyn Ec2Api, group: &SecurityGroup, diff: &RuleDiff) -> ModuleResult<()> {
    for action in &diff.add {
        api.authorize(group, &action.permission).await?;
        tracing::info!("Authorized {} on {}", action.identity, group.group_id);
    }

    for action in &diff.remove {
        api.revoke(group, &action.permission).await?;
        tracing::info!("Revoked {} on {}", action.identity, group.group_id);
    }

    Ok(())
}
