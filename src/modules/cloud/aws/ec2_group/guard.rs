//! Usage guard: is the candidate group attached to any running instance?
//!
//! Consulted before a destructive recreate. Only the candidate group's own
//! identity counts; memberships of other groups are irrelevant.

use super::api::{Ec2Api, GroupRef, InstanceMembership, SecurityGroup};
use crate::modules::ModuleResult;

/// Ids of running instances that reference `group`.
pub async fn attached_instances(
    api: &dyn Ec2Api,
    group: &SecurityGroup,
) -> ModuleResult<Vec<String>> {
    let instances = api.list_running_instances().await?;
    let attached = instances_using(group, &instances);

    tracing::debug!(
        "Security group {} is attached to {} of {} running instances",
        group.group_id,
        attached.len(),
        instances.len()
    );

    Ok(attached)
}

/// Ids of the instances in `instances` whose memberships include `group`.
pub fn instances_using(group: &SecurityGroup, instances: &[InstanceMembership]) -> Vec<String> {
    instances
        .iter()
        .filter(|instance| instance.groups.iter().any(|member| references(member, group)))
        .map(|instance| instance.instance_id.clone())
        .collect()
}

// Memberships are matched by id; name is only a fallback for references
// that carry no id.
fn references(member: &GroupRef, group: &SecurityGroup) -> bool {
    if member.group_id.is_empty() {
        member.group_name.as_deref() == Some(group.group_name.as_str())
    } else {
        member.group_id == group.group_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(id: &str, name: &str) -> SecurityGroup {
        SecurityGroup {
            group_id: id.to_string(),
            group_name: name.to_string(),
            description: String::new(),
            vpc_id: None,
            ingress: Vec::new(),
        }
    }

    fn instance(id: &str, groups: &[(&str, &str)]) -> InstanceMembership {
        InstanceMembership {
            instance_id: id.to_string(),
            groups: groups
                .iter()
                .map(|(gid, name)| GroupRef {
                    group_id: gid.to_string(),
                    group_name: Some(name.to_string()),
                })
                .collect(),
        }
    }

    #[test]
    fn test_attached_by_id() {
        let candidate = group("sg-web", "web");
        let instances = vec![
            instance("i-1", &[("sg-db", "db")]),
            instance("i-2", &[("sg-db", "db"), ("sg-web", "web")]),
        ];
        assert_eq!(instances_using(&candidate, &instances), vec!["i-2".to_string()]);
    }

    #[test]
    fn test_other_groups_do_not_count() {
        // Instances attached to unrelated groups, including one whose name is a
        // common marker, never make the candidate "in use".
        let candidate = group("sg-web", "web");
        let instances = vec![
            instance("i-1", &[("sg-0", "default")]),
            instance("i-2", &[("sg-db", "db")]),
        ];
        assert!(instances_using(&candidate, &instances).is_empty());
    }

    #[test]
    fn test_same_name_other_vpc_does_not_count() {
        let candidate = group("sg-web-a", "web");
        let instances = vec![instance("i-1", &[("sg-web-b", "web")])];
        assert!(instances_using(&candidate, &instances).is_empty());
    }

    #[test]
    fn test_name_fallback_without_id() {
        let candidate = group("sg-web", "web");
        let instances = vec![InstanceMembership {
            instance_id: "i-classic".to_string(),
            groups: vec![GroupRef {
                group_id: String::new(),
                group_name: Some("web".to_string()),
            }],
        }];
        assert_eq!(
            instances_using(&candidate, &instances),
            vec!["i-classic".to_string()]
        );
    }

    #[test]
    fn test_no_instances() {
        assert!(instances_using(&group("sg-web", "web"), &[]).is_empty());
    }
}
