//! Finds the target group among all account-visible groups and indexes every
//! group by id for peer resolution.

use super::api::{GroupRef, PermissionSource, SecurityGroup};
use super::rule::Peer;
use crate::modules::{ModuleError, ModuleResult};
use std::collections::HashMap;

/// Every account-visible group, keyed by group id
#[derive(Debug, Clone, Default)]
pub struct GroupIndex {
    groups: HashMap<String, SecurityGroup>,
}

impl GroupIndex {
    pub fn get(&self, group_id: &str) -> Option<&SecurityGroup> {
        self.groups.get(group_id)
    }

    pub fn contains(&self, group_id: &str) -> bool {
        self.groups.contains_key(group_id)
    }

    /// Resolve a desired rule's peer. Peer groups must be visible to the account.
    pub fn resolve(&self, peer: &Peer) -> ModuleResult<PermissionSource> {
        match peer {
            Peer::Cidr(cidr) => Ok(PermissionSource::Cidr(cidr.clone())),
            Peer::Group(id) => self
                .get(id)
                .map(|group| PermissionSource::Group(group.group_ref()))
                .ok_or_else(|| ModuleError::UnknownPeerGroup(id.clone())),
        }
    }

    /// Resolve the peer of an existing grant. Grants may name groups outside
    /// the account (cross-account peering), which are passed on by id only.
    pub fn resolve_grant(&self, peer: &Peer) -> PermissionSource {
        match peer {
            Peer::Cidr(cidr) => PermissionSource::Cidr(cidr.clone()),
            Peer::Group(id) => PermissionSource::Group(
                self.get(id).map(SecurityGroup::group_ref).unwrap_or(GroupRef {
                    group_id: id.clone(),
                    group_name: None,
                }),
            ),
        }
    }
}

/// Outcome of scanning the account's groups
#[derive(Debug, Clone)]
pub struct Located {
    /// First group matching the desired name and VPC scope
    pub group: Option<SecurityGroup>,
    pub index: GroupIndex,
}

/// Scan `groups` once, returning the first group whose name and VPC scope both
/// match, plus the id index of all groups.
///
/// When several groups match, listing order decides and a warning names the
/// ignored candidates.
pub fn locate(groups: Vec<SecurityGroup>, name: &str, vpc_id: Option<&str>) -> Located {
    let mut matched: Option<SecurityGroup> = None;
    let mut ignored = Vec::new();
    let mut index = HashMap::with_capacity(groups.len());

    for group in groups {
        if group.group_name == name && group.vpc_id.as_deref() == vpc_id {
            if matched.is_none() {
                matched = Some(group.clone());
            } else {
                ignored.push(group.group_id.clone());
            }
        }
        index.insert(group.group_id.clone(), group);
    }

    if let Some(ref group) = matched {
        if !ignored.is_empty() {
            tracing::warn!(
                "{} security groups named '{}' in VPC {:?}; using {} and ignoring {}",
                ignored.len() + 1,
                name,
                vpc_id,
                group.group_id,
                ignored.join(", ")
            );
        }
    }

    tracing::debug!(
        "Indexed {} security groups, target '{}' {}",
        index.len(),
        name,
        matched
            .as_ref()
            .map_or_else(|| "not found".to_string(), |g| format!("is {}", g.group_id))
    );

    Located {
        group: matched,
        index: GroupIndex { groups: index },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(id: &str, name: &str, vpc_id: Option<&str>) -> SecurityGroup {
        SecurityGroup {
            group_id: id.to_string(),
            group_name: name.to_string(),
            description: format!("{} group", name),
            vpc_id: vpc_id.map(String::from),
            ingress: Vec::new(),
        }
    }

    #[test]
    fn test_locate_matches_name_and_vpc() {
        let located = locate(
            vec![
                group("sg-1", "web", Some("vpc-a")),
                group("sg-2", "web", Some("vpc-b")),
                group("sg-3", "db", Some("vpc-b")),
            ],
            "web",
            Some("vpc-b"),
        );

        assert_eq!(located.group.unwrap().group_id, "sg-2");
        assert!(["sg-1", "sg-2", "sg-3"]
            .iter()
            .all(|id| located.index.contains(id)));
    }

    #[test]
    fn test_locate_vpc_scope_must_match_exactly() {
        let located = locate(vec![group("sg-1", "web", Some("vpc-a"))], "web", None);
        assert!(located.group.is_none());
    }

    #[test]
    fn test_locate_absent_still_builds_index() {
        let located = locate(
            vec![group("sg-1", "db", None), group("sg-2", "cache", None)],
            "web",
            None,
        );

        assert!(located.group.is_none());
        assert!(located.index.contains("sg-1"));
        assert!(located.index.contains("sg-2"));
    }

    #[test]
    fn test_locate_duplicates_first_wins() {
        let located = locate(
            vec![
                group("sg-9", "web", None),
                group("sg-1", "web", None),
            ],
            "web",
            None,
        );
        assert_eq!(located.group.unwrap().group_id, "sg-9");
    }

    #[test]
    fn test_resolve_peer() {
        let located = locate(vec![group("sg-1", "db", None)], "web", None);

        let source = located.index.resolve(&Peer::Group("sg-1".to_string())).unwrap();
        assert_eq!(
            source,
            PermissionSource::Group(GroupRef {
                group_id: "sg-1".to_string(),
                group_name: Some("db".to_string()),
            })
        );

        let err = located
            .index
            .resolve(&Peer::Group("sg-404".to_string()))
            .unwrap_err();
        assert!(matches!(err, ModuleError::UnknownPeerGroup(id) if id == "sg-404"));
    }

    #[test]
    fn test_resolve_grant_unknown_group_by_id() {
        let located = locate(Vec::new(), "web", None);
        let source = located.index.resolve_grant(&Peer::Group("sg-x".to_string()));
        assert_eq!(
            source,
            PermissionSource::Group(GroupRef {
                group_id: "sg-x".to_string(),
                group_name: None,
            })
        );
    }
}
