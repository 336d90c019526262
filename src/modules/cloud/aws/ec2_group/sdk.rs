//! [`Ec2Api`] on top of the official AWS SDK.

use super::api::{
    Ec2Api, ExistingRule, GroupRef, InstanceMembership, Permission, PermissionSource,
    SecurityGroup,
};
use super::rule::{Peer, ALL_PROTOCOLS};
use crate::modules::{ModuleError, ModuleResult};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::error::CredentialsError;
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_ec2::types::{Filter, IpPermission, IpRange, UserIdGroupPair};
use aws_sdk_ec2::Client;

/// Error codes EC2 returns for rejected or missing credentials
const AUTH_ERROR_CODES: &[&str] = &[
    "AuthFailure",
    "UnauthorizedOperation",
    "InvalidClientTokenId",
    "SignatureDoesNotMatch",
    "ExpiredToken",
    "MissingAuthenticationToken",
];

/// EC2 client backed by `aws-sdk-ec2`
#[derive(Debug, Clone)]
pub struct SdkEc2Api {
    client: Client,
}

impl SdkEc2Api {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the standard AWS configuration chain. Every
    /// argument is passed to `aws-config` as is.
    pub async fn connect(
        region: Option<&str>,
        profile: Option<&str>,
        endpoint_url: Option<&str>,
    ) -> ModuleResult<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_sdk_ec2::config::Region::new(region.to_string()));
        }
        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }
        if let Some(endpoint_url) = endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }
        let config = loader.load().await;

        if config.region().is_none() {
            return Err(ModuleError::Connection(
                "no AWS region configured; set `region` or AWS_REGION".to_string(),
            ));
        }

        // The default chain is always installed; resolving it here surfaces
        // missing credentials before the first request.
        let provider = config.credentials_provider().ok_or_else(|| {
            ModuleError::Authentication("no AWS credentials provider configured".to_string())
        })?;
        provider
            .provide_credentials()
            .await
            .map_err(|e| credentials_error(&e))?;

        tracing::debug!("Using AWS region {:?}", config.region());
        Ok(Self::new(Client::new(&config)))
    }
}

fn credentials_error(err: &CredentialsError) -> ModuleError {
    ModuleError::Authentication(format!(
        "failed to load AWS credentials: {}",
        DisplayErrorContext(err)
    ))
}

// Identity resolution failures surface as dispatch or construction
// failures with a `CredentialsError` somewhere in the source chain.
fn caused_by_credentials(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<CredentialsError>() {
            return true;
        }
        current = e.source();
    }
    false
}

fn sdk_error<E, R>(action: &str, err: SdkError<E, R>) -> ModuleError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug + 'static,
{
    let message = format!("{}: {}", action, DisplayErrorContext(&err));
    if caused_by_credentials(&err) {
        return ModuleError::Authentication(message);
    }
    match &err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
            ModuleError::Connection(message)
        }
        _ if err.code().is_some_and(|code| AUTH_ERROR_CODES.contains(&code)) => {
            ModuleError::Authentication(message)
        }
        _ => ModuleError::ExecutionFailed(message),
    }
}

fn to_existing_rule(permission: &IpPermission) -> ExistingRule {
    let protocol = permission.ip_protocol().unwrap_or(ALL_PROTOCOLS).to_string();
    let (from_port, to_port) = if protocol == ALL_PROTOCOLS {
        (None, None)
    } else {
        (permission.from_port(), permission.to_port())
    };

    // IPv6 ranges and prefix lists cannot be declared, so they are not tracked.
    let grants = permission
        .user_id_group_pairs()
        .iter()
        .filter_map(|pair| pair.group_id().map(|id| Peer::Group(id.to_string())))
        .chain(
            permission
                .ip_ranges()
                .iter()
                .filter_map(|range| range.cidr_ip().map(|cidr| Peer::Cidr(cidr.to_string()))),
        )
        .collect();

    ExistingRule::new(protocol, from_port, to_port, grants)
}

fn to_ip_permission(permission: &Permission) -> IpPermission {
    let mut builder = IpPermission::builder()
        .ip_protocol(&permission.protocol)
        .set_from_port(permission.from_port)
        .set_to_port(permission.to_port);

    match &permission.source {
        PermissionSource::Cidr(cidr) => {
            builder = builder.ip_ranges(IpRange::builder().cidr_ip(cidr).build());
        }
        PermissionSource::Group(group) => {
            builder = builder.user_id_group_pairs(
                UserIdGroupPair::builder()
                    .group_id(&group.group_id)
                    .build(),
            );
        }
    }

    builder.build()
}

#[async_trait]
impl Ec2Api for SdkEc2Api {
    async fn list_groups(&self) -> ModuleResult<Vec<SecurityGroup>> {
        let mut pages = self.client.describe_security_groups().into_paginator().send();
        let mut groups = Vec::new();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| sdk_error("Failed to describe security groups", e))?;
            for sg in page.security_groups() {
                groups.push(SecurityGroup {
                    group_id: sg.group_id().unwrap_or_default().to_string(),
                    group_name: sg.group_name().unwrap_or_default().to_string(),
                    description: sg.description().unwrap_or_default().to_string(),
                    vpc_id: sg.vpc_id().map(|s| s.to_string()),
                    ingress: sg.ip_permissions().iter().map(to_existing_rule).collect(),
                });
            }
        }

        Ok(groups)
    }

    async fn list_running_instances(&self) -> ModuleResult<Vec<InstanceMembership>> {
        let mut pages = self
            .client
            .describe_instances()
            .filters(
                Filter::builder()
                    .name("instance-state-name")
                    .values("running")
                    .build(),
            )
            .into_paginator()
            .send();
        let mut instances = Vec::new();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| sdk_error("Failed to describe instances", e))?;
            for reservation in page.reservations() {
                for instance in reservation.instances() {
                    instances.push(InstanceMembership {
                        instance_id: instance.instance_id().unwrap_or_default().to_string(),
                        groups: instance
                            .security_groups()
                            .iter()
                            .map(|g| GroupRef {
                                group_id: g.group_id().unwrap_or_default().to_string(),
                                group_name: g.group_name().map(|s| s.to_string()),
                            })
                            .collect(),
                    });
                }
            }
        }

        Ok(instances)
    }

    async fn create_group(
        &self,
        name: &str,
        description: &str,
        vpc_id: Option<&str>,
    ) -> ModuleResult<SecurityGroup> {
        let resp = self
            .client
            .create_security_group()
            .group_name(name)
            .description(description)
            .set_vpc_id(vpc_id.map(String::from))
            .send()
            .await
            .map_err(|e| sdk_error("Failed to create security group", e))?;

        let group_id = resp.group_id().ok_or_else(|| {
            ModuleError::ExecutionFailed(format!(
                "CreateSecurityGroup returned no group id for '{}'",
                name
            ))
        })?;

        Ok(SecurityGroup {
            group_id: group_id.to_string(),
            group_name: name.to_string(),
            description: description.to_string(),
            vpc_id: vpc_id.map(String::from),
            ingress: Vec::new(),
        })
    }

    async fn delete_group(&self, group: &SecurityGroup) -> ModuleResult<()> {
        self.client
            .delete_security_group()
            .group_id(&group.group_id)
            .send()
            .await
            .map_err(|e| sdk_error("Failed to delete security group", e))?;
        Ok(())
    }

    async fn authorize(&self, group: &SecurityGroup, permission: &Permission) -> ModuleResult<()> {
        self.client
            .authorize_security_group_ingress()
            .group_id(&group.group_id)
            .ip_permissions(to_ip_permission(permission))
            .send()
            .await
            .map_err(|e| sdk_error("Failed to authorize ingress rule", e))?;
        Ok(())
    }

    async fn revoke(&self, group: &SecurityGroup, permission: &Permission) -> ModuleResult<()> {
        self.client
            .revoke_security_group_ingress()
            .group_id(&group.group_id)
            .ip_permissions(to_ip_permission(permission))
            .send()
            .await
            .map_err(|e| sdk_error("Failed to revoke ingress rule", e))?;
        Ok(())
    }
}
