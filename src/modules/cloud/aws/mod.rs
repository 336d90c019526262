//! AWS (Amazon Web Services) modules for cloud infrastructure management.
//!
//! ## Available Modules
//!
//! - [`Ec2GroupModule`](ec2_group::Ec2GroupModule): security group ingress reconciliation
//!
//! ## Authentication
//!
//! AWS credentials are loaded by `aws-config` from the standard credential chain
//! (environment, `~/.aws/credentials`, instance profile, ECS task role). Region,
//! profile and endpoint overrides come from sgsync's configuration layer and are
//! handed to the SDK verbatim.

pub mod ec2_group;

pub use ec2_group::Ec2GroupModule;
