//! Cloud provider modules for infrastructure provisioning.
//!
//! - **AWS**: EC2 security group reconciliation (`aws_ec2_group`)
//!
//! ## Feature Flags
//!
//! The reconciliation core is always available. The AWS SDK backed remote
//! client is gated behind the `aws` feature (enabled by default).
//!
//! ## Example
//!
//! ```yaml
//! - name: Web tier firewall
//!   aws_ec2_group:
//!     name: web
//!     description: web servers
//!     vpc_id: vpc-123456
//!     rules:
//!       - proto: tcp
//!         from_port: 443
//!         to_port: 443
//!         cidr_ip: 0.0.0.0/0
//! ```

pub mod aws;
