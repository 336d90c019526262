//! # sgsync - Declarative EC2 Security Group Reconciliation
//!
//! sgsync converges a single EC2 security group, identified by name and
//! optional VPC, to a declared description and list of ingress rules. It
//! reports whether anything changed and the resolved group id.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │            CLI / request payload / configuration             │
//! └──────────────────────────────────────────────────────────────┘
//!                               │ ModuleParams
//!                               ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      aws_ec2_group module                     │
//! │  locate ─▶ description state machine ─▶ diff ─▶ apply         │
//! │              (usage guard before destroy)                     │
//! └──────────────────────────────────────────────────────────────┘
//!                               │ Ec2Api
//!                               ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    aws-sdk-ec2 (feature `aws`)                │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use sgsync::prelude::*;
//! use std::sync::Arc;
//!
//! let api = SdkEc2Api::connect(Some("eu-west-1"), None, None).await?;
//! let module = Ec2GroupModule::new(Arc::new(api));
//! let params: ModuleParams = serde_json::from_value(serde_json::json!({
//!     "name": "web",
//!     "description": "web servers",
//!     "rules": [{"proto": "tcp", "from_port": 443, "to_port": 443, "cidr_ip": "0.0.0.0/0"}]
//! }))?;
//! let output = module.execute_async(&params, &ModuleContext::new()).await?;
//! println!("changed={} group_id={}", output.changed, output.data["group_id"]);
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::error::{Error, Result};
    pub use crate::modules::cloud::aws::ec2_group::{
        reconcile, Ec2Api, Ec2GroupConfig, Ec2GroupModule, Peer, Protocol, Reconciliation,
        RuleSpec, SecurityGroup,
    };
    #[cfg(feature = "aws")]
    pub use crate::modules::cloud::aws::ec2_group::sdk::SdkEc2Api;
    pub use crate::modules::{Module, ModuleContext, ModuleOutput, ModuleParams};
}

/// Error types and result aliases.
pub mod error;

/// Module system and the security group module.
pub mod modules;

/// Configuration loading and merging.
pub mod config;

/// Command-line interface and request loading.
pub mod cli;

/// Result rendering.
pub mod output;

pub use error::{Error, Result};
