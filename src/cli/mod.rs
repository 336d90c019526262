//! CLI module for sgsync
//!
//! Argument parsing and the translation of a declarative request (flags,
//! payload file, configuration) into module parameters.

pub mod request;

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// sgsync - converge an EC2 security group to a declared rule set
///
/// Ensures the group exists with the given description, authorizes every
/// declared ingress rule and revokes every rule that is not declared.
#[derive(Parser, Debug, Clone)]
#[command(name = "sgsync")]
#[command(author = "Rustible Contributors")]
#[command(version)]
#[command(about = "Converge an EC2 security group to a declared rule set", long_about = None)]
pub struct Cli {
    /// Request payload (JSON or YAML) with name, description, vpc_id, rules
    #[arg(short = 'p', long = "params")]
    pub params: Option<PathBuf>,

    /// Security group name
    #[arg(long)]
    pub name: Option<String>,

    /// Security group description
    #[arg(long)]
    pub description: Option<String>,

    /// VPC the group belongs to
    #[arg(long = "vpc-id")]
    pub vpc_id: Option<String>,

    /// Ingress rule as JSON, e.g. '{"proto":"tcp","from_port":22,"to_port":22,"cidr_ip":"10.0.0.0/8"}'
    #[arg(long = "rule", action = clap::ArgAction::Append)]
    pub rules: Vec<String>,

    /// Run in check mode (dry-run, don't make changes)
    #[arg(long = "check")]
    pub check_mode: bool,

    /// Show the before/after rule sets
    #[arg(long = "diff")]
    pub diff_mode: bool,

    /// Output format
    #[arg(long, default_value = "human")]
    pub output: OutputFormat,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// AWS region
    #[arg(long)]
    pub region: Option<String>,

    /// AWS named profile
    #[arg(long)]
    pub profile: Option<String>,

    /// Custom EC2 endpoint URL
    #[arg(long = "endpoint-url")]
    pub endpoint_url: Option<String>,

    /// Path to configuration file
    #[arg(short = 'c', long, env = "SGSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output for scripting
    Json,
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-3)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }

    /// Check if JSON output is requested
    pub fn is_json(&self) -> bool {
        matches!(self.output, OutputFormat::Json)
    }
}
