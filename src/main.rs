//! sgsync - converge an EC2 security group to a declared rule set.
//!
//! This is the main entry point for the sgsync CLI.

use sgsync::cli::request::Request;
use sgsync::cli::Cli;
use sgsync::config::{Config, LogFormat, LoggingConfig};
use sgsync::modules::cloud::aws::ec2_group::sdk::SdkEc2Api;
use sgsync::modules::cloud::aws::ec2_group::{Ec2GroupConfig, Ec2GroupModule};
use sgsync::modules::{Module, ModuleOutput};
use sgsync::output;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> ExitCode {
    let cli = Cli::parse_args();

    if cli.no_color || std::env::var_os("NO_COLOR").is_some() {
        colored::control::set_override(false);
    }

    // Logging settings live in the configuration, so a broken config file is
    // reported through a subscriber built from `-v` alone.
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            init_logging(cli.verbosity(), &LoggingConfig::default());
            return fail(&cli, &err);
        }
    };
    init_logging(cli.verbosity(), &config.logging);

    match run(&cli, &config) {
        Ok(result) => {
            println!("{}", output::render_result(&result, cli.output));
            ExitCode::SUCCESS
        }
        Err(err) => fail(&cli, &err),
    }
}

fn fail(cli: &Cli, err: &sgsync::Error) -> ExitCode {
    tracing::error!("{}", err);
    println!("{}", output::render_failure(err, cli.output));
    if err.is_input_error() {
        ExitCode::from(2)
    } else {
        ExitCode::FAILURE
    }
}

fn run(cli: &Cli, config: &Config) -> sgsync::Result<ModuleOutput> {
    let request = Request::from_cli(cli, config)?;

    // Reject bad input before any client exists.
    Ec2GroupConfig::from_params(&request.params)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let api = runtime.block_on(SdkEc2Api::connect(
        request.aws.region.as_deref(),
        request.aws.profile.as_deref(),
        request.aws.endpoint_url.as_deref(),
    ))?;
    let module = Ec2GroupModule::new(Arc::new(api));
    tracing::info!("Running {}: {}", module.name(), module.description());

    let _guard = runtime.enter();
    Ok(module.run(&request.params, &request.context)?)
}

/// Initialize logging based on verbosity level and configuration.
///
/// `RUST_LOG` wins over the configured level, which wins over `-v`.
fn init_logging(verbosity: u8, logging: &LoggingConfig) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| match logging.level {
            Some(ref level) => EnvFilter::try_new(level),
            None => EnvFilter::try_new(filter),
        })
        .unwrap_or_else(|_| EnvFilter::new(filter));

    let registry = tracing_subscriber::registry().with(env_filter);
    match logging.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(verbosity >= 3)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}
