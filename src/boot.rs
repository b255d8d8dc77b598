use std::{env, process, str::FromStr as _};

use clap::Parser as _;
use config_rs::Config as ConfigRs;
use tracing::{debug, trace};

use crate::{
    cli::{Cli, Commands},
    commands::{generate, token, version},
    config::Config,
    environment::Environment,
    error::Result,
    setup_tracing::setup_tracing_for_command,
};

const ENVIRONMENT_VARIABLE: &str = "ENVFORGE_ENVIRONMENT";
const ENVIRONMENT_PREFIX: &str = "ENVFORGE";

/// Parse the command line, load configuration and run the requested command.
///
/// Any error is reported on stderr and terminates the process with status 1.
pub fn boot() {
    let cli = Cli::parse();

    if matches!(cli.command, Some(Commands::Version)) {
        version::print_version_info();
        return;
    }

    let environment = set_environment();

    let config = match read_config(environment) {
        Ok(config) => config,
        Err(e) => exit_with_error(&e),
    };

    setup_tracing_for_command(&cli.command, &config.tracing.log_level);

    debug!("Environment set to: {:?}", environment);
    trace!("Configuration loaded: {:?}", config);

    if let Err(e) = handle_command(&config, cli) {
        exit_with_error(&e);
    }
}

#[must_use]
pub fn set_environment() -> Environment {
    env::var(ENVIRONMENT_VARIABLE)
        .ok()
        .and_then(|s| Environment::from_str(&s).ok())
        .unwrap_or_default()
}

/// Layer `config/{environment}` (optional) and `ENVFORGE_*` variables over
/// the built-in defaults, then validate the result.
///
/// # Errors
/// Returns [`crate::error::Error::Config`] for unreadable sources and a
/// validation error for an inconsistent configuration.
pub fn read_config(environment: Environment) -> Result<Config> {
    let config_file_name = environment.config_file_name();

    trace!("Reading configuration from: {}", config_file_name);

    let config: Config = ConfigRs::builder()
        .add_source(config_rs::File::with_name(&config_file_name).required(false))
        .add_source(
            config_rs::Environment::with_prefix(ENVIRONMENT_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    config.validate()?;
    Ok(config)
}

pub fn handle_command(config: &Config, cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Generate(args)) => generate::handle_generate_command(config, args),
        None => generate::handle_generate_command(config, Default::default()),
        Some(Commands::Token(args)) => token::handle_token_command(config, &args),
        Some(Commands::Version) => {
            version::print_version_info();
            Ok(())
        }
    }
}

fn exit_with_error(error: &crate::error::Error) -> ! {
    eprintln!("❌ {error}");
    process::exit(1);
}
