use std::path::Path;

use chrono::Utc;
use tracing::debug;

use crate::{
    cli::GenerateArgs,
    config::Config,
    env_file::{EnvFile, PatchReport},
    error::Result,
    generator::{generate_secrets, replacements, GeneratedSecret},
    random::SecureRandomSource,
};

/// What a generate run produced, for reporting.
#[derive(Debug)]
pub struct GenerateOutcome {
    pub secrets: Vec<GeneratedSecret>,
    pub report: PatchReport,
    pub written: bool,
}

pub fn handle_generate_command(config: &Config, args: GenerateArgs) -> Result<()> {
    let env_path = args.env_file.unwrap_or_else(|| config.env_file.clone());
    let random_source = args.random_source.unwrap_or(config.random_source);
    let source = random_source.build(&config.random_command);

    debug!("Using {:?} random source", random_source);
    println!("🔐 Generating secrets...");

    let outcome = generate_env_file(&env_path, config, source.as_ref(), args.dry_run)?;

    for secret in &outcome.secrets {
        println!("✓ Generated {}", secret.key);
    }

    for key in &outcome.report.missing {
        println!(
            "⚠️  {key} not found in {}, left unchanged",
            env_path.display()
        );
    }

    println!();
    if !outcome.written {
        println!(
            "🔎 Dry run: {} line(s) in {} would be updated, nothing was written",
            outcome.report.replaced.len(),
            env_path.display()
        );
        return Ok(());
    }

    println!("✓ Updated {}", env_path.display());
    println!();
    println!("Secrets have been generated and saved to {}", env_path.display());

    if !config.next_steps.is_empty() {
        println!();
        println!("Next steps:");
        for (number, step) in config.next_steps.iter().enumerate() {
            println!("  {}. {step}", number + 1);
        }
    }

    Ok(())
}

/// Read `path`, generate every managed secret and patch them in.
///
/// The file is read before anything is generated and written once at the
/// end, so any failure leaves it as it was.
///
/// # Errors
/// Propagates read, generation, signing and write errors unchanged.
pub fn generate_env_file(
    path: &Path,
    config: &Config,
    source: &dyn SecureRandomSource,
    dry_run: bool,
) -> Result<GenerateOutcome> {
    let mut env_file = EnvFile::read(path)?;

    let secrets = generate_secrets(&config.keys, &config.token, source, Utc::now().timestamp())?;
    let report = env_file.apply(&replacements(&secrets));

    for key in &report.missing {
        debug!("Managed key {} is not present in {}", key, path.display());
    }

    if !dry_run {
        env_file.write()?;
    }

    Ok(GenerateOutcome {
        secrets,
        report,
        written: !dry_run,
    })
}
