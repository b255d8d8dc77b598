use chrono::Utc;
use tracing::debug;

use crate::{
    cli::TokenArgs,
    config::Config,
    env_file::EnvFile,
    error::{Error, Result},
    jwt::{encode_token, Claims},
};

pub fn handle_token_command(config: &Config, args: &TokenArgs) -> Result<()> {
    let token = mint_token(config, args, Utc::now().timestamp())?;
    println!("{token}");
    Ok(())
}

/// Build a token for `args.role`, signed with `--secret` or, failing that,
/// with the signing key currently stored in the env file.
///
/// # Errors
/// Returns [`Error::MissingSigningKey`] when no secret can be found, and
/// [`Error::Signing`] if signing fails.
pub fn mint_token(config: &Config, args: &TokenArgs, issued_at: i64) -> Result<String> {
    let lifetime_seconds = args.lifetime.unwrap_or(config.token.lifetime_seconds);
    if lifetime_seconds <= 0 {
        return Err(Error::InvalidConfig(format!(
            "token lifetime must be positive, got {lifetime_seconds}"
        )));
    }

    let secret = match &args.secret {
        Some(secret) => secret.clone(),
        None => read_signing_key(config, args)?,
    };

    let claims = Claims::new(
        &args.role,
        &config.token.issuer,
        issued_at,
        lifetime_seconds,
    )?;
    encode_token(&secret, &claims)
}

fn read_signing_key(config: &Config, args: &TokenArgs) -> Result<String> {
    let key = config
        .signing_key_name()
        .ok_or_else(|| Error::InvalidConfig("no signing_key entry configured".to_string()))?;
    let path = args.env_file.as_ref().unwrap_or(&config.env_file);

    debug!("Reading {} from {}", key, path.display());

    EnvFile::read(path)?
        .get(key)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::MissingSigningKey(key.to_string()))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;
    use crate::jwt::sign;

    const SECRET: &str = "super-secret-jwt-token-with-at-least-32-characters-long";

    fn args(secret: Option<&str>) -> TokenArgs {
        TokenArgs {
            role: "anon".to_string(),
            secret: secret.map(str::to_string),
            lifetime: None,
            env_file: None,
        }
    }

    #[test]
    fn test_mint_with_explicit_secret() {
        let token = mint_token(&Config::default(), &args(Some(SECRET)), 1_700_000_000)
            .expect("Failed to mint token");

        assert_eq!(
            token,
            "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9\
             .eyJyb2xlIjoiYW5vbiIsImlzcyI6InN1cGFiYXNlIiwiaWF0IjoxNzAwMDAwMDAwLCJleHAiOjIwMTUzNjAwMDB9\
             .lSLWbT0tQMEVxlQ1li0NyVomdwgfjyCahaJFft4g6Nk"
        );
    }

    #[test]
    fn test_mint_reads_secret_from_env_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, format!("A=1\nJWT_SECRET={SECRET}\n")).unwrap();

        let mut args = args(None);
        args.env_file = Some(path);
        let token = mint_token(&Config::default(), &args, 1_700_000_000).expect("mint");

        let (message, signature) = token.rsplit_once('.').expect("signature");
        assert_eq!(sign(SECRET, message).expect("sign"), signature);
    }

    #[test]
    fn test_mint_unquotes_secret_from_env_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, format!("JWT_SECRET=\"{SECRET}\"  \n")).unwrap();

        let explicit =
            mint_token(&Config::default(), &args(Some(SECRET)), 1_700_000_000).expect("mint");

        let mut args = args(None);
        args.env_file = Some(path);
        let from_file = mint_token(&Config::default(), &args, 1_700_000_000).expect("mint");

        assert_eq!(from_file, explicit);
    }

    #[test]
    fn test_mint_without_secret_in_env_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "JWT_SECRET=\n").unwrap();

        let mut args = args(None);
        args.env_file = Some(path);
        let err = mint_token(&Config::default(), &args, 0).unwrap_err();

        assert!(matches!(err, Error::MissingSigningKey(key) if key == "JWT_SECRET"));
    }

    #[test]
    fn test_mint_rejects_non_positive_lifetime() {
        let mut args = args(Some(SECRET));
        args.lifetime = Some(0);
        let err = mint_token(&Config::default(), &args, 0).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_mint_with_empty_secret() {
        let err = mint_token(&Config::default(), &args(Some("")), 0).unwrap_err();
        assert!(matches!(err, Error::Signing(_)));
    }
}
