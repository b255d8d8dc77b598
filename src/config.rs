use std::{collections::HashSet, path::PathBuf, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::{
    error::{Error, Result},
    jwt::{DEFAULT_ISSUER, DEFAULT_LIFETIME_SECONDS},
    random::RandomSourceKind,
};

static KEY_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid key name regex"));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The env file to patch
    #[serde(default = "default_env_file")]
    pub env_file: PathBuf,
    #[serde(default)]
    pub random_source: RandomSourceKind,
    /// Program used when `random_source` is `command`
    #[serde(default = "default_random_command")]
    pub random_command: String,
    #[serde(default)]
    pub token: TokenConfig,
    /// Managed keys, in the order lines are checked against them
    #[serde(default = "default_keys")]
    pub keys: Vec<ManagedKey>,
    /// Printed after a successful run
    #[serde(default = "default_next_steps")]
    pub next_steps: Vec<String>,
    #[serde(default)]
    pub tracing: TracingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            env_file: default_env_file(),
            random_source: RandomSourceKind::default(),
            random_command: default_random_command(),
            token: TokenConfig::default(),
            keys: default_keys(),
            next_steps: default_next_steps(),
            tracing: TracingConfig::default(),
        }
    }
}

impl Config {
    /// Check field constraints and the consistency of the managed key set.
    ///
    /// # Errors
    /// Returns [`Error::Validation`] for malformed fields and
    /// [`Error::InvalidConfig`] for an inconsistent key set.
    pub fn validate(&self) -> Result<()> {
        self.token.validate()?;

        let mut seen = HashSet::new();
        for key in &self.keys {
            key.validate()?;
            if !seen.insert(key.name.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "key {} is listed more than once",
                    key.name
                )));
            }
        }

        let signing_keys = self
            .keys
            .iter()
            .filter(|key| matches!(key.secret, SecretKind::SigningKey))
            .count();
        if signing_keys > 1 {
            return Err(Error::InvalidConfig(
                "only one signing_key entry is allowed".to_string(),
            ));
        }

        let has_tokens = self
            .keys
            .iter()
            .any(|key| matches!(key.secret, SecretKind::Token { .. }));
        if has_tokens && signing_keys == 0 {
            return Err(Error::InvalidConfig(
                "token entries need a signing_key entry".to_string(),
            ));
        }

        Ok(())
    }

    /// Name of the key holding the signing secret, if one is managed.
    #[must_use]
    pub fn signing_key_name(&self) -> Option<&str> {
        self.keys
            .iter()
            .find(|key| matches!(key.secret, SecretKind::SigningKey))
            .map(|key| key.name.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TokenConfig {
    #[serde(default = "default_issuer")]
    #[validate(length(min = 1))]
    pub issuer: String,
    #[serde(default = "default_lifetime_seconds")]
    #[validate(range(min = 1))]
    pub lifetime_seconds: i64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            issuer: default_issuer(),
            lifetime_seconds: default_lifetime_seconds(),
        }
    }
}

/// A key whose value is regenerated on every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ManagedKey {
    #[validate(custom(function = "validate_key_name"))]
    pub name: String,
    #[validate(custom(function = "validate_secret_kind"))]
    pub secret: SecretKind,
}

impl ManagedKey {
    #[must_use]
    pub fn new(name: impl Into<String>, secret: SecretKind) -> Self {
        Self {
            name: name.into(),
            secret,
        }
    }
}

/// How the value of a managed key is produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SecretKind {
    /// Random alphanumeric password
    Password { length: usize },
    /// Base64 encoded 256-bit HMAC key
    SigningKey,
    /// HS256 token for `role`, signed with the signing key
    Token { role: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracingConfig {
    pub log_level: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
        }
    }
}

fn validate_key_name(name: &str) -> std::result::Result<(), ValidationError> {
    if KEY_NAME.is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::new("key_name"))
    }
}

fn validate_secret_kind(secret: &SecretKind) -> std::result::Result<(), ValidationError> {
    match secret {
        SecretKind::Password { length } if !(1..=1024).contains(length) => {
            Err(ValidationError::new("password_length"))
        }
        SecretKind::Token { role } if role.is_empty() => Err(ValidationError::new("token_role")),
        _ => Ok(()),
    }
}

fn default_env_file() -> PathBuf {
    PathBuf::from("docker/.env")
}

fn default_random_command() -> String {
    "openssl".to_string()
}

fn default_issuer() -> String {
    DEFAULT_ISSUER.to_string()
}

const fn default_lifetime_seconds() -> i64 {
    DEFAULT_LIFETIME_SECONDS
}

fn default_keys() -> Vec<ManagedKey> {
    vec![
        ManagedKey::new("POSTGRES_PASSWORD", SecretKind::Password { length: 32 }),
        ManagedKey::new("MINIO_ROOT_PASSWORD", SecretKind::Password { length: 32 }),
        ManagedKey::new("JWT_SECRET", SecretKind::SigningKey),
        ManagedKey::new(
            "ANON_KEY",
            SecretKind::Token {
                role: "anon".to_string(),
            },
        ),
        ManagedKey::new(
            "SERVICE_ROLE_KEY",
            SecretKind::Token {
                role: "service_role".to_string(),
            },
        ),
    ]
}

fn default_next_steps() -> Vec<String> {
    vec![
        "Install Docker Desktop from: https://www.docker.com/products/docker-desktop/".to_string(),
        "Start Docker Desktop".to_string(),
        "Run: cd docker && ./start.sh".to_string(),
    ]
}
