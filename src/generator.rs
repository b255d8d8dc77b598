use tracing::debug;

use crate::{
    config::{ManagedKey, SecretKind, TokenConfig},
    error::{Error, Result},
    jwt::{encode_token, Claims},
    random::SecureRandomSource,
    secrets::{generate_password, generate_signing_key},
};

/// A freshly generated value for one managed key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSecret {
    pub key: String,
    pub value: String,
}

/// Generate a value for every key in `keys`, keeping their order.
///
/// Passwords and the signing key are produced first; tokens are then signed
/// with that signing key and stamped with `issued_at`.
///
/// # Errors
/// Returns [`Error::Generation`] if the random source fails and
/// [`Error::Signing`] if a token is requested without a signing key entry.
pub fn generate_secrets(
    keys: &[ManagedKey],
    token: &TokenConfig,
    source: &dyn SecureRandomSource,
    issued_at: i64,
) -> Result<Vec<GeneratedSecret>> {
    let mut secrets = Vec::with_capacity(keys.len());
    let mut signing_key = None;

    for key in keys {
        // tokens are filled in below, once the signing key exists
        let value = match &key.secret {
            SecretKind::Password { length } => generate_password(source, *length)?,
            SecretKind::SigningKey => {
                let value = generate_signing_key(source)?;
                signing_key.get_or_insert_with(|| value.clone());
                value
            }
            SecretKind::Token { .. } => String::new(),
        };
        debug!("Generated value for {}", key.name);
        secrets.push(GeneratedSecret {
            key: key.name.clone(),
            value,
        });
    }

    for (secret, key) in secrets.iter_mut().zip(keys) {
        let SecretKind::Token { role } = &key.secret else {
            continue;
        };

        let hmac_key = signing_key.as_deref().ok_or_else(|| {
            Error::Signing(format!("no signing key configured for {}", key.name))
        })?;
        let claims = Claims::new(role, &token.issuer, issued_at, token.lifetime_seconds)?;
        secret.value = encode_token(hmac_key, &claims)?;
    }

    Ok(secrets)
}

/// `(key, value)` pairs in the shape [`crate::env_file::EnvFile::apply`] takes.
#[must_use]
pub fn replacements(secrets: &[GeneratedSecret]) -> Vec<(String, String)> {
    secrets
        .iter()
        .map(|secret| (secret.key.clone(), secret.value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use base64::{engine::general_purpose, Engine as _};
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

    use super::*;
    use crate::{config::Config, jwt::sign, random::OsRandomSource};

    fn issued_now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    #[test]
    fn test_default_plan() {
        let config = Config::default();
        let secrets = generate_secrets(&config.keys, &config.token, &OsRandomSource, issued_now())
            .expect("Failed to generate secrets");

        let keys: Vec<&str> = secrets.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(
            keys,
            [
                "POSTGRES_PASSWORD",
                "MINIO_ROOT_PASSWORD",
                "JWT_SECRET",
                "ANON_KEY",
                "SERVICE_ROLE_KEY"
            ]
        );

        assert_eq!(secrets[0].value.len(), 32);
        assert_eq!(secrets[1].value.len(), 32);
        assert_ne!(secrets[0].value, secrets[1].value);
        assert_eq!(
            general_purpose::STANDARD
                .decode(&secrets[2].value)
                .expect("JWT_SECRET is not base64")
                .len(),
            32
        );
    }

    #[test]
    fn test_tokens_are_signed_with_generated_secret() {
        let config = Config::default();
        let secrets = generate_secrets(&config.keys, &config.token, &OsRandomSource, issued_now())
            .expect("Failed to generate secrets");
        let jwt_secret = &secrets[2].value;

        for (secret, role) in secrets[3..].iter().zip(["anon", "service_role"]) {
            let data = decode::<Claims>(
                &secret.value,
                &DecodingKey::from_secret(jwt_secret.as_bytes()),
                &Validation::new(Algorithm::HS256),
            )
            .expect("Token failed verification");
            assert_eq!(data.claims.role, role);
            assert_eq!(data.claims.iss, "supabase");
        }
    }

    #[test]
    fn test_token_uses_configured_issuer_and_lifetime() {
        let keys = vec![
            ManagedKey::new(
                "READER",
                SecretKind::Token {
                    role: "reader".to_string(),
                },
            ),
            ManagedKey::new("SECRET", SecretKind::SigningKey),
        ];
        let token = TokenConfig {
            issuer: "acme".to_string(),
            lifetime_seconds: 60,
        };

        let secrets =
            generate_secrets(&keys, &token, &OsRandomSource, 1_000).expect("Failed to generate");

        let expected = encode_token(
            &secrets[1].value,
            &Claims::new("reader", "acme", 1_000, 60).expect("claims"),
        )
        .expect("Failed to encode");
        assert_eq!(secrets[0].value, expected);

        let (message, signature) = expected.rsplit_once('.').expect("signature");
        assert_eq!(sign(&secrets[1].value, message).expect("sign"), signature);
    }

    #[test]
    fn test_every_token_is_filled_in_any_order() {
        let token = |name: &str, role: &str| {
            ManagedKey::new(
                name,
                SecretKind::Token {
                    role: role.to_string(),
                },
            )
        };
        let keys = vec![
            token("FIRST", "a"),
            ManagedKey::new("PASSWORD", SecretKind::Password { length: 8 }),
            token("SECOND", "b"),
            ManagedKey::new("SECRET", SecretKind::SigningKey),
            token("THIRD", "c"),
        ];

        let secrets = generate_secrets(&keys, &TokenConfig::default(), &OsRandomSource, 0)
            .expect("Failed to generate");

        for index in [0, 2, 4] {
            assert_eq!(secrets[index].value.split('.').count(), 3, "{}", secrets[index].key);
        }
        assert_eq!(secrets[1].value.len(), 8);
    }

    #[test]
    fn test_token_without_signing_key() {
        let keys = vec![ManagedKey::new(
            "ANON_KEY",
            SecretKind::Token {
                role: "anon".to_string(),
            },
        )];
        let err = generate_secrets(&keys, &TokenConfig::default(), &OsRandomSource, 0).unwrap_err();
        assert!(matches!(err, Error::Signing(_)));
    }

    #[test]
    fn test_replacements_keep_order() {
        let secrets = vec![
            GeneratedSecret {
                key: "B".to_string(),
                value: "2".to_string(),
            },
            GeneratedSecret {
                key: "A".to_string(),
                value: "1".to_string(),
            },
        ];
        assert_eq!(
            replacements(&secrets),
            [
                ("B".to_string(), "2".to_string()),
                ("A".to_string(), "1".to_string())
            ]
        );
    }
}
