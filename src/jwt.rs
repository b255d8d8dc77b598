use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{Error, Result};

/// Issuer written into every token unless configured otherwise.
pub const DEFAULT_ISSUER: &str = "supabase";

/// Ten years, in seconds.
pub const DEFAULT_LIFETIME_SECONDS: i64 = 315_360_000;

type HmacSha256 = Hmac<Sha256>;

/// JOSE header. Field order is part of the signed bytes.
#[derive(Debug, Serialize)]
struct Header {
    alg: &'static str,
    typ: &'static str,
}

const HEADER: Header = Header {
    alg: "HS256",
    typ: "JWT",
};

/// JWT claims structure for API keys.
///
/// Serialized in declaration order with no whitespace, which keeps the
/// encoded payload (and therefore the signature) reproducible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Database role the key grants (e.g. `anon`, `service_role`)
    pub role: String,
    /// Issuer
    pub iss: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Build claims valid from `issued_at` for `lifetime_seconds`.
    ///
    /// # Errors
    /// Returns [`Error::Signing`] if the expiry does not fit in an `i64`.
    pub fn new(
        role: impl Into<String>,
        issuer: impl Into<String>,
        issued_at: i64,
        lifetime_seconds: i64,
    ) -> Result<Self> {
        let exp = issued_at
            .checked_add(lifetime_seconds)
            .ok_or_else(|| Error::Signing("token expiry overflows".to_string()))?;

        Ok(Self {
            role: role.into(),
            iss: issuer.into(),
            iat: issued_at,
            exp,
        })
    }
}

/// Build an HS256 token for `role`, issued now by [`DEFAULT_ISSUER`].
///
/// # Errors
/// Returns [`Error::Signing`] if the signing key is empty.
pub fn build_token(signing_key: &str, role: &str, lifetime_seconds: i64) -> Result<String> {
    let claims = Claims::new(
        role,
        DEFAULT_ISSUER,
        Utc::now().timestamp(),
        lifetime_seconds,
    )?;
    encode_token(signing_key, &claims)
}

/// Encode and sign `claims` as `header.payload.signature`.
///
/// The HMAC key is the UTF-8 bytes of `signing_key` as written to the env
/// file, not its base64-decoded form.
///
/// # Errors
/// Returns [`Error::Signing`] if the signing key is empty or the claims cannot
/// be serialized.
pub fn encode_token(signing_key: &str, claims: &Claims) -> Result<String> {
    if signing_key.is_empty() {
        return Err(Error::Signing("signing key is empty".to_string()));
    }

    let header = encode_segment(&HEADER)?;
    let payload = encode_segment(claims)?;
    let message = format!("{header}.{payload}");
    let signature = sign(signing_key, &message)?;

    Ok(format!("{message}.{signature}"))
}

/// HMAC-SHA256 of `message`, base64url encoded without padding.
///
/// # Errors
/// Returns [`Error::Signing`] if the key is rejected by the MAC.
pub fn sign(signing_key: &str, message: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(signing_key.as_bytes())
        .map_err(|e| Error::Signing(e.to_string()))?;
    mac.update(message.as_bytes());
    Ok(general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
}

fn encode_segment<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_vec(value).map_err(|e| Error::Signing(e.to_string()))?;
    Ok(general_purpose::URL_SAFE_NO_PAD.encode(json))
}
