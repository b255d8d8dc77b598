use base64::{engine::general_purpose, Engine as _};

use crate::{
    error::{Error, Result},
    random::SecureRandomSource,
};

/// Number of random bytes behind a signing key (256 bits).
pub const SIGNING_KEY_BYTES: usize = 32;

/// Consecutive draws without a single usable character before giving up.
const MAX_EMPTY_DRAWS: usize = 8;

/// Generate a random password of exactly `length` characters.
///
/// Draws at least `ceil(length * 4 / 3)` bytes from `source`, base64 encodes
/// them and drops `=`, `+` and `/` so the result is safe to paste into shell
/// commands and `.env` files. If stripping leaves the string short, more bytes
/// are drawn until it is long enough.
///
/// # Errors
/// Returns [`Error::Generation`] if the random source fails, or keeps
/// producing output with no usable characters.
pub fn generate_password(source: &dyn SecureRandomSource, length: usize) -> Result<String> {
    let mut password = String::with_capacity(length);
    let mut empty_draws = 0;

    while password.len() < length {
        let remaining = length - password.len();
        let bytes = source.random_bytes((remaining * 4).div_ceil(3))?;
        let before = password.len();

        password.extend(
            general_purpose::STANDARD
                .encode(bytes)
                .chars()
                .filter(|c| !matches!(c, '=' | '+' | '/')),
        );

        if password.len() == before {
            empty_draws += 1;
            if empty_draws >= MAX_EMPTY_DRAWS {
                return Err(Error::Generation(
                    "random source produced no usable characters".to_string(),
                ));
            }
        } else {
            empty_draws = 0;
        }
    }

    password.truncate(length);
    Ok(password)
}

/// Generate a base64 encoded 256-bit key for HS256 signing.
///
/// The padding is kept, so the result is always 44 characters long.
///
/// # Errors
/// Returns [`Error::Generation`] if the random source fails.
pub fn generate_signing_key(source: &dyn SecureRandomSource) -> Result<String> {
    let bytes = source.random_bytes(SIGNING_KEY_BYTES)?;
    Ok(general_purpose::STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::random::OsRandomSource;

    /// Hands out scripted byte batches, then falls back to a fixed pattern.
    struct ScriptedSource {
        batches: RefCell<Vec<Vec<u8>>>,
        requests: RefCell<Vec<usize>>,
    }

    impl ScriptedSource {
        fn new(batches: Vec<Vec<u8>>) -> Self {
            Self {
                batches: RefCell::new(batches),
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl SecureRandomSource for ScriptedSource {
        fn random_bytes(&self, count: usize) -> Result<Vec<u8>> {
            self.requests.borrow_mut().push(count);
            let mut batches = self.batches.borrow_mut();
            if batches.is_empty() {
                Ok(vec![0x01; count])
            } else {
                Ok(batches.remove(0))
            }
        }
    }

    struct BrokenSource;

    impl SecureRandomSource for BrokenSource {
        fn random_bytes(&self, _count: usize) -> Result<Vec<u8>> {
            Err(Error::Generation("no entropy".to_string()))
        }
    }

    fn is_password_char(c: char) -> bool {
        c.is_ascii_alphanumeric()
    }

    #[test]
    fn test_generate_password_length() {
        for length in 1..=64 {
            let password =
                generate_password(&OsRandomSource, length).expect("Failed to generate password");
            assert_eq!(password.len(), length);
            assert!(password.chars().all(is_password_char), "{password}");
        }
    }

    #[test]
    fn test_generate_password_randomness() {
        let first = generate_password(&OsRandomSource, 32).expect("Failed to generate password");
        let second = generate_password(&OsRandomSource, 32).expect("Failed to generate password");
        assert_ne!(first, second);
    }

    #[test]
    fn test_generate_password_requests_enough_bytes() {
        let source = ScriptedSource::new(Vec::new());
        generate_password(&source, 32).expect("Failed to generate password");
        assert_eq!(source.requests.borrow()[0], 43);
    }

    #[test]
    fn test_generate_password_refills_after_stripping() {
        // 0xfb 0xff 0xbf encodes to "+/+/", so the first batch only yields "AQID"
        let mut first = [0xfb, 0xff, 0xbf].repeat(4);
        first.extend([1, 2, 3]);
        let source = ScriptedSource::new(vec![first]);

        let password = generate_password(&source, 8).expect("Failed to generate password");

        assert_eq!(password.len(), 8);
        assert!(password.starts_with("AQID"));
        assert_eq!(source.requests.borrow().len(), 2);
    }

    #[test]
    fn test_generate_password_gives_up_on_unusable_source() {
        let source = ScriptedSource::new(vec![vec![0xfb, 0xff, 0xbf]; MAX_EMPTY_DRAWS]);
        let err = generate_password(&source, 4).unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
    }

    #[test]
    fn test_generate_password_zero_length() {
        let source = ScriptedSource::new(Vec::new());
        assert_eq!(generate_password(&source, 0).expect("empty password"), "");
        assert!(source.requests.borrow().is_empty());
    }

    #[test]
    fn test_generate_password_propagates_source_failure() {
        let err = generate_password(&BrokenSource, 16).unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
    }

    #[test]
    fn test_generate_signing_key_decodes_to_32_bytes() {
        let key = generate_signing_key(&OsRandomSource).expect("Failed to generate signing key");
        assert_eq!(key.len(), 44);
        let decoded = general_purpose::STANDARD
            .decode(&key)
            .expect("Signing key is not base64");
        assert_eq!(decoded.len(), SIGNING_KEY_BYTES);
    }

    #[test]
    fn test_generate_signing_key_randomness() {
        let first = generate_signing_key(&OsRandomSource).expect("Failed to generate signing key");
        let second = generate_signing_key(&OsRandomSource).expect("Failed to generate signing key");
        assert_ne!(first, second);
    }

    #[test]
    fn test_generate_signing_key_propagates_source_failure() {
        assert!(matches!(
            generate_signing_key(&BrokenSource),
            Err(Error::Generation(_))
        ));
    }
}
