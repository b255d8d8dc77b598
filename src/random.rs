use std::process::Command;

use base64::{engine::general_purpose, Engine as _};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{Error, Result};

/// Anything that can hand out cryptographically secure random bytes.
pub trait SecureRandomSource {
    /// Returns exactly `count` fresh random bytes.
    fn random_bytes(&self, count: usize) -> Result<Vec<u8>>;
}

/// Which [`SecureRandomSource`] a run should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RandomSourceKind {
    /// The operating system CSPRNG
    #[default]
    Os,
    /// An external `<program> rand -base64 N` process (openssl compatible)
    Command,
}

impl RandomSourceKind {
    #[must_use]
    pub fn build(self, program: &str) -> Box<dyn SecureRandomSource> {
        match self {
            Self::Os => Box::new(OsRandomSource),
            Self::Command => Box::new(CommandRandomSource::new(program)),
        }
    }
}

/// Reads from the operating system random number generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandomSource;

impl SecureRandomSource for OsRandomSource {
    fn random_bytes(&self, count: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; count];
        OsRng
            .try_fill_bytes(&mut buf)
            .map_err(|e| Error::Generation(e.to_string()))?;
        Ok(buf)
    }
}

/// Shells out to `<command> rand -base64 <count>` and decodes its output.
///
/// `command` is split on whitespace, so leading arguments can be given
/// (e.g. `docker exec db openssl`). The call blocks until the process exits;
/// there is no timeout.
#[derive(Debug, Clone)]
pub struct CommandRandomSource {
    program: String,
    args: Vec<String>,
}

impl CommandRandomSource {
    #[must_use]
    pub fn new(command: impl AsRef<str>) -> Self {
        let mut words = command.as_ref().split_whitespace().map(str::to_string);
        Self {
            program: words.next().unwrap_or_default(),
            args: words.collect(),
        }
    }
}

impl Default for CommandRandomSource {
    fn default() -> Self {
        Self::new("openssl")
    }
}

impl SecureRandomSource for CommandRandomSource {
    fn random_bytes(&self, count: usize) -> Result<Vec<u8>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        trace!("Running {} rand -base64 {}", self.program, count);

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg("rand")
            .arg("-base64")
            .arg(count.to_string())
            .output()
            .map_err(|e| Error::Generation(format!("failed to run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Generation(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        // openssl wraps long base64 output over several lines
        let encoded: String = String::from_utf8_lossy(&output.stdout)
            .split_whitespace()
            .collect();

        let bytes = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| Error::Generation(format!("{} returned invalid base64: {e}", self.program)))?;

        if bytes.len() != count {
            return Err(Error::Generation(format!(
                "{} returned {} bytes, expected {count}",
                self.program,
                bytes.len()
            )));
        }

        Ok(bytes)
    }
}
