use std::{
    fs,
    io::{self, Write as _},
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;
use tracing::{debug, trace};

use crate::error::{Error, Result};

/// How a line ended in the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
    /// Last line of a file without a trailing newline
    None,
}

impl LineEnding {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
            Self::None => "",
        }
    }
}

/// A single line of the env file, without its terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLine {
    pub text: String,
    pub ending: LineEnding,
}

impl ConfigLine {
    fn key_value(&self) -> Option<(&str, &str)> {
        self.text.split_once('=')
    }
}

/// Outcome of [`EnvFile::apply`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchReport {
    /// Keys whose line was rewritten, in file order
    pub replaced: Vec<String>,
    /// Keys with a replacement but no matching line; nothing was added for them
    pub missing: Vec<String>,
}

/// An env file held in memory as an ordered list of lines.
#[derive(Debug, Clone)]
pub struct EnvFile {
    path: PathBuf,
    lines: Vec<ConfigLine>,
}

impl EnvFile {
    /// Read the whole file at `path`.
    ///
    /// # Errors
    /// Returns [`Error::Read`] if the file is missing or unreadable.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let content = fs::read_to_string(&path).map_err(|source| Error::Read {
            path: path.clone(),
            source,
        })?;

        let env_file = Self::parse(path, &content);
        trace!(
            "Read {} lines from {}",
            env_file.lines.len(),
            env_file.path.display()
        );
        Ok(env_file)
    }

    #[must_use]
    pub fn parse(path: impl Into<PathBuf>, content: &str) -> Self {
        let lines = content
            .split_inclusive('\n')
            .map(|line| {
                if let Some(text) = line.strip_suffix("\r\n") {
                    ConfigLine {
                        text: text.to_string(),
                        ending: LineEnding::CrLf,
                    }
                } else if let Some(text) = line.strip_suffix('\n') {
                    ConfigLine {
                        text: text.to_string(),
                        ending: LineEnding::Lf,
                    }
                } else {
                    ConfigLine {
                        text: line.to_string(),
                        ending: LineEnding::None,
                    }
                }
            })
            .collect();

        Self {
            path: path.into(),
            lines,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn lines(&self) -> &[ConfigLine] {
        &self.lines
    }

    /// Value of the first `key=` line, if any.
    ///
    /// Surrounding whitespace and one pair of matching `"` or `'` quotes are
    /// removed, as dotenv loaders do.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines
            .iter()
            .filter_map(ConfigLine::key_value)
            .find(|(k, _)| *k == key)
            .map(|(_, v)| unquote(v.trim()))
    }

    /// Replace the value of every line starting with `KEY=` for each
    /// `(KEY, value)` in `replacements`.
    ///
    /// Replacements are tried in the order given and the first match wins.
    /// Lines that match nothing are left untouched, and keys that match no
    /// line are reported as missing rather than appended.
    pub fn apply(&mut self, replacements: &[(String, String)]) -> PatchReport {
        let prefixes: Vec<String> = replacements
            .iter()
            .map(|(key, _)| format!("{key}="))
            .collect();
        let mut found = vec![false; replacements.len()];
        let mut report = PatchReport::default();

        for line in &mut self.lines {
            let Some(index) = prefixes.iter().position(|p| line.text.starts_with(p)) else {
                continue;
            };

            let (key, value) = &replacements[index];
            line.text = format!("{}{value}", prefixes[index]);
            found[index] = true;
            report.replaced.push(key.clone());
            debug!("Replaced {}", key);
        }

        report.missing = replacements
            .iter()
            .zip(found)
            .filter(|(_, found)| !found)
            .map(|((key, _), _)| key.clone())
            .collect();

        report
    }

    /// The file content with every line's original terminator restored.
    #[must_use]
    pub fn render(&self) -> String {
        self.lines
            .iter()
            .flat_map(|line| [line.text.as_str(), line.ending.as_str()])
            .collect()
    }

    /// Replace the file on disk with [`Self::render`] in one step.
    ///
    /// Symlinks are followed, so the file a link points to is the one that
    /// gets replaced. The content goes into a randomly named staging file next
    /// to it, created owner-only and given the target's permissions before
    /// anything is written, and is then renamed over the target. Readers see
    /// either the old or the new content. No backup of the old content is
    /// kept.
    ///
    /// # Errors
    /// Returns [`Error::Write`] if any step fails.
    pub fn write(&self) -> Result<()> {
        let target = fs::canonicalize(&self.path).unwrap_or_else(|_| self.path.clone());
        let write_error = |source: io::Error| Error::Write {
            path: self.path.clone(),
            source,
        };

        let permissions = fs::metadata(&target).ok().map(|m| m.permissions());
        let mut staging = create_staging_file(&target, permissions).map_err(write_error)?;

        staging
            .write_all(self.render().as_bytes())
            .and_then(|()| staging.as_file().sync_all())
            .map_err(write_error)?;

        // a failed persist drops the staging file, which removes it
        staging
            .persist(&target)
            .map_err(|e| write_error(e.error))?;

        trace!("Wrote {}", target.display());
        Ok(())
    }
}

/// Owner-only temporary file in the directory of `target`, switched to
/// `permissions` while still empty.
fn create_staging_file(
    target: &Path,
    permissions: Option<fs::Permissions>,
) -> io::Result<NamedTempFile> {
    let dir = target
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let staging = tempfile::Builder::new()
        .prefix(".envforge")
        .suffix(".tmp")
        .tempfile_in(dir)?;

    if let Some(permissions) = permissions {
        staging.as_file().set_permissions(permissions)?;
    }

    Ok(staging)
}

fn unquote(value: &str) -> &str {
    ['"', '\'']
        .iter()
        .find_map(|quote| {
            value
                .strip_prefix(*quote)
                .and_then(|rest| rest.strip_suffix(*quote))
        })
        .unwrap_or(value)
}

/// Read `path`, apply `replacements` and write the result back.
///
/// # Errors
/// Returns [`Error::Read`] or [`Error::Write`]; a read failure leaves the
/// filesystem untouched.
pub fn patch_config(
    path: impl AsRef<Path>,
    replacements: &[(String, String)],
) -> Result<PatchReport> {
    let mut env_file = EnvFile::read(path)?;
    let report = env_file.apply(replacements);
    env_file.write()?;
    Ok(report)
}
