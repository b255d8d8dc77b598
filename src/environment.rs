use strum::{Display, EnumString};

/// Selects which `config/{environment}` file is layered under the
/// `ENVFORGE_*` environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

impl Environment {
    /// Config file path without extension; the `config` crate tries
    /// `.yaml`, `.toml`, `.json` and friends.
    #[must_use]
    pub fn config_file_name(self) -> String {
        format!("config/{self}")
    }
}
