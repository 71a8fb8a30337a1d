//! Configuration for santasheet.
//!
//! Layered with figment: built-in defaults, then the TOML file, then
//! `SANTASHEET_` environment variables. The admin allow-list and the identity
//! directory live here so callers receive them as injected values.

use std::collections::BTreeMap;
use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::identity::{AdminAllowList, ProfileAttributes};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "santasheet";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "sheets.db";

/// Loose shape check for admin addresses.
const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+$";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `SANTASHEET_`, sections split on `__`,
///    e.g. `SANTASHEET_STORAGE__PAGE_SIZE`)
/// 2. TOML config file at `~/.config/santasheet/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Administrator configuration.
    pub admin: AdminConfig,
    /// Identity configuration.
    pub identity: IdentityConfig,
    /// Export configuration.
    pub export: ExportConfig,
    /// Print/email configuration.
    pub share: ShareConfig,
}

/// Where sheets are stored and how they are paged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/santasheet/sheets.db`
    pub database_path: Option<PathBuf>,
    /// Records requested per page when listing every sheet.
    pub page_size: u32,
}

/// Administrator configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Email addresses allowed to view and transfer every sheet.
    pub emails: Vec<String>,
}

/// Identity-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Name used when nothing better can be resolved for a user.
    pub fallback_name: String,
    /// Profile attributes keyed by login identifier.
    pub profiles: BTreeMap<String, ProfileAttributes>,
}

/// Export-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory backups are written to. Defaults to the working directory.
    pub output_dir: Option<PathBuf>,
    /// File name prefix for backups.
    pub file_prefix: String,
}

/// Print/email configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareConfig {
    /// Webmail compose URL the subject and body are appended to.
    pub compose_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            page_size: 200,
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            fallback_name: "New friend".to_string(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            file_prefix: "santa-sheet-backup".to_string(),
        }
    }
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            compose_url: "https://mail.google.com/mail/?view=cm&fs=1".to_string(),
        }
    }
}

impl Config {
    /// Load from `config_path`, or the default location when `None`.
    ///
    /// A missing file is not an error; defaults apply.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("SANTASHEET_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// `<config_dir>/santasheet/config.toml`.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// `<data_local_dir>/santasheet`.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.storage.page_size == 0 {
            return Err(Error::ConfigValidation {
                message: "page_size must be greater than 0".to_string(),
            });
        }

        if self.export.file_prefix.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "export file_prefix cannot be empty".to_string(),
            });
        }

        let email = Regex::new(EMAIL_PATTERN).map_err(|e| Error::internal(e.to_string()))?;
        for address in &self.admin.emails {
            if !email.is_match(address.trim()) {
                return Err(Error::ConfigValidation {
                    message: format!("invalid admin email: {address}"),
                });
            }
        }

        Ok(())
    }

    /// The configured database path, or `sheets.db` in the data directory.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the export directory, resolving defaults if not set.
    #[must_use]
    pub fn export_dir(&self) -> PathBuf {
        self.export
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Build the admin allow-list from the configured addresses.
    #[must_use]
    pub fn admin_allow_list(&self) -> AdminAllowList {
        AdminAllowList::new(self.admin.emails.iter().map(String::as_str))
    }
}
