//! Pipeline configuration.
//!
//! Built in layers, lowest precedence first: compiled-in defaults, an
//! optional TOML file, the `HITCHMAP_DATABASE` environment variable, and
//! command-line flags.

use std::path::{Path, PathBuf};

use hitchmap_database::paths;
use hitchmap_dedup::MAX_DUPLICATE_KM;
use hitchmap_spatial::MIN_RIDE_KM;
use hitchmap_text::{LEGACY_CUTOFF_YEAR, TextOptions};
use serde::Deserialize;

/// Environment variable that overrides the database path.
pub const DATABASE_ENV: &str = "HITCHMAP_DATABASE";

/// Public site that share links point to.
pub const DEFAULT_SITE_URL: &str = "https://hitchmap.com";

/// Number of reviews in the recent feed.
pub const DEFAULT_RECENT_LIMIT: usize = 1000;

/// Errors raised while building a [`PipelineConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file does not exist or cannot be read.
    #[error("Config file not found: {path}")]
    FileNotFound {
        /// Path that was tried.
        path: String,
    },

    /// The config file is not valid TOML for [`FileConfig`].
    #[error("Failed to parse {path}: {message}")]
    ParseError {
        /// File that failed to parse.
        path: String,
        /// Parser message.
        message: String,
    },

    /// A value is outside its allowed range.
    #[error("Invalid config value for {field}: {message}")]
    ValidationFailed {
        /// Offending field.
        field: String,
        /// What is wrong with it.
        message: String,
    },
}

/// Settings for one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// `SQLite` database to read.
    pub database: PathBuf,
    /// Directory the artifacts are written to.
    pub output_dir: PathBuf,
    /// Base URL for share links, without a trailing slash.
    pub site_url: String,
    /// Maximum number of reviews in the recent feed.
    pub recent_limit: usize,
    /// Reviews submitted in this year or earlier use the legacy text format.
    pub legacy_cutoff_year: i32,
    /// Duplicate reports spanning this many kilometers or more are ignored.
    pub max_duplicate_km: f64,
    /// Rides shorter than this are treated as having no destination.
    pub min_ride_km: f64,
    /// Regenerate outputs even if the inputs are unchanged.
    pub force: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            database: paths::default_database_path(&paths::db_dir()),
            output_dir: paths::dist_dir(),
            site_url: DEFAULT_SITE_URL.to_string(),
            recent_limit: DEFAULT_RECENT_LIMIT,
            legacy_cutoff_year: LEGACY_CUTOFF_YEAR,
            max_duplicate_km: MAX_DUPLICATE_KM,
            min_ride_km: MIN_RIDE_KM,
            force: false,
        }
    }
}

/// Optional settings read from a TOML file. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// `SQLite` database to read.
    pub database: Option<PathBuf>,
    /// Artifact directory.
    pub output_dir: Option<PathBuf>,
    /// Base URL for share links.
    pub site_url: Option<String>,
    /// Recent feed length.
    pub recent_limit: Option<usize>,
    /// Legacy text cutoff year.
    pub legacy_cutoff_year: Option<i32>,
    /// Duplicate distance threshold in kilometers.
    pub max_duplicate_km: Option<f64>,
    /// Minimum ride distance in kilometers.
    pub min_ride_km: Option<f64>,
}

impl FileConfig {
    /// Parses a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseError`] if the TOML is malformed.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::ParseError {
            path: "<string>".to_string(),
            message: e.to_string(),
        })
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// `--database`
    pub database: Option<PathBuf>,
    /// `--output-dir`
    pub output_dir: Option<PathBuf>,
    /// `--site-url`
    pub site_url: Option<String>,
    /// `--recent-limit`
    pub recent_limit: Option<usize>,
    /// `--force`
    pub force: bool,
}

impl PipelineConfig {
    /// Builds the configuration from every layer, reading
    /// [`DATABASE_ENV`] from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file is unreadable or the
    /// resulting values fail validation.
    pub fn load(
        config_file: Option<&Path>,
        overrides: &ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let env_database = std::env::var_os(DATABASE_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        let file = config_file.map(FileConfig::from_file).transpose()?;
        Self::resolve(file.as_ref(), env_database, overrides)
    }

    /// Builds the configuration from already-read layers.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationFailed`] if a value is out of range.
    pub fn resolve(
        file: Option<&FileConfig>,
        env_database: Option<PathBuf>,
        overrides: &ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(file) = file {
            config.merge_file(file);
        }

        if let Some(database) = env_database {
            config.database = database;
        }

        if let Some(database) = &overrides.database {
            config.database.clone_from(database);
        }
        if let Some(output_dir) = &overrides.output_dir {
            config.output_dir.clone_from(output_dir);
        }
        if let Some(site_url) = &overrides.site_url {
            config.site_url.clone_from(site_url);
        }
        if let Some(limit) = overrides.recent_limit {
            config.recent_limit = limit;
        }
        config.force |= overrides.force;

        config.site_url = config.site_url.trim_end_matches('/').to_string();
        config.validate()?;

        Ok(config)
    }

    fn merge_file(&mut self, file: &FileConfig) {
        if let Some(database) = &file.database {
            self.database.clone_from(database);
        }
        if let Some(output_dir) = &file.output_dir {
            self.output_dir.clone_from(output_dir);
        }
        if let Some(site_url) = &file.site_url {
            self.site_url.clone_from(site_url);
        }
        if let Some(limit) = file.recent_limit {
            self.recent_limit = limit;
        }
        if let Some(year) = file.legacy_cutoff_year {
            self.legacy_cutoff_year = year;
        }
        if let Some(km) = file.max_duplicate_km {
            self.max_duplicate_km = km;
        }
        if let Some(km) = file.min_ride_km {
            self.min_ride_km = km;
        }
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationFailed`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |field: &str, message: &str| {
            Err(ConfigError::ValidationFailed {
                field: field.to_string(),
                message: message.to_string(),
            })
        };

        if self.site_url.is_empty() {
            return fail("site_url", "must not be empty");
        }
        if self.recent_limit == 0 {
            return fail("recent_limit", "must be greater than 0");
        }
        if !(self.max_duplicate_km.is_finite() && self.max_duplicate_km > 0.0) {
            return fail("max_duplicate_km", "must be a positive number");
        }
        if !(self.min_ride_km.is_finite() && self.min_ride_km >= 0.0) {
            return fail("min_ride_km", "must be zero or a positive number");
        }
        Ok(())
    }

    /// Text synthesis options derived from this configuration.
    #[must_use]
    pub const fn text_options(&self) -> TextOptions {
        TextOptions {
            legacy_cutoff_year: self.legacy_cutoff_year,
            min_ride_km: self.min_ride_km,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.recent_limit, 1000);
        assert!((config.max_duplicate_km - 1.25).abs() < f64::EPSILON);
    }

    #[test]
    fn later_layers_win() {
        let file = FileConfig::from_toml(
            r#"
            database = "from-file.sqlite"
            site_url = "https://example.org/"
            recent_limit = 50
            legacy_cutoff_year = 2019
            unknown_key = true
            "#,
        )
        .unwrap();

        let config = PipelineConfig::resolve(
            Some(&file),
            Some(PathBuf::from("from-env.sqlite")),
            &ConfigOverrides {
                recent_limit: Some(10),
                force: true,
                ..ConfigOverrides::default()
            },
        )
        .unwrap();

        assert_eq!(config.database, PathBuf::from("from-env.sqlite"));
        assert_eq!(config.site_url, "https://example.org");
        assert_eq!(config.recent_limit, 10);
        assert_eq!(config.legacy_cutoff_year, 2019);
        assert!(config.force);

        let config = PipelineConfig::resolve(
            Some(&file),
            Some(PathBuf::from("from-env.sqlite")),
            &ConfigOverrides {
                database: Some(PathBuf::from("from-cli.sqlite")),
                ..ConfigOverrides::default()
            },
        )
        .unwrap();
        assert_eq!(config.database, PathBuf::from("from-cli.sqlite"));
    }

    #[test]
    fn rejects_bad_values() {
        let file = FileConfig::from_toml("max_duplicate_km = -1.0").unwrap();
        let err = PipelineConfig::resolve(Some(&file), None, &ConfigOverrides::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ValidationFailed { ref field, .. } if field == "max_duplicate_km"
        ));

        assert!(matches!(
            FileConfig::from_toml("recent_limit = \"lots\""),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn missing_file_is_reported() {
        let path = std::env::temp_dir().join("hitchmap_config_test_missing.toml");
        let _ = std::fs::remove_file(&path);
        assert!(matches!(
            FileConfig::from_file(&path),
            Err(ConfigError::FileNotFound { .. })
        ));
    }
}
