//! Configuration management for Clipper.
//!
//! Configuration is merged from several sources, later ones winning:
//! - Built-in defaults
//! - The YAML config file (`clipper.yaml` in the workspace, or `CLIPPER_CONFIG`)
//! - Environment variables
//! - Command-line flags
//!
//! Relative paths in the config file are resolved against the workspace.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Name of the config file looked up in the workspace root.
pub const CONFIG_FILE_NAME: &str = "clipper.yaml";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Workspace root; relative paths are resolved against it
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// SQLite datastore populated by the ingestion collaborator
    pub database_path: PathBuf,

    /// Output directory; artifacts land in `<build_dir>/cache`
    pub build_dir: PathBuf,

    /// Channels to build, in configured order
    pub channels: Vec<ChannelConfig>,

    /// Clip detection and merge knobs
    pub build: BuildSettings,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// A tracked channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Human-readable name, only used in logs
    #[serde(default)]
    pub name: String,

    #[serde(rename = "channelId")]
    pub channel_id: String,
}

/// Numeric settings of the clip engine. All spans are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSettings {
    /// Ceiling on any single clip length; must be configured and non-zero
    #[serde(default)]
    pub max_duration: u64,

    /// Ranges whose starts are this close are merged into one
    #[serde(default = "default_adjust_start_time_span")]
    pub adjust_start_time_span: u64,

    /// Bin width for live-chat auto detection
    #[serde(default = "default_auto_detect_unit_span")]
    pub auto_detect_unit_span: u64,

    /// Standard deviation multiplier for the outlier threshold
    #[serde(default = "default_auto_detect_threshold")]
    pub auto_detect_threshold: f64,

    /// Lead-in before a detected bin; the tail is two thirds of it
    #[serde(default = "default_auto_detect_range_sec")]
    pub auto_detect_range_sec: u64,

    /// Live chat before this offset is ignored
    #[serde(default = "default_auto_detect_skip_duration")]
    pub auto_detect_skip_duration: u64,

    /// Length given to clips whose end was never stated
    #[serde(default = "default_clip_duration")]
    pub default_clip_duration: u64,
}

fn default_adjust_start_time_span() -> u64 {
    15
}

fn default_auto_detect_unit_span() -> u64 {
    30
}

fn default_auto_detect_threshold() -> f64 {
    3.0
}

fn default_auto_detect_range_sec() -> u64 {
    60
}

fn default_auto_detect_skip_duration() -> u64 {
    300
}

fn default_clip_duration() -> u64 {
    180
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            max_duration: 0,
            adjust_start_time_span: default_adjust_start_time_span(),
            auto_detect_unit_span: default_auto_detect_unit_span(),
            auto_detect_threshold: default_auto_detect_threshold(),
            auto_detect_range_sec: default_auto_detect_range_sec(),
            auto_detect_skip_duration: default_auto_detect_skip_duration(),
            default_clip_duration: default_clip_duration(),
        }
    }
}

impl BuildSettings {
    /// Check the invariants the engine relies on.
    pub fn validate(&self) -> AppResult<()> {
        if self.max_duration == 0 {
            return Err(AppError::Config(
                "build.maxDuration must be configured and greater than zero".to_string(),
            ));
        }
        if self.auto_detect_unit_span == 0 {
            return Err(AppError::Config(
                "build.autoDetectUnitSpan must be greater than zero".to_string(),
            ));
        }
        if !self.auto_detect_threshold.is_finite() || self.auto_detect_threshold <= 0.0 {
            return Err(AppError::Config(format!(
                "build.autoDetectThreshold must be a positive number, got {}",
                self.auto_detect_threshold
            )));
        }
        let spans = [
            ("adjustStartTimeSpan", self.adjust_start_time_span),
            ("autoDetectRangeSec", self.auto_detect_range_sec),
            ("defaultClipDuration", self.default_clip_duration),
        ];
        for (name, value) in spans {
            if value == 0 {
                return Err(AppError::Config(format!(
                    "build.{} must be greater than zero",
                    name
                )));
            }
        }
        // autoDetectSkipDuration may be zero: detection then starts at 0:00
        Ok(())
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    database: Option<String>,
    #[serde(rename = "buildDir")]
    build_dir: Option<String>,
    #[serde(default)]
    channels: Vec<ChannelConfig>,
    build: Option<BuildSettings>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let workspace = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::for_workspace(workspace)
    }
}

impl AppConfig {
    /// Defaults rooted at the given workspace.
    pub fn for_workspace(workspace: PathBuf) -> Self {
        Self {
            database_path: workspace.join("clipper.sqlite"),
            build_dir: workspace.join("build"),
            workspace,
            config_file: None,
            channels: Vec::new(),
            build: BuildSettings::default(),
            log_level: None,
            verbose: false,
            no_color: false,
        }
    }

    /// Load configuration from defaults, the config file and the environment.
    ///
    /// `workspace` and `config_file` come from the command line when given;
    /// otherwise `CLIPPER_WORKSPACE` and `CLIPPER_CONFIG` are consulted.
    ///
    /// Environment variables:
    /// - `CLIPPER_WORKSPACE`: workspace path
    /// - `CLIPPER_CONFIG`: config file path
    /// - `CLIPPER_DATABASE`: datastore path
    /// - `CLIPPER_BUILD_DIR`: output directory
    /// - `RUST_LOG`: log level
    /// - `NO_COLOR`: disable colored output
    pub fn load(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let workspace = workspace
            .or_else(|| std::env::var("CLIPPER_WORKSPACE").ok().map(PathBuf::from))
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

        if !workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                workspace
            )));
        }

        let mut config = Self::for_workspace(workspace);
        config.config_file =
            config_file.or_else(|| std::env::var("CLIPPER_CONFIG").ok().map(PathBuf::from));

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.workspace.join(CONFIG_FILE_NAME),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file does not exist: {:?}",
                config_path
            )));
        }

        if let Ok(database) = std::env::var("CLIPPER_DATABASE") {
            config.database_path = config.resolve(&database);
        }

        if let Ok(build_dir) = std::env::var("CLIPPER_BUILD_DIR") {
            config.build_dir = config.resolve(&build_dir);
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    pub fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(database) = config_file.database {
            result.database_path = result.resolve(&database);
        }

        if let Some(build_dir) = config_file.build_dir {
            result.build_dir = result.resolve(&build_dir);
        }

        if !config_file.channels.is_empty() {
            result.channels = config_file.channels;
        }

        if let Some(build) = config_file.build {
            result.build = build;
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        tracing::debug!("Merged config file {:?}", path);
        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    pub fn with_overrides(
        mut self,
        database: Option<PathBuf>,
        build_dir: Option<PathBuf>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(database) = database {
            self.database_path = database;
        }

        if let Some(build_dir) = build_dir {
            self.build_dir = build_dir;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Directory holding the per-channel JSON artifacts and digests.
    pub fn cache_dir(&self) -> PathBuf {
        self.build_dir.join("cache")
    }

    /// Ensure the build and cache directories exist.
    pub fn ensure_build_dirs(&self) -> AppResult<()> {
        let cache_dir = self.cache_dir();
        if !cache_dir.exists() {
            std::fs::create_dir_all(&cache_dir).map_err(|e| {
                AppError::Config(format!(
                    "Failed to create build directory {:?}: {}",
                    cache_dir, e
                ))
            })?;
        }
        Ok(())
    }

    /// Validate everything a build needs before any channel is touched.
    pub fn validate(&self) -> AppResult<()> {
        if self.build_dir.as_os_str().is_empty() {
            return Err(AppError::Config("No build directory configured".to_string()));
        }
        self.build.validate()
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = PathBuf::from(path);
        if path.is_absolute() {
            path
        } else {
            self.workspace.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn configured() -> AppConfig {
        let mut config = AppConfig::for_workspace(PathBuf::from("/srv/clipper"));
        config.build.max_duration = 300;
        config
    }

    #[test]
    fn test_default_paths_follow_workspace() {
        let config = AppConfig::for_workspace(PathBuf::from("/srv/clipper"));
        assert_eq!(config.database_path, PathBuf::from("/srv/clipper/clipper.sqlite"));
        assert_eq!(config.cache_dir(), PathBuf::from("/srv/clipper/build/cache"));
        assert!(config.channels.is_empty());
    }

    #[test]
    fn test_zero_max_duration_is_fatal() {
        let config = AppConfig::for_workspace(PathBuf::from("/srv/clipper"));
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
        assert!(configured().validate().is_ok());
    }

    #[test]
    fn test_zero_unit_span_is_fatal() {
        let mut config = configured();
        config.build.auto_detect_unit_span = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_knobs_are_fatal() {
        let zeroes: [fn(&mut BuildSettings); 4] = [
            |b| b.adjust_start_time_span = 0,
            |b| b.auto_detect_range_sec = 0,
            |b| b.default_clip_duration = 0,
            |b| b.auto_detect_threshold = 0.0,
        ];
        for zero in zeroes {
            let mut config = configured();
            zero(&mut config.build);
            assert!(matches!(config.validate(), Err(AppError::Config(_))));
        }

        let mut config = configured();
        config.build.auto_detect_skip_duration = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_build_dir_is_fatal() {
        let mut config = configured();
        config.build_dir = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_with_overrides() {
        let overridden = configured().with_overrides(
            Some(PathBuf::from("/tmp/other.sqlite")),
            None,
            None,
            true,
            false,
        );

        assert_eq!(overridden.database_path, PathBuf::from("/tmp/other.sqlite"));
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_merge_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            r#"
database: data/clipper.sqlite
buildDir: /var/www/clipper
channels:
  - name: first
    channelId: UC0001
  - channelId: UC0002
build:
  maxDuration: 240
  adjustStartTimeSpan: 20
  autoDetectThreshold: 2.5
logging:
  level: warn
  color: false
"#,
        )
        .unwrap();

        let base = AppConfig::for_workspace(temp.path().to_path_buf());
        let merged = base.merge_yaml(&path).unwrap();

        assert_eq!(merged.database_path, temp.path().join("data/clipper.sqlite"));
        assert_eq!(merged.build_dir, PathBuf::from("/var/www/clipper"));
        assert_eq!(merged.channels.len(), 2);
        assert_eq!(merged.channels[1].channel_id, "UC0002");
        assert_eq!(merged.build.max_duration, 240);
        assert_eq!(merged.build.adjust_start_time_span, 20);
        assert_eq!(merged.build.auto_detect_unit_span, 30);
        assert!((merged.build.auto_detect_threshold - 2.5).abs() < f64::EPSILON);
        assert_eq!(merged.log_level.as_deref(), Some("warn"));
        assert!(merged.no_color);
        assert!(merged.validate().is_ok());
    }

    #[test]
    fn test_merge_yaml_rejects_garbage() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "build: [1, 2").unwrap();

        let base = AppConfig::for_workspace(temp.path().to_path_buf());
        assert!(matches!(base.merge_yaml(&path), Err(AppError::Config(_))));
    }

    #[test]
    fn test_ensure_build_dirs() {
        let temp = TempDir::new().unwrap();
        let mut config = configured();
        config.build_dir = temp.path().join("out");
        config.ensure_build_dirs().unwrap();
        assert!(config.cache_dir().is_dir());
    }
}
