use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use engine_logging::{LogDestination, DEFAULT_LOG_FILE};
use log::LevelFilter;
use scout_engine::EngineConfig;
use serde::{Deserialize, Serialize};

pub(crate) const CONFIG_FILENAME: &str = "scout.ron";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub(crate) enum LogTarget {
    File,
    #[default]
    Terminal,
    Both,
}

impl From<LogTarget> for LogDestination {
    fn from(target: LogTarget) -> Self {
        match target {
            LogTarget::File => LogDestination::File,
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::Both => LogDestination::Both,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub output_dir: PathBuf,
    pub log_destination: LogTarget,
    pub log_level: String,
    pub log_file: PathBuf,
    pub page_timeout_secs: u64,
    pub media_timeout_secs: u64,
    pub resolver_program: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("downloads"),
            log_destination: LogTarget::Terminal,
            log_level: "info".to_string(),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            page_timeout_secs: 30,
            media_timeout_secs: 60,
            resolver_program: PathBuf::from("yt-dlp"),
        }
    }
}

impl AppConfig {
    pub fn level_filter(&self) -> LevelFilter {
        LevelFilter::from_str(&self.log_level).unwrap_or(LevelFilter::Info)
    }

    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::default();
        let page = Duration::from_secs(self.page_timeout_secs.max(1));
        config.page_fetch.read_timeout = page;
        config.page_fetch.request_timeout = Some(page);
        // Media bodies may stream for much longer; only silence is bounded.
        config.media_fetch.read_timeout = Duration::from_secs(self.media_timeout_secs.max(1));
        config
    }
}

/// Result of reading the config file. The logger is not up yet while the
/// file is read, so problems are handed back to be logged later.
pub(crate) struct LoadedConfig {
    pub config: AppConfig,
    pub warning: Option<String>,
}

/// Reads `path`, or `./scout.ron` when no path is given. A missing default
/// file is silently replaced by defaults; anything else unreadable warns.
pub(crate) fn load_config(path: Option<&Path>) -> LoadedConfig {
    let (path, explicit) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(CONFIG_FILENAME), false),
    };

    let content = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound && !explicit => {
            return LoadedConfig {
                config: AppConfig::default(),
                warning: None,
            };
        }
        Err(err) => {
            return LoadedConfig {
                config: AppConfig::default(),
                warning: Some(format!("Failed to read config from {:?}: {}", path, err)),
            };
        }
    };

    match ron::from_str::<AppConfig>(&content) {
        Ok(config) => LoadedConfig {
            config,
            warning: None,
        },
        Err(err) => LoadedConfig {
            config: AppConfig::default(),
            warning: Some(format!("Failed to parse config from {:?}: {}", path, err)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn partial_files_keep_defaults_for_missing_fields() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("scout.ron");
        fs::write(
            &path,
            r#"(output_dir: "/media/videos", log_destination: Both, log_level: "debug")"#,
        )
        .unwrap();

        let loaded = load_config(Some(&path));
        assert!(loaded.warning.is_none());
        assert_eq!(loaded.config.output_dir, PathBuf::from("/media/videos"));
        assert_eq!(loaded.config.log_destination, LogTarget::Both);
        assert_eq!(loaded.config.level_filter(), LevelFilter::Debug);
        assert_eq!(loaded.config.media_timeout_secs, 60);
    }

    #[test]
    fn malformed_files_fall_back_with_a_warning() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("scout.ron");
        fs::write(&path, "(output_dir: 42").unwrap();

        let loaded = load_config(Some(&path));
        assert_eq!(loaded.config, AppConfig::default());
        assert!(loaded.warning.unwrap().contains("Failed to parse config"));
    }

    #[test]
    fn explicit_missing_file_warns() {
        let temp = TempDir::new().unwrap();
        let loaded = load_config(Some(&temp.path().join("absent.ron")));
        assert_eq!(loaded.config, AppConfig::default());
        assert!(loaded.warning.is_some());
    }

    #[test]
    fn timeouts_flow_into_engine_config() {
        let config = AppConfig {
            page_timeout_secs: 5,
            media_timeout_secs: 0,
            ..AppConfig::default()
        };
        let engine = config.engine_config();
        assert_eq!(engine.page_fetch.request_timeout, Some(Duration::from_secs(5)));
        assert_eq!(engine.page_fetch.read_timeout, Duration::from_secs(5));
        assert_eq!(engine.media_fetch.read_timeout, Duration::from_secs(1));
        assert_eq!(engine.media_fetch.request_timeout, None);

        let unknown_level = AppConfig {
            log_level: "loud".to_string(),
            ..AppConfig::default()
        };
        assert_eq!(unknown_level.level_filter(), LevelFilter::Info);
    }
}
