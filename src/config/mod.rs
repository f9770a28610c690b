//! Project configuration: `.orchestrator/config.toml`.
//!
//! Layout, search-upward behavior, and the read-whole-file-then-parse
//! style are carried over from `ProjectConfig::load`; the
//! field set is rebuilt for orchestration concerns (which Manager/Executor
//! backend to use, retry limits, session storage location) instead of
//! PTY-supervision concerns.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const CONFIG_FILENAME: &str = "config.toml";
const CONFIG_DIR: &str = ".orchestrator";

fn default_manager() -> String {
    "echo".to_string()
}

fn default_executor() -> String {
    "echo".to_string()
}

fn default_max_retries() -> u32 {
    5
}

fn default_session_dir() -> String {
    ".orchestrator/sessions".to_string()
}

fn default_log_filter() -> String {
    "dutycycle=info".to_string()
}

#[derive(Debug, Deserialize)]
pub struct OrchestratorSettings {
    #[serde(default = "default_manager")]
    pub manager: String,
    #[serde(default = "default_executor")]
    pub executor: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_session_dir")]
    pub session_dir: String,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            manager: default_manager(),
            executor: default_executor(),
            max_retries: default_max_retries(),
            session_dir: default_session_dir(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { filter: default_log_filter() }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct ProjectConfig {
    #[serde(default)]
    pub orchestrator: OrchestratorSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl ProjectConfig {
    /// Search upward from `start` for a `.orchestrator/config.toml` file
    /// and load it. Returns the default config if no file is found.
    pub fn load(start: &Path) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = Self::find_config_file(start) {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let config: ProjectConfig = toml::from_str(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            Ok((config, Some(path)))
        } else {
            Ok((ProjectConfig::default(), None))
        }
    }

    fn find_config_file(start: &Path) -> Option<PathBuf> {
        let mut dir = start.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_DIR).join(CONFIG_FILENAME);
            if candidate.is_file() {
                return Some(candidate);
            }
            if !dir.pop() {
                return None;
            }
        }
    }

    /// Resolve `session_dir` against the directory the config file lives
    /// in (or `start` when there is none), so a relative path in the
    /// config behaves the same regardless of the caller's cwd.
    pub fn resolved_session_dir(&self, config_path: Option<&Path>, start: &Path) -> PathBuf {
        let base = config_path
            .and_then(|p| p.parent())
            .and_then(|p| p.parent())
            .unwrap_or(start);
        let session_dir = PathBuf::from(&self.orchestrator.session_dir);
        if session_dir.is_absolute() {
            session_dir
        } else {
            base.join(session_dir)
        }
    }
}
