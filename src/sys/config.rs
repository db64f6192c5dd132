use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::settings::DEFAULT_TOLERANCE_MS;
use crate::model::{Credentials, Quality};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub account: AccountConfig,
    #[serde(default)]
    pub executables: ExecutablesConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountConfig {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub second_password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutablesConfig {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadConfig {
    #[serde(default)]
    pub quality: Quality,
    #[serde(default = "default_tolerance")]
    pub tolerance_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_ffmpeg() -> String { "ffmpeg".to_string() }
fn default_tolerance() -> u64 { DEFAULT_TOLERANCE_MS }
fn default_true() -> bool { true }

impl Default for ExecutablesConfig {
    fn default() -> Self {
        Self { ffmpeg: default_ffmpeg() }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            quality: Quality::Auto,
            tolerance_ms: default_tolerance(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: None,
        }
    }
}

impl AccountConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(
            self.username.as_str(),
            self.password.as_str(),
            Some(self.second_password.clone()),
        )
    }

    pub fn set_credentials(&mut self, credentials: &Credentials) {
        self.username = credentials.username.clone();
        self.password = credentials.password.clone();
        self.second_password = credentials.secondary_password.clone().unwrap_or_default();
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("kr", "soopdl", "soopdl")
}

fn home_fallback() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".soopdl")
}

impl Config {
    pub fn get_config_path() -> PathBuf {
        project_dirs()
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| home_fallback().join("config.toml"))
    }

    pub fn default_log_path() -> PathBuf {
        project_dirs()
            .map(|dirs| dirs.data_local_dir().join("soopdl.log"))
            .unwrap_or_else(|| home_fallback().join("soopdl.log"))
    }

    pub fn log_path(&self) -> PathBuf {
        self.logging.path.clone().unwrap_or_else(Self::default_log_path)
    }

    /// Reads the config file, or `None` when there is none yet.
    pub fn load_from(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(config))
    }

    /// Loads the config, creating it with defaults when missing.
    pub fn load_or_create() -> Result<(Self, bool)> {
        let path = Self::get_config_path();
        match Self::load_from(&path)? {
            Some(config) => Ok((config, false)),
            None => {
                let config = Self::default();
                config.save_to(&path)?;
                Ok((config, true))
            }
        }
    }

    /// Best-effort read used before `--config` is honoured, e.g. for logging.
    pub fn load() -> Self {
        Self::load_from(&Self::get_config_path())
            .ok()
            .flatten()
            .unwrap_or_default()
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut content = String::from("# soopdl configuration\n");
        content.push_str("# Passwords are stored in plain text.\n\n");
        content.push_str(&toml::to_string(self).context("Failed to serialize config")?);

        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from(&dir.path().join("config.toml")).unwrap().is_none());
    }

    #[test]
    fn saved_config_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.account.set_credentials(&Credentials::new("user", "pw", None));
        config.executables.ffmpeg = "/opt/ffmpeg/bin/ffmpeg".to_string();
        config.download.quality = Quality::P720;

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), Some(config));
    }

    #[test]
    fn partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[account]\nusername = \"me\"\n").unwrap();

        let config = Config::load_from(&path).unwrap().unwrap();
        assert_eq!(config.account.username, "me");
        assert_eq!(config.executables.ffmpeg, "ffmpeg");
        assert_eq!(config.download.tolerance_ms, DEFAULT_TOLERANCE_MS);
        assert_eq!(config.download.quality, Quality::Auto);
        assert!(config.logging.enabled);
        assert_eq!(config.account.credentials().secondary_password, None);
    }
}
