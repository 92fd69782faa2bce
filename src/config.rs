//! Configuration Management
//!
//! Handles persistent configuration storage for cloudres.

use crate::util;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variables consulted for the API endpoint, in order
pub const ENDPOINT_VARS: &[&str] = &["CLOUDRES_ENDPOINT", "OS_ENDPOINT"];

/// Environment variables consulted for the bearer token, in order
pub const TOKEN_VARS: &[&str] = &["CLOUDRES_TOKEN", "OS_TOKEN"];

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Base URL of the resource API
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Bearer token
    #[serde(default)]
    pub token: Option<String>,
    /// Seconds between two polls
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    /// Seconds before giving up on a deletion
    #[serde(default)]
    pub delete_timeout_secs: Option<u64>,
}

impl Config {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("cloudres").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load configuration from `path`, defaulting on any problem
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable config {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))?;

        Ok(())
    }

    /// Get effective endpoint (environment > config)
    pub fn effective_endpoint(&self) -> Option<String> {
        let from_env = util::env(ENDPOINT_VARS, "");
        if !from_env.is_empty() {
            return Some(from_env);
        }
        self.endpoint.clone()
    }

    /// Get effective token (environment > config)
    pub fn effective_token(&self) -> Option<String> {
        let from_env = util::env(TOKEN_VARS, "");
        if !from_env.is_empty() {
            return Some(from_env);
        }
        self.token.clone()
    }

    /// Poll interval, 5 seconds unless configured
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval_secs
            .map(Duration::from_secs)
            .unwrap_or(crate::wait::DEFAULT_POLL_INTERVAL)
    }

    /// Deletion timeout, 300 seconds unless configured
    pub fn delete_timeout(&self) -> Duration {
        self.delete_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(crate::wait::DEFAULT_DELETE_TIMEOUT)
    }
}
