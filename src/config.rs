// icinga2ctl - CLI for the Icinga 2 HTTP API
// Copyright (C) 2024 The icinga2ctl authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

use crate::client::DEFAULT_TIMEOUT;

pub const CONFIG_DIR_ENV: &str = "ICINGA2CTL_CONFIG_DIR";

/// Flat key/value settings as stored on disk. Every field is optional so a
/// project file can override just part of the user file.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub verify_tls: Option<bool>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Local,
    User,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not locate a writable config directory for the current user")]
    MissingConfigDir,
    #[error("not configured ({0} missing); try running: icinga2ctl configure")]
    MissingFields(String),
    #[error("unknown config key `{0}`")]
    UnknownKey(String),
}

/// Settings every authenticated command needs, after layering.
#[derive(Debug)]
pub struct EffectiveConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    pub verify_tls: bool,
    pub timeout: Duration,
}

impl Config {
    pub const KEYS: [&'static str; 5] = ["url", "username", "password", "verify_tls", "timeout_secs"];

    /// Keys that currently hold a value.
    pub fn keys(&self) -> Vec<&'static str> {
        Self::KEYS
            .into_iter()
            .filter(|key| matches!(self.get(key), Ok(Some(_))))
            .collect()
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, ConfigError> {
        Ok(match key {
            "url" => self.url.clone(),
            "username" => self.username.clone(),
            "password" => self.password.clone(),
            "verify_tls" => self.verify_tls.map(|v| v.to_string()),
            "timeout_secs" => self.timeout_secs.map(|v| v.to_string()),
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.keys().is_empty()
    }

    /// Copy with secrets replaced, for display.
    pub fn masked(&self) -> Config {
        let mut masked = self.clone();
        if masked.password.is_some() {
            masked.password = Some("*****".into());
        }
        masked
    }
}

pub fn config_path(scope: Scope, cwd: &Path) -> Result<PathBuf> {
    match scope {
        Scope::Local => Ok(cwd.join(".icinga2ctl.yaml")),
        Scope::User => {
            if let Ok(custom) = env::var(CONFIG_DIR_ENV) {
                return Ok(PathBuf::from(custom).join("config.yaml"));
            }
            let base = config_dir().ok_or(ConfigError::MissingConfigDir)?;
            Ok(base.join("icinga2ctl").join("config.yaml"))
        }
    }
}

pub fn load(cwd: &Path) -> Result<Config> {
    let user = read_if_exists(&config_path(Scope::User, cwd)?)?.unwrap_or_default();
    let local = read_if_exists(&config_path(Scope::Local, cwd)?)?.unwrap_or_default();
    Ok(merge(user, local))
}

pub fn load_scope(scope: Scope, cwd: &Path) -> Result<Config> {
    Ok(read_if_exists(&config_path(scope, cwd)?)?.unwrap_or_default())
}

pub fn save(scope: Scope, config: &Config, cwd: &Path) -> Result<PathBuf> {
    let path = config_path(scope, cwd)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    let serialized = serde_yaml::to_string(config).context("serializing config")?;
    fs::write(&path, serialized).with_context(|| format!("writing {:?}", path))?;
    Ok(path)
}

/// Layers user config, project config and command-line overrides (in that
/// order) and checks the connection settings are complete.
pub fn resolve(cwd: &Path, overrides: Config) -> Result<EffectiveConfig> {
    let merged = merge(load(cwd)?, overrides);

    let missing: Vec<&str> = [
        ("url", merged.url.is_none()),
        ("username", merged.username.is_none()),
        ("password", merged.password.is_none()),
    ]
    .into_iter()
    .filter_map(|(key, absent)| absent.then_some(key))
    .collect();
    if !missing.is_empty() {
        return Err(ConfigError::MissingFields(missing.join(", ")).into());
    }

    Ok(EffectiveConfig {
        url: merged.url.unwrap_or_default().trim().to_string(),
        username: merged.username.unwrap_or_default(),
        password: merged.password.unwrap_or_default(),
        verify_tls: merged.verify_tls.unwrap_or(true),
        timeout: merged
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT),
    })
}

fn read_if_exists(path: &Path) -> Result<Option<Config>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    if contents.trim().is_empty() {
        return Ok(Some(Config::default()));
    }
    let config = serde_yaml::from_str(&contents).with_context(|| format!("parsing {:?}", path))?;
    Ok(Some(config))
}

/// Field-wise merge; `over` wins wherever it has a value.
fn merge(base: Config, over: Config) -> Config {
    Config {
        url: over.url.or(base.url),
        username: over.username.or(base.username),
        password: over.password.or(base.password),
        verify_tls: over.verify_tls.or(base.verify_tls),
        timeout_secs: over.timeout_secs.or(base.timeout_secs),
    }
}
