// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Shahzad A. Bhatti <bhatti@plexobject.com>
//
// This file is part of PlexFlow.
//
// PlexFlow is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// PlexFlow is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with PlexFlow. If not, see <https://www.gnu.org/licenses/>.

//! Configuration bootstrap.
//!
//! ## Precedence (highest to lowest)
//! 1. Environment variables (`PLEXFLOW_` prefix, `__` between nested keys)
//! 2. `plexflow.toml` (path from `PLEXFLOW_CONFIG_PATH`, else the current directory)
//! 3. `Default::default()`
//!
//! Layers are merged key by key, so `PLEXFLOW_LEADER__HEART_BEAT_MILLIS=200`
//! overrides only the heartbeat of an otherwise file-provided config.

use config::{Config, Environment, File, FileFormat};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::env;
use std::fs;
use std::path::Path;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "PLEXFLOW_CONFIG_PATH";

/// Default config file name.
pub const DEFAULT_CONFIG_FILE: &str = "plexflow.toml";

/// Default environment prefix.
pub const DEFAULT_ENV_PREFIX: &str = "PLEXFLOW";

/// Configuration loading error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Reading the config file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML for the target type
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Layering or deserializing sources failed
    #[error("Config source error: {0}")]
    Source(String),

    /// A setting is out of range or inconsistent with another one
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration bootstrap helper
///
/// ## Usage
/// ```rust,no_run
/// use plexflow_common::{ConfigBootstrap, PlexflowConfig};
///
/// let config: PlexflowConfig = ConfigBootstrap::load().unwrap_or_default();
/// ```
pub struct ConfigBootstrap;

impl ConfigBootstrap {
    /// Load with the default file lookup and the `PLEXFLOW` env prefix.
    pub fn load<T>() -> Result<T, ConfigError>
    where
        T: DeserializeOwned + Serialize + Default,
    {
        let path = env::var(CONFIG_PATH_ENV).ok().or_else(|| {
            Path::new(DEFAULT_CONFIG_FILE)
                .exists()
                .then(|| DEFAULT_CONFIG_FILE.to_string())
        });
        Self::load_layered(path.as_deref(), DEFAULT_ENV_PREFIX)
    }

    /// Merge defaults, an optional TOML file and prefixed environment variables.
    ///
    /// A missing file is not an error; a malformed one is.
    pub fn load_layered<T>(file_path: Option<&str>, env_prefix: &str) -> Result<T, ConfigError>
    where
        T: DeserializeOwned + Serialize + Default,
    {
        let defaults = Config::try_from(&T::default())
            .map_err(|e| ConfigError::Source(format!("Failed to encode defaults: {}", e)))?;

        let mut builder = Config::builder().add_source(defaults);
        if let Some(path) = file_path {
            if Path::new(path).exists() {
                let content = fs::read_to_string(path)?;
                builder = builder.add_source(File::from_str(&content, FileFormat::Toml));
            }
        }
        builder = builder.add_source(
            Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .map_err(|e| ConfigError::Source(format!("Failed to build config: {}", e)))?
            .try_deserialize::<T>()
            .map_err(|e| ConfigError::Source(format!("Failed to deserialize config: {}", e)))
    }

    /// Load configuration from a TOML file only.
    pub fn load_from_file<T: DeserializeOwned>(path: &str) -> Result<T, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: T = toml::from_str(&content)?;
        Ok(config)
    }
}
