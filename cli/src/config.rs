// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interfaces for parsing configuration files and rules files

use camino::Utf8Path;
use camino::Utf8PathBuf;
use dropshot::ConfigLogging;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;
use sgroups_rules::default_reqwest_client_builder;
use std::time::Duration;
use thiserror::Error;

/// How to reach the security-group registry
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    /// Base URL of the registry, e.g. `http://[::1]:9006`
    pub url: String,
    /// Overrides the default connect timeout
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    /// Overrides the default timeout for a whole request
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl RegistryConfig {
    pub fn reqwest_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        let mut builder = default_reqwest_client_builder();
        if let Some(secs) = self.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        builder.build()
    }
}

/// Configuration for the `sgroups-rules` tool
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub registry: RegistryConfig,
    /// Server-wide logging configuration.
    pub log: ConfigLogging,
}

impl Config {
    /// Load a `Config` from the given TOML file
    pub fn from_file(path: &Utf8Path) -> Result<Config, LoadError> {
        read_toml(path)
    }
}

/// Reads and parses any TOML document, such as a rules file.
pub fn read_toml<T: DeserializeOwned>(
    path: &Utf8Path,
) -> Result<T, LoadError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|err| LoadError::Io { path: path.into(), err })?;
    let parsed = toml::from_str(&contents)
        .map_err(|err| LoadError::Parse { path: path.into(), err })?;
    Ok(parsed)
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("error reading \"{path}\": {err}")]
    Io { path: Utf8PathBuf, err: std::io::Error },
    #[error("error parsing \"{path}\": {err}")]
    Parse { path: Utf8PathBuf, err: toml::de::Error },
}
