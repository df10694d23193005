/*
Copyright 2024 San Francisco Compute Company

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! TOML file configuration adapter

use crate::domain::{ConfigError, ReportConfig, SourceConfig};
use crate::ports::ConfigurationProvider;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;

/// On-disk layout; both tables are optional
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    report: ReportConfig,
    source: SourceConfig,
}

/// Configuration loaded from a TOML file
///
/// ```toml
/// [report]
/// max_concurrent_probes = 8
///
/// [source]
/// kind = "ops_manager"
/// target = "https://opsman.example.com"
/// ```
#[derive(Debug)]
pub struct TomlConfigurationProvider {
    report: ReportConfig,
    source: SourceConfig,
}

impl TomlConfigurationProvider {
    /// Read and validate the file at `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: display.clone(),
            reason: e.to_string(),
        })?;
        let file: ConfigFile = toml::from_str(&text).map_err(|e| ConfigError::Invalid {
            path: display,
            reason: e.to_string(),
        })?;

        Ok(Self {
            report: file.report,
            source: file.source,
        })
    }
}

#[async_trait]
impl ConfigurationProvider for TomlConfigurationProvider {
    async fn get_report_config(&self) -> Result<ReportConfig, ConfigError> {
        Ok(self.report.clone())
    }

    async fn get_source_config(&self) -> Result<SourceConfig, ConfigError> {
        Ok(self.source.clone())
    }
}
