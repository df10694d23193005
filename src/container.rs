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

//! Dependency injection container for capacity reporting services

use crate::adapters::{
    BoshCli, BoshTopologySource, OpsManagerTopologySource, UnixCommandExecutor,
};
use crate::domain::{CapacityCollectionService, ConfigError, ReportConfig, SourceConfig};
use crate::ports::{
    CapacityReportingService, CommandExecutor, ConfigurationProvider, TopologySource,
};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for the dependency injection container
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// Timeout for manifest and API commands
    pub command_timeout: Duration,
    /// Timeout for each diagnostic probe
    pub probe_timeout: Duration,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self::from(&ReportConfig::default())
    }
}

impl From<&ReportConfig> for ContainerConfig {
    fn from(report: &ReportConfig) -> Self {
        Self {
            command_timeout: Duration::from_secs(report.command_timeout_secs),
            probe_timeout: Duration::from_secs(report.probe_timeout_secs),
        }
    }
}

/// Simple configuration provider implementation
pub struct SimpleConfigurationProvider {
    report: ReportConfig,
    source: SourceConfig,
}

impl SimpleConfigurationProvider {
    pub fn new(report: ReportConfig, source: SourceConfig) -> Self {
        Self { report, source }
    }
}

#[async_trait::async_trait]
impl ConfigurationProvider for SimpleConfigurationProvider {
    async fn get_report_config(&self) -> Result<ReportConfig, ConfigError> {
        Ok(self.report.clone())
    }

    async fn get_source_config(&self) -> Result<SourceConfig, ConfigError> {
        Ok(self.source.clone())
    }
}

/// Dependency injection container
pub struct ServiceContainer {
    config: ContainerConfig,
}

impl ServiceContainer {
    /// Create a new service container with configuration
    pub fn new(config: ContainerConfig) -> Self {
        Self { config }
    }

    /// Create the command executor
    pub fn create_command_executor(&self) -> Arc<dyn CommandExecutor> {
        Arc::new(UnixCommandExecutor::new(self.config.command_timeout))
    }

    fn create_bosh_cli(
        &self,
        command_executor: Arc<dyn CommandExecutor>,
        environment: Option<String>,
        deployment: Option<String>,
    ) -> BoshCli {
        BoshCli::new(
            command_executor,
            environment,
            deployment,
            self.config.command_timeout,
            self.config.probe_timeout,
        )
    }

    /// Create the topology source selected by `source`
    pub fn create_topology_source(&self, source: &SourceConfig) -> Arc<dyn TopologySource> {
        let command_executor = self.create_command_executor();

        match source {
            SourceConfig::Bosh(target) => {
                let bosh = self.create_bosh_cli(
                    Arc::clone(&command_executor),
                    target.environment.clone(),
                    target.deployment.clone(),
                );
                Arc::new(BoshTopologySource::new(bosh, command_executor))
            }
            SourceConfig::OpsManager(target) => {
                let bosh = self.create_bosh_cli(
                    Arc::clone(&command_executor),
                    target.bosh_environment.clone(),
                    None,
                );
                Arc::new(OpsManagerTopologySource::new(
                    command_executor,
                    target.clone(),
                    bosh,
                    self.config.command_timeout,
                ))
            }
        }
    }

    /// Create the complete capacity reporting service
    pub fn create_capacity_reporting_service(
        &self,
        source: &SourceConfig,
        report: ReportConfig,
    ) -> Arc<dyn CapacityReportingService> {
        let topology = self.create_topology_source(source);
        Arc::new(CapacityCollectionService::new(topology, report))
    }

    /// Create the reporting service from whatever `provider` supplies
    pub async fn create_from_provider(
        &self,
        provider: &dyn ConfigurationProvider,
    ) -> Result<Arc<dyn CapacityReportingService>, ConfigError> {
        let report = provider.get_report_config().await?;
        let source = provider.get_source_config().await?;
        Ok(self.create_capacity_reporting_service(&source, report))
    }
}

impl Default for ServiceContainer {
    fn default() -> Self {
        Self::new(ContainerConfig::default())
    }
}

/// Builder pattern for container configuration
pub struct ContainerConfigBuilder {
    config: ContainerConfig,
}

impl ContainerConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self {
            config: ContainerConfig::default(),
        }
    }

    /// Set command timeout
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.config.command_timeout = timeout;
        self
    }

    /// Set probe timeout
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.config.probe_timeout = timeout;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ContainerConfig {
        self.config
    }
}

impl Default for ContainerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
