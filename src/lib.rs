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

//! Capacity Report Library
//!
//! Reports the vCPU and physical core footprint of every instance group in a
//! BOSH deployment, read either from the director directly or through Ops
//! Manager. One VM per group is probed and the result is scaled by the
//! group's declared instance count.
//!
//! # Architecture
//!
//! - **Domain**: Entities, probe output parsers, aggregation and rendering
//! - **Ports**: Interfaces for the reporting service, CLIs, topology and config
//! - **Adapters**: `bosh`/`om` backed topology sources, command execution, TOML config
//!
//! # Usage
//!
//! ```rust,no_run
//! use capacity_report::{render_table, ReportConfig, SourceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = capacity_report::create_service(&SourceConfig::default(), ReportConfig::default());
//!     let report = service.generate_report().await?;
//!     print!("{}", render_table(&report.rows));
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod container;
pub mod domain;
pub mod ports;

pub use adapters::{
    BoshTopologySource, OpsManagerTopologySource, TomlConfigurationProvider, UnixCommandExecutor,
};
pub use container::{
    ContainerConfig, ContainerConfigBuilder, ServiceContainer, SimpleConfigurationProvider,
};
pub use domain::{
    render_failures, render_table, BoshTarget, CapacityReport, ConfigError, OpsManagerTarget,
    ReportConfig, ReportError, ScaledCapacity, SourceConfig,
};
pub use ports::{
    CapacityReportingService, CommandExecutor, ConfigurationProvider, TopologySource,
};

use std::sync::Arc;

/// Create a capacity reporting service for `source`
///
/// Timeouts for commands and probes are taken from `report`.
///
/// # Example
///
/// ```rust,no_run
/// use capacity_report::{create_service, OpsManagerTarget, ReportConfig, SourceConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let source = SourceConfig::OpsManager(OpsManagerTarget::default());
///     let service = create_service(&source, ReportConfig::default());
///     let report = service.generate_report().await?;
///     println!("{} groups measured", report.rows.len());
///     Ok(())
/// }
/// ```
pub fn create_service(
    source: &SourceConfig,
    report: ReportConfig,
) -> Arc<dyn CapacityReportingService> {
    let container = ServiceContainer::new(ContainerConfig::from(&report));
    container.create_capacity_reporting_service(source, report)
}

/// Create a capacity reporting service with custom container configuration
///
/// # Arguments
/// * `container_config` - Timeouts used by the command executor and probes
/// * `source` - Topology source and targeting
/// * `report` - Report configuration
pub fn create_service_with_config(
    container_config: ContainerConfig,
    source: &SourceConfig,
    report: ReportConfig,
) -> Arc<dyn CapacityReportingService> {
    ServiceContainer::new(container_config).create_capacity_reporting_service(source, report)
}

/// List the CLIs `source` needs that are not installed
///
/// # Example
///
/// ```rust,no_run
/// use capacity_report::{validate_dependencies, SourceConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let missing = validate_dependencies(&SourceConfig::default()).await?;
///     if !missing.is_empty() {
///         println!("Missing dependencies: {:?}", missing);
///     }
///     Ok(())
/// }
/// ```
pub async fn validate_dependencies(source: &SourceConfig) -> Result<Vec<String>, ReportError> {
    create_service(source, ReportConfig::default())
        .validate_dependencies()
        .await
}
