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

use crate::domain::{CapacityReport, ReportError};
use async_trait::async_trait;

/// Primary port - Main interface offered by the capacity reporting domain
///
/// This is what external systems (CLI, library consumers) use to interact
/// with the capacity reporting functionality.
#[async_trait]
pub trait CapacityReportingService: Send + Sync {
    /// Generate a capacity report for every scaled instance group
    ///
    /// # Returns
    /// * `Ok(CapacityReport)` - Rows in manifest order plus per-group failures
    /// * `Err(ReportError)` - The topology could not be read at all
    async fn generate_report(&self) -> Result<CapacityReport, ReportError>;

    /// Validate CLI dependencies and return missing requirements
    ///
    /// # Returns
    /// * `Ok(Vec<String>)` - List of missing commands (empty if all present)
    /// * `Err(ReportError)` - Error occurred during validation
    async fn validate_dependencies(&self) -> Result<Vec<String>, ReportError>;
}
