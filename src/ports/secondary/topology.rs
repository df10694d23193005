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

use crate::domain::{
    CapacityBasis, CapacityError, InstanceGroup, RawCapacityText, TopologySourceError,
};
use async_trait::async_trait;

/// Secondary port - Deployment topology provider
///
/// Supplies the instance groups of a deployment and runs diagnostic probes on
/// their VMs. Implementations differ in where the manifest comes from and in
/// how capacity is resolved, but the capacity service treats them alike.
#[async_trait]
pub trait TopologySource: Send + Sync {
    /// Short name used in log messages
    fn name(&self) -> &'static str;

    /// List instance groups with running VMs, in manifest order
    ///
    /// # Returns
    /// * `Ok(Vec<InstanceGroup>)` - Groups with at least one instance that are not errands
    /// * `Err(TopologySourceError)` - Manifest unavailable, unparsable, or no matching product
    async fn list_scaled_groups(&self) -> Result<Vec<InstanceGroup>, TopologySourceError>;

    /// Run the diagnostic probe on a representative VM of `group`
    ///
    /// # Returns
    /// * `Ok(RawCapacityText)` - The probe's standard output
    /// * `Err(CapacityError)` - The probe failed for this group
    async fn fetch_raw_capacity(
        &self,
        group: &InstanceGroup,
    ) -> Result<RawCapacityText, CapacityError>;

    /// Resolve probe output into the capacity input for aggregation
    fn resolve_capacity(
        &self,
        group: &InstanceGroup,
        raw: &RawCapacityText,
    ) -> Result<CapacityBasis, CapacityError>;

    /// CLIs this source needs that are not installed
    async fn missing_dependencies(&self) -> Vec<String>;
}
