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

//! Topology read straight from a BOSH director

use super::bosh_cli::{representative_output, BoshCli};
use crate::domain::{
    adapter_for, filter_scaled_groups, parse_capacity_record, parse_manifest_groups,
    CapacityBasis, CapacityError, InstanceGroup, RawCapacityText, TopologySourceError,
};
use crate::ports::{CommandExecutor, TopologySource};
use async_trait::async_trait;
use log::debug;
use std::sync::Arc;

/// Reads the deployment manifest from the director and measures each group
/// by probing its first instance
pub struct BoshTopologySource {
    bosh: BoshCli,
    command_executor: Arc<dyn CommandExecutor>,
}

impl BoshTopologySource {
    pub fn new(bosh: BoshCli, command_executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            bosh,
            command_executor,
        }
    }
}

#[async_trait]
impl TopologySource for BoshTopologySource {
    fn name(&self) -> &'static str {
        "BOSH director"
    }

    async fn list_scaled_groups(&self) -> Result<Vec<InstanceGroup>, TopologySourceError> {
        let manifest = self.bosh.manifest().await?;
        let groups = parse_manifest_groups(&manifest).map_err(TopologySourceError::ManifestInvalid)?;
        let total = groups.len();
        let scaled = filter_scaled_groups(groups);
        debug!("{} of {total} instance groups have running VMs", scaled.len());
        Ok(scaled)
    }

    async fn fetch_raw_capacity(
        &self,
        group: &InstanceGroup,
    ) -> Result<RawCapacityText, CapacityError> {
        let instance = format!("{}/0", group.name);
        let probe = adapter_for(group.os_family).probe_command();
        let results = self.bosh.ssh(Some(&instance), probe, &group.name).await?;
        representative_output(&results, group)
    }

    fn resolve_capacity(
        &self,
        _group: &InstanceGroup,
        raw: &RawCapacityText,
    ) -> Result<CapacityBasis, CapacityError> {
        parse_capacity_record(raw).map(CapacityBasis::Measured)
    }

    async fn missing_dependencies(&self) -> Vec<String> {
        match self.command_executor.is_command_available("bosh").await {
            Ok(true) => Vec::new(),
            _ => vec!["bosh".to_string()],
        }
    }
}
