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

use super::aggregation::aggregate;
use crate::domain::{
    CapacityBasis, CapacityError, CapacityReport, InstanceGroup, ReportConfig, ReportError,
};
use crate::ports::{CapacityReportingService, TopologySource};
use async_trait::async_trait;
use log::{info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Domain service that implements capacity report generation
///
/// Lists scaled instance groups from the topology source, probes one VM per
/// group (concurrently, bounded by `max_concurrent_probes`) and aggregates the
/// results in manifest order.
pub struct CapacityCollectionService {
    /// Topology source (direct BOSH or Ops Manager)
    topology: Arc<dyn TopologySource>,
    /// Report configuration
    config: ReportConfig,
}

impl CapacityCollectionService {
    /// Create a new capacity collection service
    ///
    /// # Arguments
    /// * `topology` - Source of instance groups and probes
    /// * `config` - Report configuration
    pub fn new(topology: Arc<dyn TopologySource>, config: ReportConfig) -> Self {
        Self { topology, config }
    }

    /// Probe every group, one result slot per group position
    async fn collect_capacities(
        &self,
        groups: &[InstanceGroup],
    ) -> Vec<Result<CapacityBasis, CapacityError>> {
        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_probes.max(1)));

        let handles: Vec<_> = groups
            .iter()
            .cloned()
            .map(|group| {
                let topology = Arc::clone(&self.topology);
                let permits = Arc::clone(&permits);
                tokio::spawn(async move {
                    let _permit = permits
                        .acquire_owned()
                        .await
                        .map_err(|e| CapacityError::remote(&group.name, e))?;
                    info!("Fetching CPU data for {}.", group.name);
                    let raw = topology.fetch_raw_capacity(&group).await?;
                    topology.resolve_capacity(&group, &raw)
                })
            })
            .collect();

        let mut slots = Vec::with_capacity(handles.len());
        for (group, handle) in groups.iter().zip(handles) {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(CapacityError::remote(&group.name, e)),
            };
            if let Err(ref err) = result {
                warn!("{}: {}", group.name, err);
            }
            slots.push(result);
        }
        slots
    }
}

#[async_trait]
impl CapacityReportingService for CapacityCollectionService {
    async fn generate_report(&self) -> Result<CapacityReport, ReportError> {
        info!("Fetching deployed manifest from {}.", self.topology.name());
        let groups = self.topology.list_scaled_groups().await?;

        info!(
            "Fetching CPU data for {} instance groups (this may take some time).",
            groups.len()
        );
        let slots = self.collect_capacities(&groups).await;

        info!("Collating data...");
        let capacities: HashMap<String, Result<CapacityBasis, CapacityError>> = groups
            .iter()
            .map(|group| group.name.clone())
            .zip(slots)
            .collect();

        Ok(aggregate(&groups, &capacities))
    }

    async fn validate_dependencies(&self) -> Result<Vec<String>, ReportError> {
        Ok(self.topology.missing_dependencies().await)
    }
}
