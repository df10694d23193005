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

use super::errors::AggregationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating system family of the VMs in an instance group
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OsFamily {
    Linux,
    Windows,
}

impl OsFamily {
    /// Infer the OS family from a stemcell alias or OS name
    pub fn from_stemcell(stemcell: &str) -> Self {
        if stemcell.to_lowercase().contains("windows") {
            OsFamily::Windows
        } else {
            OsFamily::Linux
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsFamily::Linux => write!(f, "linux"),
            OsFamily::Windows => write!(f, "windows"),
        }
    }
}

/// Lifecycle of an instance group
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleRole {
    /// Long running service VMs
    Normal,
    /// Errand VMs that only exist while the errand runs
    OneShot,
}

impl LifecycleRole {
    /// Map a manifest `lifecycle` value; anything other than `errand` is a service
    pub fn from_manifest(lifecycle: Option<&str>) -> Self {
        match lifecycle {
            Some("errand") => LifecycleRole::OneShot,
            _ => LifecycleRole::Normal,
        }
    }
}

/// A named, horizontally scaled set of identical VMs
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct InstanceGroup {
    /// Group name, unique within a manifest
    pub name: String,
    /// Number of instances declared in the manifest
    pub declared_instance_count: u32,
    /// VM type label
    pub vm_type: String,
    /// OS family, inferred from the stemcell
    pub os_family: OsFamily,
    /// Lifecycle role
    pub lifecycle_role: LifecycleRole,
}

impl InstanceGroup {
    /// Whether the group has running VMs whose capacity can be measured
    pub fn has_running_capacity(&self) -> bool {
        self.declared_instance_count > 0 && self.lifecycle_role != LifecycleRole::OneShot
    }
}

/// Per-VM CPU topology measurement
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct CapacityRecord {
    /// Physical cores per socket
    pub cores_per_socket: u32,
    /// vCPUs visible to the guest OS
    pub logical_processors: u32,
}

impl CapacityRecord {
    /// A record with fewer logical processors than cores points at a parsing problem
    pub fn is_plausible(&self) -> bool {
        self.logical_processors >= self.cores_per_socket
    }
}

/// Unparsed diagnostic output captured from one VM
#[derive(Debug, Clone, PartialEq)]
pub struct RawCapacityText {
    /// Owning instance group
    pub group: String,
    /// Instance identifier the output came from (e.g. `api/0` or `api/<uuid>`)
    pub instance: String,
    /// OS family of the instance, selects the platform adapter
    pub os_family: OsFamily,
    /// Captured standard output
    pub text: String,
}

/// Capacity input for one group, as resolved by a topology source
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CapacityBasis {
    /// Full per-VM measurement from a diagnostic probe
    Measured(CapacityRecord),
    /// vCPUs from a VM type catalog plus a probed vCPU-per-core ratio
    TypeTable {
        vcpus_per_instance: u32,
        thread_ratio: f64,
    },
}

/// Total core count for a group
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(untagged)]
pub enum CoreCount {
    /// Counted exactly from a per-VM measurement
    Exact(u64),
    /// Derived from vCPUs and a thread ratio; may be fractional
    Derived(f64),
}

/// Aggregated capacity of one instance group
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ScaledCapacity {
    /// Instance group name
    pub name: String,
    /// Number of instances declared in the manifest
    pub declared_instance_count: u32,
    /// VM type label
    pub vm_type: String,
    /// vCPUs across all instances
    pub total_vcpus: u64,
    /// Cores across all instances
    pub total_cores: CoreCount,
}

/// Result of one run: rows in manifest order plus the groups that failed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapacityReport {
    /// Successfully aggregated groups
    pub rows: Vec<ScaledCapacity>,
    /// Groups without resolvable capacity data
    pub failures: Vec<AggregationError>,
}

impl CapacityReport {
    /// Names of the groups that could not be reported, in manifest order
    pub fn failed_groups(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.group.as_str()).collect()
    }
}

/// Configuration for report generation
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ReportConfig {
    /// Upper bound on probes in flight at once
    pub max_concurrent_probes: usize,
    /// Timeout for each diagnostic probe in seconds
    pub probe_timeout_secs: u64,
    /// Timeout for manifest and API commands in seconds
    pub command_timeout_secs: u64,
    /// Enable verbose output
    pub verbose: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            max_concurrent_probes: 4,
            probe_timeout_secs: 300,
            command_timeout_secs: 60,
            verbose: false,
        }
    }
}

/// BOSH director targeting; unset values fall back to the CLI's own environment
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct BoshTarget {
    /// Director alias or URL (`bosh -e`)
    pub environment: Option<String>,
    /// Deployment name (`bosh -d`)
    pub deployment: Option<String>,
}

/// Ops Manager targeting
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct OpsManagerTarget {
    /// Ops Manager URL (`om --target`)
    pub target: Option<String>,
    /// Pass `--skip-ssl-validation` to `om`
    pub skip_ssl_validation: bool,
    /// Deployed product type whose manifest is inspected
    pub product_type: String,
    /// BOSH director used for probes (`bosh -e`)
    pub bosh_environment: Option<String>,
}

impl Default for OpsManagerTarget {
    fn default() -> Self {
        Self {
            target: None,
            skip_ssl_validation: false,
            product_type: "cf".to_string(),
            bosh_environment: None,
        }
    }
}

/// Where the topology is read from
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Manifest straight from the BOSH director
    Bosh(BoshTarget),
    /// Manifest and VM type catalog through Ops Manager
    OpsManager(OpsManagerTarget),
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Bosh(BoshTarget::default())
    }
}
