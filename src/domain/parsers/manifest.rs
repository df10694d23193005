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

//! Deployment manifest parsing
//!
//! Only the fields needed to size instance groups are read; everything else in
//! the manifest is ignored.

use crate::domain::{InstanceGroup, LifecycleRole, OsFamily};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ManifestDocument {
    instance_groups: Option<Vec<ManifestInstanceGroup>>,
    #[serde(default)]
    stemcells: Vec<ManifestStemcell>,
}

#[derive(Debug, Deserialize)]
struct ManifestInstanceGroup {
    name: String,
    #[serde(default)]
    instances: u32,
    #[serde(default)]
    vm_type: Option<String>,
    #[serde(default)]
    lifecycle: Option<String>,
    #[serde(default)]
    stemcell: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ManifestStemcell {
    alias: String,
    #[serde(default)]
    os: Option<String>,
}

impl ManifestDocument {
    fn os_family(&self, stemcell_alias: Option<&str>) -> OsFamily {
        let Some(alias) = stemcell_alias else {
            return OsFamily::Linux;
        };
        if OsFamily::from_stemcell(alias) == OsFamily::Windows {
            return OsFamily::Windows;
        }
        self.stemcells
            .iter()
            .find(|stemcell| stemcell.alias == alias)
            .and_then(|stemcell| stemcell.os.as_deref())
            .map(OsFamily::from_stemcell)
            .unwrap_or(OsFamily::Linux)
    }
}

/// Parse every instance group of a YAML (or JSON) manifest, in manifest order
///
/// # Arguments
/// * `manifest` - Manifest text as printed by `bosh manifest`
///
/// # Returns
/// * `Ok(Vec<InstanceGroup>)` - All instance groups, including errands and
///   groups scaled to zero
/// * `Err(String)` - Not a manifest, or no `instance_groups` key
pub fn parse_manifest_groups(manifest: &str) -> Result<Vec<InstanceGroup>, String> {
    let document: ManifestDocument =
        serde_yaml_ng::from_str(manifest).map_err(|e| format!("Invalid manifest: {e}"))?;
    groups_from_document(document)
}

/// Parse instance groups from a manifest already decoded as JSON
pub fn parse_manifest_value(manifest: serde_json::Value) -> Result<Vec<InstanceGroup>, String> {
    let document: ManifestDocument =
        serde_json::from_value(manifest).map_err(|e| format!("Invalid manifest: {e}"))?;
    groups_from_document(document)
}

fn groups_from_document(document: ManifestDocument) -> Result<Vec<InstanceGroup>, String> {
    let manifest_groups = document
        .instance_groups
        .as_ref()
        .ok_or_else(|| "Manifest has no instance_groups".to_string())?;

    Ok(manifest_groups
        .iter()
        .map(|group| InstanceGroup {
            name: group.name.clone(),
            declared_instance_count: group.instances,
            vm_type: group.vm_type.clone().unwrap_or_default(),
            os_family: document.os_family(group.stemcell.as_deref()),
            lifecycle_role: LifecycleRole::from_manifest(group.lifecycle.as_deref()),
        })
        .collect())
}

/// Keep only groups with running VMs, preserving order
pub fn filter_scaled_groups(groups: Vec<InstanceGroup>) -> Vec<InstanceGroup> {
    groups
        .into_iter()
        .filter(InstanceGroup::has_running_capacity)
        .collect()
}
