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

//! Parsing of Ops Manager API documents returned by `om curl`

use super::manifest::parse_manifest_value;
use crate::domain::InstanceGroup;
use serde::Deserialize;
use std::collections::HashMap;

/// A product deployed by Ops Manager
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeployedProduct {
    /// Runtime-assigned identifier, also the BOSH deployment name
    pub installation_name: String,
    /// Product GUID used in API paths
    pub guid: String,
    /// Product type, e.g. `cf`
    #[serde(rename = "type")]
    pub product_type: String,
}

#[derive(Debug, Deserialize)]
struct VmTypeCatalog {
    vm_types: Vec<VmType>,
}

#[derive(Debug, Deserialize)]
struct VmType {
    name: String,
    cpu: u32,
}

/// Parse `/api/v0/vm_types` into a VM type name to vCPU count table
pub fn parse_vm_types(output: &str) -> Result<HashMap<String, u32>, String> {
    let catalog: VmTypeCatalog =
        serde_json::from_str(output).map_err(|e| format!("Invalid VM type catalog: {e}"))?;
    Ok(catalog
        .vm_types
        .into_iter()
        .map(|vm_type| (vm_type.name, vm_type.cpu))
        .collect())
}

/// Find the first deployed product of `product_type` in `/api/v0/deployed/products`
///
/// # Returns
/// * `Ok(Some(DeployedProduct))` - The matching product
/// * `Ok(None)` - No product of that type is deployed
/// * `Err(String)` - The listing could not be parsed
pub fn find_deployed_product(
    output: &str,
    product_type: &str,
) -> Result<Option<DeployedProduct>, String> {
    let products: Vec<DeployedProduct> = serde_json::from_str(output)
        .map_err(|e| format!("Invalid deployed product listing: {e}"))?;
    Ok(products
        .into_iter()
        .find(|product| product.product_type == product_type))
}

/// Parse `/api/v0/deployed/products/<guid>/manifest`
///
/// Ops Manager returns the manifest as JSON, either bare or under a `manifest` key.
pub fn parse_product_manifest(output: &str) -> Result<Vec<InstanceGroup>, String> {
    let mut document: serde_json::Value =
        serde_json::from_str(output).map_err(|e| format!("Invalid product manifest: {e}"))?;
    if let Some(manifest) = document.get_mut("manifest") {
        return parse_manifest_value(manifest.take());
    }
    parse_manifest_value(document)
}
