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

//! Topology read through the Ops Manager API

use super::bosh_cli::{representative_output, BoshCli};
use crate::domain::{
    adapter_for, filter_scaled_groups, find_deployed_product, parse_product_manifest,
    parse_thread_ratio, parse_vm_types, CapacityBasis, CapacityError, CommandError,
    DeployedProduct, InstanceGroup, OpsManagerTarget, OsFamily, RawCapacityText, SshResult,
    TopologySourceError,
};
use crate::ports::{CommandExecutor, SystemCommand, TopologySource};
use async_trait::async_trait;
use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

const VM_TYPES_PATH: &str = "/api/v0/vm_types";
const DEPLOYED_PRODUCTS_PATH: &str = "/api/v0/deployed/products";

/// Deployed product and the VM type catalog it is sized against
#[derive(Debug)]
struct Deployment {
    product: DeployedProduct,
    vm_types: HashMap<String, u32>,
}

/// Reads the product manifest and VM type catalog from Ops Manager
///
/// vCPUs come from the catalog; probes only supply the thread ratio. Linux
/// groups share one probe across every instance of the deployment.
pub struct OpsManagerTopologySource {
    command_executor: Arc<dyn CommandExecutor>,
    target: OpsManagerTarget,
    bosh: BoshCli,
    command_timeout: Duration,
    deployment: OnceCell<Deployment>,
    linux_probe: OnceCell<Result<Vec<SshResult>, String>>,
}

impl OpsManagerTopologySource {
    /// Create an Ops Manager topology source
    ///
    /// # Arguments
    /// * `command_executor` - Runs `om`
    /// * `target` - Ops Manager targeting and product type
    /// * `bosh` - Director used for probes; its deployment is replaced by the
    ///   product's installation name
    /// * `command_timeout` - Timeout for each API call
    pub fn new(
        command_executor: Arc<dyn CommandExecutor>,
        target: OpsManagerTarget,
        bosh: BoshCli,
        command_timeout: Duration,
    ) -> Self {
        Self {
            command_executor,
            target,
            bosh,
            command_timeout,
            deployment: OnceCell::new(),
            linux_probe: OnceCell::new(),
        }
    }

    /// `om curl` a path and return the response body
    async fn curl(&self, path: &str) -> Result<String, CommandError> {
        let mut cmd = SystemCommand::new("om").opt_arg("--target", self.target.target.as_deref());
        if self.target.skip_ssl_validation {
            cmd = cmd.arg("--skip-ssl-validation");
        }
        let cmd = cmd
            .args(&["curl", "--silent", "--path", path])
            .timeout(self.command_timeout);
        let output = self.command_executor.execute(&cmd).await?;
        Ok(output.into_success(&cmd)?.stdout)
    }

    async fn deployment(&self) -> Result<&Deployment, TopologySourceError> {
        self.deployment
            .get_or_try_init(|| async {
                let vm_types = self
                    .curl(VM_TYPES_PATH)
                    .await
                    .map_err(|e| TopologySourceError::VmTypesUnavailable(e.to_string()))
                    .and_then(|body| {
                        parse_vm_types(&body).map_err(TopologySourceError::VmTypesUnavailable)
                    })?;

                let products = self.curl(DEPLOYED_PRODUCTS_PATH).await?;
                let product = find_deployed_product(&products, &self.target.product_type)
                    .map_err(TopologySourceError::ManifestUnavailable)?
                    .ok_or_else(|| {
                        TopologySourceError::ProductNotFound(self.target.product_type.clone())
                    })?;

                debug!(
                    "Using {} product {} ({} VM types)",
                    product.product_type,
                    product.installation_name,
                    vm_types.len()
                );
                Ok::<_, TopologySourceError>(Deployment { product, vm_types })
            })
            .await
    }

    /// Results of `lscpu` across every instance, gathered on first use
    async fn linux_results(&self, deployment: &Deployment) -> &Result<Vec<SshResult>, String> {
        self.linux_probe
            .get_or_init(|| async {
                info!(
                    "Probing all instances of {} with lscpu.",
                    deployment.product.installation_name
                );
                let probe = adapter_for(OsFamily::Linux).probe_command();
                self.bosh
                    .for_deployment(&deployment.product.installation_name)
                    .ssh(None, probe, &deployment.product.installation_name)
                    .await
                    .map_err(|e| match e {
                        CapacityError::RemoteExecution { reason, .. } => reason,
                        other => other.to_string(),
                    })
            })
            .await
    }
}

#[async_trait]
impl TopologySource for OpsManagerTopologySource {
    fn name(&self) -> &'static str {
        "Ops Manager"
    }

    async fn list_scaled_groups(&self) -> Result<Vec<InstanceGroup>, TopologySourceError> {
        let deployment = self.deployment().await?;
        let path = format!(
            "{DEPLOYED_PRODUCTS_PATH}/{}/manifest",
            deployment.product.guid
        );
        let manifest = self.curl(&path).await?;
        let groups =
            parse_product_manifest(&manifest).map_err(TopologySourceError::ManifestInvalid)?;
        Ok(filter_scaled_groups(groups))
    }

    async fn fetch_raw_capacity(
        &self,
        group: &InstanceGroup,
    ) -> Result<RawCapacityText, CapacityError> {
        let deployment = self
            .deployment()
            .await
            .map_err(|e| CapacityError::remote(&group.name, e))?;

        match group.os_family {
            OsFamily::Linux => match self.linux_results(deployment).await {
                Ok(results) => representative_output(results, group),
                Err(reason) => Err(CapacityError::remote(&group.name, reason)),
            },
            OsFamily::Windows => {
                let instance = format!("{}/0", group.name);
                let probe = adapter_for(OsFamily::Windows).probe_command();
                let results = self
                    .bosh
                    .for_deployment(&deployment.product.installation_name)
                    .ssh(Some(&instance), probe, &group.name)
                    .await?;
                representative_output(&results, group)
            }
        }
    }

    fn resolve_capacity(
        &self,
        group: &InstanceGroup,
        raw: &RawCapacityText,
    ) -> Result<CapacityBasis, CapacityError> {
        let vm_types = &self
            .deployment
            .get()
            .ok_or(CapacityError::NotProbed)?
            .vm_types;
        let vcpus_per_instance = *vm_types
            .get(&group.vm_type)
            .ok_or_else(|| CapacityError::UnknownVmType(group.vm_type.clone()))?;
        let thread_ratio = parse_thread_ratio(raw)?;

        Ok(CapacityBasis::TypeTable {
            vcpus_per_instance,
            thread_ratio,
        })
    }

    async fn missing_dependencies(&self) -> Vec<String> {
        let mut missing = Vec::new();
        for program in ["om", "bosh"] {
            if !matches!(
                self.command_executor.is_command_available(program).await,
                Ok(true)
            ) {
                missing.push(program.to_string());
            }
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ScriptedCommandExecutor;
    use crate::domain::{aggregate, CoreCount};

    const VM_TYPES: &str = r#"{"vm_types": [
        {"name": "small", "ram": 8192, "cpu": 4, "ephemeral_disk": 16384},
        {"name": "large", "ram": 16384, "cpu": 8, "ephemeral_disk": 65536}
    ]}"#;

    const PRODUCTS: &str = r#"[
        {"installation_name": "p-bosh", "guid": "p-bosh-0a1b2c", "type": "p-bosh", "product_version": "3.0.12"},
        {"installation_name": "cf-9c8d7e", "guid": "cf-9c8d7e6f5a", "type": "cf", "product_version": "4.0.20"}
    ]"#;

    const MANIFEST: &str = r#"{"manifest": {
        "name": "cf-9c8d7e",
        "stemcells": [
            {"alias": "linux", "os": "ubuntu-jammy", "version": "1.404"},
            {"alias": "windows", "os": "windows2019", "version": "2019.71"}
        ],
        "instance_groups": [
            {"name": "cache", "instances": 5, "vm_type": "small", "stemcell": "linux"},
            {"name": "router", "instances": 2, "vm_type": "large", "stemcell": "linux"},
            {"name": "smoke_tests", "instances": 1, "lifecycle": "errand", "vm_type": "small", "stemcell": "linux"},
            {"name": "windows_cell", "instances": 1, "vm_type": "large", "stemcell": "windows"},
            {"name": "mystery", "instances": 1, "vm_type": "huge", "stemcell": "linux"}
        ]
    }}"#;

    const LSCPU: &str = "CPU(s):              4\nThread(s) per core:  2\nCore(s) per socket:  2\n";

    fn bulk_json() -> String {
        let rows: Vec<_> = ["cache/1f2e", "cache/3d4c", "router/5b6a", "mystery/7f8e"]
            .iter()
            .map(|instance| {
                serde_json::json!({
                    "instance": instance,
                    "stdout": LSCPU,
                    "stderr": "",
                    "exit_code": "0"
                })
            })
            .collect();
        serde_json::json!({"Tables": [{"Rows": rows}]}).to_string()
    }

    fn windows_json() -> String {
        serde_json::json!({"Tables": [{"Rows": [{
            "instance": "windows_cell/0",
            "stdout": "NumberOfCores=4\r\nNumberOfLogicalProcessors=8\r\n",
            "stderr": "",
            "exit_code": "0"
        }]}]})
        .to_string()
    }

    fn scripted() -> ScriptedCommandExecutor {
        ScriptedCommandExecutor::new()
            .on("--path /api/v0/vm_types", VM_TYPES)
            .on("--path /api/v0/deployed/products/cf-9c8d7e6f5a/manifest", MANIFEST)
            .on("--path /api/v0/deployed/products", PRODUCTS)
            .on("ssh -c lscpu", &bulk_json())
            .on("ssh windows_cell/0", &windows_json())
    }

    fn source(executor: Arc<ScriptedCommandExecutor>, target: OpsManagerTarget) -> OpsManagerTopologySource {
        let bosh = BoshCli::new(
            executor.clone(),
            Some("director".to_string()),
            None,
            Duration::from_secs(60),
            Duration::from_secs(300),
        );
        OpsManagerTopologySource::new(executor, target, bosh, Duration::from_secs(60))
    }

    fn target() -> OpsManagerTarget {
        OpsManagerTarget {
            target: Some("https://opsman.example.com".to_string()),
            skip_ssl_validation: true,
            ..OpsManagerTarget::default()
        }
    }

    async fn resolve_all(
        source: &OpsManagerTopologySource,
        groups: &[InstanceGroup],
    ) -> HashMap<String, Result<CapacityBasis, CapacityError>> {
        let mut capacities = HashMap::new();
        for group in groups {
            let basis = match source.fetch_raw_capacity(group).await {
                Ok(raw) => source.resolve_capacity(group, &raw),
                Err(e) => Err(e),
            };
            capacities.insert(group.name.clone(), basis);
        }
        capacities
    }

    #[tokio::test]
    async fn test_lists_groups_from_product_manifest() {
        let executor = Arc::new(scripted());
        let groups = source(executor.clone(), target())
            .list_scaled_groups()
            .await
            .unwrap();

        let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["cache", "router", "windows_cell", "mystery"]);
        assert_eq!(
            executor.executed_lines()[0],
            "om --target https://opsman.example.com --skip-ssl-validation curl --silent --path /api/v0/vm_types"
        );
    }

    #[tokio::test]
    async fn test_type_table_capacity() {
        let executor = Arc::new(scripted());
        let source = source(executor.clone(), target());
        let groups = source.list_scaled_groups().await.unwrap();
        let capacities = resolve_all(&source, &groups).await;

        assert_eq!(
            capacities["cache"],
            Ok(CapacityBasis::TypeTable {
                vcpus_per_instance: 4,
                thread_ratio: 2.0
            })
        );
        assert_eq!(
            capacities["mystery"],
            Err(CapacityError::UnknownVmType("huge".to_string()))
        );

        let report = aggregate(&groups, &capacities);
        let cache = &report.rows[0];
        assert_eq!(cache.name, "cache");
        assert_eq!(cache.total_vcpus, 20);
        assert_eq!(cache.total_cores, CoreCount::Derived(10.0));
        let windows = report.rows.iter().find(|r| r.name == "windows_cell").unwrap();
        assert_eq!(windows.total_vcpus, 8);
        assert_eq!(windows.total_cores, CoreCount::Derived(4.0));
        assert_eq!(report.failed_groups(), vec!["mystery"]);
    }

    #[tokio::test]
    async fn test_linux_probe_runs_once_per_source() {
        let executor = Arc::new(scripted());
        let source = source(executor.clone(), target());
        let groups = source.list_scaled_groups().await.unwrap();
        resolve_all(&source, &groups).await;

        let lines = executor.executed_lines();
        let bulk: Vec<&String> = lines.iter().filter(|l| l.contains("ssh -c lscpu")).collect();
        assert_eq!(
            bulk,
            vec!["bosh -e director -d cf-9c8d7e ssh -c lscpu -r --json"]
        );
        assert_eq!(
            lines.iter().filter(|l| l.contains("/api/v0/vm_types")).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_failed_bulk_ssh_fails_every_linux_group() {
        let executor = Arc::new(
            ScriptedCommandExecutor::new()
                .on("--path /api/v0/vm_types", VM_TYPES)
                .on("--path /api/v0/deployed/products/cf-9c8d7e6f5a/manifest", MANIFEST)
                .on("--path /api/v0/deployed/products", PRODUCTS)
                .fail(
                    "ssh -c lscpu",
                    1,
                    r#"{"Tables":null,"Lines":["Fetching info:","director unreachable","Exit code 1"]}"#,
                    "",
                ),
        );
        let source = source(executor, target());
        let groups = source.list_scaled_groups().await.unwrap();

        for name in ["cache", "router"] {
            let group = groups.iter().find(|g| g.name == name).unwrap();
            match source.fetch_raw_capacity(group).await.unwrap_err() {
                CapacityError::RemoteExecution { group, reason } => {
                    assert_eq!(group, name);
                    assert!(reason.contains("director unreachable"));
                }
                other => panic!("unexpected error {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_product_not_found() {
        let executor = Arc::new(scripted());
        let target = OpsManagerTarget {
            product_type: "p-isolation-segment".to_string(),
            ..target()
        };
        let err = source(executor, target).list_scaled_groups().await.unwrap_err();
        assert_eq!(
            err,
            TopologySourceError::ProductNotFound("p-isolation-segment".to_string())
        );
    }

    #[tokio::test]
    async fn test_vm_types_unavailable() {
        let executor = Arc::new(ScriptedCommandExecutor::new().fail(
            "vm_types",
            1,
            "",
            "could not reach Ops Manager",
        ));
        let err = source(executor, OpsManagerTarget::default())
            .list_scaled_groups()
            .await
            .unwrap_err();
        assert!(matches!(err, TopologySourceError::VmTypesUnavailable(_)));
    }

    #[tokio::test]
    async fn test_missing_dependencies() {
        let executor = Arc::new(ScriptedCommandExecutor::new().without("om"));
        assert_eq!(
            source(executor, target()).missing_dependencies().await,
            vec!["om"]
        );
    }
}
