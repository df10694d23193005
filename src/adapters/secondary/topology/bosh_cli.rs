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

//! Thin wrapper over the `bosh` CLI shared by both topology sources

use crate::domain::{
    parse_ssh_output, CapacityError, InstanceGroup, RawCapacityText, SshResult,
    TopologySourceError,
};
use crate::ports::{CommandExecutor, SystemCommand};
use std::sync::Arc;
use std::time::Duration;

/// Runs `bosh` commands against a fixed director and deployment
pub struct BoshCli {
    command_executor: Arc<dyn CommandExecutor>,
    environment: Option<String>,
    deployment: Option<String>,
    command_timeout: Duration,
    probe_timeout: Duration,
}

impl BoshCli {
    /// Create a bosh CLI wrapper
    ///
    /// Unset `environment`/`deployment` leave targeting to `BOSH_ENVIRONMENT`
    /// and `BOSH_DEPLOYMENT` in the CLI's own environment.
    pub fn new(
        command_executor: Arc<dyn CommandExecutor>,
        environment: Option<String>,
        deployment: Option<String>,
        command_timeout: Duration,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            command_executor,
            environment,
            deployment,
            command_timeout,
            probe_timeout,
        }
    }

    /// The same director, targeting a different deployment
    pub fn for_deployment(&self, deployment: &str) -> Self {
        Self {
            command_executor: Arc::clone(&self.command_executor),
            environment: self.environment.clone(),
            deployment: Some(deployment.to_string()),
            command_timeout: self.command_timeout,
            probe_timeout: self.probe_timeout,
        }
    }

    fn command(&self) -> SystemCommand {
        SystemCommand::new("bosh")
            .env_vars(vec![("BOSH_NON_INTERACTIVE", "true")])
            .opt_arg("-e", self.environment.as_deref())
            .opt_arg("-d", self.deployment.as_deref())
    }

    /// Fetch the deployed manifest text
    pub async fn manifest(&self) -> Result<String, TopologySourceError> {
        let cmd = self.command().arg("manifest").timeout(self.command_timeout);
        let output = self.command_executor.execute(&cmd).await?;
        Ok(output.into_success(&cmd)?.stdout)
    }

    /// Run `script` over ssh and collect per-instance results
    ///
    /// # Arguments
    /// * `instance` - Instance slug (`group/0`), or `None` for every instance
    ///   of the deployment
    /// * `script` - Shell command to run on the VMs
    /// * `group` - Group the failure is attributed to
    pub async fn ssh(
        &self,
        instance: Option<&str>,
        script: &str,
        group: &str,
    ) -> Result<Vec<SshResult>, CapacityError> {
        let mut cmd = self.command().arg("ssh");
        if let Some(instance) = instance {
            cmd = cmd.arg(instance);
        }
        let cmd = cmd
            .args(&["-c", script, "-r", "--json"])
            .timeout(self.probe_timeout);

        let output = self
            .command_executor
            .execute(&cmd)
            .await
            .map_err(|e| CapacityError::remote(group, e))?;

        let parsed = match parse_ssh_output(&output.stdout) {
            Ok(parsed) => parsed,
            Err(parse_error) => {
                return match output.into_success(&cmd) {
                    Ok(_) => Err(CapacityError::remote(group, parse_error)),
                    Err(e) => Err(CapacityError::remote(group, e)),
                };
            }
        };

        // bosh exits non-zero when any instance fails but still prints the results
        let answered = match instance {
            Some(instance) => {
                let wanted = instance.split_once('/').map_or(instance, |(name, _)| name);
                parsed.results.iter().any(|result| result.group() == wanted)
            }
            None => !parsed.results.is_empty(),
        };
        if answered {
            return Ok(parsed.results);
        }

        match output.into_success(&cmd) {
            Ok(_) => Ok(parsed.results),
            Err(e) if parsed.lines.is_empty() => Err(CapacityError::remote(group, e)),
            Err(e) => Err(CapacityError::remote(
                group,
                format!("{e}: {}", parsed.lines.join("; ")),
            )),
        }
    }
}

/// Pick the first result belonging to `group` as its representative output
pub fn representative_output(
    results: &[SshResult],
    group: &InstanceGroup,
) -> Result<RawCapacityText, CapacityError> {
    let result = results
        .iter()
        .find(|result| result.group() == group.name)
        .ok_or_else(|| CapacityError::remote(&group.name, "no instance returned output"))?;

    if !result.succeeded() {
        return Err(CapacityError::remote(
            &group.name,
            format!(
                "{} exited with {}: {}",
                result.instance,
                result.exit_status,
                result.stderr.trim()
            ),
        ));
    }

    Ok(RawCapacityText {
        group: group.name.clone(),
        instance: result.instance.clone(),
        os_family: group.os_family,
        text: result.stdout.clone(),
    })
}
