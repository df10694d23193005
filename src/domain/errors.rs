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

use std::time::Duration;
use thiserror::Error;

/// Errors raised while reading the deployment topology.
///
/// These are fatal: a run that cannot list its instance groups produces no rows.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TopologySourceError {
    /// The manifest (or API document) could not be fetched
    #[error("Manifest unavailable: {0}")]
    ManifestUnavailable(String),
    /// The manifest was fetched but could not be parsed
    #[error("Manifest could not be parsed: {0}")]
    ManifestInvalid(String),
    /// No deployed product of the expected type exists
    #[error("No deployed product of type '{0}' found")]
    ProductNotFound(String),
    /// The VM type catalog could not be fetched or parsed
    #[error("VM type catalog unavailable: {0}")]
    VmTypesUnavailable(String),
}

/// Per-group errors; these degrade a single row and never abort the run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CapacityError {
    /// The diagnostic probe failed for the group
    #[error("Remote execution failed for '{group}': {reason}")]
    RemoteExecution { group: String, reason: String },
    /// The probe output lacked an expected key
    #[error("Field '{field}' missing from probe output ({dropped_lines} unparsable lines dropped)")]
    MissingField { field: String, dropped_lines: usize },
    /// The probe output held a value that is not a positive integer
    #[error("Field '{field}' has malformed value '{value}'")]
    MalformedValue { field: String, value: String },
    /// The VM type is absent from the VM type catalog
    #[error("VM type '{0}' not found in VM type catalog")]
    UnknownVmType(String),
    /// The probed thread ratio cannot be divided by
    #[error("Invalid thread ratio {0}")]
    InvalidThreadRatio(f64),
    /// No capacity data was gathered for the group
    #[error("No capacity data collected")]
    NotProbed,
}

/// Failure to produce a row for one instance group.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Could not determine capacity for '{group}': {cause}")]
pub struct AggregationError {
    /// Instance group name
    pub group: String,
    /// Underlying per-group failure
    #[source]
    pub cause: CapacityError,
}

/// Errors specific to the capacity reporting service
#[derive(Debug, Clone, Error)]
pub enum ReportError {
    /// Topology could not be read
    #[error(transparent)]
    Topology(#[from] TopologySourceError),
}

/// Errors loading configuration
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file '{path}': {reason}")]
    Unreadable { path: String, reason: String },
    /// Config file is not valid TOML for the expected schema
    #[error("Invalid config file '{path}': {reason}")]
    Invalid { path: String, reason: String },
}

/// Command execution errors (adapter level, not exposed past the ports)
#[derive(Debug, Clone, Error)]
pub enum CommandError {
    /// Process could not be spawned
    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),
    /// Process did not finish in time
    #[error("Command '{command}' timed out after {timeout:?}")]
    TimedOut { command: String, timeout: Duration },
    /// Process exited unsuccessfully
    #[error("Command '{command}' failed{}", exit_detail(.exit_code, .stderr))]
    NonZeroExit {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },
}

fn exit_detail(exit_code: &Option<i32>, stderr: &str) -> String {
    let mut detail = String::new();
    if let Some(code) = exit_code {
        detail.push_str(&format!(" with exit code {code}"));
    }
    if !stderr.is_empty() {
        detail.push_str(&format!(": {stderr}"));
    }
    detail
}

impl CapacityError {
    /// Wrap a command failure as a remote execution error for `group`
    pub fn remote(group: &str, reason: impl ToString) -> Self {
        CapacityError::RemoteExecution {
            group: group.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<CommandError> for TopologySourceError {
    fn from(err: CommandError) -> Self {
        TopologySourceError::ManifestUnavailable(err.to_string())
    }
}
