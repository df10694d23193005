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

//! Parsing of `bosh ssh --results --json` output

use serde::Deserialize;
use std::fmt;

/// Remote exit status as reported in a `bosh ssh` result row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    /// bosh left the exit code empty
    Unknown,
    Code(i32),
    /// bosh reported something that is not an exit code
    Unreadable(String),
}

impl ExitStatus {
    fn from_field(field: Option<&str>) -> Self {
        match field.map(str::trim) {
            None | Some("") => ExitStatus::Unknown,
            Some(code) => code
                .parse()
                .map(ExitStatus::Code)
                .unwrap_or_else(|_| ExitStatus::Unreadable(code.to_string())),
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Unknown => write!(f, "unknown status"),
            ExitStatus::Code(code) => write!(f, "{code}"),
            ExitStatus::Unreadable(value) => write!(f, "unreadable status '{value}'"),
        }
    }
}

/// Output of one instance in a `bosh ssh` run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshResult {
    /// Instance identifier, `<group>/<index or uuid>`
    pub instance: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_status: ExitStatus,
}

impl SshResult {
    /// Instance group part of the instance identifier
    pub fn group(&self) -> &str {
        self.instance
            .split_once('/')
            .map(|(group, _)| group)
            .unwrap_or(&self.instance)
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.exit_status, ExitStatus::Unknown | ExitStatus::Code(0))
    }
}

/// Everything a `bosh ssh -r --json` run printed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SshOutput {
    /// One entry per row across all tables
    pub results: Vec<SshResult>,
    /// Free-form CLI messages, including the error when the run failed
    pub lines: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BoshJsonOutput {
    #[serde(default)]
    tables: Option<Vec<BoshTable>>,
    #[serde(default)]
    lines: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BoshTable {
    #[serde(default)]
    rows: Option<Vec<BoshSshRow>>,
}

#[derive(Debug, Deserialize)]
struct BoshSshRow {
    #[serde(default)]
    instance: String,
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    stderr: String,
    #[serde(default)]
    exit_code: Option<String>,
}

/// Parse the JSON document printed by `bosh ssh -r --json`
///
/// # Arguments
/// * `output` - JSON document printed by the bosh CLI
///
/// # Returns
/// * `Ok(SshOutput)` - Result rows and CLI messages
/// * `Err(String)` - The output is not bosh JSON
pub fn parse_ssh_output(output: &str) -> Result<SshOutput, String> {
    let parsed: BoshJsonOutput =
        serde_json::from_str(output).map_err(|e| format!("Invalid bosh JSON output: {e}"))?;

    let results = parsed
        .tables
        .unwrap_or_default()
        .into_iter()
        .flat_map(|table| table.rows.unwrap_or_default())
        .map(|row| SshResult {
            exit_status: ExitStatus::from_field(row.exit_code.as_deref()),
            instance: row.instance,
            stdout: row.stdout,
            stderr: row.stderr,
        })
        .collect();

    Ok(SshOutput {
        results,
        lines: parsed.lines.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SSH_OUTPUT: &str = r#"{
    "Tables": [
        {
            "Content": "",
            "Header": {
                "exit_code": "Exit Code",
                "host": "Host",
                "instance": "Instance",
                "stderr": "Stderr",
                "stdout": "Stdout"
            },
            "Rows": [
                {
                    "exit_code": "0",
                    "host": "10.0.1.12",
                    "instance": "api/5c4bd4c1-ec1b-4b4f-a5b4-3c0ae6a8d3a1",
                    "stderr": "Unauthorized use is strictly prohibited.\r\n",
                    "stdout": "CPU(s):  4\r\nCore(s) per socket:  2\r\n"
                },
                {
                    "exit_code": "1",
                    "host": "10.0.1.13",
                    "instance": "worker/0f6e",
                    "stderr": "lscpu: not found\r\n",
                    "stdout": ""
                }
            ],
            "Notes": null
        }
    ],
    "Blocks": null,
    "Lines": ["Using environment '10.0.0.6' as client 'admin'", "Succeeded"]
}"#;

    #[test]
    fn test_parse_ssh_output() {
        let output = parse_ssh_output(SSH_OUTPUT).unwrap();
        let results = &output.results;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].group(), "api");
        assert_eq!(results[0].exit_status, ExitStatus::Code(0));
        assert!(results[0].succeeded());
        assert!(results[0].stdout.contains("CPU(s)"));
        assert_eq!(results[1].group(), "worker");
        assert!(!results[1].succeeded());
        assert_eq!(output.lines.last().map(String::as_str), Some("Succeeded"));
    }

    #[test]
    fn test_parse_ssh_output_without_tables() {
        let output = parse_ssh_output(r#"{"Tables": null, "Lines": ["Succeeded"]}"#).unwrap();
        assert!(output.results.is_empty());
        assert_eq!(output.lines, vec!["Succeeded"]);
        assert_eq!(parse_ssh_output("{}").unwrap(), SshOutput::default());
    }

    #[test]
    fn test_parse_ssh_output_rejects_plain_text() {
        assert!(parse_ssh_output("Expected non-empty deployment name").is_err());
    }

    #[test]
    fn test_instance_without_slash_is_its_own_group() {
        let result = SshResult {
            instance: "api".to_string(),
            stdout: String::new(),
            stderr: String::new(),
            exit_status: ExitStatus::Unknown,
        };
        assert_eq!(result.group(), "api");
        assert!(result.succeeded());
    }

    fn row_with_exit_code(exit_code: &str) -> SshResult {
        let document = serde_json::json!({"Tables": [{"Rows": [{
            "instance": "api/0",
            "stdout": "",
            "stderr": "",
            "exit_code": exit_code
        }]}]});
        parse_ssh_output(&document.to_string())
            .unwrap()
            .results
            .remove(0)
    }

    #[test]
    fn test_exit_status_readings() {
        assert_eq!(row_with_exit_code(" ").exit_status, ExitStatus::Unknown);
        assert!(row_with_exit_code("").succeeded());
        assert!(row_with_exit_code("0").succeeded());
        assert!(!row_with_exit_code("255").succeeded());
    }

    #[test]
    fn test_unreadable_exit_code_is_failure() {
        let result = row_with_exit_code("killed");
        assert_eq!(
            result.exit_status,
            ExitStatus::Unreadable("killed".to_string())
        );
        assert!(!result.succeeded());
        assert_eq!(result.exit_status.to_string(), "unreadable status 'killed'");
    }
}
