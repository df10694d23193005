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

//! CPU capacity parsing for each supported guest platform

use super::common::{parse_key_values, strip_ansi_sequences, KeyValueOutput};
use crate::domain::{CapacityError, CapacityRecord, OsFamily, RawCapacityText};
use log::{debug, warn};

/// Turns a platform's diagnostic output into a [`CapacityRecord`]
///
/// One implementation exists per [`OsFamily`]; adding a platform means adding
/// an implementation and a match arm in [`adapter_for`].
pub trait PlatformCapacityAdapter: Send + Sync {
    /// OS family handled by this adapter
    fn os_family(&self) -> OsFamily;

    /// Shell command run on the VM to gather CPU topology
    fn probe_command(&self) -> &'static str;

    /// Delimiter between keys and values in the probe output
    fn delimiter(&self) -> char;

    /// Build a capacity record from parsed probe output
    fn capacity_record(&self, values: &KeyValueOutput) -> Result<CapacityRecord, CapacityError>;

    /// vCPUs per physical core
    fn thread_ratio(&self, values: &KeyValueOutput) -> Result<f64, CapacityError> {
        let record = self.capacity_record(values)?;
        Ok(record.logical_processors as f64 / record.cores_per_socket as f64)
    }

    /// Clean and split raw probe output with this platform's delimiter
    fn parse(&self, raw: &str) -> KeyValueOutput {
        let parsed = parse_key_values(&strip_ansi_sequences(raw), self.delimiter());
        for warning in &parsed.warnings {
            debug!(
                "Dropped unparsable {} probe line {}: {:?}",
                self.os_family(),
                warning.line_number,
                warning.line
            );
        }
        parsed
    }
}

/// Linux guests, measured with `lscpu`
pub struct LinuxCapacityAdapter;

/// Windows guests, measured with `wmic cpu`
pub struct WindowsCapacityAdapter;

pub const LSCPU_CORES_PER_SOCKET: &str = "Core(s) per socket";
pub const LSCPU_CPUS: &str = "CPU(s)";
pub const LSCPU_THREADS_PER_CORE: &str = "Thread(s) per core";
pub const WMIC_CORES: &str = "NumberOfCores";
pub const WMIC_LOGICAL_PROCESSORS: &str = "NumberOfLogicalProcessors";

impl PlatformCapacityAdapter for LinuxCapacityAdapter {
    fn os_family(&self) -> OsFamily {
        OsFamily::Linux
    }

    fn probe_command(&self) -> &'static str {
        "lscpu"
    }

    fn delimiter(&self) -> char {
        ':'
    }

    fn capacity_record(&self, values: &KeyValueOutput) -> Result<CapacityRecord, CapacityError> {
        Ok(CapacityRecord {
            cores_per_socket: positive_field(values, LSCPU_CORES_PER_SOCKET)?,
            logical_processors: positive_field(values, LSCPU_CPUS)?,
        })
    }

    fn thread_ratio(&self, values: &KeyValueOutput) -> Result<f64, CapacityError> {
        if values.get(LSCPU_THREADS_PER_CORE).is_some() {
            return positive_field(values, LSCPU_THREADS_PER_CORE).map(f64::from);
        }
        let record = self.capacity_record(values)?;
        Ok(record.logical_processors as f64 / record.cores_per_socket as f64)
    }
}

impl PlatformCapacityAdapter for WindowsCapacityAdapter {
    fn os_family(&self) -> OsFamily {
        OsFamily::Windows
    }

    fn probe_command(&self) -> &'static str {
        "wmic cpu get NumberOfCores,NumberOfLogicalProcessors /format:list"
    }

    fn delimiter(&self) -> char {
        '='
    }

    fn capacity_record(&self, values: &KeyValueOutput) -> Result<CapacityRecord, CapacityError> {
        Ok(CapacityRecord {
            cores_per_socket: positive_field(values, WMIC_CORES)?,
            logical_processors: positive_field(values, WMIC_LOGICAL_PROCESSORS)?,
        })
    }
}

static LINUX: LinuxCapacityAdapter = LinuxCapacityAdapter;
static WINDOWS: WindowsCapacityAdapter = WindowsCapacityAdapter;

/// Select the capacity adapter for an OS family
pub fn adapter_for(os_family: OsFamily) -> &'static dyn PlatformCapacityAdapter {
    match os_family {
        OsFamily::Linux => &LINUX,
        OsFamily::Windows => &WINDOWS,
    }
}

/// Parse a VM's raw probe output into a capacity record
///
/// # Arguments
/// * `raw` - Captured probe output with its OS family
///
/// # Returns
/// * `Ok(CapacityRecord)` - Cores per socket and logical processors
/// * `Err(CapacityError)` - A field is missing or not a positive integer
pub fn parse_capacity_record(raw: &RawCapacityText) -> Result<CapacityRecord, CapacityError> {
    let adapter = adapter_for(raw.os_family);
    let record = adapter.capacity_record(&adapter.parse(&raw.text))?;
    if !record.is_plausible() {
        warn!(
            "{} reports {} logical processors but {} cores per socket",
            raw.instance, record.logical_processors, record.cores_per_socket
        );
    }
    Ok(record)
}

/// Parse a VM's raw probe output into its vCPU-per-core ratio
pub fn parse_thread_ratio(raw: &RawCapacityText) -> Result<f64, CapacityError> {
    let adapter = adapter_for(raw.os_family);
    adapter.thread_ratio(&adapter.parse(&raw.text))
}

fn positive_field(values: &KeyValueOutput, field: &str) -> Result<u32, CapacityError> {
    let value = values.get(field).ok_or_else(|| CapacityError::MissingField {
        field: field.to_string(),
        dropped_lines: values.warnings.len(),
    })?;
    match value.parse::<u32>() {
        Ok(count) if count > 0 => Ok(count),
        _ => Err(CapacityError::MalformedValue {
            field: field.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LSCPU_OUTPUT: &str = "Architecture:                    x86_64\r\n\
CPU op-mode(s):                  32-bit, 64-bit\r\n\
Byte Order:                      Little Endian\r\n\
CPU(s):                          4\r\n\
On-line CPU(s) list:             0-3\r\n\
Thread(s) per core:              2\r\n\
Core(s) per socket:              2\r\n\
Socket(s):                       1\r\n\
Model name:                      Intel(R) Xeon(R) CPU @ 2.20GHz\r\n";

    const WMIC_OUTPUT: &str =
        "\r\r\n\r\r\nNumberOfCores=4\r\r\nNumberOfLogicalProcessors=8\r\r\n\r\r\n\r\r\n";

    fn raw(os_family: OsFamily, text: &str) -> RawCapacityText {
        RawCapacityText {
            group: "api".to_string(),
            instance: "api/0".to_string(),
            os_family,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_parse_lscpu_capacity() {
        let record = parse_capacity_record(&raw(OsFamily::Linux, LSCPU_OUTPUT)).unwrap();
        assert_eq!(
            record,
            CapacityRecord {
                cores_per_socket: 2,
                logical_processors: 4
            }
        );
    }

    #[test]
    fn test_parse_lscpu_with_escape_sequences() {
        let colored = "\x1b[1mCore(s) per socket:\x1b[0m 8\r\n\x1b[1mCPU(s):\x1b[0m 16\r\n";
        let record = parse_capacity_record(&raw(OsFamily::Linux, colored)).unwrap();
        assert_eq!(record.cores_per_socket, 8);
        assert_eq!(record.logical_processors, 16);
    }

    #[test]
    fn test_parse_wmic_capacity() {
        let record = parse_capacity_record(&raw(OsFamily::Windows, WMIC_OUTPUT)).unwrap();
        assert_eq!(
            record,
            CapacityRecord {
                cores_per_socket: 4,
                logical_processors: 8
            }
        );
    }

    #[test]
    fn test_missing_field() {
        let err = parse_capacity_record(&raw(OsFamily::Linux, "CPU(s): 4\r\ngarbage\r\n"))
            .unwrap_err();
        assert_eq!(
            err,
            CapacityError::MissingField {
                field: "Core(s) per socket".to_string(),
                dropped_lines: 1
            }
        );
    }

    #[test]
    fn test_malformed_values() {
        let err = parse_capacity_record(&raw(
            OsFamily::Windows,
            "NumberOfCores=four\r\nNumberOfLogicalProcessors=8\r\n",
        ))
        .unwrap_err();
        assert_eq!(
            err,
            CapacityError::MalformedValue {
                field: "NumberOfCores".to_string(),
                value: "four".to_string()
            }
        );

        let zero = parse_capacity_record(&raw(
            OsFamily::Linux,
            "Core(s) per socket: 0\r\nCPU(s): 4\r\n",
        ))
        .unwrap_err();
        assert!(matches!(zero, CapacityError::MalformedValue { .. }));
    }

    #[test]
    fn test_linux_output_does_not_satisfy_windows_adapter() {
        let err = parse_capacity_record(&raw(OsFamily::Windows, LSCPU_OUTPUT)).unwrap_err();
        assert!(matches!(err, CapacityError::MissingField { .. }));
    }

    #[test]
    fn test_thread_ratio() {
        assert_eq!(
            parse_thread_ratio(&raw(OsFamily::Linux, LSCPU_OUTPUT)).unwrap(),
            2.0
        );
        assert_eq!(
            parse_thread_ratio(&raw(OsFamily::Linux, "Core(s) per socket: 4\r\nCPU(s): 4\r\n"))
                .unwrap(),
            1.0
        );
        assert_eq!(
            parse_thread_ratio(&raw(OsFamily::Windows, WMIC_OUTPUT)).unwrap(),
            2.0
        );
    }

    #[test]
    fn test_adapter_selection() {
        assert_eq!(adapter_for(OsFamily::Linux).delimiter(), ':');
        assert_eq!(adapter_for(OsFamily::Linux).probe_command(), "lscpu");
        assert_eq!(adapter_for(OsFamily::Windows).delimiter(), '=');
        assert!(adapter_for(OsFamily::Windows)
            .probe_command()
            .starts_with("wmic cpu get"));
    }
}
