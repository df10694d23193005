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

//! Common parsing utilities: terminal output cleaning and key-value splitting

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    /// 7-bit C1 escapes (`ESC` + `@`..`Z`, `\`..`_`) and CSI sequences
    /// (`ESC [` + parameter bytes + intermediate bytes + final byte)
    pub static ref ANSI_ESCAPE_RE: Regex =
        Regex::new(r"\x1B(?:[\x40-\x5A\x5C-\x5F]|\[[\x30-\x3F]*[\x20-\x2F]*[\x40-\x7E])").unwrap();
}

/// Remove ANSI/VT100 escape sequences from captured terminal output
///
/// Removal is repeated until nothing matches, so a sequence that only forms
/// once an inner one is removed is stripped as well. The result therefore never
/// contains a sequence and cleaning it again is a no-op.
///
/// # Arguments
/// * `output` - Raw command output, possibly containing escape sequences
///
/// # Returns
/// * Output with every escape sequence removed
pub fn strip_ansi_sequences(output: &str) -> String {
    let mut cleaned = output.to_string();
    while ANSI_ESCAPE_RE.is_match(&cleaned) {
        cleaned = ANSI_ESCAPE_RE.replace_all(&cleaned, "").into_owned();
    }
    cleaned
}

/// A line the key-value parser could not split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    /// 1-based line number in the cleaned text
    pub line_number: usize,
    /// The offending line
    pub line: String,
}

/// Mapping produced by [`parse_key_values`] along with the lines it dropped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValueOutput {
    pub values: HashMap<String, String>,
    pub warnings: Vec<ParseWarning>,
}

impl KeyValueOutput {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// Parse a key-value pair from system output
///
/// # Arguments
/// * `line` - Line to parse (e.g., "CPU(s): 4")
/// * `separator` - Separator character, only its first occurrence splits
///
/// # Returns
/// * `Ok((String, String))` - Trimmed key-value pair
/// * `Err(String)` - No separator, or nothing before it
pub fn parse_key_value(line: &str, separator: char) -> Result<(String, String), String> {
    let (key, value) = line
        .split_once(separator)
        .ok_or_else(|| format!("No separator '{separator}' found in line: {line}"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("Empty key in line: {line}"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

/// Split cleaned multi-line output into a key-value mapping
///
/// Lines are terminated by CR-LF (as written by the remote shell) or bare LF.
/// Empty lines are skipped. Lines that cannot be split are dropped and
/// reported as warnings; a repeated key keeps its last value.
///
/// # Arguments
/// * `output` - Output already passed through [`strip_ansi_sequences`]
/// * `delimiter` - Key/value delimiter, `:` for lscpu and `=` for wmic
pub fn parse_key_values(output: &str, delimiter: char) -> KeyValueOutput {
    let mut parsed = KeyValueOutput::default();

    for (index, line) in output.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_key_value(line, delimiter) {
            Ok((key, value)) => {
                parsed.values.insert(key, value);
            }
            Err(_) => parsed.warnings.push(ParseWarning {
                line_number: index + 1,
                line: line.to_string(),
            }),
        }
    }

    parsed
}
