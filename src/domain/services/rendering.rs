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

//! Plain text rendering of capacity reports

use crate::domain::{AggregationError, CoreCount, ScaledCapacity};

const HEADERS: [&str; 5] = ["VM", "Instances", "VM Type", "vCPUs", "Cores"];
const MIN_WIDTHS: [usize; 5] = [25, 15, 30, 10, 10];

/// Format a core count; derived counts always show a decimal part
pub fn format_core_count(cores: &CoreCount) -> String {
    match cores {
        CoreCount::Exact(count) => count.to_string(),
        CoreCount::Derived(count) if count.fract() == 0.0 => format!("{count:.1}"),
        CoreCount::Derived(count) => format!("{count:.2}"),
    }
}

/// Render rows as a left-aligned table with a header and separator row
///
/// Columns are at least as wide as the classic layout and grow so that a
/// long group or VM type name never runs into the next column.
pub fn render_table(rows: &[ScaledCapacity]) -> String {
    let cells: Vec<[String; 5]> = rows
        .iter()
        .map(|row| {
            [
                row.name.clone(),
                row.declared_instance_count.to_string(),
                row.vm_type.clone(),
                row.total_vcpus.to_string(),
                format_core_count(&row.total_cores),
            ]
        })
        .collect();

    let mut widths = MIN_WIDTHS;
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count() + 1);
        }
    }

    let mut table = String::new();
    push_row(&mut table, &widths, HEADERS.iter().copied());
    push_row(&mut table, &widths, HEADERS.iter().map(|_| "---"));
    for row in &cells {
        push_row(&mut table, &widths, row.iter().map(String::as_str));
    }
    table
}

fn push_row<'a>(table: &mut String, widths: &[usize; 5], cells: impl Iterator<Item = &'a str>) {
    let line: String = cells
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect();
    table.push_str(line.trim_end());
    table.push('\n');
}

/// Notice naming the groups that are missing from the table
pub fn render_failures(failures: &[AggregationError]) -> Option<String> {
    if failures.is_empty() {
        return None;
    }
    let names: Vec<&str> = failures.iter().map(|f| f.group.as_str()).collect();
    Some(format!("could not determine capacity for: {}", names.join(", ")))
}
