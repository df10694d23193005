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

//! Joins declared scale with per-VM capacity

use crate::domain::{
    AggregationError, CapacityBasis, CapacityError, CapacityReport, CoreCount, InstanceGroup,
    ScaledCapacity,
};
use std::collections::HashMap;

/// Scale one group's per-VM capacity by its declared instance count
pub fn scale_capacity(
    group: &InstanceGroup,
    basis: &CapacityBasis,
) -> Result<ScaledCapacity, CapacityError> {
    let instances = u64::from(group.declared_instance_count);

    let (total_vcpus, total_cores) = match *basis {
        CapacityBasis::Measured(record) => (
            u64::from(record.logical_processors) * instances,
            CoreCount::Exact(u64::from(record.cores_per_socket) * instances),
        ),
        CapacityBasis::TypeTable {
            vcpus_per_instance,
            thread_ratio,
        } => {
            if !thread_ratio.is_finite() || thread_ratio <= 0.0 {
                return Err(CapacityError::InvalidThreadRatio(thread_ratio));
            }
            let total_vcpus = u64::from(vcpus_per_instance) * instances;
            (
                total_vcpus,
                CoreCount::Derived(total_vcpus as f64 / thread_ratio),
            )
        }
    };

    Ok(ScaledCapacity {
        name: group.name.clone(),
        declared_instance_count: group.declared_instance_count,
        vm_type: group.vm_type.clone(),
        total_vcpus,
        total_cores,
    })
}

/// Aggregate capacity for every group, in the order the groups are given
///
/// Groups with no entry in `capacities`, or whose entry is an error, are
/// reported as failures; they never stop the remaining groups from being
/// aggregated.
///
/// # Arguments
/// * `groups` - Instance groups in manifest order
/// * `capacities` - Per-group capacity results keyed by group name
pub fn aggregate(
    groups: &[InstanceGroup],
    capacities: &HashMap<String, Result<CapacityBasis, CapacityError>>,
) -> CapacityReport {
    let mut report = CapacityReport::default();

    for group in groups {
        let scaled = match capacities.get(&group.name) {
            Some(Ok(basis)) => scale_capacity(group, basis),
            Some(Err(err)) => Err(err.clone()),
            None => Err(CapacityError::NotProbed),
        };

        match scaled {
            Ok(row) => report.rows.push(row),
            Err(cause) => report.failures.push(AggregationError {
                group: group.name.clone(),
                cause,
            }),
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CapacityRecord, LifecycleRole, OsFamily};
    use proptest::prelude::*;

    fn group(name: &str, instances: u32, vm_type: &str) -> InstanceGroup {
        InstanceGroup {
            name: name.to_string(),
            declared_instance_count: instances,
            vm_type: vm_type.to_string(),
            os_family: OsFamily::Linux,
            lifecycle_role: LifecycleRole::Normal,
        }
    }

    fn measured(cores_per_socket: u32, logical_processors: u32) -> CapacityBasis {
        CapacityBasis::Measured(CapacityRecord {
            cores_per_socket,
            logical_processors,
        })
    }

    #[test]
    fn test_linux_measured_group() {
        let row = scale_capacity(&group("api", 3, "medium"), &measured(2, 4)).unwrap();
        assert_eq!(
            row,
            ScaledCapacity {
                name: "api".to_string(),
                declared_instance_count: 3,
                vm_type: "medium".to_string(),
                total_vcpus: 12,
                total_cores: CoreCount::Exact(6),
            }
        );
    }

    #[test]
    fn test_windows_measured_group() {
        let row = scale_capacity(&group("worker", 2, "large"), &measured(4, 8)).unwrap();
        assert_eq!(row.total_vcpus, 16);
        assert_eq!(row.total_cores, CoreCount::Exact(8));
    }

    #[test]
    fn test_type_table_group() {
        let basis = CapacityBasis::TypeTable {
            vcpus_per_instance: 4,
            thread_ratio: 2.0,
        };
        let row = scale_capacity(&group("cache", 5, "small"), &basis).unwrap();
        assert_eq!(row.total_vcpus, 20);
        assert_eq!(row.total_cores, CoreCount::Derived(10.0));
    }

    #[test]
    fn test_type_table_keeps_fractional_cores() {
        let basis = CapacityBasis::TypeTable {
            vcpus_per_instance: 2,
            thread_ratio: 4.0,
        };
        let row = scale_capacity(&group("router", 3, "micro"), &basis).unwrap();
        assert_eq!(row.total_vcpus, 6);
        assert_eq!(row.total_cores, CoreCount::Derived(1.5));
    }

    #[test]
    fn test_invalid_thread_ratio() {
        let basis = CapacityBasis::TypeTable {
            vcpus_per_instance: 2,
            thread_ratio: 0.0,
        };
        assert_eq!(
            scale_capacity(&group("router", 3, "micro"), &basis),
            Err(CapacityError::InvalidThreadRatio(0.0))
        );
    }

    #[test]
    fn test_failed_group_is_isolated() {
        let groups = vec![
            group("api", 3, "medium"),
            group("db", 1, "large"),
            group("router", 2, "small"),
        ];
        let capacities = HashMap::from([
            ("api".to_string(), Ok(measured(2, 4))),
            (
                "db".to_string(),
                Err(CapacityError::remote("db", "ssh: handshake failed")),
            ),
            ("router".to_string(), Ok(measured(1, 2))),
        ]);

        let report = aggregate(&groups, &capacities);
        let names: Vec<&str> = report.rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["api", "router"]);
        assert_eq!(report.failed_groups(), vec!["db"]);
        assert!(matches!(
            report.failures[0].cause,
            CapacityError::RemoteExecution { .. }
        ));
    }

    #[test]
    fn test_group_without_capacity_data() {
        let groups = vec![group("api", 3, "medium")];
        let report = aggregate(&groups, &HashMap::new());
        assert!(report.rows.is_empty());
        assert_eq!(report.failures[0].cause, CapacityError::NotProbed);
    }

    proptest! {
        #[test]
        fn prop_measured_totals_are_exact(
            instances in 1u32..10_000,
            cores in 1u32..512,
            extra_threads in 0u32..512,
        ) {
            let logical = cores + extra_threads;
            let row = scale_capacity(&group("g", instances, "t"), &measured(cores, logical)).unwrap();
            prop_assert_eq!(row.total_vcpus, u64::from(logical) * u64::from(instances));
            prop_assert_eq!(row.total_cores, CoreCount::Exact(u64::from(cores) * u64::from(instances)));
        }

        #[test]
        fn prop_aggregate_preserves_group_order(count in 1usize..20, failing in proptest::collection::vec(any::<bool>(), 20)) {
            let groups: Vec<InstanceGroup> = (0..count)
                .map(|i| group(&format!("group-{i}"), 1, "small"))
                .collect();
            // Insert in reverse so map iteration order cannot accidentally match
            let capacities: HashMap<_, _> = groups
                .iter()
                .enumerate()
                .rev()
                .map(|(i, g)| {
                    let result = if failing[i] { Err(CapacityError::NotProbed) } else { Ok(measured(1, 2)) };
                    (g.name.clone(), result)
                })
                .collect();

            let report = aggregate(&groups, &capacities);
            let expected_rows: Vec<String> = groups.iter().enumerate().filter(|(i, _)| !failing[*i]).map(|(_, g)| g.name.clone()).collect();
            let expected_failures: Vec<String> = groups.iter().enumerate().filter(|(i, _)| failing[*i]).map(|(_, g)| g.name.clone()).collect();
            prop_assert_eq!(report.rows.iter().map(|r| r.name.clone()).collect::<Vec<_>>(), expected_rows);
            prop_assert_eq!(report.failures.iter().map(|f| f.group.clone()).collect::<Vec<_>>(), expected_failures);
        }
    }
}
