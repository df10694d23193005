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

use capacity_report::{
    create_service, render_failures, render_table, BoshTarget, ConfigurationProvider,
    OpsManagerTarget, ReportConfig, SourceConfig, TomlConfigurationProvider,
};
use clap::{Parser, ValueEnum};
use log::{debug, warn};
use std::error::Error;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SourceKind {
    /// Manifest from the BOSH director
    Bosh,
    /// Manifest and VM type catalog from Ops Manager
    OpsManager,
}

#[derive(Debug, Parser)]
#[command(name = "capacity_report", version, about = "Report vCPU and core totals per BOSH instance group")]
struct Opt {
    /// TOML config file with optional [report] and [source] tables
    #[arg(long, env = "CAPACITY_REPORT_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Where the deployment topology is read from
    #[arg(long, value_enum)]
    source: Option<SourceKind>,

    /// BOSH environment alias or URL
    #[arg(short, long)]
    environment: Option<String>,

    /// BOSH deployment name (direct BOSH source only)
    #[arg(short, long)]
    deployment: Option<String>,

    /// Ops Manager URL
    #[arg(long)]
    om_target: Option<String>,

    /// Ops Manager product type to inspect
    #[arg(long)]
    product_type: Option<String>,

    /// Skip TLS validation when talking to Ops Manager
    #[arg(long)]
    skip_ssl_validation: bool,

    /// Probe timeout in seconds
    #[arg(long, value_name = "SECS")]
    probe_timeout: Option<u64>,

    /// Maximum probes in flight
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Report missing CLIs and exit
    #[arg(long)]
    check: bool,
}

/// Layer command-line flags over file (or default) configuration
fn apply_overrides(
    opt: &Opt,
    mut report: ReportConfig,
    source: SourceConfig,
) -> (ReportConfig, SourceConfig) {
    if let Some(secs) = opt.probe_timeout {
        report.probe_timeout_secs = secs;
    }
    if let Some(n) = opt.concurrency {
        report.max_concurrent_probes = n;
    }
    report.verbose |= opt.verbose;

    let source = match (opt.source, source) {
        (Some(SourceKind::Bosh), SourceConfig::OpsManager(target)) => {
            SourceConfig::Bosh(BoshTarget {
                environment: target.bosh_environment,
                deployment: None,
            })
        }
        (Some(SourceKind::OpsManager), SourceConfig::Bosh(target)) => {
            SourceConfig::OpsManager(OpsManagerTarget {
                bosh_environment: target.environment,
                ..OpsManagerTarget::default()
            })
        }
        (_, source) => source,
    };

    let source = match source {
        SourceConfig::Bosh(mut target) => {
            target.environment = opt.environment.clone().or(target.environment);
            target.deployment = opt.deployment.clone().or(target.deployment);
            SourceConfig::Bosh(target)
        }
        SourceConfig::OpsManager(mut target) => {
            target.target = opt.om_target.clone().or(target.target);
            target.bosh_environment = opt.environment.clone().or(target.bosh_environment);
            if let Some(ref product_type) = opt.product_type {
                target.product_type = product_type.clone();
            }
            target.skip_ssl_validation |= opt.skip_ssl_validation;
            SourceConfig::OpsManager(target)
        }
    };

    (report, source)
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .format_module_path(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let opt = Opt::parse();

    let (file_report, file_source) = match opt.config {
        Some(ref path) => {
            let provider = TomlConfigurationProvider::load(path)?;
            (
                provider.get_report_config().await?,
                provider.get_source_config().await?,
            )
        }
        None => (ReportConfig::default(), SourceConfig::default()),
    };
    let (report_config, source_config) = apply_overrides(&opt, file_report, file_source);

    init_logging(report_config.verbose);
    debug!("Source: {source_config:?}");
    if opt.deployment.is_some() && matches!(source_config, SourceConfig::OpsManager(_)) {
        warn!("--deployment is ignored; Ops Manager supplies the deployment name");
    }

    let service = create_service(&source_config, report_config);

    if opt.check {
        let missing = service.validate_dependencies().await?;
        if missing.is_empty() {
            println!("All required CLIs are available.");
            return Ok(());
        }
        println!("Missing CLIs: {}", missing.join(", "));
        std::process::exit(1);
    }

    let report = service.generate_report().await?;

    print!("{}", render_table(&report.rows));
    if let Some(notice) = render_failures(&report.failures) {
        println!();
        println!("{notice}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opt(args: &[&str]) -> Opt {
        let mut argv = vec!["capacity_report"];
        argv.extend_from_slice(args);
        Opt::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_pass_through() {
        let (report, source) = apply_overrides(
            &opt(&[]),
            ReportConfig::default(),
            SourceConfig::default(),
        );
        assert_eq!(report, ReportConfig::default());
        assert_eq!(source, SourceConfig::Bosh(BoshTarget::default()));
    }

    #[test]
    fn test_flags_override_file_values() {
        let file_report = ReportConfig {
            max_concurrent_probes: 2,
            probe_timeout_secs: 600,
            ..ReportConfig::default()
        };
        let file_source = SourceConfig::Bosh(BoshTarget {
            environment: Some("staging".to_string()),
            deployment: Some("cf".to_string()),
        });

        let (report, source) = apply_overrides(
            &opt(&["-e", "prod", "--concurrency", "8", "--verbose"]),
            file_report,
            file_source,
        );

        assert_eq!(report.max_concurrent_probes, 8);
        assert_eq!(report.probe_timeout_secs, 600);
        assert!(report.verbose);
        assert_eq!(
            source,
            SourceConfig::Bosh(BoshTarget {
                environment: Some("prod".to_string()),
                deployment: Some("cf".to_string()),
            })
        );
    }

    #[test]
    fn test_switching_to_ops_manager() {
        let (_, source) = apply_overrides(
            &opt(&[
                "--source",
                "ops-manager",
                "--om-target",
                "https://opsman.example.com",
                "--skip-ssl-validation",
                "-e",
                "director",
            ]),
            ReportConfig::default(),
            SourceConfig::default(),
        );

        assert_eq!(
            source,
            SourceConfig::OpsManager(OpsManagerTarget {
                target: Some("https://opsman.example.com".to_string()),
                skip_ssl_validation: true,
                product_type: "cf".to_string(),
                bosh_environment: Some("director".to_string()),
            })
        );
    }

    #[test]
    fn test_switching_to_bosh_keeps_director() {
        let file_source = SourceConfig::OpsManager(OpsManagerTarget {
            target: Some("https://opsman.example.com".to_string()),
            bosh_environment: Some("director".to_string()),
            ..OpsManagerTarget::default()
        });
        let (_, source) = apply_overrides(
            &opt(&["--source", "bosh", "-d", "cf"]),
            ReportConfig::default(),
            file_source,
        );

        assert_eq!(
            source,
            SourceConfig::Bosh(BoshTarget {
                environment: Some("director".to_string()),
                deployment: Some("cf".to_string()),
            })
        );
    }

    #[test]
    fn test_switching_to_ops_manager_keeps_director() {
        let file_source = SourceConfig::Bosh(BoshTarget {
            environment: Some("director".to_string()),
            deployment: Some("cf".to_string()),
        });
        let (_, source) = apply_overrides(
            &opt(&["--source", "ops-manager"]),
            ReportConfig::default(),
            file_source,
        );

        match source {
            SourceConfig::OpsManager(target) => {
                assert_eq!(target.bosh_environment.as_deref(), Some("director"));
                assert_eq!(target.target, None);
            }
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[test]
    fn test_matching_source_keeps_file_targeting() {
        let file_source = SourceConfig::OpsManager(OpsManagerTarget {
            target: Some("https://opsman.example.com".to_string()),
            ..OpsManagerTarget::default()
        });
        let (_, source) = apply_overrides(
            &opt(&["--source", "ops-manager", "--product-type", "p-isolation-segment"]),
            ReportConfig::default(),
            file_source,
        );

        match source {
            SourceConfig::OpsManager(target) => {
                assert_eq!(target.target.as_deref(), Some("https://opsman.example.com"));
                assert_eq!(target.product_type, "p-isolation-segment");
            }
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[test]
    fn test_invalid_source_rejected() {
        assert!(Opt::try_parse_from(["capacity_report", "--source", "vsphere"]).is_err());
    }
}
