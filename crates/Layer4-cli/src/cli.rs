//! Command handlers
//!
//! Builds the orchestrator from the global store and dispatches one
//! subcommand against it. Input validation that belongs to the front end
//! (zip xor repo, NAME=VALUE shape) happens here, before the hosting layer
//! is reached.

use crate::Command;
use cloudhost_core::{
    HostingOrchestrator, InstanceReport, NpmInstaller, ShellFetcher, SourceDescriptor,
};
use cloudhost_foundation::{CloudHostConfig, Error, JsonStore, Result};
use std::sync::Arc;

/// Build a descriptor from the host flags. Exactly one source kind must be
/// given.
fn build_descriptor(
    zip_url: Option<String>,
    zip_name: Option<String>,
    repo: Option<String>,
) -> Result<SourceDescriptor> {
    match (zip_url, repo) {
        (Some(url), None) => {
            let file_name = zip_name.unwrap_or_else(|| {
                url.trim_end_matches('/')
                    .rsplit('/')
                    .next()
                    .unwrap_or("app.zip")
                    .to_string()
            });
            Ok(SourceDescriptor::Archive { url, file_name })
        }
        (None, Some(url)) => Ok(SourceDescriptor::Repository { url }),
        (None, None) => Err(Error::InvalidInput(
            "Provide either --zip-url or --repo".to_string(),
        )),
        (Some(_), Some(_)) => Err(Error::InvalidInput(
            "Provide --zip-url or --repo, not both".to_string(),
        )),
    }
}

/// Parse repeated `--env NAME=VALUE` flags. Values may contain `=`.
fn parse_env_pairs(raw: &[String]) -> Result<Vec<(String, String)>> {
    raw.iter()
        .map(|entry| match entry.split_once('=') {
            Some((name, value)) if !name.is_empty() => {
                Ok((name.to_string(), value.to_string()))
            }
            _ => Err(Error::InvalidInput(format!(
                "Invalid --env '{}': expected NAME=VALUE",
                entry
            ))),
        })
        .collect()
}

fn orchestrator() -> Result<HostingOrchestrator> {
    let config = CloudHostConfig::load()?;
    let store = JsonStore::global()?;
    tracing::debug!("Data directory: {}", store.base_dir().display());
    let installer = NpmInstaller::new(&config.install_command);

    Ok(HostingOrchestrator::new(
        config,
        store,
        Arc::new(ShellFetcher::new()),
        Arc::new(installer),
    ))
}

fn print_report(report: &InstanceReport) {
    if report.started {
        println!("Hosted and started '{}'", report.id);
    } else {
        println!("Hosted '{}' but could not start it: {}", report.id, report.reason);
    }
}

pub async fn run(owner: &str, command: Command) -> Result<()> {
    let orch = orchestrator()?;

    match command {
        Command::Host {
            zip_url,
            zip_name,
            repo,
            env,
        } => {
            let descriptor = build_descriptor(zip_url, zip_name, repo)?;
            let pairs = parse_env_pairs(&env)?;
            let report = orch.create_instance(owner, &descriptor, &pairs).await?;
            print_report(&report);
        }
        Command::List => {
            let statuses = orch.list_instances(owner).await;
            if statuses.is_empty() {
                println!("No hosted instances.");
            } else {
                for status in statuses {
                    let state = if status.running { "running" } else { "stopped" };
                    println!("{}  [{}]", status.id, state);
                }
            }
        }
        Command::Status { id } => {
            let status = orch.instance_status(owner, &id).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Command::Start { id } => {
            orch.start_instance(owner, &id).await?;
            println!("Started '{}'", id);
        }
        Command::Stop { id } => {
            orch.stop_instance(owner, &id).await?;
            println!("Stopped '{}'", id);
        }
        Command::Restart { id } => {
            match orch.stop_instance(owner, &id).await {
                Ok(()) | Err(Error::NotRunning(_)) => {}
                Err(e) => return Err(e),
            }
            orch.start_instance(owner, &id).await?;
            println!("Restarted '{}'", id);
        }
        Command::Delete { id } => {
            let report = orch.delete_instance(owner, &id).await?;
            if report.directory_removed {
                println!("Deleted '{}'", report.id);
            } else {
                println!("Deleted '{}' (files could not be removed)", report.id);
            }
        }
        Command::Premium => {
            if orch.check_entitlement(owner).await {
                println!("Premium: active");
            } else {
                println!("Premium: not active");
            }
        }
        Command::AddPremium { target } => {
            if orch.grant_entitlement(owner, &target).await? {
                println!("Granted premium to '{}'", target);
            } else {
                println!("'{}' already has premium", target);
            }
        }
    }

    Ok(())
}
