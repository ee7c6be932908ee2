// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

mod cli;

use clap::Parser;
use replication_recovery::config::{ClusterMetadata, ParseConfig, ResendConfig};
use replication_recovery::message::MessageKind;
use replication_recovery::pipeline::ParsePipeline;
use replication_recovery::resend::{HttpAdminClient, ResendDriver, ResendRequest};
use replication_recovery::{RecoveryError, Result};
use std::path::Path;
use std::process::ExitCode;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = cli::Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr; stdout carries command output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run(cli: cli::Cli) -> Result<()> {
    match cli.command {
        cli::Commands::Parse {
            input,
            output,
            workflow_id,
            run_id,
            skip_errors,
            headers,
            message_type,
            chunk_size,
        } => {
            let message_kind = MessageKind::from_code(message_type).ok_or_else(|| {
                RecoveryError::Config(format!("unknown message type {}", message_type))
            })?;
            let config = ParseConfig {
                input,
                output,
                message_kind,
                skip_errors,
                header_only: headers,
                workflow_id,
                run_id,
                chunk_size,
                ..Default::default()
            };
            parse(config).await
        }
        cli::Commands::Rereplicate {
            domain_id,
            workflow_id,
            run_id,
            source_cluster,
            max_event_id,
            end_event_version,
            context_timeout,
            clusters_config,
            address,
            endpoint_path,
        } => {
            let mut request = ResendRequest::new(domain_id, workflow_id, run_id, &source_cluster);
            if let Some(max_event_id) = max_event_id {
                request = request.with_max_event_id(max_event_id)?;
            }
            if let Some(version) = end_event_version {
                request = request.with_end_event_version(version);
            }

            let resend = ResendConfig {
                timeout: format!("{}s", context_timeout),
                endpoint_path,
            };
            resend.validate()?;

            let admin = match (address, clusters_config) {
                (Some(address), _) => HttpAdminClient::new(&address, &resend.endpoint_path)?,
                (None, Some(path)) => {
                    admin_from_metadata(&path, &source_cluster, &resend.endpoint_path)?
                }
                (None, None) => {
                    return Err(RecoveryError::Config(
                        "either --address or --clusters-config is required".into(),
                    ))
                }
            };

            let driver = ResendDriver::new(admin, resend.timeout_duration());
            driver.resend(&request).await
        }
    }
}

async fn parse(config: ParseConfig) -> Result<()> {
    let input: Box<dyn AsyncRead + Unpin + Send> = match &config.input {
        Some(path) => Box::new(
            tokio::fs::File::open(path)
                .await
                .map_err(|e| RecoveryError::io(format!("open {}", path.display()), e))?,
        ),
        None => Box::new(tokio::io::stdin()),
    };
    let output: Box<dyn AsyncWrite + Unpin + Send> = match &config.output {
        Some(path) => Box::new(
            tokio::fs::File::create(path)
                .await
                .map_err(|e| RecoveryError::io(format!("create {}", path.display()), e))?,
        ),
        None => Box::new(tokio::io::stdout()),
    };

    let skip_errors = config.skip_errors;
    let pipeline = ParsePipeline::new(config)?;
    let report = pipeline.run(input, output).await.map_err(|e| {
        error!(stage = %e.stage, "Parse aborted");
        e.source
    })?;

    if skip_errors {
        eprintln!(
            "{} messages were skipped due to errors in parsing",
            report.skipped
        );
    }
    Ok(())
}

/// Admin client for the current cluster of a metadata file.
fn admin_from_metadata(
    path: &Path,
    source_cluster: &str,
    endpoint_path: &str,
) -> Result<HttpAdminClient> {
    let metadata = ClusterMetadata::load(path)?;
    if metadata.cluster(source_cluster).is_none() {
        return Err(RecoveryError::Config(format!(
            "source cluster {} is not in {}",
            source_cluster,
            path.display()
        )));
    }
    let current = metadata.current_cluster_name.as_str();
    let address = metadata.rpc_address(current)?;
    Ok(HttpAdminClient::new(address, endpoint_path)?.with_cluster_name(current))
}
