//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::{dispatch_channel, CancellationToken, ContainerRequest, ServiceConfig};
use lifecycle::mock::{EventLog, MockBrokerConfig, MockBrokerConnection, ScriptedStreamer, StreamBehavior};
use lifecycle::{DispatchStreamer, LoggingHandler, Orchestrator, OrchestratorConfig, RunStats};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::cli::{Cli, RunArgs};
use crate::error::CliError;

/// Execute the `run` command
pub async fn run_proxy(cli: &Cli, args: &RunArgs) -> Result<()> {
    let config = config_loader::ConfigLoader::load(&cli.config)
        .map_err(CliError::from)
        .with_context(|| format!("Failed to resolve configuration (fallback {})", cli.config.display()))?;

    super::init_observability(cli, config.log_level, args.metrics_port)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        broker = %config.mqtt.address,
        channel_id = %config.mqtt.channel_id,
        registry = %config.registry.url,
        registry_auth = config.registry.auth().mode(),
        chunk_size = config.registry.chunk_size,
        "Proplet proxy starting"
    );

    let ctx = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown_signal(ctx.clone()));
    if args.timeout > 0 {
        tokio::spawn(cancel_after(ctx.clone(), Duration::from_secs(args.timeout)));
    }

    let stats = run_loopback(&config, args, &ctx).await?;

    print_summary(&stats);
    info!("Proplet proxy finished");
    Ok(())
}

/// Run the orchestrator against the in-process loopback collaborators
async fn run_loopback(
    config: &ServiceConfig,
    args: &RunArgs,
    ctx: &CancellationToken,
) -> Result<RunStats, CliError> {
    let log = EventLog::new();
    let conn = MockBrokerConnection::new(
        MockBrokerConfig {
            address: config.mqtt.address.clone(),
            seed_requests: args.requests.iter().map(ContainerRequest::new).collect(),
            ..Default::default()
        },
        log.clone(),
    );

    let (tx, rx) = dispatch_channel(args.dispatch_capacity as usize);
    let dispatch = DispatchStreamer::new("dispatch", rx, LoggingHandler);
    let dispatch_metrics = dispatch.metrics();
    let registry = ScriptedStreamer::new("registry", StreamBehavior::UntilCancelled, log);

    let orchestrator = Orchestrator::new(OrchestratorConfig::from_service(config));
    let stats = orchestrator.run(ctx, conn, tx, dispatch, registry).await?;

    let snapshot = dispatch_metrics.snapshot();
    info!(
        handled = snapshot.handled_count,
        failed = snapshot.failure_count,
        "Dispatch totals"
    );
    Ok(stats)
}

/// Cancel `ctx` on Ctrl+C or SIGTERM
async fn cancel_on_shutdown_signal(ctx: CancellationToken) {
    match shutdown_signal().await {
        Ok(()) => warn!("Received shutdown signal, stopping proxy..."),
        Err(e) => error!(error = %e, "Signal handling unavailable, stopping proxy"),
    }
    ctx.cancel();
}

async fn shutdown_signal() -> Result<(), CliError> {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| CliError::signal("Ctrl+C", e))
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .map_err(|e| CliError::signal("SIGTERM", e))?
            .recv()
            .await;
        Ok(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<(), CliError>>();

    tokio::select! {
        result = ctrl_c => result,
        result = terminate => result,
    }
}

async fn cancel_after(ctx: CancellationToken, after: Duration) {
    tokio::select! {
        _ = ctx.cancelled() => {}
        _ = tokio::time::sleep(after) => {
            info!(timeout_secs = after.as_secs(), "Run timeout reached, stopping proxy");
            ctx.cancel();
        }
    }
}

fn print_summary(stats: &RunStats) {
    println!("\n=== Proxy Run Summary ===\n");
    println!("  Duration:     {:.2}s", stats.duration.as_secs_f64());
    println!("  Stopped by:   {:?}", stats.stop_reason);
    println!(
        "  Disconnect:   {}",
        if stats.disconnected_cleanly {
            "clean"
        } else {
            "failed (see logs)"
        }
    );
    println!();
}
