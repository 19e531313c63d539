//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::{FanoutConfig, OutputConfig};
use outputs::Registry;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::pipeline::{Forwarder, Output};

/// Execute the `run` command
pub async fn run_forwarder(args: &RunArgs) -> Result<()> {
    let config = build_config(args)?;

    config_loader::ConfigLoader::validate(&config).context("Invalid configuration")?;

    info!(
        outputs = config.outputs.len(),
        framing = ?config.input.framing,
        queue_capacity = config.listen.queue_capacity,
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
        info!("Metrics endpoint available on port {}", args.metrics_port);
    }

    let registry = Registry::with_config(config.listen.clone());
    let outputs = open_outputs(&registry, &config).await?;

    info!("Forwarding stdin...");
    let forwarder = Forwarder::new(outputs, config.input.clone());
    let stats = forwarder
        .run(tokio::io::stdin(), shutdown_signal())
        .await
        .context("Forwarding failed")?;

    if stats.interrupted {
        warn!("Received shutdown signal, outputs closed");
    }
    info!(
        frames = stats.frames_read,
        bytes = stats.bytes_read,
        duration_secs = stats.duration.as_secs_f64(),
        fps = format!("{:.2}", stats.fps()),
        "Forwarding completed"
    );

    if args.stats {
        stats.print_summary();
    }
    Ok(())
}

/// File configuration (if any) with CLI overrides applied
fn build_config(args: &RunArgs) -> Result<FanoutConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!(config = %path.display(), "Loading configuration");
            if !path.exists() {
                anyhow::bail!("Configuration file not found: {}", path.display());
            }
            config_loader::ConfigLoader::load_from_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None => FanoutConfig::default(),
    };

    config
        .outputs
        .extend(args.outputs.iter().map(OutputConfig::new));

    if let Some(framing) = args.framing {
        config.input.framing = framing.into();
    }
    if let Some(chunk_size) = args.chunk_size {
        config.input.chunk_size = chunk_size;
    }
    if let Some(capacity) = args.queue_capacity {
        config.listen.queue_capacity = capacity;
    }
    if let Some(timeout_ms) = args.shutdown_timeout_ms {
        config.listen.shutdown_timeout_ms = timeout_ms;
    }
    Ok(config)
}

/// Resolve every output; on failure close the ones already opened
async fn open_outputs(registry: &Registry, config: &FanoutConfig) -> Result<Vec<Output>> {
    let mut opened: Vec<Output> = Vec::with_capacity(config.outputs.len());

    for output in &config.outputs {
        match registry.resolve(&output.uri).await {
            Ok(sink) => {
                match sink.local_addr() {
                    Some(addr) => info!(uri = %output.uri, addr = %addr, "Listening"),
                    None => info!(uri = %output.uri, "Output opened"),
                }
                opened.push(Output::new(&output.uri, sink));
            }
            Err(e) => {
                for mut done in opened {
                    let _ = done.sink.close().await;
                }
                return Err(e).with_context(|| format!("Failed to open output {}", output.uri));
            }
        }
    }
    Ok(opened)
}

/// Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &FanoutConfig) {
    println!("\n=== Configuration Summary ===\n");
    println!("Input:");
    println!("  Framing: {:?}", config.input.framing);
    println!("  Chunk size: {}", config.input.chunk_size);
    println!("\nListeners:");
    println!("  Queue capacity: {}", config.listen.queue_capacity);
    println!("  Shutdown timeout: {}ms", config.listen.shutdown_timeout_ms);
    println!("  TCP nodelay: {}", config.listen.tcp_nodelay);
    println!("\nOutputs ({}):", config.outputs.len());
    for output in &config.outputs {
        println!("  - {}", output.uri);
    }
    println!();
}
