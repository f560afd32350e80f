use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;

use voiceflow_backend::HttpInvoker;
use voiceflow_blob::{FsStore, ObjectStore, UrlSigner};
use voiceflow_core::Config;
use voiceflow_engine::{
    CleanupScanner, Dispatcher, DispatcherConfig, RetryPolicy, STT_MODEL, TTS_MODEL,
};
use voiceflow_server::{AppState, ServerConfig};
use voiceflow_store::Database;
use voiceflow_telemetry::PipelineMetrics;

/// Which components this process runs. Gateways, workers, and the cleanup
/// scanner scale independently; `all` runs everything in one process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Role {
    All,
    Gateway,
    Worker,
    Cleanup,
}

#[derive(Parser, Debug)]
#[command(name = "voiceflow", about = "Asynchronous voice-processing pipeline")]
struct Args {
    #[arg(long, value_enum, default_value = "all")]
    role: Role,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    voiceflow_telemetry::init_logging();

    let args = Args::parse();
    let config = Config::from_env();

    tracing::info!(role = ?args.role, "starting voiceflow");

    let db = Database::open(&config.db_path).context("failed to open database")?;
    let blob: Arc<dyn ObjectStore> = Arc::new(FsStore::new(&config.blob_root));
    let metrics = Arc::new(PipelineMetrics::new());
    let token = CancellationToken::new();

    let mut server_handle = None;
    let mut task_handles = Vec::new();

    if matches!(args.role, Role::All | Role::Gateway) {
        let signer = Arc::new(UrlSigner::new(config.signing_secret));
        let state = AppState::new(
            db.clone(),
            Arc::clone(&blob),
            signer,
            Arc::clone(&metrics),
            config.url_ttl,
        );
        let server_config = ServerConfig {
            port: config.port,
            request_timeout: config.request_timeout,
        };
        let handle = voiceflow_server::start(server_config, state)
            .await
            .context("failed to start gateway")?;
        tracing::info!(port = handle.port, "gateway ready");
        server_handle = Some(handle);
    }

    if matches!(args.role, Role::All | Role::Worker) {
        let invoker = HttpInvoker::new(config.request_timeout)
            .map_err(|e| anyhow::anyhow!("{e}"))?
            .with_route(STT_MODEL, config.stt_url.clone())
            .with_route(TTS_MODEL, config.tts_url.clone());

        let dispatcher = Arc::new(Dispatcher::new(
            db.clone(),
            Arc::clone(&blob),
            Arc::new(invoker),
            DispatcherConfig {
                workers: config.workers,
                queue_lease: config.queue_lease,
                idle_poll: config.idle_poll_interval,
                cleanup_ttl: config.cleanup_ttl,
                retry: RetryPolicy::new(config.max_attempts, config.retry_delay),
            },
            Arc::clone(&metrics),
        ));
        task_handles.extend(dispatcher.spawn(token.clone()));
        tracing::info!(workers = config.workers, "dispatcher ready");
    }

    if matches!(args.role, Role::All | Role::Cleanup) {
        let scanner = CleanupScanner::new(
            db.clone(),
            Arc::clone(&blob),
            config.cleanup_scan_interval,
            Arc::clone(&metrics),
        );
        task_handles.push(scanner.spawn(token.clone()));
        tracing::info!("cleanup scanner ready");
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl+c")?;

    tracing::info!(metrics = ?metrics.snapshot(), "shutting down");
    token.cancel();
    for handle in task_handles {
        handle.await.ok();
    }
    drop(server_handle);

    Ok(())
}
