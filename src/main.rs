mod clock;
mod cli;
mod config;
mod db;
mod error;
mod fee;
mod grpc;
mod metrics;
mod notify;
mod retry;
mod rpc;
mod telemetry;
mod types;
mod worker;

use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{error, info};

use crate::cli::{Args, Command};
use crate::config::{get_global_config, init_global_config, load_config};
use crate::db::{blocks, Store};
use crate::error::WalletError;
use crate::rpc::{BatchBlock, ChainRpcClient, HttpChainRpcClient};
use crate::telemetry::{init_tracing, TelemetryConfig};
use crate::types::{BlockHeader, Hash};
use crate::worker::{FallbackWorker, Finder, InternalWorker, Notifier, Synchronizer, WithdrawWorker};

const BUILD_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    init_tracing(TelemetryConfig::default())?;
    metrics::init_metrics()?;

    match args.command.unwrap_or(Command::Rpc) {
        Command::Version => {
            println!("exchange-wallet-service {BUILD_VERSION}");
            Ok(())
        }
        Command::Migrate { migrations_dir } => {
            let config = load_config(Some(&args.config))?;
            let dir = migrations_dir.unwrap_or(config.migrations_dir.clone());
            if !Store::migrations_dir_exists(&dir) {
                return Err(WalletError::Config(format!("migrations directory not found: {dir}")).into());
            }
            let store = Store::connect(&config.db).await?;
            store.run_migrations(&dir).await?;
            info!(migrations_dir = %dir, "migrations applied");
            Ok(())
        }
        Command::Rpc => {
            let config = load_config(Some(&args.config))?;
            init_global_config(config)?;
            run_service().await?;
            Ok(())
        }
    }
}

/// Wires config, store, RPC client, and the worker pipeline together, then
/// serves gRPC and `/metrics` until a shutdown signal arrives. Each worker
/// loop owns a `CancellationToken` and a `tokio::select!` around both its
/// tick and its sleep, so cancellation never waits out a full interval.
/// Shutdown cancels and joins the pipeline downstream-first: the
/// synchronizer first (dropping its channel sender so the finder's
/// `recv()` returns `None` on its own), then the broadcast workers
/// together, then fallback, then the notifier.
async fn run_service() -> Result<(), WalletError> {
    let config = get_global_config();
    let store = Store::connect(&config.db).await?;

    let rpc: Arc<dyn ChainRpcClient> = Arc::new(HttpChainRpcClient::new(config.chains_union_rpc.clone()));

    let seed = match blocks::latest_block(&store.pool).await? {
        Some(row) => Some(row.to_header()),
        None if config.chain_node.starting_height > 0 => Some(BlockHeader {
            hash: Hash::from_hex("0x0"),
            parent_hash: Hash::from_hex("0x0"),
            number: config.chain_node.starting_height - 1,
            timestamp: 0,
        }),
        None => None,
    };
    let cursor = BatchBlock::new(rpc.clone(), config.chain_node.confirmations, seed);

    let is_fallback = Arc::new(AtomicBool::new(false));
    let fallback_header = Arc::new(Mutex::new(None));
    let (tx, rx) = tokio::sync::mpsc::channel(16);

    let mut synchronizer = Synchronizer::new(
        rpc.clone(),
        store.clone(),
        cursor,
        tx,
        is_fallback.clone(),
        fallback_header.clone(),
        config.chain_node.blocks_step,
    );
    let finder = Finder::new(rpc.clone(), store.clone(), rx, config.chain_node.confirmations);
    let mut withdraw_worker = WithdrawWorker::new(rpc.clone(), store.clone());
    let mut internal_worker = InternalWorker::new(rpc.clone(), store.clone());
    let mut fallback_worker = FallbackWorker::new(rpc.clone(), store.clone(), is_fallback.clone(), fallback_header.clone());
    let mut notifier = Notifier::new(store.clone());

    let synchronizer_interval = Duration::from_secs(config.chain_node.synchronizer_interval_secs);
    let worker_interval = Duration::from_secs(config.chain_node.worker_interval_secs);

    let sync_token = CancellationToken::new();
    let withdraw_token = CancellationToken::new();
    let internal_token = CancellationToken::new();
    let fallback_token = CancellationToken::new();
    let notifier_token = CancellationToken::new();

    let synchronizer_handle = tokio::spawn({
        let sync_token = sync_token.clone();
        async move {
            loop {
                tokio::select! {
                    _ = sync_token.cancelled() => break,
                    result = synchronizer.tick() => {
                        if let Err(e) = result {
                            error!(worker = "synchronizer", error = %e, "tick failed");
                        }
                    }
                }
                tokio::select! {
                    _ = sync_token.cancelled() => break,
                    _ = tokio::time::sleep(synchronizer_interval) => {}
                }
            }
            // `synchronizer` (and its channel sender) drop here, so the
            // finder's `recv()` returns `None` and it exits on its own.
        }
    });

    let finder_handle = tokio::spawn(async move {
        if let Err(e) = finder.run().await {
            error!(worker = "finder", error = %e, "channel closed, finder stopped");
        }
    });

    let withdraw_handle = tokio::spawn({
        let withdraw_token = withdraw_token.clone();
        async move {
            loop {
                tokio::select! {
                    _ = withdraw_token.cancelled() => break,
                    result = withdraw_worker.tick() => {
                        if let Err(e) = result {
                            error!(worker = "withdraw", error = %e, "tick failed");
                        }
                    }
                }
                tokio::select! {
                    _ = withdraw_token.cancelled() => break,
                    _ = tokio::time::sleep(worker_interval) => {}
                }
            }
        }
    });

    let internal_handle = tokio::spawn({
        let internal_token = internal_token.clone();
        async move {
            loop {
                tokio::select! {
                    _ = internal_token.cancelled() => break,
                    result = internal_worker.tick() => {
                        if let Err(e) = result {
                            error!(worker = "internal", error = %e, "tick failed");
                        }
                    }
                }
                tokio::select! {
                    _ = internal_token.cancelled() => break,
                    _ = tokio::time::sleep(worker_interval) => {}
                }
            }
        }
    });

    let fallback_handle = tokio::spawn({
        let fallback_token = fallback_token.clone();
        async move {
            loop {
                tokio::select! {
                    _ = fallback_token.cancelled() => break,
                    result = fallback_worker.tick() => {
                        if let Err(e) = result {
                            error!(worker = "fallback", error = %e, "tick failed");
                        }
                    }
                }
                tokio::select! {
                    _ = fallback_token.cancelled() => break,
                    _ = tokio::time::sleep(worker_interval) => {}
                }
            }
        }
    });

    let notifier_handle = tokio::spawn({
        let notifier_token = notifier_token.clone();
        async move {
            loop {
                tokio::select! {
                    _ = notifier_token.cancelled() => break,
                    result = notifier.tick() => {
                        if let Err(e) = result {
                            error!(worker = "notifier", error = %e, "tick failed");
                        }
                    }
                }
                tokio::select! {
                    _ = notifier_token.cancelled() => break,
                    _ = tokio::time::sleep(worker_interval) => {}
                }
            }
        }
    });

    let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.rpc_server.port + 1));
    tokio::spawn(async move {
        let listener = match tokio::net::TcpListener::bind(metrics_addr).await {
            Ok(l) => l,
            Err(e) => {
                error!(error = %e, "failed to bind metrics listener");
                return;
            }
        };
        if let Err(e) = axum::serve(listener, metrics::metrics_router()).await {
            error!(error = %e, "metrics server stopped");
        }
    });

    let grpc_result = serve_grpc(store, rpc, config.rpc_server.host.clone(), config.rpc_server.port).await;

    info!("shutdown signal handled, draining worker pipeline downstream-first");

    sync_token.cancel();
    let _ = synchronizer_handle.await;
    let _ = finder_handle.await;

    withdraw_token.cancel();
    internal_token.cancel();
    let _ = tokio::join!(withdraw_handle, internal_handle);

    fallback_token.cancel();
    let _ = fallback_handle.await;

    notifier_token.cancel();
    let _ = notifier_handle.await;

    info!("worker pipeline drained");
    grpc_result
}

/// Serves the gRPC request surface behind a panic-recovery interceptor, so
/// a handler panic returns an error response instead of taking the whole
/// process down mid-request.
async fn serve_grpc(store: Store, rpc: Arc<dyn ChainRpcClient>, host: String, port: u16) -> Result<(), WalletError> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| WalletError::Config(format!("invalid rpc_server address: {e}")))?;

    let descriptor_set = include_bytes!(concat!(env!("OUT_DIR"), "/wallet_descriptor.bin"));
    let reflection = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(descriptor_set)
        .build()
        .map_err(|e| WalletError::Config(format!("failed to build reflection service: {e}")))?;

    let service = grpc::WalletService::new(store, rpc);
    let server = grpc::proto::wallet_business_services_server::WalletBusinessServicesServer::new(service);

    info!(%addr, "gRPC server listening");

    tonic::transport::Server::builder()
        .max_frame_size(Some(16 * 1024 * 1024))
        .layer(tower::ServiceBuilder::new().layer(CatchPanicLayer::new()))
        .add_service(reflection)
        .add_service(service_with_limit(server))
        .serve_with_shutdown(addr, shutdown_signal())
        .await
        .map_err(|e| WalletError::Shutdown(format!("grpc server error: {e}")))?;

    Ok(())
}

fn service_with_limit(
    server: grpc::proto::wallet_business_services_server::WalletBusinessServicesServer<grpc::WalletService>,
) -> grpc::proto::wallet_business_services_server::WalletBusinessServicesServer<grpc::WalletService> {
    server.max_decoding_message_size(300 * 1024 * 1024)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to install ctrl_c handler");
    }
    info!("shutdown signal received");
}
