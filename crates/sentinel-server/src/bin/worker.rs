//! The `sentinel-worker` binary: scheduler + worker pool process (§6.7, §6.2).
//!
//! `Scheduler<St, Qu>` is generic over concrete store/queue types, so the
//! queue backend has to be resolved at startup rather than behind a trait
//! object; the store backend is always [`SqliteStore`] (§12 default). The
//! scheduler and worker share one concrete queue instance per process --
//! the scheduler holds it typed, the worker through `Arc<dyn Queue>`.

use std::sync::Arc;

use tracing::info;

use sentinel_chain::fetcher::ChainDataFetcher;
use sentinel_chain::index::HttpEventIndexClient;
use sentinel_chain::rpc::HttpRpcClient;
use sentinel_queue::{MemoryQueue, Queue, RedisConfig, RedisQueue};
use sentinel_scheduler::{Scheduler, SchedulerConfig, Worker, WorkerConfig};
use sentinel_server::config::{QueueBackend, WorkerProcessConfig};
use sentinel_store::SqliteStore;
use sentinel_webhook::DispatchConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = WorkerProcessConfig::from_env();
    let store = Arc::new(SqliteStore::open(&config.database_path)?);

    let fetcher = Arc::new(ChainDataFetcher::new(
        HttpRpcClient::new(),
        HttpEventIndexClient::new(config.event_index_url.clone()),
    ));

    let worker_config = WorkerConfig {
        poll_interval: config.poll_interval,
        dispatch: DispatchConfig {
            timeout: config.dispatch_timeout,
            max_retries: config.dispatch_max_retries,
            secret: config.webhook_secret.clone(),
        },
    };

    let scheduler_config = SchedulerConfig { tick_interval: config.tick_interval };
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    match config.queue_backend {
        QueueBackend::Memory => {
            let queue = Arc::new(MemoryQueue::new());
            let scheduler = Scheduler::new(store.clone(), queue.clone(), scheduler_config);
            let worker = Worker::new(store.clone(), store.clone(), store, queue, fetcher, worker_config);
            run(scheduler, worker, shutdown_tx, shutdown_rx).await
        }
        QueueBackend::Redis => {
            let redis_config = RedisConfig {
                url: config.redis_url.clone(),
                prefix: String::from("sentinel"),
            };
            let queue = Arc::new(RedisQueue::new(&redis_config).await?);
            let scheduler = Scheduler::new(store.clone(), queue.clone(), scheduler_config);
            let worker = Worker::new(store.clone(), store.clone(), store, queue, fetcher, worker_config);
            run(scheduler, worker, shutdown_tx, shutdown_rx).await
        }
    }
}

async fn run<St, Qu>(
    scheduler: Scheduler<St, Qu>,
    worker: Worker,
    shutdown_tx: tokio::sync::watch::Sender<bool>,
    shutdown_rx: tokio::sync::watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error>>
where
    St: sentinel_store::SignalStore + 'static,
    Qu: Queue + 'static,
{
    info!("sentinel-worker starting");

    let scheduler_rx = shutdown_rx.clone();
    let scheduler_task = tokio::spawn(async move { scheduler.run(scheduler_rx).await });
    let worker_task = tokio::spawn(async move { worker.run(shutdown_rx).await });

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    let _ = tokio::join!(scheduler_task, worker_task);
    info!("sentinel-worker stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
