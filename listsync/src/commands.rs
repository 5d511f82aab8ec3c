//! Command implementations

use anyhow::{Context, Result};
use callback_server::{WebhookReceiver, WebhookServer};
use cursor_store::JsonFileCursorStore;
use listsync_api::{RestChangeFeed, RestSubscriptionRenewer};
use listsync_engine::{ReconciliationEngine, WorkerPool};
use notification_queue::{DirQueue, NotificationConsumer, NotificationEnqueuer, QueueBackend};
use std::sync::Arc;
use tracing::info;

use crate::settings::{Cli, Command, ForgetArgs, PrimeArgs, ServeArgs, Settings};

/// Execute the parsed command
pub async fn execute(cli: Cli) -> Result<()> {
    cli.settings.validate()?;

    match cli.command {
        Command::Serve(args) => serve(&cli.settings, &args).await,
        Command::Prime(args) => prime(&cli.settings, &args).await,
        Command::Forget(args) => forget(&cli.settings, &args).await,
    }
}

/// Wire the engine to the file-backed cursor store and the REST clients.
pub fn build_engine(settings: &Settings) -> Result<ReconciliationEngine> {
    let store = JsonFileCursorStore::new(settings.cursor_path()?);
    let feed = RestChangeFeed::new().context("Failed to create change feed client")?;

    ReconciliationEngine::builder(settings.engine_config()?)
        .with_cursor_store(Arc::new(store))
        .with_change_feed(Arc::new(feed))
        .with_renewer(Arc::new(RestSubscriptionRenewer::new()))
        .with_credentials(settings.credentials()?)
        .build()
        .context("Failed to build reconciliation engine")
}

async fn serve(settings: &Settings, args: &ServeArgs) -> Result<()> {
    args.validate()?;

    let engine = Arc::new(build_engine(settings)?);
    let worker_config = args.worker_config();
    let queue_dir = settings.queue_dir()?;
    let backend: Arc<dyn QueueBackend> = Arc::new(DirQueue::new(&queue_dir));

    let receiver = WebhookReceiver::new(
        NotificationEnqueuer::new(backend.clone()),
        worker_config.queue.clone(),
    );
    let server = WebhookServer::new(args.port_range(), receiver)
        .await
        .context("Failed to start webhook receiver")?;

    let consumer = NotificationConsumer::new(backend, worker_config.queue.clone());
    let pool = match WorkerPool::start(engine, consumer, worker_config).await {
        Ok(pool) => pool,
        Err(e) => {
            server.shutdown().await;
            return Err(e).context("Failed to start workers");
        }
    };

    info!(
        "Receiving notifications at {} (queue in {})",
        server.webhook_url(),
        queue_dir.display()
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutting down");

    // Intake stops before the workers do.
    server.shutdown().await;
    pool.shutdown()
        .await
        .context("Workers did not shut down cleanly")?;

    info!("Stopped");
    Ok(())
}

async fn prime(settings: &Settings, args: &PrimeArgs) -> Result<()> {
    let engine = build_engine(settings)?;
    let record = engine
        .prime_cursor(args.subscription, args.resource, &args.site)
        .await
        .with_context(|| format!("Failed to prime subscription {}", args.subscription))?;

    println!(
        "Subscription {} starts at {}",
        record.subscription_id, record.last_change_token
    );
    Ok(())
}

async fn forget(settings: &Settings, args: &ForgetArgs) -> Result<()> {
    let engine = build_engine(settings)?;
    match engine.forget_subscription(args.subscription).await? {
        Some(record) => println!(
            "Removed cursor of subscription {} at {}",
            record.subscription_id, record.last_change_token
        ),
        None => println!("No cursor recorded for subscription {}", args.subscription),
    }
    Ok(())
}
