//! Command implementations for the catalog daemon.
//!
//! Every command goes through the same startup sequence before touching the
//! catalog:
//! 1. Load layered settings and apply CLI overrides
//! 2. Open the RocksDB registry
//! 3. Wait (bounded) for the engine; an unreachable engine is fatal
//! 4. Run one full reconciliation pass

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use backoff::{backoff::Backoff, ExponentialBackoff};
use serde::Serialize;
use tokio::signal;
use tracing::{error, info, warn};

use catalog_core::{Catalog, CatalogError, ReconcileReport};
use catalog_engine::{
    ElasticsearchConfig, ElasticsearchGateway, EngineError, EngineGateway, SearchQuery,
};
use catalog_registry::RocksRegistry;
use catalog_types::{Page, Settings};

use crate::cli::{Cli, DocCommands, IndexCommands, PageArgs};

/// Load settings and apply CLI overrides (highest precedence).
pub fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings =
        Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Some(db_path) = &cli.db_path {
        settings.db_path = db_path.clone();
    }
    if let Some(log_level) = &cli.log_level {
        settings.log_level = log_level.clone();
    }
    if let Some(url) = &cli.engine_url {
        settings.engine.url = url.clone();
    }
    Ok(settings)
}

fn init_logging(settings: &Settings) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Poll the engine until it answers or `budget` runs out.
///
/// Only transport failures are retried. An engine that answers with an
/// error (bad credentials, for instance) fails immediately.
pub async fn wait_for_engine(engine: &dyn EngineGateway, budget: Duration) -> Result<()> {
    let mut backoff = ExponentialBackoff {
        initial_interval: Duration::from_millis(250),
        max_interval: Duration::from_secs(5),
        max_elapsed_time: Some(budget),
        ..Default::default()
    };

    loop {
        match engine.list_index_names().await {
            Ok(names) => {
                info!(indices = names.len(), "Engine reachable");
                return Ok(());
            }
            Err(EngineError::Unavailable(reason)) => match backoff.next_backoff() {
                Some(delay) => {
                    warn!(
                        error = %reason,
                        retry_in_ms = delay.as_millis(),
                        "Engine not reachable yet, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    error!(error = %reason, "Engine still unreachable, giving up");
                    bail!(
                        "Engine unreachable after {}s: {}",
                        budget.as_secs(),
                        reason
                    );
                }
            },
            Err(e) => return Err(anyhow!(e).context("Engine rejected startup probe")),
        }
    }
}

/// Open both stores, wait for the engine and run the startup pass.
///
/// Fails if the engine cannot be reached or the pass cannot list either
/// store. Per-index reconciliation failures are logged, not fatal.
pub async fn startup(settings: &Settings) -> Result<(Catalog, ReconcileReport)> {
    let db_path = settings.expanded_db_path();
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).context("Failed to create registry directory")?;
    }
    let registry = Arc::new(RocksRegistry::open(&db_path).context("Failed to open registry")?);

    let engine = Arc::new(
        ElasticsearchGateway::new(ElasticsearchConfig::from_settings(&settings.engine))
            .context("Failed to build engine client")?,
    );
    info!(url = %settings.engine.url, "Waiting for engine");
    wait_for_engine(
        engine.as_ref(),
        Duration::from_secs(settings.startup.engine_wait_secs),
    )
    .await?;

    let catalog = Catalog::new(engine, registry);
    let report = catalog
        .reconciler
        .run()
        .await
        .map_err(catalog_failure)
        .context("Startup reconciliation failed")?;
    log_report(&report);
    Ok((catalog, report))
}

fn log_report(report: &ReconcileReport) {
    for failure in &report.failures {
        warn!(index = %failure.name, error = %failure.error, "Index not reconciled");
    }
    if !report.orphaned.is_empty() {
        warn!(
            orphaned = ?report.orphaned,
            "Registry rows without engine indices; use `index forget` to remove them"
        );
    }
}

/// Translate a catalog error into a message naming the failed subsystem.
pub fn catalog_failure(err: CatalogError) -> anyhow::Error {
    anyhow!("[{} {}] {}", err.status_code(), err.subsystem(), err)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

fn parse_json(raw: &str) -> Result<serde_json::Value> {
    serde_json::from_str(raw).context("Argument is not valid JSON")
}

fn page(args: PageArgs) -> Result<Page> {
    Page::new(args.page, args.size).map_err(|e| anyhow!(e))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

/// Start the daemon: startup pass, then periodic passes until a signal.
pub async fn start_daemon(cli: &Cli, interval_override: Option<u64>) -> Result<()> {
    let mut settings = load_settings(cli)?;
    if let Some(interval) = interval_override {
        settings.reconcile_interval_secs = interval;
    }
    init_logging(&settings)?;

    info!("Index catalog daemon starting...");
    info!("Configuration:");
    info!("  Registry path: {}", settings.db_path);
    info!("  Engine URL: {}", settings.engine.url);
    info!("  Reconcile interval: {}s", settings.reconcile_interval_secs);
    info!("  Log level: {}", settings.log_level);

    let (catalog, _) = startup(&settings).await?;
    info!("Catalog ready");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    if settings.reconcile_interval_secs == 0 {
        shutdown.await;
        return Ok(());
    }

    let period = Duration::from_secs(settings.reconcile_interval_secs);
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                match catalog.reconciler.run().await {
                    Ok(report) => log_report(&report),
                    Err(e) => error!(error = %e, "Periodic reconciliation failed"),
                }
            }
        }
    }

    info!("Index catalog daemon stopped");
    Ok(())
}

/// Run the startup pass and print its report.
pub async fn run_reconcile(cli: &Cli) -> Result<()> {
    let settings = load_settings(cli)?;
    init_logging(&settings)?;
    let (_, report) = startup(&settings).await?;
    print_json(&report)
}

pub async fn handle_index(cli: &Cli, command: IndexCommands) -> Result<()> {
    let settings = load_settings(cli)?;
    init_logging(&settings)?;
    let (catalog, _) = startup(&settings).await?;
    let coordinator = &catalog.coordinator;

    match command {
        IndexCommands::List => {
            print_json(&coordinator.list_indices().await.map_err(catalog_failure)?)
        }
        IndexCommands::Create { name, description } => {
            let record = coordinator
                .create_index(&name, &description)
                .await
                .map_err(catalog_failure)?;
            print_json(&serde_json::json!({ "id": record.id, "name": record.name }))
        }
        IndexCommands::Delete { name } => {
            coordinator.delete_index(&name).await.map_err(catalog_failure)?;
            print_json(&serde_json::json!({ "deleted": name }))
        }
        IndexCommands::Update {
            name,
            description,
            alias,
        } => {
            let record = coordinator
                .update_index(&name, description.as_deref(), alias.as_deref())
                .await
                .map_err(catalog_failure)?;
            print_json(&record)
        }
        IndexCommands::Search {
            name,
            field,
            query,
            page: page_args,
        } => {
            let results = coordinator
                .search_index(&name, &field, &query, Some(page(page_args)?))
                .await
                .map_err(catalog_failure)?;
            print_json(&results)
        }
        IndexCommands::Forget { name } => {
            coordinator.forget_index(&name).await.map_err(catalog_failure)?;
            print_json(&serde_json::json!({ "forgotten": name }))
        }
    }
}

pub async fn handle_doc(cli: &Cli, command: DocCommands) -> Result<()> {
    let settings = load_settings(cli)?;
    init_logging(&settings)?;
    let (catalog, _) = startup(&settings).await?;
    let documents = &catalog.documents;

    match command {
        DocCommands::Add { index, body, id } => {
            let body = parse_json(&body)?;
            let id = documents
                .add_document(&index, id.as_deref(), &body)
                .await
                .map_err(catalog_failure)?;
            print_json(&serde_json::json!({ "index": index, "id": id }))
        }
        DocCommands::Get { index, id } => {
            print_json(&documents.get_document(&index, &id).await.map_err(catalog_failure)?)
        }
        DocCommands::Update { index, id, partial } => {
            let partial = parse_json(&partial)?;
            documents
                .update_document(&index, &id, &partial)
                .await
                .map_err(catalog_failure)?;
            print_json(&serde_json::json!({ "index": index, "updated": id }))
        }
        DocCommands::Delete { index, id } => {
            documents
                .delete_document(&index, &id)
                .await
                .map_err(catalog_failure)?;
            print_json(&serde_json::json!({ "index": index, "deleted": id }))
        }
        DocCommands::DeleteByQuery {
            index,
            field,
            query,
        } => {
            let deleted = documents
                .delete_documents_by_query(&index, &SearchQuery::single_field(field, query))
                .await
                .map_err(catalog_failure)?;
            print_json(&serde_json::json!({ "index": index, "deleted": deleted }))
        }
        DocCommands::List {
            index,
            page: page_args,
        } => {
            let results = documents
                .list_documents(&index, page(page_args)?)
                .await
                .map_err(catalog_failure)?;
            print_json(&results)
        }
        DocCommands::Search {
            index,
            text,
            fields,
            page: page_args,
        } => {
            let results = documents
                .search_documents(&index, &text, &fields, page(page_args)?)
                .await
                .map_err(catalog_failure)?;
            print_json(&results)
        }
    }
}
