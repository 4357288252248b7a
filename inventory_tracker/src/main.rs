//! Inventory Tracker - local stock and pricing, synced with the B2B catalog
//!
//! Edits products in the local SQLite store and runs reconciliation passes
//! against the remote catalog, once or on a schedule.

use clap::{Parser, Subcommand};
use inventory_tracker::{
    default_db_path, CallerContext, CancelFlag, ExportKind, HttpCatalogGateway, InventoryError,
    InventoryFacade, NewProduct, PassStatus, PassSummary, RecordStore, Result, Role, SqliteStore,
    SyncOutcome, TrackerConfig, UserRegistry, DEFAULT_ADMIN,
};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::interval;

/// Product inventory tracker with remote catalog sync
#[derive(Parser, Debug)]
#[command(name = "inventory_tracker")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the SQLite database file
    #[arg(short, long, default_value_t = default_db_path_arg())]
    database: String,

    /// Base URL of the remote catalog API
    #[arg(long)]
    api_url: Option<String>,

    /// API key for the remote catalog
    #[arg(long, env = "UNIMALL_API_KEY", default_value = "", hide_env_values = true)]
    api_key: String,

    /// Timeout for each catalog request, in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Push attempts per product per sync pass
    #[arg(long, default_value_t = 3)]
    max_push_attempts: u32,

    /// Registered user running the command; the role comes from the user registry
    #[arg(long, env = "INVENTORY_USER", default_value = DEFAULT_ADMIN)]
    user: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add a new product
    Add {
        sku: String,
        name: String,
        price: String,
        quantity: i64,
    },
    /// Remove a product
    Remove { sku: String },
    /// Set the quantity on hand
    SetQuantity { sku: String, quantity: i64 },
    /// Set the unit price
    SetPrice { sku: String, price: String },
    /// Show one product
    Info {
        sku: String,
        /// Look the product up in the remote catalog instead of the local store
        #[arg(long, default_value_t = false)]
        remote: bool,
    },
    /// List all products
    List,
    /// Show the total inventory value
    Value,
    /// Export the inventory to stdout
    Export {
        /// csv, json or text
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Run one reconciliation pass and exit
    Sync,
    /// Run reconciliation passes continuously
    Daemon {
        /// Minutes between passes
        #[arg(long, default_value_t = 60)]
        interval_minutes: u64,
    },
    /// Manage registered users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand, Debug)]
enum UserAction {
    /// Register a new user
    Add {
        username: String,
        /// admin or partner
        #[arg(long, default_value = "partner")]
        role: String,
    },
    /// List registered users
    List,
    /// Stop a user from running commands
    Deactivate { username: String },
    /// Allow a deactivated user again
    Activate { username: String },
}

fn default_db_path_arg() -> String {
    default_db_path().to_string_lossy().to_string()
}

fn parse_price(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw.trim())
        .map_err(|e| InventoryError::InvalidInput(format!("Invalid price '{}': {}", raw, e)))
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = TrackerConfig {
        database: PathBuf::from(&args.database),
        ..TrackerConfig::default()
    }
    .with_timeout_secs(args.timeout_secs)?
    .with_max_push_attempts(args.max_push_attempts)?;
    if let Some(url) = args.api_url {
        config.gateway.base_url = url;
    }
    config.gateway.api_key = args.api_key;

    log::debug!("Database path: {}", config.database.display());
    let store = Arc::new(SqliteStore::open(&config.database)?);
    log::debug!("{} product(s) in local store", store.count()?);

    let users = UserRegistry::new(store.clone());
    users.ensure_default_admin()?;
    let ctx = users.resolve(&args.user)?;
    log::debug!("Running as {} ({})", ctx.username, ctx.role);

    let gateway = Arc::new(HttpCatalogGateway::new(config.gateway.clone())?);
    let facade = InventoryFacade::new(store, gateway, config.policy.clone());

    match args.command {
        Command::Add {
            sku,
            name,
            price,
            quantity,
        } => {
            let info = facade.add_product(
                &ctx,
                NewProduct {
                    sku,
                    name,
                    price: parse_price(&price)?,
                    quantity,
                },
            )?;
            println!("Added {} ({})", info.sku, info.name);
        }
        Command::Remove { sku } => {
            let info = facade.remove_product(&ctx, &sku)?;
            println!("Removed {} ({})", info.sku, info.name);
        }
        Command::SetQuantity { sku, quantity } => {
            let info = facade.update_quantity(&ctx, &sku, quantity)?;
            println!("{}: quantity {}", info.sku, info.quantity);
        }
        Command::SetPrice { sku, price } => {
            let info = facade.update_price(&ctx, &sku, parse_price(&price)?)?;
            println!("{}: price ${:.2}", info.sku, info.price);
        }
        Command::Info { sku, remote: false } => {
            let info = facade.get_product_info(&ctx, &sku)?;
            println!(
                "{} - Price: ${:.2}, Quantity: {}",
                info.name, info.price, info.quantity
            );
            println!("Total value: ${:.2}", info.total_value);
            match info.last_synced_at {
                Some(ts) => println!("Last synced: {}", ts.to_rfc3339()),
                None => println!("Never synced"),
            }
            if info.dirty {
                println!("Has local changes not yet pushed");
            }
        }
        Command::Info { sku, remote: true } => match facade.fetch_remote_product(&ctx, &sku).await? {
            Some(entry) => println!(
                "{} - Price: ${:.2}, Quantity: {} (version {})",
                entry.display_name, entry.unit_price, entry.quantity_on_hand, entry.remote_version
            ),
            None => return Err(InventoryError::NotFound(sku)),
        },
        Command::List => {
            for info in facade.list_products(&ctx)? {
                println!(
                    "{:<16} {:<32} {:>10.2} {:>8}{}",
                    info.sku,
                    info.name,
                    info.price,
                    info.quantity,
                    if info.dirty { " *" } else { "" }
                );
            }
        }
        Command::Value => {
            println!(
                "Total Inventory Value: ${:.2}",
                facade.get_total_inventory_value(&ctx)?
            );
        }
        Command::Export { format } => {
            let kind = ExportKind::from_str(&format)?;
            print!("{}", facade.export(&ctx, kind)?);
        }
        Command::Sync => {
            let cancel = CancelFlag::new();
            spawn_ctrl_c_listener(cancel.clone(), Arc::new(Notify::new()));
            let summary = facade.trigger_sync(&ctx, &cancel).await?;
            print_summary(&summary);
            if let PassStatus::Failed { reason } = summary.status {
                return Err(InventoryError::SyncFailed(reason));
            }
        }
        Command::Daemon { interval_minutes } => {
            ctx.require_modify("trigger catalog sync")?;
            log::info!(
                "Running in daemon mode, syncing every {} minute(s)",
                interval_minutes
            );
            run_daemon(&facade, &ctx, interval_minutes).await?;
        }
        Command::User { action } => run_user_action(&users, &ctx, action)?,
    }

    Ok(())
}

fn run_user_action(users: &UserRegistry, ctx: &CallerContext, action: UserAction) -> Result<()> {
    match action {
        UserAction::Add { username, role } => {
            let user = users.register(ctx, &username, Role::from_str(&role)?)?;
            println!("Registered {} ({})", user.username, user.role);
        }
        UserAction::List => {
            for user in users.list(ctx)? {
                println!(
                    "{:<24} {:<8} {:<8} {}",
                    user.username,
                    user.role.as_str(),
                    if user.is_active { "active" } else { "inactive" },
                    user.created_at.format("%Y-%m-%d")
                );
            }
        }
        UserAction::Deactivate { username } => {
            let user = users.deactivate(ctx, &username)?;
            println!("Deactivated {}", user.username);
        }
        UserAction::Activate { username } => {
            let user = users.activate(ctx, &username)?;
            println!("Activated {}", user.username);
        }
    }
    Ok(())
}

/// Ctrl-C stops the running pass before its next product and wakes the daemon loop
fn spawn_ctrl_c_listener(cancel: CancelFlag, shutdown: Arc<Notify>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Shutdown requested, stopping after the current product");
            cancel.cancel();
            shutdown.notify_one();
        }
    });
}

/// Run a pass immediately, then on every tick until Ctrl-C
async fn run_daemon(
    facade: &InventoryFacade,
    ctx: &CallerContext,
    interval_minutes: u64,
) -> Result<()> {
    let cancel = CancelFlag::new();
    let shutdown = Arc::new(Notify::new());
    spawn_ctrl_c_listener(cancel.clone(), Arc::clone(&shutdown));

    let mut ticker = interval(Duration::from_secs(interval_minutes.max(1) * 60));

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.notified() => break,
        }
        if cancel.is_cancelled() {
            break;
        }

        log::info!("Scheduled sync triggered");
        let summary = facade.trigger_sync(ctx, &cancel).await?;
        print_summary(&summary);

        if cancel.is_cancelled() {
            break;
        }
    }

    log::info!("Daemon stopped");
    Ok(())
}

fn print_summary(summary: &PassSummary) {
    for item in &summary.outcomes {
        match &item.outcome {
            SyncOutcome::Unchanged => {}
            SyncOutcome::Applied => println!("{:<16} applied", item.sku),
            SyncOutcome::ConflictSkipped { local, remote } => println!(
                "{:<16} conflict: local qty {} kept, remote {} ${:.2} (version {})",
                item.sku,
                local.quantity_on_hand,
                remote.display_name,
                remote.unit_price,
                remote.remote_version
            ),
            SyncOutcome::Failed { reason } => println!("{:<16} failed: {}", item.sku, reason),
        }
    }

    let status = match &summary.status {
        PassStatus::Completed => "completed".to_string(),
        PassStatus::Cancelled => "cancelled".to_string(),
        PassStatus::Failed { reason } => format!("failed ({})", reason),
    };
    println!(
        "Sync {} in {:.1}s: {} applied, {} conflicts, {} failed, {} unchanged",
        status,
        summary.elapsed.as_secs_f64(),
        summary.counts.applied,
        summary.counts.conflict_skipped,
        summary.counts.failed,
        summary.counts.unchanged
    );
}
