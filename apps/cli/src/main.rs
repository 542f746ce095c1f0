use std::{collections::BTreeSet, process::ExitCode};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use client_core::{
    ClientError, DurableCredentialStore, FilterKey, ListController, QueryAction, QueryState,
    Session, SortDirection,
};
use shared::{
    domain::{InventoryItem, RecordId},
    protocol::{AdjustmentKind, StockAdjustmentRequest},
};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

mod config;

use config::load_settings;

#[derive(Parser, Debug)]
#[command(name = "inventory_cli", about = "Inventory API client")]
struct Cli {
    /// Overrides the configured API base URL.
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Credential profile; keeps separate sessions per environment.
    #[arg(long, global = true)]
    profile: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug, Default)]
struct ListArgs {
    /// Raw query string as copied from the browser, e.g. `category=Tools&page=2`.
    #[arg(long)]
    query: Option<String>,
    #[arg(long)]
    search: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    status: Option<String>,
    #[arg(long)]
    low_stock: bool,
    #[arg(long)]
    sort: Option<String>,
    #[arg(long)]
    desc: bool,
    #[arg(long)]
    page: Option<u32>,
    #[arg(long)]
    page_size: Option<u32>,
}

impl ListArgs {
    fn to_query_state(&self) -> QueryState {
        let mut state = self
            .query
            .as_deref()
            .map(QueryState::from_query)
            .unwrap_or_default();

        let mut actions = Vec::new();
        if let Some(size) = self.page_size {
            actions.push(QueryAction::SetPageSize(size));
        }
        if let Some(search) = &self.search {
            actions.push(QueryAction::SetSearch(search.clone()));
        }
        for (key, value) in [
            (FilterKey::Category, &self.category),
            (FilterKey::Location, &self.location),
            (FilterKey::Status, &self.status),
        ] {
            if let Some(value) = value {
                actions.push(QueryAction::SetFilter(key, Some(value.clone())));
            }
        }
        if self.low_stock {
            actions.push(QueryAction::SetLowStock(true));
        }
        for action in actions {
            state = state.apply(action);
        }

        if let Some(field) = &self.sort {
            if *field != state.sort_field {
                state = state.apply(QueryAction::SortBy(field.clone()));
            }
        }
        let direction = if self.desc {
            Some(SortDirection::Desc)
        } else {
            self.sort.as_ref().map(|_| SortDirection::Asc)
        };
        if direction.is_some_and(|d| d != state.sort_direction) {
            let field = state.sort_field.clone();
            state = state.apply(QueryAction::SortBy(field));
        }
        if let Some(page) = self.page {
            state = state.apply(QueryAction::SetPage(page));
        }
        state
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum AdjustArg {
    Add,
    Remove,
    Set,
}

impl From<AdjustArg> for AdjustmentKind {
    fn from(value: AdjustArg) -> Self {
        match value {
            AdjustArg::Add => AdjustmentKind::Add,
            AdjustArg::Remove => AdjustmentKind::Remove,
            AdjustArg::Set => AdjustmentKind::Set,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    /// Lists inventory items for a query.
    Items {
        #[command(flatten)]
        list: ListArgs,
        /// Prints the whole page as JSON instead of a table.
        #[arg(long)]
        export: bool,
    },
    Dashboard {
        #[arg(long)]
        limit: Option<u32>,
    },
    Adjust {
        id: i64,
        #[arg(value_enum)]
        kind: AdjustArg,
        quantity: i64,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Deletes items on the page selected by the list flags.
    Delete {
        #[arg(required = true)]
        ids: Vec<i64>,
        #[command(flatten)]
        list: ListArgs,
    },
    /// Moves items on the page selected by the list flags to another location.
    Relocate {
        #[arg(long)]
        to: String,
        #[arg(required = true)]
        ids: Vec<i64>,
        #[command(flatten)]
        list: ListArgs,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut settings = load_settings();
    if let Some(api_url) = cli.api_url {
        settings.api_base_url = api_url;
    }
    debug!(?settings, "loaded settings");

    let persistence =
        DurableCredentialStore::initialize(&settings.database_url, cli.profile.as_deref()).await?;
    let session = Session::connect(
        &settings.api_base_url,
        settings.request_timeout(),
        persistence,
    )?;
    session.restore().await?;

    match run(&session, &settings, cli.command).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => match err.downcast_ref::<ClientError>() {
            Some(client_err) if client_err.is_session_expired() => {
                eprintln!("{}", client_err.user_notice());
                eprintln!("Run `inventory_cli login --username <name> --password <password>`.");
                Ok(ExitCode::from(2))
            }
            Some(client_err) => {
                error!(error = %client_err, "request failed");
                eprintln!("{}", client_err.user_notice());
                Ok(ExitCode::FAILURE)
            }
            None => Err(err),
        },
    }
}

async fn run(session: &Session, settings: &config::Settings, command: Command) -> Result<()> {
    match command {
        Command::Login { username, password } => {
            session.login(&username, &password).await?;
            println!("signed in as {username}");
        }
        Command::Logout => {
            session.logout().await;
            println!("signed out");
        }
        Command::Items { list, export } => {
            require_login(session).await?;
            let controller = session.inventory_items(QueryState::default());
            controller.refresh(list.to_query_state()).await?;
            if export {
                if controller.select_all().await == 0 {
                    println!("[]");
                } else {
                    println!("{}", controller.export_selected().await?);
                }
            } else {
                print_page(&controller).await;
            }
        }
        Command::Dashboard { limit } => {
            require_login(session).await?;
            let snapshot = session
                .dashboard(limit.unwrap_or(settings.dashboard_limit))
                .load()
                .await?;
            let summary = &snapshot.stock_summary;
            println!(
                "items: {}  low stock: {}  out of stock: {}  value: {}",
                summary.total_items, summary.low_stock, summary.out_of_stock, summary.total_value
            );
            println!("recent movements:");
            for movement in &snapshot.recent_movements {
                println!(
                    "  {}  {:<24} {:>6} {}",
                    movement.timestamp.format("%Y-%m-%d %H:%M"),
                    movement.item_name,
                    movement.quantity,
                    movement.location
                );
            }
            println!("pending requisitions: {}", snapshot.pending_requisitions.len());
            for location in &snapshot.location_summary {
                println!(
                    "  {:<24} {:>6} items  {}",
                    location.location, location.item_count, location.total_value
                );
            }
            println!("activity:");
            for entry in &snapshot.activity {
                println!(
                    "  {}  {}  {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M"),
                    entry.user,
                    entry.action
                );
            }
        }
        Command::Adjust {
            id,
            kind,
            quantity,
            reason,
        } => {
            require_login(session).await?;
            let item = session
                .inventory()
                .adjust_stock(
                    RecordId(id),
                    &StockAdjustmentRequest {
                        adjustment_type: kind.into(),
                        quantity,
                        reason,
                    },
                )
                .await?;
            println!(
                "{} now at {} ({})",
                item.name,
                item.current_stock,
                item.stock_status().label()
            );
        }
        Command::Delete { ids, list } => {
            let controller = select_on_page(session, &list, &ids).await?;
            let deleted = controller.delete_selected().await?;
            println!("deleted {deleted} item(s)");
            print_page(&controller).await;
        }
        Command::Relocate { to, ids, list } => {
            let controller = select_on_page(session, &list, &ids).await?;
            let moved = controller.relocate_selected(&to).await?;
            println!("moved {moved} item(s) to {to}");
            print_page(&controller).await;
        }
    }
    Ok(())
}

async fn require_login(session: &Session) -> Result<()> {
    if !session.is_authenticated().await {
        bail!("not signed in; run `inventory_cli login` first");
    }
    Ok(())
}

/// Loads the page described by `list` and selects `ids` on it. Ids that are
/// not on that page are reported and skipped.
async fn select_on_page(
    session: &Session,
    list: &ListArgs,
    ids: &[i64],
) -> Result<ListController<InventoryItem>> {
    require_login(session).await?;
    let controller = session.inventory_items(QueryState::default());
    controller.refresh(list.to_query_state()).await?;
    for id in unique_ids(ids) {
        if !controller.toggle_selection(id).await {
            eprintln!("item {id} is not on the selected page; skipping");
        }
    }
    Ok(controller)
}

/// Selection toggles, so a repeated id would deselect itself.
fn unique_ids(ids: &[i64]) -> BTreeSet<RecordId> {
    ids.iter().copied().map(RecordId).collect()
}

async fn print_page(controller: &ListController<InventoryItem>) {
    let Some(page) = controller.page().await else {
        return;
    };
    let query = controller.query();
    println!(
        "{:>6}  {:<12} {:<28} {:<14} {:<16} {:>7}  status",
        "id", "sku", "name", "category", "location", "stock"
    );
    for item in &page.items {
        println!(
            "{:>6}  {:<12} {:<28} {:<14} {:<16} {:>7}  {}",
            item.id,
            item.sku,
            item.name,
            item.category,
            item.location,
            item.current_stock,
            item.stock_status().label()
        );
    }
    println!(
        "page {} of {} ({} records)  ?{}",
        query.page,
        page.page_count.max(1),
        page.total_count,
        controller.current_url_query()
    );
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
