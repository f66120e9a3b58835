//! Atelier CLI - Command line tool for the fashion storefront.
//!
//! Commands:
//! - `atelier cart` - Manage the shopping cart
//! - `atelier products` - Manage the product catalog
//! - `atelier categories` - Manage categories
//! - `atelier collections` - Manage curated collections
//! - `atelier orders` - Record orders and update their status
//! - `atelier reviews` - Moderate product reviews
//! - `atelier sync` - Reconcile local data with the remote database
//! - `atelier config` - Manage configuration

mod commands;
mod config;
mod context;
mod logging;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    CartArgs, CategoriesArgs, CollectionsArgs, ConfigArgs, OrdersArgs, ProductsArgs, ReviewsArgs,
    SyncArgs,
};

/// Atelier CLI - Run the storefront cart and admin catalog from a terminal
#[derive(Parser)]
#[command(name = "atelier")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the shopping cart
    Cart(CartArgs),

    /// Manage the product catalog
    Products(ProductsArgs),

    /// Manage categories
    Categories(CategoriesArgs),

    /// Manage curated collections
    Collections(CollectionsArgs),

    /// Record orders and update their status
    Orders(OrdersArgs),

    /// Moderate product reviews
    Reviews(ReviewsArgs),

    /// Reconcile local data with the remote database
    Sync(SyncArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let output = output::Output::new(cli.verbose, cli.json);
    let ctx = context::Context::load(cli.config.as_deref(), output)?;
    logging::init(&ctx.config.logging, cli.verbose);
    tracing::debug!(config = ?ctx.config_path, remote = ?ctx.config.remote.kind, "context loaded");

    let result = match cli.command {
        Commands::Cart(args) => commands::cart::run(args, &ctx).await,
        Commands::Products(args) => commands::products::run(args, &ctx).await,
        Commands::Categories(args) => commands::categories::run(args, &ctx).await,
        Commands::Collections(args) => commands::collections::run(args, &ctx).await,
        Commands::Orders(args) => commands::orders::run(args, &ctx).await,
        Commands::Reviews(args) => commands::reviews::run(args, &ctx).await,
        Commands::Sync(args) => commands::sync::run(args, &ctx).await,
        Commands::Config(args) => commands::config::run(args, &ctx).await,
    };

    if let Err(e) = result {
        ctx.output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
