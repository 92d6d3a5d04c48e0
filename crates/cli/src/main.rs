//! Community Mart CLI - shop from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Log in (creates the account on first use)
//! mart login --phone 13800000000 --name Alice
//!
//! # Browse
//! mart categories
//! mart products Fruit
//! mart promotions
//!
//! # Shop
//! mart cart add <product-id> --quantity 2
//! mart addresses add --recipient Alice --phone 13800000000 \
//!     --province 浙江省 --city 杭州市 --district 西湖区 --detail "文三路 1 号" --default
//! mart checkout
//! mart orders --status pending
//! ```
//!
//! Every invocation restores the session saved by the last `login` from
//! `$MART_DATA_DIR/session` before running the command.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use community_mart_core::{AddressId, CartItemId, ProductId};
use community_mart_storefront::config::StorefrontConfig;
use community_mart_storefront::error::Result;
use community_mart_storefront::models::OrderFilter;
use community_mart_storefront::state::AppState;

mod commands;

#[derive(Parser)]
#[command(name = "mart")]
#[command(author, version, about = "Community Mart shopping client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with a phone number
    Login {
        /// Mainland mobile number
        #[arg(short, long)]
        phone: String,

        /// Display name
        #[arg(short, long)]
        name: String,
    },
    /// Log out and forget the saved session
    Logout,
    /// Show the logged-in identity
    Whoami,
    /// List categories
    Categories,
    /// List featured products
    Featured,
    /// List the products of a category
    Products {
        /// Category name or ID
        category: String,
    },
    /// List today's promotions
    Promotions,
    /// Show or change the cart
    Cart {
        #[command(subcommand)]
        action: Option<CartAction>,
    },
    /// Manage shipping addresses
    Addresses {
        #[command(subcommand)]
        action: Option<AddressAction>,
    },
    /// Place an order for everything in the cart
    Checkout {
        /// Ship to this address instead of the default one
        #[arg(short, long)]
        address: Option<AddressId>,
    },
    /// Show order history
    Orders {
        /// `all` or one of pending, paid, shipped, delivered, completed, cancelled
        #[arg(short, long, default_value = "all")]
        status: OrderFilter,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart (default)
    Show,
    /// Add a product
    Add {
        /// Product ID
        product: ProductId,

        #[arg(short, long, default_value_t = 1)]
        quantity: i32,
    },
    /// Set a line's quantity; 0 or less removes it
    Set {
        /// Cart line ID
        line: CartItemId,

        #[arg(allow_negative_numbers = true)]
        quantity: i32,
    },
}

#[derive(Subcommand)]
enum AddressAction {
    /// List addresses (default)
    List,
    /// Add an address
    Add {
        #[arg(long)]
        recipient: String,

        #[arg(long)]
        phone: String,

        #[arg(long)]
        province: String,

        #[arg(long)]
        city: String,

        #[arg(long)]
        district: String,

        #[arg(long)]
        detail: String,

        /// Make this the default address
        #[arg(long)]
        default: bool,
    },
    /// Make an address the default
    Default { id: AddressId },
    /// Delete an address
    Delete { id: AddressId },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            traces_sample_rate: config.sentry_traces_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
#[allow(clippy::print_stderr)]
async fn main() {
    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("mart: {e}");
            std::process::exit(2);
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Logs go to stderr so command output stays clean
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "community_mart_storefront=info,community_mart_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(cli, config).await {
        e.report();
        eprintln!("mart: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: StorefrontConfig) -> Result<()> {
    let mut state = AppState::from_config(config)?;
    state.restore().await;

    match cli.command {
        Commands::Login { phone, name } => commands::session::login(&mut state, &phone, &name).await?,
        Commands::Logout => commands::session::logout(&mut state).await,
        Commands::Whoami => commands::session::whoami(&state),
        Commands::Categories => commands::catalog::categories(&state).await?,
        Commands::Featured => commands::catalog::featured(&state).await?,
        Commands::Products { category } => commands::catalog::products(&state, &category).await?,
        Commands::Promotions => commands::catalog::promotions(&state).await?,
        Commands::Cart { action } => match action.unwrap_or(CartAction::Show) {
            CartAction::Show => commands::cart::show(&state)?,
            CartAction::Add { product, quantity } => {
                commands::cart::add(&mut state, product, quantity).await?;
            }
            CartAction::Set { line, quantity } => {
                commands::cart::set(&mut state, line, quantity).await?;
            }
        },
        Commands::Addresses { action } => match action.unwrap_or(AddressAction::List) {
            AddressAction::List => commands::addresses::list(&state).await?,
            AddressAction::Add {
                recipient,
                phone,
                province,
                city,
                district,
                detail,
                default,
            } => {
                let address = community_mart_storefront::models::NewAddress {
                    recipient_name: recipient,
                    phone,
                    province,
                    city,
                    district,
                    detail_address: detail,
                    is_default: default,
                };
                commands::addresses::add(&state, &address).await?;
            }
            AddressAction::Default { id } => commands::addresses::set_default(&state, id).await?,
            AddressAction::Delete { id } => commands::addresses::delete(&state, id).await?,
        },
        Commands::Checkout { address } => commands::orders::checkout(&state, address).await?,
        Commands::Orders { status } => commands::orders::list(&state, status).await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_orders_status_parses() {
        let cli = Cli::try_parse_from(["mart", "orders", "--status", "shipped"]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Orders {
                status: OrderFilter::Status(community_mart_core::OrderStatus::Shipped)
            })
        ));
    }

    #[test]
    fn test_unknown_status_rejected() {
        assert!(Cli::try_parse_from(["mart", "orders", "--status", "lost"]).is_err());
    }

    #[test]
    fn test_cart_defaults_to_show() {
        let cli = Cli::try_parse_from(["mart", "cart"]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Cart { action: None })
        ));
    }

    #[test]
    fn test_cart_set_accepts_negative_quantity() {
        let line = "00000000-0000-0000-0000-000000000001";
        let cli = Cli::try_parse_from(["mart", "cart", "set", line, "-5"]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Cart {
                action: Some(CartAction::Set { quantity: -5, .. })
            })
        ));
    }
}
