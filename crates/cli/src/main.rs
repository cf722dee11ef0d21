//! Threadline CLI - drive the storefront state from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Guest cart, kept in THREADLINE_DATA_DIR
//! tl-cli cart add --id 1 --name "Oversized Tee" --price 1999 --size M
//! tl-cli cart show
//!
//! # Signed-in cart (needs THREADLINE_API_URL)
//! tl-cli --user u_123 cart show
//! tl-cli --user u_123 checkout
//!
//! # Wishlist and settings
//! tl-cli wishlist add 3
//! tl-cli prefs set promotions on
//! tl-cli profile set --name "Asha Rao" --style Streetwear
//! tl-cli profile address add "12 MG Road, Bengaluru 560001" --label Home
//!
//! # Simulated body scan with a short countdown
//! tl-cli --user u_123 scan simulate --seconds 3
//! ```
//!
//! Toasts the UI would show are logged through `tracing`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand, ValueEnum};
use sentry::integrations::tracing as sentry_tracing;
use threadline_storefront::config::StorefrontConfig;
use threadline_storefront::preferences::PreferenceToggle;
use threadline_storefront::profile::ProfileEdit;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "tl-cli")]
#[command(author, version, about = "Threadline storefront CLI")]
struct Cli {
    /// Sign in as this user before running the command
    #[arg(short, long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and edit the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Place an order for the current cart
    Checkout,
    /// Manage the wishlist
    Wishlist {
        #[command(subcommand)]
        action: WishlistAction,
    },
    /// Notification preferences
    Prefs {
        #[command(subcommand)]
        action: PrefsAction,
    },
    /// Profile details and delivery addresses
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Body scans
    Scan {
        #[command(subcommand)]
        action: ScanAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show lines and pricing
    Show,
    /// Add a line (merged with an existing line of the same id and size)
    Add {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        /// Unit price in rupees
        #[arg(long)]
        price: i64,
        #[arg(long)]
        size: Option<String>,
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set a line's quantity (zero or less removes it)
    Update {
        #[arg(long)]
        id: String,
        #[arg(long)]
        size: Option<String>,
        #[arg(short, long, allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove a line
    Remove {
        #[arg(long)]
        id: String,
        #[arg(long)]
        size: Option<String>,
    },
    /// Remove every line
    Clear,
}

#[derive(Subcommand)]
enum WishlistAction {
    /// List saved product ids
    List,
    /// Save a product id
    Add { id: String },
    /// Forget a product id
    Remove { id: String },
    /// Forget everything
    Clear,
    /// Add one unit of a saved product to the cart
    Move {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        price: i64,
        /// Units in stock; zero is refused
        #[arg(long)]
        stock: u32,
    },
}

#[derive(Subcommand)]
enum PrefsAction {
    /// Show current preferences
    Show,
    /// Turn one preference on or off
    Set { toggle: Toggle, state: Switch },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Show the saved profile
    Show,
    /// Change profile fields; omitted fields are kept
    Set {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        style: Option<String>,
        #[arg(long)]
        gender: Option<String>,
    },
    /// Manage delivery addresses
    Address {
        #[command(subcommand)]
        action: AddressAction,
    },
}

#[derive(Subcommand)]
enum AddressAction {
    /// Save a new address (the first becomes the default)
    Add {
        address: String,
        #[arg(long, default_value = "Home")]
        label: String,
    },
    /// Replace the text of a saved address
    Update { id: u32, address: String },
}

#[derive(Subcommand)]
enum ScanAction {
    /// Run a capture against a simulated camera
    Simulate {
        /// Countdown length
        #[arg(long)]
        seconds: Option<u32>,
        /// Cancel after this many ticks instead of completing
        #[arg(long)]
        cancel_after: Option<u32>,
    },
    /// List saved scans, newest first
    History,
    /// Show one saved scan
    Report {
        id: String,
        /// Write the report to <id>.json in the current directory
        #[arg(long)]
        save: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    OrderUpdates,
    Promotions,
    ScanReminders,
}

impl From<Toggle> for PreferenceToggle {
    fn from(toggle: Toggle) -> Self {
        match toggle {
            Toggle::OrderUpdates => Self::OrderUpdates,
            Toggle::Promotions => Self::Promotions,
            Toggle::ScanReminders => Self::ScanReminders,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Switch {
    On,
    Off,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN | tracing::Level::INFO => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    // Defaults to info level for the storefront if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "threadline_storefront=info,threadline_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt::init();
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);
    init_tracing();

    let cli = Cli::parse();

    if let Err(e) = run(cli, config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: StorefrontConfig) -> Result<(), commands::CliError> {
    let user = cli.user.as_deref();
    match cli.command {
        Commands::Cart { action } => {
            let storefront = commands::open(config, user, commands::Scope::Persistent).await?;
            match action {
                CartAction::Show => commands::cart::show(&storefront),
                CartAction::Add {
                    id,
                    name,
                    price,
                    size,
                    quantity,
                } => {
                    commands::cart::add(&storefront, id, name, price, size, quantity).await?;
                }
                CartAction::Update { id, size, quantity } => {
                    commands::cart::update(&storefront, &id, size.as_deref(), quantity).await?;
                }
                CartAction::Remove { id, size } => {
                    commands::cart::remove(&storefront, &id, size.as_deref()).await?;
                }
                CartAction::Clear => commands::cart::clear(&storefront).await?,
            }
        }
        Commands::Checkout => {
            let storefront = commands::open(config, user, commands::Scope::Persistent).await?;
            commands::cart::checkout(&storefront).await?;
        }
        Commands::Wishlist { action } => {
            let storefront = commands::open(config, user, commands::Scope::Persistent).await?;
            match action {
                WishlistAction::List => commands::wishlist::list(&storefront),
                WishlistAction::Add { id } => commands::wishlist::add(&storefront, &id)?,
                WishlistAction::Remove { id } => commands::wishlist::remove(&storefront, &id)?,
                WishlistAction::Clear => commands::wishlist::clear(&storefront)?,
                WishlistAction::Move {
                    id,
                    name,
                    price,
                    stock,
                } => commands::wishlist::move_to_cart(&storefront, id, name, price, stock).await?,
            }
        }
        Commands::Prefs { action } => {
            let storefront = commands::open(config, user, commands::Scope::Persistent).await?;
            match action {
                PrefsAction::Show => commands::prefs::show(&storefront)?,
                PrefsAction::Set { toggle, state } => {
                    commands::prefs::set(&storefront, toggle.into(), matches!(state, Switch::On))?;
                }
            }
        }
        Commands::Profile { action } => {
            let storefront = commands::open(config, user, commands::Scope::Persistent).await?;
            match action {
                ProfileAction::Show => commands::profile::show(&storefront)?,
                ProfileAction::Set {
                    name,
                    email,
                    phone,
                    style,
                    gender,
                } => {
                    let edit = ProfileEdit {
                        name,
                        email,
                        phone,
                        style_preference: style,
                        gender,
                    };
                    commands::profile::set(&storefront, edit)?;
                }
                ProfileAction::Address { action } => match action {
                    AddressAction::Add { address, label } => {
                        commands::profile::add_address(&storefront, &label, &address)?;
                    }
                    AddressAction::Update { id, address } => {
                        commands::profile::update_address(&storefront, id, &address)?;
                    }
                },
            }
        }
        Commands::Scan { action } => match action {
            ScanAction::Simulate {
                seconds,
                cancel_after,
            } => {
                let mut config = config;
                if let Some(seconds) = seconds {
                    config.scan_seconds = seconds.max(1);
                }
                let storefront = commands::open(config, user, commands::Scope::Ephemeral).await?;
                commands::scan::simulate(&storefront, cancel_after).await?;
            }
            ScanAction::History => {
                let storefront = commands::open(config, user, commands::Scope::Persistent).await?;
                commands::scan::history(&storefront).await?;
            }
            ScanAction::Report { id, save } => {
                let storefront = commands::open(config, user, commands::Scope::Persistent).await?;
                commands::scan::report(&storefront, &id, save).await?;
            }
        },
    }
    Ok(())
}
