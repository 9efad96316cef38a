//! Bazaar CLI - a terminal storefront over the Bazaar client library.
//!
//! # Usage
//!
//! ```bash
//! # Browse products
//! bazaar products
//!
//! # Work with the cart (kept locally until you sign in)
//! bazaar cart add 665f1c2e M
//! bazaar cart set 665f1c2e M 3
//! bazaar cart show
//!
//! # Sign in with a one-time code; the local cart is merged into your account
//! bazaar login send 9876543210
//! bazaar login verify 9876543210 1234
//!
//! # Place an order
//! bazaar checkout --address address.yaml --method cod
//! ```
//!
//! # Environment Variables
//!
//! - `BAZAAR_API_URL` - Backend API base URL (required)
//! - `BAZAAR_DATA_DIR` - Where the cart and session are kept (default `.bazaar`)
//! - `SENTRY_DSN` - Error reporting (optional)
//! - `RUST_LOG` - Log filter (default `bazaar_client=info,bazaar_cli=info`)

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use bazaar_client::{ClientConfig, ShopContext};
use bazaar_core::PaymentMethod;
use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "bazaar")]
#[command(author, version, about = "Bazaar storefront CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List products, newest first
    Products {
        /// Bypass the product cache
        #[arg(long)]
        refresh: bool,
    },
    /// Inspect or change the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Sign in with a one-time code
    Login {
        #[command(subcommand)]
        action: LoginAction,
    },
    /// End the session (the cart is kept on this device)
    Logout,
    /// Place an order for the current cart
    Checkout {
        /// YAML file with the delivery address
        #[arg(short, long)]
        address: PathBuf,

        /// Payment method (`cod`, `stripe`, `razorpay`)
        #[arg(short, long, default_value = "cod")]
        method: PaymentMethod,
    },
    /// Confirm a completed gateway payment
    VerifyPayment {
        /// Backend order id (the gateway order's receipt)
        #[arg(long)]
        order_id: String,

        #[arg(long)]
        razorpay_order_id: String,

        #[arg(long)]
        razorpay_payment_id: String,

        #[arg(long)]
        razorpay_signature: String,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show cart lines and totals
    Show,
    /// Add one unit of a product size
    Add { product_id: String, size: String },
    /// Set the quantity of a product size (0 removes it)
    Set {
        product_id: String,
        size: String,
        quantity: u32,
    },
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
enum LoginAction {
    /// Text a login code to a phone number
    Send { phone: String },
    /// Text a fresh login code
    Resend { phone: String },
    /// Text a login code for an admin account
    AdminSend { phone: String },
    /// Verify a code and start the session
    Verify {
        phone: String,
        otp: String,

        /// Email for first-time sign-in
        #[arg(short, long)]
        email: Option<String>,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
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

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "bazaar_client=info,bazaar_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing();
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(2);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);
    init_tracing();

    if let Err(e) = run(cli, config).await {
        tracing::error!(error = %e, "{}", e.notice());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: ClientConfig) -> Result<(), CliError> {
    let shop = ShopContext::new(config)?;

    match cli.command {
        Commands::Products { refresh } => commands::products::list(&shop, refresh).await?,
        Commands::Cart { action } => {
            shop.start().await;
            match action {
                CartAction::Show => commands::cart::show(&shop).await?,
                CartAction::Add { product_id, size } => {
                    commands::cart::add(&shop, &product_id, &size).await?;
                }
                CartAction::Set {
                    product_id,
                    size,
                    quantity,
                } => commands::cart::set(&shop, &product_id, &size, quantity).await?,
                CartAction::Clear => commands::cart::clear(&shop).await?,
            }
        }
        Commands::Login { action } => match action {
            LoginAction::Send { phone } => {
                commands::login::send(&shop, &phone, commands::login::Channel::Customer).await?;
            }
            LoginAction::Resend { phone } => {
                commands::login::send(&shop, &phone, commands::login::Channel::Resend).await?;
            }
            LoginAction::AdminSend { phone } => {
                commands::login::send(&shop, &phone, commands::login::Channel::Admin).await?;
            }
            LoginAction::Verify { phone, otp, email } => {
                shop.start().await;
                commands::login::verify(&shop, &phone, &otp, email.as_deref()).await?;
            }
        },
        Commands::Logout => commands::login::logout(&shop),
        Commands::Checkout { address, method } => {
            shop.start().await;
            commands::checkout::place(&shop, &address, method).await?;
        }
        Commands::VerifyPayment {
            order_id,
            razorpay_order_id,
            razorpay_payment_id,
            razorpay_signature,
        } => {
            commands::checkout::verify_payment(
                &shop,
                &order_id,
                bazaar_client::api::RazorpayPayment {
                    razorpay_order_id,
                    razorpay_payment_id,
                    razorpay_signature,
                },
            )
            .await?;
        }
    }
    Ok(())
}
