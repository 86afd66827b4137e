//! EasyShop CLI - a command-line client for the EasyShop storefront.
//!
//! Signs in against the EasyShop API, keeps the session between runs and
//! lets the user browse the catalog, check out and list past orders.

mod commands;

use std::io;
use std::path::Path;

use anyhow::Result;
use clap::{Parser, Subcommand};
use easyshop_core::Config;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log file name prefix inside the cache directory
const LOG_FILE: &str = "easyshop.log";

#[derive(Debug, Parser)]
#[command(name = "easyshop", version, about = "Command-line client for the EasyShop storefront")]
struct Cli {
    /// Override the API base URL
    #[arg(long, global = true)]
    api_base: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in and keep the session on this device
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Create an account
    Register {
        #[arg(long)]
        email: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show who is signed in
    Whoami,
    /// List the catalog
    Products,
    /// Buy a product
    Checkout {
        product_id: i64,
        #[arg(long, default_value_t = 1)]
        quantity: i32,
    },
    /// List your orders
    Orders,
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir.filter(|dir| std::fs::create_dir_all(dir).is_ok()) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let loaded = Config::load();
    let mut config = match loaded {
        Ok(ref c) => c.clone(),
        Err(_) => Config::default(),
    };

    let log_dir = config.cache_dir().ok();
    let _guard = init_tracing(log_dir.as_deref());
    if let Err(e) = loaded {
        warn!(error = %e, "Failed to load config, using defaults");
    }

    if let Some(base) = cli.api_base {
        config.api_base = base;
    }
    info!(api_base = %config.api_base, "EasyShop CLI starting");

    commands::run(cli.command, config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_checkout() {
        let cli = Cli::try_parse_from(["easyshop", "checkout", "42", "--quantity", "3"]).unwrap();
        match cli.command {
            Command::Checkout {
                product_id,
                quantity,
            } => {
                assert_eq!(product_id, 42);
                assert_eq!(quantity, 3);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_checkout_quantity_defaults_to_one() {
        let cli = Cli::try_parse_from(["easyshop", "checkout", "7"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Checkout {
                product_id: 7,
                quantity: 1
            }
        ));
    }

    #[test]
    fn test_global_api_base() {
        let cli = Cli::try_parse_from(["easyshop", "whoami", "--api-base", "http://shop.local/api"])
            .unwrap();
        assert_eq!(cli.api_base.as_deref(), Some("http://shop.local/api"));
        assert!(matches!(cli.command, Command::Whoami));
    }

    #[test]
    fn test_login_email_flag() {
        let cli = Cli::try_parse_from(["easyshop", "login", "--email", "a@x.com"]).unwrap();
        assert!(matches!(cli.command, Command::Login { email: Some(ref e) } if e == "a@x.com"));
    }

    #[test]
    fn test_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["easyshop"]).is_err());
    }
}
