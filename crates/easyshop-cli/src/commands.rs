use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use easyshop_core::api::navigation::ACCOUNT_LOCATION;
use easyshop_core::auth::Claims;
use easyshop_core::models::CheckoutItem;
use easyshop_core::{
    ApiClient, AuthOutcome, Config, CredentialStore, Navigator, SessionManager, TrackingNavigator,
};
use tracing::warn;

use crate::Command;

const ENV_PASSWORD: &str = "EASYSHOP_PASSWORD";

pub async fn run(command: Command, mut config: Config) -> Result<()> {
    let store = config.credential_store()?;
    let navigator = Arc::new(TrackingNavigator::default());
    let api = ApiClient::new(&config, store, navigator.clone())
        .context("Failed to create API client")?;

    let session = SessionManager::new(api, &config);
    session.initialize();
    let was_authenticated = session.is_authenticated();
    session.start();

    let result = match command {
        Command::Login { email } => login(&session, &mut config, email).await,
        Command::Register { email } => register(&session, &config, email).await,
        Command::Logout => {
            session.logout();
            println!("Logged out");
            Ok(())
        }
        Command::Whoami => {
            whoami(&session);
            Ok(())
        }
        Command::Products => products(&session).await,
        Command::Checkout {
            product_id,
            quantity,
        } => checkout(&session, product_id, quantity).await,
        Command::Orders => orders(&session).await,
    };

    session.stop();

    if session_ended(was_authenticated, &navigator.current_location()) {
        eprintln!("Your session has ended. Run `easyshop login` to sign in again.");
    }
    result
}

/// A redirect to the account page only means a session ended if one existed.
fn session_ended(was_authenticated: bool, location: &str) -> bool {
    was_authenticated && location == ACCOUNT_LOCATION
}

fn prompt_email(default: Option<&str>) -> Result<String> {
    match default {
        Some(last) => print!("Email [{}]: ", last),
        None => print!("Email: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    match default {
        Some(last) if input.is_empty() => Ok(last.to_string()),
        _ => Ok(input.to_string()),
    }
}

fn read_password() -> Result<String> {
    if let Ok(password) = std::env::var(ENV_PASSWORD) {
        return Ok(password);
    }
    rpassword::prompt_password("Password: ").context("Failed to read password")
}

async fn login(session: &SessionManager, config: &mut Config, email: Option<String>) -> Result<()> {
    let email = match email {
        Some(e) => e,
        None => prompt_email(config.last_email.as_deref())?,
    };
    let password = read_password()?;

    match session.login(&email, &password).await {
        AuthOutcome::Success => {
            config.last_email = Some(email.trim().to_string());
            if let Err(e) = config.save() {
                warn!(error = %e, "Failed to save config");
            }
            if let Some(identity) = session.identity() {
                println!("Logged in as {} ({})", identity.subject, identity.role);
            }
            Ok(())
        }
        AuthOutcome::Failure(message) => bail!("Login failed: {}", message),
    }
}

async fn register(session: &SessionManager, config: &Config, email: Option<String>) -> Result<()> {
    let email = match email {
        Some(e) => e,
        None => prompt_email(config.last_email.as_deref())?,
    };
    let password = read_password()?;

    match session.register(&email, &password).await {
        AuthOutcome::Success => {
            println!("Account created. Run `easyshop login` to sign in.");
            Ok(())
        }
        AuthOutcome::Failure(message) => bail!("Registration failed: {}", message),
    }
}

fn whoami(session: &SessionManager) {
    let Some(identity) = session.identity() else {
        println!("Not logged in");
        return;
    };

    println!("Email: {}", identity.subject);
    println!("Role:  {}", identity.role);
    if session.is_admin() {
        println!("Admin: yes");
    }

    let remaining = session
        .api()
        .credential_store()
        .get()
        .and_then(|token| Claims::decode(&token).ok())
        .map(|claims| claims.seconds_until_expiry());
    if let Some(secs) = remaining {
        println!("Session expires in {}m", secs / 60);
    }
}

async fn products(session: &SessionManager) -> Result<()> {
    let products = session.api().fetch_products().await?;
    if products.is_empty() {
        println!("The catalog is empty");
        return Ok(());
    }

    for p in products {
        println!(
            "{:>5}  {:<28} {:>10}  stock: {:<5} {}",
            p.id,
            p.name,
            p.price_display(),
            p.stock,
            p.description_display()
        );
    }
    Ok(())
}

fn require_session(session: &SessionManager) -> Result<()> {
    if !session.is_authenticated() {
        bail!("Sign in first (run `easyshop login`)");
    }
    Ok(())
}

async fn checkout(session: &SessionManager, product_id: i64, quantity: i32) -> Result<()> {
    require_session(session)?;
    if quantity < 1 {
        bail!("Quantity must be at least 1");
    }

    let order = session
        .api()
        .checkout(&[CheckoutItem {
            product_id,
            quantity,
        }])
        .await?;
    println!(
        "Order #{} placed: {:.2} ({})",
        order.id,
        order.total,
        order.status_display()
    );
    Ok(())
}

async fn orders(session: &SessionManager) -> Result<()> {
    require_session(session)?;

    let orders = session.api().fetch_orders().await?;
    if orders.is_empty() {
        println!("No orders yet");
        return Ok(());
    }

    for order in orders {
        println!(
            "#{:<6} {:>10.2}  {:<10} {} item(s)",
            order.id,
            order.total,
            order.status_display(),
            order.item_count()
        );
        for item in &order.items {
            println!(
                "        {} x {} @ {:.2}",
                item.quantity,
                item.name.as_deref().unwrap_or("?"),
                item.price
            );
        }
    }
    Ok(())
}
