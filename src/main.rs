use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use validator::Validate;

use restock_watcher::config::AppConfig;
use restock_watcher::fetcher::HttpFetcher;
use restock_watcher::models::NewProduct;
use restock_watcher::monitor::{MonitorConfig, MonitorEngine};
use restock_watcher::notifier::{EmailNotifier, Notifier};
use restock_watcher::store::{ProductStore, StoreError};
use restock_watcher::web::{self, AppState};

#[derive(Parser)]
#[command(name = "restock-watcher", version, about = "Back-in-stock monitoring and email notification service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Add a new product to monitor
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        url: String,
        /// CSS selector for the stock status element
        #[arg(long)]
        selector: String,
        /// Text that indicates the product is out of stock
        #[arg(long = "expected-text")]
        expected_text: String,
        /// Email address to notify
        #[arg(long)]
        email: String,
    },
    /// List all products
    List,
    /// Run the monitoring loop until interrupted
    Monitor,
    /// Check a single product without sending notifications
    Test {
        #[arg(long)]
        id: i64,
    },
    /// Run the HTTP front end
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let file_appender = tracing_appender::rolling::never(".", "restock-watcher.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            EnvFilter::from_default_env().add_directive("restock_watcher=info".parse()?),
        )
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    // Explicit wiring: every collaborator is constructed here, once, and
    // handed to its consumers.
    let store = ProductStore::connect(&config.database).await?;
    let fetcher = Arc::new(HttpFetcher::new(&config.monitor)?);
    let notifier: Arc<dyn Notifier> = Arc::new(EmailNotifier::new(config.smtp.clone())?);
    let engine = Arc::new(MonitorEngine::new(
        store.clone(),
        fetcher,
        Arc::clone(&notifier),
        MonitorConfig::from_settings(&config.monitor),
    ));

    match cli.command {
        Command::Add {
            name,
            url,
            selector,
            expected_text,
            email,
        } => {
            let request = NewProduct {
                name,
                url,
                selector,
                expected_text,
                email,
            };
            request.validate()?;

            match store.insert(&request).await {
                Ok(product) => {
                    info!(product_id = product.id, "product added");
                    println!("Added product '{}' (id {})", product.name, product.id);
                }
                Err(StoreError::DuplicateUrl { url }) => {
                    println!("A product with URL '{}' already exists", url);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Command::List => {
            let products = store.list_all().await?;
            if products.is_empty() {
                println!("No products found.");
                return Ok(());
            }

            for product in products {
                let status = if product.is_active { "active" } else { "inactive" };
                let last_checked = product
                    .last_checked
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());

                println!("[{}] {} ({})", product.id, product.name, status);
                println!("    url:          {}", product.url);
                println!("    notify:       {}", product.email);
                println!("    created:      {}", product.created_at.to_rfc3339());
                println!("    last checked: {}", last_checked);
            }
        }

        Command::Monitor => {
            engine.start().await;
            println!("Monitoring products. Press Ctrl+C to stop.");

            tokio::signal::ctrl_c().await?;
            info!("Shutting down...");
            engine.stop().await;
        }

        Command::Test { id } => match engine.check_one(id).await {
            Ok(availability) => println!("Product {} is {}", id, availability),
            Err(StoreError::NotFound { id }) => println!("Product {} not found", id),
            Err(e) => return Err(e.into()),
        },

        Command::Serve => {
            let state = AppState {
                store,
                engine,
                notifier,
                config: config.clone(),
            };
            web::serve(&config.server, state).await?;
        }
    }

    Ok(())
}
