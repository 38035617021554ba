//! Tenant Clone CLI - Product sync and tenant replication jobs.
//!
//! # Usage
//!
//! ```bash
//! # Mirror products from each source catalog into its destination catalog
//! tenant-clone products
//!
//! # Create missing categories and fix parents in destination catalogs
//! tenant-clone categories
//!
//! # Copy merchandizing rules, stripping code prefixes on the way
//! tenant-clone merchandizing-rules --strip-prefixes
//!
//! # Run every copy job in dependency order
//! tenant-clone all
//! ```
//!
//! Configuration comes from the environment (see `tenant_clone_sync::config`).
//! Logs go to stderr; set `LOG_FORMAT=json` for structured output.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tenant_clone_sync::CloneConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "tenant-clone")]
#[command(author, version, about = "Copy catalog data between catalogs and sites of a tenant")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Sync products from each source catalog into its destination catalog
    Products,
    /// Create missing categories and re-parent moved ones
    Categories,
    /// Strip `CATEGORY_CODE_PREFIXES` from category codes in every site catalog
    CleanCategories,
    /// Copy cart, checkout, shipping and other site settings
    SiteSettings,
    /// Copy the default search settings
    SearchSettings,
    /// Copy search merchandizing rules
    MerchandizingRules {
        /// Remove `CATEGORY_CODE_PREFIXES` from every string in each rule
        #[arg(long)]
        strip_prefixes: bool,
    },
    /// Copy search redirects
    Redirects,
    /// Copy catalog-level entity lists
    Entities,
    /// Run categories, products and every site job, in that order
    All {
        /// Remove `CATEGORY_CODE_PREFIXES` from merchandizing rules
        #[arg(long)]
        strip_prefixes: bool,
    },
}

/// Initialize Sentry error tracking.
///
/// Returns `None` if `SENTRY_DSN` is not configured.
fn init_sentry(config: &CloneConfig) -> Option<sentry::ClientInitGuard> {
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

fn init_tracing(json_logs: bool) {
    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tenant_clone_sync=info,tenant_clone_cli=info".into());

    let json_layer = json_logs.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(std::io::stderr)
    });
    let text_layer =
        (!json_logs).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match CloneConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(false);
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let sentry_guard = init_sentry(&config);
    init_tracing(config.json_logs);

    let result = commands::run(cli.command, &config).await;

    if let Err(e) = result {
        tracing::error!(command = ?cli.command, error = %e, "Command failed");
        // `process::exit` skips destructors; flush Sentry first
        drop(sentry_guard);
        std::process::exit(1);
    }
}
