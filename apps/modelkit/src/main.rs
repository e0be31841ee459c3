//! # modelkit - Schema and Model CLI
//!
//! The main binary for the modelkit model layer.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │          apps/modelkit (THE BINARY)           │
//! │                                               │
//! │   ┌─────────────┐       ┌─────────────────┐   │
//! │   │    CLI      │       │ schema / data   │   │
//! │   │   (clap)    │──────▶│ files (toml,    │   │
//! │   └──────┬──────┘       │ json)           │   │
//! │          │              └─────────────────┘   │
//! │          ▼                                    │
//! │   ┌───────────────┐                           │
//! │   │ modelkit-core │                           │
//! │   │  (THE LOGIC)  │                           │
//! │   └───────────────┘                           │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! modelkit check --schema models.toml
//! modelkit eval --schema models.toml --data items.json --query 'item=list:1.item:*'
//! modelkit path --name item --id 3 --parent-name list --parent-id 1
//! ```

use clap::Parser;
use modelkit::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = cli::Cli::parse();

    // MODELKIT_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("MODELKIT_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_filter = if cli.verbose {
        "modelkit=debug,modelkit_core=debug"
    } else {
        "modelkit=info,modelkit_core=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the one-line startup banner.
fn print_banner() {
    eprintln!("modelkit v{}", env!("CARGO_PKG_VERSION"));
}
