//! # ipscout - Interactive Reconnaissance Shell
//!
//! Set a target, run investigative modules against it and export what
//! they found as a DOT relationship graph.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     apps/ipscout (THE BINARY)                   │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐     │
//! │  │   CLI       │    │   Config    │    │     Modules      │     │
//! │  │ (clap+repl) │    │   (toml)    │    │ (tools + HTTP)   │     │
//! │  └──────┬──────┘    └──────┬──────┘    └────────┬─────────┘     │
//! │         │                  │                    │               │
//! │         └──────────────────┼────────────────────┘               │
//! │                            ▼                                    │
//! │                    ┌───────────────┐                            │
//! │                    │ ipscout-core  │                            │
//! │                    │ (THE LOGIC)   │                            │
//! │                    └───────────────┘                            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Interactive shell
//! ipscout
//!
//! # Scripted run
//! ipscout -t example.com -c whois -c "pdns 0" --saveas example.log --exit-after
//! ```

use clap::Parser;
use ipscout::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // IPSCOUT_LOG_FORMAT=json enables machine-parseable diagnostics on stderr.
    let log_format = std::env::var("IPSCOUT_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ipscout=warn,ipscout_core=warn".into());

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

    let cli = cli::Cli::parse();

    if !cli.quiet {
        print_banner();
    }

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the ipscout startup banner.
fn print_banner() {
    println!(
        r#"
  ██╗██████╗ ███████╗ ██████╗ ██████╗ ██╗   ██╗████████╗
  ██║██╔══██╗██╔════╝██╔════╝██╔═══██╗██║   ██║╚══██╔══╝
  ██║██████╔╝███████╗██║     ██║   ██║██║   ██║   ██║
  ██║██╔═══╝ ╚════██║██║     ██║   ██║██║   ██║   ██║
  ██║██║     ███████║╚██████╗╚██████╔╝╚██████╔╝   ██║
  ╚═╝╚═╝     ╚══════╝ ╚═════╝ ╚═════╝  ╚═════╝    ╚═╝

  Reconnaissance Shell v{}

  Target • Investigate • Graph
"#,
        env!("CARGO_PKG_VERSION")
    );
}
