use clap::{Parser, Subcommand};
use secaudit_engine::Product;
use std::path::PathBuf;

/// secaudit - security exception auditor
///
/// Audits exclusion lists and firewall rules, flags stale entries, and checks
/// coverage of common development tooling.
#[derive(Parser, Debug)]
#[command(name = "secaudit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Whitelist catalog YAML (default: SECAUDIT_CATALOG or .secaudit-catalog.yaml)
    #[arg(long, global = true, value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// Timeout for each external collector tool in seconds (default: from env or 30)
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Run product collectors one after another instead of in parallel
    #[arg(long, global = true, default_value = "false")]
    pub sequential: bool,

    /// Debug logging for secaudit targets
    #[arg(short, long, global = true, default_value = "false")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List security products detected on this host
    Products,

    /// Audit security exceptions
    ///
    /// Examples:
    ///   secaudit audit
    ///   secaudit audit --product defender --recommend --format json --output report.json
    Audit {
        /// Product to audit (repeatable; default: every available product)
        #[arg(long = "product", value_name = "PRODUCT", value_parser = parse_product)]
        products: Vec<Product>,

        /// Include whitelist recommendations in the report
        #[arg(long, default_value = "false")]
        recommend: bool,

        /// Only recommend entries whose paths exist on this host
        #[arg(long, default_value = "false")]
        installed_only: bool,

        /// Output format: markdown (default) or json
        #[arg(long, default_value = "markdown", value_parser = ["markdown", "json"])]
        format: String,

        /// Write the report to a file instead of stdout
        #[arg(long, short, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Recommend exceptions for catalog tools that are not yet covered
    Recommend {
        /// Only recommend entries whose paths exist on this host
        #[arg(long, default_value = "false")]
        installed_only: bool,

        /// Output format: markdown (default) or json
        #[arg(long, default_value = "markdown", value_parser = ["markdown", "json"])]
        format: String,

        /// Write the recommendations to a file instead of stdout
        #[arg(long, short, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Check whether a process is running and/or a port is bound
    ///
    /// Examples:
    ///   secaudit check --process uvicorn --port 8000
    Check {
        /// Process name (exact match first, then substring)
        #[arg(long, value_name = "NAME")]
        process: Option<String>,

        /// Port number
        #[arg(long, value_name = "PORT")]
        port: Option<u16>,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Find stale exceptions and optionally remove them
    Cleanup {
        /// Remove stale exceptions (default is a dry run)
        #[arg(long, default_value = "false")]
        apply: bool,
    },
}

fn parse_product(value: &str) -> Result<Product, String> {
    value.parse::<Product>().map_err(|e| e.to_string())
}
