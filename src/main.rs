mod output;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use qtree::query::{canonicalize, encode, ItemSpec, QueryTree};
use qtree::utils::{get_config_path, AppConfig};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "qtree")]
#[command(about = "Build, canonicalize and encode search query trees")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    options: GlobalOptions,
}

#[derive(Args)]
struct GlobalOptions {
    /// Config file to use instead of the one in the config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Largest query tree accepted by canonicalization
    #[arg(long, global = true, conflicts_with = "unbounded")]
    max_items: Option<u32>,

    /// Do not limit the query tree size
    #[arg(long, global = true)]
    unbounded: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log canonicalization and encoding decisions to stderr
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a tree from its JSON description and print it
    Show {
        /// JSON file, or - for stdin
        input: PathBuf,

        /// Print one item per line with ids and connectivity
        #[arg(long)]
        outline: bool,
    },
    /// Canonicalize a tree and print the result
    Canonicalize {
        /// JSON file, or - for stdin
        input: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Encode a tree into the binary stack format
    Encode {
        /// JSON file, or - for stdin
        input: PathBuf,

        /// Write the payload bytes instead of a hex dump
        #[arg(long)]
        raw: bool,

        /// Encode the tree as given, without canonicalizing it first
        #[arg(long)]
        no_canonicalize: bool,
    },
    /// Show the effective configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.options.verbose);

    let config = load_config(&cli.options)?;
    let max_items = if cli.options.unbounded {
        None
    } else {
        cli.options.max_items.or(config.max_query_items)
    };
    let color = !cli.options.no_color;

    match cli.command {
        Commands::Show { input, outline } => {
            let tree = read_tree(&input)?;
            if outline {
                output::print_outline(&tree, color)?;
            } else {
                output::print_text(&tree)?;
            }
        }
        Commands::Canonicalize { input, json } => {
            let mut tree = read_tree(&input)?;
            canonicalize(&mut tree, max_items)?;
            if json {
                output::print_json(&tree)?;
            } else {
                output::print_text(&tree)?;
            }
        }
        Commands::Encode {
            input,
            raw,
            no_canonicalize,
        } => {
            let mut tree = read_tree(&input)?;
            if config.canonicalize_before_encode && !no_canonicalize {
                canonicalize(&mut tree, max_items)?;
            }
            let mut payload = Vec::new();
            let count = encode(&tree, &mut payload)?;
            debug!(items = count, bytes = payload.len(), "encoded query tree");
            if raw {
                output::write_raw(&payload)?;
            } else {
                output::print_payload(&payload, count, color)?;
            }
        }
        Commands::Config => {
            let path = match &cli.options.config {
                Some(path) => path.clone(),
                None => get_config_path()?,
            };
            println!("Config file: {}", path.display());
            println!("{}", serde_json::to_string_pretty(&config)?);
            match max_items {
                Some(limit) => println!("Effective item limit: {}", limit),
                None => println!("Effective item limit: unbounded"),
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "qtree=warn",
        1 => "qtree=debug",
        _ => "qtree=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(options: &GlobalOptions) -> Result<AppConfig> {
    match &options.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
}

fn read_tree(input: &Path) -> Result<QueryTree> {
    let json = if input == Path::new("-") {
        let mut json = String::new();
        std::io::stdin()
            .read_to_string(&mut json)
            .context("Failed to read query from stdin")?;
        json
    } else {
        std::fs::read_to_string(input)
            .with_context(|| format!("Failed to read {}", input.display()))?
    };
    let spec = ItemSpec::from_json(&json)
        .with_context(|| format!("Failed to parse query description {}", input.display()))?;
    let tree = spec
        .build()
        .with_context(|| format!("Invalid query tree in {}", input.display()))?;
    Ok(tree)
}
