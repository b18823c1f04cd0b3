//! pricedepot CLI - Normalize supplier price lists, search them and quote prices
//!
//! # Main Commands
//!
//! ```bash
//! pricedepot serve                               # Start HTTP server (port 3000)
//! pricedepot parse prices.xlsx                   # Normalized products as JSON
//! pricedepot search "bolt" a.xlsx b.csv          # Search across price lists
//! pricedepot price A-100 a.xlsx --margin 20      # Quote a product
//! pricedepot layout list                         # Manage column layouts
//! pricedepot rates                               # Show the rate table
//! ```
//!
//! Settings come from the environment (see `config`); flags override them.

use clap::{Parser, Subcommand};
use pricedepot::{
    catalog::{Catalog, FileOutcome, IncomingFile},
    config::AppConfig,
    normalize::{normalize_bytes, normalize_file, ColumnLayout, LayoutChoice, NormalizeOptions},
    pricing::{price, RateTable, StaticRates},
    registry::LayoutRegistry,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pricedepot")]
#[command(about = "Normalize supplier price lists, search products and compute sale prices", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize a price list and output products as JSON
    Parse {
        /// Input spreadsheet (xlsx, xls, ods, csv)
        input: PathBuf,

        /// Layout: preset name, auto, stored:<id> or a layout JSON file
        #[arg(short, long)]
        layout: Option<String>,

        /// Include skipped rows and sheet details
        #[arg(long)]
        report: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Search products across price lists
    Search {
        /// Text to look for in product names and stock codes
        query: String,

        /// Price lists to load
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Maximum number of results
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        #[arg(short, long)]
        layout: Option<String>,
    },

    /// Quote every product with a stock code
    Price {
        stock_code: String,

        /// Price lists to load
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Margin on the selling price, in percent
        #[arg(short, long)]
        margin: f64,

        /// Extra discount on the cost, in percent
        #[arg(short, long, default_value = "0")]
        discount: f64,

        /// Target currency code (default: base currency)
        #[arg(short, long)]
        currency: Option<String>,

        /// Rate table JSON file
        #[arg(long)]
        rates: Option<PathBuf>,

        /// Only quote products from this price list
        #[arg(short, long)]
        supplier: Option<String>,

        #[arg(short, long)]
        layout: Option<String>,
    },

    /// Manage column layouts
    Layout {
        #[command(subcommand)]
        action: LayoutAction,
    },

    /// Show the effective rate table
    Rates {
        /// Rate table JSON file
        #[arg(long)]
        rates: Option<PathBuf>,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(Subcommand)]
enum LayoutAction {
    /// List stored layouts
    List,

    /// List built-in presets
    Presets,

    /// Show a stored layout or preset as JSON
    Show {
        /// Stored layout ID or preset name
        id: String,
    },

    /// Import a layout JSON file
    Import {
        file: PathBuf,
        /// Name for the layout
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Delete a stored layout
    Delete {
        id: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match AppConfig::from_env() {
        Ok(config) => run(cli.command, config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Parse {
            input,
            layout,
            report,
            output,
        } => cmd_parse(&input, &layout_options(&config, layout.as_deref())?, report, output.as_deref()),

        Commands::Search {
            query,
            files,
            limit,
            layout,
        } => {
            let options = layout_options(&config, layout.as_deref())?;
            cmd_search(&query, &files, limit.unwrap_or(config.search_limit), &options, &config)
        }

        Commands::Price {
            stock_code,
            files,
            margin,
            discount,
            currency,
            rates,
            supplier,
            layout,
        } => {
            let options = layout_options(&config, layout.as_deref())?;
            let rates = load_rates(&config, rates)?;
            let terms = Terms {
                margin,
                discount,
                currency: currency.unwrap_or_default(),
            };
            cmd_price(&stock_code, &files, supplier.as_deref(), &terms, &rates, &options, &config)
        }

        Commands::Layout { action } => cmd_layout(action, &config),

        Commands::Rates { rates } => cmd_rates(&load_rates(&config, rates)?),

        Commands::Serve { port } => {
            let mut config = config;
            if let Some(port) = port {
                config.port = port;
            }
            pricedepot::server::start_server(config).await
        }
    }
}

/// Normalize options with an optional `--layout` override
fn layout_options(config: &AppConfig, layout: Option<&str>) -> Result<NormalizeOptions, Box<dyn std::error::Error>> {
    let mut options = config.normalize_options();
    if let Some(layout) = layout {
        options.layout = layout.parse::<LayoutChoice>()?;
    }
    Ok(options)
}

fn load_rates(config: &AppConfig, path: Option<PathBuf>) -> Result<StaticRates, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(StaticRates::from_file(path)?),
        None => Ok(config.load_rates()?),
    }
}

fn cmd_parse(
    input: &Path,
    options: &NormalizeOptions,
    report: bool,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing: {}", input.display());

    let upload = normalize_file(input, options)?;
    eprintln!("✅ {} products, {} rows skipped", upload.products.len(), upload.skipped.len());

    let json = if report {
        serde_json::to_string_pretty(&upload)?
    } else {
        serde_json::to_string_pretty(&upload.products)?
    };
    write_output(&json, output)
}

/// Load price lists into a fresh catalog, one batch
fn load_catalog(
    files: &[PathBuf],
    options: &NormalizeOptions,
    config: &AppConfig,
) -> Result<Catalog, Box<dyn std::error::Error>> {
    let mut incoming = Vec::with_capacity(files.len());
    for path in files {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| path.display().to_string());
        incoming.push(IncomingFile::new(name, fs::read(path)?));
    }

    let mut catalog = Catalog::with_max_files(config.max_files);
    let outcome = catalog.upload_batch(incoming, |file| normalize_bytes(&file.bytes, &file.name, options))?;

    for file in &outcome.files {
        match file {
            FileOutcome::Added { name, product_count, .. } => {
                eprintln!("   ✓ {}: {} products", name, product_count)
            }
            FileOutcome::Duplicate { name } => eprintln!("   ⚠️ {}: duplicate file name", name),
            FileOutcome::Failed { name, error } => eprintln!("   ❌ {}: {}", name, error),
        }
    }

    Ok(catalog)
}

fn cmd_search(
    query: &str,
    files: &[PathBuf],
    limit: usize,
    options: &NormalizeOptions,
    config: &AppConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = load_catalog(files, options, config)?;
    let hits = catalog.search(query, limit);

    eprintln!("🔍 {} result(s) for \"{}\"", hits.len(), query.trim());
    println!("{}", serde_json::to_string_pretty(&hits)?);
    Ok(())
}

struct Terms {
    margin: f64,
    discount: f64,
    currency: String,
}

fn cmd_price(
    stock_code: &str,
    files: &[PathBuf],
    supplier: Option<&str>,
    terms: &Terms,
    rates: &StaticRates,
    options: &NormalizeOptions,
    config: &AppConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = load_catalog(files, options, config)?;
    let products = catalog.find(supplier, stock_code);
    if products.is_empty() {
        return Err(format!("Product not found: {}", stock_code).into());
    }

    let mut quotes = Vec::with_capacity(products.len());
    for product in products {
        let quote = price(product, terms.margin, terms.discount, &terms.currency, rates)?;
        eprintln!(
            "💰 {} ({}, {}): {}",
            product.product_name,
            product.company,
            product.source_file,
            quote.display().formatted()
        );
        quotes.push(serde_json::json!({
            "product": product,
            "quote": quote.display(),
            "record": quote.to_record(product, None),
        }));
    }

    println!("{}", serde_json::to_string_pretty(&quotes)?);
    Ok(())
}

fn cmd_rates(rates: &StaticRates) -> Result<(), Box<dyn std::error::Error>> {
    println!("Base currency: {}", rates.base_currency());
    for code in rates.currencies() {
        let rate = rates.rate(code).unwrap_or(1.0);
        let symbol = rates.symbol(code).unwrap_or("");
        println!("  {:<4} {:>10.4} {}", code, rate, symbol);
    }
    Ok(())
}

fn cmd_layout(action: LayoutAction, config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut registry = LayoutRegistry::with_dir(&config.layout_dir);

    match action {
        LayoutAction::List => {
            let layouts = registry.list();
            if layouts.is_empty() {
                eprintln!("📋 No layouts stored yet.");
                eprintln!("   Use 'pricedepot layout import <file>' to add one.");
                return Ok(());
            }

            eprintln!("📋 Stored layouts ({}):\n", layouts.len());
            for l in layouts {
                println!("  📄 {} ({})", l.name(), l.id);
                println!("     Headers: {}", l.headers.join(", "));
                println!("     Success rate: {:.0}%", l.success_rate * 100.0);
                println!("     Uses: {}", l.use_count);
                if let Some(ref last) = l.last_used {
                    println!("     Last used: {}", last);
                }
                println!();
            }
        }

        LayoutAction::Presets => {
            for preset in ColumnLayout::presets() {
                println!("  {:<10} {}", preset.name, preset.description);
            }
        }

        LayoutAction::Show { id } => {
            let layout = match registry.get(&id) {
                Some(stored) => stored.layout.clone(),
                None => ColumnLayout::preset(&id)?,
            };
            println!("{}", layout.to_json()?);
        }

        LayoutAction::Import { file, name } => {
            eprintln!("📥 Importing layout from: {}", file.display());
            let id = registry.import(&file, name.as_deref())?;
            eprintln!("✅ Layout saved with ID: {}", id);
        }

        LayoutAction::Delete { id } => {
            registry.delete(&id)?;
            eprintln!("🗑️  Layout deleted: {}", id);
        }
    }

    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
