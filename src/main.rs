// Daily price charts with retry, plus the ranked board they are opened from.
mod chart;
// HTTP client module.
mod http {
    // Transport seam and reqwest implementation.
    pub mod client;
}
// Environment configuration.
mod config;
// module storing defaults
mod constants;
// CSV output of charts.
mod export;
// Finnhub fundamentals for the screener.
mod finnhub;
// Symbol import from listing files and public sources.
mod importer;
// Data models and application errors.
mod model;
// Screener scoring and ranking.
mod screener;
// Data storage module.
mod store {
    /// Import run log.
    pub mod import_stats;
    /// Ranked board storage.
    pub mod ranked;
    /// SQLite database interaction.
    pub mod sqlite;
    /// Symbol list storage.
    pub mod symbols;
}
// Symbol list parsing and cleanup.
mod symbols;

use std::{fs::File, sync::Arc};

use chart::{ChartController, ChartFetcher, ChartState};
use clap::{Parser, Subcommand};
use dotenv::dotenv;

// Command-line argument parser.
#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

// Subcommands for the application.
#[derive(Subcommand, Debug)]
enum Commands {
    // Fetch daily history; each symbol supersedes the one before it.
    Chart {
        #[arg(required = true)]
        symbols: Vec<String>,
        // Write the displayed chart to this CSV file instead of stdout.
        #[arg(long)]
        csv: Option<String>,
    },
    // Load symbols from listing files and public listing sources into the store.
    ImportSymbols {
        listing_files: Vec<String>,
        // Comma-separated source names; every source when no files are given.
        #[arg(long, value_delimiter = ',')]
        sources: Vec<String>,
    },
    // Score symbols and replace the ranked board.
    Screen {
        #[arg(long)]
        symbols_file: Option<String>,
        #[arg(long, default_value_t = constants::TOP_STOCKS)]
        top: usize,
    },
    // Print the ranked board.
    Board {
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
// Main function entry point.
async fn main() {
    dotenv().ok();

    env_logger::init();

    let args = Args::parse();

    let config = match config::Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            log::error!("Error reading configuration: {}", err);
            return;
        }
    };

    match args.command {
        Commands::Chart { symbols, csv } => match show_chart(&config, &symbols, csv.as_deref()).await {
            Ok(ChartState::Success) => log::info!("Chart loaded"),
            Ok(_) => log::error!("Chart could not be loaded"),
            Err(err) => log::error!("Error showing chart: {}", err),
        },

        Commands::ImportSymbols {
            listing_files,
            sources,
        } => match import_symbols(&config, &listing_files, &sources).await {
            Ok(summary) => log::info!(
                "Import complete. Raw: {} Final: {} Written: {} Failed sources: {}",
                summary.fetched,
                summary.filtered,
                summary.written,
                if summary.failed_sources.is_empty() {
                    "none".to_string()
                } else {
                    summary.failed_sources.join(", ")
                }
            ),
            Err(err) => log::error!("Error importing symbols: {}", err),
        },

        Commands::Screen { symbols_file, top } => {
            match screen(&config, symbols_file.as_deref(), top).await {
                Ok(top_stocks) => {
                    log::info!("Successfully updated {} ranked stocks", top_stocks.len())
                }
                Err(err) => log::error!("Error screening stocks: {}", err),
            }
        }

        Commands::Board { json } => {
            if let Err(err) = print_board(&config, json) {
                log::error!("Error reading board: {}", err);
            }
        }
    }
}

fn open_store(config: &config::Config) -> model::Result<rusqlite::Connection> {
    let conn = store::sqlite::init_connection(&config.sqlite_file)?;
    store::symbols::create_table(&conn)?;
    store::ranked::create_table(&conn)?;
    store::import_stats::create_table(&conn)?;
    Ok(conn)
}

async fn show_chart(
    config: &config::Config,
    symbols: &[String],
    csv_path: Option<&str>,
) -> model::Result<ChartState> {
    let fetcher = Arc::new(ChartFetcher::new(config.provider.clone()));
    let mut controller = ChartController::new(fetcher);
    for symbol in symbols {
        controller.request(symbol);
    }

    let chart = controller
        .settle()
        .await
        .ok_or_else(|| model::AppError::InvalidConfig("no symbol to chart".into()))?;
    if !chart.is_final() {
        log::error!("Request for {} stopped before finishing", chart.symbol);
    }

    match chart.state {
        ChartState::Success => match csv_path {
            Some(path) => {
                let rows = export::write_chart_csv(File::create(path)?, chart)?;
                log::info!("Wrote {} rows for {} to {}", rows, chart.symbol, path);
            }
            None => {
                println!("{}", chart.symbol);
                for (date, close) in chart.closes() {
                    println!("{}\t{:.2}", date, close);
                }
            }
        },
        _ => {
            if let Some(message) = chart.error_message() {
                eprintln!("{}: {}", chart.symbol, message);
            }
        }
    }
    Ok(chart.state)
}

async fn import_symbols(
    config: &config::Config,
    listing_files: &[String],
    source_names: &[String],
) -> model::Result<importer::ImportSummary> {
    let sources = if source_names.is_empty() && !listing_files.is_empty() {
        Vec::new()
    } else {
        importer::select_sources(source_names)?
    };
    let mut conn = open_store(config)?;
    let fetcher = importer::ListingFetcher::default();
    importer::import_symbols(&mut conn, &fetcher, listing_files, &sources).await
}

async fn screen(
    config: &config::Config,
    symbols_file: Option<&str>,
    top: usize,
) -> model::Result<Vec<model::RankedRecord>> {
    let mut conn = open_store(config)?;
    let client = finnhub::FinnhubClient::new(config.finnhub.clone());
    screener::screen_and_save(&mut conn, &client, symbols_file, top).await
}

fn print_board(config: &config::Config, json: bool) -> model::Result<()> {
    let conn = open_store(config)?;
    let rows = store::ranked::get_ranked(&conn)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    println!(
        "{:<4} {:<8} {:>8} {:>10} {:>8} {:>8}",
        "#", "SYMBOL", "P/E", "SENTIMENT", "VOLUME", "SCORE"
    );
    for (i, row) in rows.iter().enumerate() {
        println!(
            "{:<4} {:<8} {:>8.1} {:>10.2} {:>7.1}x {:>8.3}",
            i + 1,
            row.symbol,
            row.pe,
            row.sentiment,
            row.volume_surge,
            row.score
        );
    }
    if let Some(run) = store::import_stats::get_recent(&conn, 1)?.first() {
        println!(
            "Last symbol import: {} ({}, {} symbols)",
            run.run_at.format("%Y-%m-%d %H:%M UTC"),
            run.status.as_str(),
            run.filtered_count
        );
    }
    Ok(())
}
