use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use sddb::pipeline::DedupPipeline;
use sddb::scraper::{DEFAULT_MAX_PAGE, SearchFilters, WebScraper};
use sddb::sink::{JsonlSink, RecordSink};

#[derive(Parser)]
#[command(name = "sddb")]
#[command(about = "A database.globalreporting.org sustainability disclosure scraper", long_about = None)]
struct Cli {
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        default_value = "info",
        global = true,
        help = "Set the logging level"
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full crawl: paginate the search, follow every organization and
    /// report, dedup and write collection-tagged JSONL
    Crawl {
        #[arg(
            long,
            default_value_t = DEFAULT_MAX_PAGE,
            value_parser = clap::value_parser!(u32).range(1..),
            help = "Number of search pages to fetch"
        )]
        max_page: u32,

        #[arg(long, value_name = "FILE", help = "Write records here instead of stdout")]
        out: Option<PathBuf>,

        #[arg(short = 'q', long, help = "Free-text search filter")]
        query: Option<String>,

        #[arg(long = "size", help = "Filter by organization size (repeatable)")]
        sizes: Vec<String>,

        #[arg(long = "sector", help = "Filter by sector (repeatable)")]
        sectors: Vec<String>,

        #[arg(long = "country", help = "Filter by country (repeatable)")]
        countries: Vec<String>,

        #[arg(long = "region", help = "Filter by region (repeatable)")]
        regions: Vec<String>,

        #[arg(long = "year", help = "Filter by publication year (repeatable)")]
        years: Vec<String>,

        #[arg(long = "type", help = "Filter by report type (repeatable)")]
        types: Vec<String>,
    },
    /// Fetch a single search-results page and print its rows
    Search {
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        page: u32,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
    /// Fetch one organization detail page by id
    Org {
        #[arg(help = "Organization id, e.g. 8841")]
        id: String,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
    /// Fetch one report detail page by id
    Report {
        #[arg(help = "Report id, e.g. 51129")]
        id: String,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
}

fn serialize_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            log::error!("Error serializing to JSON: {}", e);
            process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.clone().into())
        .init();

    let scraper = WebScraper::new().unwrap_or_else(|e| {
        log::error!("Error creating scraper: {}", e);
        process::exit(1);
    });

    match cli.command {
        Commands::Crawl {
            max_page,
            out,
            query,
            sizes,
            sectors,
            countries,
            regions,
            years,
            types,
        } => {
            let filters = SearchFilters {
                q: query.unwrap_or_default(),
                sizes,
                sectors,
                countries,
                regions,
                years,
                types,
            };

            let mut sink: Box<dyn RecordSink> = match &out {
                Some(path) => Box::new(JsonlSink::create(path).unwrap_or_else(|e| {
                    log::error!("Error opening {}: {}", path.display(), e);
                    process::exit(1);
                })),
                None => Box::new(JsonlSink::stdout()),
            };
            let mut pipeline = DedupPipeline::new();

            let stats = scraper
                .crawl(max_page, &filters, &mut pipeline, sink.as_mut())
                .await
                .unwrap_or_else(|e| {
                    log::error!("Crawl failed: {}", e);
                    process::exit(1);
                });

            eprint!("{}", stats);
        }

        Commands::Search { page, format } => {
            let csrf = scraper.bootstrap().await.unwrap_or_else(|e| {
                log::error!("Session bootstrap failed: {}", e);
                process::exit(1);
            });

            let rows = scraper
                .fetch_search_page(&csrf, &SearchFilters::default(), page)
                .await
                .unwrap_or_else(|e| {
                    log::error!("Error fetching search page: {}", e);
                    process::exit(1);
                });

            match format {
                OutputFormat::Json => serialize_json(&rows),
                OutputFormat::Text => {
                    if rows.is_empty() {
                        println!("No entries to display.");
                    } else {
                        for (i, row) in rows.iter().enumerate() {
                            println!("{:>3}. {}", i + 1, row);
                        }
                    }
                }
            }
        }

        Commands::Org { id, format } => {
            let org = scraper.fetch_organization(&id).await.unwrap_or_else(|e| {
                log::error!("Error fetching organization {}: {}", id, e);
                process::exit(1);
            });

            match format {
                OutputFormat::Json => serialize_json(&org),
                OutputFormat::Text => print!("{}", org),
            }
        }

        Commands::Report { id, format } => {
            let report = scraper.fetch_report(&id).await.unwrap_or_else(|e| {
                log::error!("Error fetching report {}: {}", id, e);
                process::exit(1);
            });

            match format {
                OutputFormat::Json => serialize_json(&report),
                OutputFormat::Text => print!("{}", report),
            }
        }
    }
}
