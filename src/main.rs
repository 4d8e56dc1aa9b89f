//! OurPlanet - natural events per category from NASA EONET
//!
//! A CLI that loads the EONET category catalog, fetches every category's
//! events with a bounded number of requests in flight, and writes a
//! Markdown or JSON report.
//!
//! Exit codes:
//!   0   - Success
//!   1   - Runtime error (configuration, catalog, report writing, etc.)
//!   130 - Interrupted with Ctrl-C

use anyhow::{Context, Result};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use ourplanet::cli::{Args, OutputFormat};
use ourplanet::config::{Config, CONFIG_FILE_NAME};
use ourplanet::models::{event_in_category, Category, Event, Report, ReportMetadata};
use ourplanet::source::{CategoryCatalog, EonetClient, EventSource, FixtureSource};
use ourplanet::{report, Aggregator, Emission};
use std::time::Instant;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Configuration comes first so its `verbose` setting reaches the logger
    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(config.log_level(&args));

    info!("OurPlanet v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    debug!("Configuration: {:?}", config);

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .ourplanet.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize the API, time window, concurrency and report.");
    Ok(())
}

/// Initialize logging based on verbosity settings; `RUST_LOG` wins when set.
fn init_logging(level: Level) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete workflow. Returns the process exit code.
async fn run(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();

    match config.source.fixtures.clone() {
        Some(dir) => {
            let source = FixtureSource::new(dir);
            let label = source.root().display().to_string();
            println!("📂 Reading recorded events from {}", label);
            fetch_and_report(source, label, &args, &config, start_time).await
        }
        None => {
            let client =
                EonetClient::new(config.eonet_config()).context("Failed to create EONET client")?;
            let label = client.config().api_url.clone();
            println!(
                "🌍 Fetching events from {} (timeout {}s)",
                label,
                client.config().timeout_seconds
            );
            fetch_and_report(client, label, &args, &config, start_time).await
        }
    }
}

/// Load the catalog, aggregate every category, and write the report.
async fn fetch_and_report<S>(
    source: S,
    source_label: String,
    args: &Args,
    config: &Config,
    start_time: Instant,
) -> Result<i32>
where
    S: CategoryCatalog<Event> + EventSource<Event>,
{
    let categories = source
        .categories()
        .await
        .context("Failed to load category catalog")?;

    if args.list_categories {
        print_categories(&categories);
        return Ok(0);
    }

    let aggregator = Aggregator::new(categories, config.fetch.max_concurrent)?;
    let total = aggregator.total();

    println!(
        "📥 Downloading events for {} categories (last {} days, {} at a time)...",
        total,
        config.source.days,
        aggregator.max_concurrent()
    );

    let progress_bar = if config.general.progress_bar {
        Some(make_progress_bar(total as u64))
    } else {
        None
    };

    let mut aggregation = aggregator.spawn(source, event_in_category);

    // Without a signal handler, wait forever instead of cancelling.
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    tokio::pin!(ctrl_c);

    let completion = loop {
        tokio::select! {
            emission = aggregation.next() => match emission {
                Some(Emission::Snapshot(snapshot)) => {
                    let distinct = snapshot.distinct_events();
                    debug!("Snapshot: {} distinct events", distinct);
                    if let Some(ref pb) = progress_bar {
                        pb.set_message(format!("{} events", distinct));
                    }
                }
                Some(Emission::Progress(progress)) => {
                    debug!("Progress: {}", progress);
                    if let Some(ref pb) = progress_bar {
                        pb.set_position(progress.completed as u64);
                    }
                }
                Some(Emission::Completed(completion)) => break completion,
                None => anyhow::bail!("Aggregation stopped before completing"),
            },
            _ = &mut ctrl_c => {
                aggregation.cancel();
                if let Some(ref pb) = progress_bar {
                    pb.abandon_with_message("cancelled");
                }
                eprintln!("\n⛔ Interrupted. No report written.");
                return Ok(130);
            }
        }
    };

    if let Some(ref pb) = progress_bar {
        pb.finish_with_message(format!(
            "{} events",
            completion.snapshot.distinct_events()
        ));
    }

    for id in &completion.failed {
        if let Some(category) = completion.snapshot.category(*id) {
            warn!("No complete event list for {} ({})", category.name, id);
        }
    }

    let duration = start_time.elapsed().as_secs_f64();
    let metadata = ReportMetadata {
        source: source_label,
        generated_at: Utc::now(),
        days: config.source.days,
        max_concurrent: config.fetch.max_concurrent,
        categories_fetched: total,
        categories_failed: completion.failed.len(),
        total_events: completion.snapshot.distinct_events(),
        duration_seconds: duration,
    };
    let report = Report::from_completion(&completion, metadata);

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report, &config.report),
    };

    let output_path = config.output_path(args.format);
    std::fs::write(&output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path))?;

    println!("\n📊 Summary:");
    println!("   Categories: {}", total);
    if !completion.failed.is_empty() {
        println!("   ⚠️  Failed: {}", completion.failed.len());
    }
    println!("   Distinct events: {}", report.metadata.total_events);
    for entry in report.summary.iter().filter(|s| s.event_count > 0) {
        println!("   - {}: {}", entry.name, entry.event_count);
    }
    println!("   Duration: {:.1}s", duration);
    println!("\n✅ Done! Report saved to: {}", output_path);

    Ok(0)
}

fn make_progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} categories, {msg}")
        .map(|style| style.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

/// Handle --list-categories: print the catalog.
fn print_categories(categories: &[Category<Event>]) {
    println!("\n📚 {} categories:\n", categories.len());
    for category in categories {
        println!("   {:>3}  {}", category.id, category.name);
        if !category.description.is_empty() {
            println!("        {}", category.description);
        }
    }
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up, so problems go to stderr directly.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Failed to load {}: {:#}", CONFIG_FILE_NAME, e);
            Ok(Config::default())
        }
    }
}
