use bzip2::read::BzDecoder;
use clap::{ArgAction, Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use wiktionary_etymology::config::Config;
use wiktionary_etymology::output::{OutputFormat, RowWriter};
use wiktionary_etymology::parallel::{process_channel_pipeline, run_sequential, Limits, ParallelConfig, Stats};
use wiktionary_etymology::Result;

/// Processing strategy for the dump
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Strategy {
    /// Sequential processing (baseline)
    Sequential,
    /// Reader thread, worker threads, ordered writer
    Pipeline,
}

#[derive(Parser)]
#[command(name = "wiktionary-etymology")]
#[command(about = "Extract etymological relations from a Wiktionary XML dump")]
struct Args {
    /// Input XML file (.xml or .xml.bz2)
    input: PathBuf,

    /// Output file
    output: PathBuf,

    /// Processing strategy
    #[arg(short, long, value_enum, default_value_t = Strategy::Pipeline)]
    strategy: Strategy,

    /// Number of threads (4 = default, 0 = auto-detect)
    #[arg(short, long, default_value_t = 4)]
    threads: usize,

    /// Channel buffer size for the pipeline strategy
    #[arg(long, default_value_t = 10000)]
    channel_buffer: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,

    /// Write a header row (CSV only)
    #[arg(long)]
    header: bool,

    /// Run configuration (default: config/etymology.yaml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Language table CSV (iso2,iso3,name), overrides the config file
    #[arg(long)]
    languages: Option<PathBuf>,

    /// Part-of-speech vocabulary, one label per line, overrides the config file
    #[arg(long)]
    pos: Option<PathBuf>,

    /// Citation tag for the last column, overrides the config file
    #[arg(long)]
    citation: Option<String>,

    /// Limit number of rows to write (for testing)
    #[arg(long)]
    limit: Option<usize>,

    /// Limit number of pages to scan (for testing with raw dumps)
    #[arg(long)]
    page_limit: Option<usize>,

    /// Quiet mode - minimal output
    #[arg(short, long)]
    quiet: bool,

    /// More log output (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn open_input(path: &Path) -> Result<Box<dyn Read + Send>> {
    let file = File::open(path)?;
    let reader: Box<dyn Read + Send> = if path.to_string_lossy().ends_with(".bz2") {
        Box::new(BufReader::with_capacity(256 * 1024, BzDecoder::new(file)))
    } else {
        Box::new(BufReader::with_capacity(256 * 1024, file))
    };
    Ok(reader)
}

fn spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

fn print_stats(stats: &Stats, strategy_name: &str) {
    println!();
    println!("============================================================");
    println!("Strategy: {}", strategy_name);
    println!("Pages read: {}", stats.pages_read);
    println!("Language sections interpreted: {}", stats.sections_interpreted);
    println!("Sections with rows: {}", stats.sections_with_rows);
    println!("Rows written: {}", stats.rows_written);
    println!("Avg rows/section: {:.2}", stats.rows_written as f64 / stats.sections_with_rows.max(1) as f64);
    println!("Unresolved source codes: {}", stats.unresolved_codes);
    println!("------------------------------------------------------------");
    println!("Skipped pages: {}", stats.pages_skipped());
    println!("  other namespace: {}", stats.skipped_namespace);
    println!("  redirects: {}", stats.skipped_redirect);
    println!("  meta titles: {}", stats.skipped_meta);
    println!("  malformed: {}", stats.skipped_malformed);
    println!("Time: {}m {}s", stats.elapsed.as_secs() / 60, stats.elapsed.as_secs() % 60);
    println!(
        "Rate: {:.0} pages/sec",
        stats.pages_read as f64 / stats.elapsed.as_secs_f64().max(f64::EPSILON)
    );
    println!("============================================================");
}

fn run(args: &Args) -> Result<()> {
    let mut config = Config::discover(args.config.as_deref())?;
    if let Some(path) = &args.languages {
        config.language_table = path.clone();
    }
    if let Some(path) = &args.pos {
        config.parts_of_speech = path.clone();
    }
    if let Some(citation) = &args.citation {
        config.citation = citation.clone();
    }

    // Tables are loaded before any page is read; a missing table is fatal
    let tables = Arc::new(config.load_tables()?);
    let filter = config.page_filter();

    let mut parallel = ParallelConfig::default();
    if args.threads > 0 {
        parallel.num_workers = args.threads.saturating_sub(1).max(1);
    }
    parallel.channel_buffer = args.channel_buffer;

    let limits = Limits {
        rows: args.limit,
        pages: args.page_limit,
    };

    if !args.quiet {
        println!("Parsing: {}", args.input.display());
        println!("Output: {} ({:?})", args.output.display(), args.format);
        println!("Strategy: {:?}", args.strategy);
        if args.strategy != Strategy::Sequential {
            println!("Workers: {}", parallel.num_workers);
        }
        if let Some(limit) = args.limit {
            println!("Limit: {} rows", limit);
        }
        if let Some(limit) = args.page_limit {
            println!("Page limit: {}", limit);
        }
        println!();
    }
    log::info!("Using {:?} strategy", args.strategy);

    let reader = open_input(&args.input)?;
    let output = File::create(&args.output)?;
    let mut writer = RowWriter::new(output, args.format, config.citation.clone(), args.header)?;
    let progress = spinner(args.quiet);

    let stats = match args.strategy {
        Strategy::Sequential => run_sequential(reader, &mut writer, &tables, &filter, limits, &progress)?,
        Strategy::Pipeline => {
            process_channel_pipeline(reader, &mut writer, Arc::clone(&tables), filter, &parallel, limits, &progress)?
        }
    };
    progress.finish_and_clear();

    log::info!(
        "Wrote {} rows from {} pages in {:.1}s",
        stats.rows_written,
        stats.pages_read,
        stats.elapsed.as_secs_f64()
    );
    if !args.quiet {
        print_stats(&stats, &format!("{:?}", args.strategy));
    }
    Ok(())
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    // Validate: --limit requires sequential mode for efficient early termination
    if args.limit.is_some() && args.strategy != Strategy::Sequential {
        eprintln!(
            "Error: --limit requires --strategy sequential for efficient early termination.\n\
             The pipeline processes pages out of order and reorders results,\n\
             so it cannot stop promptly when the limit is reached."
        );
        std::process::exit(1);
    }

    if let Err(e) = run(&args) {
        if e.is_table_error() {
            eprintln!("Error loading lookup tables: {}", e);
        } else {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
}
