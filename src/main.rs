//! CLI entrypoint for `cracklab`.
//!
//! Loads configuration from the environment and env files, opens the SQLite
//! store, and dispatches to one subcommand: wordlist ingestion, hash export,
//! potfile reconciliation, crack-time estimation or the metrics summary.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use cracklab::{
    algorithm::Algorithm,
    config::{Config, ConfigError, DEFAULT_ENV_FILES},
    estimate::{EstimateError, EstimatorSettings, run_estimator},
    export::export_hashes,
    hashing::Argon2Settings,
    ingest::{IngestOptions, ingest_wordlist},
    io::{DEFAULT_MMAP_THRESHOLD_BYTES, InputError, OutputError},
    model::{NewCrackRun, now_timestamp},
    pot::apply_potfile,
    report::{render_estimate, render_summary},
    stats::{DEFAULT_HISTOGRAM_BINS, Summary, summarize},
    store::{CrackTimePolicy, Store},
};
use log::{LevelFilter, error, info};

#[derive(Parser, Debug)]
#[command(
    name = "cracklab",
    version,
    about = "Password hashing lab: ingest, export and hashcat reconciliation"
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// SQLite database path (overrides DB_PATH)
    #[arg(long = "db", global = true)]
    db: Option<PathBuf>,

    /// Env file(s) to read, later files override earlier ones
    #[arg(long = "env-file", global = true)]
    env_files: Vec<PathBuf>,

    /// Override mmap threshold in bytes. If zero, disable mmap.
    #[arg(long = "mmap-threshold", global = true, default_value_t = DEFAULT_MMAP_THRESHOLD_BYTES)]
    mmap_threshold: u64,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Control color output (auto, always, never)
    #[arg(long = "color", value_enum, default_value_t = ColorChoice::Auto, global = true)]
    color: ColorChoice,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Hash a wordlist into the database
    Ingest(IngestArgs),
    /// Write uncracked hashes in hashcat input format
    Export(ExportArgs),
    /// Record a hashcat run and apply its potfile
    ApplyPot(ApplyPotArgs),
    /// Estimate per-hash crack times from a hashcat status log
    Estimate(EstimateArgs),
    /// Print hashing and cracking metrics
    Summary(SummaryArgs),
}

#[derive(ClapArgs, Debug)]
struct IngestArgs {
    #[arg(short = 'a', long = "algorithm", value_enum)]
    algorithm: Algorithm,

    /// Wordlist path (defaults to ROCKYOU_PATH)
    #[arg(short = 'f', long = "file")]
    file: Option<PathBuf>,

    #[arg(long = "batch-size")]
    batch_size: Option<usize>,

    #[arg(long = "start-line")]
    start_line: Option<u64>,

    #[arg(long = "max-lines")]
    max_lines: Option<u64>,

    /// Argon2id memory cost in KiB
    #[arg(long = "memory-cost", default_value_t = 65536)]
    memory_cost: u32,

    /// Argon2id iterations
    #[arg(long = "time-cost", default_value_t = 4)]
    time_cost: u32,

    /// Argon2id lanes
    #[arg(long = "threads", default_value_t = 1)]
    threads: u32,
}

#[derive(ClapArgs, Debug)]
struct ExportArgs {
    #[arg(short = 'a', long = "algorithm", value_enum)]
    algorithm: Algorithm,

    #[arg(short = 'o', long = "out")]
    out: PathBuf,

    #[arg(long = "limit")]
    limit: Option<u64>,
}

#[derive(ClapArgs, Debug)]
struct ApplyPotArgs {
    #[arg(short = 'a', long = "algorithm", value_enum)]
    algorithm: Algorithm,

    /// Path to the hashcat potfile
    #[arg(short = 'p', long = "pot")]
    pot: PathBuf,

    /// Unique label for this hashcat run
    #[arg(long = "run-name")]
    run_name: String,

    #[arg(long = "wordlist", default_value = "rockyou.txt")]
    wordlist: String,

    /// Hash file given to hashcat (defaults to hashcat/hashes_<algorithm>.txt)
    #[arg(long = "hashes")]
    hashes: Option<String>,

    /// Path to the hashcat status log for this run
    #[arg(long = "status")]
    status: Option<String>,

    /// Run duration in seconds
    #[arg(long = "duration")]
    duration: Option<f64>,

    /// hashcat -m value (defaults per algorithm)
    #[arg(long = "mode")]
    mode: Option<i64>,
}

#[derive(ClapArgs, Debug)]
struct EstimateArgs {
    #[arg(short = 'a', long = "algorithm", value_enum, default_value_t = Algorithm::Argon2id)]
    algorithm: Algorithm,

    /// hashcat --status-json log
    #[arg(short = 'l', long = "log", default_value = "hashcat/argon2id_run.log")]
    log: PathBuf,

    /// Whole-run duration assumed when the log is unusable
    #[arg(long = "fallback-duration", default_value_t = 7200.0, value_parser = positive_f64)]
    fallback_duration: f64,

    /// Guesses per second assumed when the log spans no time
    #[arg(long = "assumed-speed", default_value_t = 29.0, value_parser = positive_f64)]
    assumed_speed: f64,

    /// Replace crack times already recorded from a potfile duration
    #[arg(long = "overwrite")]
    overwrite: bool,
}

#[derive(ClapArgs, Debug)]
struct SummaryArgs {
    #[arg(short = 'a', long = "algorithm", value_enum)]
    algorithm: Option<Algorithm>,

    /// Write the summary as JSON to this path
    #[arg(long = "json")]
    json: Option<PathBuf>,

    /// Summarize every algorithm, writing summary_<algorithm>.json into --out-dir
    #[arg(long = "all", requires = "out_dir", conflicts_with_all = ["algorithm", "json"])]
    all: bool,

    #[arg(long = "out-dir", requires = "all")]
    out_dir: Option<PathBuf>,

    /// Histogram bins for latency and crack-time distributions
    #[arg(long = "bins", default_value_t = DEFAULT_HISTOGRAM_BINS)]
    bins: usize,
}

/// No wordlist given on the command line or through ROCKYOU_PATH.
#[derive(Debug, thiserror::Error)]
#[error("wordlist not found. Provide via --file or ROCKYOU_PATH.")]
struct NoWordlist;

fn positive_f64(raw: &str) -> std::result::Result<f64, String> {
    let v: f64 = raw.parse().map_err(|e| format!("{e}"))?;
    if v.is_finite() && v > 0.0 {
        Ok(v)
    } else {
        Err(format!("must be a positive number, got {raw}"))
    }
}

fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init();
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = if args.env_files.is_empty() {
        Config::load(&DEFAULT_ENV_FILES)?
    } else {
        Config::load(&args.env_files)?
    };
    if let Some(db) = &args.db {
        config.database = db.clone();
    }
    Ok(config)
}

fn open_store(config: &Config) -> Result<Store> {
    Store::open(&config.database)
        .with_context(|| format!("open database {}", config.database.display()))
}

fn run_ingest(config: &Config, mmap_threshold: u64, a: &IngestArgs) -> Result<()> {
    let file = a
        .file
        .clone()
        .or_else(|| config.wordlist.clone())
        .ok_or(NoWordlist)?;
    let opts = IngestOptions {
        source: file,
        algorithm: a.algorithm,
        batch_size: a.batch_size.unwrap_or(config.batch_size),
        start_line: a.start_line.unwrap_or(config.start_line),
        max_lines: a.max_lines,
        argon2: Argon2Settings {
            memory_kib: a.memory_cost,
            iterations: a.time_cost,
            lanes: a.threads,
        },
        mmap_threshold,
    };
    let mut store = open_store(config)?;
    let report = ingest_wordlist(&mut store, &opts)?;
    println!(
        "Completed {} ingestion. Processed {} lines in {} batches.",
        a.algorithm, report.rows_written, report.batches
    );
    Ok(())
}

fn run_export(config: &Config, a: &ExportArgs) -> Result<()> {
    let store = open_store(config)?;
    let n = export_hashes(&store, a.algorithm, a.limit, &a.out)?;
    println!("Wrote {} {} hashes to {}", n, a.algorithm, a.out.display());
    Ok(())
}

fn run_apply_pot(config: &Config, mmap_threshold: u64, a: &ApplyPotArgs) -> Result<()> {
    let store = open_store(config)?;
    let now = now_timestamp();
    let options = serde_json::json!({ "potfile": a.pot.display().to_string() });
    let run_id = store
        .insert_crack_run(&NewCrackRun {
            run_name: a.run_name.clone(),
            hash_mode: a.mode.unwrap_or_else(|| a.algorithm.hashcat_mode()),
            wordlist: Some(a.wordlist.clone()),
            hash_file: Some(
                a.hashes
                    .clone()
                    .unwrap_or_else(|| format!("hashcat/hashes_{}.txt", a.algorithm)),
            ),
            options_json: Some(options.to_string()),
            status_json_path: a.status.clone(),
            started_at: Some(now.clone()),
            completed_at: Some(now),
            duration_s: a.duration,
            hashes_total: None,
            hashes_cracked: None,
        })
        .with_context(|| format!("record crack run {}", a.run_name))?;
    info!("recorded crack run {} (id {})", a.run_name, run_id);

    let updated = apply_potfile(
        &store,
        &a.pot,
        a.algorithm,
        run_id,
        a.duration,
        mmap_threshold,
    )?;
    println!(
        "Applied {} potfile {}. Updated {} rows (run id {}).",
        a.algorithm,
        a.pot.display(),
        updated,
        run_id
    );
    Ok(())
}

fn run_estimate(config: &Config, mmap_threshold: u64, a: &EstimateArgs) -> Result<()> {
    let store = open_store(config)?;
    let settings = EstimatorSettings {
        fallback_duration_s: a.fallback_duration,
        assumed_speed_hps: a.assumed_speed,
        ..EstimatorSettings::default()
    };
    let policy = if a.overwrite {
        CrackTimePolicy::Overwrite
    } else {
        CrackTimePolicy::FillMissing
    };
    let report = run_estimator(&store, a.algorithm, &a.log, &settings, policy, mmap_threshold)?;
    print!("{}", render_estimate(&report));
    Ok(())
}

fn write_json(path: &Path, summary: &Summary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(path, json).map_err(|e| OutputError::new(path, e))?;
    Ok(())
}

fn run_summary(config: &Config, a: &SummaryArgs) -> Result<()> {
    let store = open_store(config)?;
    if a.all {
        let dir = a.out_dir.as_deref().context("--all needs --out-dir")?;
        fs::create_dir_all(dir).map_err(|e| OutputError::new(dir, e))?;
        for algorithm in Algorithm::ALL {
            let summary = summarize(&store, Some(algorithm), a.bins)?;
            println!("{}", render_summary(&summary));
            let path = dir.join(format!("summary_{}.json", algorithm));
            write_json(&path, &summary)?;
            println!("Wrote {}", path.display());
        }
        return Ok(());
    }
    let summary = summarize(&store, a.algorithm, a.bins)?;
    println!("{}", render_summary(&summary));
    if let Some(path) = &a.json {
        write_json(path, &summary)?;
    }
    Ok(())
}

/// 1 missing wordlist, 2 config, 4 nothing to estimate, 5 output write,
/// 3 for everything else (input and storage).
fn exit_code(command: &Command, err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(EstimateError::NothingCracked(_)) = cause.downcast_ref::<EstimateError>() {
            return 4;
        }
        if cause.is::<NoWordlist>() {
            return 1;
        }
        if let (Command::Ingest(_), Some(InputError::NotFound(_))) =
            (command, cause.downcast_ref::<InputError>())
        {
            return 1;
        }
        if cause.is::<OutputError>() {
            return 5;
        }
        if cause.is::<ConfigError>() {
            return 2;
        }
    }
    3
}

fn main() {
    let args = Args::parse();
    init_logger(args.verbose);
    // Configure color policy
    match args.color {
        ColorChoice::Always => {
            colored::control::set_override(true);
        }
        ColorChoice::Never => {
            colored::control::set_override(false);
        }
        ColorChoice::Auto => {}
    }

    let config = match load_config(&args) {
        Ok(c) => c,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(2);
        }
    };

    let threshold = if args.mmap_threshold == 0 {
        u64::MAX
    } else {
        args.mmap_threshold
    };

    let result = match &args.command {
        Command::Ingest(a) => run_ingest(&config, threshold, a),
        Command::Export(a) => run_export(&config, a),
        Command::ApplyPot(a) => run_apply_pot(&config, threshold, a),
        Command::Estimate(a) => run_estimate(&config, threshold, a),
        Command::Summary(a) => run_summary(&config, a),
    };
    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(exit_code(&args.command, &e));
    }
}
