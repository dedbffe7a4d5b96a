// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, info, warn};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use chapsplit::app_config::{self, Config};
use chapsplit::app_controller::{Controller, SourceOverrides, render_plan};
use chapsplit::encoding::CancellationToken;

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

fn level_filter(level: &app_config::LogLevel) -> LevelFilter {
    match level {
        app_config::LogLevel::Error => LevelFilter::Error,
        app_config::LogLevel::Warn => LevelFilter::Warn,
        app_config::LogLevel::Info => LevelFilter::Info,
        app_config::LogLevel::Debug => LevelFilter::Debug,
        app_config::LogLevel::Trace => LevelFilter::Trace,
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Cut every source into one file per chapter (default command)
    #[command(alias = "split")]
    Run(RunArgs),

    /// Print the segment plan and time estimate without encoding
    Plan(PlanArgs),

    /// Generate shell completions for chapsplit
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Local media files or video URLs
    #[arg(value_name = "SOURCE", required = true)]
    sources: Vec<String>,

    #[command(flatten)]
    options: CommonArgs,
}

#[derive(Args, Debug)]
struct PlanArgs {
    /// Local media file or video URL
    #[arg(value_name = "SOURCE")]
    source: String,

    #[command(flatten)]
    options: CommonArgs,
}

#[derive(Args, Debug, Clone, Default)]
struct CommonArgs {
    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config: String,

    /// Number of segments encoded at the same time (1-8)
    #[arg(short = 'j', long, value_name = "N")]
    max_parallel: Option<usize>,

    /// Allowed difference between expected and encoded durations, in seconds
    #[arg(long, value_name = "SECONDS")]
    tolerance: Option<f64>,

    /// x264 constant rate factor (0-51)
    #[arg(long)]
    crf: Option<u8>,

    /// x264 preset for the first attempt
    #[arg(long)]
    preset: Option<String>,

    /// Encode on the GPU (NVENC), falling back to CPU if configured
    #[arg(long, overrides_with = "no_gpu")]
    gpu: bool,

    /// Encode on the CPU only
    #[arg(long)]
    no_gpu: bool,

    /// Subtitle file to slice (SRT or WebVTT)
    #[arg(long, value_name = "FILE")]
    subs: Option<PathBuf>,

    /// Shift applied to every subtitle cue, in seconds (may be negative)
    #[arg(long, value_name = "SECONDS", allow_hyphen_values = true)]
    sub_offset: Option<f64>,

    /// Chapter list file (`<timecode> <title>` per line) for local sources
    #[arg(long, value_name = "FILE")]
    chapters: Option<PathBuf>,

    /// Re-encode segments even when a valid output already exists
    #[arg(long)]
    no_skip_existing: bool,

    /// Plan and report without encoding
    #[arg(long)]
    dry_run: bool,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// chapsplit - cut chaptered videos into one file per chapter
///
/// Reads the chapters of a local video or a yt-dlp supported URL, re-encodes
/// every chapter into its own file and slices the subtitles to match.
#[derive(Parser, Debug)]
#[command(name = "chapsplit")]
#[command(version)]
#[command(about = "Split chaptered videos into one file per chapter")]
#[command(args_conflicts_with_subcommands = true)]
#[command(long_about = "chapsplit cuts a chaptered video into one frame-accurate file per chapter.

EXAMPLES:
    chapsplit https://youtu.be/VIDEO_ID            # Download and split using default config
    chapsplit talk.mp4 --chapters chapters.txt     # Split a local file with a chapter list
    chapsplit talk.mp4 --subs talk.vtt -j 4        # Slice subtitles, four parallel encodes
    chapsplit plan talk.mp4                        # Show the plan without encoding
    chapsplit completions bash > chapsplit.bash    # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config. If the config file doesn't exist, a default one
    will be created automatically. Command line options override the file.

EXIT STATUS:
    0 when every segment was produced or skipped, 1 otherwise.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Local media files or video URLs
    #[arg(value_name = "SOURCE")]
    sources: Vec<String>,

    #[command(flatten)]
    options: CommonArgs,
}

// @struct: Custom logger implementation, filtered by the global max level
struct CustomLogger;

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI colour and emoji for a level
    fn decoration(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("1;31", "❌ "),
            Level::Warn => ("1;33", "🚧 "),
            Level::Info => ("1;32", " "),
            Level::Debug => ("1;36", "🔍 "),
            Level::Trace => ("1;35", "📋 "),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let now = chrono::Local::now().format("%H:%M:%S.%3f");
        let (colour, emoji) = Self::decoration(record.level());
        let _ = writeln!(std::io::stderr(), "\x1B[{}m{} {} {}\x1B[0m", colour, now, emoji, record.args());
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "chapsplit", &mut std::io::stdout());
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Plan(args)) => run_plan(args).await,
        Some(Commands::Run(args)) => run_split(args).await,
        None => {
            if cli.sources.is_empty() {
                return Err(anyhow!("SOURCE is required when no subcommand is specified"));
            }
            run_split(RunArgs {
                sources: cli.sources,
                options: cli.options,
            })
            .await
        }
    }
}

// Load the config file, then let command line options win
fn load_config(options: &CommonArgs) -> Result<Config> {
    if let Some(level) = &options.log_level {
        log::set_max_level(level_filter(&level.clone().into()));
    }

    let (mut config, created) = Config::load_or_create(&options.config)?;
    if created {
        warn!("Config file not found at '{}', created a default one.", options.config);
    }

    if let Some(out) = &options.out {
        config.out_dir = out.clone();
    }
    if let Some(workers) = options.max_parallel {
        config.parallel.max_workers = workers;
    }
    if let Some(tolerance) = options.tolerance {
        config.validation.tolerance_s = tolerance;
    }
    if let Some(crf) = options.crf {
        config.encode.crf = crf;
    }
    if let Some(preset) = &options.preset {
        config.encode.preset = preset.clone();
    }
    if options.gpu {
        config.gpu.enabled = true;
    }
    if options.no_gpu {
        config.gpu.enabled = false;
    }
    if let Some(offset) = options.sub_offset {
        config.subtitles.offset_s = offset;
    }
    if options.subs.is_some() {
        config.subtitles.enabled = true;
    }
    if options.no_skip_existing {
        config.skip_existing = false;
    }
    if options.dry_run {
        config.dry_run = true;
    }
    if let Some(level) = &options.log_level {
        config.log_level = level.clone().into();
    }

    config.validate().context("Configuration validation failed")?;

    if options.log_level.is_none() {
        log::set_max_level(level_filter(&config.log_level));
    }
    Ok(config)
}

fn overrides(options: &CommonArgs) -> SourceOverrides {
    SourceOverrides {
        chapters_file: options.chapters.clone(),
        subtitle_file: options.subs.clone(),
    }
}

async fn run_plan(args: PlanArgs) -> Result<ExitCode> {
    let mut config = load_config(&args.options)?;
    config.dry_run = true;
    let controller = Controller::with_config(config, overrides(&args.options))?;

    let preview = controller
        .preview(&args.source)
        .await
        .with_context(|| format!("Failed to plan {}", args.source))?;
    print!("{}", render_plan(&preview));
    Ok(ExitCode::SUCCESS)
}

async fn run_split(args: RunArgs) -> Result<ExitCode> {
    let config = load_config(&args.options)?;
    let controller = Controller::with_config(config, overrides(&args.options))?;

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current encodes are aborted");
            signal_token.cancel();
        }
    });

    let mut fatal_count = 0;
    let mut failed_sources = 0;
    for source in &args.sources {
        if cancel.is_cancelled() {
            break;
        }
        match controller.run(source, &cancel).await {
            Ok(outcome) => {
                if outcome.has_failures() {
                    failed_sources += 1;
                }
                for manifest in &outcome.manifests {
                    info!("Manifest: {}", manifest.display());
                }
            }
            Err(e) => {
                error!("{}: {}", source, e);
                fatal_count += 1;
            }
        }
    }

    if args.sources.len() > 1 {
        info!(
            "Processed {} source(s): {} fatal error(s), {} with failed segments",
            args.sources.len(),
            fatal_count,
            failed_sources
        );
    }

    if fatal_count > 0 || failed_sources > 0 || cancel.is_cancelled() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
