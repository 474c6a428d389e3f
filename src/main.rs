//! treehash - fingerprint every file in a directory tree.
//!
//! Usage:
//!   treehash --root DIR                      Hash DIR into ./treehash.txt
//!   treehash --root DIR --filter '^target$'  Skip entries named "target"
//!   treehash --root DIR --output out.txt     Append records to out.txt
//!   treehash help                            Show help
//!
//! Each output line is `path,sha1-hex,size`. Lines are unordered.

use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;

use clap::{ArgAction, CommandFactory, Parser, ValueEnum};
use color_eyre::eyre::{Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use treehash_core::{
    DEFAULT_BUFFER_SIZE, DEFAULT_RESULT_CAPACITY, ExitKind, FilterSyntax, HashConfig,
    RunSummary, TreeHashError,
};
use treehash_pipeline::Pipeline;

#[derive(Parser)]
#[command(
    name = "treehash",
    version,
    about = "Fingerprint every file in a directory tree",
    long_about = "treehash computes the SHA-1 digest and size of every regular file under \
                  a root directory and appends one `path,digest,size` line per file to \
                  an output log. Lines appear in completion order, not traversal order.",
    disable_help_subcommand = true
)]
struct Cli {
    /// Root directory to hash
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Skip files and directories whose name matches this pattern (regex)
    #[arg(short, long)]
    filter: Option<String>,

    /// Treat --filter as a shell glob instead of a regex
    #[arg(long)]
    glob: bool,

    /// Output file (defaults to treehash.txt)
    #[arg(short, long)]
    output: Option<String>,

    /// Append one line per file that could not be read to this file
    #[arg(long)]
    error_log: Option<PathBuf>,

    /// Number of hash workers (0 = 4 per CPU)
    #[arg(short = 'j', long, default_value = "0")]
    workers: usize,

    /// Number of concurrent directory walkers (0 = 1 per CPU)
    #[arg(long, default_value = "0")]
    dir_walkers: usize,

    /// Files buffered between walkers and workers (default: 4 per worker)
    #[arg(long)]
    queue_depth: Option<usize>,

    /// Records buffered between workers and the writer
    #[arg(long, default_value_t = DEFAULT_RESULT_CAPACITY)]
    result_depth: usize,

    /// Read buffer size per worker, in bytes
    #[arg(long, default_value_t = DEFAULT_BUFFER_SIZE)]
    buffer_size: usize,

    /// Follow symbolic links
    #[arg(long)]
    follow_symlinks: bool,

    /// Exit with an error when the tree contains no files
    #[arg(long)]
    fail_on_empty: bool,

    /// Truncate the output file instead of appending
    #[arg(long)]
    truncate: bool,

    /// Print progress to stderr while hashing
    #[arg(long)]
    progress: bool,

    /// Summary format
    #[arg(long, default_value = "text")]
    format: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Pass `help` to print usage and exit
    #[arg(value_parser = ["help"], hide = true)]
    command: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            err.print()?;
            // --help and --version are not errors.
            return Ok(if err.use_stderr() {
                exit_code(ExitKind::Usage)
            } else {
                ExitCode::SUCCESS
            });
        }
    };

    if cli.command.is_some() {
        Cli::command().print_long_help()?;
        return Ok(ExitCode::SUCCESS);
    }

    init_logging(cli.verbose);

    let format = cli.format;
    let show_progress = cli.progress;
    let config = match build_config(cli) {
        Ok(config) => config,
        Err(err) => return Ok(report_failure(&err)),
    };

    let mut pipeline = Pipeline::new(config);
    let progress = show_progress
        .then(|| spawn_progress_printer(&pipeline))
        .transpose()?;

    let result = pipeline.run();

    if let Some(progress) = progress {
        if progress.join().is_err() {
            warn!("Progress printer panicked");
        }
    }

    match result {
        Ok(summary) => {
            print_summary(&summary, format)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => Ok(report_failure(&err)),
    }
}

/// Translate CLI flags into a run configuration.
fn build_config(cli: Cli) -> Result<HashConfig, TreeHashError> {
    let filter_syntax = if cli.glob {
        FilterSyntax::Glob
    } else {
        FilterSyntax::Regex
    };

    HashConfig::builder()
        .root(cli.root.unwrap_or_default())
        .filter(cli.filter)
        .filter_syntax(filter_syntax)
        .output(HashConfig::resolve_output(cli.output.as_deref()))
        .error_log(cli.error_log)
        .workers(cli.workers)
        .dir_walkers(cli.dir_walkers)
        .dispatch_capacity(cli.queue_depth)
        .result_capacity(cli.result_depth)
        .buffer_size(cli.buffer_size)
        .follow_symlinks(cli.follow_symlinks)
        .fail_on_empty(cli.fail_on_empty)
        .truncate_output(cli.truncate)
        .build()
        .map_err(|e| TreeHashError::InvalidConfig {
            message: e.to_string(),
        })
}

/// Install the stderr log subscriber. `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Print a short diagnostic and map the error to its exit code.
fn report_failure(err: &TreeHashError) -> ExitCode {
    let kind = err.exit_kind();
    eprintln!("Error: {err}");
    if err.is_startup() {
        eprintln!("Run `treehash help` for usage.");
    }
    exit_code(kind)
}

fn exit_code(kind: ExitKind) -> ExitCode {
    ExitCode::from(u8::try_from(kind.code()).unwrap_or(1))
}

/// Echo progress snapshots to stderr until the run closes the channel.
fn spawn_progress_printer(pipeline: &Pipeline) -> Result<thread::JoinHandle<()>> {
    let mut rx = pipeline.subscribe();
    thread::Builder::new()
        .name("treehash-progress".to_string())
        .spawn(move || {
            loop {
                match rx.blocking_recv() {
                    Ok(progress) => eprintln!(
                        "{} files, {} hashed, {} failed ({:.0} files/s)",
                        progress.records_written,
                        format_size(progress.bytes_hashed),
                        progress.files_failed,
                        progress.records_per_second()
                    ),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        })
        .context("Failed to start progress printer")
}

/// Print the run summary.
fn print_summary(summary: &RunSummary, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            let stats = &summary.stats;
            println!("{}", "─".repeat(60));
            println!(
                " {} -> {}",
                summary.root.display(),
                summary.output.display()
            );
            println!(
                " {} files hashed ({}), {} failed",
                stats.records_written,
                format_size(stats.bytes_hashed),
                stats.files_failed
            );
            println!(
                " {} directories, {} skipped",
                stats.dirs_visited, stats.dirs_skipped
            );
            println!("{}", "─".repeat(60));
            println!("duration: {:.3} s", summary.duration.as_secs_f64());
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(summary)?);
        }
    }

    Ok(())
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
