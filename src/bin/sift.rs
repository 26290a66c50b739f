//! Sift CLI - dump or tree-render a directory.

use std::io;
use std::path::PathBuf;

use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use serde::Serialize;
use sift::builder::{print_tree, Dumper};
use sift::errors::{exit_code, SiftError};
use sift::filter::BlacklistConfig;
use sift::sink::{open_append, ConsoleSink, JsonLinesSink, OutputError, WriterSink};
use sift::walker::DumpSummary;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sift")]
#[command(about = "Dump or tree-render a directory through one exclusion pipeline")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Concatenate every kept file into File:/Content: blocks
    Dump {
        /// The root directory to start processing
        root_dir: PathBuf,

        /// Append results to this file instead of printing them
        #[arg(long)]
        output_file: Option<PathBuf>,

        /// Disable recursion
        #[arg(short = 'n', long)]
        non_recursive: bool,

        /// Exact directory paths (absolute or relative to root) to exclude
        #[arg(long, num_args = 0..)]
        exclude_dirs: Vec<PathBuf>,

        /// Exact file paths (absolute or relative to root) to exclude
        #[arg(long, num_args = 0..)]
        exclude_files: Vec<PathBuf>,

        /// Exclude if the path contains or glob-matches the pattern
        #[arg(long, num_args = 0..)]
        exclude_pattern: Vec<String>,

        /// Extra path component names to exclude anywhere
        #[arg(long, num_args = 0..)]
        blacklist_name: Vec<String>,

        /// Extra file suffixes to exclude (e.g. .lock)
        #[arg(long, num_args = 0..)]
        blacklist_ext: Vec<String>,

        /// Drop the built-in name and extension blacklists
        #[arg(long)]
        no_default_blacklist: bool,

        /// Emit one JSON object per file instead of text blocks
        #[arg(long)]
        json: bool,
    },

    /// Draw a directory as a tree
    Tree {
        /// Path to the directory to draw
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Names to exclude (exact match)
        #[arg(long, num_args = 0..)]
        exclude: Vec<String>,

        /// Glob patterns to exclude, matched on names (e.g. *.egg-info)
        #[arg(long, num_args = 0..)]
        exclude_pattern: Vec<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let json_output = matches!(cli.command, Commands::Dump { json: true, .. });

    let result = match cli.command {
        Commands::Dump {
            root_dir,
            output_file,
            non_recursive,
            exclude_dirs,
            exclude_files,
            exclude_pattern,
            blacklist_name,
            blacklist_ext,
            no_default_blacklist,
            json,
        } => {
            let mut blacklist = if no_default_blacklist {
                BlacklistConfig::empty()
            } else {
                BlacklistConfig::default()
            };
            for name in blacklist_name {
                blacklist = blacklist.with_name(name);
            }
            for ext in blacklist_ext {
                blacklist = blacklist.with_extension(ext);
            }

            let dumper = Dumper::new(root_dir)
                .recursive(!non_recursive)
                .exclude_dirs(exclude_dirs)
                .exclude_files(exclude_files)
                .exclude_patterns(exclude_pattern)
                .blacklist(blacklist);

            run_dump(dumper, output_file, json)
        }
        Commands::Tree {
            path,
            exclude,
            exclude_pattern,
        } => run_tree(path, exclude, exclude_pattern),
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "sift", &mut io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        error!("{}", e);
        if json_output {
            #[derive(Serialize)]
            struct ErrorOutput {
                error: String,
            }

            let payload = ErrorOutput {
                error: e.to_string(),
            };

            let json = serde_json::to_string(&payload)
                .unwrap_or_else(|_| "{\"error\":\"serialization failed\"}".to_string());
            eprintln!("{json}");
        } else {
            eprintln!("error: {}", e);
        }
        std::process::exit(exit_code(&e));
    }
}

// --- Dump command ---

fn run_dump(dumper: Dumper, output_file: Option<PathBuf>, json: bool) -> Result<(), SiftError> {
    let summary = match (output_file, json) {
        (Some(path), true) => dumper.run(&mut JsonLinesSink::new(open_append(&path)?)),
        (Some(path), false) => dumper.run(&mut WriterSink::append(&path)?),
        (None, true) => {
            let stdout = io::stdout();
            dumper.run(&mut JsonLinesSink::new(stdout.lock()))
        }
        (None, false) => dumper.run(&mut ConsoleSink),
    }?;

    // Machine-readable runs close with their counts on stderr, after any
    // listing notices.
    if json {
        #[derive(Serialize)]
        struct SummaryOutput {
            summary: DumpSummary,
        }

        let line = serde_json::to_string(&SummaryOutput { summary }).map_err(OutputError::from)?;
        eprintln!("{line}");
    }
    Ok(())
}

// --- Tree command ---

fn run_tree(
    path: PathBuf,
    exclude: Vec<String>,
    exclude_pattern: Vec<String>,
) -> Result<(), SiftError> {
    println!("Directory tree for: {}", path.display());
    if !exclude.is_empty() {
        println!("Excluded names: {}", exclude.join(", "));
    }
    if !exclude_pattern.is_empty() {
        println!("Excluded patterns: {}", exclude_pattern.join(", "));
    }

    print_tree(&path, &exclude, &exclude_pattern)?;
    Ok(())
}
