use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Report, WrapErr};
use slog::{debug, o, Drain, Level, Logger};
use stixtree::{decode_with, encode, parse_pattern_with, Config, DEFAULT_MAX_DEPTH};

/// Normalize STIX2 patterns into canonical pattern trees
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// deepest nesting accepted in patterns and canonical documents
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// log debug output to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a pattern and print its canonical text
    Parse { pattern: String },
    /// Print the object types a pattern references
    Objects { pattern: String },
    /// Decode a canonical file
    Check { file: PathBuf },
    /// Rewrite a canonical file in canonical form
    Fmt {
        file: PathBuf,
        /// exit non-zero instead of rewriting when the file is not canonical
        #[arg(long)]
        check: bool,
    },
}

fn main() -> miette::Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::Debug
    } else {
        Level::Warning
    };
    let plain = slog_term::PlainSyncDecorator::new(std::io::stderr());
    let logger = Logger::root(
        slog_term::FullFormat::new(plain)
            .build()
            .filter_level(level)
            .fuse(),
        o!(),
    );

    let config = Config::with_max_depth(cli.max_depth);
    run(&logger, cli.command, &config)
}

fn run(logger: &Logger, command: Command, config: &Config) -> miette::Result<ExitCode> {
    match command {
        Command::Parse { pattern } => {
            let tree = parse_pattern_with(logger, &pattern, config).map_err(Report::new)?;
            print!("{}", encode(&tree).map_err(Report::new)?);
        }
        Command::Objects { pattern } => {
            let tree = parse_pattern_with(logger, &pattern, config).map_err(Report::new)?;
            for object in tree.object_types() {
                println!("{}", object);
            }
        }
        Command::Check { file } => {
            let text = std::fs::read_to_string(&file)
                .into_diagnostic()
                .wrap_err_with(|| format!("reading {}", file.display()))?;
            let tree = decode_with(logger, &text, config)
                .map_err(|e| Report::new(e).wrap_err(format!("{} is invalid", file.display())))?;
            println!(
                "{}: ok ({} comparisons)",
                file.display(),
                tree.comparisons().len()
            );
        }
        Command::Fmt { file, check } => {
            let text = std::fs::read_to_string(&file)
                .into_diagnostic()
                .wrap_err_with(|| format!("reading {}", file.display()))?;
            let tree = decode_with(logger, &text, config)
                .map_err(|e| Report::new(e).wrap_err(format!("{} is invalid", file.display())))?;
            let canonical = encode(&tree).map_err(Report::new)?;

            if canonical == text {
                debug!(logger, "already canonical"; "file" => %file.display());
            } else if check {
                eprintln!("{} is not in canonical form", file.display());
                return Ok(ExitCode::FAILURE);
            } else {
                std::fs::write(&file, canonical)
                    .into_diagnostic()
                    .wrap_err_with(|| format!("writing {}", file.display()))?;
                debug!(logger, "rewrote file"; "file" => %file.display());
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
