//! # coderun-cli
//!
//! Command-line front-end for the coderun evaluation engine.
//!
//! Evaluates a file, a `-c` snippet, or chunks read interactively from
//! stdin, and prints the `repr` of each surfaced value.

mod errors;

use anyhow::{Context, Result};
use clap::Parser;
use coderun::{CodeRunner, Config, Mode, Namespace, ReturnMode};
use colored::*;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{Level, debug};

use errors::enhance_error;

#[derive(Parser)]
#[command(name = "coderun")]
#[command(about = "Evaluate code and report the value of the last expression", long_about = None)]
#[command(version)]
struct Cli {
    /// Source file to evaluate
    #[arg(value_name = "FILE", conflicts_with = "code")]
    file: Option<PathBuf>,

    /// Evaluate CODE instead of a file
    #[arg(short = 'c', value_name = "CODE")]
    code: Option<String>,

    /// Grammar mode: exec, eval or single
    #[arg(long, default_value = "exec")]
    mode: Mode,

    /// Result policy: last_expr, last_expr_or_assign or none
    #[arg(long, value_name = "RETURN_MODE")]
    return_mode: Option<ReturnMode>,

    /// Keep the value of chunks that end with a semicolon
    #[arg(long)]
    no_quiet: bool,

    /// Log parse/compile/run steps to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .with_writer(io::stderr)
        .init();

    let mut config = Config::load(".").unwrap_or_else(|e| {
        eprintln!("{} Failed to load config: {:#}", "⚠".yellow().bold(), e);
        Config::default()
    });
    if let Some(return_mode) = cli.return_mode {
        config.return_mode = return_mode;
    }
    if cli.no_quiet {
        config.quiet_trailing_semicolon = false;
    }
    debug!(?config, mode = %cli.mode, "configuration");

    let (source, label) = match (&cli.code, &cli.file) {
        (Some(code), _) => (code.clone(), "<string>".to_string()),
        (None, Some(path)) => {
            let source = fs::read_to_string(path)
                .with_context(|| format!("Failed to read source from {}", path.display()))?;
            (source, path.display().to_string())
        }
        (None, None) => return repl(cli.mode, &config),
    };

    let mut namespace = Namespace::new();
    if !evaluate(&source, &label, cli.mode, &config, &mut namespace) {
        std::process::exit(1);
    }
    Ok(())
}

/// Runs one chunk and prints its value. Returns `false` if it failed.
fn evaluate(source: &str, label: &str, mode: Mode, config: &Config, namespace: &mut Namespace) -> bool {
    let mut runner = CodeRunner::new(source).with_mode(mode).with_config(config);
    match runner.run(namespace) {
        Ok(Some(value)) => {
            println!("{}", value.repr());
            true
        }
        Ok(None) => true,
        Err(e) => {
            enhance_error(e, Some(label.to_string()), Some(source.to_string())).display();
            false
        }
    }
}

/// Reads chunks from stdin until end of input. A line ending with `:` opens
/// a block that runs until the next blank line.
fn repl(mode: Mode, config: &Config) -> Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut namespace = Namespace::new();
    let mut chunk_no = 0usize;

    loop {
        prompt(">>> ")?;
        let Some(first) = lines.next().transpose()? else {
            println!();
            return Ok(());
        };
        if first.trim().is_empty() {
            continue;
        }

        let mut chunk = first;
        if chunk.trim_end().ends_with(':') {
            loop {
                prompt("... ")?;
                match lines.next().transpose()? {
                    Some(line) if !line.trim().is_empty() => {
                        chunk.push('\n');
                        chunk.push_str(&line);
                    }
                    _ => break,
                }
            }
            chunk.push('\n');
        }

        chunk_no += 1;
        evaluate(&chunk, &format!("<stdin:{}>", chunk_no), mode, config, &mut namespace);
    }
}

fn prompt(text: &str) -> Result<()> {
    print!("{}", text.dimmed());
    io::stdout().flush().context("Failed to flush stdout")
}
