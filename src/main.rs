//! ShelfKV shell.
//!
//! Opens a store and reads commands from stdin, one per line, printing each
//! reply the way `redis-cli` does. Works interactively and with piped input.

use anyhow::Context;
use shelfkv::commands::CommandHandler;
use shelfkv::protocol::{tokenize, Reply};
use shelfkv::{Store, StoreConfig};
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Shell configuration
struct Config {
    store: StoreConfig,
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut store = StoreConfig::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--path" | "-d" => {
                    store.path = PathBuf::from(value_of(&args, i, "--path"));
                    i += 2;
                }
                "--db" | "-n" => {
                    store.db = parse_value(&args, i, "--db");
                    i += 2;
                }
                "--spread" | "-s" => {
                    store.spread_factor = parse_value(&args, i, "--spread");
                    i += 2;
                }
                "--pool-size" | "-p" => {
                    store.pool_size = parse_value(&args, i, "--pool-size");
                    i += 2;
                }
                "--decode" => {
                    store.decode_responses = true;
                    i += 1;
                }
                "--benchmark" => {
                    store.benchmark = true;
                    i += 1;
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("ShelfKV version {}", shelfkv::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        Self { store }
    }
}

fn value_of<'a>(args: &'a [String], i: usize, flag: &str) -> &'a str {
    match args.get(i + 1) {
        Some(value) => value,
        None => {
            eprintln!("Error: {} requires a value", flag);
            std::process::exit(1);
        }
    }
}

fn parse_value<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> T {
    value_of(args, i, flag).parse().unwrap_or_else(|_| {
        eprintln!("Error: invalid value for {}", flag);
        std::process::exit(1);
    })
}

fn print_help() {
    println!(
        r#"
ShelfKV - An on-disk data-structure store

USAGE:
    shelfkv [OPTIONS]

OPTIONS:
    -d, --path <DIR>         Database root (default: shelfkv-data)
    -n, --db <N>             Database index (default: 0)
    -s, --spread <N>         Hex digits of SHA-1 used as shard id (default: 2)
    -p, --pool-size <N>      Pooled handles per shard (default: 16)
        --decode             Treat stored values as UTF-8 text
        --benchmark          Record per-command latency, printed on exit
    -v, --version            Print version information
    -h, --help               Print this help message

Logging goes to stderr and is controlled by RUST_LOG (default: warn).

EXAMPLE:
    $ shelfkv --path /tmp/shelf
    shelfkv> SET name "Ariz"
    OK
    shelfkv> RPUSH queue a b c
    (integer) 3
    shelfkv> LRANGE queue 0 -1
    1) "a"
    2) "b"
    3) "c"
"#
    );
}

fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::from_args();

    // Set up logging
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let store = Store::open(config.store.clone()).with_context(|| {
        format!(
            "failed to open store at {}",
            config.store.db_path().display()
        )
    })?;
    let handler = CommandHandler::new(Arc::new(store));
    info!(path = %handler.store().db_path().display(), "shell ready");

    run_shell(&handler)?;

    if let Some(stats) = handler.store().stats() {
        let mut stats: Vec<_> = stats.into_iter().collect();
        stats.sort_by_key(|(name, _)| *name);
        for (name, op) in stats {
            info!(command = name, calls = op.calls, average = ?op.average, "latency");
            eprintln!("{:<8} {:>8} calls  avg {:?}", name, op.calls, op.average);
        }
    }
    Ok(())
}

/// Reads, executes and prints commands until EOF or `quit`.
fn run_shell(handler: &CommandHandler) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let interactive = stdin.is_terminal();
    let mut stdout = io::stdout().lock();

    let mut lines = stdin.lock().lines();
    loop {
        if interactive {
            write!(stdout, "shelfkv> ")?;
            stdout.flush()?;
        }
        let Some(line) = lines.next() else {
            break;
        };
        let line = line.context("failed to read from stdin")?;

        let args = match tokenize(&line) {
            Ok(args) => args,
            Err(e) => {
                warn!(error = %e, "rejected input line");
                writeln!(stdout, "{}", Reply::error(format!("ERR {}", e)))?;
                continue;
            }
        };
        let Some(name) = args.first() else {
            continue;
        };

        if name.eq_ignore_ascii_case(b"quit") || name.eq_ignore_ascii_case(b"exit") {
            break;
        }
        if name.eq_ignore_ascii_case(b"help") {
            writeln!(stdout, "{}", handler.command_names().join(" "))?;
            continue;
        }

        writeln!(stdout, "{}", handler.execute(&args))?;
    }
    Ok(())
}
