/// `chunktree` command-line tool: split files into content-addressed chunk
/// trees and join them back, against a directory-backed chunk store.
///
/// # Command overview
///
/// ```text
/// chunktree [OPTIONS] <COMMAND>
///
/// Commands:
///   split      Split a file (or stdin) into chunks and print the root address
///   join       Reassemble the content under a root address
///   inspect    Print the shape of the tree under a root address
///   stat       Print the content length under a root address
///   help       Print help information
///
/// Global options:
///   -v, --verbose      Raise log verbosity (-v debug, -vv trace)
///   --store <DIR>      Chunk store directory [env: CHUNKTREE_STORE]
///   -h, --help         Print help
///   -V, --version      Print version
/// ```
///
/// # Exit codes
///
/// | Code | Meaning                                        |
/// |------|------------------------------------------------|
/// | 0    | Success                                        |
/// | 1    | Error (I/O failure, missing chunk, corruption) |
///
/// Logs and errors go to stderr so stdout can be piped cleanly.
use std::path::PathBuf;
use std::process;
use std::thread;

use chunktree_types::Cancellation;
use chunktree_wire::Address;
use clap::{ArgAction, Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod cmd_inspect;
mod cmd_join;
mod cmd_split;
mod cmd_stat;
mod file_store;

// ── CLI root ──────────────────────────────────────────────────────────────────

/// Content-addressed chunk trees.
#[derive(Parser)]
#[command(name = "chunktree", version, about = "Split and join content-addressed chunk trees")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Raise log verbosity. `RUST_LOG` takes precedence when set.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Directory holding the chunk store.
    #[arg(long, global = true, env = "CHUNKTREE_STORE", default_value = ".chunktree")]
    store: PathBuf,
}

// ── Sub-commands ──────────────────────────────────────────────────────────────

#[derive(Subcommand)]
enum Commands {
    /// Split a file (or stdin) into chunks and print the root address.
    Split(SplitArgs),
    /// Reassemble the content under a root address.
    Join(JoinArgs),
    /// Print the shape of the tree under a root address.
    Inspect(InspectArgs),
    /// Print the content length under a root address.
    Stat(StatArgs),
}

// ── Argument structs ──────────────────────────────────────────────────────────

/// Arguments for `chunktree split`.
///
/// ```text
/// ┌─────────────┬──────────────────────────────────────────────────────┐
/// │ Flag        │ Effect                                               │
/// ├─────────────┼──────────────────────────────────────────────────────┤
/// │ --transient │ store chunks without syncing them to disk            │
/// │ --buffer N  │ bytes read from the input per builder write          │
/// │ --json      │ print root, byte and chunk counts as JSON            │
/// └─────────────┴──────────────────────────────────────────────────────┘
/// ```
#[derive(clap::Args)]
pub struct SplitArgs {
    /// Input file; `-` or absent reads stdin.
    pub input: Option<PathBuf>,

    /// Store chunks in transient mode.
    #[arg(long)]
    pub transient: bool,

    /// Read buffer size in bytes.
    #[arg(long, default_value_t = 64 * 1024)]
    pub buffer: usize,

    /// Print a JSON report instead of the bare address.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `chunktree join`.
#[derive(clap::Args)]
pub struct JoinArgs {
    /// Root address (64 hex characters, optional `0x` prefix).
    pub address: Address,

    /// Write content to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for `chunktree inspect`.
///
/// Visits every chunk under the root, so it doubles as an integrity
/// check of the store.
#[derive(clap::Args)]
pub struct InspectArgs {
    /// Root address.
    pub address: Address,

    /// Print the summary as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `chunktree stat`.
#[derive(clap::Args)]
pub struct StatArgs {
    /// Root address.
    pub address: Address,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let cancel = cancel_on_ctrl_c();

    let result = match &cli.command {
        Commands::Split(args) => cmd_split::run(&cli.store, args, cancel),
        Commands::Join(args) => cmd_join::run(&cli.store, args, cancel),
        Commands::Inspect(args) => cmd_inspect::run(&cli.store, args, &cancel),
        Commands::Stat(args) => cmd_stat::run(&cli.store, args, cancel),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Trip the returned signal on the first Ctrl-C so a long split or join
/// stops at the next chunk boundary instead of being killed mid-write.
fn cancel_on_ctrl_c() -> Cancellation {
    let (handle, cancel) = Cancellation::pair();
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!(error = %e, "cannot listen for Ctrl-C");
                return;
            }
        };
        runtime.block_on(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling");
                handle.cancel();
            }
        });
    });
    cancel
}
