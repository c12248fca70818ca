/// Implementation of `chunktree join`.
///
/// Streams the content under a root address to stdout or a file without
/// holding more than one chunk per tree level in memory.
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chunktree_joiner::Joiner;
use chunktree_types::Cancellation;
use tracing::info;

use crate::JoinArgs;
use crate::file_store::FileChunkStore;

/// Run the `chunktree join` command.
///
/// # Errors
///
/// Returns an error if a chunk is missing or inconsistent, the output
/// cannot be written, or the join is cancelled.
pub fn run(store_dir: &Path, args: &JoinArgs, cancel: Cancellation) -> Result<()> {
    let store = FileChunkStore::open(store_dir)
        .with_context(|| format!("cannot open store {}", store_dir.display()))?;
    let (mut joiner, len) = Joiner::open(Arc::new(store), args.address, cancel)
        .with_context(|| format!("cannot open {}", args.address))?;

    let copied = match &args.output {
        Some(path) => {
            let file =
                File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
            let mut out = BufWriter::new(file);
            let copied = io::copy(&mut joiner, &mut out)
                .with_context(|| format!("failed to join {}", args.address))?;
            out.flush()
                .with_context(|| format!("cannot write {}", path.display()))?;
            copied
        }
        None => {
            let mut out = BufWriter::new(io::stdout().lock());
            let copied = io::copy(&mut joiner, &mut out)
                .with_context(|| format!("failed to join {}", args.address))?;
            out.flush().context("cannot write stdout")?;
            copied
        }
    };

    info!(root = %args.address, bytes = copied, len, "join complete");
    Ok(())
}
