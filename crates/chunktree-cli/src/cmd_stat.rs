/// Implementation of `chunktree stat`: prints the content length recorded
/// in the root chunk. Only the root is fetched.
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chunktree_joiner::Joiner;
use chunktree_types::Cancellation;

use crate::StatArgs;
use crate::file_store::FileChunkStore;

/// Run the `chunktree stat` command.
///
/// # Errors
///
/// Returns an error if the root chunk is missing or malformed.
pub fn run(store_dir: &Path, args: &StatArgs, cancel: Cancellation) -> Result<()> {
    let store = FileChunkStore::open(store_dir)
        .with_context(|| format!("cannot open store {}", store_dir.display()))?;
    let (_, len) = Joiner::open(Arc::new(store), args.address, cancel)
        .with_context(|| format!("cannot open {}", args.address))?;
    println!("{len}");
    Ok(())
}
