/// Implementation of `chunktree inspect`.
///
/// # Example output
///
/// ```text
/// root: 3f1c...e0a2
/// span: 528384 bytes
/// height: 3
/// chunks: 131 (533592 bytes encoded)
/// depth 0: 1 reference, 0 data
/// depth 1: 1 reference, 1 data
/// depth 2: 0 reference, 128 data
/// ```
use std::path::Path;

use anyhow::{Context, Result};
use chunktree_joiner::inspect;
use chunktree_types::Cancellation;

use crate::InspectArgs;
use crate::file_store::FileChunkStore;

/// Run the `chunktree inspect` command.
///
/// # Errors
///
/// Returns an error if any chunk under the root is missing or
/// inconsistent.
pub fn run(store_dir: &Path, args: &InspectArgs, cancel: &Cancellation) -> Result<()> {
    let store = FileChunkStore::open(store_dir)
        .with_context(|| format!("cannot open store {}", store_dir.display()))?;
    let summary = inspect(&store, args.address, cancel)
        .with_context(|| format!("failed to inspect {}", args.address))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("root: {}", summary.root);
        println!("{summary}");
    }
    Ok(())
}
