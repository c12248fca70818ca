/// Implementation of `chunktree split`.
///
/// Streams the input through a [`ChunkTreeBuilder`] backed by the file
/// store and prints the root address.
///
/// # Example output
///
/// ```text
/// $ chunktree split notes.txt
/// 3f1c...e0a2
///
/// $ chunktree split notes.txt --json
/// {"root":"3f1c...e0a2","bytes":528384,"chunks":131,"durability":"persist"}
/// ```
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, ensure};
use chunktree_builder::{BuilderConfig, ChunkTreeBuilder};
use chunktree_types::Cancellation;
use chunktree_wire::Address;
use serde::Serialize;
use tracing::{debug, info};

use crate::SplitArgs;
use crate::file_store::FileChunkStore;

#[derive(Serialize)]
struct SplitReport {
    root: Address,
    bytes: u64,
    chunks: u64,
    durability: &'static str,
}

/// Run the `chunktree split` command.
///
/// # Errors
///
/// Returns an error if the input cannot be read, the store cannot be
/// written, or the split is cancelled.
pub fn run(store_dir: &Path, args: &SplitArgs, cancel: Cancellation) -> Result<()> {
    ensure!(args.buffer > 0, "--buffer must be at least 1 byte");

    let store = FileChunkStore::open(store_dir)
        .with_context(|| format!("cannot open store {}", store_dir.display()))?;
    debug!(store = %store.root().display(), "opened chunk store");
    let config = if args.transient {
        BuilderConfig::transient()
    } else {
        BuilderConfig::persist()
    };
    let mut builder = ChunkTreeBuilder::new(Arc::new(store), config, cancel)?;

    let path = args.input.as_deref().filter(|p| *p != Path::new("-"));
    let (mut input, label): (Box<dyn Read>, String) = match path {
        None => (Box::new(io::stdin().lock()), "<stdin>".to_string()),
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("cannot read {}", path.display()))?;
            (Box::new(file), path.display().to_string())
        }
    };

    let mut buf = vec![0u8; args.buffer];
    loop {
        let n = match input.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).with_context(|| format!("cannot read {label}")),
        };
        builder
            .write(&buf[..n])
            .with_context(|| format!("failed to split {label}"))?;
    }
    let root = builder
        .sum()
        .with_context(|| format!("failed to split {label}"))?;

    info!(%root, bytes = builder.bytes_written(), chunks = builder.chunks_stored(), input = %label, "split complete");

    if args.json {
        let report = SplitReport {
            root,
            bytes: builder.bytes_written(),
            chunks: builder.chunks_stored(),
            durability: config.durability.as_str(),
        };
        println!("{}", serde_json::to_string(&report)?);
    } else {
        println!("{root}");
    }
    Ok(())
}
