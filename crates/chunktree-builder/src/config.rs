use chunktree_types::Durability;

/// Construction parameters for a [`ChunkTreeBuilder`](crate::ChunkTreeBuilder).
///
/// ```text
/// ┌────────────┬───────────────────────────────────────────────────┐
/// │ Field      │ Purpose                                           │
/// ├────────────┼───────────────────────────────────────────────────┤
/// │ durability │ passed unchanged to every ChunkStore::put         │
/// │ encrypt    │ reserved slot; `true` is rejected at construction │
/// └────────────┴───────────────────────────────────────────────────┘
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuilderConfig {
    pub durability: Durability,
    pub encrypt: bool,
}

impl BuilderConfig {
    /// Persist every chunk, no encryption.
    #[must_use]
    pub fn persist() -> Self {
        Self::default()
    }

    /// Store chunks in transient mode.
    #[must_use]
    pub fn transient() -> Self {
        Self {
            durability: Durability::Transient,
            encrypt: false,
        }
    }
}
