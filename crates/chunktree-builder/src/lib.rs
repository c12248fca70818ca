#![warn(clippy::pedantic)]

pub mod builder;
pub mod config;
pub mod error;
pub mod level_buffer;

mod memory_store;

pub use builder::ChunkTreeBuilder;
pub use config::BuilderConfig;
pub use error::BuildError;
pub use level_buffer::LevelBuffer;
pub use memory_store::MemoryChunkStore;
