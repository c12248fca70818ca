#![warn(clippy::pedantic)]

pub mod cancel;
pub mod chunk_store;
pub mod error;

pub use cancel::{CancelHandle, Cancellation};
pub use chunk_store::{ChunkStore, Durability};
pub use error::StoreError;
