#![warn(clippy::pedantic)]

pub mod address;
pub mod chunk;
pub mod error;

pub use address::{ADDRESS_SIZE, Address};
pub use chunk::{BRANCHES, CHUNK_SIZE, Chunk, MAX_ENCODED_SIZE, SPAN_SIZE, level_capacity, level_for_span};
pub use error::WireError;
