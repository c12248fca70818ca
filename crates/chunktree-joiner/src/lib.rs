#![warn(clippy::pedantic)]

pub mod error;
pub mod inspect;
pub mod joiner;

mod resolve;

pub use error::JoinError;
pub use inspect::{DepthSummary, TreeSummary, inspect};
pub use joiner::{Joiner, join_to_vec};
