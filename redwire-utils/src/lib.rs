//! # Redwire Utils
//!
//! Value types shared by every redwire crate: block and chunk positions,
//! block ids, small vectors and directions.

pub mod direction;
pub mod math;
pub mod types;

pub use direction::Direction;
pub use types::{BlockId, BlockPos, ChunkPos};
