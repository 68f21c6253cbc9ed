//! The world accessor seam.
//!
//! The automaton owns no block storage. Every block and metadata read or
//! write goes through a [`WorldAccessor`], and every operation may suspend.

use std::{future::Future, io};

use redwire_utils::{BlockId, BlockPos, ChunkPos};
use thiserror::Error;

mod memory;

pub use memory::{MemoryChunk, MemoryWorld};

/// Errors a world accessor can report.
#[derive(Debug, Error)]
pub enum WorldError {
    /// The chunk holding the requested data is not loaded.
    #[error("chunk {0} is not loaded")]
    ChunkNotLoaded(ChunkPos),
    /// The storage backing a position did not answer.
    #[error("storage unavailable at {0}")]
    Unavailable(BlockPos),
    /// An underlying I/O failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Read-only view over the blocks of one chunk column.
///
/// Used by scan-based discovery to find candidate coordinates.
pub trait ChunkView {
    /// The position of the chunk.
    fn pos(&self) -> ChunkPos;

    /// Calls `f` for every non-air block in the chunk.
    fn for_each_block(&self, f: &mut dyn FnMut(BlockPos, BlockId));
}

/// Asynchronous access to block storage.
///
/// All operations must be awaited before logic depending on them proceeds.
pub trait WorldAccessor: Send + Sync + 'static {
    /// The chunk handle returned by [`WorldAccessor::request_chunk`].
    type Chunk: ChunkView + Send;

    /// Reads the block id at `pos`.
    fn get_block(&self, pos: BlockPos) -> impl Future<Output = Result<BlockId, WorldError>> + Send;

    /// Replaces the block at `pos`.
    fn set_block(
        &self,
        pos: BlockPos,
        block: BlockId,
    ) -> impl Future<Output = Result<(), WorldError>> + Send;

    /// Reads the metadata nibble at `pos`.
    fn get_metadata(&self, pos: BlockPos) -> impl Future<Output = Result<u8, WorldError>> + Send;

    /// Writes the metadata nibble at `pos`.
    fn set_metadata(
        &self,
        pos: BlockPos,
        metadata: u8,
    ) -> impl Future<Output = Result<(), WorldError>> + Send;

    /// Fetches the chunk column at `pos`.
    fn request_chunk(
        &self,
        pos: ChunkPos,
    ) -> impl Future<Output = Result<Self::Chunk, WorldError>> + Send;

    /// Pushes the chunk's current state to observers.
    fn flush_chunk(&self, chunk: Self::Chunk)
    -> impl Future<Output = Result<(), WorldError>> + Send;
}
