//! In-memory world storage.
//!
//! This module provides a sparse, RAM-only [`WorldAccessor`]. Useful for:
//! - Tests that need to inspect every write the automaton makes
//! - The headless demo host
//! - Small scratch worlds that never touch disk

use std::{
    mem,
    sync::atomic::{AtomicUsize, Ordering},
};

use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use redwire_utils::{BlockId, BlockPos, ChunkPos};

use super::{ChunkView, WorldAccessor, WorldError};

/// A snapshot of one chunk column of a [`MemoryWorld`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryChunk {
    pos: ChunkPos,
    /// Non-air blocks in the column, sorted by position.
    blocks: Vec<(BlockPos, BlockId, u8)>,
}

impl MemoryChunk {
    /// Returns the non-air blocks of the column, sorted by position.
    #[must_use]
    pub fn blocks(&self) -> &[(BlockPos, BlockId, u8)] {
        &self.blocks
    }
}

impl ChunkView for MemoryChunk {
    fn pos(&self) -> ChunkPos {
        self.pos
    }

    fn for_each_block(&self, f: &mut dyn FnMut(BlockPos, BlockId)) {
        for &(pos, block, _) in &self.blocks {
            f(pos, block);
        }
    }
}

/// Sparse in-memory world.
///
/// Unset positions read as air with metadata `0`. Replacing a block clears
/// its metadata, the same way placing a block does in a real world.
#[derive(Default)]
pub struct MemoryWorld {
    /// Block id and metadata per position.
    blocks: RwLock<FxHashMap<BlockPos, (BlockId, u8)>>,
    /// Positions whose every access fails, for exercising storage errors.
    failing: RwLock<FxHashSet<BlockPos>>,
    /// Chunks handed to `flush_chunk`, in call order.
    flushed: Mutex<Vec<ChunkPos>>,
    block_writes: AtomicUsize,
    metadata_writes: AtomicUsize,
}

impl MemoryWorld {
    /// Creates an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Places a block with the given metadata without counting it as a write.
    pub fn place(&self, pos: BlockPos, block: BlockId, metadata: u8) {
        let mut blocks = self.blocks.write();
        if block == BlockId::AIR {
            blocks.remove(&pos);
        } else {
            blocks.insert(pos, (block, metadata & 0xF));
        }
    }

    /// Removes the block at `pos`, leaving air.
    pub fn clear(&self, pos: BlockPos) {
        self.blocks.write().remove(&pos);
    }

    /// Reads the block at `pos` synchronously.
    #[must_use]
    pub fn block_at(&self, pos: BlockPos) -> BlockId {
        self.blocks
            .read()
            .get(&pos)
            .map_or(BlockId::AIR, |&(block, _)| block)
    }

    /// Reads the metadata at `pos` synchronously.
    #[must_use]
    pub fn metadata_at(&self, pos: BlockPos) -> u8 {
        self.blocks.read().get(&pos).map_or(0, |&(_, meta)| meta)
    }

    /// Makes every access to `pos` fail until [`MemoryWorld::heal`] is called.
    pub fn fail_at(&self, pos: BlockPos) {
        self.failing.write().insert(pos);
    }

    /// Undoes [`MemoryWorld::fail_at`].
    pub fn heal(&self, pos: BlockPos) {
        self.failing.write().remove(&pos);
    }

    /// Number of `set_block` calls that succeeded.
    #[must_use]
    pub fn block_writes(&self) -> usize {
        self.block_writes.load(Ordering::Relaxed)
    }

    /// Number of `set_metadata` calls that succeeded.
    #[must_use]
    pub fn metadata_writes(&self) -> usize {
        self.metadata_writes.load(Ordering::Relaxed)
    }

    /// Total number of successful writes of either kind.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.block_writes() + self.metadata_writes()
    }

    /// Drains the log of flushed chunks.
    pub fn take_flushed(&self) -> Vec<ChunkPos> {
        mem::take(&mut *self.flushed.lock())
    }

    fn check(&self, pos: BlockPos) -> Result<(), WorldError> {
        if self.failing.read().contains(&pos) {
            Err(WorldError::Unavailable(pos))
        } else {
            Ok(())
        }
    }
}

impl WorldAccessor for MemoryWorld {
    type Chunk = MemoryChunk;

    async fn get_block(&self, pos: BlockPos) -> Result<BlockId, WorldError> {
        self.check(pos)?;
        Ok(self.block_at(pos))
    }

    async fn set_block(&self, pos: BlockPos, block: BlockId) -> Result<(), WorldError> {
        self.check(pos)?;
        self.place(pos, block, 0);
        self.block_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn get_metadata(&self, pos: BlockPos) -> Result<u8, WorldError> {
        self.check(pos)?;
        Ok(self.metadata_at(pos))
    }

    async fn set_metadata(&self, pos: BlockPos, metadata: u8) -> Result<(), WorldError> {
        self.check(pos)?;
        if let Some(entry) = self.blocks.write().get_mut(&pos) {
            entry.1 = metadata & 0xF;
        }
        self.metadata_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn request_chunk(&self, pos: ChunkPos) -> Result<MemoryChunk, WorldError> {
        let mut blocks: Vec<_> = self
            .blocks
            .read()
            .iter()
            .filter(|(block_pos, _)| pos.contains(**block_pos))
            .map(|(&block_pos, &(block, meta))| (block_pos, block, meta))
            .collect();
        blocks.sort_unstable_by_key(|&(block_pos, _, _)| block_pos);

        Ok(MemoryChunk { pos, blocks })
    }

    async fn flush_chunk(&self, chunk: MemoryChunk) -> Result<(), WorldError> {
        log::trace!("Flushing chunk {} ({} blocks)", chunk.pos, chunk.blocks.len());
        self.flushed.lock().push(chunk.pos);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests are allowed to panic
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unset_reads_as_air() {
        let world = MemoryWorld::new();
        let pos = BlockPos::new(4, 5, 6);

        assert_eq!(world.get_block(pos).await.unwrap(), BlockId::AIR);
        assert_eq!(world.get_metadata(pos).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_block_clears_metadata() {
        let world = MemoryWorld::new();
        let pos = BlockPos::new(0, 0, 0);
        world.place(pos, BlockId(76), 3);

        world.set_block(pos, BlockId(75)).await.unwrap();

        assert_eq!(world.block_at(pos), BlockId(75));
        assert_eq!(world.metadata_at(pos), 0);
        assert_eq!(world.block_writes(), 1);
    }

    #[tokio::test]
    async fn test_failing_position() {
        let world = MemoryWorld::new();
        let pos = BlockPos::new(1, 1, 1);
        world.fail_at(pos);

        assert!(matches!(
            world.get_block(pos).await,
            Err(WorldError::Unavailable(p)) if p == pos
        ));
        assert!(world.set_metadata(pos, 3).await.is_err());
        assert_eq!(world.writes(), 0);

        world.heal(pos);
        assert!(world.get_block(pos).await.is_ok());
    }

    #[tokio::test]
    async fn test_request_chunk_only_holds_its_column() {
        let world = MemoryWorld::new();
        world.place(BlockPos::new(1, 0, 1), BlockId(55), 0);
        world.place(BlockPos::new(17, 0, 1), BlockId(55), 0);
        world.place(BlockPos::new(-1, 0, 1), BlockId(55), 0);

        let chunk = world.request_chunk(ChunkPos::new(0, 0)).await.unwrap();

        assert_eq!(chunk.blocks(), &[(BlockPos::new(1, 0, 1), BlockId(55), 0)]);
    }

    #[tokio::test]
    async fn test_flush_is_logged() {
        let world = MemoryWorld::new();
        let chunk = world.request_chunk(ChunkPos::new(2, -3)).await.unwrap();

        world.flush_chunk(chunk).await.unwrap();

        assert_eq!(world.take_flushed(), vec![ChunkPos::new(2, -3)]);
        assert!(world.take_flushed().is_empty());
    }
}
