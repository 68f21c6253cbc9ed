//! Collects chunks touched by a pass and flushes each one once.

use redwire_utils::{BlockId, BlockPos, ChunkPos};
use rustc_hash::FxHashSet;

use crate::world::{WorldAccessor, WorldError};

/// Routes a pass's world writes and remembers which chunks they touched.
#[derive(Debug, Default)]
pub struct FlushCoordinator {
    touched: FxHashSet<ChunkPos>,
    block_writes: usize,
    metadata_writes: usize,
}

impl FlushCoordinator {
    /// Creates a coordinator with nothing touched.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a block and marks its chunk as touched.
    pub async fn set_block<W: WorldAccessor>(
        &mut self,
        world: &W,
        pos: BlockPos,
        block: BlockId,
    ) -> Result<(), WorldError> {
        world.set_block(pos, block).await?;
        self.block_writes += 1;
        self.touched.insert(pos.chunk_pos());
        Ok(())
    }

    /// Writes metadata and marks its chunk as touched.
    pub async fn set_metadata<W: WorldAccessor>(
        &mut self,
        world: &W,
        pos: BlockPos,
        metadata: u8,
    ) -> Result<(), WorldError> {
        world.set_metadata(pos, metadata).await?;
        self.metadata_writes += 1;
        self.touched.insert(pos.chunk_pos());
        Ok(())
    }

    /// Chunks touched so far, sorted.
    #[must_use]
    pub fn touched(&self) -> Vec<ChunkPos> {
        let mut chunks: Vec<_> = self.touched.iter().copied().collect();
        chunks.sort_unstable();
        chunks
    }

    /// Number of block writes routed through this coordinator.
    #[must_use]
    pub const fn block_writes(&self) -> usize {
        self.block_writes
    }

    /// Number of metadata writes routed through this coordinator.
    #[must_use]
    pub const fn metadata_writes(&self) -> usize {
        self.metadata_writes
    }

    /// Requests and flushes every touched chunk, then forgets them.
    ///
    /// Every chunk is attempted even if an earlier one fails; the first
    /// error is returned. Returns the number of chunks flushed.
    pub async fn flush<W: WorldAccessor>(&mut self, world: &W) -> Result<usize, WorldError> {
        let mut flushed = 0;
        let mut first_error = None;

        for chunk_pos in self.touched() {
            let result = async {
                let chunk = world.request_chunk(chunk_pos).await?;
                world.flush_chunk(chunk).await
            }
            .await;

            match result {
                Ok(()) => flushed += 1,
                Err(err) => {
                    log::warn!("Failed to flush chunk {chunk_pos}: {err}");
                    first_error.get_or_insert(err);
                }
            }
        }
        self.touched.clear();

        match first_error {
            Some(err) => Err(err),
            None => Ok(flushed),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests are allowed to panic
mod tests {
    use super::*;
    use crate::world::MemoryWorld;

    #[tokio::test]
    async fn test_same_chunk_flushed_once() {
        let world = MemoryWorld::new();
        let mut flush = FlushCoordinator::new();
        for x in 0..4 {
            let pos = BlockPos::new(x, 0, 0);
            world.place(pos, BlockId(55), 0);
            flush.set_metadata(&world, pos, 3).await.unwrap();
        }
        flush
            .set_block(&world, BlockPos::new(20, 0, 0), BlockId(1))
            .await
            .unwrap();

        assert_eq!(flush.flush(&world).await.unwrap(), 2);
        assert_eq!(
            world.take_flushed(),
            vec![ChunkPos::new(0, 0), ChunkPos::new(1, 0)]
        );
        assert_eq!(flush.metadata_writes(), 4);
        assert_eq!(flush.block_writes(), 1);
    }

    #[tokio::test]
    async fn test_failed_write_touches_nothing() {
        let world = MemoryWorld::new();
        let pos = BlockPos::new(0, 0, 0);
        world.fail_at(pos);
        let mut flush = FlushCoordinator::new();

        assert!(flush.set_metadata(&world, pos, 1).await.is_err());
        assert!(flush.touched().is_empty());
        assert_eq!(flush.flush(&world).await.unwrap(), 0);
    }
}
