//! Per-tick classification of tracked coordinates into circuit elements.

use redwire_utils::BlockPos;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::world::{WorldAccessor, WorldError};

use super::blocks;
use super::torch::{TorchFacing, TorchRecord};

/// Circuit topology derived from the tracked set in one tick.
///
/// Rebuilt from scratch every tick, nothing carries over.
#[derive(Debug, Default)]
pub struct Topology {
    /// Torch records keyed by torch position.
    torches: FxHashMap<BlockPos, TorchRecord>,
    /// Torch positions keyed by the base they are mounted on.
    bases: FxHashMap<BlockPos, SmallVec<[BlockPos; 2]>>,
    /// Positions currently holding wire.
    wires: FxHashSet<BlockPos>,
    /// Tracked positions that no longer hold a circuit block.
    destroyed: Vec<BlockPos>,
}

impl Topology {
    /// Registers a torch.
    pub fn add_torch(&mut self, record: TorchRecord) {
        self.bases.entry(record.base).or_default().push(record.torch);
        self.torches.insert(record.torch, record);
    }

    /// Registers a wire.
    pub fn add_wire(&mut self, pos: BlockPos) {
        self.wires.insert(pos);
    }

    /// The torch record at `pos`, if a torch was classified there.
    #[must_use]
    pub fn torch(&self, pos: BlockPos) -> Option<&TorchRecord> {
        self.torches.get(&pos)
    }

    /// Torch records, sorted by torch position.
    #[must_use]
    pub fn torches(&self) -> Vec<TorchRecord> {
        let mut torches: Vec<_> = self.torches.values().copied().collect();
        torches.sort_unstable_by_key(|record| record.torch);
        torches
    }

    /// Torches mounted on `pos`, empty if `pos` is no torch base.
    #[must_use]
    pub fn torches_on(&self, pos: BlockPos) -> &[BlockPos] {
        self.bases.get(&pos).map_or(&[], |torches| torches.as_slice())
    }

    /// Whether some tracked torch is mounted on `pos`.
    #[must_use]
    pub fn is_torch_base(&self, pos: BlockPos) -> bool {
        self.bases.contains_key(&pos)
    }

    /// Whether `pos` holds a registered wire.
    #[must_use]
    pub fn is_wire(&self, pos: BlockPos) -> bool {
        self.wires.contains(&pos)
    }

    /// Registered wires, sorted by position.
    #[must_use]
    pub fn wires(&self) -> Vec<BlockPos> {
        let mut wires: Vec<_> = self.wires.iter().copied().collect();
        wires.sort_unstable();
        wires
    }

    /// Tracked positions found without a circuit block.
    #[must_use]
    pub fn destroyed(&self) -> &[BlockPos] {
        &self.destroyed
    }

    /// Number of torch records.
    #[must_use]
    pub fn torch_count(&self) -> usize {
        self.torches.len()
    }

    /// Number of wire records.
    #[must_use]
    pub fn wire_count(&self) -> usize {
        self.wires.len()
    }
}

/// Classifies every tracked position against the current world state.
///
/// `tracked` must be a snapshot; the live tracked set may change while this
/// suspends on world reads. A torch with unrecognised orientation metadata
/// is left out of the topology for this tick and stays tracked.
pub async fn classify<W: WorldAccessor>(
    world: &W,
    tracked: &[BlockPos],
) -> Result<Topology, WorldError> {
    let mut topology = Topology::default();

    for &pos in tracked {
        let block = world.get_block(pos).await?;

        if blocks::is_torch(block) {
            let meta = world.get_metadata(pos).await?;
            match TorchFacing::from_metadata(meta) {
                Some(facing) => topology.add_torch(TorchRecord::new(pos, facing)),
                None => log::warn!("Torch at {pos} has unknown orientation {meta:#x}, skipping"),
            }
        } else if blocks::is_wire(block) {
            topology.add_wire(pos);
        } else if !blocks::is_circuit_block(block) {
            topology.destroyed.push(pos);
        }
    }

    Ok(topology)
}
