//! Torch orientation and the per-tick torch record.

use redwire_utils::{BlockPos, Direction};
use smallvec::SmallVec;

/// Which face of its base block a torch is attached to.
///
/// The discriminant is the orientation value stored in the torch's metadata.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TorchFacing {
    /// Mounted on the block at `x - 1`.
    South = 0x1,
    /// Mounted on the block at `x + 1`.
    North = 0x2,
    /// Mounted on the block at `z - 1`.
    West = 0x3,
    /// Mounted on the block at `z + 1`.
    East = 0x4,
    /// Standing on the block below.
    Up = 0x5,
}

impl TorchFacing {
    /// Orientations in the order metadata is matched against them.
    pub const PRIORITY: [TorchFacing; 5] = [
        TorchFacing::South,
        TorchFacing::North,
        TorchFacing::West,
        TorchFacing::East,
        TorchFacing::Up,
    ];

    /// Decodes a torch's metadata. The first orientation in [`Self::PRIORITY`]
    /// whose flag matches wins; `None` if none does.
    #[must_use]
    pub fn from_metadata(meta: u8) -> Option<Self> {
        Self::PRIORITY.into_iter().find(|facing| {
            let flag = *facing as u8;
            meta & (meta | flag) == flag
        })
    }

    /// Direction from the torch to the block it is attached to.
    #[must_use]
    pub const fn base_direction(self) -> Direction {
        match self {
            Self::South => Direction::West,
            Self::North => Direction::East,
            Self::West => Direction::North,
            Self::East => Direction::South,
            Self::Up => Direction::Down,
        }
    }
}

/// A torch found by the classifier: the torch, the block it is mounted on
/// and how it is mounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TorchRecord {
    /// The block the torch is attached to.
    pub base: BlockPos,
    /// The torch itself.
    pub torch: BlockPos,
    /// The orientation decoded from the torch's metadata.
    pub facing: TorchFacing,
}

impl TorchRecord {
    /// Builds the record for a torch at `torch` with the given orientation.
    #[must_use]
    pub const fn new(torch: BlockPos, facing: TorchFacing) -> Self {
        Self {
            base: facing.base_direction().relative(torch),
            torch,
            facing,
        }
    }

    /// The lateral neighbours a torch powers: every horizontal neighbour
    /// except its base. Three for wall torches, four for standing ones.
    #[must_use]
    pub fn lateral_outputs(&self) -> SmallVec<[BlockPos; 4]> {
        let base_direction = self.facing.base_direction();
        Direction::LATERAL
            .into_iter()
            .filter(|&direction| direction != base_direction)
            .map(|direction| direction.relative(self.torch))
            .collect()
    }

    /// Whether the block below the torch is a candidate output. Standing
    /// torches sit on that block, so it is their base instead.
    #[must_use]
    pub fn powers_below(&self) -> bool {
        self.facing != TorchFacing::Up
    }
}
