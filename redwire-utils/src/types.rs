// Wrapper types making it harder to accidentaly use the wrong underlying type.

use std::fmt::{self, Display};

use crate::math::{Vector2, Vector3};

/// Number of bits a block coordinate is shifted by to get its chunk coordinate.
pub const CHUNK_SHIFT: u32 = 4;

// A raw block id, as stored in the world next to the block's metadata nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u8);

impl BlockId {
    /// The id every unset position reads as.
    pub const AIR: Self = Self(0);
}

// A chunk position, in chunk-grid units (x, z).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkPos(pub Vector2<i32>);

impl ChunkPos {
    /// Creates a chunk position from chunk-grid coordinates.
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self(Vector2::new(x, z))
    }

    /// The chunk x coordinate.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.0.x
    }

    /// The chunk z coordinate.
    #[must_use]
    pub const fn z(&self) -> i32 {
        self.0.y
    }

    /// Returns true if the block position lies inside this chunk column.
    #[must_use]
    pub const fn contains(&self, pos: BlockPos) -> bool {
        (pos.0.x >> CHUNK_SHIFT) == self.0.x && (pos.0.z >> CHUNK_SHIFT) == self.0.y
    }
}

impl Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x(), self.z())
    }
}

// A block position in world space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockPos(pub Vector3<i32>);

impl BlockPos {
    /// Creates a block position.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self(Vector3::new(x, y, z))
    }

    /// The x coordinate.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.0.x
    }

    /// The y coordinate.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.0.y
    }

    /// The z coordinate.
    #[must_use]
    pub const fn z(&self) -> i32 {
        self.0.z
    }

    /// Returns the position shifted by the given deltas.
    #[must_use]
    pub const fn offset(&self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.0.x + dx, self.0.y + dy, self.0.z + dz)
    }

    /// Returns the position directly above.
    #[must_use]
    pub const fn above(&self) -> Self {
        self.offset(0, 1, 0)
    }

    /// Returns the position directly below.
    #[must_use]
    pub const fn below(&self) -> Self {
        self.offset(0, -1, 0)
    }

    /// Returns the chunk column containing this position.
    ///
    /// Uses an arithmetic shift so negative coordinates round towards
    /// negative infinity, `-1` lands in chunk `-1`, not `0`.
    #[must_use]
    pub const fn chunk_pos(&self) -> ChunkPos {
        ChunkPos::new(self.0.x >> CHUNK_SHIFT, self.0.z >> CHUNK_SHIFT)
    }
}

impl Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x(), self.y(), self.z())
    }
}
