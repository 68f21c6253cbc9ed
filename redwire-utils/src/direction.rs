//! Neighbour directions in the block grid.

use crate::BlockPos;

/// One of the six faces of a block. North is `-z`, east is `+x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// `-y`
    Down,
    /// `+y`
    Up,
    /// `-z`
    North,
    /// `+z`
    South,
    /// `-x`
    West,
    /// `+x`
    East,
}

impl Direction {
    /// Every face, bottom and top first.
    pub const ALL: [Direction; 6] = [
        Direction::Down,
        Direction::Up,
        Direction::North,
        Direction::South,
        Direction::West,
        Direction::East,
    ];

    /// The horizontal faces, the ones wires connect along.
    pub const LATERAL: [Direction; 4] = [
        Direction::East,
        Direction::West,
        Direction::South,
        Direction::North,
    ];

    /// The neighbour of `pos` across this face.
    #[must_use]
    pub const fn relative(self, pos: BlockPos) -> BlockPos {
        match self {
            Self::Down => pos.below(),
            Self::Up => pos.above(),
            Self::North => pos.offset(0, 0, -1),
            Self::South => pos.offset(0, 0, 1),
            Self::West => pos.offset(-1, 0, 0),
            Self::East => pos.offset(1, 0, 0),
        }
    }
}
