//! Block ids the redstone automaton cares about.

use phf::phf_map;
use redwire_utils::BlockId;

/// Plain air.
pub const AIR: BlockId = BlockId::AIR;
/// Plain stone, the usual torch base.
pub const STONE: BlockId = BlockId(1);
/// Redstone wire; its metadata is the power level.
pub const REDSTONE_WIRE: BlockId = BlockId(55);
/// A redstone torch that is not emitting power.
pub const REDSTONE_TORCH_OFF: BlockId = BlockId(75);
/// A redstone torch that is emitting power.
pub const REDSTONE_TORCH: BlockId = BlockId(76);
/// An unpowered repeater.
pub const REDSTONE_REPEATER_OFF: BlockId = BlockId(93);
/// A powered repeater.
pub const REDSTONE_REPEATER_ON: BlockId = BlockId(94);
/// Stone button.
pub const STONE_BUTTON: BlockId = BlockId(77);
/// Stone pressure plate.
pub const STONE_PLATE: BlockId = BlockId(70);
/// Wooden pressure plate.
pub const WOODEN_PLATE: BlockId = BlockId(72);
/// Lever.
pub const LEVER: BlockId = BlockId(69);
/// Iron door.
pub const IRON_DOOR: BlockId = BlockId(71);
/// Wooden door.
pub const WOODEN_DOOR: BlockId = BlockId(64);

/// Every block type that takes part in redstone logic.
pub const CIRCUIT_BLOCKS: [BlockId; 11] = [
    REDSTONE_WIRE,
    REDSTONE_TORCH,
    REDSTONE_TORCH_OFF,
    REDSTONE_REPEATER_ON,
    REDSTONE_REPEATER_OFF,
    STONE_BUTTON,
    STONE_PLATE,
    WOODEN_PLATE,
    LEVER,
    IRON_DOOR,
    WOODEN_DOOR,
];

/// Block ids by their dashed name.
pub static BLOCKS_BY_NAME: phf::Map<&'static str, BlockId> = phf_map! {
    "air" => AIR,
    "stone" => STONE,
    "redstone-wire" => REDSTONE_WIRE,
    "redstone-torch" => REDSTONE_TORCH,
    "redstone-torch-off" => REDSTONE_TORCH_OFF,
    "redstone-repeater-on" => REDSTONE_REPEATER_ON,
    "redstone-repeater-off" => REDSTONE_REPEATER_OFF,
    "stone-button" => STONE_BUTTON,
    "stone-plate" => STONE_PLATE,
    "wooden-plate" => WOODEN_PLATE,
    "lever" => LEVER,
    "iron-door" => IRON_DOOR,
    "wooden-door" => WOODEN_DOOR,
};

/// Looks a block id up by its dashed name.
#[must_use]
pub fn by_name(name: &str) -> Option<BlockId> {
    BLOCKS_BY_NAME.get(name).copied()
}

/// Returns the dashed name of a known block id.
#[must_use]
pub fn name_of(block: BlockId) -> Option<&'static str> {
    BLOCKS_BY_NAME
        .entries()
        .find(|(_, id)| **id == block)
        .map(|(name, _)| *name)
}

/// Either torch variant.
#[must_use]
pub fn is_torch(block: BlockId) -> bool {
    block == REDSTONE_TORCH || block == REDSTONE_TORCH_OFF
}

/// Redstone wire.
#[must_use]
pub fn is_wire(block: BlockId) -> bool {
    block == REDSTONE_WIRE
}

/// Any block in [`CIRCUIT_BLOCKS`].
#[must_use]
pub fn is_circuit_block(block: BlockId) -> bool {
    CIRCUIT_BLOCKS.contains(&block)
}

/// The torch block encoding the given signal state.
#[must_use]
pub const fn torch_for(on: bool) -> BlockId {
    if on { REDSTONE_TORCH } else { REDSTONE_TORCH_OFF }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for block in CIRCUIT_BLOCKS {
            let name = name_of(block).unwrap_or_else(|| panic!("{block:?} has no name"));
            assert_eq!(by_name(name), Some(block));
        }
        assert_eq!(by_name("diamond-block"), None);
    }

    #[test]
    fn test_predicates() {
        assert!(is_torch(REDSTONE_TORCH_OFF));
        assert!(!is_torch(REDSTONE_WIRE));
        assert!(is_wire(REDSTONE_WIRE));
        assert!(is_circuit_block(LEVER));
        assert!(!is_circuit_block(STONE));
        assert_eq!(torch_for(true), REDSTONE_TORCH);
        assert_eq!(torch_for(false), REDSTONE_TORCH_OFF);
    }
}
