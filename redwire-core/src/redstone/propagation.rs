//! The propagation engine.
//!
//! Computes torch and wire state for one pass by searching outward from
//! lit torches, then writes back only what changed.
//!
//! # Rounds
//!
//! A pass runs the traversal one or more times. Within a round torch states
//! are fixed, except for torches stacked on top of each other (elevators),
//! which are resolved eagerly while the lower torch expands. When the round
//! has seen every wire feeding a torch base, each fed torch takes the state
//! its base implies and lonely torches are relit. If any torch changed, the
//! traversal runs again with the new states, up to `max_settle_rounds`.
//!
//! Wire levels use max-relaxation: a wire keeps the highest level any
//! predecessor offers, and only re-opens its outgoing edges when that level
//! rises. Together with the fixed torch states this makes the result
//! independent of the order nodes are taken from the open set.

use redwire_utils::{BlockPos, Direction};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::{SmallVec, smallvec};

use crate::world::{WorldAccessor, WorldError};

use super::blocks;
use super::classifier::Topology;
use super::flush::FlushCoordinator;
use super::torch::TorchRecord;
use super::worklist::{ExtractionOrder, Node, Worklist};

/// Level a lit torch injects into an adjacent wire.
pub const MAX_POWER: u8 = 15;

/// Tunables for a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropagationSettings {
    /// Which end of the open set nodes are taken from.
    pub order: ExtractionOrder,
    /// Deepest torch stack resolved eagerly in one expansion.
    pub max_elevator_height: usize,
    /// Upper bound on traversal rounds per pass.
    pub max_settle_rounds: usize,
}

impl Default for PropagationSettings {
    fn default() -> Self {
        Self {
            order: ExtractionOrder::Fifo,
            max_elevator_height: 16,
            max_settle_rounds: 32,
        }
    }
}

/// What a pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassOutcome {
    /// Traversal rounds run.
    pub rounds: usize,
    /// False if torch states were still changing when the round limit hit.
    pub settled: bool,
    /// Torches whose block was switched in the world.
    pub torch_switches: usize,
    /// Wires whose level was written to the world.
    pub wire_updates: usize,
    /// Wires no root reached in the final round.
    pub lonely_wires: usize,
}

/// State of one propagation pass over a classified topology.
pub struct Propagation<'a, W: WorldAccessor> {
    world: &'a W,
    topology: &'a Topology,
    settings: PropagationSettings,
    /// Torch records in the order roots are picked.
    torch_order: Vec<TorchRecord>,
    /// Torch states as read from the world when the pass started.
    initial_torches: FxHashMap<BlockPos, bool>,
    /// Wire levels as read from the world when the pass started.
    initial_levels: FxHashMap<BlockPos, u8>,
    /// Torch states as the pass sees them.
    torches: FxHashMap<BlockPos, bool>,
    /// Wire levels assigned in the current round.
    levels: FxHashMap<BlockPos, u8>,
    open: Worklist,
    closed: FxHashSet<Node>,
    /// Positions that entered the open or closed set with a predecessor.
    visited: FxHashSet<BlockPos>,
    /// Bases reached from a wire this round, and whether any such wire was powered.
    fed_bases: FxHashMap<BlockPos, bool>,
    /// Whether the block below a position is a wire, cached for the pass.
    wire_below: FxHashMap<BlockPos, bool>,
}

impl<'a, W: WorldAccessor> Propagation<'a, W> {
    /// Prepares a pass over `topology`.
    #[must_use]
    pub fn new(world: &'a W, topology: &'a Topology, settings: PropagationSettings) -> Self {
        Self {
            world,
            topology,
            settings,
            torch_order: topology.torches(),
            initial_torches: FxHashMap::default(),
            initial_levels: FxHashMap::default(),
            torches: FxHashMap::default(),
            levels: FxHashMap::default(),
            open: Worklist::new(settings.order),
            closed: FxHashSet::default(),
            visited: FxHashSet::default(),
            fed_bases: FxHashMap::default(),
            wire_below: FxHashMap::default(),
        }
    }

    /// Runs the pass and writes the changed torches and wires through `flush`.
    pub async fn run(mut self, flush: &mut FlushCoordinator) -> Result<PassOutcome, WorldError> {
        self.load_state().await?;

        let mut outcome = PassOutcome::default();
        while outcome.rounds < self.settings.max_settle_rounds.max(1) {
            outcome.rounds += 1;
            let before = self.torches.clone();

            self.traverse().await?;
            self.resolve_junctions();
            self.reset_lonely_torches();

            if self.torches == before {
                outcome.settled = true;
                break;
            }
        }
        if !outcome.settled {
            log::debug!(
                "Circuit of {} torches did not settle after {} rounds",
                self.torch_order.len(),
                outcome.rounds
            );
        }

        outcome.lonely_wires = self.reset_lonely_wires();
        let (torch_switches, wire_updates) = self.commit(flush).await?;
        outcome.torch_switches = torch_switches;
        outcome.wire_updates = wire_updates;

        Ok(outcome)
    }

    async fn load_state(&mut self) -> Result<(), WorldError> {
        for record in &self.torch_order {
            let lit = self.world.get_block(record.torch).await? == blocks::REDSTONE_TORCH;
            self.initial_torches.insert(record.torch, lit);
            self.torches.insert(record.torch, lit);
        }
        for wire in self.topology.wires() {
            let level = self.world.get_metadata(wire).await? & 0xF;
            self.initial_levels.insert(wire, level);
        }
        Ok(())
    }

    /// One round: picks every unvisited lit torch as a root and drains the
    /// open set after each.
    async fn traverse(&mut self) -> Result<(), WorldError> {
        self.open.clear();
        self.closed.clear();
        self.visited.clear();
        self.levels.clear();
        self.fed_bases.clear();

        for index in 0..self.torch_order.len() {
            let record = self.torch_order[index];
            if !self.visited.contains(&record.torch) && self.is_lit(record.torch) {
                self.expand_torch(record, None, true).await?;
            }
            self.drain().await?;
        }
        Ok(())
    }

    async fn drain(&mut self) -> Result<(), WorldError> {
        while let Some(node) = self.open.pop() {
            assert_ne!(
                node.previous,
                Some(node.pos),
                "traversal reached {} from itself",
                node.pos
            );

            if self.topology.is_torch_base(node.pos) {
                self.visit_base(node).await?;
            } else if self.topology.is_wire(node.pos) {
                self.visit_wire(node);
            }
            self.close(node);
        }
        Ok(())
    }

    /// A torch base reached from a wire records whether that wire carries
    /// power and expands the torches mounted on it. Whether they switch is
    /// decided once the round has seen every wire feeding the base.
    ///
    /// Bases reached from anything but a wire are left to other hooks.
    async fn visit_base(&mut self, node: Node) -> Result<(), WorldError> {
        let Some(previous) = node.previous else {
            return Ok(());
        };
        if !self.topology.is_wire(previous) {
            return Ok(());
        }

        let powered = self.level_of(previous) > 0;
        *self.fed_bases.entry(node.pos).or_insert(false) |= powered;

        let topology = self.topology;
        for &torch in topology.torches_on(node.pos) {
            let Some(&record) = topology.torch(torch) else {
                continue;
            };
            let lit = self.is_lit(torch);
            self.expand_torch(record, Some(node.pos), lit).await?;
        }
        Ok(())
    }

    fn visit_wire(&mut self, node: Node) {
        // Lonely wires are reset after the pass.
        let Some(previous) = node.previous else {
            return;
        };

        let offered = if self.topology.is_wire(previous) {
            self.level_of(previous).saturating_sub(1)
        } else if self.topology.torch(previous).is_some() {
            if self.is_lit(previous) { MAX_POWER } else { 0 }
        } else {
            log::warn!(
                "Wire at {} reached from unrecognised block at {previous}, skipping",
                node.pos
            );
            return;
        };

        if self.assign_level(node.pos, offered) {
            for direction in Direction::LATERAL {
                let next = direction.relative(node.pos);
                if next != previous {
                    self.enqueue(Node::from(next, node.pos));
                }
            }
        }
    }

    /// Expands a torch with the given polarity, switching it if needed.
    ///
    /// Torches stacked above are expanded right away with inverted polarity
    /// instead of going through the open set, so a whole elevator resolves
    /// within the same expansion.
    async fn expand_torch(
        &mut self,
        record: TorchRecord,
        previous: Option<BlockPos>,
        on: bool,
    ) -> Result<(), WorldError> {
        let mut stack: SmallVec<[(TorchRecord, Option<BlockPos>, bool, usize); 4]> =
            smallvec![(record, previous, on, 0)];

        while let Some((record, previous, on, height)) = stack.pop() {
            let switched = self.torches.insert(record.torch, on) != Some(on);
            if switched {
                log::debug!(
                    "Torch at {} switched {}",
                    record.torch,
                    if on { "on" } else { "off" }
                );
            }

            let node = Node {
                pos: record.torch,
                previous,
            };
            self.open.remove(&node);
            self.close(node);

            let mut outputs: SmallVec<[BlockPos; 5]> = record.lateral_outputs().into_iter().collect();
            // Only a wire below is powered, never a repeater or other block.
            if record.powers_below() && self.is_wire_below(record.torch).await? {
                outputs.push(record.torch.below());
            }

            let topology = self.topology;
            for &upper in topology.torches_on(record.torch.above()) {
                let Some(&upper_record) = topology.torch(upper) else {
                    continue;
                };
                if height >= self.settings.max_elevator_height {
                    log::warn!(
                        "Torch elevator above {} is higher than {}, not expanding {upper}",
                        record.torch,
                        self.settings.max_elevator_height
                    );
                    continue;
                }
                stack.push((upper_record, Some(record.torch), !on, height + 1));
            }

            // A switched torch re-expands everything so downstream levels
            // are recomputed.
            for output in outputs {
                let output = Node::from(output, record.torch);
                if switched || !self.closed.contains(&output) {
                    self.enqueue(output);
                }
            }
        }
        Ok(())
    }

    /// Applies the state each wire-fed base implies to the torches on it.
    /// All decisions are taken from the states at the end of the round.
    fn resolve_junctions(&mut self) {
        let decisions: Vec<(BlockPos, bool)> = self
            .fed_bases
            .iter()
            .flat_map(|(&base, &powered)| {
                let lit_below = self
                    .topology
                    .torch(base.below())
                    .is_some_and(|below| self.is_lit(below.torch));
                self.topology
                    .torches_on(base)
                    .iter()
                    .map(move |&torch| (torch, !(powered || lit_below)))
            })
            .collect();

        for (torch, on) in decisions {
            if self.torches.insert(torch, on) != Some(on) {
                log::debug!(
                    "Torch at {torch} switched {} by its base",
                    if on { "on" } else { "off" }
                );
            }
        }
    }

    /// Relights unlit torches that nothing reached this round.
    fn reset_lonely_torches(&mut self) {
        for record in &self.torch_order {
            if !self.visited.contains(&record.torch) && !self.is_lit(record.torch) {
                log::debug!("Resetting unpowered torch at {}", record.torch);
                self.torches.insert(record.torch, true);
            }
        }
    }

    /// Drops every wire nothing reached to level 0. Returns how many there were.
    fn reset_lonely_wires(&mut self) -> usize {
        let mut lonely = 0;
        for wire in self.topology.wires() {
            if !self.visited.contains(&wire) {
                if self.initial_levels.get(&wire).is_some_and(|&level| level > 0) {
                    log::debug!("Resetting unused wire at {wire}");
                }
                self.levels.insert(wire, 0);
                lonely += 1;
            }
        }
        lonely
    }

    /// Writes torches and wires whose computed state differs from the world.
    /// Positions that stopped holding a torch or wire meanwhile are skipped.
    async fn commit(&self, flush: &mut FlushCoordinator) -> Result<(usize, usize), WorldError> {
        let mut torch_switches = 0;
        for record in &self.torch_order {
            let on = self.is_lit(record.torch);
            if self.initial_torches.get(&record.torch) == Some(&on) {
                continue;
            }
            if !blocks::is_torch(self.world.get_block(record.torch).await?) {
                continue;
            }
            // Replacing the block clears its metadata, the orientation has
            // to be written back.
            let meta = self.world.get_metadata(record.torch).await?;
            flush
                .set_block(self.world, record.torch, blocks::torch_for(on))
                .await?;
            flush.set_metadata(self.world, record.torch, meta).await?;
            torch_switches += 1;
        }

        let mut wire_updates = 0;
        for wire in self.topology.wires() {
            let Some(&level) = self.levels.get(&wire) else {
                continue;
            };
            if self.initial_levels.get(&wire) == Some(&level) {
                continue;
            }
            if !blocks::is_wire(self.world.get_block(wire).await?) {
                continue;
            }
            flush.set_metadata(self.world, wire, level).await?;
            wire_updates += 1;
        }

        Ok((torch_switches, wire_updates))
    }

    fn enqueue(&mut self, node: Node) {
        if node.previous.is_some() {
            self.visited.insert(node.pos);
        }
        self.open.push(node);
    }

    fn close(&mut self, node: Node) {
        if node.previous.is_some() {
            self.visited.insert(node.pos);
        }
        self.closed.insert(node);
    }

    /// Raises a wire to `level` if that is its first level this round or
    /// higher than the one it has. Returns whether it changed.
    fn assign_level(&mut self, wire: BlockPos, level: u8) -> bool {
        match self.levels.get(&wire) {
            Some(&current) if current >= level => false,
            _ => {
                self.levels.insert(wire, level);
                true
            }
        }
    }

    fn level_of(&self, wire: BlockPos) -> u8 {
        self.levels.get(&wire).copied().unwrap_or(0)
    }

    fn is_lit(&self, torch: BlockPos) -> bool {
        self.torches.get(&torch).copied().unwrap_or(false)
    }

    async fn is_wire_below(&mut self, pos: BlockPos) -> Result<bool, WorldError> {
        if let Some(&wire) = self.wire_below.get(&pos) {
            return Ok(wire);
        }
        let wire = blocks::is_wire(self.world.get_block(pos.below()).await?);
        self.wire_below.insert(pos, wire);
        Ok(wire)
    }
}
