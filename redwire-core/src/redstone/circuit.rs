//! The redstone automaton bound to a world: passes and their scheduling.

use std::sync::{Arc, Weak};

use redwire_utils::{BlockId, BlockPos, Direction};
use tokio::{runtime::Handle, sync::Mutex};

use crate::automaton::Automaton;
use crate::config::RedstoneConfig;
use crate::ticks::{Periodic, PeriodicTask};
use crate::world::{WorldAccessor, WorldError};

use super::blocks;
use super::classifier::classify;
use super::flush::FlushCoordinator;
use super::propagation::{Propagation, PropagationSettings};
use super::tracker::Tracker;

/// Summary of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Coordinates tracked when the pass started.
    pub tracked: usize,
    /// Torches classified.
    pub torches: usize,
    /// Wires classified.
    pub wires: usize,
    /// Coordinates dropped because they no longer hold a circuit block.
    pub destroyed: usize,
    /// Traversal rounds run.
    pub rounds: usize,
    /// Whether torch states stopped changing within the round limit.
    pub settled: bool,
    /// Block writes made.
    pub block_writes: usize,
    /// Metadata writes made.
    pub metadata_writes: usize,
    /// Chunks flushed.
    pub flushed_chunks: usize,
}

/// The redstone automaton bound to one world.
///
/// Passes run on a fixed step while anything is tracked and stop on their
/// own once the tracked set empties. [`RedstoneCircuit::feed`] restarts
/// them.
pub struct RedstoneCircuit<W: WorldAccessor> {
    world: Arc<W>,
    tracker: Tracker,
    settings: PropagationSettings,
    task: PeriodicTask,
    runtime: Handle,
    /// Held for the whole of a pass so passes never overlap.
    pass_lock: Mutex<()>,
    this: Weak<Self>,
}

impl<W: WorldAccessor> RedstoneCircuit<W> {
    /// Name other automata use to order themselves around this one.
    pub const NAME: &'static str = "redstone-circuit";

    /// Creates a stopped automaton with nothing tracked.
    #[must_use]
    pub fn new(world: Arc<W>, config: &RedstoneConfig, runtime: Handle) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            world,
            tracker: Tracker::new(),
            settings: config.propagation(),
            task: PeriodicTask::new(config.tick_interval()),
            runtime,
            pass_lock: Mutex::new(()),
            this: this.clone(),
        })
    }

    /// The tracked coordinates.
    #[must_use]
    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// The world this automaton reads and writes.
    #[must_use]
    pub fn world(&self) -> &Arc<W> {
        &self.world
    }

    /// Starts watching `pos` and makes sure passes are running.
    pub fn feed(&self, pos: BlockPos) {
        if self.tracker.feed(pos) {
            log::trace!("Tracking {pos}");
        }
        self.start();
    }

    /// Starts periodic passes. Does nothing if they are already running.
    pub fn start(&self) {
        let Some(this) = self.this.upgrade() else {
            return;
        };
        if self.task.start(this, &self.runtime) {
            log::debug!("Started redstone passes every {:?}", self.task.step());
        }
    }

    /// Stops periodic passes. A pass in progress finishes first.
    pub fn stop(&self) {
        if self.task.stop() {
            log::debug!("Stopped redstone passes");
        }
    }

    /// Whether periodic passes are running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }

    /// Runs one pass now.
    ///
    /// A storage error aborts the pass. Chunks already written to are still
    /// flushed before the error is returned. The tracked set is left as it
    /// was unless the whole pass succeeds.
    pub async fn process(&self) -> Result<PassReport, WorldError> {
        let _pass = self.pass_lock.lock().await;

        let tracked = self.tracker.snapshot();
        let topology = classify(&*self.world, &tracked).await?;

        let mut flush = FlushCoordinator::new();
        let outcome = Propagation::new(&*self.world, &topology, self.settings)
            .run(&mut flush)
            .await;
        let flushed = flush.flush(&*self.world).await;
        let outcome = outcome?;
        let flushed_chunks = flushed?;

        for pos in topology.destroyed() {
            log::debug!("No circuit block left at {pos}, untracking");
        }
        self.tracker.untrack_all(topology.destroyed());

        Ok(PassReport {
            tracked: tracked.len(),
            torches: topology.torch_count(),
            wires: topology.wire_count(),
            destroyed: topology.destroyed().len(),
            rounds: outcome.rounds,
            settled: outcome.settled,
            block_writes: flush.block_writes(),
            metadata_writes: flush.metadata_writes(),
            flushed_chunks,
        })
    }
}

impl<W: WorldAccessor> Periodic for RedstoneCircuit<W> {
    async fn run_once(&self) {
        match self.process().await {
            Ok(report) => log::trace!("Redstone pass: {report:?}"),
            Err(err) => log::warn!("Redstone pass aborted: {err}"),
        }
    }

    fn is_idle(&self) -> bool {
        self.tracker.is_empty()
    }
}

impl<W: WorldAccessor> Automaton for RedstoneCircuit<W> {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn before(&self) -> &'static [&'static str] {
        &["build"]
    }

    fn blocks(&self) -> &'static [BlockId] {
        &blocks::CIRCUIT_BLOCKS
    }

    fn feed(&self, pos: BlockPos) {
        Self::feed(self, pos);
    }

    /// Stops watching `pos` and re-examines its neighbours, whose circuit
    /// may have changed shape.
    fn on_block_removed(&self, pos: BlockPos) {
        self.tracker.untrack(pos);
        for direction in Direction::ALL {
            self.tracker.feed(direction.relative(pos));
        }
        self.start();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests are allowed to panic
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::redstone::blocks::{REDSTONE_TORCH, REDSTONE_TORCH_OFF, REDSTONE_WIRE, STONE};
    use crate::redstone::torch::TorchFacing;
    use crate::world::MemoryWorld;

    fn pos(x: i32, y: i32, z: i32) -> BlockPos {
        BlockPos::new(x, y, z)
    }

    /// A lit wall torch at the origin feeding wires along +x, with a standing
    /// torch whose wire run reaches the wall torch's base.
    fn inverter(world: &MemoryWorld) -> Vec<BlockPos> {
        world.place(pos(-1, 0, 0), STONE, 0);
        world.place(pos(0, 0, 0), REDSTONE_TORCH, TorchFacing::South as u8);
        world.place(pos(-2, -1, 2), STONE, 0);
        world.place(pos(-2, 0, 2), REDSTONE_TORCH, TorchFacing::Up as u8);
        let wires = [pos(1, 0, 0), pos(2, 0, 0), pos(-2, 0, 1), pos(-2, 0, 0)];
        for wire in wires {
            world.place(wire, REDSTONE_WIRE, 0);
        }
        let mut tracked = vec![pos(0, 0, 0), pos(-2, 0, 2)];
        tracked.extend(wires);
        tracked
    }

    fn circuit(world: &Arc<MemoryWorld>) -> Arc<RedstoneCircuit<MemoryWorld>> {
        RedstoneCircuit::new(Arc::clone(world), &RedstoneConfig::default(), Handle::current())
    }

    #[tokio::test]
    async fn test_process_reports() {
        let world = Arc::new(MemoryWorld::new());
        let circuit = circuit(&world);
        for tracked in inverter(&world) {
            circuit.tracker().feed(tracked);
        }

        let report = circuit.process().await.unwrap();

        assert_eq!(report.tracked, 6);
        assert_eq!(report.torches, 2);
        assert_eq!(report.wires, 4);
        assert!(report.settled);
        assert_eq!(report.block_writes, 1);
        assert_eq!(report.flushed_chunks, 2);
        assert_eq!(world.block_at(pos(0, 0, 0)), REDSTONE_TORCH_OFF);
        assert_eq!(world.metadata_at(pos(-2, 0, 0)), 14);
        assert!(!circuit.is_running());
    }

    #[tokio::test]
    async fn test_destroyed_blocks_are_untracked() {
        let world = Arc::new(MemoryWorld::new());
        let circuit = circuit(&world);
        world.place(pos(0, 0, 0), STONE, 0);
        world.place(pos(1, 0, 0), REDSTONE_WIRE, 4);
        circuit.tracker().feed(pos(0, 0, 0));
        circuit.tracker().feed(pos(1, 0, 0));

        let report = circuit.process().await.unwrap();

        assert_eq!(report.destroyed, 1);
        assert_eq!(circuit.tracker().snapshot(), vec![pos(1, 0, 0)]);
        assert_eq!(world.metadata_at(pos(1, 0, 0)), 0);
    }

    #[tokio::test]
    async fn test_failed_scan_keeps_tracked_set() {
        let world = Arc::new(MemoryWorld::new());
        let circuit = circuit(&world);
        world.place(pos(0, 0, 0), STONE, 0);
        world.place(pos(1, 0, 0), REDSTONE_WIRE, 4);
        circuit.tracker().feed(pos(0, 0, 0));
        circuit.tracker().feed(pos(1, 0, 0));
        world.fail_at(pos(1, 0, 0));

        assert!(circuit.process().await.is_err());
        assert_eq!(circuit.tracker().len(), 2);
        assert_eq!(world.writes(), 0);

        world.heal(pos(1, 0, 0));
        assert!(circuit.process().await.is_ok());
        assert_eq!(circuit.tracker().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_propagation_keeps_tracked_set() {
        let world = Arc::new(MemoryWorld::new());
        let circuit = circuit(&world);
        world.place(pos(-1, 1, 0), STONE, 0);
        world.place(pos(0, 1, 0), REDSTONE_TORCH, TorchFacing::South as u8);
        world.place(pos(5, 0, 5), STONE, 0);
        circuit.tracker().feed(pos(0, 1, 0));
        circuit.tracker().feed(pos(5, 0, 5));
        // Classification never reads below the torch; propagation does.
        world.fail_at(pos(0, 0, 0));

        assert!(circuit.process().await.is_err());
        assert_eq!(circuit.tracker().len(), 2);
        assert!(circuit.tracker().contains(pos(5, 0, 5)));

        world.heal(pos(0, 0, 0));
        assert!(circuit.process().await.is_ok());
        assert_eq!(circuit.tracker().snapshot(), vec![pos(0, 1, 0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_drives_passes() {
        let world = Arc::new(MemoryWorld::new());
        let circuit = circuit(&world);

        for tracked in inverter(&world) {
            circuit.feed(tracked);
        }
        assert!(circuit.is_running());
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(world.block_at(pos(0, 0, 0)), REDSTONE_TORCH_OFF);
        assert_eq!(world.metadata_at(pos(1, 0, 0)), 0);

        circuit.stop();
        assert!(!circuit.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_once_nothing_is_tracked() {
        let world = Arc::new(MemoryWorld::new());
        let circuit = circuit(&world);
        world.place(pos(0, 0, 0), STONE, 0);

        circuit.feed(pos(0, 0, 0));
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(circuit.tracker().is_empty());
        assert!(!circuit.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_block_removed_reexamines_neighbours() {
        let world = Arc::new(MemoryWorld::new());
        let circuit = circuit(&world);
        let removed = pos(4, 4, 4);
        circuit.tracker().feed(removed);

        circuit.on_block_removed(removed);

        assert!(!circuit.tracker().contains(removed));
        for direction in Direction::ALL {
            assert!(circuit.tracker().contains(direction.relative(removed)));
        }
        assert!(circuit.is_running());
        circuit.stop();
    }

    #[test]
    fn test_automaton_surface() {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let world = Arc::new(MemoryWorld::new());
        let circuit = RedstoneCircuit::new(world, &RedstoneConfig::default(), runtime.handle().clone());

        assert_eq!(Automaton::name(&*circuit), "redstone-circuit");
        assert_eq!(circuit.before(), &["build"]);
        assert!(circuit.after().is_empty());
        assert!(circuit.blocks().contains(&REDSTONE_WIRE));
    }
}
