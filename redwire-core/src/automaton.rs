//! The capability interface hosts register automata through.
//!
//! An automaton declares which block types it cares about, accepts
//! coordinates to watch, and may react to chunk scans and block removal.
//! The [`AutomatonRegistry`] routes world events to every registered
//! automaton in an order that honours their `before`/`after` tags.

use std::sync::Arc;

use redwire_utils::{BlockId, BlockPos};
use thiserror::Error;

use crate::world::ChunkView;

/// How an automaton discovers candidates when a chunk is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanStrategy {
    /// Feed every block in the chunk whose type the automaton declares.
    #[default]
    Naive,
    /// Ignore chunk scans. Candidates only arrive through placement hooks.
    Skip,
}

/// A block automaton.
///
/// Object safe, so registries can hold automata of different types.
pub trait Automaton: Send + Sync {
    /// Unique name other automata refer to in their ordering tags.
    fn name(&self) -> &'static str;

    /// Names of hooks this automaton must run before.
    fn before(&self) -> &'static [&'static str] {
        &[]
    }

    /// Names of hooks this automaton must run after.
    fn after(&self) -> &'static [&'static str] {
        &[]
    }

    /// Block types this automaton watches.
    fn blocks(&self) -> &'static [BlockId];

    /// How chunk scans are handled.
    fn scan_strategy(&self) -> ScanStrategy {
        ScanStrategy::Naive
    }

    /// Starts watching `pos`.
    fn feed(&self, pos: BlockPos);

    /// Looks for candidates in a freshly loaded chunk.
    fn scan(&self, chunk: &dyn ChunkView) {
        match self.scan_strategy() {
            ScanStrategy::Naive => naive_scan(self, chunk),
            ScanStrategy::Skip => {}
        }
    }

    /// Called after the block at `pos` was removed from the world.
    fn on_block_removed(&self, _pos: BlockPos) {}
}

/// Feeds `automaton` every block in `chunk` whose type it declares.
pub fn naive_scan<A: Automaton + ?Sized>(automaton: &A, chunk: &dyn ChunkView) {
    let watched = automaton.blocks();
    let mut fed = 0usize;
    chunk.for_each_block(&mut |pos, block| {
        if watched.contains(&block) {
            automaton.feed(pos);
            fed += 1;
        }
    });
    if fed > 0 {
        log::trace!("{} found {fed} blocks in chunk {}", automaton.name(), chunk.pos());
    }
}

/// Errors raised while registering automata.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderingError {
    /// An automaton with the same name is already registered.
    #[error("an automaton named {0} is already registered")]
    Duplicate(&'static str),
    /// The ordering tags contradict each other.
    #[error("ordering cycle between {0:?}")]
    Cycle(Vec<&'static str>),
}

/// Registered automata, kept in dependency order.
#[derive(Default)]
pub struct AutomatonRegistry {
    /// In an order satisfying every `before`/`after` tag.
    ordered: Vec<Arc<dyn Automaton>>,
}

impl AutomatonRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `automaton`. On error the registry is left unchanged.
    pub fn register(&mut self, automaton: Arc<dyn Automaton>) -> Result<(), OrderingError> {
        let name = automaton.name();
        if self.ordered.iter().any(|existing| existing.name() == name) {
            return Err(OrderingError::Duplicate(name));
        }

        let mut candidates = self.ordered.clone();
        candidates.push(automaton);
        self.ordered = sort_by_tags(candidates)?;
        log::debug!("Registered automaton {name}");
        Ok(())
    }

    /// Registered automata in run order.
    #[must_use]
    pub fn automata(&self) -> &[Arc<dyn Automaton>] {
        &self.ordered
    }

    /// Names of the registered automata in run order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.ordered.iter().map(|automaton| automaton.name()).collect()
    }

    /// Feeds `pos` to every automaton watching `block`. Returns how many did.
    pub fn block_placed(&self, pos: BlockPos, block: BlockId) -> usize {
        let mut fed = 0;
        for automaton in &self.ordered {
            if automaton.blocks().contains(&block) {
                automaton.feed(pos);
                fed += 1;
            }
        }
        fed
    }

    /// Tells every automaton the block at `pos` was removed.
    pub fn block_removed(&self, pos: BlockPos) {
        for automaton in &self.ordered {
            automaton.on_block_removed(pos);
        }
    }

    /// Lets every automaton scan a freshly loaded chunk.
    pub fn scan_chunk(&self, chunk: &dyn ChunkView) {
        for automaton in &self.ordered {
            automaton.scan(chunk);
        }
    }
}

/// Topologically sorts `automata` by their tags. Ties keep the input order.
/// Tags naming an automaton that is not present are ignored.
fn sort_by_tags(
    automata: Vec<Arc<dyn Automaton>>,
) -> Result<Vec<Arc<dyn Automaton>>, OrderingError> {
    let index_of = |name: &str| automata.iter().position(|automaton| automaton.name() == name);

    let count = automata.len();
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut in_degree = vec![0usize; count];

    for (index, automaton) in automata.iter().enumerate() {
        let edges = automaton
            .before()
            .iter()
            .map(|&tag| (tag, true))
            .chain(automaton.after().iter().map(|&tag| (tag, false)));
        for (tag, runs_first) in edges {
            let Some(other) = index_of(tag) else {
                log::debug!("{} refers to unknown hook {tag}, ignoring", automaton.name());
                continue;
            };
            let (from, to) = if runs_first { (index, other) } else { (other, index) };
            successors[from].push(to);
            in_degree[to] += 1;
        }
    }

    let mut order = Vec::with_capacity(count);
    let mut emitted = vec![false; count];
    while let Some(next) = (0..count).find(|&index| !emitted[index] && in_degree[index] == 0) {
        emitted[next] = true;
        order.push(next);
        for &successor in &successors[next] {
            in_degree[successor] -= 1;
        }
    }

    if order.len() < count {
        let cycle = (0..count)
            .filter(|&index| !emitted[index])
            .map(|index| automata[index].name())
            .collect();
        return Err(OrderingError::Cycle(cycle));
    }

    Ok(order.into_iter().map(|index| Arc::clone(&automata[index])).collect())
}
