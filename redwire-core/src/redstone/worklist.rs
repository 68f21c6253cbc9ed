//! Traversal nodes and the open set they wait in.

use std::collections::VecDeque;

use redwire_utils::BlockPos;
use rustc_hash::FxHashSet;
use serde::Deserialize;

/// A position reached during traversal, paired with the position it was
/// reached from. `previous == None` marks a traversal root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Node {
    /// The position being visited.
    pub pos: BlockPos,
    /// The position it was reached from.
    pub previous: Option<BlockPos>,
}

impl Node {
    /// A node reached from `previous`.
    #[must_use]
    pub const fn from(pos: BlockPos, previous: BlockPos) -> Self {
        Self {
            pos,
            previous: Some(previous),
        }
    }
}

/// Which end of the open set nodes are taken from.
///
/// The outcome of a pass does not depend on it; it exists so the two can
/// be compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionOrder {
    /// Oldest node first.
    #[default]
    Fifo,
    /// Newest node first.
    Lifo,
}

/// The traversal frontier. Behaves as a set: a node already waiting is not
/// queued twice.
#[derive(Debug)]
pub struct Worklist {
    queue: VecDeque<Node>,
    queued: FxHashSet<Node>,
    order: ExtractionOrder,
}

impl Worklist {
    /// Creates an empty worklist.
    #[must_use]
    pub fn new(order: ExtractionOrder) -> Self {
        Self {
            queue: VecDeque::new(),
            queued: FxHashSet::default(),
            order,
        }
    }

    /// Queues `node` unless it is already waiting.
    pub fn push(&mut self, node: Node) -> bool {
        if self.queued.insert(node) {
            self.queue.push_back(node);
            true
        } else {
            false
        }
    }

    /// Takes the next node.
    pub fn pop(&mut self) -> Option<Node> {
        loop {
            let node = match self.order {
                ExtractionOrder::Fifo => self.queue.pop_front(),
                ExtractionOrder::Lifo => self.queue.pop_back(),
            }?;
            // Entries removed through `remove` are skipped lazily.
            if self.queued.remove(&node) {
                return Some(node);
            }
        }
    }

    /// Withdraws `node` if it is waiting.
    pub fn remove(&mut self, node: &Node) -> bool {
        self.queued.remove(node)
    }

    /// Drops every waiting node.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.queued.clear();
    }
}
