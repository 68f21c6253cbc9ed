//! The redstone circuit automaton.
//!
//! Each pass snapshots the tracked coordinates, classifies them against the
//! world, propagates torch and wire state through the resulting topology and
//! flushes every chunk it wrote to.
//!
//! # Architecture
//!
//! - [`Tracker`] - The coordinates re-examined every pass
//! - [`classifier`] - Turns tracked coordinates into a [`Topology`]
//! - [`Propagation`] - Computes and commits torch and wire state
//! - [`FlushCoordinator`] - Routes writes and flushes touched chunks once
//! - [`RedstoneCircuit`] - Ties them together behind the automaton interface

pub mod blocks;
pub mod classifier;
mod circuit;
mod flush;
pub mod propagation;
pub mod torch;
mod tracker;
pub mod worklist;

pub use circuit::{PassReport, RedstoneCircuit};
pub use classifier::{Topology, classify};
pub use flush::FlushCoordinator;
pub use propagation::{PassOutcome, Propagation, PropagationSettings};
pub use torch::{TorchFacing, TorchRecord};
pub use tracker::Tracker;
pub use worklist::{ExtractionOrder, Node, Worklist};
