//! # Redwire Core
//!
//! The redstone automaton: a tick-driven engine that keeps torch and wire
//! block states consistent with the circuit topology stored in a world.
//!
//! - [`world`] - the world accessor seam and an in-memory implementation
//! - [`ticks`] - the periodic scheduler driving passes
//! - [`redstone`] - tracker, classifier, propagation engine and flush coordinator
//! - [`automaton`] - the capability interface hosts register automata through
//! - [`config`] - tunables loaded from `redwire_config.json5`

pub mod automaton;
pub mod config;
pub mod redstone;
pub mod ticks;
pub mod world;
