//! # Redwire
//!
//! Headless host for the redstone automaton. Builds a small demo world in
//! memory, lets the automaton tick it, breaks the inverter's input halfway
//! through and logs where every circuit ends up.

use std::{error::Error, path::Path, process::ExitCode, sync::Arc};

use redwire_core::{
    automaton::AutomatonRegistry,
    config::RedstoneConfig,
    redstone::{RedstoneCircuit, TorchFacing, blocks},
    world::{MemoryWorld, WorldAccessor},
};
use redwire_utils::{BlockPos, ChunkPos};
use tokio::{
    runtime::{Builder, Handle},
    select, signal, time,
};
use tracing_subscriber::EnvFilter;

const CONFIG_PATH: &str = "redwire_config.json5";
/// Passes the demo runs before shutting down.
const DEMO_TICKS: u32 = 10;

fn main() -> ExitCode {
    let config = match RedstoneConfig::load_or_create(Path::new(CONFIG_PATH)) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to load {CONFIG_PATH}: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = init_logging(&config.log_filter) {
        eprintln!("Failed to install logger: {err}");
        return ExitCode::FAILURE;
    }

    let runtime = match Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            log::error!("Failed to build tokio runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(run(config));
    ExitCode::SUCCESS
}

/// Routes `log` records into `tracing` and prints them. `RUST_LOG` overrides
/// the configured filter.
fn init_logging(default_filter: &str) -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_filter))?;
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;
    Ok(())
}

async fn run(config: RedstoneConfig) {
    log::info!("Starting redwire demo");

    let world = Arc::new(MemoryWorld::new());
    let placed = build_demo(&world);

    let circuit = RedstoneCircuit::new(Arc::clone(&world), &config, Handle::current());
    let mut registry = AutomatonRegistry::new();
    if let Err(err) = registry.register(circuit.clone()) {
        log::error!("Failed to register the redstone automaton: {err}");
        return;
    }

    let mut chunks: Vec<ChunkPos> = placed.iter().map(|pos| pos.chunk_pos()).collect();
    chunks.sort_unstable();
    chunks.dedup();
    for chunk in chunks {
        match world.request_chunk(chunk).await {
            Ok(chunk) => registry.scan_chunk(&chunk),
            Err(err) => log::warn!("Failed to load chunk {chunk}: {err}"),
        }
    }
    log::info!("Tracking {} circuit blocks", circuit.tracker().len());

    let mut ticker = time::interval(config.tick_interval());
    for tick in 1..=DEMO_TICKS {
        select! {
            _ = ticker.tick() => {}
            _ = signal::ctrl_c() => {
                log::info!("Interrupted, shutting down");
                break;
            }
        }

        if tick == DEMO_TICKS / 2 {
            log::info!("Breaking the inverter input at {INPUT_TORCH}");
            world.clear(INPUT_TORCH);
            registry.block_removed(INPUT_TORCH);
        }
    }

    circuit.stop();
    report(&world, &placed);
}

const INPUT_TORCH: BlockPos = BlockPos::new(-2, 64, 2);

/// Lays out an inverter driven by a standing torch, and a three torch
/// elevator. Returns every circuit block placed.
fn build_demo(world: &MemoryWorld) -> Vec<BlockPos> {
    let mut placed = Vec::new();
    let mut torch = |pos: BlockPos, facing: TorchFacing, base: BlockPos| {
        world.place(base, blocks::STONE, 0);
        world.place(pos, blocks::REDSTONE_TORCH, facing as u8);
        placed.push(pos);
    };

    torch(BlockPos::new(0, 64, 0), TorchFacing::South, BlockPos::new(-1, 64, 0));
    torch(INPUT_TORCH, TorchFacing::Up, INPUT_TORCH.below());
    for y in [64, 66, 68] {
        let pos = BlockPos::new(10, y, 0);
        torch(pos, TorchFacing::Up, pos.below());
    }

    let wires = (1..=4)
        .map(|x| BlockPos::new(x, 64, 0))
        .chain([BlockPos::new(-2, 64, 1), BlockPos::new(-2, 64, 0)])
        .chain([64, 66, 68].map(|y| BlockPos::new(11, y, 0)));
    for wire in wires {
        world.place(wire, blocks::REDSTONE_WIRE, 0);
        placed.push(wire);
    }
    placed
}

fn report(world: &MemoryWorld, placed: &[BlockPos]) {
    for &pos in placed {
        let block = world.block_at(pos);
        let name = blocks::name_of(block).unwrap_or("unknown");
        if blocks::is_wire(block) {
            log::info!("{pos}: {name} level {}", world.metadata_at(pos));
        } else {
            log::info!("{pos}: {name}");
        }
    }
}
