//! Sim crate - multi-threaded cellular automaton engine
//!
//! Runs a compiled [`script::WorldDefinition`] on a 2D grid shared by a pool of
//! worker threads. Workers pick target cells, lock the tiles around them and
//! apply the target atom's rules; a renderer reads consistent copies of the
//! grid through [`Snapshot`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     WorkerPool                           │
//! │  ├── N threads, seeded per worker                       │
//! │  ├── Random target or last recorded shift               │
//! │  └── Shared shutdown flag, first error wins             │
//! ├─────────────────────────────────────────────────────────┤
//! │                     Simulation                           │
//! │  ├── Copy gate (RwLock): ticks shared, snapshot write   │
//! │  ├── Grid of tile mutexes, 3x3 block per tick           │
//! │  └── Placement and clearing                             │
//! ├─────────────────────────────────────────────────────────┤
//! │                     Interpreter                          │
//! │  ├── Always-rules, then rules vs extensions draw        │
//! │  ├── Matcher (mirrored pattern boxes)                   │
//! │  └── Steps: set / inc / clamp / bind / map pattern      │
//! ├─────────────────────────────────────────────────────────┤
//! │                 Snapshot / RenderView                    │
//! │  ├── Whole-grid copy for readers                        │
//! │  └── should_draw / resolve_color                        │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use sim::{SimConfig, Simulation, WorkerPool};
//!
//! let world = script::compile("atom Empty {\n}\natom Sand {\n}\n").unwrap();
//! let config = SimConfig::default().with_size(32, 32).with_workers(2).with_seed(7);
//! let simulation = Arc::new(Simulation::new(Arc::new(world), config).unwrap());
//!
//! let mut rng = sim::stream_rng(Some(7), 99);
//! simulation.place(sim::glam::IVec2::new(16, 4), 1, &mut rng).unwrap();
//!
//! let pool = WorkerPool::spawn(Arc::clone(&simulation)).unwrap();
//! pool.shutdown().unwrap();
//! assert_eq!(simulation.snapshot().population()[1], 25);
//! ```

mod config;
mod error;
mod extension;
mod grid;
mod interpreter;
mod matcher;
mod placement;
mod render;
mod scheduler;
mod simulation;
mod snapshot;
mod symmetry;

pub use config::SimConfig;
pub use error::{Error, Result};
pub use grid::{Cell, Grid, GridView, GridViewMut, Region};
pub use interpreter::{Interpreter, TickOutcome};
pub use matcher::{matches, symbol_accepts};
pub use placement::{Placement, DEFAULT_BRUSH_SIZE, DEFAULT_DRAG_COOLDOWN};
pub use render::RenderView;
pub use scheduler::{PoolStats, StatsSnapshot, WorkerPool};
pub use simulation::{stream_rng, Simulation};
pub use snapshot::Snapshot;
pub use symmetry::Orientation;

// Re-export glam for convenience
pub use glam;
