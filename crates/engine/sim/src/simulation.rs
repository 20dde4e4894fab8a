use std::sync::Arc;

use glam::IVec2;
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use script::{AtomId, WorldDefinition};

use crate::config::SimConfig;
use crate::error::{Error, Result};
use crate::grid::{Cell, Grid, GridView};
use crate::interpreter::{Interpreter, TickOutcome};
use crate::snapshot::Snapshot;

/// Random source for stream `stream`; seeded runs use `seed + stream`
pub fn stream_rng(seed: Option<u64>, stream: u64) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(stream)),
        None => StdRng::seed_from_u64(rand::random()),
    }
}

/// A compiled world running on a tile-locked grid
///
/// Every mutation goes through the copy gate in shared mode and then locks the
/// tiles it touches; [`Simulation::snapshot_into`] takes the gate exclusively,
/// so a snapshot never observes a half-applied rule.
pub struct Simulation {
    world: Arc<WorldDefinition>,
    config: SimConfig,
    grid: Grid,
    copy_gate: RwLock<()>,
}

impl Simulation {
    /// Build an all-empty grid for `world`
    ///
    /// Fails when the configuration is invalid or when some rule reaches
    /// further than one tile, which the 3x3 tile lock could not cover.
    pub fn new(world: Arc<WorldDefinition>, config: SimConfig) -> Result<Self> {
        config.validate()?;
        if let Some(report) = world.max_reach() {
            if report.reach > config.tile_size {
                return Err(Error::RuleTooLarge {
                    atom: report.atom.to_string(),
                    rule: report.rule,
                    reach: report.reach,
                    tile_size: config.tile_size,
                });
            }
        }

        let empty = world.empty();
        let fill = Cell::new(empty, world.atom(empty).properties.clone());
        let grid = Grid::new(config.width, config.height, config.tile_size, &fill);
        let simulation = Self {
            world,
            config,
            grid,
            copy_gate: RwLock::new(()),
        };

        if !simulation.world.atom(empty).init.is_empty() {
            let mut rng = stream_rng(simulation.config.seed, simulation.config.workers as u64);
            simulation.clear_all(&mut rng)?;
        }

        tracing::info!(
            "Simulation ready: {}x{} grid, {} tiles, {} atom types",
            simulation.config.width,
            simulation.config.height,
            simulation.grid.tiles_across().x * simulation.grid.tiles_across().y,
            simulation.world.len()
        );
        Ok(simulation)
    }

    pub fn world(&self) -> &Arc<WorldDefinition> {
        &self.world
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn size(&self) -> IVec2 {
        self.grid.size()
    }

    pub fn in_bounds(&self, position: IVec2) -> bool {
        self.grid.in_bounds(position)
    }

    /// Run the interpreter on one target under the tile lock discipline
    pub fn tick<R: Rng + ?Sized>(&self, target: IVec2, rng: &mut R) -> Result<TickOutcome> {
        let _gate = self.copy_gate.read();
        let mut region = self.grid.lock_block(target);
        Interpreter::new(&self.world).tick(&mut region, target, rng)
    }

    /// Copy the whole grid into `snapshot` while no rule is mid-application
    pub fn snapshot_into(&self, snapshot: &mut Snapshot) {
        let _gate = self.copy_gate.write();
        let region = self.grid.lock_all();
        snapshot.copy_from(&region);
    }

    pub fn snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::default();
        self.snapshot_into(&mut snapshot);
        snapshot
    }

    /// Current state of one cell
    pub fn cell(&self, position: IVec2) -> Option<Cell> {
        if !self.in_bounds(position) {
            return None;
        }
        let _gate = self.copy_gate.read();
        let region = self.grid.lock_rect(position, position);
        region.cell(position).cloned()
    }

    /// Change the type of every cell in the inclusive rectangle for which
    /// `filter` holds; returns how many cells changed
    pub(crate) fn change_rect<R, F>(
        &self,
        min: IVec2,
        max: IVec2,
        atom: AtomId,
        rng: &mut R,
        filter: F,
    ) -> Result<usize>
    where
        R: Rng + ?Sized,
        F: Fn(&Cell) -> bool,
    {
        let min = min.max(IVec2::ZERO);
        let max = max.min(self.size() - IVec2::ONE);
        if min.x > max.x || min.y > max.y {
            return Ok(0);
        }

        let _gate = self.copy_gate.read();
        let mut region = self.grid.lock_rect(min, max);
        let interpreter = Interpreter::new(&self.world);
        let mut changed = 0;
        for y in min.y..=max.y {
            for x in min.x..=max.x {
                let position = IVec2::new(x, y);
                let cell = region.cell(position).ok_or(Error::Unlocked(position))?;
                if filter(cell) {
                    interpreter.change_type(&mut region, position, atom, rng)?;
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }
}
