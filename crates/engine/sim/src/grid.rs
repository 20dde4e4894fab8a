//! Cells, lockable tiles and locked regions
//!
//! The grid is partitioned into square tiles, each behind its own mutex. A
//! worker locks the block of tiles around its target (always in ascending tile
//! index order, so lockers never deadlock) and gets a [`Region`] that exposes
//! exactly those cells.

use std::collections::HashMap;

use glam::IVec2;
use parking_lot::{Mutex, MutexGuard};
use script::AtomId;

/// One grid cell
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cell {
    pub atom: AtomId,
    /// Live per-instance properties
    pub props: HashMap<String, f32>,
}

impl Cell {
    pub fn new(atom: AtomId, props: HashMap<String, f32>) -> Self {
        Self { atom, props }
    }

    pub fn property(&self, name: &str) -> Option<f32> {
        self.props.get(name).copied()
    }
}

/// Read access to cells by absolute position
///
/// `cell` returns `None` both outside the grid and for cells the view cannot
/// reach; use [`GridView::in_bounds`] to tell them apart.
pub trait GridView {
    /// Full grid size
    fn size(&self) -> IVec2;

    fn cell(&self, position: IVec2) -> Option<&Cell>;

    fn in_bounds(&self, position: IVec2) -> bool {
        let size = self.size();
        position.x >= 0 && position.y >= 0 && position.x < size.x && position.y < size.y
    }
}

/// Write access to cells by absolute position
pub trait GridViewMut: GridView {
    fn cell_mut(&mut self, position: IVec2) -> Option<&mut Cell>;
}

#[derive(Debug)]
struct Tile {
    /// Top-left cell
    origin: IVec2,
    /// Cells in this tile (edge tiles may be smaller)
    size: IVec2,
    cells: Vec<Cell>,
}

impl Tile {
    fn index(&self, position: IVec2) -> usize {
        let local = position - self.origin;
        (local.y * self.size.x + local.x) as usize
    }
}

/// The shared cell grid
#[derive(Debug)]
pub struct Grid {
    size: IVec2,
    tile_size: i32,
    tiles_across: IVec2,
    tiles: Vec<Mutex<Tile>>,
}

impl Grid {
    /// Create a `width` x `height` grid with every cell set to `fill`
    pub fn new(width: u32, height: u32, tile_size: u32, fill: &Cell) -> Self {
        let size = IVec2::new(width as i32, height as i32);
        let tile_size = tile_size.max(1) as i32;
        let tiles_across = (size + IVec2::splat(tile_size - 1)) / tile_size;

        let mut tiles = Vec::with_capacity((tiles_across.x * tiles_across.y) as usize);
        for ty in 0..tiles_across.y {
            for tx in 0..tiles_across.x {
                let origin = IVec2::new(tx, ty) * tile_size;
                let tile_extent = (size - origin).min(IVec2::splat(tile_size));
                let cells = vec![fill.clone(); (tile_extent.x * tile_extent.y) as usize];
                tiles.push(Mutex::new(Tile {
                    origin,
                    size: tile_extent,
                    cells,
                }));
            }
        }

        Self {
            size,
            tile_size,
            tiles_across,
            tiles,
        }
    }

    pub fn size(&self) -> IVec2 {
        self.size
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size as u32
    }

    /// Number of tiles along each axis
    pub fn tiles_across(&self) -> IVec2 {
        self.tiles_across
    }

    pub fn in_bounds(&self, position: IVec2) -> bool {
        position.x >= 0 && position.y >= 0 && position.x < self.size.x && position.y < self.size.y
    }

    /// Tile coordinate containing `position`
    pub fn tile_of(&self, position: IVec2) -> IVec2 {
        position.clamp(IVec2::ZERO, self.size - IVec2::ONE) / self.tile_size
    }

    /// Lock the in-bounds tiles of the 3x3 tile block around `target`'s tile
    pub fn lock_block(&self, target: IVec2) -> Region<'_> {
        let center = self.tile_of(target);
        self.lock_tiles(center - IVec2::ONE, center + IVec2::ONE)
    }

    /// Lock every tile touching the inclusive cell rectangle `min..=max`
    pub fn lock_rect(&self, min: IVec2, max: IVec2) -> Region<'_> {
        self.lock_tiles(self.tile_of(min), self.tile_of(max))
    }

    /// Lock the whole grid
    pub fn lock_all(&self) -> Region<'_> {
        self.lock_tiles(IVec2::ZERO, self.tiles_across - IVec2::ONE)
    }

    fn lock_tiles(&self, min: IVec2, max: IVec2) -> Region<'_> {
        let min = min.max(IVec2::ZERO);
        let max = max.min(self.tiles_across - IVec2::ONE);
        let span = (max - min + IVec2::ONE).max(IVec2::ZERO);

        // row-major iteration is ascending tile index order
        let mut guards = Vec::with_capacity((span.x * span.y) as usize);
        for ty in min.y..=max.y {
            for tx in min.x..=max.x {
                let index = (ty * self.tiles_across.x + tx) as usize;
                guards.push(self.tiles[index].lock());
            }
        }

        Region {
            size: self.size,
            tile_size: self.tile_size,
            tile_min: min,
            tile_span: span,
            guards,
        }
    }
}

/// A set of locked tiles; cells outside them are unreachable
pub struct Region<'g> {
    size: IVec2,
    tile_size: i32,
    tile_min: IVec2,
    tile_span: IVec2,
    guards: Vec<MutexGuard<'g, Tile>>,
}

impl Region<'_> {
    fn guard_index(&self, position: IVec2) -> Option<usize> {
        if !self.in_bounds(position) {
            return None;
        }
        let tile = position / self.tile_size - self.tile_min;
        if tile.x < 0 || tile.y < 0 || tile.x >= self.tile_span.x || tile.y >= self.tile_span.y {
            return None;
        }
        Some((tile.y * self.tile_span.x + tile.x) as usize)
    }

    /// Whether `position` lies inside a locked tile
    pub fn contains(&self, position: IVec2) -> bool {
        self.guard_index(position).is_some()
    }

    /// Inclusive cell bounds covered by the locked tiles
    pub fn bounds(&self) -> (IVec2, IVec2) {
        let min = self.tile_min * self.tile_size;
        let max = ((self.tile_min + self.tile_span) * self.tile_size).min(self.size) - IVec2::ONE;
        (min, max)
    }
}

impl GridView for Region<'_> {
    fn size(&self) -> IVec2 {
        self.size
    }

    fn cell(&self, position: IVec2) -> Option<&Cell> {
        let guard = &self.guards[self.guard_index(position)?];
        guard.cells.get(guard.index(position))
    }
}

impl GridViewMut for Region<'_> {
    fn cell_mut(&mut self, position: IVec2) -> Option<&mut Cell> {
        let index = self.guard_index(position)?;
        let guard = &mut self.guards[index];
        let cell = guard.index(position);
        guard.cells.get_mut(cell)
    }
}
