//! Whole-grid copy handed to renderers and observers

use glam::IVec2;
use script::AtomId;

use crate::grid::{Cell, GridView, GridViewMut};

/// A consistent copy of the whole grid, read by the renderer
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    size: IVec2,
    cells: Vec<Cell>,
}

impl Snapshot {
    pub fn new(size: IVec2) -> Self {
        Self {
            size,
            cells: vec![Cell::default(); (size.x.max(0) * size.y.max(0)) as usize],
        }
    }

    fn index(&self, position: IVec2) -> Option<usize> {
        self.in_bounds(position)
            .then(|| (position.y * self.size.x + position.x) as usize)
    }

    pub fn atom_at(&self, position: IVec2) -> Option<AtomId> {
        self.cell(position).map(|cell| cell.atom)
    }

    /// Copy every cell of `source` into this snapshot, reusing allocations
    pub fn copy_from<G: GridView + ?Sized>(&mut self, source: &G) {
        let size = source.size();
        if size != self.size {
            *self = Self::new(size);
        }
        for y in 0..size.y {
            for x in 0..size.x {
                let position = IVec2::new(x, y);
                if let (Some(index), Some(cell)) = (self.index(position), source.cell(position)) {
                    self.cells[index].clone_from(cell);
                }
            }
        }
    }

    /// Count of cells per atom id
    pub fn population(&self) -> Vec<usize> {
        let mut counts = Vec::new();
        for cell in &self.cells {
            let id = cell.atom as usize;
            if counts.len() <= id {
                counts.resize(id + 1, 0);
            }
            counts[id] += 1;
        }
        counts
    }

    pub fn cells(&self) -> impl Iterator<Item = (IVec2, &Cell)> {
        let width = self.size.x.max(1);
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, cell)| (IVec2::new(i as i32 % width, i as i32 / width), cell))
    }
}

impl GridView for Snapshot {
    fn size(&self) -> IVec2 {
        self.size
    }

    fn cell(&self, position: IVec2) -> Option<&Cell> {
        self.cells.get(self.index(position)?)
    }
}

impl GridViewMut for Snapshot {
    fn cell_mut(&mut self, position: IVec2) -> Option<&mut Cell> {
        let index = self.index(position)?;
        self.cells.get_mut(index)
    }
}
