//! Input-side operations: material selection, brush placement, clearing

use glam::IVec2;
use rand::Rng;
use script::{AtomId, WorldDefinition};

use crate::error::Result;
use crate::simulation::Simulation;

/// Brush edge length when the type has no `size` constant
pub const DEFAULT_BRUSH_SIZE: i32 = 5;
/// Placement cool-down when the type has no `dragCD` constant
pub const DEFAULT_DRAG_COOLDOWN: u32 = 5;

/// Currently selected material
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    selected: AtomId,
}

impl Placement {
    /// Starts with the designated empty type selected
    pub fn new(world: &WorldDefinition) -> Self {
        Self {
            selected: world.empty(),
        }
    }

    pub fn selected(&self) -> AtomId {
        self.selected
    }

    /// Select the type bound to placement key `key`
    ///
    /// Unknown keys leave the selection unchanged.
    pub fn select_type(&mut self, world: &WorldDefinition, key: char) -> Option<AtomId> {
        let atom = world.atom_by_key(key)?;
        tracing::debug!("Selected {} via key '{}'", atom.name, key);
        self.selected = atom.id;
        Some(atom.id)
    }

    pub fn select(&mut self, atom: AtomId) {
        self.selected = atom;
    }

    /// Ticks to wait between placements while dragging
    pub fn drag_cooldown(&self, world: &WorldDefinition) -> u32 {
        world
            .atom(self.selected)
            .constant("dragCD")
            .map(|v| v.max(0.0) as u32)
            .unwrap_or(DEFAULT_DRAG_COOLDOWN)
    }
}

impl Simulation {
    /// Fill the empty cells of the `size` x `size` box centered on `at` with
    /// `atom`, where `size` is the type's `size` constant
    ///
    /// Returns the number of cells placed.
    pub fn place<R: Rng + ?Sized>(&self, at: IVec2, atom: AtomId, rng: &mut R) -> Result<usize> {
        let world = self.world();
        let size = world
            .atom(atom)
            .constant("size")
            .map(|v| (v as i32).max(1))
            .unwrap_or(DEFAULT_BRUSH_SIZE);
        let min = at - IVec2::splat(size / 2);
        let max = min + IVec2::splat(size - 1);

        let empty = world.empty();
        let placed = self.change_rect(min, max, atom, rng, |cell| cell.atom == empty)?;
        tracing::debug!("Placed {} x {} at {}", placed, world.atom(atom).name, at);
        Ok(placed)
    }

    /// Reset every cell to the empty type
    pub fn clear_all<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<()> {
        let empty = self.world().empty();
        let cleared = self.change_rect(IVec2::ZERO, self.size() - IVec2::ONE, empty, rng, |_| true)?;
        tracing::debug!("Cleared {} cells", cleared);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    const WORLD: &str = r#"
atom Empty {
}
atom Sand {
    section property {
        def key s
        cdef size 3
        cdef dragCD 2
    }
}
atom Stone {
    section property {
        def key t
        def hardness 9
    }
}
"#;

    fn sim(width: u32, height: u32) -> Simulation {
        let world = Arc::new(script::compile(WORLD).unwrap());
        Simulation::new(world, SimConfig::default().with_size(width, height)).unwrap()
    }

    #[test]
    fn test_place_fills_only_empty_cells() {
        let sim = sim(10, 10);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(sim.place(IVec2::new(5, 5), 2, &mut rng).unwrap(), 25);
        assert_eq!(sim.cell(IVec2::new(5, 5)).unwrap().property("hardness"), Some(9.0));

        // Sand size 3: the 3x3 box around (5,5) is already Stone
        assert_eq!(sim.place(IVec2::new(5, 5), 1, &mut rng).unwrap(), 0);
        // the left column of this box is Stone
        let placed = sim.place(IVec2::new(8, 5), 1, &mut rng).unwrap();
        assert_eq!(placed, 6);
        assert_eq!(sim.cell(IVec2::new(7, 5)).unwrap().atom, 2);
        assert_eq!(sim.cell(IVec2::new(8, 5)).unwrap().atom, 1);
        assert_eq!(sim.cell(IVec2::new(9, 6)).unwrap().atom, 1);
    }

    #[test]
    fn test_place_clips_at_edges() {
        let sim = sim(4, 4);
        let mut rng = StdRng::seed_from_u64(2);
        assert_eq!(sim.place(IVec2::ZERO, 1, &mut rng).unwrap(), 4);
        assert_eq!(sim.snapshot().population(), vec![12, 4]);
    }

    #[test]
    fn test_clear_all() {
        let sim = sim(6, 6);
        let mut rng = StdRng::seed_from_u64(3);
        sim.place(IVec2::new(3, 3), 2, &mut rng).unwrap();
        sim.clear_all(&mut rng).unwrap();
        assert_eq!(sim.snapshot().population(), vec![36]);
        assert_eq!(sim.cell(IVec2::new(3, 3)).unwrap().property("hardness"), None);
    }

    #[test]
    fn test_select_type_and_cooldown() {
        let world = script::compile(WORLD).unwrap();
        let mut placement = Placement::new(&world);
        assert_eq!(placement.selected(), 0);
        assert_eq!(placement.drag_cooldown(&world), DEFAULT_DRAG_COOLDOWN);

        assert_eq!(placement.select_type(&world, 's'), Some(1));
        assert_eq!(placement.drag_cooldown(&world), 2);

        assert_eq!(placement.select_type(&world, 'q'), None);
        assert_eq!(placement.selected(), 1);

        assert_eq!(placement.select_type(&world, 't'), Some(2));
        assert_eq!(placement.drag_cooldown(&world), DEFAULT_DRAG_COOLDOWN);
    }
}
