//! Built-in movement behaviors (`ext fall`, `ext sandLike`, `ext randomMove`)

use glam::IVec2;
use rand::Rng;
use script::{AtomType, Extension, ExtensionKind, WorldDefinition};

use crate::error::{Error, Result};
use crate::grid::GridViewMut;
use crate::matcher::symbol_accepts;

/// Run one extension for the cell at `target`
///
/// Swaps the full cell state with the chosen neighbor when that neighbor is
/// in the grid and accepted by the extension's `repl` set. Returns whether a
/// swap happened.
pub fn run<G, R>(
    world: &WorldDefinition,
    owner: &AtomType,
    ext: &Extension,
    grid: &mut G,
    target: IVec2,
    rng: &mut R,
) -> Result<bool>
where
    G: GridViewMut + ?Sized,
    R: Rng + ?Sized,
{
    if let Some(probability) = ext.probability {
        if !rng.random_bool(probability) {
            return Ok(false);
        }
    }

    let offset = match ext.kind {
        ExtensionKind::Fall => IVec2::Y,
        ExtensionKind::SandLike => {
            let dx = rng.random_range(-1..=1);
            if dx != 0 {
                // diagonal slides need something to slide off
                let below = target + IVec2::Y;
                if !grid.in_bounds(below)
                    || grid.cell(below).ok_or(Error::Unlocked(below))?.atom == world.empty()
                {
                    return Ok(false);
                }
            }
            IVec2::new(dx, 1)
        }
        ExtensionKind::RandomMove => loop {
            let direction = IVec2::new(rng.random_range(-1..=1), rng.random_range(-1..=1));
            if direction != IVec2::ZERO {
                break direction;
            }
        },
    };

    let neighbor = target + offset;
    if !grid.in_bounds(neighbor) {
        return Ok(false);
    }
    let atom = grid.cell(neighbor).ok_or(Error::Unlocked(neighbor))?.atom;
    if !symbol_accepts(world, owner, &ext.replace_set, atom) {
        return Ok(false);
    }
    swap(grid, target, neighbor)?;
    Ok(true)
}

fn swap<G: GridViewMut + ?Sized>(grid: &mut G, a: IVec2, b: IVec2) -> Result<()> {
    if grid.cell(a).is_none() {
        return Err(Error::Unlocked(a));
    }
    if grid.cell(b).is_none() {
        return Err(Error::Unlocked(b));
    }
    let first = std::mem::take(grid.cell_mut(a).ok_or(Error::Unlocked(a))?);
    let second = std::mem::replace(grid.cell_mut(b).ok_or(Error::Unlocked(b))?, first);
    *grid.cell_mut(a).ok_or(Error::Unlocked(a))? = second;
    Ok(())
}
