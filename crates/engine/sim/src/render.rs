//! Render queries against a snapshot

use glam::IVec2;
use rand::Rng;
use script::{AtomColor, Color, CompiledExpr, WorldDefinition};

use crate::error::Result;
use crate::grid::GridView;
use crate::interpreter::CellLookup;
use crate::snapshot::Snapshot;
use crate::symmetry::Orientation;

/// What the renderer needs to know about each snapshot cell
pub struct RenderView<'a> {
    world: &'a WorldDefinition,
    snapshot: &'a Snapshot,
}

impl<'a> RenderView<'a> {
    pub fn new(world: &'a WorldDefinition, snapshot: &'a Snapshot) -> Self {
        Self { world, snapshot }
    }

    /// Only types with constant `render` equal to 1 are drawn
    pub fn should_draw(&self, position: IVec2) -> bool {
        self.snapshot
            .cell(position)
            .is_some_and(|cell| self.world.atom(cell.atom).constant("render") == Some(1.0))
    }

    /// Fixed color, or the first dynamic color rule whose condition holds;
    /// black when none does
    pub fn resolve_color<R: Rng + ?Sized>(&self, position: IVec2, rng: &mut R) -> Result<Color> {
        let Some(cell) = self.snapshot.cell(position) else {
            return Ok(Color::BLACK);
        };
        let atom = self.world.atom(cell.atom);
        if let AtomColor::Fixed(color) = atom.color {
            return Ok(color);
        }

        let lookup = CellLookup {
            world: self.world,
            grid: self.snapshot,
            anchor: position,
            orientation: Orientation::IDENTITY,
        };
        for rule in &atom.color_rules {
            let holds = rule
                .condition
                .eval(&lookup, rng)?
                .is_some_and(script::is_truthy);
            if holds {
                return Ok(Color::new(
                    channel(&rule.r, &lookup, rng)?,
                    channel(&rule.g, &lookup, rng)?,
                    channel(&rule.b, &lookup, rng)?,
                ));
            }
        }
        Ok(Color::BLACK)
    }
}

fn channel<R: Rng + ?Sized>(
    expr: &CompiledExpr,
    lookup: &CellLookup<'_, Snapshot>,
    rng: &mut R,
) -> Result<u8> {
    Ok(expr
        .eval(lookup, rng)?
        .map_or(0, |v| v.clamp(0.0, 255.0) as u8))
}
