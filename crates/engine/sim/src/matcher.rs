//! Geometric pattern matching

use glam::IVec2;
use script::{AtomId, AtomType, MatchSymbol, Rule, WorldDefinition};

use crate::error::{Error, Result};
use crate::grid::GridView;
use crate::symmetry::Orientation;

/// Whether `candidate` satisfies a set symbol of `owner`
///
/// A leading `~` negates; an undefined negated set always passes.
pub fn symbol_accepts(world: &WorldDefinition, owner: &AtomType, symbol: &str, candidate: AtomId) -> bool {
    match symbol.strip_prefix('~') {
        Some(set) => world.not_in_set(owner, set, candidate),
        None => world.in_set(owner, symbol, candidate),
    }
}

/// Check the rule box around `target` against the rule's match pattern
///
/// Rules without a pattern always match. Stops at the first mismatch.
pub fn matches<G: GridView + ?Sized>(
    world: &WorldDefinition,
    owner: &AtomType,
    rule: &Rule,
    grid: &G,
    target: IVec2,
    orientation: Orientation,
) -> Result<bool> {
    if rule.pattern.is_none() {
        return Ok(true);
    }
    let origin = orientation.box_origin(rule, target);

    for row in 0..rule.height as usize {
        for col in 0..rule.width as usize {
            let (pattern_col, pattern_row) = orientation.pattern_coord(rule, col, row);
            let Some(symbol) = rule.match_symbol(pattern_col, pattern_row) else {
                continue;
            };
            let position = origin + IVec2::new(col as i32, row as i32);

            if !grid.in_bounds(position) {
                if *symbol == MatchSymbol::Outside {
                    continue;
                }
                return Ok(false);
            }

            let atom = match symbol {
                MatchSymbol::Any | MatchSymbol::Inside => continue,
                MatchSymbol::Outside => return Ok(false),
                _ => grid.cell(position).ok_or(Error::Unlocked(position))?.atom,
            };
            let ok = match symbol {
                MatchSymbol::Empty => atom == world.empty(),
                MatchSymbol::NonEmpty => atom != world.empty(),
                MatchSymbol::NotIn(set) => world.not_in_set(owner, set, atom),
                MatchSymbol::In(set) => world.in_set(owner, set, atom),
                MatchSymbol::Any | MatchSymbol::Inside | MatchSymbol::Outside => true,
            };
            if !ok {
                return Ok(false);
            }
        }
    }
    Ok(true)
}
