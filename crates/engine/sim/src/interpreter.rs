//! Rule interpreter
//!
//! One [`Interpreter::tick`] processes a single target cell: the always-rules
//! pass, then one draw between the normal rules and the extension behaviors.
//! The interpreter only sees the grid through [`GridViewMut`], so it runs the
//! same against a locked [`Region`](crate::grid::Region) or a [`Snapshot`].
//!
//! [`Snapshot`]: crate::snapshot::Snapshot

use std::collections::HashMap;

use glam::IVec2;
use rand::seq::SliceRandom;
use rand::Rng;
use script::{
    is_truthy, AtomId, AtomType, CompiledExpr, EffectSymbol, Lookup, Rule, Step, VarSource,
    WorldDefinition,
};

use crate::error::{Error, Result};
use crate::extension;
use crate::grid::{Cell, GridView, GridViewMut};
use crate::matcher;
use crate::symmetry::Orientation;

/// Result of one tick on one target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// Rules and extensions that applied
    pub applied: u32,
    /// Grid-space shift recorded by the last applied rule carrying one
    pub shift: Option<IVec2>,
}

impl TickOutcome {
    fn record(&mut self, shift: Option<IVec2>) {
        self.applied += 1;
        if shift.is_some() {
            self.shift = shift;
        }
    }
}

enum Attempt {
    Skipped,
    NotMatched,
    Applied(Option<IVec2>),
}

/// Property reads for one rule attempt, relative to its anchor
pub(crate) struct CellLookup<'a, G: ?Sized> {
    pub world: &'a WorldDefinition,
    pub grid: &'a G,
    pub anchor: IVec2,
    pub orientation: Orientation,
}

impl<G: GridView + ?Sized> VarSource for CellLookup<'_, G> {
    fn lookup(&self, name: &str, offset: IVec2) -> Lookup {
        let position = self.anchor + self.orientation.apply(offset);
        if !self.grid.in_bounds(position) {
            return Lookup::OutOfGrid;
        }
        let Some(cell) = self.grid.cell(position) else {
            return Lookup::Inaccessible;
        };
        match self.world.resolve_property(&cell.props, cell.atom, name) {
            Some(value) => Lookup::Value(value as f64),
            None => Lookup::Missing,
        }
    }
}

pub struct Interpreter<'w> {
    world: &'w WorldDefinition,
}

impl<'w> Interpreter<'w> {
    pub fn new(world: &'w WorldDefinition) -> Self {
        Self { world }
    }

    pub fn world(&self) -> &'w WorldDefinition {
        self.world
    }

    /// Run the rules of the atom at `target`
    pub fn tick<G, R>(&self, grid: &mut G, target: IVec2, rng: &mut R) -> Result<TickOutcome>
    where
        G: GridViewMut + ?Sized,
        R: Rng + ?Sized,
    {
        let mut outcome = TickOutcome::default();
        if !grid.in_bounds(target) {
            return Ok(outcome);
        }
        let atom = self
            .world
            .atom(grid.cell(target).ok_or(Error::Unlocked(target))?.atom);

        let mut order: Vec<usize> = (0..atom.always_rules.len()).collect();
        order.shuffle(rng);
        for index in order {
            if let Attempt::Applied(shift) =
                self.attempt(grid, atom, &atom.always_rules[index], target, rng)?
            {
                outcome.record(shift);
            }
        }

        let pool = atom.rules.len() + atom.extensions.len();
        if pool == 0 {
            return Ok(outcome);
        }

        if rng.random_range(0..pool) < atom.rules.len() {
            let mut order: Vec<usize> = (0..atom.rules.len()).collect();
            order.shuffle(rng);
            for index in order {
                let rule = &atom.rules[index];
                match self.attempt(grid, atom, rule, target, rng)? {
                    Attempt::Applied(shift) => {
                        outcome.record(shift);
                        if !rule.non_break {
                            break;
                        }
                    }
                    Attempt::Skipped | Attempt::NotMatched => {}
                }
            }
        } else {
            let ext = &atom.extensions[rng.random_range(0..atom.extensions.len())];
            if extension::run(self.world, atom, ext, grid, target, rng)? {
                outcome.record(None);
            }
        }

        Ok(outcome)
    }

    fn attempt<G, R>(
        &self,
        grid: &mut G,
        atom: &AtomType,
        rule: &Rule,
        target: IVec2,
        rng: &mut R,
    ) -> Result<Attempt>
    where
        G: GridViewMut + ?Sized,
        R: Rng + ?Sized,
    {
        if !rng.random_bool(rule.probability) {
            return Ok(Attempt::Skipped);
        }
        let orientation = Orientation::random(rule.symmetry, rng);
        if !self.apply_rule(grid, atom, rule, target, orientation, rng)? {
            return Ok(Attempt::NotMatched);
        }
        Ok(Attempt::Applied(rule.shift.map(|shift| orientation.apply(shift))))
    }

    /// Match, check conditions and run the steps of `rule` in a fixed orientation
    ///
    /// Returns whether the rule applied. The probability gate is not consulted.
    pub fn apply_rule<G, R>(
        &self,
        grid: &mut G,
        atom: &AtomType,
        rule: &Rule,
        target: IVec2,
        orientation: Orientation,
        rng: &mut R,
    ) -> Result<bool>
    where
        G: GridViewMut + ?Sized,
        R: Rng + ?Sized,
    {
        if !matcher::matches(self.world, atom, rule, &*grid, target, orientation)? {
            return Ok(false);
        }
        for condition in &rule.conditions {
            match self.evaluate(&*grid, condition, target, orientation, rng)? {
                Some(value) if is_truthy(value) => {}
                _ => return Ok(false),
            }
        }
        self.run_steps(grid, rule, target, orientation, rng)?;
        Ok(true)
    }

    fn evaluate<G, R>(
        &self,
        grid: &G,
        expr: &CompiledExpr,
        anchor: IVec2,
        orientation: Orientation,
        rng: &mut R,
    ) -> Result<Option<f64>>
    where
        G: GridView + ?Sized,
        R: Rng + ?Sized,
    {
        let lookup = CellLookup {
            world: self.world,
            grid,
            anchor,
            orientation,
        };
        Ok(expr.eval(&lookup, rng)?)
    }

    fn run_steps<G, R>(
        &self,
        grid: &mut G,
        rule: &Rule,
        target: IVec2,
        orientation: Orientation,
        rng: &mut R,
    ) -> Result<()>
    where
        G: GridViewMut + ?Sized,
        R: Rng + ?Sized,
    {
        let mut bound: HashMap<&str, Cell> = HashMap::new();

        for step in &rule.steps {
            match step {
                Step::Bind { symbol, source } => {
                    let position = target + orientation.apply(*source);
                    if grid.in_bounds(position) {
                        let cell = grid.cell(position).ok_or(Error::Unlocked(position))?;
                        bound.insert(symbol.as_str(), cell.clone());
                    }
                }
                Step::MapPattern => {
                    self.map_pattern(grid, rule, target, orientation, &bound, rng)?;
                }
                Step::Set {
                    property,
                    target: offset,
                    value,
                } => {
                    if let Some(v) = self.evaluate(&*grid, value, target, orientation, rng)? {
                        let position = target + orientation.apply(*offset);
                        self.update_property(grid, position, property, |_| Some(v as f32))?;
                    }
                }
                Step::Increment {
                    property,
                    target: offset,
                    amount,
                } => {
                    if let Some(v) = self.evaluate(&*grid, amount, target, orientation, rng)? {
                        let position = target + orientation.apply(*offset);
                        self.update_property(grid, position, property, |current| {
                            Some(current + v as f32)
                        })?;
                    }
                }
                Step::ClampMin {
                    property,
                    target: offset,
                    bound: limit,
                } => {
                    if let Some(v) = self.evaluate(&*grid, limit, target, orientation, rng)? {
                        let limit = v as f32;
                        let position = target + orientation.apply(*offset);
                        self.update_property(grid, position, property, |current| {
                            (current < limit).then_some(limit)
                        })?;
                    }
                }
                Step::ClampMax {
                    property,
                    target: offset,
                    bound: limit,
                } => {
                    if let Some(v) = self.evaluate(&*grid, limit, target, orientation, rng)? {
                        let limit = v as f32;
                        let position = target + orientation.apply(*offset);
                        self.update_property(grid, position, property, |current| {
                            (current > limit).then_some(limit)
                        })?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Rewrite one live property; `update` gets the resolved current value
    /// (0 when unset anywhere) and returns the value to store, if any
    fn update_property<G, F>(&self, grid: &mut G, position: IVec2, property: &str, update: F) -> Result<()>
    where
        G: GridViewMut + ?Sized,
        F: FnOnce(f32) -> Option<f32>,
    {
        if !grid.in_bounds(position) {
            return Ok(());
        }
        let cell = grid.cell_mut(position).ok_or(Error::Unlocked(position))?;
        let current = self
            .world
            .resolve_property(&cell.props, cell.atom, property)
            .unwrap_or(0.0);
        if let Some(next) = update(current) {
            cell.props.insert(property.to_string(), next);
        }
        Ok(())
    }

    fn map_pattern<G, R>(
        &self,
        grid: &mut G,
        rule: &Rule,
        target: IVec2,
        orientation: Orientation,
        bound: &HashMap<&str, Cell>,
        rng: &mut R,
    ) -> Result<()>
    where
        G: GridViewMut + ?Sized,
        R: Rng + ?Sized,
    {
        let anchor = grid.cell(target).ok_or(Error::Unlocked(target))?.clone();
        let origin = orientation.box_origin(rule, target);

        for row in 0..rule.height as usize {
            for col in 0..rule.width as usize {
                let (pattern_col, pattern_row) = orientation.pattern_coord(rule, col, row);
                let Some(symbol) = rule.effect_symbol(pattern_col, pattern_row) else {
                    continue;
                };
                let position = origin + IVec2::new(col as i32, row as i32);
                if !grid.in_bounds(position) {
                    continue;
                }

                match symbol {
                    EffectSymbol::Keep => {}
                    EffectSymbol::Anchor => {
                        *grid.cell_mut(position).ok_or(Error::Unlocked(position))? = anchor.clone();
                    }
                    EffectSymbol::Empty => {
                        self.change_type(grid, position, self.world.empty(), rng)?;
                    }
                    EffectSymbol::Place(name) => {
                        if let Some(cell) = bound.get(name.as_str()) {
                            *grid.cell_mut(position).ok_or(Error::Unlocked(position))? = cell.clone();
                        } else if let Some(atom) = self.world.placeable(name) {
                            self.change_type(grid, position, atom, rng)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Turn the cell at `position` into `atom`: fresh default properties, then
    /// the type's init steps
    pub fn change_type<G, R>(&self, grid: &mut G, position: IVec2, atom: AtomId, rng: &mut R) -> Result<()>
    where
        G: GridViewMut + ?Sized,
        R: Rng + ?Sized,
    {
        let kind = self.world.atom(atom);
        let cell = grid.cell_mut(position).ok_or(Error::Unlocked(position))?;
        cell.atom = atom;
        cell.props.clone_from(&kind.properties);

        for step in &kind.init {
            if let Step::Set {
                property, value, ..
            } = step
            {
                if let Some(v) = self.evaluate(&*grid, value, position, Orientation::IDENTITY, rng)? {
                    if let Some(cell) = grid.cell_mut(position) {
                        cell.props.insert(property.clone(), v as f32);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Snapshot;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn grid_of(world: &WorldDefinition, width: i32, height: i32) -> Snapshot {
        let mut grid = Snapshot::new(IVec2::new(width, height));
        let empty = world.empty();
        for y in 0..height {
            for x in 0..width {
                *grid.cell_mut(IVec2::new(x, y)).unwrap() =
                    Cell::new(empty, world.atom(empty).properties.clone());
            }
        }
        grid
    }

    fn place(world: &WorldDefinition, grid: &mut Snapshot, at: IVec2, name: &str) {
        let id = world.atom_by_name(name).unwrap().id;
        let mut rng = StdRng::seed_from_u64(0);
        Interpreter::new(world)
            .change_type(grid, at, id, &mut rng)
            .unwrap();
    }

    fn prop(grid: &Snapshot, at: IVec2, name: &str) -> Option<f32> {
        grid.cell(at).and_then(|c| c.property(name))
    }

    #[test]
    fn test_sand_falls_one_cell() {
        let world = script::compile(
            "atom Empty {\n}\natom Sand {\n section update {\n match (0, 0, 1, 2) {\n pattern\n x\n _\n }\n -> {\n pattern\n _\n x\n }\n }\n}",
        )
        .unwrap();
        let mut grid = grid_of(&world, 1, 3);
        place(&world, &mut grid, IVec2::ZERO, "Sand");
        let mut rng = StdRng::seed_from_u64(3);
        let interpreter = Interpreter::new(&world);

        let outcome = interpreter.tick(&mut grid, IVec2::ZERO, &mut rng).unwrap();
        assert_eq!(outcome.applied, 1);
        assert_eq!(grid.atom_at(IVec2::new(0, 0)), Some(0));
        assert_eq!(grid.atom_at(IVec2::new(0, 1)), Some(1));

        interpreter.tick(&mut grid, IVec2::new(0, 1), &mut rng).unwrap();
        // resting on the bottom edge: the pattern needs an in-grid cell below
        let outcome = interpreter.tick(&mut grid, IVec2::new(0, 2), &mut rng).unwrap();
        assert_eq!(outcome.applied, 0);
        assert_eq!(grid.atom_at(IVec2::new(0, 2)), Some(1));
    }

    const MOVER: &str = r#"
atom Empty {
}
atom Mover {
    section property {
        def heat 0
    }
    section update {
        match (0, 0, 2, 1) sym(x) {
            pattern
            x _
        }
        -> {
            set [heat - 1, 0] = 7
            pattern
            _ x
        }
    }
}
"#;

    #[test]
    fn test_mirrored_attempt_is_consistent() {
        let world = script::compile(MOVER).unwrap();
        let interpreter = Interpreter::new(&world);
        let mover = world.atom(1);
        let rule = &mover.rules[0];
        let mut rng = StdRng::seed_from_u64(1);

        let mut grid = grid_of(&world, 3, 1);
        place(&world, &mut grid, IVec2::new(1, 0), "Mover");
        assert!(interpreter
            .apply_rule(&mut grid, mover, rule, IVec2::new(1, 0), Orientation::IDENTITY, &mut rng)
            .unwrap());
        // the set lands on the right neighbor, then the mover steps onto it
        assert_eq!(grid.atom_at(IVec2::new(2, 0)), Some(1));
        assert_eq!(prop(&grid, IVec2::new(2, 0), "heat"), Some(0.0));
        assert_eq!(grid.atom_at(IVec2::new(1, 0)), Some(0));

        let mut grid = grid_of(&world, 3, 1);
        place(&world, &mut grid, IVec2::new(1, 0), "Mover");
        let mirrored = Orientation {
            flip_x: true,
            flip_y: false,
        };
        assert!(interpreter
            .apply_rule(&mut grid, mover, rule, IVec2::new(1, 0), mirrored, &mut rng)
            .unwrap());
        assert_eq!(grid.atom_at(IVec2::new(0, 0)), Some(1));
        assert_eq!(grid.atom_at(IVec2::new(1, 0)), Some(0));
        assert_eq!(grid.atom_at(IVec2::new(2, 0)), Some(0));
    }

    #[test]
    fn test_mirrored_set_writes_opposite_side() {
        let world = script::compile(
            "atom Empty {\n}\natom Heater {\n section update {\n match (0, 0, 2, 1) sym(x) {\n }\n -> {\n set [heat - 1, 0] = 5\n }\n }\n}",
        )
        .unwrap();
        let interpreter = Interpreter::new(&world);
        let heater = world.atom(1);
        let mut rng = StdRng::seed_from_u64(2);
        let mut grid = grid_of(&world, 3, 1);
        place(&world, &mut grid, IVec2::new(1, 0), "Heater");

        let mirrored = Orientation {
            flip_x: true,
            flip_y: false,
        };
        interpreter
            .apply_rule(&mut grid, heater, &heater.rules[0], IVec2::new(1, 0), mirrored, &mut rng)
            .unwrap();
        assert_eq!(prop(&grid, IVec2::new(0, 0), "heat"), Some(5.0));
        assert_eq!(prop(&grid, IVec2::new(2, 0), "heat"), None);
    }

    #[test]
    fn test_probability_bounds() {
        let world = script::compile(
            "atom Empty {\n}\natom A {\n section update {\n match (0, 0, 1, 1) {\n }\n -> P-0 {\n inc [never] by 1\n non-break\n }\n match (0, 0, 1, 1) {\n }\n -> P-1 {\n inc [always] by 1\n non-break\n }\n }\n}",
        )
        .unwrap();
        let interpreter = Interpreter::new(&world);
        let mut rng = StdRng::seed_from_u64(4);
        let mut grid = grid_of(&world, 1, 1);
        place(&world, &mut grid, IVec2::ZERO, "A");

        for _ in 0..50 {
            interpreter.tick(&mut grid, IVec2::ZERO, &mut rng).unwrap();
        }
        assert_eq!(prop(&grid, IVec2::ZERO, "never"), None);
        assert_eq!(prop(&grid, IVec2::ZERO, "always"), Some(50.0));
    }

    #[test]
    fn test_clamp_bounds() {
        let world = script::compile(
            "atom Empty {\n}\natom Hot {\n section property {\n def heat 0\n }\n section update {\n match (0, 0, 1, 1) {\n }\n -> {\n clamp [heat] in 0, 100\n }\n }\n}",
        )
        .unwrap();
        let interpreter = Interpreter::new(&world);
        let hot = world.atom(1);
        let mut rng = StdRng::seed_from_u64(5);
        let mut grid = grid_of(&world, 1, 1);
        place(&world, &mut grid, IVec2::ZERO, "Hot");

        for (start, expected) in [(150.0, 100.0), (-5.0, 0.0), (42.0, 42.0)] {
            grid.cell_mut(IVec2::ZERO)
                .unwrap()
                .props
                .insert("heat".into(), start);
            interpreter
                .apply_rule(&mut grid, hot, &hot.rules[0], IVec2::ZERO, Orientation::IDENTITY, &mut rng)
                .unwrap();
            assert_eq!(prop(&grid, IVec2::ZERO, "heat"), Some(expected));
        }
    }

    fn break_world(first: &str, non_break: bool) -> WorldDefinition {
        let flag = if non_break { "non-break" } else { "" };
        script::compile(&format!(
            "atom Empty {{\n}}\natom A {{\n section update {{\n match (0, 0, 1, 1) {{\n {first}\n }}\n -> {{\n inc [first] by 1\n {flag}\n }}\n match (0, 0, 1, 1) {{\n }}\n -> {{\n inc [second] by 1\n }}\n }}\n}}"
        ))
        .unwrap()
    }

    fn run_ticks(world: &WorldDefinition, ticks: usize, seed: u64) -> (Option<f32>, Option<f32>) {
        let interpreter = Interpreter::new(world);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut grid = grid_of(world, 1, 1);
        place(world, &mut grid, IVec2::ZERO, "A");
        for _ in 0..ticks {
            interpreter.tick(&mut grid, IVec2::ZERO, &mut rng).unwrap();
        }
        (prop(&grid, IVec2::ZERO, "first"), prop(&grid, IVec2::ZERO, "second"))
    }

    #[test]
    fn test_failed_rule_does_not_stop_loop() {
        // the first rule never passes its condition
        let world = break_world("eval 0", false);
        assert_eq!(run_ticks(&world, 200, 11), (None, Some(200.0)));
    }

    #[test]
    fn test_applied_rule_stops_loop() {
        let world = break_world("", false);
        let interpreter = Interpreter::new(&world);
        let mut rng = StdRng::seed_from_u64(6);
        let mut grid = grid_of(&world, 1, 1);
        place(&world, &mut grid, IVec2::ZERO, "A");

        for _ in 0..40 {
            let outcome = interpreter.tick(&mut grid, IVec2::ZERO, &mut rng).unwrap();
            assert_eq!(outcome.applied, 1);
        }
        let first = prop(&grid, IVec2::ZERO, "first").unwrap_or(0.0);
        let second = prop(&grid, IVec2::ZERO, "second").unwrap_or(0.0);
        assert_eq!(first + second, 40.0);
        assert!(first > 0.0 && second > 0.0, "first = {first}, second = {second}");
    }

    #[test]
    fn test_non_break_continues_after_applying() {
        let world = break_world("", true);
        let (first, second) = run_ticks(&world, 40, 6);
        // second always runs: either it comes first, or first lets the loop go on
        assert_eq!(second, Some(40.0));
        let first = first.unwrap_or(0.0);
        assert!(first > 0.0 && first < 40.0, "first = {first}");
    }

    #[test]
    fn test_always_rules_run_before_selection() {
        let world = script::compile(
            "atom Empty {\n}\natom A {\n section update {\n match (0, 0, 1, 1) {\n }\n -> {\n inc [a] by 1\n always-run\n }\n match (0, 0, 1, 1) {\n }\n -> {\n inc [b] by 1\n always-run\n }\n match (0, 0, 1, 1) {\n }\n -> {\n inc [c] by 1\n }\n }\n}",
        )
        .unwrap();
        let interpreter = Interpreter::new(&world);
        let mut rng = StdRng::seed_from_u64(7);
        let mut grid = grid_of(&world, 1, 1);
        place(&world, &mut grid, IVec2::ZERO, "A");

        let outcome = interpreter.tick(&mut grid, IVec2::ZERO, &mut rng).unwrap();
        assert_eq!(outcome.applied, 3);
        for name in ["a", "b", "c"] {
            assert_eq!(prop(&grid, IVec2::ZERO, name), Some(1.0));
        }
    }

    #[test]
    fn test_bind_moves_full_state() {
        let world = script::compile(
            r#"
atom Empty {
}
atom Water {
    section property {
        def temp 0
    }
}
atom Sand {
    section definition {
        def liquid {Water}
    }
    section update {
        match (0, 0, 1, 2) {
            pattern
            x
            liquid
        }
        -> {
            def w = (0, 1)
            pattern
            w
            x
        }
    }
}
"#,
        )
        .unwrap();
        let interpreter = Interpreter::new(&world);
        let sand = world.atom(2);
        let mut rng = StdRng::seed_from_u64(8);
        let mut grid = grid_of(&world, 1, 2);
        place(&world, &mut grid, IVec2::ZERO, "Sand");
        place(&world, &mut grid, IVec2::new(0, 1), "Water");
        grid.cell_mut(IVec2::new(0, 1))
            .unwrap()
            .props
            .insert("temp".into(), 33.0);

        assert!(interpreter
            .apply_rule(&mut grid, sand, &sand.rules[0], IVec2::ZERO, Orientation::IDENTITY, &mut rng)
            .unwrap());
        assert_eq!(grid.atom_at(IVec2::ZERO), Some(1));
        assert_eq!(prop(&grid, IVec2::ZERO, "temp"), Some(33.0));
        assert_eq!(grid.atom_at(IVec2::new(0, 1)), Some(2));
    }

    #[test]
    fn test_change_type_resets_and_runs_init() {
        let world = script::compile(
            "atom Empty {\n}\natom Fire {\n section property {\n def heat 1\n def life 0\n }\n section init {\n set [life] = [heat] + 9\n }\n}",
        )
        .unwrap();
        let mut grid = grid_of(&world, 1, 1);
        grid.cell_mut(IVec2::ZERO)
            .unwrap()
            .props
            .insert("stale".into(), 1.0);
        place(&world, &mut grid, IVec2::ZERO, "Fire");

        let cell = grid.cell(IVec2::ZERO).unwrap();
        assert_eq!(cell.atom, 1);
        assert_eq!(cell.property("stale"), None);
        assert_eq!(cell.property("heat"), Some(1.0));
        assert_eq!(cell.property("life"), Some(10.0));
    }

    #[test]
    fn test_shift_is_recorded_in_grid_space() {
        let world = script::compile(
            "atom Empty {\n}\natom A {\n section update {\n match (0, 0, 1, 1) sym(x) {\n }\n -> {\n shift(1, 0)\n }\n }\n}",
        )
        .unwrap();
        let interpreter = Interpreter::new(&world);
        let mut rng = StdRng::seed_from_u64(9);
        let mut grid = grid_of(&world, 1, 1);
        place(&world, &mut grid, IVec2::ZERO, "A");

        let mut seen = Vec::new();
        for _ in 0..40 {
            let outcome = interpreter.tick(&mut grid, IVec2::ZERO, &mut rng).unwrap();
            seen.push(outcome.shift.unwrap());
        }
        assert!(seen.contains(&IVec2::new(1, 0)));
        assert!(seen.contains(&IVec2::new(-1, 0)));
    }

    #[test]
    fn test_out_of_grid_reads_fail_quietly() {
        let world = script::compile(
            "atom Empty {\n}\natom A {\n section update {\n match (0, 0, 1, 2) {\n eval [t - 0, 1] >= 0\n }\n -> {\n inc [hits] by 1\n }\n }\n}",
        )
        .unwrap();
        let interpreter = Interpreter::new(&world);
        let atom = world.atom(1);
        let mut rng = StdRng::seed_from_u64(10);
        let mut grid = grid_of(&world, 1, 1);
        place(&world, &mut grid, IVec2::ZERO, "A");

        let applied = interpreter
            .apply_rule(&mut grid, atom, &atom.rules[0], IVec2::ZERO, Orientation::IDENTITY, &mut rng)
            .unwrap();
        assert!(!applied);
    }

    #[test]
    fn test_missing_property_is_an_error() {
        let world = script::compile(
            "atom Empty {\n}\natom A {\n section update {\n match (0, 0, 1, 1) {\n eval [nowhere] > 0\n }\n -> {\n }\n }\n}",
        )
        .unwrap();
        let interpreter = Interpreter::new(&world);
        let atom = world.atom(1);
        let mut rng = StdRng::seed_from_u64(11);
        let mut grid = grid_of(&world, 1, 1);
        place(&world, &mut grid, IVec2::ZERO, "A");

        let result = interpreter.apply_rule(
            &mut grid,
            atom,
            &atom.rules[0],
            IVec2::ZERO,
            Orientation::IDENTITY,
            &mut rng,
        );
        assert!(matches!(result, Err(Error::Eval(_))));
    }
}
