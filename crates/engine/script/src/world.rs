//! The compiled, immutable world definition

use std::collections::HashMap;

use crate::atom::{AtomId, AtomType, Color, ColorRange, SetMember};
use crate::error::{Error, Result};
use crate::rule::{Rule, RuleId};

/// Name of the atom used as the empty cell, when declared
pub const EMPTY_ATOM_NAME: &str = "Empty";

/// Every atom type plus the global tables a simulation needs
#[derive(Debug, Clone)]
pub struct WorldDefinition {
    atoms: Vec<AtomType>,
    by_name: HashMap<String, AtomId>,
    by_alias: HashMap<String, AtomId>,
    by_key: HashMap<char, AtomId>,
    defaults: HashMap<String, f32>,
    preload: Vec<ColorRange>,
    empty: AtomId,
}

/// Rule with the largest reach in a world
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReachReport<'a> {
    pub atom: &'a str,
    pub rule: RuleId,
    pub reach: u32,
}

impl WorldDefinition {
    /// Index the atoms and resolve set definitions
    pub(crate) fn build(
        atoms: Vec<AtomType>,
        defaults: HashMap<String, f32>,
        preload: Vec<ColorRange>,
    ) -> Result<Self> {
        if atoms.is_empty() {
            return Err(Error::NoAtoms);
        }

        let mut by_name = HashMap::new();
        let mut by_alias = HashMap::new();
        let mut by_key = HashMap::new();
        for atom in &atoms {
            by_name.insert(atom.name.clone(), atom.id);
            if let Some(alias) = &atom.alias {
                by_alias.entry(alias.clone()).or_insert(atom.id);
            }
            if let Some(key) = atom.key {
                by_key.insert(key, atom.id);
            }
        }
        let empty = by_name.get(EMPTY_ATOM_NAME).copied().unwrap_or(0);

        let mut world = Self {
            atoms,
            by_name,
            by_alias,
            by_key,
            defaults,
            preload,
            empty,
        };
        world.resolve_sets();
        Ok(world)
    }

    fn resolve_sets(&mut self) {
        let count = self.atoms.len();
        let mut resolved: Vec<HashMap<String, Vec<bool>>> = Vec::with_capacity(count);
        for atom in &self.atoms {
            let mut sets = HashMap::new();
            for (set, members) in &atom.definitions {
                let mut mask = vec![false; count];
                for member in members {
                    match member {
                        SetMember::Atom(name) => match self.by_name.get(name) {
                            Some(&id) => mask[id as usize] = true,
                            None => tracing::warn!(
                                atom = %atom.name,
                                set = %set,
                                member = %name,
                                "Set member is not a declared atom"
                            ),
                        },
                        SetMember::Alias(alias) => {
                            for other in &self.atoms {
                                if other.alias.as_deref() == Some(alias.as_str()) {
                                    mask[other.id as usize] = true;
                                }
                            }
                        }
                    }
                }
                sets.insert(set.clone(), mask);
            }
            resolved.push(sets);
        }
        for (atom, sets) in self.atoms.iter_mut().zip(resolved) {
            atom.resolved_sets = sets;
        }
    }

    pub fn atoms(&self) -> &[AtomType] {
        &self.atoms
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Atom by id
    ///
    /// # Panics
    /// If `id` was not produced by this world.
    pub fn atom(&self, id: AtomId) -> &AtomType {
        &self.atoms[id as usize]
    }

    pub fn get(&self, id: AtomId) -> Option<&AtomType> {
        self.atoms.get(id as usize)
    }

    pub fn atom_by_name(&self, name: &str) -> Option<&AtomType> {
        self.by_name.get(name).map(|&id| self.atom(id))
    }

    /// First atom declared with `alias`
    pub fn atom_by_alias(&self, alias: &str) -> Option<&AtomType> {
        self.by_alias.get(alias).map(|&id| self.atom(id))
    }

    pub fn atom_by_key(&self, key: char) -> Option<&AtomType> {
        self.by_key.get(&key).map(|&id| self.atom(id))
    }

    /// The designated empty atom
    pub fn empty(&self) -> AtomId {
        self.empty
    }

    pub fn default_value(&self, name: &str) -> Option<f32> {
        self.defaults.get(name).copied()
    }

    pub fn preload(&self) -> &[ColorRange] {
        &self.preload
    }

    /// Every preloaded color, for renderer cache warm-up
    pub fn preload_colors(&self) -> impl Iterator<Item = Color> + '_ {
        self.preload.iter().flat_map(ColorRange::colors)
    }

    /// Resolve a property through live value → type constant → global default
    pub fn resolve_property(
        &self,
        live: &HashMap<String, f32>,
        atom: AtomId,
        name: &str,
    ) -> Option<f32> {
        live.get(name)
            .copied()
            .or_else(|| self.get(atom).and_then(|a| a.constant(name)))
            .or_else(|| self.default_value(name))
    }

    /// Whether `candidate` satisfies pattern symbol `symbol` for `owner`
    ///
    /// A set defined on `owner` is checked by membership; otherwise the symbol
    /// names an alias category.
    pub fn in_set(&self, owner: &AtomType, symbol: &str, candidate: AtomId) -> bool {
        match owner.set_contains(symbol, candidate) {
            Some(member) => member,
            None => self
                .get(candidate)
                .and_then(|a| a.alias.as_deref())
                .is_some_and(|alias| alias == symbol),
        }
    }

    /// Negated membership; an undefined set never excludes
    pub fn not_in_set(&self, owner: &AtomType, set: &str, candidate: AtomId) -> bool {
        !owner.set_contains(set, candidate).unwrap_or(false)
    }

    /// Atom materialized by an effect symbol that is not a bound name
    pub fn placeable(&self, symbol: &str) -> Option<AtomId> {
        self.by_alias
            .get(symbol)
            .or_else(|| self.by_name.get(symbol))
            .copied()
    }

    /// Every rule of every atom with its owner
    pub fn rules(&self) -> impl Iterator<Item = (&AtomType, &Rule)> {
        self.atoms
            .iter()
            .flat_map(|atom| atom.all_rules().map(move |rule| (atom, rule)))
    }

    /// The rule reaching furthest from its anchor
    pub fn max_reach(&self) -> Option<ReachReport<'_>> {
        self.rules()
            .map(|(atom, rule)| ReachReport {
                atom: &atom.name,
                rule: rule.id,
                reach: rule.reach(),
            })
            .max_by_key(|report| report.reach)
    }

    pub fn rule_count(&self) -> usize {
        self.atoms
            .iter()
            .map(|a| a.rules.len() + a.always_rules.len())
            .sum()
    }
}
