//! Atom types and their per-type data

use std::collections::{BTreeMap, HashMap};

use crate::expr::CompiledExpr;
use crate::rule::{Rule, Step};

/// Dense atom type id, assigned in declaration order
pub type AtomId = u16;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Self = Self::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// How an atom is colored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomColor {
    Fixed(Color),
    /// Resolved per cell from the atom's color rules
    Dynamic,
}

impl Default for AtomColor {
    fn default() -> Self {
        AtomColor::Fixed(Color::BLACK)
    }
}

/// `cond => r, g, b`
#[derive(Debug, Clone)]
pub struct ColorRule {
    pub condition: CompiledExpr,
    pub r: CompiledExpr,
    pub g: CompiledExpr,
    pub b: CompiledExpr,
}

/// Preloaded color or inclusive per-channel range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorRange {
    pub from: Color,
    pub to: Color,
}

impl ColorRange {
    /// Order endpoints per channel
    pub fn new(a: Color, b: Color) -> Self {
        Self {
            from: Color::new(a.r.min(b.r), a.g.min(b.g), a.b.min(b.b)),
            to: Color::new(a.r.max(b.r), a.g.max(b.g), a.b.max(b.b)),
        }
    }

    pub fn single(color: Color) -> Self {
        Self {
            from: color,
            to: color,
        }
    }

    /// Every color inside the range
    pub fn colors(&self) -> impl Iterator<Item = Color> + '_ {
        (self.from.r..=self.to.r).flat_map(move |r| {
            (self.from.g..=self.to.g)
                .flat_map(move |g| (self.from.b..=self.to.b).map(move |b| Color::new(r, g, b)))
        })
    }
}

/// Member of a symbolic set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetMember {
    Atom(String),
    /// `^Alias`: every atom with that alias
    Alias(String),
}

impl SetMember {
    pub fn parse(token: &str) -> Self {
        match token.strip_prefix('^') {
            Some(alias) => SetMember::Alias(alias.to_string()),
            None => SetMember::Atom(token.to_string()),
        }
    }
}

/// Built-in movement behaviors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionKind {
    /// Swap with the cell directly below
    Fall,
    /// Swap below or diagonally below
    SandLike,
    /// Swap with any of the 8 neighbors
    RandomMove,
}

impl ExtensionKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "fall" => Some(ExtensionKind::Fall),
            "sandLike" => Some(ExtensionKind::SandLike),
            "randomMove" => Some(ExtensionKind::RandomMove),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExtensionKind::Fall => "fall",
            ExtensionKind::SandLike => "sandLike",
            ExtensionKind::RandomMove => "randomMove",
        }
    }
}

/// `ext name (k=v, ...)`
#[derive(Debug, Clone)]
pub struct Extension {
    pub kind: ExtensionKind,
    /// Set of atoms the behavior may swap with (`repl`)
    pub replace_set: String,
    /// Gate applied after the extension is picked (`prob`)
    pub probability: Option<f64>,
    /// Every parameter as written
    pub params: BTreeMap<String, String>,
}

/// A material type
#[derive(Debug, Clone)]
pub struct AtomType {
    pub id: AtomId,
    pub name: String,
    pub alias: Option<String>,
    pub color: AtomColor,
    pub color_rules: Vec<ColorRule>,
    /// Placement key
    pub key: Option<char>,
    /// Per-instance defaults, copied into a cell when it becomes this type
    pub properties: HashMap<String, f32>,
    /// Per-type constants
    pub constants: HashMap<String, f32>,
    pub definitions: HashMap<String, Vec<SetMember>>,
    pub always_rules: Vec<Rule>,
    pub rules: Vec<Rule>,
    pub extensions: Vec<Extension>,
    pub init: Vec<Step>,
    /// `definitions` resolved to atom ids, indexed by id
    pub(crate) resolved_sets: HashMap<String, Vec<bool>>,
}

impl AtomType {
    pub fn new(id: AtomId, name: impl Into<String>, alias: Option<String>) -> Self {
        Self {
            id,
            name: name.into(),
            alias,
            color: AtomColor::default(),
            color_rules: Vec::new(),
            key: None,
            properties: HashMap::new(),
            constants: HashMap::new(),
            definitions: HashMap::new(),
            always_rules: Vec::new(),
            rules: Vec::new(),
            extensions: Vec::new(),
            init: Vec::new(),
            resolved_sets: HashMap::new(),
        }
    }

    pub fn constant(&self, name: &str) -> Option<f32> {
        self.constants.get(name).copied()
    }

    /// Whether atom `id` belongs to this atom's set `set`
    ///
    /// `None` if the set is not defined for this atom.
    pub fn set_contains(&self, set: &str, id: AtomId) -> Option<bool> {
        self.resolved_sets
            .get(set)
            .map(|members| members.get(id as usize).copied().unwrap_or(false))
    }

    pub fn all_rules(&self) -> impl Iterator<Item = &Rule> {
        self.always_rules.iter().chain(self.rules.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_range_orders_channels() {
        let range = ColorRange::new(Color::new(10, 0, 5), Color::new(8, 2, 5));
        assert_eq!(range.from, Color::new(8, 0, 5));
        assert_eq!(range.to, Color::new(10, 2, 5));
        assert_eq!(range.colors().count(), 3 * 3);
    }

    #[test]
    fn test_set_member_parse() {
        assert_eq!(SetMember::parse("Sand"), SetMember::Atom("Sand".into()));
        assert_eq!(SetMember::parse("^L"), SetMember::Alias("L".into()));
    }

    #[test]
    fn test_extension_names() {
        for kind in [ExtensionKind::Fall, ExtensionKind::SandLike, ExtensionKind::RandomMove] {
            assert_eq!(ExtensionKind::parse(kind.name()), Some(kind));
        }
        assert_eq!(ExtensionKind::parse("teleport"), None);
    }
}
