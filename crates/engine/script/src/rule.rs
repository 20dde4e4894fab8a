//! Rule IR: patterns, steps and rule metadata

use glam::IVec2;

use crate::expr::CompiledExpr;

pub type RuleId = u32;

/// Symbol in a match pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchSymbol {
    /// `x`: any cell
    Any,
    /// `_`: the empty atom
    Empty,
    /// `n`: anything but the empty atom
    NonEmpty,
    /// `e`: outside the grid
    Outside,
    /// `*`: any cell inside the grid
    Inside,
    /// `~set`: not a member of the set
    NotIn(String),
    /// Member of a set, or of the alias category with this name
    In(String),
}

impl MatchSymbol {
    pub fn parse(token: &str) -> Self {
        match token {
            "x" => MatchSymbol::Any,
            "_" => MatchSymbol::Empty,
            "n" => MatchSymbol::NonEmpty,
            "e" => MatchSymbol::Outside,
            "*" => MatchSymbol::Inside,
            _ => match token.strip_prefix('~') {
                Some(set) => MatchSymbol::NotIn(set.to_string()),
                None => MatchSymbol::In(token.to_string()),
            },
        }
    }
}

/// Symbol in an effect pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectSymbol {
    /// `/`: leave the cell untouched
    Keep,
    /// `x`: the anchor cell as it was when the map step started
    Anchor,
    /// `_`: become the empty atom
    Empty,
    /// A bound symbol, an alias or an atom name
    Place(String),
}

impl EffectSymbol {
    pub fn parse(token: &str) -> Self {
        match token {
            "/" => EffectSymbol::Keep,
            "x" => EffectSymbol::Anchor,
            "_" => EffectSymbol::Empty,
            _ => EffectSymbol::Place(token.to_string()),
        }
    }
}

/// Declared mirror axes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Symmetry {
    pub x: bool,
    pub y: bool,
}

impl Symmetry {
    pub const NONE: Self = Self { x: false, y: false };

    pub fn parse(text: &str) -> Option<Self> {
        let mut sym = Self::NONE;
        for c in text.chars() {
            match c {
                'x' if !sym.x => sym.x = true,
                'y' if !sym.y => sym.y = true,
                _ => return None,
            }
        }
        Some(sym)
    }
}

/// One effect instruction; offsets are relative to the anchor
#[derive(Debug, Clone)]
pub enum Step {
    Set {
        property: String,
        target: IVec2,
        value: CompiledExpr,
    },
    Increment {
        property: String,
        target: IVec2,
        amount: CompiledExpr,
    },
    ClampMin {
        property: String,
        target: IVec2,
        bound: CompiledExpr,
    },
    ClampMax {
        property: String,
        target: IVec2,
        bound: CompiledExpr,
    },
    /// Overwrite the rule box according to the effect pattern
    MapPattern,
    /// Capture the full state of a cell under a symbol for the map step
    Bind { symbol: String, source: IVec2 },
}

impl Step {
    /// Largest Chebyshev distance this step touches from the anchor
    pub fn reach(&self) -> u32 {
        let distance = |offset: &IVec2| offset.abs().max_element() as u32;
        match self {
            Step::Set { target, value: expr, .. }
            | Step::Increment { target, amount: expr, .. }
            | Step::ClampMin { target, bound: expr, .. }
            | Step::ClampMax { target, bound: expr, .. } => distance(target).max(expr.reach()),
            Step::MapPattern => 0,
            Step::Bind { source, .. } => distance(source),
        }
    }
}

/// A compiled transformation rule
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: RuleId,
    pub width: u8,
    pub height: u8,
    /// Position of the acting cell inside the box
    pub anchor: IVec2,
    /// `None` when the rule has no geometric pattern
    pub pattern: Option<Vec<MatchSymbol>>,
    /// All must be true
    pub conditions: Vec<CompiledExpr>,
    /// Row-major; empty unless a map step exists
    pub effect: Vec<EffectSymbol>,
    pub steps: Vec<Step>,
    pub symmetry: Symmetry,
    pub probability: f64,
    pub non_break: bool,
    /// Landed in the always-run bucket
    pub always: bool,
    pub shift: Option<IVec2>,
}

impl Rule {
    pub fn new(id: RuleId, width: u8, height: u8, anchor: IVec2) -> Self {
        Self {
            id,
            width,
            height,
            anchor,
            pattern: None,
            conditions: Vec::new(),
            effect: Vec::new(),
            steps: Vec::new(),
            symmetry: Symmetry::NONE,
            probability: 1.0,
            non_break: false,
            always: false,
            shift: None,
        }
    }

    /// Box size as a vector
    pub fn size(&self) -> IVec2 {
        IVec2::new(self.width as i32, self.height as i32)
    }

    fn index(&self, col: usize, row: usize) -> usize {
        row * self.width as usize + col
    }

    /// Match symbol at unmirrored box coordinate
    pub fn match_symbol(&self, col: usize, row: usize) -> Option<&MatchSymbol> {
        self.pattern.as_ref()?.get(self.index(col, row))
    }

    /// Effect symbol at unmirrored box coordinate
    pub fn effect_symbol(&self, col: usize, row: usize) -> Option<&EffectSymbol> {
        self.effect.get(self.index(col, row))
    }

    pub fn has_map_step(&self) -> bool {
        self.steps.iter().any(|s| matches!(s, Step::MapPattern))
    }

    /// Largest Chebyshev distance from the anchor this rule can read or write
    ///
    /// Mirroring only flips signs, so the value holds for every orientation.
    pub fn reach(&self) -> u32 {
        let size = self.size();
        let box_reach = if self.pattern.is_some() || self.has_map_step() {
            let far = (size - IVec2::ONE - self.anchor).max(self.anchor);
            far.max_element() as u32
        } else {
            0
        };
        let condition_reach = self.conditions.iter().map(CompiledExpr::reach).max().unwrap_or(0);
        let step_reach = self.steps.iter().map(Step::reach).max().unwrap_or(0);
        box_reach.max(condition_reach).max(step_reach)
    }
}
