//! Line-oriented script compiler
//!
//! Walks the comment-stripped line stream with an explicit state machine
//! (current atom, ruleset, section, rule phase and pending pattern rows) and
//! builds the [`WorldDefinition`]. Any malformed line aborts compilation with
//! its line number.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use glam::IVec2;

use crate::atom::{
    AtomColor, AtomId, AtomType, ColorRange, ColorRule, Extension, ExtensionKind, SetMember,
};
use crate::error::{CompileErrorKind, Error, Result};
use crate::expr::{CompiledExpr, ExprMode};
use crate::lexer;
use crate::rule::{EffectSymbol, MatchSymbol, Rule, RuleId, Step, Symmetry};
use crate::statement::{self, keyword, parse_full, split_top_level, PropertyKind, PropertyRef, RepeatKind};
use crate::world::WorldDefinition;

type LineResult<T = ()> = std::result::Result<T, CompileErrorKind>;

/// Compile script text into a world definition
pub fn compile(source: &str) -> Result<WorldDefinition> {
    Compiler::new().compile(source)
}

/// Read and compile a script file
pub fn compile_file(path: impl AsRef<Path>) -> Result<WorldDefinition> {
    let source = std::fs::read_to_string(path)?;
    compile(&source)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Property,
    Definition,
    Update,
    Init,
    Color,
}

impl Section {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "property" => Some(Section::Property),
            "definition" => Some(Section::Definition),
            "update" => Some(Section::Update),
            "init" => Some(Section::Init),
            "color" => Some(Section::Color),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Phase {
    #[default]
    Outside,
    Match,
    Effect,
}

/// Where the most recent rule went, for `repeat`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    Always,
    Normal,
    Ruleset,
}

fn first_word(text: &str) -> String {
    text.split_whitespace().next().unwrap_or(text).to_string()
}

fn validate_probability(p: f64) -> LineResult<f64> {
    if (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(CompileErrorKind::InvalidProbability(p))
    }
}

/// Compiler state
#[derive(Default)]
pub struct Compiler {
    atoms: Vec<AtomType>,
    current_atom: Option<usize>,
    rulesets: HashMap<String, Vec<Rule>>,
    current_ruleset: Option<String>,
    section: Option<Section>,
    globals: Vec<(String, Vec<SetMember>)>,
    defaults: HashMap<String, f32>,
    preload: Vec<ColorRange>,
    phase: Phase,
    draft: Option<Rule>,
    pattern_rows_left: usize,
    pattern_in_block: bool,
    next_rule_id: RuleId,
    last_bucket: Option<Bucket>,
    /// Line being compiled
    line_number: usize,
    /// Line of the current rule's effect block
    effect_start: usize,
    /// Unbound effect symbols, resolved once every atom is declared
    effect_refs: Vec<(usize, String)>,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compile(mut self, source: &str) -> Result<WorldDefinition> {
        let lines = lexer::lines(source).map_err(|(line, kind)| Error::Compile { line, kind })?;

        let mut last_line = 0;
        for line in &lines {
            last_line = line.number;
            self.line_number = line.number;
            self.line(&line.text).map_err(|kind| Error::Compile {
                line: line.number,
                kind,
            })?;
        }
        self.check_closed().map_err(|kind| Error::Compile {
            line: last_line,
            kind,
        })?;

        let ruleset_count = self.rulesets.len();
        let effect_refs = std::mem::take(&mut self.effect_refs);
        let world = WorldDefinition::build(self.atoms, self.defaults, self.preload)?;
        for (line, symbol) in effect_refs {
            if world.placeable(&symbol).is_none() {
                return Err(Error::Compile {
                    line,
                    kind: CompileErrorKind::UnknownEffectSymbol(symbol),
                });
            }
        }
        tracing::info!(
            atoms = world.len(),
            rules = world.rule_count(),
            rulesets = ruleset_count,
            "Compiled atom script"
        );
        Ok(world)
    }

    fn check_closed(&self) -> LineResult {
        if self.phase != Phase::Outside || self.draft.is_some() {
            Err(CompileErrorKind::UnexpectedEof("rule"))
        } else if self.section.is_some() {
            Err(CompileErrorKind::UnexpectedEof("section"))
        } else if self.current_ruleset.is_some() {
            Err(CompileErrorKind::UnexpectedEof("ruleset"))
        } else if self.current_atom.is_some() {
            Err(CompileErrorKind::UnexpectedEof("atom"))
        } else {
            Ok(())
        }
    }

    fn line(&mut self, text: &str) -> LineResult {
        if self.pattern_rows_left > 0 {
            if text == "}" {
                let expected = self.draft.as_ref().map_or(0, |r| r.height as usize);
                return Err(CompileErrorKind::PatternRows {
                    expected,
                    found: expected - self.pattern_rows_left,
                });
            }
            return self.pattern_row(text);
        }
        if text == "}" {
            return self.close_block();
        }
        match self.phase {
            Phase::Match => return self.match_line(text),
            Phase::Effect => return self.effect_line(text),
            Phase::Outside => {}
        }

        match keyword(text) {
            "global" => {
                let (name, members) = parse_full(text, "global <name> {members}", statement::global_set)?;
                self.globals.push((
                    name.to_string(),
                    members.into_iter().map(SetMember::parse).collect(),
                ));
                Ok(())
            }
            "preload" => {
                let (from, to) = parse_full(text, "preload #RRGGBB [#RRGGBB]", statement::preload)?;
                self.preload.push(ColorRange::new(from, to.unwrap_or(from)));
                Ok(())
            }
            "default" => {
                let (name, value) = parse_full(text, "default <name> <value>", statement::default_value)?;
                self.defaults.insert(name.to_string(), value as f32);
                Ok(())
            }
            "atom" => self.open_atom(text),
            "ruleset" => self.open_ruleset(text),
            "section" => self.open_section(text),
            _ => self.body_line(text),
        }
    }

    fn atom_mut(&mut self) -> LineResult<&mut AtomType> {
        self.current_atom
            .and_then(|index| self.atoms.get_mut(index))
            .ok_or_else(|| CompileErrorKind::Misplaced("statement outside an atom".into()))
    }

    fn draft_mut(&mut self) -> LineResult<&mut Rule> {
        self.draft
            .as_mut()
            .ok_or_else(|| CompileErrorKind::Misplaced("statement outside a rule".into()))
    }

    fn next_id(&mut self) -> RuleId {
        let id = self.next_rule_id;
        self.next_rule_id += 1;
        id
    }

    fn open_atom(&mut self, text: &str) -> LineResult {
        if self.current_atom.is_some() || self.current_ruleset.is_some() {
            return Err(CompileErrorKind::Misplaced("atom".into()));
        }
        let (name, alias) = parse_full(text, "atom <Name> [alias <A>] {", statement::atom_header)?;
        if self.atoms.iter().any(|a| a.name == name) {
            return Err(CompileErrorKind::DuplicateAtom(name.to_string()));
        }

        let id = self.atoms.len() as AtomId;
        let mut atom = AtomType::new(id, name, alias.map(str::to_string));
        for (set, members) in &self.globals {
            atom.definitions.insert(set.clone(), members.clone());
        }
        tracing::debug!(atom = name, id, "Declared atom");

        self.atoms.push(atom);
        self.current_atom = Some(self.atoms.len() - 1);
        self.last_bucket = None;
        Ok(())
    }

    fn open_ruleset(&mut self, text: &str) -> LineResult {
        if self.current_atom.is_some() || self.current_ruleset.is_some() {
            return Err(CompileErrorKind::Misplaced("ruleset".into()));
        }
        let name = parse_full(text, "ruleset <Name> {", statement::ruleset_header)?;
        self.rulesets.insert(name.to_string(), Vec::new());
        self.current_ruleset = Some(name.to_string());
        self.last_bucket = None;
        Ok(())
    }

    fn open_section(&mut self, text: &str) -> LineResult {
        if self.current_atom.is_none() || self.section.is_some() {
            return Err(CompileErrorKind::Misplaced("section".into()));
        }
        let name = parse_full(text, "section <name> {", statement::section_header)?;
        let section =
            Section::parse(name).ok_or_else(|| CompileErrorKind::UnknownSection(name.to_string()))?;
        self.section = Some(section);
        Ok(())
    }

    fn close_block(&mut self) -> LineResult {
        match self.phase {
            Phase::Match => {
                self.phase = Phase::Outside;
                self.pattern_in_block = false;
                Ok(())
            }
            Phase::Effect => {
                self.phase = Phase::Outside;
                self.pattern_in_block = false;
                let rule = self
                    .draft
                    .take()
                    .ok_or_else(|| CompileErrorKind::Misplaced("}".into()))?;
                self.finish_rule(rule)
            }
            Phase::Outside => {
                if self.draft.is_some() {
                    return Err(CompileErrorKind::RuleOpen);
                }
                if self.section.take().is_some() {
                    return Ok(());
                }
                if let Some(name) = self.current_ruleset.take() {
                    let count = self.rulesets.get(&name).map_or(0, Vec::len);
                    tracing::debug!(ruleset = %name, rules = count, "Compiled ruleset");
                    return Ok(());
                }
                if let Some(index) = self.current_atom.take() {
                    if let Some(atom) = self.atoms.get(index) {
                        tracing::debug!(
                            atom = %atom.name,
                            id = atom.id,
                            rules = atom.rules.len(),
                            always_rules = atom.always_rules.len(),
                            extensions = atom.extensions.len(),
                            "Compiled atom"
                        );
                    }
                    return Ok(());
                }
                Err(CompileErrorKind::UnmatchedBrace)
            }
        }
    }

    fn body_line(&mut self, text: &str) -> LineResult {
        if self.current_ruleset.is_some() {
            return self.rule_statement(text, true);
        }
        match self.section {
            Some(Section::Update) => self.rule_statement(text, false),
            Some(Section::Property) => self.property(text),
            Some(Section::Definition) => self.definition(text),
            Some(Section::Init) => self.init_step(text),
            Some(Section::Color) => self.color_rule(text),
            None => Err(CompileErrorKind::Misplaced(first_word(text))),
        }
    }

    // Property, definition, init and color sections

    fn property(&mut self, text: &str) -> LineResult {
        let (kind, name, value) = parse_full(text, "def|cdef <name> <value>", statement::property_def)?;
        let invalid = || CompileErrorKind::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
        };
        match name {
            "color" => {
                let color = if value == "dynamic" {
                    AtomColor::Dynamic
                } else {
                    AtomColor::Fixed(parse_full(value, "#RRGGBB or dynamic", statement::hex_color)?)
                };
                self.atom_mut()?.color = color;
            }
            "key" => {
                let mut chars = value.chars();
                let key = match (chars.next(), chars.next()) {
                    (Some(c), None) => c,
                    _ => return Err(invalid()),
                };
                self.atom_mut()?.key = Some(key);
            }
            _ => {
                let number: f32 = value.parse().map_err(|_| invalid())?;
                let atom = self.atom_mut()?;
                match kind {
                    PropertyKind::Instance => atom.properties.insert(name.to_string(), number),
                    PropertyKind::Constant => atom.constants.insert(name.to_string(), number),
                };
            }
        }
        Ok(())
    }

    fn definition(&mut self, text: &str) -> LineResult {
        let (name, members) = parse_full(text, "def <name> {members}", statement::set_definition)?;
        let members = members.into_iter().map(SetMember::parse).collect();
        self.atom_mut()?.definitions.insert(name.to_string(), members);
        Ok(())
    }

    fn init_step(&mut self, text: &str) -> LineResult {
        let (target, expr) = parse_full(text, "set [<name>] = <expression>", statement::set_step)?;
        let value = CompiledExpr::compile(expr, ExprMode::Absolute)?;
        self.atom_mut()?.init.push(Step::Set {
            property: target.name.to_string(),
            target: IVec2::ZERO,
            value,
        });
        Ok(())
    }

    fn color_rule(&mut self, text: &str) -> LineResult {
        const EXPECTED: &str = "<condition> => r, g, b";
        let syntax = || CompileErrorKind::Syntax {
            expected: EXPECTED,
            found: text.to_string(),
        };
        let (condition, components) = text.split_once("=>").ok_or_else(syntax)?;
        let parts = split_top_level(components);
        let [r, g, b] = parts.as_slice() else {
            return Err(syntax());
        };
        let compile = |expr: &str| CompiledExpr::compile(expr, ExprMode::Absolute);
        let rule = ColorRule {
            condition: compile(condition)?,
            r: compile(*r)?,
            g: compile(*g)?,
            b: compile(*b)?,
        };
        self.atom_mut()?.color_rules.push(rule);
        Ok(())
    }

    // Update section and rulesets

    fn rule_statement(&mut self, text: &str, in_ruleset: bool) -> LineResult {
        match keyword(text) {
            "match" => self.begin_match(text),
            "->" => self.begin_effect(text),
            "repeat" => self.repeat(text),
            "inherit" => self.inherit(text),
            "ext" if !in_ruleset => self.extension(text),
            _ => Err(CompileErrorKind::Misplaced(first_word(text))),
        }
    }

    fn begin_match(&mut self, text: &str) -> LineResult {
        if self.draft.is_some() {
            return Err(CompileErrorKind::RuleOpen);
        }
        let header = parse_full(text, "match (ox, oy, w, h) [sym(xy)] {", statement::match_header)?;
        if header.width == 0
            || header.height == 0
            || header.ox >= header.width
            || header.oy >= header.height
        {
            return Err(CompileErrorKind::InvalidBox {
                ox: header.ox,
                oy: header.oy,
                width: header.width,
                height: header.height,
            });
        }
        let symmetry = match header.symmetry {
            Some(axes) => Symmetry::parse(axes)
                .ok_or_else(|| CompileErrorKind::InvalidSymmetry(axes.to_string()))?,
            None => Symmetry::NONE,
        };

        let anchor = IVec2::new(header.ox as i32, header.oy as i32);
        let mut rule = Rule::new(0, header.width, header.height, anchor);
        rule.symmetry = symmetry;
        self.draft = Some(rule);
        self.phase = Phase::Match;
        self.pattern_in_block = false;
        Ok(())
    }

    fn begin_effect(&mut self, text: &str) -> LineResult {
        let probability = parse_full(text, "-> [P-<probability>] {", statement::effect_header)?;
        let rule = self
            .draft
            .as_mut()
            .ok_or_else(|| CompileErrorKind::Misplaced("->".into()))?;
        if let Some(p) = probability {
            rule.probability = validate_probability(p)?;
        }
        self.phase = Phase::Effect;
        self.pattern_in_block = false;
        self.effect_start = self.line_number;
        Ok(())
    }

    fn begin_pattern(&mut self) -> LineResult {
        if self.pattern_in_block {
            return Err(CompileErrorKind::DuplicatePattern);
        }
        let phase = self.phase;
        let rule = self.draft_mut()?;
        let cells = rule.width as usize * rule.height as usize;
        let rows = rule.height as usize;
        match phase {
            Phase::Match => rule.pattern = Some(Vec::with_capacity(cells)),
            Phase::Effect => {
                rule.effect = Vec::with_capacity(cells);
                rule.steps.push(Step::MapPattern);
            }
            Phase::Outside => return Err(CompileErrorKind::Misplaced("pattern".into())),
        }
        if phase == Phase::Effect {
            self.effect_start = self.line_number;
        }
        self.pattern_rows_left = rows;
        self.pattern_in_block = true;
        Ok(())
    }

    fn pattern_row(&mut self, text: &str) -> LineResult {
        let phase = self.phase;
        let rule = self.draft_mut()?;
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.len() != rule.width as usize {
            return Err(CompileErrorKind::PatternRowWidth {
                expected: rule.width as usize,
                found: tokens.len(),
            });
        }
        match phase {
            Phase::Match => rule
                .pattern
                .get_or_insert_with(Vec::new)
                .extend(tokens.into_iter().map(MatchSymbol::parse)),
            _ => rule
                .effect
                .extend(tokens.into_iter().map(EffectSymbol::parse)),
        }
        self.pattern_rows_left -= 1;
        Ok(())
    }

    fn match_line(&mut self, text: &str) -> LineResult {
        if text == "pattern" {
            return self.begin_pattern();
        }
        match keyword(text) {
            "eval" => {
                let expr = parse_full(text, "eval <expression>", statement::eval_condition)?;
                let rule = self.draft_mut()?;
                let condition = CompiledExpr::compile(expr, ExprMode::Rule { anchor: rule.anchor })?;
                rule.conditions.push(condition);
                Ok(())
            }
            _ => Err(CompileErrorKind::Misplaced(first_word(text))),
        }
    }

    fn effect_line(&mut self, text: &str) -> LineResult {
        match text {
            "pattern" => return self.begin_pattern(),
            "non-break" => {
                self.draft_mut()?.non_break = true;
                return Ok(());
            }
            "always-run" => {
                if self.current_ruleset.is_some() {
                    return Err(CompileErrorKind::Misplaced("always-run".into()));
                }
                self.draft_mut()?.always = true;
                return Ok(());
            }
            _ => {}
        }

        let rule = self.draft_mut()?;
        let anchor = rule.anchor;
        let mode = ExprMode::Rule { anchor };
        let target = |r: PropertyRef<'_>| match r.coord {
            Some((x, y)) => IVec2::new(x as i32, y as i32) - anchor,
            None => IVec2::ZERO,
        };

        match keyword(text) {
            "def" => {
                let (symbol, (x, y)) = parse_full(text, "def <symbol> = (x, y)", statement::bind)?;
                if x >= rule.width || y >= rule.height {
                    return Err(CompileErrorKind::BindOutsideBox {
                        x,
                        y,
                        width: rule.width,
                        height: rule.height,
                    });
                }
                rule.steps.push(Step::Bind {
                    symbol: symbol.to_string(),
                    source: IVec2::new(x as i32, y as i32) - anchor,
                });
            }
            "set" => {
                let (r, expr) = parse_full(text, "set [<name>] = <expression>", statement::set_step)?;
                rule.steps.push(Step::Set {
                    property: r.name.to_string(),
                    target: target(r),
                    value: CompiledExpr::compile(expr, mode)?,
                });
            }
            "inc" => {
                let (r, expr) = parse_full(text, "inc [<name>] by <expression>", statement::inc_step)?;
                rule.steps.push(Step::Increment {
                    property: r.name.to_string(),
                    target: target(r),
                    amount: CompiledExpr::compile(expr, mode)?,
                });
            }
            "clamp" => {
                const EXPECTED: &str = "clamp [<name>] in <min>, <max>";
                let (r, bounds) = parse_full(text, EXPECTED, statement::clamp_step)?;
                let parts = split_top_level(bounds);
                let [lo, hi] = parts.as_slice() else {
                    return Err(CompileErrorKind::Syntax {
                        expected: EXPECTED,
                        found: text.to_string(),
                    });
                };
                rule.steps.push(Step::ClampMin {
                    property: r.name.to_string(),
                    target: target(r),
                    bound: CompiledExpr::compile(lo, mode)?,
                });
                rule.steps.push(Step::ClampMax {
                    property: r.name.to_string(),
                    target: target(r),
                    bound: CompiledExpr::compile(hi, mode)?,
                });
            }
            "shift" => {
                let (dx, dy) = parse_full(text, "shift(dx, dy)", statement::shift)?;
                rule.shift = Some(IVec2::new(dx, dy));
            }
            _ => return Err(CompileErrorKind::Misplaced(first_word(text))),
        }
        Ok(())
    }

    fn finish_rule(&mut self, mut rule: Rule) -> LineResult {
        if rule.has_map_step() && rule.effect.len() != rule.width as usize * rule.height as usize {
            return Err(CompileErrorKind::MissingEffectPattern);
        }
        self.collect_effect_refs(&rule);
        rule.id = self.next_id();
        tracing::debug!(
            rule = rule.id,
            width = rule.width,
            height = rule.height,
            conditions = rule.conditions.len(),
            steps = rule.steps.len(),
            probability = rule.probability,
            always = rule.always,
            "Compiled rule"
        );
        self.push_rule(rule)
    }

    /// Queue effect symbols that no `def` in the rule binds
    fn collect_effect_refs(&mut self, rule: &Rule) {
        let bound: Vec<&str> = rule
            .steps
            .iter()
            .filter_map(|step| match step {
                Step::Bind { symbol, .. } => Some(symbol.as_str()),
                _ => None,
            })
            .collect();
        for symbol in &rule.effect {
            if let EffectSymbol::Place(name) = symbol {
                let queued = self.effect_refs.iter().any(|(line, n)| *line == self.effect_start && n == name);
                if !bound.contains(&name.as_str()) && !queued {
                    self.effect_refs.push((self.effect_start, name.clone()));
                }
            }
        }
    }

    fn push_rule(&mut self, rule: Rule) -> LineResult {
        if let Some(name) = &self.current_ruleset {
            self.rulesets.entry(name.clone()).or_default().push(rule);
            self.last_bucket = Some(Bucket::Ruleset);
            return Ok(());
        }
        let always = rule.always;
        let atom = self.atom_mut()?;
        if always {
            atom.always_rules.push(rule);
        } else {
            atom.rules.push(rule);
        }
        self.last_bucket = Some(if always { Bucket::Always } else { Bucket::Normal });
        Ok(())
    }

    fn last_rule(&self) -> Option<&Rule> {
        match self.last_bucket? {
            Bucket::Ruleset => self.rulesets.get(self.current_ruleset.as_ref()?)?.last(),
            Bucket::Always => self.atoms.get(self.current_atom?)?.always_rules.last(),
            Bucket::Normal => self.atoms.get(self.current_atom?)?.rules.last(),
        }
    }

    fn repeat(&mut self, text: &str) -> LineResult {
        let kind = parse_full(text, "repeat match|effect", statement::repeat)?;
        let previous = self
            .last_rule()
            .cloned()
            .ok_or(CompileErrorKind::NothingToRepeat)?;
        match kind {
            RepeatKind::Match => {
                if self.draft.is_some() {
                    return Err(CompileErrorKind::RuleOpen);
                }
                let mut rule = Rule::new(0, previous.width, previous.height, previous.anchor);
                rule.pattern = previous.pattern;
                rule.conditions = previous.conditions;
                rule.symmetry = previous.symmetry;
                self.draft = Some(rule);
                Ok(())
            }
            RepeatKind::Effect => {
                let mut rule = self
                    .draft
                    .take()
                    .ok_or_else(|| CompileErrorKind::Misplaced("repeat effect".into()))?;
                rule.effect = previous.effect;
                rule.steps = previous.steps;
                rule.probability = previous.probability;
                rule.non_break = previous.non_break;
                rule.always = previous.always;
                rule.shift = previous.shift;
                self.finish_rule(rule)
            }
        }
    }

    fn inherit(&mut self, text: &str) -> LineResult {
        if self.draft.is_some() {
            return Err(CompileErrorKind::RuleOpen);
        }
        let (name, flags) = parse_full(text, "inherit <name> [-P=<probability>]", statement::inherit)?;
        let mut probability = None;
        for (flag, value) in flags {
            match flag {
                "P" => {
                    let p: f64 = value.parse().map_err(|_| CompileErrorKind::InvalidValue {
                        name: "-P".into(),
                        value: value.to_string(),
                    })?;
                    probability = Some(validate_probability(p)?);
                }
                other => return Err(CompileErrorKind::UnknownFlag(other.to_string())),
            }
        }

        let source = if let Some(rules) = self.rulesets.get(name) {
            rules.clone()
        } else if let Some(atom) = self.atoms.iter().find(|a| a.name == name) {
            atom.rules.clone()
        } else {
            tracing::warn!(name, "inherit names no atom or ruleset, no rules copied");
            Vec::new()
        };

        for mut rule in source {
            rule.id = self.next_id();
            rule.always = false;
            if let Some(p) = probability {
                rule.probability = p;
            }
            self.push_rule(rule)?;
        }
        Ok(())
    }

    fn extension(&mut self, text: &str) -> LineResult {
        let (name, params) = parse_full(text, "ext <name> (key=value, ...)", statement::extension)?;
        let kind =
            ExtensionKind::parse(name).ok_or_else(|| CompileErrorKind::UnknownExtension(name.to_string()))?;
        let params: BTreeMap<String, String> = params
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let replace_set = params
            .get("repl")
            .cloned()
            .ok_or_else(|| CompileErrorKind::MissingParameter {
                name: name.to_string(),
                param: "repl",
            })?;
        let probability = match params.get("prob") {
            Some(value) => {
                let p: f64 = value.parse().map_err(|_| CompileErrorKind::InvalidValue {
                    name: "prob".into(),
                    value: value.clone(),
                })?;
                Some(validate_probability(p)?)
            }
            None => None,
        };

        self.atom_mut()?.extensions.push(Extension {
            kind,
            replace_set,
            probability,
            params,
        });
        Ok(())
    }
}
