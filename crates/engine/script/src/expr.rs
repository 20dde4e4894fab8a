//! Expression compiler for conditions, step values and color components
//!
//! Script expressions are plain arithmetic/boolean text (evaluated by fasteval)
//! with two kinds of bracketed tokens spliced in:
//!
//! - `[name]` or `[name - x, y]`: a cell property, read at the anchor or at the
//!   box coordinate `(x, y)` relative to the rule anchor
//! - `[$name'min'max'step]`: an inline random constant drawn on every evaluation
//!
//! Each bracket occurrence is rewritten to a slot variable before fasteval sees
//! the text, so the same property may be read at several offsets in one
//! expression.

use std::fmt;
use std::sync::Arc;

use fasteval::{Compiler, Evaler, Instruction, Slab};
use glam::IVec2;
use nom::{
    bytes::complete::take_while1,
    character::complete::{char, multispace0, u32 as parse_u32},
    combinator::opt,
    number::complete::double,
    sequence::{delimited, preceded, separated_pair},
    IResult, Parser,
};
use rand::Rng;
use thiserror::Error;

const SLAB_CAPACITY: usize = 256;

/// Errors raised while compiling an expression
#[derive(Debug, Error)]
pub enum ExprError {
    #[error("Unclosed `[` in expression `{0}`")]
    UnclosedBracket(String),

    #[error("Malformed token `[{0}]`")]
    MalformedToken(String),

    #[error("Random token `[{token}]`: {reason}")]
    InvalidRandomRange { token: String, reason: &'static str },

    #[error("Empty expression")]
    Empty,

    #[error("Fasteval error in `{expr}`: {message}")]
    Fasteval { expr: String, message: String },
}

/// Errors raised while evaluating a compiled expression
#[derive(Debug, Clone, Error)]
pub enum EvalError {
    #[error("Property `{name}` is not defined on the cell, its type or the global defaults (in `{expr}`)")]
    MissingProperty { name: String, expr: String },

    #[error("Cell at offset {offset} is not accessible while evaluating `{expr}`")]
    Inaccessible { offset: IVec2, expr: String },

    #[error("Fasteval error in `{expr}`: {message}")]
    Fasteval { expr: String, message: String },
}

/// How box coordinates inside variable tokens are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprMode {
    /// Rule context: `(x, y)` is converted to `(x - anchor.x, y - anchor.y)`
    Rule { anchor: IVec2 },
    /// Init/color context: every token reads the cell itself
    Absolute,
}

impl ExprMode {
    fn offset(self, coord: Option<(u32, u32)>) -> IVec2 {
        match (self, coord) {
            (ExprMode::Rule { anchor }, Some((x, y))) => IVec2::new(x as i32, y as i32) - anchor,
            _ => IVec2::ZERO,
        }
    }
}

/// Outcome of a single variable lookup
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup {
    Value(f64),
    /// The offset points outside the grid
    OutOfGrid,
    /// The cell exists but has no such property anywhere in the fallback chain
    Missing,
    /// The cell exists but the caller holds no access to it
    Inaccessible,
}

/// Resolves property reads for an evaluation
///
/// Offsets are passed exactly as recorded at compile time; the implementor is
/// responsible for applying any mirroring and for the live → constant →
/// global default fallback.
pub trait VarSource {
    fn lookup(&self, name: &str, offset: IVec2) -> Lookup;
}

/// Inline random constant `[$name'min'max'step]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandomRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl RandomRange {
    /// Number of values in `{min, min + step, ...}` strictly below `max`
    pub fn len(&self) -> u64 {
        let mut n = ((self.max - self.min) / self.step).ceil() as u64;
        while n > 0 && self.min + self.step * (n - 1) as f64 >= self.max {
            n -= 1;
        }
        n
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let n = self.len().max(1);
        self.min + self.step * rng.random_range(0..n) as f64
    }
}

/// One property read inside an expression
#[derive(Debug, Clone, PartialEq)]
pub struct VarSlot {
    pub name: String,
    pub offset: IVec2,
}

struct Compiled {
    source: String,
    rewritten: String,
    instruction: Instruction,
    slab: Slab,
    slots: Vec<VarSlot>,
    randoms: Vec<(String, RandomRange)>,
}

/// A compiled expression, cheap to clone
#[derive(Clone)]
pub struct CompiledExpr {
    inner: Arc<Compiled>,
}

impl fmt::Debug for CompiledExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledExpr")
            .field("source", &self.inner.source)
            .field("slots", &self.inner.slots)
            .finish()
    }
}

/// Non-zero values are true
pub fn is_truthy(value: f64) -> bool {
    value != 0.0
}

enum Token<'a> {
    Variable { name: &'a str, coord: Option<(u32, u32)> },
    Random { range: RandomRange },
}

fn token_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_').parse(input)
}

/// `name` or `name - x, y` (the inside of a property bracket)
pub(crate) fn variable_token(input: &str) -> IResult<&str, (&str, Option<(u32, u32)>)> {
    (
        delimited(multispace0, token_name, multispace0),
        opt(preceded(
            (char('-'), multispace0),
            separated_pair(parse_u32, (multispace0, char(','), multispace0), parse_u32),
        )),
    )
        .parse(input)
}

fn random_token(input: &str) -> IResult<&str, (&str, f64, f64, f64)> {
    (
        preceded((multispace0, char('$')), token_name),
        preceded(char('\''), double),
        preceded(char('\''), double),
        preceded(char('\''), double),
    )
        .parse(input)
}

fn parse_token(inner: &str) -> Result<Token<'_>, ExprError> {
    if inner.trim_start().starts_with('$') {
        let (rest, (_, min, max, step)) =
            random_token(inner).map_err(|_| ExprError::MalformedToken(inner.to_string()))?;
        if !rest.trim().is_empty() {
            return Err(ExprError::MalformedToken(inner.to_string()));
        }
        let invalid = |reason| ExprError::InvalidRandomRange {
            token: inner.to_string(),
            reason,
        };
        if !(step > 0.0) {
            return Err(invalid("step must be positive"));
        }
        if !(max > min) {
            return Err(invalid("max must be greater than min"));
        }
        return Ok(Token::Random {
            range: RandomRange { min, max, step },
        });
    }

    let (rest, (name, coord)) =
        variable_token(inner).map_err(|_| ExprError::MalformedToken(inner.to_string()))?;
    if !rest.trim().is_empty() {
        return Err(ExprError::MalformedToken(inner.to_string()));
    }
    Ok(Token::Variable { name, coord })
}

impl CompiledExpr {
    /// Compile expression text
    pub fn compile(text: &str, mode: ExprMode) -> Result<Self, ExprError> {
        let source = text.trim();
        if source.is_empty() {
            return Err(ExprError::Empty);
        }

        let mut rewritten = String::with_capacity(source.len() + 16);
        let mut slots = Vec::new();
        let mut randoms: Vec<(String, RandomRange)> = Vec::new();

        let mut rest = source;
        while let Some(start) = rest.find('[') {
            rewritten.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let end = after
                .find(']')
                .ok_or_else(|| ExprError::UnclosedBracket(source.to_string()))?;
            let inner = &after[..end];

            match parse_token(inner)? {
                Token::Variable { name, coord } => {
                    rewritten.push_str(&format!(" v_{} ", slots.len()));
                    slots.push(VarSlot {
                        name: name.to_string(),
                        offset: mode.offset(coord),
                    });
                }
                Token::Random { range } => {
                    let key = inner.trim().to_string();
                    let index = match randoms.iter().position(|(k, _)| *k == key) {
                        Some(index) => index,
                        None => {
                            randoms.push((key, range));
                            randoms.len() - 1
                        }
                    };
                    rewritten.push_str(&format!(" r_{index} "));
                }
            }
            rest = &after[end + 1..];
        }
        rewritten.push_str(rest);

        let parser = fasteval::Parser::new();
        let mut slab = Slab::with_capacity(SLAB_CAPACITY);
        let instruction = parser
            .parse(&rewritten, &mut slab.ps)
            .map_err(|e| ExprError::Fasteval {
                expr: source.to_string(),
                message: e.to_string(),
            })?
            .from(&slab.ps)
            .compile(&slab.ps, &mut slab.cs);

        Ok(Self {
            inner: Arc::new(Compiled {
                source: source.to_string(),
                rewritten,
                instruction,
                slab,
                slots,
                randoms,
            }),
        })
    }

    /// The expression text as written in the script
    pub fn source(&self) -> &str {
        &self.inner.source
    }

    /// The text handed to fasteval
    pub fn rewritten(&self) -> &str {
        &self.inner.rewritten
    }

    /// Every property read, in scan order
    pub fn slots(&self) -> &[VarSlot] {
        &self.inner.slots
    }

    /// Offsets recorded for `name`, in scan order
    pub fn offsets(&self, name: &str) -> Vec<IVec2> {
        self.inner
            .slots
            .iter()
            .filter(|slot| slot.name == name)
            .map(|slot| slot.offset)
            .collect()
    }

    /// Distinct random tokens with their ranges
    pub fn randoms(&self) -> impl Iterator<Item = (&str, &RandomRange)> {
        self.inner.randoms.iter().map(|(k, r)| (k.as_str(), r))
    }

    /// Largest Chebyshev distance of any property read from the anchor
    pub fn reach(&self) -> u32 {
        self.inner
            .slots
            .iter()
            .map(|slot| slot.offset.abs().max_element() as u32)
            .max()
            .unwrap_or(0)
    }

    /// Evaluate against `source`
    ///
    /// Returns `Ok(None)` when any read falls outside the grid.
    pub fn eval<S, R>(&self, source: &S, rng: &mut R) -> Result<Option<f64>, EvalError>
    where
        S: VarSource + ?Sized,
        R: Rng + ?Sized,
    {
        let mut values = Vec::with_capacity(self.inner.slots.len());
        for slot in &self.inner.slots {
            match source.lookup(&slot.name, slot.offset) {
                Lookup::Value(v) => values.push(v),
                Lookup::OutOfGrid => return Ok(None),
                Lookup::Missing => {
                    return Err(EvalError::MissingProperty {
                        name: slot.name.clone(),
                        expr: self.inner.source.clone(),
                    })
                }
                Lookup::Inaccessible => {
                    return Err(EvalError::Inaccessible {
                        offset: slot.offset,
                        expr: self.inner.source.clone(),
                    })
                }
            }
        }
        let draws: Vec<f64> = self
            .inner
            .randoms
            .iter()
            .map(|(_, range)| range.sample(rng))
            .collect();

        let mut ns = |name: &str, _args: Vec<f64>| -> Option<f64> {
            if let Some(index) = name.strip_prefix("v_") {
                return index.parse::<usize>().ok().and_then(|i| values.get(i).copied());
            }
            if let Some(index) = name.strip_prefix("r_") {
                return index.parse::<usize>().ok().and_then(|i| draws.get(i).copied());
            }
            None
        };

        self.inner
            .instruction
            .eval(&self.inner.slab, &mut ns)
            .map(Some)
            .map_err(|e| EvalError::Fasteval {
                expr: self.inner.source.clone(),
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    /// Property values keyed by (name, offset)
    struct TestSource {
        values: HashMap<(String, IVec2), f64>,
        out_of_grid: bool,
    }

    impl TestSource {
        fn new() -> Self {
            Self {
                values: HashMap::new(),
                out_of_grid: false,
            }
        }

        fn with(mut self, name: &str, offset: IVec2, value: f64) -> Self {
            self.values.insert((name.to_string(), offset), value);
            self
        }
    }

    impl VarSource for TestSource {
        fn lookup(&self, name: &str, offset: IVec2) -> Lookup {
            if self.out_of_grid {
                return Lookup::OutOfGrid;
            }
            match self.values.get(&(name.to_string(), offset)) {
                Some(v) => Lookup::Value(*v),
                None => Lookup::Missing,
            }
        }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn test_plain_arithmetic() {
        let expr = CompiledExpr::compile("1 + 2 * 3", ExprMode::Absolute).unwrap();
        let value = expr.eval(&TestSource::new(), &mut rng()).unwrap();
        assert_eq!(value, Some(7.0));
    }

    #[test]
    fn test_property_at_anchor() {
        let expr = CompiledExpr::compile("[temp] > 50", ExprMode::Absolute).unwrap();
        let hot = TestSource::new().with("temp", IVec2::ZERO, 80.0);
        let cold = TestSource::new().with("temp", IVec2::ZERO, 20.0);
        assert_eq!(expr.eval(&hot, &mut rng()).unwrap(), Some(1.0));
        assert_eq!(expr.eval(&cold, &mut rng()).unwrap(), Some(0.0));
    }

    #[test]
    fn test_offsets_relative_to_anchor() {
        let expr = CompiledExpr::compile(
            "[heat - 0, 1] - [heat - 2, 1]",
            ExprMode::Rule {
                anchor: IVec2::new(1, 1),
            },
        )
        .unwrap();
        assert_eq!(
            expr.offsets("heat"),
            vec![IVec2::new(-1, 0), IVec2::new(1, 0)]
        );
        assert_eq!(expr.reach(), 1);
    }

    #[test]
    fn test_positional_binding() {
        // Same property twice: each occurrence reads its own offset
        let expr = CompiledExpr::compile(
            "[heat - 0, 0] - [heat - 2, 0]",
            ExprMode::Rule {
                anchor: IVec2::new(1, 0),
            },
        )
        .unwrap();
        let source = TestSource::new()
            .with("heat", IVec2::new(-1, 0), 10.0)
            .with("heat", IVec2::new(1, 0), 4.0);
        assert_eq!(expr.eval(&source, &mut rng()).unwrap(), Some(6.0));
    }

    #[test]
    fn test_absolute_mode_ignores_coordinates() {
        let expr = CompiledExpr::compile("[heat - 3, 4] + 1", ExprMode::Absolute).unwrap();
        assert_eq!(expr.offsets("heat"), vec![IVec2::ZERO]);
    }

    #[test]
    fn test_out_of_grid_is_none() {
        let expr = CompiledExpr::compile("[temp] + 1", ExprMode::Absolute).unwrap();
        let mut source = TestSource::new();
        source.out_of_grid = true;
        assert_eq!(expr.eval(&source, &mut rng()).unwrap(), None);
    }

    #[test]
    fn test_missing_property_is_error() {
        let expr = CompiledExpr::compile("[nothing]", ExprMode::Absolute).unwrap();
        let err = expr.eval(&TestSource::new(), &mut rng()).unwrap_err();
        assert!(matches!(err, EvalError::MissingProperty { ref name, .. } if name == "nothing"));
    }

    #[test]
    fn test_random_token_stays_in_range() {
        let expr = CompiledExpr::compile("[$r'0'10'3]", ExprMode::Absolute).unwrap();
        let mut rng = rng();
        for _ in 0..200 {
            let v = expr.eval(&TestSource::new(), &mut rng).unwrap().unwrap();
            assert!([0.0, 3.0, 6.0, 9.0].contains(&v), "unexpected draw {v}");
        }
    }

    #[test]
    fn test_random_token_drawn_once_per_evaluation() {
        let expr = CompiledExpr::compile("[$r'0'100'1] - [$r'0'100'1]", ExprMode::Absolute).unwrap();
        assert_eq!(expr.randoms().count(), 1);
        let mut rng = rng();
        for _ in 0..50 {
            assert_eq!(expr.eval(&TestSource::new(), &mut rng).unwrap(), Some(0.0));
        }
    }

    #[test]
    fn test_random_range_excludes_max_with_fractional_step() {
        let range = RandomRange {
            min: 0.0,
            max: 1.0,
            step: 0.1,
        };
        let mut rng = rng();
        for _ in 0..500 {
            assert!(range.sample(&mut rng) < 1.0);
        }
    }

    #[test]
    fn test_invalid_random_ranges() {
        assert!(matches!(
            CompiledExpr::compile("[$r'0'10'0]", ExprMode::Absolute),
            Err(ExprError::InvalidRandomRange { .. })
        ));
        assert!(matches!(
            CompiledExpr::compile("[$r'5'5'1]", ExprMode::Absolute),
            Err(ExprError::InvalidRandomRange { .. })
        ));
        assert!(matches!(
            CompiledExpr::compile("[$r'a'5'1]", ExprMode::Absolute),
            Err(ExprError::MalformedToken(_))
        ));
    }

    #[test]
    fn test_malformed_tokens() {
        assert!(matches!(
            CompiledExpr::compile("[temp - 1]", ExprMode::Absolute),
            Err(ExprError::MalformedToken(_))
        ));
        assert!(matches!(
            CompiledExpr::compile("[temp + 1", ExprMode::Absolute),
            Err(ExprError::UnclosedBracket(_))
        ));
        assert!(matches!(
            CompiledExpr::compile("  ", ExprMode::Absolute),
            Err(ExprError::Empty)
        ));
    }

    #[test]
    fn test_fasteval_rejects_bad_syntax() {
        assert!(matches!(
            CompiledExpr::compile("[temp] + * 2", ExprMode::Absolute),
            Err(ExprError::Fasteval { .. })
        ));
    }

    #[test]
    fn test_truthiness() {
        assert!(is_truthy(1.0));
        assert!(is_truthy(-0.5));
        assert!(!is_truthy(0.0));
    }
}
