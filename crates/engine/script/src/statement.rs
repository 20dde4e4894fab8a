//! Single-line statement parsers using nom
//!
//! Each parser recognizes one statement form and returns its raw parts; the
//! compiler decides what they mean in the current context.

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_while, take_while1, take_while_m_n},
    character::complete::{char, i32 as parse_i32, multispace0, multispace1, u8 as parse_u8},
    combinator::{map, map_res, opt, rest},
    multi::{many0, separated_list0},
    number::complete::double,
    sequence::{delimited, preceded, separated_pair, terminated},
    IResult, Parser,
};

use crate::atom::Color;
use crate::error::CompileErrorKind;
use crate::expr::variable_token;

/// `match (ox, oy, w, h) sym(xy) {`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchHeader<'a> {
    pub ox: u8,
    pub oy: u8,
    pub width: u8,
    pub height: u8,
    pub symmetry: Option<&'a str>,
}

/// `[name]` or `[name - x, y]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyRef<'a> {
    pub name: &'a str,
    pub coord: Option<(u32, u32)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatKind {
    Match,
    Effect,
}

/// Whether a property line was `def` (per instance) or `cdef` (constant)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Instance,
    Constant,
}

/// Run `parser` over the whole of `line`
pub(crate) fn parse_full<'a, O, P>(
    line: &'a str,
    expected: &'static str,
    mut parser: P,
) -> Result<O, CompileErrorKind>
where
    P: Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>,
{
    match parser.parse(line) {
        Ok((remaining, out)) if remaining.trim().is_empty() => Ok(out),
        Ok((remaining, _)) => Err(CompileErrorKind::Trailing {
            expected,
            trailing: remaining.trim().to_string(),
        }),
        Err(_) => Err(CompileErrorKind::Syntax {
            expected,
            found: line.to_string(),
        }),
    }
}

/// Leading keyword used to dispatch a line
pub(crate) fn keyword(line: &str) -> &str {
    if line.starts_with("->") {
        return "->";
    }
    let end = line
        .find(|c: char| !(c.is_ascii_alphabetic() || c == '-'))
        .unwrap_or(line.len());
    &line[..end]
}

/// Split at commas that are not nested inside `()` or `[]`
pub(crate) fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(text[start..].trim());
    parts
}

fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_').parse(input)
}

fn comma(input: &str) -> IResult<&str, char> {
    delimited(multispace0, char(','), multispace0).parse(input)
}

fn open_brace(input: &str) -> IResult<&str, char> {
    preceded(multispace0, char('{')).parse(input)
}

fn hex_channel(input: &str) -> IResult<&str, u8> {
    map_res(take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit()), |s| {
        u8::from_str_radix(s, 16)
    })
    .parse(input)
}

/// `#RRGGBB`
pub fn hex_color(input: &str) -> IResult<&str, Color> {
    map(
        preceded(char('#'), (hex_channel, hex_channel, hex_channel)),
        |(r, g, b)| Color::new(r, g, b),
    )
    .parse(input)
}

fn set_member(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace() && c != ',' && c != '}').parse(input)
}

/// `{a, b, ^C}`
pub fn set_literal(input: &str) -> IResult<&str, Vec<&str>> {
    delimited(
        (char('{'), multispace0),
        separated_list0(comma, set_member),
        (multispace0, char('}')),
    )
    .parse(input)
}

/// `atom Name [alias A] {`
pub fn atom_header(input: &str) -> IResult<&str, (&str, Option<&str>)> {
    terminated(
        (
            preceded((tag("atom"), multispace1), identifier),
            opt(preceded((multispace1, tag("alias"), multispace1), identifier)),
        ),
        open_brace,
    )
    .parse(input)
}

/// `ruleset Name {`
pub fn ruleset_header(input: &str) -> IResult<&str, &str> {
    delimited((tag("ruleset"), multispace1), identifier, open_brace).parse(input)
}

/// `section name {`
pub fn section_header(input: &str) -> IResult<&str, &str> {
    delimited((tag("section"), multispace1), identifier, open_brace).parse(input)
}

/// `global name {a, b}`
pub fn global_set(input: &str) -> IResult<&str, (&str, Vec<&str>)> {
    (
        preceded((tag("global"), multispace1), identifier),
        preceded(multispace0, set_literal),
    )
        .parse(input)
}

/// `preload #RRGGBB [#RRGGBB]`
pub fn preload(input: &str) -> IResult<&str, (Color, Option<Color>)> {
    (
        preceded((tag("preload"), multispace1), hex_color),
        opt(preceded(multispace1, hex_color)),
    )
        .parse(input)
}

/// `default name value`
pub fn default_value(input: &str) -> IResult<&str, (&str, f64)> {
    (
        preceded((tag("default"), multispace1), identifier),
        preceded(multispace1, double),
    )
        .parse(input)
}

/// `def name value` / `cdef name value`
pub fn property_def(input: &str) -> IResult<&str, (PropertyKind, &str, &str)> {
    (
        alt((
            map(tag("cdef"), |_| PropertyKind::Constant),
            map(tag("def"), |_| PropertyKind::Instance),
        )),
        preceded(multispace1, identifier),
        preceded(multispace1, take_while1(|c: char| !c.is_whitespace())),
    )
        .parse(input)
}

/// `def name {a, b}`
pub fn set_definition(input: &str) -> IResult<&str, (&str, Vec<&str>)> {
    (
        preceded((tag("def"), multispace1), identifier),
        preceded(multispace0, set_literal),
    )
        .parse(input)
}

/// `match (ox, oy, w, h) [sym(xy)] {`
pub fn match_header(input: &str) -> IResult<&str, MatchHeader<'_>> {
    let (input, (ox, oy, width, height)) = delimited(
        (tag("match"), multispace0, char('('), multispace0),
        (
            terminated(parse_u8, comma),
            terminated(parse_u8, comma),
            terminated(parse_u8, comma),
            parse_u8,
        ),
        (multispace0, char(')')),
    )
    .parse(input)?;
    let (input, symmetry) = opt(preceded(
        (multispace0, tag("sym"), multispace0, char('('), multispace0),
        terminated(
            take_while(|c: char| c.is_ascii_alphabetic()),
            (multispace0, char(')')),
        ),
    ))
    .parse(input)?;
    let (input, _) = open_brace(input)?;
    Ok((
        input,
        MatchHeader {
            ox,
            oy,
            width,
            height,
            symmetry,
        },
    ))
}

/// `-> [P-prob] {`
pub fn effect_header(input: &str) -> IResult<&str, Option<f64>> {
    delimited(
        (tag("->"), multispace0),
        opt(preceded((char('P'), multispace0, char('-'), multispace0), double)),
        open_brace,
    )
    .parse(input)
}

fn flag(input: &str) -> IResult<&str, (&str, &str)> {
    preceded(
        char('-'),
        separated_pair(identifier, char('='), take_while1(|c: char| !c.is_whitespace())),
    )
    .parse(input)
}

/// `inherit Name [-P=0.3]`
pub fn inherit(input: &str) -> IResult<&str, (&str, Vec<(&str, &str)>)> {
    (
        preceded((tag("inherit"), multispace1), identifier),
        many0(preceded(multispace1, flag)),
    )
        .parse(input)
}

/// `repeat match` / `repeat effect`
pub fn repeat(input: &str) -> IResult<&str, RepeatKind> {
    preceded(
        (tag("repeat"), multispace1),
        alt((
            map(tag("match"), |_| RepeatKind::Match),
            map(tag("effect"), |_| RepeatKind::Effect),
        )),
    )
    .parse(input)
}

fn ext_param(input: &str) -> IResult<&str, (&str, &str)> {
    separated_pair(
        identifier,
        (multispace0, char('='), multispace0),
        map(is_not(",)"), str::trim),
    )
    .parse(input)
}

/// `ext name (k=v, ...)`
pub fn extension(input: &str) -> IResult<&str, (&str, Vec<(&str, &str)>)> {
    (
        preceded((tag("ext"), multispace1), identifier),
        preceded(
            multispace0,
            delimited(
                (char('('), multispace0),
                separated_list0(comma, ext_param),
                (multispace0, char(')')),
            ),
        ),
    )
        .parse(input)
}

/// `shift(dx, dy)`
pub fn shift(input: &str) -> IResult<&str, (i32, i32)> {
    delimited(
        (tag("shift"), multispace0, char('('), multispace0),
        separated_pair(parse_i32, comma, parse_i32),
        (multispace0, char(')')),
    )
    .parse(input)
}

/// `def sym = (x, y)`
pub fn bind(input: &str) -> IResult<&str, (&str, (u8, u8))> {
    (
        preceded((tag("def"), multispace1), identifier),
        preceded(
            (multispace0, char('='), multispace0),
            delimited(
                (char('('), multispace0),
                separated_pair(parse_u8, comma, parse_u8),
                (multispace0, char(')')),
            ),
        ),
    )
        .parse(input)
}

fn property_ref(input: &str) -> IResult<&str, PropertyRef<'_>> {
    map(delimited(char('['), variable_token, char(']')), |(name, coord)| {
        PropertyRef { name, coord }
    })
    .parse(input)
}

/// `set [p] = expr`
pub fn set_step(input: &str) -> IResult<&str, (PropertyRef<'_>, &str)> {
    (
        preceded((tag("set"), multispace1), property_ref),
        preceded((multispace0, char('='), multispace0), rest),
    )
        .parse(input)
}

/// `inc [p] by expr`
pub fn inc_step(input: &str) -> IResult<&str, (PropertyRef<'_>, &str)> {
    (
        preceded((tag("inc"), multispace1), property_ref),
        preceded((multispace1, tag("by"), multispace1), rest),
    )
        .parse(input)
}

/// `clamp [p] in lo, hi`; the bounds are split by the caller
pub fn clamp_step(input: &str) -> IResult<&str, (PropertyRef<'_>, &str)> {
    (
        preceded((tag("clamp"), multispace1), property_ref),
        preceded((multispace1, tag("in"), multispace1), rest),
    )
        .parse(input)
}

/// `eval expr`
pub fn eval_condition(input: &str) -> IResult<&str, &str> {
    preceded((tag("eval"), multispace1), rest).parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword() {
        assert_eq!(keyword("match (0, 0, 1, 2) {"), "match");
        assert_eq!(keyword("-> P-0.5 {"), "->");
        assert_eq!(keyword("non-break"), "non-break");
        assert_eq!(keyword("shift(1, 0)"), "shift");
        assert_eq!(keyword("[temp] > 3 => 1, 2, 3"), "");
    }

    #[test]
    fn test_split_top_level() {
        assert_eq!(
            split_top_level("[a - 0, 1], max(1, 2)"),
            vec!["[a - 0, 1]", "max(1, 2)"]
        );
        assert_eq!(split_top_level("1"), vec!["1"]);
    }

    #[test]
    fn test_atom_header() {
        assert_eq!(atom_header("atom Sand {"), Ok(("", ("Sand", None))));
        assert_eq!(
            atom_header("atom Water alias L {"),
            Ok(("", ("Water", Some("L"))))
        );
        assert!(atom_header("atom {").is_err());
    }

    #[test]
    fn test_hex_color() {
        assert_eq!(hex_color("#FF8000"), Ok(("", Color::new(255, 128, 0))));
        assert_eq!(hex_color("#ff8000"), Ok(("", Color::new(255, 128, 0))));
        assert!(hex_color("#FF80").is_err());
    }

    #[test]
    fn test_preload() {
        let (_, (a, b)) = preload("preload #000000 #0A0A0A").unwrap();
        assert_eq!(a, Color::BLACK);
        assert_eq!(b, Some(Color::new(10, 10, 10)));
    }

    #[test]
    fn test_global_set() {
        let (_, (name, members)) = global_set("global solid {Sand, Stone, ^L}").unwrap();
        assert_eq!(name, "solid");
        assert_eq!(members, vec!["Sand", "Stone", "^L"]);
    }

    #[test]
    fn test_match_header() {
        let (_, header) = match_header("match (0, 0, 1, 2) sym(xy) {").unwrap();
        assert_eq!(
            header,
            MatchHeader {
                ox: 0,
                oy: 0,
                width: 1,
                height: 2,
                symmetry: Some("xy"),
            }
        );
        let (_, header) = match_header("match(1,0,3,1){").unwrap();
        assert_eq!(header.symmetry, None);
        assert_eq!((header.ox, header.width), (1, 3));
    }

    #[test]
    fn test_effect_header() {
        assert_eq!(effect_header("-> {"), Ok(("", None)));
        assert_eq!(effect_header("-> P-0.5 {"), Ok(("", Some(0.5))));
    }

    #[test]
    fn test_property_def() {
        assert_eq!(
            property_def("cdef size 3"),
            Ok(("", (PropertyKind::Constant, "size", "3")))
        );
        assert_eq!(
            property_def("def color #FFFFFF"),
            Ok(("", (PropertyKind::Instance, "color", "#FFFFFF")))
        );
    }

    #[test]
    fn test_inherit_flags() {
        let (_, (name, flags)) = inherit("inherit Sand -P=0.3").unwrap();
        assert_eq!(name, "Sand");
        assert_eq!(flags, vec![("P", "0.3")]);
    }

    #[test]
    fn test_extension() {
        let (_, (name, params)) = extension("ext sandLike (repl=liquid, prob=0.5)").unwrap();
        assert_eq!(name, "sandLike");
        assert_eq!(params, vec![("repl", "liquid"), ("prob", "0.5")]);
    }

    #[test]
    fn test_steps() {
        let (_, (target, expr)) = set_step("set [temp - 1, 0] = [temp] + 1").unwrap();
        assert_eq!(target.name, "temp");
        assert_eq!(target.coord, Some((1, 0)));
        assert_eq!(expr, "[temp] + 1");

        let (_, (target, expr)) = inc_step("inc [count] by 2").unwrap();
        assert_eq!((target.name, target.coord, expr), ("count", None, "2"));

        let (_, (_, bounds)) = clamp_step("clamp [temp] in 0, 100").unwrap();
        assert_eq!(split_top_level(bounds), vec!["0", "100"]);

        assert_eq!(bind("def a = (0, 1)"), Ok(("", ("a", (0, 1)))));
        assert_eq!(shift("shift(-1, 0)"), Ok(("", (-1, 0))));
    }

    #[test]
    fn test_parse_full_reports_trailing() {
        let err = parse_full("repeat match now", "repeat", repeat).unwrap_err();
        assert!(matches!(err, CompileErrorKind::Trailing { .. }));
        let err = parse_full("repeat nothing", "repeat", repeat).unwrap_err();
        assert!(matches!(err, CompileErrorKind::Syntax { .. }));
    }
}
