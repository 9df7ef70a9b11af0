//! Parser for simulation parameter files.
//!
//! Each line holds one directive followed by whitespace-separated values:
//!
//! ```text
//! k 1 2 4
//! p 0.5 0.75 1.0
//! q 0.9 1.0
//! mu 10 100 inf
//! ```
//!
//! Repeated directives accumulate into the same set; duplicates collapse.
//! Lines starting with an unknown token are skipped with a warning, as are
//! values that do not parse or lie outside their valid range.

use anyhow::{Context, Result};
use nom::IResult;
use nom::bytes::complete::take_till1;
use nom::character::complete::{multispace0, multispace1};
use nom::combinator::all_consuming;
use nom::multi::many0;
use nom::number::complete::double;
use nom::sequence::preceded;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::Path;

/// Sorted set of distinct floating-point values.
///
/// Values are ordered by [`f64::total_cmp`]; negative zero is folded into
/// zero so it cannot appear as a separate entry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValueSet(Vec<f64>);

impl ValueSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `value`, returning false if it was already present.
    pub fn insert(&mut self, value: f64) -> bool {
        let value = if value == 0.0 { 0.0 } else { value };
        match self.0.binary_search_by(|probe| probe.total_cmp(&value)) {
            Ok(_) => false,
            Err(pos) => {
                self.0.insert(pos, value);
                true
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.0.iter().copied()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<f64> for ValueSet {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut set = ValueSet::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}

/// The swept parameter grid.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterGrid {
    pub k: BTreeSet<usize>,
    pub p: ValueSet,
    pub q: ValueSet,
    pub mu: ValueSet,
}

impl ParameterGrid {
    /// Returns every (p, q) pair in lexicographic order.
    ///
    /// This order is the slot order of the success counters. It depends
    /// only on the grid contents, so every worker derives the same one.
    pub fn combinations(&self) -> Vec<(f64, f64)> {
        self.p
            .iter()
            .flat_map(|p| self.q.iter().map(move |q| (p, q)))
            .collect()
    }
}

/// Directive opening a parameter line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Directive {
    K,
    P,
    Q,
    Mu,
}

impl Directive {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "k" => Some(Self::K),
            "p" => Some(Self::P),
            "q" => Some(Self::Q),
            "mu" => Some(Self::Mu),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::K => "k",
            Self::P => "p",
            Self::Q => "q",
            Self::Mu => "mu",
        }
    }
}

/// What was wrong with a skipped line or value.
#[derive(Clone, Debug, PartialEq)]
pub enum WarningKind {
    /// The first token of the line is not a known directive.
    UnknownDirective(String),
    /// A value could not be parsed as a number of the right kind.
    Malformed { directive: Directive, token: String },
    /// A value parsed but lies outside the directive's valid range.
    OutOfRange { directive: Directive, token: String },
}

/// A recoverable problem found while reading the parameter file.
#[derive(Clone, Debug, PartialEq)]
pub struct ParseWarning {
    /// One-based line number.
    pub line: usize,
    pub kind: WarningKind,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            WarningKind::UnknownDirective(token) => write!(
                f,
                "no parameter specified in parameter file line {} (unknown directive {:?})",
                self.line, token
            ),
            WarningKind::Malformed { directive, token } => write!(
                f,
                "line {}: cannot parse {:?} as a value of {}",
                self.line,
                token,
                directive.name()
            ),
            WarningKind::OutOfRange { directive, token } => write!(
                f,
                "line {}: value {} is out of range for {}",
                self.line,
                token,
                directive.name()
            ),
        }
    }
}

/// Grid read from a parameter file plus the problems skipped on the way.
#[derive(Clone, Debug, Default)]
pub struct ParsedParameters {
    pub grid: ParameterGrid,
    pub warnings: Vec<ParseWarning>,
}

fn token(input: &str) -> IResult<&str, &str> {
    take_till1(char::is_whitespace)(input)
}

/// Splits a line into its leading token and the value tokens after it.
fn line_tokens(input: &str) -> IResult<&str, (&str, Vec<&str>)> {
    let (input, _) = multispace0(input)?;
    let (input, head) = token(input)?;
    let (input, values) = many0(preceded(multispace1, token))(input)?;
    let (input, _) = multispace0(input)?;
    Ok((input, (head, values)))
}

fn parse_radius(token: &str) -> Option<u64> {
    all_consuming(nom::character::complete::u64::<&str, nom::error::Error<&str>>)(token)
        .ok()
        .map(|(_, value)| value)
}

fn parse_real(token: &str) -> Option<f64> {
    all_consuming(double::<&str, nom::error::Error<&str>>)(token)
        .ok()
        .map(|(_, value)| value)
}

impl ParsedParameters {
    fn apply_line(&mut self, line: usize, text: &str) {
        let Ok((_, (head, values))) = line_tokens(text) else {
            // blank line
            return;
        };
        let Some(directive) = Directive::parse(head) else {
            self.warnings.push(ParseWarning {
                line,
                kind: WarningKind::UnknownDirective(head.to_string()),
            });
            return;
        };

        for value in values {
            if let Err(kind) = self.insert_value(directive, value) {
                self.warnings.push(ParseWarning { line, kind });
            }
        }
    }

    fn insert_value(&mut self, directive: Directive, token: &str) -> Result<(), WarningKind> {
        let malformed = || WarningKind::Malformed {
            directive,
            token: token.to_string(),
        };
        let out_of_range = || WarningKind::OutOfRange {
            directive,
            token: token.to_string(),
        };

        let grid = &mut self.grid;
        match directive {
            Directive::K => {
                let k = parse_radius(token).ok_or_else(malformed)?;
                let k = usize::try_from(k).map_err(|_| out_of_range())?;
                if k == 0 {
                    return Err(out_of_range());
                }
                grid.k.insert(k);
            }
            Directive::P | Directive::Q => {
                let value = parse_real(token).ok_or_else(malformed)?;
                if !(0.0..=1.0).contains(&value) {
                    return Err(out_of_range());
                }
                if directive == Directive::P {
                    grid.p.insert(value);
                } else {
                    grid.q.insert(value);
                }
            }
            Directive::Mu => {
                let value = parse_real(token).ok_or_else(malformed)?;
                if value.is_nan() || value < 0.0 {
                    return Err(out_of_range());
                }
                grid.mu.insert(value);
            }
        }
        Ok(())
    }
}

/// Parses parameter-file text.
///
/// Never fails: every problem becomes a [`ParseWarning`] and the offending
/// line or value is skipped.
pub fn parse_parameters(text: &str) -> ParsedParameters {
    let mut parsed = ParsedParameters::default();
    for (i, line) in text.lines().enumerate() {
        parsed.apply_line(i + 1, line);
    }
    parsed
}

/// Loads and parses a parameter file.
///
/// # Arguments
///
/// * `path` - Path to the parameter file
///
/// # Returns
///
/// The parsed grid and its warnings, or an error if the file cannot be read.
pub fn load_parameter_file<P: AsRef<Path>>(path: P) -> Result<ParsedParameters> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read parameter file {}", path.display()))?;
    Ok(parse_parameters(&text))
}
