//! npm range grammar
//!
//! A range is kept twice: as the terms the user wrote (so it can be
//! re-rendered in the same style) and as desugared comparator sets
//! (so it can be matched). Supported syntax:
//! - exact versions with optional `=` / `v` prefix
//! - caret, tilde (`~` and `~>`) and primitive comparators
//! - X-ranges and partial versions (`1`, `1.2`, `1.x`, `1.2.*`, `*`, empty)
//! - hyphen ranges (`1.0.0 - 2.0.0`)
//! - space separated AND sets joined by `||`

use semver::{Prerelease, Version};
use std::cmp::Ordering;

/// One numeric component of a partial version, or a wildcard as written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Part {
    Num(u64),
    Wild(char),
}

/// A possibly incomplete version as written in a range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partial {
    /// Written with a leading `v`
    pub v_prefix: bool,
    /// Up to three components
    pub parts: Vec<Part>,
    /// Prerelease, only allowed on full versions
    pub pre: Prerelease,
}

impl Partial {
    /// Parse a partial version; build metadata is accepted and dropped
    pub fn parse(text: &str) -> Result<Self, String> {
        let (v_prefix, rest) = match text.strip_prefix(['v', 'V']) {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let rest = rest.split_once('+').map_or(rest, |(head, _)| head);
        let (core, pre) = match rest.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (rest, None),
        };
        if core.is_empty() {
            return Err(format!("missing version in '{}'", text));
        }

        let mut parts = Vec::new();
        for piece in core.split('.') {
            let part = match piece {
                "x" => Part::Wild('x'),
                "X" => Part::Wild('X'),
                "*" => Part::Wild('*'),
                _ if !piece.is_empty() && piece.bytes().all(|b| b.is_ascii_digit()) => Part::Num(
                    piece
                        .parse()
                        .map_err(|_| format!("version component '{}' is too large", piece))?,
                ),
                _ => return Err(format!("invalid version component '{}'", piece)),
            };
            if matches!(parts.last(), Some(Part::Wild(_))) && matches!(part, Part::Num(_)) {
                return Err(format!("number after wildcard in '{}'", text));
            }
            parts.push(part);
        }
        if parts.len() > 3 {
            return Err(format!("too many version components in '{}'", text));
        }

        let pre = match pre {
            Some(pre) => {
                if parts.len() != 3 || parts.iter().any(|p| matches!(p, Part::Wild(_))) {
                    return Err(format!("prerelease requires a full version in '{}'", text));
                }
                Prerelease::new(pre).map_err(|e| format!("invalid prerelease '{}': {}", pre, e))?
            }
            None => Prerelease::EMPTY,
        };

        Ok(Self {
            v_prefix,
            parts,
            pre,
        })
    }

    /// Numeric component at index, `None` when missing or a wildcard
    pub fn num(&self, index: usize) -> Option<u64> {
        match self.parts.get(index) {
            Some(Part::Num(n)) => Some(*n),
            _ => None,
        }
    }

    /// Number of leading numeric components
    pub fn numeric_len(&self) -> usize {
        self.parts
            .iter()
            .take_while(|p| matches!(p, Part::Num(_)))
            .count()
    }

    /// True for `*`, `x` and friends
    pub fn is_any(&self) -> bool {
        self.numeric_len() == 0
    }

    /// True when all three components are numbers
    pub fn is_full(&self) -> bool {
        self.numeric_len() == 3
    }

    /// Lowest version matching this partial, missing components filled with zero
    pub fn floor(&self) -> Version {
        let mut version = Version::new(
            self.num(0).unwrap_or(0),
            self.num(1).unwrap_or(0),
            self.num(2).unwrap_or(0),
        );
        if self.is_full() {
            version.pre = self.pre.clone();
        }
        version
    }
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// A single desugared comparator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparator {
    pub op: Op,
    pub version: Version,
}

impl Comparator {
    fn new(op: Op, version: Version) -> Self {
        Self { op, version }
    }

    /// Test a version against this comparator, ignoring build metadata
    pub fn matches(&self, version: &Version) -> bool {
        let ord = version.cmp_precedence(&self.version);
        match self.op {
            Op::Eq => ord == Ordering::Equal,
            Op::Gt => ord == Ordering::Greater,
            Op::Gte => ord != Ordering::Less,
            Op::Lt => ord == Ordering::Less,
            Op::Lte => ord != Ordering::Greater,
        }
    }

    fn is_lower_bound(&self) -> bool {
        matches!(self.op, Op::Eq | Op::Gt | Op::Gte)
    }
}

/// Shape of a term as written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermKind {
    /// `=`, `>`, `>=`, `<`, `<=` followed by a version
    Cmp(Op, Partial),
    /// `^1.2.3`
    Caret(Partial),
    /// `~1.2.3` or `~>1.2.3`
    Tilde(Partial),
    /// Plain version or X-range
    Bare(Partial),
    /// `a - b`
    Hyphen {
        lower: Partial,
        lower_text: String,
        upper: Partial,
    },
}

/// One term of an AND set, with its operator as written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub kind: TermKind,
    /// Operator exactly as written (`^`, `~>`, `>=`, or empty)
    pub lead: String,
    /// Term text, operator and version joined
    pub text: String,
}

impl Term {
    fn parse(token: &str) -> Result<Self, String> {
        const OPERATORS: [&str; 8] = ["~>", "~", "^", ">=", "<=", ">", "<", "="];
        let lead = OPERATORS
            .iter()
            .find(|op| token.starts_with(**op))
            .copied()
            .unwrap_or("");
        let rest = &token[lead.len()..];
        if rest.is_empty() {
            return Err(format!("operator '{}' has no version", lead));
        }
        let partial = Partial::parse(rest)?;
        let kind = match lead {
            "~>" | "~" => TermKind::Tilde(partial),
            "^" => TermKind::Caret(partial),
            ">=" => TermKind::Cmp(Op::Gte, partial),
            "<=" => TermKind::Cmp(Op::Lte, partial),
            ">" => TermKind::Cmp(Op::Gt, partial),
            "<" => TermKind::Cmp(Op::Lt, partial),
            "=" => TermKind::Cmp(Op::Eq, partial),
            _ => TermKind::Bare(partial),
        };
        Ok(Self {
            kind,
            lead: lead.to_string(),
            text: token.to_string(),
        })
    }

    fn comparators(&self) -> Vec<Comparator> {
        match &self.kind {
            TermKind::Bare(p) | TermKind::Cmp(Op::Eq, p) => x_range(p),
            TermKind::Caret(p) => caret(p),
            TermKind::Tilde(p) => tilde(p),
            TermKind::Cmp(op, p) => primitive(*op, p),
            TermKind::Hyphen { lower, upper, .. } => hyphen(lower, upper),
        }
    }

    /// The partial that anchors this term
    pub fn partial(&self) -> &Partial {
        match &self.kind {
            TermKind::Cmp(_, p) | TermKind::Caret(p) | TermKind::Tilde(p) | TermKind::Bare(p) => p,
            TermKind::Hyphen { lower, .. } => lower,
        }
    }
}

fn is_operator_only(token: &str) -> bool {
    matches!(token, "~>" | "~" | "^" | ">=" | "<=" | ">" | "<" | "=")
}

fn bump_major(major: u64) -> Version {
    Version::new(major.saturating_add(1), 0, 0)
}

fn bump_minor(major: u64, minor: u64) -> Version {
    Version::new(major, minor.saturating_add(1), 0)
}

fn x_range(p: &Partial) -> Vec<Comparator> {
    match (p.num(0), p.num(1), p.num(2)) {
        (None, _, _) => Vec::new(),
        (Some(major), None, _) => vec![
            Comparator::new(Op::Gte, p.floor()),
            Comparator::new(Op::Lt, bump_major(major)),
        ],
        (Some(major), Some(minor), None) => vec![
            Comparator::new(Op::Gte, p.floor()),
            Comparator::new(Op::Lt, bump_minor(major, minor)),
        ],
        (Some(_), Some(_), Some(_)) => vec![Comparator::new(Op::Eq, p.floor())],
    }
}

fn caret(p: &Partial) -> Vec<Comparator> {
    let upper = match (p.num(0), p.num(1), p.num(2)) {
        (None, _, _) => return Vec::new(),
        (Some(major), None, _) => bump_major(major),
        (Some(0), Some(minor), None) => bump_minor(0, minor),
        (Some(major), Some(_), None) => bump_major(major),
        (Some(0), Some(0), Some(patch)) => Version::new(0, 0, patch.saturating_add(1)),
        (Some(0), Some(minor), Some(_)) => bump_minor(0, minor),
        (Some(major), Some(_), Some(_)) => bump_major(major),
    };
    vec![
        Comparator::new(Op::Gte, p.floor()),
        Comparator::new(Op::Lt, upper),
    ]
}

fn tilde(p: &Partial) -> Vec<Comparator> {
    let upper = match (p.num(0), p.num(1)) {
        (None, _) => return Vec::new(),
        (Some(major), None) => bump_major(major),
        (Some(major), Some(minor)) => bump_minor(major, minor),
    };
    vec![
        Comparator::new(Op::Gte, p.floor()),
        Comparator::new(Op::Lt, upper),
    ]
}

fn primitive(op: Op, p: &Partial) -> Vec<Comparator> {
    if p.is_any() {
        return match op {
            Op::Gt | Op::Lt => vec![Comparator::new(Op::Lt, Version::new(0, 0, 0))],
            _ => Vec::new(),
        };
    }
    let major = p.num(0).unwrap_or(0);
    let minor = p.num(1).unwrap_or(0);
    match (op, p.numeric_len()) {
        (Op::Eq, _) => x_range(p),
        (Op::Gt, 3) => vec![Comparator::new(Op::Gt, p.floor())],
        (Op::Gt, 2) => vec![Comparator::new(Op::Gte, bump_minor(major, minor))],
        (Op::Gt, _) => vec![Comparator::new(Op::Gte, bump_major(major))],
        (Op::Gte, _) => vec![Comparator::new(Op::Gte, p.floor())],
        (Op::Lt, _) => vec![Comparator::new(Op::Lt, p.floor())],
        (Op::Lte, 3) => vec![Comparator::new(Op::Lte, p.floor())],
        (Op::Lte, 2) => vec![Comparator::new(Op::Lt, bump_minor(major, minor))],
        (Op::Lte, _) => vec![Comparator::new(Op::Lt, bump_major(major))],
    }
}

fn hyphen(lower: &Partial, upper: &Partial) -> Vec<Comparator> {
    let mut out = Vec::new();
    if !lower.is_any() {
        out.push(Comparator::new(Op::Gte, lower.floor()));
    }
    let major = upper.num(0).unwrap_or(0);
    match upper.numeric_len() {
        0 => {}
        1 => out.push(Comparator::new(Op::Lt, bump_major(major))),
        2 => out.push(Comparator::new(
            Op::Lt,
            bump_minor(major, upper.num(1).unwrap_or(0)),
        )),
        _ => out.push(Comparator::new(Op::Lte, upper.floor())),
    }
    out
}

/// An AND set of terms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub terms: Vec<Term>,
    comparators: Vec<Comparator>,
}

impl Clause {
    fn parse(text: &str) -> Result<Self, String> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let mut terms = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            if tokens.get(i + 1).copied() == Some("-") {
                let upper_text = tokens
                    .get(i + 2)
                    .ok_or_else(|| "hyphen range is missing its upper bound".to_string())?;
                let lower = Partial::parse(tokens[i])?;
                let upper = Partial::parse(upper_text)?;
                terms.push(Term {
                    kind: TermKind::Hyphen {
                        lower,
                        lower_text: tokens[i].to_string(),
                        upper,
                    },
                    lead: String::new(),
                    text: format!("{} - {}", tokens[i], upper_text),
                });
                i += 3;
                continue;
            }

            let term = if is_operator_only(tokens[i]) {
                let version = tokens
                    .get(i + 1)
                    .ok_or_else(|| format!("operator '{}' has no version", tokens[i]))?;
                i += 1;
                Term::parse(&format!("{}{}", tokens[i - 1], version))?
            } else {
                Term::parse(tokens[i])?
            };
            terms.push(term);
            i += 1;
        }

        let comparators = terms.iter().flat_map(Term::comparators).collect();
        Ok(Self { terms, comparators })
    }

    /// Desugared comparators; empty means any version
    pub fn comparators(&self) -> &[Comparator] {
        &self.comparators
    }

    fn satisfies(&self, version: &Version) -> bool {
        if !self.comparators.iter().all(|c| c.matches(version)) {
            return false;
        }
        if version.pre.is_empty() {
            return true;
        }
        // A prerelease only matches when a comparator opts into prereleases of the same tuple
        self.comparators.iter().any(|c| {
            !c.version.pre.is_empty()
                && c.version.major == version.major
                && c.version.minor == version.minor
                && c.version.patch == version.patch
        })
    }

    fn lower_bound(&self) -> Option<&Version> {
        self.comparators
            .iter()
            .filter(|c| c.is_lower_bound())
            .map(|c| &c.version)
            .max_by(|a, b| a.cmp_precedence(b))
    }
}

/// How a range reacts to a higher target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeStyle {
    /// A single floor-anchored term (`^1.2.3`, `~1.2`, `1.x`, `=1.2.3`, `>=1.0.0`)
    Floor,
    /// Anything with an explicit upper bound, several terms or several alternatives
    Bounded,
}

/// A parsed range: OR of AND sets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    pub clauses: Vec<Clause>,
}

impl Range {
    /// Parse an npm range
    pub fn parse(text: &str) -> Result<Self, String> {
        let clauses = text
            .split("||")
            .map(Clause::parse)
            .collect::<Result<Vec<_>, _>>()?;
        if clauses.len() > 1 && clauses.iter().any(|c| c.terms.is_empty()) {
            return Err("empty alternative in '||' range".to_string());
        }
        Ok(Self { clauses })
    }

    /// True if the version is permitted by any alternative
    pub fn satisfies(&self, version: &Version) -> bool {
        self.clauses.iter().any(|c| c.satisfies(version))
    }

    /// True if every non-prerelease version is permitted
    pub fn is_any(&self) -> bool {
        self.clauses.iter().any(|c| c.comparators.is_empty())
    }

    /// Lowest version the range can permit
    pub fn floor(&self) -> Version {
        self.clauses
            .iter()
            .map(|c| c.lower_bound().cloned().unwrap_or_else(|| Version::new(0, 0, 0)))
            .min_by(|a, b| a.cmp_precedence(b))
            .unwrap_or_else(|| Version::new(0, 0, 0))
    }

    /// True if every version permitted by the range is at least `version`
    pub fn is_at_least(&self, version: &Version) -> bool {
        self.floor().cmp_precedence(version) != Ordering::Less
    }

    /// True when every alternative has a lower bound
    pub fn has_lower_bound(&self) -> bool {
        self.clauses.iter().all(|c| c.lower_bound().is_some())
    }

    /// Version the range is anchored on, used by `minor` and `patch`
    ///
    /// This is the floor when every alternative has a lower bound, else the
    /// version written in the first term (`<2.0.0` anchors on 2.0.0).
    pub fn reference_version(&self) -> Version {
        if self.has_lower_bound() {
            return self.floor();
        }
        self.clauses
            .first()
            .and_then(|c| c.terms.first())
            .map(|t| t.partial().floor())
            .unwrap_or_else(|| Version::new(0, 0, 0))
    }

    /// Classify the range for rendering and the no-regression check
    pub fn style(&self) -> RangeStyle {
        match self.single_term() {
            Some(term) => match term.kind {
                TermKind::Caret(_)
                | TermKind::Tilde(_)
                | TermKind::Bare(_)
                | TermKind::Cmp(Op::Eq | Op::Gt | Op::Gte, _) => RangeStyle::Floor,
                _ => RangeStyle::Bounded,
            },
            None => RangeStyle::Bounded,
        }
    }

    /// The only term, when the range is a single term
    pub fn single_term(&self) -> Option<&Term> {
        match self.clauses.as_slice() {
            [clause] if clause.terms.len() == 1 => clause.terms.first(),
            _ => None,
        }
    }

    /// True for a single full version with no operator other than `=`
    pub fn is_exact(&self) -> bool {
        match self.single_term().map(|t| &t.kind) {
            Some(TermKind::Bare(p)) | Some(TermKind::Cmp(Op::Eq, p)) => p.is_full(),
            _ => false,
        }
    }
}
