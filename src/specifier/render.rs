//! Re-derive a specifier around a new version, keeping the written style

use super::range::{Op, Part, Partial, Range, Term, TermKind};
use super::RegistrySpecifier;
use semver::Version;

/// How a range reaches a target it does not permit yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Move the range to the target
    Replace,
    /// Keep the current range and add an alternative permitting the target
    Widen,
}

/// Render a new specifier for `target`
///
/// Operator, precision, wildcards, `v` prefix and any `npm:` alias are kept.
/// A prerelease target is always written at full precision.
pub fn render(spec: &RegistrySpecifier, target: &Version, mode: RenderMode) -> String {
    let range_text = spec.range_text.trim();
    let rendered = match mode {
        RenderMode::Widen if is_widenable(&spec.range) => {
            let alternative = spec
                .range
                .single_term()
                .map(|term| render_term(term, target))
                .unwrap_or_else(|| format!("^{}", target));
            format!("{} || {}", range_text, alternative)
        }
        _ => render_range(&spec.range, range_text, target),
    };

    match &spec.alias {
        Some(alias) => format!("npm:{}@{}", alias, rendered),
        None => rendered,
    }
}

/// Single caret, tilde, bare or `=` terms are widened with `||`
fn is_widenable(range: &Range) -> bool {
    range.single_term().is_some_and(keeps_style_in_alternative)
}

fn keeps_style_in_alternative(term: &Term) -> bool {
    matches!(
        term.kind,
        TermKind::Caret(_) | TermKind::Tilde(_) | TermKind::Bare(_) | TermKind::Cmp(Op::Eq, _)
    )
}

fn render_range(range: &Range, range_text: &str, target: &Version) -> String {
    match range.clauses.as_slice() {
        [clause] => {
            if clause.terms.is_empty() {
                return range_text.to_string();
            }
            clause
                .terms
                .iter()
                .map(|term| match term.kind {
                    // Lower bounds of an AND set stay as written
                    TermKind::Cmp(Op::Gt | Op::Gte, _) if clause.terms.len() > 1 => {
                        term.text.clone()
                    }
                    _ => render_term(term, target),
                })
                .collect::<Vec<_>>()
                .join(" ")
        }
        clauses => {
            let alternative = clauses
                .last()
                .and_then(|clause| match clause.terms.as_slice() {
                    [term] if keeps_style_in_alternative(term) => Some(render_term(term, target)),
                    _ => None,
                })
                .unwrap_or_else(|| format!("^{}", target));
            format!("{} || {}", range_text, alternative)
        }
    }
}

fn render_term(term: &Term, target: &Version) -> String {
    match &term.kind {
        TermKind::Caret(p) | TermKind::Tilde(p) | TermKind::Cmp(Op::Eq | Op::Gte | Op::Lte, p) => {
            format!("{}{}", term.lead, format_partial(p, target))
        }
        TermKind::Bare(p) => format_partial(p, target),
        // `>V` would exclude the target itself
        TermKind::Cmp(Op::Gt, p) => format!(">={}", format_partial(p, target)),
        TermKind::Cmp(Op::Lt, p) => {
            let next_major = Version::new(target.major.saturating_add(1), 0, 0);
            format!("{}{}", term.lead, format_partial(p, &next_major))
        }
        TermKind::Hyphen {
            lower_text, upper, ..
        } => format!("{} - {}", lower_text, format_partial(upper, target)),
    }
}

/// Write `target` with the precision and wildcards of `p`
fn format_partial(p: &Partial, target: &Version) -> String {
    let prefix = if p.v_prefix { "v" } else { "" };
    if p.is_full() || !target.pre.is_empty() {
        return format!("{}{}", prefix, core_version(target));
    }
    let numbers = [target.major, target.minor, target.patch];
    let parts: Vec<String> = p
        .parts
        .iter()
        .zip(numbers)
        .map(|(part, n)| match part {
            Part::Num(_) => n.to_string(),
            Part::Wild(c) => c.to_string(),
        })
        .collect();
    format!("{}{}", prefix, parts.join("."))
}

/// Version without build metadata
fn core_version(v: &Version) -> String {
    if v.pre.is_empty() {
        format!("{}.{}.{}", v.major, v.minor, v.patch)
    } else {
        format!("{}.{}.{}-{}", v.major, v.minor, v.patch, v.pre)
    }
}
