//! Declared version specifiers
//!
//! Classifies a dependency's declared string into one of:
//! - exact registry versions (`1.2.3`, `=1.2.3`)
//! - registry ranges (`^1.2.3`, `~2.0`, `1.x`, `>=1 <2`, `a - b`, `||`)
//! - distribution tag references (`latest`, `next`)
//! - non-registry references (git, URL, path, workspace protocol), never resolved
//!
//! `npm:<name>@<range>` aliases are registry specifiers looked up under the
//! aliased name.

mod range;
mod render;

pub use range::{Comparator, Op, Part, Partial, Range, RangeStyle, Term, TermKind};
pub use render::{render, RenderMode};

use crate::error::SpecifierError;
use regex::Regex;
use semver::Version;
use std::sync::LazyLock;

/// Prefixes of references that are never resolved against the registry
const NON_REGISTRY_PREFIXES: &[(&str, ReferenceKind)] = &[
    ("git+", ReferenceKind::Git),
    ("git:", ReferenceKind::Git),
    ("git@", ReferenceKind::Git),
    ("github:", ReferenceKind::Git),
    ("gitlab:", ReferenceKind::Git),
    ("bitbucket:", ReferenceKind::Git),
    ("gist:", ReferenceKind::Git),
    ("http://", ReferenceKind::Url),
    ("https://", ReferenceKind::Url),
    ("file:", ReferenceKind::Path),
    ("link:", ReferenceKind::Path),
    ("portal:", ReferenceKind::Path),
    ("./", ReferenceKind::Path),
    ("../", ReferenceKind::Path),
    ("/", ReferenceKind::Path),
    ("~/", ReferenceKind::Path),
    ("workspace:", ReferenceKind::Workspace),
    ("catalog:", ReferenceKind::Workspace),
    ("patch:", ReferenceKind::Workspace),
    ("$", ReferenceKind::Reference),
];

/// `owner/repo` GitHub shorthand, optionally with a `#ref`
static GITHUB_SHORTHAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+/[A-Za-z0-9_.-]+(#.*)?$").unwrap());

/// Distribution tag name
static TAG_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9._-]*$").unwrap());

/// Kind of a reference the registry cannot resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Git,
    Url,
    Path,
    Workspace,
    /// `$name` override value pointing at another declared dependency
    Reference,
}

/// A specifier that resolves against the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySpecifier {
    /// Declared string, including any alias prefix
    pub raw: String,
    /// Package actually looked up, for `npm:` aliases
    pub alias: Option<String>,
    /// Range text after the alias prefix
    pub range_text: String,
    /// Parsed range
    pub range: Range,
}

/// A classified declared specifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Specifier {
    /// A single full version
    Exact(RegistrySpecifier),
    /// Any other registry range
    Range(RegistrySpecifier),
    /// A distribution tag such as `latest`
    Tag {
        raw: String,
        alias: Option<String>,
        tag: String,
    },
    /// git, URL, path or workspace reference
    NonRegistry { raw: String, kind: ReferenceKind },
}

impl Specifier {
    /// Parse a declared specifier
    pub fn parse(raw: &str) -> Result<Self, SpecifierError> {
        let trimmed = raw.trim();

        if let Some(kind) = detect_reference(trimmed) {
            return Ok(Specifier::NonRegistry {
                raw: trimmed.to_string(),
                kind,
            });
        }

        let (alias, body) = match trimmed.strip_prefix("npm:") {
            Some(rest) => {
                let (name, body) = split_alias(rest);
                if name.is_empty() {
                    return Err(SpecifierError::parse(raw, "alias is missing a package name"));
                }
                (Some(name.to_string()), body)
            }
            None => (None, trimmed),
        };

        match Range::parse(body) {
            Ok(range) => {
                let spec = RegistrySpecifier {
                    raw: trimmed.to_string(),
                    alias,
                    range_text: body.to_string(),
                    range,
                };
                if spec.range.is_exact() {
                    Ok(Specifier::Exact(spec))
                } else {
                    Ok(Specifier::Range(spec))
                }
            }
            Err(_) if is_tag(body) => Ok(Specifier::Tag {
                raw: trimmed.to_string(),
                alias,
                tag: body.to_string(),
            }),
            Err(message) => Err(SpecifierError::parse(raw, message)),
        }
    }

    /// Declared string
    pub fn raw(&self) -> &str {
        match self {
            Specifier::Exact(spec) | Specifier::Range(spec) => &spec.raw,
            Specifier::Tag { raw, .. } | Specifier::NonRegistry { raw, .. } => raw,
        }
    }

    /// Registry part, for exact versions and ranges
    pub fn registry(&self) -> Option<&RegistrySpecifier> {
        match self {
            Specifier::Exact(spec) | Specifier::Range(spec) => Some(spec),
            _ => None,
        }
    }

    /// Name to look up in the registry
    pub fn lookup_name<'a>(&'a self, declared: &'a str) -> &'a str {
        let alias = match self {
            Specifier::Exact(spec) | Specifier::Range(spec) => spec.alias.as_deref(),
            Specifier::Tag { alias, .. } => alias.as_deref(),
            Specifier::NonRegistry { .. } => None,
        };
        alias.unwrap_or(declared)
    }

    /// True if the specifier permits the version; tags and references permit nothing
    pub fn satisfies(&self, version: &Version) -> bool {
        self.registry()
            .is_some_and(|spec| spec.range.satisfies(version))
    }

    /// True if every version the specifier permits is at least `version`
    pub fn is_at_least(&self, version: &Version) -> bool {
        self.registry()
            .is_some_and(|spec| spec.range.is_at_least(version))
    }
}

/// Parse a declared specifier
pub fn parse(raw: &str) -> Result<Specifier, SpecifierError> {
    Specifier::parse(raw)
}

fn detect_reference(raw: &str) -> Option<ReferenceKind> {
    if let Some((_, kind)) = NON_REGISTRY_PREFIXES
        .iter()
        .find(|(prefix, _)| raw.starts_with(prefix))
    {
        return Some(*kind);
    }
    if raw.ends_with(".tgz") || raw.ends_with(".tar.gz") {
        return Some(ReferenceKind::Path);
    }
    if GITHUB_SHORTHAND.is_match(raw) {
        return Some(ReferenceKind::Git);
    }
    None
}

/// Split `name@range` where name may be scoped (`@scope/name@^1`)
fn split_alias(rest: &str) -> (&str, &str) {
    let search_from = usize::from(rest.starts_with('@'));
    match rest[search_from..].find('@') {
        Some(at) => {
            let at = at + search_from;
            (&rest[..at], &rest[at + 1..])
        }
        None => (rest, ""),
    }
}

fn is_tag(body: &str) -> bool {
    TAG_NAME.is_match(body)
}
