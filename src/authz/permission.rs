//! Permissions and the wildcard implication algebra.
//!
//! A wildcard permission is a `:`-separated list of parts, each part a
//! `,`-separated set of tokens. `*` at a position matches any token.
//!
//! ```text
//! printer:print:*        implies  printer:print:laserjet2000
//! blogEntry:edit         implies  blogEntry:edit:any-id
//! printer:print,query    implies  printer:query
//! printer:print          does not imply  printer
//! ```
//!
//! Missing trailing parts on the granting side behave as `*`. Missing trailing
//! parts on the requested side are only covered when every extra part of the
//! granting side is `*`.

use std::{collections::BTreeSet, fmt, hash, str::FromStr, sync::Arc};

use super::error::PermissionFormatError;

pub const WILDCARD_TOKEN: &str = "*";
pub const PART_DIVIDER: char = ':';
pub const SUBPART_DIVIDER: char = ',';

/// One `:`-delimited position of a wildcard permission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Part {
    /// `*`, or an empty part.
    Any,
    /// An enumerated set of tokens.
    Tokens(BTreeSet<String>),
}

impl Part {
    pub fn is_any(&self) -> bool {
        matches!(self, Part::Any)
    }

    /// Whether this part covers `other` at the same position.
    pub fn implies(&self, other: &Part) -> bool {
        match (self, other) {
            (Part::Any, _) => true,
            (Part::Tokens(_), Part::Any) => false,
            (Part::Tokens(mine), Part::Tokens(theirs)) => theirs.is_subset(mine),
        }
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Part::Any => f.write_str(WILDCARD_TOKEN),
            Part::Tokens(tokens) => {
                for (i, token) in tokens.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{SUBPART_DIVIDER}")?;
                    }
                    f.write_str(token)?;
                }
                Ok(())
            }
        }
    }
}

/// A parsed `part:part:part` permission.
///
/// Parts live behind an `Arc`, so clones share storage and a resolver can
/// hand the same value to every account that names the same string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WildcardPermission {
    parts: Arc<[Part]>,
    case_sensitive: bool,
}

impl WildcardPermission {
    /// Parse with case-insensitive tokens (tokens are lowercased).
    pub fn parse(input: &str) -> Result<Self, PermissionFormatError> {
        Self::parse_with(input, false)
    }

    /// Parse keeping token case as written.
    pub fn parse_case_sensitive(input: &str) -> Result<Self, PermissionFormatError> {
        Self::parse_with(input, true)
    }

    fn parse_with(input: &str, case_sensitive: bool) -> Result<Self, PermissionFormatError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(PermissionFormatError::Empty);
        }
        if trimmed
            .chars()
            .all(|c| c == PART_DIVIDER || c == SUBPART_DIVIDER || c.is_whitespace())
        {
            return Err(PermissionFormatError::OnlyDividers(input.to_string()));
        }

        let mut parts = Vec::new();
        for (index, raw_part) in trimmed.split(PART_DIVIDER).enumerate() {
            let raw_part = raw_part.trim();
            if raw_part.is_empty() {
                parts.push(Part::Any);
                continue;
            }

            let mut tokens = BTreeSet::new();
            let mut any = false;
            for raw_token in raw_part.split(SUBPART_DIVIDER) {
                let token = raw_token.trim();
                if token.is_empty() {
                    return Err(PermissionFormatError::EmptyToken {
                        input: input.to_string(),
                        part: index,
                    });
                }
                if token == WILDCARD_TOKEN {
                    any = true;
                } else if case_sensitive {
                    tokens.insert(token.to_string());
                } else {
                    tokens.insert(token.to_lowercase());
                }
            }

            parts.push(if any { Part::Any } else { Part::Tokens(tokens) });
        }

        Ok(Self {
            parts: parts.into(),
            case_sensitive,
        })
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn implies(&self, other: &WildcardPermission) -> bool {
        for (i, theirs) in other.parts.iter().enumerate() {
            match self.parts.get(i) {
                // Shorter grant: everything below it is covered.
                None => return true,
                Some(mine) if !mine.implies(theirs) => return false,
                Some(_) => {}
            }
        }

        self.parts[other.parts.len().min(self.parts.len())..]
            .iter()
            .all(Part::is_any)
    }
}

impl fmt::Display for WildcardPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                write!(f, "{PART_DIVIDER}")?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

impl FromStr for WildcardPermission {
    type Err = PermissionFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// An application-defined permission check.
///
/// Implementations decide which permissions they cover. Reflexivity is the
/// implementation's responsibility.
pub trait PermissionPredicate: fmt::Debug + Send + Sync {
    fn implies(&self, other: &Permission) -> bool;
}

/// A permission an account can hold or a check can ask for.
#[derive(Debug, Clone)]
pub enum Permission {
    Wildcard(WildcardPermission),
    /// An opaque string compared for exact equality.
    Literal(String),
    Custom(Arc<dyn PermissionPredicate>),
}

impl Permission {
    /// Parse a wildcard permission string.
    pub fn parse(input: &str) -> Result<Self, PermissionFormatError> {
        WildcardPermission::parse(input).map(Self::Wildcard)
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    pub fn custom(predicate: impl PermissionPredicate + 'static) -> Self {
        Self::Custom(Arc::new(predicate))
    }

    /// Whether holding `self` grants `other`.
    pub fn implies(&self, other: &Permission) -> bool {
        match (self, other) {
            (Self::Wildcard(mine), Self::Wildcard(theirs)) => mine.implies(theirs),
            (Self::Wildcard(_), _) => false,
            (Self::Literal(mine), Self::Literal(theirs)) => mine == theirs,
            // Read the literal the way the wildcard was read.
            (Self::Literal(mine), Self::Wildcard(theirs)) => {
                WildcardPermission::parse_with(mine, theirs.case_sensitive)
                    .is_ok_and(|parsed| parsed.parts == theirs.parts)
            }
            (Self::Literal(_), Self::Custom(_)) => false,
            (Self::Custom(predicate), other) => predicate.implies(other),
        }
    }
}

impl PartialEq for Permission {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Wildcard(a), Self::Wildcard(b)) => a == b,
            (Self::Literal(a), Self::Literal(b)) => a == b,
            (Self::Custom(a), Self::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Permission {}

impl hash::Hash for Permission {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Wildcard(p) => p.hash(state),
            Self::Literal(s) => s.hash(state),
            Self::Custom(p) => (Arc::as_ptr(p) as *const () as usize).hash(state),
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wildcard(p) => write!(f, "{p}"),
            Self::Literal(s) => f.write_str(s),
            Self::Custom(p) => write!(f, "{p:?}"),
        }
    }
}

impl FromStr for Permission {
    type Err = PermissionFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<WildcardPermission> for Permission {
    fn from(permission: WildcardPermission) -> Self {
        Self::Wildcard(permission)
    }
}

/// Free-function form of [`Permission::implies`].
pub fn implies(granted: &Permission, requested: &Permission) -> bool {
    granted.implies(requested)
}

/// Whether any permission in `granted` implies `requested`.
pub fn any_implies<'a>(
    granted: impl IntoIterator<Item = &'a Permission>,
    requested: &Permission,
) -> bool {
    granted.into_iter().any(|p| p.implies(requested))
}
