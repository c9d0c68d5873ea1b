//! Materialized paths
//!
//! A [`UnitPath`] is the ordered list of unit ids from a root down to a unit,
//! inclusive. Its text form joins the 32-character simple hex of each id with
//! `.`, which keeps every label the same width. Two consequences the stores
//! rely on:
//!
//! - lexicographic order of the text equals the derived `Ord` on the path, so
//!   a B-tree or SQL index sorted by path lists every ancestor before its
//!   descendants;
//! - the descendants of `p` are exactly the paths in the open range
//!   `(p + ".", p + "/")`, since `/` is the byte after `.`.

use std::fmt;
use std::str::FromStr;

use campus_org::{DomainError, DomainResult, UnitId};
use uuid::Uuid;

/// Separator between path labels.
pub const SEPARATOR: char = '.';

/// Root-to-self chain of unit ids.
///
/// # Examples
///
/// ```
/// use campus_org::UnitId;
/// use campus_store::UnitPath;
///
/// let school = UnitId::new();
/// let grade = UnitId::new();
/// let path = UnitPath::root(school).child(grade);
///
/// assert_eq!(path.depth(), 2);
/// assert_eq!(path.last(), grade);
/// assert_eq!(path.to_string().parse::<UnitPath>().unwrap(), path);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitPath(Vec<UnitId>);

impl UnitPath {
    /// Path of a root unit.
    pub fn root(id: UnitId) -> Self {
        Self(vec![id])
    }

    /// Path of a direct child of this path's unit.
    pub fn child(&self, id: UnitId) -> Self {
        let mut ids = Vec::with_capacity(self.0.len() + 1);
        ids.extend_from_slice(&self.0);
        ids.push(id);
        Self(ids)
    }

    /// Builds a path from root-to-self ids.
    ///
    /// # Errors
    ///
    /// `Validation` if `ids` is empty, contains a nil id or repeats an id.
    pub fn from_ids(ids: Vec<UnitId>) -> DomainResult<Self> {
        if ids.is_empty() {
            return Err(DomainError::validation("path must contain at least one unit"));
        }
        for (i, id) in ids.iter().enumerate() {
            if id.is_zero() {
                return Err(DomainError::validation("path cannot contain an empty unit id"));
            }
            if ids[..i].contains(id) {
                return Err(DomainError::validation(format!(
                    "path repeats unit {}",
                    id
                )));
            }
        }
        Ok(Self(ids))
    }

    /// Parses the dotted text form. Hyphenated UUID labels are accepted too.
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(DomainError::validation("path cannot be empty"));
        }
        let ids = raw
            .split(SEPARATOR)
            .map(|label| {
                Uuid::parse_str(label)
                    .map(UnitId::from)
                    .map_err(|e| DomainError::validation(format!("invalid path label '{}': {}", label, e)))
            })
            .collect::<DomainResult<Vec<_>>>()?;
        Self::from_ids(ids)
    }

    /// Number of units on the path; a root has depth 1.
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// The unit this path leads to.
    pub fn last(&self) -> UnitId {
        // never empty: every constructor pushes at least one id
        self.0[self.0.len() - 1]
    }

    /// The root unit of the path.
    pub fn first(&self) -> UnitId {
        self.0[0]
    }

    /// Path of the parent unit, `None` for a root.
    pub fn parent(&self) -> Option<UnitPath> {
        if self.0.len() < 2 {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// Strict ancestors, root first.
    pub fn ancestors(&self) -> &[UnitId] {
        &self.0[..self.0.len() - 1]
    }

    /// Every id on the path, root first.
    pub fn ids(&self) -> &[UnitId] {
        &self.0
    }

    pub fn contains(&self, id: UnitId) -> bool {
        self.0.contains(&id)
    }

    /// True when `prefix` is this path or one of its ancestors' paths.
    pub fn starts_with(&self, prefix: &UnitPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// True when this path is a strict prefix of `other`.
    pub fn is_ancestor_of(&self, other: &UnitPath) -> bool {
        other.0.len() > self.0.len() && other.starts_with(self)
    }

    /// Replaces `old_prefix` with `new_prefix`, or `None` if this path does
    /// not start with `old_prefix`.
    pub fn rebase(&self, old_prefix: &UnitPath, new_prefix: &UnitPath) -> Option<UnitPath> {
        if !self.starts_with(old_prefix) {
            return None;
        }
        let mut ids = Vec::with_capacity(new_prefix.0.len() + self.0.len() - old_prefix.0.len());
        ids.extend_from_slice(&new_prefix.0);
        ids.extend_from_slice(&self.0[old_prefix.0.len()..]);
        Some(Self(ids))
    }

    /// Lower bound (exclusive) of the descendant range in text form.
    pub fn descendant_lower_bound(&self) -> String {
        format!("{}{}", self, SEPARATOR)
    }

    /// Upper bound (exclusive) of the descendant range in text form.
    pub fn descendant_upper_bound(&self) -> String {
        format!("{}/", self)
    }
}

impl fmt::Display for UnitPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", SEPARATOR)?;
            }
            write!(f, "{}", id.as_uuid().simple())?;
        }
        Ok(())
    }
}

impl FromStr for UnitPath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
