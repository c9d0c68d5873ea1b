//! Academic unit types
//!
//! The type of a unit fixes which children it may hold. The table is static
//! business policy:
//!
//! ```text
//! school ─┬─ grade ── section
//!         ├─ club
//!         └─ department
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;

/// Kind of node in the academic hierarchy.
///
/// # Examples
///
/// ```
/// use campus_org::UnitType;
///
/// assert!(UnitType::Grade.can_have_children());
/// assert_eq!(UnitType::Grade.allowed_child_types(), &[UnitType::Section]);
/// assert!(!UnitType::Section.can_have_children());
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UnitType {
    /// A school-level unit, the usual root of a tree
    School,

    /// A grade or year group
    Grade,

    /// A class section within a grade
    Section,

    /// An extracurricular club
    Club,

    /// A teaching or administrative department
    Department,
}

impl UnitType {
    /// Parse a unit type from its string representation (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "school" => Some(Self::School),
            "grade" => Some(Self::Grade),
            "section" => Some(Self::Section),
            "club" => Some(Self::Club),
            "department" => Some(Self::Department),
            _ => None,
        }
    }

    /// Get string representation of the unit type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::School => "school",
            Self::Grade => "grade",
            Self::Section => "section",
            Self::Club => "club",
            Self::Department => "department",
        }
    }

    /// Get all unit types.
    pub fn all() -> [UnitType; 5] {
        [
            Self::School,
            Self::Grade,
            Self::Section,
            Self::Club,
            Self::Department,
        ]
    }

    /// Check if units of this type may have children at all.
    pub fn can_have_children(&self) -> bool {
        !self.allowed_child_types().is_empty()
    }

    /// Unit types allowed directly beneath this one.
    pub fn allowed_child_types(&self) -> &'static [UnitType] {
        match self {
            Self::School => &[Self::Grade, Self::Club, Self::Department],
            Self::Grade => &[Self::Section],
            Self::Section | Self::Club | Self::Department => &[],
        }
    }

    /// Check if `child` may be placed directly beneath this type.
    pub fn can_have_child(&self, child: UnitType) -> bool {
        self.allowed_child_types().contains(&child)
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| DomainError::validation(format!("invalid unit type: {}", s)))
    }
}
