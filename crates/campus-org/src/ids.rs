//! Strongly-typed identifiers
//!
//! Every entity is keyed by its own UUID newtype so a `UnitId` can never be
//! passed where a `SchoolId` is expected. The nil UUID is the "not set"
//! sentinel and is never produced by `new()`.

use uuid::Uuid;

/// Defines a UUID-backed identifier newtype and generates:
/// - derives (Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)
/// - `new()` (UUID v7), `nil()`, `is_zero()`, `as_uuid()`
/// - `Display`, `FromStr`, `Default` (nil)
/// - `From<Uuid>` and `From<$name> for Uuid`
///
/// Usage:
///   define_id!(SchoolId, "school");
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Copy,
            Clone,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh, time-ordered identifier.
            pub fn new() -> Self {
                $name(Uuid::now_v7())
            }

            /// The "not set" sentinel.
            pub const fn nil() -> Self {
                $name(Uuid::nil())
            }

            /// Check if this is the "not set" sentinel.
            pub fn is_zero(&self) -> bool {
                self.0.is_nil()
            }

            /// Borrow the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Kind of entity this identifier refers to.
            pub const fn label() -> &'static str {
                $label
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::nil()
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::write!(f, "{}", self.0)
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::error::DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map($name).map_err(|e| {
                    $crate::error::DomainError::validation(format!(
                        "invalid {} id '{}': {}",
                        $label, s, e
                    ))
                })
            }
        }

        impl ::std::convert::From<Uuid> for $name {
            fn from(v: Uuid) -> Self {
                $name(v)
            }
        }

        impl ::std::convert::From<$name> for Uuid {
            fn from(v: $name) -> Self {
                v.0
            }
        }
    };
}

define_id!(
    /// Identifier of a [`School`](crate::School).
    SchoolId,
    "school"
);
define_id!(
    /// Identifier of an [`AcademicUnit`](crate::AcademicUnit).
    UnitId,
    "academic unit"
);
define_id!(
    /// Identifier of a [`UnitMembership`](crate::UnitMembership).
    MembershipId,
    "membership"
);
define_id!(
    /// Identifier of a platform user. Users live outside this crate.
    UserId,
    "user"
);
