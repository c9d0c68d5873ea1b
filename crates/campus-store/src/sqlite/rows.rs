//! Row mapping between SQLite and domain records
//!
//! Rows are read as raw text first and converted afterwards, so corrupt
//! values surface as `StoreError::Storage` instead of a rusqlite type error.
//! Timestamps are RFC 3339 with fixed nanosecond precision, which keeps the
//! text lexicographically ordered.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;

use campus_org::{
    AcademicUnit, DomainError, MembershipRecord, MembershipRole, Metadata, School, SchoolRecord,
    UnitId, UnitMembership, UnitRecord, UnitType,
};

use crate::error::{StoreError, StoreResult};
use crate::path::UnitPath;

pub const SCHOOL_COLUMNS: &str =
    "id, name, code, address, contact_email, contact_phone, metadata, created_at, updated_at";

pub const UNIT_COLUMNS: &str = "id, parent_unit_id, school_id, unit_type, display_name, code, \
     description, metadata, path, depth, created_at, updated_at, deleted_at";

pub const MEMBERSHIP_COLUMNS: &str =
    "id, unit_id, user_id, role, valid_from, valid_until, metadata, created_at, updated_at";

pub fn format_ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn parse_ts(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Storage(format!("corrupt timestamp '{}': {}", raw, e)))
}

fn parse_opt_ts(raw: Option<String>) -> StoreResult<Option<DateTime<Utc>>> {
    raw.as_deref().map(parse_ts).transpose()
}

fn parse_id<T>(raw: &str) -> StoreResult<T>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse::<T>()
        .map_err(|e| StoreError::Storage(format!("corrupt id column: {}", e)))
}

fn parse_metadata(raw: &str) -> StoreResult<Metadata> {
    Metadata::from_json(raw).map_err(|e| StoreError::Storage(format!("corrupt metadata: {}", e)))
}

/// Raw `schools` row.
pub struct SchoolRow {
    id: String,
    name: String,
    code: String,
    address: String,
    contact_email: Option<String>,
    contact_phone: String,
    metadata: String,
    created_at: String,
    updated_at: String,
}

impl SchoolRow {
    pub fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            code: row.get(2)?,
            address: row.get(3)?,
            contact_email: row.get(4)?,
            contact_phone: row.get(5)?,
            metadata: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    pub fn into_school(self) -> StoreResult<School> {
        let record = SchoolRecord {
            id: parse_id(&self.id)?,
            name: self.name,
            code: self.code,
            address: self.address,
            contact_email: self.contact_email,
            contact_phone: self.contact_phone,
            metadata: parse_metadata(&self.metadata)?,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        };
        Ok(School::from_record(record)?)
    }
}

/// Raw `academic_units` row.
pub struct UnitRow {
    id: String,
    parent_unit_id: Option<String>,
    school_id: String,
    unit_type: String,
    display_name: String,
    code: String,
    description: Option<String>,
    metadata: String,
    path: String,
    depth: i64,
    created_at: String,
    updated_at: String,
    deleted_at: Option<String>,
}

impl UnitRow {
    pub fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(0)?,
            parent_unit_id: row.get(1)?,
            school_id: row.get(2)?,
            unit_type: row.get(3)?,
            display_name: row.get(4)?,
            code: row.get(5)?,
            description: row.get(6)?,
            metadata: row.get(7)?,
            path: row.get(8)?,
            depth: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
            deleted_at: row.get(12)?,
        })
    }

    /// Unit plus its stored path. A depth column out of step with the path
    /// is reported as corruption.
    pub fn into_placed(self) -> StoreResult<(AcademicUnit, UnitPath)> {
        let path = UnitPath::parse(&self.path)
            .map_err(|e| StoreError::Storage(format!("corrupt path column: {}", e)))?;
        if path.depth() as i64 != self.depth {
            return Err(StoreError::Storage(format!(
                "unit {} has depth {} but path depth {}",
                self.id,
                self.depth,
                path.depth()
            )));
        }
        let unit_type = UnitType::parse(&self.unit_type)
            .ok_or_else(|| StoreError::Storage(format!("unknown unit type '{}'", self.unit_type)))?;
        let record = UnitRecord {
            id: parse_id(&self.id)?,
            parent_unit_id: self.parent_unit_id.as_deref().map(parse_id::<UnitId>).transpose()?,
            school_id: parse_id(&self.school_id)?,
            unit_type,
            display_name: self.display_name,
            code: self.code,
            description: self.description,
            metadata: parse_metadata(&self.metadata)?,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            deleted_at: parse_opt_ts(self.deleted_at)?,
        };
        Ok((AcademicUnit::from_record(record)?, path))
    }

    pub fn into_unit(self) -> StoreResult<AcademicUnit> {
        self.into_placed().map(|(unit, _)| unit)
    }
}

/// Raw `unit_memberships` row.
pub struct MembershipRow {
    id: String,
    unit_id: String,
    user_id: String,
    role: String,
    valid_from: String,
    valid_until: Option<String>,
    metadata: String,
    created_at: String,
    updated_at: String,
}

impl MembershipRow {
    pub fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(0)?,
            unit_id: row.get(1)?,
            user_id: row.get(2)?,
            role: row.get(3)?,
            valid_from: row.get(4)?,
            valid_until: row.get(5)?,
            metadata: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    pub fn into_membership(self) -> StoreResult<UnitMembership> {
        let role = MembershipRole::parse(&self.role)
            .ok_or_else(|| StoreError::Storage(format!("unknown membership role '{}'", self.role)))?;
        let record = MembershipRecord {
            id: parse_id(&self.id)?,
            unit_id: parse_id(&self.unit_id)?,
            user_id: parse_id(&self.user_id)?,
            role,
            valid_from: parse_ts(&self.valid_from)?,
            valid_until: parse_opt_ts(self.valid_until)?,
            metadata: parse_metadata(&self.metadata)?,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        };
        Ok(UnitMembership::from_record(record)?)
    }
}
