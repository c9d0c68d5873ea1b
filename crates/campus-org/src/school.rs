//! School domain model
//!
//! A school is the tenant root of the academic hierarchy. Units reference
//! their school by id; the school never holds unit objects in memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::ids::SchoolId;
use crate::metadata::Metadata;

const MIN_NAME_LEN: usize = 3;
const MIN_CODE_LEN: usize = 3;

/// A school registered on the platform.
///
/// # Examples
///
/// ```
/// use campus_org::School;
///
/// let school = School::new("Acme Academy", "ACM").unwrap();
/// assert_eq!(school.name(), "Acme Academy");
/// assert!(School::new("Ac", "ACM").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct School {
    id: SchoolId,
    name: String,
    code: String,
    address: String,
    contact_email: Option<String>,
    contact_phone: String,
    metadata: Metadata,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Flat persistence representation of a [`School`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchoolRecord {
    pub id: SchoolId,
    pub name: String,
    pub code: String,
    pub address: String,
    pub contact_email: Option<String>,
    pub contact_phone: String,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl School {
    /// Creates a new school with a freshly generated id.
    ///
    /// # Errors
    ///
    /// `Validation` if `name` or `code` is shorter than three characters.
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> DomainResult<Self> {
        let name = name.into().trim().to_string();
        let code = code.into().trim().to_string();
        validate_name(&name)?;
        validate_code(&code)?;

        let now = Utc::now();
        Ok(Self {
            id: SchoolId::new(),
            name,
            code,
            address: String::new(),
            contact_email: None,
            contact_phone: String::new(),
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuilds a school from storage.
    pub fn from_record(record: SchoolRecord) -> DomainResult<Self> {
        if record.id.is_zero() {
            return Err(DomainError::validation("school id cannot be empty"));
        }
        Ok(Self {
            id: record.id,
            name: record.name,
            code: record.code,
            address: record.address,
            contact_email: record.contact_email,
            contact_phone: record.contact_phone,
            metadata: record.metadata,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    /// Flattens the school for storage.
    pub fn to_record(&self) -> SchoolRecord {
        SchoolRecord {
            id: self.id,
            name: self.name.clone(),
            code: self.code.clone(),
            address: self.address.clone(),
            contact_email: self.contact_email.clone(),
            contact_phone: self.contact_phone.clone(),
            metadata: self.metadata.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn id(&self) -> SchoolId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn contact_email(&self) -> Option<&str> {
        self.contact_email.as_deref()
    }

    pub fn contact_phone(&self) -> &str {
        &self.contact_phone
    }

    /// Snapshot of the metadata bag.
    pub fn metadata(&self) -> Metadata {
        self.metadata.clone()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Updates descriptive fields. At least one field must be supplied.
    pub fn update_info(
        &mut self,
        name: Option<&str>,
        code: Option<&str>,
        address: Option<&str>,
    ) -> DomainResult<()> {
        if name.is_none() && code.is_none() && address.is_none() {
            return Err(DomainError::validation(
                "at least one of name, code or address must be provided",
            ));
        }
        let name = name.map(str::trim);
        let code = code.map(str::trim);
        if let Some(name) = name {
            validate_name(name)?;
        }
        if let Some(code) = code {
            validate_code(code)?;
        }

        if let Some(name) = name {
            self.name = name.to_string();
        }
        if let Some(code) = code {
            self.code = code.to_string();
        }
        if let Some(address) = address {
            self.address = address.trim().to_string();
        }
        self.touch();
        Ok(())
    }

    /// Sets contact details. An email, when given, must look like `user@host.tld`.
    pub fn set_contact(&mut self, email: Option<&str>, phone: impl Into<String>) -> DomainResult<()> {
        let email = email.map(str::trim).filter(|e| !e.is_empty());
        if let Some(email) = email {
            validate_email(email)?;
        }
        self.contact_email = email.map(str::to_string);
        self.contact_phone = phone.into().trim().to_string();
        self.touch();
        Ok(())
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) -> DomainResult<()> {
        self.metadata.insert(key, value)?;
        self.touch();
        Ok(())
    }

    pub fn remove_metadata(&mut self, key: &str) -> Option<serde_json::Value> {
        let removed = self.metadata.remove(key);
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    /// Replaces the whole metadata bag.
    pub fn replace_metadata(&mut self, metadata: Metadata) {
        self.metadata = metadata;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn validate_name(name: &str) -> DomainResult<()> {
    if name.chars().count() < MIN_NAME_LEN {
        return Err(DomainError::validation(format!(
            "school name must be at least {} characters",
            MIN_NAME_LEN
        )));
    }
    Ok(())
}

fn validate_code(code: &str) -> DomainResult<()> {
    if code.chars().count() < MIN_CODE_LEN {
        return Err(DomainError::validation(format!(
            "school code must be at least {} characters",
            MIN_CODE_LEN
        )));
    }
    Ok(())
}

fn validate_email(email: &str) -> DomainResult<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid {
        return Err(DomainError::validation(format!("invalid contact email: {}", email)));
    }
    Ok(())
}
