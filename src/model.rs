use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::convert::TryFrom;
use thiserror::Error;

pub const VMNAME_PATTERN: &str = r"^[a-zA-Z0-9_-]+$";
pub const ACTION_ALLOW: &str = "allow";
pub const ACTION_REJECT: &str = "reject";

static VMNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(VMNAME_PATTERN).unwrap());

/// Positional layout of an `entries` row:
/// (id, vmname, comment, source, service, action, input_source).
pub type Row = (i64, String, String, String, String, String, String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("vmname {value:?} must match pattern: {pattern}")]
    Vmname { value: String, pattern: &'static str },
    #[error("action {value:?} must be one of: [allow, reject]")]
    Action { value: String },
}

impl ValidationError {
    /// Name of the offending field.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::Vmname { .. } => "vmname",
            ValidationError::Action { .. } => "action",
        }
    }
}

pub fn validate_vmname(name: &str) -> Result<(), ValidationError> {
    if VMNAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::Vmname {
            value: name.to_string(),
            pattern: VMNAME_PATTERN,
        })
    }
}

pub fn validate_action(action: &str) -> Result<(), ValidationError> {
    match action {
        ACTION_ALLOW | ACTION_REJECT => Ok(()),
        _ => Err(ValidationError::Action {
            value: action.to_string(),
        }),
    }
}

/// Raw, unvalidated field values for an entry, as received from a client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryFields {
    #[serde(default)]
    pub id: Option<i64>,
    pub vmname: String,
    pub comment: String,
    pub source: String,
    pub service: String,
    /// `None` only when the field was omitted; an explicit `null` is rejected.
    #[serde(default, deserialize_with = "present")]
    pub action: Option<String>,
    pub input_source: String,
}

fn present<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(Some)
}

/// A firewall rule entry. Only constructible through validation (or by
/// decoding a stored row), so `vmname` and `action` always hold valid values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EntryFields")]
pub struct Entry {
    id: Option<i64>,
    vmname: String,
    comment: String,
    source: String,
    service: String,
    action: String,
    input_source: String,
}

impl Entry {
    pub fn construct(fields: EntryFields) -> Result<Entry, ValidationError> {
        validate_vmname(&fields.vmname)?;
        let action = fields.action.unwrap_or_else(|| ACTION_ALLOW.to_string());
        validate_action(&action)?;

        Ok(Entry {
            id: fields.id,
            vmname: fields.vmname,
            comment: fields.comment,
            source: fields.source,
            service: fields.service,
            action,
            input_source: fields.input_source,
        })
    }

    /// Rows were validated on their way in, so nothing is re-checked here.
    pub fn decode_row(row: Row) -> Entry {
        let (id, vmname, comment, source, service, action, input_source) = row;
        Entry {
            id: Some(id),
            vmname,
            comment,
            source,
            service,
            action,
            input_source,
        }
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn vmname(&self) -> &str {
        &self.vmname
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn input_source(&self) -> &str {
        &self.input_source
    }

    /// The six fields that make two entries the same logical rule. The
    /// store-assigned id is not part of it.
    pub fn identity(&self) -> [&str; 6] {
        [
            &self.vmname,
            &self.comment,
            &self.source,
            &self.service,
            &self.action,
            &self.input_source,
        ]
    }

    pub fn same_entry(&self, other: &Entry) -> bool {
        self.identity() == other.identity()
    }
}

impl TryFrom<EntryFields> for Entry {
    type Error = ValidationError;

    fn try_from(fields: EntryFields) -> Result<Self, Self::Error> {
        Entry::construct(fields)
    }
}
