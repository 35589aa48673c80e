use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Error body returned by the record service on non-2xx responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub mod transaction {
    use std::{collections::BTreeSet, fmt};

    use super::*;

    /// Opaque, stable identifier of a transaction record.
    ///
    /// This is serialized as a plain string in JSON.
    #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct RecordId(String);

    impl RecordId {
        pub fn as_str(&self) -> &str {
            &self.0
        }
    }

    impl fmt::Display for RecordId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.0)
        }
    }

    impl From<&str> for RecordId {
        fn from(value: &str) -> Self {
            Self(value.to_string())
        }
    }

    impl From<String> for RecordId {
        fn from(value: String) -> Self {
            Self(value)
        }
    }

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum RecordStatus {
        #[default]
        Pending,
        Categorized,
    }

    impl RecordStatus {
        pub fn as_str(self) -> &'static str {
            match self {
                Self::Pending => "pending",
                Self::Categorized => "categorized",
            }
        }
    }

    impl TryFrom<&str> for RecordStatus {
        type Error = String;

        fn try_from(value: &str) -> Result<Self, Self::Error> {
            match value {
                "pending" => Ok(Self::Pending),
                "categorized" => Ok(Self::Categorized),
                other => Err(format!("invalid record status: {other}")),
            }
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct TransactionRecord {
        pub id: RecordId,
        /// RFC3339 timestamp of the booking.
        pub date: DateTime<Utc>,
        pub description: String,
        /// Signed amount in minor units: positive = income, negative = expense.
        pub amount_minor: i64,
        #[serde(default)]
        pub origin: String,
        #[serde(default)]
        pub bank: String,
        #[serde(default)]
        pub status: RecordStatus,
        #[serde(default)]
        pub flagged: bool,
        #[serde(default)]
        pub major_category: Option<String>,
        #[serde(default)]
        pub category: Option<String>,
        #[serde(default)]
        pub tags: BTreeSet<String>,
        #[serde(default)]
        pub notes: Option<String>,
    }

    /// Sparse update payload.
    ///
    /// `None` means "leave unchanged". Unset fields are left out of the JSON
    /// body entirely so the service never sees them.
    #[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct RecordPatch {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub status: Option<RecordStatus>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub flagged: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub major_category: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub category: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub tags: Option<BTreeSet<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub notes: Option<String>,
    }

    impl RecordPatch {
        /// Returns `true` if no field is set.
        pub fn is_empty(&self) -> bool {
            self.status.is_none()
                && self.flagged.is_none()
                && self.major_category.is_none()
                && self.category.is_none()
                && self.tags.is_none()
                && self.notes.is_none()
        }

        /// Writes every set field onto `record`. Tags are replaced, not merged.
        pub fn apply_to(&self, record: &mut TransactionRecord) {
            if let Some(status) = self.status {
                record.status = status;
            }
            if let Some(flagged) = self.flagged {
                record.flagged = flagged;
            }
            if let Some(major_category) = &self.major_category {
                record.major_category = Some(major_category.clone());
            }
            if let Some(category) = &self.category {
                record.category = Some(category.clone());
            }
            if let Some(tags) = &self.tags {
                record.tags = tags.clone();
            }
            if let Some(notes) = &self.notes {
                record.notes = Some(notes.clone());
            }
        }
    }
}

pub mod import {
    use super::*;

    /// Request body for importing a bank export.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ImportRequest {
        pub file_name: String,
        pub bank: Option<String>,
        pub origin: Option<String>,
        /// Raw file contents; parsing happens server side.
        pub contents: String,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ImportSummary {
        pub imported: u64,
        pub duplicates: u64,
        /// Server-side completion time, when reported.
        #[serde(default)]
        pub finished_at: Option<DateTime<Utc>>,
    }
}
