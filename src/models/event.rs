//! Object-store change notifications consumed by the reconciliation worker.

use serde::{Deserialize, Deserializer, Serialize};

/// Kind of object-store change carried by a notification record.
///
/// Unrecognized kinds deserialize to [`ChangeKind::Unknown`] so that a single
/// unexpected record never fails an entire batch.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Removed,
    Unknown,
}

impl<'de> Deserialize<'de> for ChangeKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(match value.as_str() {
            "created" => ChangeKind::Created,
            "removed" => ChangeKind::Removed,
            _ => ChangeKind::Unknown,
        })
    }
}

/// One object-store change notification.
///
/// `size_bytes` is only reliably present on creation events; removal events
/// from the store do not carry a trustworthy size.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ChangeRecord {
    pub kind: ChangeKind,

    /// Affected object key, e.g. `projects/{project_id}/{token}-{name}`.
    pub key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<i64>,
}

/// An ordered batch of change notifications.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ChangeBatch {
    #[serde(default)]
    pub records: Vec<ChangeRecord>,
}
