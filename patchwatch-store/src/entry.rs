use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::macros::offset;
use time::{OffsetDateTime, UtcOffset};

/// Offset used for `server_received_at` (UTC-3, Brasília).
pub const RECEIVED_AT_OFFSET: UtcOffset = offset!(-3);

/// Operating-system family of a reporting server.
///
/// Decided by the endpoint that received the report, never by the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OsKind {
    Windows,
    Linux,
}

impl OsKind {
    /// Value stored in the `so` field.
    pub fn tag(self) -> &'static str {
        match self {
            OsKind::Windows => "Windows",
            OsKind::Linux => "Linux",
        }
    }

    /// Name of the OS-specific list of installed updates.
    pub fn packages_field(self) -> &'static str {
        match self {
            OsKind::Windows => "installed_kbs",
            OsKind::Linux => "installed_packages",
        }
    }
}

/// One update report as written to a server history.
///
/// Field order is the on-disk order. Exactly one of `installed_kbs` /
/// `installed_packages` is present, depending on `so`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateEntry {
    pub server_name: String,
    pub ip_address: String,
    pub update_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_kbs: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_packages: Option<Vec<String>>,
    #[serde(default)]
    pub error_details: serde_json::Value,
    pub report_timestamp: String,
    pub server_received_at: String,
    pub ambiente: String,
    pub so: OsKind,
}

/// Formats a reception instant in the fixed UTC-3 offset (RFC 3339).
pub fn format_received_at(at: OffsetDateTime) -> Result<String, time::error::Format> {
    at.to_offset(RECEIVED_AT_OFFSET).format(&Rfc3339)
}
