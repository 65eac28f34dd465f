/**
 * INGESTION - Validation and recording of one update report
 *
 * ROLE:
 * Turns a raw JSON report into an `UpdateEntry` and appends it to the
 * server's history. Windows and Linux share this path; the only differences
 * (OS tag, name of the installed-updates list) come from `OsKind`.
 *
 * RULES:
 * - required fields must be present and truthy, checked in a fixed order
 * - `so` and `server_received_at` are always set here, never taken from input
 * - missing package list => [], missing error_details => null
 */

use patchwatch_store::entry::format_received_at;
use patchwatch_store::{OsKind, RecordStore, ServerId, StoreError, UpdateEntry};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use tracing::info;

/// Required report fields, in the order they are checked.
pub const REQUIRED_FIELDS: [&str; 5] = [
    "server_name",
    "ip_address",
    "update_status",
    "report_timestamp",
    "ambiente",
];

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("invalid request body: {0}")]
    InvalidBody(String),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid value for field: {0}")]
    InvalidField(&'static str),
    #[error("failed to format reception time: {0}")]
    Clock(#[from] time::error::Format),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
    #[error("ingest worker failed: {0}")]
    Worker(String),
}

impl IngestError {
    /// Field the caller got wrong, if any.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            IngestError::MissingField(field) | IngestError::InvalidField(field) => Some(*field),
            _ => None,
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            IngestError::InvalidBody(_) | IngestError::MissingField(_) | IngestError::InvalidField(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    pub server_id: ServerId,
    pub history_count: usize,
}

/// Parses a request body into a JSON object, whatever the content type said.
pub fn parse_payload(body: &[u8]) -> Result<Map<String, Value>, IngestError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(IngestError::InvalidBody("expected a JSON object".into())),
        Err(e) => Err(IngestError::InvalidBody(e.to_string())),
    }
}

/// JSON truthiness: null, false, 0, "", [] and {} are all "missing".
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn required_str(payload: &Map<String, Value>, field: &'static str) -> Result<String, IngestError> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or(IngestError::InvalidField(field))
}

fn package_list(payload: &Map<String, Value>, field: &'static str) -> Result<Vec<String>, IngestError> {
    match payload.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value) => serde_json::from_value(value.clone()).map_err(|_| IngestError::InvalidField(field)),
    }
}

/// Validates a report and shapes it into the entry that will be stored.
pub fn build_entry(
    os: OsKind,
    payload: &Map<String, Value>,
    received_at: OffsetDateTime,
) -> Result<UpdateEntry, IngestError> {
    if let Some(missing) = REQUIRED_FIELDS
        .iter()
        .find(|field| !payload.get(**field).is_some_and(is_truthy))
    {
        return Err(IngestError::MissingField(*missing));
    }

    let packages = package_list(payload, os.packages_field())?;
    let (installed_kbs, installed_packages) = match os {
        OsKind::Windows => (Some(packages), None),
        OsKind::Linux => (None, Some(packages)),
    };

    Ok(UpdateEntry {
        server_name: required_str(payload, "server_name")?,
        ip_address: required_str(payload, "ip_address")?,
        update_status: required_str(payload, "update_status")?,
        installed_kbs,
        installed_packages,
        error_details: payload.get("error_details").cloned().unwrap_or(Value::Null),
        report_timestamp: required_str(payload, "report_timestamp")?,
        server_received_at: format_received_at(received_at)?,
        ambiente: required_str(payload, "ambiente")?,
        so: os,
    })
}

/// Validates and appends one report; returns the server's new history size.
pub fn ingest(
    store: &RecordStore,
    os: OsKind,
    payload: &Map<String, Value>,
) -> Result<IngestOutcome, IngestError> {
    let entry = build_entry(os, payload, OffsetDateTime::now_utc())?;
    let server_id = ServerId::from_server_name(&entry.server_name);
    let history_count = store.append(&server_id, &entry)?;

    info!(
        os = os.tag(),
        server = %entry.server_name,
        server_id = %server_id,
        status = %entry.update_status,
        history_count,
        "update report recorded"
    );
    Ok(IngestOutcome { server_id, history_count })
}
