/**
 * FLEET AGGREGATOR - One normalized view of every server history
 *
 * ROLE:
 * Reads every `*.json` file of the data directory, merges their content and
 * normalizes each entry so the dashboard always sees the same keys.
 *
 * HOW IT WORKS:
 * - file holding an array => all its elements, file holding an object => one entry
 * - unreadable or unparsable file => `FileScan::Corrupt`, logged and skipped
 * - missing directory => empty view
 * - `normalize_entry` fills absent keys with null and cleans `so` / `update_status`
 *
 * One bad file never blanks the dashboard.
 */

use patchwatch_store::is_history_file;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, warn};

/// Statuses the agents are expected to send.
pub const KNOWN_STATUSES: [&str; 3] = ["SUCCESS", "FAILED", "NO_UPDATES_FOUND"];

/// Keys every aggregated entry carries, null when the source file lacked them.
const NULLABLE_FIELDS: [&str; 8] = [
    "server_name",
    "ip_address",
    "ambiente",
    "report_timestamp",
    "installed_kbs",
    "installed_packages",
    "error_details",
    "so",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedView {
    pub count: usize,
    pub items: Vec<Value>,
    pub generated_at: String,
}

/// Result of reading one data file.
#[derive(Debug, Clone, PartialEq)]
pub enum FileScan {
    Parsed(Vec<Value>),
    Corrupt { path: PathBuf, reason: String },
}

pub struct FleetAggregator {
    data_dir: PathBuf,
}

impl FleetAggregator {
    pub fn new<P: Into<PathBuf>>(data_dir: P) -> Self {
        Self { data_dir: data_dir.into() }
    }

    /// Full scan + normalization, stamped with the current UTC time.
    pub fn build(&self) -> AggregatedView {
        let items: Vec<Value> = collect_entries(&self.data_dir)
            .into_iter()
            .map(|mut entry| {
                normalize_entry(&mut entry);
                Value::Object(entry)
            })
            .collect();

        debug!(count = items.len(), dir = %self.data_dir.display(), "fleet view rebuilt");
        AggregatedView {
            count: items.len(),
            items,
            generated_at: stamp(OffsetDateTime::now_utc()),
        }
    }
}

/// RFC 3339 rendering of `at`; empty (and logged) if the instant cannot be formatted.
fn stamp(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_else(|e| {
        warn!("cannot format generated_at: {e}");
        String::new()
    })
}

/// `*.json` files directly under `dir`, sorted by name.
pub fn json_files(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(dir = %dir.display(), "data directory missing, empty fleet view");
            return Vec::new();
        }
        Err(e) => {
            warn!(dir = %dir.display(), "cannot list data directory: {e}");
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(e) => {
                warn!(dir = %dir.display(), "skipping unreadable directory entry: {e}");
                None
            }
        })
        .filter(|path| is_history_file(path) && path.is_file())
        .collect();
    files.sort();
    files
}

pub fn scan_file(path: &Path) -> FileScan {
    let corrupt = |reason: String| FileScan::Corrupt { path: path.to_path_buf(), reason };

    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => return corrupt(e.to_string()),
    };
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Array(items)) => FileScan::Parsed(items),
        Ok(obj @ Value::Object(_)) => FileScan::Parsed(vec![obj]),
        Ok(_) => corrupt("unexpected top-level JSON (expected array or object)".into()),
        Err(e) => corrupt(e.to_string()),
    }
}

/// Merged entries of every readable file, in file-name then append order.
pub fn collect_entries(dir: &Path) -> Vec<Map<String, Value>> {
    let mut merged = Vec::new();
    for path in json_files(dir) {
        match scan_file(&path) {
            FileScan::Parsed(items) => {
                for item in items {
                    match item {
                        Value::Object(entry) => merged.push(entry),
                        other => warn!(
                            path = %path.display(),
                            "skipping non-object entry: {other}"
                        ),
                    }
                }
            }
            FileScan::Corrupt { path, reason } => {
                warn!(path = %path.display(), %reason, "skipping unreadable data file");
            }
        }
    }
    merged
}

/// Trim + capitalize, then snap anything starting with win/lin to the canonical tag.
pub fn normalize_os(raw: &str) -> String {
    let cleaned = capitalize(raw.trim());
    let lower = cleaned.to_lowercase();
    if lower.starts_with("win") {
        "Windows".to_string()
    } else if lower.starts_with("lin") {
        "Linux".to_string()
    } else {
        cleaned
    }
}

/// Trim + uppercase; an empty result is no status at all.
pub fn normalize_status(raw: &str) -> Option<String> {
    let cleaned = raw.trim().to_uppercase();
    if cleaned.is_empty() {
        return None;
    }
    if !KNOWN_STATUSES.contains(&cleaned.as_str()) {
        debug!(status = %cleaned, "unrecognized update status kept as-is");
    }
    Some(cleaned)
}

// First char upper (when it maps to a single char), rest lower.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let mut upper = first.to_uppercase();
    let head = match (upper.next(), upper.next()) {
        (Some(c), None) => c,
        _ => first,
    };
    let mut out = String::with_capacity(s.len());
    out.push(head);
    out.push_str(&chars.as_str().to_lowercase());
    out
}

/// Normalizes one merged entry in place. Applying it twice changes nothing.
pub fn normalize_entry(entry: &mut Map<String, Value>) {
    for field in NULLABLE_FIELDS {
        entry.entry(field).or_insert(Value::Null);
    }

    if let Some(Value::String(so)) = entry.get("so") {
        let normalized = normalize_os(so);
        entry.insert("so".into(), Value::String(normalized));
    }

    let status = match entry.get("update_status") {
        Some(Value::String(raw)) => normalize_status(raw).map(Value::String).unwrap_or(Value::Null),
        _ => Value::Null,
    };
    entry.insert("update_status".into(), status);
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use time::macros::datetime;
    use time::UtcOffset;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn os_spelling_drift_is_absorbed() {
        assert_eq!(normalize_os("  windows server 2019 "), "Windows");
        assert_eq!(normalize_os("WIN"), "Windows");
        assert_eq!(normalize_os("linux"), "Linux");
        assert_eq!(normalize_os("LINUX-ubuntu"), "Linux");
        assert_eq!(normalize_os(" freeBSD "), "Freebsd");
        assert_eq!(normalize_os(""), "");
    }

    #[test]
    fn status_is_cleaned_never_invented() {
        assert_eq!(normalize_status(" success "), Some("SUCCESS".into()));
        assert_eq!(normalize_status("no_updates_found"), Some("NO_UPDATES_FOUND".into()));
        assert_eq!(normalize_status("partial"), Some("PARTIAL".into()));
        assert_eq!(normalize_status("   "), None);
    }

    #[test]
    fn entry_gets_the_full_key_set() {
        let mut entry = object(json!({"update_status": "failed", "so": "win"}));
        normalize_entry(&mut entry);
        for field in NULLABLE_FIELDS {
            assert!(entry.contains_key(field), "missing {field}");
        }
        assert_eq!(entry["so"], "Windows");
        assert_eq!(entry["update_status"], "FAILED");
        assert!(entry["installed_kbs"].is_null());
    }

    #[test]
    fn present_values_are_kept() {
        let mut entry = object(json!({
            "server_name": "web01",
            "installed_kbs": ["KB1"],
            "error_details": {"code": 5},
            "so": 42,
            "update_status": 7,
            "server_received_at": "2024-01-01T00:00:00-03:00"
        }));
        normalize_entry(&mut entry);
        assert_eq!(entry["server_name"], "web01");
        assert_eq!(entry["installed_kbs"], json!(["KB1"]));
        assert_eq!(entry["error_details"], json!({"code": 5}));
        assert_eq!(entry["so"], 42);
        assert!(entry["update_status"].is_null());
        assert_eq!(entry["server_received_at"], "2024-01-01T00:00:00-03:00");
    }

    #[test]
    fn missing_directory_is_an_empty_view() {
        let dir = tempfile::tempdir().unwrap();
        let view = FleetAggregator::new(dir.path().join("nope")).build();
        assert_eq!(view.count, 0);
        assert!(view.items.is_empty());
        assert!(view.generated_at.ends_with('Z'));
    }

    #[test]
    fn unformattable_stamp_is_empty() {
        let at = datetime!(2024-01-01 12:00 UTC);
        assert_eq!(stamp(at), "2024-01-01T12:00:00Z");

        let odd_offset = UtcOffset::from_hms(0, 0, 30).unwrap();
        assert_eq!(stamp(at.to_offset(odd_offset)), "");
    }

    #[test]
    fn arrays_and_single_objects_are_merged() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("a.json"),
            json!([{"server_name": "a", "so": "Windows"}, {"server_name": "a", "so": "Windows"}]).to_string(),
        )
        .unwrap();
        fs::write(dir.path().join("b.json"), json!({"server_name": "b", "so": "linux"}).to_string()).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        fs::write(dir.path().join("c.json.tmp"), "[{\"server_name\": \"c\"}]").unwrap();

        let view = FleetAggregator::new(dir.path()).build();
        assert_eq!(view.count, 3);
        let names: Vec<&str> = view.items.iter().map(|i| i["server_name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["a", "a", "b"]);
        assert_eq!(view.items[2]["so"], "Linux");
    }

    #[test]
    fn corrupt_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("good.json"),
            json!([{"server_name": "good", "update_status": "SUCCESS"}]).to_string(),
        )
        .unwrap();
        fs::write(dir.path().join("bad.json"), "[{\"server_name\": \"bad\", \"upd").unwrap();
        fs::write(dir.path().join("scalar.json"), "42").unwrap();

        assert!(matches!(scan_file(&dir.path().join("bad.json")), FileScan::Corrupt { .. }));
        assert!(matches!(scan_file(&dir.path().join("scalar.json")), FileScan::Corrupt { .. }));

        let view = FleetAggregator::new(dir.path()).build();
        assert_eq!(view.count, 1);
        assert_eq!(view.items[0]["server_name"], "good");
    }

    #[test]
    fn non_object_elements_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("mixed.json"), r#"[{"server_name": "x"}, 3, "y", null]"#).unwrap();
        assert_eq!(collect_entries(dir.path()).len(), 1);
    }

    fn arb_text() -> impl Strategy<Value = String> {
        prop_oneof![
            "[ a-zA-Z_]{0,12}",
            Just("windows".to_string()),
            Just(" Linux ".to_string()),
            Just("success".to_string()),
            Just("No_Updates_Found ".to_string()),
        ]
    }

    fn arb_field() -> impl Strategy<Value = Option<Value>> {
        prop_oneof![
            Just(None),
            Just(Some(Value::Null)),
            arb_text().prop_map(|s| Some(Value::String(s))),
            any::<i64>().prop_map(|n| Some(json!(n))),
            proptest::collection::vec("[a-z0-9]{1,6}", 0..3).prop_map(|v| Some(json!(v))),
        ]
    }

    fn arb_entry() -> impl Strategy<Value = Map<String, Value>> {
        let keys = ["server_name", "ip_address", "ambiente", "so", "update_status", "installed_kbs", "error_details"];
        proptest::collection::vec(arb_field(), keys.len()).prop_map(move |values| {
            let mut entry = Map::new();
            for (key, value) in keys.iter().zip(values) {
                if let Some(value) = value {
                    entry.insert((*key).to_string(), value);
                }
            }
            entry
        })
    }

    proptest! {
        #[test]
        fn normalization_is_idempotent(entry in arb_entry()) {
            let mut once = entry.clone();
            normalize_entry(&mut once);
            let mut twice = once.clone();
            normalize_entry(&mut twice);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn normalized_status_is_upper_or_null(raw in arb_text()) {
            match normalize_status(&raw) {
                Some(status) => prop_assert_eq!(status.clone(), status.to_uppercase()),
                None => prop_assert!(raw.trim().is_empty()),
            }
        }
    }
}
