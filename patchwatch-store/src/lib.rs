/*!
Patchwatch storage contract

Everything both services must agree on to share one data directory:
- how a raw `server_name` becomes a file name ([`ServerId`])
- what an ingested report looks like on disk ([`UpdateEntry`])
- how history files are rewritten without readers ever seeing half a file
  ([`RecordStore`], [`write_json_atomic`])

The ingestion service is the only writer; the dashboard only reads `*.json`
files from the same directory.
*/

pub mod entry;
pub mod id;
pub mod locks;
pub mod store;

pub use entry::{OsKind, UpdateEntry};
pub use id::ServerId;
pub use locks::KeyedLocks;
pub use store::{is_history_file, write_json_atomic, HistoryLoad, RecordStore, StoreError};

/// Extension of every history file in the data directory.
pub const HISTORY_EXTENSION: &str = "json";
