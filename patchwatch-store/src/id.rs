use std::fmt;

/// Storage key of one server history: the raw server name with every
/// character outside `[A-Za-z0-9._-]` replaced by `_`.
///
/// Distinct names can collide (`web*01` and `web_01` both give `web_01`);
/// colliding servers share one history file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServerId(String);

impl ServerId {
    pub fn from_server_name(server_name: &str) -> Self {
        let sanitized = server_name
            .chars()
            .map(|c| if is_allowed(c) { c } else { '_' })
            .collect();
        Self(sanitized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the history inside the data directory (`<id>.json`).
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.0, crate::HISTORY_EXTENSION)
    }
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ServerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
