//! Result of a pattern key scan.

/// Keys matched by a pattern, with the marker used in log lines
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyMatches {
    pub pattern: String,
    pub keys: Vec<String>,
}

impl KeyMatches {
    pub const FOUND_MARKER: &'static str = "keys found";

    pub fn new(pattern: impl Into<String>, keys: Vec<String>) -> Self {
        Self {
            pattern: pattern.into(),
            keys,
        }
    }

    /// `"keys found"` when anything matched, `""` otherwise
    #[must_use]
    pub fn marker(&self) -> &'static str {
        if self.keys.is_empty() {
            ""
        } else {
            Self::FOUND_MARKER
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn into_keys(self) -> Vec<String> {
        self.keys
    }
}
