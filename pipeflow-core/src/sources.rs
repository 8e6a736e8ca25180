//! Named text sources (shader code, buffer descriptions) shared by nodes.

use indexmap::IndexMap;

/// Error from source store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// A source with this name already exists.
    #[error("source '{0}' already exists")]
    AlreadyExists(String),

    /// No source with this name exists.
    #[error("source '{0}' not found")]
    NotFound(String),
}

/// Insertion-ordered map of source name to text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceStore {
    sources: IndexMap<String, String>,
}

impl SourceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source. Names are unique.
    pub fn add(&mut self, name: impl Into<String>, text: impl Into<String>) -> Result<(), SourceError> {
        let name = name.into();
        if self.sources.contains_key(&name) {
            return Err(SourceError::AlreadyExists(name));
        }
        self.sources.insert(name, text.into());
        Ok(())
    }

    /// Delete a source, returning its text.
    pub fn remove(&mut self, name: &str) -> Result<String, SourceError> {
        self.sources
            .shift_remove(name)
            .ok_or_else(|| SourceError::NotFound(name.to_string()))
    }

    /// Replace the text of an existing source.
    ///
    /// Returns `false` if the text did not change.
    pub fn set(&mut self, name: &str, text: impl Into<String>) -> Result<bool, SourceError> {
        let slot = self
            .sources
            .get_mut(name)
            .ok_or_else(|| SourceError::NotFound(name.to_string()))?;
        let text = text.into();
        if *slot == text {
            return Ok(false);
        }
        *slot = text;
        Ok(true)
    }

    /// Get the text of a source.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.sources.get(name).map(String::as_str)
    }

    /// Check if a source exists.
    pub fn contains(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    /// Iterate over `(name, text)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.sources.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Remove every source.
    pub fn clear(&mut self) {
        self.sources.clear();
    }
}

impl FromIterator<(String, String)> for SourceStore {
    /// Later entries win on duplicate names.
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            sources: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique() {
        let mut store = SourceStore::new();
        store.add("vs", "void main() {}").unwrap();
        assert_eq!(
            store.add("vs", "other"),
            Err(SourceError::AlreadyExists("vs".into()))
        );
        assert_eq!(store.get("vs"), Some("void main() {}"));
    }

    #[test]
    fn set_reports_real_changes() {
        let mut store = SourceStore::new();
        store.add("fs", "a").unwrap();
        assert_eq!(store.set("fs", "a"), Ok(false));
        assert_eq!(store.set("fs", "b"), Ok(true));
        assert_eq!(store.set("missing", "b"), Err(SourceError::NotFound("missing".into())));
    }

    #[test]
    fn remove_returns_text() {
        let mut store = SourceStore::new();
        store.add("buf", "[1, 2]").unwrap();
        assert_eq!(store.remove("buf"), Ok("[1, 2]".to_string()));
        assert!(store.remove("buf").is_err());
        assert!(store.is_empty());
    }
}
