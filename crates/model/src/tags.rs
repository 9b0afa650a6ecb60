use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// An unordered set of free-text tags.
///
/// Tags are trimmed, empty tags are dropped and duplicates collapse. A
/// `BTreeSet` keeps iteration (and therefore serialization) deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Tags(BTreeSet<String>);
impl Tags {
    /// Parses comma-separated user input, e.g. `"tax, 2024 ,receipts"`.
    pub fn parse(input: &str) -> Self {
        input.split(',').collect()
    }

    pub fn insert(&mut self, tag: impl AsRef<str>) -> bool {
        let tag = tag.as_ref().trim();
        !tag.is_empty() && self.0.insert(tag.to_string())
    }

    pub fn remove(&mut self, tag: impl AsRef<str>) -> bool {
        self.0.remove(tag.as_ref().trim())
    }

    pub fn contains(&self, tag: impl AsRef<str>) -> bool {
        self.0.contains(tag.as_ref().trim())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}
impl<S: AsRef<str>> FromIterator<S> for Tags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut tags = Tags::default();
        for tag in iter {
            tags.insert(tag);
        }
        tags
    }
}
impl From<Vec<String>> for Tags {
    fn from(value: Vec<String>) -> Self {
        value.into_iter().collect()
    }
}
impl From<Tags> for Vec<String> {
    fn from(tags: Tags) -> Self {
        tags.0.into_iter().collect()
    }
}
impl Display for Tags {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.iter().collect::<Vec<_>>().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes() {
        let tags = Tags::parse(" tax, 2024 ,,receipts, tax ");
        assert_eq!(tags.iter().collect::<Vec<_>>(), ["2024", "receipts", "tax"]);
        assert!(Tags::parse("").is_empty());
        assert!(Tags::parse(" , ,").is_empty());
    }

    #[test]
    fn test_insert_and_remove() {
        let mut tags = Tags::default();
        assert!(tags.insert(" work "));
        assert!(!tags.insert("work"));
        assert!(!tags.insert("   "));
        assert!(tags.contains("work"));
        assert!(tags.remove("work "));
        assert!(tags.is_empty());
    }

    #[test]
    fn test_serde_as_array() {
        let tags: Tags = serde_json::from_str(r#"["b", "a", "b", ""]"#).unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(serde_json::to_string(&tags).unwrap(), r#"["a","b"]"#);
        assert_eq!(tags.to_string(), "a, b");
    }
}
