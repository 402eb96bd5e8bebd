use std::fmt;
use uuid::Uuid;

const PATH_SEPARATOR: char = '/';

/// Strip leading and trailing separators from a collection path.
pub(crate) fn normalize_path(path: &str) -> String {
    path.trim_matches(PATH_SEPARATOR).to_string()
}

/// Address of exactly one document: a collection path and a document id.
///
/// A reference does not own any data.
///
/// ```rust
/// use document_crud::common::reference::DocumentRef;
///
/// let reference = DocumentRef::new("/users/", "jsmith");
/// assert_eq!(reference.collection(), "users");
/// assert_eq!(reference.to_string(), "users/jsmith");
/// ```
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct DocumentRef {
    collection: String,
    id: String,
}

impl DocumentRef {
    /// Reference the document `id` of the collection at `path`.
    pub fn new(path: &str, id: impl Into<String>) -> Self {
        Self {
            collection: normalize_path(path),
            id: id.into(),
        }
    }

    /// Reference a new document of the collection at `path`, with a random id.
    ///
    /// The id is drawn once, so the reference keeps addressing the same document.
    pub fn generated(path: &str) -> Self {
        Self::new(path, Uuid::new_v4().simple().to_string())
    }

    /// The collection path.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The document id.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{PATH_SEPARATOR}{}", self.collection, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[rstest]
    #[case::bare("users", "users")]
    #[case::leading("/users", "users")]
    #[case::trailing("users/", "users")]
    #[case::nested("/users/u1/bookmarks/", "users/u1/bookmarks")]
    fn test_normalize_path(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(normalize_path(path), expected);
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        let first = DocumentRef::generated("users");
        let second = DocumentRef::generated("users");
        assert_eq!(first.collection(), "users");
        assert_eq!(first.id().len(), 32);
        assert_ne!(first, second);
    }
}
