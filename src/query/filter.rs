use bson::{Bson, Document as BsonDocument};

/// A set of equality terms. An empty spec matches every document.
///
/// Inserting a field that is already present replaces its value in place,
/// so the last write wins and the field keeps its original position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    terms: BsonDocument,
}

impl FilterSpec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.terms.insert(field.into(), value.into());
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Bson>) {
        self.terms.insert(field.into(), value.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    #[must_use]
    pub fn to_document(&self) -> BsonDocument {
        self.terms.clone()
    }

    #[must_use]
    pub fn into_document(self) -> BsonDocument {
        self.terms
    }
}

impl<K: Into<String>, V: Into<Bson>> FromIterator<(K, V)> for FilterSpec {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut spec = Self::new();
        for (k, v) in iter {
            spec.insert(k, v);
        }
        spec
    }
}

/// Merges equality terms into a single filter document.
pub fn build_filter<K, V, I>(terms: I) -> BsonDocument
where
    K: Into<String>,
    V: Into<Bson>,
    I: IntoIterator<Item = (K, V)>,
{
    terms.into_iter().collect::<FilterSpec>().into_document()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn empty_terms_match_everything() {
        let f = build_filter(Vec::<(String, Bson)>::new());
        assert!(f.is_empty());
    }

    #[test]
    fn terms_merge_into_one_document() {
        let f = build_filter([("userId", "u1"), ("followerUserId", "u2")]);
        assert_eq!(f, doc! {"userId": "u1", "followerUserId": "u2"});
    }

    #[test]
    fn repeated_field_last_write_wins() {
        let f = build_filter([("email", "a@x.io"), ("user", "bob"), ("email", "b@x.io")]);
        assert_eq!(f.len(), 2);
        assert_eq!(f.get_str("email").unwrap(), "b@x.io");
        let keys: Vec<&String> = f.keys().collect();
        assert_eq!(keys, ["email", "user"]);
    }
}
