//! Union (marriage) identity derived from a parent set.

use std::fmt;

use itertools::Itertools;
use serde::{Serialize, Serializer};

use crate::domain::entities::MemberId;

/// Identity of a parental pairing: the sorted, de-duplicated parent ids.
///
/// Two records naming the same parents in any order share one key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnionKey(Vec<MemberId>);

impl UnionKey {
    /// Returns `None` for an empty parent set.
    pub fn from_parents<'a, I>(parents: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a MemberId>,
    {
        let ids: Vec<MemberId> = parents.into_iter().cloned().sorted().dedup().collect();
        if ids.is_empty() {
            None
        } else {
            Some(Self(ids))
        }
    }

    pub fn parents(&self) -> &[MemberId] {
        &self.0
    }

    pub fn contains(&self, id: &MemberId) -> bool {
        self.0.binary_search(id).is_ok()
    }
}

impl fmt::Display for UnionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "union:{}", self.0.iter().join(":"))
    }
}

impl Serialize for UnionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<MemberId> {
        raw.iter().map(|s| MemberId::from(*s)).collect()
    }

    #[test]
    fn test_key_is_order_independent() {
        let a = UnionKey::from_parents(&ids(&["mom", "dad"])).unwrap();
        let b = UnionKey::from_parents(&ids(&["dad", "mom"])).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "union:dad:mom");
    }

    #[test]
    fn test_key_collapses_duplicates() {
        let key = UnionKey::from_parents(&ids(&["p", "p"])).unwrap();
        assert_eq!(key.parents().len(), 1);
        assert_eq!(key.to_string(), "union:p");
        assert!(key.contains(&MemberId::from("p")));
    }

    #[test]
    fn test_empty_parent_set_has_no_key() {
        assert!(UnionKey::from_parents(&ids(&[])).is_none());
    }
}
