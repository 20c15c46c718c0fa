//! Canonical message flag sets
//!
//! Flags are opaque string tokens ("Seen", "Answered", provider keywords).
//! A flag set is always held in sorted order with no duplicates, so two sets
//! compare equal exactly when they carry the same tokens. Serialized form is
//! a sorted JSON array of strings, matching how flag lists are persisted by
//! local caches.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A canonicalized set of flag tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Flags(BTreeSet<String>);

impl Flags {
    /// An empty flag set.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, flag: &str) -> bool {
        self.0.contains(flag)
    }

    /// Adds a flag; already-present flags are not duplicated.
    pub fn insert(&mut self, flag: impl Into<String>) -> bool {
        self.0.insert(flag.into())
    }

    pub fn remove(&mut self, flag: &str) -> bool {
        self.0.remove(flag)
    }

    /// Adds every flag of `other` to `self`.
    pub fn union_with(&mut self, other: &Flags) {
        for flag in &other.0 {
            self.0.insert(flag.clone());
        }
    }

    /// Removes every flag of `other` from `self`, ignoring flags that were
    /// already absent.
    pub fn remove_all(&mut self, other: &Flags) {
        for flag in &other.0 {
            self.0.remove(flag);
        }
    }

    /// The flags present in `self` but not in `other`.
    pub fn difference(&self, other: &Flags) -> Flags {
        Flags(self.0.difference(&other.0).cloned().collect())
    }

    /// Iterates flags in canonical (sorted) order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for flag in &self.0 {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{}", flag)?;
            first = false;
        }
        Ok(())
    }
}

/// Parses a whitespace-separated flag list, e.g. `"Answered Seen"`.
impl FromStr for Flags {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.split_whitespace().collect())
    }
}

impl<S: Into<String>> FromIterator<S> for Flags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Flags(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_order_and_dedup() {
        let flags: Flags = ["Seen", "Answered", "Seen", "Draft"].into_iter().collect();
        assert_eq!(flags.len(), 3);
        let ordered: Vec<&str> = flags.iter().collect();
        assert_eq!(ordered, vec!["Answered", "Draft", "Seen"]);
    }

    #[test]
    fn test_insert_and_remove() {
        let mut flags = Flags::new();
        assert!(flags.insert("Seen"));
        assert!(!flags.insert("Seen"));
        assert!(flags.contains("Seen"));
        assert!(flags.remove("Seen"));
        assert!(flags.is_empty());
    }

    #[test]
    fn test_union_with() {
        let mut flags: Flags = ["Seen"].into_iter().collect();
        let extra: Flags = ["Answered", "Seen"].into_iter().collect();
        flags.union_with(&extra);
        assert_eq!(flags, ["Answered", "Seen"].into_iter().collect());
    }

    #[test]
    fn test_remove_all_ignores_absent() {
        let mut flags: Flags = ["A", "B", "C"].into_iter().collect();
        let gone: Flags = ["B", "Z"].into_iter().collect();
        flags.remove_all(&gone);
        assert_eq!(flags, ["A", "C"].into_iter().collect());
    }

    #[test]
    fn test_difference() {
        let a: Flags = ["A", "C"].into_iter().collect();
        let b: Flags = ["B", "C"].into_iter().collect();
        assert_eq!(a.difference(&b), ["A"].into_iter().collect());
        assert_eq!(b.difference(&a), ["B"].into_iter().collect());
    }

    #[test]
    fn test_display_and_parse() {
        let flags: Flags = "Seen Answered".parse().unwrap();
        assert_eq!(flags.to_string(), "Answered Seen");
    }

    #[test]
    fn test_json_is_sorted_array() {
        let flags: Flags = ["Seen", "Answered"].into_iter().collect();
        let json = serde_json::to_string(&flags).unwrap();
        assert_eq!(json, r#"["Answered","Seen"]"#);
        let back: Flags = serde_json::from_str(&json).unwrap();
        assert_eq!(back, flags);
    }
}
