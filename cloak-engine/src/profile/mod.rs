//! Hardware profiles
//!
//! A profile is a named database of candidate value sets, grouped by
//! hardware category (bios, motherboard, harddisk, ...). Each candidate set
//! describes one real machine's view of that category, so attributes read
//! from the same set stay consistent with each other.

pub mod store;

pub use store::{ProfileError, ProfileStore};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value reported by real firmware when a field was left blank by the vendor.
pub const PLACEHOLDER: &str = "To be filled by O.E.M.";

/// One internally consistent set of attribute values for a category.
///
/// A `None` value means the attribute is not applicable for this machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateSet(BTreeMap<String, Option<String>>);

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, attribute: impl Into<String>, value: Option<&str>) -> Self {
        self.0.insert(attribute.into(), value.map(str::to_string));
        self
    }

    /// Outer `None`: the attribute key is missing. Inner `None`: explicitly null.
    pub fn get(&self, attribute: &str) -> Option<Option<&str>> {
        self.0.get(attribute).map(|value| value.as_deref())
    }
}

/// A loaded hardware profile. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    name: String,
    categories: BTreeMap<String, Vec<CandidateSet>>,
}

impl Profile {
    pub fn new(name: impl Into<String>, categories: BTreeMap<String, Vec<CandidateSet>>) -> Self {
        Self {
            name: name.into(),
            categories,
        }
    }

    /// Parse the JSON document form: `{ "<category>": [ { "<attr>": "<value>" | null } ] }`.
    pub fn from_json_str(name: &str, text: &str) -> Result<Self, serde_json::Error> {
        let categories: BTreeMap<String, Vec<CandidateSet>> = serde_json::from_str(text)?;
        Ok(Self::new(name, categories))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Candidate sets for a category. Missing categories yield an empty slice.
    pub fn candidates(&self, category: &str) -> &[CandidateSet] {
        self.categories
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    pub fn contains_category(&self, category: &str) -> bool {
        self.categories.contains_key(category)
    }
}
