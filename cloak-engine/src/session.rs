//! Per-build resolution state
//!
//! A session pins, for every category touched during a build, which
//! candidate set was drawn. Later references to the same category read from
//! that set, so the fabricated hardware never mixes attributes from two
//! different machines.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::debug;

use crate::generator::{Directive, GeneratorError};
use crate::profile::{CandidateSet, Profile};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Category '{category}' has no candidate #{index} (profile has {available})")]
    CandidateOutOfRange {
        category: String,
        index: usize,
        available: usize,
    },
    #[error("Category '{0}' is already pinned for this session")]
    AlreadyChosen(String),
}

pub struct ResolutionSession<'p> {
    profile: &'p Profile,
    chosen: BTreeMap<String, usize>,
    generated: HashMap<(String, String), String>,
    rng: StdRng,
}

impl<'p> ResolutionSession<'p> {
    pub fn new(profile: &'p Profile) -> Self {
        Self::with_rng(profile, StdRng::from_entropy())
    }

    /// Deterministic session: same seed, same profile, same template, same output.
    pub fn seeded(profile: &'p Profile, seed: u64) -> Self {
        Self::with_rng(profile, StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(profile: &'p Profile, rng: StdRng) -> Self {
        Self {
            profile,
            chosen: BTreeMap::new(),
            generated: HashMap::new(),
            rng,
        }
    }

    pub fn profile(&self) -> &'p Profile {
        self.profile
    }

    /// Fix the candidate set for a category before resolution starts.
    pub fn pin(&mut self, category: &str, index: usize) -> Result<(), SessionError> {
        if self.chosen.contains_key(category) {
            return Err(SessionError::AlreadyChosen(category.to_string()));
        }

        let available = self.profile.candidates(category).len();
        if index >= available {
            return Err(SessionError::CandidateOutOfRange {
                category: category.to_string(),
                index,
                available,
            });
        }

        self.chosen.insert(category.to_string(), index);
        Ok(())
    }

    /// Index of the candidate set chosen for `category`, if any.
    pub fn chosen(&self, category: &str) -> Option<usize> {
        self.chosen.get(category).copied()
    }

    pub fn chosen_sets(&self) -> &BTreeMap<String, usize> {
        &self.chosen
    }

    /// The candidate set for `category`, drawing one uniformly at random on
    /// first use. `None` when the profile has no candidates for it.
    pub fn select(&mut self, category: &str) -> Option<&'p CandidateSet> {
        let candidates = self.profile.candidates(category);

        if let Some(&index) = self.chosen.get(category) {
            return candidates.get(index);
        }

        if candidates.is_empty() {
            return None;
        }

        let index = self.rng.gen_range(0..candidates.len());
        debug!(category, index, "Selected candidate set");
        self.chosen.insert(category.to_string(), index);
        Some(&candidates[index])
    }

    /// Run `directive` once per (category, attribute); later calls return the cached value.
    pub fn synthesize(
        &mut self,
        category: &str,
        attribute: &str,
        directive: Directive,
    ) -> Result<String, GeneratorError> {
        let key = (category.to_string(), attribute.to_string());
        if let Some(value) = self.generated.get(&key) {
            return Ok(value.clone());
        }

        let value = directive.generate(&mut self.rng)?;
        self.generated.insert(key, value.clone());
        Ok(value)
    }
}
