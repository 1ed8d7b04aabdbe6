use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::generator::{Directive, DirectiveError, GeneratorError};
use crate::profile::PLACEHOLDER;
use crate::session::ResolutionSession;

/// Why a field ended up with the vendor placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    /// Profile has no candidates for the category.
    MissingCategory,
    /// The chosen candidate set has no such attribute.
    MissingAttribute,
    /// The attribute is explicitly null in the chosen set.
    NotApplicable,
    /// Template leaf was left empty.
    TemplateDefault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueOrigin {
    Literal,
    Profile,
    Generated,
    Placeholder(Fallback),
}

impl ValueOrigin {
    pub fn fallback(&self) -> Option<Fallback> {
        match self {
            ValueOrigin::Placeholder(reason) => Some(*reason),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedValue {
    pub value: String,
    pub origin: ValueOrigin,
}

impl ResolvedValue {
    pub fn placeholder(reason: Fallback) -> Self {
        Self {
            value: PLACEHOLDER.to_string(),
            origin: ValueOrigin::Placeholder(reason),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("{category}.{attribute}: {source}")]
    InvalidDirective {
        category: String,
        attribute: String,
        #[source]
        source: DirectiveError,
    },
    #[error("{category}.{attribute}: {source}")]
    Generator {
        category: String,
        attribute: String,
        #[source]
        source: GeneratorError,
    },
}

/// Resolve one `(category, attribute)` reference within `session`.
///
/// The first reference to a category draws its candidate set; every later
/// reference reads from that same set. Missing data is not an error: real
/// firmware leaves plenty of fields blank, so those resolve to the placeholder.
pub fn resolve(
    session: &mut ResolutionSession<'_>,
    category: &str,
    attribute: &str,
) -> Result<ResolvedValue, ResolveError> {
    let Some(candidate) = session.select(category) else {
        debug!(category, attribute, "Category missing from profile, using placeholder");
        return Ok(ResolvedValue::placeholder(Fallback::MissingCategory));
    };

    let raw = match candidate.get(attribute) {
        None => {
            debug!(category, attribute, "Attribute missing from candidate set, using placeholder");
            return Ok(ResolvedValue::placeholder(Fallback::MissingAttribute));
        }
        Some(None) => return Ok(ResolvedValue::placeholder(Fallback::NotApplicable)),
        Some(Some(raw)) => raw,
    };

    let directive = Directive::parse(raw).map_err(|source| ResolveError::InvalidDirective {
        category: category.to_string(),
        attribute: attribute.to_string(),
        source,
    })?;

    match directive {
        None => Ok(ResolvedValue {
            value: raw.to_string(),
            origin: ValueOrigin::Profile,
        }),
        Some(directive) => {
            let value = session
                .synthesize(category, attribute, directive)
                .map_err(|source| ResolveError::Generator {
                    category: category.to_string(),
                    attribute: attribute.to_string(),
                    source,
                })?;
            Ok(ResolvedValue {
                value,
                origin: ValueOrigin::Generated,
            })
        }
    }
}
