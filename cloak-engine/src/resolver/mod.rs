//! Template and value resolution
//!
//! - `value`: one `(category, attribute)` reference to a concrete string
//! - `template`: depth-first walk of a field template into assignments

pub mod template;
pub mod value;

pub use template::{resolve, Assignment, Assignments, FieldError};
pub use value::{Fallback, ResolveError, ResolvedValue, ValueOrigin};
