use std::collections::btree_map;
use thiserror::Error;

use super::value::{self, Fallback, ResolveError, ResolvedValue, ValueOrigin};
use crate::session::ResolutionSession;
use crate::template::{FieldNode, FieldPath, FieldTemplate};

/// A resolved field, ready for the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub path: FieldPath,
    pub value: String,
    pub origin: ValueOrigin,
}

/// Resolution failure for a single leaf.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to resolve {path}: {source}")]
pub struct FieldError {
    pub path: FieldPath,
    #[source]
    pub source: ResolveError,
}

struct Frame<'t> {
    path: FieldPath,
    children: btree_map::Iter<'t, String, FieldNode>,
}

/// Lazy depth-first walk over a template.
///
/// Yields exactly one item per leaf. Single pass: build a new walker to
/// resolve again; in the same session it yields the same values.
pub struct Assignments<'a, 'p> {
    session: &'a mut ResolutionSession<'p>,
    stack: Vec<Frame<'a>>,
}

/// Resolve every leaf of `template` against `session`.
pub fn resolve<'a, 'p>(
    session: &'a mut ResolutionSession<'p>,
    template: &'a FieldTemplate,
) -> Assignments<'a, 'p> {
    Assignments {
        session,
        stack: vec![Frame {
            path: FieldPath::root(),
            children: template.nodes().iter(),
        }],
    }
}

impl<'a, 'p> Assignments<'a, 'p> {
    fn resolve_leaf(
        &mut self,
        path: FieldPath,
        node: &FieldNode,
    ) -> Result<Assignment, FieldError> {
        let resolved = match node {
            FieldNode::Literal(value) => ResolvedValue {
                value: value.clone(),
                origin: ValueOrigin::Literal,
            },
            FieldNode::Absent => ResolvedValue::placeholder(Fallback::TemplateDefault),
            FieldNode::Reference(reference) => {
                match value::resolve(self.session, &reference.category, &reference.attribute) {
                    Ok(resolved) => resolved,
                    Err(source) => return Err(FieldError { path, source }),
                }
            }
            FieldNode::Branch(_) => unreachable!("branches are expanded by the walker"),
        };

        Ok(Assignment {
            path,
            value: resolved.value,
            origin: resolved.origin,
        })
    }
}

impl<'a, 'p> Iterator for Assignments<'a, 'p> {
    type Item = Result<Assignment, FieldError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.last_mut()?;
            let Some((segment, node)) = frame.children.next() else {
                self.stack.pop();
                continue;
            };

            let path = frame.path.child(segment);
            match node {
                FieldNode::Branch(children) => self.stack.push(Frame {
                    path,
                    children: children.iter(),
                }),
                leaf => return Some(self.resolve_leaf(path, leaf)),
            }
        }
    }
}
