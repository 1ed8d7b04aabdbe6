//! Field templates
//!
//! A template is a tree of path segments. Its JSON form nests objects for
//! branches; a leaf is a string (literal), a `[category, attribute]` pair
//! (profile reference) or `null` (vendor placeholder).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Failed to read template {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed field template: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Invalid path segment {0:?}")]
    InvalidSegment(String),
}

/// Reference into a hardware profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRef {
    pub category: String,
    pub attribute: String,
}

impl From<(String, String)> for ProfileRef {
    fn from((category, attribute): (String, String)) -> Self {
        Self { category, attribute }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldNode {
    Absent,
    Literal(String),
    Reference(#[serde(with = "profile_ref_pair")] ProfileRef),
    Branch(BTreeMap<String, FieldNode>),
}

impl FieldNode {
    pub fn literal(value: impl Into<String>) -> Self {
        FieldNode::Literal(value.into())
    }

    pub fn reference(category: impl Into<String>, attribute: impl Into<String>) -> Self {
        FieldNode::Reference(ProfileRef {
            category: category.into(),
            attribute: attribute.into(),
        })
    }

    pub fn branch<K, I>(children: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, FieldNode)>,
    {
        FieldNode::Branch(children.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn leaf_count(&self) -> usize {
        match self {
            FieldNode::Branch(children) => children.values().map(FieldNode::leaf_count).sum(),
            _ => 1,
        }
    }
}

/// `[category, attribute]` on the wire.
mod profile_ref_pair {
    use super::ProfileRef;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(r: &ProfileRef, serializer: S) -> Result<S::Ok, S::Error> {
        (&r.category, &r.attribute).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ProfileRef, D::Error> {
        <(String, String)>::deserialize(deserializer).map(ProfileRef::from)
    }
}

/// Root of a field template. Deserializing validates path segments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, FieldNode>",
    into = "BTreeMap<String, FieldNode>"
)]
pub struct FieldTemplate {
    root: BTreeMap<String, FieldNode>,
}

impl FieldTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_nodes<K, I>(nodes: I) -> Result<Self, TemplateError>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, FieldNode)>,
    {
        Self::try_from(
            nodes
                .into_iter()
                .map(|(k, v)| (k.into(), v))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    pub fn from_json_str(text: &str) -> Result<Self, TemplateError> {
        let root: BTreeMap<String, FieldNode> = serde_json::from_str(text)?;
        Self::try_from(root)
    }

    pub fn from_file(path: &Path) -> Result<Self, TemplateError> {
        let text = fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn nodes(&self) -> &BTreeMap<String, FieldNode> {
        &self.root
    }

    pub fn leaf_count(&self) -> usize {
        self.root.values().map(FieldNode::leaf_count).sum()
    }

    /// Segments must be non-empty and free of the path separator.
    fn validate(&self) -> Result<(), TemplateError> {
        fn check(nodes: &BTreeMap<String, FieldNode>) -> Result<(), TemplateError> {
            for (segment, node) in nodes {
                if segment.is_empty() || segment.contains(FieldPath::SEPARATOR) {
                    return Err(TemplateError::InvalidSegment(segment.clone()));
                }
                if let FieldNode::Branch(children) = node {
                    check(children)?;
                }
            }
            Ok(())
        }
        check(&self.root)
    }
}

impl TryFrom<BTreeMap<String, FieldNode>> for FieldTemplate {
    type Error = TemplateError;

    fn try_from(root: BTreeMap<String, FieldNode>) -> Result<Self, Self::Error> {
        let template = Self { root };
        template.validate()?;
        Ok(template)
    }
}

impl From<FieldTemplate> for BTreeMap<String, FieldNode> {
    fn from(template: FieldTemplate) -> Self {
        template.root
    }
}

/// Location of a field within a template.
///
/// Rendered without a leading separator (`VBoxInternal/Devices/...`); drivers
/// whose key space is rooted at `/` prepend it themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub const SEPARATOR: char = '/';

    pub fn root() -> Self {
        Self::default()
    }

    pub fn child(&self, segment: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(&Self::SEPARATOR.to_string()))
    }
}

impl From<&str> for FieldPath {
    fn from(path: &str) -> Self {
        Self(
            path.split(Self::SEPARATOR)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_leaf_kinds() {
        let template = FieldTemplate::from_json_str(
            r#"{
                "bios": {
                    "vendor": ["mobo", "vendor"],
                    "oem": "Custom",
                    "asset": null
                },
                "empty": {}
            }"#,
        )
        .unwrap();

        let FieldNode::Branch(bios) = &template.nodes()["bios"] else {
            panic!("bios should be a branch");
        };
        assert_eq!(bios["vendor"], FieldNode::reference("mobo", "vendor"));
        assert_eq!(bios["oem"], FieldNode::literal("Custom"));
        assert_eq!(bios["asset"], FieldNode::Absent);
        assert_eq!(template.nodes()["empty"], FieldNode::Branch(BTreeMap::new()));
        assert_eq!(template.leaf_count(), 3);
    }

    #[test]
    fn test_json_roundtrip_keeps_reference_pairs() {
        let template = FieldTemplate::from_nodes([(
            "bios",
            FieldNode::branch([("serial", FieldNode::reference("mobo", "serial"))]),
        )])
        .unwrap();

        let json = serde_json::to_string(&template).unwrap();
        assert_eq!(json, r#"{"bios":{"serial":["mobo","serial"]}}"#);
    }

    #[test]
    fn test_rejects_malformed_templates() {
        assert!(matches!(
            FieldTemplate::from_json_str(r#"{ "bios": 42 }"#),
            Err(TemplateError::Malformed(_))
        ));
        assert!(matches!(
            FieldTemplate::from_json_str(r#"{ "bios": ["only-category"] }"#),
            Err(TemplateError::Malformed(_))
        ));
        assert!(matches!(
            FieldTemplate::from_json_str(r#"{ "a/b": "x" }"#),
            Err(TemplateError::InvalidSegment(_))
        ));
        assert!(matches!(
            FieldTemplate::from_json_str(r#"{ "a": { "": "x" } }"#),
            Err(TemplateError::InvalidSegment(_))
        ));
    }

    #[test]
    fn test_serde_deserialize_validates_segments() {
        assert!(serde_json::from_str::<FieldTemplate>(r#"{ "a/b": "x" }"#).is_err());
        assert!(serde_json::from_str::<FieldTemplate>(r#"{ "a": { "": "x" } }"#).is_err());

        let template: FieldTemplate = serde_json::from_str(r#"{ "a": { "b": null } }"#).unwrap();
        assert_eq!(template.leaf_count(), 1);
    }

    #[test]
    fn test_field_path_display() {
        let path = FieldPath::root().child("bios").child("vendor");
        assert_eq!(path.to_string(), "bios/vendor");
        assert_eq!(FieldPath::from("/bios/vendor"), path);
        assert_eq!(path.segments().len(), 2);
    }
}
