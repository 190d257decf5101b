//! Document tree model: the serialized, externally owned shape of a rich-text document.
//!
//! A [`DocumentSnapshot`] is a pure value with no identity and no back-references.
//! On the wire it uses the Lexical-style JSON encoding:
//!
//! ```json
//! {"root":{"type":"root","direction":null,"format":"","indent":0,"version":1,
//!          "children":[{"type":"paragraph","children":[{"type":"text","text":"Hi"}]}]}}
//! ```
//!
//! Every field other than the `type` discriminant is optional on input, and an
//! optional field holding a value of the wrong shape reads as absent. Nodes with an
//! unknown or missing `type` are kept verbatim as [`ForeignNode`]s. They are legal
//! data at this layer and downstream components decide how to degrade them.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SnapshotError>;

/// Serialization version emitted on every node.
pub const NODE_VERSION: u32 = 1;

/// Decode an optional field, reading a malformed value as absent.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_or_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(lenient(deserializer)?.unwrap_or_default())
}

/// Text direction of an element. Absent or null also means neutral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ltr,
    Rtl,
    Neutral,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextMode {
    #[default]
    Normal,
    Token,
    Segmented,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadingTag {
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListType {
    #[default]
    Bullet,
    Number,
    Check,
}

impl ListType {
    /// HTML tag the list renders as.
    pub fn tag(self) -> &'static str {
        match self {
            ListType::Number => "ol",
            ListType::Bullet | ListType::Check => "ul",
        }
    }
}

/// Attributes shared by every element node (anything that can hold children).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElementFields {
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub children: Vec<SnapshotNode>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    /// Block alignment ("", "left", "center", ...).
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub indent: Option<u32>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
}

impl ElementFields {
    pub fn with_children(children: Vec<SnapshotNode>) -> Self {
        Self {
            children,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextNode {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub detail: Option<u32>,
    /// Bit flags (bold, italic, underline, ...).
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub format: Option<u32>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub mode: Option<TextMode>,
    /// Inline CSS declarations.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParagraphNode {
    #[serde(flatten)]
    pub element: ElementFields,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeadingNode {
    /// Required for reconstruction; a heading without one is never guessed.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub tag: Option<HeadingTag>,
    #[serde(flatten)]
    pub element: ElementFields,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkNode {
    #[serde(
        default,
        alias = "__url",
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub rel: Option<String>,
    #[serde(flatten)]
    pub element: ElementFields,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListNode {
    #[serde(
        rename = "listType",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub list_type: Option<ListType>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub start: Option<u32>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(flatten)]
    pub element: ElementFields,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListItemNode {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub value: Option<u32>,
    #[serde(flatten)]
    pub element: ElementFields,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineBreakNode {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
}

/// Every node kind the editor understands, discriminated by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DocumentNode {
    Text(TextNode),
    Paragraph(ParagraphNode),
    Heading(HeadingNode),
    Link(LinkNode),
    List(ListNode),
    ListItem(ListItemNode),
    LineBreak(LineBreakNode),
}

impl DocumentNode {
    pub fn kind(&self) -> &'static str {
        match self {
            DocumentNode::Text(_) => "text",
            DocumentNode::Paragraph(_) => "paragraph",
            DocumentNode::Heading(_) => "heading",
            DocumentNode::Link(_) => "link",
            DocumentNode::List(_) => "list",
            DocumentNode::ListItem(_) => "listitem",
            DocumentNode::LineBreak(_) => "linebreak",
        }
    }

    pub fn element(&self) -> Option<&ElementFields> {
        match self {
            DocumentNode::Paragraph(node) => Some(&node.element),
            DocumentNode::Heading(node) => Some(&node.element),
            DocumentNode::Link(node) => Some(&node.element),
            DocumentNode::List(node) => Some(&node.element),
            DocumentNode::ListItem(node) => Some(&node.element),
            DocumentNode::Text(_) | DocumentNode::LineBreak(_) => None,
        }
    }
}

/// A node whose shape did not match any [`DocumentNode`] variant, kept verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ForeignNode(Value);

impl ForeignNode {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn kind(&self) -> Option<&str> {
        self.attr("type").and_then(Value::as_str)
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.0.as_object().and_then(|map| map.get(key))
    }

    pub fn text(&self) -> Option<&str> {
        self.attr("text").and_then(Value::as_str)
    }

    /// Children decoded as snapshot nodes. Anything that is not an array yields none.
    pub fn children(&self) -> Vec<SnapshotNode> {
        match self.attr("children") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// A node as it appears inside a snapshot: either a recognized shape or foreign data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SnapshotNode {
    Known(DocumentNode),
    Foreign(ForeignNode),
}

impl From<DocumentNode> for SnapshotNode {
    fn from(node: DocumentNode) -> Self {
        SnapshotNode::Known(node)
    }
}

impl SnapshotNode {
    pub fn text(text: impl Into<String>) -> Self {
        DocumentNode::Text(TextNode {
            text: Some(text.into()),
            ..TextNode::default()
        })
        .into()
    }

    pub fn paragraph(children: Vec<SnapshotNode>) -> Self {
        DocumentNode::Paragraph(ParagraphNode {
            element: ElementFields::with_children(children),
        })
        .into()
    }

    pub fn heading(tag: HeadingTag, children: Vec<SnapshotNode>) -> Self {
        DocumentNode::Heading(HeadingNode {
            tag: Some(tag),
            element: ElementFields::with_children(children),
        })
        .into()
    }

    pub fn link(url: impl Into<String>, children: Vec<SnapshotNode>) -> Self {
        DocumentNode::Link(LinkNode {
            url: Some(url.into()),
            element: ElementFields::with_children(children),
            ..LinkNode::default()
        })
        .into()
    }

    pub fn list(list_type: ListType, items: Vec<SnapshotNode>) -> Self {
        DocumentNode::List(ListNode {
            list_type: Some(list_type),
            element: ElementFields::with_children(items),
            ..ListNode::default()
        })
        .into()
    }

    pub fn list_item(children: Vec<SnapshotNode>) -> Self {
        DocumentNode::ListItem(ListItemNode {
            element: ElementFields::with_children(children),
            ..ListItemNode::default()
        })
        .into()
    }

    pub fn line_break() -> Self {
        DocumentNode::LineBreak(LineBreakNode::default()).into()
    }

    pub fn foreign(value: Value) -> Self {
        SnapshotNode::Foreign(ForeignNode::new(value))
    }

    /// The node's `type`, if it declares one.
    pub fn kind(&self) -> Option<&str> {
        match self {
            SnapshotNode::Known(node) => Some(node.kind()),
            SnapshotNode::Foreign(node) => node.kind(),
        }
    }

    pub fn children(&self) -> Cow<'_, [SnapshotNode]> {
        match self {
            SnapshotNode::Known(node) => match node.element() {
                Some(element) => Cow::Borrowed(element.children.as_slice()),
                None => Cow::Borrowed(&[]),
            },
            SnapshotNode::Foreign(node) => Cow::Owned(node.children()),
        }
    }

    /// The `text` field of a text node. Other nodes have none.
    pub fn text_value(&self) -> Option<&str> {
        match self {
            SnapshotNode::Known(DocumentNode::Text(node)) => node.text.as_deref(),
            SnapshotNode::Known(_) => None,
            SnapshotNode::Foreign(node) => node.text(),
        }
    }

    /// Concatenated text of the whole subtree.
    pub fn text_content(&self) -> String {
        if self.kind() == Some("text") {
            return self.text_value().unwrap_or_default().to_string();
        }
        self.children()
            .iter()
            .map(SnapshotNode::text_content)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootNode {
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub children: Vec<SnapshotNode>,
    #[serde(default, deserialize_with = "lenient")]
    pub direction: Option<Direction>,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub format: String,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub indent: u32,
    #[serde(rename = "type", default = "root_type")]
    pub node_type: String,
    #[serde(default = "node_version")]
    pub version: u32,
}

fn root_type() -> String {
    "root".to_string()
}

fn node_version() -> u32 {
    NODE_VERSION
}

impl Default for RootNode {
    fn default() -> Self {
        Self {
            children: Vec::new(),
            direction: None,
            format: String::new(),
            indent: 0,
            node_type: root_type(),
            version: NODE_VERSION,
        }
    }
}

/// The whole document at one instant.
///
/// Equality goes through [`crate::change::equal`]: two snapshots are equal iff their
/// normalized serializations are byte-equal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub root: RootNode,
}

impl DocumentSnapshot {
    pub fn new(children: Vec<SnapshotNode>) -> Self {
        Self {
            root: RootNode {
                children,
                ..RootNode::default()
            },
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn children(&self) -> &[SnapshotNode] {
        &self.root.children
    }

    /// Plain text of the document, one line per top-level block.
    pub fn plain_text(&self) -> String {
        self.root
            .children
            .iter()
            .map(SnapshotNode::text_content)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl PartialEq for DocumentSnapshot {
    fn eq(&self, other: &Self) -> bool {
        crate::change::equal(Some(self), Some(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_sparse_snapshot() {
        let snapshot = DocumentSnapshot::from_value(json!({
            "root": {"children": [
                {"type": "paragraph", "children": [{"type": "text", "text": "Hi"}]}
            ]}
        }))
        .unwrap();

        assert_eq!(snapshot.children().len(), 1);
        assert_eq!(snapshot.children()[0].kind(), Some("paragraph"));
        assert_eq!(snapshot.plain_text(), "Hi");
        assert_eq!(snapshot.root.node_type, "root");
    }

    #[test]
    fn test_unknown_kind_is_kept_as_foreign() {
        let snapshot = DocumentSnapshot::from_value(json!({
            "root": {"children": [
                {"type": "quote", "children": [{"type": "text", "text": "cited"}]},
                {"children": []},
                42
            ]}
        }))
        .unwrap();

        let children = snapshot.children();
        assert!(matches!(children[0], SnapshotNode::Foreign(_)));
        assert_eq!(children[0].kind(), Some("quote"));
        assert_eq!(children[0].text_content(), "cited");
        assert_eq!(children[1].kind(), None);
        assert_eq!(children[2].kind(), None);

        let value = snapshot.to_value().unwrap();
        assert_eq!(value["root"]["children"][0]["type"], "quote");
        assert_eq!(value["root"]["children"][2], 42);
    }

    #[test]
    fn test_invalid_heading_tag_reads_as_missing() {
        for value in [
            json!({"type": "heading", "tag": "h9"}),
            json!({"type": "heading", "tag": 1}),
            json!({"type": "heading"}),
        ] {
            let node: SnapshotNode = serde_json::from_value(value).unwrap();
            match node {
                SnapshotNode::Known(DocumentNode::Heading(heading)) => {
                    assert!(heading.tag.is_none())
                }
                other => panic!("expected a known heading, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_malformed_optional_fields_keep_the_node() {
        let node: SnapshotNode = serde_json::from_value(json!({
            "type": "paragraph",
            "direction": "sideways",
            "indent": "deep",
            "format": 7,
            "children": [{"type": "text", "text": "Hi", "format": "bold", "mode": "loud"}]
        }))
        .unwrap();

        let SnapshotNode::Known(DocumentNode::Paragraph(paragraph)) = &node else {
            panic!("expected a known paragraph, got {node:?}");
        };
        assert!(paragraph.element.direction.is_none());
        assert!(paragraph.element.indent.is_none());
        assert!(paragraph.element.format.is_none());
        assert_eq!(node.text_content(), "Hi");
        match &paragraph.element.children[0] {
            SnapshotNode::Known(DocumentNode::Text(text)) => {
                assert!(text.format.is_none());
                assert!(text.mode.is_none());
            }
            other => panic!("expected a known text node, got {other:?}"),
        }
    }

    #[test]
    fn test_neutral_direction() {
        let snapshot = DocumentSnapshot::from_value(json!({
            "root": {"direction": "neutral", "children": [
                {"type": "paragraph", "direction": "neutral", "children": []}
            ]}
        }))
        .unwrap();
        assert_eq!(snapshot.root.direction, Some(Direction::Neutral));
        let value = snapshot.to_value().unwrap();
        assert_eq!(value["root"]["children"][0]["direction"], "neutral");
    }

    #[test]
    fn test_malformed_root_fields_read_as_defaults() {
        let snapshot = DocumentSnapshot::from_value(json!({
            "root": {"direction": 3, "format": null, "indent": "x", "children": "nope"}
        }))
        .unwrap();
        assert!(snapshot.root.direction.is_none());
        assert_eq!(snapshot.root.format, "");
        assert_eq!(snapshot.root.indent, 0);
        assert!(snapshot.children().is_empty());
    }

    #[test]
    fn test_legacy_link_url_key() {
        let node: SnapshotNode =
            serde_json::from_value(json!({"type": "link", "__url": "https://example.com"}))
                .unwrap();
        match node {
            SnapshotNode::Known(DocumentNode::Link(link)) => {
                assert_eq!(link.url.as_deref(), Some("https://example.com"))
            }
            other => panic!("expected a link, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_root_is_an_error() {
        assert!(DocumentSnapshot::from_json(r#"{"children": []}"#).is_err());
        assert!(DocumentSnapshot::from_json("not json").is_err());
    }

    #[test]
    fn test_text_content_of_nested_list() {
        let list = SnapshotNode::list(
            ListType::Number,
            vec![
                SnapshotNode::list_item(vec![SnapshotNode::text("one")]),
                SnapshotNode::list_item(vec![SnapshotNode::link(
                    "https://example.com",
                    vec![SnapshotNode::text("two")],
                )]),
            ],
        );
        assert_eq!(list.text_content(), "onetwo");
        assert_eq!(list.children().len(), 2);
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let snapshot = DocumentSnapshot::new(vec![
            SnapshotNode::heading(HeadingTag::H2, vec![SnapshotNode::text("Title")]),
            SnapshotNode::paragraph(vec![SnapshotNode::text("a"), SnapshotNode::line_break()]),
        ]);
        let first = snapshot.to_json().unwrap();
        let second = snapshot.clone().to_json().unwrap();
        assert_eq!(first, second);
        assert!(first.contains(r#""tag":"h2""#));
        assert!(first.contains(r#""type":"linebreak""#));
    }
}
