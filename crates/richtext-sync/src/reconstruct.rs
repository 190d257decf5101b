//! Rebuilds the live tree from an external snapshot.
//!
//! Reconstruction dispatches on each node's kind. A node that cannot be rebuilt
//! degrades instead of failing the pass:
//!
//! - at the top level, a `list` is rebuilt lossily (one plain paragraph per item,
//!   taken from the item's first text run) and anything else becomes an empty
//!   paragraph, so the number and order of top-level blocks is preserved;
//! - inside an element the child is dropped.
//!
//! Every degradation is reported in the returned [`RebuildReport`].

use crate::config::SyncConfig;
use crate::host::{LiveTree, NodeKey, TreeError};
use crate::node::{
    DocumentNode, DocumentSnapshot, ElementFields, HeadingNode, LinkNode, ListType, SnapshotNode,
    TextNode,
};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ReconstructError {
    #[error("Heading has no valid tag")]
    MissingHeadingTag,

    #[error("Unsupported node kind `{0}`")]
    Unsupported(String),

    #[error("Node has no kind")]
    MissingKind,

    #[error(transparent)]
    Tree(#[from] TreeError),
}

type Result<T> = std::result::Result<T, ReconstructError>;

/// A substructure that did not survive reconstruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedContent {
    /// Position in the snapshot, e.g. `root.2.0`.
    pub path: String,
    pub kind: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildReport {
    /// Top-level blocks appended to the root.
    pub top_level: usize,
    pub dropped: Vec<DroppedContent>,
    /// Top-level lists rebuilt through the lossy path.
    pub lossy_lists: usize,
}

impl RebuildReport {
    fn drop_node(&mut self, path: String, node: &SnapshotNode, reason: String) {
        let kind = node.kind().unwrap_or("<none>").to_string();
        warn!("Dropping {} node at {}: {}", kind, path, reason);
        self.dropped.push(DroppedContent { path, kind, reason });
    }
}

#[derive(Debug, Clone)]
pub struct NodeReconstructor {
    link_placeholder: String,
}

impl Default for NodeReconstructor {
    fn default() -> Self {
        Self::new(&SyncConfig::default())
    }
}

impl NodeReconstructor {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            link_placeholder: config.link_placeholder.clone(),
        }
    }

    /// Build a fresh tree (without native line breaks) from `snapshot`.
    pub fn rebuild(&self, snapshot: &DocumentSnapshot) -> (LiveTree, RebuildReport) {
        let mut tree = LiveTree::new();
        let report = self.rebuild_into(&mut tree, snapshot);
        (tree, report)
    }

    /// Append the blocks of `snapshot` to the root of `tree`.
    ///
    /// The caller clears the root first when replacing content.
    pub fn rebuild_into(&self, tree: &mut LiveTree, snapshot: &DocumentSnapshot) -> RebuildReport {
        let mut report = RebuildReport::default();
        let root = &snapshot.root;
        let props = tree.root_props_mut();
        props.direction = root.direction;
        props.format = root.format.clone();
        props.indent = root.indent;

        for (index, child) in root.children.iter().enumerate() {
            let path = format!("root.{index}");
            let failure = match self.build(tree, child, &path, &mut report) {
                Ok(key) => match tree.append_to_root(key) {
                    Ok(()) => {
                        report.top_level += 1;
                        continue;
                    }
                    Err(e) => {
                        tree.remove(key);
                        ReconstructError::from(e)
                    }
                },
                Err(e) => e,
            };

            if child.kind() == Some("list") && !child.children().is_empty() {
                if let Some(list) = self.lossy_list(tree, child) {
                    debug!("Rebuilt list at {} without its structure", path);
                    report.lossy_lists += 1;
                    report.top_level += 1;
                    if let Err(e) = tree.append_to_root(list) {
                        warn!("Failed to append rebuilt list at {}: {}", path, e);
                    }
                    continue;
                }
            }

            report.drop_node(path, child, failure.to_string());
            let placeholder = tree.create_paragraph();
            match tree.append_to_root(placeholder) {
                Ok(()) => report.top_level += 1,
                Err(e) => warn!("Failed to append placeholder: {}", e),
            }
        }
        report
    }

    fn build(
        &self,
        tree: &mut LiveTree,
        node: &SnapshotNode,
        path: &str,
        report: &mut RebuildReport,
    ) -> Result<NodeKey> {
        let node = match node {
            SnapshotNode::Known(node) => node,
            SnapshotNode::Foreign(foreign) => {
                return Err(match foreign.kind() {
                    Some(kind) => ReconstructError::Unsupported(kind.to_string()),
                    None => ReconstructError::MissingKind,
                });
            }
        };

        let (key, element) = match node {
            DocumentNode::Text(text) => return Ok(self.build_text(tree, text)),
            DocumentNode::LineBreak(_) => {
                if tree.supports_line_breaks() {
                    return Ok(tree.create_line_break()?);
                }
                return Ok(tree.create_text("\n"));
            }
            DocumentNode::Paragraph(paragraph) => (tree.create_paragraph(), &paragraph.element),
            DocumentNode::Heading(HeadingNode { tag, element }) => {
                let tag = tag.ok_or(ReconstructError::MissingHeadingTag)?;
                (tree.create_heading(tag), element)
            }
            DocumentNode::Link(link) => (self.build_link(tree, link)?, &link.element),
            DocumentNode::List(_) | DocumentNode::ListItem(_) => {
                return Err(ReconstructError::Unsupported(node.kind().to_string()));
            }
        };

        apply_element(tree, key, element)?;
        for (index, child) in element.children.iter().enumerate() {
            let child_path = format!("{path}.{index}");
            let appended = self
                .build(tree, child, &child_path, report)
                .and_then(|child_key| {
                    tree.append(key, child_key).map_err(|e| {
                        tree.remove(child_key);
                        ReconstructError::from(e)
                    })
                });
            if let Err(e) = appended {
                report.drop_node(child_path, child, e.to_string());
            }
        }
        Ok(key)
    }

    fn build_text(&self, tree: &mut LiveTree, node: &TextNode) -> NodeKey {
        let key = tree.create_text(node.text.as_deref().unwrap_or_default());
        if let Ok(props) = tree.text_mut(key) {
            if let Some(format) = node.format {
                props.format = format;
            }
            if let Some(style) = node.style.as_ref().filter(|style| !style.is_empty()) {
                props.style = style.clone();
            }
            if let Some(mode) = node.mode {
                props.mode = mode;
            }
            if let Some(detail) = node.detail {
                props.detail = detail;
            }
        }
        key
    }

    fn build_link(&self, tree: &mut LiveTree, node: &LinkNode) -> Result<NodeKey> {
        let url = node
            .url
            .as_deref()
            .filter(|url| !url.is_empty())
            .unwrap_or(self.link_placeholder.as_str());
        let key = tree.create_link(url);
        let props = tree.link_mut(key)?;
        props.target = node.target.clone();
        props.title = node.title.clone();
        props.rel = node.rel.clone();
        Ok(key)
    }

    /// Best-effort list: one paragraph per item holding the item's first text run.
    /// Returns `None` when no item yields any text.
    fn lossy_list(&self, tree: &mut LiveTree, node: &SnapshotNode) -> Option<NodeKey> {
        let list_type = match node {
            SnapshotNode::Known(DocumentNode::List(list)) => list.list_type,
            SnapshotNode::Known(_) => None,
            SnapshotNode::Foreign(foreign) => foreign
                .attr("listType")
                .and_then(|value| serde_json::from_value(value.clone()).ok()),
        };
        let list_type = match list_type {
            Some(ListType::Number) => ListType::Number,
            _ => ListType::Bullet,
        };

        let list = tree.create_list(list_type);
        for item in node.children().iter() {
            let text = first_text_run(item);
            if text.is_empty() {
                continue;
            }
            let list_item = tree.create_list_item();
            let paragraph = tree.create_paragraph();
            let run = tree.create_text(&text);
            let attached = tree
                .append(paragraph, run)
                .and_then(|()| tree.append(list_item, paragraph))
                .and_then(|()| tree.append(list, list_item));
            if let Err(e) = attached {
                warn!("Failed to rebuild list item: {}", e);
                tree.remove(list_item);
                tree.remove(paragraph);
                tree.remove(run);
            }
        }

        if tree.children(list).is_empty() {
            tree.remove(list);
            return None;
        }
        Some(list)
    }
}

/// Text of the first grandchild if there is one, else all text of the first child.
fn first_text_run(item: &SnapshotNode) -> String {
    let children = item.children();
    let Some(first) = children.first() else {
        return String::new();
    };
    match first.children().first() {
        Some(run) => run.text_value().unwrap_or_default().to_string(),
        None => first.text_content(),
    }
}

fn apply_element(tree: &mut LiveTree, key: NodeKey, fields: &ElementFields) -> Result<()> {
    let props = tree.element_mut(key)?;
    if let Some(direction) = fields.direction {
        props.direction = Some(direction);
    }
    if let Some(format) = &fields.format {
        props.format = format.clone();
    }
    if let Some(indent) = fields.indent {
        props.indent = indent;
    }
    Ok(())
}
