//! Host editor: the internally owned, live editable tree.
//!
//! Nodes live in an arena keyed by [`NodeKey`]. All mutation happens inside
//! [`HostEditor::update`], which commits synchronously and then notifies update
//! listeners on the same tick with the serialized result. Listeners are registered
//! through [`HostEditor::register_update_listener`], which returns a disposer.

use crate::events::{EventBus, Subscription};
use crate::node::{
    Direction, DocumentNode, DocumentSnapshot, ElementFields, HeadingNode, HeadingTag,
    LineBreakNode, LinkNode, ListItemNode, ListNode, ListType, NODE_VERSION, ParagraphNode,
    RootNode, SnapshotNode, TextMode, TextNode,
};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::fmt::{self, Display, Formatter};
use std::rc::Rc;
use thiserror::Error;

/// Tag carried by the update transaction that applies an external snapshot.
pub const EXTERNAL_SYNC_TAG: &str = "external-sync";
pub const HISTORY_UNDO_TAG: &str = "history-undo";
pub const HISTORY_REDO_TAG: &str = "history-redo";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("Node not found: {0}")]
    NotFound(NodeKey),

    #[error("Node {0} cannot hold children")]
    NotAnElement(NodeKey),

    #[error("A {child} node cannot be placed inside a {parent} node")]
    InvalidChild {
        parent: &'static str,
        child: &'static str,
    },

    #[error("Node {0} is already attached")]
    AlreadyAttached(NodeKey),

    #[error("Node {0} is a {1} node")]
    WrongKind(NodeKey, &'static str),

    #[error("Host has no native line-break node")]
    LineBreakUnsupported,
}

pub type Result<T> = std::result::Result<T, TreeError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(u64);

impl Display for NodeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextProps {
    pub text: String,
    pub format: u32,
    pub style: String,
    pub mode: TextMode,
    pub detail: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementProps {
    pub direction: Option<Direction>,
    pub format: String,
    pub indent: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkProps {
    pub url: String,
    pub target: Option<String>,
    pub title: Option<String>,
    pub rel: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveKind {
    Text(TextProps),
    Paragraph,
    Heading(HeadingTag),
    Link(LinkProps),
    List { list_type: ListType, start: u32 },
    ListItem { checked: Option<bool> },
    LineBreak,
}

impl LiveKind {
    pub fn name(&self) -> &'static str {
        match self {
            LiveKind::Text(_) => "text",
            LiveKind::Paragraph => "paragraph",
            LiveKind::Heading(_) => "heading",
            LiveKind::Link(_) => "link",
            LiveKind::List { .. } => "list",
            LiveKind::ListItem { .. } => "listitem",
            LiveKind::LineBreak => "linebreak",
        }
    }

    fn is_element(&self) -> bool {
        !matches!(self, LiveKind::Text(_) | LiveKind::LineBreak)
    }

    fn is_inline(&self) -> bool {
        matches!(self, LiveKind::Text(_) | LiveKind::LineBreak | LiveKind::Link(_))
    }
}

#[derive(Debug, Clone)]
struct LiveNode {
    kind: LiveKind,
    element: ElementProps,
    children: Vec<NodeKey>,
    parent: Option<Parent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parent {
    Root,
    Node(NodeKey),
}

/// Collapsed caret position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub node: NodeKey,
    pub offset: usize,
}

/// The live tree. Only reachable inside [`HostEditor::update`] / [`HostEditor::read`].
#[derive(Debug, Default)]
pub struct LiveTree {
    nodes: HashMap<NodeKey, LiveNode>,
    root: Vec<NodeKey>,
    root_props: ElementProps,
    selection: Option<Selection>,
    next_key: u64,
    line_breaks: bool,
    dirty: bool,
    selection_changed: bool,
}

impl LiveTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// A tree whose host has a native line-break node.
    pub fn with_line_breaks() -> Self {
        Self {
            line_breaks: true,
            ..Self::default()
        }
    }

    pub fn supports_line_breaks(&self) -> bool {
        self.line_breaks
    }

    fn insert(&mut self, kind: LiveKind) -> NodeKey {
        self.next_key += 1;
        let key = NodeKey(self.next_key);
        self.nodes.insert(
            key,
            LiveNode {
                kind,
                element: ElementProps::default(),
                children: Vec::new(),
                parent: None,
            },
        );
        self.dirty = true;
        key
    }

    pub fn create_text(&mut self, text: &str) -> NodeKey {
        self.insert(LiveKind::Text(TextProps {
            text: text.to_string(),
            ..TextProps::default()
        }))
    }

    pub fn create_paragraph(&mut self) -> NodeKey {
        self.insert(LiveKind::Paragraph)
    }

    pub fn create_heading(&mut self, tag: HeadingTag) -> NodeKey {
        self.insert(LiveKind::Heading(tag))
    }

    pub fn create_link(&mut self, url: &str) -> NodeKey {
        self.insert(LiveKind::Link(LinkProps {
            url: url.to_string(),
            ..LinkProps::default()
        }))
    }

    pub fn create_list(&mut self, list_type: ListType) -> NodeKey {
        self.insert(LiveKind::List {
            list_type,
            start: 1,
        })
    }

    pub fn create_list_item(&mut self) -> NodeKey {
        self.insert(LiveKind::ListItem { checked: None })
    }

    pub fn create_line_break(&mut self) -> Result<NodeKey> {
        if !self.line_breaks {
            return Err(TreeError::LineBreakUnsupported);
        }
        Ok(self.insert(LiveKind::LineBreak))
    }

    fn node(&self, key: NodeKey) -> Result<&LiveNode> {
        self.nodes.get(&key).ok_or(TreeError::NotFound(key))
    }

    fn node_mut(&mut self, key: NodeKey) -> Result<&mut LiveNode> {
        self.dirty = true;
        self.nodes.get_mut(&key).ok_or(TreeError::NotFound(key))
    }

    /// Append a detached node as the last child of `parent`.
    pub fn append(&mut self, parent: NodeKey, child: NodeKey) -> Result<()> {
        let parent_kind = self.node(parent)?.kind.clone();
        let child_node = self.node(child)?;
        if child_node.parent.is_some() {
            return Err(TreeError::AlreadyAttached(child));
        }
        if parent == child {
            return Err(TreeError::InvalidChild {
                parent: parent_kind.name(),
                child: child_node.kind.name(),
            });
        }
        if !parent_kind.is_element() {
            return Err(TreeError::NotAnElement(parent));
        }
        let child_kind = &child_node.kind;
        let allowed = match &parent_kind {
            LiveKind::List { .. } => matches!(child_kind, LiveKind::ListItem { .. }),
            LiveKind::ListItem { .. } => !matches!(child_kind, LiveKind::ListItem { .. }),
            _ => child_kind.is_inline(),
        };
        if !allowed {
            return Err(TreeError::InvalidChild {
                parent: parent_kind.name(),
                child: child_kind.name(),
            });
        }
        self.node_mut(child)?.parent = Some(Parent::Node(parent));
        self.node_mut(parent)?.children.push(child);
        Ok(())
    }

    /// Append a detached block node at the end of the document.
    pub fn append_to_root(&mut self, child: NodeKey) -> Result<()> {
        let node = self.node(child)?;
        if node.parent.is_some() {
            return Err(TreeError::AlreadyAttached(child));
        }
        if matches!(
            node.kind,
            LiveKind::Text(_) | LiveKind::LineBreak | LiveKind::ListItem { .. }
        ) {
            return Err(TreeError::InvalidChild {
                parent: "root",
                child: node.kind.name(),
            });
        }
        self.node_mut(child)?.parent = Some(Parent::Root);
        self.root.push(child);
        self.dirty = true;
        Ok(())
    }

    /// Detach `key` and drop it together with its subtree.
    pub fn remove(&mut self, key: NodeKey) {
        let Some(node) = self.nodes.get(&key) else {
            return;
        };
        match node.parent {
            Some(Parent::Root) => self.root.retain(|k| *k != key),
            Some(Parent::Node(parent)) => {
                if let Some(parent) = self.nodes.get_mut(&parent) {
                    parent.children.retain(|k| *k != key);
                }
            }
            None => {}
        }
        let mut stack = vec![key];
        while let Some(key) = stack.pop() {
            if let Some(node) = self.nodes.remove(&key) {
                stack.extend(node.children);
            }
        }
        if self.selection.is_some_and(|s| !self.nodes.contains_key(&s.node)) {
            self.set_selection(None);
        }
        self.dirty = true;
    }

    /// Remove every node. Root attributes are reset as well.
    pub fn clear_root(&mut self) {
        self.nodes.clear();
        self.root.clear();
        self.root_props = ElementProps::default();
        if self.selection.is_some() {
            self.set_selection(None);
        }
        self.dirty = true;
    }

    pub fn root_children(&self) -> &[NodeKey] {
        &self.root
    }

    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.nodes
            .get(&key)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn kind(&self, key: NodeKey) -> Option<&LiveKind> {
        self.nodes.get(&key).map(|node| &node.kind)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn text(&self, key: NodeKey) -> Option<&str> {
        match self.kind(key) {
            Some(LiveKind::Text(props)) => Some(&props.text),
            _ => None,
        }
    }

    pub fn text_mut(&mut self, key: NodeKey) -> Result<&mut TextProps> {
        match &mut self.node_mut(key)?.kind {
            LiveKind::Text(props) => Ok(props),
            other => Err(TreeError::WrongKind(key, other.name())),
        }
    }

    pub fn link_mut(&mut self, key: NodeKey) -> Result<&mut LinkProps> {
        match &mut self.node_mut(key)?.kind {
            LiveKind::Link(props) => Ok(props),
            other => Err(TreeError::WrongKind(key, other.name())),
        }
    }

    pub fn element_mut(&mut self, key: NodeKey) -> Result<&mut ElementProps> {
        let node = self.node_mut(key)?;
        if !node.kind.is_element() {
            return Err(TreeError::NotAnElement(key));
        }
        Ok(&mut node.element)
    }

    pub fn root_props_mut(&mut self) -> &mut ElementProps {
        self.dirty = true;
        &mut self.root_props
    }

    /// Append `text` at the end of a text node, moving the caret after it.
    pub fn insert_text(&mut self, key: NodeKey, text: &str) -> Result<()> {
        let props = self.text_mut(key)?;
        props.text.push_str(text);
        let offset = props.text.chars().count();
        self.set_selection(Some(Selection { node: key, offset }));
        Ok(())
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn set_selection(&mut self, selection: Option<Selection>) {
        if self.selection != selection {
            self.selection = selection;
            self.selection_changed = true;
        }
    }

    /// First text node in document order.
    pub fn first_text(&self) -> Option<NodeKey> {
        let mut stack: Vec<NodeKey> = self.root.iter().rev().copied().collect();
        while let Some(key) = stack.pop() {
            let node = self.nodes.get(&key)?;
            if matches!(node.kind, LiveKind::Text(_)) {
                return Some(key);
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }

    /// Serialize the tree. Total and deterministic.
    pub fn to_snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            root: RootNode {
                children: self.serialize_children(&self.root),
                direction: self.root_props.direction,
                format: self.root_props.format.clone(),
                indent: self.root_props.indent,
                ..RootNode::default()
            },
        }
    }

    fn serialize_children(&self, keys: &[NodeKey]) -> Vec<SnapshotNode> {
        keys.iter()
            .enumerate()
            .filter_map(|(index, key)| self.serialize_node(*key, index))
            .map(SnapshotNode::Known)
            .collect()
    }

    fn serialize_node(&self, key: NodeKey, index: usize) -> Option<DocumentNode> {
        let node = self.nodes.get(&key)?;
        let element = || ElementFields {
            children: self.serialize_children(&node.children),
            direction: node.element.direction,
            format: Some(node.element.format.clone()),
            indent: Some(node.element.indent),
            version: Some(NODE_VERSION),
        };
        let serialized = match &node.kind {
            LiveKind::Text(props) => DocumentNode::Text(TextNode {
                detail: Some(props.detail),
                format: Some(props.format),
                mode: Some(props.mode),
                style: Some(props.style.clone()),
                text: Some(props.text.clone()),
                version: Some(NODE_VERSION),
            }),
            LiveKind::Paragraph => DocumentNode::Paragraph(ParagraphNode { element: element() }),
            LiveKind::Heading(tag) => DocumentNode::Heading(HeadingNode {
                tag: Some(*tag),
                element: element(),
            }),
            LiveKind::Link(props) => DocumentNode::Link(LinkNode {
                url: Some(props.url.clone()),
                target: props.target.clone(),
                title: props.title.clone(),
                rel: props.rel.clone(),
                element: element(),
            }),
            LiveKind::List { list_type, start } => DocumentNode::List(ListNode {
                list_type: Some(*list_type),
                start: Some(*start),
                tag: Some(list_type.tag().to_string()),
                element: element(),
            }),
            LiveKind::ListItem { checked } => DocumentNode::ListItem(ListItemNode {
                checked: *checked,
                value: Some(index as u32 + 1),
                element: element(),
            }),
            LiveKind::LineBreak => DocumentNode::LineBreak(LineBreakNode {
                version: Some(NODE_VERSION),
            }),
        };
        Some(serialized)
    }
}

/// Notification delivered to update listeners after every committed update.
#[derive(Debug, Clone)]
pub struct EditorUpdate {
    pub snapshot: DocumentSnapshot,
    pub tags: BTreeSet<String>,
    /// False when the update only moved the selection.
    pub dirty: bool,
}

impl EditorUpdate {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// Single-threaded host editor owning a [`LiveTree`].
pub struct HostEditor {
    tree: RefCell<LiveTree>,
    updates: Rc<EventBus<EditorUpdate>>,
}

impl Default for HostEditor {
    fn default() -> Self {
        Self::from_tree(LiveTree::new())
    }
}

impl HostEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_line_breaks() -> Self {
        Self::from_tree(LiveTree::with_line_breaks())
    }

    fn from_tree(tree: LiveTree) -> Self {
        Self {
            tree: RefCell::new(tree),
            updates: Rc::new(EventBus::new()),
        }
    }

    /// Run `f` as one transaction, then notify listeners synchronously.
    ///
    /// Listeners are not notified when the transaction changed nothing.
    /// `f` must not call back into this editor.
    pub fn update<R>(&self, tags: &[&str], f: impl FnOnce(&mut LiveTree) -> R) -> R {
        let (result, update) = {
            let mut tree = self.tree.borrow_mut();
            tree.dirty = false;
            tree.selection_changed = false;
            let result = f(&mut tree);
            let update = (tree.dirty || tree.selection_changed).then(|| EditorUpdate {
                snapshot: tree.to_snapshot(),
                tags: tags.iter().map(|tag| tag.to_string()).collect(),
                dirty: tree.dirty,
            });
            (result, update)
        };
        if let Some(update) = update {
            self.updates.emit(&update);
        }
        result
    }

    pub fn read<R>(&self, f: impl FnOnce(&LiveTree) -> R) -> R {
        f(&self.tree.borrow())
    }

    pub fn snapshot(&self) -> DocumentSnapshot {
        self.tree.borrow().to_snapshot()
    }

    pub fn supports_line_breaks(&self) -> bool {
        self.tree.borrow().supports_line_breaks()
    }

    /// Register an update listener. Dropping the returned handle unregisters it.
    pub fn register_update_listener(
        &self,
        listener: impl Fn(&EditorUpdate) + 'static,
    ) -> Subscription {
        self.updates.subscribe(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change;
    use std::cell::Cell;

    fn paragraph_with_text(tree: &mut LiveTree, text: &str) -> (NodeKey, NodeKey) {
        let paragraph = tree.create_paragraph();
        let text = tree.create_text(text);
        tree.append(paragraph, text).unwrap();
        tree.append_to_root(paragraph).unwrap();
        (paragraph, text)
    }

    #[test]
    fn test_serialize_paragraph() {
        let mut tree = LiveTree::new();
        paragraph_with_text(&mut tree, "Hi");

        let value = tree.to_snapshot().to_value().unwrap();
        let paragraph = &value["root"]["children"][0];
        assert_eq!(paragraph["type"], "paragraph");
        assert_eq!(paragraph["children"][0]["type"], "text");
        assert_eq!(paragraph["children"][0]["text"], "Hi");
        assert_eq!(paragraph["children"][0]["mode"], "normal");
        assert_eq!(value["root"]["type"], "root");
    }

    #[test]
    fn test_structure_rules() {
        let mut tree = LiveTree::new();
        let text = tree.create_text("x");
        assert!(matches!(
            tree.append_to_root(text),
            Err(TreeError::InvalidChild { parent: "root", .. })
        ));

        let list = tree.create_list(ListType::Bullet);
        let paragraph = tree.create_paragraph();
        assert!(matches!(
            tree.append(list, paragraph),
            Err(TreeError::InvalidChild { parent: "list", .. })
        ));

        let other = tree.create_text("y");
        assert_eq!(tree.append(text, other), Err(TreeError::NotAnElement(text)));

        let inner = tree.create_paragraph();
        assert!(tree.append(paragraph, inner).is_err());

        assert_eq!(
            tree.create_line_break(),
            Err(TreeError::LineBreakUnsupported)
        );
    }

    #[test]
    fn test_list_item_values_follow_position() {
        let mut tree = LiveTree::new();
        let list = tree.create_list(ListType::Number);
        for label in ["a", "b"] {
            let item = tree.create_list_item();
            let text = tree.create_text(label);
            tree.append(item, text).unwrap();
            tree.append(list, item).unwrap();
        }
        tree.append_to_root(list).unwrap();

        let value = tree.to_snapshot().to_value().unwrap();
        let list = &value["root"]["children"][0];
        assert_eq!(list["tag"], "ol");
        assert_eq!(list["listType"], "number");
        assert_eq!(list["children"][1]["value"], 2);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut tree = LiveTree::new();
        let (paragraph, text) = paragraph_with_text(&mut tree, "Hi");
        tree.set_selection(Some(Selection {
            node: text,
            offset: 2,
        }));

        tree.remove(paragraph);
        assert!(tree.is_empty());
        assert_eq!(tree.len(), 0);
        assert_eq!(tree.selection(), None);

        paragraph_with_text(&mut tree, "again");
        tree.clear_root();
        assert!(tree.is_empty());
        assert_eq!(tree.to_snapshot().plain_text(), "");
    }

    #[test]
    fn test_update_notifies_listeners_with_tags() {
        let editor = HostEditor::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = Rc::clone(&seen);
        let _sub = editor.register_update_listener(move |update| {
            seen_clone
                .borrow_mut()
                .push((update.snapshot.plain_text(), update.has_tag(EXTERNAL_SYNC_TAG)));
        });

        editor.update(&[EXTERNAL_SYNC_TAG], |tree| {
            paragraph_with_text(tree, "Hi");
        });
        editor.update(&[], |tree| {
            let text = tree.first_text().unwrap();
            tree.insert_text(text, "!").unwrap();
        });

        assert_eq!(
            *seen.borrow(),
            vec![("Hi".to_string(), true), ("Hi!".to_string(), false)]
        );
    }

    #[test]
    fn test_noop_update_is_silent_and_selection_only_is_not_dirty() {
        let editor = HostEditor::new();
        let text = editor.update(&[], |tree| paragraph_with_text(tree, "Hi").1);

        let calls = Rc::new(Cell::new(0));
        let dirty = Rc::new(Cell::new(true));
        let (calls_clone, dirty_clone) = (Rc::clone(&calls), Rc::clone(&dirty));
        let _sub = editor.register_update_listener(move |update| {
            calls_clone.set(calls_clone.get() + 1);
            dirty_clone.set(update.dirty);
        });

        editor.update(&[], |_| {});
        assert_eq!(calls.get(), 0);

        editor.update(&[], |tree| {
            tree.set_selection(Some(Selection {
                node: text,
                offset: 1,
            }))
        });
        assert_eq!(calls.get(), 1);
        assert!(!dirty.get());
    }

    #[test]
    fn test_snapshot_matches_read() {
        let editor = HostEditor::with_line_breaks();
        editor.update(&[], |tree| {
            let (paragraph, _) = paragraph_with_text(tree, "a");
            let line_break = tree.create_line_break().unwrap();
            tree.append(paragraph, line_break).unwrap();
        });
        let from_read = editor.read(|tree| tree.to_snapshot());
        assert!(change::equal(Some(&from_read), Some(&editor.snapshot())));
        assert!(editor.supports_line_breaks());
    }
}
