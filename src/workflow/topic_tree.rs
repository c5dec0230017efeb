use chrono::Utc;

use crate::error::{AppError, ErrorMessage};
use crate::models::{ContentStatus, Topic};

/// Index of a node inside a [`TopicTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct Node {
    /// Node payload; `sub_topics` is always empty here, structure lives in
    /// `children`
    topic: Topic,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    detached: bool,
}

/// Arena representation of a subject's curriculum tree
///
/// Subjects persist their topics as nested JSON. Editing goes through this
/// arena instead: nodes are addressed by index, parents and children are
/// explicit, and the nested shape is rebuilt with [`TopicTree::into_nested`]
/// when saving. Removed nodes stay in the arena, detached from their parent.
#[derive(Debug, Clone, Default)]
pub struct TopicTree {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
}

impl TopicTree {
    pub fn new() -> Self {
        TopicTree::default()
    }

    pub fn from_nested(topics: Vec<Topic>) -> Self {
        let mut tree = TopicTree::new();
        for topic in topics {
            let id = tree.insert(topic, None);
            tree.roots.push(id);
        }
        tree
    }

    fn insert(&mut self, mut topic: Topic, parent: Option<NodeId>) -> NodeId {
        let sub_topics = std::mem::take(&mut topic.sub_topics);
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            topic,
            parent,
            children: Vec::with_capacity(sub_topics.len()),
            detached: false,
        });
        for child in sub_topics {
            let child_id = self.insert(child, Some(id));
            self.nodes[id.0].children.push(child_id);
        }
        id
    }

    /// Rebuilds the nested shape, preserving sibling order
    pub fn into_nested(self) -> Vec<Topic> {
        let mut slots: Vec<Option<Node>> = self.nodes.into_iter().map(Some).collect();
        self.roots
            .iter()
            .filter_map(|id| Self::take_nested(&mut slots, *id))
            .collect()
    }

    fn take_nested(slots: &mut [Option<Node>], id: NodeId) -> Option<Topic> {
        let node = slots.get_mut(id.0)?.take()?;
        let mut topic = node.topic;
        topic.sub_topics = node
            .children
            .iter()
            .filter_map(|child| Self::take_nested(slots, *child))
            .collect();
        Some(topic)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn topic(&self, id: NodeId) -> &Topic {
        &self.nodes[id.0].topic
    }

    /// Live nodes in depth-first order
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            stack.extend(self.nodes[id.0].children.iter().rev().copied());
            Some(id)
        })
    }

    pub fn find(&self, topic_id: &str) -> Option<NodeId> {
        self.iter().find(|id| self.nodes[id.0].topic.id == topic_id)
    }

    fn require(&self, topic_id: &str) -> Result<NodeId, AppError> {
        self.find(topic_id)
            .ok_or_else(|| AppError::not_found(ErrorMessage::TopicNotFound.to_string()))
    }

    /// Number of live topics at every depth
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Appends a top-level module as a draft
    pub fn add_root(&mut self, topic: Topic) -> NodeId {
        let id = self.insert(Self::as_draft(topic), None);
        self.roots.push(id);
        id
    }

    /// Appends a sub-topic under `parent_topic_id` as a draft
    pub fn add_child(&mut self, parent_topic_id: &str, topic: Topic) -> Result<NodeId, AppError> {
        let parent = self.require(parent_topic_id)?;
        if self.nodes[parent.0].topic.status == Some(ContentStatus::RemovalPending) {
            return Err(AppError::validation(ErrorMessage::TopicRemovalPending.to_string()));
        }
        let id = self.insert(Self::as_draft(topic), Some(parent));
        self.nodes[parent.0].children.push(id);
        Ok(id)
    }

    fn as_draft(mut topic: Topic) -> Topic {
        topic.status = Some(ContentStatus::Draft);
        topic.last_updated = Some(Utc::now());
        topic
    }

    /// Applies `edit` to a topic's own fields
    ///
    /// Structure and status are not editable through this path.
    pub fn update<F>(&mut self, topic_id: &str, edit: F) -> Result<(), AppError>
    where
        F: FnOnce(&mut Topic),
    {
        let id = self.require(topic_id)?;
        let node = &mut self.nodes[id.0];
        if node.topic.status == Some(ContentStatus::RemovalPending) {
            return Err(AppError::validation(ErrorMessage::TopicRemovalPending.to_string()));
        }

        let (topic_id, status) = (node.topic.id.clone(), node.topic.status);
        edit(&mut node.topic);
        node.topic.id = topic_id;
        node.topic.status = status;
        node.topic.sub_topics.clear();
        node.topic.last_updated = Some(Utc::now());
        Ok(())
    }

    /// Stages a topic (and implicitly its subtree) for deletion
    pub fn mark_for_removal(&mut self, topic_id: &str) -> Result<(), AppError> {
        let id = self.require(topic_id)?;
        self.nodes[id.0].topic.status = Some(ContentStatus::RemovalPending);
        Ok(())
    }

    /// Takes a staged topic back to draft
    pub fn restore(&mut self, topic_id: &str) -> Result<(), AppError> {
        let id = self.require(topic_id)?;
        let topic = &mut self.nodes[id.0].topic;
        if topic.status != Some(ContentStatus::RemovalPending) {
            return Err(AppError::validation(
                ErrorMessage::TopicNotMarkedForRemoval.to_string(),
            ));
        }
        topic.status = Some(ContentStatus::Draft);
        Ok(())
    }

    /// Removes every subtree rooted at a `REMOVAL_PENDING` topic and marks
    /// all remaining topics approved
    ///
    /// Staged topics are collected before anything is detached. A staged
    /// topic below another staged topic is already unreachable when its turn
    /// comes; detaching it only unlinks it from a parent that is gone too.
    /// Detached nodes keep their arena slot but are no longer reachable from
    /// `roots`, so `iter` and `into_nested` never visit the pruned subtrees.
    pub fn approve_all(&mut self) {
        let staged: Vec<NodeId> = self
            .iter()
            .filter(|id| self.nodes[id.0].topic.status == Some(ContentStatus::RemovalPending))
            .collect();
        for id in staged {
            self.detach(id);
        }

        // Only what survived the pruning is approved
        let live: Vec<NodeId> = self.iter().collect();
        for id in live {
            self.nodes[id.0].topic.status = Some(ContentStatus::Approved);
        }
    }

    fn detach(&mut self, id: NodeId) {
        if self.nodes[id.0].detached {
            return;
        }
        match self.nodes[id.0].parent {
            Some(parent) => self.nodes[parent.0].children.retain(|c| *c != id),
            None => self.roots.retain(|r| *r != id),
        }
        self.nodes[id.0].detached = true;
    }

    /// Every live topic is approved; a topic with no status is not
    pub fn is_all_approved(&self) -> bool {
        self.iter()
            .all(|id| self.nodes[id.0].topic.status == Some(ContentStatus::Approved))
    }
}
